// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Delivery of verdicts to the host.
//!
//! Every error is reported at the point where it is detected, and every warning is reported
//! without failing the call. A [`Reporter`] receives them one by one, in detection order.

use crate::{object::ObjectRef, ValidationError};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;

/// How severe a reported finding is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A single finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,

    /// The stable identifier of the rule, meant for exact matching.
    pub vuid: &'static str,

    /// A human readable description, which can contain handle values and sizes.
    pub message: String,

    /// The objects the finding is about.
    pub objects: SmallVec<[ObjectRef; 2]>,
}

impl Report {
    pub(crate) fn error(error: &ValidationError) -> Self {
        Report {
            severity: Severity::Error,
            vuid: error.vuid(),
            message: error.to_string(),
            objects: SmallVec::new(),
        }
    }

    pub(crate) fn warning(
        vuid: &'static str,
        message: impl Into<String>,
        objects: &[ObjectRef],
    ) -> Self {
        Report {
            severity: Severity::Warning,
            vuid,
            message: message.into(),
            objects: objects.iter().copied().collect(),
        }
    }

    pub(crate) fn with_objects(mut self, objects: &[ObjectRef]) -> Self {
        self.objects.extend(objects.iter().copied());

        self
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.vuid, self.message)
    }
}

/// Receives the findings of a device.
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report(&self, report: &Report);
}

/// A reporter that emits every finding as a `tracing` event.
///
/// Errors are emitted at the `ERROR` level, warnings at `WARN` and informational findings at
/// `INFO`, with the identifier in the `vuid` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: &Report) {
        let vuid = report.vuid;
        let objects = ObjectList(&report.objects);

        match report.severity {
            Severity::Error => {
                tracing::error!(vuid, %objects, "{}", report.message);
            }
            Severity::Warning => {
                tracing::warn!(vuid, %objects, "{}", report.message);
            }
            Severity::Info => {
                tracing::info!(vuid, %objects, "{}", report.message);
            }
        }
    }
}

struct ObjectList<'a>(&'a [ObjectRef]);

impl fmt::Display for ObjectList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((first, rest)) = self.0.split_first() {
            write!(f, "{first}")?;

            for object in rest {
                write!(f, ", {object}")?;
            }
        }

        Ok(())
    }
}

/// A reporter that keeps every finding, so that it can be inspected afterward.
///
/// Findings are also forwarded to `tracing`, so that a host that installs a subscriber still
/// sees them.
#[derive(Debug, Default)]
pub struct ReportLog {
    reports: Mutex<Vec<Report>>,
}

impl ReportLog {
    /// Creates an empty log.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a finding with the identifier `vuid` was reported.
    pub fn contains(&self, vuid: &str) -> bool {
        self.reports.lock().iter().any(|report| report.vuid == vuid)
    }

    /// Returns whether a finding with the identifier `vuid` and a message containing `text`
    /// was reported.
    pub fn contains_message(&self, vuid: &str, text: &str) -> bool {
        self.reports
            .lock()
            .iter()
            .any(|report| report.vuid == vuid && report.message.contains(text))
    }

    /// Returns how many findings with the identifier `vuid` were reported.
    pub fn count(&self, vuid: &str) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|report| report.vuid == vuid)
            .count()
    }

    /// Returns how many findings of the given severity were reported.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|report| report.severity == severity)
            .count()
    }

    /// Returns whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Removes and returns everything reported so far.
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl Reporter for ReportLog {
    fn report(&self, report: &Report) {
        TracingReporter.report(report);
        self.reports.lock().push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{object::ObjectType, ValidationErrorKind};

    #[test]
    fn log_collects() {
        let log = ReportLog::new();
        let error = ValidationError {
            context: "create_info.size".into(),
            problem: "is zero".into(),
            vuids: &["VUID-VkBufferCreateInfo-size-00912"],
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        };

        log.report(&Report::error(&error));
        log.report(&Report::warning(
            "UNASSIGNED-CoreValidation-MemTrack-FenceState",
            "fence was never submitted",
            &[ObjectRef {
                object_type: ObjectType::Fence,
                handle: 1,
            }],
        ));

        assert!(log.contains("VUID-VkBufferCreateInfo-size-00912"));
        assert!(log.contains_message("VUID-VkBufferCreateInfo-size-00912", "is zero"));
        assert_eq!(log.count_severity(Severity::Warning), 1);

        let reports = log.take();
        assert_eq!(reports.len(), 2);
        assert_eq!(
            reports[0].message,
            "create_info.size: is zero (Vulkan VUIDs: VUID-VkBufferCreateInfo-size-00912)",
        );
        assert!(log.is_empty());
    }
}
