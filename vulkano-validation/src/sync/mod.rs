// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Synchronization primitives, and the sharing of resources between queue families.
//!
//! Fences and semaphores have a *payload*: the signal state that waits observe. An external
//! payload can be imported into either of them, permanently or temporarily. A temporary payload
//! sits on top of the permanent one, and the permanent one comes back once the temporary one is
//! consumed (by a semaphore wait) or discarded (by a fence reset). There is never more than one
//! temporary payload.

use crate::{device::Device, handle::Id, queue::Queue, ValidationError, ValidationErrorKind};
use smallvec::SmallVec;

pub mod event;
pub mod fence;
pub mod semaphore;

/// Declares in which queue families a resource can be used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Sharing {
    /// The resource is used in only one queue family at a time, and ownership must be
    /// transferred explicitly.
    #[default]
    Exclusive,

    /// The resource is used in multiple queue families. Can be slower than `Exclusive`.
    Concurrent(SmallVec<[u32; 4]>),
}

impl Sharing {
    /// Returns whether the sharing mode is `Concurrent`.
    #[inline]
    pub fn is_concurrent(&self) -> bool {
        matches!(self, Sharing::Concurrent(_))
    }

    pub(crate) fn validate(
        &self,
        device: &Device,
        count_vuids: &'static [&'static str],
        index_vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        let Sharing::Concurrent(queue_family_indices) = self else {
            return Ok(());
        };

        if queue_family_indices.len() < 2 {
            return Err(Box::new(ValidationError {
                problem: "is `Sharing::Concurrent`, but contains less than 2 elements".into(),
                vuids: count_vuids,
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let queue_family_count = device.queue_family_properties().len() as u32;

        for (index, &queue_family_index) in queue_family_indices.iter().enumerate() {
            if queue_family_indices[..index].contains(&queue_family_index) {
                return Err(Box::new(ValidationError {
                    problem: "is `Sharing::Concurrent`, and contains duplicate elements".into(),
                    vuids: index_vuids,
                    ..Default::default()
                }));
            }

            if queue_family_index >= queue_family_count {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "is `Sharing::Concurrent`, and element {} is not less than the number \
                        of queue families in the physical device",
                        index,
                    )
                    .into(),
                    vuids: index_vuids,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// The signal state of a fence or semaphore payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SignalState {
    #[default]
    Unsignaled,

    /// A submission that has not been retired yet is going to signal the payload.
    Pending { queue: Id<Queue>, seq: u64 },

    Signaled,
}

impl SignalState {
    /// Returns whether a signal operation is outstanding: the payload is either signaled, or is
    /// going to be.
    #[inline]
    pub fn is_signal_outstanding(self) -> bool {
        !matches!(self, SignalState::Unsignaled)
    }

    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, SignalState::Pending { .. })
    }
}

/// A permanent payload, and at most one temporary payload on top of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Payload<S> {
    pub(crate) permanent: S,
    pub(crate) temporary: Option<S>,
}

impl<S: Copy> Payload<S> {
    /// The payload that operations observe.
    #[inline]
    pub(crate) fn current(&self) -> S {
        self.temporary.unwrap_or(self.permanent)
    }

    #[inline]
    pub(crate) fn current_mut(&mut self) -> &mut S {
        match &mut self.temporary {
            Some(temporary) => temporary,
            None => &mut self.permanent,
        }
    }

    #[inline]
    pub(crate) fn is_temporary(&self) -> bool {
        self.temporary.is_some()
    }

    pub(crate) fn import(&mut self, state: S, temporary: bool) {
        if temporary {
            self.temporary = Some(state);
        } else {
            self.permanent = state;
            self.temporary = None;
        }
    }

    /// Drops the temporary payload, if any, so that the permanent payload is current again.
    #[inline]
    pub(crate) fn restore_permanent(&mut self) -> Option<S> {
        self.temporary.take()
    }
}

#[cfg(test)]
mod tests {
    use super::{Payload, Sharing, SignalState};
    use smallvec::smallvec;

    #[test]
    fn payload_layers() {
        let mut payload = Payload::<SignalState>::default();
        assert_eq!(payload.current(), SignalState::Unsignaled);

        payload.import(SignalState::Signaled, true);
        assert!(payload.is_temporary());
        assert_eq!(payload.current(), SignalState::Signaled);
        assert_eq!(payload.permanent, SignalState::Unsignaled);

        *payload.current_mut() = SignalState::Unsignaled;
        assert_eq!(payload.restore_permanent(), Some(SignalState::Unsignaled));
        assert!(!payload.is_temporary());

        payload.import(SignalState::Signaled, true);
        payload.import(SignalState::Signaled, false);
        assert!(!payload.is_temporary());
        assert_eq!(payload.current(), SignalState::Signaled);
    }

    #[test]
    fn concurrent_sharing() {
        let (device, _queue, _log) = test_device!();
        let vuids: &[&str] = &["count"];
        let index_vuids: &[&str] = &["index"];

        Sharing::Exclusive
            .validate(&device, vuids, index_vuids)
            .unwrap();
        Sharing::Concurrent(smallvec![0, 1])
            .validate(&device, vuids, index_vuids)
            .unwrap();
        assert!(Sharing::Concurrent(smallvec![0])
            .validate(&device, vuids, index_vuids)
            .unwrap_err()
            .is("count"));
        assert!(Sharing::Concurrent(smallvec![0, 0])
            .validate(&device, vuids, index_vuids)
            .unwrap_err()
            .is("index"));
        assert!(Sharing::Concurrent(smallvec![0, 7])
            .validate(&device, vuids, index_vuids)
            .unwrap_err()
            .is("index"));
    }
}
