// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A fence provides synchronization between the device and the host, or between an external
//! source and the host.
//!
//! A fence has two states: unsignaled and signaled. While a submission that is going to signal
//! it has not completed, the fence is pending. It is a usage error to submit a fence that is
//! signaled or pending, or to reset a fence that is pending.

use super::{Payload, SignalState};
use crate::{
    device::Device, handle::Id, object::UseCount, ValidationError, ValidationErrorKind,
};
use parking_lot::Mutex;

vulkan_bitflags! {
    /// Flags specifying additional properties of a fence.
    FenceCreateFlags = FenceCreateFlags(u32);

    /// Creates the fence in the signaled state.
    SIGNALED = SIGNALED,
}

vulkan_bitflags! {
    /// The handle types that a fence payload can be exported to.
    ExternalFenceHandleTypes = ExternalFenceHandleTypeFlags(u32);

    /// A POSIX file descriptor handle that is only usable with Vulkan and compatible APIs.
    OPAQUE_FD = OPAQUE_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_fence_fd)]),
    ]),

    /// A POSIX file descriptor handle to a Linux Sync File or Android Fence object.
    ///
    /// This handle type has *copy transference*: exporting resets the fence, and importing
    /// must be temporary.
    SYNC_FD = SYNC_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_fence_fd)]),
    ]),
}

vulkan_enum! {
    /// A single handle type that a fence payload can be imported from or exported to.
    ExternalFenceHandleType = ExternalFenceHandleTypeFlags(u32);

    OpaqueFd = OPAQUE_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_fence_fd)]),
    ]),

    SyncFd = SYNC_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_fence_fd)]),
    ]),
}

impl From<ExternalFenceHandleType> for ExternalFenceHandleTypes {
    #[inline]
    fn from(val: ExternalFenceHandleType) -> Self {
        Self(val as u32)
    }
}

/// Parameters to create a new `Fence`.
#[derive(Clone, Debug)]
pub struct FenceCreateInfo {
    /// Additional properties of the fence.
    ///
    /// The default value is empty.
    pub flags: FenceCreateFlags,

    /// The handle types that can be exported from the fence.
    ///
    /// The default value is empty.
    pub export_handle_types: ExternalFenceHandleTypes,

    pub _ne: crate::NonExhaustive,
}

impl Default for FenceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: FenceCreateFlags::empty(),
            export_handle_types: ExternalFenceHandleTypes::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl FenceCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags: _,
            export_handle_types,
            _ne: _,
        } = self;

        export_handle_types.validate_device(device).map_err(|err| {
            err.add_context("export_handle_types")
                .set_vuids(&["VUID-VkExportFenceCreateInfo-handleTypes-01446"])
        })?;

        Ok(())
    }
}

/// Parameters to import a file descriptor into a fence.
#[derive(Clone, Debug)]
pub struct ImportFenceFdInfo {
    /// The handle type of the file descriptor.
    ///
    /// The default value is [`ExternalFenceHandleType::OpaqueFd`].
    pub handle_type: ExternalFenceHandleType,

    /// Whether the imported payload only replaces the payload of the fence until the next
    /// reset.
    ///
    /// The default value is `false`.
    pub temporary: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImportFenceFdInfo {
    #[inline]
    fn default() -> Self {
        Self {
            handle_type: ExternalFenceHandleType::OpaqueFd,
            temporary: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A fence, and its payload.
#[derive(Debug)]
pub struct Fence {
    flags: FenceCreateFlags,
    export_handle_types: ExternalFenceHandleTypes,
    pub(crate) state: Mutex<Payload<SignalState>>,
    use_count: UseCount,
}

impl_object!(Fence, Fence, fences);

impl Fence {
    #[inline]
    pub fn flags(&self) -> FenceCreateFlags {
        self.flags
    }

    #[inline]
    pub fn export_handle_types(&self) -> ExternalFenceHandleTypes {
        self.export_handle_types
    }

    /// Returns the state of the payload that operations currently observe.
    #[inline]
    pub fn signal_state(&self) -> SignalState {
        self.state.lock().current()
    }

    /// Returns whether a temporarily imported payload is active.
    #[inline]
    pub fn has_temporary_payload(&self) -> bool {
        self.state.lock().is_temporary()
    }

    /// Restores the permanent payload and unsignals it.
    fn reset_payload(&self) {
        let mut state = self.state.lock();
        state.restore_permanent();
        state.permanent = SignalState::Unsignaled;
    }
}

impl Device {
    /// Creates a new fence.
    pub fn create_fence(
        &self,
        create_info: FenceCreateInfo,
    ) -> Result<Id<Fence>, Box<ValidationError>> {
        self.reported(self.validate_create_fence(&create_info))?;

        Ok(self.record_create_fence(create_info))
    }

    pub fn validate_create_fence(
        &self,
        create_info: &FenceCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_fence(&self, create_info: FenceCreateInfo) -> Id<Fence> {
        let FenceCreateInfo {
            flags,
            export_handle_types,
            _ne: _,
        } = create_info;

        let permanent = if flags.intersects(FenceCreateFlags::SIGNALED) {
            SignalState::Signaled
        } else {
            SignalState::Unsignaled
        };

        self.objects.fences.register(Fence {
            flags,
            export_handle_types,
            state: Mutex::new(Payload {
                permanent,
                temporary: None,
            }),
            use_count: UseCount::default(),
        })
    }

    /// Destroys a fence.
    pub fn destroy_fence(&self, fence: Id<Fence>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_fence(fence))?;
        self.record_destroy_fence(fence);

        Ok(())
    }

    pub fn validate_destroy_fence(&self, fence: Id<Fence>) -> Result<(), Box<ValidationError>> {
        let fence_record = self.lookup(fence, "fence", &["VUID-vkDestroyFence-fence-parameter"])?;

        if fence_record.signal_state().is_pending() || fence_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "fence".into(),
                problem: format!("{} is in use by a pending queue submission", fence.erase())
                    .into(),
                vuids: &["VUID-vkDestroyFence-fence-01120"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_fence(&self, fence: Id<Fence>) {
        let _ = self.objects.fences.erase(fence);
    }

    /// Resets fences to the unsignaled state. A temporarily imported payload is discarded first.
    pub fn reset_fences(&self, fences: &[Id<Fence>]) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_fences(fences))?;
        self.record_reset_fences(fences);

        Ok(())
    }

    pub fn validate_reset_fences(&self, fences: &[Id<Fence>]) -> Result<(), Box<ValidationError>> {
        if fences.is_empty() {
            return Err(Box::new(ValidationError {
                context: "fences".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkResetFences-fenceCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        for (index, &fence) in fences.iter().enumerate() {
            let fence_record = self
                .lookup(fence, "", &["VUID-vkResetFences-pFences-parameter"])
                .map_err(|err| err.add_context(format!("fences[{}]", index)))?;

            if fence_record.signal_state().is_pending() {
                return Err(Box::new(ValidationError {
                    context: format!("fences[{}]", index).into(),
                    problem: format!(
                        "{} is in use by a submission that has not completed",
                        fence.erase(),
                    )
                    .into(),
                    vuids: &["VUID-vkResetFences-pFences-01123"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_reset_fences(&self, fences: &[Id<Fence>]) {
        for &fence in fences {
            if let Ok(fence_record) = self.objects.fences.get(fence) {
                fence_record.reset_payload();
            }
        }
    }

    /// Returns whether a fence is known to be signaled.
    ///
    /// A pending fence is reported as not signaled; use
    /// [`record_get_fence_status`](Self::record_get_fence_status) when the driver reports that
    /// its submission has completed.
    pub fn get_fence_status(&self, fence: Id<Fence>) -> Result<bool, Box<ValidationError>> {
        self.reported(self.validate_get_fence_status(fence))?;

        Ok(self
            .get(fence)
            .map(|fence| fence.signal_state() == SignalState::Signaled)
            .unwrap_or(false))
    }

    pub fn validate_get_fence_status(&self, fence: Id<Fence>) -> Result<(), Box<ValidationError>> {
        self.lookup(fence, "fence", &["VUID-vkGetFenceStatus-fence-parameter"])?;

        Ok(())
    }

    /// Records the answer of the driver to a fence status query. If the fence is signaled, the
    /// submission that signals it is retired.
    pub fn record_get_fence_status(&self, fence: Id<Fence>, signaled: bool) {
        if signaled {
            self.retire_fence(fence);
        }
    }

    /// Waits for fences to become signaled.
    ///
    /// The wait is assumed to succeed: the submissions that signal the fences are retired. If
    /// `wait_all` is false, only the first fence in `fences` that is not yet signaled is
    /// retired, unless one of them is already signaled.
    pub fn wait_for_fences(
        &self,
        fences: &[Id<Fence>],
        wait_all: bool,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_wait_for_fences(fences))?;
        self.record_wait_for_fences(fences, wait_all);

        Ok(())
    }

    pub fn validate_wait_for_fences(
        &self,
        fences: &[Id<Fence>],
    ) -> Result<(), Box<ValidationError>> {
        if fences.is_empty() {
            return Err(Box::new(ValidationError {
                context: "fences".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkWaitForFences-fenceCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        for (index, &fence) in fences.iter().enumerate() {
            let fence_record = self
                .lookup(fence, "", &["VUID-vkWaitForFences-pFences-parameter"])
                .map_err(|err| err.add_context(format!("fences[{}]", index)))?;

            if fence_record.signal_state() == SignalState::Unsignaled {
                self.report_warning(
                    "UNASSIGNED-CoreValidation-MemTrack-FenceState",
                    format!(
                        "{} is waited on, but it is not signaled and has not been submitted \
                        on any queue",
                        fence.erase(),
                    ),
                    &[fence.erase()],
                );
            }
        }

        Ok(())
    }

    /// Records a successful fence wait. A wait that timed out must not be recorded.
    pub fn record_wait_for_fences(&self, fences: &[Id<Fence>], wait_all: bool) {
        if wait_all {
            for &fence in fences {
                self.retire_fence(fence);
            }

            return;
        }

        let mut first_pending = None;

        for &fence in fences {
            match self.get(fence).map(|fence| fence.signal_state()) {
                Ok(SignalState::Signaled) => return,
                Ok(SignalState::Pending { .. }) => {
                    first_pending.get_or_insert(fence);
                }
                _ => (),
            }
        }

        if let Some(fence) = first_pending {
            self.retire_fence(fence);
        }
    }

    /// Retires the submission that signals `fence`, if it is pending.
    fn retire_fence(&self, fence: Id<Fence>) {
        let Ok(fence_record) = self.objects.fences.get(fence) else {
            return;
        };

        // The lock is released before retiring, which locks the fence again.
        let state = fence_record.signal_state();

        if let SignalState::Pending { queue, seq } = state {
            self.retire(queue, seq);
        }
    }

    /// Imports a payload from a POSIX file descriptor into a fence.
    pub fn import_fence_fd(
        &self,
        fence: Id<Fence>,
        import_info: ImportFenceFdInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_import_fence_fd(fence, &import_info))?;
        self.record_import_fence_fd(fence, import_info);

        Ok(())
    }

    pub fn validate_import_fence_fd(
        &self,
        fence: Id<Fence>,
        import_info: &ImportFenceFdInfo,
    ) -> Result<(), Box<ValidationError>> {
        let fence_record = self.lookup(
            fence,
            "import_info.fence",
            &["VUID-VkImportFenceFdInfoKHR-fence-parameter"],
        )?;
        let &ImportFenceFdInfo {
            handle_type,
            temporary,
            _ne: _,
        } = import_info;

        handle_type.validate_device(self).map_err(|err| {
            err.add_context("import_info.handle_type")
                .set_vuids(&["VUID-VkImportFenceFdInfoKHR-handleType-01464"])
        })?;

        if handle_type == ExternalFenceHandleType::SyncFd && !temporary {
            return Err(Box::new(ValidationError {
                problem: "`import_info.handle_type` is `ExternalFenceHandleType::SyncFd`, but \
                    `import_info.temporary` is `false`"
                    .into(),
                vuids: &["VUID-VkImportFenceFdInfoKHR-handleType-07306"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if fence_record.signal_state().is_pending() {
            return Err(Box::new(ValidationError {
                context: "import_info.fence".into(),
                problem: format!(
                    "{} is associated with a queue submission that has not completed",
                    fence.erase(),
                )
                .into(),
                vuids: &["VUID-vkImportFenceFdKHR-fence-01463"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_import_fence_fd(&self, fence: Id<Fence>, import_info: ImportFenceFdInfo) {
        if let Ok(fence_record) = self.objects.fences.get(fence) {
            fence_record
                .state
                .lock()
                .import(SignalState::Signaled, import_info.temporary);

            tracing::trace!(?fence, temporary = import_info.temporary, "imported fence payload");
        }
    }

    /// Exports the payload of a fence to a POSIX file descriptor.
    ///
    /// Exporting to [`ExternalFenceHandleType::SyncFd`] resets the fence.
    pub fn get_fence_fd(
        &self,
        fence: Id<Fence>,
        handle_type: ExternalFenceHandleType,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_get_fence_fd(fence, handle_type))?;
        self.record_get_fence_fd(fence, handle_type);

        Ok(())
    }

    pub fn validate_get_fence_fd(
        &self,
        fence: Id<Fence>,
        handle_type: ExternalFenceHandleType,
    ) -> Result<(), Box<ValidationError>> {
        let fence_record = self.lookup(
            fence,
            "get_fd_info.fence",
            &["VUID-VkFenceGetFdInfoKHR-fence-parameter"],
        )?;

        if !fence_record
            .export_handle_types()
            .contains(handle_type.into())
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`handle_type` {:?} was not included in the export handle types that {} \
                    was created with",
                    handle_type,
                    fence.erase(),
                )
                .into(),
                vuids: &["VUID-VkFenceGetFdInfoKHR-handleType-01453"],
                ..Default::default()
            }));
        }

        if handle_type == ExternalFenceHandleType::SyncFd
            && !fence_record.signal_state().is_signal_outstanding()
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`handle_type` is `ExternalFenceHandleType::SyncFd`, but {} is neither \
                    signaled nor has a pending signal operation",
                    fence.erase(),
                )
                .into(),
                vuids: &["VUID-VkFenceGetFdInfoKHR-handleType-01454"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_get_fence_fd(&self, fence: Id<Fence>, handle_type: ExternalFenceHandleType) {
        if handle_type != ExternalFenceHandleType::SyncFd {
            return;
        }

        if let Ok(fence_record) = self.objects.fences.get(fence) {
            fence_record.reset_payload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExternalFenceHandleType, ExternalFenceHandleTypes, FenceCreateFlags, FenceCreateInfo,
        ImportFenceFdInfo,
    };
    use crate::{
        device::{DeviceExtensions, DeviceFeatures},
        report::Severity,
        sync::SignalState,
    };

    #[test]
    fn create_signaled() {
        let (device, _queue, _log) = test_device!();

        let fence = device
            .create_fence(FenceCreateInfo {
                flags: FenceCreateFlags::SIGNALED,
                ..Default::default()
            })
            .unwrap();
        assert!(device.get_fence_status(fence).unwrap());

        device.reset_fences(&[fence]).unwrap();
        assert!(!device.get_fence_status(fence).unwrap());

        device.destroy_fence(fence).unwrap();
        assert_should_fail!(
            device.get_fence_status(fence),
            "VUID-vkGetFenceStatus-fence-parameter",
        );
    }

    #[test]
    fn wait_on_unsubmitted() {
        let (device, _queue, log) = test_device!();
        let fence = device.create_fence(Default::default()).unwrap();

        device.wait_for_fences(&[fence], true).unwrap();
        assert!(log.contains("UNASSIGNED-CoreValidation-MemTrack-FenceState"));
        assert_eq!(log.count_severity(Severity::Error), 0);

        assert_should_fail!(
            device.wait_for_fences(&[], true),
            "VUID-vkWaitForFences-fenceCount-arraylength",
        );
    }

    #[test]
    fn export_requires_extension() {
        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());

        let err = device
            .create_fence(FenceCreateInfo {
                export_handle_types: ExternalFenceHandleTypes::SYNC_FD,
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is("VUID-VkExportFenceCreateInfo-handleTypes-01446"));
        assert!(err.to_string().contains("khr_external_fence_fd"));
    }

    #[test]
    fn import_temporary() {
        let (device, _queue, _log) = test_device!();
        let fence = device.create_fence(Default::default()).unwrap();

        assert_should_fail!(
            device.import_fence_fd(
                fence,
                ImportFenceFdInfo {
                    handle_type: ExternalFenceHandleType::SyncFd,
                    temporary: false,
                    ..Default::default()
                },
            ),
            "VUID-VkImportFenceFdInfoKHR-handleType-07306",
        );

        device
            .import_fence_fd(
                fence,
                ImportFenceFdInfo {
                    handle_type: ExternalFenceHandleType::SyncFd,
                    temporary: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let fence_record = device.get(fence).unwrap();
        assert!(fence_record.has_temporary_payload());
        assert_eq!(fence_record.signal_state(), SignalState::Signaled);

        // Resetting discards the temporary payload and the permanent one is unsignaled.
        device.reset_fences(&[fence]).unwrap();
        assert!(!fence_record.has_temporary_payload());
        assert_eq!(fence_record.signal_state(), SignalState::Unsignaled);
    }

    #[test]
    fn export_sync_fd() {
        let (device, _queue, _log) = test_device!();
        let fence = device
            .create_fence(FenceCreateInfo {
                flags: FenceCreateFlags::SIGNALED,
                export_handle_types: ExternalFenceHandleTypes::SYNC_FD,
                ..Default::default()
            })
            .unwrap();

        assert_should_fail!(
            device.get_fence_fd(fence, ExternalFenceHandleType::OpaqueFd),
            "VUID-VkFenceGetFdInfoKHR-handleType-01453",
        );

        device
            .get_fence_fd(fence, ExternalFenceHandleType::SyncFd)
            .unwrap();
        assert!(!device.get_fence_status(fence).unwrap());

        // The export reset the fence, so there is nothing left to export.
        assert_should_fail!(
            device.get_fence_fd(fence, ExternalFenceHandleType::SyncFd),
            "VUID-VkFenceGetFdInfoKHR-handleType-01454",
        );
    }
}
