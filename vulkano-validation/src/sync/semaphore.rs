// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A semaphore provides synchronization between multiple queues, with non-command buffer
//! commands on the same queue, or between the device and an external source.
//!
//! Only binary semaphores are modelled. Every wait must be matched by a signal that was
//! submitted before it, and a semaphore must not be signaled again while a signal is
//! outstanding. A wait unsignals the payload it observes: a temporary payload is consumed
//! entirely, so the permanent payload becomes current again.

use super::{Payload, SignalState};
use crate::{
    device::Device, handle::Id, object::UseCount, ValidationError, ValidationErrorKind,
};
use parking_lot::Mutex;

vulkan_bitflags! {
    /// The handle types that a semaphore payload can be exported to.
    ExternalSemaphoreHandleTypes = ExternalSemaphoreHandleTypeFlags(u32);

    /// A POSIX file descriptor handle that is only usable with Vulkan and compatible APIs.
    OPAQUE_FD = OPAQUE_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_semaphore_fd)]),
    ]),

    /// A POSIX file descriptor handle to a Linux Sync File or Android Fence object.
    ///
    /// This handle type has *copy transference*.
    SYNC_FD = SYNC_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_semaphore_fd)]),
    ]),
}

vulkan_enum! {
    /// A single handle type that a semaphore payload can be imported from or exported to.
    ExternalSemaphoreHandleType = ExternalSemaphoreHandleTypeFlags(u32);

    OpaqueFd = OPAQUE_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_semaphore_fd)]),
    ]),

    SyncFd = SYNC_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_semaphore_fd)]),
    ]),
}

impl From<ExternalSemaphoreHandleType> for ExternalSemaphoreHandleTypes {
    #[inline]
    fn from(val: ExternalSemaphoreHandleType) -> Self {
        Self(val as u32)
    }
}

/// Parameters to create a new `Semaphore`.
#[derive(Clone, Debug)]
pub struct SemaphoreCreateInfo {
    /// The handle types that can be exported from the semaphore.
    ///
    /// The default value is empty.
    pub export_handle_types: ExternalSemaphoreHandleTypes,

    pub _ne: crate::NonExhaustive,
}

impl Default for SemaphoreCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            export_handle_types: ExternalSemaphoreHandleTypes::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SemaphoreCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        self.export_handle_types
            .validate_device(device)
            .map_err(|err| {
                err.add_context("export_handle_types")
                    .set_vuids(&["VUID-VkExportSemaphoreCreateInfo-handleTypes-01124"])
            })
    }
}

/// Parameters to import a file descriptor into a semaphore.
#[derive(Clone, Debug)]
pub struct ImportSemaphoreFdInfo {
    /// The handle type of the file descriptor.
    ///
    /// The default value is [`ExternalSemaphoreHandleType::OpaqueFd`].
    pub handle_type: ExternalSemaphoreHandleType,

    /// Whether the imported payload only replaces the payload of the semaphore until the next
    /// wait on it.
    ///
    /// The default value is `false`.
    pub temporary: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImportSemaphoreFdInfo {
    #[inline]
    fn default() -> Self {
        Self {
            handle_type: ExternalSemaphoreHandleType::OpaqueFd,
            temporary: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A binary semaphore, and its payload.
#[derive(Debug)]
pub struct Semaphore {
    export_handle_types: ExternalSemaphoreHandleTypes,
    pub(crate) state: Mutex<Payload<SignalState>>,
    use_count: UseCount,
}

impl_object!(Semaphore, Semaphore, semaphores);

impl Semaphore {
    #[inline]
    pub fn export_handle_types(&self) -> ExternalSemaphoreHandleTypes {
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

    /// Performs a wait on the current payload, and returns the state it had.
    pub(crate) fn consume(&self) -> SignalState {
        let mut state = self.state.lock();

        match state.restore_permanent() {
            Some(temporary) => temporary,
            None => std::mem::take(&mut state.permanent),
        }
    }

    /// Starts a signal operation on the current payload.
    pub(crate) fn signal(&self, signal_state: SignalState) {
        *self.state.lock().current_mut() = signal_state;
    }

    /// Completes the signal operation of the given submission, if it is still the one that the
    /// payload is waiting for.
    pub(crate) fn complete_signal(&self, pending: SignalState) {
        let mut state = self.state.lock();

        if state.permanent == pending {
            state.permanent = SignalState::Signaled;
        }

        if let Some(temporary) = &mut state.temporary {
            if *temporary == pending {
                *temporary = SignalState::Signaled;
            }
        }
    }
}

impl Device {
    /// Creates a new semaphore, in the unsignaled state.
    pub fn create_semaphore(
        &self,
        create_info: SemaphoreCreateInfo,
    ) -> Result<Id<Semaphore>, Box<ValidationError>> {
        self.reported(self.validate_create_semaphore(&create_info))?;

        Ok(self.record_create_semaphore(create_info))
    }

    pub fn validate_create_semaphore(
        &self,
        create_info: &SemaphoreCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_semaphore(&self, create_info: SemaphoreCreateInfo) -> Id<Semaphore> {
        let SemaphoreCreateInfo {
            export_handle_types,
            _ne: _,
        } = create_info;

        self.objects.semaphores.register(Semaphore {
            export_handle_types,
            state: Mutex::new(Payload::default()),
            use_count: UseCount::default(),
        })
    }

    /// Destroys a semaphore.
    pub fn destroy_semaphore(&self, semaphore: Id<Semaphore>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_semaphore(semaphore))?;
        self.record_destroy_semaphore(semaphore);

        Ok(())
    }

    pub fn validate_destroy_semaphore(
        &self,
        semaphore: Id<Semaphore>,
    ) -> Result<(), Box<ValidationError>> {
        let semaphore_record = self.lookup(
            semaphore,
            "semaphore",
            &["VUID-vkDestroySemaphore-semaphore-parameter"],
        )?;

        if semaphore_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "semaphore".into(),
                problem: format!(
                    "{} is in use by a queue submission that has not completed",
                    semaphore.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroySemaphore-semaphore-01137"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_semaphore(&self, semaphore: Id<Semaphore>) {
        let _ = self.objects.semaphores.erase(semaphore);
    }

    /// Imports a payload from a POSIX file descriptor into a semaphore.
    ///
    /// The imported payload is considered signaled: the engine cannot observe the object it was
    /// exported from.
    pub fn import_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        import_info: ImportSemaphoreFdInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_import_semaphore_fd(semaphore, &import_info))?;
        self.record_import_semaphore_fd(semaphore, import_info);

        Ok(())
    }

    pub fn validate_import_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        import_info: &ImportSemaphoreFdInfo,
    ) -> Result<(), Box<ValidationError>> {
        let semaphore_record = self.lookup(
            semaphore,
            "import_info.semaphore",
            &["VUID-VkImportSemaphoreFdInfoKHR-semaphore-parameter"],
        )?;
        let &ImportSemaphoreFdInfo {
            handle_type,
            temporary,
            _ne: _,
        } = import_info;

        handle_type.validate_device(self).map_err(|err| {
            err.add_context("import_info.handle_type")
                .set_vuids(&["VUID-VkImportSemaphoreFdInfoKHR-handleType-01143"])
        })?;

        if handle_type == ExternalSemaphoreHandleType::SyncFd && !temporary {
            return Err(Box::new(ValidationError {
                problem: "`import_info.handle_type` is `ExternalSemaphoreHandleType::SyncFd`, \
                    but `import_info.temporary` is `false`"
                    .into(),
                vuids: &["VUID-VkImportSemaphoreFdInfoKHR-handleType-07307"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if semaphore_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "import_info.semaphore".into(),
                problem: format!(
                    "{} is associated with a queue submission that has not completed",
                    semaphore.erase(),
                )
                .into(),
                vuids: &["VUID-vkImportSemaphoreFdKHR-semaphore-01142"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_import_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        import_info: ImportSemaphoreFdInfo,
    ) {
        if let Ok(semaphore_record) = self.objects.semaphores.get(semaphore) {
            semaphore_record
                .state
                .lock()
                .import(SignalState::Signaled, import_info.temporary);

            tracing::trace!(
                ?semaphore,
                temporary = import_info.temporary,
                "imported semaphore payload",
            );
        }
    }

    /// Exports the payload of a semaphore to a POSIX file descriptor.
    ///
    /// Exporting to [`ExternalSemaphoreHandleType::SyncFd`] unsignals the semaphore.
    pub fn get_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        handle_type: ExternalSemaphoreHandleType,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_get_semaphore_fd(semaphore, handle_type))?;
        self.record_get_semaphore_fd(semaphore, handle_type);

        Ok(())
    }

    pub fn validate_get_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        handle_type: ExternalSemaphoreHandleType,
    ) -> Result<(), Box<ValidationError>> {
        let semaphore_record = self.lookup(
            semaphore,
            "get_fd_info.semaphore",
            &["VUID-VkSemaphoreGetFdInfoKHR-semaphore-parameter"],
        )?;

        if !semaphore_record
            .export_handle_types()
            .contains(handle_type.into())
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`handle_type` {:?} was not included in the export handle types that {} \
                    was created with",
                    handle_type,
                    semaphore.erase(),
                )
                .into(),
                vuids: &["VUID-VkSemaphoreGetFdInfoKHR-handleType-01132"],
                ..Default::default()
            }));
        }

        if handle_type == ExternalSemaphoreHandleType::SyncFd
            && !semaphore_record.signal_state().is_signal_outstanding()
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`handle_type` is `ExternalSemaphoreHandleType::SyncFd`, but {} is neither \
                    signaled nor has a pending signal operation",
                    semaphore.erase(),
                )
                .into(),
                vuids: &["VUID-VkSemaphoreGetFdInfoKHR-handleType-01136"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_get_semaphore_fd(
        &self,
        semaphore: Id<Semaphore>,
        handle_type: ExternalSemaphoreHandleType,
    ) {
        if handle_type != ExternalSemaphoreHandleType::SyncFd {
            return;
        }

        // Copy transference: the export acts as a wait.
        if let Ok(semaphore_record) = self.objects.semaphores.get(semaphore) {
            semaphore_record.consume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExternalSemaphoreHandleType, ExternalSemaphoreHandleTypes, ImportSemaphoreFdInfo,
        SemaphoreCreateInfo,
    };
    use crate::sync::SignalState;

    #[test]
    fn temporary_payload_consumed() {
        let (device, _queue, _log) = test_device!();
        let semaphore = device.create_semaphore(Default::default()).unwrap();
        let semaphore_record = device.get(semaphore).unwrap();

        device
            .import_semaphore_fd(
                semaphore,
                ImportSemaphoreFdInfo {
                    handle_type: ExternalSemaphoreHandleType::SyncFd,
                    temporary: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(semaphore_record.has_temporary_payload());
        assert_eq!(semaphore_record.signal_state(), SignalState::Signaled);

        assert_eq!(semaphore_record.consume(), SignalState::Signaled);
        assert!(!semaphore_record.has_temporary_payload());
        assert_eq!(semaphore_record.signal_state(), SignalState::Unsignaled);
    }

    #[test]
    fn sync_fd_import_must_be_temporary() {
        let (device, _queue, _log) = test_device!();
        let semaphore = device.create_semaphore(Default::default()).unwrap();

        assert_should_fail!(
            device.import_semaphore_fd(
                semaphore,
                ImportSemaphoreFdInfo {
                    handle_type: ExternalSemaphoreHandleType::SyncFd,
                    ..Default::default()
                },
            ),
            "VUID-VkImportSemaphoreFdInfoKHR-handleType-07307",
        );

        // A permanent import replaces the permanent payload.
        device
            .import_semaphore_fd(semaphore, Default::default())
            .unwrap();
        let semaphore_record = device.get(semaphore).unwrap();
        assert!(!semaphore_record.has_temporary_payload());
        assert_eq!(semaphore_record.signal_state(), SignalState::Signaled);
    }

    #[test]
    fn export() {
        let (device, _queue, _log) = test_device!();
        let semaphore = device
            .create_semaphore(SemaphoreCreateInfo {
                export_handle_types: ExternalSemaphoreHandleTypes::SYNC_FD,
                ..Default::default()
            })
            .unwrap();

        assert_should_fail!(
            device.get_semaphore_fd(semaphore, ExternalSemaphoreHandleType::OpaqueFd),
            "VUID-VkSemaphoreGetFdInfoKHR-handleType-01132",
        );
        assert_should_fail!(
            device.get_semaphore_fd(semaphore, ExternalSemaphoreHandleType::SyncFd),
            "VUID-VkSemaphoreGetFdInfoKHR-handleType-01136",
        );

        device
            .get(semaphore)
            .unwrap()
            .signal(SignalState::Signaled);
        device
            .get_semaphore_fd(semaphore, ExternalSemaphoreHandleType::SyncFd)
            .unwrap();
        assert_eq!(
            device.get(semaphore).unwrap().signal_state(),
            SignalState::Unsignaled,
        );
    }
}
