// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! An event provides fine-grained synchronization within a single queue, or from the host to a
//! queue.
//!
//! An event can be set or reset from the host, or by commands of a command buffer. Commands
//! change the state of the event once the command buffer is submitted.

use crate::{device::Device, handle::Id, object::UseCount, ValidationError, ValidationErrorKind};
use parking_lot::Mutex;

/// Parameters to create a new `Event`.
#[derive(Clone, Debug)]
pub struct EventCreateInfo {
    pub _ne: crate::NonExhaustive,
}

impl Default for EventCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// An event, and whether it is set.
#[derive(Debug)]
pub struct Event {
    pub(crate) signaled: Mutex<bool>,
    use_count: UseCount,
}

impl_object!(Event, Event, events);

impl Event {
    /// Returns whether the event is set.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

impl Device {
    /// Creates a new event, in the reset state.
    pub fn create_event(&self, create_info: EventCreateInfo) -> Id<Event> {
        let EventCreateInfo { _ne: _ } = create_info;

        self.objects.events.register(Event {
            signaled: Mutex::new(false),
            use_count: UseCount::default(),
        })
    }

    /// Destroys an event.
    pub fn destroy_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_event(event))?;
        self.record_destroy_event(event);

        Ok(())
    }

    pub fn validate_destroy_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        let event_record = self.lookup(event, "event", &["VUID-vkDestroyEvent-event-parameter"])?;

        if event_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "event".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    event.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyEvent-event-01145"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_event(&self, event: Id<Event>) {
        let _ = self.objects.events.erase(event);
    }

    /// Sets an event from the host.
    pub fn set_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_set_event(event))?;
        self.record_set_event(event, true);

        Ok(())
    }

    pub fn validate_set_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.lookup(event, "event", &["VUID-vkSetEvent-event-parameter"])?;

        Ok(())
    }

    /// Resets an event from the host.
    pub fn reset_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_event(event))?;
        self.record_set_event(event, false);

        Ok(())
    }

    pub fn validate_reset_event(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.lookup(event, "event", &["VUID-vkResetEvent-event-parameter"])?;

        Ok(())
    }

    /// Records a change of the state of an event, from the host or from a submitted command.
    pub fn record_set_event(&self, event: Id<Event>, signaled: bool) {
        if let Ok(event_record) = self.objects.events.get(event) {
            *event_record.signaled.lock() = signaled;
        }
    }

    /// Returns whether an event is set.
    pub fn get_event_status(&self, event: Id<Event>) -> Result<bool, Box<ValidationError>> {
        self.reported(self.validate_get_event_status(event))?;

        Ok(self
            .get(event)
            .map(|event| event.is_signaled())
            .unwrap_or(false))
    }

    pub fn validate_get_event_status(&self, event: Id<Event>) -> Result<(), Box<ValidationError>> {
        self.lookup(event, "event", &["VUID-vkGetEventStatus-event-parameter"])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn host_set_reset() {
        let (device, _queue, _log) = test_device!();
        let event = device.create_event(Default::default());

        assert!(!device.get_event_status(event).unwrap());
        device.set_event(event).unwrap();
        assert!(device.get_event_status(event).unwrap());
        device.reset_event(event).unwrap();
        assert!(!device.get_event_status(event).unwrap());

        device.destroy_event(event).unwrap();
        assert_should_fail!(device.set_event(event), "VUID-vkSetEvent-event-parameter");
        assert_should_fail!(device.destroy_event(event), "VUID-vkDestroyEvent-event-parameter");
    }
}
