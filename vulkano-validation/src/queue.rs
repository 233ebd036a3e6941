// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Queues, and the submissions that are in flight on them.
//!
//! Each queue keeps the submissions that have not been retired yet, in submission order. A
//! submission is retired when the host learns that it has completed: a successful fence wait or
//! fence status query, or an idle wait on the queue or the device. Retiring a submission also
//! retires every earlier submission of the same queue, and the submissions on other queues that
//! signaled the semaphores it waited on.
//!
//! While a submission is in flight, every object that it refers to has its use count raised.
//! Such objects cannot be destroyed, freed or reset.

use crate::{
    command_buffer::{CommandBuffer, SubmittedCommands},
    device::Device,
    handle::Id,
    object::{ObjectRef, UseCount},
    query::QueryOverlay,
    sync::{fence::Fence, semaphore::Semaphore, SignalState},
    ValidationError,
};
use foldhash::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::VecDeque;

vulkan_bitflags! {
    /// Attributes of a queue or queue family.
    QueueFlags = QueueFlags(u32);

    /// Queues of this family can execute graphics operations.
    GRAPHICS = GRAPHICS,

    /// Queues of this family can execute compute operations.
    COMPUTE = COMPUTE,

    /// Queues of this family can execute transfer operations.
    TRANSFER = TRANSFER,

    /// Queues of this family can execute sparse memory management operations.
    SPARSE_BINDING = SPARSE_BINDING,
}

/// Properties of a queue family in a physical device.
#[derive(Clone, Debug)]
pub struct QueueFamilyProperties {
    /// Attributes of the queue family.
    pub queue_flags: QueueFlags,

    /// The number of queues available in this family.
    ///
    /// This guaranteed to be at least 1 (or else that family wouldn't exist).
    pub queue_count: u32,
}

/// A queue of a device.
#[derive(Debug)]
pub struct Queue {
    queue_family_index: u32,
    queue_index: u32,
    state: Mutex<QueueState>,
    use_count: UseCount,
}

impl_object!(Queue, Queue, queues);

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    // Ordered by `seq`.
    submissions: VecDeque<Submission>,
}

#[derive(Debug)]
struct Submission {
    seq: u64,
    command_buffers: SmallVec<[Id<CommandBuffer>; 4]>,
    // Each wait, with the submission that was going to signal the semaphore, if any.
    waits: SmallVec<[(Id<Semaphore>, Option<(Id<Queue>, u64)>); 4]>,
    signal_semaphores: SmallVec<[Id<Semaphore>; 4]>,
    fence: Option<Id<Fence>>,
    used: Vec<ObjectRef>,
}

impl Queue {
    pub(crate) fn new(queue_family_index: u32, queue_index: u32) -> Self {
        Queue {
            queue_family_index,
            queue_index,
            state: Mutex::new(QueueState::default()),
            use_count: UseCount::default(),
        }
    }

    /// Returns the index of the queue family that this queue belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the index of this queue within its queue family.
    #[inline]
    pub fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Returns the number of submissions that have not been retired.
    #[inline]
    pub fn pending_submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }
}

/// Parameters for a single batch of a queue submission.
#[derive(Clone, Debug)]
pub struct SubmitInfo {
    /// The semaphores to wait for before beginning the execution of this batch of
    /// command buffer operations.
    ///
    /// The default value is empty.
    pub wait_semaphores: Vec<Id<Semaphore>>,

    /// The command buffers to execute.
    ///
    /// The default value is empty.
    pub command_buffers: Vec<Id<CommandBuffer>>,

    /// The semaphores to signal after the execution of this batch of command buffer operations
    /// has completed.
    ///
    /// The default value is empty.
    pub signal_semaphores: Vec<Id<Semaphore>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubmitInfo {
    #[inline]
    fn default() -> Self {
        Self {
            wait_semaphores: Vec::new(),
            command_buffers: Vec::new(),
            signal_semaphores: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SubmitInfo {
    /// Returns a `SubmitInfo` that executes `command_buffers` without any semaphores.
    #[inline]
    pub fn command_buffers(command_buffers: impl IntoIterator<Item = Id<CommandBuffer>>) -> Self {
        Self {
            command_buffers: command_buffers.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl Device {
    /// Submits batches of command buffers to a queue.
    ///
    /// If `fence` is given, it is signaled once all the batches have completed.
    pub fn queue_submit(
        &self,
        queue: Id<Queue>,
        submit_infos: &[SubmitInfo],
        fence: Option<Id<Fence>>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_queue_submit(queue, submit_infos, fence))?;
        self.record_queue_submit(queue, submit_infos, fence);

        Ok(())
    }

    /// Checks a queue submission.
    ///
    /// The batches are checked in order, as if each earlier batch had been submitted already:
    /// a batch can wait on a semaphore that an earlier batch of the same call signals.
    ///
    /// A command buffer that refers to a destroyed object, or to a descriptor set that was
    /// updated after it was bound, is marked invalid by this check.
    pub fn validate_queue_submit(
        &self,
        queue: Id<Queue>,
        submit_infos: &[SubmitInfo],
        fence: Option<Id<Fence>>,
    ) -> Result<(), Box<ValidationError>> {
        let queue_record = self.lookup(queue, "queue", &["VUID-vkQueueSubmit-queue-parameter"])?;

        if let Some(fence) = fence {
            let fence_record =
                self.lookup(fence, "fence", &["VUID-vkQueueSubmit-fence-parameter"])?;

            match fence_record.signal_state() {
                SignalState::Signaled => {
                    return Err(Box::new(ValidationError {
                        context: "fence".into(),
                        problem: format!(
                            "{} is already in the signaled state; it must be reset first",
                            fence.erase(),
                        )
                        .into(),
                        vuids: &["VUID-vkQueueSubmit-fence-00063"],
                        ..Default::default()
                    }));
                }
                SignalState::Pending { .. } => {
                    return Err(Box::new(ValidationError {
                        context: "fence".into(),
                        problem: format!(
                            "{} is already in use by another submission",
                            fence.erase(),
                        )
                        .into(),
                        vuids: &["VUID-vkQueueSubmit-fence-00064"],
                        ..Default::default()
                    }));
                }
                SignalState::Unsignaled => (),
            }
        }

        // Whether each semaphore touched so far has an outstanding signal.
        let mut semaphores: HashMap<Id<Semaphore>, bool> = HashMap::default();
        let mut submitted: SmallVec<[Id<CommandBuffer>; 8]> = SmallVec::new();
        let mut queries = QueryOverlay::default();

        for (index, submit_info) in submit_infos.iter().enumerate() {
            let SubmitInfo {
                wait_semaphores,
                command_buffers,
                signal_semaphores,
                _ne: _,
            } = submit_info;

            for (semaphore_index, &semaphore) in wait_semaphores.iter().enumerate() {
                let context =
                    || format!("submit_infos[{}].wait_semaphores[{}]", index, semaphore_index);
                let semaphore_record = self
                    .lookup(
                        semaphore,
                        "",
                        &["VUID-VkSubmitInfo-pWaitSemaphores-parameter"],
                    )
                    .map_err(|err| err.add_context(context()))?;
                let outstanding = semaphores
                    .get(&semaphore)
                    .copied()
                    .unwrap_or_else(|| semaphore_record.signal_state().is_signal_outstanding());

                if !outstanding {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: format!(
                            "{} is waiting on {} that has no way to be signaled",
                            queue.erase(),
                            semaphore.erase(),
                        )
                        .into(),
                        vuids: &["VUID-vkQueueSubmit-pWaitSemaphores-03238"],
                        ..Default::default()
                    }));
                }

                semaphores.insert(semaphore, false);
            }

            for (command_buffer_index, &command_buffer) in command_buffers.iter().enumerate() {
                self.validate_command_buffer_submit(
                    command_buffer,
                    queue_record.queue_family_index,
                    &submitted,
                    &mut queries,
                )
                .map_err(|err| {
                    err.add_context(format!(
                        "submit_infos[{}].command_buffers[{}]",
                        index, command_buffer_index,
                    ))
                })?;
                submitted.push(command_buffer);
            }

            for (semaphore_index, &semaphore) in signal_semaphores.iter().enumerate() {
                let context =
                    || format!("submit_infos[{}].signal_semaphores[{}]", index, semaphore_index);
                let semaphore_record = self
                    .lookup(
                        semaphore,
                        "",
                        &["VUID-VkSubmitInfo-pSignalSemaphores-parameter"],
                    )
                    .map_err(|err| err.add_context(context()))?;
                let outstanding = semaphores
                    .get(&semaphore)
                    .copied()
                    .unwrap_or_else(|| semaphore_record.signal_state().is_signal_outstanding());

                if outstanding {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: format!(
                            "{} is signaling {} that was previously signaled but has not since \
                            been waited on by any queue",
                            queue.erase(),
                            semaphore.erase(),
                        )
                        .into(),
                        vuids: &["VUID-vkQueueSubmit-pSignalSemaphores-00067"],
                        ..Default::default()
                    }));
                }

                semaphores.insert(semaphore, true);
            }
        }

        Ok(())
    }

    pub fn record_queue_submit(
        &self,
        queue: Id<Queue>,
        submit_infos: &[SubmitInfo],
        fence: Option<Id<Fence>>,
    ) {
        let Ok(queue_record) = self.objects.queues.get(queue) else {
            return;
        };

        // A fence without any batch still needs a submission to be signaled by.
        let empty = [SubmitInfo::default()];
        let submit_infos = if submit_infos.is_empty() && fence.is_some() {
            &empty[..]
        } else {
            submit_infos
        };

        let first_seq = {
            let mut state = queue_record.state.lock();
            let first_seq = state.next_seq;
            state.next_seq += submit_infos.len() as u64;

            first_seq
        };

        let mut queries = QueryOverlay::default();
        let mut submissions = Vec::with_capacity(submit_infos.len());

        for (seq, submit_info) in (first_seq..).zip(submit_infos) {
            let SubmitInfo {
                wait_semaphores,
                command_buffers,
                signal_semaphores,
                _ne: _,
            } = submit_info;

            let pending = SignalState::Pending { queue, seq };
            let mut used = Vec::new();
            let mut waits = SmallVec::new();

            for &semaphore in wait_semaphores {
                if let Ok(semaphore_record) = self.objects.semaphores.get(semaphore) {
                    let signaler = match semaphore_record.consume() {
                        SignalState::Pending { queue, seq } => Some((queue, seq)),
                        _ => None,
                    };
                    waits.push((semaphore, signaler));
                    used.push(semaphore.erase());
                }
            }

            for &command_buffer in command_buffers {
                let SubmittedCommands {
                    used: command_buffer_used,
                    query_ops,
                    event_ops,
                } = self.record_command_buffer_submit(command_buffer);

                used.extend(command_buffer_used);
                let _ = self.simulate_query_ops(command_buffer, &query_ops, &mut queries);

                for (event, signaled) in event_ops {
                    self.record_set_event(event, signaled);
                }
            }

            for &semaphore in signal_semaphores {
                if let Ok(semaphore_record) = self.objects.semaphores.get(semaphore) {
                    semaphore_record.signal(pending);
                    used.push(semaphore.erase());
                }
            }

            let is_last = seq == first_seq + submit_infos.len() as u64 - 1;
            let fence = fence.filter(|_| is_last);

            if let Some(fence) = fence {
                if let Ok(fence_record) = self.objects.fences.get(fence) {
                    *fence_record.state.lock().current_mut() = pending;
                    used.push(fence.erase());
                }
            }

            for &object in &used {
                if let Some(tracked) = self.tracked(object) {
                    tracked.uses().increment();
                }
            }

            submissions.push(Submission {
                seq,
                command_buffers: command_buffers.iter().copied().collect(),
                waits,
                signal_semaphores: signal_semaphores.iter().copied().collect(),
                fence,
                used,
            });
        }

        self.commit_query_overlay(queries);

        tracing::debug!(
            queue = ?queue.erase(),
            first_seq,
            batches = submissions.len(),
            "submitted",
        );

        let mut state = queue_record.state.lock();

        for submission in submissions {
            let position = state
                .submissions
                .partition_point(|other| other.seq < submission.seq);
            state.submissions.insert(position, submission);
        }
    }

    /// Retires the submission `seq` of `queue`, every earlier submission of that queue, and
    /// the submissions that they depend on through semaphores.
    pub(crate) fn retire(&self, queue: Id<Queue>, seq: u64) {
        let mut work = vec![(queue, seq)];

        while let Some((queue, seq)) = work.pop() {
            let Ok(queue_record) = self.objects.queues.get(queue) else {
                continue;
            };

            let retired: Vec<Submission> = {
                let mut state = queue_record.state.lock();
                let count = state.submissions.partition_point(|submission| submission.seq <= seq);

                state.submissions.drain(..count).collect()
            };

            for submission in retired {
                tracing::trace!(queue = ?queue.erase(), seq = submission.seq, "retired");

                work.extend(submission.waits.iter().filter_map(|&(_, signaler)| signaler));

                for &object in &submission.used {
                    if let Some(tracked) = self.tracked(object) {
                        tracked.uses().decrement();
                    }
                }

                let pending = SignalState::Pending {
                    queue,
                    seq: submission.seq,
                };

                for &semaphore in &submission.signal_semaphores {
                    if let Ok(semaphore_record) = self.objects.semaphores.get(semaphore) {
                        semaphore_record.complete_signal(pending);
                    }
                }

                if let Some(fence) = submission.fence {
                    if let Ok(fence_record) = self.objects.fences.get(fence) {
                        let mut state = fence_record.state.lock();

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

                for &command_buffer in &submission.command_buffers {
                    self.retire_command_buffer(command_buffer);
                }
            }
        }
    }

    /// Waits until all submissions of a queue have completed, and retires them.
    pub fn queue_wait_idle(&self, queue: Id<Queue>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_queue_wait_idle(queue))?;
        self.record_queue_wait_idle(queue);

        Ok(())
    }

    pub fn validate_queue_wait_idle(&self, queue: Id<Queue>) -> Result<(), Box<ValidationError>> {
        self.lookup(queue, "queue", &["VUID-vkQueueWaitIdle-queue-parameter"])?;

        Ok(())
    }

    pub fn record_queue_wait_idle(&self, queue: Id<Queue>) {
        self.retire(queue, u64::MAX);
    }

    /// Waits until all submissions of all queues of the device have completed, and retires
    /// them.
    pub fn device_wait_idle(&self) {
        for queue in self.queues() {
            self.retire(queue, u64::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SubmitInfo;
    use crate::{
        buffer::BufferUsage,
        command_buffer::{
            CommandBufferBeginInfo, CommandBufferState, CommandBufferUsage,
            CommandPoolCreateFlags,
        },
        descriptor_set::{
            DescriptorPoolCreateInfo, DescriptorSetAllocateInfo, DescriptorSetLayoutBinding,
            DescriptorSetLayoutCreateInfo, DescriptorType, WriteDescriptorSet,
        },
        pipeline::{PipelineBindPoint, PipelineCreateInfo},
        query::{QueryPoolCreateInfo, QueryState, QueryType},
        sync::SignalState,
        tests::{bound_buffer, command_buffer, recorded_copy},
        ValidationErrorKind,
    };

    #[test]
    fn fence_reuse() {
        let (device, queue, _log) = test_device!();
        let fence = device.create_fence(Default::default()).unwrap();

        device.queue_submit(queue, &[], Some(fence)).unwrap();
        assert!(device.get(fence).unwrap().signal_state().is_pending());
        assert_should_fail!(
            device.queue_submit(queue, &[], Some(fence)),
            "VUID-vkQueueSubmit-fence-00064",
        );
        assert_should_fail!(
            device.reset_fences(&[fence]),
            "VUID-vkResetFences-pFences-01123",
        );
        assert!(!device.get_fence_status(fence).unwrap());

        device.wait_for_fences(&[fence], true).unwrap();
        assert!(device.get_fence_status(fence).unwrap());
        assert_should_fail!(
            device.queue_submit(queue, &[], Some(fence)),
            "VUID-vkQueueSubmit-fence-00063",
        );

        device.reset_fences(&[fence]).unwrap();
        device.queue_submit(queue, &[], Some(fence)).unwrap();
        device.queue_wait_idle(queue).unwrap();
        assert_eq!(
            device.get(fence).unwrap().signal_state(),
            SignalState::Signaled
        );
    }

    #[test]
    fn semaphore_forward_progress() {
        let (device, queue, _log) = test_device!();
        let semaphore = device.create_semaphore(Default::default()).unwrap();

        assert_should_fail!(
            device.queue_submit(
                queue,
                &[SubmitInfo {
                    wait_semaphores: vec![semaphore],
                    ..Default::default()
                }],
                None,
            ),
            "VUID-vkQueueSubmit-pWaitSemaphores-03238",
        );

        // Signaling twice without a wait in between cannot make progress, even within a call.
        assert_should_fail!(
            device.queue_submit(
                queue,
                &[
                    SubmitInfo {
                        signal_semaphores: vec![semaphore],
                        ..Default::default()
                    },
                    SubmitInfo {
                        signal_semaphores: vec![semaphore],
                        ..Default::default()
                    },
                ],
                None,
            ),
            "VUID-vkQueueSubmit-pSignalSemaphores-00067",
        );
        assert_eq!(
            device.get(semaphore).unwrap().signal_state(),
            SignalState::Unsignaled
        );

        // A later batch sees the signal of an earlier one.
        device
            .queue_submit(
                queue,
                &[
                    SubmitInfo {
                        signal_semaphores: vec![semaphore],
                        ..Default::default()
                    },
                    SubmitInfo {
                        wait_semaphores: vec![semaphore],
                        ..Default::default()
                    },
                ],
                None,
            )
            .unwrap();
        assert_eq!(
            device.get(semaphore).unwrap().signal_state(),
            SignalState::Unsignaled
        );
        assert_should_fail!(
            device.destroy_semaphore(semaphore),
            "VUID-vkDestroySemaphore-semaphore-01137",
        );

        device.device_wait_idle();
        device.destroy_semaphore(semaphore).unwrap();
    }

    #[test]
    fn semaphore_signaled_by_two_submits() {
        let (device, queue, _log) = test_device!();
        let semaphore = device.create_semaphore(Default::default()).unwrap();
        let signal = SubmitInfo {
            signal_semaphores: vec![semaphore],
            ..Default::default()
        };

        device
            .queue_submit(queue, std::slice::from_ref(&signal), None)
            .unwrap();
        let pending = device.get(semaphore).unwrap().signal_state();
        assert!(pending.is_pending());

        assert_should_fail!(
            device.queue_submit(queue, std::slice::from_ref(&signal), None),
            "VUID-vkQueueSubmit-pSignalSemaphores-00067",
        );
        assert_eq!(device.get(semaphore).unwrap().signal_state(), pending);

        // A wait consumes the pending signal, after which it can be signaled again.
        device
            .queue_submit(
                queue,
                &[SubmitInfo {
                    wait_semaphores: vec![semaphore],
                    ..Default::default()
                }],
                None,
            )
            .unwrap();
        device
            .queue_submit(queue, std::slice::from_ref(&signal), None)
            .unwrap();
    }

    #[test]
    fn one_time_submit() {
        let (device, queue, _log) = test_device!();
        let (cb, _) = recorded_copy(&device, CommandBufferUsage::ONE_TIME_SUBMIT);
        let submit = || device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None);

        submit().unwrap();
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Pending);
        assert_should_fail!(
            submit(),
            "UNASSIGNED-CoreValidation-DrawState-CommandBufferSingleSubmitViolation",
        );

        device.queue_wait_idle(queue).unwrap();
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Invalid);
        assert_should_fail!(
            submit(),
            "UNASSIGNED-CoreValidation-DrawState-CommandBufferSingleSubmitViolation",
        );

        // Re-recording makes it submittable again.
        device
            .begin_command_buffer(
                cb,
                CommandBufferBeginInfo::usage(CommandBufferUsage::ONE_TIME_SUBMIT),
            )
            .unwrap();
        device.end_command_buffer(cb).unwrap();
        submit().unwrap();
    }

    #[test]
    fn simultaneous_use() {
        let (device, queue, _log) = test_device!();
        let (cb, _) = recorded_copy(&device, CommandBufferUsage::empty());
        let (simultaneous, _) = recorded_copy(&device, CommandBufferUsage::SIMULTANEOUS_USE);

        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb, cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00071",
        );

        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00071",
        );

        device
            .queue_submit(
                queue,
                &[SubmitInfo::command_buffers([simultaneous, simultaneous])],
                None,
            )
            .unwrap();
        assert_eq!(device.get(simultaneous).unwrap().pending_count(), 2);

        device.queue_wait_idle(queue).unwrap();
        assert_eq!(
            device.get(simultaneous).unwrap().state(),
            CommandBufferState::Executable
        );
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Executable);
    }

    #[test]
    fn submit_wrong_state() {
        let (device, queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let other_family = device.queue(1, 0).unwrap();

        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00070",
        );

        device.begin_command_buffer(cb, Default::default()).unwrap();
        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00070",
        );

        device.end_command_buffer(cb).unwrap();
        assert_should_fail!(
            device.queue_submit(other_family, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00074",
        );
        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
    }

    #[test]
    fn dangling_dependency() {
        let (device, queue, log) = test_device!();
        let (cb, src) = recorded_copy(&device, CommandBufferUsage::empty());

        // Destroying a recorded dependency is allowed; submitting afterward is not.
        device.destroy_buffer(src).unwrap();

        let err = device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap_err();
        assert!(err.is("VUID-vkQueueSubmit-pCommandBuffers-00070"));
        assert_eq!(err.kind, ValidationErrorKind::Lifetime);
        assert_eq!(err.context, "submit_infos[0].command_buffers[0]");
        assert!(log.contains_message(
            "VUID-vkQueueSubmit-pCommandBuffers-00070",
            &format!("is invalid because bound {} was destroyed", src.erase()),
        ));
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Invalid);

        // Once invalidated, the command buffer keeps being refused for the same reason.
        let err = device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Lifetime);

        // Destroying after completion, and re-recording before the next submission, is fine.
        let (cb, src) = recorded_copy(&device, CommandBufferUsage::empty());
        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
        device.queue_wait_idle(queue).unwrap();
        device.destroy_buffer(src).unwrap();
        device.reset_command_buffer(cb).unwrap();
        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.end_command_buffer(cb).unwrap();
        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
    }

    #[test]
    fn refused_in_use_destroy() {
        let (device, queue, _log) = test_device!();
        let (cb, src) = recorded_copy(&device, CommandBufferUsage::empty());
        let memory = device.get(src).unwrap().memory().unwrap().memory;
        let pool = device.get(cb).unwrap().pool();

        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();

        let err = device.destroy_buffer(src).unwrap_err();
        assert!(err.is("VUID-vkDestroyBuffer-buffer-00922"));
        assert_eq!(err.kind, ValidationErrorKind::Lifetime);
        assert_should_fail!(device.free_memory(memory), "VUID-vkFreeMemory-memory-00677");
        assert_should_fail!(
            device.free_command_buffers(pool, &[cb]),
            "VUID-vkFreeCommandBuffers-pCommandBuffers-00047",
        );
        assert!(device.get(src).is_ok());

        device.device_wait_idle();
        assert_eq!(device.tracked(src.erase()).unwrap().uses().get(), 0);
        device.destroy_buffer(src).unwrap();
        device.free_memory(memory).unwrap();
        device.free_command_buffers(pool, &[cb]).unwrap();
    }

    #[test]
    fn transitive_retirement() {
        let (device, queue, _log) = test_device!();
        let other_queue = device.queue(0, 1).unwrap();
        let (cb, src) = recorded_copy(&device, CommandBufferUsage::empty());
        let semaphore = device.create_semaphore(Default::default()).unwrap();
        let fence = device.create_fence(Default::default()).unwrap();

        device
            .queue_submit(
                queue,
                &[SubmitInfo {
                    command_buffers: vec![cb],
                    signal_semaphores: vec![semaphore],
                    ..Default::default()
                }],
                None,
            )
            .unwrap();
        device
            .queue_submit(
                other_queue,
                &[SubmitInfo {
                    wait_semaphores: vec![semaphore],
                    ..Default::default()
                }],
                Some(fence),
            )
            .unwrap();
        assert_eq!(device.get(queue).unwrap().pending_submission_count(), 1);

        // The wait on the second queue implies completion of the first submission.
        device.wait_for_fences(&[fence], true).unwrap();
        assert_eq!(device.get(queue).unwrap().pending_submission_count(), 0);
        assert_eq!(device.get(other_queue).unwrap().pending_submission_count(), 0);
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Executable);
        assert!(!device.tracked(src.erase()).unwrap().uses().is_in_use());
        device.destroy_semaphore(semaphore).unwrap();
    }

    #[test]
    fn events_take_effect_at_submit() {
        let (device, queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let event = device.create_event(Default::default());

        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.cmd_set_event(cb, event).unwrap();
        device.end_command_buffer(cb).unwrap();
        assert!(!device.get_event_status(event).unwrap());

        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
        assert!(device.get_event_status(event).unwrap());
        assert_should_fail!(
            device.destroy_event(event),
            "VUID-vkDestroyEvent-event-01145",
        );
    }

    #[test]
    fn queries_need_reset_between_submissions() {
        let (device, queue, _log) = test_device!();
        let query_pool = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 1,
                ..QueryPoolCreateInfo::query_type(QueryType::Timestamp)
            })
            .unwrap();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());

        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.cmd_write_timestamp(cb, query_pool, 0).unwrap();
        device.end_command_buffer(cb).unwrap();

        device
            .queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None)
            .unwrap();
        assert_eq!(
            device.get(query_pool).unwrap().query_state(0),
            Some(QueryState::Available)
        );

        device.queue_wait_idle(queue).unwrap();
        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkCmdWriteTimestamp-None-00830",
        );
    }

    #[test]
    fn descriptor_set_updated_after_bind() {
        let (device, queue, log) = test_device!();
        let layout = device
            .create_descriptor_set_layout(DescriptorSetLayoutCreateInfo {
                bindings: vec![DescriptorSetLayoutBinding::new(
                    0,
                    DescriptorType::UniformBuffer,
                    1,
                )],
                ..Default::default()
            })
            .unwrap();
        let pipeline = device
            .create_pipeline(PipelineCreateInfo {
                set_layouts: vec![layout],
                ..Default::default()
            })
            .unwrap();
        let pool = device
            .create_descriptor_pool(DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [(DescriptorType::UniformBuffer, 1)].into_iter().collect(),
                ..Default::default()
            })
            .unwrap();
        let set = device
            .allocate_descriptor_sets(DescriptorSetAllocateInfo {
                descriptor_pool: pool,
                set_layouts: vec![layout],
                ..Default::default()
            })
            .unwrap()[0];
        let buffer = bound_buffer(&device, BufferUsage::UNIFORM_BUFFER, 256);
        let write = || {
            device.update_descriptor_sets(&[WriteDescriptorSet::buffer(
                set,
                0,
                DescriptorType::UniformBuffer,
                buffer,
                0,
                256,
            )])
        };
        write().unwrap();

        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        device.begin_command_buffer(cb, Default::default()).unwrap();
        device
            .cmd_bind_descriptor_sets(cb, PipelineBindPoint::Graphics, pipeline, 0, &[set], &[])
            .unwrap();
        device.end_command_buffer(cb).unwrap();

        write().unwrap();

        assert_should_fail!(
            device.queue_submit(queue, &[SubmitInfo::command_buffers([cb])], None),
            "VUID-vkQueueSubmit-pCommandBuffers-00070",
        );
        assert!(log.contains_message(
            "VUID-vkQueueSubmit-pCommandBuffers-00070",
            "was updated after it was bound",
        ));
    }
}
