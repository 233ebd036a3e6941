// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Command pools, command buffers, and the state machine of command buffers.
//!
//! A command buffer goes through the following states:
//!
//! - **Initial**: after allocation or reset. Nothing is recorded.
//! - **Recording**: between `begin_command_buffer` and `end_command_buffer`. Commands can only be
//!   recorded in this state.
//! - **Executable**: recording has ended. The command buffer can be submitted.
//! - **Pending**: submitted to a queue, and the submission has not been retired yet. A pending
//!   command buffer must not be reset, freed or re-recorded.
//! - **Invalid**: an object that a recorded command refers to was destroyed, a descriptor set
//!   that was bound was updated, or a one-time-submit command buffer completed. It must be reset
//!   or re-recorded before it can be submitted again.
//!
//! Every object that a recorded command refers to is added to the *in-use set* of the command
//! buffer. Destroying such an object is not an error by itself; it is detected when the command
//! buffer is submitted, at which point the command buffer becomes invalid.
//!
//! The typed commands are in the [`commands`] module.

use crate::{
    descriptor_set::DescriptorSet,
    device::Device,
    handle::Id,
    object::{ObjectRef, UseCount},
    pipeline::{Pipeline, PipelineBindPoint},
    query::{QueryOp, QueryOverlay, QueryPool, QueryType},
    queue::QueueFlags,
    sync::event::Event,
    ValidationError, ValidationErrorKind,
};
use foldhash::HashMap;
use indexmap::IndexSet;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

pub mod commands;

vulkan_bitflags! {
    /// Additional properties of the command buffers allocated from a command pool.
    CommandPoolCreateFlags = CommandPoolCreateFlags(u32);

    /// A hint that the command buffers are short-lived.
    TRANSIENT = TRANSIENT,

    /// The command buffers can be reset individually, and are reset implicitly when they are
    /// begun again.
    RESET_COMMAND_BUFFER = RESET_COMMAND_BUFFER,
}

/// Parameters to create a new `CommandPool`.
#[derive(Clone, Debug)]
pub struct CommandPoolCreateInfo {
    /// Additional properties of the command pool.
    ///
    /// The default value is empty.
    pub flags: CommandPoolCreateFlags,

    /// The index of the queue family that the command buffers will be submitted to.
    ///
    /// The default value is `0`.
    pub queue_family_index: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: CommandPoolCreateFlags::empty(),
            queue_family_index: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandPoolCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags: _,
            queue_family_index,
            _ne: _,
        } = self;

        if queue_family_index as usize >= device.queue_family_properties().len() {
            return Err(Box::new(ValidationError {
                context: "queue_family_index".into(),
                problem: "is not less than the number of queue families in the physical device"
                    .into(),
                vuids: &["VUID-vkCreateCommandPool-queueFamilyIndex-01937"],
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// A pool that command buffers are allocated from.
#[derive(Debug)]
pub struct CommandPool {
    flags: CommandPoolCreateFlags,
    queue_family_index: u32,
    command_buffers: Mutex<IndexSet<Id<CommandBuffer>, foldhash::fast::RandomState>>,
    use_count: UseCount,
}

impl_object!(CommandPool, CommandPool, command_pools);

impl CommandPool {
    #[inline]
    pub fn flags(&self) -> CommandPoolCreateFlags {
        self.flags
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the command buffers that are currently allocated from the pool.
    pub fn command_buffers(&self) -> Vec<Id<CommandBuffer>> {
        self.command_buffers.lock().iter().copied().collect()
    }
}

vulkan_enum! {
    /// The level of a command buffer.
    CommandBufferLevel = CommandBufferLevel(i32);

    /// A primary command buffer can be submitted to a queue.
    Primary = PRIMARY,

    /// A secondary command buffer can only be executed from a primary command buffer.
    Secondary = SECONDARY,
}

/// Parameters to allocate new command buffers.
#[derive(Clone, Debug)]
pub struct CommandBufferAllocateInfo {
    /// The pool to allocate from.
    ///
    /// The default value is [`Id::NULL`], which must be overridden.
    pub command_pool: Id<CommandPool>,

    /// The level of the command buffers to allocate.
    ///
    /// The default value is `CommandBufferLevel::Primary`.
    pub level: CommandBufferLevel,

    /// The number of command buffers to allocate.
    ///
    /// The default value is `1`.
    pub command_buffer_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            command_pool: Id::NULL,
            level: CommandBufferLevel::Primary,
            command_buffer_count: 1,
            _ne: crate::NonExhaustive(()),
        }
    }
}

vulkan_bitflags! {
    /// How a command buffer is going to be submitted.
    CommandBufferUsage = CommandBufferUsageFlags(u32);

    /// The command buffer is submitted once, and then becomes invalid.
    ONE_TIME_SUBMIT = ONE_TIME_SUBMIT,

    /// A secondary command buffer is entirely inside a render pass.
    RENDER_PASS_CONTINUE = RENDER_PASS_CONTINUE,

    /// The command buffer can be resubmitted while it is pending.
    SIMULTANEOUS_USE = SIMULTANEOUS_USE,
}

/// Parameters to begin recording a command buffer.
#[derive(Clone, Debug)]
pub struct CommandBufferBeginInfo {
    /// How the command buffer is going to be submitted.
    ///
    /// The default value is empty.
    pub usage: CommandBufferUsage,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferBeginInfo {
    #[inline]
    fn default() -> Self {
        Self {
            usage: CommandBufferUsage::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandBufferBeginInfo {
    /// Returns a `CommandBufferBeginInfo` with the given usage.
    #[inline]
    pub fn usage(usage: CommandBufferUsage) -> Self {
        Self {
            usage,
            ..Default::default()
        }
    }
}

/// The state of a command buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    #[default]
    Initial,
    Recording,
    Executable,
    Pending,
    Invalid,
}

/// The reason why a command buffer became invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// An object that a recorded command refers to was destroyed.
    Destroyed(ObjectRef),

    /// A descriptor set was updated after it was bound.
    Updated(ObjectRef),
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalidation::Destroyed(object) => write!(f, "bound {} was destroyed", object),
            Invalidation::Updated(object) => {
                write!(f, "bound {} was updated after it was bound", object)
            }
        }
    }
}

/// A command buffer.
#[derive(Debug)]
pub struct CommandBuffer {
    pool: Id<CommandPool>,
    level: CommandBufferLevel,
    queue_family_index: u32,
    pub(crate) state: Mutex<CommandBufferInner>,
    use_count: UseCount,
}

/// The recorded contents and the state of a command buffer.
#[derive(Debug, Default)]
pub(crate) struct CommandBufferInner {
    pub(crate) state: CommandBufferState,
    pub(crate) usage: CommandBufferUsage,
    pub(crate) in_use: IndexSet<ObjectRef, foldhash::fast::RandomState>,
    pub(crate) submit_count: u32,
    pub(crate) pending_count: u32,
    pub(crate) invalidated_by: Option<Invalidation>,
    pub(crate) bound_pipelines: HashMap<PipelineBindPoint, Id<Pipeline>>,
    pub(crate) bound_descriptor_sets: HashMap<(PipelineBindPoint, u32), (Id<DescriptorSet>, u64)>,
    pub(crate) active_queries: SmallVec<[(Id<QueryPool>, u32, QueryType); 2]>,
    pub(crate) query_ops: Vec<QueryOp>,
    pub(crate) event_ops: Vec<(Id<Event>, bool)>,
}

impl CommandBufferInner {
    fn invalidate(&mut self, invalidation: Invalidation) {
        self.state = CommandBufferState::Invalid;
        self.invalidated_by = Some(invalidation);
    }
}

impl_object!(CommandBuffer, CommandBuffer, command_buffers);

impl CommandBuffer {
    /// Returns the pool that the command buffer was allocated from.
    #[inline]
    pub fn pool(&self) -> Id<CommandPool> {
        self.pool
    }

    #[inline]
    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    /// Returns the queue family of the pool of the command buffer.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    #[inline]
    pub fn state(&self) -> CommandBufferState {
        self.state.lock().state
    }

    /// Returns the usage that the command buffer was last begun with.
    #[inline]
    pub fn usage(&self) -> CommandBufferUsage {
        self.state.lock().usage
    }

    /// Returns how many times the command buffer was submitted since it was last begun.
    #[inline]
    pub fn submit_count(&self) -> u32 {
        self.state.lock().submit_count
    }

    /// Returns the number of submissions of the command buffer that have not been retired.
    #[inline]
    pub fn pending_count(&self) -> u32 {
        self.state.lock().pending_count
    }

    /// Returns why the command buffer became invalid, if it is invalid because of a recorded
    /// dependency.
    #[inline]
    pub fn invalidated_by(&self) -> Option<Invalidation> {
        self.state.lock().invalidated_by
    }

    /// Returns the objects that the recorded commands refer to, in recording order.
    pub fn in_use(&self) -> Vec<ObjectRef> {
        self.state.lock().in_use.iter().copied().collect()
    }
}

/// What the submission of a command buffer takes along to the queue.
#[derive(Debug, Default)]
pub(crate) struct SubmittedCommands {
    pub(crate) used: Vec<ObjectRef>,
    pub(crate) query_ops: Vec<QueryOp>,
    pub(crate) event_ops: Vec<(Id<Event>, bool)>,
}

impl Device {
    /// Creates a new command pool.
    pub fn create_command_pool(
        &self,
        create_info: CommandPoolCreateInfo,
    ) -> Result<Id<CommandPool>, Box<ValidationError>> {
        self.reported(self.validate_create_command_pool(&create_info))?;

        Ok(self.record_create_command_pool(create_info))
    }

    pub fn validate_create_command_pool(
        &self,
        create_info: &CommandPoolCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_command_pool(
        &self,
        create_info: CommandPoolCreateInfo,
    ) -> Id<CommandPool> {
        let CommandPoolCreateInfo {
            flags,
            queue_family_index,
            _ne: _,
        } = create_info;

        self.objects.command_pools.register(CommandPool {
            flags,
            queue_family_index,
            command_buffers: Mutex::new(IndexSet::default()),
            use_count: UseCount::default(),
        })
    }

    /// Destroys a command pool, and frees the command buffers allocated from it.
    pub fn destroy_command_pool(
        &self,
        command_pool: Id<CommandPool>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_command_pool(command_pool))?;
        self.record_destroy_command_pool(command_pool);

        Ok(())
    }

    pub fn validate_destroy_command_pool(
        &self,
        command_pool: Id<CommandPool>,
    ) -> Result<(), Box<ValidationError>> {
        let pool_record = self.lookup(
            command_pool,
            "command_pool",
            &["VUID-vkDestroyCommandPool-commandPool-parameter"],
        )?;

        if let Some(command_buffer) = self.pending_member(&pool_record) {
            return Err(Box::new(ValidationError {
                context: "command_pool".into(),
                problem: format!(
                    "{} was allocated from the pool, and is pending execution",
                    command_buffer.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyCommandPool-commandPool-00041"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_command_pool(&self, command_pool: Id<CommandPool>) {
        if let Ok(pool_record) = self.objects.command_pools.erase(command_pool) {
            for command_buffer in pool_record.command_buffers.lock().drain(..) {
                let _ = self.objects.command_buffers.erase(command_buffer);
            }
        }
    }

    /// Resets all command buffers of a pool to the initial state.
    pub fn reset_command_pool(
        &self,
        command_pool: Id<CommandPool>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_command_pool(command_pool))?;
        self.record_reset_command_pool(command_pool);

        Ok(())
    }

    pub fn validate_reset_command_pool(
        &self,
        command_pool: Id<CommandPool>,
    ) -> Result<(), Box<ValidationError>> {
        let pool_record = self.lookup(
            command_pool,
            "command_pool",
            &["VUID-vkResetCommandPool-commandPool-parameter"],
        )?;

        if let Some(command_buffer) = self.pending_member(&pool_record) {
            return Err(Box::new(ValidationError {
                context: "command_pool".into(),
                problem: format!(
                    "{} was allocated from the pool, and is pending execution",
                    command_buffer.erase(),
                )
                .into(),
                vuids: &["VUID-vkResetCommandPool-commandPool-00040"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_reset_command_pool(&self, command_pool: Id<CommandPool>) {
        if let Ok(pool_record) = self.objects.command_pools.get(command_pool) {
            for command_buffer in pool_record.command_buffers() {
                if let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer)
                {
                    *command_buffer_record.state.lock() = CommandBufferInner::default();
                }
            }
        }
    }

    fn pending_member(&self, pool_record: &CommandPool) -> Option<Id<CommandBuffer>> {
        pool_record
            .command_buffers()
            .into_iter()
            .find(|&command_buffer| {
                self.objects
                    .command_buffers
                    .get(command_buffer)
                    .is_ok_and(|record| record.state() == CommandBufferState::Pending)
            })
    }

    /// Allocates command buffers from a pool. They start in the initial state.
    pub fn allocate_command_buffers(
        &self,
        allocate_info: CommandBufferAllocateInfo,
    ) -> Result<Vec<Id<CommandBuffer>>, Box<ValidationError>> {
        self.reported(self.validate_allocate_command_buffers(&allocate_info))?;

        Ok(self.record_allocate_command_buffers(allocate_info))
    }

    pub fn validate_allocate_command_buffers(
        &self,
        allocate_info: &CommandBufferAllocateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let &CommandBufferAllocateInfo {
            command_pool,
            level: _,
            command_buffer_count,
            _ne: _,
        } = allocate_info;

        self.lookup(
            command_pool,
            "allocate_info.command_pool",
            &["VUID-VkCommandBufferAllocateInfo-commandPool-parameter"],
        )?;

        if command_buffer_count == 0 {
            return Err(Box::new(ValidationError {
                context: "allocate_info.command_buffer_count".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkCommandBufferAllocateInfo-commandBufferCount-00044"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_allocate_command_buffers(
        &self,
        allocate_info: CommandBufferAllocateInfo,
    ) -> Vec<Id<CommandBuffer>> {
        let CommandBufferAllocateInfo {
            command_pool,
            level,
            command_buffer_count,
            _ne: _,
        } = allocate_info;

        let Ok(pool_record) = self.objects.command_pools.get(command_pool) else {
            return Vec::new();
        };

        let command_buffers: Vec<_> = (0..command_buffer_count)
            .map(|_| {
                self.objects.command_buffers.register(CommandBuffer {
                    pool: command_pool,
                    level,
                    queue_family_index: pool_record.queue_family_index,
                    state: Mutex::new(CommandBufferInner::default()),
                    use_count: UseCount::default(),
                })
            })
            .collect();
        pool_record
            .command_buffers
            .lock()
            .extend(command_buffers.iter().copied());

        command_buffers
    }

    /// Returns command buffers to their pool.
    pub fn free_command_buffers(
        &self,
        command_pool: Id<CommandPool>,
        command_buffers: &[Id<CommandBuffer>],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_free_command_buffers(command_pool, command_buffers))?;
        self.record_free_command_buffers(command_pool, command_buffers);

        Ok(())
    }

    pub fn validate_free_command_buffers(
        &self,
        command_pool: Id<CommandPool>,
        command_buffers: &[Id<CommandBuffer>],
    ) -> Result<(), Box<ValidationError>> {
        self.lookup(
            command_pool,
            "command_pool",
            &["VUID-vkFreeCommandBuffers-commandPool-parameter"],
        )?;

        for (index, &command_buffer) in command_buffers.iter().enumerate() {
            if command_buffer.is_null() {
                continue;
            }

            let command_buffer_record = self
                .lookup(
                    command_buffer,
                    "",
                    &["VUID-vkFreeCommandBuffers-pCommandBuffers-00048"],
                )
                .map_err(|err| err.add_context(format!("command_buffers[{}]", index)))?;

            if command_buffer_record.pool != command_pool {
                return Err(Box::new(ValidationError {
                    context: format!("command_buffers[{}]", index).into(),
                    problem: "was not allocated from `command_pool`".into(),
                    vuids: &["VUID-vkFreeCommandBuffers-pCommandBuffers-parent"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }

            if command_buffer_record.state() == CommandBufferState::Pending {
                return Err(Box::new(ValidationError {
                    context: format!("command_buffers[{}]", index).into(),
                    problem: "is pending execution".into(),
                    vuids: &["VUID-vkFreeCommandBuffers-pCommandBuffers-00047"],
                    kind: ValidationErrorKind::Lifetime,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_free_command_buffers(
        &self,
        command_pool: Id<CommandPool>,
        command_buffers: &[Id<CommandBuffer>],
    ) {
        let pool_record = self.objects.command_pools.get(command_pool).ok();

        for &command_buffer in command_buffers {
            if self.objects.command_buffers.erase(command_buffer).is_ok() {
                if let Some(pool_record) = &pool_record {
                    pool_record.command_buffers.lock().shift_remove(&command_buffer);
                }
            }
        }
    }

    /// Starts recording a command buffer.
    ///
    /// A command buffer that is executable or invalid is reset implicitly, which requires the
    /// pool to have been created with `CommandPoolCreateFlags::RESET_COMMAND_BUFFER`.
    pub fn begin_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        begin_info: CommandBufferBeginInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_begin_command_buffer(command_buffer, &begin_info))?;
        self.record_begin_command_buffer(command_buffer, begin_info);

        Ok(())
    }

    pub fn validate_begin_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        begin_info: &CommandBufferBeginInfo,
    ) -> Result<(), Box<ValidationError>> {
        let CommandBufferBeginInfo { usage: _, _ne: _ } = begin_info;

        let command_buffer_record = self.lookup(
            command_buffer,
            "command_buffer",
            &["VUID-vkBeginCommandBuffer-commandBuffer-parameter"],
        )?;

        match command_buffer_record.state() {
            state @ (CommandBufferState::Recording | CommandBufferState::Pending) => {
                Err(Box::new(ValidationError {
                    context: "command_buffer".into(),
                    problem: format!(
                        "is in the {:?} state; it must not be recording or pending execution",
                        state,
                    )
                    .into(),
                    vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-00049"],
                    ..Default::default()
                }))
            }
            CommandBufferState::Executable | CommandBufferState::Invalid
                if !self.pool_allows_reset(&command_buffer_record) =>
            {
                Err(Box::new(ValidationError {
                    context: "command_buffer".into(),
                    problem: "has already been recorded, which requires an implicit reset, but \
                        its pool was not created with \
                        `CommandPoolCreateFlags::RESET_COMMAND_BUFFER`"
                        .into(),
                    vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-00050"],
                    ..Default::default()
                }))
            }
            _ => Ok(()),
        }
    }

    pub fn record_begin_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        begin_info: CommandBufferBeginInfo,
    ) {
        if let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) {
            let mut state = command_buffer_record.state.lock();
            *state = CommandBufferInner::default();
            state.state = CommandBufferState::Recording;
            state.usage = begin_info.usage;
        }
    }

    /// Ends recording a command buffer.
    pub fn end_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_end_command_buffer(command_buffer))?;
        self.record_end_command_buffer(command_buffer);

        Ok(())
    }

    pub fn validate_end_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkEndCommandBuffer-commandBuffer-parameter"],
            &["VUID-vkEndCommandBuffer-commandBuffer-00059"],
        )?;

        let state = command_buffer_record.state.lock();

        if let Some(&(query_pool, query, _)) = state.active_queries.first() {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: format!(
                    "query {} of {} is still active",
                    query,
                    query_pool.erase(),
                )
                .into(),
                vuids: &["VUID-vkEndCommandBuffer-commandBuffer-00061"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_end_command_buffer(&self, command_buffer: Id<CommandBuffer>) {
        if let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) {
            command_buffer_record.state.lock().state = CommandBufferState::Executable;
        }
    }

    /// Resets a command buffer to the initial state.
    pub fn reset_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_command_buffer(command_buffer))?;
        self.record_reset_command_buffer(command_buffer);

        Ok(())
    }

    pub fn validate_reset_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.lookup(
            command_buffer,
            "command_buffer",
            &["VUID-vkResetCommandBuffer-commandBuffer-parameter"],
        )?;

        if command_buffer_record.state() == CommandBufferState::Pending {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: "is pending execution".into(),
                vuids: &["VUID-vkResetCommandBuffer-commandBuffer-00045"],
                ..Default::default()
            }));
        }

        if !self.pool_allows_reset(&command_buffer_record) {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: "was allocated from a pool that was not created with \
                    `CommandPoolCreateFlags::RESET_COMMAND_BUFFER`"
                    .into(),
                vuids: &["VUID-vkResetCommandBuffer-commandBuffer-00046"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_reset_command_buffer(&self, command_buffer: Id<CommandBuffer>) {
        if let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) {
            *command_buffer_record.state.lock() = CommandBufferInner::default();
        }
    }

    fn pool_allows_reset(&self, command_buffer_record: &CommandBuffer) -> bool {
        self.objects
            .command_pools
            .get(command_buffer_record.pool)
            .is_ok_and(|pool_record| {
                pool_record
                    .flags
                    .intersects(CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            })
    }

    /// Records a command that refers to `objects`, without any checks of its own beyond the
    /// state of the command buffer and the liveness of the objects.
    ///
    /// This is what commands without a typed counterpart in [`commands`] go through.
    pub fn record_command(
        &self,
        command_buffer: Id<CommandBuffer>,
        objects: &[ObjectRef],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_record_command(command_buffer, objects))?;
        self.record_command_unchecked(command_buffer, objects);

        Ok(())
    }

    pub fn validate_record_command(
        &self,
        command_buffer: Id<CommandBuffer>,
        objects: &[ObjectRef],
    ) -> Result<(), Box<ValidationError>> {
        self.recording_command_buffer(
            command_buffer,
            &["UNASSIGNED-CoreValidation-ObjectTracker-InvalidHandle"],
            &["UNASSIGNED-CoreValidation-DrawState-NoBeginCommandBuffer"],
        )?;

        for (index, &object) in objects.iter().enumerate() {
            if !self.is_alive(object) {
                return Err(Box::new(ValidationError {
                    context: format!("objects[{}]", index).into(),
                    problem: format!("{} is not a live object of the device", object).into(),
                    vuids: &["UNASSIGNED-CoreValidation-ObjectTracker-InvalidHandle"],
                    kind: ValidationErrorKind::Lifetime,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_command_unchecked(
        &self,
        command_buffer: Id<CommandBuffer>,
        objects: &[ObjectRef],
    ) {
        self.with_recording(command_buffer, |state| {
            state.in_use.extend(objects.iter().copied());
        });
    }

    /// Looks up a command buffer that a command is recorded into, and checks that it is
    /// recording.
    pub(crate) fn recording_command_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        parameter_vuids: &'static [&'static str],
        recording_vuids: &'static [&'static str],
    ) -> Result<Arc<CommandBuffer>, Box<ValidationError>> {
        let command_buffer_record =
            self.lookup(command_buffer, "command_buffer", parameter_vuids)?;
        let state = command_buffer_record.state();

        if state != CommandBufferState::Recording {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: format!(
                    "is in the {:?} state, but must be recording; call \
                    `begin_command_buffer` first",
                    state,
                )
                .into(),
                vuids: recording_vuids,
                ..Default::default()
            }));
        }

        Ok(command_buffer_record)
    }

    /// Checks that the queue family of a command buffer supports a command.
    pub(crate) fn validate_queue_flags(
        &self,
        command_buffer_record: &CommandBuffer,
        queue_flags: QueueFlags,
        vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        let family_flags = self
            .queue_family_properties()
            .get(command_buffer_record.queue_family_index as usize)
            .map_or(QueueFlags::empty(), |properties| properties.queue_flags);

        if !family_flags.intersects(queue_flags) {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: format!(
                    "the queue family of the command buffer does not support any of {:?}",
                    queue_flags,
                )
                .into(),
                vuids,
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Applies a mutation to a command buffer, if it still exists.
    pub(crate) fn with_recording(
        &self,
        command_buffer: Id<CommandBuffer>,
        f: impl FnOnce(&mut CommandBufferInner),
    ) {
        if let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) {
            f(&mut command_buffer_record.state.lock());
        }
    }

    /// Checks that a command buffer can be submitted to a queue of the given family.
    ///
    /// `earlier` holds the command buffers that come before this one in the same call. Query
    /// operations are simulated on `queries`.
    ///
    /// If a recorded dependency was destroyed, or a bound descriptor set was updated, the
    /// command buffer is marked invalid as a side effect. That is a fact about the command
    /// buffer regardless of the outcome of the call.
    pub(crate) fn validate_command_buffer_submit(
        &self,
        command_buffer: Id<CommandBuffer>,
        queue_family_index: u32,
        earlier: &[Id<CommandBuffer>],
        queries: &mut QueryOverlay,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record =
            self.lookup(command_buffer, "", &["VUID-VkSubmitInfo-pCommandBuffers-parameter"])?;

        if command_buffer_record.level != CommandBufferLevel::Primary {
            return Err(Box::new(ValidationError {
                problem: "is a secondary command buffer".into(),
                vuids: &["VUID-VkSubmitInfo-pCommandBuffers-00075"],
                ..Default::default()
            }));
        }

        if command_buffer_record.queue_family_index != queue_family_index {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "was allocated from a pool of queue family {}, but is submitted to a queue \
                    of family {}",
                    command_buffer_record.queue_family_index, queue_family_index,
                )
                .into(),
                vuids: &["VUID-vkQueueSubmit-pCommandBuffers-00074"],
                ..Default::default()
            }));
        }

        let mut state = command_buffer_record.state.lock();
        let earlier_in_call = earlier.contains(&command_buffer);

        if state.usage.intersects(CommandBufferUsage::ONE_TIME_SUBMIT)
            && (state.submit_count > 0 || earlier_in_call)
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "{} was begun with `CommandBufferUsage::ONE_TIME_SUBMIT`, and has been \
                    submitted already",
                    command_buffer.erase(),
                )
                .into(),
                vuids: &["UNASSIGNED-CoreValidation-DrawState-CommandBufferSingleSubmitViolation"],
                ..Default::default()
            }));
        }

        if (state.state == CommandBufferState::Pending || earlier_in_call)
            && !state.usage.intersects(CommandBufferUsage::SIMULTANEOUS_USE)
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "{} is already in use and was not begun with \
                    `CommandBufferUsage::SIMULTANEOUS_USE`",
                    command_buffer.erase(),
                )
                .into(),
                vuids: &["VUID-vkQueueSubmit-pCommandBuffers-00071"],
                ..Default::default()
            }));
        }

        // Submitting work that refers to a destroyed object is a use after destruction.
        let unsubmittable = |problem: String, invalidation: Option<Invalidation>| {
            let kind = match invalidation {
                Some(Invalidation::Destroyed(_)) => ValidationErrorKind::Lifetime,
                _ => ValidationErrorKind::State,
            };

            Box::new(ValidationError {
                problem: problem.into(),
                vuids: &["VUID-vkQueueSubmit-pCommandBuffers-00070"],
                kind,
                ..Default::default()
            })
        };

        match state.state {
            CommandBufferState::Initial => {
                return Err(unsubmittable(
                    format!("{} is unrecorded and contains no commands", command_buffer.erase()),
                    None,
                ));
            }
            CommandBufferState::Recording => {
                return Err(unsubmittable(
                    format!(
                        "{} is still being recorded; call `end_command_buffer` first",
                        command_buffer.erase(),
                    ),
                    None,
                ));
            }
            CommandBufferState::Invalid => {
                let problem = match state.invalidated_by {
                    Some(invalidation) => format!(
                        "{} is invalid because {}",
                        command_buffer.erase(),
                        invalidation,
                    ),
                    None => format!(
                        "{} is invalid and must be reset or re-recorded",
                        command_buffer.erase(),
                    ),
                };

                return Err(unsubmittable(problem, state.invalidated_by));
            }
            CommandBufferState::Executable | CommandBufferState::Pending => (),
        }

        if let Some(&object) = state.in_use.iter().find(|&&object| !self.is_alive(object)) {
            let invalidation = Invalidation::Destroyed(object);
            state.invalidate(invalidation);

            return Err(unsubmittable(
                format!("{} is invalid because {}", command_buffer.erase(), invalidation),
                Some(invalidation),
            ));
        }

        let updated_set = state
            .bound_descriptor_sets
            .values()
            .find(|&&(set, version)| {
                self.objects
                    .descriptor_sets
                    .get(set)
                    .is_ok_and(|set_record| set_record.version() != version)
            })
            .map(|&(set, _)| set);

        if let Some(set) = updated_set {
            let invalidation = Invalidation::Updated(set.erase());
            state.invalidate(invalidation);

            return Err(unsubmittable(
                format!("{} is invalid because {}", command_buffer.erase(), invalidation),
                Some(invalidation),
            ));
        }

        self.simulate_query_ops(command_buffer, &state.query_ops, queries)
    }

    /// Moves a command buffer to the pending state, and returns what the queue needs to track.
    pub(crate) fn record_command_buffer_submit(
        &self,
        command_buffer: Id<CommandBuffer>,
    ) -> SubmittedCommands {
        let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) else {
            return SubmittedCommands::default();
        };

        let mut state = command_buffer_record.state.lock();
        state.state = CommandBufferState::Pending;
        state.pending_count += 1;
        state.submit_count += 1;

        let mut used = Vec::with_capacity(state.in_use.len() + 1);
        used.push(command_buffer.erase());
        used.extend(state.in_use.iter().copied());

        SubmittedCommands {
            used,
            query_ops: state.query_ops.clone(),
            event_ops: state.event_ops.clone(),
        }
    }

    /// Completes one submission of a command buffer.
    pub(crate) fn retire_command_buffer(&self, command_buffer: Id<CommandBuffer>) {
        self.with_recording(command_buffer, |state| {
            state.pending_count = state.pending_count.saturating_sub(1);

            if state.pending_count == 0 && state.state == CommandBufferState::Pending {
                state.state = if state.usage.intersects(CommandBufferUsage::ONE_TIME_SUBMIT) {
                    CommandBufferState::Invalid
                } else {
                    CommandBufferState::Executable
                };
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandBufferLevel,
        CommandBufferState, CommandPoolCreateFlags, CommandPoolCreateInfo,
    };
    use crate::{
        object::ObjectRef,
        tests::{command_buffer, uniform_buffer_info},
    };

    #[test]
    fn pool_queue_family() {
        let (device, _queue, _log) = test_device!();

        assert_should_fail!(
            device.create_command_pool(CommandPoolCreateInfo {
                queue_family_index: 2,
                ..Default::default()
            }),
            "VUID-vkCreateCommandPool-queueFamilyIndex-01937",
        );

        let command_pool = device
            .create_command_pool(Default::default())
            .unwrap();
        assert_should_fail!(
            device.allocate_command_buffers(CommandBufferAllocateInfo {
                command_pool,
                command_buffer_count: 0,
                ..Default::default()
            }),
            "VUID-VkCommandBufferAllocateInfo-commandBufferCount-00044",
        );

        let command_buffers = device
            .allocate_command_buffers(CommandBufferAllocateInfo {
                command_pool,
                level: CommandBufferLevel::Secondary,
                command_buffer_count: 3,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(device.get(command_pool).unwrap().command_buffers().len(), 3);

        device
            .free_command_buffers(command_pool, &command_buffers[..1])
            .unwrap();
        assert_eq!(device.get(command_pool).unwrap().command_buffers().len(), 2);

        device.destroy_command_pool(command_pool).unwrap();
        assert!(device.get(command_buffers[2]).is_err());
    }

    #[test]
    fn state_machine() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let state = || device.get(cb).unwrap().state();

        assert_eq!(state(), CommandBufferState::Initial);
        assert_should_fail!(
            device.end_command_buffer(cb),
            "VUID-vkEndCommandBuffer-commandBuffer-00059",
        );

        device.begin_command_buffer(cb, Default::default()).unwrap();
        assert_eq!(state(), CommandBufferState::Recording);
        assert_should_fail!(
            device.begin_command_buffer(cb, Default::default()),
            "VUID-vkBeginCommandBuffer-commandBuffer-00049",
        );

        device.end_command_buffer(cb).unwrap();
        assert_eq!(state(), CommandBufferState::Executable);

        // Without the reset flag, neither an implicit nor an explicit reset is allowed.
        assert_should_fail!(
            device.begin_command_buffer(cb, Default::default()),
            "VUID-vkBeginCommandBuffer-commandBuffer-00050",
        );
        assert_should_fail!(
            device.reset_command_buffer(cb),
            "VUID-vkResetCommandBuffer-commandBuffer-00046",
        );

        let pool = device.get(cb).unwrap().pool();
        device.reset_command_pool(pool).unwrap();
        assert_eq!(state(), CommandBufferState::Initial);
    }

    #[test]
    fn implicit_reset() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();

        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.record_command(cb, &[buffer.erase()]).unwrap();
        device.end_command_buffer(cb).unwrap();
        assert_eq!(device.get(cb).unwrap().in_use(), vec![buffer.erase()]);

        device
            .begin_command_buffer(cb, CommandBufferBeginInfo::default())
            .unwrap();
        assert!(device.get(cb).unwrap().in_use().is_empty());

        device.reset_command_buffer(cb).unwrap();
        assert_eq!(device.get(cb).unwrap().state(), CommandBufferState::Initial);
    }

    #[test]
    fn record_requires_recording() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();

        assert_should_fail!(
            device.record_command(cb, &[buffer.erase()]),
            "UNASSIGNED-CoreValidation-DrawState-NoBeginCommandBuffer",
        );

        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.destroy_buffer(buffer).unwrap();
        assert_should_fail!(
            device.record_command(cb, &[buffer.erase()]),
            "UNASSIGNED-CoreValidation-ObjectTracker-InvalidHandle",
        );

        let foreign = ObjectRef {
            handle: 0xdead_beef,
            ..buffer.erase()
        };
        assert!(device.validate_record_command(cb, &[foreign]).is_err());
    }

    #[test]
    fn pending_members() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = device.get(cb).unwrap().pool();

        device.get(cb).unwrap().state.lock().state = CommandBufferState::Pending;

        assert_should_fail!(
            device.reset_command_buffer(cb),
            "VUID-vkResetCommandBuffer-commandBuffer-00045",
        );
        assert_should_fail!(
            device.begin_command_buffer(cb, Default::default()),
            "VUID-vkBeginCommandBuffer-commandBuffer-00049",
        );
        assert_should_fail!(
            device.free_command_buffers(pool, &[cb]),
            "VUID-vkFreeCommandBuffers-pCommandBuffers-00047",
        );
        assert_should_fail!(
            device.reset_command_pool(pool),
            "VUID-vkResetCommandPool-commandPool-00040",
        );
        assert_should_fail!(
            device.destroy_command_pool(pool),
            "VUID-vkDestroyCommandPool-commandPool-00041",
        );
        assert!(device.get(cb).is_ok());
    }
}
