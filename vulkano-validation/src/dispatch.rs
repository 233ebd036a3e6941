// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The interception front end.
//!
//! A host that sits between an application and a driver hands each API call to a [`Dispatcher`]
//! twice:
//!
//! - Before the driver sees it, with [`pre_call`](Dispatcher::pre_call). The raw arguments are
//!   decoded and checked, and the call is validated against the state of the device. The
//!   returned [`Verdict`] says whether the call may be forwarded to the driver. Malformed
//!   arguments and use of destroyed objects must not reach the driver; the host is expected to
//!   return the result in [`CallAction::Skip`] to the application instead. Calls that are only
//!   invalid because of the state of an object are forwarded, so that the behavior of the
//!   driver can still be observed.
//!
//! - After the driver returned, with [`post_call`](Dispatcher::post_call) and the result of the
//!   driver. If the driver succeeded, the state change of the call is recorded. Objects that the
//!   driver created are always registered, so that later calls can refer to them. Other state
//!   changes are only recorded for calls that passed validation.
//!
//! Every error is reported to the reporter of the device as soon as it is found.

use crate::{
    buffer::{Buffer, BufferCreateInfo, BufferView, BufferViewCreateInfo},
    command_buffer::{
        commands::{ClearColorImageInfo, CopyBufferInfo},
        CommandBuffer, CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandPool,
        CommandPoolCreateInfo,
    },
    descriptor_set::{
        DescriptorPool, DescriptorPoolCreateInfo, DescriptorSet, DescriptorSetAllocateInfo,
        DescriptorSetLayout, DescriptorSetLayoutCreateInfo, WriteDescriptorSet,
    },
    device::Device,
    handle::Id,
    image::{Image, ImageCreateInfo, ImageView, ImageViewCreateInfo},
    memory::{DeviceMemory, MappedMemoryRange, MemoryAllocateInfo, MemoryMapInfo},
    object::ObjectRef,
    pipeline::{Pipeline, PipelineBindPoint, PipelineCreateInfo},
    query::{QueryPool, QueryPoolCreateInfo, QueryResultFlags},
    queue::{Queue, SubmitInfo},
    sampler::{Sampler, SamplerCreateInfo},
    sync::{
        event::{Event, EventCreateInfo},
        fence::{ExternalFenceHandleType, Fence, FenceCreateInfo, ImportFenceFdInfo},
        semaphore::{
            ExternalSemaphoreHandleType, ImportSemaphoreFdInfo, Semaphore, SemaphoreCreateInfo,
        },
    },
    validate::{
        decode_bool, decode_enum, decode_flags, required_handle, reserved_zero,
        RawBufferCreateInfo, RawFenceCreateInfo, RawImageCreateInfo, RawMemoryAllocateInfo,
        RawSamplerCreateInfo, RawSemaphoreCreateInfo,
    },
    DeviceSize, ValidationError, ValidationErrorKind, VulkanError,
};
use ash::vk;
use std::sync::Arc;

/// An intercepted API call, with its arguments as the application passed them.
///
/// Arguments whose encoding can be malformed (enums, flags, booleans, structure chains) are
/// given raw. The others are given in their typed form.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ApiCall {
    AllocateMemory {
        allocate_info: RawMemoryAllocateInfo,
    },
    FreeMemory {
        memory: Id<DeviceMemory>,
    },
    MapMemory {
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
        size: DeviceSize,
        flags: u32,
    },
    UnmapMemory {
        memory: Id<DeviceMemory>,
    },
    FlushMappedMemoryRanges {
        memory_ranges: Vec<MappedMemoryRange>,
    },
    InvalidateMappedMemoryRanges {
        memory_ranges: Vec<MappedMemoryRange>,
    },
    CreateBuffer {
        create_info: RawBufferCreateInfo,
    },
    DestroyBuffer {
        buffer: Id<Buffer>,
    },
    CreateBufferView {
        create_info: BufferViewCreateInfo,
    },
    DestroyBufferView {
        buffer_view: Id<BufferView>,
    },
    CreateImage {
        create_info: RawImageCreateInfo,
    },
    DestroyImage {
        image: Id<Image>,
    },
    CreateImageView {
        create_info: ImageViewCreateInfo,
    },
    DestroyImageView {
        image_view: Id<ImageView>,
    },
    CreateSampler {
        create_info: RawSamplerCreateInfo,
    },
    DestroySampler {
        sampler: Id<Sampler>,
    },
    BindBufferMemory {
        buffer: Id<Buffer>,
        memory: Id<DeviceMemory>,
        memory_offset: DeviceSize,
    },
    BindImageMemory {
        image: Id<Image>,
        memory: Id<DeviceMemory>,
        memory_offset: DeviceSize,
    },
    CreateFence {
        create_info: RawFenceCreateInfo,
    },
    DestroyFence {
        fence: Id<Fence>,
    },
    ResetFences {
        fences: Vec<Id<Fence>>,
    },
    GetFenceStatus {
        fence: Id<Fence>,
    },
    WaitForFences {
        fences: Vec<Id<Fence>>,
        wait_all: vk::Bool32,
        timeout: u64,
    },
    ImportFenceFd {
        fence: Id<Fence>,
        import_info: ImportFenceFdInfo,
    },
    GetFenceFd {
        fence: Id<Fence>,
        handle_type: ExternalFenceHandleType,
    },
    CreateSemaphore {
        create_info: RawSemaphoreCreateInfo,
    },
    DestroySemaphore {
        semaphore: Id<Semaphore>,
    },
    ImportSemaphoreFd {
        semaphore: Id<Semaphore>,
        import_info: ImportSemaphoreFdInfo,
    },
    GetSemaphoreFd {
        semaphore: Id<Semaphore>,
        handle_type: ExternalSemaphoreHandleType,
    },
    CreateEvent,
    DestroyEvent {
        event: Id<Event>,
    },
    SetEvent {
        event: Id<Event>,
    },
    ResetEvent {
        event: Id<Event>,
    },
    GetEventStatus {
        event: Id<Event>,
    },
    CreateQueryPool {
        create_info: QueryPoolCreateInfo,
    },
    DestroyQueryPool {
        query_pool: Id<QueryPool>,
    },
    ResetQueryPool {
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    },
    GetQueryPoolResults {
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
        flags: u32,
    },
    CreateCommandPool {
        create_info: CommandPoolCreateInfo,
    },
    DestroyCommandPool {
        command_pool: Id<CommandPool>,
    },
    ResetCommandPool {
        command_pool: Id<CommandPool>,
    },
    AllocateCommandBuffers {
        allocate_info: CommandBufferAllocateInfo,
    },
    FreeCommandBuffers {
        command_pool: Id<CommandPool>,
        command_buffers: Vec<Id<CommandBuffer>>,
    },
    BeginCommandBuffer {
        command_buffer: Id<CommandBuffer>,
        begin_info: CommandBufferBeginInfo,
    },
    EndCommandBuffer {
        command_buffer: Id<CommandBuffer>,
    },
    ResetCommandBuffer {
        command_buffer: Id<CommandBuffer>,
    },
    CmdCopyBuffer {
        command_buffer: Id<CommandBuffer>,
        copy_buffer_info: CopyBufferInfo,
    },
    CmdFillBuffer {
        command_buffer: Id<CommandBuffer>,
        dst_buffer: Id<Buffer>,
        dst_offset: DeviceSize,
        size: DeviceSize,
        data: u32,
    },
    CmdClearColorImage {
        command_buffer: Id<CommandBuffer>,
        clear_info: ClearColorImageInfo,
    },
    CmdBindPipeline {
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: i32,
        pipeline: Id<Pipeline>,
    },
    CmdBindDescriptorSets {
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: i32,
        layout: Id<Pipeline>,
        first_set: u32,
        descriptor_sets: Vec<Id<DescriptorSet>>,
        dynamic_offsets: Vec<u32>,
    },
    CmdDraw {
        command_buffer: Id<CommandBuffer>,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    CmdDispatch {
        command_buffer: Id<CommandBuffer>,
        group_counts: [u32; 3],
    },
    CmdSetEvent {
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    },
    CmdResetEvent {
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    },
    CmdResetQueryPool {
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    },
    CmdBeginQuery {
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    },
    CmdEndQuery {
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    },
    CmdWriteTimestamp {
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    },
    CmdExecuteCommands {
        command_buffer: Id<CommandBuffer>,
        command_buffers: Vec<Id<CommandBuffer>>,
    },
    CreateDescriptorSetLayout {
        create_info: DescriptorSetLayoutCreateInfo,
    },
    DestroyDescriptorSetLayout {
        descriptor_set_layout: Id<DescriptorSetLayout>,
    },
    CreateDescriptorPool {
        create_info: DescriptorPoolCreateInfo,
    },
    DestroyDescriptorPool {
        descriptor_pool: Id<DescriptorPool>,
    },
    ResetDescriptorPool {
        descriptor_pool: Id<DescriptorPool>,
    },
    AllocateDescriptorSets {
        allocate_info: DescriptorSetAllocateInfo,
    },
    FreeDescriptorSets {
        descriptor_pool: Id<DescriptorPool>,
        descriptor_sets: Vec<Id<DescriptorSet>>,
    },
    UpdateDescriptorSets {
        descriptor_writes: Vec<WriteDescriptorSet>,
    },
    CreatePipeline {
        create_info: PipelineCreateInfo,
    },
    DestroyPipeline {
        pipeline: Id<Pipeline>,
    },
    QueueSubmit {
        queue: Id<Queue>,
        submits: Vec<SubmitInfo>,
        /// `Id::NULL` if no fence is given.
        fence: Id<Fence>,
    },
    QueueWaitIdle {
        queue: Id<Queue>,
    },
    DeviceWaitIdle,
    DestroyDevice,
}

impl ApiCall {
    /// Returns the name of the entry point.
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::AllocateMemory { .. } => "vkAllocateMemory",
            ApiCall::FreeMemory { .. } => "vkFreeMemory",
            ApiCall::MapMemory { .. } => "vkMapMemory",
            ApiCall::UnmapMemory { .. } => "vkUnmapMemory",
            ApiCall::FlushMappedMemoryRanges { .. } => "vkFlushMappedMemoryRanges",
            ApiCall::InvalidateMappedMemoryRanges { .. } => "vkInvalidateMappedMemoryRanges",
            ApiCall::CreateBuffer { .. } => "vkCreateBuffer",
            ApiCall::DestroyBuffer { .. } => "vkDestroyBuffer",
            ApiCall::CreateBufferView { .. } => "vkCreateBufferView",
            ApiCall::DestroyBufferView { .. } => "vkDestroyBufferView",
            ApiCall::CreateImage { .. } => "vkCreateImage",
            ApiCall::DestroyImage { .. } => "vkDestroyImage",
            ApiCall::CreateImageView { .. } => "vkCreateImageView",
            ApiCall::DestroyImageView { .. } => "vkDestroyImageView",
            ApiCall::CreateSampler { .. } => "vkCreateSampler",
            ApiCall::DestroySampler { .. } => "vkDestroySampler",
            ApiCall::BindBufferMemory { .. } => "vkBindBufferMemory",
            ApiCall::BindImageMemory { .. } => "vkBindImageMemory",
            ApiCall::CreateFence { .. } => "vkCreateFence",
            ApiCall::DestroyFence { .. } => "vkDestroyFence",
            ApiCall::ResetFences { .. } => "vkResetFences",
            ApiCall::GetFenceStatus { .. } => "vkGetFenceStatus",
            ApiCall::WaitForFences { .. } => "vkWaitForFences",
            ApiCall::ImportFenceFd { .. } => "vkImportFenceFdKHR",
            ApiCall::GetFenceFd { .. } => "vkGetFenceFdKHR",
            ApiCall::CreateSemaphore { .. } => "vkCreateSemaphore",
            ApiCall::DestroySemaphore { .. } => "vkDestroySemaphore",
            ApiCall::ImportSemaphoreFd { .. } => "vkImportSemaphoreFdKHR",
            ApiCall::GetSemaphoreFd { .. } => "vkGetSemaphoreFdKHR",
            ApiCall::CreateEvent => "vkCreateEvent",
            ApiCall::DestroyEvent { .. } => "vkDestroyEvent",
            ApiCall::SetEvent { .. } => "vkSetEvent",
            ApiCall::ResetEvent { .. } => "vkResetEvent",
            ApiCall::GetEventStatus { .. } => "vkGetEventStatus",
            ApiCall::CreateQueryPool { .. } => "vkCreateQueryPool",
            ApiCall::DestroyQueryPool { .. } => "vkDestroyQueryPool",
            ApiCall::ResetQueryPool { .. } => "vkResetQueryPool",
            ApiCall::GetQueryPoolResults { .. } => "vkGetQueryPoolResults",
            ApiCall::CreateCommandPool { .. } => "vkCreateCommandPool",
            ApiCall::DestroyCommandPool { .. } => "vkDestroyCommandPool",
            ApiCall::ResetCommandPool { .. } => "vkResetCommandPool",
            ApiCall::AllocateCommandBuffers { .. } => "vkAllocateCommandBuffers",
            ApiCall::FreeCommandBuffers { .. } => "vkFreeCommandBuffers",
            ApiCall::BeginCommandBuffer { .. } => "vkBeginCommandBuffer",
            ApiCall::EndCommandBuffer { .. } => "vkEndCommandBuffer",
            ApiCall::ResetCommandBuffer { .. } => "vkResetCommandBuffer",
            ApiCall::CmdCopyBuffer { .. } => "vkCmdCopyBuffer",
            ApiCall::CmdFillBuffer { .. } => "vkCmdFillBuffer",
            ApiCall::CmdClearColorImage { .. } => "vkCmdClearColorImage",
            ApiCall::CmdBindPipeline { .. } => "vkCmdBindPipeline",
            ApiCall::CmdBindDescriptorSets { .. } => "vkCmdBindDescriptorSets",
            ApiCall::CmdDraw { .. } => "vkCmdDraw",
            ApiCall::CmdDispatch { .. } => "vkCmdDispatch",
            ApiCall::CmdSetEvent { .. } => "vkCmdSetEvent",
            ApiCall::CmdResetEvent { .. } => "vkCmdResetEvent",
            ApiCall::CmdResetQueryPool { .. } => "vkCmdResetQueryPool",
            ApiCall::CmdBeginQuery { .. } => "vkCmdBeginQuery",
            ApiCall::CmdEndQuery { .. } => "vkCmdEndQuery",
            ApiCall::CmdWriteTimestamp { .. } => "vkCmdWriteTimestamp",
            ApiCall::CmdExecuteCommands { .. } => "vkCmdExecuteCommands",
            ApiCall::CreateDescriptorSetLayout { .. } => "vkCreateDescriptorSetLayout",
            ApiCall::DestroyDescriptorSetLayout { .. } => "vkDestroyDescriptorSetLayout",
            ApiCall::CreateDescriptorPool { .. } => "vkCreateDescriptorPool",
            ApiCall::DestroyDescriptorPool { .. } => "vkDestroyDescriptorPool",
            ApiCall::ResetDescriptorPool { .. } => "vkResetDescriptorPool",
            ApiCall::AllocateDescriptorSets { .. } => "vkAllocateDescriptorSets",
            ApiCall::FreeDescriptorSets { .. } => "vkFreeDescriptorSets",
            ApiCall::UpdateDescriptorSets { .. } => "vkUpdateDescriptorSets",
            ApiCall::CreatePipeline { .. } => "vkCreateGraphicsPipelines",
            ApiCall::DestroyPipeline { .. } => "vkDestroyPipeline",
            ApiCall::QueueSubmit { .. } => "vkQueueSubmit",
            ApiCall::QueueWaitIdle { .. } => "vkQueueWaitIdle",
            ApiCall::DeviceWaitIdle => "vkDeviceWaitIdle",
            ApiCall::DestroyDevice => "vkDestroyDevice",
        }
    }

    /// Returns whether this is a destroy or free call with a null handle, which does nothing.
    fn destroys_nothing(&self) -> bool {
        match self {
            ApiCall::FreeMemory { memory } => memory.is_null(),
            ApiCall::DestroyBuffer { buffer } => buffer.is_null(),
            ApiCall::DestroyBufferView { buffer_view } => buffer_view.is_null(),
            ApiCall::DestroyImage { image } => image.is_null(),
            ApiCall::DestroyImageView { image_view } => image_view.is_null(),
            ApiCall::DestroySampler { sampler } => sampler.is_null(),
            ApiCall::DestroyFence { fence } => fence.is_null(),
            ApiCall::DestroySemaphore { semaphore } => semaphore.is_null(),
            ApiCall::DestroyEvent { event } => event.is_null(),
            ApiCall::DestroyQueryPool { query_pool } => query_pool.is_null(),
            ApiCall::DestroyCommandPool { command_pool } => command_pool.is_null(),
            ApiCall::DestroyDescriptorSetLayout {
                descriptor_set_layout,
            } => descriptor_set_layout.is_null(),
            ApiCall::DestroyDescriptorPool { descriptor_pool } => descriptor_pool.is_null(),
            ApiCall::DestroyPipeline { pipeline } => pipeline.is_null(),
            _ => false,
        }
    }
}

/// What the host should do with an intercepted call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallAction {
    /// Pass the call on to the driver.
    Forward,

    /// Do not call the driver, and return the given result to the application.
    Skip(vk::Result),
}

/// The outcome of checking an intercepted call.
#[derive(Debug)]
pub struct Verdict {
    /// Whether the call may be forwarded to the driver.
    pub action: CallAction,

    /// The errors that were found. They have already been reported.
    pub errors: Vec<Box<ValidationError>>,

    decoded: Option<Decoded>,
}

impl Verdict {
    fn new(result: Result<(), Box<ValidationError>>, decoded: Option<Decoded>) -> Self {
        match result {
            Ok(()) => Verdict {
                action: CallAction::Forward,
                errors: Vec::new(),
                decoded,
            },
            Err(err) => {
                let action = match err.kind {
                    ValidationErrorKind::State => CallAction::Forward,
                    ValidationErrorKind::Parameter | ValidationErrorKind::Lifetime => {
                        CallAction::Skip(vk::Result::ERROR_VALIDATION_FAILED_EXT)
                    }
                };

                Verdict {
                    action,
                    errors: vec![err],
                    decoded,
                }
            }
        }
    }

    /// Returns whether the call passed validation.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Raw arguments in their decoded form, kept from `pre_call` for `post_call`.
#[derive(Debug)]
enum Decoded {
    MemoryAllocateInfo(MemoryAllocateInfo),
    BufferCreateInfo(BufferCreateInfo),
    ImageCreateInfo(ImageCreateInfo),
    SamplerCreateInfo(SamplerCreateInfo),
    FenceCreateInfo(FenceCreateInfo),
    SemaphoreCreateInfo(SemaphoreCreateInfo),
    PipelineBindPoint(PipelineBindPoint),
    WaitAll(bool),
}

/// What a call produced, as far as the engine is concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutput {
    /// Nothing besides the result.
    None,

    /// A new object.
    Created(ObjectRef),

    /// New command buffers or descriptor sets, in order.
    Allocated(Vec<ObjectRef>),

    /// The status of a fence or event.
    Signaled(bool),
}

/// Routes intercepted calls to the validation and state tracking of a device.
#[derive(Debug)]
pub struct Dispatcher {
    device: Arc<Device>,
}

impl Dispatcher {
    #[inline]
    pub fn new(device: Arc<Device>) -> Self {
        Dispatcher { device }
    }

    /// Returns the device that calls are dispatched to.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Checks a call before it reaches the driver.
    pub fn pre_call(&self, call: &ApiCall) -> Verdict {
        let _span = tracing::debug_span!("pre_call", call = call.name()).entered();

        // Leaks are reported one by one, and do not stop the teardown.
        if let ApiCall::DestroyDevice = call {
            return Verdict {
                action: CallAction::Forward,
                errors: self.device.validate_destroy().err().into_iter().collect(),
                decoded: None,
            };
        }

        let mut decoded = None;
        let result = if call.destroys_nothing() {
            Ok(())
        } else {
            self.validate_call(call, &mut decoded)
        };

        if let Err(err) = &result {
            self.device.report_error(err);
        }

        let verdict = Verdict::new(result, decoded);
        tracing::trace!(action = ?verdict.action, "verdict");

        verdict
    }

    fn validate_call(
        &self,
        call: &ApiCall,
        decoded: &mut Option<Decoded>,
    ) -> Result<(), Box<ValidationError>> {
        let device = &*self.device;

        match call {
            ApiCall::AllocateMemory { allocate_info } => {
                let allocate_info = allocate_info
                    .decode(device)
                    .map_err(|err| err.add_context("allocate_info"))?;
                let result = device.validate_allocate_memory(&allocate_info);
                *decoded = Some(Decoded::MemoryAllocateInfo(allocate_info));

                result
            }
            &ApiCall::FreeMemory { memory } => device.validate_free_memory(memory),
            &ApiCall::MapMemory {
                memory,
                offset,
                size,
                flags,
            } => {
                required_handle(memory, "memory", &["VUID-vkMapMemory-memory-parameter"])?;
                reserved_zero(flags, "flags", &["VUID-vkMapMemory-flags-zerobitmask"])?;

                device.validate_map_memory(
                    memory,
                    &MemoryMapInfo {
                        offset,
                        size,
                        ..Default::default()
                    },
                )
            }
            &ApiCall::UnmapMemory { memory } => {
                required_handle(memory, "memory", &["VUID-vkUnmapMemory-memory-parameter"])?;

                device.validate_unmap_memory(memory)
            }
            ApiCall::FlushMappedMemoryRanges { memory_ranges }
            | ApiCall::InvalidateMappedMemoryRanges { memory_ranges } => {
                device.validate_mapped_memory_ranges(memory_ranges)
            }
            ApiCall::CreateBuffer { create_info } => {
                let create_info = create_info
                    .decode(device)
                    .map_err(|err| err.add_context("create_info"))?;
                let result = device.validate_create_buffer(&create_info);
                *decoded = Some(Decoded::BufferCreateInfo(create_info));

                result
            }
            &ApiCall::DestroyBuffer { buffer } => device.validate_destroy_buffer(buffer),
            ApiCall::CreateBufferView { create_info } => {
                device.validate_create_buffer_view(create_info)
            }
            &ApiCall::DestroyBufferView { buffer_view } => {
                device.validate_destroy_buffer_view(buffer_view)
            }
            ApiCall::CreateImage { create_info } => {
                let create_info = create_info
                    .decode(device)
                    .map_err(|err| err.add_context("create_info"))?;
                let result = device.validate_create_image(&create_info);
                *decoded = Some(Decoded::ImageCreateInfo(create_info));

                result
            }
            &ApiCall::DestroyImage { image } => device.validate_destroy_image(image),
            ApiCall::CreateImageView { create_info } => {
                device.validate_create_image_view(create_info)
            }
            &ApiCall::DestroyImageView { image_view } => {
                device.validate_destroy_image_view(image_view)
            }
            ApiCall::CreateSampler { create_info } => {
                let create_info = create_info
                    .decode(device)
                    .map_err(|err| err.add_context("create_info"))?;
                let result = device.validate_create_sampler(&create_info);
                *decoded = Some(Decoded::SamplerCreateInfo(create_info));

                result
            }
            &ApiCall::DestroySampler { sampler } => device.validate_destroy_sampler(sampler),
            &ApiCall::BindBufferMemory {
                buffer,
                memory,
                memory_offset,
            } => {
                required_handle(buffer, "buffer", &["VUID-vkBindBufferMemory-buffer-parameter"])?;
                required_handle(memory, "memory", &["VUID-vkBindBufferMemory-memory-parameter"])?;

                device.validate_bind_buffer_memory(buffer, memory, memory_offset)
            }
            &ApiCall::BindImageMemory {
                image,
                memory,
                memory_offset,
            } => {
                required_handle(image, "image", &["VUID-vkBindImageMemory-image-parameter"])?;
                required_handle(memory, "memory", &["VUID-vkBindImageMemory-memory-parameter"])?;

                device.validate_bind_image_memory(image, memory, memory_offset)
            }
            ApiCall::CreateFence { create_info } => {
                let create_info = create_info
                    .decode(device)
                    .map_err(|err| err.add_context("create_info"))?;
                let result = device.validate_create_fence(&create_info);
                *decoded = Some(Decoded::FenceCreateInfo(create_info));

                result
            }
            &ApiCall::DestroyFence { fence } => device.validate_destroy_fence(fence),
            ApiCall::ResetFences { fences } => device.validate_reset_fences(fences),
            &ApiCall::GetFenceStatus { fence } => {
                required_handle(fence, "fence", &["VUID-vkGetFenceStatus-fence-parameter"])?;

                device.validate_get_fence_status(fence)
            }
            ApiCall::WaitForFences {
                fences, wait_all, ..
            } => {
                *decoded = Some(Decoded::WaitAll(decode_bool(device, *wait_all, "wait_all")));

                device.validate_wait_for_fences(fences)
            }
            ApiCall::ImportFenceFd { fence, import_info } => {
                device.validate_import_fence_fd(*fence, import_info)
            }
            &ApiCall::GetFenceFd { fence, handle_type } => {
                device.validate_get_fence_fd(fence, handle_type)
            }
            ApiCall::CreateSemaphore { create_info } => {
                let create_info = create_info
                    .decode(device)
                    .map_err(|err| err.add_context("create_info"))?;
                let result = device.validate_create_semaphore(&create_info);
                *decoded = Some(Decoded::SemaphoreCreateInfo(create_info));

                result
            }
            &ApiCall::DestroySemaphore { semaphore } => {
                device.validate_destroy_semaphore(semaphore)
            }
            ApiCall::ImportSemaphoreFd {
                semaphore,
                import_info,
            } => device.validate_import_semaphore_fd(*semaphore, import_info),
            &ApiCall::GetSemaphoreFd {
                semaphore,
                handle_type,
            } => device.validate_get_semaphore_fd(semaphore, handle_type),
            ApiCall::CreateEvent => Ok(()),
            &ApiCall::DestroyEvent { event } => device.validate_destroy_event(event),
            &ApiCall::SetEvent { event } => device.validate_set_event(event),
            &ApiCall::ResetEvent { event } => device.validate_reset_event(event),
            &ApiCall::GetEventStatus { event } => {
                required_handle(event, "event", &["VUID-vkGetEventStatus-event-parameter"])?;

                device.validate_get_event_status(event)
            }
            ApiCall::CreateQueryPool { create_info } => {
                device.validate_create_query_pool(create_info)
            }
            &ApiCall::DestroyQueryPool { query_pool } => {
                device.validate_destroy_query_pool(query_pool)
            }
            &ApiCall::ResetQueryPool {
                query_pool,
                first_query,
                query_count,
            } => device.validate_reset_query_pool(query_pool, first_query, query_count),
            &ApiCall::GetQueryPoolResults {
                query_pool,
                first_query,
                query_count,
                flags,
            } => {
                let flags = decode_flags(
                    flags,
                    QueryResultFlags::from_raw_checked,
                    "flags",
                    "VkQueryResultFlagBits",
                    &["VUID-vkGetQueryPoolResults-flags-parameter"],
                )?;

                device.validate_get_query_pool_results(query_pool, first_query, query_count, flags)
            }
            ApiCall::CreateCommandPool { create_info } => {
                device.validate_create_command_pool(create_info)
            }
            &ApiCall::DestroyCommandPool { command_pool } => {
                device.validate_destroy_command_pool(command_pool)
            }
            &ApiCall::ResetCommandPool { command_pool } => {
                device.validate_reset_command_pool(command_pool)
            }
            ApiCall::AllocateCommandBuffers { allocate_info } => {
                device.validate_allocate_command_buffers(allocate_info)
            }
            ApiCall::FreeCommandBuffers {
                command_pool,
                command_buffers,
            } => device.validate_free_command_buffers(*command_pool, command_buffers),
            ApiCall::BeginCommandBuffer {
                command_buffer,
                begin_info,
            } => {
                required_handle(
                    *command_buffer,
                    "command_buffer",
                    &["VUID-vkBeginCommandBuffer-commandBuffer-parameter"],
                )?;

                device.validate_begin_command_buffer(*command_buffer, begin_info)
            }
            &ApiCall::EndCommandBuffer { command_buffer } => {
                required_handle(
                    command_buffer,
                    "command_buffer",
                    &["VUID-vkEndCommandBuffer-commandBuffer-parameter"],
                )?;

                device.validate_end_command_buffer(command_buffer)
            }
            &ApiCall::ResetCommandBuffer { command_buffer } => {
                required_handle(
                    command_buffer,
                    "command_buffer",
                    &["VUID-vkResetCommandBuffer-commandBuffer-parameter"],
                )?;

                device.validate_reset_command_buffer(command_buffer)
            }
            ApiCall::CmdCopyBuffer {
                command_buffer,
                copy_buffer_info,
            } => device.validate_cmd_copy_buffer(*command_buffer, copy_buffer_info),
            &ApiCall::CmdFillBuffer {
                command_buffer,
                dst_buffer,
                dst_offset,
                size,
                data,
            } => {
                device.validate_cmd_fill_buffer(command_buffer, dst_buffer, dst_offset, size, data)
            }
            ApiCall::CmdClearColorImage {
                command_buffer,
                clear_info,
            } => device.validate_cmd_clear_color_image(*command_buffer, clear_info),
            &ApiCall::CmdBindPipeline {
                command_buffer,
                pipeline_bind_point,
                pipeline,
            } => {
                let pipeline_bind_point = decode_enum(
                    pipeline_bind_point,
                    PipelineBindPoint::try_from_raw,
                    "pipeline_bind_point",
                    "VkPipelineBindPoint",
                    &["VUID-vkCmdBindPipeline-pipelineBindPoint-parameter"],
                )?;
                *decoded = Some(Decoded::PipelineBindPoint(pipeline_bind_point));

                device.validate_cmd_bind_pipeline(command_buffer, pipeline_bind_point, pipeline)
            }
            ApiCall::CmdBindDescriptorSets {
                command_buffer,
                pipeline_bind_point,
                layout,
                first_set,
                descriptor_sets,
                dynamic_offsets,
            } => {
                let pipeline_bind_point = decode_enum(
                    *pipeline_bind_point,
                    PipelineBindPoint::try_from_raw,
                    "pipeline_bind_point",
                    "VkPipelineBindPoint",
                    &["VUID-vkCmdBindDescriptorSets-pipelineBindPoint-parameter"],
                )?;
                *decoded = Some(Decoded::PipelineBindPoint(pipeline_bind_point));

                device.validate_cmd_bind_descriptor_sets(
                    *command_buffer,
                    pipeline_bind_point,
                    *layout,
                    *first_set,
                    descriptor_sets,
                    dynamic_offsets,
                )
            }
            &ApiCall::CmdDraw {
                command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => device.validate_cmd_draw(
                command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            ),
            &ApiCall::CmdDispatch {
                command_buffer,
                group_counts,
            } => device.validate_cmd_dispatch(command_buffer, group_counts),
            &ApiCall::CmdSetEvent {
                command_buffer,
                event,
            } => device.validate_cmd_set_event(command_buffer, event),
            &ApiCall::CmdResetEvent {
                command_buffer,
                event,
            } => device.validate_cmd_reset_event(command_buffer, event),
            &ApiCall::CmdResetQueryPool {
                command_buffer,
                query_pool,
                first_query,
                query_count,
            } => device.validate_cmd_reset_query_pool(
                command_buffer,
                query_pool,
                first_query,
                query_count,
            ),
            &ApiCall::CmdBeginQuery {
                command_buffer,
                query_pool,
                query,
            } => device.validate_cmd_begin_query(command_buffer, query_pool, query),
            &ApiCall::CmdEndQuery {
                command_buffer,
                query_pool,
                query,
            } => device.validate_cmd_end_query(command_buffer, query_pool, query),
            &ApiCall::CmdWriteTimestamp {
                command_buffer,
                query_pool,
                query,
            } => device.validate_cmd_write_timestamp(command_buffer, query_pool, query),
            ApiCall::CmdExecuteCommands {
                command_buffer,
                command_buffers,
            } => device.validate_cmd_execute_commands(*command_buffer, command_buffers),
            ApiCall::CreateDescriptorSetLayout { create_info } => {
                device.validate_create_descriptor_set_layout(create_info)
            }
            &ApiCall::DestroyDescriptorSetLayout {
                descriptor_set_layout,
            } => device.validate_destroy_descriptor_set_layout(descriptor_set_layout),
            ApiCall::CreateDescriptorPool { create_info } => {
                device.validate_create_descriptor_pool(create_info)
            }
            &ApiCall::DestroyDescriptorPool { descriptor_pool } => {
                device.validate_destroy_descriptor_pool(descriptor_pool)
            }
            &ApiCall::ResetDescriptorPool { descriptor_pool } => {
                device.validate_reset_descriptor_pool(descriptor_pool)
            }
            ApiCall::AllocateDescriptorSets { allocate_info } => {
                device.validate_allocate_descriptor_sets(allocate_info)
            }
            ApiCall::FreeDescriptorSets {
                descriptor_pool,
                descriptor_sets,
            } => device.validate_free_descriptor_sets(*descriptor_pool, descriptor_sets),
            ApiCall::UpdateDescriptorSets { descriptor_writes } => {
                device.validate_update_descriptor_sets(descriptor_writes)
            }
            ApiCall::CreatePipeline { create_info } => device.validate_create_pipeline(create_info),
            &ApiCall::DestroyPipeline { pipeline } => device.validate_destroy_pipeline(pipeline),
            ApiCall::QueueSubmit {
                queue,
                submits,
                fence,
            } => {
                required_handle(*queue, "queue", &["VUID-vkQueueSubmit-queue-parameter"])?;

                device.validate_queue_submit(*queue, submits, optional(*fence))
            }
            &ApiCall::QueueWaitIdle { queue } => {
                required_handle(queue, "queue", &["VUID-vkQueueWaitIdle-queue-parameter"])?;

                device.validate_queue_wait_idle(queue)
            }
            ApiCall::DeviceWaitIdle | ApiCall::DestroyDevice => Ok(()),
        }
    }

    /// Records the effects of a call after the driver executed it.
    ///
    /// `verdict` must be the verdict that [`pre_call`](Self::pre_call) returned for the same
    /// call, and `result` what the driver returned, or the result of [`CallAction::Skip`] if the
    /// call was not forwarded. Nothing is recorded if `result` is an error code, which is
    /// returned as the error.
    pub fn post_call(
        &self,
        call: &ApiCall,
        verdict: &Verdict,
        result: vk::Result,
    ) -> Result<CallOutput, VulkanError> {
        let _span = tracing::debug_span!("post_call", call = call.name(), ?result).entered();

        if result.as_raw() < 0 {
            return Err(VulkanError::from(result));
        }

        let device = &*self.device;
        let is_valid = verdict.is_valid();

        // Objects that the driver created exist, whether or not the call was valid.
        let created = match (call, &verdict.decoded) {
            (ApiCall::AllocateMemory { .. }, Some(Decoded::MemoryAllocateInfo(info))) => {
                Some(device.record_allocate_memory(info.clone()).erase())
            }
            (ApiCall::CreateBuffer { .. }, Some(Decoded::BufferCreateInfo(info))) => {
                Some(device.record_create_buffer(info.clone()).erase())
            }
            (ApiCall::CreateImage { .. }, Some(Decoded::ImageCreateInfo(info))) => {
                Some(device.record_create_image(info.clone()).erase())
            }
            (ApiCall::CreateSampler { .. }, Some(Decoded::SamplerCreateInfo(info))) => {
                Some(device.record_create_sampler(info.clone()).erase())
            }
            (ApiCall::CreateFence { .. }, Some(Decoded::FenceCreateInfo(info))) => {
                Some(device.record_create_fence(info.clone()).erase())
            }
            (ApiCall::CreateSemaphore { .. }, Some(Decoded::SemaphoreCreateInfo(info))) => {
                Some(device.record_create_semaphore(info.clone()).erase())
            }
            (ApiCall::CreateBufferView { create_info }, _) => {
                Some(device.record_create_buffer_view(create_info.clone()).erase())
            }
            (ApiCall::CreateImageView { create_info }, _) => {
                Some(device.record_create_image_view(create_info.clone()).erase())
            }
            (ApiCall::CreateEvent, _) => {
                Some(device.create_event(EventCreateInfo::default()).erase())
            }
            (ApiCall::CreateQueryPool { create_info }, _) => {
                Some(device.record_create_query_pool(create_info.clone()).erase())
            }
            (ApiCall::CreateCommandPool { create_info }, _) => {
                Some(device.record_create_command_pool(create_info.clone()).erase())
            }
            (ApiCall::CreateDescriptorSetLayout { create_info }, _) => Some(
                device
                    .record_create_descriptor_set_layout(create_info.clone())
                    .erase(),
            ),
            (ApiCall::CreateDescriptorPool { create_info }, _) => {
                Some(device.record_create_descriptor_pool(create_info.clone()).erase())
            }
            (ApiCall::CreatePipeline { create_info }, _) => {
                Some(device.record_create_pipeline(create_info.clone()).erase())
            }
            _ => None,
        };

        if let Some(object) = created {
            return Ok(CallOutput::Created(object));
        }

        match call {
            ApiCall::AllocateCommandBuffers { allocate_info } => {
                let command_buffers = device.record_allocate_command_buffers(allocate_info.clone());

                return Ok(CallOutput::Allocated(
                    command_buffers.into_iter().map(Id::erase).collect(),
                ));
            }
            ApiCall::AllocateDescriptorSets { allocate_info } => {
                let descriptor_sets =
                    device.record_allocate_descriptor_sets(allocate_info.clone())?;

                return Ok(CallOutput::Allocated(
                    descriptor_sets.into_iter().map(Id::erase).collect(),
                ));
            }
            &ApiCall::GetFenceStatus { fence } => {
                let signaled = result == vk::Result::SUCCESS;

                if is_valid {
                    device.record_get_fence_status(fence, signaled);
                }

                return Ok(CallOutput::Signaled(signaled));
            }
            ApiCall::GetEventStatus { .. } => {
                return Ok(CallOutput::Signaled(result == vk::Result::EVENT_SET));
            }
            ApiCall::DestroyDevice => {
                device.record_destroy();

                return Ok(CallOutput::None);
            }
            _ => (),
        }

        if !is_valid {
            tracing::debug!("not recording the effects of an invalid call");

            return Ok(CallOutput::None);
        }

        match call {
            &ApiCall::FreeMemory { memory } => device.record_free_memory(memory),
            &ApiCall::MapMemory {
                memory,
                offset,
                size,
                ..
            } => device.record_map_memory(
                memory,
                MemoryMapInfo {
                    offset,
                    size,
                    ..Default::default()
                },
            ),
            &ApiCall::UnmapMemory { memory } => device.record_unmap_memory(memory),
            &ApiCall::DestroyBuffer { buffer } => device.record_destroy_buffer(buffer),
            &ApiCall::DestroyBufferView { buffer_view } => {
                device.record_destroy_buffer_view(buffer_view)
            }
            &ApiCall::DestroyImage { image } => device.record_destroy_image(image),
            &ApiCall::DestroyImageView { image_view } => {
                device.record_destroy_image_view(image_view)
            }
            &ApiCall::DestroySampler { sampler } => device.record_destroy_sampler(sampler),
            &ApiCall::BindBufferMemory {
                buffer,
                memory,
                memory_offset,
            } => device.record_bind_buffer_memory(buffer, memory, memory_offset),
            &ApiCall::BindImageMemory {
                image,
                memory,
                memory_offset,
            } => device.record_bind_image_memory(image, memory, memory_offset),
            &ApiCall::DestroyFence { fence } => device.record_destroy_fence(fence),
            ApiCall::ResetFences { fences } => device.record_reset_fences(fences),
            ApiCall::WaitForFences { fences, .. } => {
                // A timeout leaves every fence as it was.
                if result == vk::Result::SUCCESS {
                    let wait_all = matches!(verdict.decoded, Some(Decoded::WaitAll(true)));
                    device.record_wait_for_fences(fences, wait_all);
                }
            }
            ApiCall::ImportFenceFd { fence, import_info } => {
                device.record_import_fence_fd(*fence, import_info.clone())
            }
            &ApiCall::GetFenceFd { fence, handle_type } => {
                device.record_get_fence_fd(fence, handle_type)
            }
            &ApiCall::DestroySemaphore { semaphore } => device.record_destroy_semaphore(semaphore),
            ApiCall::ImportSemaphoreFd {
                semaphore,
                import_info,
            } => device.record_import_semaphore_fd(*semaphore, import_info.clone()),
            &ApiCall::GetSemaphoreFd {
                semaphore,
                handle_type,
            } => device.record_get_semaphore_fd(semaphore, handle_type),
            &ApiCall::DestroyEvent { event } => device.record_destroy_event(event),
            &ApiCall::SetEvent { event } => device.record_set_event(event, true),
            &ApiCall::ResetEvent { event } => device.record_set_event(event, false),
            &ApiCall::DestroyQueryPool { query_pool } => {
                device.record_destroy_query_pool(query_pool)
            }
            &ApiCall::ResetQueryPool {
                query_pool,
                first_query,
                query_count,
            } => device.record_reset_query_pool(query_pool, first_query, query_count),
            &ApiCall::DestroyCommandPool { command_pool } => {
                device.record_destroy_command_pool(command_pool)
            }
            &ApiCall::ResetCommandPool { command_pool } => {
                device.record_reset_command_pool(command_pool)
            }
            ApiCall::FreeCommandBuffers {
                command_pool,
                command_buffers,
            } => device.record_free_command_buffers(*command_pool, command_buffers),
            ApiCall::BeginCommandBuffer {
                command_buffer,
                begin_info,
            } => device.record_begin_command_buffer(*command_buffer, begin_info.clone()),
            &ApiCall::EndCommandBuffer { command_buffer } => {
                device.record_end_command_buffer(command_buffer)
            }
            &ApiCall::ResetCommandBuffer { command_buffer } => {
                device.record_reset_command_buffer(command_buffer)
            }
            ApiCall::CmdCopyBuffer {
                command_buffer,
                copy_buffer_info,
            } => device.record_cmd_copy_buffer(*command_buffer, copy_buffer_info),
            &ApiCall::CmdFillBuffer {
                command_buffer,
                dst_buffer,
                ..
            } => device.record_cmd_fill_buffer(command_buffer, dst_buffer),
            ApiCall::CmdClearColorImage {
                command_buffer,
                clear_info,
            } => device.record_cmd_clear_color_image(*command_buffer, clear_info),
            &ApiCall::CmdBindPipeline {
                command_buffer,
                pipeline,
                ..
            } => {
                if let Some(Decoded::PipelineBindPoint(pipeline_bind_point)) = verdict.decoded {
                    device.record_cmd_bind_pipeline(command_buffer, pipeline_bind_point, pipeline);
                }
            }
            ApiCall::CmdBindDescriptorSets {
                command_buffer,
                first_set,
                descriptor_sets,
                ..
            } => {
                if let Some(Decoded::PipelineBindPoint(pipeline_bind_point)) = verdict.decoded {
                    device.record_cmd_bind_descriptor_sets(
                        *command_buffer,
                        pipeline_bind_point,
                        *first_set,
                        descriptor_sets,
                    );
                }
            }
            &ApiCall::CmdDraw { command_buffer, .. } => device.record_cmd_draw(command_buffer),
            &ApiCall::CmdDispatch { command_buffer, .. } => {
                device.record_cmd_dispatch(command_buffer)
            }
            &ApiCall::CmdSetEvent {
                command_buffer,
                event,
            } => device.record_cmd_event(command_buffer, event, true),
            &ApiCall::CmdResetEvent {
                command_buffer,
                event,
            } => device.record_cmd_event(command_buffer, event, false),
            &ApiCall::CmdResetQueryPool {
                command_buffer,
                query_pool,
                first_query,
                query_count,
            } => device.record_cmd_reset_query_pool(
                command_buffer,
                query_pool,
                first_query,
                query_count,
            ),
            &ApiCall::CmdBeginQuery {
                command_buffer,
                query_pool,
                query,
            } => device.record_cmd_begin_query(command_buffer, query_pool, query),
            &ApiCall::CmdEndQuery {
                command_buffer,
                query_pool,
                query,
            } => device.record_cmd_end_query(command_buffer, query_pool, query),
            &ApiCall::CmdWriteTimestamp {
                command_buffer,
                query_pool,
                query,
            } => device.record_cmd_write_timestamp(command_buffer, query_pool, query),
            ApiCall::CmdExecuteCommands {
                command_buffer,
                command_buffers,
            } => device.record_cmd_execute_commands(*command_buffer, command_buffers),
            &ApiCall::DestroyDescriptorSetLayout {
                descriptor_set_layout,
            } => device.record_destroy_descriptor_set_layout(descriptor_set_layout),
            &ApiCall::DestroyDescriptorPool { descriptor_pool } => {
                device.record_destroy_descriptor_pool(descriptor_pool)
            }
            &ApiCall::ResetDescriptorPool { descriptor_pool } => {
                device.record_reset_descriptor_pool(descriptor_pool)
            }
            ApiCall::FreeDescriptorSets {
                descriptor_pool,
                descriptor_sets,
            } => device.record_free_descriptor_sets(*descriptor_pool, descriptor_sets),
            ApiCall::UpdateDescriptorSets { descriptor_writes } => {
                device.record_update_descriptor_sets(descriptor_writes)
            }
            &ApiCall::DestroyPipeline { pipeline } => device.record_destroy_pipeline(pipeline),
            ApiCall::QueueSubmit {
                queue,
                submits,
                fence,
            } => device.record_queue_submit(*queue, submits, optional(*fence)),
            &ApiCall::QueueWaitIdle { queue } => device.record_queue_wait_idle(queue),
            ApiCall::DeviceWaitIdle => device.device_wait_idle(),
            _ => (),
        }

        Ok(CallOutput::None)
    }
}

fn optional<T>(id: Id<T>) -> Option<Id<T>> {
    (!id.is_null()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::{ApiCall, CallAction, CallOutput, Dispatcher};
    use crate::{
        buffer::Buffer,
        command_buffer::CommandBufferUsage,
        handle::Id,
        memory::DeviceMemory,
        queue::SubmitInfo,
        sync::{fence::Fence, SignalState},
        tests::recorded_copy,
        validate::{RawBufferCreateInfo, RawMemoryAllocateInfo, RawSamplerCreateInfo},
        ValidationErrorKind, VulkanError,
    };
    use ash::vk;

    /// Runs a call through the dispatcher the way a host would, with a driver that succeeds.
    fn call(dispatcher: &Dispatcher, call: ApiCall) -> (CallAction, Option<CallOutput>) {
        let verdict = dispatcher.pre_call(&call);
        let result = match verdict.action {
            CallAction::Forward => vk::Result::SUCCESS,
            CallAction::Skip(result) => result,
        };

        (
            verdict.action,
            dispatcher.post_call(&call, &verdict, result).ok(),
        )
    }

    fn created<T: crate::object::Object>(output: Option<CallOutput>) -> Id<T> {
        match output {
            Some(CallOutput::Created(object)) => object.downcast().unwrap(),
            other => panic!("expected a created object, got {:?}", other),
        }
    }

    fn uniform_buffer() -> ApiCall {
        ApiCall::CreateBuffer {
            create_info: RawBufferCreateInfo {
                size: 256,
                usage: vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw(),
                ..Default::default()
            },
        }
    }

    fn memory(size: u64) -> ApiCall {
        ApiCall::AllocateMemory {
            allocate_info: RawMemoryAllocateInfo {
                allocation_size: size,
                memory_type_index: 0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn parameter_errors_are_skipped() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let call = ApiCall::CreateBuffer {
            create_info: RawBufferCreateInfo {
                size: 256,
                usage: 0x4000_0000,
                ..Default::default()
            },
        };
        let verdict = dispatcher.pre_call(&call);
        assert_eq!(
            verdict.action,
            CallAction::Skip(vk::Result::ERROR_VALIDATION_FAILED_EXT)
        );
        assert_eq!(verdict.errors[0].kind, ValidationErrorKind::Parameter);
        assert_eq!(verdict.errors[0].context, "create_info.usage");
        assert!(log.contains("VUID-VkBufferCreateInfo-usage-parameter"));

        assert_eq!(
            dispatcher.post_call(&call, &verdict, vk::Result::ERROR_VALIDATION_FAILED_EXT),
            Err(VulkanError::ValidationFailed),
        );
        assert_eq!(device.objects.buffers.len(), 0);
    }

    #[test]
    fn created_objects_are_registered() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let (action, output) = call(&dispatcher, uniform_buffer());
        assert_eq!(action, CallAction::Forward);
        let buffer: Id<Buffer> = created(output);
        assert_eq!(device.get(buffer).unwrap().size(), 256);

        // A lenient boolean is a warning; the call goes through.
        let (action, output) = call(
            &dispatcher,
            ApiCall::CreateSampler {
                create_info: RawSamplerCreateInfo {
                    unnormalized_coordinates: 2,
                    ..Default::default()
                },
            },
        );
        assert_eq!(action, CallAction::Forward);
        assert!(matches!(output, Some(CallOutput::Created(_))));
        assert!(log.contains(crate::validate::UNRECOGNIZED_BOOL32_VUID));

        // A failing driver creates nothing.
        let call = uniform_buffer();
        let verdict = dispatcher.pre_call(&call);
        assert_eq!(
            dispatcher.post_call(&call, &verdict, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            Err(VulkanError::OutOfDeviceMemory),
        );
        assert_eq!(device.objects.buffers.len(), 1);
    }

    #[test]
    fn state_errors_are_forwarded_but_not_recorded() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let buffer: Id<Buffer> = created(call(&dispatcher, uniform_buffer()).1);
        let bound_memory: Id<DeviceMemory> = created(call(&dispatcher, memory(4096)).1);
        let other: Id<DeviceMemory> = created(call(&dispatcher, memory(4096)).1);

        let bind = |memory| ApiCall::BindBufferMemory {
            buffer,
            memory,
            memory_offset: 0,
        };
        assert_eq!(call(&dispatcher, bind(bound_memory)).0, CallAction::Forward);

        let verdict = dispatcher.pre_call(&bind(other));
        assert_eq!(verdict.action, CallAction::Forward);
        assert_eq!(verdict.errors[0].kind, ValidationErrorKind::State);
        assert!(log.contains("VUID-vkBindBufferMemory-buffer-07459"));

        dispatcher
            .post_call(&bind(other), &verdict, vk::Result::SUCCESS)
            .unwrap();
        assert_eq!(device.get(buffer).unwrap().memory().unwrap().memory, bound_memory);
    }

    #[test]
    fn lifetime_errors_are_skipped() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let buffer: Id<Buffer> = created(call(&dispatcher, uniform_buffer()).1);
        assert_eq!(
            call(&dispatcher, ApiCall::DestroyBuffer { buffer }).0,
            CallAction::Forward
        );

        let verdict = dispatcher.pre_call(&ApiCall::DestroyBuffer { buffer });
        assert_eq!(
            verdict.action,
            CallAction::Skip(vk::Result::ERROR_VALIDATION_FAILED_EXT)
        );
        assert_eq!(verdict.errors[0].kind, ValidationErrorKind::Lifetime);
        assert!(log.contains("VUID-vkDestroyBuffer-buffer-parameter"));

        // Destroying the null handle does nothing, and is valid.
        let verdict = dispatcher.pre_call(&ApiCall::DestroyBuffer { buffer: Id::NULL });
        assert!(verdict.is_valid());
        assert_eq!(verdict.action, CallAction::Forward);
    }

    #[test]
    fn required_handles() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device);

        let verdict = dispatcher.pre_call(&ApiCall::BindBufferMemory {
            buffer: Id::NULL,
            memory: Id::NULL,
            memory_offset: 0,
        });
        assert_eq!(
            verdict.action,
            CallAction::Skip(vk::Result::ERROR_VALIDATION_FAILED_EXT)
        );
        assert!(log.contains_message(
            "VUID-vkBindBufferMemory-buffer-parameter",
            "specified as VK_NULL_HANDLE",
        ));

        let verdict = dispatcher.pre_call(&ApiCall::MapMemory {
            memory: Id::from_raw(1),
            offset: 0,
            size: vk::WHOLE_SIZE,
            flags: 1,
        });
        assert!(verdict.errors[0].is("VUID-vkMapMemory-flags-zerobitmask"));
    }

    #[test]
    fn submit_of_destroyed_dependency_is_skipped() {
        let (device, queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());
        let (cb, src) = recorded_copy(&device, CommandBufferUsage::empty());

        assert_eq!(
            call(&dispatcher, ApiCall::DestroyBuffer { buffer: src }).0,
            CallAction::Forward,
        );

        let submit = ApiCall::QueueSubmit {
            queue,
            submits: vec![SubmitInfo::command_buffers([cb])],
            fence: Id::NULL,
        };
        let verdict = dispatcher.pre_call(&submit);
        assert_eq!(
            verdict.action,
            CallAction::Skip(vk::Result::ERROR_VALIDATION_FAILED_EXT)
        );
        assert_eq!(verdict.errors[0].kind, ValidationErrorKind::Lifetime);
        assert!(log.contains("VUID-vkQueueSubmit-pCommandBuffers-00070"));

        assert_eq!(
            dispatcher.post_call(&submit, &verdict, vk::Result::ERROR_VALIDATION_FAILED_EXT),
            Err(VulkanError::ValidationFailed),
        );
        assert_eq!(device.get(cb).unwrap().pending_count(), 0);
    }

    #[test]
    fn fence_results() {
        let (device, queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let fence: Id<Fence> = created(
            call(
                &dispatcher,
                ApiCall::CreateFence {
                    create_info: Default::default(),
                },
            )
            .1,
        );
        let submit = ApiCall::QueueSubmit {
            queue,
            submits: vec![SubmitInfo::default()],
            fence,
        };
        assert_eq!(call(&dispatcher, submit).0, CallAction::Forward);

        // The driver says the submission has not completed yet.
        let status = ApiCall::GetFenceStatus { fence };
        let verdict = dispatcher.pre_call(&status);
        assert_eq!(
            dispatcher.post_call(&status, &verdict, vk::Result::NOT_READY),
            Ok(CallOutput::Signaled(false)),
        );

        let wait = ApiCall::WaitForFences {
            fences: vec![fence],
            wait_all: 3,
            timeout: 0,
        };
        let verdict = dispatcher.pre_call(&wait);
        assert!(log.contains(crate::validate::UNRECOGNIZED_BOOL32_VUID));
        dispatcher
            .post_call(&wait, &verdict, vk::Result::TIMEOUT)
            .unwrap();
        assert!(device.get(fence).unwrap().signal_state().is_pending());

        dispatcher
            .post_call(&wait, &verdict, vk::Result::SUCCESS)
            .unwrap();
        assert_eq!(
            device.get(fence).unwrap().signal_state(),
            SignalState::Signaled
        );
        assert_eq!(
            call(&dispatcher, status).1,
            Some(CallOutput::Signaled(true))
        );
    }

    #[test]
    fn teardown() {
        let (device, _queue, log) = test_device!();
        let dispatcher = Dispatcher::new(device.clone());

        let _: Id<Buffer> = created(call(&dispatcher, uniform_buffer()).1);
        let (action, _) = call(&dispatcher, ApiCall::DestroyDevice);
        assert_eq!(action, CallAction::Forward);
        assert_eq!(log.count("VUID-vkDestroyDevice-device-00378"), 1);
        assert_eq!(device.objects.buffers.len(), 0);
    }
}
