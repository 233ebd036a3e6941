// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Typed commands that can be recorded into a command buffer.
//!
//! Each command checks its own parameters against the current state of the objects it refers
//! to, and adds those objects (and the memory they are bound to) to the in-use set of the
//! command buffer.

use super::{CommandBuffer, CommandBufferLevel, CommandBufferState, CommandBufferUsage};
use crate::{
    binding::ResourceMemory,
    buffer::{Buffer, BufferUsage},
    descriptor_set::DescriptorSet,
    device::Device,
    format::FormatFeatures,
    handle::Id,
    image::{Image, ImageAspects, ImageSubresourceRange, ImageTiling, ImageUsage},
    object::ObjectRef,
    pipeline::{Pipeline, PipelineBindPoint},
    query::{QueryOp, QueryPipelineStatisticFlags, QueryPool, QueryType},
    queue::QueueFlags,
    sync::event::Event,
    DeviceSize, ValidationError, ValidationErrorKind,
};
use ash::vk;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// A region of data to copy between buffers.
#[derive(Clone, Debug)]
pub struct BufferCopy {
    /// The offset in bytes from the start of the source buffer.
    ///
    /// The default value is `0`.
    pub src_offset: DeviceSize,

    /// The offset in bytes from the start of the destination buffer.
    ///
    /// The default value is `0`.
    pub dst_offset: DeviceSize,

    /// The number of bytes to copy.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCopy {
    #[inline]
    fn default() -> Self {
        Self {
            src_offset: 0,
            dst_offset: 0,
            size: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Parameters to copy data from a buffer to another buffer.
#[derive(Clone, Debug)]
pub struct CopyBufferInfo {
    /// The buffer to copy from.
    ///
    /// There is no default value.
    pub src_buffer: Id<Buffer>,

    /// The buffer to copy to.
    ///
    /// There is no default value.
    pub dst_buffer: Id<Buffer>,

    /// The regions of both buffers to copy between.
    ///
    /// The default value is empty, which must be overridden.
    pub regions: SmallVec<[BufferCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyBufferInfo {
    /// Returns a `CopyBufferInfo` that copies the first `size` bytes of `src_buffer` to the
    /// start of `dst_buffer`.
    #[inline]
    pub fn buffers(src_buffer: Id<Buffer>, dst_buffer: Id<Buffer>, size: DeviceSize) -> Self {
        Self {
            src_buffer,
            dst_buffer,
            regions: smallvec![BufferCopy {
                size,
                ..Default::default()
            }],
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            src_buffer,
            dst_buffer,
            ref regions,
            _ne: _,
        } = self;

        let src_buffer_record = device.lookup(
            src_buffer,
            "src_buffer",
            &["VUID-vkCmdCopyBuffer-srcBuffer-parameter"],
        )?;
        let dst_buffer_record = device.lookup(
            dst_buffer,
            "dst_buffer",
            &["VUID-vkCmdCopyBuffer-dstBuffer-parameter"],
        )?;

        if !src_buffer_record.usage().intersects(BufferUsage::TRANSFER_SRC) {
            return Err(Box::new(ValidationError {
                context: "src_buffer.usage()".into(),
                problem: "does not contain `BufferUsage::TRANSFER_SRC`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-srcBuffer-00118"],
                ..Default::default()
            }));
        }

        validate_buffer_bound(
            &src_buffer_record,
            "src_buffer",
            &["VUID-vkCmdCopyBuffer-srcBuffer-00119"],
        )?;

        if !dst_buffer_record.usage().intersects(BufferUsage::TRANSFER_DST) {
            return Err(Box::new(ValidationError {
                context: "dst_buffer.usage()".into(),
                problem: "does not contain `BufferUsage::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-dstBuffer-00120"],
                ..Default::default()
            }));
        }

        validate_buffer_bound(
            &dst_buffer_record,
            "dst_buffer",
            &["VUID-vkCmdCopyBuffer-dstBuffer-00121"],
        )?;

        if regions.is_empty() {
            return Err(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdCopyBuffer-regionCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let src_size = src_buffer_record.size();
        let dst_size = dst_buffer_record.size();

        for (region_index, region) in regions.iter().enumerate() {
            let &BufferCopy {
                src_offset,
                dst_offset,
                size,
                _ne: _,
            } = region;

            if size == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].size", region_index).into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkBufferCopy-size-01988"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }

            if src_offset >= src_size {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`regions[{0}].src_offset` is not less than the size of `src_buffer`",
                        region_index,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdCopyBuffer-srcOffset-00113"],
                    ..Default::default()
                }));
            }

            if dst_offset >= dst_size {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`regions[{0}].dst_offset` is not less than the size of `dst_buffer`",
                        region_index,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdCopyBuffer-dstOffset-00114"],
                    ..Default::default()
                }));
            }

            if size > src_size - src_offset {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`regions[{0}].src_offset + regions[{0}].size` is greater than the size \
                        of `src_buffer`",
                        region_index,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdCopyBuffer-size-00115"],
                    ..Default::default()
                }));
            }

            if size > dst_size - dst_offset {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`regions[{0}].dst_offset + regions[{0}].size` is greater than the size \
                        of `dst_buffer`",
                        region_index,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdCopyBuffer-size-00116"],
                    ..Default::default()
                }));
            }

            if src_buffer == dst_buffer
                && src_offset < dst_offset + size
                && dst_offset < src_offset + size
            {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`src_buffer` and `dst_buffer` are the same buffer, and the source and \
                        destination ranges of `regions[{}]` overlap",
                        region_index,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdCopyBuffer-pRegions-00117"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Parameters to clear a color image.
#[derive(Clone, Debug)]
pub struct ClearColorImageInfo {
    /// The image to clear.
    ///
    /// There is no default value.
    pub image: Id<Image>,

    /// The subresource ranges of `image` to clear.
    ///
    /// The default value is a single range that covers the whole image.
    pub regions: SmallVec<[ImageSubresourceRange; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl ClearColorImageInfo {
    /// Returns a `ClearColorImageInfo` that clears the first mip level and array layer of
    /// `image`.
    #[inline]
    pub fn image(image: Id<Image>) -> Self {
        Self {
            image,
            regions: smallvec![ImageSubresourceRange::default()],
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            image,
            ref regions,
            _ne: _,
        } = self;

        let image_record =
            device.lookup(image, "image", &["VUID-vkCmdClearColorImage-image-parameter"])?;

        let format_properties = device.format_properties(image_record.format());
        let format_features = match image_record.tiling() {
            ImageTiling::Optimal => format_properties.optimal_tiling_features,
            ImageTiling::Linear => format_properties.linear_tiling_features,
        };

        if !format_features.intersects(FormatFeatures::TRANSFER_DST) {
            return Err(Box::new(ValidationError {
                context: "image.format()".into(),
                problem: "the format features do not contain `FormatFeatures::TRANSFER_DST`"
                    .into(),
                vuids: &["VUID-vkCmdClearColorImage-image-01993"],
                ..Default::default()
            }));
        }

        if !image_record.usage().intersects(ImageUsage::TRANSFER_DST) {
            return Err(Box::new(ValidationError {
                context: "image.usage()".into(),
                problem: "does not contain `ImageUsage::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdClearColorImage-image-00002"],
                ..Default::default()
            }));
        }

        if !image_record.is_sparse() && image_record.memory().is_none() {
            return Err(Box::new(ValidationError {
                context: "image".into(),
                problem: "is not bound to memory".into(),
                vuids: &["VUID-vkCmdClearColorImage-image-00003"],
                ..Default::default()
            }));
        }

        if image_record.format().is_depth_stencil() || image_record.format().compression().is_some()
        {
            return Err(Box::new(ValidationError {
                context: "image.format()".into(),
                problem: "is a depth/stencil format or a compressed format".into(),
                vuids: &["VUID-vkCmdClearColorImage-image-00007"],
                ..Default::default()
            }));
        }

        if regions.is_empty() {
            return Err(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdClearColorImage-rangeCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        for (region_index, subresource_range) in regions.iter().enumerate() {
            subresource_range
                .validate()
                .map_err(|err| err.add_context(format!("regions[{}]", region_index)))?;

            if subresource_range.aspects != ImageAspects::COLOR {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].aspects", region_index).into(),
                    problem: "is not `ImageAspects::COLOR`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-aspectMask-02498"],
                    ..Default::default()
                }));
            }

            if subresource_range.mip_levels.start >= image_record.mip_levels() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].mip_levels.start", region_index).into(),
                    problem: "is not less than `image.mip_levels()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-baseMipLevel-01470"],
                    ..Default::default()
                }));
            }

            if subresource_range.mip_levels.end > image_record.mip_levels() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].mip_levels.end", region_index).into(),
                    problem: "is greater than `image.mip_levels()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-pRanges-01692"],
                    ..Default::default()
                }));
            }

            if subresource_range.array_layers.start >= image_record.array_layers() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].array_layers.start", region_index).into(),
                    problem: "is not less than `image.array_layers()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-baseArrayLayer-01472"],
                    ..Default::default()
                }));
            }

            if subresource_range.array_layers.end > image_record.array_layers() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].array_layers.end", region_index).into(),
                    problem: "is greater than `image.array_layers()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-pRanges-01693"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

fn validate_buffer_bound(
    buffer_record: &Buffer,
    context: &'static str,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if !buffer_record.is_sparse() && buffer_record.memory().is_none() {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: "is not bound to memory".into(),
            vuids,
            ..Default::default()
        }));
    }

    Ok(())
}

/// Returns a resource together with the memory it is bound to.
fn with_memory(object: ObjectRef, memory: Option<ResourceMemory>) -> [Option<ObjectRef>; 2] {
    [Some(object), memory.map(|memory| memory.memory.erase())]
}

/// The VUIDs of a command that consumes the bound pipeline and descriptor sets.
struct DrawVuids {
    command_buffer_parameter: &'static [&'static str],
    recording: &'static [&'static str],
    cmdpool: &'static [&'static str],
    pipeline_bound: &'static [&'static str],
    set_compatible: &'static [&'static str],
    descriptor_valid: &'static [&'static str],
}

const DRAW_VUIDS: DrawVuids = DrawVuids {
    command_buffer_parameter: &["VUID-vkCmdDraw-commandBuffer-parameter"],
    recording: &["VUID-vkCmdDraw-commandBuffer-recording"],
    cmdpool: &["VUID-vkCmdDraw-commandBuffer-cmdpool"],
    pipeline_bound: &["VUID-vkCmdDraw-None-08606"],
    set_compatible: &["VUID-vkCmdDraw-None-02697"],
    descriptor_valid: &["VUID-vkCmdDraw-None-08114"],
};

const DISPATCH_VUIDS: DrawVuids = DrawVuids {
    command_buffer_parameter: &["VUID-vkCmdDispatch-commandBuffer-parameter"],
    recording: &["VUID-vkCmdDispatch-commandBuffer-recording"],
    cmdpool: &["VUID-vkCmdDispatch-commandBuffer-cmdpool"],
    pipeline_bound: &["VUID-vkCmdDispatch-None-08606"],
    set_compatible: &["VUID-vkCmdDispatch-None-02697"],
    descriptor_valid: &["VUID-vkCmdDispatch-None-08114"],
};

impl Device {
    /// Copies data from a buffer to another buffer.
    pub fn cmd_copy_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        copy_buffer_info: CopyBufferInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_copy_buffer(command_buffer, &copy_buffer_info))?;
        self.record_cmd_copy_buffer(command_buffer, &copy_buffer_info);

        Ok(())
    }

    pub fn validate_cmd_copy_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        copy_buffer_info: &CopyBufferInfo,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdCopyBuffer-commandBuffer-parameter"],
            &["VUID-vkCmdCopyBuffer-commandBuffer-recording"],
        )?;
        self.validate_queue_flags(
            &command_buffer_record,
            QueueFlags::TRANSFER | QueueFlags::GRAPHICS | QueueFlags::COMPUTE,
            &["VUID-vkCmdCopyBuffer-commandBuffer-cmdpool"],
        )?;

        copy_buffer_info
            .validate(self)
            .map_err(|err| err.add_context("copy_buffer_info"))
    }

    pub fn record_cmd_copy_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        copy_buffer_info: &CopyBufferInfo,
    ) {
        let objects =
            self.buffer_objects(&[copy_buffer_info.src_buffer, copy_buffer_info.dst_buffer]);
        self.record_command_unchecked(command_buffer, &objects);
    }

    /// Fills a range of a buffer with a repeated 32-bit value.
    ///
    /// `size` can be [`vk::WHOLE_SIZE`] to fill up to the end of the buffer.
    pub fn cmd_fill_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        dst_buffer: Id<Buffer>,
        dst_offset: DeviceSize,
        size: DeviceSize,
        data: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_fill_buffer(
            command_buffer,
            dst_buffer,
            dst_offset,
            size,
            data,
        ))?;
        self.record_cmd_fill_buffer(command_buffer, dst_buffer);

        Ok(())
    }

    pub fn validate_cmd_fill_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        dst_buffer: Id<Buffer>,
        dst_offset: DeviceSize,
        size: DeviceSize,
        _data: u32,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdFillBuffer-commandBuffer-parameter"],
            &["VUID-vkCmdFillBuffer-commandBuffer-recording"],
        )?;
        self.validate_queue_flags(
            &command_buffer_record,
            QueueFlags::TRANSFER | QueueFlags::GRAPHICS | QueueFlags::COMPUTE,
            &["VUID-vkCmdFillBuffer-commandBuffer-cmdpool"],
        )?;

        let buffer_record = self.lookup(
            dst_buffer,
            "dst_buffer",
            &["VUID-vkCmdFillBuffer-dstBuffer-parameter"],
        )?;
        let buffer_size = buffer_record.size();

        if dst_offset >= buffer_size {
            return Err(Box::new(ValidationError {
                context: "dst_offset".into(),
                problem: "is not less than the size of `dst_buffer`".into(),
                vuids: &["VUID-vkCmdFillBuffer-dstOffset-00024"],
                ..Default::default()
            }));
        }

        if dst_offset % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: "dst_offset".into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-vkCmdFillBuffer-dstOffset-00025"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if size != vk::WHOLE_SIZE {
            if size == 0 {
                return Err(Box::new(ValidationError {
                    context: "size".into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-vkCmdFillBuffer-size-00026"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }

            if size > buffer_size - dst_offset {
                return Err(Box::new(ValidationError {
                    problem: "`dst_offset + size` is greater than the size of `dst_buffer`".into(),
                    vuids: &["VUID-vkCmdFillBuffer-size-00027"],
                    ..Default::default()
                }));
            }

            if size % 4 != 0 {
                return Err(Box::new(ValidationError {
                    context: "size".into(),
                    problem: "is not a multiple of 4".into(),
                    vuids: &["VUID-vkCmdFillBuffer-size-00028"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }
        }

        if !buffer_record.usage().intersects(BufferUsage::TRANSFER_DST) {
            return Err(Box::new(ValidationError {
                context: "dst_buffer.usage()".into(),
                problem: "does not contain `BufferUsage::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdFillBuffer-dstBuffer-00029"],
                ..Default::default()
            }));
        }

        validate_buffer_bound(
            &buffer_record,
            "dst_buffer",
            &["VUID-vkCmdFillBuffer-dstBuffer-00031"],
        )
    }

    pub fn record_cmd_fill_buffer(
        &self,
        command_buffer: Id<CommandBuffer>,
        dst_buffer: Id<Buffer>,
    ) {
        let objects = self.buffer_objects(&[dst_buffer]);
        self.record_command_unchecked(command_buffer, &objects);
    }

    fn buffer_objects(&self, buffers: &[Id<Buffer>]) -> SmallVec<[ObjectRef; 4]> {
        buffers
            .iter()
            .filter_map(|&buffer| {
                let buffer_record = self.objects.buffers.get(buffer).ok()?;
                Some(with_memory(buffer.erase(), buffer_record.memory()))
            })
            .flatten()
            .flatten()
            .collect()
    }

    /// Clears a color image to a constant value.
    pub fn cmd_clear_color_image(
        &self,
        command_buffer: Id<CommandBuffer>,
        clear_info: ClearColorImageInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_clear_color_image(command_buffer, &clear_info))?;
        self.record_cmd_clear_color_image(command_buffer, &clear_info);

        Ok(())
    }

    pub fn validate_cmd_clear_color_image(
        &self,
        command_buffer: Id<CommandBuffer>,
        clear_info: &ClearColorImageInfo,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdClearColorImage-commandBuffer-parameter"],
            &["VUID-vkCmdClearColorImage-commandBuffer-recording"],
        )?;
        self.validate_queue_flags(
            &command_buffer_record,
            QueueFlags::GRAPHICS | QueueFlags::COMPUTE,
            &["VUID-vkCmdClearColorImage-commandBuffer-cmdpool"],
        )?;

        clear_info
            .validate(self)
            .map_err(|err| err.add_context("clear_info"))
    }

    pub fn record_cmd_clear_color_image(
        &self,
        command_buffer: Id<CommandBuffer>,
        clear_info: &ClearColorImageInfo,
    ) {
        let Ok(image_record) = self.objects.images.get(clear_info.image) else {
            return;
        };
        let objects: SmallVec<[ObjectRef; 2]> =
            with_memory(clear_info.image.erase(), image_record.memory())
                .into_iter()
                .flatten()
                .collect();
        self.record_command_unchecked(command_buffer, &objects);
    }

    /// Binds a pipeline to a command buffer.
    pub fn cmd_bind_pipeline(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        pipeline: Id<Pipeline>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_bind_pipeline(
            command_buffer,
            pipeline_bind_point,
            pipeline,
        ))?;
        self.record_cmd_bind_pipeline(command_buffer, pipeline_bind_point, pipeline);

        Ok(())
    }

    pub fn validate_cmd_bind_pipeline(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        pipeline: Id<Pipeline>,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdBindPipeline-commandBuffer-parameter"],
            &["VUID-vkCmdBindPipeline-commandBuffer-recording"],
        )?;
        let pipeline_record = self.lookup(
            pipeline,
            "pipeline",
            &["VUID-vkCmdBindPipeline-pipeline-parameter"],
        )?;

        let (queue_flags, queue_vuids, bind_point_vuids): (
            QueueFlags,
            &'static [&'static str],
            &'static [&'static str],
        ) = match pipeline_bind_point {
            PipelineBindPoint::Compute => (
                QueueFlags::COMPUTE,
                &["VUID-vkCmdBindPipeline-pipelineBindPoint-00777"],
                &["VUID-vkCmdBindPipeline-pipelineBindPoint-00779"],
            ),
            PipelineBindPoint::Graphics => (
                QueueFlags::GRAPHICS,
                &["VUID-vkCmdBindPipeline-pipelineBindPoint-00778"],
                &["VUID-vkCmdBindPipeline-pipelineBindPoint-00780"],
            ),
        };

        self.validate_queue_flags(&command_buffer_record, queue_flags, queue_vuids)?;

        if pipeline_record.bind_point() != pipeline_bind_point {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`pipeline_bind_point` is `PipelineBindPoint::{:?}`, but `pipeline` is a \
                    {:?} pipeline",
                    pipeline_bind_point,
                    pipeline_record.bind_point(),
                )
                .into(),
                vuids: bind_point_vuids,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_bind_pipeline(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        pipeline: Id<Pipeline>,
    ) {
        self.with_recording(command_buffer, |state| {
            state.bound_pipelines.insert(pipeline_bind_point, pipeline);
            state.in_use.insert(pipeline.erase());
        });
    }

    /// Binds descriptor sets to a command buffer, starting at set number `first_set` of the
    /// layout of `pipeline`.
    pub fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        pipeline: Id<Pipeline>,
        first_set: u32,
        descriptor_sets: &[Id<DescriptorSet>],
        dynamic_offsets: &[u32],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_bind_descriptor_sets(
            command_buffer,
            pipeline_bind_point,
            pipeline,
            first_set,
            descriptor_sets,
            dynamic_offsets,
        ))?;
        self.record_cmd_bind_descriptor_sets(
            command_buffer,
            pipeline_bind_point,
            first_set,
            descriptor_sets,
        );

        Ok(())
    }

    pub fn validate_cmd_bind_descriptor_sets(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        pipeline: Id<Pipeline>,
        first_set: u32,
        descriptor_sets: &[Id<DescriptorSet>],
        dynamic_offsets: &[u32],
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdBindDescriptorSets-commandBuffer-parameter"],
            &["VUID-vkCmdBindDescriptorSets-commandBuffer-recording"],
        )?;
        let pipeline_record = self.lookup(
            pipeline,
            "pipeline",
            &["VUID-vkCmdBindDescriptorSets-layout-parameter"],
        )?;

        let queue_flags = match pipeline_bind_point {
            PipelineBindPoint::Compute => QueueFlags::COMPUTE,
            PipelineBindPoint::Graphics => QueueFlags::GRAPHICS,
        };
        self.validate_queue_flags(
            &command_buffer_record,
            queue_flags,
            &["VUID-vkCmdBindDescriptorSets-pipelineBindPoint-00361"],
        )?;

        if descriptor_sets.is_empty() {
            return Err(Box::new(ValidationError {
                context: "descriptor_sets".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-descriptorSetCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let set_layouts = pipeline_record.set_layouts();

        if first_set as usize + descriptor_sets.len() > set_layouts.len() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`first_set + descriptor_sets.len()` is greater than the number of set \
                    layouts of `pipeline` ({})",
                    set_layouts.len(),
                )
                .into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-firstSet-00360"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let mut dynamic_descriptor_count = 0;

        for (index, &descriptor_set) in descriptor_sets.iter().enumerate() {
            let set_record = self
                .lookup(
                    descriptor_set,
                    "",
                    &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-parameter"],
                )
                .map_err(|err| err.add_context(format!("descriptor_sets[{}]", index)))?;
            let set_num = first_set as usize + index;

            if set_record.layout() != set_layouts[set_num] {
                return Err(Box::new(ValidationError {
                    context: format!("descriptor_sets[{}]", index).into(),
                    problem: format!(
                        "was not allocated with the layout of set {} of `pipeline`",
                        set_num,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-00358"],
                    ..Default::default()
                }));
            }

            dynamic_descriptor_count += set_record.dynamic_descriptor_count();
        }

        if dynamic_offsets.len() != dynamic_descriptor_count as usize {
            return Err(Box::new(ValidationError {
                context: "dynamic_offsets".into(),
                problem: format!(
                    "has a length of {}, but the descriptor sets contain {} dynamic descriptors",
                    dynamic_offsets.len(),
                    dynamic_descriptor_count,
                )
                .into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-dynamicOffsetCount-00359"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_bind_descriptor_sets(
        &self,
        command_buffer: Id<CommandBuffer>,
        pipeline_bind_point: PipelineBindPoint,
        first_set: u32,
        descriptor_sets: &[Id<DescriptorSet>],
    ) {
        let versions: SmallVec<[_; 4]> = descriptor_sets
            .iter()
            .map(|&set| {
                let version = self
                    .objects
                    .descriptor_sets
                    .get(set)
                    .map_or(0, |set_record| set_record.version());
                (set, version)
            })
            .collect();

        self.with_recording(command_buffer, |state| {
            for (set_num, (set, version)) in (first_set..).zip(versions) {
                state
                    .bound_descriptor_sets
                    .insert((pipeline_bind_point, set_num), (set, version));
                state.in_use.insert(set.erase());
            }
        });
    }

    /// Records a draw with the bound graphics pipeline.
    pub fn cmd_draw(
        &self,
        command_buffer: Id<CommandBuffer>,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_draw(
            command_buffer,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        ))?;
        self.record_cmd_draw(command_buffer);

        Ok(())
    }

    pub fn validate_cmd_draw(
        &self,
        command_buffer: Id<CommandBuffer>,
        _vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.validate_pipeline_use(command_buffer, PipelineBindPoint::Graphics, &DRAW_VUIDS)
            .map(|_| ())
    }

    pub fn record_cmd_draw(&self, command_buffer: Id<CommandBuffer>) {
        self.record_pipeline_use(command_buffer, PipelineBindPoint::Graphics);
    }

    /// Records a dispatch of compute work with the bound compute pipeline.
    pub fn cmd_dispatch(
        &self,
        command_buffer: Id<CommandBuffer>,
        group_counts: [u32; 3],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_dispatch(command_buffer, group_counts))?;
        self.record_cmd_dispatch(command_buffer);

        Ok(())
    }

    pub fn validate_cmd_dispatch(
        &self,
        command_buffer: Id<CommandBuffer>,
        _group_counts: [u32; 3],
    ) -> Result<(), Box<ValidationError>> {
        self.validate_pipeline_use(command_buffer, PipelineBindPoint::Compute, &DISPATCH_VUIDS)
            .map(|_| ())
    }

    pub fn record_cmd_dispatch(&self, command_buffer: Id<CommandBuffer>) {
        self.record_pipeline_use(command_buffer, PipelineBindPoint::Compute);
    }

    /// Checks the bound pipeline and the descriptors that its shaders access, and returns the
    /// objects that the descriptors refer to.
    fn validate_pipeline_use(
        &self,
        command_buffer: Id<CommandBuffer>,
        bind_point: PipelineBindPoint,
        vuids: &DrawVuids,
    ) -> Result<SmallVec<[ObjectRef; 8]>, Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            vuids.command_buffer_parameter,
            vuids.recording,
        )?;
        let queue_flags = match bind_point {
            PipelineBindPoint::Compute => QueueFlags::COMPUTE,
            PipelineBindPoint::Graphics => QueueFlags::GRAPHICS,
        };
        self.validate_queue_flags(&command_buffer_record, queue_flags, vuids.cmdpool)?;

        let (pipeline, bound_sets) = {
            let state = command_buffer_record.state.lock();
            let pipeline = state.bound_pipelines.get(&bind_point).copied();
            let bound_sets: SmallVec<[(u32, Id<DescriptorSet>); 4]> = state
                .bound_descriptor_sets
                .iter()
                .filter(|&(&(point, _), _)| point == bind_point)
                .map(|(&(_, set_num), &(set, _))| (set_num, set))
                .collect();

            (pipeline, bound_sets)
        };

        let Some(pipeline) = pipeline else {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "no pipeline is bound to `PipelineBindPoint::{:?}`",
                    bind_point,
                )
                .into(),
                vuids: vuids.pipeline_bound,
                ..Default::default()
            }));
        };

        let pipeline_record = self
            .lookup(pipeline, "", vuids.pipeline_bound)
            .map_err(|err| err.add_context("the bound pipeline"))?;
        let mut objects = SmallVec::new();

        for requirement in pipeline_record.descriptor_requirements() {
            let bound_set = bound_sets
                .iter()
                .find(|&&(set_num, _)| set_num == requirement.set)
                .map(|&(_, set)| set);
            let expected_layout = pipeline_record.set_layouts().get(requirement.set as usize);

            let set_record = bound_set
                .and_then(|set| self.objects.descriptor_sets.get(set).ok())
                .filter(|set_record| Some(&set_record.layout()) == expected_layout);

            let Some(set_record) = set_record else {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the bound pipeline accesses descriptor set {}, but no compatible \
                        descriptor set is bound to that set number",
                        requirement.set,
                    )
                    .into(),
                    vuids: vuids.set_compatible,
                    ..Default::default()
                }));
            };

            let referents = set_record
                .resolve_binding(self, requirement.binding, requirement.descriptor_count)
                .map_err(|problem| {
                    Box::new(ValidationError {
                        problem: format!(
                            "the bound pipeline accesses descriptor set {}, but {}",
                            requirement.set, problem,
                        )
                        .into(),
                        vuids: vuids.descriptor_valid,
                        ..Default::default()
                    })
                })?;
            objects.extend(referents);
        }

        Ok(objects)
    }

    fn record_pipeline_use(
        &self,
        command_buffer: Id<CommandBuffer>,
        bind_point: PipelineBindPoint,
    ) {
        let Ok(command_buffer_record) = self.objects.command_buffers.get(command_buffer) else {
            return;
        };
        let (pipeline, bound_sets) = {
            let state = command_buffer_record.state.lock();
            let pipeline = state.bound_pipelines.get(&bind_point).copied();
            let bound_sets: SmallVec<[(u32, Id<DescriptorSet>); 4]> = state
                .bound_descriptor_sets
                .iter()
                .filter(|&(&(point, _), _)| point == bind_point)
                .map(|(&(_, set_num), &(set, _))| (set_num, set))
                .collect();

            (pipeline, bound_sets)
        };

        let mut objects: SmallVec<[ObjectRef; 8]> = SmallVec::new();

        if let Some(pipeline) = pipeline {
            objects.push(pipeline.erase());

            if let Ok(pipeline_record) = self.objects.pipelines.get(pipeline) {
                for requirement in pipeline_record.descriptor_requirements() {
                    let Some(&(_, set)) = bound_sets
                        .iter()
                        .find(|&&(set_num, _)| set_num == requirement.set)
                    else {
                        continue;
                    };
                    objects.push(set.erase());

                    if let Ok(set_record) = self.objects.descriptor_sets.get(set) {
                        if let Ok(referents) = set_record.resolve_binding(
                            self,
                            requirement.binding,
                            requirement.descriptor_count,
                        ) {
                            objects.extend(referents);
                        }
                    }
                }
            }
        }

        command_buffer_record.state.lock().in_use.extend(objects);
    }

    /// Sets an event when the command buffer executes.
    pub fn cmd_set_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_set_event(command_buffer, event))?;
        self.record_cmd_event(command_buffer, event, true);

        Ok(())
    }

    pub fn validate_cmd_set_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    ) -> Result<(), Box<ValidationError>> {
        self.validate_cmd_event(
            command_buffer,
            event,
            &EventVuids {
                command_buffer_parameter: &["VUID-vkCmdSetEvent-commandBuffer-parameter"],
                recording: &["VUID-vkCmdSetEvent-commandBuffer-recording"],
                event_parameter: &["VUID-vkCmdSetEvent-event-parameter"],
                cmdpool: &["VUID-vkCmdSetEvent-commandBuffer-cmdpool"],
            },
        )
    }

    /// Resets an event when the command buffer executes.
    pub fn cmd_reset_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_reset_event(command_buffer, event))?;
        self.record_cmd_event(command_buffer, event, false);

        Ok(())
    }

    pub fn validate_cmd_reset_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
    ) -> Result<(), Box<ValidationError>> {
        self.validate_cmd_event(
            command_buffer,
            event,
            &EventVuids {
                command_buffer_parameter: &["VUID-vkCmdResetEvent-commandBuffer-parameter"],
                recording: &["VUID-vkCmdResetEvent-commandBuffer-recording"],
                event_parameter: &["VUID-vkCmdResetEvent-event-parameter"],
                cmdpool: &["VUID-vkCmdResetEvent-commandBuffer-cmdpool"],
            },
        )
    }

    fn validate_cmd_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
        vuids: &EventVuids,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            vuids.command_buffer_parameter,
            vuids.recording,
        )?;
        self.lookup(event, "event", vuids.event_parameter)?;
        self.validate_queue_flags(
            &command_buffer_record,
            QueueFlags::GRAPHICS | QueueFlags::COMPUTE,
            vuids.cmdpool,
        )
    }

    /// Records a command that sets or resets an event.
    pub fn record_cmd_event(
        &self,
        command_buffer: Id<CommandBuffer>,
        event: Id<Event>,
        signaled: bool,
    ) {
        self.with_recording(command_buffer, |state| {
            state.in_use.insert(event.erase());
            state.event_ops.push((event, signaled));
        });
    }

    /// Resets a range of queries of a pool to the unavailable state.
    pub fn cmd_reset_query_pool(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_reset_query_pool(
            command_buffer,
            query_pool,
            first_query,
            query_count,
        ))?;
        self.record_cmd_reset_query_pool(command_buffer, query_pool, first_query, query_count);

        Ok(())
    }

    pub fn validate_cmd_reset_query_pool(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdResetQueryPool-commandBuffer-parameter"],
            &["VUID-vkCmdResetQueryPool-commandBuffer-recording"],
        )?;
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkCmdResetQueryPool-queryPool-parameter"],
        )?;

        if first_query >= query_pool_record.query_count() {
            return Err(Box::new(ValidationError {
                context: "first_query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkCmdResetQueryPool-firstQuery-09436"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if u64::from(first_query) + u64::from(query_count)
            > u64::from(query_pool_record.query_count())
        {
            return Err(Box::new(ValidationError {
                problem: "`first_query + query_count` is greater than the number of queries in \
                    `query_pool`"
                    .into(),
                vuids: &["VUID-vkCmdResetQueryPool-firstQuery-09437"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_reset_query_pool(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) {
        self.record_query_op(
            command_buffer,
            QueryOp::Reset {
                query_pool,
                first_query,
                query_count,
            },
        );
    }

    /// Begins a query.
    pub fn cmd_begin_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_begin_query(command_buffer, query_pool, query))?;
        self.record_cmd_begin_query(command_buffer, query_pool, query);

        Ok(())
    }

    pub fn validate_cmd_begin_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdBeginQuery-commandBuffer-parameter"],
            &["VUID-vkCmdBeginQuery-commandBuffer-recording"],
        )?;
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkCmdBeginQuery-queryPool-parameter"],
        )?;

        if query >= query_pool_record.query_count() {
            return Err(Box::new(ValidationError {
                context: "query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkCmdBeginQuery-query-00802"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let query_type = query_pool_record.query_type();

        match query_type {
            QueryType::Timestamp => {
                return Err(Box::new(ValidationError {
                    context: "query_pool.query_type()".into(),
                    problem: "is `QueryType::Timestamp`".into(),
                    vuids: &["VUID-vkCmdBeginQuery-queryType-02804"],
                    ..Default::default()
                }));
            }
            QueryType::Occlusion => {
                self.validate_queue_flags(
                    &command_buffer_record,
                    QueueFlags::GRAPHICS,
                    &["VUID-vkCmdBeginQuery-queryType-00803"],
                )?;
            }
            QueryType::PipelineStatistics => {
                let statistics = query_pool_record.pipeline_statistics();

                if statistics
                    .intersects(!QueryPipelineStatisticFlags::COMPUTE_SHADER_INVOCATIONS)
                {
                    self.validate_queue_flags(
                        &command_buffer_record,
                        QueueFlags::GRAPHICS,
                        &["VUID-vkCmdBeginQuery-queryType-00804"],
                    )?;
                }

                if statistics.intersects(QueryPipelineStatisticFlags::COMPUTE_SHADER_INVOCATIONS) {
                    self.validate_queue_flags(
                        &command_buffer_record,
                        QueueFlags::COMPUTE,
                        &["VUID-vkCmdBeginQuery-queryType-00805"],
                    )?;
                }
            }
        }

        let state = command_buffer_record.state.lock();

        if let Some(&(_, active_query, _)) = state
            .active_queries
            .iter()
            .find(|&&(_, _, active_type)| active_type == query_type)
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "query {} of the same type is already active in `command_buffer`",
                    active_query,
                )
                .into(),
                vuids: &["VUID-vkCmdBeginQuery-queryPool-01922"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_begin_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) {
        let Ok(query_pool_record) = self.objects.query_pools.get(query_pool) else {
            return;
        };
        let query_type = query_pool_record.query_type();

        self.with_recording(command_buffer, |state| {
            state.active_queries.push((query_pool, query, query_type));
            state.in_use.insert(query_pool.erase());
            state.query_ops.push(QueryOp::Begin { query_pool, query });
        });
    }

    /// Ends an active query.
    pub fn cmd_end_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_end_query(command_buffer, query_pool, query))?;
        self.record_cmd_end_query(command_buffer, query_pool, query);

        Ok(())
    }

    pub fn validate_cmd_end_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdEndQuery-commandBuffer-parameter"],
            &["VUID-vkCmdEndQuery-commandBuffer-recording"],
        )?;
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkCmdEndQuery-queryPool-parameter"],
        )?;

        if query >= query_pool_record.query_count() {
            return Err(Box::new(ValidationError {
                context: "query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkCmdEndQuery-query-00810"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let is_active = command_buffer_record
            .state
            .lock()
            .active_queries
            .iter()
            .any(|&(pool, active_query, _)| pool == query_pool && active_query == query);

        if !is_active {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "query {} of `query_pool` is not active in `command_buffer`",
                    query,
                )
                .into(),
                vuids: &["VUID-vkCmdEndQuery-None-01923"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_end_query(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) {
        self.with_recording(command_buffer, |state| {
            state.active_queries.retain(|&mut (pool, active_query, _)| {
                !(pool == query_pool && active_query == query)
            });
            state.query_ops.push(QueryOp::End { query_pool, query });
        });
    }

    /// Writes a timestamp to a query.
    pub fn cmd_write_timestamp(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_write_timestamp(command_buffer, query_pool, query))?;
        self.record_cmd_write_timestamp(command_buffer, query_pool, query);

        Ok(())
    }

    pub fn validate_cmd_write_timestamp(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdWriteTimestamp-commandBuffer-parameter"],
            &["VUID-vkCmdWriteTimestamp-commandBuffer-recording"],
        )?;
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkCmdWriteTimestamp-queryPool-parameter"],
        )?;

        if query_pool_record.query_type() != QueryType::Timestamp {
            return Err(Box::new(ValidationError {
                context: "query_pool.query_type()".into(),
                problem: "is not `QueryType::Timestamp`".into(),
                vuids: &["VUID-vkCmdWriteTimestamp-queryPool-01416"],
                ..Default::default()
            }));
        }

        if query >= query_pool_record.query_count() {
            return Err(Box::new(ValidationError {
                context: "query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkCmdWriteTimestamp-query-04904"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_cmd_write_timestamp(
        &self,
        command_buffer: Id<CommandBuffer>,
        query_pool: Id<QueryPool>,
        query: u32,
    ) {
        self.record_query_op(command_buffer, QueryOp::Timestamp { query_pool, query });
    }

    fn record_query_op(&self, command_buffer: Id<CommandBuffer>, op: QueryOp) {
        let query_pool = match op {
            QueryOp::Reset { query_pool, .. }
            | QueryOp::Begin { query_pool, .. }
            | QueryOp::End { query_pool, .. }
            | QueryOp::Timestamp { query_pool, .. } => query_pool,
        };

        self.with_recording(command_buffer, |state| {
            state.in_use.insert(query_pool.erase());
            state.query_ops.push(op);
        });
    }

    /// Executes secondary command buffers from a primary command buffer.
    pub fn cmd_execute_commands(
        &self,
        command_buffer: Id<CommandBuffer>,
        command_buffers: &[Id<CommandBuffer>],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_cmd_execute_commands(command_buffer, command_buffers))?;
        self.record_cmd_execute_commands(command_buffer, command_buffers);

        Ok(())
    }

    pub fn validate_cmd_execute_commands(
        &self,
        command_buffer: Id<CommandBuffer>,
        command_buffers: &[Id<CommandBuffer>],
    ) -> Result<(), Box<ValidationError>> {
        let command_buffer_record = self.recording_command_buffer(
            command_buffer,
            &["VUID-vkCmdExecuteCommands-commandBuffer-parameter"],
            &["VUID-vkCmdExecuteCommands-commandBuffer-recording"],
        )?;

        if command_buffer_record.level() != CommandBufferLevel::Primary {
            return Err(Box::new(ValidationError {
                context: "command_buffer".into(),
                problem: "is not a primary command buffer".into(),
                vuids: &["VUID-vkCmdExecuteCommands-bufferlevel"],
                ..Default::default()
            }));
        }

        if command_buffers.is_empty() {
            return Err(Box::new(ValidationError {
                context: "command_buffers".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdExecuteCommands-commandBufferCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let already_recorded: SmallVec<[bool; 4]> = {
            let state = command_buffer_record.state.lock();
            command_buffers
                .iter()
                .map(|secondary| state.in_use.contains(&secondary.erase()))
                .collect()
        };

        for (index, &secondary) in command_buffers.iter().enumerate() {
            let context = || format!("command_buffers[{}]", index);
            let secondary_record = self
                .lookup(
                    secondary,
                    "",
                    &["VUID-vkCmdExecuteCommands-pCommandBuffers-parameter"],
                )
                .map_err(|err| err.add_context(context()))?;

            if secondary_record.level() != CommandBufferLevel::Secondary {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: "is not a secondary command buffer".into(),
                    vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00088"],
                    ..Default::default()
                }));
            }

            let (state, usage) = {
                let state = secondary_record.state.lock();
                (state.state, state.usage)
            };

            if !matches!(
                state,
                CommandBufferState::Executable | CommandBufferState::Pending
            ) {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: format!(
                        "is in the {:?} state, but must be executable or pending",
                        state,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00089"],
                    ..Default::default()
                }));
            }

            if !usage.intersects(CommandBufferUsage::SIMULTANEOUS_USE) {
                if state == CommandBufferState::Pending {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: "is pending execution, and was not begun with \
                            `CommandBufferUsage::SIMULTANEOUS_USE`"
                            .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00091"],
                        ..Default::default()
                    }));
                }

                if already_recorded[index] {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: "has already been recorded into `command_buffer`, and was not \
                            begun with `CommandBufferUsage::SIMULTANEOUS_USE`"
                            .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00092"],
                        ..Default::default()
                    }));
                }

                if command_buffers[..index].contains(&secondary) {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: "appears more than once in `command_buffers`, and was not \
                            begun with `CommandBufferUsage::SIMULTANEOUS_USE`"
                            .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00093"],
                        ..Default::default()
                    }));
                }
            }

            if secondary_record.queue_family_index() != command_buffer_record.queue_family_index()
            {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: "was allocated from a pool of a different queue family than \
                        `command_buffer`"
                        .into(),
                    vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00094"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_cmd_execute_commands(
        &self,
        command_buffer: Id<CommandBuffer>,
        command_buffers: &[Id<CommandBuffer>],
    ) {
        // Copied out first, so that a secondary is never locked while the primary is.
        let recorded: SmallVec<[_; 4]> = command_buffers
            .iter()
            .filter_map(|&secondary| {
                let secondary_record: Arc<CommandBuffer> =
                    self.objects.command_buffers.get(secondary).ok()?;
                let state = secondary_record.state.lock();

                Some((
                    secondary,
                    state.in_use.iter().copied().collect::<Vec<_>>(),
                    state.query_ops.clone(),
                    state.event_ops.clone(),
                ))
            })
            .collect();

        self.with_recording(command_buffer, |state| {
            for (secondary, in_use, query_ops, event_ops) in recorded {
                state.in_use.insert(secondary.erase());
                state.in_use.extend(in_use);
                state.query_ops.extend(query_ops);
                state.event_ops.extend(event_ops);
            }
        });
    }
}

struct EventVuids {
    command_buffer_parameter: &'static [&'static str],
    recording: &'static [&'static str],
    event_parameter: &'static [&'static str],
    cmdpool: &'static [&'static str],
}

#[cfg(test)]
mod tests {
    use super::{BufferCopy, ClearColorImageInfo, CopyBufferInfo};
    use crate::{
        buffer::BufferUsage,
        command_buffer::{
            CommandBufferAllocateInfo, CommandBufferLevel, CommandPoolCreateFlags,
            CommandPoolCreateInfo,
        },
        descriptor_set::{
            DescriptorPoolCreateInfo, DescriptorSetAllocateInfo, DescriptorSetLayoutBinding,
            DescriptorSetLayoutCreateInfo, DescriptorType, WriteDescriptorSet,
        },
        format::Format,
        image::{ImageCreateInfo, ImageSubresourceRange, ImageUsage},
        pipeline::{DescriptorRequirement, PipelineBindPoint, PipelineCreateInfo},
        query::{QueryPoolCreateInfo, QueryType},
        tests::{bound_buffer, command_buffer},
    };
    use smallvec::smallvec;

    #[test]
    fn copy_buffer() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let src = bound_buffer(&device, BufferUsage::TRANSFER_SRC, 1024);
        let dst = bound_buffer(&device, BufferUsage::TRANSFER_DST, 512);

        assert_should_fail!(
            device.cmd_copy_buffer(cb, CopyBufferInfo::buffers(src, dst, 256)),
            "VUID-vkCmdCopyBuffer-commandBuffer-recording",
        );

        device.begin_command_buffer(cb, Default::default()).unwrap();

        assert_should_fail!(
            device.cmd_copy_buffer(cb, CopyBufferInfo::buffers(dst, src, 256)),
            "VUID-vkCmdCopyBuffer-srcBuffer-00118",
        );
        assert_should_fail!(
            device.cmd_copy_buffer(cb, CopyBufferInfo::buffers(src, dst, 1024)),
            "VUID-vkCmdCopyBuffer-size-00116",
        );
        assert_should_fail!(
            device.cmd_copy_buffer(cb, CopyBufferInfo::buffers(src, dst, 0)),
            "VUID-VkBufferCopy-size-01988",
        );
        assert_should_fail!(
            device.cmd_copy_buffer(
                cb,
                CopyBufferInfo {
                    regions: smallvec![BufferCopy {
                        src_offset: 1024,
                        size: 4,
                        ..Default::default()
                    }],
                    ..CopyBufferInfo::buffers(src, dst, 0)
                },
            ),
            "VUID-vkCmdCopyBuffer-srcOffset-00113",
        );

        let both = bound_buffer(
            &device,
            BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
            1024,
        );
        assert_should_fail!(
            device.cmd_copy_buffer(
                cb,
                CopyBufferInfo {
                    regions: smallvec![BufferCopy {
                        src_offset: 0,
                        dst_offset: 128,
                        size: 256,
                        ..Default::default()
                    }],
                    ..CopyBufferInfo::buffers(both, both, 0)
                },
            ),
            "VUID-vkCmdCopyBuffer-pRegions-00117",
        );

        device
            .cmd_copy_buffer(cb, CopyBufferInfo::buffers(src, dst, 512))
            .unwrap();

        // Both buffers and both allocations are now in use by the command buffer.
        let in_use = device.get(cb).unwrap().in_use();
        assert_eq!(in_use.len(), 4);
        assert!(in_use.contains(&src.erase()));
        assert!(in_use.contains(&dst.erase()));
    }

    #[test]
    fn fill_buffer() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let buffer = bound_buffer(&device, BufferUsage::TRANSFER_DST, 256);
        let unbound = device
            .create_buffer(crate::buffer::BufferCreateInfo {
                size: 256,
                usage: BufferUsage::TRANSFER_DST,
                ..Default::default()
            })
            .unwrap();

        device.begin_command_buffer(cb, Default::default()).unwrap();

        assert_should_fail!(
            device.cmd_fill_buffer(cb, buffer, 256, 4, 0),
            "VUID-vkCmdFillBuffer-dstOffset-00024",
        );
        assert_should_fail!(
            device.cmd_fill_buffer(cb, buffer, 2, 4, 0),
            "VUID-vkCmdFillBuffer-dstOffset-00025",
        );
        assert_should_fail!(
            device.cmd_fill_buffer(cb, buffer, 0, 6, 0),
            "VUID-vkCmdFillBuffer-size-00028",
        );
        assert_should_fail!(
            device.cmd_fill_buffer(cb, buffer, 128, 256, 0),
            "VUID-vkCmdFillBuffer-size-00027",
        );
        assert_should_fail!(
            device.cmd_fill_buffer(cb, unbound, 0, 4, 0),
            "VUID-vkCmdFillBuffer-dstBuffer-00031",
        );

        device
            .cmd_fill_buffer(cb, buffer, 128, ash::vk::WHOLE_SIZE, 0xffff_ffff)
            .unwrap();
    }

    #[test]
    fn clear_color_image() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let image = device
            .create_image(ImageCreateInfo {
                format: Format::R8G8B8A8_UNORM,
                extent: [16, 16, 1],
                usage: ImageUsage::TRANSFER_DST,
                ..Default::default()
            })
            .unwrap();

        device.begin_command_buffer(cb, Default::default()).unwrap();
        assert_should_fail!(
            device.cmd_clear_color_image(cb, ClearColorImageInfo::image(image)),
            "VUID-vkCmdClearColorImage-image-00003",
        );

        let requirements = *device.get(image).unwrap().memory_requirements();
        let memory = device
            .allocate_memory(crate::memory::MemoryAllocateInfo {
                allocation_size: requirements.size,
                memory_type_index: requirements.memory_type_bits.trailing_zeros(),
                ..Default::default()
            })
            .unwrap();
        device.bind_image_memory(image, memory, 0).unwrap();

        assert_should_fail!(
            device.cmd_clear_color_image(
                cb,
                ClearColorImageInfo {
                    regions: smallvec![ImageSubresourceRange {
                        mip_levels: 0..2,
                        ..Default::default()
                    }],
                    ..ClearColorImageInfo::image(image)
                },
            ),
            "VUID-vkCmdClearColorImage-pRanges-01692",
        );
        assert_should_fail!(
            device.cmd_clear_color_image(
                cb,
                ClearColorImageInfo {
                    regions: smallvec![],
                    ..ClearColorImageInfo::image(image)
                },
            ),
            "VUID-vkCmdClearColorImage-rangeCount-arraylength",
        );

        device
            .cmd_clear_color_image(cb, ClearColorImageInfo::image(image))
            .unwrap();
        assert!(device.get(cb).unwrap().in_use().contains(&memory.erase()));
    }

    #[test]
    fn draw_descriptor_validity() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
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
                descriptor_requirements: vec![DescriptorRequirement {
                    set: 0,
                    binding: 0,
                    descriptor_type: DescriptorType::UniformBuffer,
                    descriptor_count: 1,
                }],
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

        device.begin_command_buffer(cb, Default::default()).unwrap();
        assert_should_fail!(device.cmd_draw(cb, 3, 1, 0, 0), "VUID-vkCmdDraw-None-08606");

        device
            .cmd_bind_pipeline(cb, PipelineBindPoint::Graphics, pipeline)
            .unwrap();
        assert_should_fail!(
            device.cmd_bind_pipeline(cb, PipelineBindPoint::Compute, pipeline),
            "VUID-vkCmdBindPipeline-pipelineBindPoint-00779",
        );
        assert_should_fail!(device.cmd_draw(cb, 3, 1, 0, 0), "VUID-vkCmdDraw-None-02697");

        assert_should_fail!(
            device.cmd_bind_descriptor_sets(
                cb,
                PipelineBindPoint::Graphics,
                pipeline,
                1,
                &[set],
                &[],
            ),
            "VUID-vkCmdBindDescriptorSets-firstSet-00360",
        );
        device
            .cmd_bind_descriptor_sets(cb, PipelineBindPoint::Graphics, pipeline, 0, &[set], &[])
            .unwrap();

        // The set is bound, but its binding was never written.
        assert_should_fail!(device.cmd_draw(cb, 3, 1, 0, 0), "VUID-vkCmdDraw-None-08114");

        let buffer = bound_buffer(&device, BufferUsage::UNIFORM_BUFFER, 256);
        device
            .update_descriptor_sets(&[WriteDescriptorSet::buffer(
                set,
                0,
                DescriptorType::UniformBuffer,
                buffer,
                0,
                256,
            )])
            .unwrap();
        device.cmd_draw(cb, 3, 1, 0, 0).unwrap();
        assert!(device.get(cb).unwrap().in_use().contains(&buffer.erase()));

        // The referenced buffer is gone, so the descriptor is no longer valid.
        let cb2 = command_buffer(&device, CommandPoolCreateFlags::empty());
        device.begin_command_buffer(cb2, Default::default()).unwrap();
        device
            .cmd_bind_pipeline(cb2, PipelineBindPoint::Graphics, pipeline)
            .unwrap();
        device
            .cmd_bind_descriptor_sets(cb2, PipelineBindPoint::Graphics, pipeline, 0, &[set], &[])
            .unwrap();
        device.destroy_buffer(buffer).unwrap();

        let err = device.cmd_draw(cb2, 3, 1, 0, 0).unwrap_err();
        assert!(err.is("VUID-vkCmdDraw-None-08114"));
        assert!(err.problem.contains("has been destroyed"));

        assert_should_fail!(
            device.cmd_dispatch(cb2, [1, 1, 1]),
            "VUID-vkCmdDispatch-None-08606",
        );
    }

    #[test]
    fn queries() {
        let (device, _queue, _log) = test_device!();
        let cb = command_buffer(&device, CommandPoolCreateFlags::empty());
        let occlusion = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                ..QueryPoolCreateInfo::query_type(QueryType::Occlusion)
            })
            .unwrap();
        let timestamps = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 2,
                ..QueryPoolCreateInfo::query_type(QueryType::Timestamp)
            })
            .unwrap();

        device.begin_command_buffer(cb, Default::default()).unwrap();
        device.cmd_reset_query_pool(cb, occlusion, 0, 4).unwrap();
        assert_should_fail!(
            device.cmd_reset_query_pool(cb, occlusion, 2, 3),
            "VUID-vkCmdResetQueryPool-firstQuery-09437",
        );

        assert_should_fail!(
            device.cmd_begin_query(cb, timestamps, 0),
            "VUID-vkCmdBeginQuery-queryType-02804",
        );
        assert_should_fail!(
            device.cmd_begin_query(cb, occlusion, 4),
            "VUID-vkCmdBeginQuery-query-00802",
        );

        device.cmd_begin_query(cb, occlusion, 0).unwrap();
        assert_should_fail!(
            device.cmd_begin_query(cb, occlusion, 1),
            "VUID-vkCmdBeginQuery-queryPool-01922",
        );
        assert_should_fail!(
            device.end_command_buffer(cb),
            "VUID-vkEndCommandBuffer-commandBuffer-00061",
        );
        assert_should_fail!(
            device.cmd_end_query(cb, occlusion, 1),
            "VUID-vkCmdEndQuery-None-01923",
        );
        device.cmd_end_query(cb, occlusion, 0).unwrap();

        assert_should_fail!(
            device.cmd_write_timestamp(cb, occlusion, 0),
            "VUID-vkCmdWriteTimestamp-queryPool-01416",
        );
        device.cmd_write_timestamp(cb, timestamps, 1).unwrap();
        device.end_command_buffer(cb).unwrap();
    }

    #[test]
    fn execute_commands() {
        let (device, _queue, _log) = test_device!();
        let command_pool = device
            .create_command_pool(CommandPoolCreateInfo::default())
            .unwrap();
        let secondaries = device
            .allocate_command_buffers(CommandBufferAllocateInfo {
                command_pool,
                level: CommandBufferLevel::Secondary,
                command_buffer_count: 2,
                ..Default::default()
            })
            .unwrap();
        let primary = command_buffer(&device, CommandPoolCreateFlags::empty());
        let event = device.create_event(Default::default());

        device.begin_command_buffer(primary, Default::default()).unwrap();
        assert_should_fail!(
            device.cmd_execute_commands(primary, &[secondaries[0]]),
            "VUID-vkCmdExecuteCommands-pCommandBuffers-00089",
        );

        device
            .begin_command_buffer(secondaries[0], Default::default())
            .unwrap();
        device.cmd_set_event(secondaries[0], event).unwrap();
        device.end_command_buffer(secondaries[0]).unwrap();

        assert_should_fail!(
            device.cmd_execute_commands(primary, &[primary]),
            "VUID-vkCmdExecuteCommands-pCommandBuffers-00088",
        );
        assert_should_fail!(
            device.cmd_execute_commands(primary, &[secondaries[0], secondaries[0]]),
            "VUID-vkCmdExecuteCommands-pCommandBuffers-00093",
        );

        device
            .cmd_execute_commands(primary, &[secondaries[0]])
            .unwrap();
        assert_should_fail!(
            device.cmd_execute_commands(primary, &[secondaries[0]]),
            "VUID-vkCmdExecuteCommands-pCommandBuffers-00092",
        );

        let in_use = device.get(primary).unwrap().in_use();
        assert!(in_use.contains(&secondaries[0].erase()));
        assert!(in_use.contains(&event.erase()));
        assert_eq!(device.get(primary).unwrap().state.lock().event_ops.len(), 1);
    }
}
