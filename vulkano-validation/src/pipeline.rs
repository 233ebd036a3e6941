// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pipelines, and the descriptors that their shaders consume.
//!
//! Shaders are not compiled or reflected here. Instead, the descriptor bindings that the shaders
//! of a pipeline access are supplied when the pipeline is created, as a list of
//! [`DescriptorRequirement`]s. They are checked against the set layouts of the pipeline at
//! creation, and against the bound descriptor sets when a draw or dispatch is recorded.

use crate::{
    descriptor_set::{DescriptorSetLayout, DescriptorType},
    device::Device,
    handle::Id,
    object::UseCount,
    ValidationError, ValidationErrorKind,
};

vulkan_enum! {
    /// The type of a pipeline, and the point where it is bound in a command buffer.
    PipelineBindPoint = PipelineBindPoint(i32);

    Compute = COMPUTE,

    Graphics = GRAPHICS,
}

/// A descriptor binding that the shaders of a pipeline access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorRequirement {
    /// The descriptor set number.
    pub set: u32,

    /// The binding number within the set.
    pub binding: u32,

    /// The type of descriptor that the shader expects.
    pub descriptor_type: DescriptorType,

    /// The number of array elements that the shader accesses, starting at element 0.
    pub descriptor_count: u32,
}

/// Parameters to create a new `Pipeline`.
#[derive(Clone, Debug)]
pub struct PipelineCreateInfo {
    /// Whether the pipeline is a graphics or a compute pipeline.
    ///
    /// The default value is `PipelineBindPoint::Graphics`.
    pub bind_point: PipelineBindPoint,

    /// The descriptor set layouts of the pipeline layout, indexed by set number.
    ///
    /// The default value is empty.
    pub set_layouts: Vec<Id<DescriptorSetLayout>>,

    /// The descriptor bindings that the shaders of the pipeline access.
    ///
    /// The default value is empty.
    pub descriptor_requirements: Vec<DescriptorRequirement>,

    pub _ne: crate::NonExhaustive,
}

impl Default for PipelineCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            bind_point: PipelineBindPoint::Graphics,
            set_layouts: Vec::new(),
            descriptor_requirements: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl PipelineCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            bind_point,
            ref set_layouts,
            ref descriptor_requirements,
            _ne: _,
        } = self;

        let max_bound_descriptor_sets = device.properties().max_bound_descriptor_sets;

        if set_layouts.len() > max_bound_descriptor_sets as usize {
            return Err(Box::new(ValidationError {
                context: "set_layouts".into(),
                problem: format!(
                    "has a length greater than the `max_bound_descriptor_sets` limit {}",
                    max_bound_descriptor_sets,
                )
                .into(),
                vuids: &["VUID-VkPipelineLayoutCreateInfo-setLayoutCount-00286"],
                ..Default::default()
            }));
        }

        let mut layouts = Vec::with_capacity(set_layouts.len());

        for (index, &layout) in set_layouts.iter().enumerate() {
            let layout_record = device
                .lookup(
                    layout,
                    "",
                    &["VUID-VkPipelineLayoutCreateInfo-pSetLayouts-parameter"],
                )
                .map_err(|err| err.add_context(format!("set_layouts[{}]", index)))?;
            layouts.push(layout_record);
        }

        let (missing_vuids, type_vuids, count_vuids): (
            &'static [&'static str],
            &'static [&'static str],
            &'static [&'static str],
        ) = match bind_point {
            PipelineBindPoint::Graphics => (
                &["VUID-VkGraphicsPipelineCreateInfo-layout-07988"],
                &["VUID-VkGraphicsPipelineCreateInfo-layout-07990"],
                &["VUID-VkGraphicsPipelineCreateInfo-layout-07991"],
            ),
            PipelineBindPoint::Compute => (
                &["VUID-VkComputePipelineCreateInfo-layout-07988"],
                &["VUID-VkComputePipelineCreateInfo-layout-07990"],
                &["VUID-VkComputePipelineCreateInfo-layout-07991"],
            ),
        };

        for (index, requirement) in descriptor_requirements.iter().enumerate() {
            let context = || format!("descriptor_requirements[{}]", index);
            let layout_binding = layouts
                .get(requirement.set as usize)
                .and_then(|layout| layout.binding(requirement.binding));

            let Some(layout_binding) = layout_binding else {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: format!(
                        "the shader accesses set {} binding {}, which is not present in \
                        `set_layouts`",
                        requirement.set, requirement.binding,
                    )
                    .into(),
                    vuids: missing_vuids,
                    ..Default::default()
                }));
            };

            if layout_binding.descriptor_type != requirement.descriptor_type {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: format!(
                        "the shader expects descriptors of type `DescriptorType::{:?}`, but the \
                        layout binding has type `DescriptorType::{:?}`",
                        requirement.descriptor_type, layout_binding.descriptor_type,
                    )
                    .into(),
                    vuids: type_vuids,
                    ..Default::default()
                }));
            }

            if layout_binding.descriptor_count < requirement.descriptor_count {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: format!(
                        "the shader accesses {} descriptors, but the layout binding has only {}",
                        requirement.descriptor_count, layout_binding.descriptor_count,
                    )
                    .into(),
                    vuids: count_vuids,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// A graphics or compute pipeline.
#[derive(Debug)]
pub struct Pipeline {
    bind_point: PipelineBindPoint,
    set_layouts: Vec<Id<DescriptorSetLayout>>,
    descriptor_requirements: Vec<DescriptorRequirement>,
    use_count: UseCount,
}

impl_object!(Pipeline, Pipeline, pipelines);

impl Pipeline {
    #[inline]
    pub fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    #[inline]
    pub fn set_layouts(&self) -> &[Id<DescriptorSetLayout>] {
        &self.set_layouts
    }

    #[inline]
    pub fn descriptor_requirements(&self) -> &[DescriptorRequirement] {
        &self.descriptor_requirements
    }
}

impl Device {
    /// Creates a new pipeline.
    pub fn create_pipeline(
        &self,
        create_info: PipelineCreateInfo,
    ) -> Result<Id<Pipeline>, Box<ValidationError>> {
        self.reported(self.validate_create_pipeline(&create_info))?;

        Ok(self.record_create_pipeline(create_info))
    }

    pub fn validate_create_pipeline(
        &self,
        create_info: &PipelineCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_pipeline(&self, create_info: PipelineCreateInfo) -> Id<Pipeline> {
        let PipelineCreateInfo {
            bind_point,
            set_layouts,
            descriptor_requirements,
            _ne: _,
        } = create_info;

        self.objects.pipelines.register(Pipeline {
            bind_point,
            set_layouts,
            descriptor_requirements,
            use_count: UseCount::default(),
        })
    }

    /// Destroys a pipeline.
    pub fn destroy_pipeline(&self, pipeline: Id<Pipeline>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_pipeline(pipeline))?;
        self.record_destroy_pipeline(pipeline);

        Ok(())
    }

    pub fn validate_destroy_pipeline(
        &self,
        pipeline: Id<Pipeline>,
    ) -> Result<(), Box<ValidationError>> {
        let pipeline_record = self.lookup(
            pipeline,
            "pipeline",
            &["VUID-vkDestroyPipeline-pipeline-parameter"],
        )?;

        if pipeline_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "pipeline".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    pipeline.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyPipeline-pipeline-00765"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_pipeline(&self, pipeline: Id<Pipeline>) {
        let _ = self.objects.pipelines.erase(pipeline);
    }
}
