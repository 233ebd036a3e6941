// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Descriptor set layouts, descriptor pools and descriptor sets.
//!
//! A descriptor set holds references to resources that shaders access: buffers, buffer views,
//! image views and samplers. The references are weak: destroying a resource that a set refers to
//! is allowed, and only becomes an error once a command that uses the descriptor is submitted.
//!
//! Every update of a set bumps its version. Command buffers remember the version of each set at
//! the time it was bound, so that a set that is updated after it was bound is detected at
//! submission.

use crate::{
    buffer::{Buffer, BufferUsage, BufferView},
    device::Device,
    handle::Id,
    image::{ImageUsage, ImageView},
    object::{ObjectRef, UseCount},
    sampler::Sampler,
    DeviceSize, Validated, ValidationError, ValidationErrorKind, VulkanError,
};
use ash::vk;
use foldhash::HashMap;
use indexmap::IndexSet;
use parking_lot::Mutex;
use smallvec::SmallVec;

vulkan_enum! {
    /// Describes what kind of resource may later be bound to a descriptor.
    DescriptorType = DescriptorType(i32);

    /// Describes how a `SampledImage` descriptor should be read.
    Sampler = SAMPLER,

    /// Combines `SampledImage` and `Sampler` in one descriptor.
    CombinedImageSampler = COMBINED_IMAGE_SAMPLER,

    /// Gives read-only access to an image via a sampler.
    SampledImage = SAMPLED_IMAGE,

    /// Gives read and/or write access to individual pixels in an image.
    StorageImage = STORAGE_IMAGE,

    /// Gives read-only access to the content of a buffer, interpreted as an array of texel data.
    UniformTexelBuffer = UNIFORM_TEXEL_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as an array of
    /// texel data.
    StorageTexelBuffer = STORAGE_TEXEL_BUFFER,

    /// Gives read-only access to the content of a buffer, interpreted as a structure.
    UniformBuffer = UNIFORM_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as a structure.
    StorageBuffer = STORAGE_BUFFER,

    /// As `UniformBuffer`, but the offset within the buffer is specified at the time the
    /// descriptor set is bound.
    UniformBufferDynamic = UNIFORM_BUFFER_DYNAMIC,

    /// As `StorageBuffer`, but the offset within the buffer is specified at the time the
    /// descriptor set is bound.
    StorageBufferDynamic = STORAGE_BUFFER_DYNAMIC,

    /// Gives access to an image inside a fragment shader via a render pass.
    InputAttachment = INPUT_ATTACHMENT,
}

impl DescriptorType {
    /// Returns whether the offset of descriptors of this type is given when binding the set.
    #[inline]
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }
}

/// A binding in a descriptor set layout.
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorSetLayoutBinding {
    /// The binding number.
    ///
    /// The default value is `0`.
    pub binding: u32,

    /// The content type of the descriptors in this binding.
    ///
    /// The default value is `DescriptorType::UniformBuffer`.
    pub descriptor_type: DescriptorType,

    /// How many descriptors (array elements) this binding is made of.
    ///
    /// The default value is `1`.
    pub descriptor_count: u32,

    /// Samplers that are included as a fixed part of the descriptor set layout. Once bound, they
    /// do not need to be provided when writing the descriptor.
    ///
    /// If not empty, the length must equal `descriptor_count`, and `descriptor_type` must be
    /// `Sampler` or `CombinedImageSampler`.
    ///
    /// The default value is empty.
    pub immutable_samplers: Vec<Id<Sampler>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorSetLayoutBinding {
    #[inline]
    fn default() -> Self {
        Self {
            binding: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            descriptor_count: 1,
            immutable_samplers: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorSetLayoutBinding {
    /// Returns a binding of `descriptor_count` descriptors of the given type.
    #[inline]
    pub fn new(binding: u32, descriptor_type: DescriptorType, descriptor_count: u32) -> Self {
        Self {
            binding,
            descriptor_type,
            descriptor_count,
            ..Default::default()
        }
    }

    fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding: _,
            descriptor_type,
            descriptor_count,
            ref immutable_samplers,
            _ne: _,
        } = self;

        descriptor_type.validate_device(device).map_err(|err| {
            err.add_context("descriptor_type")
                .set_vuids(&["VUID-VkDescriptorSetLayoutBinding-descriptorType-parameter"])
        })?;

        if !immutable_samplers.is_empty() {
            if !matches!(
                descriptor_type,
                DescriptorType::Sampler | DescriptorType::CombinedImageSampler
            ) {
                return Err(Box::new(ValidationError {
                    problem: "`immutable_samplers` is not empty, but `descriptor_type` is not \
                        `DescriptorType::Sampler` or `DescriptorType::CombinedImageSampler`"
                        .into(),
                    vuids: &["VUID-VkDescriptorSetLayoutBinding-descriptorType-00282"],
                    ..Default::default()
                }));
            }

            if immutable_samplers.len() != descriptor_count as usize {
                return Err(Box::new(ValidationError {
                    problem: "`immutable_samplers` is not empty, but its length does not equal \
                        `descriptor_count`"
                        .into(),
                    vuids: &["VUID-VkDescriptorSetLayoutBinding-descriptorType-00282"],
                    ..Default::default()
                }));
            }

            for (index, &sampler) in immutable_samplers.iter().enumerate() {
                device
                    .lookup(
                        sampler,
                        "",
                        &["VUID-VkDescriptorSetLayoutBinding-descriptorType-00282"],
                    )
                    .map_err(|err| err.add_context(format!("immutable_samplers[{}]", index)))?;
            }
        }

        Ok(())
    }
}

/// Parameters to create a new `DescriptorSetLayout`.
#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutCreateInfo {
    /// The bindings of the layout. Binding numbers must be unique.
    ///
    /// The default value is empty.
    pub bindings: Vec<DescriptorSetLayoutBinding>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorSetLayoutCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorSetLayoutCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let Self { bindings, _ne: _ } = self;

        for (index, binding) in bindings.iter().enumerate() {
            binding
                .validate(device)
                .map_err(|err| err.add_context(format!("bindings[{}]", index)))?;

            if bindings[..index]
                .iter()
                .any(|other| other.binding == binding.binding)
            {
                return Err(Box::new(ValidationError {
                    context: "bindings".into(),
                    problem: format!(
                        "the binding number {} of element {} is also used by an earlier element",
                        binding.binding, index,
                    )
                    .into(),
                    vuids: &["VUID-VkDescriptorSetLayoutCreateInfo-binding-00279"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Describes the layout of all descriptors within a descriptor set.
#[derive(Debug)]
pub struct DescriptorSetLayout {
    bindings: Vec<DescriptorSetLayoutBinding>,
    use_count: UseCount,
}

impl_object!(DescriptorSetLayout, DescriptorSetLayout, descriptor_set_layouts);

impl DescriptorSetLayout {
    /// Returns the bindings of the layout, sorted by binding number.
    #[inline]
    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Returns the binding with the given number, if the layout has one.
    #[inline]
    pub fn binding(&self, binding: u32) -> Option<&DescriptorSetLayoutBinding> {
        find_binding(&self.bindings, binding)
    }
}

fn find_binding(
    bindings: &[DescriptorSetLayoutBinding],
    binding: u32,
) -> Option<&DescriptorSetLayoutBinding> {
    bindings
        .binary_search_by_key(&binding, |b| b.binding)
        .ok()
        .map(|index| &bindings[index])
}

/// The number of descriptors of each type that `bindings` consist of.
fn descriptor_counts(bindings: &[DescriptorSetLayoutBinding]) -> HashMap<DescriptorType, u32> {
    let mut counts = HashMap::default();

    for binding in bindings {
        *counts.entry(binding.descriptor_type).or_insert(0) += binding.descriptor_count;
    }

    counts
}

vulkan_bitflags! {
    /// Flags that control how a descriptor pool is created.
    DescriptorPoolCreateFlags = DescriptorPoolCreateFlags(u32);

    /// Individual descriptor sets can be freed from the pool. Otherwise you must reset or destroy
    /// the whole pool at once.
    FREE_DESCRIPTOR_SET = FREE_DESCRIPTOR_SET,
}

/// Parameters to create a new `DescriptorPool`.
#[derive(Clone, Debug)]
pub struct DescriptorPoolCreateInfo {
    /// Additional properties of the descriptor pool.
    ///
    /// The default value is empty.
    pub flags: DescriptorPoolCreateFlags,

    /// The maximum number of descriptor sets that can be allocated from the pool.
    ///
    /// The default value is `0`, which must be overridden.
    pub max_sets: u32,

    /// The number of descriptors of each type to allocate for the pool.
    ///
    /// The default value is empty.
    pub pool_sizes: HashMap<DescriptorType, u32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: DescriptorPoolCreateFlags::empty(),
            max_sets: 0,
            pool_sizes: HashMap::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorPoolCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags: _,
            max_sets,
            ref pool_sizes,
            _ne: _,
        } = self;

        if max_sets == 0 {
            return Err(Box::new(ValidationError {
                context: "max_sets".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkDescriptorPoolCreateInfo-maxSets-00301"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        for (&descriptor_type, &pool_size) in pool_sizes {
            descriptor_type.validate_device(device).map_err(|err| {
                err.add_context("pool_sizes")
                    .set_vuids(&["VUID-VkDescriptorPoolSize-type-parameter"])
            })?;

            if pool_size == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("pool_sizes[DescriptorType::{:?}]", descriptor_type).into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkDescriptorPoolSize-descriptorCount-00302"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// A pool from which descriptor sets are allocated.
#[derive(Debug)]
pub struct DescriptorPool {
    flags: DescriptorPoolCreateFlags,
    max_sets: u32,
    pool_sizes: HashMap<DescriptorType, u32>,
    state: Mutex<DescriptorPoolState>,
    use_count: UseCount,
}

#[derive(Debug)]
struct DescriptorPoolState {
    sets: IndexSet<Id<DescriptorSet>, foldhash::fast::RandomState>,
    remaining_sets: u32,
    remaining: HashMap<DescriptorType, u32>,
}

impl DescriptorPoolState {
    fn give_back(&mut self, bindings: &[DescriptorSetLayoutBinding]) {
        self.remaining_sets += 1;

        for (descriptor_type, count) in descriptor_counts(bindings) {
            *self.remaining.entry(descriptor_type).or_insert(0) += count;
        }
    }
}

impl_object!(DescriptorPool, DescriptorPool, descriptor_pools);

impl DescriptorPool {
    #[inline]
    pub fn flags(&self) -> DescriptorPoolCreateFlags {
        self.flags
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    #[inline]
    pub fn pool_sizes(&self) -> &HashMap<DescriptorType, u32> {
        &self.pool_sizes
    }

    /// Returns the descriptor sets that are currently allocated from the pool.
    pub fn descriptor_sets(&self) -> Vec<Id<DescriptorSet>> {
        self.state.lock().sets.iter().copied().collect()
    }
}

/// Parameters to allocate new descriptor sets.
#[derive(Clone, Debug)]
pub struct DescriptorSetAllocateInfo {
    /// The pool to allocate from.
    ///
    /// The default value is [`Id::NULL`], which must be overridden.
    pub descriptor_pool: Id<DescriptorPool>,

    /// The layouts of the sets to allocate, one set per element.
    ///
    /// The default value is empty, which must be overridden.
    pub set_layouts: Vec<Id<DescriptorSetLayout>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorSetAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            descriptor_pool: Id::NULL,
            set_layouts: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A resource reference held by one element of a descriptor set binding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Descriptor {
    Sampler(Id<Sampler>),

    /// An image view, and for combined image samplers, the sampler. The sampler is `None` if the
    /// binding has immutable samplers.
    Image {
        image_view: Id<ImageView>,
        sampler: Option<Id<Sampler>>,
    },

    /// A range of a buffer. `range` may be `VK_WHOLE_SIZE`.
    Buffer {
        buffer: Id<Buffer>,
        offset: DeviceSize,
        range: DeviceSize,
    },

    BufferView(Id<BufferView>),
}

impl Descriptor {
    /// Returns the objects that the descriptor refers to.
    pub fn objects(&self) -> SmallVec<[ObjectRef; 2]> {
        let mut objects = SmallVec::new();

        match *self {
            Descriptor::Sampler(sampler) => objects.push(sampler.erase()),
            Descriptor::Image {
                image_view,
                sampler,
            } => {
                objects.push(image_view.erase());
                objects.extend(sampler.map(Id::erase));
            }
            Descriptor::Buffer { buffer, .. } => objects.push(buffer.erase()),
            Descriptor::BufferView(buffer_view) => objects.push(buffer_view.erase()),
        }

        objects
    }
}

/// A write of consecutive descriptors of one binding of a descriptor set.
#[derive(Clone, Debug)]
pub struct WriteDescriptorSet {
    /// The set to update.
    ///
    /// The default value is [`Id::NULL`], which must be overridden.
    pub dst_set: Id<DescriptorSet>,

    /// The binding to update.
    ///
    /// The default value is `0`.
    pub dst_binding: u32,

    /// The first array element of the binding to update.
    ///
    /// The default value is `0`.
    pub dst_array_element: u32,

    /// The type of the descriptors. Must match the type of the binding.
    ///
    /// The default value is `DescriptorType::UniformBuffer`.
    pub descriptor_type: DescriptorType,

    /// The descriptors to write, starting at `dst_array_element`.
    ///
    /// The default value is empty, which must be overridden.
    pub descriptors: Vec<Descriptor>,

    pub _ne: crate::NonExhaustive,
}

impl Default for WriteDescriptorSet {
    #[inline]
    fn default() -> Self {
        Self {
            dst_set: Id::NULL,
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            descriptors: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl WriteDescriptorSet {
    /// Writes a single buffer range to element 0 of a binding.
    #[inline]
    pub fn buffer(
        dst_set: Id<DescriptorSet>,
        dst_binding: u32,
        descriptor_type: DescriptorType,
        buffer: Id<Buffer>,
        offset: DeviceSize,
        range: DeviceSize,
    ) -> Self {
        Self {
            dst_set,
            dst_binding,
            descriptor_type,
            descriptors: vec![Descriptor::Buffer {
                buffer,
                offset,
                range,
            }],
            ..Default::default()
        }
    }
}

/// A set of descriptors, allocated from a pool with a given layout.
#[derive(Debug)]
pub struct DescriptorSet {
    pool: Id<DescriptorPool>,
    layout: Id<DescriptorSetLayout>,
    bindings: Vec<DescriptorSetLayoutBinding>,
    pub(crate) state: Mutex<DescriptorSetState>,
    use_count: UseCount,
}

#[derive(Debug, Default)]
pub(crate) struct DescriptorSetState {
    descriptors: HashMap<(u32, u32), Descriptor>,
    pub(crate) version: u64,
}

impl_object!(DescriptorSet, DescriptorSet, descriptor_sets);

impl DescriptorSet {
    /// Returns the pool that the set was allocated from.
    #[inline]
    pub fn pool(&self) -> Id<DescriptorPool> {
        self.pool
    }

    /// Returns the layout that the set was allocated with. The layout may have been destroyed
    /// since; the bindings of the set are kept regardless.
    #[inline]
    pub fn layout(&self) -> Id<DescriptorSetLayout> {
        self.layout
    }

    #[inline]
    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Returns the number of updates that the set has received.
    #[inline]
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Returns the descriptor that was last written to an element of a binding.
    #[inline]
    pub fn descriptor(&self, binding: u32, array_element: u32) -> Option<Descriptor> {
        self.state
            .lock()
            .descriptors
            .get(&(binding, array_element))
            .copied()
    }

    /// Returns the total number of dynamic descriptors in the layout of the set.
    pub fn dynamic_descriptor_count(&self) -> u32 {
        self.bindings
            .iter()
            .filter(|binding| binding.descriptor_type.is_dynamic())
            .map(|binding| binding.descriptor_count)
            .sum()
    }

    /// Checks that elements `0..descriptor_count` of `binding` have been written and that the
    /// objects they refer to still exist. Returns the referenced objects.
    pub(crate) fn resolve_binding(
        &self,
        device: &Device,
        binding: u32,
        descriptor_count: u32,
    ) -> Result<SmallVec<[ObjectRef; 4]>, String> {
        let Some(layout_binding) = find_binding(&self.bindings, binding) else {
            return Err(format!("binding {} does not exist in the set", binding));
        };

        let state = self.state.lock();
        let mut objects = SmallVec::new();

        for element in 0..descriptor_count {
            let Some(descriptor) = state.descriptors.get(&(binding, element)) else {
                if !layout_binding.immutable_samplers.is_empty()
                    && layout_binding.descriptor_type == DescriptorType::Sampler
                {
                    continue;
                }

                return Err(format!(
                    "element {} of binding {} has never been written",
                    element, binding,
                ));
            };

            for object in descriptor.objects() {
                if !device.is_alive(object) {
                    return Err(format!(
                        "element {} of binding {} refers to {}, which has been destroyed",
                        element, binding, object,
                    ));
                }

                objects.push(object);
            }
        }

        Ok(objects)
    }
}

impl Device {
    /// Creates a new descriptor set layout.
    pub fn create_descriptor_set_layout(
        &self,
        create_info: DescriptorSetLayoutCreateInfo,
    ) -> Result<Id<DescriptorSetLayout>, Box<ValidationError>> {
        self.reported(self.validate_create_descriptor_set_layout(&create_info))?;

        Ok(self.record_create_descriptor_set_layout(create_info))
    }

    pub fn validate_create_descriptor_set_layout(
        &self,
        create_info: &DescriptorSetLayoutCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_descriptor_set_layout(
        &self,
        create_info: DescriptorSetLayoutCreateInfo,
    ) -> Id<DescriptorSetLayout> {
        let DescriptorSetLayoutCreateInfo {
            mut bindings,
            _ne: _,
        } = create_info;

        bindings.sort_by_key(|binding| binding.binding);

        self.objects
            .descriptor_set_layouts
            .register(DescriptorSetLayout {
                bindings,
                use_count: UseCount::default(),
            })
    }

    /// Destroys a descriptor set layout. Sets and pipelines that were created with it are not
    /// affected.
    pub fn destroy_descriptor_set_layout(
        &self,
        layout: Id<DescriptorSetLayout>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_descriptor_set_layout(layout))?;
        self.record_destroy_descriptor_set_layout(layout);

        Ok(())
    }

    pub fn validate_destroy_descriptor_set_layout(
        &self,
        layout: Id<DescriptorSetLayout>,
    ) -> Result<(), Box<ValidationError>> {
        self.lookup(
            layout,
            "descriptor_set_layout",
            &["VUID-vkDestroyDescriptorSetLayout-descriptorSetLayout-parameter"],
        )?;

        Ok(())
    }

    pub fn record_destroy_descriptor_set_layout(&self, layout: Id<DescriptorSetLayout>) {
        let _ = self.objects.descriptor_set_layouts.erase(layout);
    }

    /// Creates a new descriptor pool.
    pub fn create_descriptor_pool(
        &self,
        create_info: DescriptorPoolCreateInfo,
    ) -> Result<Id<DescriptorPool>, Box<ValidationError>> {
        self.reported(self.validate_create_descriptor_pool(&create_info))?;

        Ok(self.record_create_descriptor_pool(create_info))
    }

    pub fn validate_create_descriptor_pool(
        &self,
        create_info: &DescriptorPoolCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_descriptor_pool(
        &self,
        create_info: DescriptorPoolCreateInfo,
    ) -> Id<DescriptorPool> {
        let DescriptorPoolCreateInfo {
            flags,
            max_sets,
            pool_sizes,
            _ne: _,
        } = create_info;

        self.objects.descriptor_pools.register(DescriptorPool {
            flags,
            max_sets,
            state: Mutex::new(DescriptorPoolState {
                sets: IndexSet::default(),
                remaining_sets: max_sets,
                remaining: pool_sizes.clone(),
            }),
            pool_sizes,
            use_count: UseCount::default(),
        })
    }

    /// Destroys a descriptor pool, and frees all sets that were allocated from it.
    pub fn destroy_descriptor_pool(
        &self,
        pool: Id<DescriptorPool>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_descriptor_pool(pool))?;
        self.record_destroy_descriptor_pool(pool);

        Ok(())
    }

    pub fn validate_destroy_descriptor_pool(
        &self,
        pool: Id<DescriptorPool>,
    ) -> Result<(), Box<ValidationError>> {
        let pool_record = self.lookup(
            pool,
            "descriptor_pool",
            &["VUID-vkDestroyDescriptorPool-descriptorPool-parameter"],
        )?;

        self.validate_no_set_in_use(
            &pool_record,
            "descriptor_pool",
            &["VUID-vkDestroyDescriptorPool-descriptorPool-00303"],
        )
    }

    pub fn record_destroy_descriptor_pool(&self, pool: Id<DescriptorPool>) {
        if let Ok(pool_record) = self.objects.descriptor_pools.erase(pool) {
            for set in pool_record.state.lock().sets.drain(..) {
                let _ = self.objects.descriptor_sets.erase(set);
            }
        }
    }

    /// Returns all sets of a pool to it.
    pub fn reset_descriptor_pool(
        &self,
        pool: Id<DescriptorPool>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_descriptor_pool(pool))?;
        self.record_reset_descriptor_pool(pool);

        Ok(())
    }

    pub fn validate_reset_descriptor_pool(
        &self,
        pool: Id<DescriptorPool>,
    ) -> Result<(), Box<ValidationError>> {
        let pool_record = self.lookup(
            pool,
            "descriptor_pool",
            &["VUID-vkResetDescriptorPool-descriptorPool-parameter"],
        )?;

        self.validate_no_set_in_use(
            &pool_record,
            "descriptor_pool",
            &["VUID-vkResetDescriptorPool-descriptorPool-00313"],
        )
    }

    pub fn record_reset_descriptor_pool(&self, pool: Id<DescriptorPool>) {
        if let Ok(pool_record) = self.objects.descriptor_pools.get(pool) {
            let mut state = pool_record.state.lock();

            for set in state.sets.drain(..) {
                let _ = self.objects.descriptor_sets.erase(set);
            }

            state.remaining_sets = pool_record.max_sets;
            state.remaining = pool_record.pool_sizes.clone();
        }
    }

    fn validate_no_set_in_use(
        &self,
        pool_record: &DescriptorPool,
        context: &'static str,
        vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        let sets = pool_record.descriptor_sets();

        for set in sets {
            if self
                .objects
                .descriptor_sets
                .get(set)
                .is_ok_and(|set_record| set_record.use_count.is_in_use())
            {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: format!(
                        "{} was allocated from the pool, and is in use by a pending command \
                        buffer",
                        set.erase(),
                    )
                    .into(),
                    vuids,
                    kind: ValidationErrorKind::Lifetime,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    /// Allocates descriptor sets from a pool.
    ///
    /// If the pool does not have enough sets or descriptors left, `VulkanError::OutOfPoolMemory`
    /// is returned, as the driver would.
    pub fn allocate_descriptor_sets(
        &self,
        allocate_info: DescriptorSetAllocateInfo,
    ) -> Result<Vec<Id<DescriptorSet>>, Validated<VulkanError>> {
        self.reported(self.validate_allocate_descriptor_sets(&allocate_info))?;

        self.record_allocate_descriptor_sets(allocate_info)
            .map_err(Validated::Error)
    }

    pub fn validate_allocate_descriptor_sets(
        &self,
        allocate_info: &DescriptorSetAllocateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let DescriptorSetAllocateInfo {
            descriptor_pool,
            set_layouts,
            _ne: _,
        } = allocate_info;

        self.lookup(
            *descriptor_pool,
            "allocate_info.descriptor_pool",
            &["VUID-VkDescriptorSetAllocateInfo-descriptorPool-parameter"],
        )?;

        if set_layouts.is_empty() {
            return Err(Box::new(ValidationError {
                context: "allocate_info.set_layouts".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDescriptorSetAllocateInfo-descriptorSetCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        for (index, &layout) in set_layouts.iter().enumerate() {
            self.lookup(
                layout,
                "",
                &["VUID-VkDescriptorSetAllocateInfo-pSetLayouts-parameter"],
            )
            .map_err(|err| err.add_context(format!("allocate_info.set_layouts[{}]", index)))?;
        }

        Ok(())
    }

    /// Allocates the sets, unless the pool is exhausted.
    pub fn record_allocate_descriptor_sets(
        &self,
        allocate_info: DescriptorSetAllocateInfo,
    ) -> Result<Vec<Id<DescriptorSet>>, VulkanError> {
        let DescriptorSetAllocateInfo {
            descriptor_pool,
            set_layouts,
            _ne: _,
        } = allocate_info;

        let pool_record = self
            .objects
            .descriptor_pools
            .get(descriptor_pool)
            .map_err(|_| VulkanError::OutOfPoolMemory)?;
        let layouts = set_layouts
            .iter()
            .map(|&layout| self.objects.descriptor_set_layouts.get(layout))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::OutOfPoolMemory)?;

        let mut state = pool_record.state.lock();
        let mut required: HashMap<DescriptorType, u32> = HashMap::default();

        for layout in &layouts {
            for (descriptor_type, count) in descriptor_counts(&layout.bindings) {
                *required.entry(descriptor_type).or_insert(0) += count;
            }
        }

        let exhausted_type = required.iter().find(|&(descriptor_type, &count)| {
            state.remaining.get(descriptor_type).copied().unwrap_or(0) < count
        });

        if (layouts.len() as u32) > state.remaining_sets || exhausted_type.is_some() {
            let problem = match exhausted_type {
                Some((descriptor_type, _)) => format!(
                    "not enough descriptors of type {:?} are left in {}",
                    descriptor_type,
                    descriptor_pool.erase(),
                ),
                None => format!(
                    "{} descriptor sets were requested, but only {} are left in {}",
                    layouts.len(),
                    state.remaining_sets,
                    descriptor_pool.erase(),
                ),
            };
            self.report_warning(
                "UNASSIGNED-CoreValidation-DrawState-PoolOutOfMemory",
                problem,
                &[descriptor_pool.erase()],
            );

            return Err(VulkanError::OutOfPoolMemory);
        }

        state.remaining_sets -= layouts.len() as u32;

        for (descriptor_type, count) in required {
            if let Some(remaining) = state.remaining.get_mut(&descriptor_type) {
                *remaining -= count;
            }
        }

        let sets: Vec<_> = set_layouts
            .iter()
            .zip(&layouts)
            .map(|(&layout, layout_record)| {
                self.objects.descriptor_sets.register(DescriptorSet {
                    pool: descriptor_pool,
                    layout,
                    bindings: layout_record.bindings.clone(),
                    state: Mutex::new(DescriptorSetState::default()),
                    use_count: UseCount::default(),
                })
            })
            .collect();
        state.sets.extend(sets.iter().copied());

        Ok(sets)
    }

    /// Returns descriptor sets to their pool.
    pub fn free_descriptor_sets(
        &self,
        pool: Id<DescriptorPool>,
        descriptor_sets: &[Id<DescriptorSet>],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_free_descriptor_sets(pool, descriptor_sets))?;
        self.record_free_descriptor_sets(pool, descriptor_sets);

        Ok(())
    }

    pub fn validate_free_descriptor_sets(
        &self,
        pool: Id<DescriptorPool>,
        descriptor_sets: &[Id<DescriptorSet>],
    ) -> Result<(), Box<ValidationError>> {
        let pool_record = self.lookup(
            pool,
            "descriptor_pool",
            &["VUID-vkFreeDescriptorSets-descriptorPool-parameter"],
        )?;

        if !pool_record
            .flags
            .intersects(DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        {
            return Err(Box::new(ValidationError {
                context: "descriptor_pool.flags()".into(),
                problem: "does not contain `DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET`"
                    .into(),
                vuids: &["VUID-vkFreeDescriptorSets-descriptorPool-00312"],
                ..Default::default()
            }));
        }

        for (index, &set) in descriptor_sets.iter().enumerate() {
            if set.is_null() {
                continue;
            }

            let set_record = self
                .lookup(set, "", &["VUID-vkFreeDescriptorSets-pDescriptorSets-00310"])
                .map_err(|err| err.add_context(format!("descriptor_sets[{}]", index)))?;

            if set_record.pool != pool {
                return Err(Box::new(ValidationError {
                    context: format!("descriptor_sets[{}]", index).into(),
                    problem: "was not allocated from `descriptor_pool`".into(),
                    vuids: &["VUID-vkFreeDescriptorSets-pDescriptorSets-parent"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }

            if set_record.use_count.is_in_use() {
                return Err(Box::new(ValidationError {
                    context: format!("descriptor_sets[{}]", index).into(),
                    problem: "is in use by a pending command buffer".into(),
                    vuids: &["VUID-vkFreeDescriptorSets-pDescriptorSets-00309"],
                    kind: ValidationErrorKind::Lifetime,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_free_descriptor_sets(
        &self,
        pool: Id<DescriptorPool>,
        descriptor_sets: &[Id<DescriptorSet>],
    ) {
        let pool_record = self.objects.descriptor_pools.get(pool).ok();
        let mut pool_state = pool_record.as_ref().map(|pool| pool.state.lock());

        for &set in descriptor_sets {
            if let Ok(set_record) = self.objects.descriptor_sets.erase(set) {
                if let Some(pool_state) = &mut pool_state {
                    pool_state.sets.shift_remove(&set);
                    pool_state.give_back(&set_record.bindings);
                }
            }
        }
    }

    /// Writes descriptors to descriptor sets.
    pub fn update_descriptor_sets(
        &self,
        writes: &[WriteDescriptorSet],
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_update_descriptor_sets(writes))?;
        self.record_update_descriptor_sets(writes);

        Ok(())
    }

    pub fn validate_update_descriptor_sets(
        &self,
        writes: &[WriteDescriptorSet],
    ) -> Result<(), Box<ValidationError>> {
        for (index, write) in writes.iter().enumerate() {
            self.validate_write_descriptor_set(write)
                .map_err(|err| err.add_context(format!("writes[{}]", index)))?;
        }

        Ok(())
    }

    fn validate_write_descriptor_set(
        &self,
        write: &WriteDescriptorSet,
    ) -> Result<(), Box<ValidationError>> {
        let &WriteDescriptorSet {
            dst_set,
            dst_binding,
            dst_array_element,
            descriptor_type,
            ref descriptors,
            _ne: _,
        } = write;

        let set_record = self.lookup(
            dst_set,
            "dst_set",
            &["VUID-VkWriteDescriptorSet-dstSet-parameter"],
        )?;

        if set_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "dst_set".into(),
                problem: "is in use by a pending command buffer".into(),
                vuids: &["VUID-vkUpdateDescriptorSets-None-03047"],
                ..Default::default()
            }));
        }

        let Some(layout_binding) = find_binding(&set_record.bindings, dst_binding) else {
            return Err(Box::new(ValidationError {
                context: "dst_binding".into(),
                problem: "is not a binding in the layout of `dst_set`".into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstBinding-00315"],
                ..Default::default()
            }));
        };

        if descriptor_type != layout_binding.descriptor_type {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`descriptor_type` is `DescriptorType::{:?}`, but binding {} of `dst_set` \
                    has type `DescriptorType::{:?}`",
                    descriptor_type, dst_binding, layout_binding.descriptor_type,
                )
                .into(),
                vuids: &["VUID-VkWriteDescriptorSet-descriptorType-00319"],
                ..Default::default()
            }));
        }

        if descriptors.is_empty() {
            return Err(Box::new(ValidationError {
                context: "descriptors".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkWriteDescriptorSet-descriptorCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if dst_array_element as u64 + descriptors.len() as u64
            > layout_binding.descriptor_count as u64
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`dst_array_element` + the length of `descriptors` is greater than the \
                    descriptor count {} of binding {}",
                    layout_binding.descriptor_count, dst_binding,
                )
                .into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstArrayElement-00321"],
                ..Default::default()
            }));
        }

        for (index, descriptor) in descriptors.iter().enumerate() {
            self.validate_descriptor(layout_binding, descriptor)
                .map_err(|err| err.add_context(format!("descriptors[{}]", index)))?;
        }

        Ok(())
    }

    fn validate_descriptor(
        &self,
        layout_binding: &DescriptorSetLayoutBinding,
        descriptor: &Descriptor,
    ) -> Result<(), Box<ValidationError>> {
        let descriptor_type = layout_binding.descriptor_type;
        let has_immutable_samplers = !layout_binding.immutable_samplers.is_empty();

        let mismatch = |vuids: &'static [&'static str]| {
            Box::new(ValidationError {
                problem: format!(
                    "is not a valid descriptor for a binding of type `DescriptorType::{:?}`",
                    descriptor_type,
                )
                .into(),
                vuids,
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            })
        };

        match descriptor_type {
            DescriptorType::Sampler => {
                let &Descriptor::Sampler(sampler) = descriptor else {
                    return Err(mismatch(&["VUID-VkWriteDescriptorSet-descriptorType-00325"]));
                };

                self.lookup(
                    sampler,
                    "sampler",
                    &["VUID-VkWriteDescriptorSet-descriptorType-00325"],
                )?;
            }
            DescriptorType::CombinedImageSampler
            | DescriptorType::SampledImage
            | DescriptorType::StorageImage
            | DescriptorType::InputAttachment => {
                let &Descriptor::Image {
                    image_view,
                    sampler,
                } = descriptor
                else {
                    return Err(mismatch(&["VUID-VkWriteDescriptorSet-descriptorType-00326"]));
                };

                let image_view_record = self.lookup(
                    image_view,
                    "image_view",
                    &["VUID-VkWriteDescriptorSet-descriptorType-02996"],
                )?;

                if descriptor_type == DescriptorType::CombinedImageSampler {
                    match sampler {
                        Some(sampler) => {
                            self.lookup(
                                sampler,
                                "sampler",
                                &["VUID-VkWriteDescriptorSet-descriptorType-00325"],
                            )?;
                        }
                        None if !has_immutable_samplers => {
                            return Err(Box::new(ValidationError {
                                context: "sampler".into(),
                                problem: "is `None`, but the binding has no immutable samplers"
                                    .into(),
                                vuids: &["VUID-VkWriteDescriptorSet-descriptorType-00325"],
                                kind: ValidationErrorKind::Parameter,
                                ..Default::default()
                            }));
                        }
                        None => (),
                    }
                }

                let (required_usage, vuids): (_, &'static [&'static str]) = match descriptor_type
                {
                    DescriptorType::StorageImage => (
                        ImageUsage::STORAGE,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00339"],
                    ),
                    DescriptorType::InputAttachment => (
                        ImageUsage::INPUT_ATTACHMENT,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00338"],
                    ),
                    _ => (
                        ImageUsage::SAMPLED,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00337"],
                    ),
                };

                if !image_view_record.usage().intersects(required_usage) {
                    return Err(Box::new(ValidationError {
                        context: "image_view.usage()".into(),
                        problem: format!("does not contain `ImageUsage::{:?}`", required_usage)
                            .into(),
                        vuids,
                        ..Default::default()
                    }));
                }
            }
            DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer => {
                let &Descriptor::BufferView(buffer_view) = descriptor else {
                    return Err(mismatch(&["VUID-VkWriteDescriptorSet-descriptorType-02994"]));
                };

                let buffer_view_record = self.lookup(
                    buffer_view,
                    "buffer_view",
                    &["VUID-VkWriteDescriptorSet-descriptorType-02994"],
                )?;
                let buffer_record = self.lookup(
                    buffer_view_record.buffer(),
                    "buffer_view.buffer()",
                    &["VUID-VkWriteDescriptorSet-descriptorType-02994"],
                )?;

                let (required_usage, vuids): (_, &'static [&'static str]) =
                    if descriptor_type == DescriptorType::UniformTexelBuffer {
                        (
                            BufferUsage::UNIFORM_TEXEL_BUFFER,
                            &["VUID-VkWriteDescriptorSet-descriptorType-00334"],
                        )
                    } else {
                        (
                            BufferUsage::STORAGE_TEXEL_BUFFER,
                            &["VUID-VkWriteDescriptorSet-descriptorType-00335"],
                        )
                    };

                if !buffer_record.usage().intersects(required_usage) {
                    return Err(Box::new(ValidationError {
                        context: "buffer_view.buffer().usage()".into(),
                        problem: format!("does not contain `BufferUsage::{:?}`", required_usage)
                            .into(),
                        vuids,
                        ..Default::default()
                    }));
                }
            }
            DescriptorType::UniformBuffer
            | DescriptorType::StorageBuffer
            | DescriptorType::UniformBufferDynamic
            | DescriptorType::StorageBufferDynamic => {
                let &Descriptor::Buffer {
                    buffer,
                    offset,
                    range,
                } = descriptor
                else {
                    return Err(mismatch(&["VUID-VkWriteDescriptorSet-descriptorType-00324"]));
                };

                let buffer_record = self.lookup(
                    buffer,
                    "buffer",
                    &["VUID-VkDescriptorBufferInfo-buffer-parameter"],
                )?;
                let properties = self.properties();
                let is_uniform = matches!(
                    descriptor_type,
                    DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic
                );

                let (
                    required_usage,
                    usage_vuids,
                    alignment,
                    alignment_vuids,
                    max_range,
                    range_vuids,
                ): (
                    _,
                    &'static [&'static str],
                    _,
                    &'static [&'static str],
                    _,
                    &'static [&'static str],
                ) = if is_uniform {
                    (
                        BufferUsage::UNIFORM_BUFFER,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00330"],
                        properties.min_uniform_buffer_offset_alignment,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00327"],
                        properties.max_uniform_buffer_range,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00332"],
                    )
                } else {
                    (
                        BufferUsage::STORAGE_BUFFER,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00331"],
                        properties.min_storage_buffer_offset_alignment,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00328"],
                        properties.max_storage_buffer_range,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00333"],
                    )
                };

                if !buffer_record.usage().intersects(required_usage) {
                    return Err(Box::new(ValidationError {
                        context: "buffer.usage()".into(),
                        problem: format!("does not contain `BufferUsage::{:?}`", required_usage)
                            .into(),
                        vuids: usage_vuids,
                        ..Default::default()
                    }));
                }

                if !descriptor_type.is_dynamic() && offset % alignment != 0 {
                    return Err(Box::new(ValidationError {
                        context: "offset".into(),
                        problem: format!(
                            "is not a multiple of the minimum offset alignment {}",
                            alignment,
                        )
                        .into(),
                        vuids: alignment_vuids,
                        ..Default::default()
                    }));
                }

                let size = buffer_record.size();

                if offset >= size {
                    return Err(Box::new(ValidationError {
                        context: "offset".into(),
                        problem: "is not less than the size of `buffer`".into(),
                        vuids: &["VUID-VkDescriptorBufferInfo-offset-00340"],
                        ..Default::default()
                    }));
                }

                if range == 0 {
                    return Err(Box::new(ValidationError {
                        context: "range".into(),
                        problem: "is zero".into(),
                        vuids: &["VUID-VkDescriptorBufferInfo-range-00341"],
                        kind: ValidationErrorKind::Parameter,
                        ..Default::default()
                    }));
                }

                let effective_range = if range == vk::WHOLE_SIZE {
                    size - offset
                } else {
                    if range > size - offset {
                        return Err(Box::new(ValidationError {
                            problem: "`offset` + `range` is greater than the size of `buffer`"
                                .into(),
                            vuids: &["VUID-VkDescriptorBufferInfo-range-00342"],
                            ..Default::default()
                        }));
                    }

                    range
                };

                if effective_range > max_range as DeviceSize {
                    return Err(Box::new(ValidationError {
                        context: "range".into(),
                        problem: format!(
                            "is greater than the maximum buffer range {} for the descriptor type",
                            max_range,
                        )
                        .into(),
                        vuids: range_vuids,
                        ..Default::default()
                    }));
                }
            }
        }

        Ok(())
    }

    pub fn record_update_descriptor_sets(&self, writes: &[WriteDescriptorSet]) {
        for write in writes {
            let Ok(set_record) = self.objects.descriptor_sets.get(write.dst_set) else {
                continue;
            };

            let mut state = set_record.state.lock();

            for (element, descriptor) in (write.dst_array_element..).zip(&write.descriptors) {
                state
                    .descriptors
                    .insert((write.dst_binding, element), *descriptor);
            }

            state.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Descriptor, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo, DescriptorSetAllocateInfo,
        DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo, DescriptorType,
        WriteDescriptorSet,
    };
    use crate::{
        buffer::{BufferCreateInfo, BufferUsage},
        descriptor_set::{DescriptorPool, DescriptorSet},
        device::Device,
        handle::Id,
        sampler::SamplerCreateInfo,
        tests::uniform_buffer_info,
        Validated, VulkanError,
    };
    use ash::vk;
    use foldhash::HashMap;

    fn pool(device: &Device, max_sets: u32, uniform_buffers: u32) -> Id<DescriptorPool> {
        let mut pool_sizes = HashMap::default();
        pool_sizes.insert(DescriptorType::UniformBuffer, uniform_buffers);

        device
            .create_descriptor_pool(DescriptorPoolCreateInfo {
                flags: DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
                max_sets,
                pool_sizes,
                ..Default::default()
            })
            .unwrap()
    }

    fn uniform_set(device: &Device, pool: Id<DescriptorPool>) -> Id<DescriptorSet> {
        let layout = device
            .create_descriptor_set_layout(DescriptorSetLayoutCreateInfo {
                bindings: vec![DescriptorSetLayoutBinding::new(
                    0,
                    DescriptorType::UniformBuffer,
                    2,
                )],
                ..Default::default()
            })
            .unwrap();

        device
            .allocate_descriptor_sets(DescriptorSetAllocateInfo {
                descriptor_pool: pool,
                set_layouts: vec![layout],
                ..Default::default()
            })
            .unwrap()[0]
    }

    #[test]
    fn layout_bindings() {
        let (device, _queue, _log) = test_device!();

        assert_should_fail!(
            device.create_descriptor_set_layout(DescriptorSetLayoutCreateInfo {
                bindings: vec![
                    DescriptorSetLayoutBinding::new(1, DescriptorType::UniformBuffer, 1),
                    DescriptorSetLayoutBinding::new(1, DescriptorType::StorageBuffer, 1),
                ],
                ..Default::default()
            }),
            "VUID-VkDescriptorSetLayoutCreateInfo-binding-00279",
        );

        let sampler = device.create_sampler(SamplerCreateInfo::default()).unwrap();
        assert_should_fail!(
            device.create_descriptor_set_layout(DescriptorSetLayoutCreateInfo {
                bindings: vec![DescriptorSetLayoutBinding {
                    descriptor_type: DescriptorType::Sampler,
                    descriptor_count: 2,
                    immutable_samplers: vec![sampler],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            "VUID-VkDescriptorSetLayoutBinding-descriptorType-00282",
        );

        let layout = device
            .create_descriptor_set_layout(DescriptorSetLayoutCreateInfo {
                bindings: vec![
                    DescriptorSetLayoutBinding::new(3, DescriptorType::StorageBuffer, 1),
                    DescriptorSetLayoutBinding::new(0, DescriptorType::UniformBuffer, 1),
                ],
                ..Default::default()
            })
            .unwrap();
        let layout = device.get(layout).unwrap();
        assert_eq!(layout.bindings()[0].binding, 0);
        assert!(layout.binding(3).is_some());
        assert!(layout.binding(1).is_none());
    }

    #[test]
    fn pool_exhaustion() {
        let (device, _queue, log) = test_device!();
        let pool = pool(&device, 2, 4);

        let first = uniform_set(&device, pool);
        let _second = uniform_set(&device, pool);

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
        let allocate_info = DescriptorSetAllocateInfo {
            descriptor_pool: pool,
            set_layouts: vec![layout],
            ..Default::default()
        };

        assert!(matches!(
            device.allocate_descriptor_sets(allocate_info.clone()),
            Err(Validated::Error(VulkanError::OutOfPoolMemory)),
        ));
        assert!(log.contains("UNASSIGNED-CoreValidation-DrawState-PoolOutOfMemory"));

        device.free_descriptor_sets(pool, &[first]).unwrap();
        device.allocate_descriptor_sets(allocate_info).unwrap();

        device.reset_descriptor_pool(pool).unwrap();
        assert!(device.get(first).is_err());
        assert!(device.get(pool).unwrap().descriptor_sets().is_empty());
    }

    #[test]
    fn free_rules() {
        let (device, _queue, _log) = test_device!();
        let fixed_pool = device
            .create_descriptor_pool(DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [(DescriptorType::UniformBuffer, 2)].into_iter().collect(),
                ..Default::default()
            })
            .unwrap();
        let set = uniform_set(&device, fixed_pool);

        assert_should_fail!(
            device.free_descriptor_sets(fixed_pool, &[set]),
            "VUID-vkFreeDescriptorSets-descriptorPool-00312",
        );

        let other_pool = pool(&device, 1, 2);
        assert_should_fail!(
            device.free_descriptor_sets(other_pool, &[set]),
            "VUID-vkFreeDescriptorSets-pDescriptorSets-parent",
        );

        let in_use = uniform_set(&device, other_pool);
        device.get(in_use).unwrap().use_count.increment();
        assert_should_fail!(
            device.free_descriptor_sets(other_pool, &[in_use]),
            "VUID-vkFreeDescriptorSets-pDescriptorSets-00309",
        );
        assert_should_fail!(
            device.reset_descriptor_pool(other_pool),
            "VUID-vkResetDescriptorPool-descriptorPool-00313",
        );
        assert_should_fail!(
            device.destroy_descriptor_pool(other_pool),
            "VUID-vkDestroyDescriptorPool-descriptorPool-00303",
        );

        device.get(in_use).unwrap().use_count.decrement();
        device.free_descriptor_sets(other_pool, &[Id::NULL, in_use]).unwrap();
        device.destroy_descriptor_pool(fixed_pool).unwrap();
        assert!(device.get(set).is_err());
    }

    #[test]
    fn write_checks() {
        let (device, _queue, _log) = test_device!();
        let pool = pool(&device, 1, 2);
        let set = uniform_set(&device, pool);
        let buffer = device.create_buffer(uniform_buffer_info(1024)).unwrap();
        let write = |offset, range| {
            WriteDescriptorSet::buffer(set, 0, DescriptorType::UniformBuffer, buffer, offset, range)
        };

        assert_should_fail!(
            device.update_descriptor_sets(&[WriteDescriptorSet {
                dst_binding: 1,
                ..write(0, 256)
            }]),
            "VUID-VkWriteDescriptorSet-dstBinding-00315",
        );
        assert_should_fail!(
            device.update_descriptor_sets(&[WriteDescriptorSet {
                descriptor_type: DescriptorType::StorageBuffer,
                ..write(0, 256)
            }]),
            "VUID-VkWriteDescriptorSet-descriptorType-00319",
        );
        assert_should_fail!(
            device.update_descriptor_sets(&[WriteDescriptorSet {
                dst_array_element: 2,
                ..write(0, 256)
            }]),
            "VUID-VkWriteDescriptorSet-dstArrayElement-00321",
        );
        assert_should_fail!(
            device.update_descriptor_sets(&[write(16, 256)]),
            "VUID-VkWriteDescriptorSet-descriptorType-00327",
        );
        assert_should_fail!(
            device.update_descriptor_sets(&[write(1024, 16)]),
            "VUID-VkDescriptorBufferInfo-offset-00340",
        );
        assert_should_fail!(
            device.update_descriptor_sets(&[write(768, 512)]),
            "VUID-VkDescriptorBufferInfo-range-00342",
        );

        let storage = device
            .create_buffer(BufferCreateInfo {
                size: 1024,
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.update_descriptor_sets(&[WriteDescriptorSet::buffer(
                set,
                0,
                DescriptorType::UniformBuffer,
                storage,
                0,
                vk::WHOLE_SIZE,
            )]),
            "VUID-VkWriteDescriptorSet-descriptorType-00330",
        );

        let set_record = device.get(set).unwrap();
        assert_eq!(set_record.version(), 0);

        device
            .update_descriptor_sets(&[WriteDescriptorSet {
                dst_array_element: 1,
                descriptors: vec![Descriptor::Buffer {
                    buffer,
                    offset: 256,
                    range: vk::WHOLE_SIZE,
                }],
                ..write(0, 256)
            }])
            .unwrap();
        assert_eq!(set_record.version(), 1);
        assert!(set_record.descriptor(0, 0).is_none());
        assert!(set_record.descriptor(0, 1).is_some());

        assert!(set_record.resolve_binding(&device, 0, 2).is_err());
        device.update_descriptor_sets(&[write(0, 256)]).unwrap();
        assert_eq!(
            set_record.resolve_binding(&device, 0, 2).unwrap().len(),
            2
        );

        device.destroy_buffer(buffer).unwrap();
        let problem = set_record.resolve_binding(&device, 0, 1).unwrap_err();
        assert!(problem.contains("has been destroyed"));
    }
}
