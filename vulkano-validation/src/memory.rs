// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Device memory allocations.
//!
//! An allocation is made from one of the memory types that the driver reports. Its property
//! flags decide whether it can be mapped, and its index decides which resources can be bound to
//! it: a resource is only compatible with the memory types whose bit is set in the
//! `memory_type_bits` of its memory requirements.
//!
//! An allocation can be mapped at most once at a time. The bound ranges of resources are kept
//! on the allocation, so that overlapping linear and optimal resources can be detected.

use crate::{
    buffer::Buffer,
    device::Device,
    handle::Id,
    image::Image,
    object::{ObjectRef, UseCount},
    DeviceSize, ValidationError, ValidationErrorKind,
};
use ash::vk::WHOLE_SIZE;
use parking_lot::Mutex;
use smallvec::SmallVec;

vulkan_bitflags! {
    /// Properties of a memory type.
    MemoryPropertyFlags = MemoryPropertyFlags(u32);

    /// The memory is located on the device, and is allocated from a heap that also has the
    /// `DEVICE_LOCAL` flag set.
    DEVICE_LOCAL = DEVICE_LOCAL,

    /// The memory can be mapped into the memory space of the host.
    HOST_VISIBLE = HOST_VISIBLE,

    /// Host access to the memory does not require flushing or invalidating.
    HOST_COHERENT = HOST_COHERENT,

    /// The memory is cached by the host.
    HOST_CACHED = HOST_CACHED,

    /// Allocations made from the memory type are lazily allocated.
    LAZILY_ALLOCATED = LAZILY_ALLOCATED,

    /// The memory type is protected.
    PROTECTED = PROTECTED,
}

vulkan_bitflags! {
    /// Attributes of a memory heap.
    MemoryHeapFlags = MemoryHeapFlags(u32);

    DEVICE_LOCAL = DEVICE_LOCAL,
    MULTI_INSTANCE = MULTI_INSTANCE,
}

vulkan_bitflags! {
    /// The handle types that memory can be exported to.
    ExternalMemoryHandleTypes = ExternalMemoryHandleTypeFlags(u32);

    OPAQUE_FD = OPAQUE_FD
    RequiresOneOf([
        RequiresAllOf([DeviceExtension(khr_external_memory_fd)]),
    ]),
}

/// A memory type of the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// A memory heap of the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryHeap {
    pub size: DeviceSize,
    pub flags: MemoryHeapFlags,
}

/// The memory types and heaps of a device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    pub memory_types: Vec<MemoryType>,
    pub memory_heaps: Vec<MemoryHeap>,
}

/// The memory requirements of a resource, as reported by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// The number of bytes of memory required.
    pub size: DeviceSize,

    /// The alignment that the offset of the binding must have.
    pub alignment: DeviceSize,

    /// Indicates which memory types can be used. Each bit that is set corresponds to the index
    /// of a memory type in [`MemoryProperties::memory_types`].
    pub memory_type_bits: u32,

    /// Whether the implementation prefers to use dedicated allocations.
    pub prefers_dedicated_allocation: bool,

    /// Whether the implementation requires the use of a dedicated allocation.
    pub requires_dedicated_allocation: bool,
}

/// The resource that an allocation is dedicated to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DedicatedAllocation {
    Buffer(Id<Buffer>),
    Image(Id<Image>),
}

impl DedicatedAllocation {
    pub(crate) fn object(self) -> ObjectRef {
        match self {
            DedicatedAllocation::Buffer(buffer) => buffer.erase(),
            DedicatedAllocation::Image(image) => image.erase(),
        }
    }
}

/// Parameters to allocate a new `DeviceMemory`.
#[derive(Clone, Debug)]
pub struct MemoryAllocateInfo {
    /// The number of bytes to allocate.
    ///
    /// The default value is `0`, which must be overridden.
    pub allocation_size: DeviceSize,

    /// The index of the memory type that should be allocated.
    ///
    /// The default value is [`u32::MAX`], which must be overridden.
    pub memory_type_index: u32,

    /// Allocates memory for a specific buffer or image.
    ///
    /// The default value is `None`.
    pub dedicated_allocation: Option<DedicatedAllocation>,

    /// The handle types that can be exported from the allocated memory.
    ///
    /// The default value is [`ExternalMemoryHandleTypes::empty()`].
    pub export_handle_types: ExternalMemoryHandleTypes,

    pub _ne: crate::NonExhaustive,
}

impl Default for MemoryAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            allocation_size: 0,
            memory_type_index: u32::MAX,
            dedicated_allocation: None,
            export_handle_types: ExternalMemoryHandleTypes::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl MemoryAllocateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            allocation_size,
            memory_type_index,
            dedicated_allocation,
            export_handle_types,
            _ne: _,
        } = self;

        if allocation_size == 0 {
            return Err(Box::new(ValidationError {
                context: "allocation_size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkMemoryAllocateInfo-allocationSize-07899"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let memory_properties = device.memory_properties();

        let Some(memory_type) = memory_properties
            .memory_types
            .get(memory_type_index as usize)
        else {
            return Err(Box::new(ValidationError {
                context: "memory_type_index".into(),
                problem: "is not less than the number of memory types in the device".into(),
                vuids: &["VUID-vkAllocateMemory-pAllocateInfo-01714"],
                ..Default::default()
            }));
        };

        let heap_size = memory_properties
            .memory_heaps
            .get(memory_type.heap_index as usize)
            .map_or(0, |memory_heap| memory_heap.size);

        // A heap size of zero is not a limit.
        if heap_size != 0 && allocation_size > heap_size {
            return Err(Box::new(ValidationError {
                context: "allocation_size".into(),
                problem: "is greater than the size of the memory heap of the memory type".into(),
                vuids: &["VUID-vkAllocateMemory-pAllocateInfo-01713"],
                ..Default::default()
            }));
        }

        export_handle_types
            .validate_device(device)
            .map_err(|err| {
                err.add_context("export_handle_types")
                    .set_vuids(&["VUID-VkExportMemoryAllocateInfo-handleTypes-parameter"])
            })?;

        if let Some(dedicated_allocation) = dedicated_allocation {
            if !device.enabled_extensions().khr_dedicated_allocation {
                return Err(Box::new(ValidationError {
                    context: "dedicated_allocation".into(),
                    problem: "is `Some`".into(),
                    requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                        crate::Requires::DeviceExtension("khr_dedicated_allocation"),
                    ])]),
                    vuids: &["VUID-VkMemoryAllocateInfo-pNext-pNext"],
                    ..Default::default()
                }));
            }

            match dedicated_allocation {
                DedicatedAllocation::Buffer(buffer) => {
                    let buffer = device.lookup(
                        buffer,
                        "dedicated_allocation",
                        &["VUID-VkMemoryDedicatedAllocateInfo-buffer-parameter"],
                    )?;

                    if buffer.memory_requirements().size != allocation_size {
                        return Err(Box::new(ValidationError {
                            problem: "`dedicated_allocation` is a buffer, but \
                                `allocation_size` does not equal the size of the memory \
                                requirements of the buffer"
                                .into(),
                            vuids: &["VUID-VkMemoryDedicatedAllocateInfo-buffer-02965"],
                            ..Default::default()
                        }));
                    }

                    if buffer.is_sparse() {
                        return Err(Box::new(ValidationError {
                            context: "dedicated_allocation".into(),
                            problem: "is a buffer that was created with sparse binding".into(),
                            vuids: &["VUID-VkMemoryDedicatedAllocateInfo-buffer-01436"],
                            ..Default::default()
                        }));
                    }
                }
                DedicatedAllocation::Image(image) => {
                    let image = device.lookup(
                        image,
                        "dedicated_allocation",
                        &["VUID-VkMemoryDedicatedAllocateInfo-image-parameter"],
                    )?;

                    if image.memory_requirements().size != allocation_size {
                        return Err(Box::new(ValidationError {
                            problem: "`dedicated_allocation` is an image, but \
                                `allocation_size` does not equal the size of the memory \
                                requirements of the image"
                                .into(),
                            vuids: &["VUID-VkMemoryDedicatedAllocateInfo-image-02964"],
                            ..Default::default()
                        }));
                    }

                    if image.is_sparse() {
                        return Err(Box::new(ValidationError {
                            context: "dedicated_allocation".into(),
                            problem: "is an image that was created with sparse binding".into(),
                            vuids: &["VUID-VkMemoryDedicatedAllocateInfo-image-01434"],
                            ..Default::default()
                        }));
                    }
                }
            }
        }

        Ok(())
    }
}

/// A range of an allocation that is mapped into host memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedRange {
    pub offset: DeviceSize,

    /// The size of the range, with `VK_WHOLE_SIZE` already resolved.
    pub size: DeviceSize,
}

/// Parameters of a memory map operation.
#[derive(Clone, Debug)]
pub struct MemoryMapInfo {
    /// The offset (in bytes) from the beginning of the allocation, where the mapping starts.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// The size (in bytes) of the mapping, or `VK_WHOLE_SIZE` to map up to the end of the
    /// allocation.
    ///
    /// The default value is `VK_WHOLE_SIZE`.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for MemoryMapInfo {
    #[inline]
    fn default() -> Self {
        MemoryMapInfo {
            offset: 0,
            size: WHOLE_SIZE,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A range of a mapped allocation that is flushed or invalidated.
#[derive(Clone, Copy, Debug)]
pub struct MappedMemoryRange {
    pub memory: Id<DeviceMemory>,
    pub offset: DeviceSize,
    pub size: DeviceSize,
}

/// A range of an allocation that a resource is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BoundRange {
    pub(crate) object: ObjectRef,
    pub(crate) offset: DeviceSize,
    pub(crate) size: DeviceSize,

    /// Buffers and linearly tiled images. Optimally tiled images are not linear.
    pub(crate) linear: bool,
}

/// An allocation of device memory.
#[derive(Debug)]
pub struct DeviceMemory {
    allocation_size: DeviceSize,
    memory_type_index: u32,
    property_flags: MemoryPropertyFlags,
    dedicated_allocation: Option<DedicatedAllocation>,
    export_handle_types: ExternalMemoryHandleTypes,
    pub(crate) state: Mutex<MemoryState>,
    use_count: UseCount,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) mapped: Option<MappedRange>,
    pub(crate) bound_ranges: SmallVec<[BoundRange; 4]>,
}

impl_object!(DeviceMemory, DeviceMemory, memories);

impl DeviceMemory {
    /// Returns the size in bytes of the allocation.
    #[inline]
    pub fn allocation_size(&self) -> DeviceSize {
        self.allocation_size
    }

    /// Returns the index of the memory type of the allocation.
    #[inline]
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Returns the property flags of the memory type of the allocation.
    #[inline]
    pub fn property_flags(&self) -> MemoryPropertyFlags {
        self.property_flags
    }

    /// Returns the resource that the allocation is dedicated to, if any.
    #[inline]
    pub fn dedicated_allocation(&self) -> Option<DedicatedAllocation> {
        self.dedicated_allocation
    }

    /// Returns the handle types that can be exported from the allocation.
    #[inline]
    pub fn export_handle_types(&self) -> ExternalMemoryHandleTypes {
        self.export_handle_types
    }

    /// Returns the currently mapped range, if the allocation is mapped.
    #[inline]
    pub fn mapped_range(&self) -> Option<MappedRange> {
        self.state.lock().mapped
    }
}

impl Device {
    /// Allocates device memory.
    pub fn allocate_memory(
        &self,
        allocate_info: MemoryAllocateInfo,
    ) -> Result<Id<DeviceMemory>, Box<ValidationError>> {
        self.reported(self.validate_allocate_memory(&allocate_info))?;

        Ok(self.record_allocate_memory(allocate_info))
    }

    pub fn validate_allocate_memory(
        &self,
        allocate_info: &MemoryAllocateInfo,
    ) -> Result<(), Box<ValidationError>> {
        allocate_info
            .validate(self)
            .map_err(|err| err.add_context("allocate_info"))?;

        if self.objects.memories.len() as u64
            >= self.properties().max_memory_allocation_count as u64
        {
            return Err(Box::new(ValidationError {
                problem: "the number of allocations on the device has reached the \
                    `max_memory_allocation_count` limit"
                    .into(),
                vuids: &["VUID-vkAllocateMemory-maxMemoryAllocationCount-04101"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_allocate_memory(&self, allocate_info: MemoryAllocateInfo) -> Id<DeviceMemory> {
        let MemoryAllocateInfo {
            allocation_size,
            memory_type_index,
            dedicated_allocation,
            export_handle_types,
            _ne: _,
        } = allocate_info;

        let property_flags = self
            .memory_properties()
            .memory_types
            .get(memory_type_index as usize)
            .map(|memory_type| memory_type.property_flags)
            .unwrap_or_default();

        let memory = self.objects.memories.register(DeviceMemory {
            allocation_size,
            memory_type_index,
            property_flags,
            dedicated_allocation,
            export_handle_types,
            state: Mutex::new(MemoryState::default()),
            use_count: UseCount::default(),
        });

        tracing::trace!(?memory, allocation_size, memory_type_index, "allocated memory");

        memory
    }

    /// Frees device memory. Resources that were bound to it keep their binding.
    pub fn free_memory(&self, memory: Id<DeviceMemory>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_free_memory(memory))?;
        self.record_free_memory(memory);

        Ok(())
    }

    pub fn validate_free_memory(
        &self,
        memory: Id<DeviceMemory>,
    ) -> Result<(), Box<ValidationError>> {
        let memory_record =
            self.lookup(memory, "memory", &["VUID-vkFreeMemory-memory-parameter"])?;

        if memory_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: format!(
                    "{} is in use by a command buffer that has not completed execution",
                    memory.erase(),
                )
                .into(),
                vuids: &["VUID-vkFreeMemory-memory-00677"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_free_memory(&self, memory: Id<DeviceMemory>) {
        let _ = self.objects.memories.erase(memory);
    }

    /// Maps a range of an allocation into host memory.
    pub fn map_memory(
        &self,
        memory: Id<DeviceMemory>,
        map_info: MemoryMapInfo,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_map_memory(memory, &map_info))?;
        self.record_map_memory(memory, map_info);

        Ok(())
    }

    pub fn validate_map_memory(
        &self,
        memory: Id<DeviceMemory>,
        map_info: &MemoryMapInfo,
    ) -> Result<(), Box<ValidationError>> {
        let memory_record = self.lookup(memory, "memory", &["VUID-vkMapMemory-memory-parameter"])?;
        let &MemoryMapInfo {
            offset,
            size,
            _ne: _,
        } = map_info;

        if !memory_record
            .property_flags
            .intersects(MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: format!(
                    "mapping memory without VK_MEMORY_PROPERTY_HOST_VISIBLE_BIT set: memory \
                    type {} of {} is not host-visible",
                    memory_record.memory_type_index,
                    memory.erase(),
                )
                .into(),
                vuids: &["VUID-vkMapMemory-memory-00682"],
                ..Default::default()
            }));
        }

        if let Some(mapped) = memory_record.state.lock().mapped {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: format!(
                    "{} is already mapped at offset {} with size {}",
                    memory.erase(),
                    mapped.offset,
                    mapped.size,
                )
                .into(),
                vuids: &["VUID-vkMapMemory-memory-00678"],
                ..Default::default()
            }));
        }

        if offset >= memory_record.allocation_size {
            return Err(Box::new(ValidationError {
                context: "map_info.offset".into(),
                problem: format!(
                    "attempting to map memory at offset {offset}, which is not less than the \
                    allocation size {}",
                    memory_record.allocation_size,
                )
                .into(),
                vuids: &["VUID-vkMapMemory-offset-00679"],
                ..Default::default()
            }));
        }

        if size != WHOLE_SIZE {
            if size == 0 {
                return Err(Box::new(ValidationError {
                    context: "map_info.size".into(),
                    problem: "attempting to map memory range of size zero".into(),
                    vuids: &["VUID-vkMapMemory-size-00680"],
                    ..Default::default()
                }));
            }

            if size > memory_record.allocation_size - offset {
                return Err(Box::new(ValidationError {
                    context: "map_info.size".into(),
                    problem: format!(
                        "mapping memory from offset {offset} with size {size} oversteps the \
                        allocation size {}",
                        memory_record.allocation_size,
                    )
                    .into(),
                    vuids: &["VUID-vkMapMemory-size-00681"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    pub fn record_map_memory(&self, memory: Id<DeviceMemory>, map_info: MemoryMapInfo) {
        let Ok(memory_record) = self.objects.memories.get(memory) else {
            return;
        };

        let size = if map_info.size == WHOLE_SIZE {
            memory_record.allocation_size.saturating_sub(map_info.offset)
        } else {
            map_info.size
        };

        memory_record.state.lock().mapped = Some(MappedRange {
            offset: map_info.offset,
            size,
        });
    }

    /// Unmaps an allocation.
    pub fn unmap_memory(&self, memory: Id<DeviceMemory>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_unmap_memory(memory))?;
        self.record_unmap_memory(memory);

        Ok(())
    }

    pub fn validate_unmap_memory(
        &self,
        memory: Id<DeviceMemory>,
    ) -> Result<(), Box<ValidationError>> {
        let memory_record =
            self.lookup(memory, "memory", &["VUID-vkUnmapMemory-memory-parameter"])?;

        if memory_record.state.lock().mapped.is_none() {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: format!("unmapping memory that is not mapped: {}", memory.erase())
                    .into(),
                vuids: &["VUID-vkUnmapMemory-memory-00689"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_unmap_memory(&self, memory: Id<DeviceMemory>) {
        if let Ok(memory_record) = self.objects.memories.get(memory) {
            memory_record.state.lock().mapped = None;
        }
    }

    /// Checks ranges that are about to be flushed to or invalidated from the device. There is no
    /// state to record for these.
    pub fn validate_mapped_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange],
    ) -> Result<(), Box<ValidationError>> {
        let atom_size = self.properties().non_coherent_atom_size;

        for (index, range) in ranges.iter().enumerate() {
            let &MappedMemoryRange {
                memory,
                offset,
                size,
            } = range;

            let memory_record = self
                .lookup(memory, "memory", &["VUID-VkMappedMemoryRange-memory-parameter"])
                .map_err(|err| err.add_context(format!("ranges[{}]", index)))?;

            let Some(mapped) = memory_record.state.lock().mapped else {
                return Err(Box::new(ValidationError {
                    context: format!("ranges[{}].memory", index).into(),
                    problem: "is not currently host mapped".into(),
                    vuids: &["VUID-VkMappedMemoryRange-memory-00684"],
                    ..Default::default()
                }));
            };

            if size == WHOLE_SIZE {
                if offset < mapped.offset {
                    return Err(Box::new(ValidationError {
                        context: format!("ranges[{}].offset", index).into(),
                        problem: "is less than the start of the currently mapped range".into(),
                        vuids: &["VUID-VkMappedMemoryRange-size-00686"],
                        ..Default::default()
                    }));
                }
            } else {
                let mapped_end = mapped.offset + mapped.size;

                if offset < mapped.offset || offset > mapped_end || size > mapped_end - offset {
                    return Err(Box::new(ValidationError {
                        context: format!("ranges[{}]", index).into(),
                        problem: "`offset` and `size` do not describe a range contained in the \
                            currently mapped range"
                            .into(),
                        vuids: &["VUID-VkMappedMemoryRange-size-00685"],
                        ..Default::default()
                    }));
                }

                if size % atom_size != 0
                    && offset.checked_add(size) != Some(memory_record.allocation_size)
                {
                    return Err(Box::new(ValidationError {
                        context: format!("ranges[{}].size", index).into(),
                        problem: "is not a multiple of the `non_coherent_atom_size` device \
                            property, and does not reach the end of the allocation"
                            .into(),
                        vuids: &["VUID-VkMappedMemoryRange-size-01390"],
                        ..Default::default()
                    }));
                }
            }

            if offset % atom_size != 0 {
                return Err(Box::new(ValidationError {
                    context: format!("ranges[{}].offset", index).into(),
                    problem: "is not a multiple of the `non_coherent_atom_size` device property"
                        .into(),
                    vuids: &["VUID-VkMappedMemoryRange-offset-00687"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MappedMemoryRange, MemoryAllocateInfo, MemoryMapInfo};
    use crate::{driver::StaticDriver, tests::device_with_driver};
    use ash::vk::WHOLE_SIZE;

    fn host_visible(allocation_size: u64) -> MemoryAllocateInfo {
        MemoryAllocateInfo {
            allocation_size,
            memory_type_index: 1,
            ..Default::default()
        }
    }

    #[test]
    fn allocate_from_missing_heap() {
        let mut driver = StaticDriver::default();
        driver.memory_properties.memory_types[0].heap_index = 7;
        let (device, log) = device_with_driver(driver);

        device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 1024,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn allocate_invalid() {
        let (device, _queue, log) = test_device!();

        assert_should_fail!(
            device.allocate_memory(MemoryAllocateInfo {
                allocation_size: 0,
                memory_type_index: 0,
                ..Default::default()
            }),
            "VUID-VkMemoryAllocateInfo-allocationSize-07899",
        );
        assert_should_fail!(
            device.allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 100,
                ..Default::default()
            }),
            "VUID-vkAllocateMemory-pAllocateInfo-01714",
        );
        assert!(log.contains("VUID-vkAllocateMemory-pAllocateInfo-01714"));
    }

    #[test]
    fn map_size_zero() {
        let (device, _queue, log) = test_device!();
        let memory = device.allocate_memory(host_visible(1024)).unwrap();

        assert_should_fail!(
            device.map_memory(
                memory,
                MemoryMapInfo {
                    offset: 0,
                    size: 0,
                    ..Default::default()
                },
            ),
            "VUID-vkMapMemory-size-00680",
        );
        assert!(log.contains_message(
            "VUID-vkMapMemory-size-00680",
            "attempting to map memory range of size zero",
        ));
    }

    #[test]
    fn double_map_and_unmap() {
        let (device, _queue, _log) = test_device!();
        let memory = device.allocate_memory(host_visible(1024)).unwrap();

        device.map_memory(memory, Default::default()).unwrap();
        assert_should_fail!(
            device.map_memory(memory, Default::default()),
            "VUID-vkMapMemory-memory-00678",
        );

        device.unmap_memory(memory).unwrap();
        assert_should_fail!(
            device.unmap_memory(memory),
            "VUID-vkUnmapMemory-memory-00689",
        );

        // A failed map must not leave the memory mapped.
        assert!(device.get(memory).unwrap().mapped_range().is_none());
    }

    #[test]
    fn map_checks_in_order() {
        let (device, _queue, _log) = test_device!();
        let device_local = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 1024,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();
        let memory = device.allocate_memory(host_visible(1024)).unwrap();

        assert_should_fail!(
            device.map_memory(device_local, Default::default()),
            "VUID-vkMapMemory-memory-00682",
        );
        assert_should_fail!(
            device.map_memory(
                memory,
                MemoryMapInfo {
                    offset: 1024,
                    size: WHOLE_SIZE,
                    ..Default::default()
                },
            ),
            "VUID-vkMapMemory-offset-00679",
        );
        assert_should_fail!(
            device.map_memory(
                memory,
                MemoryMapInfo {
                    offset: 512,
                    size: 513,
                    ..Default::default()
                },
            ),
            "VUID-vkMapMemory-size-00681",
        );

        device
            .map_memory(
                memory,
                MemoryMapInfo {
                    offset: 512,
                    size: WHOLE_SIZE,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(device.get(memory).unwrap().mapped_range().unwrap().size, 512);
    }

    #[test]
    fn flush_ranges() {
        let (device, _queue, _log) = test_device!();
        let memory = device.allocate_memory(host_visible(1024)).unwrap();
        let range = |offset, size| MappedMemoryRange {
            memory,
            offset,
            size,
        };

        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(0, 64)]),
            "VUID-VkMappedMemoryRange-memory-00684",
        );

        device.map_memory(memory, Default::default()).unwrap();
        device
            .validate_mapped_memory_ranges(&[range(0, 64), range(64, WHOLE_SIZE)])
            .unwrap();
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(3, 64)]),
            "VUID-VkMappedMemoryRange-offset-00687",
        );
    }

    #[test]
    fn flush_ranges_outside_mapping() {
        let (device, _queue, _log) = test_device!();
        let memory = device.allocate_memory(host_visible(1024)).unwrap();
        let range = |offset, size| MappedMemoryRange {
            memory,
            offset,
            size,
        };

        device
            .map_memory(
                memory,
                MemoryMapInfo {
                    offset: 128,
                    size: 512,
                    ..Default::default()
                },
            )
            .unwrap();
        device
            .validate_mapped_memory_ranges(&[range(128, 512), range(192, WHOLE_SIZE)])
            .unwrap();

        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(64, 64)]),
            "VUID-VkMappedMemoryRange-size-00685",
        );
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(512, 192)]),
            "VUID-VkMappedMemoryRange-size-00685",
        );
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(704, 64)]),
            "VUID-VkMappedMemoryRange-size-00685",
        );
        // The end of the range is past the end of the address space.
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(192, u64::MAX - 1)]),
            "VUID-VkMappedMemoryRange-size-00685",
        );
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(64, WHOLE_SIZE)]),
            "VUID-VkMappedMemoryRange-size-00686",
        );
    }

    #[test]
    fn flush_ranges_atom_size() {
        let (device, _queue, _log) = test_device!();
        let memory = device.allocate_memory(host_visible(1000)).unwrap();
        let range = |offset, size| MappedMemoryRange {
            memory,
            offset,
            size,
        };

        device.map_memory(memory, Default::default()).unwrap();
        assert_should_fail!(
            device.validate_mapped_memory_ranges(&[range(128, 100)]),
            "VUID-VkMappedMemoryRange-size-01390",
        );

        // A range that ends at the end of the allocation needs no rounding.
        device
            .validate_mapped_memory_ranges(&[range(960, 40)])
            .unwrap();
    }

    #[test]
    fn free_twice() {
        let (device, _queue, _log) = test_device!();
        let memory = device.allocate_memory(host_visible(256)).unwrap();

        device.free_memory(memory).unwrap();
        assert_should_fail!(
            device.free_memory(memory),
            "VUID-vkFreeMemory-memory-parameter",
        );
    }
}
