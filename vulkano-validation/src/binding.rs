// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Binding memory to buffers and images.
//!
//! A resource that was not created with sparse binding must be bound to memory exactly once.
//! The checks of a bind are performed in this order, and the first one that fails is reported:
//!
//! 1. The resource and the memory are live objects of the device.
//! 2. The resource is not already bound. This includes a resource whose memory was freed since:
//!    its binding stays recorded.
//! 3. The resource was not created with sparse binding.
//! 4. The memory type of the allocation is one that the resource supports.
//! 5. The offset is a multiple of the alignment that the resource requires.
//! 6. The offset is within the allocation, and the resource fits in the rest of it.
//! 7. If the allocation is dedicated, it is dedicated to this resource and the offset is zero.
//!
//! A bind that passes these checks can still alias another resource of the same allocation.
//! That is allowed, except that a linear resource (a buffer, or an image with linear tiling)
//! that shares a page of `buffer_image_granularity` bytes with an optimally tiled image causes
//! undefined contents on some implementations. This is reported as a warning.

use crate::{
    buffer::Buffer,
    device::Device,
    handle::Id,
    image::{Image, ImageTiling},
    memory::{BoundRange, DeviceMemory, MemoryRequirements},
    object::{Object, ObjectRef},
    DeviceSize, ValidationError,
};
use parking_lot::Mutex;

/// The memory that a resource is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceMemory {
    pub memory: Id<DeviceMemory>,
    pub offset: DeviceSize,
}

/// The identifier reported when a linear and an optimal resource share a granularity page.
pub const INVALID_ALIASING_VUID: &str = "UNASSIGNED-CoreValidation-MemTrack-InvalidAliasing";

struct BindVuids {
    resource_parameter: &'static [&'static str],
    memory_parameter: &'static [&'static str],
    already_bound: &'static [&'static str],
    sparse: &'static [&'static str],
    memory_type: &'static [&'static str],
    alignment: &'static [&'static str],
    offset: &'static [&'static str],
    size: &'static [&'static str],
    dedicated: &'static [&'static str],
    requires_dedicated: &'static [&'static str],
}

/// A resource that memory can be bound to.
trait Bindable: Object {
    const NAME: &'static str;

    const COMMAND: &'static str;

    const VUIDS: BindVuids;

    fn memory_slot(&self) -> &Mutex<Option<ResourceMemory>>;

    fn requirements(&self) -> &MemoryRequirements;

    fn is_sparse_resource(&self) -> bool;

    fn is_linear(&self) -> bool;
}

impl Bindable for Buffer {
    const NAME: &'static str = "buffer";

    const COMMAND: &'static str = "vkBindBufferMemory()";

    const VUIDS: BindVuids = BindVuids {
        resource_parameter: &["VUID-vkBindBufferMemory-buffer-parameter"],
        memory_parameter: &["VUID-vkBindBufferMemory-memory-parameter"],
        already_bound: &["VUID-vkBindBufferMemory-buffer-07459"],
        sparse: &["VUID-vkBindBufferMemory-buffer-01030"],
        memory_type: &["VUID-vkBindBufferMemory-memory-01035"],
        alignment: &["VUID-vkBindBufferMemory-memoryOffset-01036"],
        offset: &["VUID-vkBindBufferMemory-memoryOffset-01031"],
        size: &["VUID-vkBindBufferMemory-size-01037"],
        dedicated: &["VUID-vkBindBufferMemory-memory-01508"],
        requires_dedicated: &["VUID-vkBindBufferMemory-buffer-01444"],
    };

    fn memory_slot(&self) -> &Mutex<Option<ResourceMemory>> {
        &self.memory
    }

    fn requirements(&self) -> &MemoryRequirements {
        self.memory_requirements()
    }

    fn is_sparse_resource(&self) -> bool {
        self.is_sparse()
    }

    fn is_linear(&self) -> bool {
        true
    }
}

impl Bindable for Image {
    const NAME: &'static str = "image";

    const COMMAND: &'static str = "vkBindImageMemory()";

    const VUIDS: BindVuids = BindVuids {
        resource_parameter: &["VUID-vkBindImageMemory-image-parameter"],
        memory_parameter: &["VUID-vkBindImageMemory-memory-parameter"],
        already_bound: &["VUID-vkBindImageMemory-image-07460"],
        sparse: &["VUID-vkBindImageMemory-image-01045"],
        memory_type: &["VUID-vkBindImageMemory-memory-01047"],
        alignment: &["VUID-vkBindImageMemory-memoryOffset-01048"],
        offset: &["VUID-vkBindImageMemory-memoryOffset-01046"],
        size: &["VUID-vkBindImageMemory-size-01049"],
        dedicated: &["VUID-vkBindImageMemory-memory-01509"],
        requires_dedicated: &["VUID-vkBindImageMemory-image-01445"],
    };

    fn memory_slot(&self) -> &Mutex<Option<ResourceMemory>> {
        &self.memory
    }

    fn requirements(&self) -> &MemoryRequirements {
        self.memory_requirements()
    }

    fn is_sparse_resource(&self) -> bool {
        self.is_sparse()
    }

    fn is_linear(&self) -> bool {
        self.tiling() == ImageTiling::Linear
    }
}

impl Device {
    /// Binds memory to a buffer.
    pub fn bind_buffer_memory(
        &self,
        buffer: Id<Buffer>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_bind_buffer_memory(buffer, memory, offset))?;
        self.record_bind_buffer_memory(buffer, memory, offset);

        Ok(())
    }

    pub fn validate_bind_buffer_memory(
        &self,
        buffer: Id<Buffer>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        self.validate_bind_memory(buffer, memory, offset)
    }

    pub fn record_bind_buffer_memory(
        &self,
        buffer: Id<Buffer>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) {
        self.record_bind_memory(buffer, memory, offset);
    }

    /// Binds memory to an image.
    pub fn bind_image_memory(
        &self,
        image: Id<Image>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_bind_image_memory(image, memory, offset))?;
        self.record_bind_image_memory(image, memory, offset);

        Ok(())
    }

    pub fn validate_bind_image_memory(
        &self,
        image: Id<Image>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        self.validate_bind_memory(image, memory, offset)
    }

    pub fn record_bind_image_memory(
        &self,
        image: Id<Image>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) {
        self.record_bind_memory(image, memory, offset);
    }

    fn validate_bind_memory<T: Bindable>(
        &self,
        resource: Id<T>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        let vuids = &T::VUIDS;
        let resource_record = self.lookup(resource, T::NAME, vuids.resource_parameter)?;
        let memory_record = self.lookup(memory, "memory", vuids.memory_parameter)?;

        if let Some(bound) = *resource_record.memory_slot().lock() {
            return Err(Box::new(ValidationError {
                context: T::NAME.into(),
                problem: format!(
                    "in {}, attempting to bind {} to {} which has already been bound to {}",
                    T::COMMAND,
                    memory.erase(),
                    resource.erase(),
                    bound.memory.erase(),
                )
                .into(),
                vuids: vuids.already_bound,
                ..Default::default()
            }));
        }

        if resource_record.is_sparse_resource() {
            return Err(Box::new(ValidationError {
                context: T::NAME.into(),
                problem: format!(
                    "{} was created with sparse binding, and requires the sparse bind path \
                    instead of {}",
                    resource.erase(),
                    T::COMMAND,
                )
                .into(),
                vuids: vuids.sparse,
                ..Default::default()
            }));
        }

        let requirements = resource_record.requirements();
        let memory_type_index = memory_record.memory_type_index();

        // Types past the 32nd cannot be named by `memory_type_bits` at all.
        let memory_type_bit = 1u32.checked_shl(memory_type_index).unwrap_or(0);

        if requirements.memory_type_bits & memory_type_bit == 0 {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: format!(
                    "require memoryTypeBits (0x{:x}) but {} is from memory type {} in {}",
                    requirements.memory_type_bits,
                    memory.erase(),
                    memory_type_index,
                    T::COMMAND,
                )
                .into(),
                vuids: vuids.memory_type,
                ..Default::default()
            }));
        }

        if offset % requirements.alignment != 0 {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: format!(
                    "is {:#x} but must be an integer multiple of the alignment {:#x} required \
                    by the {}",
                    offset,
                    requirements.alignment,
                    T::NAME,
                )
                .into(),
                vuids: vuids.alignment,
                ..Default::default()
            }));
        }

        let allocation_size = memory_record.allocation_size();

        if offset >= allocation_size {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: format!(
                    "is {:#x}, which must be less than the memory allocation size {:#x}",
                    offset, allocation_size,
                )
                .into(),
                vuids: vuids.offset,
                ..Default::default()
            }));
        }

        if requirements.size > allocation_size - offset {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the {} of size {:#x} at offset {:#x} would overstep the memory allocation \
                    size {:#x}",
                    T::NAME,
                    requirements.size,
                    offset,
                    allocation_size,
                )
                .into(),
                vuids: vuids.size,
                ..Default::default()
            }));
        }

        match memory_record.dedicated_allocation() {
            Some(dedicated) => {
                if dedicated.object() != resource.erase() {
                    return Err(Box::new(ValidationError {
                        context: "memory".into(),
                        problem: format!(
                            "{} is a dedicated allocation for {}, but is being bound to {}",
                            memory.erase(),
                            dedicated.object(),
                            resource.erase(),
                        )
                        .into(),
                        vuids: vuids.dedicated,
                        ..Default::default()
                    }));
                }

                if offset != 0 {
                    return Err(Box::new(ValidationError {
                        context: "offset".into(),
                        problem: format!(
                            "is {:#x}, but {} is a dedicated allocation and must be bound at \
                            offset zero",
                            offset,
                            memory.erase(),
                        )
                        .into(),
                        vuids: vuids.dedicated,
                        ..Default::default()
                    }));
                }
            }
            None => {
                if requirements.requires_dedicated_allocation {
                    return Err(Box::new(ValidationError {
                        context: "memory".into(),
                        problem: format!(
                            "{} requires a dedicated allocation, but {} is not dedicated to it",
                            resource.erase(),
                            memory.erase(),
                        )
                        .into(),
                        vuids: vuids.requires_dedicated,
                        ..Default::default()
                    }));
                }
            }
        }

        let new_range = BoundRange {
            object: resource.erase(),
            offset,
            size: requirements.size,
            linear: resource_record.is_linear(),
        };
        let granularity = self.properties().buffer_image_granularity.max(1);
        let aliased = memory_record
            .state
            .lock()
            .bound_ranges
            .iter()
            .find(|bound| {
                bound.linear != new_range.linear && shares_page(bound, &new_range, granularity)
            })
            .copied();

        if let Some(other) = aliased {
            self.report_warning(
                INVALID_ALIASING_VUID,
                format!(
                    "{} {} is aliased with {} {} which may indicate a bug. For further info \
                    refer to the Buffer-Image Granularity section of the Vulkan specification",
                    if new_range.linear { "linear" } else { "non-linear" },
                    new_range.object,
                    if other.linear { "linear" } else { "non-linear" },
                    other.object,
                ),
                &[new_range.object, other.object],
            );
        }

        Ok(())
    }

    fn record_bind_memory<T: Bindable>(
        &self,
        resource: Id<T>,
        memory: Id<DeviceMemory>,
        offset: DeviceSize,
    ) {
        let (Ok(resource_record), Ok(memory_record)) = (self.get(resource), self.get(memory))
        else {
            return;
        };

        *resource_record.memory_slot().lock() = Some(ResourceMemory { memory, offset });
        memory_record.state.lock().bound_ranges.push(BoundRange {
            object: resource.erase(),
            offset,
            size: resource_record.requirements().size,
            linear: resource_record.is_linear(),
        });

        tracing::trace!(resource = %resource.erase(), ?memory, offset, "bound memory");
    }

    /// Removes the range of a destroyed resource from the memory it was bound to, if the memory
    /// is still alive.
    pub(crate) fn release_bound_range(&self, memory: Id<DeviceMemory>, object: ObjectRef) {
        if let Ok(memory_record) = self.get(memory) {
            memory_record
                .state
                .lock()
                .bound_ranges
                .retain(|bound| bound.object != object);
        }
    }
}

/// Returns whether two ranges touch a common page of `granularity` bytes.
fn shares_page(a: &BoundRange, b: &BoundRange, granularity: DeviceSize) -> bool {
    if a.size == 0 || b.size == 0 {
        return false;
    }

    let a_first = a.offset / granularity;
    let a_last = (a.offset + a.size - 1) / granularity;
    let b_first = b.offset / granularity;
    let b_last = (b.offset + b.size - 1) / granularity;

    a_first <= b_last && b_first <= a_last
}

#[cfg(test)]
mod tests {
    use super::{ResourceMemory, INVALID_ALIASING_VUID};
    use crate::{
        buffer::{BufferCreateFlags, BufferCreateInfo},
        device::{Device, DeviceExtensions, DeviceFeatures},
        format::Format,
        image::{ImageCreateInfo, ImageTiling, ImageUsage},
        driver::StaticDriver,
        memory::{DedicatedAllocation, MemoryAllocateInfo},
        tests::{device_with_driver, uniform_buffer_info},
        Id, ValidationErrorKind,
    };
    use rand::Rng;

    fn allocate(device: &Device, allocation_size: u64) -> Id<crate::memory::DeviceMemory> {
        device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap()
    }

    fn image_info(tiling: ImageTiling) -> ImageCreateInfo {
        ImageCreateInfo {
            format: Format::R8G8B8A8_UNORM,
            extent: [16, 16, 1],
            tiling,
            usage: ImageUsage::SAMPLED,
            ..Default::default()
        }
    }

    #[test]
    fn bind_twice() {
        let (device, _queue, log) = test_device!();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let other = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = allocate(&device, 256);
        let memory2 = allocate(&device, 256);

        device.bind_buffer_memory(buffer, memory, 0).unwrap();

        // A different buffer can alias the same range.
        device.bind_buffer_memory(other, memory, 0).unwrap();

        let err = device.bind_buffer_memory(buffer, memory2, 0).unwrap_err();
        assert!(err.is("VUID-vkBindBufferMemory-buffer-07459"));
        assert_eq!(err.kind, ValidationErrorKind::State);
        assert!(log.contains_message(
            "VUID-vkBindBufferMemory-buffer-07459",
            "which has already been bound to",
        ));
        assert_eq!(
            device.get(buffer).unwrap().memory(),
            Some(ResourceMemory { memory, offset: 0 }),
        );
        assert!(!log.contains(INVALID_ALIASING_VUID));
    }

    #[test]
    fn memory_type_beyond_type_bits() {
        let mut driver = StaticDriver::default();
        let memory_type = driver.memory_properties.memory_types[0];
        driver.memory_properties.memory_types.resize(33, memory_type);
        driver.buffer_memory_type_bits = u32::MAX;
        let (device, _log) = device_with_driver(driver);

        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 32,
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.bind_buffer_memory(buffer, memory, 0),
            "VUID-vkBindBufferMemory-memory-01035",
        );

        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 31,
                ..Default::default()
            })
            .unwrap();
        device.bind_buffer_memory(buffer, memory, 0).unwrap();
    }

    #[test]
    fn rebind_after_free() {
        let (device, _queue, _log) = test_device!();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = allocate(&device, 256);

        device.bind_buffer_memory(buffer, memory, 0).unwrap();
        device.free_memory(memory).unwrap();

        let memory = allocate(&device, 256);
        assert_should_fail!(
            device.bind_buffer_memory(buffer, memory, 0),
            "VUID-vkBindBufferMemory-buffer-07459",
        );
    }

    #[test]
    fn freed_memory() {
        let (device, _queue, _log) = test_device!();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = allocate(&device, 256);
        device.free_memory(memory).unwrap();

        let err = device.bind_buffer_memory(buffer, memory, 0).unwrap_err();
        assert!(err.is("VUID-vkBindBufferMemory-memory-parameter"));
        assert_eq!(err.kind, ValidationErrorKind::Lifetime);
    }

    #[test]
    fn sparse_buffer() {
        let (device, _queue, _log) = test_device!();
        let buffer = device
            .create_buffer(BufferCreateInfo {
                flags: BufferCreateFlags::SPARSE_BINDING,
                ..uniform_buffer_info(256)
            })
            .unwrap();
        let memory = allocate(&device, 256);

        assert_should_fail!(
            device.bind_buffer_memory(buffer, memory, 0),
            "VUID-vkBindBufferMemory-buffer-01030",
        );
    }

    #[test]
    fn memory_type() {
        let (device, _queue, _log) = test_device!();
        let image = device.create_image(image_info(ImageTiling::Optimal)).unwrap();

        // Optimal images only support memory types 0 and 2.
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 4096,
                memory_type_index: 1,
                ..Default::default()
            })
            .unwrap();

        assert_should_fail!(
            device.bind_image_memory(image, memory, 0),
            "VUID-vkBindImageMemory-memory-01047",
        );
    }

    #[test]
    fn alignment_boundaries() {
        let (device, _queue, _log) = test_device!();
        let alignment = 256;
        let size = 256;
        let allocation_size = 4096;
        let memory = allocate(&device, allocation_size);
        let mut rng = rand::thread_rng();

        let mut offsets = vec![
            0,
            alignment - 1,
            alignment,
            allocation_size - size - 1,
            allocation_size - size,
            allocation_size - 1,
            allocation_size,
            allocation_size + alignment,
        ];
        offsets.extend((0..32).map(|_| rng.gen_range(0..allocation_size + 2 * alignment)));

        for offset in offsets {
            let buffer = device.create_buffer(uniform_buffer_info(size)).unwrap();
            let result = device.bind_buffer_memory(buffer, memory, offset);
            let expected = offset % alignment == 0 && offset + size <= allocation_size;

            assert_eq!(result.is_ok(), expected, "offset {}", offset);

            if let Err(err) = result {
                let vuid = if offset % alignment != 0 {
                    "VUID-vkBindBufferMemory-memoryOffset-01036"
                } else if offset >= allocation_size {
                    "VUID-vkBindBufferMemory-memoryOffset-01031"
                } else {
                    "VUID-vkBindBufferMemory-size-01037"
                };
                assert!(err.is(vuid), "offset {}: {}", offset, err);
            }
        }
    }

    #[test]
    fn dedicated_allocation() {
        let (device, _queue, _log) = test_device!();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let other = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 0,
                dedicated_allocation: Some(DedicatedAllocation::Buffer(buffer)),
                ..Default::default()
            })
            .unwrap();

        assert_should_fail!(
            device.bind_buffer_memory(other, memory, 0),
            "VUID-vkBindBufferMemory-memory-01508",
        );
        device.bind_buffer_memory(buffer, memory, 0).unwrap();
    }

    #[test]
    fn dedicated_requires_extension() {
        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();

        assert_should_fail!(
            device.allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 0,
                dedicated_allocation: Some(DedicatedAllocation::Buffer(buffer)),
                ..Default::default()
            }),
            "VUID-VkMemoryAllocateInfo-pNext-pNext",
        );
    }

    #[test]
    fn linear_optimal_aliasing() {
        let (device, _queue, log) = test_device!();
        let memory = allocate(&device, 1 << 16);
        let optimal = device.create_image(image_info(ImageTiling::Optimal)).unwrap();
        let linear = device.create_image(image_info(ImageTiling::Linear)).unwrap();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let far_buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();

        device.bind_image_memory(optimal, memory, 0).unwrap();
        assert!(log.is_empty());

        // Not an error, only a warning.
        device.bind_image_memory(linear, memory, 0).unwrap();
        assert_eq!(log.count(INVALID_ALIASING_VUID), 1);

        device.bind_buffer_memory(buffer, memory, 512).unwrap();
        assert_eq!(log.count(INVALID_ALIASING_VUID), 2);

        device.bind_buffer_memory(far_buffer, memory, 8192).unwrap();
        assert_eq!(log.count(INVALID_ALIASING_VUID), 2);
    }

    #[test]
    fn destroy_releases_range() {
        let (device, _queue, log) = test_device!();
        let memory = allocate(&device, 1 << 16);
        let optimal = device.create_image(image_info(ImageTiling::Optimal)).unwrap();
        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();

        device.bind_image_memory(optimal, memory, 0).unwrap();
        device.destroy_image(optimal).unwrap();
        device.bind_buffer_memory(buffer, memory, 0).unwrap();

        assert!(!log.contains(INVALID_ALIASING_VUID));
    }
}
