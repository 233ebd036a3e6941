// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Buffers, and views of buffers as texel buffers.
//!
//! A buffer is created without memory. Its memory requirements are queried from the driver at
//! creation, and memory must then be bound to it exactly once (see the [`binding`] module)
//! before it can be used, unless it was created with sparse binding.
//!
//! A [`BufferView`] interprets a range of a buffer as texels of a format, so that the buffer can
//! be used as a uniform or storage texel buffer.
//!
//! [`binding`]: crate::binding

use crate::{
    binding::ResourceMemory,
    device::Device,
    format::{Format, FormatFeatures},
    handle::Id,
    memory::MemoryRequirements,
    object::UseCount,
    sync::Sharing,
    DeviceSize, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrorKind,
};
use ash::vk::WHOLE_SIZE;
use parking_lot::Mutex;

vulkan_bitflags! {
    /// The ways a buffer may be used. Views, descriptor writes and transfer commands check
    /// for the matching bit.
    BufferUsage = BufferUsageFlags(u32);

    TRANSFER_SRC = TRANSFER_SRC,
    TRANSFER_DST = TRANSFER_DST,
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,
    UNIFORM_BUFFER = UNIFORM_BUFFER,
    STORAGE_BUFFER = STORAGE_BUFFER,
    INDEX_BUFFER = INDEX_BUFFER,

    /// Vertex and instance data.
    VERTEX_BUFFER = VERTEX_BUFFER,

    INDIRECT_BUFFER = INDIRECT_BUFFER,
}

vulkan_bitflags! {
    /// `VkBufferCreateFlags` that the engine understands.
    BufferCreateFlags = BufferCreateFlags(u32);

    /// Bound with sparse binding instead of `vkBindBufferMemory`.
    SPARSE_BINDING = SPARSE_BINDING,

    SPARSE_RESIDENCY = SPARSE_RESIDENCY,
    SPARSE_ALIASED = SPARSE_ALIASED,
}

/// The decoded form of a `VkBufferCreateInfo`.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    pub flags: BufferCreateFlags,

    /// In bytes. Must be set to a non-zero value.
    pub size: DeviceSize,

    /// Must be set to a non-empty value.
    pub usage: BufferUsage,

    /// Exclusive by default.
    pub sharing: Sharing,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: BufferCreateFlags::empty(),
            size: 0,
            usage: BufferUsage::empty(),
            sharing: Sharing::Exclusive,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl BufferCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            size,
            usage,
            ref sharing,
            _ne: _,
        } = self;

        if size == 0 {
            return Err(Box::new(ValidationError {
                context: "size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkBufferCreateInfo-size-00912"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if usage.is_empty() {
            return Err(Box::new(ValidationError {
                context: "usage".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkBufferCreateInfo-usage-requiredbitmask"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let enabled_features = device.enabled_features();

        if flags.intersects(BufferCreateFlags::SPARSE_BINDING) && !enabled_features.sparse_binding
        {
            return Err(Box::new(ValidationError {
                context: "flags".into(),
                problem: "contains `BufferCreateFlags::SPARSE_BINDING`".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "sparse_binding",
                )])]),
                vuids: &["VUID-VkBufferCreateInfo-flags-00915"],
                ..Default::default()
            }));
        }

        if flags.intersects(BufferCreateFlags::SPARSE_RESIDENCY)
            && !enabled_features.sparse_residency_buffer
        {
            return Err(Box::new(ValidationError {
                context: "flags".into(),
                problem: "contains `BufferCreateFlags::SPARSE_RESIDENCY`".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "sparse_residency_buffer",
                )])]),
                vuids: &["VUID-VkBufferCreateInfo-flags-00916"],
                ..Default::default()
            }));
        }

        if flags.intersects(BufferCreateFlags::SPARSE_ALIASED)
            && !enabled_features.sparse_residency_aliased
        {
            return Err(Box::new(ValidationError {
                context: "flags".into(),
                problem: "contains `BufferCreateFlags::SPARSE_ALIASED`".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "sparse_residency_aliased",
                )])]),
                vuids: &["VUID-VkBufferCreateInfo-flags-00917"],
                ..Default::default()
            }));
        }

        if flags.intersects(BufferCreateFlags::SPARSE_RESIDENCY | BufferCreateFlags::SPARSE_ALIASED)
            && !flags.intersects(BufferCreateFlags::SPARSE_BINDING)
        {
            return Err(Box::new(ValidationError {
                context: "flags".into(),
                problem: "contains `BufferCreateFlags::SPARSE_RESIDENCY` or \
                    `BufferCreateFlags::SPARSE_ALIASED`, but does not also contain \
                    `BufferCreateFlags::SPARSE_BINDING`"
                    .into(),
                vuids: &["VUID-VkBufferCreateInfo-flags-00918"],
                ..Default::default()
            }));
        }

        sharing
            .validate(
                device,
                &["VUID-VkBufferCreateInfo-sharingMode-00914"],
                &["VUID-VkBufferCreateInfo-sharingMode-01419"],
            )
            .map_err(|err| err.add_context("sharing"))?;

        Ok(())
    }
}

/// A buffer, and the memory binding that backs it.
#[derive(Debug)]
pub struct Buffer {
    flags: BufferCreateFlags,
    size: DeviceSize,
    usage: BufferUsage,
    sharing: Sharing,
    memory_requirements: MemoryRequirements,
    pub(crate) memory: Mutex<Option<ResourceMemory>>,
    use_count: UseCount,
}

impl_object!(Buffer, Buffer, buffers);

impl Buffer {
    #[inline]
    pub fn flags(&self) -> BufferCreateFlags {
        self.flags
    }

    /// Returns the size in bytes of the buffer.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    pub fn sharing(&self) -> &Sharing {
        &self.sharing
    }

    /// Returns the memory requirements that the driver reported at creation.
    #[inline]
    pub fn memory_requirements(&self) -> &MemoryRequirements {
        &self.memory_requirements
    }

    /// Returns whether the buffer was created with sparse binding, and therefore never has a
    /// regular memory binding.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.flags.intersects(BufferCreateFlags::SPARSE_BINDING)
    }

    /// Returns the memory that the buffer is bound to.
    ///
    /// The binding remains after the memory is freed.
    #[inline]
    pub fn memory(&self) -> Option<ResourceMemory> {
        *self.memory.lock()
    }
}

/// Parameters to create a new `BufferView`.
#[derive(Clone, Debug)]
pub struct BufferViewCreateInfo {
    /// The buffer to create a view of.
    ///
    /// The default value is [`Id::NULL`], which must be overridden.
    pub buffer: Id<Buffer>,

    /// The format of the texels of the view.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The offset in bytes of the view from the start of the buffer.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// The size in bytes of the view, or `VK_WHOLE_SIZE` to view up to the end of the buffer.
    ///
    /// The default value is `VK_WHOLE_SIZE`.
    pub range: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            buffer: Id::NULL,
            format: Format::R8G8B8A8_UNORM,
            offset: 0,
            range: WHOLE_SIZE,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A view of a buffer as texels of a format.
#[derive(Debug)]
pub struct BufferView {
    buffer: Id<Buffer>,
    format: Format,
    offset: DeviceSize,
    range: DeviceSize,
    use_count: UseCount,
}

impl_object!(BufferView, BufferView, buffer_views);

impl BufferView {
    /// Returns the buffer that the view was created from. The buffer may have been destroyed
    /// since.
    #[inline]
    pub fn buffer(&self) -> Id<Buffer> {
        self.buffer
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn offset(&self) -> DeviceSize {
        self.offset
    }

    /// Returns the size in bytes of the view, with `VK_WHOLE_SIZE` resolved.
    #[inline]
    pub fn range(&self) -> DeviceSize {
        self.range
    }
}

impl Device {
    /// Creates a new buffer, without memory.
    pub fn create_buffer(
        &self,
        create_info: BufferCreateInfo,
    ) -> Result<Id<Buffer>, Box<ValidationError>> {
        self.reported(self.validate_create_buffer(&create_info))?;

        Ok(self.record_create_buffer(create_info))
    }

    pub fn validate_create_buffer(
        &self,
        create_info: &BufferCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_buffer(&self, create_info: BufferCreateInfo) -> Id<Buffer> {
        let memory_requirements = self.driver().buffer_memory_requirements(&create_info);
        let BufferCreateInfo {
            flags,
            size,
            usage,
            sharing,
            _ne: _,
        } = create_info;

        let buffer = self.objects.buffers.register(Buffer {
            flags,
            size,
            usage,
            sharing,
            memory_requirements,
            memory: Mutex::new(None),
            use_count: UseCount::default(),
        });

        tracing::trace!(?buffer, size, ?usage, "created buffer");

        buffer
    }

    /// Destroys a buffer. Its range is released from the memory it was bound to.
    pub fn destroy_buffer(&self, buffer: Id<Buffer>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_buffer(buffer))?;
        self.record_destroy_buffer(buffer);

        Ok(())
    }

    pub fn validate_destroy_buffer(&self, buffer: Id<Buffer>) -> Result<(), Box<ValidationError>> {
        let buffer_record =
            self.lookup(buffer, "buffer", &["VUID-vkDestroyBuffer-buffer-parameter"])?;

        if buffer_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "buffer".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    buffer.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyBuffer-buffer-00922"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_buffer(&self, buffer: Id<Buffer>) {
        if let Ok(buffer_record) = self.objects.buffers.erase(buffer) {
            if let Some(memory) = buffer_record.memory() {
                self.release_bound_range(memory.memory, buffer.erase());
            }
        }
    }

    /// Creates a view of a buffer.
    pub fn create_buffer_view(
        &self,
        create_info: BufferViewCreateInfo,
    ) -> Result<Id<BufferView>, Box<ValidationError>> {
        self.reported(self.validate_create_buffer_view(&create_info))?;

        Ok(self.record_create_buffer_view(create_info))
    }

    pub fn validate_create_buffer_view(
        &self,
        create_info: &BufferViewCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let &BufferViewCreateInfo {
            buffer,
            format,
            offset,
            range,
            _ne: _,
        } = create_info;

        let buffer_record = self.lookup(
            buffer,
            "create_info.buffer",
            &["VUID-VkBufferViewCreateInfo-buffer-parameter"],
        )?;

        if !buffer_record.is_sparse() && buffer_record.memory().is_none() {
            return Err(Box::new(ValidationError {
                context: "create_info.buffer".into(),
                problem: format!(
                    "{} is used with no memory bound; memory should be bound by calling \
                    vkBindBufferMemory()",
                    buffer.erase(),
                )
                .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00935"],
                ..Default::default()
            }));
        }

        let usage = buffer_record.usage();

        if !usage.intersects(BufferUsage::UNIFORM_TEXEL_BUFFER | BufferUsage::STORAGE_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                context: "create_info.buffer".into(),
                problem: "was not created with the `BufferUsage::UNIFORM_TEXEL_BUFFER` or \
                    `BufferUsage::STORAGE_TEXEL_BUFFER` usage"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00932"],
                ..Default::default()
            }));
        }

        let buffer_size = buffer_record.size();

        if offset >= buffer_size {
            return Err(Box::new(ValidationError {
                context: "create_info.offset".into(),
                problem: "is not less than the size of the buffer".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-offset-00925"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let properties = self.properties();

        if offset % properties.min_texel_buffer_offset_alignment != 0 {
            return Err(Box::new(ValidationError {
                context: "create_info.offset".into(),
                problem: "is not a multiple of the `min_texel_buffer_offset_alignment` limit"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-offset-02749"],
                ..Default::default()
            }));
        }

        let block_size = format.block_size();

        if range != WHOLE_SIZE {
            if range == 0 {
                return Err(Box::new(ValidationError {
                    context: "create_info.range".into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-range-00928"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }

            if range % block_size != 0 {
                return Err(Box::new(ValidationError {
                    context: "create_info.range".into(),
                    problem: "is not a multiple of the texel block size of `create_info.format`"
                        .into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-range-00929"],
                    ..Default::default()
                }));
            }

            if range > buffer_size - offset {
                return Err(Box::new(ValidationError {
                    problem: "`create_info.offset + create_info.range` is greater than the size \
                        of the buffer"
                        .into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-offset-00931"],
                    ..Default::default()
                }));
            }
        }

        let effective_range = if range == WHOLE_SIZE {
            buffer_size - offset
        } else {
            range
        };

        if effective_range / block_size > properties.max_texel_buffer_elements as DeviceSize {
            return Err(Box::new(ValidationError {
                context: "create_info.range".into(),
                problem: "divided by the texel block size of `create_info.format`, is greater \
                    than the `max_texel_buffer_elements` limit"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-range-00930"],
                ..Default::default()
            }));
        }

        let buffer_features = self.format_properties(format).buffer_features;

        if usage.intersects(BufferUsage::UNIFORM_TEXEL_BUFFER)
            && !buffer_features.intersects(FormatFeatures::UNIFORM_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                problem: "the buffer was created with the `BufferUsage::UNIFORM_TEXEL_BUFFER` \
                    usage, but the format features of `create_info.format` do not include \
                    `FormatFeatures::UNIFORM_TEXEL_BUFFER`"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00933"],
                ..Default::default()
            }));
        }

        if usage.intersects(BufferUsage::STORAGE_TEXEL_BUFFER)
            && !buffer_features.intersects(FormatFeatures::STORAGE_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                problem: "the buffer was created with the `BufferUsage::STORAGE_TEXEL_BUFFER` \
                    usage, but the format features of `create_info.format` do not include \
                    `FormatFeatures::STORAGE_TEXEL_BUFFER`"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00934"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_create_buffer_view(&self, create_info: BufferViewCreateInfo) -> Id<BufferView> {
        let BufferViewCreateInfo {
            buffer,
            format,
            offset,
            range,
            _ne: _,
        } = create_info;

        let range = if range == WHOLE_SIZE {
            self.get(buffer)
                .map(|buffer| buffer.size().saturating_sub(offset))
                .unwrap_or(0)
        } else {
            range
        };

        self.objects.buffer_views.register(BufferView {
            buffer,
            format,
            offset,
            range,
            use_count: UseCount::default(),
        })
    }

    /// Destroys a buffer view.
    pub fn destroy_buffer_view(
        &self,
        buffer_view: Id<BufferView>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_buffer_view(buffer_view))?;
        self.record_destroy_buffer_view(buffer_view);

        Ok(())
    }

    pub fn validate_destroy_buffer_view(
        &self,
        buffer_view: Id<BufferView>,
    ) -> Result<(), Box<ValidationError>> {
        let view_record = self.lookup(
            buffer_view,
            "buffer_view",
            &["VUID-vkDestroyBufferView-bufferView-parameter"],
        )?;

        if view_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "buffer_view".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    buffer_view.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyBufferView-bufferView-00936"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_buffer_view(&self, buffer_view: Id<BufferView>) {
        let _ = self.objects.buffer_views.erase(buffer_view);
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferCreateFlags, BufferCreateInfo, BufferUsage, BufferViewCreateInfo};
    use crate::{
        device::{DeviceExtensions, DeviceFeatures},
        format::Format,
        memory::MemoryAllocateInfo,
        sync::Sharing,
        tests::uniform_buffer_info,
        ValidationErrorKind,
    };
    use ash::vk::WHOLE_SIZE;
    use smallvec::smallvec;

    #[test]
    fn create() {
        let (device, _queue, _log) = test_device!();

        let buffer = device.create_buffer(uniform_buffer_info(128)).unwrap();
        let record = device.get(buffer).unwrap();

        assert_eq!(record.size(), 128);
        assert_eq!(record.memory_requirements().alignment, 256);
        assert!(record.memory().is_none());
    }

    #[test]
    fn create_invalid() {
        let (device, _queue, log) = test_device!();

        let err = device.create_buffer(uniform_buffer_info(0)).unwrap_err();
        assert!(err.is("VUID-VkBufferCreateInfo-size-00912"));
        assert_eq!(err.kind, ValidationErrorKind::Parameter);
        assert!(log.contains("VUID-VkBufferCreateInfo-size-00912"));

        assert_should_fail!(
            device.create_buffer(BufferCreateInfo {
                size: 16,
                ..Default::default()
            }),
            "VUID-VkBufferCreateInfo-usage-requiredbitmask",
        );
        assert_should_fail!(
            device.create_buffer(BufferCreateInfo {
                flags: BufferCreateFlags::SPARSE_RESIDENCY,
                ..uniform_buffer_info(16)
            }),
            "VUID-VkBufferCreateInfo-flags-00918",
        );
        assert_should_fail!(
            device.create_buffer(BufferCreateInfo {
                sharing: Sharing::Concurrent(smallvec![0]),
                ..uniform_buffer_info(16)
            }),
            "VUID-VkBufferCreateInfo-sharingMode-00914",
        );
    }

    #[test]
    fn sparse_requires_feature() {
        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());

        let err = device
            .create_buffer(BufferCreateInfo {
                flags: BufferCreateFlags::SPARSE_BINDING,
                ..uniform_buffer_info(16)
            })
            .unwrap_err();

        assert!(err.is("VUID-VkBufferCreateInfo-flags-00915"));
        assert!(err.to_string().contains("sparse_binding"));
    }

    #[test]
    fn view_checks_in_order() {
        let (device, _queue, _log) = test_device!();
        let texel_info = BufferCreateInfo {
            size: 1024,
            usage: BufferUsage::UNIFORM_TEXEL_BUFFER,
            ..Default::default()
        };
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 4096,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();

        let unbound = device.create_buffer(texel_info.clone()).unwrap();
        assert_should_fail!(
            device.create_buffer_view(BufferViewCreateInfo {
                buffer: unbound,
                ..Default::default()
            }),
            "VUID-VkBufferViewCreateInfo-buffer-00935",
        );

        let uniform = device.create_buffer(uniform_buffer_info(1024)).unwrap();
        device.bind_buffer_memory(uniform, memory, 0).unwrap();
        assert_should_fail!(
            device.create_buffer_view(BufferViewCreateInfo {
                buffer: uniform,
                ..Default::default()
            }),
            "VUID-VkBufferViewCreateInfo-buffer-00932",
        );

        let texel = device.create_buffer(texel_info).unwrap();
        device.bind_buffer_memory(texel, memory, 1024).unwrap();
        let view = |offset, range| BufferViewCreateInfo {
            buffer: texel,
            format: Format::R8G8B8A8_UNORM,
            offset,
            range,
            ..Default::default()
        };

        assert_should_fail!(
            device.create_buffer_view(view(1024, WHOLE_SIZE)),
            "VUID-VkBufferViewCreateInfo-offset-00925",
        );
        assert_should_fail!(
            device.create_buffer_view(view(4, WHOLE_SIZE)),
            "VUID-VkBufferViewCreateInfo-offset-02749",
        );
        assert_should_fail!(
            device.create_buffer_view(view(0, 6)),
            "VUID-VkBufferViewCreateInfo-range-00929",
        );
        assert_should_fail!(
            device.create_buffer_view(view(512, 1024)),
            "VUID-VkBufferViewCreateInfo-offset-00931",
        );
        assert_should_fail!(
            device.create_buffer_view(view(512, u64::MAX - 3)),
            "VUID-VkBufferViewCreateInfo-offset-00931",
        );
        assert_should_fail!(
            device.create_buffer_view(BufferViewCreateInfo {
                format: Format::D32_SFLOAT,
                ..view(0, 64)
            }),
            "VUID-VkBufferViewCreateInfo-buffer-00933",
        );

        let view = device.create_buffer_view(view(512, WHOLE_SIZE)).unwrap();
        assert_eq!(device.get(view).unwrap().range(), 512);
    }
}
