// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The driver collaborator.
//!
//! Some of the data that validation needs cannot be derived from the API calls themselves: the
//! limits of the physical device, the memory types it has, the features each format supports,
//! and the memory requirements of each resource. A [`Driver`] supplies this data.
//!
//! [`StaticDriver`] answers from fixed tables that resemble a typical desktop implementation.
//! It is what the tests of this crate run against, and can be customized field by field.

use crate::{
    buffer::{BufferCreateInfo, BufferUsage},
    device::{DeviceExtensions, DeviceFeatures},
    format::{ChromaSampling, Format, FormatProperties},
    image::{ImageCreateInfo, ImageTiling},
    memory::{
        MemoryHeap, MemoryHeapFlags, MemoryProperties, MemoryPropertyFlags, MemoryRequirements,
        MemoryType,
    },
    queue::{QueueFamilyProperties, QueueFlags},
    DeviceSize,
};
use std::fmt::Debug;

/// Limits and properties of the physical device that validation depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProperties {
    pub max_image_dimension1_d: u32,
    pub max_image_dimension2_d: u32,
    pub max_image_dimension3_d: u32,
    pub max_image_dimension_cube: u32,
    pub max_image_array_layers: u32,
    pub max_texel_buffer_elements: u32,
    pub max_memory_allocation_count: u32,
    pub max_sampler_allocation_count: u32,
    pub buffer_image_granularity: DeviceSize,
    pub max_bound_descriptor_sets: u32,
    pub max_sampler_lod_bias: f32,
    pub max_sampler_anisotropy: f32,
    pub min_texel_buffer_offset_alignment: DeviceSize,
    pub min_uniform_buffer_offset_alignment: DeviceSize,
    pub min_storage_buffer_offset_alignment: DeviceSize,
    pub max_uniform_buffer_range: u32,
    pub max_storage_buffer_range: u32,
    pub non_coherent_atom_size: DeviceSize,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        DeviceProperties {
            max_image_dimension1_d: 16384,
            max_image_dimension2_d: 16384,
            max_image_dimension3_d: 2048,
            max_image_dimension_cube: 16384,
            max_image_array_layers: 2048,
            max_texel_buffer_elements: 1 << 27,
            max_memory_allocation_count: 4096,
            max_sampler_allocation_count: 4000,
            buffer_image_granularity: 1024,
            max_bound_descriptor_sets: 8,
            max_sampler_lod_bias: 15.0,
            max_sampler_anisotropy: 16.0,
            min_texel_buffer_offset_alignment: 16,
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 64,
            max_uniform_buffer_range: 65536,
            max_storage_buffer_range: 1 << 27,
            non_coherent_atom_size: 64,
        }
    }
}

/// Supplies the capability data of a physical device.
///
/// All methods must be deterministic: validation assumes that asking twice gives the same answer.
pub trait Driver: Send + Sync + Debug {
    /// Returns the limits of the physical device.
    fn properties(&self) -> &DeviceProperties;

    /// Returns the features that the physical device supports.
    fn supported_features(&self) -> &DeviceFeatures;

    /// Returns the extensions that the physical device supports.
    fn supported_extensions(&self) -> &DeviceExtensions;

    /// Returns the memory types and heaps of the physical device.
    fn memory_properties(&self) -> &MemoryProperties;

    /// Returns the queue families of the physical device.
    fn queue_family_properties(&self) -> &[QueueFamilyProperties];

    /// Returns the features that `format` supports.
    fn format_properties(&self, format: Format) -> FormatProperties;

    /// Returns the memory requirements of a buffer created with `create_info`.
    fn buffer_memory_requirements(&self, create_info: &BufferCreateInfo) -> MemoryRequirements;

    /// Returns the memory requirements of an image created with `create_info`.
    fn image_memory_requirements(&self, create_info: &ImageCreateInfo) -> MemoryRequirements;
}

/// A driver that answers from fixed tables.
#[derive(Clone, Debug)]
pub struct StaticDriver {
    pub properties: DeviceProperties,
    pub supported_features: DeviceFeatures,
    pub supported_extensions: DeviceExtensions,
    pub memory_properties: MemoryProperties,
    pub queue_family_properties: Vec<QueueFamilyProperties>,

    /// The alignment of every buffer, before usage-specific alignments are applied.
    pub buffer_alignment: DeviceSize,

    /// The alignment of every image.
    pub image_alignment: DeviceSize,

    /// The memory types that buffers can be bound to.
    pub buffer_memory_type_bits: u32,

    /// The memory types that images with optimal tiling can be bound to.
    pub optimal_image_memory_type_bits: u32,

    /// The memory types that images with linear tiling can be bound to.
    pub linear_image_memory_type_bits: u32,
}

impl Default for StaticDriver {
    fn default() -> Self {
        let host = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;

        StaticDriver {
            properties: DeviceProperties::default(),
            supported_features: DeviceFeatures::all(),
            supported_extensions: DeviceExtensions::all(),
            memory_properties: MemoryProperties {
                memory_types: vec![
                    MemoryType {
                        property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                        heap_index: 0,
                    },
                    MemoryType {
                        property_flags: host,
                        heap_index: 1,
                    },
                    MemoryType {
                        property_flags: MemoryPropertyFlags::DEVICE_LOCAL | host,
                        heap_index: 0,
                    },
                    MemoryType {
                        property_flags: host | MemoryPropertyFlags::HOST_CACHED,
                        heap_index: 1,
                    },
                ],
                memory_heaps: vec![
                    MemoryHeap {
                        size: 8 << 30,
                        flags: MemoryHeapFlags::DEVICE_LOCAL,
                    },
                    MemoryHeap {
                        size: 16 << 30,
                        flags: MemoryHeapFlags::empty(),
                    },
                ],
            },
            queue_family_properties: vec![
                QueueFamilyProperties {
                    queue_flags: QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER,
                    queue_count: 2,
                },
                QueueFamilyProperties {
                    queue_flags: QueueFlags::TRANSFER,
                    queue_count: 1,
                },
            ],
            buffer_alignment: 16,
            image_alignment: 1024,
            buffer_memory_type_bits: 0b1111,
            optimal_image_memory_type_bits: 0b0101,
            linear_image_memory_type_bits: 0b1111,
        }
    }
}

impl Driver for StaticDriver {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn supported_features(&self) -> &DeviceFeatures {
        &self.supported_features
    }

    fn supported_extensions(&self) -> &DeviceExtensions {
        &self.supported_extensions
    }

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn queue_family_properties(&self) -> &[QueueFamilyProperties] {
        &self.queue_family_properties
    }

    fn format_properties(&self, format: Format) -> FormatProperties {
        FormatProperties::typical(format)
    }

    fn buffer_memory_requirements(&self, create_info: &BufferCreateInfo) -> MemoryRequirements {
        let mut alignment = self.buffer_alignment;

        if create_info.usage.intersects(BufferUsage::UNIFORM_BUFFER) {
            alignment = alignment.max(self.properties.min_uniform_buffer_offset_alignment);
        }

        if create_info.usage.intersects(BufferUsage::STORAGE_BUFFER) {
            alignment = alignment.max(self.properties.min_storage_buffer_offset_alignment);
        }

        if create_info
            .usage
            .intersects(BufferUsage::UNIFORM_TEXEL_BUFFER | BufferUsage::STORAGE_TEXEL_BUFFER)
        {
            alignment = alignment.max(self.properties.min_texel_buffer_offset_alignment);
        }

        MemoryRequirements {
            size: align_up(create_info.size, alignment),
            alignment,
            memory_type_bits: self.buffer_memory_type_bits,
            prefers_dedicated_allocation: false,
            requires_dedicated_allocation: false,
        }
    }

    fn image_memory_requirements(&self, create_info: &ImageCreateInfo) -> MemoryRequirements {
        let format = create_info.format;
        let planes: &[Format] = if format.planes().is_empty() {
            std::slice::from_ref(&create_info.format)
        } else {
            format.planes()
        };

        let mut size = 0;

        for (plane_index, &plane_format) in planes.iter().enumerate() {
            let [mut width, mut height, depth] = create_info.extent;

            if plane_index != 0 {
                match format.ycbcr_chroma_sampling() {
                    Some(ChromaSampling::Mode420) => {
                        width = width.div_ceil(2);
                        height = height.div_ceil(2);
                    }
                    Some(ChromaSampling::Mode422) => width = width.div_ceil(2),
                    Some(ChromaSampling::Mode444) | None => (),
                }
            }

            let [block_width, block_height, block_depth] = plane_format.block_extent();

            for mip_level in 0..create_info.mip_levels {
                let mip_width = (width >> mip_level).max(1);
                let mip_height = (height >> mip_level).max(1);
                let mip_depth = (depth >> mip_level).max(1);
                let blocks = mip_width.div_ceil(block_width) as DeviceSize
                    * mip_height.div_ceil(block_height) as DeviceSize
                    * mip_depth.div_ceil(block_depth) as DeviceSize;

                size += blocks
                    * plane_format.block_size()
                    * create_info.array_layers as DeviceSize
                    * create_info.samples as DeviceSize;
            }
        }

        let memory_type_bits = match create_info.tiling {
            ImageTiling::Optimal => self.optimal_image_memory_type_bits,
            ImageTiling::Linear => self.linear_image_memory_type_bits,
        };

        MemoryRequirements {
            size: align_up(size.max(1), self.image_alignment),
            alignment: self.image_alignment,
            memory_type_bits,
            prefers_dedicated_allocation: false,
            requires_dedicated_allocation: false,
        }
    }
}

#[inline]
fn align_up(value: DeviceSize, alignment: DeviceSize) -> DeviceSize {
    value.div_ceil(alignment) * alignment
}
