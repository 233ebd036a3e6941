// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Stateless checks on raw call arguments.
//!
//! The structures in this module mirror the Vulkan structures as an application fills them in:
//! enums and flags are plain integers, booleans are `VkBool32`, and extension structures are
//! given as an explicit chain. Decoding one of them into the corresponding typed create info
//! checks everything that can be checked without looking at any object:
//!
//! - the `s_type` of the structure, and of each structure in its chain;
//! - that every structure in the chain is allowed there, and appears only once;
//! - that enum values are known, and flags contain only known bits;
//! - that reserved fields are zero, and required bitmasks are not empty;
//! - that booleans are `VK_TRUE` or `VK_FALSE`. Other values are accepted with a warning.
//!
//! Handles are not looked up here. A handle that is not null is checked by the stateful
//! validation of the call.

use crate::{
    buffer::{Buffer, BufferCreateFlags, BufferCreateInfo, BufferUsage},
    device::Device,
    format::Format,
    handle::Id,
    image::{
        Image, ImageCreateFlags, ImageCreateInfo, ImageTiling, ImageType, ImageUsage, SampleCount,
    },
    memory::{DedicatedAllocation, ExternalMemoryHandleTypes, MemoryAllocateInfo},
    sampler::{
        BorderColor, CompareOp, Filter, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode,
    },
    sync::{
        fence::{ExternalFenceHandleTypes, FenceCreateFlags, FenceCreateInfo},
        semaphore::{ExternalSemaphoreHandleTypes, SemaphoreCreateInfo},
        Sharing,
    },
    DeviceSize, ValidationError, ValidationErrorKind,
};
use ash::vk;
use smallvec::SmallVec;
use std::fmt::{Display, LowerHex};

/// The identifier that is reported for a `VkBool32` that is neither `VK_TRUE` nor `VK_FALSE`.
pub const UNRECOGNIZED_BOOL32_VUID: &str = "UNASSIGNED-GeneralParameterError-UnrecognizedBool32";

/// A structure in the `p_next` chain of another structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainEntry {
    /// `VkMemoryDedicatedAllocateInfo`.
    MemoryDedicatedAllocateInfo {
        image: Id<Image>,
        buffer: Id<Buffer>,
    },

    /// `VkExportMemoryAllocateInfo`.
    ExportMemoryAllocateInfo { handle_types: u32 },

    /// `VkExportFenceCreateInfo`.
    ExportFenceCreateInfo { handle_types: u32 },

    /// `VkExportSemaphoreCreateInfo`.
    ExportSemaphoreCreateInfo { handle_types: u32 },

    /// Any other structure. Only its type is known.
    Other(vk::StructureType),
}

impl ChainEntry {
    /// Returns the `sType` of the structure.
    pub fn structure_type(self) -> vk::StructureType {
        match self {
            ChainEntry::MemoryDedicatedAllocateInfo { .. } => {
                vk::StructureType::MEMORY_DEDICATED_ALLOCATE_INFO
            }
            ChainEntry::ExportMemoryAllocateInfo { .. } => {
                vk::StructureType::EXPORT_MEMORY_ALLOCATE_INFO
            }
            ChainEntry::ExportFenceCreateInfo { .. } => vk::StructureType::EXPORT_FENCE_CREATE_INFO,
            ChainEntry::ExportSemaphoreCreateInfo { .. } => {
                vk::StructureType::EXPORT_SEMAPHORE_CREATE_INFO
            }
            ChainEntry::Other(structure_type) => structure_type,
        }
    }
}

struct ChainVuids {
    s_type: &'static [&'static str],
    p_next: &'static [&'static str],
    unique: &'static [&'static str],
}

/// Checks the `s_type` of a structure, and the structures of its chain.
fn validate_structure(
    structure_name: &str,
    s_type: vk::StructureType,
    expected: vk::StructureType,
    next: &[ChainEntry],
    allowed: &[vk::StructureType],
    vuids: &ChainVuids,
) -> Result<(), Box<ValidationError>> {
    if s_type != expected {
        return Err(Box::new(ValidationError {
            context: "s_type".into(),
            problem: format!(
                "is `{:?}`, but a `{}` must have `sType` `{:?}`",
                s_type, structure_name, expected,
            )
            .into(),
            vuids: vuids.s_type,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        }));
    }

    let mut seen: SmallVec<[vk::StructureType; 4]> = SmallVec::new();

    for (index, entry) in next.iter().enumerate() {
        let structure_type = entry.structure_type();

        if !allowed.contains(&structure_type) {
            return Err(Box::new(ValidationError {
                context: format!("next[{}]", index).into(),
                problem: format!(
                    "is a structure of type `{:?}`, which is not allowed in the chain of `{}`",
                    structure_type, structure_name,
                )
                .into(),
                vuids: vuids.p_next,
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if seen.contains(&structure_type) {
            return Err(Box::new(ValidationError {
                context: format!("next[{}]", index).into(),
                problem: format!(
                    "is a structure of type `{:?}`, which appears more than once in the chain",
                    structure_type,
                )
                .into(),
                vuids: vuids.unique,
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        seen.push(structure_type);
    }

    Ok(())
}

/// Decodes an enum value, or fails if it is not one of the values of `T`.
pub(crate) fn decode_enum<R: Copy + Display, T>(
    raw: R,
    try_from_raw: impl FnOnce(R) -> Option<T>,
    context: &'static str,
    type_name: &str,
    vuids: &'static [&'static str],
) -> Result<T, Box<ValidationError>> {
    try_from_raw(raw).ok_or_else(|| {
        Box::new(ValidationError {
            context: context.into(),
            problem: format!(
                "({}) does not fall within the begin..end range of the core `{}` enumerator \
                tokens and is not an extension added token",
                raw, type_name,
            )
            .into(),
            vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        })
    })
}

/// Decodes a flags value, or fails if it contains bits that are not flags of `T`.
pub(crate) fn decode_flags<R: Copy + LowerHex, T>(
    raw: R,
    from_raw_checked: impl FnOnce(R) -> Result<T, R>,
    context: &'static str,
    type_name: &str,
    vuids: &'static [&'static str],
) -> Result<T, Box<ValidationError>> {
    from_raw_checked(raw).map_err(|unknown| {
        Box::new(ValidationError {
            context: context.into(),
            problem: format!(
                "contains flag bits ({:#x}) that are not recognized members of `{}`",
                unknown, type_name,
            )
            .into(),
            vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        })
    })
}

/// Fails if a reserved flags value is not zero.
pub(crate) fn reserved_zero(
    raw: u32,
    context: &'static str,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if raw != 0 {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: format!("is {:#x}, but it is reserved for future use and must be 0", raw)
                .into(),
            vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        }));
    }

    Ok(())
}

/// Fails if a handle that must be provided is the null handle.
pub(crate) fn required_handle<T>(
    id: Id<T>,
    context: &'static str,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if id.is_null() {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: "is a required parameter, but was specified as VK_NULL_HANDLE".into(),
            vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        }));
    }

    Ok(())
}

/// Fails if an array is given with a count of zero.
pub(crate) fn required_array_length(
    len: usize,
    context: &'static str,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if len == 0 {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: "has a count of 0, but the count must be greater than 0".into(),
            vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        }));
    }

    Ok(())
}

/// Decodes a `VkBool32`.
///
/// Any nonzero value is taken as true. Values other than `VK_TRUE` are reported as a warning.
pub(crate) fn decode_bool(device: &Device, raw: vk::Bool32, context: &str) -> bool {
    if raw > vk::TRUE {
        device.report_warning(
            UNRECOGNIZED_BOOL32_VUID,
            format!(
                "`{}` ({}) is neither VK_TRUE nor VK_FALSE. Applications must not pass any \
                other values than VK_TRUE or VK_FALSE into a Vulkan implementation where a \
                VkBool32 is expected",
                context, raw,
            ),
            &[],
        );
    }

    raw != vk::FALSE
}

fn decode_sharing(
    raw: i32,
    queue_family_indices: Option<&[u32]>,
    vuids: (&'static [&'static str], &'static [&'static str]),
) -> Result<Sharing, Box<ValidationError>> {
    let (mode_vuids, indices_vuids) = vuids;
    let sharing_mode = decode_enum(
        raw,
        |raw| match vk::SharingMode::from_raw(raw) {
            vk::SharingMode::EXCLUSIVE => Some(vk::SharingMode::EXCLUSIVE),
            vk::SharingMode::CONCURRENT => Some(vk::SharingMode::CONCURRENT),
            _ => None,
        },
        "sharing_mode",
        "VkSharingMode",
        mode_vuids,
    )?;

    if sharing_mode == vk::SharingMode::EXCLUSIVE {
        return Ok(Sharing::Exclusive);
    }

    match queue_family_indices {
        Some(queue_family_indices) => Ok(Sharing::Concurrent(
            queue_family_indices.iter().copied().collect(),
        )),
        None => Err(Box::new(ValidationError {
            context: "queue_family_indices".into(),
            problem: "is NULL, but `sharing_mode` is `VK_SHARING_MODE_CONCURRENT`".into(),
            vuids: indices_vuids,
            kind: ValidationErrorKind::Parameter,
            ..Default::default()
        })),
    }
}

/// A raw `VkBufferCreateInfo`.
#[derive(Clone, Debug)]
pub struct RawBufferCreateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub flags: u32,
    pub size: DeviceSize,
    pub usage: u32,
    pub sharing_mode: i32,
    pub queue_family_indices: Option<Vec<u32>>,
}

impl Default for RawBufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            next: Vec::new(),
            flags: 0,
            size: 0,
            usage: 0,
            sharing_mode: vk::SharingMode::EXCLUSIVE.as_raw(),
            queue_family_indices: None,
        }
    }
}

impl RawBufferCreateInfo {
    pub fn decode(&self, _device: &Device) -> Result<BufferCreateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            flags,
            size,
            usage,
            sharing_mode,
            ref queue_family_indices,
        } = self;

        validate_structure(
            "VkBufferCreateInfo",
            s_type,
            vk::StructureType::BUFFER_CREATE_INFO,
            next,
            &[],
            &ChainVuids {
                s_type: &["VUID-VkBufferCreateInfo-sType-sType"],
                p_next: &["VUID-VkBufferCreateInfo-pNext-pNext"],
                unique: &["VUID-VkBufferCreateInfo-sType-unique"],
            },
        )?;

        let flags = decode_flags(
            flags,
            BufferCreateFlags::from_raw_checked,
            "flags",
            "VkBufferCreateFlagBits",
            &["VUID-VkBufferCreateInfo-flags-parameter"],
        )?;
        let usage = decode_flags(
            usage,
            BufferUsage::from_raw_checked,
            "usage",
            "VkBufferUsageFlagBits",
            &["VUID-VkBufferCreateInfo-usage-parameter"],
        )?;
        let sharing = decode_sharing(
            sharing_mode,
            queue_family_indices.as_deref(),
            (
                &["VUID-VkBufferCreateInfo-sharingMode-parameter"],
                &["VUID-VkBufferCreateInfo-sharingMode-00913"],
            ),
        )?;

        Ok(BufferCreateInfo {
            flags,
            size,
            usage,
            sharing,
            ..Default::default()
        })
    }
}

/// A raw `VkImageCreateInfo`.
#[derive(Clone, Debug)]
pub struct RawImageCreateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub flags: u32,
    pub image_type: i32,
    pub format: i32,
    pub extent: [u32; 3],
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
    pub tiling: i32,
    pub usage: u32,
    pub sharing_mode: i32,
    pub queue_family_indices: Option<Vec<u32>>,
    pub initial_layout: i32,
}

impl Default for RawImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            next: Vec::new(),
            flags: 0,
            image_type: vk::ImageType::TYPE_2D.as_raw(),
            format: vk::Format::R8G8B8A8_UNORM.as_raw(),
            extent: [0; 3],
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1.as_raw(),
            tiling: vk::ImageTiling::OPTIMAL.as_raw(),
            usage: 0,
            sharing_mode: vk::SharingMode::EXCLUSIVE.as_raw(),
            queue_family_indices: None,
            initial_layout: vk::ImageLayout::UNDEFINED.as_raw(),
        }
    }
}

impl RawImageCreateInfo {
    pub fn decode(&self, _device: &Device) -> Result<ImageCreateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            sharing_mode,
            ref queue_family_indices,
            initial_layout,
        } = self;

        validate_structure(
            "VkImageCreateInfo",
            s_type,
            vk::StructureType::IMAGE_CREATE_INFO,
            next,
            &[],
            &ChainVuids {
                s_type: &["VUID-VkImageCreateInfo-sType-sType"],
                p_next: &["VUID-VkImageCreateInfo-pNext-pNext"],
                unique: &["VUID-VkImageCreateInfo-sType-unique"],
            },
        )?;

        let flags = decode_flags(
            flags,
            ImageCreateFlags::from_raw_checked,
            "flags",
            "VkImageCreateFlagBits",
            &["VUID-VkImageCreateInfo-flags-parameter"],
        )?;
        let image_type = decode_enum(
            image_type,
            ImageType::try_from_raw,
            "image_type",
            "VkImageType",
            &["VUID-VkImageCreateInfo-imageType-parameter"],
        )?;
        let format = decode_enum(
            format,
            Format::try_from_raw,
            "format",
            "VkFormat",
            &["VUID-VkImageCreateInfo-format-parameter"],
        )?;
        let samples = decode_enum(
            samples,
            SampleCount::try_from_raw,
            "samples",
            "VkSampleCountFlagBits",
            &["VUID-VkImageCreateInfo-samples-parameter"],
        )?;
        let tiling = decode_enum(
            tiling,
            ImageTiling::try_from_raw,
            "tiling",
            "VkImageTiling",
            &["VUID-VkImageCreateInfo-tiling-parameter"],
        )?;
        let usage = decode_flags(
            usage,
            ImageUsage::from_raw_checked,
            "usage",
            "VkImageUsageFlagBits",
            &["VUID-VkImageCreateInfo-usage-parameter"],
        )?;
        let sharing = decode_sharing(
            sharing_mode,
            queue_family_indices.as_deref(),
            (
                &["VUID-VkImageCreateInfo-sharingMode-parameter"],
                &["VUID-VkImageCreateInfo-sharingMode-00941"],
            ),
        )?;

        let initial_layout = vk::ImageLayout::from_raw(initial_layout);

        if !matches!(
            initial_layout,
            vk::ImageLayout::UNDEFINED | vk::ImageLayout::PREINITIALIZED
        ) {
            return Err(Box::new(ValidationError {
                context: "initial_layout".into(),
                problem: format!(
                    "is `{:?}`, but it must be `VK_IMAGE_LAYOUT_UNDEFINED` or \
                    `VK_IMAGE_LAYOUT_PREINITIALIZED`",
                    initial_layout,
                )
                .into(),
                vuids: &["VUID-VkImageCreateInfo-initialLayout-00993"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(ImageCreateInfo {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            sharing,
            ..Default::default()
        })
    }
}

/// A raw `VkSamplerCreateInfo`.
#[derive(Clone, Debug)]
pub struct RawSamplerCreateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub flags: u32,
    pub mag_filter: i32,
    pub min_filter: i32,
    pub mipmap_mode: i32,
    pub address_mode_u: i32,
    pub address_mode_v: i32,
    pub address_mode_w: i32,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: vk::Bool32,
    pub max_anisotropy: f32,
    pub compare_enable: vk::Bool32,
    pub compare_op: i32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: i32,
    pub unnormalized_coordinates: vk::Bool32,
}

impl Default for RawSamplerCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::SAMPLER_CREATE_INFO,
            next: Vec::new(),
            flags: 0,
            mag_filter: vk::Filter::NEAREST.as_raw(),
            min_filter: vk::Filter::NEAREST.as_raw(),
            mipmap_mode: vk::SamplerMipmapMode::NEAREST.as_raw(),
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE.as_raw(),
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE.as_raw(),
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE.as_raw(),
            mip_lod_bias: 0.0,
            anisotropy_enable: vk::FALSE,
            max_anisotropy: 1.0,
            compare_enable: vk::FALSE,
            compare_op: vk::CompareOp::NEVER.as_raw(),
            min_lod: 0.0,
            max_lod: 0.0,
            border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK.as_raw(),
            unnormalized_coordinates: vk::FALSE,
        }
    }
}

impl RawSamplerCreateInfo {
    /// Decodes the structure. `VkBool32` fields with values other than 0 and 1 are reported to
    /// `device` as warnings.
    pub fn decode(&self, device: &Device) -> Result<SamplerCreateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            flags,
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode_u,
            address_mode_v,
            address_mode_w,
            mip_lod_bias,
            anisotropy_enable,
            max_anisotropy,
            compare_enable,
            compare_op,
            min_lod,
            max_lod,
            border_color,
            unnormalized_coordinates,
        } = self;

        validate_structure(
            "VkSamplerCreateInfo",
            s_type,
            vk::StructureType::SAMPLER_CREATE_INFO,
            next,
            &[],
            &ChainVuids {
                s_type: &["VUID-VkSamplerCreateInfo-sType-sType"],
                p_next: &["VUID-VkSamplerCreateInfo-pNext-pNext"],
                unique: &["VUID-VkSamplerCreateInfo-sType-unique"],
            },
        )?;

        // None of the sampler creation flags are supported.
        decode_flags(
            flags,
            |raw| if raw == 0 { Ok(()) } else { Err(raw) },
            "flags",
            "VkSamplerCreateFlagBits",
            &["VUID-VkSamplerCreateInfo-flags-parameter"],
        )?;

        let filter = |raw: i32, context: &'static str, vuids: &'static [&'static str]| {
            decode_enum(raw, Filter::try_from_raw, context, "VkFilter", vuids)
        };
        let mag_filter = filter(
            mag_filter,
            "mag_filter",
            &["VUID-VkSamplerCreateInfo-magFilter-parameter"],
        )?;
        let min_filter = filter(
            min_filter,
            "min_filter",
            &["VUID-VkSamplerCreateInfo-minFilter-parameter"],
        )?;
        let mipmap_mode = decode_enum(
            mipmap_mode,
            SamplerMipmapMode::try_from_raw,
            "mipmap_mode",
            "VkSamplerMipmapMode",
            &["VUID-VkSamplerCreateInfo-mipmapMode-parameter"],
        )?;

        let address_mode = |raw: i32, context: &'static str, vuids: &'static [&'static str]| {
            decode_enum(
                raw,
                SamplerAddressMode::try_from_raw,
                context,
                "VkSamplerAddressMode",
                vuids,
            )
        };
        let address_mode = [
            address_mode(
                address_mode_u,
                "address_mode_u",
                &["VUID-VkSamplerCreateInfo-addressModeU-parameter"],
            )?,
            address_mode(
                address_mode_v,
                "address_mode_v",
                &["VUID-VkSamplerCreateInfo-addressModeV-parameter"],
            )?,
            address_mode(
                address_mode_w,
                "address_mode_w",
                &["VUID-VkSamplerCreateInfo-addressModeW-parameter"],
            )?,
        ];

        // The border color is only read when it is used.
        let border_color = if address_mode.contains(&SamplerAddressMode::ClampToBorder) {
            decode_enum(
                border_color,
                BorderColor::try_from_raw,
                "border_color",
                "VkBorderColor",
                &["VUID-VkSamplerCreateInfo-addressModeU-01078"],
            )?
        } else {
            BorderColor::FloatTransparentBlack
        };

        let anisotropy = decode_bool(device, anisotropy_enable, "anisotropy_enable")
            .then_some(max_anisotropy);

        let compare = if decode_bool(device, compare_enable, "compare_enable") {
            Some(decode_enum(
                compare_op,
                CompareOp::try_from_raw,
                "compare_op",
                "VkCompareOp",
                &["VUID-VkSamplerCreateInfo-compareEnable-01080"],
            )?)
        } else {
            None
        };

        let unnormalized_coordinates =
            decode_bool(device, unnormalized_coordinates, "unnormalized_coordinates");

        Ok(SamplerCreateInfo {
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            mip_lod_bias,
            anisotropy,
            compare,
            lod: min_lod..=max_lod,
            border_color,
            unnormalized_coordinates,
            ..Default::default()
        })
    }
}

/// A raw `VkMemoryAllocateInfo`.
#[derive(Clone, Debug)]
pub struct RawMemoryAllocateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub allocation_size: DeviceSize,
    pub memory_type_index: u32,
}

impl Default for RawMemoryAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            next: Vec::new(),
            allocation_size: 0,
            memory_type_index: 0,
        }
    }
}

impl RawMemoryAllocateInfo {
    pub fn decode(&self, _device: &Device) -> Result<MemoryAllocateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            allocation_size,
            memory_type_index,
        } = self;

        validate_structure(
            "VkMemoryAllocateInfo",
            s_type,
            vk::StructureType::MEMORY_ALLOCATE_INFO,
            next,
            &[
                vk::StructureType::MEMORY_DEDICATED_ALLOCATE_INFO,
                vk::StructureType::EXPORT_MEMORY_ALLOCATE_INFO,
            ],
            &ChainVuids {
                s_type: &["VUID-VkMemoryAllocateInfo-sType-sType"],
                p_next: &["VUID-VkMemoryAllocateInfo-pNext-pNext"],
                unique: &["VUID-VkMemoryAllocateInfo-sType-unique"],
            },
        )?;

        let mut dedicated_allocation = None;
        let mut export_handle_types = ExternalMemoryHandleTypes::empty();

        for (index, &entry) in next.iter().enumerate() {
            match entry {
                ChainEntry::MemoryDedicatedAllocateInfo { image, buffer } => {
                    dedicated_allocation = match (image.is_null(), buffer.is_null()) {
                        (true, true) => None,
                        (false, true) => Some(DedicatedAllocation::Image(image)),
                        (true, false) => Some(DedicatedAllocation::Buffer(buffer)),
                        (false, false) => {
                            return Err(Box::new(ValidationError {
                                context: format!("next[{}]", index).into(),
                                problem: "`image` and `buffer` are both not VK_NULL_HANDLE"
                                    .into(),
                                vuids: &["VUID-VkMemoryDedicatedAllocateInfo-image-01432"],
                                kind: ValidationErrorKind::Parameter,
                                ..Default::default()
                            }));
                        }
                    };
                }
                ChainEntry::ExportMemoryAllocateInfo { handle_types } => {
                    export_handle_types = decode_flags(
                        handle_types,
                        ExternalMemoryHandleTypes::from_raw_checked,
                        "handle_types",
                        "VkExternalMemoryHandleTypeFlagBits",
                        &["VUID-VkExportMemoryAllocateInfo-handleTypes-parameter"],
                    )
                    .map_err(|err| err.add_context(format!("next[{}]", index)))?;
                }
                _ => (),
            }
        }

        Ok(MemoryAllocateInfo {
            allocation_size,
            memory_type_index,
            dedicated_allocation,
            export_handle_types,
            ..Default::default()
        })
    }
}

/// A raw `VkFenceCreateInfo`.
#[derive(Clone, Debug)]
pub struct RawFenceCreateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub flags: u32,
}

impl Default for RawFenceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            next: Vec::new(),
            flags: 0,
        }
    }
}

impl RawFenceCreateInfo {
    pub fn decode(&self, _device: &Device) -> Result<FenceCreateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            flags,
        } = self;

        validate_structure(
            "VkFenceCreateInfo",
            s_type,
            vk::StructureType::FENCE_CREATE_INFO,
            next,
            &[vk::StructureType::EXPORT_FENCE_CREATE_INFO],
            &ChainVuids {
                s_type: &["VUID-VkFenceCreateInfo-sType-sType"],
                p_next: &["VUID-VkFenceCreateInfo-pNext-pNext"],
                unique: &["VUID-VkFenceCreateInfo-sType-unique"],
            },
        )?;

        let flags = decode_flags(
            flags,
            FenceCreateFlags::from_raw_checked,
            "flags",
            "VkFenceCreateFlagBits",
            &["VUID-VkFenceCreateInfo-flags-parameter"],
        )?;

        let mut export_handle_types = ExternalFenceHandleTypes::empty();

        for (index, &entry) in next.iter().enumerate() {
            if let ChainEntry::ExportFenceCreateInfo { handle_types } = entry {
                export_handle_types = decode_flags(
                    handle_types,
                    ExternalFenceHandleTypes::from_raw_checked,
                    "handle_types",
                    "VkExternalFenceHandleTypeFlagBits",
                    &["VUID-VkExportFenceCreateInfo-handleTypes-parameter"],
                )
                .map_err(|err| err.add_context(format!("next[{}]", index)))?;
            }
        }

        Ok(FenceCreateInfo {
            flags,
            export_handle_types,
            ..Default::default()
        })
    }
}

/// A raw `VkSemaphoreCreateInfo`.
#[derive(Clone, Debug)]
pub struct RawSemaphoreCreateInfo {
    pub s_type: vk::StructureType,
    pub next: Vec<ChainEntry>,
    pub flags: u32,
}

impl Default for RawSemaphoreCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            next: Vec::new(),
            flags: 0,
        }
    }
}

impl RawSemaphoreCreateInfo {
    pub fn decode(&self, _device: &Device) -> Result<SemaphoreCreateInfo, Box<ValidationError>> {
        let &Self {
            s_type,
            ref next,
            flags,
        } = self;

        validate_structure(
            "VkSemaphoreCreateInfo",
            s_type,
            vk::StructureType::SEMAPHORE_CREATE_INFO,
            next,
            &[vk::StructureType::EXPORT_SEMAPHORE_CREATE_INFO],
            &ChainVuids {
                s_type: &["VUID-VkSemaphoreCreateInfo-sType-sType"],
                p_next: &["VUID-VkSemaphoreCreateInfo-pNext-pNext"],
                unique: &["VUID-VkSemaphoreCreateInfo-sType-unique"],
            },
        )?;

        reserved_zero(
            flags,
            "flags",
            &["VUID-VkSemaphoreCreateInfo-flags-zerobitmask"],
        )?;

        let mut export_handle_types = ExternalSemaphoreHandleTypes::empty();

        for (index, &entry) in next.iter().enumerate() {
            if let ChainEntry::ExportSemaphoreCreateInfo { handle_types } = entry {
                export_handle_types = decode_flags(
                    handle_types,
                    ExternalSemaphoreHandleTypes::from_raw_checked,
                    "handle_types",
                    "VkExternalSemaphoreHandleTypeFlagBits",
                    &["VUID-VkExportSemaphoreCreateInfo-handleTypes-parameter"],
                )
                .map_err(|err| err.add_context(format!("next[{}]", index)))?;
            }
        }

        Ok(SemaphoreCreateInfo {
            export_handle_types,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChainEntry, RawBufferCreateInfo, RawImageCreateInfo, RawMemoryAllocateInfo,
        RawSamplerCreateInfo, RawSemaphoreCreateInfo, UNRECOGNIZED_BOOL32_VUID,
    };
    use crate::{
        buffer::BufferUsage, handle::Id, image::ImageTiling, memory::DedicatedAllocation,
        sync::Sharing, ValidationErrorKind,
    };
    use ash::vk;

    #[test]
    fn enum_range() {
        let (device, _queue, _log) = test_device!();

        let err = RawImageCreateInfo {
            tiling: 0x7FFF_0000,
            usage: vk::ImageUsageFlags::SAMPLED.as_raw(),
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err();
        assert!(err.is("VUID-VkImageCreateInfo-tiling-parameter"));
        assert_eq!(err.kind, ValidationErrorKind::Parameter);
        assert!(err
            .problem
            .contains("does not fall within the begin..end range"));

        let create_info = RawImageCreateInfo {
            tiling: vk::ImageTiling::LINEAR.as_raw(),
            ..Default::default()
        }
        .decode(&device)
        .unwrap();
        assert_eq!(create_info.tiling, ImageTiling::Linear);

        let err = RawImageCreateInfo {
            format: -1,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err();
        assert!(err.is("VUID-VkImageCreateInfo-format-parameter"));

        let err = RawImageCreateInfo {
            initial_layout: vk::ImageLayout::GENERAL.as_raw(),
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err();
        assert!(err.is("VUID-VkImageCreateInfo-initialLayout-00993"));
    }

    #[test]
    fn unknown_flag_bits() {
        let (device, _queue, _log) = test_device!();

        let err = RawBufferCreateInfo {
            size: 256,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw() | 0x8000_0000,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err();
        assert!(err.is("VUID-VkBufferCreateInfo-usage-parameter"));
        assert!(err.problem.contains("0x80000000"));
        assert!(err.problem.contains("are not recognized"));

        let create_info = RawBufferCreateInfo {
            size: 256,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw(),
            ..Default::default()
        }
        .decode(&device)
        .unwrap();
        assert_eq!(create_info.usage, BufferUsage::UNIFORM_BUFFER);
        assert_eq!(create_info.sharing, Sharing::Exclusive);

        assert!(RawSemaphoreCreateInfo {
            flags: 1,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkSemaphoreCreateInfo-flags-zerobitmask"));
    }

    #[test]
    fn concurrent_sharing() {
        let (device, _queue, _log) = test_device!();

        let raw = RawBufferCreateInfo {
            size: 256,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw(),
            sharing_mode: vk::SharingMode::CONCURRENT.as_raw(),
            ..Default::default()
        };
        assert!(raw
            .decode(&device)
            .unwrap_err()
            .is("VUID-VkBufferCreateInfo-sharingMode-00913"));

        let create_info = RawBufferCreateInfo {
            queue_family_indices: Some(vec![0, 1]),
            ..raw.clone()
        }
        .decode(&device)
        .unwrap();
        assert!(create_info.sharing.is_concurrent());

        assert!(RawBufferCreateInfo {
            sharing_mode: 7,
            ..raw
        }
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkBufferCreateInfo-sharingMode-parameter"));
    }

    #[test]
    fn bool32_leniency() {
        let (device, _queue, log) = test_device!();

        let create_info = RawSamplerCreateInfo {
            unnormalized_coordinates: 3,
            ..Default::default()
        }
        .decode(&device)
        .unwrap();
        assert!(create_info.unnormalized_coordinates);
        assert_eq!(log.count(UNRECOGNIZED_BOOL32_VUID), 1);
        assert!(log.contains_message(
            UNRECOGNIZED_BOOL32_VUID,
            "is neither VK_TRUE nor VK_FALSE",
        ));

        RawSamplerCreateInfo::default().decode(&device).unwrap();
        assert_eq!(log.count(UNRECOGNIZED_BOOL32_VUID), 1);
    }

    #[test]
    fn sampler_enums_only_checked_when_used() {
        let (device, _queue, _log) = test_device!();

        // Neither is used, so neither is decoded.
        RawSamplerCreateInfo {
            border_color: 99,
            compare_op: 99,
            ..Default::default()
        }
        .decode(&device)
        .unwrap();

        assert!(RawSamplerCreateInfo {
            compare_enable: vk::TRUE,
            compare_op: 99,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkSamplerCreateInfo-compareEnable-01080"));

        assert!(RawSamplerCreateInfo {
            address_mode_w: 99,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkSamplerCreateInfo-addressModeW-parameter"));
    }

    #[test]
    fn structure_chain() {
        let (device, _queue, _log) = test_device!();
        let buffer = Id::from_raw(0x1234);

        let raw = |next: Vec<ChainEntry>| RawMemoryAllocateInfo {
            next,
            allocation_size: 256,
            ..Default::default()
        };

        let create_info = raw(vec![ChainEntry::MemoryDedicatedAllocateInfo {
            image: Id::NULL,
            buffer,
        }])
        .decode(&device)
        .unwrap();
        assert_eq!(
            create_info.dedicated_allocation,
            Some(DedicatedAllocation::Buffer(buffer))
        );

        let err = raw(vec![
            ChainEntry::ExportMemoryAllocateInfo { handle_types: 0 },
            ChainEntry::ExportMemoryAllocateInfo { handle_types: 0 },
        ])
        .decode(&device)
        .unwrap_err();
        assert!(err.is("VUID-VkMemoryAllocateInfo-sType-unique"));
        assert_eq!(err.context, "next[1]");

        assert!(raw(vec![ChainEntry::ExportFenceCreateInfo { handle_types: 0 }])
            .decode(&device)
            .unwrap_err()
            .is("VUID-VkMemoryAllocateInfo-pNext-pNext"));
        assert!(raw(vec![ChainEntry::Other(vk::StructureType::from_raw(
            0x7FFF_0000
        ))])
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkMemoryAllocateInfo-pNext-pNext"));

        assert!(raw(vec![ChainEntry::MemoryDedicatedAllocateInfo {
            image: Id::from_raw(0x5678),
            buffer,
        }])
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkMemoryDedicatedAllocateInfo-image-01432"));

        assert!(RawMemoryAllocateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            ..Default::default()
        }
        .decode(&device)
        .unwrap_err()
        .is("VUID-VkMemoryAllocateInfo-sType-sType"));
    }
}
