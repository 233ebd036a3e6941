// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The formats that the engine knows, and the relations between them.
//!
//! Views reinterpret the bytes of a resource, so the format of a view is checked against the
//! format of its resource:
//!
//! - Identical formats are always compatible.
//! - If the image was created with the `MUTABLE_FORMAT` flag, any format of the same
//!   *compatibility class* is allowed. Compatibility classes group formats by texel block size
//!   and layout.
//! - A view of a single plane of a multi-planar image must use a format of the class of that
//!   plane.
//! - If the image was also created with the `BLOCK_TEXEL_VIEW_COMPATIBLE` flag, an uncompressed
//!   format whose texel block has the same size as the compressed block is allowed.
//!
//! # Depth/stencil formats
//!
//! Depth/stencil formats are only compatible with themselves. Their aspects can be viewed
//! individually.

use crate::{image::ImageAspects, DeviceSize};

vulkan_enum! {
    /// An image or texel buffer format.
    Format = Format(i32);

    R8_UNORM = R8_UNORM,
    R8_SNORM = R8_SNORM,
    R8_UINT = R8_UINT,
    R8_SINT = R8_SINT,
    R8_SRGB = R8_SRGB,
    R8G8_UNORM = R8G8_UNORM,
    R8G8_SNORM = R8G8_SNORM,
    R8G8_UINT = R8G8_UINT,
    R8G8_SINT = R8G8_SINT,
    R16_UNORM = R16_UNORM,
    R16_SNORM = R16_SNORM,
    R16_UINT = R16_UINT,
    R16_SINT = R16_SINT,
    R16_SFLOAT = R16_SFLOAT,
    R5G6B5_UNORM_PACK16 = R5G6B5_UNORM_PACK16,
    R8G8B8A8_UNORM = R8G8B8A8_UNORM,
    R8G8B8A8_SNORM = R8G8B8A8_SNORM,
    R8G8B8A8_UINT = R8G8B8A8_UINT,
    R8G8B8A8_SINT = R8G8B8A8_SINT,
    R8G8B8A8_SRGB = R8G8B8A8_SRGB,
    B8G8R8A8_UNORM = B8G8R8A8_UNORM,
    B8G8R8A8_SRGB = B8G8R8A8_SRGB,
    A2B10G10R10_UNORM_PACK32 = A2B10G10R10_UNORM_PACK32,
    R16G16_UNORM = R16G16_UNORM,
    R16G16_SFLOAT = R16G16_SFLOAT,
    R32_UINT = R32_UINT,
    R32_SINT = R32_SINT,
    R32_SFLOAT = R32_SFLOAT,
    B10G11R11_UFLOAT_PACK32 = B10G11R11_UFLOAT_PACK32,
    E5B9G9R9_UFLOAT_PACK32 = E5B9G9R9_UFLOAT_PACK32,
    R16G16B16A16_UNORM = R16G16B16A16_UNORM,
    R16G16B16A16_UINT = R16G16B16A16_UINT,
    R16G16B16A16_SFLOAT = R16G16B16A16_SFLOAT,
    R32G32_UINT = R32G32_UINT,
    R32G32_SINT = R32G32_SINT,
    R32G32_SFLOAT = R32G32_SFLOAT,
    R32G32B32_UINT = R32G32B32_UINT,
    R32G32B32_SINT = R32G32B32_SINT,
    R32G32B32_SFLOAT = R32G32B32_SFLOAT,
    R32G32B32A32_UINT = R32G32B32A32_UINT,
    R32G32B32A32_SINT = R32G32B32A32_SINT,
    R32G32B32A32_SFLOAT = R32G32B32A32_SFLOAT,
    D16_UNORM = D16_UNORM,
    X8_D24_UNORM_PACK32 = X8_D24_UNORM_PACK32,
    D32_SFLOAT = D32_SFLOAT,
    S8_UINT = S8_UINT,
    D16_UNORM_S8_UINT = D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT = D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT = D32_SFLOAT_S8_UINT,
    BC1_RGB_UNORM_BLOCK = BC1_RGB_UNORM_BLOCK,
    BC1_RGB_SRGB_BLOCK = BC1_RGB_SRGB_BLOCK,
    BC1_RGBA_UNORM_BLOCK = BC1_RGBA_UNORM_BLOCK,
    BC1_RGBA_SRGB_BLOCK = BC1_RGBA_SRGB_BLOCK,
    BC2_UNORM_BLOCK = BC2_UNORM_BLOCK,
    BC3_UNORM_BLOCK = BC3_UNORM_BLOCK,
    BC3_SRGB_BLOCK = BC3_SRGB_BLOCK,
    BC4_UNORM_BLOCK = BC4_UNORM_BLOCK,
    BC5_UNORM_BLOCK = BC5_UNORM_BLOCK,
    BC7_UNORM_BLOCK = BC7_UNORM_BLOCK,
    BC7_SRGB_BLOCK = BC7_SRGB_BLOCK,
    ETC2_R8G8B8_UNORM_BLOCK = ETC2_R8G8B8_UNORM_BLOCK,
    ASTC_4x4_UNORM_BLOCK = ASTC_4X4_UNORM_BLOCK,
    ASTC_8x8_UNORM_BLOCK = ASTC_8X8_UNORM_BLOCK,
    G8B8G8R8_422_UNORM = G8B8G8R8_422_UNORM,
    G8_B8_R8_3PLANE_420_UNORM = G8_B8_R8_3PLANE_420_UNORM,
    G8_B8R8_2PLANE_420_UNORM = G8_B8R8_2PLANE_420_UNORM,
    G8_B8_R8_3PLANE_444_UNORM = G8_B8_R8_3PLANE_444_UNORM,
    G16_B16R16_2PLANE_420_UNORM = G16_B16R16_2PLANE_420_UNORM,
}

/// The block compression scheme used in a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CompressionType {
    /// Adaptive Scalable Texture Compression, low dynamic range.
    ASTC_LDR,
    /// S3TC Block Compression.
    BC,
    /// Ericsson Texture Compression 2.
    ETC2,
}

/// For YCbCr formats, the type of chroma sampling used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChromaSampling {
    Mode444,
    Mode422,
    Mode420,
}

/// An opaque type that represents a format compatibility class.
///
/// Two formats are compatible if their compatibility classes compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FormatCompatibility(pub(crate) FormatCompatibilityInner);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub(crate) enum FormatCompatibilityInner {
    Class_8bit,
    Class_16bit,
    Class_32bit,
    Class_64bit,
    Class_96bit,
    Class_128bit,
    Class_D16,
    Class_D24,
    Class_D32,
    Class_S8,
    Class_D16S8,
    Class_D24S8,
    Class_D32S8,
    Class_BC1_RGB,
    Class_BC1_RGBA,
    Class_BC2,
    Class_BC3,
    Class_BC4,
    Class_BC5,
    Class_BC7,
    Class_ETC2_RGB,
    Class_ASTC_4x4,
    Class_ASTC_8x8,
    Class_32bit_G8B8G8R8,
    Class_8bit_3plane_420,
    Class_8bit_2plane_420,
    Class_8bit_3plane_444,
    Class_16bit_2plane_420,
}

struct FormatInfo {
    compatibility: FormatCompatibilityInner,
    block_size: DeviceSize,
    block_extent: [u32; 3],
    aspects: ImageAspects,
    planes: &'static [Format],
    compression: Option<CompressionType>,
    chroma_sampling: Option<ChromaSampling>,
}

impl FormatInfo {
    const fn color(compatibility: FormatCompatibilityInner, block_size: DeviceSize) -> Self {
        FormatInfo {
            compatibility,
            block_size,
            block_extent: [1, 1, 1],
            aspects: ImageAspects::COLOR,
            planes: &[],
            compression: None,
            chroma_sampling: None,
        }
    }

    const fn depth_stencil(
        compatibility: FormatCompatibilityInner,
        block_size: DeviceSize,
        aspects: ImageAspects,
    ) -> Self {
        FormatInfo {
            aspects,
            ..Self::color(compatibility, block_size)
        }
    }

    const fn compressed(
        compatibility: FormatCompatibilityInner,
        block_size: DeviceSize,
        block_extent: [u32; 3],
        compression: CompressionType,
    ) -> Self {
        FormatInfo {
            block_extent,
            compression: Some(compression),
            ..Self::color(compatibility, block_size)
        }
    }

    const fn ycbcr(
        compatibility: FormatCompatibilityInner,
        block_size: DeviceSize,
        block_extent: [u32; 3],
        planes: &'static [Format],
        chroma_sampling: ChromaSampling,
    ) -> Self {
        let aspects = match planes.len() {
            0 => ImageAspects::COLOR,
            2 => ImageAspects::COLOR
                .union(ImageAspects::PLANE_0)
                .union(ImageAspects::PLANE_1),
            _ => ImageAspects::COLOR
                .union(ImageAspects::PLANE_0)
                .union(ImageAspects::PLANE_1)
                .union(ImageAspects::PLANE_2),
        };

        FormatInfo {
            compatibility,
            block_size,
            block_extent,
            aspects,
            planes,
            compression: None,
            chroma_sampling: Some(chroma_sampling),
        }
    }
}

impl Format {
    fn info(self) -> FormatInfo {
        use FormatCompatibilityInner::*;

        match self {
            Self::R8_UNORM | Self::R8_SNORM | Self::R8_UINT | Self::R8_SINT | Self::R8_SRGB => {
                FormatInfo::color(Class_8bit, 1)
            }
            Self::R8G8_UNORM
            | Self::R8G8_SNORM
            | Self::R8G8_UINT
            | Self::R8G8_SINT
            | Self::R16_UNORM
            | Self::R16_SNORM
            | Self::R16_UINT
            | Self::R16_SINT
            | Self::R16_SFLOAT
            | Self::R5G6B5_UNORM_PACK16 => FormatInfo::color(Class_16bit, 2),
            Self::R8G8B8A8_UNORM
            | Self::R8G8B8A8_SNORM
            | Self::R8G8B8A8_UINT
            | Self::R8G8B8A8_SINT
            | Self::R8G8B8A8_SRGB
            | Self::B8G8R8A8_UNORM
            | Self::B8G8R8A8_SRGB
            | Self::A2B10G10R10_UNORM_PACK32
            | Self::R16G16_UNORM
            | Self::R16G16_SFLOAT
            | Self::R32_UINT
            | Self::R32_SINT
            | Self::R32_SFLOAT
            | Self::B10G11R11_UFLOAT_PACK32
            | Self::E5B9G9R9_UFLOAT_PACK32 => FormatInfo::color(Class_32bit, 4),
            Self::R16G16B16A16_UNORM
            | Self::R16G16B16A16_UINT
            | Self::R16G16B16A16_SFLOAT
            | Self::R32G32_UINT
            | Self::R32G32_SINT
            | Self::R32G32_SFLOAT => FormatInfo::color(Class_64bit, 8),
            Self::R32G32B32_UINT | Self::R32G32B32_SINT | Self::R32G32B32_SFLOAT => {
                FormatInfo::color(Class_96bit, 12)
            }
            Self::R32G32B32A32_UINT | Self::R32G32B32A32_SINT | Self::R32G32B32A32_SFLOAT => {
                FormatInfo::color(Class_128bit, 16)
            }
            Self::D16_UNORM => FormatInfo::depth_stencil(Class_D16, 2, ImageAspects::DEPTH),
            Self::X8_D24_UNORM_PACK32 => {
                FormatInfo::depth_stencil(Class_D24, 4, ImageAspects::DEPTH)
            }
            Self::D32_SFLOAT => FormatInfo::depth_stencil(Class_D32, 4, ImageAspects::DEPTH),
            Self::S8_UINT => FormatInfo::depth_stencil(Class_S8, 1, ImageAspects::STENCIL),
            Self::D16_UNORM_S8_UINT => FormatInfo::depth_stencil(
                Class_D16S8,
                3,
                ImageAspects::DEPTH.union(ImageAspects::STENCIL),
            ),
            Self::D24_UNORM_S8_UINT => FormatInfo::depth_stencil(
                Class_D24S8,
                4,
                ImageAspects::DEPTH.union(ImageAspects::STENCIL),
            ),
            Self::D32_SFLOAT_S8_UINT => FormatInfo::depth_stencil(
                Class_D32S8,
                5,
                ImageAspects::DEPTH.union(ImageAspects::STENCIL),
            ),
            Self::BC1_RGB_UNORM_BLOCK | Self::BC1_RGB_SRGB_BLOCK => {
                FormatInfo::compressed(Class_BC1_RGB, 8, [4, 4, 1], CompressionType::BC)
            }
            Self::BC1_RGBA_UNORM_BLOCK | Self::BC1_RGBA_SRGB_BLOCK => {
                FormatInfo::compressed(Class_BC1_RGBA, 8, [4, 4, 1], CompressionType::BC)
            }
            Self::BC2_UNORM_BLOCK => {
                FormatInfo::compressed(Class_BC2, 16, [4, 4, 1], CompressionType::BC)
            }
            Self::BC3_UNORM_BLOCK | Self::BC3_SRGB_BLOCK => {
                FormatInfo::compressed(Class_BC3, 16, [4, 4, 1], CompressionType::BC)
            }
            Self::BC4_UNORM_BLOCK => {
                FormatInfo::compressed(Class_BC4, 8, [4, 4, 1], CompressionType::BC)
            }
            Self::BC5_UNORM_BLOCK => {
                FormatInfo::compressed(Class_BC5, 16, [4, 4, 1], CompressionType::BC)
            }
            Self::BC7_UNORM_BLOCK | Self::BC7_SRGB_BLOCK => {
                FormatInfo::compressed(Class_BC7, 16, [4, 4, 1], CompressionType::BC)
            }
            Self::ETC2_R8G8B8_UNORM_BLOCK => {
                FormatInfo::compressed(Class_ETC2_RGB, 8, [4, 4, 1], CompressionType::ETC2)
            }
            Self::ASTC_4x4_UNORM_BLOCK => {
                FormatInfo::compressed(Class_ASTC_4x4, 16, [4, 4, 1], CompressionType::ASTC_LDR)
            }
            Self::ASTC_8x8_UNORM_BLOCK => {
                FormatInfo::compressed(Class_ASTC_8x8, 16, [8, 8, 1], CompressionType::ASTC_LDR)
            }
            Self::G8B8G8R8_422_UNORM => FormatInfo::ycbcr(
                Class_32bit_G8B8G8R8,
                4,
                [2, 1, 1],
                &[],
                ChromaSampling::Mode422,
            ),
            Self::G8_B8_R8_3PLANE_420_UNORM => FormatInfo::ycbcr(
                Class_8bit_3plane_420,
                3,
                [1, 1, 1],
                &[Self::R8_UNORM, Self::R8_UNORM, Self::R8_UNORM],
                ChromaSampling::Mode420,
            ),
            Self::G8_B8R8_2PLANE_420_UNORM => FormatInfo::ycbcr(
                Class_8bit_2plane_420,
                3,
                [1, 1, 1],
                &[Self::R8_UNORM, Self::R8G8_UNORM],
                ChromaSampling::Mode420,
            ),
            Self::G8_B8_R8_3PLANE_444_UNORM => FormatInfo::ycbcr(
                Class_8bit_3plane_444,
                3,
                [1, 1, 1],
                &[Self::R8_UNORM, Self::R8_UNORM, Self::R8_UNORM],
                ChromaSampling::Mode444,
            ),
            Self::G16_B16R16_2PLANE_420_UNORM => FormatInfo::ycbcr(
                Class_16bit_2plane_420,
                6,
                [1, 1, 1],
                &[Self::R16_UNORM, Self::R16G16_UNORM],
                ChromaSampling::Mode420,
            ),
        }
    }

    /// Returns the compatibility class of the format.
    #[inline]
    pub fn compatibility(self) -> FormatCompatibility {
        FormatCompatibility(self.info().compatibility)
    }

    /// Returns the size in bytes of a single texel block of the format.
    ///
    /// For multi-planar formats, this is the combined size of one texel over all planes.
    #[inline]
    pub fn block_size(self) -> DeviceSize {
        self.info().block_size
    }

    /// Returns the extent in texels of a single texel block of the format.
    #[inline]
    pub fn block_extent(self) -> [u32; 3] {
        self.info().block_extent
    }

    /// Returns the aspects that images of this format have.
    #[inline]
    pub fn aspects(self) -> ImageAspects {
        self.info().aspects
    }

    /// Returns the formats of the individual planes of a multi-planar format. Returns an empty
    /// slice for single-plane formats.
    #[inline]
    pub fn planes(self) -> &'static [Format] {
        self.info().planes
    }

    /// Returns the compression scheme of the format, if it is block-compressed.
    #[inline]
    pub fn compression(self) -> Option<CompressionType> {
        self.info().compression
    }

    /// Returns the chroma sampling of the format, if it is a YCbCr format.
    #[inline]
    pub fn ycbcr_chroma_sampling(self) -> Option<ChromaSampling> {
        self.info().chroma_sampling
    }

    /// Returns whether images of this format can only be sampled with a sampler YCbCr conversion.
    #[inline]
    pub fn requires_sampler_ycbcr_conversion(self) -> bool {
        self.ycbcr_chroma_sampling().is_some()
    }

    /// Returns whether the format has a depth or stencil aspect.
    #[inline]
    pub fn is_depth_stencil(self) -> bool {
        self.aspects()
            .intersects(ImageAspects::DEPTH | ImageAspects::STENCIL)
    }

    /// Returns whether a view of this format can be created of an image of format `image_format`,
    /// given the creation flags of the image.
    pub(crate) fn is_view_compatible(
        self,
        image_format: Format,
        mutable_format: bool,
        block_texel_view_compatible: bool,
    ) -> bool {
        if self == image_format {
            return true;
        }

        if !mutable_format {
            return false;
        }

        if self.compatibility() == image_format.compatibility() {
            return true;
        }

        block_texel_view_compatible
            && image_format.compression().is_some()
            && self.compression().is_none()
            && self.block_size() == image_format.block_size()
    }
}

vulkan_bitflags! {
    /// The features supported by a format, for a specific tiling or for buffers.
    FormatFeatures = FormatFeatureFlags(u32);

    SAMPLED_IMAGE = SAMPLED_IMAGE,
    STORAGE_IMAGE = STORAGE_IMAGE,
    STORAGE_IMAGE_ATOMIC = STORAGE_IMAGE_ATOMIC,
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,
    VERTEX_BUFFER = VERTEX_BUFFER,
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,
    COLOR_ATTACHMENT_BLEND = COLOR_ATTACHMENT_BLEND,
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,
    BLIT_SRC = BLIT_SRC,
    BLIT_DST = BLIT_DST,
    SAMPLED_IMAGE_FILTER_LINEAR = SAMPLED_IMAGE_FILTER_LINEAR,
    TRANSFER_SRC = TRANSFER_SRC,
    TRANSFER_DST = TRANSFER_DST,
    MIDPOINT_CHROMA_SAMPLES = MIDPOINT_CHROMA_SAMPLES,
    DISJOINT = DISJOINT,
}

/// The properties of a format that are supported by a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatProperties {
    /// Features available for images with linear tiling.
    pub linear_tiling_features: FormatFeatures,

    /// Features available for images with optimal tiling.
    pub optimal_tiling_features: FormatFeatures,

    /// Features available for buffers.
    pub buffer_features: FormatFeatures,
}

impl FormatProperties {
    /// Returns the properties that a typical desktop device reports for `format`.
    pub fn typical(format: Format) -> Self {
        let transfer = FormatFeatures::TRANSFER_SRC | FormatFeatures::TRANSFER_DST;

        if format.is_depth_stencil() {
            FormatProperties {
                linear_tiling_features: FormatFeatures::empty(),
                optimal_tiling_features: FormatFeatures::SAMPLED_IMAGE
                    | FormatFeatures::DEPTH_STENCIL_ATTACHMENT
                    | FormatFeatures::BLIT_SRC
                    | transfer,
                buffer_features: FormatFeatures::empty(),
            }
        } else if format.compression().is_some() {
            FormatProperties {
                linear_tiling_features: FormatFeatures::empty(),
                optimal_tiling_features: FormatFeatures::SAMPLED_IMAGE
                    | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                    | FormatFeatures::BLIT_SRC
                    | transfer,
                buffer_features: FormatFeatures::empty(),
            }
        } else if format.requires_sampler_ycbcr_conversion() {
            let disjoint = if format.planes().is_empty() {
                FormatFeatures::empty()
            } else {
                FormatFeatures::DISJOINT
            };

            FormatProperties {
                linear_tiling_features: FormatFeatures::empty(),
                optimal_tiling_features: FormatFeatures::SAMPLED_IMAGE
                    | FormatFeatures::MIDPOINT_CHROMA_SAMPLES
                    | disjoint
                    | transfer,
                buffer_features: FormatFeatures::empty(),
            }
        } else {
            let sampled = FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::BLIT_SRC
                | transfer;

            FormatProperties {
                linear_tiling_features: sampled,
                optimal_tiling_features: sampled
                    | FormatFeatures::STORAGE_IMAGE
                    | FormatFeatures::COLOR_ATTACHMENT
                    | FormatFeatures::COLOR_ATTACHMENT_BLEND
                    | FormatFeatures::BLIT_DST,
                buffer_features: FormatFeatures::UNIFORM_TEXEL_BUFFER
                    | FormatFeatures::STORAGE_TEXEL_BUFFER
                    | FormatFeatures::VERTEX_BUFFER,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Format, FormatFeatures, FormatProperties};
    use crate::image::ImageAspects;

    #[test]
    fn raw_decoding() {
        assert_eq!(
            Format::try_from_raw(ash::vk::Format::R8G8B8A8_UNORM.as_raw()),
            Some(Format::R8G8B8A8_UNORM),
        );
        assert_eq!(Format::try_from_raw(0), None);
        assert_eq!(Format::try_from_raw(0x7FFF_FFFF), None);
    }

    #[test]
    fn compatibility_classes() {
        assert_eq!(
            Format::R8G8B8A8_UNORM.compatibility(),
            Format::R32_SFLOAT.compatibility(),
        );
        assert_ne!(
            Format::R8G8B8A8_UNORM.compatibility(),
            Format::R8G8_UNORM.compatibility(),
        );
        assert_ne!(
            Format::D32_SFLOAT.compatibility(),
            Format::R32_SFLOAT.compatibility(),
        );
        assert_eq!(
            Format::BC1_RGB_UNORM_BLOCK.compatibility(),
            Format::BC1_RGB_SRGB_BLOCK.compatibility(),
        );
    }

    #[test]
    fn view_compatibility() {
        let image = Format::R8G8B8A8_UNORM;

        assert!(Format::R8G8B8A8_UNORM.is_view_compatible(image, false, false));
        assert!(!Format::B8G8R8A8_UNORM.is_view_compatible(image, false, false));
        assert!(Format::B8G8R8A8_UNORM.is_view_compatible(image, true, false));
        assert!(!Format::R8G8_UNORM.is_view_compatible(image, true, false));

        let compressed = Format::BC1_RGBA_UNORM_BLOCK;
        assert!(!Format::R32G32_UINT.is_view_compatible(compressed, true, false));
        assert!(Format::R32G32_UINT.is_view_compatible(compressed, true, true));
        assert!(!Format::R32_UINT.is_view_compatible(compressed, true, true));
    }

    #[test]
    fn planes_and_aspects() {
        let format = Format::G8_B8R8_2PLANE_420_UNORM;

        assert_eq!(format.planes(), &[Format::R8_UNORM, Format::R8G8_UNORM]);
        assert!(format.aspects().contains(ImageAspects::PLANE_1));
        assert!(!format.aspects().intersects(ImageAspects::PLANE_2));
        assert!(format.requires_sampler_ycbcr_conversion());
        assert_eq!(
            Format::D24_UNORM_S8_UINT.aspects(),
            ImageAspects::DEPTH | ImageAspects::STENCIL,
        );
    }

    #[test]
    fn typical_properties() {
        let depth = FormatProperties::typical(Format::D32_SFLOAT);
        assert!(depth.linear_tiling_features.is_empty());
        assert!(depth
            .optimal_tiling_features
            .contains(FormatFeatures::DEPTH_STENCIL_ATTACHMENT));

        let color = FormatProperties::typical(Format::R8G8B8A8_UNORM);
        assert!(color
            .buffer_features
            .contains(FormatFeatures::UNIFORM_TEXEL_BUFFER));
    }
}
