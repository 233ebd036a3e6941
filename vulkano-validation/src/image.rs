// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Images, and views of images.
//!
//! Like a buffer, an image is created without memory and must be bound to memory exactly once
//! before it can be used, unless it was created with sparse binding.
//!
//! An [`ImageView`] selects a subresource range of an image and interprets it with a view type
//! and a format. The checks of a view are performed in this order:
//!
//! 1. The image is a live object of the device.
//! 2. The image is bound to memory, unless it is sparse.
//! 3. The subresource range is not empty, and lies within the mip levels and array layers of the
//!    image.
//! 4. The aspects are aspects of the image format. For a multi-planar format, a view selects
//!    either the color aspect or exactly one plane.
//! 5. The view type is compatible with the type and flags of the image.
//! 6. The view format is compatible with the image format. See the [`format`] module.
//! 7. The view format supports at least one feature with the tiling of the image.
//!
//! [`format`]: crate::format

use crate::{
    binding::ResourceMemory,
    device::Device,
    format::{ChromaSampling, Format, FormatFeatures},
    handle::Id,
    memory::MemoryRequirements,
    object::UseCount,
    sync::Sharing,
    ValidationError, ValidationErrorKind,
};
use parking_lot::Mutex;
use std::ops::Range;

vulkan_enum! {
    /// Whether an image is one, two or three dimensional.
    ImageType = ImageType(i32);

    Dim1d = TYPE_1D,
    Dim2d = TYPE_2D,
    Dim3d = TYPE_3D,
}

vulkan_enum! {
    /// The arrangement of texels in the memory of an image.
    ImageTiling = ImageTiling(i32);

    /// The texels are laid out in an implementation-dependent way that is optimal for access
    /// by the device.
    Optimal = OPTIMAL,

    /// The texels are laid out in rows, and can be accessed by the host.
    Linear = LINEAR,
}

vulkan_bitflags! {
    /// The ways an image may be used. Views, commands and descriptor writes are checked
    /// against it, and each usage needs a matching format feature.
    ImageUsage = ImageUsageFlags(u32);

    TRANSFER_SRC = TRANSFER_SRC,
    TRANSFER_DST = TRANSFER_DST,
    SAMPLED = SAMPLED,
    STORAGE = STORAGE,
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,

    /// Its memory may be lazily allocated.
    TRANSIENT_ATTACHMENT = TRANSIENT_ATTACHMENT,

    INPUT_ATTACHMENT = INPUT_ATTACHMENT,
}

vulkan_bitflags! {
    /// `VkImageCreateFlags` that the engine understands.
    ImageCreateFlags = ImageCreateFlags(u32);

    /// The image will be backed by sparse memory binding instead of regular binding.
    SPARSE_BINDING = SPARSE_BINDING
    RequiresOneOf([
        RequiresAllOf([DeviceFeature(sparse_binding)]),
    ]),

    /// The image can be partially bound.
    SPARSE_RESIDENCY = SPARSE_RESIDENCY
    RequiresOneOf([
        RequiresAllOf([DeviceFeature(sparse_residency_image2_d)]),
    ]),

    /// The image's memory can alias with another image or a different part of the same image.
    SPARSE_ALIASED = SPARSE_ALIASED
    RequiresOneOf([
        RequiresAllOf([DeviceFeature(sparse_residency_aliased)]),
    ]),

    /// Views of the image can have a different format than the image itself.
    MUTABLE_FORMAT = MUTABLE_FORMAT,

    /// Views of the image can have a cube map view type.
    CUBE_COMPATIBLE = CUBE_COMPATIBLE,

    /// For a compressed image, views can have an uncompressed format whose texel block has the
    /// same size as the compressed block.
    BLOCK_TEXEL_VIEW_COMPATIBLE = BLOCK_TEXEL_VIEW_COMPATIBLE,

    /// For a multi-planar image, each plane is bound to memory separately.
    DISJOINT = DISJOINT,
}

vulkan_bitflags! {
    /// The aspects of an image: the parts of a texel that can be accessed separately.
    ImageAspects = ImageAspectFlags(u32);

    COLOR = COLOR,
    DEPTH = DEPTH,
    STENCIL = STENCIL,
    METADATA = METADATA,
    PLANE_0 = PLANE_0,
    PLANE_1 = PLANE_1,
    PLANE_2 = PLANE_2,
}

impl ImageAspects {
    /// Returns the index of the plane that `self` selects, if it is exactly one plane aspect.
    pub fn plane_index(self) -> Option<usize> {
        [Self::PLANE_0, Self::PLANE_1, Self::PLANE_2]
            .into_iter()
            .position(|plane| plane == self)
    }
}

vulkan_enum! {
    /// Samples per texel. Anything above one makes the image multisampled.
    SampleCount = SampleCountFlags(u32);

    Sample1 = TYPE_1,
    Sample2 = TYPE_2,
    Sample4 = TYPE_4,
    Sample8 = TYPE_8,
    Sample16 = TYPE_16,
    Sample32 = TYPE_32,
    Sample64 = TYPE_64,
}

vulkan_enum! {
    /// The type of an image view.
    ImageViewType = ImageViewType(i32);

    Dim1d = TYPE_1D,
    Dim1dArray = TYPE_1D_ARRAY,
    Dim2d = TYPE_2D,
    Dim2dArray = TYPE_2D_ARRAY,
    Dim3d = TYPE_3D,
    Cube = CUBE,
    CubeArray = CUBE_ARRAY
    RequiresOneOf([
        RequiresAllOf([DeviceFeature(image_cube_array)]),
    ]),
}

impl ImageViewType {
    /// Returns whether the type is one of the array types.
    #[inline]
    pub fn is_arrayed(self) -> bool {
        matches!(self, Self::Dim1dArray | Self::Dim2dArray | Self::CubeArray)
    }
}

/// A range of mip levels and array layers of an image, for a set of aspects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    /// The aspects of the image that are selected.
    pub aspects: ImageAspects,

    /// The range of mip levels that are selected.
    pub mip_levels: Range<u32>,

    /// The range of array layers that are selected.
    pub array_layers: Range<u32>,
}

impl Default for ImageSubresourceRange {
    #[inline]
    fn default() -> Self {
        Self {
            aspects: ImageAspects::COLOR,
            mip_levels: 0..1,
            array_layers: 0..1,
        }
    }
}

impl ImageSubresourceRange {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let Self {
            aspects,
            mip_levels,
            array_layers,
        } = self;

        if aspects.is_empty() {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-aspectMask-requiredbitmask"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if mip_levels.is_empty() {
            return Err(Box::new(ValidationError {
                context: "mip_levels".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-levelCount-01720"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if array_layers.is_empty() {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-layerCount-01721"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// The decoded form of a `VkImageCreateInfo`.
///
/// The default is a single-sampled, optimally tiled 2D `R8G8B8A8_UNORM` image with one mip
/// level and one layer, owned exclusively. `extent` and `usage` default to zero and empty, and
/// must be set.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    pub flags: ImageCreateFlags,
    pub image_type: ImageType,
    pub format: Format,

    /// Unused dimensions of 1D and 2D images must be 1.
    pub extent: [u32; 3],

    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub sharing: Sharing,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ImageCreateFlags::empty(),
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [0; 3],
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Sample1,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::empty(),
            sharing: Sharing::Exclusive,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ImageCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            ref sharing,
            _ne: _,
        } = self;

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags").set_vuids(&[
                "VUID-VkImageCreateInfo-flags-00969",
                "VUID-VkImageCreateInfo-imageType-00971",
                "VUID-VkImageCreateInfo-flags-01924",
            ])
        })?;

        if usage.is_empty() {
            return Err(Box::new(ValidationError {
                context: "usage".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageCreateInfo-usage-requiredbitmask"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let extent_vuids: [&'static [&'static str]; 3] = [
            &["VUID-VkImageCreateInfo-extent-00944"],
            &["VUID-VkImageCreateInfo-extent-00945"],
            &["VUID-VkImageCreateInfo-extent-00946"],
        ];

        for (index, (&component, vuids)) in extent.iter().zip(extent_vuids).enumerate() {
            if component == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("extent[{}]", index).into(),
                    problem: "is zero".into(),
                    vuids,
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }
        }

        let properties = device.properties();

        match image_type {
            ImageType::Dim1d => {
                if extent[1] != 1 || extent[2] != 1 {
                    return Err(Box::new(ValidationError {
                        problem: "`image_type` is `ImageType::Dim1d`, but `extent[1]` and \
                            `extent[2]` are not both 1"
                            .into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00956"],
                        ..Default::default()
                    }));
                }

                if extent[0] > properties.max_image_dimension1_d {
                    return Err(Box::new(ValidationError {
                        context: "extent[0]".into(),
                        problem: "exceeds the `max_image_dimension1_d` limit".into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00970"],
                        ..Default::default()
                    }));
                }
            }
            ImageType::Dim2d => {
                if extent[2] != 1 {
                    return Err(Box::new(ValidationError {
                        problem: "`image_type` is `ImageType::Dim2d`, but `extent[2]` is not 1"
                            .into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00957"],
                        ..Default::default()
                    }));
                }

                let limit = if flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE) {
                    properties.max_image_dimension_cube
                } else {
                    properties.max_image_dimension2_d
                };

                if extent[0] > limit || extent[1] > limit {
                    return Err(Box::new(ValidationError {
                        context: "extent".into(),
                        problem: format!(
                            "exceeds the maximum dimension {} for two-dimensional images",
                            limit,
                        )
                        .into(),
                        vuids: &["VUID-VkImageCreateInfo-extent-02252"],
                        ..Default::default()
                    }));
                }
            }
            ImageType::Dim3d => {
                if extent.iter().any(|&c| c > properties.max_image_dimension3_d) {
                    return Err(Box::new(ValidationError {
                        context: "extent".into(),
                        problem: "exceeds the `max_image_dimension3_d` limit".into(),
                        vuids: &["VUID-VkImageCreateInfo-extent-02253"],
                        ..Default::default()
                    }));
                }
            }
        }

        if mip_levels == 0 {
            return Err(Box::new(ValidationError {
                context: "mip_levels".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkImageCreateInfo-mipLevels-00947"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let max_mip_levels = max_mip_levels(extent);

        if mip_levels > max_mip_levels {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`mip_levels` is {}, but an image of this extent can have at most {} mip \
                    levels",
                    mip_levels, max_mip_levels,
                )
                .into(),
                vuids: &["VUID-VkImageCreateInfo-mipLevels-00958"],
                ..Default::default()
            }));
        }

        if array_layers == 0 {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkImageCreateInfo-arrayLayers-00948"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if array_layers > properties.max_image_array_layers {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "exceeds the `max_image_array_layers` limit".into(),
                vuids: &["VUID-VkImageCreateInfo-arrayLayers-02256"],
                ..Default::default()
            }));
        }

        if image_type == ImageType::Dim3d && array_layers != 1 {
            return Err(Box::new(ValidationError {
                problem: "`image_type` is `ImageType::Dim3d`, but `array_layers` is not 1".into(),
                vuids: &["VUID-VkImageCreateInfo-imageType-00961"],
                ..Default::default()
            }));
        }

        if flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE) {
            if image_type != ImageType::Dim2d {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::CUBE_COMPATIBLE`, but \
                        `image_type` is not `ImageType::Dim2d`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-flags-00949"],
                    ..Default::default()
                }));
            }

            if extent[0] != extent[1] || array_layers < 6 {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::CUBE_COMPATIBLE`, but \
                        `extent` is not square, or `array_layers` is less than 6"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageType-00954"],
                    ..Default::default()
                }));
            }
        }

        if samples != SampleCount::Sample1
            && (tiling != ImageTiling::Optimal
                || image_type != ImageType::Dim2d
                || mip_levels != 1
                || flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE))
        {
            return Err(Box::new(ValidationError {
                problem: "`samples` is not `SampleCount::Sample1`, but the image is not a \
                    two-dimensional, optimally tiled, non-cube image with a single mip level"
                    .into(),
                vuids: &["VUID-VkImageCreateInfo-samples-02257"],
                ..Default::default()
            }));
        }

        if flags.intersects(ImageCreateFlags::SPARSE_RESIDENCY | ImageCreateFlags::SPARSE_ALIASED)
            && !flags.intersects(ImageCreateFlags::SPARSE_BINDING)
        {
            return Err(Box::new(ValidationError {
                context: "flags".into(),
                problem: "contains `ImageCreateFlags::SPARSE_RESIDENCY` or \
                    `ImageCreateFlags::SPARSE_ALIASED`, but does not also contain \
                    `ImageCreateFlags::SPARSE_BINDING`"
                    .into(),
                vuids: &["VUID-VkImageCreateInfo-flags-00987"],
                ..Default::default()
            }));
        }

        if flags.intersects(ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE) {
            if !flags.intersects(ImageCreateFlags::MUTABLE_FORMAT) {
                return Err(Box::new(ValidationError {
                    context: "flags".into(),
                    problem: "contains `ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE`, but does \
                        not also contain `ImageCreateFlags::MUTABLE_FORMAT`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-flags-01572"],
                    ..Default::default()
                }));
            }

            if format.compression().is_none() {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE`, \
                        but `format` is not a compressed format"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-flags-01573"],
                    ..Default::default()
                }));
            }
        }

        if let Some(chroma_sampling) = format.ycbcr_chroma_sampling() {
            if image_type != ImageType::Dim2d {
                return Err(Box::new(ValidationError {
                    problem: "`format` is a YCbCr format, but `image_type` is not \
                        `ImageType::Dim2d`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-format-06412"],
                    ..Default::default()
                }));
            }

            if mip_levels != 1 {
                return Err(Box::new(ValidationError {
                    problem: "`format` is a YCbCr format, but `mip_levels` is not 1".into(),
                    vuids: &["VUID-VkImageCreateInfo-format-06410"],
                    ..Default::default()
                }));
            }

            if samples != SampleCount::Sample1 {
                return Err(Box::new(ValidationError {
                    problem: "`format` is a YCbCr format, but `samples` is not \
                        `SampleCount::Sample1`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-format-06411"],
                    ..Default::default()
                }));
            }

            if matches!(chroma_sampling, ChromaSampling::Mode422 | ChromaSampling::Mode420)
                && extent[0] % 2 != 0
            {
                return Err(Box::new(ValidationError {
                    problem: "`format` is a YCbCr format with horizontal chroma subsampling, \
                        but `extent[0]` is not a multiple of 2"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-format-04712"],
                    ..Default::default()
                }));
            }

            if chroma_sampling == ChromaSampling::Mode420 && extent[1] % 2 != 0 {
                return Err(Box::new(ValidationError {
                    problem: "`format` is a YCbCr format with vertical chroma subsampling, but \
                        `extent[1]` is not a multiple of 2"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-format-04713"],
                    ..Default::default()
                }));
            }
        }

        sharing
            .validate(
                device,
                &["VUID-VkImageCreateInfo-sharingMode-00942"],
                &["VUID-VkImageCreateInfo-sharingMode-01420"],
            )
            .map_err(|err| err.add_context("sharing"))?;

        let format_properties = device.format_properties(format);
        let format_features = match tiling {
            ImageTiling::Optimal => format_properties.optimal_tiling_features,
            ImageTiling::Linear => format_properties.linear_tiling_features,
        };

        if flags.intersects(ImageCreateFlags::DISJOINT) {
            if format.planes().is_empty() {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::DISJOINT`, but `format` is \
                        not a multi-planar format"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-format-01577"],
                    ..Default::default()
                }));
            }

            if !format_features.intersects(FormatFeatures::DISJOINT) {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::DISJOINT`, but the format \
                        features of `format` do not include `FormatFeatures::DISJOINT`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageCreateFormatFeatures-02260"],
                    ..Default::default()
                }));
            }
        }

        if format_features.is_empty() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`format` {:?} is not supported with `tiling` {:?}",
                    format, tiling,
                )
                .into(),
                vuids: &["VUID-VkImageCreateInfo-imageCreateMaxMipLevels-02251"],
                ..Default::default()
            }));
        }

        let usage_features = [
            (ImageUsage::SAMPLED, FormatFeatures::SAMPLED_IMAGE),
            (ImageUsage::STORAGE, FormatFeatures::STORAGE_IMAGE),
            (ImageUsage::COLOR_ATTACHMENT, FormatFeatures::COLOR_ATTACHMENT),
            (
                ImageUsage::DEPTH_STENCIL_ATTACHMENT,
                FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
            ),
            (ImageUsage::TRANSFER_SRC, FormatFeatures::TRANSFER_SRC),
            (ImageUsage::TRANSFER_DST, FormatFeatures::TRANSFER_DST),
        ];

        for (required_usage, required_feature) in usage_features {
            if usage.intersects(required_usage) && !format_features.intersects(required_feature) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`usage` contains `{:?}`, but `format` {:?} does not support \
                        `{:?}` with `tiling` {:?}",
                        required_usage, format, required_feature, tiling,
                    )
                    .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageCreateMaxMipLevels-02251"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Returns the number of mip levels of a full mip chain for `extent`.
pub(crate) fn max_mip_levels(extent: [u32; 3]) -> u32 {
    let max_dimension = extent.into_iter().max().unwrap_or(1).max(1);

    u32::BITS - max_dimension.leading_zeros()
}

/// An image, and the memory binding that backs it.
#[derive(Debug)]
pub struct Image {
    flags: ImageCreateFlags,
    image_type: ImageType,
    format: Format,
    extent: [u32; 3],
    mip_levels: u32,
    array_layers: u32,
    samples: SampleCount,
    tiling: ImageTiling,
    usage: ImageUsage,
    sharing: Sharing,
    memory_requirements: MemoryRequirements,
    pub(crate) memory: Mutex<Option<ResourceMemory>>,
    use_count: UseCount,
}

impl_object!(Image, Image, images);

impl Image {
    #[inline]
    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    #[inline]
    pub fn tiling(&self) -> ImageTiling {
        self.tiling
    }

    #[inline]
    pub fn usage(&self) -> ImageUsage {
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

    /// Returns whether the image was created with sparse binding.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.flags.intersects(ImageCreateFlags::SPARSE_BINDING)
    }

    /// Returns the memory that the image is bound to.
    ///
    /// The binding remains after the memory is freed.
    #[inline]
    pub fn memory(&self) -> Option<ResourceMemory> {
        *self.memory.lock()
    }

    /// Returns a subresource range that covers the whole image.
    #[inline]
    pub fn subresource_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange {
            aspects: self.format.aspects().difference(
                ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2,
            ),
            mip_levels: 0..self.mip_levels,
            array_layers: 0..self.array_layers,
        }
    }
}

/// Parameters to create a new `ImageView`.
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    /// The image to create a view of.
    ///
    /// The default value is [`Id::NULL`], which must be overridden.
    pub image: Id<Image>,

    /// The image view type.
    ///
    /// The default value is `ImageViewType::Dim2d`.
    pub view_type: ImageViewType,

    /// The format of the view.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The subresource range of the image that the view covers.
    ///
    /// The default value is the color aspect of the first mip level and array layer.
    pub subresource_range: ImageSubresourceRange,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            image: Id::NULL,
            view_type: ImageViewType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            subresource_range: ImageSubresourceRange::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A view of a subresource range of an image.
#[derive(Debug)]
pub struct ImageView {
    image: Id<Image>,
    view_type: ImageViewType,
    format: Format,
    subresource_range: ImageSubresourceRange,
    usage: ImageUsage,
    use_count: UseCount,
}

impl_object!(ImageView, ImageView, image_views);

impl ImageView {
    /// Returns the image that the view was created from. The image may have been destroyed
    /// since.
    #[inline]
    pub fn image(&self) -> Id<Image> {
        self.image
    }

    #[inline]
    pub fn view_type(&self) -> ImageViewType {
        self.view_type
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn subresource_range(&self) -> &ImageSubresourceRange {
        &self.subresource_range
    }

    /// Returns the usage of the image at the time the view was created.
    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }
}

impl Device {
    /// Creates a new image, without memory.
    pub fn create_image(
        &self,
        create_info: ImageCreateInfo,
    ) -> Result<Id<Image>, Box<ValidationError>> {
        self.reported(self.validate_create_image(&create_info))?;

        Ok(self.record_create_image(create_info))
    }

    pub fn validate_create_image(
        &self,
        create_info: &ImageCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_image(&self, create_info: ImageCreateInfo) -> Id<Image> {
        let memory_requirements = self.driver().image_memory_requirements(&create_info);
        let ImageCreateInfo {
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
            _ne: _,
        } = create_info;

        let image = self.objects.images.register(Image {
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
            memory_requirements,
            memory: Mutex::new(None),
            use_count: UseCount::default(),
        });

        tracing::trace!(?image, ?format, ?extent, "created image");

        image
    }

    /// Destroys an image. Its range is released from the memory it was bound to.
    pub fn destroy_image(&self, image: Id<Image>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_image(image))?;
        self.record_destroy_image(image);

        Ok(())
    }

    pub fn validate_destroy_image(&self, image: Id<Image>) -> Result<(), Box<ValidationError>> {
        let image_record = self.lookup(image, "image", &["VUID-vkDestroyImage-image-parameter"])?;

        if image_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "image".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    image.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyImage-image-01000"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_image(&self, image: Id<Image>) {
        if let Ok(image_record) = self.objects.images.erase(image) {
            if let Some(memory) = image_record.memory() {
                self.release_bound_range(memory.memory, image.erase());
            }
        }
    }

    /// Creates a view of an image.
    pub fn create_image_view(
        &self,
        create_info: ImageViewCreateInfo,
    ) -> Result<Id<ImageView>, Box<ValidationError>> {
        self.reported(self.validate_create_image_view(&create_info))?;

        Ok(self.record_create_image_view(create_info))
    }

    pub fn validate_create_image_view(
        &self,
        create_info: &ImageViewCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let ImageViewCreateInfo {
            image,
            view_type,
            format,
            ref subresource_range,
            _ne: _,
        } = *create_info;

        let image_record = self.lookup(
            image,
            "create_info.image",
            &["VUID-VkImageViewCreateInfo-image-parameter"],
        )?;

        if !image_record.is_sparse() && image_record.memory().is_none() {
            return Err(Box::new(ValidationError {
                context: "create_info.image".into(),
                problem: format!(
                    "{} is used with no memory bound; memory should be bound by calling \
                    vkBindImageMemory()",
                    image.erase(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-01020"],
                ..Default::default()
            }));
        }

        subresource_range
            .validate()
            .map_err(|err| err.add_context("create_info.subresource_range"))?;

        let ImageSubresourceRange {
            aspects,
            ref mip_levels,
            ref array_layers,
        } = *subresource_range;

        if mip_levels.start >= image_record.mip_levels() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.subresource_range.mip_levels.start` is {}, but the image has \
                    only {} mip levels",
                    mip_levels.start,
                    image_record.mip_levels(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-01478"],
                ..Default::default()
            }));
        }

        if mip_levels.end > image_record.mip_levels() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.subresource_range.mip_levels.end` is {}, but the image has \
                    only {} mip levels",
                    mip_levels.end,
                    image_record.mip_levels(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-01718"],
                ..Default::default()
            }));
        }

        if array_layers.start >= image_record.array_layers() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.subresource_range.array_layers.start` is {}, but the image \
                    has only {} array layers",
                    array_layers.start,
                    image_record.array_layers(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-06724"],
                ..Default::default()
            }));
        }

        if array_layers.end > image_record.array_layers() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.subresource_range.array_layers.end` is {}, but the image has \
                    only {} array layers",
                    array_layers.end,
                    image_record.array_layers(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-06725"],
                ..Default::default()
            }));
        }

        let image_format = image_record.format();
        let plane_aspects = ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2;
        let plane_format = if image_format.planes().is_empty() {
            if !image_format.aspects().contains(aspects) || aspects.intersects(plane_aspects) {
                return Err(Box::new(ValidationError {
                    context: "create_info.subresource_range.aspects".into(),
                    problem: format!(
                        "{:?} is not a subset of the aspects of the image format {:?}",
                        aspects, image_format,
                    )
                    .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-09594"],
                    ..Default::default()
                }));
            }

            None
        } else if aspects == ImageAspects::COLOR {
            None
        } else {
            match aspects
                .plane_index()
                .and_then(|index| image_format.planes().get(index))
            {
                Some(&plane_format) => Some(plane_format),
                None => {
                    return Err(Box::new(ValidationError {
                        context: "create_info.subresource_range.aspects".into(),
                        problem: format!(
                            "is {:?}, but the image has a multi-planar format {:?}, so it must be \
                            `ImageAspects::COLOR` or a single plane of the format",
                            aspects, image_format,
                        )
                        .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-09594"],
                        ..Default::default()
                    }));
                }
            }
        };

        view_type.validate_device(self).map_err(|err| {
            err.add_context("create_info.view_type")
                .set_vuids(&["VUID-VkImageViewCreateInfo-viewType-01004"])
        })?;

        let image_type = image_record.image_type();
        let cube_compatible = image_record
            .flags()
            .intersects(ImageCreateFlags::CUBE_COMPATIBLE);
        let type_compatible = match view_type {
            ImageViewType::Dim1d | ImageViewType::Dim1dArray => image_type == ImageType::Dim1d,
            ImageViewType::Dim2d | ImageViewType::Dim2dArray => image_type == ImageType::Dim2d,
            ImageViewType::Dim3d => image_type == ImageType::Dim3d,
            ImageViewType::Cube | ImageViewType::CubeArray => {
                image_type == ImageType::Dim2d && cube_compatible
            }
        };

        if !type_compatible {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.view_type` {:?} is not compatible with an image of type {:?}{}",
                    view_type,
                    image_type,
                    if cube_compatible {
                        ""
                    } else {
                        " that was not created with `ImageCreateFlags::CUBE_COMPATIBLE`"
                    },
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subResourceRange-01021"],
                ..Default::default()
            }));
        }

        let layer_count = array_layers.end - array_layers.start;

        match view_type {
            ImageViewType::Dim1d | ImageViewType::Dim2d | ImageViewType::Dim3d
                if layer_count != 1 =>
            {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`create_info.view_type` is {:?}, but \
                        `create_info.subresource_range.array_layers` does not contain exactly \
                        one layer",
                        view_type,
                    )
                    .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-imageViewType-04973"],
                    ..Default::default()
                }));
            }
            ImageViewType::Cube if layer_count != 6 => {
                return Err(Box::new(ValidationError {
                    problem: "`create_info.view_type` is `ImageViewType::Cube`, but \
                        `create_info.subresource_range.array_layers` does not contain exactly \
                        6 layers"
                        .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-viewType-02960"],
                    ..Default::default()
                }));
            }
            ImageViewType::CubeArray if layer_count % 6 != 0 => {
                return Err(Box::new(ValidationError {
                    problem: "`create_info.view_type` is `ImageViewType::CubeArray`, but the \
                        number of layers in `create_info.subresource_range.array_layers` is \
                        not a multiple of 6"
                        .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-viewType-02961"],
                    ..Default::default()
                }));
            }
            _ => (),
        }

        let mutable_format = image_record
            .flags()
            .intersects(ImageCreateFlags::MUTABLE_FORMAT);
        let block_texel_view_compatible = image_record
            .flags()
            .intersects(ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE);

        if let Some(plane_format) = plane_format {
            if format != plane_format {
                if !mutable_format {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "`create_info.format` {:?} differs from the format {:?} of the \
                            selected plane of {}, which was created with no mutable format bit",
                            format,
                            plane_format,
                            image.erase(),
                        )
                        .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-image-01762"],
                        ..Default::default()
                    }));
                }

                if format.compatibility() != plane_format.compatibility() {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "`create_info.format` {:?} is not compatible with the format {:?} \
                            of the selected plane",
                            format, plane_format,
                        )
                        .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-image-01586"],
                        ..Default::default()
                    }));
                }
            }
        } else if format != image_format {
            if !mutable_format {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`create_info.format` {:?} differs from the format {:?} of {}, which \
                        was created with no mutable format bit",
                        format,
                        image_format,
                        image.erase(),
                    )
                    .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-image-01762"],
                    ..Default::default()
                }));
            }

            if !format.is_view_compatible(image_format, true, block_texel_view_compatible) {
                if block_texel_view_compatible && image_format.compression().is_some() {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "{} was created with `ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE`, \
                            but `create_info.format` {:?} is neither compatible with {:?} nor \
                            an uncompressed format of the same block size",
                            image.erase(),
                            format,
                            image_format,
                        )
                        .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-image-01583"],
                        ..Default::default()
                    }));
                }

                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`create_info.format` {:?} is not in the same compatibility class as \
                        the format {:?} of {}",
                        format,
                        image_format,
                        image.erase(),
                    )
                    .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-image-01761"],
                    ..Default::default()
                }));
            }
        }

        let format_properties = self.format_properties(format);
        let format_features = match image_record.tiling() {
            ImageTiling::Optimal => format_properties.optimal_tiling_features,
            ImageTiling::Linear => format_properties.linear_tiling_features,
        };

        if format_features.is_empty() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`create_info.format` {:?} has no format features with the tiling {:?} of \
                    the image",
                    format,
                    image_record.tiling(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-None-02273"],
                ..Default::default()
            }));
        }

        if !image_record.usage().intersects(
            ImageUsage::SAMPLED
                | ImageUsage::STORAGE
                | ImageUsage::COLOR_ATTACHMENT
                | ImageUsage::DEPTH_STENCIL_ATTACHMENT
                | ImageUsage::INPUT_ATTACHMENT
                | ImageUsage::TRANSIENT_ATTACHMENT,
        ) {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the usage of {} does not contain any usage that a view can be used for",
                    image.erase(),
                )
                .into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-04441"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_create_image_view(&self, create_info: ImageViewCreateInfo) -> Id<ImageView> {
        let ImageViewCreateInfo {
            image,
            view_type,
            format,
            subresource_range,
            _ne: _,
        } = create_info;

        let usage = self
            .get(image)
            .map(|image| image.usage())
            .unwrap_or_default();

        self.objects.image_views.register(ImageView {
            image,
            view_type,
            format,
            subresource_range,
            usage,
            use_count: UseCount::default(),
        })
    }

    /// Destroys an image view.
    pub fn destroy_image_view(
        &self,
        image_view: Id<ImageView>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_image_view(image_view))?;
        self.record_destroy_image_view(image_view);

        Ok(())
    }

    pub fn validate_destroy_image_view(
        &self,
        image_view: Id<ImageView>,
    ) -> Result<(), Box<ValidationError>> {
        let view_record = self.lookup(
            image_view,
            "image_view",
            &["VUID-vkDestroyImageView-imageView-parameter"],
        )?;

        if view_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "image_view".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    image_view.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyImageView-imageView-01026"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_image_view(&self, image_view: Id<ImageView>) {
        let _ = self.objects.image_views.erase(image_view);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        max_mip_levels, ImageAspects, ImageCreateFlags, ImageCreateInfo, ImageSubresourceRange,
        ImageTiling, ImageType, ImageUsage, ImageViewCreateInfo, ImageViewType, SampleCount,
    };
    use crate::{
        device::{Device, DeviceExtensions, DeviceFeatures},
        format::Format,
        handle::Id,
        image::Image,
        memory::MemoryAllocateInfo,
    };

    fn sampled_image(format: Format, flags: ImageCreateFlags) -> ImageCreateInfo {
        ImageCreateInfo {
            flags,
            format,
            extent: [64, 64, 1],
            usage: ImageUsage::SAMPLED,
            ..Default::default()
        }
    }

    fn create_bound(device: &Device, create_info: ImageCreateInfo) -> Id<Image> {
        let image = device.create_image(create_info).unwrap();
        let size = device.get(image).unwrap().memory_requirements().size;
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: size,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();
        device.bind_image_memory(image, memory, 0).unwrap();

        image
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(max_mip_levels([1, 1, 1]), 1);
        assert_eq!(max_mip_levels([64, 64, 1]), 7);
        assert_eq!(max_mip_levels([65, 3, 1]), 7);
    }

    #[test]
    fn create_invalid() {
        let (device, _queue, _log) = test_device!();

        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            }),
            "VUID-VkImageCreateInfo-extent-00944",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                mip_levels: 8,
                ..sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-mipLevels-00958",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                image_type: ImageType::Dim1d,
                ..sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-imageType-00956",
        );
        assert_should_fail!(
            device.create_image(sampled_image(
                Format::R8G8B8A8_UNORM,
                ImageCreateFlags::CUBE_COMPATIBLE,
            )),
            "VUID-VkImageCreateInfo-imageType-00954",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                samples: SampleCount::Sample4,
                tiling: ImageTiling::Linear,
                ..sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-samples-02257",
        );
        assert_should_fail!(
            device.create_image(sampled_image(
                Format::R8G8B8A8_UNORM,
                ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE,
            )),
            "VUID-VkImageCreateInfo-flags-01572",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                extent: [63, 64, 1],
                ..sampled_image(Format::G8_B8R8_2PLANE_420_UNORM, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-format-04712",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                tiling: ImageTiling::Linear,
                ..sampled_image(Format::D32_SFLOAT, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-imageCreateMaxMipLevels-02251",
        );
        assert_should_fail!(
            device.create_image(ImageCreateInfo {
                usage: ImageUsage::COLOR_ATTACHMENT,
                ..sampled_image(Format::D32_SFLOAT, ImageCreateFlags::empty())
            }),
            "VUID-VkImageCreateInfo-imageCreateMaxMipLevels-02251",
        );
    }

    #[test]
    fn sparse_requires_feature() {
        let (device, _queue, log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());

        let err = device
            .create_image(sampled_image(
                Format::R8G8B8A8_UNORM,
                ImageCreateFlags::SPARSE_BINDING,
            ))
            .unwrap_err();
        assert!(err.is("VUID-VkImageCreateInfo-flags-00969"));
        assert!(err.to_string().contains("sparse_binding"));
        assert!(log.contains("VUID-VkImageCreateInfo-flags-00969"));
    }

    #[test]
    fn view_of_unbound_image() {
        let (device, _queue, _log) = test_device!();
        let image = device
            .create_image(sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty()))
            .unwrap();

        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-image-01020",
        );
    }

    #[test]
    fn view_mutable_format() {
        let (device, _queue, log) = test_device!();

        let image = create_bound(
            &device,
            sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty()),
        );
        let view_info = ImageViewCreateInfo {
            image,
            format: Format::B8G8R8A8_UNORM,
            ..Default::default()
        };

        assert_should_fail!(
            device.create_image_view(view_info.clone()),
            "VUID-VkImageViewCreateInfo-image-01762",
        );
        assert!(log.contains_message(
            "VUID-VkImageViewCreateInfo-image-01762",
            "no mutable format bit",
        ));

        let image = create_bound(
            &device,
            sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::MUTABLE_FORMAT),
        );
        device
            .create_image_view(ImageViewCreateInfo {
                image,
                ..view_info.clone()
            })
            .unwrap();

        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R8G8_UNORM,
                ..view_info
            }),
            "VUID-VkImageViewCreateInfo-image-01761",
        );
    }

    #[test]
    fn view_block_texel_compatible() {
        let (device, _queue, _log) = test_device!();
        let image = create_bound(
            &device,
            sampled_image(
                Format::BC1_RGBA_UNORM_BLOCK,
                ImageCreateFlags::MUTABLE_FORMAT | ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE,
            ),
        );

        device
            .create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R32G32_UINT,
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R32_UINT,
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-image-01583",
        );
    }

    #[test]
    fn view_of_plane() {
        let (device, _queue, _log) = test_device!();
        let image = create_bound(
            &device,
            sampled_image(Format::G8_B8R8_2PLANE_420_UNORM, ImageCreateFlags::empty()),
        );

        device
            .create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R8G8_UNORM,
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::PLANE_1,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R8G8_UNORM,
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::PLANE_0,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-image-01762",
        );
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                format: Format::R8_UNORM,
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::PLANE_2,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-subresourceRange-09594",
        );
    }

    #[test]
    fn view_ranges_and_types() {
        let (device, _queue, _log) = test_device!();
        let image = create_bound(
            &device,
            ImageCreateInfo {
                array_layers: 6,
                ..sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::CUBE_COMPATIBLE)
            },
        );

        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                subresource_range: ImageSubresourceRange {
                    mip_levels: 0..2,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-subresourceRange-01718",
        );
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                subresource_range: ImageSubresourceRange {
                    array_layers: 2..2,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageSubresourceRange-layerCount-01721",
        );
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                subresource_range: ImageSubresourceRange {
                    aspects: ImageAspects::DEPTH,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-subresourceRange-09594",
        );
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                view_type: ImageViewType::Dim3d,
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-subResourceRange-01021",
        );
        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                view_type: ImageViewType::Cube,
                subresource_range: ImageSubresourceRange {
                    array_layers: 0..5,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-viewType-02960",
        );

        device
            .create_image_view(ImageViewCreateInfo {
                image,
                view_type: ImageViewType::Cube,
                subresource_range: ImageSubresourceRange {
                    array_layers: 0..6,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
    }

    #[test]
    fn cube_array_requires_feature() {
        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());
        let image = create_bound(
            &device,
            ImageCreateInfo {
                array_layers: 12,
                ..sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::CUBE_COMPATIBLE)
            },
        );

        assert_should_fail!(
            device.create_image_view(ImageViewCreateInfo {
                image,
                view_type: ImageViewType::CubeArray,
                subresource_range: ImageSubresourceRange {
                    array_layers: 0..12,
                    ..Default::default()
                },
                ..Default::default()
            }),
            "VUID-VkImageViewCreateInfo-viewType-01004",
        );
    }

    #[test]
    fn destroy_view_then_image() {
        let (device, _queue, log) = test_device!();
        let image = create_bound(
            &device,
            sampled_image(Format::R8G8B8A8_UNORM, ImageCreateFlags::empty()),
        );
        let view = device
            .create_image_view(ImageViewCreateInfo {
                image,
                ..Default::default()
            })
            .unwrap();

        device.destroy_image(image).unwrap();

        // The view outlives its image; the stale id is detected through the generation.
        let view_record = device.get(view).unwrap();
        assert!(device.get(view_record.image()).is_err());

        device.destroy_image_view(view).unwrap();
        assert_should_fail!(
            device.destroy_image_view(view),
            "VUID-vkDestroyImageView-imageView-parameter",
        );
        assert!(log.contains("VUID-vkDestroyImageView-imageView-parameter"));
    }
}
