// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! How to retrieve data from a sampled image within a shader.
//!
//! A sampler has no dependencies on other objects. The only state that it carries is its
//! create info, and the in-use counter that is raised while a submission refers to it through a
//! descriptor set.

use crate::{
    device::Device, handle::Id, object::UseCount, Requires, RequiresAllOf, RequiresOneOf,
    ValidationError, ValidationErrorKind,
};
use std::ops::RangeInclusive;

vulkan_enum! {
    /// Texel filtering within a single mip level.
    Filter = Filter(i32);

    /// Takes the texel closest to the sample point.
    Nearest = NEAREST,

    /// Blends the texels around the sample point.
    Linear = LINEAR,
}

vulkan_enum! {
    /// Filtering between mip levels.
    SamplerMipmapMode = SamplerMipmapMode(i32);

    Nearest = NEAREST,
    Linear = LINEAR,
}

vulkan_enum! {
    /// What a lookup outside of `[0, 1)` resolves to, per coordinate.
    SamplerAddressMode = SamplerAddressMode(i32);

    Repeat = REPEAT,
    MirroredRepeat = MIRRORED_REPEAT,
    ClampToEdge = CLAMP_TO_EDGE,

    /// Resolves to `border_color`.
    ClampToBorder = CLAMP_TO_BORDER,
}

vulkan_enum! {
    BorderColor = BorderColor(i32);

    FloatTransparentBlack = FLOAT_TRANSPARENT_BLACK,
    IntTransparentBlack = INT_TRANSPARENT_BLACK,
    FloatOpaqueBlack = FLOAT_OPAQUE_BLACK,
    IntOpaqueBlack = INT_OPAQUE_BLACK,
    FloatOpaqueWhite = FLOAT_OPAQUE_WHITE,
    IntOpaqueWhite = INT_OPAQUE_WHITE,
}

vulkan_enum! {
    /// The operator of a depth comparison.
    CompareOp = CompareOp(i32);

    Never = NEVER,
    Less = LESS,
    Equal = EQUAL,
    LessOrEqual = LESS_OR_EQUAL,
    Greater = GREATER,
    NotEqual = NOT_EQUAL,
    GreaterOrEqual = GREATER_OR_EQUAL,
    Always = ALWAYS,
}

/// The decoded form of a `VkSamplerCreateInfo`.
///
/// The default is a nearest-filtering, clamp-to-edge sampler with a single LOD and no
/// anisotropy or depth comparison.
#[derive(Clone, Debug)]
pub struct SamplerCreateInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: SamplerMipmapMode,

    /// Address modes for `u`, `v` and `w`.
    pub address_mode: [SamplerAddressMode; 3],

    /// Its magnitude is capped by the `max_sampler_lod_bias` limit.
    pub mip_lod_bias: f32,

    /// The maximum anisotropy, if anisotropic filtering is enabled. Needs the
    /// `sampler_anisotropy` feature and a value in `1.0..=max_sampler_anisotropy`.
    pub anisotropy: Option<f32>,

    /// The depth comparison operator, if depth comparison is enabled.
    pub compare: Option<CompareOp>,

    /// `min_lod..=max_lod`.
    pub lod: RangeInclusive<f32>,

    pub border_color: BorderColor,

    /// Coordinates are in texels instead of `[0, 1)`. This forbids mip filtering, a LOD range,
    /// repeating `u`/`v` address modes, anisotropy and depth comparison, and needs equal
    /// filters.
    pub unnormalized_coordinates: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for SamplerCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: SamplerMipmapMode::Nearest,
            address_mode: [SamplerAddressMode::ClampToEdge; 3],
            mip_lod_bias: 0.0,
            anisotropy: None,
            compare: None,
            lod: 0.0..=0.0,
            border_color: BorderColor::FloatTransparentBlack,
            unnormalized_coordinates: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SamplerCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let properties = device.properties();

        if self.mip_lod_bias.abs() > properties.max_sampler_lod_bias {
            return Err(Box::new(ValidationError {
                context: "mip_lod_bias".into(),
                problem: format!(
                    "has a magnitude of {}, but the `max_sampler_lod_bias` limit is {}",
                    self.mip_lod_bias.abs(),
                    properties.max_sampler_lod_bias,
                )
                .into(),
                vuids: &["VUID-VkSamplerCreateInfo-mipLodBias-01069"],
                ..Default::default()
            }));
        }

        if let Some(max_anisotropy) = self.anisotropy {
            if !device.enabled_features().sampler_anisotropy {
                return Err(Box::new(ValidationError {
                    context: "anisotropy".into(),
                    problem: "is `Some`".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "sampler_anisotropy",
                    )])]),
                    vuids: &["VUID-VkSamplerCreateInfo-anisotropyEnable-01070"],
                    ..Default::default()
                }));
            }

            if max_anisotropy < 1.0 || max_anisotropy > properties.max_sampler_anisotropy {
                return Err(Box::new(ValidationError {
                    context: "anisotropy".into(),
                    problem: format!(
                        "is `Some({})`, which is outside of `1.0..={}`",
                        max_anisotropy, properties.max_sampler_anisotropy,
                    )
                    .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-anisotropyEnable-01071"],
                    ..Default::default()
                }));
            }
        }

        if self.lod.end() < self.lod.start() {
            return Err(Box::new(ValidationError {
                context: "lod".into(),
                problem: format!(
                    "ends at {}, before its start {}",
                    self.lod.end(),
                    self.lod.start(),
                )
                .into(),
                vuids: &["VUID-VkSamplerCreateInfo-maxLod-01973"],
                ..Default::default()
            }));
        }

        if self.unnormalized_coordinates {
            self.validate_unnormalized()?;
        }

        Ok(())
    }

    fn validate_unnormalized(&self) -> Result<(), Box<ValidationError>> {
        let clamps = |mode: &SamplerAddressMode| {
            matches!(
                mode,
                SamplerAddressMode::ClampToEdge | SamplerAddressMode::ClampToBorder,
            )
        };
        let conflicts: [(bool, &str, &'static [&'static str]); 6] = [
            (
                self.min_filter != self.mag_filter,
                "`min_filter` differs from `mag_filter`",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01072"],
            ),
            (
                self.mipmap_mode != SamplerMipmapMode::Nearest,
                "`mipmap_mode` is not `SamplerMipmapMode::Nearest`",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01073"],
            ),
            (
                self.lod != (0.0..=0.0),
                "`lod` is not `0.0..=0.0`",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01074"],
            ),
            (
                !self.address_mode[..2].iter().all(clamps),
                "`address_mode[0]` or `address_mode[1]` does not clamp",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01075"],
            ),
            (
                self.anisotropy.is_some(),
                "`anisotropy` is `Some`",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01076"],
            ),
            (
                self.compare.is_some(),
                "`compare` is `Some`",
                &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01077"],
            ),
        ];

        match conflicts.iter().find(|&&(conflicting, _, _)| conflicting) {
            Some(&(_, what, vuids)) => Err(Box::new(ValidationError {
                problem: format!("`unnormalized_coordinates` is `true`, but {}", what).into(),
                vuids,
                ..Default::default()
            })),
            None => Ok(()),
        }
    }
}

/// A live sampler.
#[derive(Debug)]
pub struct Sampler {
    create_info: SamplerCreateInfo,
    use_count: UseCount,
}

impl_object!(Sampler, Sampler, samplers);

impl Sampler {
    /// Returns the parameters the sampler was created with.
    #[inline]
    pub fn create_info(&self) -> &SamplerCreateInfo {
        &self.create_info
    }
}

impl Device {
    /// Creates a new sampler.
    pub fn create_sampler(
        &self,
        create_info: SamplerCreateInfo,
    ) -> Result<Id<Sampler>, Box<ValidationError>> {
        self.reported(self.validate_create_sampler(&create_info))?;

        Ok(self.record_create_sampler(create_info))
    }

    pub fn validate_create_sampler(
        &self,
        create_info: &SamplerCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))?;

        let max_sampler_allocation_count = self.properties().max_sampler_allocation_count;

        if self.objects.samplers.len() >= max_sampler_allocation_count as usize {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the number of live samplers has reached the \
                    `max_sampler_allocation_count` limit {}",
                    max_sampler_allocation_count,
                )
                .into(),
                vuids: &["VUID-vkCreateSampler-maxSamplerAllocationCount-04110"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_create_sampler(&self, create_info: SamplerCreateInfo) -> Id<Sampler> {
        self.objects.samplers.register(Sampler {
            create_info,
            use_count: UseCount::default(),
        })
    }

    /// Destroys a sampler.
    pub fn destroy_sampler(&self, sampler: Id<Sampler>) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_sampler(sampler))?;
        self.record_destroy_sampler(sampler);

        Ok(())
    }

    pub fn validate_destroy_sampler(
        &self,
        sampler: Id<Sampler>,
    ) -> Result<(), Box<ValidationError>> {
        let sampler_record =
            self.lookup(sampler, "sampler", &["VUID-vkDestroySampler-sampler-parameter"])?;

        if sampler_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "sampler".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    sampler.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroySampler-sampler-01082"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_sampler(&self, sampler: Id<Sampler>) {
        let _ = self.objects.samplers.erase(sampler);
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode};
    use crate::{
        device::{DeviceExtensions, DeviceFeatures},
        driver::StaticDriver,
        tests::device_with_driver,
    };

    #[test]
    fn create_regular() {
        let (device, _queue, log) = test_device!();

        let sampler = device
            .create_sampler(SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_mode: SamplerMipmapMode::Linear,
                address_mode: [SamplerAddressMode::MirroredRepeat; 3],
                mip_lod_bias: 1.0,
                lod: 0.0..=100.0,
                ..Default::default()
            })
            .unwrap();
        let sampler_record = device.get(sampler).unwrap();
        assert_eq!(sampler_record.create_info().mag_filter, Filter::Linear);
        assert_eq!(sampler_record.create_info().lod, 0.0..=100.0);
        assert!(log.is_empty());
    }

    #[test]
    fn create_unnormalized() {
        let (device, _queue, _log) = test_device!();

        device
            .create_sampler(SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                unnormalized_coordinates: true,
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                mag_filter: Filter::Linear,
                unnormalized_coordinates: true,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01072",
        );
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                mipmap_mode: SamplerMipmapMode::Linear,
                unnormalized_coordinates: true,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01073",
        );
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                lod: 0.0..=1.0,
                unnormalized_coordinates: true,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01074",
        );
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                address_mode: [SamplerAddressMode::Repeat; 3],
                unnormalized_coordinates: true,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01075",
        );
    }

    #[test]
    fn bad_lod() {
        let (device, _queue, _log) = test_device!();

        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                mip_lod_bias: -16.0,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-mipLodBias-01069",
        );
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                lod: 2.0..=1.0,
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-maxLod-01973",
        );
    }

    #[test]
    fn anisotropy() {
        let (device, _queue, _log) = test_device!();

        device
            .create_sampler(SamplerCreateInfo {
                anisotropy: Some(16.0),
                ..Default::default()
            })
            .unwrap();
        assert_should_fail!(
            device.create_sampler(SamplerCreateInfo {
                anisotropy: Some(0.5),
                ..Default::default()
            }),
            "VUID-VkSamplerCreateInfo-anisotropyEnable-01071",
        );

        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());
        let err = device
            .create_sampler(SamplerCreateInfo {
                anisotropy: Some(2.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is("VUID-VkSamplerCreateInfo-anisotropyEnable-01070"));
        assert!(err.to_string().contains("sampler_anisotropy"));
    }

    #[test]
    fn allocation_count() {
        let mut driver = StaticDriver::default();
        driver.properties.max_sampler_allocation_count = 2;
        let (device, log) = device_with_driver(driver);

        let first = device.create_sampler(Default::default()).unwrap();
        device.create_sampler(Default::default()).unwrap();
        assert_should_fail!(
            device.create_sampler(Default::default()),
            "VUID-vkCreateSampler-maxSamplerAllocationCount-04110",
        );

        device.destroy_sampler(first).unwrap();
        device.create_sampler(Default::default()).unwrap();
        assert_eq!(
            log.count("VUID-vkCreateSampler-maxSamplerAllocationCount-04110"),
            1,
        );
    }
}
