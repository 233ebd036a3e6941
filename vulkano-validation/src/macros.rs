// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Typed counterparts of the Vulkan enums and flags that the engine inspects.
//!
//! Every member names its `ash` constant, so the values can never drift from the registry. Raw
//! values come from the application and are decoded with a checked conversion that reports what
//! it did not recognize. Members that only exist with a device feature or extension list their
//! requirements, which `validate_device` checks against the device.

/// Builds a `RequiresOneOf` from the requirement syntax shared by the macros below.
macro_rules! requires_one_of {
    ($([
        $($(DeviceFeature($device_feature:ident)),+)?
        $($(DeviceExtension($device_extension:ident)),+)?
    ]),+) => {
        crate::RequiresOneOf(&[
            $(crate::RequiresAllOf(&[
                $($(crate::Requires::DeviceFeature(stringify!($device_feature)),)+)?
                $($(crate::Requires::DeviceExtension(stringify!($device_extension)),)+)?
            ])),+
        ])
    };
}

macro_rules! vulkan_bitflags {
    {
        $(#[doc = $ty_doc:literal])*
        $ty:ident = $ty_ffi:ident($repr:ty);

        $(
            $(#[doc = $flag_doc:literal])*
            $flag_name:ident = $flag_name_ffi:ident
            $(RequiresOneOf([
                $(RequiresAllOf([
                    $($(DeviceFeature($device_feature:ident)),+ $(,)?)?
                    $($(DeviceExtension($device_extension:ident)),+ $(,)?)?
                ])),+ $(,)?
            ]))?
            ,
        )+
    } => {
        $(#[doc = $ty_doc])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $ty($repr);

        impl $ty {
            $(
                $(#[doc = $flag_doc])*
                pub const $flag_name: Self = Self(ash::vk::$ty_ffi::$flag_name_ffi.as_raw());
            )+

            const NAMED: &'static [(&'static str, Self)] = &[
                $((stringify!($flag_name), Self::$flag_name),)+
            ];

            const KNOWN_BITS: $repr = 0 $(| Self::$flag_name.0)+;

            /// The flags that a device feature or extension must be enabled for.
            #[allow(dead_code)]
            const GATED: &'static [(Self, crate::RequiresOneOf)] = &[
                $($(
                    (
                        Self::$flag_name,
                        requires_one_of!($([
                            $($(DeviceFeature($device_feature)),+)?
                            $($(DeviceExtension($device_extension)),+)?
                        ]),+),
                    ),
                )?)+
            ];

            #[doc = concat!("Returns a `", stringify!($ty), "` with none of the flags set.")]
            #[inline]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Decodes a flags value as the application passed it.
            ///
            /// On failure, returns the bits that are not a known flag.
            #[inline]
            pub const fn from_raw_checked(raw: $repr) -> Result<Self, $repr> {
                match raw & !Self::KNOWN_BITS {
                    0 => Ok(Self(raw)),
                    unknown => Err(unknown),
                }
            }

            #[inline]
            pub const fn as_raw(self) -> $repr {
                self.0
            }

            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns whether `self` and `other` have a flag in common.
            #[inline]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Returns whether every flag of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            #[inline]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Returns `self` without the flags of `other`.
            #[inline]
            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            /// Checks that the device enables what the flags in `self` need.
            #[allow(dead_code)]
            pub(crate) fn validate_device(
                self,
                device: &crate::device::Device,
            ) -> Result<(), Box<crate::ValidationError>> {
                for &(flag, requires_one_of) in Self::GATED {
                    if self.intersects(flag) && !requires_one_of.is_met(device) {
                        return Err(Box::new(crate::ValidationError {
                            problem: format!("contains `{}::{:?}`", stringify!($ty), flag)
                                .into(),
                            requires_one_of,
                            ..Default::default()
                        }));
                    }
                }

                Ok(())
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut names = Self::NAMED
                    .iter()
                    .filter(|&&(_, flag)| self.intersects(flag))
                    .map(|&(name, _)| name);

                match names.next() {
                    Some(first) => {
                        f.write_str(first)?;

                        for name in names {
                            write!(f, " | {}", name)?;
                        }

                        Ok(())
                    }
                    None => f.write_str("empty()"),
                }
            }
        }

        impl From<$ty> for ash::vk::$ty_ffi {
            #[inline]
            fn from(val: $ty) -> Self {
                Self::from_raw(val.0)
            }
        }

        impl From<ash::vk::$ty_ffi> for $ty {
            /// Bits that are not a known flag are dropped.
            #[inline]
            fn from(val: ash::vk::$ty_ffi) -> Self {
                Self(val.as_raw() & Self::KNOWN_BITS)
            }
        }

        impl std::ops::BitOr for $ty {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl std::ops::Not for $ty {
            type Output = Self;

            #[inline]
            fn not(self) -> Self {
                Self(!self.0 & Self::KNOWN_BITS)
            }
        }
    };
}

macro_rules! vulkan_enum {
    {
        $(#[doc = $ty_doc:literal])*
        $ty:ident = $ty_ffi:ident($repr:ty);

        $(
            $(#[doc = $variant_doc:literal])*
            $variant:ident = $variant_ffi:ident
            $(RequiresOneOf([
                $(RequiresAllOf([
                    $($(DeviceFeature($device_feature:ident)),+ $(,)?)?
                    $($(DeviceExtension($device_extension:ident)),+ $(,)?)?
                ])),+ $(,)?
            ]))?
            ,
        )+
    } => {
        $(#[doc = $ty_doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        #[repr($repr)]
        pub enum $ty {
            $(
                $(#[doc = $variant_doc])*
                $variant = ash::vk::$ty_ffi::$variant_ffi.as_raw(),
            )+
        }

        impl $ty {
            /// Decodes an enum value as the application passed it.
            ///
            /// Returns `None` if the value is not one of the variants.
            #[inline]
            pub fn try_from_raw(raw: $repr) -> Option<Self> {
                Self::try_from(ash::vk::$ty_ffi::from_raw(raw)).ok()
            }

            #[allow(dead_code)]
            fn requirements(self) -> Option<crate::RequiresOneOf> {
                #[allow(clippy::match_single_binding)]
                match self {
                    $($(
                        Self::$variant => Some(requires_one_of!($([
                            $($(DeviceFeature($device_feature)),+)?
                            $($(DeviceExtension($device_extension)),+)?
                        ]),+)),
                    )?)+
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }

            /// Checks that the device enables what `self` needs.
            #[allow(dead_code)]
            pub(crate) fn validate_device(
                self,
                device: &crate::device::Device,
            ) -> Result<(), Box<crate::ValidationError>> {
                match self.requirements() {
                    Some(requires_one_of) if !requires_one_of.is_met(device) => {
                        Err(Box::new(crate::ValidationError {
                            problem: format!("is `{}::{:?}`", stringify!($ty), self).into(),
                            requires_one_of,
                            ..Default::default()
                        }))
                    }
                    _ => Ok(()),
                }
            }
        }

        impl From<$ty> for ash::vk::$ty_ffi {
            #[inline]
            fn from(val: $ty) -> Self {
                Self::from_raw(val as $repr)
            }
        }

        impl TryFrom<ash::vk::$ty_ffi> for $ty {
            type Error = ();

            #[inline]
            fn try_from(val: ash::vk::$ty_ffi) -> Result<Self, Self::Error> {
                match val {
                    $(ash::vk::$ty_ffi::$variant_ffi => Ok(Self::$variant),)+
                    _ => Err(()),
                }
            }
        }
    };
}

/// Implements `Object` for a record type that keeps its use counter in a `use_count` field and
/// lives in the given handle table of the device.
macro_rules! impl_object {
    ($ty:ident, $object_type:ident, $table:ident) => {
        impl crate::object::Object for $ty {
            const TYPE: crate::object::ObjectType = crate::object::ObjectType::$object_type;

            #[inline]
            fn table(device: &crate::device::Device) -> &crate::handle::HandleTable<Self> {
                &device.objects.$table
            }

            #[inline]
            fn use_count(&self) -> &crate::object::UseCount {
                &self.use_count
            }
        }
    };
}
