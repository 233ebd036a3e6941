// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Object-lifetime and state validation for Vulkan API calls.
//!
//! This crate models the objects of a single logical device the way a validation layer sees them:
//! every API call is intercepted before it reaches the driver, the handles it mentions are looked
//! up in a device-scoped registry, and a verdict is produced.
//!
//! # Brief summary
//!
//! - A [`Device`] is the registry. It is created from a [`Driver`](driver::Driver), which supplies
//!   the data the engine cannot derive by itself (memory types, format features, limits, memory
//!   requirements of resources), and from a [`DeviceCreateInfo`](device::DeviceCreateInfo) that
//!   fixes the enabled features and extensions once and for all.
//!
//! - Every object created through the device is identified by an [`Id`]. Ids are generation
//!   checked, so an id that outlives its object, or that belongs to another device, is detected
//!   instead of being dereferenced.
//!
//! - Each operation comes in three flavours: `validate_*` checks an operation without changing
//!   any state, `record_*` applies the state change of an operation that the driver executed, and
//!   the plain method does both and reports the outcome.
//!
//! - The [`Dispatcher`] is the interception front end. It decodes raw call arguments
//!   ([`ApiCall`]), runs the stateless parameter checks of the [`validate`] module, and forwards
//!   to the stateful checks on the device. Its [`Verdict`] tells the caller whether the driver
//!   call may be forwarded.
//!
//! - Verdicts are delivered to a [`Reporter`]. Each report carries a stable identifier (the VUID
//!   of the violated rule) that can be matched exactly.

pub use crate::{
    device::Device,
    dispatch::{ApiCall, CallAction, CallOutput, Dispatcher, Verdict},
    handle::{Id, InvalidHandleError},
    report::{Report, Reporter, Severity},
};
pub use ash::vk::DeviceSize;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{Debug, Display, Error as FmtError, Formatter},
};

#[macro_use]
mod tests;
#[macro_use]
mod macros;
pub mod binding;
pub mod buffer;
pub mod command_buffer;
pub mod descriptor_set;
pub mod device;
pub mod dispatch;
pub mod driver;
pub mod format;
pub mod handle;
pub mod image;
pub mod memory;
pub mod object;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod report;
pub mod sampler;
pub mod sync;
pub mod validate;

/// The identifier that is reported for violations that have no VUID of their own.
pub const UNASSIGNED_VUID: &str = "UNASSIGNED-CoreValidation";

/// Which class of rule a [`ValidationError`] belongs to.
///
/// The class decides what happens to the intercepted call: parameter errors and refused
/// destructions suppress the driver call, state errors let it through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// The arguments of the call are malformed, independently of any object state.
    Parameter,

    /// The objects exist, but their current state forbids the operation.
    #[default]
    State,

    /// An object is used after its destruction, or destroyed while it is still in use.
    Lifetime,
}

/// The arguments or other context of a call did not satisfy the valid usage rules of the API.
#[derive(Clone)]
pub struct ValidationError {
    /// The context in which the problem exists (e.g. a specific parameter).
    pub context: Cow<'static, str>,

    /// A description of the problem.
    pub problem: Cow<'static, str>,

    /// If applicable, settings that the user could enable to avoid the problem in the future.
    pub requires_one_of: RequiresOneOf,

    /// *Valid Usage IDs* (VUIDs) in the Vulkan specification that relate to the problem.
    pub vuids: &'static [&'static str],

    /// The class of rule that was violated.
    pub kind: ValidationErrorKind,

    pub _ne: NonExhaustive,
}

impl Default for ValidationError {
    #[inline]
    fn default() -> Self {
        ValidationError {
            context: Cow::Borrowed(""),
            problem: Cow::Borrowed(""),
            requires_one_of: RequiresOneOf::default(),
            vuids: &[],
            kind: ValidationErrorKind::default(),
            _ne: NonExhaustive(()),
        }
    }
}

impl ValidationError {
    pub(crate) fn from_error<E: Error>(error: E) -> Self {
        Self {
            context: "".into(),
            problem: error.to_string().into(),
            ..Default::default()
        }
    }

    fn prepend_context(&mut self, context: impl Into<Cow<'static, str>>) {
        if self.context.is_empty() {
            self.context = context.into();
        } else {
            self.context = format!("{}.{}", context.into(), self.context).into();
        }
    }

    /// Prepends `context` to the current context, separated by a dot.
    pub(crate) fn add_context(
        mut self: Box<Self>,
        context: impl Into<Cow<'static, str>>,
    ) -> Box<Self> {
        self.prepend_context(context);

        self
    }

    pub(crate) fn set_vuids(mut self: Box<Self>, vuids: &'static [&'static str]) -> Box<Self> {
        self.vuids = vuids;

        self
    }

    pub(crate) fn set_kind(mut self: Box<Self>, kind: ValidationErrorKind) -> Box<Self> {
        self.kind = kind;

        self
    }

    /// Returns the stable identifier of the violated rule.
    ///
    /// This is the first VUID, or [`UNASSIGNED_VUID`] if the error has none.
    #[inline]
    pub fn vuid(&self) -> &'static str {
        self.vuids.first().copied().unwrap_or(UNASSIGNED_VUID)
    }

    /// Returns whether `vuid` is one of the VUIDs of this error.
    #[inline]
    pub fn is(&self, vuid: &str) -> bool {
        self.vuids.contains(&vuid)
    }
}

impl Debug for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        Display::fmt(self, f)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)?;
        } else {
            write!(f, "{}: {}", self.context, self.problem)?;
        }

        if !self.requires_one_of.is_empty() {
            if self.context.is_empty() && self.problem.is_empty() {
                write!(f, "{}", self.requires_one_of)?;
            } else {
                write!(f, " -- {}", self.requires_one_of)?;
            }
        }

        if !self.vuids.is_empty() {
            write!(f, " (Vulkan VUIDs: {}", self.vuids[0])?;

            for vuid in &self.vuids[1..] {
                write!(f, ", {}", vuid)?;
            }

            write!(f, ")")?;
        }

        Ok(())
    }
}

impl Error for ValidationError {}

/// Used in errors to indicate a set of alternatives that needs to be available/enabled to allow
/// a given operation.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiresOneOf(pub &'static [RequiresAllOf]);

impl RequiresOneOf {
    /// Returns the number of alternatives.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are any alternatives.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether `device` enables everything in at least one of the alternatives.
    pub(crate) fn is_met(&self, device: &Device) -> bool {
        let is_enabled = |requires: &Requires| match *requires {
            Requires::DeviceFeature(name) => {
                device.enabled_features().names().any(|enabled| enabled == name)
            }
            Requires::DeviceExtension(name) => {
                device.enabled_extensions().names().any(|enabled| enabled == name)
            }
        };

        self.0
            .iter()
            .any(|all_of| all_of.0.iter().all(|requires| is_enabled(requires)))
    }
}

impl Debug for RequiresOneOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        Display::fmt(self, f)
    }
}

impl Display for RequiresOneOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "requires one of: ")?;

        if let Some((first, rest)) = self.0.split_first() {
            if first.0.len() > 1 {
                write!(f, "({})", first)?;
            } else {
                write!(f, "{}", first)?;
            }

            for rest in rest {
                if rest.0.len() > 1 {
                    write!(f, " or ({})", rest)?;
                } else {
                    write!(f, " or {}", rest)?;
                }
            }
        }

        Ok(())
    }
}

/// Used in errors to indicate a set of requirements that all need to be available/enabled to
/// allow a given operation.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiresAllOf(pub &'static [Requires]);

impl Debug for RequiresAllOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        Display::fmt(self, f)
    }
}

impl Display for RequiresAllOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if let Some((first, rest)) = self.0.split_first() {
            write!(f, "{}", first)?;

            for rest in rest {
                write!(f, " and {}", rest)?;
            }
        }

        Ok(())
    }
}

/// Something that needs to be supported or enabled to allow a particular operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requires {
    DeviceFeature(&'static str),
    DeviceExtension(&'static str),
}

impl Display for Requires {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Requires::DeviceFeature(device_feature) => {
                write!(f, "device feature `{}`", device_feature)
            }
            Requires::DeviceExtension(device_extension) => {
                write!(f, "device extension `{}`", device_extension)
            }
        }
    }
}

/// A wrapper for error types of functions that can return validation errors.
#[derive(Clone)]
pub enum Validated<E> {
    /// A non-validation error occurred.
    Error(E),

    /// A validation error occurred.
    ValidationError(Box<ValidationError>),
}

impl<E> Validated<E> {
    /// Maps the inner `Error` value using the provided function, or does nothing if the value is
    /// `ValidationError`.
    #[inline]
    pub fn map<F>(self, f: impl FnOnce(E) -> F) -> Validated<F> {
        match self {
            Self::Error(err) => Validated::Error(f(err)),
            Self::ValidationError(err) => Validated::ValidationError(err),
        }
    }

    #[inline]
    fn map_validation(self, f: impl FnOnce(Box<ValidationError>) -> Box<ValidationError>) -> Self {
        match self {
            Self::Error(err) => Self::Error(err),
            Self::ValidationError(err) => Self::ValidationError(f(err)),
        }
    }

    /// Returns the inner `Error` value, or panics if it contains `ValidationError`.
    #[inline(always)]
    #[track_caller]
    pub fn unwrap(self) -> E {
        match self {
            Self::Error(err) => err,
            Self::ValidationError(err) => {
                panic!(
                    "called `Validated::unwrap` on a `ValidationError` value: {:?}",
                    err
                )
            }
        }
    }

    /// Returns the inner validation error, if any.
    #[inline]
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            Self::Error(_) => None,
            Self::ValidationError(err) => Some(err),
        }
    }
}

impl<E> Error for Validated<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Error(err) => Some(err),
            Self::ValidationError(err) => Some(err),
        }
    }
}

impl<E> Display for Validated<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(_) => write!(f, "a non-validation error occurred"),
            Self::ValidationError(_) => write!(f, "a validation error occurred"),
        }
    }
}

impl<E> Debug for Validated<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(err) => write!(f, "a non-validation error occurred: {err}"),
            Self::ValidationError(err) => {
                write!(f, "a validation error occurred\n\nCaused by:\n    {err:?}")
            }
        }
    }
}

impl<E> From<Box<ValidationError>> for Validated<E> {
    #[inline]
    fn from(err: Box<ValidationError>) -> Self {
        Self::ValidationError(err)
    }
}

/// An error that the driver, or the engine standing in for it, produced for a call that passed
/// validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VulkanError {
    OutOfHostMemory,
    OutOfDeviceMemory,
    TooManyObjects,
    OutOfPoolMemory,
    ValidationFailed,
    Unnamed(ash::vk::Result),
}

impl From<ash::vk::Result> for VulkanError {
    fn from(val: ash::vk::Result) -> VulkanError {
        match val {
            ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::OutOfHostMemory,
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Self::OutOfDeviceMemory,
            ash::vk::Result::ERROR_TOO_MANY_OBJECTS => Self::TooManyObjects,
            ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY => Self::OutOfPoolMemory,
            ash::vk::Result::ERROR_VALIDATION_FAILED_EXT => Self::ValidationFailed,
            _ => Self::Unnamed(val),
        }
    }
}

impl From<VulkanError> for ash::vk::Result {
    fn from(val: VulkanError) -> ash::vk::Result {
        match val {
            VulkanError::OutOfHostMemory => ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            VulkanError::OutOfDeviceMemory => ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            VulkanError::TooManyObjects => ash::vk::Result::ERROR_TOO_MANY_OBJECTS,
            VulkanError::OutOfPoolMemory => ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            VulkanError::ValidationFailed => ash::vk::Result::ERROR_VALIDATION_FAILED_EXT,
            VulkanError::Unnamed(result) => result,
        }
    }
}

impl Error for VulkanError {}

impl Display for VulkanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            VulkanError::OutOfHostMemory => write!(f, "a host memory allocation has failed"),
            VulkanError::OutOfDeviceMemory => write!(f, "a device memory allocation has failed"),
            VulkanError::TooManyObjects => write!(
                f,
                "too many objects of the type have already been created",
            ),
            VulkanError::OutOfPoolMemory => write!(f, "a pool memory allocation has failed"),
            VulkanError::ValidationFailed => write!(f, "validation failed"),
            VulkanError::Unnamed(result) => {
                write!(f, "unnamed error, VkResult value {}", result.as_raw())
            }
        }
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NonExhaustive(pub(crate) ());
