// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Type-erased references to tracked objects, and the trait every object record implements.

use crate::{
    device::Device,
    handle::{HandleTable, Id},
};
use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// The kind of an object tracked by a device.
///
/// The discriminant is the tag that is stored in the generation of every handle of this type,
/// which is how a handle of the wrong type is told apart from a stale one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObjectType {
    Queue = 1,
    DeviceMemory = 2,
    Buffer = 3,
    BufferView = 4,
    Image = 5,
    ImageView = 6,
    Sampler = 7,
    Fence = 8,
    Semaphore = 9,
    Event = 10,
    QueryPool = 11,
    CommandPool = 12,
    CommandBuffer = 13,
    DescriptorSetLayout = 14,
    DescriptorPool = 15,
    DescriptorSet = 16,
    Pipeline = 17,
}

impl ObjectType {
    pub(crate) const fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => Self::Queue,
            2 => Self::DeviceMemory,
            3 => Self::Buffer,
            4 => Self::BufferView,
            5 => Self::Image,
            6 => Self::ImageView,
            7 => Self::Sampler,
            8 => Self::Fence,
            9 => Self::Semaphore,
            10 => Self::Event,
            11 => Self::QueryPool,
            12 => Self::CommandPool,
            13 => Self::CommandBuffer,
            14 => Self::DescriptorSetLayout,
            15 => Self::DescriptorPool,
            16 => Self::DescriptorSet,
            17 => Self::Pipeline,
            _ => return None,
        })
    }

    #[inline]
    pub(crate) const fn tag(self) -> u32 {
        self as u32
    }

    /// Returns the name of the API type, as it appears in messages.
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Queue => "VkQueue",
            Self::DeviceMemory => "VkDeviceMemory",
            Self::Buffer => "VkBuffer",
            Self::BufferView => "VkBufferView",
            Self::Image => "VkImage",
            Self::ImageView => "VkImageView",
            Self::Sampler => "VkSampler",
            Self::Fence => "VkFence",
            Self::Semaphore => "VkSemaphore",
            Self::Event => "VkEvent",
            Self::QueryPool => "VkQueryPool",
            Self::CommandPool => "VkCommandPool",
            Self::CommandBuffer => "VkCommandBuffer",
            Self::DescriptorSetLayout => "VkDescriptorSetLayout",
            Self::DescriptorPool => "VkDescriptorPool",
            Self::DescriptorSet => "VkDescriptorSet",
            Self::Pipeline => "VkPipeline",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl From<ObjectType> for ash::vk::ObjectType {
    fn from(val: ObjectType) -> Self {
        match val {
            ObjectType::Queue => ash::vk::ObjectType::QUEUE,
            ObjectType::DeviceMemory => ash::vk::ObjectType::DEVICE_MEMORY,
            ObjectType::Buffer => ash::vk::ObjectType::BUFFER,
            ObjectType::BufferView => ash::vk::ObjectType::BUFFER_VIEW,
            ObjectType::Image => ash::vk::ObjectType::IMAGE,
            ObjectType::ImageView => ash::vk::ObjectType::IMAGE_VIEW,
            ObjectType::Sampler => ash::vk::ObjectType::SAMPLER,
            ObjectType::Fence => ash::vk::ObjectType::FENCE,
            ObjectType::Semaphore => ash::vk::ObjectType::SEMAPHORE,
            ObjectType::Event => ash::vk::ObjectType::EVENT,
            ObjectType::QueryPool => ash::vk::ObjectType::QUERY_POOL,
            ObjectType::CommandPool => ash::vk::ObjectType::COMMAND_POOL,
            ObjectType::CommandBuffer => ash::vk::ObjectType::COMMAND_BUFFER,
            ObjectType::DescriptorSetLayout => ash::vk::ObjectType::DESCRIPTOR_SET_LAYOUT,
            ObjectType::DescriptorPool => ash::vk::ObjectType::DESCRIPTOR_POOL,
            ObjectType::DescriptorSet => ash::vk::ObjectType::DESCRIPTOR_SET,
            ObjectType::Pipeline => ash::vk::ObjectType::PIPELINE,
        }
    }
}

/// A type-erased reference to an object of a device: its type and its raw handle.
///
/// This is what in-use sets and reports store. It holds no ownership of the object; whether the
/// object still exists is determined by looking the handle up again.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub handle: u64,
}

impl ObjectRef {
    /// Returns the typed id, if `self` refers to an object of type `T`.
    #[inline]
    pub fn downcast<T: Object>(self) -> Option<Id<T>> {
        (self.object_type == T::TYPE).then(|| Id::from_raw(self.handle))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:#018x}", self.object_type, self.handle)
    }
}

impl<T: Object> From<Id<T>> for ObjectRef {
    #[inline]
    fn from(id: Id<T>) -> Self {
        id.erase()
    }
}

/// The number of pending submissions that reference an object.
///
/// An object whose counter is non-zero must not be destroyed, freed or reset.
#[derive(Debug, Default)]
pub struct UseCount(AtomicU32);

impl UseCount {
    #[inline]
    pub(crate) fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn decrement(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
    }

    /// Returns the current number of references.
    #[inline]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Returns whether any pending submission references the object.
    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.get() != 0
    }
}

/// An object record stored in one of the handle tables of a [`Device`].
pub trait Object: Send + Sync + Sized + 'static {
    /// The type of the object.
    const TYPE: ObjectType;

    /// Returns the table of `device` that holds objects of this type.
    fn table(device: &Device) -> &HandleTable<Self>;

    /// Returns the in-use counter of the object.
    fn use_count(&self) -> &UseCount;
}

/// The part of an object record that submissions need, independent of the object type.
pub trait Tracked: Send + Sync {
    fn uses(&self) -> &UseCount;
}

impl<T: Object> Tracked for T {
    #[inline]
    fn uses(&self) -> &UseCount {
        Object::use_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectRef, ObjectType, UseCount};

    #[test]
    fn tags_round_trip() {
        for tag in 1..=17 {
            let object_type = ObjectType::from_tag(tag).unwrap();
            assert_eq!(object_type.tag(), tag);
        }

        assert_eq!(ObjectType::from_tag(0), None);
        assert_eq!(ObjectType::from_tag(18), None);
    }

    #[test]
    fn display() {
        let object = ObjectRef {
            object_type: ObjectType::Buffer,
            handle: 0x1_0300_0001,
        };

        assert_eq!(object.to_string(), "VkBuffer 0x0000000103000001");
    }

    #[test]
    fn use_count_saturates() {
        let count = UseCount::default();
        count.decrement();
        assert_eq!(count.get(), 0);

        count.increment();
        count.increment();
        assert!(count.is_in_use());
        count.decrement();
        count.decrement();
        assert!(!count.is_in_use());
    }
}
