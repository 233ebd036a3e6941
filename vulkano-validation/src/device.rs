// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The device context: the registry of every object that the device owns.
//!
//! A [`Device`] is created once from a [`Driver`] and a [`DeviceCreateInfo`]. The features and
//! extensions enabled at that point never change afterward, so validators query them as plain
//! booleans.
//!
//! Each device has its own handle namespace. Handles carry a tag of the device that created
//! them, which is how a handle of another device is recognized as foreign instead of being
//! looked up.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vulkano_validation::{
//!     device::{DeviceCreateInfo, QueueCreateInfo},
//!     driver::StaticDriver,
//!     Device,
//! };
//!
//! let device = Device::new(
//!     Arc::new(StaticDriver::default()),
//!     DeviceCreateInfo {
//!         queue_create_infos: vec![QueueCreateInfo {
//!             queue_family_index: 0,
//!             ..Default::default()
//!         }],
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//!
//! let queue = device.queue(0, 0).unwrap();
//! ```

use crate::{
    buffer::{Buffer, BufferView},
    command_buffer::{CommandBuffer, CommandPool},
    descriptor_set::{DescriptorPool, DescriptorSet, DescriptorSetLayout},
    driver::{DeviceProperties, Driver},
    format::{Format, FormatProperties},
    handle::{HandleTable, Id, InvalidHandleError},
    image::{Image, ImageView},
    memory::{DeviceMemory, MemoryProperties},
    object::{Object, ObjectRef, ObjectType, Tracked},
    pipeline::Pipeline,
    query::QueryPool,
    queue::{Queue, QueueFamilyProperties},
    report::{Report, Reporter, TracingReporter},
    sampler::Sampler,
    sync::{event::Event, fence::Fence, semaphore::Semaphore},
    ValidationError, ValidationErrorKind,
};
use foldhash::HashSet;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

macro_rules! device_flags {
    {
        $(#[doc = $ty_doc:literal])*
        $ty:ident = $kind:literal;

        $(
            $(#[doc = $member_doc:literal])*
            $member:ident,
        )+
    } => {
        $(#[doc = $ty_doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $ty {
            $(
                $(#[doc = $member_doc])*
                pub $member: bool,
            )+
            pub _ne: crate::NonExhaustive,
        }

        impl Default for $ty {
            #[inline]
            fn default() -> Self {
                Self::empty()
            }
        }

        impl $ty {
            #[doc = concat!("Returns a `", stringify!($ty), "` with none of the members set.")]
            #[inline]
            pub const fn empty() -> Self {
                Self {
                    $($member: false,)+
                    _ne: crate::NonExhaustive(()),
                }
            }

            #[doc = concat!("Returns a `", stringify!($ty), "` with all of the members set.")]
            #[inline]
            pub const fn all() -> Self {
                Self {
                    $($member: true,)+
                    _ne: crate::NonExhaustive(()),
                }
            }

            /// Returns whether all members set in `other` are also set in `self`.
            #[inline]
            pub const fn contains(&self, other: &Self) -> bool {
                $((self.$member || !other.$member))&&+
            }

            /// Returns the members set in `self` but not in `other`.
            #[inline]
            pub const fn difference(&self, other: &Self) -> Self {
                Self {
                    $($member: self.$member && !other.$member,)+
                    _ne: crate::NonExhaustive(()),
                }
            }

            /// Returns the names of the members that are set.
            pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
                [$((stringify!($member), self.$member)),+]
                    .into_iter()
                    .filter_map(|(name, enabled)| enabled.then_some(name))
            }

            fn validate_supported(&self, supported: &Self) -> Result<(), Box<ValidationError>> {
                if let Some(name) = self.difference(supported).names().next() {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            concat!("contains the ", $kind, " `{}`, which is not supported by \
                            the physical device"),
                            name,
                        )
                        .into(),
                        kind: ValidationErrorKind::Parameter,
                        ..Default::default()
                    }));
                }

                Ok(())
            }
        }
    };
}

device_flags! {
    /// The optional features of a device.
    DeviceFeatures = "feature";

    /// Allows creating samplers with anisotropic filtering.
    sampler_anisotropy,

    /// Allows creating sparse buffers and images.
    sparse_binding,

    sparse_residency_buffer,
    sparse_residency_image2_d,
    sparse_residency_aliased,

    /// Allows resetting queries from the host.
    host_query_reset,

    /// Allows creating pipeline statistics query pools.
    pipeline_statistics_query,

    /// Allows creating cube array image views.
    image_cube_array,

    sampler_ycbcr_conversion,
}

device_flags! {
    /// The extensions that can be enabled on a device.
    DeviceExtensions = "extension";

    khr_external_semaphore_fd,
    khr_external_fence_fd,
    khr_external_memory_fd,
    khr_dedicated_allocation,
    khr_sampler_ycbcr_conversion,
}

/// Parameters to create a new `Device`.
#[derive(Clone, Debug)]
pub struct DeviceCreateInfo {
    /// The features to enable on the device.
    ///
    /// The default value is [`DeviceFeatures::empty()`].
    pub enabled_features: DeviceFeatures,

    /// The extensions to enable on the device.
    ///
    /// The default value is [`DeviceExtensions::empty()`].
    pub enabled_extensions: DeviceExtensions,

    /// The queues to create with the device. At least one queue must be requested.
    ///
    /// The default value is empty, which must be overridden.
    pub queue_create_infos: Vec<QueueCreateInfo>,

    /// Where the findings of the device are delivered.
    ///
    /// The default value is `None`, which reports through `tracing`.
    pub reporter: Option<Arc<dyn Reporter>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        DeviceCreateInfo {
            enabled_features: DeviceFeatures::empty(),
            enabled_extensions: DeviceExtensions::empty(),
            queue_create_infos: Vec::new(),
            reporter: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DeviceCreateInfo {
    pub(crate) fn validate(&self, driver: &dyn Driver) -> Result<(), Box<ValidationError>> {
        let Self {
            enabled_features,
            enabled_extensions,
            queue_create_infos,
            reporter: _,
            _ne: _,
        } = self;

        if queue_create_infos.is_empty() {
            return Err(Box::new(ValidationError {
                context: "queue_create_infos".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDeviceCreateInfo-queueCreateInfoCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        let queue_family_properties = driver.queue_family_properties();
        let mut queue_family_indices = HashSet::default();

        for (index, queue_create_info) in queue_create_infos.iter().enumerate() {
            queue_create_info
                .validate(queue_family_properties)
                .map_err(|err| err.add_context(format!("queue_create_infos[{}]", index)))?;

            if !queue_family_indices.insert(queue_create_info.queue_family_index) {
                return Err(Box::new(ValidationError {
                    context: "queue_create_infos".into(),
                    problem: format!(
                        "the queue family index in element {} is also used in an earlier \
                        element",
                        index,
                    )
                    .into(),
                    vuids: &["VUID-VkDeviceCreateInfo-queueFamilyIndex-02802"],
                    ..Default::default()
                }));
            }
        }

        enabled_features
            .validate_supported(driver.supported_features())
            .map_err(|err| err.add_context("enabled_features"))?;
        enabled_extensions
            .validate_supported(driver.supported_extensions())
            .map_err(|err| err.add_context("enabled_extensions"))?;

        Ok(())
    }
}

/// Parameters to create queues in a new `Device`.
#[derive(Clone, Debug)]
pub struct QueueCreateInfo {
    /// The index of the queue family to create queues for.
    ///
    /// The default value is `0`.
    pub queue_family_index: u32,

    /// The queues to create for the given queue family, each with a relative priority.
    ///
    /// The default value is a single queue with a priority of `0.5`.
    pub queues: Vec<f32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for QueueCreateInfo {
    #[inline]
    fn default() -> Self {
        QueueCreateInfo {
            queue_family_index: 0,
            queues: vec![0.5],
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl QueueCreateInfo {
    fn validate(
        &self,
        queue_family_properties: &[QueueFamilyProperties],
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            queue_family_index,
            ref queues,
            _ne: _,
        } = self;

        let Some(family_properties) = queue_family_properties.get(queue_family_index as usize)
        else {
            return Err(Box::new(ValidationError {
                context: "queue_family_index".into(),
                problem: "is not less than the number of queue families in the physical device"
                    .into(),
                vuids: &["VUID-VkDeviceQueueCreateInfo-queueFamilyIndex-00381"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        };

        if queues.is_empty() {
            return Err(Box::new(ValidationError {
                context: "queues".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDeviceQueueCreateInfo-queueCount-arraylength"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if queues.len() > family_properties.queue_count as usize {
            return Err(Box::new(ValidationError {
                problem: "the length of `queues` is greater than the number of queues in the \
                    queue family indicated by `queue_family_index`"
                    .into(),
                vuids: &["VUID-VkDeviceQueueCreateInfo-queueCount-00382"],
                ..Default::default()
            }));
        }

        for (index, &priority) in queues.iter().enumerate() {
            if !(0.0..=1.0).contains(&priority) {
                return Err(Box::new(ValidationError {
                    context: format!("queues[{}]", index).into(),
                    problem: "is not between 0.0 and 1.0 inclusive".into(),
                    vuids: &["VUID-VkDeviceQueueCreateInfo-pQueuePriorities-00383"],
                    kind: ValidationErrorKind::Parameter,
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// The handle tables of a device, one per object type.
#[derive(Debug)]
pub(crate) struct Objects {
    pub(crate) queues: HandleTable<Queue>,
    pub(crate) memories: HandleTable<DeviceMemory>,
    pub(crate) buffers: HandleTable<Buffer>,
    pub(crate) buffer_views: HandleTable<BufferView>,
    pub(crate) images: HandleTable<Image>,
    pub(crate) image_views: HandleTable<ImageView>,
    pub(crate) samplers: HandleTable<Sampler>,
    pub(crate) fences: HandleTable<Fence>,
    pub(crate) semaphores: HandleTable<Semaphore>,
    pub(crate) events: HandleTable<Event>,
    pub(crate) query_pools: HandleTable<QueryPool>,
    pub(crate) command_pools: HandleTable<CommandPool>,
    pub(crate) command_buffers: HandleTable<CommandBuffer>,
    pub(crate) descriptor_set_layouts: HandleTable<DescriptorSetLayout>,
    pub(crate) descriptor_pools: HandleTable<DescriptorPool>,
    pub(crate) descriptor_sets: HandleTable<DescriptorSet>,
    pub(crate) pipelines: HandleTable<Pipeline>,
}

impl Objects {
    fn new(tag: u8) -> Self {
        Objects {
            queues: HandleTable::new(tag),
            memories: HandleTable::new(tag),
            buffers: HandleTable::new(tag),
            buffer_views: HandleTable::new(tag),
            images: HandleTable::new(tag),
            image_views: HandleTable::new(tag),
            samplers: HandleTable::new(tag),
            fences: HandleTable::new(tag),
            semaphores: HandleTable::new(tag),
            events: HandleTable::new(tag),
            query_pools: HandleTable::new(tag),
            command_pools: HandleTable::new(tag),
            command_buffers: HandleTable::new(tag),
            descriptor_set_layouts: HandleTable::new(tag),
            descriptor_pools: HandleTable::new(tag),
            descriptor_sets: HandleTable::new(tag),
            pipelines: HandleTable::new(tag),
        }
    }
}

/// The device tag of the next device. Tags are handed out round-robin in `1..=255`, so that a
/// zero tag never occurs in a valid handle.
static NEXT_DEVICE_TAG: AtomicU32 = AtomicU32::new(0);

fn next_device_tag() -> u8 {
    (NEXT_DEVICE_TAG.fetch_add(1, Ordering::Relaxed) % 255 + 1) as u8
}

/// A logical device, and the registry of the objects created on it.
pub struct Device {
    tag: u8,
    driver: Arc<dyn Driver>,
    reporter: Arc<dyn Reporter>,
    enabled_features: DeviceFeatures,
    enabled_extensions: DeviceExtensions,
    queues: Vec<(u32, u32, Id<Queue>)>,
    pub(crate) objects: Objects,
}

impl Device {
    /// Creates a new `Device`, together with the queues that `create_info` requests.
    pub fn new(
        driver: Arc<dyn Driver>,
        create_info: DeviceCreateInfo,
    ) -> Result<Arc<Device>, Box<ValidationError>> {
        let reporter = create_info
            .reporter
            .clone()
            .unwrap_or_else(|| Arc::new(TracingReporter));

        if let Err(err) = create_info.validate(&*driver) {
            let err = err.add_context("create_info");
            reporter.report(&Report::error(&err));

            return Err(err);
        }

        let DeviceCreateInfo {
            enabled_features,
            enabled_extensions,
            queue_create_infos,
            reporter: _,
            _ne: _,
        } = create_info;

        let tag = next_device_tag();
        let objects = Objects::new(tag);
        let mut queues = Vec::new();

        for queue_create_info in &queue_create_infos {
            let family_index = queue_create_info.queue_family_index;

            for queue_index in 0..queue_create_info.queues.len() as u32 {
                let queue = objects
                    .queues
                    .register(Queue::new(family_index, queue_index));
                queues.push((family_index, queue_index, queue));
            }
        }

        tracing::debug!(tag, queues = queues.len(), "created device");

        Ok(Arc::new(Device {
            tag,
            driver,
            reporter,
            enabled_features,
            enabled_extensions,
            queues,
            objects,
        }))
    }

    /// Returns the tag that the handles of this device carry.
    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Returns the driver that the device queries.
    #[inline]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Returns the features that are enabled on the device.
    #[inline]
    pub fn enabled_features(&self) -> &DeviceFeatures {
        &self.enabled_features
    }

    /// Returns the extensions that are enabled on the device.
    #[inline]
    pub fn enabled_extensions(&self) -> &DeviceExtensions {
        &self.enabled_extensions
    }

    #[inline]
    pub fn properties(&self) -> &DeviceProperties {
        self.driver.properties()
    }

    #[inline]
    pub fn memory_properties(&self) -> &MemoryProperties {
        self.driver.memory_properties()
    }

    #[inline]
    pub fn queue_family_properties(&self) -> &[QueueFamilyProperties] {
        self.driver.queue_family_properties()
    }

    #[inline]
    pub fn format_properties(&self, format: Format) -> FormatProperties {
        self.driver.format_properties(format)
    }

    /// Returns the queue with the given index in the given queue family, if it was created with
    /// the device.
    pub fn queue(&self, queue_family_index: u32, queue_index: u32) -> Option<Id<Queue>> {
        self.queues
            .iter()
            .find(|&&(family, index, _)| family == queue_family_index && index == queue_index)
            .map(|&(_, _, queue)| queue)
    }

    /// Returns all queues of the device.
    pub fn queues(&self) -> impl ExactSizeIterator<Item = Id<Queue>> + '_ {
        self.queues.iter().map(|&(_, _, queue)| queue)
    }

    /// Looks up the record of an object of this device.
    #[inline]
    pub fn get<T: Object>(&self, id: Id<T>) -> Result<Arc<T>, InvalidHandleError> {
        T::table(self).get(id)
    }

    /// Looks up the record of an object that is passed as the parameter `context` of a call.
    #[inline]
    pub(crate) fn lookup<T: Object>(
        &self,
        id: Id<T>,
        context: &'static str,
        vuids: &'static [&'static str],
    ) -> Result<Arc<T>, Box<ValidationError>> {
        T::table(self)
            .get(id)
            .map_err(|err| err.into_validation_error(context, vuids))
    }

    /// Looks up the record of a type-erased object, if it is still alive.
    pub(crate) fn tracked(&self, object: ObjectRef) -> Option<Arc<dyn Tracked>> {
        fn get<T: Object>(device: &Device, object: ObjectRef) -> Option<Arc<dyn Tracked>> {
            let id = object.downcast::<T>()?;

            T::table(device)
                .get(id)
                .ok()
                .map(|record| record as Arc<dyn Tracked>)
        }

        match object.object_type {
            ObjectType::Queue => get::<Queue>(self, object),
            ObjectType::DeviceMemory => get::<DeviceMemory>(self, object),
            ObjectType::Buffer => get::<Buffer>(self, object),
            ObjectType::BufferView => get::<BufferView>(self, object),
            ObjectType::Image => get::<Image>(self, object),
            ObjectType::ImageView => get::<ImageView>(self, object),
            ObjectType::Sampler => get::<Sampler>(self, object),
            ObjectType::Fence => get::<Fence>(self, object),
            ObjectType::Semaphore => get::<Semaphore>(self, object),
            ObjectType::Event => get::<Event>(self, object),
            ObjectType::QueryPool => get::<QueryPool>(self, object),
            ObjectType::CommandPool => get::<CommandPool>(self, object),
            ObjectType::CommandBuffer => get::<CommandBuffer>(self, object),
            ObjectType::DescriptorSetLayout => get::<DescriptorSetLayout>(self, object),
            ObjectType::DescriptorPool => get::<DescriptorPool>(self, object),
            ObjectType::DescriptorSet => get::<DescriptorSet>(self, object),
            ObjectType::Pipeline => get::<Pipeline>(self, object),
        }
    }

    /// Returns whether `object` refers to a live object of this device.
    #[inline]
    pub fn is_alive(&self, object: ObjectRef) -> bool {
        self.tracked(object).is_some()
    }

    /// Returns the reporter that findings are delivered to.
    #[inline]
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    pub(crate) fn report_error(&self, error: &ValidationError) {
        self.reporter.report(&Report::error(error));
    }

    pub(crate) fn report_warning(
        &self,
        vuid: &'static str,
        message: impl Into<String>,
        objects: &[ObjectRef],
    ) {
        self.reporter
            .report(&Report::warning(vuid, message, objects));
    }

    /// Reports the error of `result`, if any, and passes it through.
    #[inline]
    pub(crate) fn reported<T>(
        &self,
        result: Result<T, Box<ValidationError>>,
    ) -> Result<T, Box<ValidationError>> {
        if let Err(err) = &result {
            self.report_error(err);
        }

        result
    }

    /// Tears down the device.
    ///
    /// Every object that is still alive at this point was leaked by the application, and is
    /// reported. The records of all objects are dropped afterward; handles of this device are
    /// invalid from then on.
    pub fn destroy(&self) -> Result<(), Box<ValidationError>> {
        let result = self.validate_destroy();
        self.record_destroy();

        result
    }

    pub fn validate_destroy(&self) -> Result<(), Box<ValidationError>> {
        let mut leaked = Vec::new();

        fn collect<T: Object>(table: &HandleTable<T>, leaked: &mut Vec<ObjectRef>) {
            leaked.extend(table.snapshot().into_iter().map(|(id, _)| id.erase()));
        }

        let objects = &self.objects;
        collect(&objects.memories, &mut leaked);
        collect(&objects.buffers, &mut leaked);
        collect(&objects.buffer_views, &mut leaked);
        collect(&objects.images, &mut leaked);
        collect(&objects.image_views, &mut leaked);
        collect(&objects.samplers, &mut leaked);
        collect(&objects.fences, &mut leaked);
        collect(&objects.semaphores, &mut leaked);
        collect(&objects.events, &mut leaked);
        collect(&objects.query_pools, &mut leaked);
        collect(&objects.command_pools, &mut leaked);
        collect(&objects.descriptor_set_layouts, &mut leaked);
        collect(&objects.descriptor_pools, &mut leaked);
        collect(&objects.pipelines, &mut leaked);

        let mut first_error = None;

        for object in leaked {
            let err = Box::new(ValidationError {
                problem: format!(
                    "{} has not been destroyed before the device",
                    object,
                )
                .into(),
                vuids: &["VUID-vkDestroyDevice-device-00378"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            });
            self.reporter
                .report(&Report::error(&err).with_objects(&[object]));
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn record_destroy(&self) {
        let objects = &self.objects;
        objects.command_buffers.clear();
        objects.command_pools.clear();
        objects.descriptor_sets.clear();
        objects.descriptor_pools.clear();
        objects.descriptor_set_layouts.clear();
        objects.pipelines.clear();
        objects.query_pools.clear();
        objects.events.clear();
        objects.semaphores.clear();
        objects.fences.clear();
        objects.samplers.clear();
        objects.image_views.clear();
        objects.images.clear();
        objects.buffer_views.clear();
        objects.buffers.clear();
        objects.memories.clear();
        objects.queues.clear();

        tracing::debug!(tag = self.tag, "destroyed device");
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("tag", &self.tag)
            .field("driver", &self.driver)
            .field("enabled_features", &self.enabled_features)
            .field("enabled_extensions", &self.enabled_extensions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, DeviceCreateInfo, DeviceFeatures, QueueCreateInfo};
    use crate::{
        driver::StaticDriver, memory::MemoryAllocateInfo, report::ReportLog,
        tests::uniform_buffer_info,
    };
    use std::sync::Arc;

    fn create(create_info: DeviceCreateInfo) -> Result<Arc<Device>, Box<crate::ValidationError>> {
        Device::new(Arc::new(StaticDriver::default()), create_info)
    }

    #[test]
    fn queues_created() {
        let device = create(DeviceCreateInfo {
            queue_create_infos: vec![
                QueueCreateInfo {
                    queue_family_index: 0,
                    queues: vec![1.0, 0.5],
                    ..Default::default()
                },
                QueueCreateInfo {
                    queue_family_index: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(device.queues().len(), 3);
        assert!(device.queue(0, 1).is_some());
        assert!(device.queue(1, 0).is_some());
        assert!(device.queue(1, 1).is_none());
    }

    #[test]
    fn too_many_queues() {
        let err = create(DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index: 1,
                queues: vec![0.5, 0.5],
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.is("VUID-VkDeviceQueueCreateInfo-queueCount-00382"));
    }

    #[test]
    fn priority_out_of_range() {
        for priority in [1.4, -0.2] {
            let err = create(DeviceCreateInfo {
                queue_create_infos: vec![QueueCreateInfo {
                    queues: vec![priority],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap_err();

            assert!(err.is("VUID-VkDeviceQueueCreateInfo-pQueuePriorities-00383"));
        }
    }

    #[test]
    fn duplicate_family() {
        let err = create(DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo::default(), QueueCreateInfo::default()],
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.is("VUID-VkDeviceCreateInfo-queueFamilyIndex-02802"));
    }

    #[test]
    fn unsupported_features() {
        let driver = StaticDriver {
            supported_features: DeviceFeatures::empty(),
            ..Default::default()
        };
        let err = Device::new(
            Arc::new(driver),
            DeviceCreateInfo {
                enabled_features: DeviceFeatures {
                    sampler_anisotropy: true,
                    ..DeviceFeatures::empty()
                },
                queue_create_infos: vec![QueueCreateInfo::default()],
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("sampler_anisotropy"));
    }

    #[test]
    fn tags_differ() {
        let (first, _, _) = test_device!();
        let (second, _, _) = test_device!();

        assert_ne!(first.tag(), second.tag());
        assert_ne!(first.tag(), 0);
    }

    #[test]
    fn leaks_reported() {
        let log = Arc::new(ReportLog::new());
        let device = create(DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo::default()],
            reporter: Some(log.clone()),
            ..Default::default()
        })
        .unwrap();

        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let _memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();

        assert_should_fail!(device.destroy(), "VUID-vkDestroyDevice-device-00378");
        assert_eq!(log.count("VUID-vkDestroyDevice-device-00378"), 2);
        assert!(device.get(buffer).is_err());

        // Nothing is left after the first teardown.
        device.destroy().unwrap();
    }
}
