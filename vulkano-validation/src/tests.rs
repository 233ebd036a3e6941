// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

#![cfg(test)]

use crate::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage},
    command_buffer::{
        commands::CopyBufferInfo, CommandBuffer, CommandBufferAllocateInfo,
        CommandBufferBeginInfo, CommandBufferUsage, CommandPoolCreateFlags, CommandPoolCreateInfo,
    },
    device::{Device, DeviceCreateInfo, QueueCreateInfo},
    driver::StaticDriver,
    handle::Id,
    memory::MemoryAllocateInfo,
    report::ReportLog,
    Validated, ValidationError,
};
use std::{fmt::Display, sync::Arc};

/// Creates a device over a `StaticDriver` with a `ReportLog` as its reporter, and returns the
/// device, its first queue and the log.
///
/// Every feature and extension is enabled unless others are given.
macro_rules! test_device {
    () => {
        test_device!(
            crate::device::DeviceFeatures::all(),
            crate::device::DeviceExtensions::all()
        )
    };

    ($features:expr, $extensions:expr) => {{
        use crate::{
            device::{Device, DeviceCreateInfo, QueueCreateInfo},
            driver::StaticDriver,
            report::ReportLog,
        };
        use std::sync::Arc;

        let log = Arc::new(ReportLog::new());
        let device = Device::new(
            Arc::new(StaticDriver::default()),
            DeviceCreateInfo {
                enabled_features: $features,
                enabled_extensions: $extensions,
                queue_create_infos: vec![
                    QueueCreateInfo {
                        queue_family_index: 0,
                        queues: vec![0.5, 0.5],
                        ..Default::default()
                    },
                    QueueCreateInfo {
                        queue_family_index: 1,
                        ..Default::default()
                    },
                ],
                reporter: Some(log.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        let queue = device.queue(0, 0).unwrap();

        (device, queue, log)
    }};
}

/// Asserts that a fallible operation fails with the given VUID.
macro_rules! assert_should_fail {
    ($result:expr, $vuid:expr $(,)?) => {{
        match $result {
            Ok(_) => panic!("operation succeeded, but was expected to fail with {}", $vuid),
            Err(err) => {
                let err = &err;
                assert!(
                    crate::tests::ExpectedError::has_vuid(err, $vuid),
                    "expected {}, got: {}",
                    $vuid,
                    err,
                );
            }
        }
    }};
}

pub(crate) trait ExpectedError: Display {
    fn has_vuid(&self, vuid: &str) -> bool;
}

impl ExpectedError for Box<ValidationError> {
    fn has_vuid(&self, vuid: &str) -> bool {
        self.is(vuid)
    }
}

impl<E> ExpectedError for Validated<E> {
    fn has_vuid(&self, vuid: &str) -> bool {
        self.validation_error().is_some_and(|err| err.is(vuid))
    }
}

/// A uniform buffer of the given size, with default sharing.
pub(crate) fn uniform_buffer_info(size: u64) -> BufferCreateInfo {
    BufferCreateInfo {
        size,
        usage: BufferUsage::UNIFORM_BUFFER,
        ..Default::default()
    }
}

/// Allocates a primary command buffer of queue family 0, from a new pool.
pub(crate) fn command_buffer(device: &Device, flags: CommandPoolCreateFlags) -> Id<CommandBuffer> {
    let command_pool = device
        .create_command_pool(CommandPoolCreateInfo {
            flags,
            ..Default::default()
        })
        .unwrap();

    device
        .allocate_command_buffers(CommandBufferAllocateInfo {
            command_pool,
            ..Default::default()
        })
        .unwrap()[0]
}

/// Creates a buffer with the given usage, and binds it to a new allocation of its own.
pub(crate) fn bound_buffer(device: &Device, usage: BufferUsage, size: u64) -> Id<Buffer> {
    let buffer = device
        .create_buffer(BufferCreateInfo {
            size,
            usage,
            ..Default::default()
        })
        .unwrap();
    let allocation_size = device.get(buffer).unwrap().memory_requirements().size;
    let memory = device
        .allocate_memory(MemoryAllocateInfo {
            allocation_size,
            memory_type_index: 0,
            ..Default::default()
        })
        .unwrap();
    device.bind_buffer_memory(buffer, memory, 0).unwrap();

    buffer
}

/// Records a command buffer that copies between two new buffers, and returns it together with
/// the source buffer.
pub(crate) fn recorded_copy(
    device: &Device,
    usage: CommandBufferUsage,
) -> (Id<CommandBuffer>, Id<Buffer>) {
    let cb = command_buffer(device, CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    let src = bound_buffer(device, BufferUsage::TRANSFER_SRC, 256);
    let dst = bound_buffer(device, BufferUsage::TRANSFER_DST, 256);

    device
        .begin_command_buffer(cb, CommandBufferBeginInfo::usage(usage))
        .unwrap();
    device
        .cmd_copy_buffer(cb, CopyBufferInfo::buffers(src, dst, 256))
        .unwrap();
    device.end_command_buffer(cb).unwrap();

    (cb, src)
}

/// Creates a device with a single queue over a driver that tests have adjusted.
pub(crate) fn device_with_driver(driver: StaticDriver) -> (Arc<Device>, Arc<ReportLog>) {
    let log = Arc::new(ReportLog::new());
    let device = Device::new(
        Arc::new(driver),
        DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index: 0,
                ..Default::default()
            }],
            reporter: Some(log.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    (device, log)
}
