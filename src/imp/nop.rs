// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A device that never touches a GPU.
//!
//! [`RecordingDevice`] keeps buffer contents in host memory and appends every call to a log, so
//! callers can assert on exactly what the binding layer asked of the device.

use super::{
    BindGroupDescriptor, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource,
    BufferDescriptor, BufferHandle, Device, DeviceError, DeviceLimits, GroupHandle, LayoutHandle,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// One call made against a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CreateBuffer {
        buffer: BufferHandle,
        label: String,
        size: u64,
    },
    DestroyBuffer(BufferHandle),
    CreateBindGroupLayout(LayoutHandle),
    CreateBindGroup {
        group: GroupHandle,
        layout: LayoutHandle,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    CopyBufferToBuffer {
        source: BufferHandle,
        destination: BufferHandle,
        size: u64,
    },
    MapBuffer(BufferHandle),
}

#[derive(Debug)]
struct RecordedBuffer {
    descriptor: BufferDescriptor,
    contents: Vec<u8>,
    destroyed: bool,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    limits: DeviceLimits,
    next_handle: u64,
    buffers: HashMap<BufferHandle, RecordedBuffer>,
    layouts: HashMap<LayoutHandle, Vec<BindGroupLayoutEntry>>,
    groups: HashMap<GroupHandle, Vec<BindingResource>>,
    calls: Vec<DeviceCall>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        RecordingDevice {
            limits,
            ..Self::default()
        }
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Host copy of a buffer, `None` for unknown or destroyed buffers.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers
            .get(&buffer)
            .filter(|b| !b.destroyed)
            .map(|b| b.contents.as_slice())
    }

    pub fn buffer_descriptor(&self, buffer: BufferHandle) -> Option<&BufferDescriptor> {
        self.buffers.get(&buffer).map(|b| &b.descriptor)
    }

    pub fn is_destroyed(&self, buffer: BufferHandle) -> bool {
        self.buffers.get(&buffer).is_some_and(|b| b.destroyed)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.values().filter(|b| !b.destroyed).count()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn layout_entries(&self, layout: LayoutHandle) -> Option<&[BindGroupLayoutEntry]> {
        self.layouts.get(&layout).map(Vec::as_slice)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_resources(&self, group: GroupHandle) -> Option<&[BindingResource]> {
        self.groups.get(&group).map(Vec::as_slice)
    }

    /// Number of `write_buffer` calls that targeted `buffer`.
    pub fn write_count(&self, buffer: BufferHandle) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::WriteBuffer { buffer: b, .. } if *b == buffer))
            .count()
    }

    fn live_buffer_mut(&mut self, buffer: BufferHandle) -> Result<&mut RecordedBuffer, DeviceError> {
        match self.buffers.get_mut(&buffer) {
            Some(b) if b.destroyed => Err(DeviceError::Destroyed(buffer)),
            Some(b) => Ok(b),
            None => Err(DeviceError::UnknownBuffer(buffer)),
        }
    }
}

impl Device for RecordingDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, DeviceError> {
        let buffer = BufferHandle(self.next_handle());
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                descriptor: descriptor.clone(),
                contents: vec![0; descriptor.size as usize],
                destroyed: false,
            },
        );
        self.calls.push(DeviceCall::CreateBuffer {
            buffer,
            label: descriptor.label.clone(),
            size: descriptor.size,
        });
        Ok(buffer)
    }

    fn create_buffer_init(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        let buffer = self.create_buffer(descriptor)?;
        let recorded = self.live_buffer_mut(buffer)?;
        let len = contents.len().min(recorded.contents.len());
        recorded.contents[..len].copy_from_slice(&contents[..len]);
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(recorded) = self.buffers.get_mut(&buffer) {
            if !recorded.destroyed {
                recorded.destroyed = true;
                recorded.contents = Vec::new();
                self.calls.push(DeviceCall::DestroyBuffer(buffer));
            }
        }
    }

    fn create_bind_group_layout(
        &mut self,
        descriptor: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<LayoutHandle, DeviceError> {
        let layout = LayoutHandle(self.next_handle());
        self.layouts.insert(layout, descriptor.entries.to_vec());
        self.calls.push(DeviceCall::CreateBindGroupLayout(layout));
        Ok(layout)
    }

    fn create_bind_group(
        &mut self,
        descriptor: &BindGroupDescriptor<'_>,
    ) -> Result<GroupHandle, DeviceError> {
        if !self.layouts.contains_key(&descriptor.layout) {
            return Err(DeviceError::UnknownLayout(descriptor.layout));
        }
        for entry in descriptor.entries {
            if let BindingResource::Buffer { buffer, .. } = entry.resource {
                self.live_buffer_mut(buffer)?;
            }
        }
        let group = GroupHandle(self.next_handle());
        self.groups.insert(
            group,
            descriptor.entries.iter().map(|e| e.resource).collect(),
        );
        self.calls.push(DeviceCall::CreateBindGroup {
            group,
            layout: descriptor.layout,
        });
        Ok(group)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.calls.push(DeviceCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        if let Ok(recorded) = self.live_buffer_mut(buffer) {
            let start = (offset as usize).min(recorded.contents.len());
            let end = (start + data.len()).min(recorded.contents.len());
            recorded.contents[start..end].copy_from_slice(&data[..end - start]);
        }
    }

    fn copy_buffer_to_buffer(&mut self, source: BufferHandle, destination: BufferHandle, size: u64) {
        self.calls.push(DeviceCall::CopyBufferToBuffer {
            source,
            destination,
            size,
        });
        let data = match self.live_buffer_mut(source) {
            Ok(recorded) => {
                let end = (size as usize).min(recorded.contents.len());
                recorded.contents[..end].to_vec()
            }
            Err(_) => return,
        };
        if let Ok(recorded) = self.live_buffer_mut(destination) {
            let end = data.len().min(recorded.contents.len());
            recorded.contents[..end].copy_from_slice(&data[..end]);
        }
    }

    fn map_buffer_async(
        &mut self,
        buffer: BufferHandle,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, DeviceError>> + '_>> {
        self.calls.push(DeviceCall::MapBuffer(buffer));
        let result = self.live_buffer_mut(buffer).map(|b| b.contents.clone());
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::visible_to::BufferUsages;

    fn descriptor(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: "test".to_string(),
            size,
            usage: BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }
    }

    #[test]
    fn writes_and_copies() {
        let mut device = RecordingDevice::new();
        let a = device.create_buffer(&descriptor(8)).unwrap();
        let b = device.create_buffer(&descriptor(8)).unwrap();
        device.write_buffer(a, 4, &[1, 2, 3, 4]);
        device.copy_buffer_to_buffer(a, b, 8);
        assert_eq!(device.buffer_contents(b).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        let mapped = test_executors::sleep_on(device.map_buffer_async(b)).unwrap();
        assert_eq!(mapped, vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(device.write_count(a), 1);
    }

    #[test]
    fn destroyed_buffers_fail_to_map() {
        let mut device = RecordingDevice::new();
        let a = device.create_buffer_init(&descriptor(4), &[9, 9, 9, 9]).unwrap();
        assert_eq!(device.buffer_contents(a).unwrap(), &[9, 9, 9, 9]);
        device.destroy_buffer(a);
        device.destroy_buffer(a);
        assert!(device.is_destroyed(a));
        assert_eq!(device.live_buffer_count(), 0);
        let destroys = device
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::DestroyBuffer(_)))
            .count();
        assert_eq!(destroys, 1);
        assert!(test_executors::sleep_on(device.map_buffer_async(a)).is_err());
    }
}
