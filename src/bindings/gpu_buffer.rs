// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reference-counted GPU buffers.
//!
//! A [`GpuBuffer`] may be shared by several bind groups. Each bind group registers itself as a
//! consumer; the device buffer is destroyed when the last consumer releases it.

use crate::bindings::visible_to::BufferUsages;
use crate::imp::{BufferDescriptor, BufferHandle, Device, DeviceError};
use std::collections::BTreeSet;

/// Identifies something that keeps GPU buffers alive, usually a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

#[derive(Debug, Clone, Default)]
pub struct GpuBuffer {
    size: u64,
    /// Size of the device buffer behind `handle`.
    allocated: u64,
    handle: Option<BufferHandle>,
    consumers: BTreeSet<ConsumerId>,
}

impl GpuBuffer {
    pub fn new(size: u64) -> Self {
        GpuBuffer {
            size,
            ..Default::default()
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Whether a device buffer exists and still has the size of the store it backs.
    pub fn is_current(&self) -> bool {
        self.handle.is_some() && self.allocated == self.size
    }

    pub fn consumers(&self) -> &BTreeSet<ConsumerId> {
        &self.consumers
    }

    /// Creates the device buffer, replacing (and destroying) any previous one.
    pub fn create<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        label: String,
        usage: BufferUsages,
    ) -> Result<BufferHandle, DeviceError> {
        if let Some(old) = self.handle.take() {
            device.destroy_buffer(old);
        }
        let handle = device.create_buffer(&BufferDescriptor {
            label,
            size: self.size,
            usage,
            mapped_at_creation: false,
        })?;
        self.handle = Some(handle);
        self.allocated = self.size;
        Ok(handle)
    }

    /// Creates the device buffer already holding `contents`.
    pub fn create_init<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        label: String,
        usage: BufferUsages,
        contents: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        if let Some(old) = self.handle.take() {
            device.destroy_buffer(old);
        }
        self.size = contents.len() as u64;
        let handle = device.create_buffer_init(
            &BufferDescriptor {
                label,
                size: self.size,
                usage,
                mapped_at_creation: true,
            },
            contents,
        )?;
        self.handle = Some(handle);
        self.allocated = self.size;
        Ok(handle)
    }

    pub fn add_consumer(&mut self, consumer: ConsumerId) {
        self.consumers.insert(consumer);
    }

    /// Drops `consumer`; destroys the device buffer once nobody is left.
    ///
    /// Returns whether the buffer was destroyed.
    pub fn release<D: Device + ?Sized>(&mut self, consumer: ConsumerId, device: &mut D) -> bool {
        self.consumers.remove(&consumer);
        if !self.consumers.is_empty() {
            return false;
        }
        match self.handle.take() {
            Some(handle) => {
                device.destroy_buffer(handle);
                true
            }
            None => false,
        }
    }

    /// Destroys the device buffer regardless of consumers.
    pub fn destroy<D: Device + ?Sized>(&mut self, device: &mut D) {
        self.consumers.clear();
        if let Some(handle) = self.handle.take() {
            device.destroy_buffer(handle);
        }
    }

    /// Forgets the handle without touching the device, after the device was lost.
    pub(crate) fn forget(&mut self) {
        self.handle = None;
    }

    /// Copies the buffer's contents back to the host.
    ///
    /// A buffer that was never created reads back as empty.
    pub async fn map_buffer_async<D: Device + ?Sized>(&self, device: &mut D) -> Result<Vec<u8>, DeviceError> {
        match self.handle {
            Some(handle) => device.map_buffer_async(handle).await,
            None => Ok(Vec::new()),
        }
    }
}
