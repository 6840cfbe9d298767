// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The device and everything shared across bind groups.
//!
//! [`DeviceManager`] owns a [`Device`] together with the [`ResourceCache`] that lets structurally
//! identical bindings and layouts be reused, and hands out the consumer ids bind groups use to
//! keep shared buffers alive.

use crate::bindings::buffer_binding::BufferBinding;
use crate::bindings::gpu_buffer::ConsumerId;
use crate::imp::{Device, DeviceLimits, LayoutHandle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bindings and bind group layouts, keyed by their cache keys.
///
/// Bindings are held weakly: the cache never keeps a binding alive on its own.
#[derive(Debug, Default)]
pub struct ResourceCache {
    buffer_bindings: HashMap<String, Weak<RefCell<BufferBinding>>>,
    bind_group_layouts: HashMap<String, LayoutHandle>,
    binding_stats: CacheStats,
    layout_stats: CacheStats,
}

impl ResourceCache {
    /// A live binding registered under `key`.
    pub fn buffer_binding(&mut self, key: &str) -> Option<Rc<RefCell<BufferBinding>>> {
        let found = self.buffer_bindings.get(key).and_then(Weak::upgrade);
        match found {
            Some(_) => self.binding_stats.hits += 1,
            None => {
                self.buffer_bindings.remove(key);
                self.binding_stats.misses += 1;
            }
        }
        self.binding_stats.entries = self.buffer_bindings.len();
        found
    }

    /// Registers `binding` under its cache key, replacing whatever was there.
    pub fn register_buffer_binding(&mut self, binding: &Rc<RefCell<BufferBinding>>) {
        let key = binding.borrow().info().cache_key.clone();
        self.buffer_bindings.insert(key, Rc::downgrade(binding));
        self.binding_stats.entries = self.buffer_bindings.len();
    }

    /// Forgets `key` if it still points at `binding`.
    pub fn forget_buffer_binding(&mut self, binding: &Rc<RefCell<BufferBinding>>) {
        let key = binding.borrow().info().cache_key.clone();
        let registered = self
            .buffer_bindings
            .get(&key)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(binding)));
        if registered {
            self.buffer_bindings.remove(&key);
        }
        self.binding_stats.entries = self.buffer_bindings.len();
    }

    pub fn bind_group_layout(&mut self, key: &str) -> Option<LayoutHandle> {
        let found = self.bind_group_layouts.get(key).copied();
        match found {
            Some(_) => self.layout_stats.hits += 1,
            None => self.layout_stats.misses += 1,
        }
        found
    }

    pub fn insert_bind_group_layout(&mut self, key: String, layout: LayoutHandle) {
        self.bind_group_layouts.insert(key, layout);
        self.layout_stats.entries = self.bind_group_layouts.len();
    }

    pub fn binding_stats(&self) -> CacheStats {
        self.binding_stats
    }

    pub fn layout_stats(&self) -> CacheStats {
        self.layout_stats
    }

    /// Drops every layout; their handles died with the device.
    pub fn clear_layouts(&mut self) {
        self.bind_group_layouts.clear();
        self.layout_stats.entries = 0;
    }
}

#[derive(Debug)]
pub struct DeviceManager<D: Device> {
    device: D,
    cache: ResourceCache,
    next_consumer: u64,
}

impl<D: Device> DeviceManager<D> {
    pub fn new(device: D) -> Self {
        DeviceManager {
            device,
            cache: ResourceCache::default(),
            next_consumer: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// Both halves at once, for code that creates on a miss.
    pub(crate) fn parts(&mut self) -> (&mut D, &mut ResourceCache) {
        (&mut self.device, &mut self.cache)
    }

    pub fn limits(&self) -> DeviceLimits {
        self.device.limits()
    }

    pub fn next_consumer_id(&mut self) -> ConsumerId {
        self.next_consumer += 1;
        ConsumerId(self.next_consumer)
    }

    /// Replaces a lost device. Every bind group must then be restored with
    /// [`BindGroup::restore_context`](crate::bindings::BindGroup::restore_context).
    pub fn restore_device(&mut self, device: D) {
        logwise::info_sync!("device restored");
        self.device = device;
        self.cache.clear_layouts();
    }

    /// Forgets every device object after the device was lost.
    ///
    /// Bind groups still hold stale handles until their own
    /// [`BindGroup::lose_context`](crate::bindings::BindGroup::lose_context) runs.
    pub fn lose_device(&mut self) {
        logwise::warn_sync!("device lost");
        self.cache.clear_layouts();
    }

    pub fn into_device(self) -> D {
        self.device
    }
}
