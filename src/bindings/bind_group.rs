// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Bind groups.
//!
//! A [`BindGroup`] gathers an ordered list of bindings, creates the GPU buffers they need, and
//! asks the device for a bind group layout and a bind group. Layouts are shared through the
//! [`ResourceCache`](crate::device::ResourceCache): two groups whose bindings have the same
//! resource layout keys get the same layout object.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --create_bind_group--> LayoutPending --> Ready
//!       ^                                                 |
//!       +------------------- lose_context ----------------+
//! ```
//!
//! Each frame, [`BindGroup::update`] serializes dirty inputs, uploads every dirty store once, and
//! rebuilds the group (or its layout) when a texture or sampler binding changed.
//!
//! # Example
//!
//! ```
//! use layouts_and_bindings::bindings::bind_group::{BindGroup, BindGroupParams, InputBindingParams};
//! use layouts_and_bindings::bindings::input::{BufferInputs, Input};
//! use layouts_and_bindings::device::DeviceManager;
//! use layouts_and_bindings::imp::RecordingDevice;
//! use layouts_and_bindings::layout::WgslType;
//!
//! let mut manager = DeviceManager::new(RecordingDevice::new());
//! let mut group = BindGroup::new(&mut manager, BindGroupParams {
//!     label: "frame".to_string(),
//!     uniforms: vec![(
//!         "camera".to_string(),
//!         InputBindingParams::new(BufferInputs::new().with("zoom", Input::new(WgslType::F32, 2.0))),
//!     )],
//!     ..Default::default()
//! });
//! group.create_bind_group(&mut manager).unwrap();
//! group.update(&mut manager).unwrap();
//! assert!(group.bind_group().is_some());
//! ```

use crate::bindings::buffer_binding::{BufferBinding, BufferBindingParams};
use crate::bindings::gpu_buffer::{ConsumerId, GpuBuffer};
use crate::bindings::input::BufferInputs;
use crate::bindings::visible_to::{BufferAccess, BufferBindingKind, BufferUsages, ShaderStages};
use crate::bindings::BindingRef;
use crate::device::DeviceManager;
use crate::error::Error;
use crate::imp::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, Device, GroupHandle, LayoutHandle,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindGroupState {
    /// No entries have been built.
    Uninitialized,
    /// Entries or a layout exist, the group does not.
    LayoutPending,
    Ready,
}

/// A declarative buffer binding, built by [`BindGroup::create_input_bindings`].
#[derive(Debug, Clone)]
pub struct InputBindingParams {
    pub label: Option<String>,
    /// Defaults to every stage. Writable storage is always compute-only.
    pub visibility: Option<ShaderStages>,
    pub use_struct: bool,
    pub access: BufferAccess,
    pub usage: BufferUsages,
    pub should_copy_result: bool,
    pub inputs: BufferInputs,
}

impl InputBindingParams {
    pub fn new(inputs: BufferInputs) -> Self {
        InputBindingParams {
            label: None,
            visibility: None,
            use_struct: true,
            access: BufferAccess::Read,
            usage: BufferUsages::empty(),
            should_copy_result: false,
            inputs,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindGroupParams {
    pub label: String,
    /// The `@group(n)` index.
    pub index: u32,
    pub bindings: Vec<BindingRef>,
    pub uniforms: Vec<(String, InputBindingParams)>,
    pub storages: Vec<(String, InputBindingParams)>,
}

#[derive(Debug, Clone, Default)]
pub struct BindGroupCloneParams {
    /// Bindings for the copy; empty keeps the original's.
    pub bindings: Vec<BindingRef>,
    /// Reuse the original's layout instead of building one from the new bindings.
    pub keep_layout: bool,
}

#[derive(Debug)]
pub struct BindGroup {
    id: ConsumerId,
    label: String,
    index: u32,
    bindings: Vec<BindingRef>,
    layout_entries: Vec<BindGroupLayoutEntry>,
    group_entries: Vec<BindGroupEntry>,
    seen_generations: Vec<(u64, u64)>,
    layout_cache_key: String,
    pipeline_cache_key: String,
    bind_group_layout: Option<LayoutHandle>,
    bind_group: Option<GroupHandle>,
    needs_pipeline_flush: bool,
}

impl BindGroup {
    pub fn new<D: Device>(mgr: &mut DeviceManager<D>, params: BindGroupParams) -> Self {
        let mut group = BindGroup {
            id: mgr.next_consumer_id(),
            label: params.label,
            index: params.index,
            bindings: Vec::new(),
            layout_entries: Vec::new(),
            group_entries: Vec::new(),
            seen_generations: Vec::new(),
            layout_cache_key: String::new(),
            pipeline_cache_key: String::new(),
            bind_group_layout: None,
            bind_group: None,
            needs_pipeline_flush: false,
        };
        group.add_bindings(mgr, params.bindings);
        if !params.uniforms.is_empty() {
            let uniforms = group.create_input_bindings(mgr, BufferBindingKind::Uniform, params.uniforms);
            group.add_bindings(mgr, uniforms);
        }
        if !params.storages.is_empty() {
            let storages = group.create_input_bindings(mgr, BufferBindingKind::Storage, params.storages);
            group.add_bindings(mgr, storages);
        }
        group
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    pub fn bindings(&self) -> &[BindingRef] {
        &self.bindings
    }

    pub fn layout_entries(&self) -> &[BindGroupLayoutEntry] {
        &self.layout_entries
    }

    pub fn group_entries(&self) -> &[BindGroupEntry] {
        &self.group_entries
    }

    pub fn layout_cache_key(&self) -> &str {
        &self.layout_cache_key
    }

    /// Identifies pipelines this group is compatible with.
    pub fn pipeline_cache_key(&self) -> &str {
        &self.pipeline_cache_key
    }

    pub fn bind_group_layout(&self) -> Option<LayoutHandle> {
        self.bind_group_layout
    }

    pub fn bind_group(&self) -> Option<GroupHandle> {
        self.bind_group
    }

    pub fn state(&self) -> BindGroupState {
        if self.bind_group.is_some() {
            BindGroupState::Ready
        } else if self.bind_group_layout.is_some() || !self.layout_entries.is_empty() {
            BindGroupState::LayoutPending
        } else {
            BindGroupState::Uninitialized
        }
    }

    pub fn should_create_bind_group(&self) -> bool {
        !self.bindings.is_empty()
    }

    /// Whether pipelines built against the old layout must be rebuilt. Reading clears the flag.
    pub fn take_needs_pipeline_flush(&mut self) -> bool {
        std::mem::take(&mut self.needs_pipeline_flush)
    }

    pub fn get_binding_by_name(&self, name: &str) -> Option<&BindingRef> {
        self.bindings.iter().find(|binding| binding.name() == name)
    }

    /// Offsets to pass with `set_bind_group`, one per dynamically offset binding, in order.
    pub fn dynamic_offsets(&self) -> Vec<u32> {
        self.bindings
            .iter()
            .filter_map(BindingRef::as_buffer)
            .filter_map(|rc| {
                let binding = rc.borrow();
                if !binding.use_dynamic_offset() {
                    return None;
                }
                match binding.parent_binding() {
                    Some(_) => Some(binding.offset() as u32),
                    None => Some(0),
                }
            })
            .collect()
    }

    fn register_consumer(&self, binding: &Rc<RefCell<BufferBinding>>) {
        let mut binding = binding.borrow_mut();
        match binding.parent_binding() {
            Some(parent) => parent.borrow_mut().buffer.add_consumer(self.id),
            None => binding.buffer.add_consumer(self.id),
        }
        if let Some(result) = &mut binding.result_buffer {
            result.add_consumer(self.id);
        }
    }

    /// Adds `binding` after the existing ones. The GPU group is built by the next
    /// [`BindGroup::create_bind_group`].
    pub fn add_binding<D: Device>(&mut self, mgr: &mut DeviceManager<D>, binding: impl Into<BindingRef>) {
        let binding = binding.into();
        if let BindingRef::Buffer(rc) = &binding {
            mgr.cache_mut().register_buffer_binding(rc);
            self.register_consumer(rc);
        }
        self.bindings.push(binding);
    }

    pub fn add_bindings<D: Device>(&mut self, mgr: &mut DeviceManager<D>, bindings: Vec<BindingRef>) {
        for binding in bindings {
            self.add_binding(mgr, binding);
        }
    }

    /// Builds buffer bindings from declarations.
    ///
    /// A structured declaration whose cache key matches a live binding is built by
    /// [`BufferBinding::clone_with`], skipping layout. Declarations without `use_struct` become one
    /// binding per input.
    pub fn create_input_bindings<D: Device>(
        &self,
        mgr: &mut DeviceManager<D>,
        kind: BufferBindingKind,
        declarations: Vec<(String, InputBindingParams)>,
    ) -> Vec<BindingRef> {
        let limits = mgr.device().limits();
        let min_offset = match kind {
            BufferBindingKind::Uniform => limits.min_uniform_buffer_offset_alignment,
            BufferBindingKind::Storage => limits.min_storage_buffer_offset_alignment,
        } as usize;
        let mut out = Vec::new();
        for (key, declaration) in declarations {
            let visibility = match (kind, declaration.access) {
                (BufferBindingKind::Storage, BufferAccess::ReadWrite) => ShaderStages::COMPUTE,
                _ => declaration.visibility.unwrap_or_default(),
            };
            let base = BufferBindingParams {
                label: declaration.label.clone().unwrap_or_else(|| key.clone()),
                name: Some(key.clone()),
                binding_type: kind,
                visibility,
                use_struct: declaration.use_struct,
                access: declaration.access,
                usage: declaration.usage,
                should_copy_result: declaration.should_copy_result,
                min_offset,
                ..Default::default()
            };
            if declaration.use_struct {
                let params = BufferBindingParams {
                    inputs: declaration.inputs,
                    ..base
                };
                let cache_key = BufferBinding::cache_key_for(&params);
                let cached = mgr
                    .cache_mut()
                    .buffer_binding(&cache_key)
                    .filter(|cached| cached.borrow().info().cache_key == cache_key);
                let binding = match cached {
                    Some(cached) => {
                        logwise::trace_sync!(
                            "reusing layout of {key}",
                            key = logwise::privacy::LogIt(&cache_key)
                        );
                        let copy = cached.borrow().clone_with(params);
                        copy
                    }
                    None => BufferBinding::new(params),
                };
                out.push(binding.into());
            } else {
                for (field, input) in declaration.inputs.iter() {
                    let params = BufferBindingParams {
                        label: field.to_string(),
                        name: Some(field.to_string()),
                        inputs: BufferInputs::new().with(field, input.clone()),
                        ..base.clone()
                    };
                    out.push(BufferBinding::new(params).into());
                }
            }
        }
        out
    }

    /// Creates `binding`'s GPU buffer (and result buffer), or its parent's for an offset child.
    fn ensure_buffer<D: Device>(
        &self,
        mgr: &mut DeviceManager<D>,
        binding: &Rc<RefCell<BufferBinding>>,
    ) -> Result<(), Error> {
        let owner = binding.borrow().parent_binding().unwrap_or_else(|| binding.clone());
        if !owner.borrow().buffer.is_current() {
            self.create_binding_buffer(mgr, &owner)?;
        }
        owner.borrow_mut().buffer.add_consumer(self.id);
        Ok(())
    }

    fn create_binding_buffer<D: Device>(
        &self,
        mgr: &mut DeviceManager<D>,
        rc: &Rc<RefCell<BufferBinding>>,
    ) -> Result<(), Error> {
        {
            let mut binding = rc.borrow_mut();
            let label = format!(
                "{}: {} buffer from: {}",
                self.label,
                binding.info().kind,
                binding.info().label
            );
            let usage = binding.buffer_usage();
            binding.buffer.create(mgr.device_mut(), label.clone(), usage)?;
            binding.should_update = !binding.array_buffer.is_empty();
            if binding.should_copy_result() {
                let size = binding.array_buffer_size() as u64;
                let result = binding
                    .result_buffer
                    .get_or_insert_with(|| GpuBuffer::new(size));
                result.create(
                    mgr.device_mut(),
                    format!("{label} (result)"),
                    BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                )?;
                result.add_consumer(self.id);
            }
            logwise::trace_sync!(
                "created {label}",
                label = logwise::privacy::LogIt(&label)
            );
        }
        mgr.cache_mut().register_buffer_binding(rc);
        Ok(())
    }

    fn add_bind_group_layout_entry(&mut self, binding: &BindingRef) {
        self.layout_entries.push(BindGroupLayoutEntry {
            binding: self.layout_entries.len() as u32,
            visibility: binding.info().visibility,
            layout: binding.layout(),
        });
        self.layout_cache_key
            .push_str(&binding.resource_layout_cache_key());
    }

    fn binding_resource(&self, binding: &BindingRef) -> Result<BindingResource, Error> {
        let missing = || Error::MissingResource {
            group: self.label.clone(),
            binding: binding.name(),
        };
        match binding {
            BindingRef::Buffer(rc) => {
                let binding = rc.borrow();
                let (buffer, offset) = match binding.parent_binding() {
                    Some(parent) => {
                        let offset = match binding.use_dynamic_offset() {
                            true => 0,
                            false => binding.offset() as u64,
                        };
                        (parent.borrow().buffer.handle(), offset)
                    }
                    None => (binding.buffer.handle(), 0),
                };
                let buffer = buffer.ok_or_else(|| Error::NoBuffer(binding.info().label.clone()))?;
                Ok(BindingResource::Buffer {
                    buffer,
                    offset,
                    size: Some(binding.array_buffer_size() as u64),
                })
            }
            BindingRef::Sampler(rc) => rc.borrow().resource().ok_or_else(missing),
            BindingRef::Texture(rc) => rc.borrow().resource().ok_or_else(missing),
        }
    }

    fn add_bind_group_entry(&mut self, binding: &BindingRef) -> Result<(), Error> {
        let resource = self.binding_resource(binding)?;
        self.group_entries.push(BindGroupEntry {
            binding: self.group_entries.len() as u32,
            resource,
        });
        self.pipeline_cache_key.push_str(&binding.cache_key());
        self.seen_generations.push(binding.generations());
        Ok(())
    }

    /// Rebuilds both entry lists from the bindings, creating missing GPU buffers.
    pub fn fill_entries<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        self.layout_entries.clear();
        self.group_entries.clear();
        self.seen_generations.clear();
        self.layout_cache_key.clear();
        self.pipeline_cache_key.clear();
        for binding in self.bindings.clone() {
            if let BindingRef::Buffer(rc) = &binding {
                self.ensure_buffer(mgr, rc)?;
            }
            self.add_bind_group_layout_entry(&binding);
            self.add_bind_group_entry(&binding)?;
        }
        Ok(())
    }

    /// Looks the layout up by key, creating and caching it on a miss.
    pub fn set_bind_group_layout<D: Device>(
        &mut self,
        mgr: &mut DeviceManager<D>,
    ) -> Result<LayoutHandle, Error> {
        let (device, cache) = mgr.parts();
        let layout = match cache.bind_group_layout(&self.layout_cache_key) {
            Some(layout) => layout,
            None => {
                let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: &self.label,
                    entries: &self.layout_entries,
                })?;
                logwise::trace_sync!(
                    "created bind group layout for {label}",
                    label = logwise::privacy::LogIt(&self.label)
                );
                cache.insert_bind_group_layout(self.layout_cache_key.clone(), layout);
                layout
            }
        };
        self.bind_group_layout = Some(layout);
        Ok(layout)
    }

    pub fn set_bind_group<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        let layout = match self.bind_group_layout {
            Some(layout) => layout,
            None => self.set_bind_group_layout(mgr)?,
        };
        let group = mgr.device_mut().create_bind_group(&BindGroupDescriptor {
            label: &self.label,
            layout,
            entries: &self.group_entries,
        })?;
        self.bind_group = Some(group);
        Ok(())
    }

    /// Builds entries, layout and group.
    pub fn create_bind_group<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        self.fill_entries(mgr)?;
        self.set_bind_group_layout(mgr)?;
        self.set_bind_group(mgr)
    }

    /// Rebuilds the group against the current resources, keeping the layout.
    pub fn reset_bind_group<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        self.group_entries.clear();
        self.seen_generations.clear();
        self.pipeline_cache_key.clear();
        for binding in self.bindings.clone() {
            if let BindingRef::Buffer(rc) = &binding {
                self.ensure_buffer(mgr, rc)?;
            }
            self.add_bind_group_entry(&binding)?;
        }
        self.set_bind_group(mgr)
    }

    /// Rebuilds layout and group. Pipelines using this group must be rebuilt too.
    pub fn reset_bind_group_layout<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        self.layout_entries.clear();
        self.layout_cache_key.clear();
        for binding in self.bindings.clone() {
            self.add_bind_group_layout_entry(&binding);
        }
        self.set_bind_group_layout(mgr)?;
        self.needs_pipeline_flush = true;
        self.reset_bind_group(mgr)
    }

    /// Serializes dirty buffer bindings, applies any pending rebuild, then uploads the stores.
    pub fn update<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        let parents = self.serialize_buffer_bindings();
        if self.bind_group.is_some() {
            let mut layout_changed = false;
            let mut resource_changed = false;
            for (binding, seen) in self.bindings.iter().zip(&self.seen_generations) {
                let (resource, layout) = binding.generations();
                resource_changed |= resource != seen.0;
                layout_changed |= layout != seen.1;
            }
            if layout_changed {
                self.reset_bind_group_layout(mgr)?;
            } else if resource_changed {
                self.reset_bind_group(mgr)?;
            }
        }
        self.flush_buffer_bindings(mgr, &parents);
        Ok(())
    }

    /// Writes each dirty store to its GPU buffer at most once.
    pub fn update_buffer_bindings<D: Device>(&mut self, mgr: &mut DeviceManager<D>) {
        let parents = self.serialize_buffer_bindings();
        self.flush_buffer_bindings(mgr, &parents);
    }

    /// Runs `update` on every buffer binding, parents of offset children first, and returns
    /// those parents.
    fn serialize_buffer_bindings(&self) -> Vec<Rc<RefCell<BufferBinding>>> {
        let mut parents: Vec<Rc<RefCell<BufferBinding>>> = Vec::new();
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            if let Some(parent) = rc.borrow().parent_binding() {
                if !parents.iter().any(|p| Rc::ptr_eq(p, &parent)) {
                    parents.push(parent);
                }
            }
        }
        //a parent's own fields would land on top of the slices its children write
        for parent in &parents {
            parent.borrow_mut().update();
        }
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            rc.borrow_mut().update();
        }
        parents
    }

    fn flush_buffer_bindings<D: Device>(
        &self,
        mgr: &mut DeviceManager<D>,
        parents: &[Rc<RefCell<BufferBinding>>],
    ) {
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            let mut binding = rc.borrow_mut();
            if binding.parent_binding().is_none() {
                Self::flush(mgr.device_mut(), &mut binding);
            }
        }
        for parent in parents {
            Self::flush(mgr.device_mut(), &mut parent.borrow_mut());
        }
    }

    fn flush<D: Device>(device: &mut D, binding: &mut BufferBinding) {
        if !binding.should_update {
            return;
        }
        //stays dirty until there is a buffer of the store's size to write to
        match binding.buffer.handle() {
            Some(buffer) if binding.buffer.is_current() => {
                device.write_buffer(buffer, 0, &binding.array_buffer);
                binding.should_update = false;
            }
            _ => {}
        }
    }

    /// Copies every writable storage binding into its result buffer.
    pub fn copy_results<D: Device>(&self, mgr: &mut DeviceManager<D>) {
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            let binding = rc.borrow();
            if binding.should_copy_result() {
                binding.copy_result(mgr.device_mut());
            }
        }
    }

    /// Builds a group over the same (or the given) bindings, sharing their buffers.
    pub fn clone_with<D: Device>(
        &self,
        mgr: &mut DeviceManager<D>,
        params: BindGroupCloneParams,
    ) -> Result<BindGroup, Error> {
        let bindings = match params.bindings.is_empty() {
            true => self.bindings.clone(),
            false => params.bindings,
        };
        let mut copy = BindGroup::new(
            mgr,
            BindGroupParams {
                label: format!("{} (copy)", self.label),
                index: self.index,
                bindings,
                ..Default::default()
            },
        );
        for binding in copy.bindings.clone() {
            if let BindingRef::Buffer(rc) = &binding {
                copy.ensure_buffer(mgr, rc)?;
            }
            if !params.keep_layout {
                copy.add_bind_group_layout_entry(&binding);
            }
            copy.add_bind_group_entry(&binding)?;
        }
        if params.keep_layout {
            copy.layout_entries = self.layout_entries.clone();
            copy.layout_cache_key = self.layout_cache_key.clone();
            copy.bind_group_layout = self.bind_group_layout;
        }
        if copy.bind_group_layout.is_none() {
            copy.set_bind_group_layout(mgr)?;
        }
        copy.set_bind_group(mgr)?;
        Ok(copy)
    }

    /// Stops using `binding`'s buffers, destroying any that nobody else uses.
    pub fn destroy_buffer_binding<D: Device>(
        &mut self,
        mgr: &mut DeviceManager<D>,
        rc: &Rc<RefCell<BufferBinding>>,
    ) {
        let destroyed = {
            let mut binding = rc.borrow_mut();
            let device = mgr.device_mut();
            let destroyed = binding.buffer.release(self.id, device);
            if let Some(result) = &mut binding.result_buffer {
                result.release(self.id, device);
            }
            if let Some(parent) = binding.parent_binding() {
                parent.borrow_mut().buffer.release(self.id, device);
            }
            if destroyed {
                logwise::trace_sync!(
                    "destroyed buffer of {label}",
                    label = logwise::privacy::LogIt(&binding.info().label)
                );
            }
            destroyed
        };
        if destroyed {
            mgr.cache_mut().forget_buffer_binding(rc);
        }
    }

    /// Releases every buffer and forgets all bindings.
    pub fn destroy<D: Device>(&mut self, mgr: &mut DeviceManager<D>) {
        for binding in std::mem::take(&mut self.bindings) {
            if let BindingRef::Buffer(rc) = &binding {
                self.destroy_buffer_binding(mgr, rc);
            }
        }
        self.layout_entries.clear();
        self.group_entries.clear();
        self.seen_generations.clear();
        self.layout_cache_key.clear();
        self.pipeline_cache_key.clear();
        self.bind_group = None;
        self.bind_group_layout = None;
    }

    /// Drops every device object this group refers to, after the device was lost.
    pub fn lose_context(&mut self) {
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            let mut binding = rc.borrow_mut();
            binding.buffer.forget();
            if let Some(result) = &mut binding.result_buffer {
                result.forget();
            }
            if let Some(parent) = binding.parent_binding() {
                parent.borrow_mut().buffer.forget();
            }
        }
        self.layout_entries.clear();
        self.group_entries.clear();
        self.seen_generations.clear();
        self.layout_cache_key.clear();
        self.pipeline_cache_key.clear();
        self.bind_group = None;
        self.bind_group_layout = None;
        self.needs_pipeline_flush = true;
    }

    /// Recreates the group on a restored device and re-uploads every store.
    pub fn restore_context<D: Device>(&mut self, mgr: &mut DeviceManager<D>) -> Result<(), Error> {
        if self.should_create_bind_group() {
            self.create_bind_group(mgr)?;
        }
        for rc in self.bindings.iter().filter_map(BindingRef::as_buffer) {
            let mut binding = rc.borrow_mut();
            binding.should_update = !binding.array_buffer.is_empty();
            if let Some(parent) = binding.parent_binding() {
                let mut parent = parent.borrow_mut();
                parent.should_update = !parent.array_buffer.is_empty();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::input::Input;
    use crate::bindings::sampler::{SamplerBinding, SamplerBindingParams, SamplerBindingType};
    use crate::imp::{RecordingDevice, SamplerHandle};
    use crate::layout::{InputType, WgslType};

    fn manager() -> DeviceManager<RecordingDevice> {
        DeviceManager::new(RecordingDevice::new())
    }

    fn camera(label: &str, zoom: f64) -> BindGroupParams {
        BindGroupParams {
            label: label.to_string(),
            uniforms: vec![(
                "camera".to_string(),
                InputBindingParams::new(
                    BufferInputs::new().with("zoom", Input::new(WgslType::F32, zoom)),
                ),
            )],
            ..Default::default()
        }
    }

    fn buffer_of(group: &BindGroup, name: &str) -> Rc<RefCell<BufferBinding>> {
        group
            .get_binding_by_name(name)
            .and_then(BindingRef::as_buffer)
            .cloned()
            .unwrap()
    }

    #[test]
    fn equal_shapes_share_a_layout() {
        let mut m = manager();
        let mut a = BindGroup::new(&mut m, camera("a", 1.0));
        let mut b = BindGroup::new(&mut m, camera("b", 2.0));
        assert_eq!(a.state(), BindGroupState::Uninitialized);
        a.create_bind_group(&mut m).unwrap();
        b.create_bind_group(&mut m).unwrap();
        assert_eq!(a.state(), BindGroupState::Ready);
        assert_eq!(a.bind_group_layout(), b.bind_group_layout());
        assert_eq!(m.device().layout_count(), 1);
        assert_eq!(m.device().group_count(), 2);
        assert_eq!(m.device().live_buffer_count(), 2);
        assert_eq!(a.layout_cache_key(), "buffer,uniform,7,zoom,f32,");
        assert!(!Rc::ptr_eq(&buffer_of(&a, "camera"), &buffer_of(&b, "camera")));
    }

    #[test]
    fn stores_are_written_once_per_change() {
        let mut m = manager();
        let mut group = BindGroup::new(&mut m, camera("frame", 2.0));
        group.create_bind_group(&mut m).unwrap();
        let binding = buffer_of(&group, "camera");
        let handle = binding.borrow().buffer().handle().unwrap();

        group.update(&mut m).unwrap();
        group.update(&mut m).unwrap();
        assert_eq!(m.device().write_count(handle), 1);

        binding.borrow_mut().input_mut("zoom").unwrap().set_value(3.0);
        group.update(&mut m).unwrap();
        assert_eq!(m.device().write_count(handle), 2);
        assert_eq!(
            &m.device().buffer_contents(handle).unwrap()[..4],
            &3.0f32.to_le_bytes()
        );
    }

    #[test]
    fn sampler_changes_rebuild_group_or_layout() {
        let mut m = manager();
        let sampler = Rc::new(RefCell::new(SamplerBinding::new(SamplerBindingParams {
            label: "linear".to_string(),
            sampler: Some(SamplerHandle(900)),
            ..Default::default()
        })));
        let mut group = BindGroup::new(
            &mut m,
            BindGroupParams {
                label: "textured".to_string(),
                bindings: vec![sampler.clone().into()],
                ..Default::default()
            },
        );
        group.create_bind_group(&mut m).unwrap();
        let first = group.bind_group();
        assert!(!group.take_needs_pipeline_flush());

        sampler.borrow_mut().set_sampler(SamplerHandle(901));
        group.update(&mut m).unwrap();
        assert_ne!(group.bind_group(), first);
        assert_eq!(m.device().layout_count(), 1);
        assert!(!group.take_needs_pipeline_flush());

        sampler
            .borrow_mut()
            .set_binding_type(SamplerBindingType::Comparison);
        group.update(&mut m).unwrap();
        assert_eq!(m.device().layout_count(), 2);
        assert!(group.take_needs_pipeline_flush());
        assert!(!group.take_needs_pipeline_flush());
    }

    #[test]
    fn missing_sampler_is_an_error() {
        let mut m = manager();
        let mut group = BindGroup::new(
            &mut m,
            BindGroupParams {
                label: "broken".to_string(),
                bindings: vec![SamplerBinding::new(SamplerBindingParams {
                    label: "unset".to_string(),
                    ..Default::default()
                })
                .into()],
                ..Default::default()
            },
        );
        let err = group.create_bind_group(&mut m).unwrap_err();
        assert!(matches!(err, Error::MissingResource { binding, .. } if binding == "unset"));
        assert!(group.bind_group().is_none());
    }

    #[test]
    fn shared_buffer_outlives_first_group() {
        let mut m = manager();
        let shared = Rc::new(RefCell::new(BufferBinding::new(BufferBindingParams {
            label: "globals".to_string(),
            inputs: BufferInputs::new().with("time", Input::new(WgslType::F32, 0.0)),
            ..Default::default()
        })));
        let params = |label: &str| BindGroupParams {
            label: label.to_string(),
            bindings: vec![shared.clone().into()],
            ..Default::default()
        };
        let mut a = BindGroup::new(&mut m, params("a"));
        let mut b = BindGroup::new(&mut m, params("b"));
        a.create_bind_group(&mut m).unwrap();
        b.create_bind_group(&mut m).unwrap();
        let handle = shared.borrow().buffer().handle().unwrap();
        assert_eq!(m.device().live_buffer_count(), 1);

        a.destroy(&mut m);
        assert!(!m.device().is_destroyed(handle));
        b.destroy(&mut m);
        assert!(m.device().is_destroyed(handle));
        assert!(b.bindings().is_empty());
    }

    #[test]
    fn offset_children_share_the_parent_buffer() {
        let mut m = manager();
        let parent = Rc::new(RefCell::new(BufferBinding::new(BufferBindingParams {
            label: "objects".to_string(),
            binding_type: BufferBindingKind::Storage,
            inputs: BufferInputs::new().with(
                "data",
                Input::new(InputType::Array(WgslType::F32), vec![0.0; 192]),
            ),
            ..Default::default()
        })));
        let child = |index: usize, value: f64| {
            BufferBinding::new(BufferBindingParams {
                label: format!("object {index}"),
                binding_type: BufferBindingKind::Storage,
                inputs: BufferInputs::new().with("scale", Input::new(WgslType::F32, value)),
                parent: Some(parent.clone()),
                offset_index: index,
                use_dynamic_offset: true,
                ..Default::default()
            })
        };
        let mut group = BindGroup::new(
            &mut m,
            BindGroupParams {
                label: "objects".to_string(),
                bindings: vec![child(1, 4.0).into(), child(2, 8.0).into()],
                ..Default::default()
            },
        );
        group.create_bind_group(&mut m).unwrap();
        assert_eq!(group.dynamic_offsets(), vec![256, 512]);
        assert_eq!(m.device().live_buffer_count(), 1);

        group.update(&mut m).unwrap();
        let handle = parent.borrow().buffer().handle().unwrap();
        assert_eq!(m.device().write_count(handle), 1);
        let contents = m.device().buffer_contents(handle).unwrap();
        assert_eq!(&contents[256..260], &4.0f32.to_le_bytes());
        assert_eq!(&contents[512..516], &8.0f32.to_le_bytes());
        for entry in group.group_entries() {
            assert!(matches!(entry.resource, BindingResource::Buffer { buffer, offset: 0, .. } if buffer == handle));
        }
    }

    #[test]
    fn longer_array_gets_a_new_buffer_and_layout() {
        let mut m = manager();
        let declaration = InputBindingParams::new(
            BufferInputs::new().with("w", Input::new(InputType::Array(WgslType::F32), vec![1.0; 4])),
        );
        let mut group = BindGroup::new(
            &mut m,
            BindGroupParams {
                label: "weights".to_string(),
                storages: vec![("weights".to_string(), declaration)],
                ..Default::default()
            },
        );
        group.create_bind_group(&mut m).unwrap();
        group.update(&mut m).unwrap();
        let binding = buffer_of(&group, "weights");
        let old = binding.borrow().buffer().handle().unwrap();
        let old_key = group.layout_cache_key().to_string();

        binding.borrow_mut().set_value("w", vec![2.0f32; 64]);
        group.update(&mut m).unwrap();
        let new = binding.borrow().buffer().handle().unwrap();
        assert_ne!(new, old);
        assert!(m.device().is_destroyed(old));
        assert_eq!(binding.borrow().buffer().size(), 256);
        assert_ne!(group.layout_cache_key(), old_key);
        assert!(group.take_needs_pipeline_flush());
        let contents = m.device().buffer_contents(new).unwrap();
        assert_eq!(contents.len(), 256);
        assert_eq!(&contents[252..256], &2.0f32.to_le_bytes());
        assert!(matches!(
            group.group_entries()[0].resource,
            BindingResource::Buffer { buffer, size: Some(256), .. } if buffer == new
        ));
    }

    #[test]
    fn loose_storage_gets_one_binding_per_field() {
        let mut m = manager();
        let mut declaration = InputBindingParams::new(
            BufferInputs::new()
                .with("positions", Input::new(InputType::Array(WgslType::F32), vec![0.0; 4]))
                .with("velocities", Input::new(InputType::Array(WgslType::F32), vec![0.0; 4])),
        );
        declaration.use_struct = false;
        declaration.access = BufferAccess::ReadWrite;
        let group = BindGroup::new(
            &mut m,
            BindGroupParams {
                label: "simulation".to_string(),
                storages: vec![("particles".to_string(), declaration)],
                ..Default::default()
            },
        );
        assert_eq!(group.bindings().len(), 2);
        for binding in group.bindings() {
            assert_eq!(binding.info().visibility, ShaderStages::COMPUTE);
        }
        assert!(group.get_binding_by_name("velocities").is_some());
    }

    #[test]
    fn restores_after_device_loss() {
        let mut m = manager();
        let mut group = BindGroup::new(&mut m, camera("frame", 2.0));
        group.create_bind_group(&mut m).unwrap();
        group.update(&mut m).unwrap();

        m.lose_device();
        group.lose_context();
        assert_eq!(group.state(), BindGroupState::Uninitialized);
        assert!(group.take_needs_pipeline_flush());

        m.restore_device(RecordingDevice::new());
        group.restore_context(&mut m).unwrap();
        assert_eq!(group.state(), BindGroupState::Ready);
        group.update(&mut m).unwrap();
        let handle = buffer_of(&group, "camera").borrow().buffer().handle().unwrap();
        assert_eq!(
            &m.device().buffer_contents(handle).unwrap()[..4],
            &2.0f32.to_le_bytes()
        );
    }

    #[test]
    fn clone_keeps_layout() {
        let mut m = manager();
        let mut group = BindGroup::new(&mut m, camera("frame", 2.0));
        group.create_bind_group(&mut m).unwrap();
        let copy = group
            .clone_with(
                &mut m,
                BindGroupCloneParams {
                    keep_layout: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(copy.label(), "frame (copy)");
        assert_eq!(copy.bind_group_layout(), group.bind_group_layout());
        assert_ne!(copy.bind_group(), group.bind_group());
        assert_eq!(m.device().live_buffer_count(), 1);
        let binding = buffer_of(&group, "camera");
        assert!(binding.borrow().buffer().consumers().contains(&copy.id()));
    }
}
