// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Uniform and storage buffer bindings.
//!
//! A [`BufferBinding`] turns a set of named, typed [`Input`](crate::bindings::input::Input)s into
//! a byte store laid out by the WGSL rules, plus the WGSL declarations a shader needs to read it.
//!
//! # Field order
//!
//! Non-array inputs are placed first, in declaration order. A single array input follows them.
//! Several array inputs of equal length are interleaved into one array of structs starting on a
//! fresh row; arrays of unequal length cannot be interleaved and are left out with a warning.
//! Child bindings are appended after everything else.
//!
//! # Example
//!
//! ```
//! use layouts_and_bindings::bindings::input::{BufferInputs, Input};
//! use layouts_and_bindings::bindings::{BufferBinding, BufferBindingParams};
//! use layouts_and_bindings::layout::{InputType, WgslType};
//!
//! let binding = BufferBinding::new(BufferBindingParams {
//!     label: "frame".to_string(),
//!     inputs: BufferInputs::new()
//!         .with("position", Input::new(WgslType::Vec3f, [0.0, 1.0, 2.0]))
//!         .with("time", Input::new(WgslType::F32, 0.25))
//!         .with("weights", Input::new(InputType::Array(WgslType::F32), vec![1.0, 2.0, 3.0, 4.0])),
//!     ..Default::default()
//! });
//! assert_eq!(binding.array_buffer_size(), 32);
//! assert_eq!(binding.elements()[1].start_offset(), 12);
//! assert_eq!(binding.elements()[2].start_offset(), 16);
//! ```

use crate::bindings::element::{AlignmentPosition, BufferElement, ElementData, ElementKind};
use crate::bindings::gpu_buffer::GpuBuffer;
use crate::bindings::input::{BufferInputs, Input, InputValue};
use crate::bindings::visible_to::{
    BufferAccess, BufferBindingKind, BufferBindingType, BufferUsages, ShaderStages,
};
use crate::bindings::{BindingInfo, BindingKind, to_camel_case, to_pascal_case};
use crate::diagnostics::throw_warning;
use crate::error::Error;
use crate::imp::{BindingLayout, Device};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// A nested binding whose store is appended to its parent's.
#[derive(Debug, Clone)]
pub struct ChildBinding {
    pub binding: BufferBinding,
    /// Number of independent copies.
    pub count: usize,
    /// Declare the field as an array even when `count` is 1.
    pub force_array: bool,
}

impl ChildBinding {
    pub fn new(binding: BufferBinding) -> Self {
        ChildBinding {
            binding,
            count: 1,
            force_array: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferBindingParams {
    pub label: String,
    /// WGSL variable name; derived from `label` when absent.
    pub name: Option<String>,
    pub binding_type: BufferBindingKind,
    pub visibility: ShaderStages,
    /// Wrap the fields in a struct. Without it every field becomes its own variable.
    pub use_struct: bool,
    pub access: BufferAccess,
    /// Usages added to the ones every buffer of this kind gets.
    pub usage: BufferUsages,
    pub inputs: BufferInputs,
    pub children: Vec<ChildBinding>,
    /// Allocate a host-mappable copy target for reading results back (writable storage only).
    pub should_copy_result: bool,
    /// Store this binding inside a slice of the parent's buffer.
    pub parent: Option<Rc<RefCell<BufferBinding>>>,
    pub offset_index: usize,
    pub min_offset: usize,
    pub use_dynamic_offset: bool,
}

impl Default for BufferBindingParams {
    fn default() -> Self {
        BufferBindingParams {
            label: String::new(),
            name: None,
            binding_type: BufferBindingKind::Uniform,
            visibility: ShaderStages::all(),
            use_struct: true,
            access: BufferAccess::Read,
            usage: BufferUsages::empty(),
            inputs: BufferInputs::new(),
            children: Vec::new(),
            should_copy_result: false,
            parent: None,
            offset_index: 0,
            min_offset: 256,
            use_dynamic_offset: false,
        }
    }
}

#[derive(Debug, Clone)]
struct ChildField {
    name: String,
    struct_name: String,
    count: usize,
    as_array: bool,
    struct_fragment: String,
}

#[derive(Debug)]
pub struct BufferBinding {
    info: BindingInfo,
    binding_type: BufferBindingKind,
    use_struct: bool,
    access: BufferAccess,
    usage: BufferUsages,
    should_copy_result: bool,
    inputs: BufferInputs,
    elements: Vec<BufferElement>,
    child_specs: Vec<ChildBinding>,
    children: Vec<BufferBinding>,
    child_offsets: Vec<usize>,
    child_fields: Vec<ChildField>,
    pub(crate) array_buffer: Vec<u8>,
    pub(crate) should_update: bool,
    pub(crate) buffer: GpuBuffer,
    pub(crate) result_buffer: Option<GpuBuffer>,
    wgsl_struct_fragment: String,
    wgsl_group_fragment: Vec<String>,
    pub(crate) parent: Option<Weak<RefCell<BufferBinding>>>,
    pub(crate) offset_index: usize,
    pub(crate) min_offset: usize,
    pub(crate) use_dynamic_offset: bool,
    pub(crate) resource_generation: u64,
    layout_generation: u64,
    shape_key: String,
    /// Bumped whenever `update` writes this binding's own fields or reallocates the store.
    pub(crate) store_epoch: u64,
    /// The parent's `store_epoch` when this slice was last copied into it.
    pub(crate) seen_parent_epoch: u64,
}

impl Clone for BufferBinding {
    /// Same as `clone_with(self.params())`: identical layout, fresh store and GPU buffer.
    fn clone(&self) -> Self {
        self.clone_with(self.params())
    }
}

impl BufferBinding {
    pub fn new(params: BufferBindingParams) -> Self {
        let mut binding = BufferBinding::empty(&params);
        binding.inputs = params.inputs;
        binding.child_specs = params.children;
        if !binding.inputs.is_empty() {
            binding.set_inputs_alignment();
        }
        binding.set_children();
        binding.set_buffer_attributes();
        binding.set_wgsl_fragment();
        binding.shape_key = Self::shape_key_for(&binding.inputs, &binding.child_specs);
        if let Some(parent) = &params.parent {
            binding.attach_parent(parent);
        }
        binding
    }

    fn empty(params: &BufferBindingParams) -> Self {
        let mut info = BindingInfo::new(
            &params.label,
            params.name.as_deref(),
            BindingKind::from(params.binding_type),
            params.visibility,
        );
        info.cache_key = Self::cache_key_for(params);
        BufferBinding {
            info,
            binding_type: params.binding_type,
            use_struct: params.use_struct,
            access: params.access,
            usage: params.usage,
            should_copy_result: params.should_copy_result && params.access == BufferAccess::ReadWrite,
            inputs: BufferInputs::new(),
            elements: Vec::new(),
            child_specs: Vec::new(),
            children: Vec::new(),
            child_offsets: Vec::new(),
            child_fields: Vec::new(),
            array_buffer: Vec::new(),
            should_update: false,
            buffer: GpuBuffer::default(),
            result_buffer: None,
            wgsl_struct_fragment: String::new(),
            wgsl_group_fragment: Vec::new(),
            parent: None,
            offset_index: params.offset_index,
            min_offset: params.min_offset,
            use_dynamic_offset: params.use_dynamic_offset,
            resource_generation: 0,
            layout_generation: 0,
            shape_key: String::new(),
            store_epoch: 0,
            seen_parent_epoch: 0,
        }
    }

    /// The key a binding built from `params` would get.
    ///
    /// Two bindings with the same key have the same layout, so one can be built from the other
    /// with [`BufferBinding::clone_with`].
    pub fn cache_key_for(params: &BufferBindingParams) -> String {
        let kind = BindingKind::from(params.binding_type);
        let mut key = format!(
            "{},{},{},{},",
            kind.as_str(),
            params.visibility.bits(),
            params.use_struct,
            params.access
        );
        key.push_str(&Self::shape_key_for(&params.inputs, &params.children));
        if params.access == BufferAccess::ReadWrite {
            key.push_str(&format!("{},", params.should_copy_result));
        }
        key
    }

    /// Field names, types, array lengths and children: everything that decides the layout of the
    /// store, and nothing that depends on values.
    fn shape_key_for(inputs: &BufferInputs, children: &[ChildBinding]) -> String {
        let mut key = String::new();
        for (input_key, input) in inputs.iter() {
            key.push_str(&format!("{input_key},{},", input.ty()));
            if input.ty().is_array() {
                key.push_str(&format!("{},", input.value().len()));
            }
        }
        for child in children {
            key.push_str(&format!(
                "[{}{}x{}]",
                if child.force_array { "array," } else { "" },
                child.count,
                child.binding.info.cache_key
            ));
        }
        key
    }

    /// Parameters that rebuild this binding, current input values included.
    pub fn params(&self) -> BufferBindingParams {
        BufferBindingParams {
            label: self.info.label.clone(),
            name: Some(self.info.name.clone()),
            binding_type: self.binding_type,
            visibility: self.info.visibility,
            use_struct: self.use_struct,
            access: self.access,
            usage: self.usage,
            inputs: self.inputs.clone(),
            children: self.child_specs.clone(),
            should_copy_result: self.should_copy_result,
            parent: self.parent_binding(),
            offset_index: self.offset_index,
            min_offset: self.min_offset,
            use_dynamic_offset: self.use_dynamic_offset,
        }
    }

    pub fn info(&self) -> &BindingInfo {
        &self.info
    }

    pub fn binding_type(&self) -> BufferBindingKind {
        self.binding_type
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    pub fn usage(&self) -> BufferUsages {
        self.usage
    }

    pub fn inputs(&self) -> &BufferInputs {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut BufferInputs {
        &mut self.inputs
    }

    /// Shortcut for `inputs_mut().get_mut(key)`.
    pub fn input_mut(&mut self, key: &str) -> Option<&mut Input> {
        self.inputs.get_mut(key)
    }

    /// Replaces the value under `key`; it is written on the next update.
    ///
    /// Returns false when there is no such input.
    pub fn set_value(&mut self, key: &str, value: impl Into<InputValue>) -> bool {
        match self.inputs.get_mut(key) {
            Some(input) => {
                input.set_value(value);
                true
            }
            None => false,
        }
    }

    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    pub fn children(&self) -> &[BufferBinding] {
        &self.children
    }

    /// Byte offset of each child inside this binding's store.
    pub fn child_offsets(&self) -> &[usize] {
        &self.child_offsets
    }

    pub fn array_buffer(&self) -> &[u8] {
        &self.array_buffer
    }

    pub fn array_buffer_size(&self) -> usize {
        self.array_buffer.len()
    }

    pub fn should_update(&self) -> bool {
        self.should_update
    }

    pub fn should_copy_result(&self) -> bool {
        self.should_copy_result
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    pub fn result_buffer(&self) -> Option<&GpuBuffer> {
        self.result_buffer.as_ref()
    }

    /// Struct declarations, empty without `use_struct`.
    pub fn wgsl_struct_fragment(&self) -> &str {
        &self.wgsl_struct_fragment
    }

    /// Variable declarations, without `@group`/`@binding` attributes.
    pub fn wgsl_group_fragment(&self) -> &[String] {
        &self.wgsl_group_fragment
    }

    pub fn resource_layout_cache_key(&self) -> String {
        let ty = BufferBindingType::new(self.binding_type, self.access);
        format!(
            "buffer,{},{},{}{}",
            ty.as_str(),
            self.info.visibility.bits(),
            self.shape_key,
            if self.use_dynamic_offset { "dynamic," } else { "" }
        )
    }

    /// `(resource, layout)` change counters.
    ///
    /// Moving the binding between buffers (or reallocating the parent's) bumps the first; a new
    /// field set or array length bumps both.
    pub(crate) fn generations(&self) -> (u64, u64) {
        //an offset child also moves when its parent's buffer is reallocated
        let parent = self
            .parent_binding()
            .and_then(|parent| parent.try_borrow().map(|p| p.resource_generation).ok())
            .unwrap_or(0);
        (self.resource_generation + parent, self.layout_generation)
    }

    pub(crate) fn layout(&self) -> BindingLayout {
        BindingLayout::Buffer {
            ty: BufferBindingType::new(self.binding_type, self.access),
            has_dynamic_offset: self.use_dynamic_offset,
            min_binding_size: None,
        }
    }

    /// Usage for the GPU buffer backing this binding.
    pub(crate) fn buffer_usage(&self) -> BufferUsages {
        BufferUsages::COPY_SRC | BufferUsages::COPY_DST | self.binding_type.usage() | self.usage
    }

    /// Places every input and builds the element list.
    fn set_inputs_alignment(&mut self) {
        let mut elements: Vec<BufferElement> = Vec::new();
        let mut arrays: Vec<(&str, &Input)> = Vec::new();
        for (key, input) in self.inputs.iter() {
            if input.ty().is_array() {
                arrays.push((key, input));
            } else {
                elements.push(BufferElement::new(Self::element_name(key, input), key, input.ty()));
            }
        }
        if let [(key, input)] = arrays.as_slice() {
            elements.push(BufferElement::array(
                Self::element_name(key, input),
                *key,
                input.ty(),
                input.value().len(),
            ));
        }
        for i in 0..elements.len() {
            let start = match i {
                0 => 0,
                _ => elements[i - 1].end_offset() + 1,
            };
            elements[i].set_alignment(start);
        }

        if arrays.len() > 1 {
            let entries: Vec<usize> = arrays
                .iter()
                .map(|(_, input)| {
                    crate::bittricks::ceil_div(input.value().len(), input.ty().layout().logical_len())
                })
                .collect();
            if entries.windows(2).all(|pair| pair[0] == pair[1]) {
                let group = Self::interleave(&arrays, elements.last());
                elements.extend(group);
            } else {
                let keys: Vec<&str> = arrays.iter().map(|(key, _)| *key).collect();
                throw_warning(&format!(
                    "arrays {keys:?} of binding `{}` have different lengths and cannot be interleaved; they were left out",
                    self.info.label
                ));
            }
        }
        self.elements = elements;
    }

    /// Lays out equal-length arrays as one array of structs after `previous`.
    fn interleave(arrays: &[(&str, &Input)], previous: Option<&BufferElement>) -> Vec<BufferElement> {
        let group_start = previous
            .map(|last| (last.alignment().end.row + 1) * 16)
            .unwrap_or(0);
        //one plain entry of each array, packed like struct members
        let mut members: Vec<BufferElement> = Vec::with_capacity(arrays.len());
        for (key, input) in arrays {
            let mut member = BufferElement::new(*key, *key, input.ty());
            let start = members
                .last()
                .map(|m: &BufferElement| m.end_offset() + 1)
                .unwrap_or(group_start);
            member.set_alignment(start);
            members.push(member);
        }
        let first_row = AlignmentPosition::at_offset(group_start).row;
        let last_row = members
            .last()
            .map(|m| m.alignment().end.row)
            .unwrap_or(first_row);
        let stride = (last_row + 1 - first_row) * 16;

        arrays
            .iter()
            .zip(&members)
            .map(|((key, input), member)| {
                let mut element = BufferElement::interleaved(
                    Self::element_name(key, input),
                    *key,
                    input.ty(),
                    input.value().len(),
                );
                element.set_interleaved_alignment(member.start_offset(), stride);
                element
            })
            .collect()
    }

    fn element_name(key: &str, input: &Input) -> String {
        to_camel_case(input.name().unwrap_or(key))
    }

    /// Instantiates each child declaration `count` times.
    fn set_children(&mut self) {
        self.children.clear();
        self.child_fields.clear();
        for spec in &self.child_specs {
            let count = spec.count.max(1);
            for _ in 0..count {
                self.children.push(spec.binding.clone());
            }
            self.child_fields.push(ChildField {
                name: spec.binding.info.name.clone(),
                struct_name: to_pascal_case(&spec.binding.info.label),
                count,
                as_array: count > 1 || spec.force_array,
                struct_fragment: spec.binding.wgsl_struct_fragment.clone(),
            });
        }
    }

    /// Sizes the byte store: own elements, then each child in turn.
    fn set_buffer_attributes(&mut self) {
        let mut size = self
            .elements
            .iter()
            .map(BufferElement::padded_byte_count)
            .max()
            .unwrap_or(0);
        self.child_offsets.clear();
        for child in &self.children {
            self.child_offsets.push(size);
            size += child.array_buffer_size();
        }
        self.array_buffer = vec![0; size];
        self.buffer.set_size(size as u64);
        if let Some(result) = &mut self.result_buffer {
            result.set_size(size as u64);
        }
        self.should_update = size > 0;
    }

    fn set_wgsl_fragment(&mut self) {
        let var = BufferBindingType::new(self.binding_type, self.access).wgsl_var();
        //runtime-sized arrays must be the last member; children come after them
        let sized = self.binding_type == BufferBindingKind::Uniform || !self.children.is_empty();
        self.wgsl_struct_fragment.clear();
        self.wgsl_group_fragment.clear();

        if !self.use_struct {
            for element in &self.elements {
                self.wgsl_group_fragment.push(format!(
                    "{var} {}: {};",
                    element.name(),
                    element.wgsl_type(sized)
                ));
            }
            return;
        }

        let struct_name = to_pascal_case(&self.info.label);
        let mut structs: Vec<String> = Vec::new();
        for field in &self.child_fields {
            if !field.struct_fragment.is_empty() && !structs.contains(&field.struct_fragment) {
                structs.push(field.struct_fragment.clone());
            }
        }
        let array_of = |ty: &str, count: usize| match sized {
            true => format!("array<{ty}, {count}>"),
            false => format!("array<{ty}>"),
        };

        let mut members: Vec<String> = self
            .elements
            .iter()
            .filter(|e| !matches!(e.kind(), ElementKind::Interleaved(_)))
            .map(|e| format!("{}: {}", e.name(), e.wgsl_type(sized)))
            .collect();
        let interleaved: Vec<&BufferElement> = self
            .elements
            .iter()
            .filter(|e| matches!(e.kind(), ElementKind::Interleaved(_)))
            .collect();
        if let Some(ElementKind::Interleaved(info)) = interleaved.first().map(|e| e.kind()) {
            let element_struct = format!("{struct_name}Element");
            let fields: Vec<String> = interleaved
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    //keeps the WGSL stride on whole rows
                    let align = if i == 0 { "@align(16) " } else { "" };
                    format!("\t{align}{}: {}", e.name(), e.wgsl_type(sized))
                })
                .collect();
            structs.push(format!("struct {element_struct} {{\n{}\n}};", fields.join(",\n")));
            let array = array_of(&element_struct, info.num_elements);
            if members.is_empty() && self.child_fields.is_empty() {
                self.wgsl_struct_fragment = structs.join("\n\n");
                self.wgsl_group_fragment
                    .push(format!("{var} {}: {array};", self.info.name));
                return;
            }
            let field = match self.elements.iter().any(|e| e.name() == "elements") {
                true => format!("{}Elements", self.info.name),
                false => "elements".to_string(),
            };
            members.push(format!("{field}: {array}"));
        }
        for field in &self.child_fields {
            let ty = match field.as_array {
                true => format!("array<{}, {}>", field.struct_name, field.count),
                false => field.struct_name.clone(),
            };
            members.push(format!("{}: {ty}", field.name));
        }
        let members: Vec<String> = members.into_iter().map(|m| format!("\t{m}")).collect();
        structs.push(format!("struct {struct_name} {{\n{}\n}};", members.join(",\n")));
        self.wgsl_struct_fragment = structs.join("\n\n");
        self.wgsl_group_fragment
            .push(format!("{var} {}: {struct_name};", self.info.name));
    }

    /// Serializes dirty inputs and children into the store.
    ///
    /// Sets the dirty flag when anything was written; the bind group uploads the store and clears
    /// it. An offset child also copies its bytes into the parent's store.
    pub fn update(&mut self) {
        //only a dirty input can carry a new key or a new array length
        if self.inputs.iter().any(|(_, input)| input.should_update()) {
            let shape = Self::shape_key_for(&self.inputs, &self.child_specs);
            if shape != self.shape_key {
                self.rebuild_layout(shape);
            }
        }
        let mut wrote = false;
        for (key, input) in self.inputs.iter_mut() {
            if !input.should_update() {
                continue;
            }
            let Some(element) = self.elements.iter().find(|e| e.key() == key) else {
                continue;
            };
            element.update(input.take_update(), &mut self.array_buffer);
            wrote = true;
        }
        for (child, offset) in self.children.iter_mut().zip(&self.child_offsets) {
            child.update();
            if !child.should_update {
                continue;
            }
            let end = offset + child.array_buffer.len();
            if let Some(region) = self.array_buffer.get_mut(*offset..end) {
                region.copy_from_slice(&child.array_buffer);
            }
            child.should_update = false;
            wrote = true;
        }
        if wrote {
            self.should_update = true;
            self.store_epoch += 1;
        }
        if self.parent.is_some() {
            self.write_into_parent();
        }
    }

    /// Lays the binding out again for a changed field set, on a fresh zeroed store.
    ///
    /// Every input is rewritten on the same update. The bind group sees both generations move and
    /// recreates the GPU buffer, the layout and the group.
    fn rebuild_layout(&mut self, shape: String) {
        logwise::info_sync!(
            "fields of {label} changed, reallocating its store",
            label = logwise::privacy::LogIt(&self.info.label)
        );
        self.elements.clear();
        if !self.inputs.is_empty() {
            self.set_inputs_alignment();
        }
        self.set_children();
        self.set_buffer_attributes();
        self.set_wgsl_fragment();
        self.shape_key = shape;
        self.info.cache_key = Self::cache_key_for(&self.params());
        for (_, input) in self.inputs.iter_mut() {
            input.mark_dirty();
        }
        self.store_epoch += 1;
        self.resource_generation += 1;
        self.layout_generation += 1;
    }

    /// Marks the input under `key` dirty, for values mutated behind the binding's back.
    ///
    /// Returns false when there is no such input.
    pub fn should_update_binding(&mut self, key: &str) -> bool {
        match self.inputs.get_mut(key) {
            Some(input) => {
                input.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Builds a binding with this binding's layout and the values (and names) in `params`.
    ///
    /// An empty `params.inputs` keeps this binding's inputs. The copy gets its own store and
    /// GPU buffer, and every input is marked dirty.
    pub fn clone_with(&self, mut params: BufferBindingParams) -> BufferBinding {
        if params.inputs.is_empty() {
            params.inputs = self.inputs.clone();
        }
        for (_, input) in params.inputs.iter_mut() {
            input.mark_dirty();
        }
        let mut binding = BufferBinding::empty(&params);
        binding.inputs = params.inputs;
        binding.child_specs = self.child_specs.clone();
        binding.elements = self.elements.clone();
        binding.children = self.children.iter().map(BufferBinding::clone).collect();
        binding.child_offsets = self.child_offsets.clone();
        binding.child_fields = self.child_fields.clone();
        binding.array_buffer = vec![0; self.array_buffer.len()];
        binding.buffer = GpuBuffer::new(self.array_buffer.len() as u64);
        binding.should_update = !binding.array_buffer.is_empty();
        binding.shape_key = self.shape_key.clone();
        if binding.info.name == self.info.name && binding.info.label == self.info.label {
            binding.wgsl_struct_fragment = self.wgsl_struct_fragment.clone();
            binding.wgsl_group_fragment = self.wgsl_group_fragment.clone();
        } else {
            binding.set_wgsl_fragment();
        }
        if let Some(parent) = &params.parent {
            binding.attach_parent(parent);
        }
        binding
    }

    /// Reads one field out of `result`, a read-back image of this binding's buffer.
    ///
    /// `name` uses the keys of [`BufferBinding::extract_buffer_result`].
    pub fn extract_buffer_element_data_from_buffer_result(
        &self,
        result: &[u8],
        name: &str,
    ) -> Option<ElementData> {
        match self.elements.iter().find(|e| e.name() == name) {
            Some(element) => Some(element.extract(result)),
            None => self.extract_buffer_result(result).remove(name),
        }
    }

    /// Reads the value of every element (and every child's elements) out of `result`.
    ///
    /// Child fields are keyed `child.field`, or `child[i].field` for repeated children.
    pub fn extract_buffer_result(&self, result: &[u8]) -> HashMap<String, ElementData> {
        let mut data: HashMap<String, ElementData> = self
            .elements
            .iter()
            .map(|e| (e.name().to_string(), e.extract(result)))
            .collect();
        let mut children = self.children.iter().zip(&self.child_offsets);
        for field in &self.child_fields {
            for i in 0..field.count {
                let Some((child, offset)) = children.next() else {
                    break;
                };
                let prefix = match field.as_array {
                    true => format!("{}[{i}]", field.name),
                    false => field.name.clone(),
                };
                let region = result.get(*offset..).unwrap_or(&[]);
                for (name, value) in child.extract_buffer_result(region) {
                    data.insert(format!("{prefix}.{name}"), value);
                }
            }
        }
        data
    }

    /// Copies the GPU buffer into the result buffer. Call after the compute pass that wrote it.
    pub fn copy_result<D: Device + ?Sized>(&self, device: &mut D) {
        let (Some(source), Some(destination)) = (
            self.buffer.handle(),
            self.result_buffer.as_ref().and_then(GpuBuffer::handle),
        ) else {
            return;
        };
        device.copy_buffer_to_buffer(source, destination, self.array_buffer.len() as u64);
    }

    /// Maps the result buffer and decodes it.
    pub async fn map_result_async<D: Device + ?Sized>(
        &self,
        device: &mut D,
    ) -> Result<HashMap<String, ElementData>, Error> {
        let result = self
            .result_buffer
            .as_ref()
            .filter(|b| b.handle().is_some())
            .ok_or_else(|| Error::NoBuffer(self.info.label.clone()))?;
        let bytes = result.map_buffer_async(device).await?;
        Ok(self.extract_buffer_result(&bytes))
    }
}

impl From<BufferBindingKind> for BindingKind {
    fn from(value: BufferBindingKind) -> Self {
        match value {
            BufferBindingKind::Uniform => BindingKind::Uniform,
            BufferBindingKind::Storage => BindingKind::Storage,
        }
    }
}
