/*! Defines binding types.

A binding is one entry of a bind group: a buffer, a sampler or a texture. Every binding carries a
[`BindingInfo`] with its WGSL name, kind and visibility, plus a cache key derived from its shape.
Bindings are shared between bind groups through [`BindingRef`].
*/

pub mod bind_group;
pub mod buffer_binding;
pub mod element;
pub mod gpu_buffer;
pub mod indirect;
pub mod input;
mod offset_child;
pub mod sampler;
pub mod texture;
pub mod visible_to;

pub use bind_group::{BindGroup, BindGroupParams, BindGroupState};
pub use buffer_binding::{BufferBinding, BufferBindingParams, ChildBinding};
pub use sampler::{SamplerBinding, SamplerBindingParams};
pub use texture::{TextureBinding, TextureBindingParams};

use crate::imp::BindingLayout;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use visible_to::ShaderStages;

/// The kind of resource a binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Uniform,
    Storage,
    Sampler,
    Texture,
    StorageTexture,
    Depth,
}

impl BindingKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            BindingKind::Uniform => "uniform",
            BindingKind::Storage => "storage",
            BindingKind::Sampler => "sampler",
            BindingKind::Texture => "texture",
            BindingKind::StorageTexture => "storage-texture",
            BindingKind::Depth => "depth",
        }
    }
}

impl Display for BindingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties every binding has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub label: String,
    /// WGSL variable name, camelCase.
    pub name: String,
    pub kind: BindingKind,
    pub visibility: ShaderStages,
    /// Identifies bindings whose pipelines are interchangeable.
    pub cache_key: String,
}

impl BindingInfo {
    pub fn new(label: &str, name: Option<&str>, kind: BindingKind, visibility: ShaderStages) -> Self {
        BindingInfo {
            label: label.to_string(),
            name: to_camel_case(name.unwrap_or(label)),
            kind,
            visibility,
            cache_key: format!("{},{},", kind.as_str(), visibility.bits()),
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `"clip space"` and `"clip-space"` become `"clipSpace"`.
pub(crate) fn to_camel_case(text: &str) -> String {
    let mut out = String::new();
    for (i, word) in words(text).enumerate() {
        if i == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_lowercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(&capitalized(word));
        }
    }
    out
}

/// `"clip space"` becomes `"ClipSpace"`.
pub(crate) fn to_pascal_case(text: &str) -> String {
    words(text).map(capitalized).collect()
}

/// A shared handle to any binding.
#[derive(Debug, Clone)]
pub enum BindingRef {
    Buffer(Rc<RefCell<BufferBinding>>),
    Sampler(Rc<RefCell<SamplerBinding>>),
    Texture(Rc<RefCell<TextureBinding>>),
}

impl BindingRef {
    pub fn info(&self) -> BindingInfo {
        match self {
            BindingRef::Buffer(b) => b.borrow().info().clone(),
            BindingRef::Sampler(s) => s.borrow().info().clone(),
            BindingRef::Texture(t) => t.borrow().info().clone(),
        }
    }

    pub fn name(&self) -> String {
        self.info().name
    }

    pub fn cache_key(&self) -> String {
        self.info().cache_key
    }

    pub fn resource_layout_cache_key(&self) -> String {
        match self {
            BindingRef::Buffer(b) => b.borrow().resource_layout_cache_key(),
            BindingRef::Sampler(s) => s.borrow().resource_layout_cache_key(),
            BindingRef::Texture(t) => t.borrow().resource_layout_cache_key(),
        }
    }

    pub(crate) fn layout(&self) -> BindingLayout {
        match self {
            BindingRef::Buffer(b) => b.borrow().layout(),
            BindingRef::Sampler(s) => s.borrow().layout(),
            BindingRef::Texture(t) => t.borrow().layout(),
        }
    }

    /// `(resource, layout)` change counters. A bind group rebuilds when either moves.
    pub(crate) fn generations(&self) -> (u64, u64) {
        match self {
            BindingRef::Buffer(b) => b.borrow().generations(),
            BindingRef::Sampler(s) => s.borrow().generations(),
            BindingRef::Texture(t) => t.borrow().generations(),
        }
    }

    pub fn as_buffer(&self) -> Option<&Rc<RefCell<BufferBinding>>> {
        match self {
            BindingRef::Buffer(b) => Some(b),
            _ => None,
        }
    }

    /// Whether both refer to the same binding.
    pub fn ptr_eq(&self, other: &BindingRef) -> bool {
        match (self, other) {
            (BindingRef::Buffer(a), BindingRef::Buffer(b)) => Rc::ptr_eq(a, b),
            (BindingRef::Sampler(a), BindingRef::Sampler(b)) => Rc::ptr_eq(a, b),
            (BindingRef::Texture(a), BindingRef::Texture(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<BufferBinding> for BindingRef {
    fn from(value: BufferBinding) -> Self {
        BindingRef::Buffer(Rc::new(RefCell::new(value)))
    }
}
impl From<SamplerBinding> for BindingRef {
    fn from(value: SamplerBinding) -> Self {
        BindingRef::Sampler(Rc::new(RefCell::new(value)))
    }
}
impl From<TextureBinding> for BindingRef {
    fn from(value: TextureBinding) -> Self {
        BindingRef::Texture(Rc::new(RefCell::new(value)))
    }
}
impl From<Rc<RefCell<BufferBinding>>> for BindingRef {
    fn from(value: Rc<RefCell<BufferBinding>>) -> Self {
        BindingRef::Buffer(value)
    }
}
impl From<Rc<RefCell<SamplerBinding>>> for BindingRef {
    fn from(value: Rc<RefCell<SamplerBinding>>) -> Self {
        BindingRef::Sampler(value)
    }
}
impl From<Rc<RefCell<TextureBinding>>> for BindingRef {
    fn from(value: Rc<RefCell<TextureBinding>>) -> Self {
        BindingRef::Texture(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_conversion() {
        assert_eq!(to_camel_case("clip space"), "clipSpace");
        assert_eq!(to_camel_case("Uniforms"), "uniforms");
        assert_eq!(to_camel_case("model_matrix"), "modelMatrix");
        assert_eq!(to_pascal_case("my-params"), "MyParams");
        assert_eq!(to_pascal_case("Uniforms"), "Uniforms");
    }

    #[test]
    fn base_cache_key() {
        let info = BindingInfo::new(
            "frame uniforms",
            None,
            BindingKind::Uniform,
            ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        );
        assert_eq!(info.name, "frameUniforms");
        assert_eq!(info.cache_key, "uniform,3,");
    }
}
