//! Shader visibility, buffer usage and access declarations.
//!
//! These types describe which shader stages may see a binding, how a GPU buffer will be used,
//! and whether shaders may write to a storage buffer. The numeric values of the flag types match
//! WebGPU, so backends convert them with a plain bit copy.
//!
//! # Examples
//!
//! ```
//! use layouts_and_bindings::bindings::visible_to::{BufferAccess, ShaderStages};
//!
//! let stages = ShaderStages::VERTEX | ShaderStages::FRAGMENT;
//! assert_eq!(stages.bits(), 3);
//! assert_eq!(BufferAccess::ReadWrite.wgsl_access(), "read_write");
//! ```

use std::fmt::{Display, Formatter};

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1;
        const FRAGMENT = 2;
        const COMPUTE = 4;
    }
}

impl Default for ShaderStages {
    fn default() -> Self {
        ShaderStages::all()
    }
}

bitflags::bitflags! {
    /// How a GPU buffer will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsages: u32 {
        const MAP_READ = 1;
        const MAP_WRITE = 2;
        const COPY_SRC = 4;
        const COPY_DST = 8;
        const INDEX = 16;
        const VERTEX = 32;
        const UNIFORM = 64;
        const STORAGE = 128;
        const INDIRECT = 256;
    }
}

/// Whether a buffer binding is a uniform or a storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferBindingKind {
    #[default]
    Uniform,
    Storage,
}

impl BufferBindingKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            BufferBindingKind::Uniform => "uniform",
            BufferBindingKind::Storage => "storage",
        }
    }

    /// The usage every GPU buffer of this kind needs.
    pub fn usage(self) -> BufferUsages {
        match self {
            BufferBindingKind::Uniform => BufferUsages::UNIFORM,
            BufferBindingKind::Storage => BufferUsages::STORAGE,
        }
    }
}

/// Shader access to a storage buffer. Uniform buffers are always [`BufferAccess::Read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferAccess {
    #[default]
    Read,
    ReadWrite,
}

impl BufferAccess {
    pub const fn wgsl_access(self) -> &'static str {
        match self {
            BufferAccess::Read => "read",
            BufferAccess::ReadWrite => "read_write",
        }
    }
}

impl Display for BufferAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wgsl_access())
    }
}

/// The buffer type recorded in a bind group layout entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBindingType {
    Uniform,
    Storage { read_only: bool },
}

impl BufferBindingType {
    pub fn new(kind: BufferBindingKind, access: BufferAccess) -> Self {
        match (kind, access) {
            (BufferBindingKind::Uniform, _) => BufferBindingType::Uniform,
            (BufferBindingKind::Storage, BufferAccess::Read) => {
                BufferBindingType::Storage { read_only: true }
            }
            (BufferBindingKind::Storage, BufferAccess::ReadWrite) => {
                BufferBindingType::Storage { read_only: false }
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BufferBindingType::Uniform => "uniform",
            BufferBindingType::Storage { read_only: true } => "read-only-storage",
            BufferBindingType::Storage { read_only: false } => "storage",
        }
    }

    /// Address space declaration for WGSL, e.g. `var<storage, read>`.
    pub const fn wgsl_var(self) -> &'static str {
        match self {
            BufferBindingType::Uniform => "var<uniform>",
            BufferBindingType::Storage { read_only: true } => "var<storage, read>",
            BufferBindingType::Storage { read_only: false } => "var<storage, read_write>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_types() {
        let read = BufferBindingType::new(BufferBindingKind::Storage, BufferAccess::Read);
        assert_eq!(read.as_str(), "read-only-storage");
        assert_eq!(read.wgsl_var(), "var<storage, read>");
        let uniform = BufferBindingType::new(BufferBindingKind::Uniform, BufferAccess::ReadWrite);
        assert_eq!(uniform, BufferBindingType::Uniform);
        assert_eq!(ShaderStages::default().bits(), 7);
    }
}
