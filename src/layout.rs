// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! WGSL memory-layout rules.
//!
//! This module is the lookup table that every other part of the crate builds on. It maps a
//! WGSL scalar, vector or matrix type onto the number of components it stores, the alignment
//! it requires inside a uniform/storage buffer, its byte size, and (for matrices whose columns
//! hold 3 components) the padding inserted after every column.
//!
//! The values come straight from the WGSL "Memory Layout" tables and never change at runtime.
//!
//! # Example
//!
//! ```
//! use layouts_and_bindings::layout::{layout_of, WgslType};
//!
//! let vec3 = layout_of(WgslType::Vec3f);
//! assert_eq!(vec3.alignment, 16);
//! assert_eq!(vec3.size, 12);
//!
//! let mat3 = layout_of(WgslType::Mat3x3f);
//! assert_eq!(mat3.size, 48);
//! assert_eq!(mat3.padding, Some([3, 1]));
//! ```

use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How the bytes of one component are interpreted.
///
/// `bool` has no host-shareable representation in WGSL, so it is stored as a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    F32,
    I32,
    U32,
    F16,
}

impl ViewKind {
    /// Bytes occupied by one component.
    pub const fn bytes_per_component(self) -> usize {
        match self {
            ViewKind::F16 => 2,
            _ => 4,
        }
    }
}

/// Layout information for one WGSL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Number of component slots, padding slots included.
    pub num_elements: usize,
    /// Required byte alignment.
    pub alignment: usize,
    /// Byte size.
    pub size: usize,
    /// `[written, skipped]` component pattern for matrices with 3-row columns.
    pub padding: Option<[usize; 2]>,
    pub view: ViewKind,
}

impl LayoutEntry {
    const fn new(num_elements: usize, alignment: usize, size: usize, view: ViewKind) -> Self {
        LayoutEntry {
            num_elements,
            alignment,
            size,
            padding: None,
            view,
        }
    }
    const fn padded(num_elements: usize, alignment: usize, size: usize, view: ViewKind) -> Self {
        LayoutEntry {
            num_elements,
            alignment,
            size,
            padding: Some([3, 1]),
            view,
        }
    }

    /// Number of values a caller supplies for this type, i.e. `num_elements` without padding slots.
    pub const fn logical_len(&self) -> usize {
        match self.padding {
            Some([written, skipped]) => self.num_elements / (written + skipped) * written,
            None => self.num_elements,
        }
    }

    /// Maps the index of a logical value onto the component slot it occupies.
    pub const fn slot_for(&self, logical_index: usize) -> usize {
        match self.padding {
            Some([written, skipped]) => {
                (logical_index / written) * (written + skipped) + logical_index % written
            }
            None => logical_index,
        }
    }
}

/// The WGSL types a buffer field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WgslType {
    Bool,
    I32,
    U32,
    F32,
    F16,
    Vec2f,
    Vec2i,
    Vec2u,
    Vec2h,
    Vec3f,
    Vec3i,
    Vec3u,
    Vec3h,
    Vec4f,
    Vec4i,
    Vec4u,
    Vec4h,
    Mat2x2f,
    Mat2x2h,
    Mat3x2f,
    Mat3x2h,
    Mat4x2f,
    Mat4x2h,
    Mat2x3f,
    Mat2x3h,
    Mat3x3f,
    Mat3x3h,
    Mat4x3f,
    Mat4x3h,
    Mat2x4f,
    Mat2x4h,
    Mat3x4f,
    Mat3x4h,
    Mat4x4f,
    Mat4x4h,
}

impl WgslType {
    /// Every supported type, in table order.
    pub const ALL: &'static [WgslType] = &[
        WgslType::Bool,
        WgslType::I32,
        WgslType::U32,
        WgslType::F32,
        WgslType::F16,
        WgslType::Vec2f,
        WgslType::Vec2i,
        WgslType::Vec2u,
        WgslType::Vec2h,
        WgslType::Vec3f,
        WgslType::Vec3i,
        WgslType::Vec3u,
        WgslType::Vec3h,
        WgslType::Vec4f,
        WgslType::Vec4i,
        WgslType::Vec4u,
        WgslType::Vec4h,
        WgslType::Mat2x2f,
        WgslType::Mat2x2h,
        WgslType::Mat3x2f,
        WgslType::Mat3x2h,
        WgslType::Mat4x2f,
        WgslType::Mat4x2h,
        WgslType::Mat2x3f,
        WgslType::Mat2x3h,
        WgslType::Mat3x3f,
        WgslType::Mat3x3h,
        WgslType::Mat4x3f,
        WgslType::Mat4x3h,
        WgslType::Mat2x4f,
        WgslType::Mat2x4h,
        WgslType::Mat3x4f,
        WgslType::Mat3x4h,
        WgslType::Mat4x4f,
        WgslType::Mat4x4h,
    ];

    /// Short WGSL spelling, e.g. `vec3f`.
    pub const fn wgsl_name(self) -> &'static str {
        match self {
            WgslType::Bool => "bool",
            WgslType::I32 => "i32",
            WgslType::U32 => "u32",
            WgslType::F32 => "f32",
            WgslType::F16 => "f16",
            WgslType::Vec2f => "vec2f",
            WgslType::Vec2i => "vec2i",
            WgslType::Vec2u => "vec2u",
            WgslType::Vec2h => "vec2h",
            WgslType::Vec3f => "vec3f",
            WgslType::Vec3i => "vec3i",
            WgslType::Vec3u => "vec3u",
            WgslType::Vec3h => "vec3h",
            WgslType::Vec4f => "vec4f",
            WgslType::Vec4i => "vec4i",
            WgslType::Vec4u => "vec4u",
            WgslType::Vec4h => "vec4h",
            WgslType::Mat2x2f => "mat2x2f",
            WgslType::Mat2x2h => "mat2x2h",
            WgslType::Mat3x2f => "mat3x2f",
            WgslType::Mat3x2h => "mat3x2h",
            WgslType::Mat4x2f => "mat4x2f",
            WgslType::Mat4x2h => "mat4x2h",
            WgslType::Mat2x3f => "mat2x3f",
            WgslType::Mat2x3h => "mat2x3h",
            WgslType::Mat3x3f => "mat3x3f",
            WgslType::Mat3x3h => "mat3x3h",
            WgslType::Mat4x3f => "mat4x3f",
            WgslType::Mat4x3h => "mat4x3h",
            WgslType::Mat2x4f => "mat2x4f",
            WgslType::Mat2x4h => "mat2x4h",
            WgslType::Mat3x4f => "mat3x4f",
            WgslType::Mat3x4h => "mat3x4h",
            WgslType::Mat4x4f => "mat4x4f",
            WgslType::Mat4x4h => "mat4x4h",
        }
    }

    pub fn is_matrix(self) -> bool {
        self.wgsl_name().starts_with("mat")
    }
}

impl Display for WgslType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wgsl_name())
    }
}

/// Looks up the layout of `ty`.
pub const fn layout_of(ty: WgslType) -> LayoutEntry {
    use ViewKind::*;
    match ty {
        WgslType::Bool | WgslType::U32 => LayoutEntry::new(1, 4, 4, U32),
        WgslType::I32 => LayoutEntry::new(1, 4, 4, I32),
        WgslType::F32 => LayoutEntry::new(1, 4, 4, F32),
        WgslType::F16 => LayoutEntry::new(1, 2, 2, F16),

        WgslType::Vec2f => LayoutEntry::new(2, 8, 8, F32),
        WgslType::Vec2i => LayoutEntry::new(2, 8, 8, I32),
        WgslType::Vec2u => LayoutEntry::new(2, 8, 8, U32),
        WgslType::Vec2h => LayoutEntry::new(2, 4, 4, F16),

        WgslType::Vec3f => LayoutEntry::new(3, 16, 12, F32),
        WgslType::Vec3i => LayoutEntry::new(3, 16, 12, I32),
        WgslType::Vec3u => LayoutEntry::new(3, 16, 12, U32),
        WgslType::Vec3h => LayoutEntry::new(3, 8, 6, F16),

        WgslType::Vec4f => LayoutEntry::new(4, 16, 16, F32),
        WgslType::Vec4i => LayoutEntry::new(4, 16, 16, I32),
        WgslType::Vec4u => LayoutEntry::new(4, 16, 16, U32),
        WgslType::Vec4h => LayoutEntry::new(4, 8, 8, F16),

        WgslType::Mat2x2f => LayoutEntry::new(4, 8, 16, F32),
        WgslType::Mat2x2h => LayoutEntry::new(4, 4, 8, F16),
        WgslType::Mat3x2f => LayoutEntry::new(6, 8, 24, F32),
        WgslType::Mat3x2h => LayoutEntry::new(6, 4, 12, F16),
        WgslType::Mat4x2f => LayoutEntry::new(8, 8, 32, F32),
        WgslType::Mat4x2h => LayoutEntry::new(8, 4, 16, F16),

        WgslType::Mat2x3f => LayoutEntry::padded(8, 16, 32, F32),
        WgslType::Mat2x3h => LayoutEntry::padded(8, 8, 16, F16),
        WgslType::Mat3x3f => LayoutEntry::padded(12, 16, 48, F32),
        WgslType::Mat3x3h => LayoutEntry::padded(12, 8, 24, F16),
        WgslType::Mat4x3f => LayoutEntry::padded(16, 16, 64, F32),
        WgslType::Mat4x3h => LayoutEntry::padded(16, 8, 32, F16),

        WgslType::Mat2x4f => LayoutEntry::new(8, 16, 32, F32),
        WgslType::Mat2x4h => LayoutEntry::new(8, 8, 16, F16),
        WgslType::Mat3x4f => LayoutEntry::new(12, 16, 48, F32),
        WgslType::Mat3x4h => LayoutEntry::new(12, 8, 24, F16),
        WgslType::Mat4x4f => LayoutEntry::new(16, 16, 64, F32),
        WgslType::Mat4x4h => LayoutEntry::new(16, 8, 32, F16),
    }
}

impl FromStr for WgslType {
    type Err = Error;

    /// Parses both the short (`vec3f`) and the long (`vec3<f32>`) spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let short = match compact.split_once('<') {
            Some((head, tail)) => {
                let inner = tail
                    .strip_suffix('>')
                    .ok_or_else(|| Error::UnknownType(s.to_string()))?;
                let suffix = match inner {
                    "f32" => "f",
                    "i32" => "i",
                    "u32" => "u",
                    "f16" => "h",
                    _ => return Err(Error::UnknownType(s.to_string())),
                };
                format!("{head}{suffix}")
            }
            None => compact,
        };
        WgslType::ALL
            .iter()
            .copied()
            .find(|ty| ty.wgsl_name() == short)
            .ok_or_else(|| Error::UnknownType(s.to_string()))
    }
}

/// The declared type of one buffer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    /// A single value.
    Plain(WgslType),
    /// `array<T>`; the length is taken from the input's value.
    Array(WgslType),
    /// `atomic<T>`, storage buffers only.
    Atomic(WgslType),
}

impl InputType {
    pub const fn base(self) -> WgslType {
        match self {
            InputType::Plain(ty) | InputType::Array(ty) | InputType::Atomic(ty) => ty,
        }
    }
    pub const fn is_array(self) -> bool {
        matches!(self, InputType::Array(_))
    }
    pub const fn layout(self) -> LayoutEntry {
        layout_of(self.base())
    }
}

impl From<WgslType> for InputType {
    fn from(value: WgslType) -> Self {
        InputType::Plain(value)
    }
}

impl Display for InputType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputType::Plain(ty) => write!(f, "{ty}"),
            InputType::Array(ty) => write!(f, "array<{ty}>"),
            InputType::Atomic(ty) => write!(f, "atomic<{ty}>"),
        }
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(inner) = trimmed
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            //fixed-size spellings like `array<f32, 4>` carry their length in the value instead
            let element = inner.split(',').next().unwrap_or(inner);
            return Ok(InputType::Array(element.parse()?));
        }
        if let Some(inner) = trimmed
            .strip_prefix("atomic<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            let ty: WgslType = inner.parse()?;
            return match ty {
                WgslType::U32 | WgslType::I32 => Ok(InputType::Atomic(ty)),
                _ => Err(Error::UnknownType(s.to_string())),
            };
        }
        Ok(InputType::Plain(trimmed.parse()?))
    }
}
