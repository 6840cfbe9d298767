// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Placement of one input inside a buffer.

A [`BufferElement`] knows where its field starts and ends in the binding's byte store, and how to
serialize a host value into that range and read it back. Positions are expressed on a grid of
16-byte rows.

Three kinds of element exist:

* scalar elements hold one WGSL value;
* array elements hold consecutive entries separated by a fixed stride;
* interleaved elements are one member of an array-of-structs group, where every member shares the
  stride of the whole struct.

# Placement rules

A field is first aligned to its type's alignment. A field of at most 16 bytes that would then
straddle a row boundary moves to the start of the next row; a larger field always starts a row.

```
use layouts_and_bindings::bindings::element::BufferElement;
use layouts_and_bindings::layout::WgslType;

let mut position = BufferElement::new("position", "position", WgslType::Vec3f.into());
position.set_alignment(0);
assert_eq!((position.start_offset(), position.end_offset()), (0, 11));

let mut time = BufferElement::new("time", "time", WgslType::F32.into());
time.set_alignment(12);
assert_eq!((time.start_offset(), time.end_offset()), (12, 15));
assert_eq!(time.padded_byte_count(), 16);
```
*/

use crate::bittricks::{ceil_div, round_up};
use crate::bindings::input::InputValue;
use crate::diagnostics::throw_warning;
use crate::layout::{InputType, LayoutEntry, ViewKind};
use std::ops::Range;

pub const BYTES_PER_ROW: usize = 16;

/// A byte position on the 16-byte row grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AlignmentPosition {
    pub row: usize,
    pub byte: usize,
}

impl AlignmentPosition {
    pub const fn at_offset(offset: usize) -> Self {
        AlignmentPosition {
            row: offset / BYTES_PER_ROW,
            byte: offset % BYTES_PER_ROW,
        }
    }

    /// Absolute byte offset.
    pub const fn byte_count(self) -> usize {
        self.row * BYTES_PER_ROW + self.byte
    }
}

/// First and last byte (inclusive) of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Alignment {
    pub start: AlignmentPosition,
    pub end: AlignmentPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayInfo {
    /// Number of scalar values supplied for the array.
    pub array_length: usize,
    /// Number of array entries.
    pub num_elements: usize,
    /// Byte distance between consecutive entries.
    pub array_stride: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Scalar,
    Array(ArrayInfo),
    Interleaved(ArrayInfo),
}

/// Values read back out of a byte store, typed by the element's component kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementData {
    F32(Vec<f32>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F16(Vec<half::f16>),
}

impl ElementData {
    pub fn len(&self) -> usize {
        match self {
            ElementData::F32(v) => v.len(),
            ElementData::I32(v) => v.len(),
            ElementData::U32(v) => v.len(),
            ElementData::F16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            ElementData::F32(v) => v.iter().map(|x| *x as f64).collect(),
            ElementData::I32(v) => v.iter().map(|x| *x as f64).collect(),
            ElementData::U32(v) => v.iter().map(|x| *x as f64).collect(),
            ElementData::F16(v) => v.iter().map(|x| x.to_f64()).collect(),
        }
    }
}

fn encode(view: ViewKind, value: f64, destination: &mut [u8]) {
    match view {
        ViewKind::F32 => destination.copy_from_slice(&(value as f32).to_le_bytes()),
        ViewKind::I32 => destination.copy_from_slice(&(value as i32).to_le_bytes()),
        ViewKind::U32 => destination.copy_from_slice(&(value as u32).to_le_bytes()),
        ViewKind::F16 => destination.copy_from_slice(&half::f16::from_f64(value).to_le_bytes()),
    }
}

#[derive(Debug, Clone)]
pub struct BufferElement {
    name: String,
    key: String,
    ty: InputType,
    layout: LayoutEntry,
    alignment: Alignment,
    kind: ElementKind,
}

impl BufferElement {
    /// A scalar element. Call [`BufferElement::set_alignment`] to place it.
    pub fn new(name: impl Into<String>, key: impl Into<String>, ty: InputType) -> Self {
        BufferElement {
            name: name.into(),
            key: key.into(),
            ty,
            layout: ty.layout(),
            alignment: Alignment::default(),
            kind: ElementKind::Scalar,
        }
    }

    /// An array element holding `array_length` scalar values.
    pub fn array(
        name: impl Into<String>,
        key: impl Into<String>,
        ty: InputType,
        array_length: usize,
    ) -> Self {
        let mut element = Self::new(name, key, ty);
        element.kind = ElementKind::Array(element.array_info(array_length));
        element
    }

    /// One member of an interleaved array group. Place it with
    /// [`BufferElement::set_interleaved_alignment`].
    pub fn interleaved(
        name: impl Into<String>,
        key: impl Into<String>,
        ty: InputType,
        array_length: usize,
    ) -> Self {
        let mut element = Self::new(name, key, ty);
        element.kind = ElementKind::Interleaved(element.array_info(array_length));
        element
    }

    fn array_info(&self, array_length: usize) -> ArrayInfo {
        ArrayInfo {
            array_length,
            num_elements: ceil_div(array_length, self.layout.logical_len()),
            array_stride: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ty(&self) -> InputType {
        self.ty
    }

    pub fn layout(&self) -> LayoutEntry {
        self.layout
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn start_offset(&self) -> usize {
        self.alignment.start.byte_count()
    }

    pub fn end_offset(&self) -> usize {
        self.alignment.end.byte_count()
    }

    pub fn byte_count(&self) -> usize {
        self.end_offset() + 1 - self.start_offset()
    }

    /// Size of the store needed to hold everything up to and including this element's last row.
    pub fn padded_byte_count(&self) -> usize {
        (self.alignment.end.row + 1) * BYTES_PER_ROW
    }

    pub fn row_count(&self) -> usize {
        self.alignment.end.row - self.alignment.start.row + 1
    }

    pub(crate) fn byte_range(&self) -> Range<usize> {
        self.start_offset()..self.end_offset() + 1
    }

    /// Where one value of this element's type would land if placed at `position`.
    pub fn element_alignment(&self, position: AlignmentPosition) -> Alignment {
        let LayoutEntry {
            size, alignment, ..
        } = self.layout;
        let mut start =
            AlignmentPosition::at_offset(position.row * BYTES_PER_ROW + round_up(position.byte, alignment));
        let straddles = start.byte + size > BYTES_PER_ROW;
        if (size <= BYTES_PER_ROW && straddles) || (size > BYTES_PER_ROW && start.byte > 0) {
            start = AlignmentPosition {
                row: start.row + 1,
                byte: 0,
            };
        }
        Alignment {
            start,
            end: AlignmentPosition::at_offset(start.byte_count() + size - 1),
        }
    }

    /// Places the element so it starts no earlier than `start_offset`.
    pub fn set_alignment(&mut self, start_offset: usize) {
        let first = self.element_alignment(AlignmentPosition::at_offset(start_offset));
        self.alignment = first;
        match self.kind {
            ElementKind::Scalar => {}
            ElementKind::Array(mut info) => {
                let end_offset = first.end.byte_count();
                //the stride is wherever a second entry would end, minus where the first ends
                let next = self.element_alignment(AlignmentPosition::at_offset(end_offset + 1));
                info.array_stride = next.end.byte_count() - end_offset;
                self.alignment.end = AlignmentPosition::at_offset(
                    end_offset + info.array_stride * info.num_elements.saturating_sub(1),
                );
                self.kind = ElementKind::Array(info);
            }
            ElementKind::Interleaved(info) => {
                self.set_interleaved_alignment(start_offset, info.array_stride);
            }
        }
    }

    /// Places one member of an interleaved group whose entries are `stride` bytes apart.
    pub fn set_interleaved_alignment(&mut self, start_offset: usize, stride: usize) {
        let first = self.element_alignment(AlignmentPosition::at_offset(start_offset));
        let num_elements = match &mut self.kind {
            ElementKind::Interleaved(info) | ElementKind::Array(info) => {
                info.array_stride = stride;
                info.num_elements
            }
            ElementKind::Scalar => 1,
        };
        self.alignment = Alignment {
            start: first.start,
            end: AlignmentPosition::at_offset(
                first.end.byte_count() + stride * num_elements.saturating_sub(1),
            ),
        };
    }

    /// WGSL type of the field. Uniform buffers need `sized` arrays.
    pub fn wgsl_type(&self, sized: bool) -> String {
        match self.kind {
            ElementKind::Array(info) if sized => {
                format!("array<{}, {}>", self.ty.base(), info.num_elements)
            }
            ElementKind::Array(_) => format!("array<{}>", self.ty.base()),
            ElementKind::Interleaved(_) => self.ty.base().to_string(),
            ElementKind::Scalar => self.ty.to_string(),
        }
    }

    /// Writes the components of one value starting at `base`.
    ///
    /// With `padded`, logical component `i` goes to the slot the type's padding pattern assigns
    /// it; otherwise components fill consecutive slots.
    fn write_slots(&self, bytes: &mut [u8], base: usize, values: &[f64], padded: bool) {
        let width = self.layout.view.bytes_per_component();
        for (i, value) in values.iter().enumerate() {
            let slot = if padded { self.layout.slot_for(i) } else { i };
            let at = base + slot * width;
            if let Some(destination) = bytes.get_mut(at..at + width) {
                encode(self.layout.view, *value, destination);
            }
        }
    }

    fn read_slots(&self, bytes: &[u8], base: usize, count: usize, out: &mut Vec<f64>) {
        let width = self.layout.view.bytes_per_component();
        for i in 0..count {
            let at = base + self.layout.slot_for(i) * width;
            let Some(source) = bytes.get(at..at + width) else {
                return;
            };
            let value = match self.layout.view {
                ViewKind::F32 => f32::from_le_bytes([source[0], source[1], source[2], source[3]]) as f64,
                ViewKind::I32 => i32::from_le_bytes([source[0], source[1], source[2], source[3]]) as f64,
                ViewKind::U32 => u32::from_le_bytes([source[0], source[1], source[2], source[3]]) as f64,
                ViewKind::F16 => half::f16::from_le_bytes([source[0], source[1]]).to_f64(),
            };
            out.push(value);
        }
    }

    /// Serializes `value` into this element's range of `bytes`.
    ///
    /// Returns `false`, after a throttled warning, when the value does not fit.
    pub fn update(&self, value: &InputValue, bytes: &mut [u8]) -> bool {
        let components = value.components();
        match self.kind {
            ElementKind::Scalar => {
                let logical = self.layout.logical_len();
                if components.len() <= logical {
                    self.write_slots(bytes, self.start_offset(), components, true);
                } else if self.layout.padding.is_some() && components.len() <= self.layout.num_elements {
                    //already laid out with padding
                    self.write_slots(bytes, self.start_offset(), components, false);
                } else {
                    throw_warning(&format!(
                        "value for `{}` has {} components but {} holds {}",
                        self.name,
                        components.len(),
                        self.ty,
                        logical
                    ));
                    return false;
                }
            }
            ElementKind::Array(info) | ElementKind::Interleaved(info) => {
                let per_entry = self.layout.logical_len();
                for (i, entry) in components
                    .chunks(per_entry)
                    .take(info.num_elements)
                    .enumerate()
                {
                    self.write_slots(
                        bytes,
                        self.start_offset() + i * info.array_stride,
                        entry,
                        true,
                    );
                }
                if components.len() > per_entry * info.num_elements {
                    throw_warning(&format!(
                        "array `{}` holds {} values, extra values were ignored",
                        self.name,
                        per_entry * info.num_elements
                    ));
                }
            }
        }
        true
    }

    /// Reads this element's values back out of `bytes`, skipping padding.
    ///
    /// A short `bytes` yields only the values that fit.
    pub fn extract(&self, bytes: &[u8]) -> ElementData {
        let mut values = Vec::new();
        match self.kind {
            ElementKind::Scalar => {
                self.read_slots(bytes, self.start_offset(), self.layout.logical_len(), &mut values)
            }
            ElementKind::Array(info) | ElementKind::Interleaved(info) => {
                for i in 0..info.num_elements {
                    self.read_slots(
                        bytes,
                        self.start_offset() + i * info.array_stride,
                        self.layout.logical_len(),
                        &mut values,
                    );
                }
            }
        }
        match self.layout.view {
            ViewKind::F32 => ElementData::F32(values.into_iter().map(|v| v as f32).collect()),
            ViewKind::I32 => ElementData::I32(values.into_iter().map(|v| v as i32).collect()),
            ViewKind::U32 => ElementData::U32(values.into_iter().map(|v| v as u32).collect()),
            ViewKind::F16 => {
                ElementData::F16(values.into_iter().map(half::f16::from_f64).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WgslType;

    fn placed(ty: WgslType, at: usize) -> BufferElement {
        let mut element = BufferElement::new("e", "e", ty.into());
        element.set_alignment(at);
        element
    }

    #[test]
    fn straddling_fields_move_to_next_row() {
        let vec4 = placed(WgslType::Vec4f, 4);
        assert_eq!((vec4.start_offset(), vec4.end_offset()), (16, 31));
        let vec3 = placed(WgslType::Vec3f, 8);
        assert_eq!((vec3.start_offset(), vec3.end_offset()), (16, 27));
        let vec2 = placed(WgslType::Vec2f, 12);
        assert_eq!((vec2.start_offset(), vec2.end_offset()), (16, 23));
        let half = placed(WgslType::F16, 14);
        assert_eq!((half.start_offset(), half.end_offset()), (14, 15));
    }

    #[test]
    fn large_fields_start_a_row() {
        let mat = placed(WgslType::Mat3x2f, 8);
        assert_eq!((mat.start_offset(), mat.end_offset()), (16, 39));
        assert_eq!(mat.row_count(), 2);
        let mat4 = placed(WgslType::Mat4x4f, 0);
        assert_eq!((mat4.start_offset(), mat4.end_offset()), (0, 63));
        assert_eq!(mat4.padded_byte_count(), 64);
    }

    #[test]
    fn alignment_rounds_up_to_type_alignment() {
        let vec2 = placed(WgslType::Vec2f, 4);
        assert_eq!(vec2.start_offset(), 8);
        let vec3h = placed(WgslType::Vec3h, 2);
        assert_eq!((vec3h.start_offset(), vec3h.end_offset()), (8, 13));
    }

    #[test]
    fn array_stride_and_extent() {
        let mut floats = BufferElement::array("a", "a", InputType::Array(WgslType::F32), 4);
        floats.set_alignment(16);
        assert_eq!(floats.start_offset(), 16);
        assert_eq!(floats.end_offset(), 31);
        assert!(matches!(floats.kind(), ElementKind::Array(ArrayInfo { array_stride: 4, num_elements: 4, .. })));

        let mut vectors = BufferElement::array("v", "v", InputType::Array(WgslType::Vec3f), 6);
        vectors.set_alignment(0);
        assert!(matches!(vectors.kind(), ElementKind::Array(ArrayInfo { array_stride: 16, num_elements: 2, .. })));
        assert_eq!(vectors.end_offset(), 27);
        assert_eq!(vectors.wgsl_type(true), "array<vec3f, 2>");
        assert_eq!(vectors.wgsl_type(false), "array<vec3f>");
    }

    #[test]
    fn writes_padded_matrices() {
        let mat = placed(WgslType::Mat3x3f, 0);
        let mut bytes = vec![0u8; 48];
        let values: Vec<f64> = (1..=9).map(f64::from).collect();
        assert!(mat.update(&InputValue::Mat3(values.clone().try_into().unwrap()), &mut bytes));
        let floats: Vec<f32> = bytes
            .chunks(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]);
        assert_eq!(mat.extract(&bytes).to_f64_vec(), values);
    }

    #[test]
    fn oversized_values_are_rejected() {
        let vec2 = placed(WgslType::Vec2f, 0);
        let mut bytes = vec![0u8; 16];
        assert!(!vec2.update(&InputValue::Vec4([1.0, 2.0, 3.0, 4.0]), &mut bytes));
        assert_eq!(bytes, vec![0u8; 16]);
    }

    #[test]
    fn bools_and_halves() {
        let flag = placed(WgslType::Bool, 0);
        let mut bytes = vec![0u8; 16];
        flag.update(&InputValue::Bool(true), &mut bytes);
        assert_eq!(flag.extract(&bytes), ElementData::U32(vec![1]));

        let halves = placed(WgslType::Vec2h, 4);
        halves.update(&InputValue::Vec2([0.5, -2.0]), &mut bytes);
        assert_eq!(
            halves.extract(&bytes),
            ElementData::F16(vec![half::f16::from_f32(0.5), half::f16::from_f32(-2.0)])
        );
    }

    #[test]
    fn short_stores_extract_partially() {
        let vec4 = placed(WgslType::Vec4f, 0);
        let mut bytes = vec![0u8; 16];
        vec4.update(&InputValue::Vec4([1.0, 2.0, 3.0, 4.0]), &mut bytes);
        assert_eq!(vec4.extract(&bytes[..8]), ElementData::F32(vec![1.0, 2.0]));
    }
}
