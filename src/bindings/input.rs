// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Named, typed inputs of a buffer binding.

An [`Input`] pairs a WGSL type with a host value and a dirty flag. Setting the value marks the
input dirty; the owning binding serializes dirty inputs on its next update.
*/

use crate::layout::InputType;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A host value for one input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Number(f64),
    Bool(bool),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Vec4([f64; 4]),
    /// Column-major 3x3 matrix.
    Mat3([f64; 9]),
    /// Column-major 4x4 matrix.
    Mat4([f64; 16]),
    /// A flat numeric array, used for `array<T>` inputs and pre-packed values.
    Array(Vec<f64>),
}

impl InputValue {
    /// The value's components, in order.
    pub fn components(&self) -> &[f64] {
        match self {
            InputValue::Number(n) => std::slice::from_ref(n),
            InputValue::Bool(true) => &[1.0],
            InputValue::Bool(false) => &[0.0],
            InputValue::Vec2(v) => v,
            InputValue::Vec3(v) => v,
            InputValue::Vec4(v) => v,
            InputValue::Mat3(m) => m,
            InputValue::Mat4(m) => m,
            InputValue::Array(a) => a,
        }
    }

    pub fn len(&self) -> usize {
        self.components().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components().is_empty()
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Number(value)
    }
}
impl From<f32> for InputValue {
    fn from(value: f32) -> Self {
        InputValue::Number(value as f64)
    }
}
impl From<i32> for InputValue {
    fn from(value: i32) -> Self {
        InputValue::Number(value as f64)
    }
}
impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        InputValue::Number(value as f64)
    }
}
impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}
impl From<[f64; 2]> for InputValue {
    fn from(value: [f64; 2]) -> Self {
        InputValue::Vec2(value)
    }
}
impl From<[f64; 3]> for InputValue {
    fn from(value: [f64; 3]) -> Self {
        InputValue::Vec3(value)
    }
}
impl From<[f64; 4]> for InputValue {
    fn from(value: [f64; 4]) -> Self {
        InputValue::Vec4(value)
    }
}
impl From<[f64; 9]> for InputValue {
    fn from(value: [f64; 9]) -> Self {
        InputValue::Mat3(value)
    }
}
impl From<[f64; 16]> for InputValue {
    fn from(value: [f64; 16]) -> Self {
        InputValue::Mat4(value)
    }
}
impl From<Vec<f64>> for InputValue {
    fn from(value: Vec<f64>) -> Self {
        InputValue::Array(value)
    }
}
impl From<Vec<f32>> for InputValue {
    fn from(value: Vec<f32>) -> Self {
        InputValue::Array(value.into_iter().map(f64::from).collect())
    }
}

/// Called with the value right before it is serialized, and may rewrite it.
pub type BeforeUpdate = Rc<dyn Fn(&mut InputValue)>;

#[derive(Clone)]
pub struct Input {
    name: Option<String>,
    ty: InputType,
    value: InputValue,
    should_update: bool,
    on_before_update: Option<BeforeUpdate>,
}

impl Input {
    /// Creates a dirty input, so its value is written on the first update.
    ///
    /// ```
    /// use layouts_and_bindings::bindings::input::Input;
    /// use layouts_and_bindings::layout::WgslType;
    ///
    /// let time = Input::new(WgslType::F32, 0.5);
    /// assert!(time.should_update());
    /// ```
    pub fn new(ty: impl Into<InputType>, value: impl Into<InputValue>) -> Self {
        Input {
            name: None,
            ty: ty.into(),
            value: value.into(),
            should_update: true,
            on_before_update: None,
        }
    }

    /// Overrides the WGSL field name, which otherwise comes from the input's key.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_before_update(mut self, callback: impl Fn(&mut InputValue) + 'static) -> Self {
        self.on_before_update = Some(Rc::new(callback));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ty(&self) -> InputType {
        self.ty
    }

    pub fn value(&self) -> &InputValue {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<InputValue>) {
        self.value = value.into();
        self.should_update = true;
    }

    pub fn should_update(&self) -> bool {
        self.should_update
    }

    pub fn mark_dirty(&mut self) {
        self.should_update = true;
    }

    /// Runs the before-update callback and clears the dirty flag, returning the value to write.
    pub(crate) fn take_update(&mut self) -> &InputValue {
        if let Some(callback) = self.on_before_update.clone() {
            callback(&mut self.value);
        }
        self.should_update = false;
        &self.value
    }
}

impl Debug for Input {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("value", &self.value)
            .field("should_update", &self.should_update)
            .field("on_before_update", &self.on_before_update.is_some())
            .finish()
    }
}

/// The inputs of one binding, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BufferInputs {
    entries: Vec<(String, Input)>,
}

impl BufferInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`BufferInputs::insert`].
    pub fn with(mut self, key: impl Into<String>, input: Input) -> Self {
        self.insert(key, input);
        self
    }

    /// Adds an input, replacing (in place) any input with the same key.
    pub fn insert(&mut self, key: impl Into<String>, input: Input) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = input,
            None => self.entries.push((key, input)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Input> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, i)| i)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Input> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, i)| i)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.entries.iter().map(|(k, i)| (k.as_str(), i))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Input)> {
        self.entries.iter_mut().map(|(k, i)| (k.as_str(), i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Input)> for BufferInputs {
    fn from_iter<T: IntoIterator<Item = (K, Input)>>(iter: T) -> Self {
        let mut inputs = BufferInputs::new();
        for (key, input) in iter {
            inputs.insert(key, input);
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WgslType;

    #[test]
    fn dirty_tracking() {
        let mut input = Input::new(WgslType::F32, 1.0).on_before_update(|value| {
            if let InputValue::Number(n) = value {
                *n *= 2.0;
            }
        });
        assert_eq!(input.take_update(), &InputValue::Number(2.0));
        assert!(!input.should_update());
        input.set_value(3.0);
        assert!(input.should_update());
    }

    #[test]
    fn insertion_keeps_order() {
        let mut inputs = BufferInputs::new()
            .with("b", Input::new(WgslType::F32, 0.0))
            .with("a", Input::new(WgslType::Vec2f, [0.0, 1.0]));
        inputs.insert("b", Input::new(WgslType::U32, 4u32));
        let keys: Vec<&str> = inputs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(inputs.get("b").map(Input::ty), Some(InputType::Plain(WgslType::U32)));
        assert_eq!(InputValue::Bool(true).components(), &[1.0]);
    }
}
