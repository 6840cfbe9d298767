// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Buffer bindings stored inside a slice of another binding's buffer.
//!
//! Many small bindings of the same shape can share one GPU buffer: each child is given an index
//! and writes its bytes into the parent's store at
//! `round_up(index * round_up(size, min_offset), min_offset)`. The bind group then binds the
//! parent's buffer with that offset, either baked into the group or passed as a dynamic offset.

use crate::bindings::buffer_binding::BufferBinding;
use crate::bittricks::round_up;
use crate::imp::Device;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

impl BufferBinding {
    /// Byte offset of this binding inside its parent's buffer.
    pub fn offset(&self) -> usize {
        round_up(
            self.offset_index * round_up(self.array_buffer_size(), self.min_offset),
            self.min_offset,
        )
    }

    pub fn offset_index(&self) -> usize {
        self.offset_index
    }

    pub fn set_offset_index(&mut self, offset_index: usize) {
        self.offset_index = offset_index;
        self.should_update = true;
        self.resource_generation += 1;
    }

    pub fn use_dynamic_offset(&self) -> bool {
        self.use_dynamic_offset
    }

    /// The parent, if one was set and is still alive.
    pub fn parent_binding(&self) -> Option<Rc<RefCell<BufferBinding>>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn attach_parent(&mut self, parent: &Rc<RefCell<BufferBinding>>) {
        self.parent = Some(Rc::downgrade(parent));
        self.should_update = !self.array_buffer.is_empty();
    }

    /// Moves this binding into `parent`'s buffer, or back into a buffer of its own with `None`.
    ///
    /// A GPU buffer this binding owned privately is destroyed, since the parent's buffer now
    /// holds its data. The next bind group update rebuilds against the new buffer.
    pub fn set_parent<D: Device + ?Sized>(
        &mut self,
        parent: Option<&Rc<RefCell<BufferBinding>>>,
        device: &mut D,
    ) {
        match parent {
            Some(parent) => {
                if self.parent.is_none() {
                    self.buffer.destroy(device);
                }
                self.attach_parent(parent);
            }
            None => {
                self.parent = None;
                self.should_update = !self.array_buffer.is_empty();
            }
        }
        self.resource_generation += 1;
    }

    /// Copies this binding's bytes into the parent's store and marks the parent dirty.
    ///
    /// Runs when this binding changed or when the parent has rewritten its own fields since the
    /// last copy. Does nothing when the parent is gone, busy or too small to hold this slice.
    pub(crate) fn write_into_parent(&mut self) {
        let Some(parent) = self.parent_binding() else {
            return;
        };
        let Ok(mut parent) = parent.try_borrow_mut() else {
            return;
        };
        if !self.should_update && parent.store_epoch == self.seen_parent_epoch {
            return;
        }
        let offset = self.offset();
        if parent.array_buffer.len() < offset + self.array_buffer.len() {
            return;
        }
        let mut ranges: Vec<std::ops::Range<usize>> =
            self.elements().iter().map(|e| e.byte_range()).collect();
        ranges.extend(
            self.children()
                .iter()
                .zip(self.child_offsets())
                .map(|(child, start)| *start..start + child.array_buffer_size()),
        );
        for range in ranges {
            let Some(source) = self.array_buffer.get(range.clone()) else {
                continue;
            };
            parent.array_buffer[offset + range.start..offset + range.end].copy_from_slice(source);
        }
        parent.should_update = true;
        self.should_update = false;
        self.seen_parent_epoch = parent.store_epoch;
    }
}

#[cfg(test)]
mod tests {
    use crate::bindings::buffer_binding::{BufferBinding, BufferBindingParams};
    use crate::bindings::input::{BufferInputs, Input};
    use crate::bindings::visible_to::BufferBindingKind;
    use crate::layout::WgslType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn child(parent: &Rc<RefCell<BufferBinding>>, index: usize, value: f64) -> BufferBinding {
        BufferBinding::new(BufferBindingParams {
            label: format!("object {index}"),
            binding_type: BufferBindingKind::Storage,
            inputs: BufferInputs::new().with("scale", Input::new(WgslType::F32, value)),
            parent: Some(parent.clone()),
            offset_index: index,
            ..Default::default()
        })
    }

    fn parent(size_floats: usize) -> Rc<RefCell<BufferBinding>> {
        Rc::new(RefCell::new(BufferBinding::new(BufferBindingParams {
            label: "objects".to_string(),
            binding_type: BufferBindingKind::Storage,
            inputs: BufferInputs::new().with(
                "data",
                Input::new(
                    crate::layout::InputType::Array(WgslType::F32),
                    vec![0.0; size_floats],
                ),
            ),
            ..Default::default()
        })))
    }

    #[test]
    fn offsets_are_disjoint() {
        let parent = parent(256);
        let a = child(&parent, 0, 1.0);
        let b = child(&parent, 1, 2.0);
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 256);
        assert!(a.offset() + a.array_buffer_size() <= b.offset());
    }

    #[test]
    fn writes_land_in_parent() {
        let parent = parent(256);
        parent.borrow_mut().should_update = false;
        let mut b = child(&parent, 2, 7.5);
        b.update();
        assert!(!b.should_update());
        let parent = parent.borrow();
        assert!(parent.should_update());
        assert_eq!(&parent.array_buffer()[512..516], &7.5f32.to_le_bytes());
    }

    #[test]
    fn slice_is_copied_again_after_the_parent_rewrites_it() {
        let parent = parent(256);
        let mut b = child(&parent, 1, 4.0);
        b.update();
        parent.borrow_mut().set_value("data", vec![0.0f32; 256]);
        parent.borrow_mut().update();
        assert_eq!(&parent.borrow().array_buffer()[256..260], &[0; 4]);
        b.update();
        assert_eq!(&parent.borrow().array_buffer()[256..260], &4.0f32.to_le_bytes());
        parent.borrow_mut().should_update = false;
        b.update();
        assert!(!parent.borrow().should_update());
    }

    #[test]
    fn small_parent_is_left_alone() {
        let parent = parent(4);
        parent.borrow_mut().should_update = false;
        let mut far = child(&parent, 3, 1.0);
        far.update();
        assert!(!parent.borrow().should_update());
        assert!(parent.borrow().array_buffer().iter().all(|b| *b == 0));
    }
}
