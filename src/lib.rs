/*! layouts_and_bindings lays out shader inputs by the WGSL memory rules and manages the GPU
bind groups that carry them.

A renderer or compute program describes its shader inputs as named, typed values. This crate
turns those into:

* a byte store per binding, laid out exactly as WGSL expects it in a uniform or storage buffer,
* the WGSL `struct` and `var` declarations that read that store,
* GPU buffers, bind group layouts and bind groups, deduplicated across the program.

# Layout

WGSL memory is addressed in rows of 16 bytes. Every type has a size and an alignment (see
[`layout::layout_of`]); a field starts at the next offset that satisfies its alignment, and a
field that would straddle a row boundary moves to the next row. Three-column matrices pad each
column to four components. Arrays take the stride of a hypothetical next element, and several
arrays of equal length may be interleaved into one array of structs.

| Type    | Size | Alignment |
|---------|------|-----------|
| `f32`   | 4    | 4         |
| `vec2f` | 8    | 8         |
| `vec3f` | 12   | 16        |
| `vec4f` | 16   | 16        |
| `mat3x3f` | 48 | 16        |
| `mat4x4f` | 64 | 16        |

# Bindings and bind groups

[`bindings::BufferBinding`] owns the byte store of one uniform or storage buffer.
[`bindings::BindGroup`] gathers buffer, sampler and texture bindings, creates the GPU objects
through a [`imp::Device`], and each frame uploads only what changed. Many small bindings of the
same shape can live inside one shared buffer at aligned offsets (offset children), bound either
with a fixed offset or a dynamic one.

Structurally identical bindings and layouts are found through string cache keys kept in the
[`device::ResourceCache`], so building a thousand materials of the same shape performs layout
once.

# Backends

[`imp::RecordingDevice`] keeps every buffer in host memory and records each call; the test
suite runs entirely on it. With the `backend_wgpu` feature (on by default), `imp::WgpuDevice`
drives a real [wgpu](https://wgpu.rs) device.

# Example

```
use layouts_and_bindings::bindings::input::{BufferInputs, Input};
use layouts_and_bindings::bindings::{BindGroup, BindGroupParams, BufferBinding, BufferBindingParams};
use layouts_and_bindings::device::DeviceManager;
use layouts_and_bindings::imp::RecordingDevice;
use layouts_and_bindings::layout::{InputType, WgslType};
use std::cell::RefCell;
use std::rc::Rc;

let mut manager = DeviceManager::new(RecordingDevice::new());
let frame = Rc::new(RefCell::new(BufferBinding::new(BufferBindingParams {
    label: "frame".to_string(),
    inputs: BufferInputs::new()
        .with("position", Input::new(WgslType::Vec3f, [0.0, 1.0, 2.0]))
        .with("time", Input::new(WgslType::F32, 0.0))
        .with("weights", Input::new(InputType::Array(WgslType::F32), vec![0.0; 4])),
    ..Default::default()
})));
assert_eq!(
    frame.borrow().wgsl_struct_fragment(),
    "struct Frame {\n\tposition: vec3f,\n\ttime: f32,\n\tweights: array<f32, 4>\n};"
);

let mut group = BindGroup::new(&mut manager, BindGroupParams {
    label: "main".to_string(),
    bindings: vec![frame.clone().into()],
    ..Default::default()
});
group.create_bind_group(&mut manager).unwrap();

frame.borrow_mut().set_value("time", 0.5);
group.update(&mut manager).unwrap();
```
*/

pub mod bindings;
mod bittricks;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod imp;
pub mod layout;

pub use error::Error;
