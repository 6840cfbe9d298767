// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The device boundary.

Everything above this module speaks in terms of [`Device`], plain descriptors and opaque handles.
Two implementations ship with the crate:

* [`RecordingDevice`], an in-memory device that keeps buffer contents on the host and records
  every call. It backs the test suite and headless tooling.
* `WgpuDevice` (feature `backend_wgpu`), which forwards to a real `wgpu::Device` and `wgpu::Queue`.
*/

use crate::bindings::sampler::SamplerBindingType;
use crate::bindings::texture::{
    StorageTextureAccess, StorageTextureFormat, TextureSampleType, TextureViewDimension,
};
use crate::bindings::visible_to::{BufferBindingType, BufferUsages, ShaderStages};
use std::future::Future;
use std::pin::Pin;

mod nop;
pub use nop::{DeviceCall, RecordingDevice};

#[cfg(feature = "backend_wgpu")]
mod wgpu;
#[cfg(feature = "backend_wgpu")]
pub use wgpu::WgpuDevice;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// A GPU buffer owned by a [`Device`].
    BufferHandle
);
handle!(
    /// A bind group layout owned by a [`Device`].
    LayoutHandle
);
handle!(
    /// A bind group owned by a [`Device`].
    GroupHandle
);
handle!(
    /// A texture view registered with a [`Device`].
    TextureHandle
);
handle!(
    /// A sampler registered with a [`Device`].
    SamplerHandle
);

/// Device limits the binding layer consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u32,
    pub min_storage_buffer_offset_alignment: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        DeviceLimits {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    pub usage: BufferUsages,
    pub mapped_at_creation: bool,
}

/// The type half of a bind group layout entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingLayout {
    Buffer {
        ty: BufferBindingType,
        has_dynamic_offset: bool,
        min_binding_size: Option<u64>,
    },
    Sampler(SamplerBindingType),
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
        multisampled: bool,
    },
    StorageTexture {
        access: StorageTextureAccess,
        format: StorageTextureFormat,
        view_dimension: TextureViewDimension,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub layout: BindingLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupLayoutDescriptor<'a> {
    pub label: &'a str,
    pub entries: &'a [BindGroupLayoutEntry],
}

/// The resource half of a bind group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    Sampler(SamplerHandle),
    TextureView(TextureHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupDescriptor<'a> {
    pub label: &'a str,
    pub layout: LayoutHandle,
    pub entries: &'a [BindGroupEntry],
}

/// Errors raised by a [`Device`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("the device has been lost")]
    Lost,
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown bind group layout {0:?}")]
    UnknownLayout(LayoutHandle),
    #[error("unknown texture view {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("unknown sampler {0:?}")]
    UnknownSampler(SamplerHandle),
    #[error("buffer {0:?} was already destroyed")]
    Destroyed(BufferHandle),
    #[error("buffer mapping failed: {0}")]
    MapFailed(String),
}

/// The operations the binding layer needs from a GPU.
///
/// Handles returned by one device are meaningless to another. After a device loss every handle
/// must be treated as invalid.
pub trait Device {
    fn limits(&self) -> DeviceLimits;

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, DeviceError>;

    /// Creates a buffer mapped at creation, fills it with `contents` and unmaps it.
    fn create_buffer_init(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: &[u8],
    ) -> Result<BufferHandle, DeviceError>;

    /// Releases the GPU memory behind `buffer`. Unknown or already destroyed handles are ignored.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_bind_group_layout(
        &mut self,
        descriptor: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<LayoutHandle, DeviceError>;

    fn create_bind_group(
        &mut self,
        descriptor: &BindGroupDescriptor<'_>,
    ) -> Result<GroupHandle, DeviceError>;

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Records and submits a copy of the first `size` bytes of `source` into `destination`.
    fn copy_buffer_to_buffer(&mut self, source: BufferHandle, destination: BufferHandle, size: u64);

    /// Maps `buffer` for reading and resolves to a copy of its contents.
    fn map_buffer_async(
        &mut self,
        buffer: BufferHandle,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, DeviceError>> + '_>>;
}
