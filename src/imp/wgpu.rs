// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

[`WgpuDevice`] wraps a `wgpu::Device` and its queue. Handles are indices into tables owned by the
device; textures and samplers are created by the application and registered here so bindings can
refer to them by handle.
*/

use super::{
    BindGroupDescriptor, BindGroupLayoutDescriptor, BindingLayout, BindingResource,
    BufferDescriptor, BufferHandle, Device, DeviceError, DeviceLimits, GroupHandle, LayoutHandle,
    SamplerHandle, TextureHandle,
};
use crate::bindings::sampler::SamplerBindingType;
use crate::bindings::texture::{
    StorageTextureAccess, StorageTextureFormat, TextureSampleType, TextureViewDimension,
};
use crate::bindings::visible_to::BufferBindingType;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_handle: u64,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    layouts: HashMap<LayoutHandle, wgpu::BindGroupLayout>,
    groups: HashMap<GroupHandle, wgpu::BindGroup>,
    texture_views: HashMap<TextureHandle, wgpu::TextureView>,
    samplers: HashMap<SamplerHandle, wgpu::Sampler>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuDevice {
            device,
            queue,
            next_handle: 0,
            buffers: HashMap::new(),
            layouts: HashMap::new(),
            groups: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
        }
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn wgpu_queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn register_texture_view(&mut self, view: wgpu::TextureView) -> TextureHandle {
        let handle = TextureHandle(self.next_handle());
        self.texture_views.insert(handle, view);
        handle
    }

    pub fn register_sampler(&mut self, sampler: wgpu::Sampler) -> SamplerHandle {
        let handle = SamplerHandle(self.next_handle());
        self.samplers.insert(handle, sampler);
        handle
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&buffer)
    }

    pub fn bind_group_layout(&self, layout: LayoutHandle) -> Option<&wgpu::BindGroupLayout> {
        self.layouts.get(&layout)
    }

    /// The `wgpu::BindGroup` to pass to `set_bind_group`.
    pub fn bind_group(&self, group: GroupHandle) -> Option<&wgpu::BindGroup> {
        self.groups.get(&group)
    }
}

fn binding_type(layout: &BindingLayout) -> wgpu::BindingType {
    match *layout {
        BindingLayout::Buffer {
            ty,
            has_dynamic_offset,
            min_binding_size,
        } => wgpu::BindingType::Buffer {
            ty: match ty {
                BufferBindingType::Uniform => wgpu::BufferBindingType::Uniform,
                BufferBindingType::Storage { read_only } => {
                    wgpu::BufferBindingType::Storage { read_only }
                }
            },
            has_dynamic_offset,
            min_binding_size: min_binding_size.and_then(wgpu::BufferSize::new),
        },
        BindingLayout::Sampler(ty) => wgpu::BindingType::Sampler(match ty {
            SamplerBindingType::Filtering => wgpu::SamplerBindingType::Filtering,
            SamplerBindingType::NonFiltering => wgpu::SamplerBindingType::NonFiltering,
            SamplerBindingType::Comparison => wgpu::SamplerBindingType::Comparison,
        }),
        BindingLayout::Texture {
            sample_type,
            view_dimension,
            multisampled,
        } => wgpu::BindingType::Texture {
            sample_type: match sample_type {
                TextureSampleType::Float { filterable } => {
                    wgpu::TextureSampleType::Float { filterable }
                }
                TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                TextureSampleType::Sint => wgpu::TextureSampleType::Sint,
                TextureSampleType::Uint => wgpu::TextureSampleType::Uint,
            },
            view_dimension: view_dimension_of(view_dimension),
            multisampled,
        },
        BindingLayout::StorageTexture {
            access,
            format,
            view_dimension,
        } => wgpu::BindingType::StorageTexture {
            access: match access {
                StorageTextureAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
                StorageTextureAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
                StorageTextureAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
            },
            format: texture_format_of(format),
            view_dimension: view_dimension_of(view_dimension),
        },
    }
}

fn view_dimension_of(dimension: TextureViewDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureViewDimension::D1 => wgpu::TextureViewDimension::D1,
        TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
        TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
        TextureViewDimension::CubeArray => wgpu::TextureViewDimension::CubeArray,
        TextureViewDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

fn texture_format_of(format: StorageTextureFormat) -> wgpu::TextureFormat {
    match format {
        StorageTextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        StorageTextureFormat::Rgba8Snorm => wgpu::TextureFormat::Rgba8Snorm,
        StorageTextureFormat::Rgba8Uint => wgpu::TextureFormat::Rgba8Uint,
        StorageTextureFormat::Rgba8Sint => wgpu::TextureFormat::Rgba8Sint,
        StorageTextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        StorageTextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        StorageTextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        StorageTextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        StorageTextureFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        StorageTextureFormat::R32Sint => wgpu::TextureFormat::R32Sint,
        StorageTextureFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
    }
}

impl Device for WgpuDevice {
    fn limits(&self) -> DeviceLimits {
        let limits = self.device.limits();
        DeviceLimits {
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
        }
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, DeviceError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&descriptor.label),
            size: descriptor.size,
            usage: wgpu::BufferUsages::from_bits_truncate(descriptor.usage.bits()),
            mapped_at_creation: descriptor.mapped_at_creation,
        });
        let handle = BufferHandle(self.next_handle());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        //mapped buffers must be a multiple of COPY_BUFFER_ALIGNMENT
        let size = (contents.len() as u64)
            .max(descriptor.size)
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&descriptor.label),
            size,
            usage: wgpu::BufferUsages::from_bits_truncate(descriptor.usage.bits()),
            mapped_at_creation: true,
        });
        let mut entire_map = buffer.slice(..).get_mapped_range_mut();
        entire_map[..contents.len()].copy_from_slice(contents);
        drop(entire_map);
        buffer.unmap();
        let handle = BufferHandle(self.next_handle());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn create_bind_group_layout(
        &mut self,
        descriptor: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<LayoutHandle, DeviceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: wgpu::ShaderStages::from_bits_truncate(entry.visibility.bits()),
                ty: binding_type(&entry.layout),
                count: None,
            })
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(descriptor.label),
                entries: &entries,
            });
        let handle = LayoutHandle(self.next_handle());
        self.layouts.insert(handle, layout);
        Ok(handle)
    }

    fn create_bind_group(
        &mut self,
        descriptor: &BindGroupDescriptor<'_>,
    ) -> Result<GroupHandle, DeviceError> {
        let layout = self
            .layouts
            .get(&descriptor.layout)
            .ok_or(DeviceError::UnknownLayout(descriptor.layout))?;
        let mut entries = Vec::with_capacity(descriptor.entries.len());
        for entry in descriptor.entries {
            let resource = match entry.resource {
                BindingResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: self
                        .buffers
                        .get(&buffer)
                        .ok_or(DeviceError::UnknownBuffer(buffer))?,
                    offset,
                    size: size.and_then(wgpu::BufferSize::new),
                }),
                BindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(
                    self.samplers
                        .get(&sampler)
                        .ok_or(DeviceError::UnknownSampler(sampler))?,
                ),
                BindingResource::TextureView(view) => wgpu::BindingResource::TextureView(
                    self.texture_views
                        .get(&view)
                        .ok_or(DeviceError::UnknownTexture(view))?,
                ),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: entry.binding,
                resource,
            });
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(descriptor.label),
            layout,
            entries: &entries,
        });
        let handle = GroupHandle(self.next_handle());
        self.groups.insert(handle, group);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(&buffer) {
            Some(buffer) => self.queue.write_buffer(buffer, offset, data),
            None => logwise::warn_sync!(
                "write to unknown buffer {buffer}",
                buffer = buffer.0
            ),
        }
    }

    fn copy_buffer_to_buffer(&mut self, source: BufferHandle, destination: BufferHandle, size: u64) {
        let (Some(source), Some(destination)) =
            (self.buffers.get(&source), self.buffers.get(&destination))
        else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("layouts_and_bindings result copy"),
            });
        encoder.copy_buffer_to_buffer(source, 0, destination, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn map_buffer_async(
        &mut self,
        buffer: BufferHandle,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, DeviceError>> + '_>> {
        let Some(wgpu_buffer) = self.buffers.get(&buffer).cloned() else {
            return Box::pin(std::future::ready(Err(DeviceError::UnknownBuffer(buffer))));
        };
        let device = self.device.clone();
        Box::pin(async move {
            let (s, r) = r#continue::continuation();
            wgpu_buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    s.send(result.map_err(|e| e.to_string()));
                });
            //on the web the browser drives mapping; natively we have to poll
            #[cfg(not(target_arch = "wasm32"))]
            {
                if let Err(e) = device.poll(wgpu::PollType::Wait) {
                    let error = e.to_string();
                    logwise::warn_sync!(
                        "polling for a buffer map failed: {error}",
                        error = logwise::privacy::LogIt(&error)
                    );
                }
            }
            #[cfg(target_arch = "wasm32")]
            let _ = &device;
            r.await.map_err(DeviceError::MapFailed)?;
            let data = wgpu_buffer.slice(..).get_mapped_range().to_vec();
            wgpu_buffer.unmap();
            Ok(data)
        })
    }
}
