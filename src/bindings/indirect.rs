// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Indirect draw buffers.
//!
//! An [`IndirectBuffer`] packs one [`IndirectRecord`] per geometry into a single GPU buffer. The
//! record set is known in full before first use, so the buffer is created already holding its
//! contents instead of being written through the queue.

use crate::bindings::gpu_buffer::GpuBuffer;
use crate::bindings::visible_to::BufferUsages;
use crate::error::Error;
use crate::imp::{BufferHandle, Device};
use bytemuck::{Pod, Zeroable};

/// Arguments of one indirect draw, in the `drawIndexedIndirect` layout.
///
/// Non-indexed draws read only the first four words, so `base_vertex` stands in for their
/// `first_instance` and is left at zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectRecord {
    /// Index count for indexed draws, vertex count otherwise.
    pub count: u32,
    pub instance_count: u32,
    /// First index or first vertex.
    pub first: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl IndirectRecord {
    pub const SIZE_BYTES: u64 = core::mem::size_of::<Self>() as u64;

    pub fn indexed(index_count: u32, instance_count: u32) -> Self {
        IndirectRecord {
            count: index_count,
            instance_count,
            ..Default::default()
        }
    }

    pub fn non_indexed(vertex_count: u32, instance_count: u32) -> Self {
        IndirectRecord {
            count: vertex_count,
            instance_count,
            ..Default::default()
        }
    }
}

/// A drawable tracked by an [`IndirectBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectGeometry {
    pub id: u64,
    pub vertex_count: u32,
    /// Present for indexed geometry.
    pub index_count: Option<u32>,
    pub instance_count: u32,
}

impl IndirectGeometry {
    pub fn record(&self) -> IndirectRecord {
        match self.index_count {
            Some(index_count) => IndirectRecord::indexed(index_count, self.instance_count),
            None => IndirectRecord::non_indexed(self.vertex_count, self.instance_count),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndirectBufferParams {
    pub label: String,
    pub geometries: Vec<IndirectGeometry>,
}

#[derive(Debug)]
pub struct IndirectBuffer {
    label: String,
    geometries: Vec<IndirectGeometry>,
    buffer: GpuBuffer,
}

impl IndirectBuffer {
    pub fn new(params: IndirectBufferParams) -> Self {
        let mut buffer = IndirectBuffer {
            label: params.label,
            geometries: Vec::with_capacity(params.geometries.len()),
            buffer: GpuBuffer::default(),
        };
        for geometry in params.geometries {
            buffer.add_geometry(geometry);
        }
        buffer
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn geometries(&self) -> &[IndirectGeometry] {
        &self.geometries
    }

    /// Tracks `geometry`, replacing any geometry with the same id. Takes effect on the next
    /// [`IndirectBuffer::create`].
    pub fn add_geometry(&mut self, geometry: IndirectGeometry) {
        match self.geometries.iter_mut().find(|g| g.id == geometry.id) {
            Some(existing) => *existing = geometry,
            None => self.geometries.push(geometry),
        }
    }

    pub fn records(&self) -> Vec<IndirectRecord> {
        self.geometries.iter().map(IndirectGeometry::record).collect()
    }

    /// Byte offset of the record for `geometry_id`, to pass to the indirect draw call.
    pub fn offset_of(&self, geometry_id: u64) -> Option<u64> {
        self.geometries
            .iter()
            .position(|g| g.id == geometry_id)
            .map(|index| index as u64 * IndirectRecord::SIZE_BYTES)
    }

    /// Builds the GPU buffer from the current geometries, destroying the previous one.
    pub fn create<D: Device + ?Sized>(&mut self, device: &mut D) -> Result<BufferHandle, Error> {
        let records = self.records();
        let handle = self.buffer.create_init(
            device,
            format!("{}: indirect buffer", self.label),
            BufferUsages::INDIRECT | BufferUsages::STORAGE | BufferUsages::COPY_DST,
            bytemuck::cast_slice(&records),
        )?;
        logwise::trace_sync!(
            "created indirect buffer {label} with {count} records",
            label = logwise::privacy::LogIt(&self.label),
            count = records.len()
        );
        Ok(handle)
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    pub fn destroy<D: Device + ?Sized>(&mut self, device: &mut D) {
        self.buffer.destroy(device);
    }
}
