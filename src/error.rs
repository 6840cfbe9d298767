// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp;

/// Errors reported by this crate.
///
/// Layout problems (arrays that cannot be interleaved, values that do not fit their field)
/// are not errors; they are reported through the throttled warning log and the offending
/// input is skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A WGSL type name that is not in the layout table.
    #[error("unknown WGSL type `{0}`")]
    UnknownType(String),
    /// A texture or sampler binding was asked for its resource before one was assigned.
    #[error("bind group `{group}`: binding `{binding}` has no resource")]
    MissingResource { group: String, binding: String },
    /// A binding was used before its GPU buffer (or result buffer) was created.
    #[error("binding `{0}` has no GPU buffer")]
    NoBuffer(String),
    #[error(transparent)]
    Device(#[from] imp::DeviceError),
}
