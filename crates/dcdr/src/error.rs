// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Serialization error type shared by all stream variants.

use std::fmt;

/// Error raised by encode/decode/sizing operations.
///
/// Per-field codec failures are local: they propagate up through every
/// nested `start_*`/`finish_*` call via `?` until the top-level operation
/// returns, without unwinding anything else. A stream also records the
/// corresponding status bit (see [`crate::stream::status`]), so a caller
/// holding the stream can distinguish fault classes after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdrError {
    /// Not enough bytes remain in the current read bound.
    ReadBoundExceeded { position: usize, needed: usize },
    /// Not enough room remains in the destination buffer.
    WriteBoundExceeded { position: usize, needed: usize },
    /// A required (must-understand or key) member was absent on decode.
    MustUnderstandFail { member_id: u32 },
    /// An unknown wire member carried the must-understand flag.
    MustUnderstandUnknown { member_id: u32 },
    /// Plain CDR asked to encode a type that needs X-Types framing.
    UnsupportedExtensibility,
    /// An XCDR1 parameter list entry used a reserved id.
    InvalidPlEntry { pid: u16 },
    /// Malformed input below the per-field codec boundary.
    InvalidData { reason: String },
}

impl fmt::Display for CdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdrError::ReadBoundExceeded { position, needed } => {
                write!(f, "read bound exceeded at offset {}: {} bytes needed", position, needed)
            }
            CdrError::WriteBoundExceeded { position, needed } => {
                write!(f, "write bound exceeded at offset {}: {} bytes needed", position, needed)
            }
            CdrError::MustUnderstandFail { member_id } => {
                write!(f, "required member {} missing from stream", member_id)
            }
            CdrError::MustUnderstandUnknown { member_id } => {
                write!(f, "unknown must-understand member {} in stream", member_id)
            }
            CdrError::UnsupportedExtensibility => {
                write!(f, "type requires X-Types features unsupported by this encoding")
            }
            CdrError::InvalidPlEntry { pid } => {
                write!(f, "invalid parameter list entry id {:#06x}", pid)
            }
            CdrError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for CdrError {}

pub type SerResult<T> = core::result::Result<T, CdrError>;
