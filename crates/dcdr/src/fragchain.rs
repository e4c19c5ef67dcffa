// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Reassembly of a fragmented sample into one contiguous buffer.
//!
//! Transports deliver a sample as a chain of byte-range fragments which may
//! overlap (retransmissions). The chain is walked front to back; a fragment
//! that ends at or before the bytes already copied contributes nothing and is
//! skipped, an overlapping one contributes only its tail.

use crate::error::{CdrError, SerResult};

/// One received fragment: the byte range `[min, maxp1)` of the full sample.
pub struct Fragment<'a> {
    pub min: u32,
    pub maxp1: u32,
    pub payload: &'a [u8],
}

impl<'a> Fragment<'a> {
    pub fn new(min: u32, payload: &'a [u8]) -> Self {
        Fragment { min, maxp1: min + payload.len() as u32, payload }
    }
}

/// Copies a fragment chain into a single `size`-byte buffer.
///
/// The chain must be ordered by range start and cover the whole sample;
/// a gap, a range past `size` or a chain ending short of it is malformed
/// input from the transport and fails with `InvalidData`.
pub fn assemble(chain: &[Fragment<'_>], size: usize) -> SerResult<Vec<u8>> {
    let mut out = vec![0u8; size];
    let mut off = 0usize;

    for frag in chain {
        let min = frag.min as usize;
        let maxp1 = frag.maxp1 as usize;
        if maxp1 < min {
            return Err(CdrError::InvalidData { reason: "fragment range is inverted".into() });
        }
        if frag.payload.len() < maxp1 - min {
            return Err(CdrError::InvalidData {
                reason: "fragment payload shorter than its declared range".into(),
            });
        }
        if maxp1 <= off {
            // Fully covered by earlier fragments.
            continue;
        }
        if min > off {
            log::debug!("[fragchain] gap at offset {} (next fragment starts at {})", off, min);
            return Err(CdrError::InvalidData { reason: "gap in fragment chain".into() });
        }
        if maxp1 > size {
            log::debug!("[fragchain] chain reaches {} past sample size {}", maxp1, size);
            return Err(CdrError::InvalidData {
                reason: "fragment chain exceeds sample size".into(),
            });
        }
        let src_start = off - min;
        out[off..maxp1].copy_from_slice(&frag.payload[src_start..maxp1 - min]);
        off = maxp1;
    }

    if off < size {
        return Err(CdrError::InvalidData {
            reason: "fragment chain ends short of sample size".into(),
        });
    }
    Ok(out)
}
