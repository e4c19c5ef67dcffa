// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! 16-byte instance key hash.
//!
//! The key members are streamed in key mode (member-id order, big endian,
//! no X-Types framing), so the hash is identical no matter which encoding or
//! extensibility the sample itself travels with. A key image of at most 16
//! bytes is used raw, zero padded; anything longer is replaced by its MD5
//! digest.

use md5::{Digest, Md5};

use crate::basic::BasicCdrStream;
use crate::error::SerResult;
use crate::ser::{write, Streamable};
use crate::stream::{Endianness, StreamMode, Streamer};

pub const KEYHASH_LENGTH: usize = 16;

/// Computes the key hash of one sample.
///
/// The raw-versus-digest decision is taken from this sample's key image
/// size. DDSI-RTPS takes it from the type's maximum key size, so a type
/// whose key size varies per sample (an unbounded string key) can mix raw
/// and digested hashes across one instance set here; deciding from type
/// metadata needs serialized bounds the property tree does not carry.
/// Fixed-size keys, and any two samples with equal key values, always
/// agree.
pub fn keyhash<T: Streamable>(value: &T) -> SerResult<[u8; KEYHASH_LENGTH]> {
    let mut sizer = BasicCdrStream::sizer(StreamMode::Move, Endianness::Big);
    sizer.base_mut().set_key_mode(true);
    let size = write(value, &mut sizer)?;

    let mut image = vec![0u8; size];
    let mut writer = BasicCdrStream::writer(&mut image, Endianness::Big, 0);
    writer.base_mut().set_key_mode(true);
    write(value, &mut writer)?;

    let mut hash = [0u8; KEYHASH_LENGTH];
    if size <= KEYHASH_LENGTH {
        hash[..size].copy_from_slice(&image);
    } else {
        let mut digest = Md5::new();
        digest.update(&image);
        hash.copy_from_slice(&digest.finalize());
    }
    Ok(hash)
}
