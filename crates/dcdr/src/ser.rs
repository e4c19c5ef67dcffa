// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Generic struct walkers over the [`Streamer`] variants.
//!
//! A serializable type implements [`Streamable`]: it exposes its finished
//! [`TypeProps`] tree and dispatches per-member reads and writes. The walkers
//! here drive the traversal so the per-type code stays declarative; in a full
//! middleware these impls come out of a code generator.

use crate::error::{CdrError, SerResult};
use crate::props::{TypeProps, ROOT};
use crate::stream::{status, Buf, CdrStream, MemberWalk, Streamer};

/// A type that can stream itself member by member.
pub trait Streamable {
    /// The finished property tree for this type, built once.
    fn type_props() -> &'static TypeProps;

    /// Serializes the member at `node` onto the stream.
    fn write_member<S: Streamer>(
        &self,
        stream: &mut S,
        props: &TypeProps,
        node: usize,
    ) -> SerResult<()>;

    /// Deserializes the member at `node` from the stream.
    fn read_member<S: Streamer>(
        &mut self,
        stream: &mut S,
        props: &TypeProps,
        node: usize,
    ) -> SerResult<()>;

    /// Presence of an optional member; non-optionals are always present.
    fn member_present(&self, _m_id: u32) -> bool {
        true
    }
}

/// Walks one struct level on write (also drives the sizing modes).
pub fn write_struct_body<S: Streamer, T: Streamable + ?Sized>(
    value: &T,
    stream: &mut S,
    props: &TypeProps,
    node: usize,
) -> SerResult<()> {
    stream.start_struct(props, node)?;
    let mut walk = MemberWalk::new(node);
    while let Some(m) = stream.next_entity(props, &mut walk)? {
        let member = props.node(m);
        let present = !member.is_optional || value.member_present(member.m_id);
        stream.start_member(props, m, present)?;
        if present {
            value.write_member(stream, props, m)?;
        }
        stream.finish_member(props, m, present)?;
    }
    stream.finish_struct(props, node)
}

/// Walks one struct level on read. Absent optionals are filtered out by
/// `next_entity`, so every yielded member carries content.
pub fn read_struct_body<S: Streamer, T: Streamable + ?Sized>(
    value: &mut T,
    stream: &mut S,
    props: &TypeProps,
    node: usize,
) -> SerResult<()> {
    stream.start_struct(props, node)?;
    let mut walk = MemberWalk::new(node);
    while let Some(m) = stream.next_entity(props, &mut walk)? {
        stream.start_member(props, m, true)?;
        value.read_member(stream, props, m)?;
        stream.finish_member(props, m, true)?;
    }
    stream.finish_struct(props, node)
}

/// Serializes `value` onto `stream`; returns the bytes produced (or, for a
/// sizing stream, the computed size).
pub fn write<S: Streamer, T: Streamable>(value: &T, stream: &mut S) -> SerResult<usize> {
    write_struct_body(value, stream, T::type_props(), ROOT)?;
    Ok(stream.base().position())
}

/// Deserializes a `T` from `stream`, starting from its default value.
pub fn read<S: Streamer, T: Streamable + Default>(stream: &mut S) -> SerResult<T> {
    let mut value = T::default();
    read_struct_body(&mut value, stream, T::type_props(), ROOT)?;
    Ok(value)
}

/// A fixed-width primitive with a direct wire representation.
pub trait CdrPrimitive: Copy {
    const SIZE: usize;
    fn write_to<B: Buf>(self, stream: &mut CdrStream<B>) -> SerResult<()>;
    fn read_from<B: Buf>(stream: &mut CdrStream<B>) -> SerResult<Self>;
}

macro_rules! impl_cdr_primitive {
    ($t:ty, $size:expr, $write:ident, $read:ident) => {
        impl CdrPrimitive for $t {
            const SIZE: usize = $size;

            fn write_to<B: Buf>(self, stream: &mut CdrStream<B>) -> SerResult<()> {
                stream.$write(self)
            }

            fn read_from<B: Buf>(stream: &mut CdrStream<B>) -> SerResult<Self> {
                stream.$read()
            }
        }
    };
}

impl_cdr_primitive!(u8, 1, write_u8, read_u8);
impl_cdr_primitive!(u16, 2, write_u16, read_u16);
impl_cdr_primitive!(u32, 4, write_u32, read_u32);
impl_cdr_primitive!(u64, 8, write_u64, read_u64);
impl_cdr_primitive!(i16, 2, write_i16, read_i16);
impl_cdr_primitive!(i32, 4, write_i32, read_i32);
impl_cdr_primitive!(i64, 8, write_i64, read_i64);
impl_cdr_primitive!(f32, 4, write_f32, read_f32);
impl_cdr_primitive!(f64, 8, write_f64, read_f64);

impl CdrPrimitive for i8 {
    const SIZE: usize = 1;

    fn write_to<B: Buf>(self, stream: &mut CdrStream<B>) -> SerResult<()> {
        stream.write_u8(self as u8)
    }

    fn read_from<B: Buf>(stream: &mut CdrStream<B>) -> SerResult<Self> {
        Ok(stream.read_u8()? as i8)
    }
}

impl CdrPrimitive for bool {
    const SIZE: usize = 1;

    fn write_to<B: Buf>(self, stream: &mut CdrStream<B>) -> SerResult<()> {
        stream.write_u8(self as u8)
    }

    fn read_from<B: Buf>(stream: &mut CdrStream<B>) -> SerResult<Self> {
        Ok(stream.read_u8()? != 0)
    }
}

/// Length-prefixed, NUL-terminated string (length counts the NUL).
pub fn write_string<S: Streamer>(stream: &mut S, value: &str) -> SerResult<()> {
    let base = stream.base_mut();
    base.write_u32(value.len() as u32 + 1)?;
    base.put_bytes(value.as_bytes())?;
    base.write_u8(0)
}

pub fn read_string<S: Streamer>(stream: &mut S) -> SerResult<String> {
    let base = stream.base_mut();
    let len = base.read_u32()? as usize;
    if len == 0 {
        return Ok(String::new());
    }
    // Bound check before allocating from wire-controlled length.
    base.require_bytes(len)?;
    let mut bytes = vec![0u8; len];
    base.get_bytes(&mut bytes)?;
    if bytes.pop() != Some(0) {
        base.raise(
            status::INVALID_DATA,
            CdrError::InvalidData { reason: "string is not NUL-terminated".into() },
        )?;
        return Ok(String::new());
    }
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(_) => {
            base.raise(
                status::INVALID_DATA,
                CdrError::InvalidData { reason: "string is not valid UTF-8".into() },
            )?;
            Ok(String::new())
        }
    }
}

/// Length-prefixed sequence of primitives.
pub fn write_seq<S: Streamer, T: CdrPrimitive>(stream: &mut S, values: &[T]) -> SerResult<()> {
    stream.start_consecutive(false, true)?;
    stream.base_mut().write_u32(values.len() as u32)?;
    for v in values {
        v.write_to(stream.base_mut())?;
    }
    stream.finish_consecutive()
}

pub fn read_seq<S: Streamer, T: CdrPrimitive>(stream: &mut S) -> SerResult<Vec<T>> {
    stream.start_consecutive(false, true)?;
    let n = stream.base_mut().read_u32()? as usize;
    // Element bytes are a lower bound on what must remain; rejects absurd
    // lengths before the allocation.
    stream.base_mut().require_bytes(n.saturating_mul(T::SIZE))?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(T::read_from(stream.base_mut())?);
    }
    stream.finish_consecutive()?;
    Ok(out)
}

/// Length-prefixed sequence of nested streamable structs.
pub fn write_struct_seq<S: Streamer, T: Streamable>(
    stream: &mut S,
    values: &[T],
) -> SerResult<()> {
    stream.start_consecutive(false, false)?;
    stream.base_mut().write_u32(values.len() as u32)?;
    for v in values {
        write_struct_body(v, stream, T::type_props(), ROOT)?;
    }
    stream.finish_consecutive()
}

pub fn read_struct_seq<S: Streamer, T: Streamable + Default>(
    stream: &mut S,
) -> SerResult<Vec<T>> {
    stream.start_consecutive(false, false)?;
    let n = stream.base_mut().read_u32()? as usize;
    stream.base_mut().require_bytes(n)?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut v = T::default();
        read_struct_body(&mut v, stream, T::type_props(), ROOT)?;
        out.push(v);
    }
    stream.finish_consecutive()?;
    Ok(out)
}

/// Fixed-size array of primitives; no length prefix.
pub fn write_array<S: Streamer, T: CdrPrimitive, const N: usize>(
    stream: &mut S,
    values: &[T; N],
) -> SerResult<()> {
    stream.start_consecutive(true, true)?;
    for v in values {
        v.write_to(stream.base_mut())?;
    }
    stream.finish_consecutive()
}

pub fn read_array<S: Streamer, T: CdrPrimitive + Default, const N: usize>(
    stream: &mut S,
) -> SerResult<[T; N]> {
    stream.start_consecutive(true, true)?;
    let mut out = [T::default(); N];
    for slot in &mut out {
        *slot = T::read_from(stream.base_mut())?;
    }
    stream.finish_consecutive()?;
    Ok(out)
}
