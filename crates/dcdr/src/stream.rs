// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Base CDR stream: a bounds-checked cursor over a byte buffer.
//!
//! One [`CdrStream`] is used by exactly one thread for the duration of one
//! encode, decode or sizing pass; there is no internal locking. The buffer
//! flavor is a compile-time parameter ([`Buf`]): a borrowed byte slice for
//! reading, a mutable slice for writing, or nothing at all for the cursor-only
//! sizing modes. Stream variants ([`crate::basic::BasicCdrStream`],
//! [`crate::xcdr_v1::XcdrV1Stream`], [`crate::xcdr_v2::XcdrV2Stream`]) wrap
//! the base and implement the [`Streamer`] traversal contract.

use crate::error::{CdrError, SerResult};
use crate::props::TypeProps;

/// Status bitmasks recorded on the stream as faults are encountered.
///
/// The constructor's `ignore_faults` mask selects which of these are
/// tolerated: a masked fault is recorded but does not abort the operation.
/// Bound faults always abort regardless of the mask, since continuing past a
/// buffer end is never recoverable.
pub mod status {
    pub const MOVE_BOUND_EXCEEDED: u64 = 1 << 0;
    pub const WRITE_BOUND_EXCEEDED: u64 = 1 << 1;
    pub const READ_BOUND_EXCEEDED: u64 = 1 << 2;
    pub const INVALID_PL_ENTRY: u64 = 1 << 3;
    pub const MUST_UNDERSTAND_FAIL: u64 = 1 << 4;
    pub const UNSUPPORTED_XTYPES: u64 = 1 << 5;
    pub const INVALID_DATA: u64 = 1 << 6;
}

/// Endianness of the serialized representation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// What an operation does with the buffer.
///
/// `Move` and `Max` only advance the cursor, computing serialized sizes
/// without touching any bytes (`Max` with a default-constructed sample gives
/// an allocation estimate).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StreamMode {
    Read,
    Write,
    Move,
    Max,
}

/// Backing storage flavor of a stream.
pub trait Buf {
    fn capacity(&self) -> usize;
    fn read_into(&self, pos: usize, dst: &mut [u8]);
    fn write_from(&mut self, pos: usize, src: &[u8]);
}

/// Read-only source buffer.
pub struct ReadBuf<'a>(&'a [u8]);

impl<'a> ReadBuf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ReadBuf(buf)
    }
}

impl Buf for ReadBuf<'_> {
    fn capacity(&self) -> usize {
        self.0.len()
    }

    fn read_into(&self, pos: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0[pos..pos + dst.len()]);
    }

    fn write_from(&mut self, _pos: usize, _src: &[u8]) {
        debug_assert!(false, "write into a read buffer");
    }
}

/// Mutable destination buffer.
pub struct WriteBuf<'a>(&'a mut [u8]);

impl<'a> WriteBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        WriteBuf(buf)
    }
}

impl Buf for WriteBuf<'_> {
    fn capacity(&self) -> usize {
        self.0.len()
    }

    fn read_into(&self, pos: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0[pos..pos + dst.len()]);
    }

    fn write_from(&mut self, pos: usize, src: &[u8]) {
        self.0[pos..pos + src.len()].copy_from_slice(src);
    }
}

/// No buffer: cursor-only sizing passes.
pub struct NoBuf;

impl Buf for NoBuf {
    fn capacity(&self) -> usize {
        usize::MAX
    }

    fn read_into(&self, _pos: usize, _dst: &mut [u8]) {
        debug_assert!(false, "read from a sizing stream");
    }

    fn write_from(&mut self, _pos: usize, _src: &[u8]) {}
}

/// Generate aligned primitive accessors with stream-endianness byte order.
macro_rules! impl_stream_prim {
    ($write_fn:ident, $read_fn:ident, $t:ty, $size:expr) => {
        pub fn $write_fn(&mut self, value: $t) -> SerResult<()> {
            self.align($size, true)?;
            let bytes = match self.endianness {
                Endianness::Little => value.to_le_bytes(),
                Endianness::Big => value.to_be_bytes(),
            };
            self.put_bytes(&bytes)
        }

        pub fn $read_fn(&mut self) -> SerResult<$t> {
            self.align($size, false)?;
            let mut bytes = [0u8; $size];
            self.get_bytes(&mut bytes)?;
            Ok(match self.endianness {
                Endianness::Little => <$t>::from_le_bytes(bytes),
                Endianness::Big => <$t>::from_be_bytes(bytes),
            })
        }
    };
}

const PAD_ZEROES: [u8; 8] = [0u8; 8];

/// The shared cursor state of every stream variant.
pub struct CdrStream<B: Buf> {
    buf: B,
    mode: StreamMode,
    key_mode: bool,
    endianness: Endianness,
    max_alignment: usize,
    position: usize,
    alignment: usize,
    status: u64,
    fault_mask: u64,
    /// Buffer-end bound stack; entry 0 is the buffer capacity, further
    /// entries are member/struct bounds derived from wire length prefixes.
    bounds: Vec<usize>,
    /// Member content start offsets, one per started member.
    member_starts: Vec<usize>,
    /// Member ids consumed so far, one set per struct level (read mode).
    consumed: Vec<Vec<u32>>,
    /// Size of the current wire member, taken from its header (read mode).
    pending_size: u32,
    /// Must-understand flag of the current wire member (read mode).
    pending_must_understand: bool,
}

impl<B: Buf> CdrStream<B> {
    pub fn new(
        buf: B,
        mode: StreamMode,
        endianness: Endianness,
        max_alignment: usize,
        ignore_faults: u64,
    ) -> Self {
        let capacity = buf.capacity();
        CdrStream {
            buf,
            mode,
            key_mode: false,
            endianness,
            max_alignment,
            position: 0,
            alignment: 1,
            status: 0,
            fault_mask: !ignore_faults,
            bounds: vec![capacity],
            member_starts: Vec::new(),
            consumed: Vec::new(),
            pending_size: 0,
            pending_must_understand: false,
        }
    }

    /// Invalidates all stacks and zeroes status, position and alignment, so
    /// the stream can run another operation over its buffer.
    pub fn reset(&mut self) {
        let capacity = self.buf.capacity();
        self.position = 0;
        self.alignment = 1;
        self.status = 0;
        self.bounds.clear();
        self.bounds.push(capacity);
        self.member_starts.clear();
        self.consumed.clear();
        self.pending_size = 0;
        self.pending_must_understand = false;
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn status(&self) -> u64 {
        self.status
    }

    /// Switches key-only streaming on or off. In key mode only `is_key`
    /// members are traversed and all X-Types framing is suppressed.
    pub fn set_key_mode(&mut self, key_mode: bool) {
        self.key_mode = key_mode;
    }

    pub fn is_key_mode(&self) -> bool {
        self.key_mode
    }

    /// Records a fault; returns an error unless the fault class is masked.
    pub fn raise(&mut self, bit: u64, err: CdrError) -> SerResult<()> {
        self.status |= bit;
        if bit & self.fault_mask != 0 {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn bound(&self) -> usize {
        *self.bounds.last().unwrap_or(&usize::MAX)
    }

    /// Peek variant of the bound check: no status change, no error.
    pub fn has_bytes(&self, needed: usize) -> bool {
        match self.mode {
            StreamMode::Read | StreamMode::Write => {
                self.position.saturating_add(needed) <= self.bound()
            }
            _ => true,
        }
    }

    /// Strict bound check; records the mode's bound-exceeded status and
    /// fails when fewer than `needed` bytes remain before the current bound.
    pub fn require_bytes(&mut self, needed: usize) -> SerResult<()> {
        match self.mode {
            StreamMode::Read => {
                if self.position.saturating_add(needed) > self.bound() {
                    self.status |= status::READ_BOUND_EXCEEDED;
                    return Err(CdrError::ReadBoundExceeded { position: self.position, needed });
                }
            }
            StreamMode::Write => {
                if self.position.saturating_add(needed) > self.bound() {
                    self.status |= status::WRITE_BOUND_EXCEEDED;
                    return Err(CdrError::WriteBoundExceeded { position: self.position, needed });
                }
            }
            StreamMode::Move | StreamMode::Max => {}
        }
        Ok(())
    }

    /// Advances the cursor to the next multiple of
    /// `min(new_alignment, max_alignment)`, zero-filling the padding when
    /// writing and `add_zeroes` is set.
    pub fn align(&mut self, new_alignment: usize, add_zeroes: bool) -> SerResult<()> {
        let alignment = new_alignment.min(self.max_alignment).max(1);
        self.alignment = alignment;
        let to_move = (alignment - self.position % alignment) % alignment;
        if to_move == 0 {
            return Ok(());
        }
        self.require_bytes(to_move)?;
        if self.mode == StreamMode::Write && add_zeroes {
            self.buf.write_from(self.position, &PAD_ZEROES[..to_move]);
        }
        self.position += to_move;
        Ok(())
    }

    /// Raw unaligned append; advances the cursor without touching bytes in
    /// the sizing modes.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> SerResult<()> {
        debug_assert!(self.mode != StreamMode::Read, "put_bytes on a read stream");
        self.require_bytes(bytes.len())?;
        if self.mode == StreamMode::Write {
            self.buf.write_from(self.position, bytes);
        }
        self.position += bytes.len();
        Ok(())
    }

    /// Advances past `n` bytes without interpreting them (unknown-member
    /// skip on read).
    pub fn skip_bytes(&mut self, n: usize) -> SerResult<()> {
        self.require_bytes(n)?;
        self.position += n;
        Ok(())
    }

    /// Raw unaligned read of `dst.len()` bytes at the cursor.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> SerResult<()> {
        debug_assert!(self.mode == StreamMode::Read, "get_bytes on a non-read stream");
        self.require_bytes(dst.len())?;
        self.buf.read_into(self.position, dst);
        self.position += dst.len();
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> SerResult<()> {
        self.put_bytes(&[value])
    }

    pub fn read_u8(&mut self) -> SerResult<u8> {
        let mut b = [0u8; 1];
        self.get_bytes(&mut b)?;
        Ok(b[0])
    }

    impl_stream_prim!(write_u16, read_u16, u16, 2);
    impl_stream_prim!(write_u32, read_u32, u32, 4);
    impl_stream_prim!(write_u64, read_u64, u64, 8);
    impl_stream_prim!(write_i16, read_i16, i16, 2);
    impl_stream_prim!(write_i32, read_i32, i32, 4);
    impl_stream_prim!(write_i64, read_i64, i64, 8);

    pub fn write_f32(&mut self, value: f32) -> SerResult<()> {
        self.write_u32(value.to_bits())
    }

    pub fn read_f32(&mut self) -> SerResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn write_f64(&mut self, value: f64) -> SerResult<()> {
        self.write_u64(value.to_bits())
    }

    pub fn read_f64(&mut self) -> SerResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    // Member bookkeeping shared by the variants.

    /// Remembers where the current member's content starts (after any
    /// header), for length backpatching and completeness tracking.
    pub fn record_member_start(&mut self) {
        self.member_starts.push(self.position);
    }

    pub fn pop_member_start(&mut self) -> usize {
        debug_assert!(!self.member_starts.is_empty(), "unbalanced member start/finish");
        self.member_starts.pop().unwrap_or(0)
    }

    /// Establishes a new buffer-end bound for a length-prefixed sub-region.
    pub fn push_bound(&mut self, end: usize) {
        self.bounds.push(end.min(self.bound()));
    }

    /// Drops the innermost bound; on read the cursor is repositioned at the
    /// declared end so unread trailing bytes are tolerated.
    pub fn pop_bound(&mut self) {
        debug_assert!(self.bounds.len() > 1, "unbalanced bound push/pop");
        if let Some(end) = self.bounds.pop() {
            if self.mode == StreamMode::Read {
                self.position = end;
            }
        }
    }

    /// Size/must-understand taken from the wire header of the member that
    /// `next_entity` just resolved (read mode).
    pub fn set_pending_header(&mut self, size: u32, must_understand: bool) {
        self.pending_size = size;
        self.pending_must_understand = must_understand;
    }

    pub fn pending_size(&self) -> u32 {
        self.pending_size
    }

    pub fn pending_must_understand(&self) -> bool {
        self.pending_must_understand
    }

    /// Opens a struct level: begins a fresh consumed-member-id set on read.
    pub fn begin_struct_scope(&mut self) {
        if self.mode == StreamMode::Read {
            self.consumed.push(Vec::new());
        }
    }

    /// Records that a member id was processed at the current level.
    pub fn record_consumed(&mut self, m_id: u32) {
        if self.mode == StreamMode::Read {
            if let Some(level) = self.consumed.last_mut() {
                level.push(m_id);
            }
        }
    }

    /// Closes a struct level; on read, fails unless every must-understand
    /// and key member of the struct was seen (the X-Types completeness rule).
    /// Masking `MUST_UNDERSTAND_FAIL` in `ignore_faults` tolerates the gap.
    pub fn end_struct_scope(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        if self.mode != StreamMode::Read {
            return Ok(());
        }
        let seen = self.consumed.pop().unwrap_or_default();
        let mut it = props.first_member(node, self.key_mode);
        while let Some(m) = it {
            let member = props.node(m);
            // In key mode every key member is required; otherwise only
            // must-understand members are.
            let required = if self.key_mode { member.is_key } else { member.must_understand };
            if required && !seen.contains(&member.m_id) {
                return self.raise(
                    status::MUST_UNDERSTAND_FAIL,
                    CdrError::MustUnderstandFail { member_id: member.m_id },
                );
            }
            it = props.next_member(m, self.key_mode);
        }
        Ok(())
    }

    /// Plain declaration-order (or key-order) traversal step, used directly
    /// by every variant outside the header-driven read paths.
    pub fn next_in_order(&self, props: &TypeProps, walk: &mut MemberWalk) -> Option<usize> {
        let next = if walk.started {
            walk.cursor.and_then(|c| props.next_member(c, self.key_mode))
        } else {
            walk.started = true;
            props.first_member(walk.parent, self.key_mode)
        };
        walk.cursor = next;
        next
    }

    /// Forward-then-backward sibling probe for a wire member id, tolerating
    /// out-of-order parameter lists.
    pub fn resolve_member(
        &self,
        props: &TypeProps,
        walk: &mut MemberWalk,
        m_id: u32,
    ) -> Option<usize> {
        let mut it = match walk.cursor {
            Some(c) => props.next_member(c, self.key_mode),
            None => props.first_member(walk.parent, self.key_mode),
        };
        while let Some(i) = it {
            if props.node(i).m_id == m_id {
                walk.started = true;
                walk.cursor = Some(i);
                return Some(i);
            }
            it = props.next_member(i, self.key_mode);
        }
        let mut it = walk.cursor;
        while let Some(i) = it {
            if props.node(i).m_id == m_id {
                walk.started = true;
                walk.cursor = Some(i);
                return Some(i);
            }
            it = props.prev_member(i, self.key_mode);
        }
        None
    }
}

/// Per-struct-level traversal cursor handed to `next_entity`.
pub struct MemberWalk {
    pub(crate) parent: usize,
    pub(crate) cursor: Option<usize>,
    pub(crate) started: bool,
}

impl MemberWalk {
    pub fn new(parent: usize) -> Self {
        MemberWalk { parent, cursor: None, started: false }
    }
}

/// The traversal contract every encoding variant satisfies: balanced
/// start/finish pairs, monotonic bound checking and id-based completeness
/// tracking, with variant-specific framing layered on top.
pub trait Streamer {
    type Buffer: Buf;

    fn base(&self) -> &CdrStream<Self::Buffer>;
    fn base_mut(&mut self) -> &mut CdrStream<Self::Buffer>;

    fn start_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()>;
    fn finish_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()>;
    fn start_member(&mut self, props: &TypeProps, node: usize, present: bool) -> SerResult<()>;
    fn finish_member(&mut self, props: &TypeProps, node: usize, present: bool) -> SerResult<()>;

    /// Yields the next member to process at this level, or `None` when the
    /// level is exhausted. On read this may consume wire headers, skip
    /// unknown members and resolve reordered ones.
    fn next_entity(&mut self, props: &TypeProps, walk: &mut MemberWalk)
        -> SerResult<Option<usize>>;

    /// Marks the start of a run of sequence/array elements. Only XCDR2
    /// attaches framing to these.
    fn start_consecutive(&mut self, is_array: bool, primitive: bool) -> SerResult<()> {
        let _ = (is_array, primitive);
        Ok(())
    }

    fn finish_consecutive(&mut self) -> SerResult<()> {
        Ok(())
    }
}
