// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! XCDR version 1: parameter-list encoding with per-member headers.
//!
//! Members of mutable structs, and optional members anywhere, are framed by a
//! parameter header carrying the member id and the serialized length. The
//! short form packs both into 4 bytes; ids that do not fit (or members
//! without a bit bound, whose width the peer cannot derive) fall back to the
//! 12-byte extended form. A mutable struct's member list is terminated by a
//! sentinel entry. Maximum alignment is 8, as in plain CDR.

use crate::error::{CdrError, SerResult};
use crate::props::{BitBound, Extensibility, MemberProps, TypeProps};
use crate::stream::{
    status, Buf, CdrStream, Endianness, MemberWalk, NoBuf, ReadBuf, StreamMode, Streamer,
    WriteBuf,
};

const V1_MAX_ALIGNMENT: usize = 8;

/// Member id bits of a short parameter header.
const PID_MASK: u16 = 0x3FFF;
/// Sentinel id announcing an extended header.
const PID_EXTENDED: u16 = 0x3F01;
/// Sentinel id terminating a parameter list.
const PID_LIST_END: u16 = 0x3F02;
/// Sentinel id for an entry the reader must skip.
const PID_IGNORE: u16 = 0x3F03;
const PID_FLAG_IMPL_EXTENSION: u16 = 0x8000;
const PID_FLAG_MUST_UNDERSTAND: u16 = 0x4000;

/// Member id bits of an extended header.
const PL_EXTENDED_MASK: u32 = 0x0FFF_FFFF;
const PL_EXTENDED_FLAG_IMPL_EXTENSION: u32 = 0x8000_0000;
const PL_EXTENDED_FLAG_MUST_UNDERSTAND: u32 = 0x4000_0000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum HeaderKind {
    Short,
    Extended,
}

/// Per-started-member state, popped by `finish_member`.
struct Frame {
    header: Option<HeaderKind>,
}

enum WireEntry {
    ListEnd,
    Ignore { size: u32 },
    Member { m_id: u32, must_understand: bool, size: u32 },
}

pub struct XcdrV1Stream<B: Buf> {
    base: CdrStream<B>,
    frames: Vec<Frame>,
}

impl<'a> XcdrV1Stream<ReadBuf<'a>> {
    pub fn reader(buf: &'a [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        XcdrV1Stream {
            base: CdrStream::new(
                ReadBuf::new(buf),
                StreamMode::Read,
                endianness,
                V1_MAX_ALIGNMENT,
                ignore_faults,
            ),
            frames: Vec::new(),
        }
    }
}

impl<'a> XcdrV1Stream<WriteBuf<'a>> {
    pub fn writer(buf: &'a mut [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        XcdrV1Stream {
            base: CdrStream::new(
                WriteBuf::new(buf),
                StreamMode::Write,
                endianness,
                V1_MAX_ALIGNMENT,
                ignore_faults,
            ),
            frames: Vec::new(),
        }
    }
}

impl XcdrV1Stream<NoBuf> {
    pub fn sizer(mode: StreamMode, endianness: Endianness) -> Self {
        debug_assert!(matches!(mode, StreamMode::Move | StreamMode::Max));
        XcdrV1Stream {
            base: CdrStream::new(NoBuf, mode, endianness, V1_MAX_ALIGNMENT, 0),
            frames: Vec::new(),
        }
    }
}

impl<B: Buf> XcdrV1Stream<B> {
    /// Whether `member` is framed by a parameter header.
    fn header_necessary(&self, member: &MemberProps) -> bool {
        !self.base.is_key_mode()
            && (member.p_ext == Extensibility::Mutable || member.is_optional)
    }

    /// Whether the struct at `node` serializes as a terminated parameter list.
    fn list_necessary(&self, member: &MemberProps) -> bool {
        !self.base.is_key_mode() && member.e_ext == Extensibility::Mutable
    }

    /// The short header derives the member width from the bit bound, so
    /// unbounded members need the extended form, as do ids at or beyond the
    /// sentinel range.
    fn extended_necessary(member: &MemberProps) -> bool {
        member.e_bb == BitBound::Unset || member.m_id >= PID_EXTENDED as u32
    }

    fn write_header(&mut self, member: &MemberProps) -> SerResult<HeaderKind> {
        self.base.align(4, true)?;
        // Implicit key marks stay local; only explicit must-understand (which
        // explicit key annotations carry) reaches the wire.
        let mu = member.must_understand;
        if Self::extended_necessary(member) {
            self.base.write_u16(PID_EXTENDED | PID_FLAG_MUST_UNDERSTAND)?;
            self.base.write_u16(8)?;
            let mut emheader = member.m_id & PL_EXTENDED_MASK;
            if mu {
                emheader |= PL_EXTENDED_FLAG_MUST_UNDERSTAND;
            }
            if member.implementation_extension {
                emheader |= PL_EXTENDED_FLAG_IMPL_EXTENSION;
            }
            self.base.write_u32(emheader)?;
            self.base.write_u32(0)?;
            Ok(HeaderKind::Extended)
        } else {
            let mut phdr = member.m_id as u16 & PID_MASK;
            if mu {
                phdr |= PID_FLAG_MUST_UNDERSTAND;
            }
            if member.implementation_extension {
                phdr |= PID_FLAG_IMPL_EXTENSION;
            }
            self.base.write_u16(phdr)?;
            self.base.write_u16(0)?;
            Ok(HeaderKind::Short)
        }
    }

    /// Backpatches the length field now that the member content size is
    /// known. `e_off` is the content start, directly behind the length field.
    fn finish_write_header(&mut self, kind: HeaderKind, e_off: usize) -> SerResult<()> {
        let end = self.base.position();
        let e_sz = end - e_off;
        match kind {
            HeaderKind::Extended => {
                self.base.set_position(e_off - 4);
                self.base.write_u32(e_sz as u32)?;
            }
            HeaderKind::Short => {
                self.base.set_position(e_off - 2);
                self.base.write_u16(e_sz as u16)?;
            }
        }
        self.base.set_position(end);
        Ok(())
    }

    fn read_header(&mut self) -> SerResult<WireEntry> {
        self.base.align(4, false)?;
        let phdr = self.base.read_u16()?;
        let plen = self.base.read_u16()?;
        let pid = phdr & PID_MASK;

        if pid == PID_LIST_END {
            return Ok(WireEntry::ListEnd);
        }
        if pid == PID_EXTENDED {
            let emheader = self.base.read_u32()?;
            let e_sz = self.base.read_u32()?;
            return Ok(WireEntry::Member {
                m_id: emheader & PL_EXTENDED_MASK,
                must_understand: emheader & PL_EXTENDED_FLAG_MUST_UNDERSTAND != 0,
                size: e_sz,
            });
        }
        if pid == PID_IGNORE {
            return Ok(WireEntry::Ignore { size: plen as u32 });
        }
        if pid > PID_IGNORE {
            // Reserved id range; tolerated as an ignore entry when masked.
            self.base
                .raise(status::INVALID_PL_ENTRY, CdrError::InvalidPlEntry { pid })?;
            return Ok(WireEntry::Ignore { size: plen as u32 });
        }
        Ok(WireEntry::Member {
            m_id: pid as u32,
            must_understand: phdr & PID_FLAG_MUST_UNDERSTAND != 0,
            size: plen as u32,
        })
    }

    fn next_list_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
    ) -> SerResult<Option<usize>> {
        loop {
            if !self.base.has_bytes(4) {
                return Ok(None);
            }
            match self.read_header()? {
                WireEntry::ListEnd => return Ok(None),
                WireEntry::Ignore { size } => self.base.skip_bytes(size as usize)?,
                WireEntry::Member { m_id, must_understand, size } => {
                    match self.base.resolve_member(props, walk, m_id) {
                        Some(node) => {
                            if size == 0 && props.node(node).is_optional {
                                self.base.record_consumed(m_id);
                                continue;
                            }
                            self.base.set_pending_header(size, must_understand);
                            return Ok(Some(node));
                        }
                        None => {
                            log::debug!(
                                "[xcdr_v1] skipping unknown member {} ({} bytes)",
                                m_id,
                                size
                            );
                            if must_understand {
                                self.base.raise(
                                    status::MUST_UNDERSTAND_FAIL,
                                    CdrError::MustUnderstandUnknown { member_id: m_id },
                                )?;
                            }
                            self.base.skip_bytes(size as usize)?;
                        }
                    }
                }
            }
        }
    }

    fn next_plain_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
    ) -> SerResult<Option<usize>> {
        while let Some(node) = self.base.next_in_order(props, walk) {
            let member = props.node(node);
            if member.is_optional && !self.base.is_key_mode() {
                // Absent optionals occupy a zero-length list entry.
                match self.read_header()? {
                    WireEntry::Member { m_id, must_understand, size } => {
                        if size == 0 {
                            self.base.record_consumed(m_id);
                            continue;
                        }
                        self.base.set_pending_header(size, must_understand);
                        return Ok(Some(node));
                    }
                    WireEntry::Ignore { size } => {
                        self.base.skip_bytes(size as usize)?;
                        continue;
                    }
                    WireEntry::ListEnd => return Ok(None),
                }
            }
            self.base.set_pending_header(0, false);
            return Ok(Some(node));
        }
        Ok(None)
    }
}

impl<B: Buf> Streamer for XcdrV1Stream<B> {
    type Buffer = B;

    fn base(&self) -> &CdrStream<B> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CdrStream<B> {
        &mut self.base
    }

    fn start_struct(&mut self, _props: &TypeProps, _node: usize) -> SerResult<()> {
        self.base.begin_struct_scope();
        Ok(())
    }

    fn finish_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                if self.list_necessary(props.node(node)) {
                    self.base.align(4, true)?;
                    self.base.write_u16(PID_LIST_END | PID_FLAG_MUST_UNDERSTAND)?;
                    self.base.write_u16(0)?;
                }
                Ok(())
            }
            StreamMode::Read => self.base.end_struct_scope(props, node),
        }
    }

    fn start_member(&mut self, props: &TypeProps, node: usize, present: bool) -> SerResult<()> {
        let member = props.node(node);
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                let header = if self.header_necessary(member) {
                    if member.p_ext == Extensibility::Mutable && !present {
                        // Absent members of a mutable struct are omitted
                        // from the list entirely.
                        None
                    } else {
                        Some(self.write_header(member)?)
                    }
                } else {
                    None
                };
                self.frames.push(Frame { header });
                self.base.record_member_start();
            }
            StreamMode::Read => {
                let headered = self.header_necessary(member);
                self.frames.push(Frame {
                    header: headered.then_some(HeaderKind::Short),
                });
                if headered {
                    let end = self.base.position() + self.base.pending_size() as usize;
                    self.base.push_bound(end);
                }
                self.base.record_member_start();
            }
        }
        Ok(())
    }

    fn finish_member(&mut self, props: &TypeProps, node: usize, _present: bool) -> SerResult<()> {
        let e_off = self.base.pop_member_start();
        let frame = self.frames.pop().unwrap_or(Frame { header: None });
        match self.base.mode() {
            StreamMode::Write => {
                if let Some(kind) = frame.header {
                    self.finish_write_header(kind, e_off)?;
                }
            }
            StreamMode::Move | StreamMode::Max => {}
            StreamMode::Read => {
                if frame.header.is_some() {
                    self.base.pop_bound();
                }
                self.base.record_consumed(props.node(node).m_id);
            }
        }
        Ok(())
    }

    fn next_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
    ) -> SerResult<Option<usize>> {
        if self.base.mode() != StreamMode::Read {
            return Ok(self.base.next_in_order(props, walk));
        }
        if self.list_necessary(props.node(walk.parent)) {
            self.next_list_entity(props, walk)
        } else {
            self.next_plain_entity(props, walk)
        }
    }
}
