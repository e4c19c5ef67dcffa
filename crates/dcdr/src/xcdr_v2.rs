// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! XCDR version 2: delimited and member-headed encoding.
//!
//! Appendable and mutable structs are prefixed by a D-header (u32 length of
//! the struct body), letting readers of an older type skip trailing members.
//! Members of mutable structs carry an EM-header (u32 packing the member id,
//! a must-understand flag and a length code); optional members elsewhere are
//! announced by a one-byte presence tag. Non-primitive sequence and array
//! element runs are also delimited. Maximum alignment drops to 4: 8-byte
//! primitives align to 4 in this version.

use crate::error::{CdrError, SerResult};
use crate::props::{Extensibility, MemberProps, TypeProps};
use crate::stream::{
    status, Buf, CdrStream, Endianness, MemberWalk, NoBuf, ReadBuf, StreamMode, Streamer,
    WriteBuf,
};

const V2_MAX_ALIGNMENT: usize = 4;

const EM_HEADER_FLAG_MUST_UNDERSTAND: u32 = 0x8000_0000;
const EM_HEADER_LC_MASK: u32 = 0x7000_0000;
const EM_HEADER_ID_MASK: u32 = 0x0FFF_FFFF;

/// Length codes: fixed sizes 1/2/4/8, or a NEXTINT u32 that either precedes
/// the member or, for the `times` codes, doubles as its leading element
/// count.
const LC_BYTES_1: u32 = 0x0000_0000;
const LC_BYTES_2: u32 = 0x1000_0000;
const LC_BYTES_4: u32 = 0x2000_0000;
const LC_BYTES_8: u32 = 0x3000_0000;
const LC_NEXTINT: u32 = 0x4000_0000;
const LC_NEXTINT_TIMES_1: u32 = 0x5000_0000;
const LC_NEXTINT_TIMES_4: u32 = 0x6000_0000;
const LC_NEXTINT_TIMES_8: u32 = 0x7000_0000;

/// Per-started-member state, popped by `finish_member`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Frame {
    Plain,
    /// EM-header written; NEXTINT sits directly before the recorded content
    /// start and is backpatched on finish.
    EmHeader,
}

/// One open run of sequence/array elements.
struct Consecutive {
    is_array: bool,
    /// Content offset behind a D-header, when one was emitted for this run.
    d_off: Option<usize>,
}

pub struct XcdrV2Stream<B: Buf> {
    base: CdrStream<B>,
    frames: Vec<Frame>,
    /// D-header content offsets of open struct scopes (`None` for final
    /// structs, which carry no D-header).
    d_offs: Vec<Option<usize>>,
    consecutives: Vec<Consecutive>,
}

impl<'a> XcdrV2Stream<ReadBuf<'a>> {
    pub fn reader(buf: &'a [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        Self::with_base(CdrStream::new(
            ReadBuf::new(buf),
            StreamMode::Read,
            endianness,
            V2_MAX_ALIGNMENT,
            ignore_faults,
        ))
    }
}

impl<'a> XcdrV2Stream<WriteBuf<'a>> {
    pub fn writer(buf: &'a mut [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        Self::with_base(CdrStream::new(
            WriteBuf::new(buf),
            StreamMode::Write,
            endianness,
            V2_MAX_ALIGNMENT,
            ignore_faults,
        ))
    }
}

impl XcdrV2Stream<NoBuf> {
    pub fn sizer(mode: StreamMode, endianness: Endianness) -> Self {
        debug_assert!(matches!(mode, StreamMode::Move | StreamMode::Max));
        Self::with_base(CdrStream::new(NoBuf, mode, endianness, V2_MAX_ALIGNMENT, 0))
    }
}

impl<B: Buf> XcdrV2Stream<B> {
    fn with_base(base: CdrStream<B>) -> Self {
        XcdrV2Stream {
            base,
            frames: Vec::new(),
            d_offs: Vec::new(),
            consecutives: Vec::new(),
        }
    }

    fn d_header_necessary(&self, member: &MemberProps) -> bool {
        !self.base.is_key_mode()
            && matches!(member.e_ext, Extensibility::Appendable | Extensibility::Mutable)
    }

    fn em_header_necessary(&self, member: &MemberProps) -> bool {
        !self.base.is_key_mode() && member.p_ext == Extensibility::Mutable
    }

    /// One-byte presence tag for optionals outside mutable structs.
    fn tag_necessary(&self, member: &MemberProps) -> bool {
        !self.base.is_key_mode() && member.is_optional && !self.em_header_necessary(member)
    }

    fn write_d_header_placeholder(&mut self) -> SerResult<usize> {
        self.base.align(4, true)?;
        self.base.write_u32(0)?;
        Ok(self.base.position())
    }

    fn finish_d_header(&mut self, d_off: usize) -> SerResult<()> {
        if self.base.mode() != StreamMode::Write {
            return Ok(());
        }
        let end = self.base.position();
        let d_sz = end - d_off;
        if d_sz > 0 {
            self.base.set_position(d_off - 4);
            self.base.write_u32(d_sz as u32)?;
            self.base.set_position(end);
        }
        Ok(())
    }

    fn write_em_header(&mut self, member: &MemberProps) -> SerResult<()> {
        self.base.align(4, true)?;
        let mut emheader = (member.m_id & EM_HEADER_ID_MASK) | LC_NEXTINT;
        // Only explicit must-understand reaches the wire, never implicit
        // key marks.
        if member.must_understand {
            emheader |= EM_HEADER_FLAG_MUST_UNDERSTAND;
        }
        self.base.write_u32(emheader)?;
        self.base.write_u32(0)?;
        Ok(())
    }

    fn finish_em_header(&mut self, e_off: usize) -> SerResult<()> {
        let end = self.base.position();
        let e_sz = end - e_off;
        if e_sz > 0 {
            self.base.set_position(e_off - 4);
            self.base.write_u32(e_sz as u32)?;
            self.base.set_position(end);
        }
        Ok(())
    }

    /// Decodes one EM-header, leaving the cursor at the member content.
    /// Returns the member id, must-understand flag and content size.
    fn read_em_header(&mut self) -> SerResult<(u32, bool, u32)> {
        let emheader = self.base.read_u32()?;
        let m_id = emheader & EM_HEADER_ID_MASK;
        let must_understand = emheader & EM_HEADER_FLAG_MUST_UNDERSTAND != 0;
        let e_sz = match emheader & EM_HEADER_LC_MASK {
            LC_BYTES_1 => 1,
            LC_BYTES_2 => 2,
            LC_BYTES_4 => 4,
            LC_BYTES_8 => 8,
            LC_NEXTINT => self.base.read_u32()?,
            lc => {
                // The NEXTINT is an element count and doubles as the first
                // four bytes of the member content.
                let count = self.base.read_u32()? as u64;
                let factor = match lc {
                    LC_NEXTINT_TIMES_1 => 1,
                    LC_NEXTINT_TIMES_4 => 4,
                    _ => 8,
                };
                self.base.set_position(self.base.position() - 4);
                // A wire-supplied count can exceed u32 when scaled; the
                // saturated size then fails the bound check instead of
                // wrapping.
                u32::try_from(count * factor + 4).unwrap_or(u32::MAX)
            }
        };
        Ok((m_id, must_understand, e_sz))
    }

    fn next_list_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
    ) -> SerResult<Option<usize>> {
        loop {
            self.base.align(4, false)?;
            if !self.base.has_bytes(4) {
                return Ok(None);
            }
            let (m_id, must_understand, e_sz) = self.read_em_header()?;
            match self.base.resolve_member(props, walk, m_id) {
                Some(node) => {
                    if e_sz == 0 && props.node(node).is_optional {
                        self.base.record_consumed(m_id);
                        continue;
                    }
                    self.base.set_pending_header(e_sz, must_understand);
                    return Ok(Some(node));
                }
                None => {
                    log::debug!("[xcdr_v2] skipping unknown member {} ({} bytes)", m_id, e_sz);
                    if must_understand {
                        self.base.raise(
                            status::MUST_UNDERSTAND_FAIL,
                            CdrError::MustUnderstandUnknown { member_id: m_id },
                        )?;
                    }
                    self.base.skip_bytes(e_sz as usize)?;
                }
            }
        }
    }

    fn next_plain_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
        appendable: bool,
    ) -> SerResult<Option<usize>> {
        while let Some(node) = self.base.next_in_order(props, walk) {
            let member = props.node(node);
            // An appendable writer of an older type simply stops early.
            if appendable && !self.base.has_bytes(1) {
                return Ok(None);
            }
            if self.tag_necessary(member) {
                if self.base.read_u8()? == 0 {
                    self.base.record_consumed(member.m_id);
                    continue;
                }
            }
            self.base.set_pending_header(0, false);
            return Ok(Some(node));
        }
        Ok(None)
    }
}

impl<B: Buf> Streamer for XcdrV2Stream<B> {
    type Buffer = B;

    fn base(&self) -> &CdrStream<B> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CdrStream<B> {
        &mut self.base
    }

    fn start_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        self.base.begin_struct_scope();
        if !self.d_header_necessary(props.node(node)) {
            self.d_offs.push(None);
            return Ok(());
        }
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                let d_off = self.write_d_header_placeholder()?;
                self.d_offs.push(Some(d_off));
            }
            StreamMode::Read => {
                self.base.align(4, false)?;
                let d_sz = self.base.read_u32()?;
                self.base.push_bound(self.base.position() + d_sz as usize);
                self.d_offs.push(Some(self.base.position()));
            }
        }
        Ok(())
    }

    fn finish_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        let d_off = self.d_offs.pop().unwrap_or(None);
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                if let Some(d_off) = d_off {
                    self.finish_d_header(d_off)?;
                }
                Ok(())
            }
            StreamMode::Read => {
                self.base.end_struct_scope(props, node)?;
                if d_off.is_some() {
                    self.base.pop_bound();
                }
                Ok(())
            }
        }
    }

    fn start_member(&mut self, props: &TypeProps, node: usize, present: bool) -> SerResult<()> {
        let member = props.node(node);
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                if self.em_header_necessary(member) {
                    if present {
                        self.write_em_header(member)?;
                        self.frames.push(Frame::EmHeader);
                    } else {
                        // Absent members of a mutable struct are omitted.
                        self.frames.push(Frame::Plain);
                    }
                } else {
                    if self.tag_necessary(member) {
                        self.base.write_u8(present as u8)?;
                    }
                    self.frames.push(Frame::Plain);
                }
                self.base.record_member_start();
            }
            StreamMode::Read => {
                if self.em_header_necessary(member) {
                    let end = self.base.position() + self.base.pending_size() as usize;
                    self.base.push_bound(end);
                    self.frames.push(Frame::EmHeader);
                } else {
                    self.frames.push(Frame::Plain);
                }
                self.base.record_member_start();
            }
        }
        Ok(())
    }

    fn finish_member(&mut self, props: &TypeProps, node: usize, _present: bool) -> SerResult<()> {
        let e_off = self.base.pop_member_start();
        let frame = self.frames.pop().unwrap_or(Frame::Plain);
        match self.base.mode() {
            StreamMode::Write => {
                if frame == Frame::EmHeader {
                    self.finish_em_header(e_off)?;
                }
            }
            StreamMode::Move | StreamMode::Max => {}
            StreamMode::Read => {
                if frame == Frame::EmHeader {
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
        let parent = props.node(walk.parent);
        if parent.e_ext == Extensibility::Mutable && !self.base.is_key_mode() {
            self.next_list_entity(props, walk)
        } else {
            let appendable = self.d_header_necessary(parent);
            self.next_plain_entity(props, walk, appendable)
        }
    }

    fn start_consecutive(&mut self, is_array: bool, primitive: bool) -> SerResult<()> {
        // Nested arrays of arrays share the outermost delimiter.
        let nested_array =
            is_array && self.consecutives.last().map(|c| c.is_array).unwrap_or(false);
        let delimited =
            !self.base.is_key_mode() && !primitive && !nested_array;
        if !delimited {
            self.consecutives.push(Consecutive { is_array, d_off: None });
            return Ok(());
        }
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                let d_off = self.write_d_header_placeholder()?;
                self.consecutives.push(Consecutive { is_array, d_off: Some(d_off) });
            }
            StreamMode::Read => {
                self.base.align(4, false)?;
                let d_sz = self.base.read_u32()?;
                self.base.push_bound(self.base.position() + d_sz as usize);
                self.consecutives
                    .push(Consecutive { is_array, d_off: Some(self.base.position()) });
            }
        }
        Ok(())
    }

    fn finish_consecutive(&mut self) -> SerResult<()> {
        debug_assert!(!self.consecutives.is_empty(), "unbalanced consecutive scope");
        let Some(consec) = self.consecutives.pop() else {
            return Ok(());
        };
        if consec.d_off.is_none() {
            return Ok(());
        }
        match self.base.mode() {
            StreamMode::Write | StreamMode::Move | StreamMode::Max => {
                if let Some(d_off) = consec.d_off {
                    self.finish_d_header(d_off)?;
                }
            }
            StreamMode::Read => self.base.pop_bound(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::{KeyEndpoint, ROOT};

    fn run_write(props: &TypeProps, buf: &mut [u8], values: &[Option<u32>]) -> usize {
        let mut s = XcdrV2Stream::writer(buf, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(props, ROOT).expect("start struct");
        while let Some(node) = s.next_entity(props, &mut walk).expect("next entity") {
            let value = values[node - 1];
            s.start_member(props, node, value.is_some()).expect("start member");
            if let Some(v) = value {
                s.base_mut().write_u32(v).expect("write content");
            }
            s.finish_member(props, node, value.is_some()).expect("finish member");
        }
        s.finish_struct(props, ROOT).expect("finish struct");
        s.base().position()
    }

    #[test]
    fn test_mutable_optional_wire_layout() {
        // Two optional members; only the second (id 1) is set.
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(0, 1).optional(),
                MemberProps::member(1, 1).optional(),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 32];
        let n = run_write(&props, &mut buf, &[None, Some(187)]);
        assert_eq!(
            &buf[..n],
            &[
                0x0C, 0x00, 0x00, 0x00, // d-header: 12 bytes of body
                0x01, 0x00, 0x00, 0x40, // em-header: id 1, nextint
                0x04, 0x00, 0x00, 0x00, // nextint: 4 bytes of content
                0xBB, 0x00, 0x00, 0x00, // content
            ]
        );
    }

    #[test]
    fn test_final_struct_has_no_d_header() {
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Final),
                MemberProps::member(0, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 16];
        let n = run_write(&props, &mut buf, &[Some(5)]);
        assert_eq!(&buf[..n], &[0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_eight_byte_primitives_align_to_four() {
        let mut s = XcdrV2Stream::sizer(StreamMode::Move, Endianness::Little);
        s.base_mut().write_u32(0).expect("move u32");
        s.base_mut().write_u64(0).expect("move u64");
        assert_eq!(s.base().position(), 12);
    }

    #[test]
    fn test_appendable_reader_accepts_shorter_writer() {
        // Writer type had one member; reader type declares two.
        let writer_props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Appendable),
                MemberProps::member(0, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 32];
        let n = run_write(&writer_props, &mut buf, &[Some(42)]);

        let reader_props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Appendable),
                MemberProps::member(0, 1),
                MemberProps::member(1, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = XcdrV2Stream::reader(&buf[..n], Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        let mut seen = Vec::new();
        s.start_struct(&reader_props, ROOT).expect("start struct");
        while let Some(node) = s.next_entity(&reader_props, &mut walk).expect("next entity") {
            s.start_member(&reader_props, node, true).expect("start member");
            seen.push(s.base_mut().read_u32().expect("read"));
            s.finish_member(&reader_props, node, true).expect("finish member");
        }
        s.finish_struct(&reader_props, ROOT).expect("finish struct");
        assert_eq!(seen, vec![42]);
    }

    #[test]
    fn test_mutable_reader_skips_unknown_member() {
        let wire: &[u8] = &[
            0x10, 0x00, 0x00, 0x00, // d-header: 16 bytes
            0x09, 0x00, 0x00, 0x20, // unknown id 9, lc bytes_4
            0xEE, 0xEE, 0xEE, 0xEE,
            0x01, 0x00, 0x00, 0x20, // id 1, lc bytes_4
            0x2A, 0x00, 0x00, 0x00,
        ];
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(1, 1).required(),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = XcdrV2Stream::reader(wire, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        let node = s.next_entity(&props, &mut walk).expect("next entity").expect("member");
        s.start_member(&props, node, true).expect("start member");
        assert_eq!(s.base_mut().read_u32().expect("read"), 42);
        s.finish_member(&props, node, true).expect("finish member");
        assert_eq!(s.next_entity(&props, &mut walk).expect("next entity"), None);
        s.finish_struct(&props, ROOT).expect("finish struct");
    }

    #[test]
    fn test_unknown_must_understand_member_fails() {
        let wire: &[u8] = &[
            0x08, 0x00, 0x00, 0x00, // d-header
            0x09, 0x00, 0x00, 0xA0, // unknown id 9, must-understand, lc bytes_4
            0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(1, 1).optional(),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = XcdrV2Stream::reader(wire, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        let err = s.next_entity(&props, &mut walk).unwrap_err();
        assert_eq!(err, CdrError::MustUnderstandUnknown { member_id: 9 });
    }

    #[test]
    fn test_unknown_must_understand_tolerated_when_masked() {
        let wire: &[u8] = &[
            0x08, 0x00, 0x00, 0x00,
            0x09, 0x00, 0x00, 0xA0,
            0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(1, 1).optional(),
            ],
            &KeyEndpoint::default(),
        );
        let mut s =
            XcdrV2Stream::reader(wire, Endianness::Little, status::MUST_UNDERSTAND_FAIL);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        assert_eq!(s.next_entity(&props, &mut walk).expect("next entity"), None);
        s.finish_struct(&props, ROOT).expect("finish struct");
        assert_ne!(s.base().status() & status::MUST_UNDERSTAND_FAIL, 0);
    }

    #[test]
    fn test_nextint_times_four_overlaps_member_content() {
        // lc 6: nextint is the element count; content starts back at it.
        let wire: &[u8] = &[
            0x10, 0x00, 0x00, 0x00, // d-header: 16
            0x01, 0x00, 0x00, 0x60, // id 1, lc nextint_times_4
            0x02, 0x00, 0x00, 0x00, // count 2 (also content start)
            0x07, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
        ];
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(1, 1).required(),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = XcdrV2Stream::reader(wire, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        let node = s.next_entity(&props, &mut walk).expect("next entity").expect("member");
        s.start_member(&props, node, true).expect("start member");
        let count = s.base_mut().read_u32().expect("read count");
        assert_eq!(count, 2);
        assert_eq!(s.base_mut().read_u32().expect("read elem"), 7);
        assert_eq!(s.base_mut().read_u32().expect("read elem"), 8);
        s.finish_member(&props, node, true).expect("finish member");
        assert_eq!(s.next_entity(&props, &mut walk).expect("next entity"), None);
        s.finish_struct(&props, ROOT).expect("finish struct");
    }

    #[test]
    fn test_oversized_nextint_count_fails_bound_check() {
        // Maximum count under nextint_times_8 would wrap a u32 size; the
        // decoder must reject it through the bound check, not wrap.
        let wire: &[u8] = &[
            0x0C, 0x00, 0x00, 0x00, // d-header
            0x09, 0x00, 0x00, 0x70, // unknown id 9, lc nextint_times_8
            0xFF, 0xFF, 0xFF, 0xFF, // count u32::MAX
        ];
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(1, 1).optional(),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = XcdrV2Stream::reader(wire, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        let err = s.next_entity(&props, &mut walk).unwrap_err();
        assert!(matches!(err, CdrError::ReadBoundExceeded { .. }));
    }

    #[test]
    fn test_optional_presence_tag_in_final_struct() {
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Final),
                MemberProps::member(0, 1).optional(),
                MemberProps::member(1, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 16];
        let n = run_write(&props, &mut buf, &[None, Some(9)]);
        // Absent tag, padding, then member 1.
        assert_eq!(&buf[..n], &[0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00]);

        let mut s = XcdrV2Stream::reader(&buf[..n], Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);
        s.start_struct(&props, ROOT).expect("start struct");
        let node = s.next_entity(&props, &mut walk).expect("next entity").expect("member");
        assert_eq!(props.node(node).m_id, 1);
        s.start_member(&props, node, true).expect("start member");
        assert_eq!(s.base_mut().read_u32().expect("read"), 9);
        s.finish_member(&props, node, true).expect("finish member");
        assert_eq!(s.next_entity(&props, &mut walk).expect("next entity"), None);
        s.finish_struct(&props, ROOT).expect("finish struct");
    }

    #[test]
    fn test_consecutive_delimits_nonprimitive_runs_once() {
        let mut s = XcdrV2Stream::sizer(StreamMode::Move, Endianness::Little);
        s.start_consecutive(true, false).expect("outer run");
        s.start_consecutive(true, false).expect("inner run");
        s.base_mut().write_u32(0).expect("elem");
        s.finish_consecutive().expect("inner finish");
        s.finish_consecutive().expect("outer finish");
        // One d-header for the nested array pair, not two.
        assert_eq!(s.base().position(), 8);
    }

    #[test]
    fn test_primitive_run_is_not_delimited() {
        let mut s = XcdrV2Stream::sizer(StreamMode::Move, Endianness::Little);
        s.start_consecutive(false, true).expect("run");
        s.base_mut().write_u32(3).expect("length");
        s.base_mut().write_u32(0).expect("elem");
        s.finish_consecutive().expect("finish");
        assert_eq!(s.base().position(), 8);
    }
}
