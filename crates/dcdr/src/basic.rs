// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Plain CDR: headerless members, natural alignment up to 8 bytes.
//!
//! The layout is fully determined by the type description, so this variant
//! refuses any type whose tree needs X-Types framing (optional members, or
//! appendable/mutable extensibility anywhere below it). Key-only streaming is
//! exempt from that check, since key serialization always uses the plain
//! representation regardless of the type's extensibility.

use crate::error::{CdrError, SerResult};
use crate::props::TypeProps;
use crate::stream::{
    status, Buf, CdrStream, Endianness, MemberWalk, NoBuf, ReadBuf, StreamMode, Streamer,
    WriteBuf,
};

const BASIC_MAX_ALIGNMENT: usize = 8;

pub struct BasicCdrStream<B: Buf> {
    base: CdrStream<B>,
}

impl<'a> BasicCdrStream<ReadBuf<'a>> {
    pub fn reader(buf: &'a [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        BasicCdrStream {
            base: CdrStream::new(
                ReadBuf::new(buf),
                StreamMode::Read,
                endianness,
                BASIC_MAX_ALIGNMENT,
                ignore_faults,
            ),
        }
    }
}

impl<'a> BasicCdrStream<WriteBuf<'a>> {
    pub fn writer(buf: &'a mut [u8], endianness: Endianness, ignore_faults: u64) -> Self {
        BasicCdrStream {
            base: CdrStream::new(
                WriteBuf::new(buf),
                StreamMode::Write,
                endianness,
                BASIC_MAX_ALIGNMENT,
                ignore_faults,
            ),
        }
    }
}

impl BasicCdrStream<NoBuf> {
    pub fn sizer(mode: StreamMode, endianness: Endianness) -> Self {
        debug_assert!(matches!(mode, StreamMode::Move | StreamMode::Max));
        BasicCdrStream {
            base: CdrStream::new(NoBuf, mode, endianness, BASIC_MAX_ALIGNMENT, 0),
        }
    }
}

impl<B: Buf> Streamer for BasicCdrStream<B> {
    type Buffer = B;

    fn base(&self) -> &CdrStream<B> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CdrStream<B> {
        &mut self.base
    }

    fn start_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        if props.node(node).xtypes_necessary && !self.base.is_key_mode() {
            log::debug!(
                "[basic] member {} needs xcdr framing, plain cdr refused",
                props.node(node).m_id
            );
            self.base
                .raise(status::UNSUPPORTED_XTYPES, CdrError::UnsupportedExtensibility)?;
        }
        self.base.begin_struct_scope();
        Ok(())
    }

    fn finish_struct(&mut self, props: &TypeProps, node: usize) -> SerResult<()> {
        self.base.end_struct_scope(props, node)
    }

    fn start_member(&mut self, _props: &TypeProps, _node: usize, _present: bool) -> SerResult<()> {
        self.base.record_member_start();
        Ok(())
    }

    fn finish_member(&mut self, props: &TypeProps, node: usize, _present: bool) -> SerResult<()> {
        self.base.pop_member_start();
        self.base.record_consumed(props.node(node).m_id);
        Ok(())
    }

    fn next_entity(
        &mut self,
        props: &TypeProps,
        walk: &mut MemberWalk,
    ) -> SerResult<Option<usize>> {
        Ok(self.base.next_in_order(props, walk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::{Extensibility, KeyEndpoint, MemberProps, ROOT};

    fn final_two_members() -> TypeProps {
        let mut keys = KeyEndpoint::default();
        keys.add_key_endpoint(&[0]);
        TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Final),
                MemberProps::member(0, 1),
                MemberProps::member(1, 1),
            ],
            &keys,
        )
    }

    #[test]
    fn test_members_stream_without_headers() {
        let props = final_two_members();
        let mut buf = [0u8; 16];
        let mut s = BasicCdrStream::writer(&mut buf, Endianness::Little, 0);
        let mut walk = MemberWalk::new(ROOT);

        s.start_struct(&props, ROOT).expect("start struct");
        while let Some(node) = s.next_entity(&props, &mut walk).expect("next entity") {
            s.start_member(&props, node, true).expect("start member");
            s.base_mut().write_u32(0xAB).expect("write content");
            s.finish_member(&props, node, true).expect("finish member");
        }
        s.finish_struct(&props, ROOT).expect("finish struct");
        assert_eq!(s.base().position(), 8);
    }

    #[test]
    fn test_xtypes_type_is_refused() {
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(0, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 8];
        let mut s = BasicCdrStream::writer(&mut buf, Endianness::Little, 0);
        let err = s.start_struct(&props, ROOT).unwrap_err();
        assert_eq!(err, CdrError::UnsupportedExtensibility);
    }

    #[test]
    fn test_xtypes_refusal_is_maskable() {
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Appendable),
                MemberProps::member(0, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut buf = [0u8; 8];
        let mut s =
            BasicCdrStream::writer(&mut buf, Endianness::Little, status::UNSUPPORTED_XTYPES);
        s.start_struct(&props, ROOT).expect("masked refusal should continue");
        assert_ne!(s.base().status() & status::UNSUPPORTED_XTYPES, 0);
    }

    #[test]
    fn test_key_mode_walks_keys_only() {
        let props = final_two_members();
        let mut s = BasicCdrStream::sizer(StreamMode::Move, Endianness::Big);
        s.base_mut().set_key_mode(true);
        let mut walk = MemberWalk::new(ROOT);

        s.start_struct(&props, ROOT).expect("start struct");
        let first = s.next_entity(&props, &mut walk).expect("next entity");
        assert_eq!(first, Some(1));
        let second = s.next_entity(&props, &mut walk).expect("next entity");
        assert_eq!(second, None);
    }

    #[test]
    fn test_key_mode_ignores_xtypes_refusal() {
        let props = TypeProps::finish(
            vec![
                MemberProps::entity(Extensibility::Mutable),
                MemberProps::member(0, 1),
            ],
            &KeyEndpoint::default(),
        );
        let mut s = BasicCdrStream::sizer(StreamMode::Move, Endianness::Big);
        s.base_mut().set_key_mode(true);
        s.start_struct(&props, ROOT).expect("key mode bypasses framing check");
    }
}
