// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Metadata-driven CDR serialization for DDS interoperability.
//!
//! The engine separates the description of a type from the act of streaming
//! it. A [`props::TypeProps`] tree carries the member metadata (ids,
//! extensibility, key and optional flags); the stream variants interpret that
//! metadata against one of the three wire representations:
//!
//! - [`basic::BasicCdrStream`]: plain CDR, headerless, natural alignment.
//! - [`xcdr_v1::XcdrV1Stream`]: parameter-list encoding with per-member
//!   headers (XCDR version 1).
//! - [`xcdr_v2::XcdrV2Stream`]: delimited encoding with D-headers and
//!   EM-headers (XCDR version 2).
//!
//! Each variant supports reading, writing and two cursor-only sizing modes,
//! in either endianness, over a caller-provided buffer. Key-only streaming
//! drives the [`keyhash`] computation. [`fragchain`] reassembles fragmented
//! samples into the contiguous buffer the readers expect.
//!
//! Types become serializable by implementing [`ser::Streamable`]; the walkers
//! in [`ser`] drive the traversal:
//!
//! ```
//! use dcdr::{basic::BasicCdrStream, ser, stream::Endianness};
//! # use dcdr::error::SerResult;
//! # use dcdr::props::{Extensibility, KeyEndpoint, MemberProps, TypeProps};
//! # use dcdr::ser::{CdrPrimitive, Streamable};
//! # use dcdr::stream::Streamer;
//! # use std::sync::OnceLock;
//! # #[derive(Default, PartialEq, Debug)]
//! # struct Point { x: i32, y: i32 }
//! # impl Streamable for Point {
//! #     fn type_props() -> &'static TypeProps {
//! #         static PROPS: OnceLock<TypeProps> = OnceLock::new();
//! #         PROPS.get_or_init(|| {
//! #             TypeProps::finish(
//! #                 vec![
//! #                     MemberProps::entity(Extensibility::Final),
//! #                     MemberProps::member(0, 1),
//! #                     MemberProps::member(1, 1),
//! #                 ],
//! #                 &KeyEndpoint::default(),
//! #             )
//! #         })
//! #     }
//! #     fn write_member<S: Streamer>(
//! #         &self, stream: &mut S, props: &TypeProps, node: usize,
//! #     ) -> SerResult<()> {
//! #         match props.node(node).m_id {
//! #             0 => self.x.write_to(stream.base_mut()),
//! #             _ => self.y.write_to(stream.base_mut()),
//! #         }
//! #     }
//! #     fn read_member<S: Streamer>(
//! #         &mut self, stream: &mut S, props: &TypeProps, node: usize,
//! #     ) -> SerResult<()> {
//! #         match props.node(node).m_id {
//! #             0 => self.x = CdrPrimitive::read_from(stream.base_mut())?,
//! #             _ => self.y = CdrPrimitive::read_from(stream.base_mut())?,
//! #         }
//! #         Ok(())
//! #     }
//! # }
//! let point = Point { x: 3, y: -4 };
//! let mut buf = [0u8; 8];
//! let mut writer = BasicCdrStream::writer(&mut buf, Endianness::Little, 0);
//! let n = ser::write(&point, &mut writer).unwrap();
//!
//! let mut reader = BasicCdrStream::reader(&buf[..n], Endianness::Little, 0);
//! let back: Point = ser::read(&mut reader).unwrap();
//! assert_eq!(back, point);
//! ```

pub mod basic;
pub mod error;
pub mod fragchain;
#[cfg(feature = "keyhash")]
pub mod keyhash;
pub mod props;
pub mod ser;
pub mod stream;
pub mod xcdr_v1;
pub mod xcdr_v2;

pub use error::{CdrError, SerResult};
pub use props::{Extensibility, KeyEndpoint, MemberProps, TypeProps, ROOT};
pub use ser::Streamable;
pub use stream::{Endianness, StreamMode, Streamer};
