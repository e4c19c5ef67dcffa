// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dcdr developers

//! Per-type member metadata consumed by the stream variants.
//!
//! A type's layout is described by a flat, pre-order vector of
//! [`MemberProps`] entries (one per struct member, plus the struct itself as
//! entry 0), produced by a code generator or built by hand. [`TypeProps::finish`]
//! links the flat vector into a forest using integer indices into the arena
//! (never resized afterwards), applies key annotations and propagates the
//! X-Types requirement flag. The finished tree is immutable and may be read
//! by any number of concurrent encode/decode calls.

use std::collections::BTreeMap;

/// Index of the root entry in every finished [`TypeProps`] arena.
pub const ROOT: usize = 0;

/// X-Types extensibility of an aggregated type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Extensibility {
    #[default]
    Final,
    Appendable,
    Mutable,
}

/// Minimal bit width of an enum or bitmask member.
///
/// Unset for anything that is not an enum/bitmask. XCDR1 uses this to decide
/// between short and extended parameter headers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BitBound {
    #[default]
    Unset,
    B8,
    B16,
    B32,
    B64,
}

impl BitBound {
    pub fn bytes(self) -> usize {
        match self {
            BitBound::Unset => 0,
            BitBound::B8 => 1,
            BitBound::B16 => 2,
            BitBound::B32 => 4,
            BitBound::B64 => 8,
        }
    }
}

/// One node of the properties forest: a struct member, or the struct itself.
#[derive(Clone, Debug)]
pub struct MemberProps {
    /// Member id, unique among siblings.
    pub m_id: u32,
    /// Nesting depth; 0 for the type itself, 1 for its direct members.
    pub depth: u16,
    /// Extensibility of the entity itself.
    pub e_ext: Extensibility,
    /// Extensibility of the parent; filled in by `finish`.
    pub p_ext: Extensibility,
    /// Bit bound for enum/bitmask members.
    pub e_bb: BitBound,
    pub is_key: bool,
    pub is_optional: bool,
    pub must_understand: bool,
    pub implementation_extension: bool,
    /// Field must be skipped during streaming.
    pub ignore: bool,
    /// True when this entity or anything below it needs X-Types framing.
    pub xtypes_necessary: bool,

    // Arena links, filled in by `finish`.
    pub parent: Option<usize>,
    pub first_member: Option<usize>,
    pub next_on_level: Option<usize>,
    pub prev_on_level: Option<usize>,
    // Key-mode traversal links: key siblings ordered by member id.
    pub first_key: Option<usize>,
    pub next_key: Option<usize>,
    pub prev_key: Option<usize>,
}

impl MemberProps {
    fn blank(m_id: u32, depth: u16) -> Self {
        MemberProps {
            m_id,
            depth,
            e_ext: Extensibility::Final,
            p_ext: Extensibility::Final,
            e_bb: BitBound::Unset,
            is_key: false,
            is_optional: false,
            must_understand: false,
            implementation_extension: false,
            ignore: false,
            xtypes_necessary: false,
            parent: None,
            first_member: None,
            next_on_level: None,
            prev_on_level: None,
            first_key: None,
            next_key: None,
            prev_key: None,
        }
    }

    /// Root entry for a type with the given extensibility.
    pub fn entity(e_ext: Extensibility) -> Self {
        let mut p = Self::blank(0, 0);
        p.e_ext = e_ext;
        p
    }

    /// Plain member entry.
    pub fn member(m_id: u32, depth: u16) -> Self {
        Self::blank(m_id, depth)
    }

    pub fn with_extensibility(mut self, e_ext: Extensibility) -> Self {
        self.e_ext = e_ext;
        self
    }

    pub fn keyed(mut self) -> Self {
        self.is_key = true;
        self.must_understand = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.must_understand = true;
        self
    }

    pub fn bit_bound(mut self, e_bb: BitBound) -> Self {
        self.e_bb = e_bb;
        self
    }
}

/// Recursive member-id path map naming which members form the key.
///
/// Consumed once, by [`TypeProps::finish`]; never read per call.
#[derive(Clone, Debug, Default)]
pub struct KeyEndpoint {
    branches: BTreeMap<u32, KeyEndpoint>,
}

impl KeyEndpoint {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Registers one key member path (outermost id first).
    pub fn add_key_endpoint(&mut self, path: &[u32]) {
        let mut node = self;
        for id in path {
            node = node.branches.entry(*id).or_default();
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&u32, &KeyEndpoint)> {
        self.branches.iter()
    }
}

/// Deep-copies the member entries of a finished type into a flat vector under
/// construction, so one struct's member list can be reused as a nested member
/// list of another (sequence-of-struct codegen). Linkage is reset; the copy is
/// relinked independently by the next `finish`.
pub fn append_struct_contents(propvec: &mut Vec<MemberProps>, inner: &TypeProps, member_depth: u16) {
    for node in inner.nodes.iter().skip(1) {
        let mut copy = node.clone();
        copy.depth += member_depth;
        copy.parent = None;
        copy.first_member = None;
        copy.next_on_level = None;
        copy.prev_on_level = None;
        copy.first_key = None;
        copy.next_key = None;
        copy.prev_key = None;
        propvec.push(copy);
    }
}

/// A finished, immutable properties forest.
pub struct TypeProps {
    nodes: Vec<MemberProps>,
}

impl TypeProps {
    /// Links a flat pre-order property vector into a tree and applies key
    /// annotations.
    ///
    /// Panics on malformed generated metadata: an empty vector, a non-root
    /// first entry, a depth jump of more than one level, duplicate sibling
    /// ids, or a key path naming a member id that does not exist. These are
    /// generator bugs, not runtime conditions.
    pub fn finish(propvec: Vec<MemberProps>, keys: &KeyEndpoint) -> TypeProps {
        assert!(!propvec.is_empty(), "property vector is empty");
        assert_eq!(propvec[0].depth, 0, "first property entry must be the type itself");

        let mut props = TypeProps { nodes: propvec };
        props.link();
        props.add_key(ROOT, keys);
        props.compute_xtypes(ROOT);
        props.link_keys(ROOT);
        props
    }

    pub fn node(&self, idx: usize) -> &MemberProps {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First member of `parent`, in declaration order, or id order when
    /// `key_mode` restricts traversal to key members.
    pub fn first_member(&self, parent: usize, key_mode: bool) -> Option<usize> {
        if key_mode {
            self.nodes[parent].first_key
        } else {
            let mut it = self.nodes[parent].first_member;
            while let Some(i) = it {
                if !self.nodes[i].ignore {
                    return Some(i);
                }
                it = self.nodes[i].next_on_level;
            }
            None
        }
    }

    pub fn next_member(&self, idx: usize, key_mode: bool) -> Option<usize> {
        if key_mode {
            self.nodes[idx].next_key
        } else {
            let mut it = self.nodes[idx].next_on_level;
            while let Some(i) = it {
                if !self.nodes[i].ignore {
                    return Some(i);
                }
                it = self.nodes[i].next_on_level;
            }
            None
        }
    }

    pub fn prev_member(&self, idx: usize, key_mode: bool) -> Option<usize> {
        if key_mode {
            self.nodes[idx].prev_key
        } else {
            let mut it = self.nodes[idx].prev_on_level;
            while let Some(i) = it {
                if !self.nodes[i].ignore {
                    return Some(i);
                }
                it = self.nodes[i].prev_on_level;
            }
            None
        }
    }

    /// All direct members of `parent`, unfiltered, in declaration order.
    pub fn members(&self, parent: usize) -> MemberIter<'_> {
        MemberIter { props: self, cursor: self.nodes[parent].first_member }
    }

    /// True when any direct member of `node` carries the key flag.
    pub fn has_keys(&self, node: usize) -> bool {
        self.members(node).any(|i| self.nodes[i].is_key)
    }

    fn link(&mut self) {
        let n = self.nodes.len();
        let mut stack: Vec<usize> = Vec::new();
        let mut last_child: Vec<Option<usize>> = vec![None; n];

        for i in 0..n {
            let depth = self.nodes[i].depth as usize;
            if depth == 0 {
                assert_eq!(i, 0, "only the first entry may be at depth 0");
                stack.clear();
                stack.push(i);
                continue;
            }
            assert!(
                depth <= stack.len(),
                "property entry {} jumps from depth {} to {}",
                i,
                stack.len() - 1,
                depth
            );
            stack.truncate(depth);
            let parent = stack[depth - 1];

            self.nodes[i].parent = Some(parent);
            self.nodes[i].p_ext = self.nodes[parent].e_ext;
            match last_child[parent] {
                Some(prev) => {
                    assert_ne!(
                        self.nodes[prev].m_id, self.nodes[i].m_id,
                        "duplicate member id {} among siblings",
                        self.nodes[i].m_id
                    );
                    self.nodes[prev].next_on_level = Some(i);
                    self.nodes[i].prev_on_level = Some(prev);
                }
                None => self.nodes[parent].first_member = Some(i),
            }
            last_child[parent] = Some(i);
            stack.push(i);
        }
    }

    /// Marks all direct members of `node` as key members. Implicit keys do
    /// not become must-understand; only explicit key annotations do.
    fn set_key_values(&mut self, node: usize) {
        let members: Vec<usize> = self.members(node).collect();
        for m in members {
            self.nodes[m].is_key = true;
        }
    }

    /// Clears existing key flags on the direct members of `node`.
    fn erase_key_values(&mut self, node: usize) {
        let members: Vec<usize> = self.members(node).collect();
        for m in members {
            self.nodes[m].is_key = false;
        }
    }

    /// Applies key annotations top-down.
    ///
    /// With explicit endpoints at a level, exactly the named children are
    /// marked and recursed into. Without endpoints, and when nothing at the
    /// level is flagged already, every member becomes part of the key (a
    /// keyed struct member with no key members of its own streams all of its
    /// fields in key mode).
    fn add_key(&mut self, node: usize, endpoints: &KeyEndpoint) {
        if endpoints.is_empty() {
            if !self.has_keys(node) {
                self.set_key_values(node);
            }
            let members: Vec<usize> = self.members(node).collect();
            for m in members {
                if self.nodes[m].is_key {
                    self.add_key(m, &KeyEndpoint::default());
                }
            }
        } else {
            self.erase_key_values(node);
            for (id, sub) in endpoints.iter() {
                let child = self
                    .members(node)
                    .find(|&m| self.nodes[m].m_id == *id)
                    .unwrap_or_else(|| {
                        panic!("key path references unknown member id {}", id)
                    });
                self.nodes[child].is_key = true;
                self.nodes[child].must_understand = true;
                self.add_key(child, sub);
            }
        }
    }

    fn compute_xtypes(&mut self, node: usize) -> bool {
        let mut necessary = self.nodes[node].is_optional
            || self.nodes[node].e_ext != Extensibility::Final;
        let members: Vec<usize> = self.members(node).collect();
        for m in members {
            necessary |= self.compute_xtypes(m);
        }
        self.nodes[node].xtypes_necessary = necessary;
        necessary
    }

    fn link_keys(&mut self, node: usize) {
        let mut keys: Vec<usize> =
            self.members(node).filter(|&m| self.nodes[m].is_key).collect();
        keys.sort_by_key(|&m| self.nodes[m].m_id);

        self.nodes[node].first_key = keys.first().copied();
        for w in keys.windows(2) {
            self.nodes[w[0]].next_key = Some(w[1]);
            self.nodes[w[1]].prev_key = Some(w[0]);
        }

        let members: Vec<usize> = self.members(node).collect();
        for m in members {
            self.link_keys(m);
        }
    }
}

/// Declaration-order iterator over the direct members of one node.
pub struct MemberIter<'a> {
    props: &'a TypeProps,
    cursor: Option<usize>,
}

impl Iterator for MemberIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cur = self.cursor?;
        self.cursor = self.props.nodes[cur].next_on_level;
        Some(cur)
    }
}
