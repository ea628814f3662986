//! Collision-free prefixes for the namespace tree.
//!
//! Every node of the tree owns a [`Prefix`]; physical keys are `prefix ++ logical key`.
//! A child prefix appends one *segment* to its parent:
//!
//! ```text
//! segment = tag (1 byte) ++ varint(len(name)) ++ name
//! tag     = 0x01 (keyspace) | 0x02 (sub-store)
//! ```
//!
//! The length is an unsigned LEB128 varint, which is itself a prefix-free code. Two distinct
//! segments appended to the same parent therefore diverge at the tag, inside the length, or
//! inside equal-length names, so no sibling prefix is ever a byte-prefix of another and a
//! range scan bounded by one prefix never crosses into a sibling's keys.

use std::fmt;
use std::sync::Arc;

const TAG_KEYSPACE: u8 = 0x01;
const TAG_SUB: u8 = 0x02;

/// The kind of namespace node a segment denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Keyspace,
    Sub,
}

impl SegmentKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Keyspace => TAG_KEYSPACE,
            Self::Sub => TAG_SUB,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_KEYSPACE => Some(Self::Keyspace),
            TAG_SUB => Some(Self::Sub),
            _ => None,
        }
    }
}

/// One decoded step of a prefix path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub name: String,
}

/// An immutable byte prefix identifying a node of the namespace tree.
///
/// Cloning is cheap: the bytes are shared behind an `Arc`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(Arc<[u8]>);

impl Prefix {
    /// The empty prefix of the root node.
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derives the prefix of a leaf keyspace named `name` below this node.
    #[must_use]
    pub fn keyspace(&self, name: &str) -> Self {
        self.child(SegmentKind::Keyspace, name)
    }

    /// Derives the prefix of a nested sub-store named `name` below this node.
    #[must_use]
    pub fn sub(&self, name: &str) -> Self {
        self.child(SegmentKind::Sub, name)
    }

    fn child(&self, kind: SegmentKind, name: &str) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + name.len() + 1 + 10);
        bytes.extend_from_slice(&self.0);
        bytes.push(kind.tag());
        encode_varint(name.len() as u64, &mut bytes);
        bytes.extend_from_slice(name.as_bytes());
        Self(Arc::from(bytes))
    }

    /// Translates a logical key into the physical key stored in the engine.
    #[must_use]
    pub fn add(&self, key: &str) -> Vec<u8> {
        let mut physical = Vec::with_capacity(self.0.len() + key.len());
        physical.extend_from_slice(&self.0);
        physical.extend_from_slice(key.as_bytes());
        physical
    }

    /// Strips this prefix from a physical key.
    ///
    /// Returns `None` when the key does not belong to this node.
    #[must_use]
    pub fn remove<'k>(&self, physical: &'k [u8]) -> Option<&'k [u8]> {
        physical.strip_prefix(&*self.0)
    }

    /// True when `physical` lies inside this node's part of the keyspace.
    #[must_use]
    pub fn contains(&self, physical: &[u8]) -> bool {
        physical.starts_with(&self.0)
    }

    /// Decodes the path from the root to this node.
    ///
    /// Returns `None` if the bytes are not a well-formed sequence of segments, which can only
    /// happen for a prefix built outside this module.
    #[must_use]
    pub fn segments(&self) -> Option<Vec<Segment>> {
        let mut rest: &[u8] = &self.0;
        let mut segments = Vec::new();
        while let Some((&tag, tail)) = rest.split_first() {
            let kind = SegmentKind::from_tag(tag)?;
            let (len, tail) = decode_varint(tail)?;
            let len = usize::try_from(len).ok()?;
            if tail.len() < len {
                return None;
            }
            let (name, tail) = tail.split_at(len);
            segments.push(Segment { kind, name: String::from_utf8(name.to_vec()).ok()? });
            rest = tail;
        }
        Some(segments)
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({self})")
    }
}

/// Renders the decoded path, e.g. `/sub:tenants/ks:blobs`; falls back to hex.
impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(segments) = self.segments() else {
            return write!(f, "0x{}", hex::encode(&self.0));
        };
        if segments.is_empty() {
            return f.write_str("/");
        }
        for segment in segments {
            let kind = match segment.kind {
                SegmentKind::Keyspace => "ks",
                SegmentKind::Sub => "sub",
            };
            write!(f, "/{kind}:{}", segment.name)?;
        }
        Ok(())
    }
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn decode_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, &bytes[i + 1..]));
        }
    }
    None
}
