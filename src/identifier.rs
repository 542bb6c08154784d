//! The byte-wise (and, where a service's leading field is narrower than a
//! byte, bit-wise) prefix tree used to dispatch an incoming message to its
//! candidate services without scanning every service's request layout
//! (spec §4.6 "Service identification", spec §4.7 "nibble-level branches").
//! Lookup never fails: an input with no recognized prefix simply returns no
//! candidates, and an input whose prefix is shared by several services
//! returns all of them.

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::diagcodedtypes::read_bits;

/// One field of a registered prefix: its integer value and the number of
/// bits it occupies, unpadded. A service whose leading constant is a 4-bit
/// sub-function shares the first nibble's node with any sibling service that
/// also starts with that nibble, and only diverges at the next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixField {
    pub value: u64,
    pub bit_length: u8,
}

/// Node children are keyed by `(bit_length, value)` rather than a plain
/// byte, so a nibble-valued branch and a byte-valued branch can coexist at
/// the same depth without colliding.
#[derive(Debug, Clone)]
struct Node<H> {
    children: IndexMap<(u8, u64), Node<H>, FnvBuildHasher>,
    here: Vec<H>,
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Self {
            children: IndexMap::default(),
            here: Vec::new(),
        }
    }
}

/// A trie keyed on the leading constant fields of each service's request,
/// down to sub-byte granularity.
#[derive(Debug, Clone)]
pub struct ServiceIdentifier<H> {
    root: Node<H>,
}

impl<H> Default for ServiceIdentifier<H> {
    fn default() -> Self {
        Self { root: Node::default() }
    }
}

impl<H: Clone> ServiceIdentifier<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `prefix`, the service's leading run of
    /// byte-aligned constant values. An empty prefix means the service
    /// matches every input (e.g. a request with no leading `CODED-CONST`).
    pub fn insert(&mut self, prefix: &[u8], handle: H) {
        let fields: Vec<PrefixField> = prefix
            .iter()
            .map(|&b| PrefixField { value: b as u64, bit_length: 8 })
            .collect();
        self.insert_fields(&fields, handle);
    }

    /// Register `handle` under `prefix`, a run of fields that may each be
    /// narrower than a byte (e.g. a whole-byte SID followed by a 4-bit
    /// sub-function nibble).
    pub fn insert_fields(&mut self, prefix: &[PrefixField], handle: H) {
        let mut node = &mut self.root;
        for f in prefix {
            node = node.children.entry((f.bit_length, f.value)).or_default();
        }
        node.here.push(handle);
    }

    /// All services whose registered prefix is a prefix of `bytes`, from
    /// shortest match to longest (a service registered under `[0xC]` and one
    /// under `[0xC, 0xDE]` both return for input `[0xC, 0xDE, ...]`).
    /// Bits are walked in the same low-bit-numbered, byte-order-agnostic way
    /// as the codec itself (spec §4.1 "LSB=0 bit numbering").
    pub fn identify(&self, bytes: &[u8]) -> Vec<H> {
        let mut matches = Vec::new();
        let mut node = &self.root;
        matches.extend(node.here.iter().cloned());
        let mut bit_offset: usize = 0;
        loop {
            let byte_pos = bit_offset / 8;
            let bit_pos = (bit_offset % 8) as u8;
            let hit = node.children.iter().find_map(|(&(bit_length, value), child)| {
                read_bits(bytes, byte_pos, bit_pos, bit_length as u32, true)
                    .ok()
                    .filter(|raw| *raw as u64 == value)
                    .map(|_| (bit_length, child))
            });
            match hit {
                Some((bit_length, next)) => {
                    node = next;
                    matches.extend(node.here.iter().cloned());
                    bit_offset += bit_length as usize;
                }
                None => break,
            }
        }
        matches
    }

    pub fn is_empty(&self) -> bool {
        self.root.here.is_empty() && self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_prefixes_both_match() {
        let mut trie = ServiceIdentifier::new();
        trie.insert(&[0xC], "short");
        trie.insert(&[0xC, 0xDE], "long");
        trie.insert(&[0x86], "other");

        let hits = trie.identify(&[0xC, 0xDE, 0x01]);
        assert_eq!(hits, vec!["short", "long"]);

        let hits = trie.identify(&[0x86, 0x00]);
        assert_eq!(hits, vec!["other"]);
    }

    #[test]
    fn unknown_prefix_returns_empty_not_an_error() {
        let mut trie: ServiceIdentifier<&str> = ServiceIdentifier::new();
        trie.insert(&[0x10], "known");
        assert!(trie.identify(&[0xFF]).is_empty());
    }

    #[test]
    fn empty_prefix_matches_every_input() {
        let mut trie = ServiceIdentifier::new();
        trie.insert(&[], "catch_all");
        trie.insert(&[0x10], "specific");
        assert_eq!(trie.identify(&[0x10]), vec!["catch_all", "specific"]);
        assert_eq!(trie.identify(&[0x99]), vec!["catch_all"]);
    }

    #[test]
    fn nibble_level_divergence_both_branches_reachable() {
        // Both services share the whole byte 0x22 as their SID, then
        // diverge on a 4-bit sub-function packed into the low nibble of the
        // following byte: svc_a expects 0x1, svc_b expects 0x2.
        let mut trie = ServiceIdentifier::new();
        trie.insert_fields(
            &[
                PrefixField { value: 0x22, bit_length: 8 },
                PrefixField { value: 0x1, bit_length: 4 },
            ],
            "svc_a",
        );
        trie.insert_fields(
            &[
                PrefixField { value: 0x22, bit_length: 8 },
                PrefixField { value: 0x2, bit_length: 4 },
            ],
            "svc_b",
        );

        assert_eq!(trie.identify(&[0x22, 0x01]), vec!["svc_a"]);
        assert_eq!(trie.identify(&[0x22, 0x02]), vec!["svc_b"]);
        assert!(trie.identify(&[0x22, 0x03]).is_empty());
    }
}
