//! Named-offset dictionaries.
//!
//! Every MDL0 section is indexed by a dictionary: a Patricia tree of
//! 16-byte nodes whose first node is a root sentinel. Consumers iterate the
//! nodes in file order, which is insertion order.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;

use super::io::{cursor_at, read_name, resolve};
use super::section::{Section, Target};
use crate::error::{Error, Result};

/// Size of one node on disk.
pub const NODE_SIZE: usize = 16;

const ROOT_ID: u16 = 0xFFFF;

/// One dictionary node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryNode {
    /// Patricia bit index (`char_from_end << 3 | bit`).
    pub id: u16,
    pub flag: u16,
    pub left: u16,
    pub right: u16,
    pub name: String,
    /// Absolute position of the named record.
    pub data_destination: u64,
}

impl DictionaryNode {
    fn root() -> Self {
        Self {
            id: ROOT_ID,
            flag: 0,
            left: 0,
            right: 0,
            name: String::new(),
            data_destination: 0,
        }
    }
}

/// A decoded or freshly built dictionary. Node 0 is the root sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dictionary {
    pub nodes: Vec<DictionaryNode>,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self {
            nodes: vec![DictionaryNode::root()],
        }
    }
}

/// Bit `id` of `name`, counting characters from the end.
fn name_bit(name: &[u8], id: u16) -> bool {
    let char_index = usize::from(id >> 3);
    if char_index >= name.len() {
        return false;
    }
    (name[name.len() - 1 - char_index] >> (id & 7)) & 1 != 0
}

/// Highest bit index where `a` and `b` differ.
fn highest_differing_bit(a: &[u8], b: &[u8]) -> Option<u16> {
    let char_at = |s: &[u8], i: usize| if i < s.len() { s[s.len() - 1 - i] } else { 0 };
    (0..a.len().max(b.len())).rev().find_map(|i| {
        let diff = char_at(a, i) ^ char_at(b, i);
        (diff != 0).then(|| ((i as u16) << 3) | (7 - diff.leading_zeros() as u16))
    })
}

impl Dictionary {
    /// Named entries, skipping the root sentinel.
    pub fn entries(&self) -> impl Iterator<Item = &DictionaryNode> {
        self.nodes.iter().skip(1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear lookup by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DictionaryNode> {
        self.entries().find(|n| n.name == name)
    }

    /// Byte size of the encoded dictionary (without strings).
    #[must_use]
    pub fn byte_size(&self) -> usize {
        8 + NODE_SIZE * self.nodes.len()
    }

    /// Decode the dictionary at the reader position.
    pub fn read(reader: &mut Cursor<&[u8]>) -> Result<Self> {
        let data: &[u8] = *reader.get_ref();
        let start = reader.position();
        let _total_size = reader.read_u32::<BigEndian>()?;
        let count = reader.read_u32::<BigEndian>()? as usize;
        resolve(data, start, 8, NODE_SIZE * (count + 1)).map_err(|_| {
            Error::InvalidDictionary {
                message: format!("{count} entries do not fit in the buffer"),
            }
        })?;

        let mut nodes = Vec::with_capacity(count + 1);
        for i in 0..=count {
            let id = reader.read_u16::<BigEndian>()?;
            let flag = reader.read_u16::<BigEndian>()?;
            let left = reader.read_u16::<BigEndian>()?;
            let right = reader.read_u16::<BigEndian>()?;
            let name_offset = reader.read_i32::<BigEndian>()?;
            let data_offset = reader.read_i32::<BigEndian>()?;

            if i == 0 {
                nodes.push(DictionaryNode {
                    id,
                    flag,
                    left,
                    right,
                    name: String::new(),
                    data_destination: 0,
                });
                continue;
            }
            let name = read_name(data, start, name_offset)?;
            let data_destination = resolve(data, start, i64::from(data_offset), 0)?;
            nodes.push(DictionaryNode {
                id,
                flag,
                left,
                right,
                name,
                data_destination,
            });
        }
        Ok(Self { nodes })
    }

    /// Decode the dictionary at an absolute offset.
    pub fn read_at(data: &[u8], offset: u64) -> Result<Self> {
        let mut cursor = cursor_at(data, offset)?;
        Self::read(&mut cursor)
    }

    /// Build the Patricia tree over `names` in order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut dict = Self::default();
        for name in names {
            dict.insert(name.as_ref())?;
        }
        Ok(dict)
    }

    fn insert(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidDictionary {
                message: "empty entry name".to_string(),
            });
        }
        if self.get(name).is_some() {
            return Err(Error::InvalidDictionary {
                message: format!("duplicate entry '{name}'"),
            });
        }
        let key = name.as_bytes();
        let index = u16::try_from(self.nodes.len()).map_err(|_| Error::InvalidDictionary {
            message: "too many entries".to_string(),
        })?;

        // Closest existing key
        let mut prev = 0usize;
        let mut cur = usize::from(self.nodes[0].left);
        while self.nodes[cur].id < self.nodes[prev].id {
            prev = cur;
            cur = usize::from(self.child(cur, key));
        }
        let bit = highest_differing_bit(key, self.nodes[cur].name.as_bytes()).ok_or_else(|| {
            Error::InvalidDictionary {
                message: format!("entry '{name}' collides with '{}'", self.nodes[cur].name),
            }
        })?;

        // Insertion point: first edge whose child tests a lower bit
        let mut prev = 0usize;
        let mut cur = usize::from(self.nodes[0].left);
        while self.nodes[cur].id < self.nodes[prev].id && self.nodes[cur].id > bit {
            prev = cur;
            cur = usize::from(self.child(cur, key));
        }

        let (left, right) = if name_bit(key, bit) {
            (cur as u16, index)
        } else {
            (index, cur as u16)
        };
        self.nodes.push(DictionaryNode {
            id: bit,
            flag: 0,
            left,
            right,
            name: name.to_string(),
            data_destination: 0,
        });

        if prev == 0 {
            self.nodes[0].left = index;
        } else if name_bit(key, self.nodes[prev].id) {
            self.nodes[prev].right = index;
        } else {
            self.nodes[prev].left = index;
        }
        Ok(())
    }

    fn child(&self, node: usize, key: &[u8]) -> u16 {
        let n = &self.nodes[node];
        if name_bit(key, n.id) { n.right } else { n.left }
    }

    /// Find an entry by walking the tree the way the runtime does.
    #[must_use]
    pub fn search(&self, name: &str) -> Option<&DictionaryNode> {
        let key = name.as_bytes();
        let mut prev = 0usize;
        let mut cur = usize::from(self.nodes.first()?.left);
        while cur < self.nodes.len() && self.nodes[cur].id < self.nodes[prev].id {
            prev = cur;
            cur = usize::from(self.child(cur, key));
        }
        self.nodes.get(cur).filter(|n| cur != 0 && n.name == name)
    }

    /// Emit the dictionary into `section`; `targets[i]` is where entry `i`
    /// points.
    pub fn write(&self, section: &mut Section, targets: &[Target]) -> Result<()> {
        if targets.len() != self.len() {
            return Err(Error::InvalidDictionary {
                message: format!("{} targets for {} entries", targets.len(), self.len()),
            });
        }
        let start = section.pos();
        section.write_u32(self.byte_size() as u32);
        section.write_u32(self.len() as u32);
        for (i, node) in self.nodes.iter().enumerate() {
            section.write_u16(node.id);
            section.write_u16(node.flag);
            section.write_u16(node.left);
            section.write_u16(node.right);
            if i == 0 {
                section.write_i32(0);
                section.write_i32(0);
            } else {
                section.write_name(start, &node.name);
                section.write_ptr(start, targets[i - 1].clone());
            }
        }
        Ok(())
    }

    /// Standalone bytes: the dictionary at offset 0 followed by its strings,
    /// with each entry pointing at its `data_destination`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut section = Section::new();
        let targets: Vec<Target> = self
            .entries()
            .map(|n| Target::Absolute(n.data_destination as usize))
            .collect();
        self.write(&mut section, &targets)?;
        section.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_destinations(names: &[&str]) -> Dictionary {
        let mut dict = Dictionary::from_names(names).unwrap();
        for (i, node) in dict.nodes.iter_mut().enumerate().skip(1) {
            node.data_destination = 8 * i as u64;
        }
        dict
    }

    #[test]
    fn test_highest_differing_bit() {
        assert_eq!(highest_differing_bit(b"a", b""), Some(6));
        assert_eq!(highest_differing_bit(b"ab", b"ac"), Some(0));
        assert_eq!(highest_differing_bit(b"xa", b"a"), Some((1 << 3) | 6));
        assert_eq!(highest_differing_bit(b"same", b"same"), None);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let names = ["polygon0", "mat_body", "root", "a"];
        let dict = with_destinations(&names);
        let bytes = dict.encode().unwrap();
        let decoded = Dictionary::read_at(&bytes, 0).unwrap();

        let got: Vec<_> = decoded.entries().map(|n| n.name.as_str()).collect();
        assert_eq!(got, names);
        for (a, b) in dict.entries().zip(decoded.entries()) {
            assert_eq!(a.data_destination, b.data_destination);
            assert_eq!((a.id, a.left, a.right), (b.id, b.left, b.right));
        }
        assert_eq!(decoded.nodes[0].id, ROOT_ID);
    }

    #[test]
    fn test_tree_search_finds_every_entry() {
        let names = ["NodeTree", "DrawOpa", "DrawXlu", "lambert1", "lambert2", "x"];
        let dict = Dictionary::from_names(&names).unwrap();
        for name in names {
            assert_eq!(dict.search(name).map(|n| n.name.as_str()), Some(name));
        }
        assert!(dict.search("lambert3").is_none());
    }

    #[test]
    fn test_duplicate_and_empty_names_rejected() {
        assert!(Dictionary::from_names(&["a", "a"]).is_err());
        assert!(Dictionary::from_names(&[""]).is_err());
    }

    #[test]
    fn test_empty_dictionary() {
        let dict = Dictionary::from_names::<&str>(&[]).unwrap();
        let bytes = dict.encode().unwrap();
        assert_eq!(bytes.len(), 8 + NODE_SIZE);
        assert!(Dictionary::read_at(&bytes, 0).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_dictionary() {
        let mut bytes = vec![0u8; 8];
        bytes[4..8].copy_from_slice(&4u32.to_be_bytes());
        assert!(matches!(
            Dictionary::read_at(&bytes, 0),
            Err(Error::InvalidDictionary { .. })
        ));
    }
}
