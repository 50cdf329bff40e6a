//! Byte buffer with relocations for MDL0 building.
//!
//! Offsets in MDL0 are signed and relative to the record that holds them, so
//! every pointer is written as a placeholder plus a [`Fixup`] naming its base
//! and target. [`Section::finish`] appends the string pool and patches every
//! fixup in a second pass.

use std::collections::HashMap;

use glam::Vec3;
use indexmap::IndexSet;

use crate::error::{Error, Result};

/// What a relocation points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A position registered with [`Section::label`].
    Label(String),
    /// The characters of a pooled string.
    Name(String),
    /// A fixed absolute position.
    Absolute(usize),
}

/// A pending relocation.
#[derive(Debug, Clone)]
pub struct Fixup {
    /// Position of the placeholder `s32`.
    pub offset: usize,
    /// Position the stored value is relative to.
    pub base: usize,
    pub target: Target,
}

/// A section of data being built.
#[derive(Debug, Default)]
pub struct Section {
    pub data: Vec<u8>,
    pub fixups: Vec<Fixup>,
    labels: HashMap<String, usize>,
    strings: IndexSet<String>,
}

impl Section {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    pub fn align(&mut self, alignment: usize) {
        let padding = (alignment - (self.data.len() % alignment)) % alignment;
        self.data.extend(std::iter::repeat_n(0u8, padding));
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.data.extend(std::iter::repeat_n(0u8, count));
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    /// Offset from `base` back to the start of the model (always <= 0).
    pub fn write_model_offset(&mut self, base: usize) {
        self.write_i32(-(base as i32));
    }

    /// Register `name` at the current position.
    pub fn label(&mut self, name: impl Into<String>) {
        self.labels.insert(name.into(), self.pos());
    }

    #[must_use]
    pub fn label_pos(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Write an `s32` pointer relative to `base` and record a fixup.
    pub fn write_ptr(&mut self, base: usize, target: Target) {
        self.fixups.push(Fixup {
            offset: self.pos(),
            base,
            target,
        });
        // Placeholder, resolved in finish()
        self.write_i32(0);
    }

    /// Pointer to a label relative to `base`.
    pub fn write_label_ptr(&mut self, base: usize, label: impl Into<String>) {
        self.write_ptr(base, Target::Label(label.into()));
    }

    /// Pointer to a pooled copy of `name`; empty names are stored as 0.
    pub fn write_name(&mut self, base: usize, name: &str) {
        if name.is_empty() {
            self.write_i32(0);
            return;
        }
        self.strings.insert(name.to_string());
        self.write_ptr(base, Target::Name(name.to_string()));
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.data[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    pub fn patch_i32(&mut self, at: usize, v: i32) {
        self.data[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Append the string pool and resolve every fixup.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut names = HashMap::with_capacity(self.strings.len());
        let strings = std::mem::take(&mut self.strings);
        self.align(4);
        for s in &strings {
            self.write_u32(s.len() as u32);
            names.insert(s.as_str(), self.pos());
            self.write_bytes(s.as_bytes());
            self.write_u8(0);
            self.align(4);
        }

        let fixups = std::mem::take(&mut self.fixups);
        tracing::debug!(
            "Resolving {} fixups, {} pooled strings",
            fixups.len(),
            strings.len()
        );
        for fixup in &fixups {
            let target = match &fixup.target {
                Target::Label(label) => {
                    self.label_pos(label)
                        .ok_or_else(|| Error::UnresolvedLabel {
                            label: label.clone(),
                        })?
                }
                Target::Name(name) => {
                    names
                        .get(name.as_str())
                        .copied()
                        .ok_or_else(|| Error::UnresolvedLabel {
                            label: format!("string '{name}'"),
                        })?
                }
                Target::Absolute(pos) => *pos,
            };
            let relative = target as i64 - fixup.base as i64;
            self.patch_i32(fixup.offset, relative as i32);
        }
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_labels() {
        let mut s = Section::new();
        s.label("start");
        s.write_label_ptr(0, "end");
        s.write_u32(0xDEAD_BEEF);
        s.write_label_ptr(8, "start");
        s.label("end");
        let out = s.finish().unwrap();
        assert_eq!(&out[0..4], &12i32.to_be_bytes());
        assert_eq!(&out[8..12], &(-8i32).to_be_bytes());
    }

    #[test]
    fn test_names_are_pooled_once() {
        let mut s = Section::new();
        s.write_name(0, "bone");
        s.write_name(4, "bone");
        s.write_name(8, "");
        let out = s.finish().unwrap();
        // pool: len at 12, chars at 16
        assert_eq!(&out[12..16], &4u32.to_be_bytes());
        assert_eq!(&out[16..20], b"bone");
        assert_eq!(&out[0..4], &16i32.to_be_bytes());
        assert_eq!(&out[4..8], &12i32.to_be_bytes());
        assert_eq!(&out[8..12], &0i32.to_be_bytes());
        assert_eq!(out.len(), 24);
    }

    #[test]
    fn test_unresolved_label() {
        let mut s = Section::new();
        s.write_label_ptr(0, "missing");
        assert!(matches!(
            s.finish(),
            Err(Error::UnresolvedLabel { label }) if label == "missing"
        ));
    }

    #[test]
    fn test_align() {
        let mut s = Section::new();
        s.write_u8(1);
        s.align(32);
        assert_eq!(s.len(), 32);
        s.align(32);
        assert_eq!(s.len(), 32);
    }
}
