//! Vertex attributes, descriptors and indexed topology.

use std::collections::BTreeMap;

use serde::Serialize;

use super::enums::PrimitiveType;
use crate::error::{Error, Result};
use crate::formats::gpu::registers::{bits, place};

hw_enum! {
    /// Vertex attribute slot. The value is the bit index in a vertex
    /// descriptor bitfield.
    pub enum VertexAttribute {
        PositionNormalMatrixIndex = 0,
        Texture0MatrixIndex = 1,
        Texture1MatrixIndex = 2,
        Texture2MatrixIndex = 3,
        Texture3MatrixIndex = 4,
        Texture4MatrixIndex = 5,
        Texture5MatrixIndex = 6,
        Texture6MatrixIndex = 7,
        Texture7MatrixIndex = 8,
        Position = 9,
        Normal = 10,
        Color0 = 11,
        Color1 = 12,
        TexCoord0 = 13,
        TexCoord1 = 14,
        TexCoord2 = 15,
        TexCoord3 = 16,
        TexCoord4 = 17,
        TexCoord5 = 18,
        TexCoord6 = 19,
        TexCoord7 = 20,
    }
}

/// Number of attribute slots in a descriptor.
pub const VERTEX_ATTRIBUTE_COUNT: u32 = 21;

impl VertexAttribute {
    /// Per-vertex matrix indices (bits 0-8).
    #[must_use]
    pub const fn is_matrix_index(self) -> bool {
        (self as u32) < VertexAttribute::Position as u32
    }

    #[must_use]
    pub fn color(index: usize) -> Option<Self> {
        Self::from_u32(VertexAttribute::Color0 as u32 + u32::try_from(index).ok()?)
            .filter(|a| *a <= VertexAttribute::Color1)
    }

    #[must_use]
    pub fn tex_coord(index: usize) -> Option<Self> {
        Self::from_u32(VertexAttribute::TexCoord0 as u32 + u32::try_from(index).ok()?)
    }

    /// Iterate every attribute in ascending bit order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..VERTEX_ATTRIBUTE_COUNT).filter_map(Self::from_u32)
    }
}

hw_enum! {
    /// How an attribute is supplied per vertex.
    #[derive(Default)]
    pub enum VertexAttributeType {
        #[default]
        None = 0,
        Direct = 1,
        Byte = 2,
        Short = 3,
    }
}

/// Which attributes a mesh's vertices carry, and how each is indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VertexDescriptor {
    pub attributes: BTreeMap<VertexAttribute, VertexAttributeType>,
}

impl VertexDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Present-attribute bitfield (bit `n` = attribute `n`).
    #[must_use]
    pub fn bitfield(&self) -> u32 {
        self.attributes
            .keys()
            .fold(0, |acc, attr| acc | (1 << attr.to_u32()))
    }

    #[must_use]
    pub fn has(&self, attr: VertexAttribute) -> bool {
        self.attributes.contains_key(&attr)
    }

    pub fn set(&mut self, attr: VertexAttribute, ty: VertexAttributeType) {
        self.attributes.insert(attr, ty);
    }

    /// Decode the CP `VCD_LO`/`VCD_HI` pair.
    pub fn from_cp(lo: u32, hi: u32) -> Result<Self> {
        let hex = u64::from(lo) | (u64::from(hi) << 17);
        let mut vcd = Self::new();

        for attr in VertexAttribute::all() {
            let idx = attr.to_u32();
            if attr.is_matrix_index() {
                if (hex >> idx) & 1 != 0 {
                    vcd.set(attr, VertexAttributeType::Direct);
                }
                continue;
            }
            let ty = Self::array_status(lo, hi, idx - 9);
            if ty != VertexAttributeType::None {
                vcd.set(attr, ty);
            }
        }
        Ok(vcd)
    }

    /// Index status of an array attribute as encoded in the CP registers.
    ///
    /// `index` counts from `Position` (0 = position, 1 = normal, ...).
    #[must_use]
    pub fn array_status(lo: u32, hi: u32, index: u32) -> VertexAttributeType {
        let hex = u64::from(lo) | (u64::from(hi) << 17);
        let raw = ((hex >> (9 + 2 * index)) & 3) as u32;
        VertexAttributeType::from_u32(raw).unwrap_or_default()
    }

    /// Encode as the CP `VCD_LO`/`VCD_HI` pair.
    #[must_use]
    pub fn to_cp(&self) -> (u32, u32) {
        let mut hex: u64 = 0;
        for (attr, ty) in &self.attributes {
            let idx = attr.to_u32();
            if attr.is_matrix_index() {
                if *ty != VertexAttributeType::None {
                    hex |= 1 << idx;
                }
            } else {
                hex |= u64::from(ty.to_u32()) << (9 + 2 * (idx - 9));
            }
        }
        ((hex & 0x1FFFF) as u32, (hex >> 17) as u32)
    }

    /// XF `INVTXSPEC` value: color, normal and texcoord counts.
    #[must_use]
    pub fn xf_spec(&self) -> u32 {
        let colors = [VertexAttribute::Color0, VertexAttribute::Color1]
            .iter()
            .filter(|a| self.has(**a))
            .count() as u32;
        let normals = u32::from(self.has(VertexAttribute::Normal));
        let texcoords = (0..8)
            .filter_map(VertexAttribute::tex_coord)
            .filter(|a| self.has(*a))
            .count() as u32;
        place(colors, 0, 2) | place(normals, 2, 2) | place(texcoords, 4, 4)
    }
}

/// Attribute format entry of a vertex attribute table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VatFormat {
    /// Component count selector (e.g. 0 = XY, 1 = XYZ for positions).
    pub elements: u32,
    /// Component type or color format, depending on the attribute.
    pub format: u32,
    /// Fixed point shift. Unused by normals and colors.
    pub shift: u32,
}

/// Decoded CP `VAT_A`/`VAT_B`/`VAT_C` words for one vertex format slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VertexAttributeTable {
    pub formats: BTreeMap<VertexAttribute, VatFormat>,
    pub byte_dequant: bool,
    pub normal_index3: bool,
}

/// (word, elements bit, format shift, shift shift) of texcoords 0-7.
const TEX_LAYOUT: [(usize, u32, u32, Option<u32>); 8] = [
    (0, 21, 22, Some(25)),
    (1, 0, 1, Some(4)),
    (1, 9, 10, Some(13)),
    (1, 18, 19, Some(22)),
    (1, 27, 28, None),
    (2, 5, 6, Some(9)),
    (2, 14, 15, Some(18)),
    (2, 23, 24, Some(27)),
];

impl VertexAttributeTable {
    pub fn from_raw(a: u32, b: u32, c: u32) -> Result<Self> {
        let words = [a, b, c];
        let mut formats = BTreeMap::new();

        let generic = |attr: &'static str, value: u32| -> Result<u32> {
            if value > 4 {
                return Err(Error::InvalidRegister {
                    register: "VAT",
                    field: attr,
                    value,
                });
            }
            Ok(value)
        };

        formats.insert(
            VertexAttribute::Position,
            VatFormat {
                elements: bits(a, 0, 1),
                format: generic("position format", bits(a, 1, 3))?,
                shift: bits(a, 4, 5),
            },
        );
        formats.insert(
            VertexAttribute::Normal,
            VatFormat {
                elements: bits(a, 9, 1),
                format: generic("normal format", bits(a, 10, 3))?,
                shift: 0,
            },
        );
        for (attr, elem, fmt) in [
            (VertexAttribute::Color0, 13, 14),
            (VertexAttribute::Color1, 17, 18),
        ] {
            let format = bits(a, fmt, 3);
            if format > 5 {
                return Err(Error::InvalidRegister {
                    register: "VAT",
                    field: "color format",
                    value: format,
                });
            }
            formats.insert(
                attr,
                VatFormat {
                    elements: bits(a, elem, 1),
                    format,
                    shift: 0,
                },
            );
        }
        for (i, (word, elem, fmt, shift)) in TEX_LAYOUT.iter().enumerate() {
            let raw = words[*word];
            let shift = match shift {
                Some(s) => bits(raw, *s, 5),
                // texcoord 4 keeps its shift in the low bits of VAT_C
                None => bits(c, 0, 5),
            };
            if let Some(attr) = VertexAttribute::tex_coord(i) {
                formats.insert(
                    attr,
                    VatFormat {
                        elements: bits(raw, *elem, 1),
                        format: generic("texcoord format", bits(raw, *fmt, 3))?,
                        shift,
                    },
                );
            }
        }

        Ok(Self {
            formats,
            byte_dequant: bits(a, 30, 1) != 0,
            normal_index3: bits(a, 31, 1) != 0,
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> (u32, u32, u32) {
        let mut words = [0u32; 3];
        let get = |attr| self.formats.get(&attr).copied().unwrap_or_default();

        let pos = get(VertexAttribute::Position);
        words[0] |= place(pos.elements, 0, 1) | place(pos.format, 1, 3) | place(pos.shift, 4, 5);
        let nrm = get(VertexAttribute::Normal);
        words[0] |= place(nrm.elements, 9, 1) | place(nrm.format, 10, 3);
        let c0 = get(VertexAttribute::Color0);
        words[0] |= place(c0.elements, 13, 1) | place(c0.format, 14, 3);
        let c1 = get(VertexAttribute::Color1);
        words[0] |= place(c1.elements, 17, 1) | place(c1.format, 18, 3);

        for (i, (word, elem, fmt, shift)) in TEX_LAYOUT.iter().enumerate() {
            let Some(attr) = VertexAttribute::tex_coord(i) else {
                continue;
            };
            let f = get(attr);
            words[*word] |= place(f.elements, *elem, 1) | place(f.format, *fmt, 3);
            match shift {
                Some(s) => words[*word] |= place(f.shift, *s, 5),
                None => words[2] |= place(f.shift, 0, 5),
            }
        }

        words[0] |= place(u32::from(self.byte_dequant), 30, 1);
        words[0] |= place(u32::from(self.normal_index3), 31, 1);
        (words[0], words[1], words[2])
    }
}

/// One vertex: attribute -> raw buffer index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexedVertex {
    pub indices: BTreeMap<VertexAttribute, u16>,
}

impl IndexedVertex {
    #[must_use]
    pub fn get(&self, attr: VertexAttribute) -> Option<u16> {
        self.indices.get(&attr).copied()
    }

    pub fn set(&mut self, attr: VertexAttribute, index: u16) {
        self.indices.insert(attr, index);
    }
}

/// A draw call of one topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedPrimitive {
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    pub vertices: Vec<IndexedVertex>,
}

impl IndexedPrimitive {
    #[must_use]
    pub fn new(ty: PrimitiveType) -> Self {
        Self {
            ty,
            vertices: Vec::new(),
        }
    }
}

/// Primitives sharing one set of loaded draw matrices.
///
/// `draw_matrices` is empty for rigid geometry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatrixPrimitive {
    pub draw_matrices: Vec<u16>,
    pub primitives: Vec<IndexedPrimitive>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcd_cp_roundtrip() {
        let mut vcd = VertexDescriptor::new();
        vcd.set(VertexAttribute::Position, VertexAttributeType::Short);
        vcd.set(VertexAttribute::Color0, VertexAttributeType::Byte);
        vcd.set(VertexAttribute::TexCoord2, VertexAttributeType::Short);

        let (lo, hi) = vcd.to_cp();
        assert_eq!(lo, 3 << 9 | 2 << 13);
        assert_eq!(hi, 3 << 4);
        assert_eq!(VertexDescriptor::from_cp(lo, hi).unwrap(), vcd);
        assert_eq!(
            VertexDescriptor::array_status(lo, hi, 6),
            VertexAttributeType::Short
        );
        assert_eq!(vcd.bitfield(), 1 << 9 | 1 << 11 | 1 << 15);
    }

    #[test]
    fn test_xf_spec_counts() {
        let mut vcd = VertexDescriptor::new();
        vcd.set(VertexAttribute::Position, VertexAttributeType::Short);
        vcd.set(VertexAttribute::Normal, VertexAttributeType::Short);
        vcd.set(VertexAttribute::Color0, VertexAttributeType::Short);
        vcd.set(VertexAttribute::TexCoord0, VertexAttributeType::Short);
        vcd.set(VertexAttribute::TexCoord1, VertexAttributeType::Short);
        assert_eq!(vcd.xf_spec(), 1 | 1 << 2 | 2 << 4);
    }

    #[test]
    fn test_vat_layout() {
        let mut vat = VertexAttributeTable::default();
        vat.formats.insert(
            VertexAttribute::Position,
            VatFormat { elements: 1, format: 3, shift: 7 },
        );
        vat.formats.insert(
            VertexAttribute::TexCoord4,
            VatFormat { elements: 1, format: 3, shift: 10 },
        );
        vat.byte_dequant = true;

        let (a, b, c) = vat.to_raw();
        assert_eq!(a, 1 | 3 << 1 | 7 << 4 | 1 << 30);
        assert_eq!(b, 1 << 27 | 3 << 28);
        assert_eq!(c, 10);

        let decoded = VertexAttributeTable::from_raw(a, b, c).unwrap();
        assert_eq!(decoded.formats[&VertexAttribute::Position].shift, 7);
        assert_eq!(decoded.formats[&VertexAttribute::TexCoord4].shift, 10);
        assert!(decoded.byte_dequant);
    }

    #[test]
    fn test_vat_rejects_bad_format() {
        let a = 5 << 1;
        assert!(VertexAttributeTable::from_raw(a, 0, 0).is_err());
    }
}
