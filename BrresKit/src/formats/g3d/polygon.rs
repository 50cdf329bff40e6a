//! Mesh records.
//!
//! A mesh carries two display lists. The setup list loads the vertex
//! descriptor and attribute formats; the data list loads draw matrices and
//! issues indexed draws. Reading replays both; writing regenerates them from
//! the descriptor and the matrix primitives.

use std::collections::BTreeSet;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;

use super::buffer::{BufferKind, VertexQuantization};
use super::io::{cursor_at, read_name, resolve};
use super::section::Section;
use crate::error::{Error, Result};
use crate::formats::gpu::registers::{cp, xf};
use crate::formats::gpu::{
    DisplayListHandler, DisplayListWriter, IndexedLoad, VertexSetupHandler, run_display_list,
};
use crate::formats::gx::{
    IndexedPrimitive, IndexedVertex, MatrixPrimitive, PrimitiveType, VertexAttribute,
    VertexAttributeTable, VertexAttributeType, VertexDescriptor, primitive_stats,
};
use crate::transaction::{MessageClass, TransactionSink};

/// Size of the fixed part of a mesh record.
const MESH_HEADER_SIZE: usize = 0x68;
/// Position matrix memory stride, in words.
const POSITION_MATRIX_WORDS: u16 = 12;
/// Normal matrix memory stride, in words.
const NORMAL_MATRIX_WORDS: u16 = 9;
const NORMAL_MATRIX_BASE: u16 = 0x400;

/// Buffer names referenced by a mesh. `None` means no buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeshBuffers {
    pub position: Option<String>,
    pub normal: Option<String>,
    pub colors: [Option<String>; 2],
    pub tex_coords: [Option<String>; 8],
}

impl MeshBuffers {
    /// (attribute, pool, buffer) for every slot, in handle order.
    pub fn slots(&self) -> impl Iterator<Item = (VertexAttribute, BufferKind, Option<&str>)> {
        let colors = self
            .colors
            .iter()
            .zip([VertexAttribute::Color0, VertexAttribute::Color1])
            .map(|(name, attr)| (attr, BufferKind::Color, name.as_deref()));
        let tex_coords = self.tex_coords.iter().enumerate().filter_map(|(i, name)| {
            VertexAttribute::tex_coord(i).map(|attr| (attr, BufferKind::TexCoord, name.as_deref()))
        });
        [
            (VertexAttribute::Position, BufferKind::Position, self.position.as_deref()),
            (VertexAttribute::Normal, BufferKind::Normal, self.normal.as_deref()),
        ]
        .into_iter()
        .chain(colors)
        .chain(tex_coords)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut Option<String>> {
        match index {
            0 => Some(&mut self.position),
            1 => Some(&mut self.normal),
            2 | 3 => self.colors.get_mut(index - 2),
            _ => self.tex_coords.get_mut(index - 4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub name: String,
    pub id: u32,
    pub vcd: VertexDescriptor,
    pub buffers: MeshBuffers,
    /// Matrix of rigid geometry; -1 when every vertex is skinned.
    pub current_matrix: i32,
    pub current_matrix_embedded: bool,
    pub visible: bool,
    pub matrix_primitives: Vec<MatrixPrimitive>,
}

impl Polygon {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: 0,
            vcd: VertexDescriptor::new(),
            buffers: MeshBuffers::default(),
            current_matrix: 0,
            current_matrix_embedded: false,
            visible: true,
            matrix_primitives: Vec::new(),
        }
    }

    /// (vertex count, triangle count).
    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        primitive_stats(&self.matrix_primitives)
    }

    /// Every draw matrix referenced by the mesh, ascending.
    #[must_use]
    pub fn matrix_usage(&self) -> Vec<u16> {
        let used: BTreeSet<u16> = self
            .matrix_primitives
            .iter()
            .flat_map(|mp| mp.draw_matrices.iter().copied())
            .collect();
        if used.is_empty() {
            return u16::try_from(self.current_matrix).into_iter().collect();
        }
        used.into_iter().collect()
    }
}

/// Resolves buffer handles stored in mesh records.
pub trait BufferPools {
    /// Name and quantization of the `index`-th buffer of a pool.
    fn buffer_at(&self, kind: BufferKind, index: usize) -> Option<(&str, VertexQuantization)>;
}

/// Decodes the draws of a mesh data list into matrix primitives.
pub struct MeshDrawHandler<'a> {
    vcd: &'a VertexDescriptor,
    pub matrix_primitives: Vec<MatrixPrimitive>,
}

impl<'a> MeshDrawHandler<'a> {
    #[must_use]
    pub fn new(vcd: &'a VertexDescriptor) -> Self {
        Self {
            vcd,
            matrix_primitives: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut MatrixPrimitive {
        if self.matrix_primitives.is_empty() {
            self.matrix_primitives.push(MatrixPrimitive::default());
        }
        let last = self.matrix_primitives.len() - 1;
        &mut self.matrix_primitives[last]
    }
}

impl DisplayListHandler for MeshDrawHandler<'_> {
    fn on_indexed_load(
        &mut self,
        target: IndexedLoad,
        index: u16,
        _address: u16,
        _size: u8,
    ) -> Result<()> {
        if target != IndexedLoad::A {
            return Ok(());
        }
        let open_new = self
            .matrix_primitives
            .last()
            .is_none_or(|mp| !mp.primitives.is_empty());
        if open_new {
            self.matrix_primitives.push(MatrixPrimitive::default());
        }
        self.current().draw_matrices.push(index);
        Ok(())
    }

    fn on_draw(
        &mut self,
        reader: &mut Cursor<&[u8]>,
        ty: PrimitiveType,
        _vat: u8,
        count: u16,
    ) -> Result<()> {
        let mut prim = IndexedPrimitive::new(ty);
        prim.vertices.reserve(usize::from(count));
        for _ in 0..count {
            let mut vertex = IndexedVertex::default();
            for (attr, ty) in &self.vcd.attributes {
                let index = match ty {
                    VertexAttributeType::None => continue,
                    VertexAttributeType::Direct => {
                        return Err(Error::UnsupportedMesh {
                            name: String::new(),
                            message: format!("{attr:?} is sent directly"),
                        });
                    }
                    VertexAttributeType::Byte => u16::from(reader.read_u8()?),
                    VertexAttributeType::Short => reader.read_u16::<BigEndian>()?,
                };
                vertex.set(*attr, index);
            }
            prim.vertices.push(vertex);
        }
        self.current().primitives.push(prim);
        Ok(())
    }
}

/// A decoded mesh plus its header validity.
#[derive(Debug, Clone)]
pub(crate) struct PolygonRecord {
    pub polygon: Polygon,
    /// False when the header carries values only legacy tools write.
    pub header_valid: bool,
}

fn pool_kind(slot: usize) -> BufferKind {
    match slot {
        0 => BufferKind::Position,
        1 => BufferKind::Normal,
        2 | 3 => BufferKind::Color,
        _ => BufferKind::TexCoord,
    }
}

fn attribute_kind(attr: VertexAttribute) -> BufferKind {
    match attr {
        VertexAttribute::Position => BufferKind::Position,
        VertexAttribute::Normal => BufferKind::Normal,
        VertexAttribute::Color0 | VertexAttribute::Color1 => BufferKind::Color,
        _ => BufferKind::TexCoord,
    }
}

struct DlHandle {
    at: u64,
    buf_size: u32,
    offset: i32,
}

fn read_handle(r: &mut Cursor<&[u8]>) -> Result<DlHandle> {
    let at = r.position();
    let buf_size = r.read_u32::<BigEndian>()?;
    let _cmd_size = r.read_u32::<BigEndian>()?;
    let offset = r.read_i32::<BigEndian>()?;
    Ok(DlHandle {
        at,
        buf_size,
        offset,
    })
}

fn replay<H: DisplayListHandler>(data: &[u8], handle: &DlHandle, handler: &mut H) -> Result<()> {
    let start = resolve(data, handle.at, i64::from(handle.offset), handle.buf_size as usize)?;
    let mut cursor = Cursor::new(data);
    cursor.set_position(start);
    run_display_list(&mut cursor, handler, handle.buf_size)
}

/// Decode the mesh record at `start`.
///
/// Recoverable oddities are reported to `sink` under `path`; an error means
/// the mesh could not be represented at all.
pub(crate) fn read_polygon(
    data: &[u8],
    start: u64,
    pools: &dyn BufferPools,
    sink: &mut dyn TransactionSink,
    path: &str,
) -> Result<PolygonRecord> {
    let mut r = cursor_at(data, start)?;
    let mut valid = r.read_u32::<BigEndian>()? != 0;
    valid &= r.read_i32::<BigEndian>()? < 0;
    let current_matrix = r.read_i32::<BigEndian>()?;
    for _ in 0..3 {
        r.read_u32::<BigEndian>()?; // cache
    }
    let setup = read_handle(&mut r)?;
    let draws = read_handle(&mut r)?;
    let bitfield = r.read_u32::<BigEndian>()?;
    let flag = r.read_u32::<BigEndian>()?;
    let name_offset = r.read_i32::<BigEndian>()?;
    let name = read_name(data, start, name_offset)?;
    let id = r.read_u32::<BigEndian>()?;
    valid &= r.read_u32::<BigEndian>()? > 0;
    valid &= r.read_u32::<BigEndian>()? > 0;

    let mut buffers = MeshBuffers::default();
    for slot in 0..12 {
        let handle = r.read_i16::<BigEndian>()?;
        let Ok(index) = usize::try_from(handle) else {
            continue;
        };
        let kind = pool_kind(slot);
        let (buffer, _) = pools.buffer_at(kind, index).ok_or_else(|| {
            Error::polygon(&name, format!("{kind:?} buffer handle {handle} does not exist"))
        })?;
        if let Some(out) = buffers.slot_mut(slot) {
            *out = Some(buffer.to_string());
        }
    }
    valid &= r.read_i32::<BigEndian>()? == -1; // fur
    let _matrix_usage = r.read_i32::<BigEndian>()?;

    let mut setup_state = VertexSetupHandler::default();
    replay(data, &setup, &mut setup_state)?;
    let (lo, hi) = setup_state.vcd();

    let mut vcd = VertexDescriptor::new();
    for attr in VertexAttribute::all() {
        if bitfield & (1 << attr.to_u32()) == 0 {
            continue;
        }
        if attr.is_matrix_index() {
            return Err(Error::polygon(&name, format!("unsupported attribute {attr:?}")));
        }
        match VertexDescriptor::array_status(lo, hi, attr.to_u32() - 9) {
            VertexAttributeType::None => {
                sink.callback(
                    MessageClass::Error,
                    path,
                    &format!("{attr:?} is flagged present but its setup status is None"),
                );
            }
            ty => vcd.set(attr, ty),
        }
    }

    check_vat(&setup_state, &vcd, &buffers, pools, sink, path);

    let mut mesh = MeshDrawHandler::new(&vcd);
    replay(data, &draws, &mut mesh).map_err(|e| match e {
        Error::UnsupportedMesh { message, .. } => Error::UnsupportedMesh {
            name: name.clone(),
            message,
        },
        other => other,
    })?;
    let mut matrix_primitives = mesh.matrix_primitives;
    merge_rigid(&mut matrix_primitives);

    tracing::debug!(
        "Read mesh '{}' ({} matrix primitives)",
        name,
        matrix_primitives.len()
    );
    Ok(PolygonRecord {
        polygon: Polygon {
            name,
            id,
            vcd,
            buffers,
            current_matrix,
            current_matrix_embedded: flag & 1 != 0,
            visible: flag & 2 == 0,
            matrix_primitives,
        },
        header_valid: valid,
    })
}

/// Fold runs of rigid matrix primitives into one.
fn merge_rigid(mps: &mut Vec<MatrixPrimitive>) {
    let mut merged: Vec<MatrixPrimitive> = Vec::with_capacity(mps.len());
    for mp in mps.drain(..) {
        match merged.last_mut() {
            Some(last) if last.draw_matrices.is_empty() && mp.draw_matrices.is_empty() => {
                last.primitives.extend(mp.primitives);
            }
            _ => merged.push(mp),
        }
    }
    *mps = merged;
}

fn check_vat(
    setup: &VertexSetupHandler,
    vcd: &VertexDescriptor,
    buffers: &MeshBuffers,
    pools: &dyn BufferPools,
    sink: &mut dyn TransactionSink,
    path: &str,
) {
    let (a, b, c) = setup.vat(0);
    let vat = match VertexAttributeTable::from_raw(a, b, c) {
        Ok(vat) => vat,
        Err(e) => {
            sink.callback(MessageClass::Warning, path, &format!("vertex format: {e}"));
            return;
        }
    };
    for (slot, (attr, kind, name)) in buffers.slots().enumerate() {
        let Some(name) = name else { continue };
        if !vcd.has(attr) {
            continue;
        }
        let quantize = (0..)
            .map_while(|i| pools.buffer_at(kind, i))
            .find(|(n, _)| *n == name)
            .map(|(_, q)| q);
        let (Some(quantize), Some(declared)) = (quantize, vat.formats.get(&attr)) else {
            continue;
        };
        if quantize.vat_format(attribute_kind(attr)) != *declared {
            sink.callback(
                MessageClass::Warning,
                path,
                &format!("vertex format of slot {slot} ({attr:?}) does not match buffer '{name}'"),
            );
        }
    }
}

/// Pool index of every buffer slot (-1 for none) and the vertex format the
/// referenced buffers require.
pub(crate) fn resolve_buffers(
    poly: &Polygon,
    pools: &dyn BufferPools,
) -> Result<([i16; 12], VertexAttributeTable)> {
    let mut handles = [-1i16; 12];
    let mut vat = VertexAttributeTable::default();
    for (slot, (attr, kind, name)) in poly.buffers.slots().enumerate() {
        let Some(name) = name else {
            if poly.vcd.has(attr) {
                return Err(Error::polygon(&poly.name, format!("{attr:?} has no buffer")));
            }
            continue;
        };
        let (index, quantize) = (0..)
            .map_while(|i| pools.buffer_at(kind, i).map(|(n, q)| (i, n, q)))
            .find(|(_, n, _)| *n == name)
            .map(|(i, _, q)| (i, q))
            .ok_or_else(|| {
                Error::polygon(&poly.name, format!("{kind:?} buffer '{name}' does not exist"))
            })?;
        handles[slot] = i16::try_from(index)
            .map_err(|_| Error::polygon(&poly.name, format!("buffer index {index} too large")))?;
        vat.formats.insert(attr, quantize.vat_format(attribute_kind(attr)));
    }
    Ok((handles, vat))
}

/// Setup list: vertex descriptor, texgen counts and attribute formats.
pub fn encode_setup(vcd: &VertexDescriptor, vat: &VertexAttributeTable) -> Result<Vec<u8>> {
    let mut dl = DisplayListWriter::new();
    let (lo, hi) = vcd.to_cp();
    dl.load_cp(cp::VCD_LO, lo);
    dl.load_cp(cp::VCD_HI, hi);
    dl.load_xf(xf::INVTXSPEC, &[vcd.xf_spec()])?;
    let (a, b, c) = vat.to_raw();
    dl.load_cp(cp::VAT_A, a);
    dl.load_cp(cp::VAT_B, b);
    dl.load_cp(cp::VAT_C, c);
    Ok(dl.into_bytes())
}

/// Data list: matrix loads followed by indexed draws.
pub fn encode_primitives(
    name: &str,
    vcd: &VertexDescriptor,
    mps: &[MatrixPrimitive],
) -> Result<Vec<u8>> {
    let mut dl = DisplayListWriter::new();
    for mp in mps {
        for (slot, matrix) in mp.draw_matrices.iter().enumerate() {
            let slot = slot as u16;
            dl.load_indexed(IndexedLoad::A, *matrix, slot * POSITION_MATRIX_WORDS, 12);
            dl.load_indexed(
                IndexedLoad::B,
                *matrix,
                NORMAL_MATRIX_BASE + slot * NORMAL_MATRIX_WORDS,
                9,
            );
        }
        for prim in &mp.primitives {
            let count = u16::try_from(prim.vertices.len()).map_err(|_| {
                Error::polygon(name, format!("{} vertices in one draw", prim.vertices.len()))
            })?;
            dl.draw(prim.ty, 0, count);
            for vertex in &prim.vertices {
                for (attr, ty) in &vcd.attributes {
                    let index = vertex.get(*attr).ok_or_else(|| {
                        Error::polygon(name, format!("vertex has no {attr:?} index"))
                    })?;
                    match ty {
                        VertexAttributeType::None => {}
                        VertexAttributeType::Direct => {
                            return Err(Error::UnsupportedMesh {
                                name: name.to_string(),
                                message: format!("{attr:?} is sent directly"),
                            });
                        }
                        VertexAttributeType::Byte => {
                            let byte = u8::try_from(index).map_err(|_| {
                                Error::polygon(
                                    name,
                                    format!("{attr:?} index {index} does not fit in a byte"),
                                )
                            })?;
                            dl.write_u8(byte);
                        }
                        VertexAttributeType::Short => dl.write_u16(index),
                    }
                }
            }
        }
    }
    Ok(dl.into_bytes())
}

pub(crate) fn polygon_label(index: usize) -> String {
    format!("mesh:{index}")
}

fn write_handle(section: &mut Section, bytes: &[u8]) -> usize {
    section.write_u32(bytes.len().next_multiple_of(32) as u32);
    section.write_u32(bytes.len() as u32);
    let at = section.pos();
    section.write_i32(0);
    at
}

fn place_list(section: &mut Section, handle_offset_at: usize, bytes: &[u8]) {
    section.align(32);
    let handle = handle_offset_at - 8;
    section.patch_i32(handle_offset_at, (section.pos() - handle) as i32);
    section.write_bytes(bytes);
    section.align(32);
}

/// Emit mesh `index`. `handles` holds the pool index of each buffer slot
/// (-1 for none) in [`MeshBuffers::slots`] order.
pub(crate) fn write_polygon(
    section: &mut Section,
    poly: &Polygon,
    index: usize,
    handles: &[i16; 12],
    vat: &VertexAttributeTable,
) -> Result<()> {
    if let Some(attr) = poly.vcd.attributes.keys().find(|a| a.is_matrix_index()) {
        return Err(Error::polygon(&poly.name, format!("unsupported attribute {attr:?}")));
    }
    let setup = encode_setup(&poly.vcd, vat)?;
    let draws = encode_primitives(&poly.name, &poly.vcd, &poly.matrix_primitives)?;
    let (vertices, triangles) = poly.stats();
    let usage = poly.matrix_usage();

    section.align(32);
    let start = section.pos();
    section.label(polygon_label(index));
    section.write_u32(0); // size, patched below
    section.write_model_offset(start);
    section.write_i32(poly.current_matrix);
    let (lo, hi) = poly.vcd.to_cp();
    section.write_u32(lo);
    section.write_u32(hi);
    section.write_u32(poly.vcd.xf_spec());
    let setup_at = write_handle(section, &setup);
    let draws_at = write_handle(section, &draws);
    section.write_u32(poly.vcd.bitfield());
    let mut flag = 0;
    if poly.current_matrix_embedded {
        flag |= 1;
    }
    if !poly.visible {
        flag |= 2;
    }
    section.write_u32(flag);
    section.write_name(start, &poly.name);
    section.write_u32(poly.id);
    section.write_u32(vertices as u32);
    section.write_u32(triangles as u32);
    for handle in handles {
        section.write_i16(*handle);
    }
    section.write_i16(-1);
    section.write_i16(-1);
    section.write_i32(MESH_HEADER_SIZE as i32);
    section.write_u32(usage.len() as u32);
    for matrix in &usage {
        section.write_u16(*matrix);
    }

    place_list(section, setup_at, &setup);
    place_list(section, draws_at, &draws);
    let size = section.pos() - start;
    section.patch_u32(start, size as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::g3d::buffer::VertexFormat;
    use crate::formats::gx::{ComponentType, VatFormat};
    use crate::transaction::IoTransaction;

    struct Pools(Vec<(BufferKind, &'static str, VertexQuantization)>);

    impl BufferPools for Pools {
        fn buffer_at(&self, kind: BufferKind, index: usize) -> Option<(&str, VertexQuantization)> {
            self.0
                .iter()
                .filter(|(k, _, _)| *k == kind)
                .nth(index)
                .map(|(_, n, q)| (*n, *q))
        }
    }

    fn position_quantization() -> VertexQuantization {
        VertexQuantization::new(BufferKind::Position, 1, VertexFormat::Generic(ComponentType::F32), 0)
    }

    fn vertex(pos: u16, uv: u16) -> IndexedVertex {
        let mut v = IndexedVertex::default();
        v.set(VertexAttribute::Position, pos);
        v.set(VertexAttribute::TexCoord0, uv);
        v
    }

    fn sample() -> (Polygon, VertexAttributeTable) {
        let mut poly = Polygon::new("body");
        poly.vcd.set(VertexAttribute::Position, VertexAttributeType::Short);
        poly.vcd.set(VertexAttribute::TexCoord0, VertexAttributeType::Byte);
        poly.buffers.position = Some("pos".to_string());
        poly.buffers.tex_coords[0] = Some("uv".to_string());

        let mut tris = IndexedPrimitive::new(PrimitiveType::Triangles);
        tris.vertices = vec![vertex(0, 0), vertex(1, 1), vertex(300, 2)];
        let mut strip = IndexedPrimitive::new(PrimitiveType::TriangleStrip);
        strip.vertices = vec![vertex(2, 0), vertex(1, 1), vertex(0, 2), vertex(3, 3)];
        poly.matrix_primitives.push(MatrixPrimitive {
            draw_matrices: Vec::new(),
            primitives: vec![tris, strip],
        });

        let mut vat = VertexAttributeTable::default();
        vat.formats.insert(
            VertexAttribute::Position,
            position_quantization().vat_format(BufferKind::Position),
        );
        vat.formats.insert(
            VertexAttribute::TexCoord0,
            VatFormat { elements: 1, format: 4, shift: 0 },
        );
        (poly, vat)
    }

    fn pools() -> Pools {
        Pools(vec![
            (BufferKind::Position, "pos", position_quantization()),
            (
                BufferKind::TexCoord,
                "uv",
                VertexQuantization::new(
                    BufferKind::TexCoord,
                    1,
                    VertexFormat::Generic(ComponentType::F32),
                    0,
                ),
            ),
        ])
    }

    fn round_trip(poly: &Polygon, vat: &VertexAttributeTable) -> (PolygonRecord, IoTransaction) {
        let mut handles = [-1i16; 12];
        handles[0] = 0;
        handles[4] = 0;
        let mut section = Section::new();
        // model header stand-in so the model offset is negative
        section.write_zeros(32);
        write_polygon(&mut section, poly, 0, &handles, vat).unwrap();
        let data = section.finish().unwrap();
        let mut tx = IoTransaction::new();
        let record = read_polygon(&data, 32, &pools(), &mut tx, "MDL0/Meshes/body").unwrap();
        (record, tx)
    }

    #[test]
    fn test_record_round_trip() {
        let (poly, vat) = sample();
        let (record, tx) = round_trip(&poly, &vat);
        assert!(record.header_valid);
        assert!(tx.messages().is_empty(), "{:?}", tx.messages());
        assert_eq!(record.polygon, poly);
        assert_eq!(record.polygon.stats(), (7, 3));
    }

    #[test]
    fn test_skinned_groups_split_on_matrix_loads() {
        let (mut poly, vat) = sample();
        let prims = poly.matrix_primitives[0].primitives.clone();
        poly.current_matrix = -1;
        poly.matrix_primitives = vec![
            MatrixPrimitive {
                draw_matrices: vec![0, 1],
                primitives: vec![prims[0].clone()],
            },
            MatrixPrimitive {
                draw_matrices: vec![2],
                primitives: vec![prims[1].clone()],
            },
        ];
        let (record, _) = round_trip(&poly, &vat);
        assert_eq!(record.polygon.matrix_primitives, poly.matrix_primitives);
        assert_eq!(poly.matrix_usage(), vec![0, 1, 2]);
    }

    #[test]
    fn test_rigid_groups_merge() {
        let (mut poly, vat) = sample();
        let mut second = poly.matrix_primitives[0].clone();
        second.primitives.truncate(1);
        poly.matrix_primitives.push(second);
        let (record, _) = round_trip(&poly, &vat);
        assert_eq!(record.polygon.matrix_primitives.len(), 1);
        assert_eq!(record.polygon.matrix_primitives[0].primitives.len(), 3);
    }

    #[test]
    fn test_vat_mismatch_warns() {
        let (poly, mut vat) = sample();
        vat.formats.insert(
            VertexAttribute::Position,
            VatFormat { elements: 1, format: 3, shift: 0 },
        );
        let (_, tx) = round_trip(&poly, &vat);
        assert_eq!(tx.count(MessageClass::Warning), 1);
    }

    #[test]
    fn test_direct_attribute_is_unsupported() {
        let (mut poly, _) = sample();
        poly.vcd.set(VertexAttribute::Position, VertexAttributeType::Direct);
        assert!(matches!(
            encode_primitives(&poly.name, &poly.vcd, &poly.matrix_primitives),
            Err(Error::UnsupportedMesh { .. })
        ));

        // A draw list read against a descriptor with a direct attribute
        let mut vcd = VertexDescriptor::new();
        vcd.set(VertexAttribute::Position, VertexAttributeType::Direct);
        let mut dl = DisplayListWriter::new();
        dl.draw(PrimitiveType::Triangles, 0, 1);
        dl.write_u16(0);
        let bytes = dl.into_bytes();
        let mut handler = MeshDrawHandler::new(&vcd);
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(run_display_list(&mut cursor, &mut handler, bytes.len() as u32).is_err());
    }

    #[test]
    fn test_byte_index_overflow() {
        let (mut poly, _) = sample();
        poly.matrix_primitives[0].primitives[0].vertices[0].set(VertexAttribute::TexCoord0, 256);
        assert!(encode_primitives(&poly.name, &poly.vcd, &poly.matrix_primitives).is_err());
    }
}
