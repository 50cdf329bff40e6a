//! MDL0 reader.
//!
//! Fatal problems (bad magic, unsupported revision, truncated header) fail
//! the read. Problems inside a section are reported to the
//! [`TransactionSink`] and the read carries on with what it can still trust.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use super::bone::{link_children, read_bone, resolve_parents};
use super::buffer::{BufferKind, GenericBuffer, VertexElement, read_buffer};
use super::bytecode::{apply_draw_calls, read_method};
use super::dictionary::Dictionary;
use super::io::{cursor_at, read_name, read_vec3};
use super::material::read_material;
use super::model::{EnvelopeMatrixMode, Model, ModelInfo, ScalingRule, TextureMatrixMode};
use super::polygon::read_polygon;
use crate::error::{Error, Result};
use crate::formats::gx::Aabb;
use crate::transaction::{MessageClass, TransactionSink, TransactionState};

pub const MDL0_MAGIC: &[u8; 4] = b"MDL0";
pub const MDL0_VERSION: u32 = 11;

/// Indices into the section offset table.
pub mod sections {
    pub const RENDER_TREE: usize = 0;
    pub const BONES: usize = 1;
    pub const POSITIONS: usize = 2;
    pub const NORMALS: usize = 3;
    pub const COLORS: usize = 4;
    pub const TEXCOORDS: usize = 5;
    pub const FUR_VECTORS: usize = 6;
    pub const FUR_POSITIONS: usize = 7;
    pub const MATERIALS: usize = 8;
    pub const SHADERS: usize = 9;
    pub const MESHES: usize = 10;
    pub const TEXTURE_LINKS: usize = 11;
    pub const PALETTE_LINKS: usize = 12;
    pub const USER_DATA: usize = 13;
    pub const COUNT: usize = 14;
}

/// Offset of the model info block.
pub const INFO_OFFSET: usize = 0x4C;
pub const INFO_SIZE: u32 = 0x40;

const BRAWLBOX_INVALID: &str = "BRRES file was created with BrawlBox and is invalid. It is \
     recommended you create BRRES files here by dropping a DAE/FBX file.";
const BRAWLBOX_NOTE: &str =
    "Note: BRRES file was saved with BrawlBox. Certain materials may flicker during ghost replays.";
const RIGGING_UNTESTED: &str =
    "Rigging support is not fully tested. Rejecting file to avoid potential corruption.";

/// Fixed header fields.
#[derive(Debug, Clone)]
pub struct Mdl0Header {
    pub size: u32,
    pub version: u32,
    pub sections: [i32; sections::COUNT],
    pub name: String,
}

/// Report a fatal problem and hand back the error.
fn fatal(sink: &mut dyn TransactionSink, path: &str, err: Error) -> Error {
    sink.callback(MessageClass::Error, path, &err.to_string());
    sink.escalate(TransactionState::Failure);
    err
}

/// Report a section problem.
fn section_failure(sink: &mut dyn TransactionSink, path: &str, err: &Error) {
    sink.callback(MessageClass::Error, path, &err.to_string());
    sink.escalate(TransactionState::Failure);
}

/// Decode and validate the header.
pub fn read_header(data: &[u8]) -> Result<Mdl0Header> {
    let magic: [u8; 4] = data
        .get(..4)
        .and_then(|m| m.try_into().ok())
        .ok_or(Error::InvalidMdl0Magic([0; 4]))?;
    if &magic != MDL0_MAGIC {
        return Err(Error::InvalidMdl0Magic(magic));
    }
    let mut r = Cursor::new(data);
    r.set_position(4);
    let size = r.read_u32::<BigEndian>()?;
    let version = r.read_u32::<BigEndian>()?;
    if version != MDL0_VERSION {
        return Err(Error::UnsupportedMdl0Version { version });
    }
    let _brres_offset = r.read_i32::<BigEndian>()?;
    let mut offsets = [0i32; sections::COUNT];
    for ofs in &mut offsets {
        *ofs = r.read_i32::<BigEndian>()?;
    }
    let name_offset = r.read_i32::<BigEndian>()?;
    let name = read_name(data, 0, name_offset)?;
    Ok(Mdl0Header {
        size,
        version,
        sections: offsets,
        name,
    })
}

fn read_info(data: &[u8]) -> Result<ModelInfo> {
    let start = INFO_OFFSET as u64;
    let mut r = cursor_at(data, start)?;
    let _size = r.read_u32::<BigEndian>()?;
    let _model_offset = r.read_i32::<BigEndian>()?;
    let scaling = r.read_u32::<BigEndian>()?;
    let tex_mtx = r.read_u32::<BigEndian>()?;
    let _vertex_count = r.read_u32::<BigEndian>()?;
    let _triangle_count = r.read_u32::<BigEndian>()?;
    let source_offset = r.read_i32::<BigEndian>()?;
    let _view_matrices = r.read_u32::<BigEndian>()?;
    let _flags = [r.read_u8()?, r.read_u8()?, r.read_u8()?];
    let envelope = r.read_u8()?;
    let _bone_table = r.read_i32::<BigEndian>()?;
    let min = read_vec3(&mut r)?;
    let max = read_vec3(&mut r)?;

    let bad = |field: &'static str, value: u32| Error::InvalidRegister {
        register: "model info",
        field,
        value,
    };
    Ok(ModelInfo {
        scaling_rule: ScalingRule::from_u32(scaling).ok_or_else(|| bad("scaling rule", scaling))?,
        texture_matrix_mode: TextureMatrixMode::from_u32(tex_mtx)
            .ok_or_else(|| bad("texture matrix mode", tex_mtx))?,
        envelope_matrix_mode: EnvelopeMatrixMode::from_u32(u32::from(envelope))
            .ok_or_else(|| bad("envelope matrix mode", u32::from(envelope)))?,
        source_location: read_name(data, start, source_offset)?,
        aabb: Aabb::new(min, max),
    })
}

/// Entries of the dictionary at section `index`, or none when the section is
/// absent. A broken dictionary is reported and treated as empty.
fn section_entries(
    data: &[u8],
    header: &Mdl0Header,
    index: usize,
    sink: &mut dyn TransactionSink,
    path: &str,
) -> Vec<(String, u64)> {
    let offset = header.sections[index];
    if offset == 0 {
        return Vec::new();
    }
    let dict = u64::try_from(offset)
        .map_err(|_| Error::OffsetOutOfRange {
            offset: i64::from(offset),
            len: data.len(),
        })
        .and_then(|at| Dictionary::read_at(data, at));
    match dict {
        Ok(dict) => dict
            .entries()
            .map(|n| (n.name.clone(), n.data_destination))
            .collect(),
        Err(e) => {
            section_failure(sink, path, &e);
            Vec::new()
        }
    }
}

fn read_pool<T: VertexElement>(
    data: &[u8],
    header: &Mdl0Header,
    index: usize,
    kind: BufferKind,
    sink: &mut dyn TransactionSink,
    path: &str,
) -> (Vec<GenericBuffer<T>>, bool) {
    let mut pool = Vec::new();
    let mut ok = true;
    for (name, at) in section_entries(data, header, index, sink, path) {
        match read_buffer::<T>(data, at, kind) {
            Ok(buffer) => pool.push(buffer),
            Err(e) => {
                section_failure(sink, &format!("{path}/{name}"), &e);
                ok = false;
            }
        }
    }
    (pool, ok)
}

/// Decode an MDL0 model.
///
/// Recoverable problems go to `sink`; the returned model then holds every
/// section that decoded.
pub fn read_model(data: &[u8], sink: &mut dyn TransactionSink) -> Result<Model> {
    let header = read_header(data).map_err(|e| fatal(sink, "MDL0", e))?;
    let root = if header.name.is_empty() {
        "MDL0".to_string()
    } else {
        header.name.clone()
    };
    let info = read_info(data).map_err(|e| fatal(sink, &root, e))?;
    tracing::debug!("Reading MDL0 '{}' ({} bytes)", header.name, header.size);

    let mut model = Model::new(header.name.clone());
    model.info = info;
    let mut valid = true;

    // Bones
    let bones_path = format!("{root}/Bones");
    let mut records = Vec::new();
    let mut bones_ok = true;
    for (name, at) in section_entries(data, &header, sections::BONES, sink, &bones_path) {
        match read_bone(data, at) {
            Ok(record) => records.push(record),
            Err(e) => {
                section_failure(sink, &format!("{bones_path}/{name}"), &e);
                bones_ok = false;
            }
        }
    }
    match resolve_parents(records) {
        Ok(bones) => model.bones = bones,
        Err(e) => {
            section_failure(sink, &bones_path, &e);
            bones_ok = false;
        }
    }
    link_children(&mut model.bones);

    // Buffer pools
    let mut buffers_ok = true;
    let (positions, ok) = read_pool(
        data,
        &header,
        sections::POSITIONS,
        BufferKind::Position,
        sink,
        &format!("{root}/Positions"),
    );
    model.positions = positions;
    buffers_ok &= ok;
    let (normals, ok) = read_pool(
        data,
        &header,
        sections::NORMALS,
        BufferKind::Normal,
        sink,
        &format!("{root}/Normals"),
    );
    model.normals = normals;
    buffers_ok &= ok;
    let (colors, ok) = read_pool(
        data,
        &header,
        sections::COLORS,
        BufferKind::Color,
        sink,
        &format!("{root}/Colors"),
    );
    model.colors = colors;
    buffers_ok &= ok;
    let (texcoords, ok) = read_pool(
        data,
        &header,
        sections::TEXCOORDS,
        BufferKind::TexCoord,
        sink,
        &format!("{root}/TexCoords"),
    );
    model.texcoords = texcoords;
    buffers_ok &= ok;

    if !buffers_ok {
        tracing::warn!(
            "Skipping materials and meshes of '{}': a vertex buffer failed to decode",
            root
        );
        return Ok(model);
    }

    // Materials
    let materials_path = format!("{root}/Materials");
    for (name, at) in section_entries(data, &header, sections::MATERIALS, sink, &materials_path) {
        match read_material(data, at) {
            Ok(mat) => model.materials.push(mat),
            Err(e) => section_failure(sink, &format!("{materials_path}/{name}"), &e),
        }
    }

    // Meshes
    let meshes_path = format!("{root}/Meshes");
    let mut meshes = Vec::new();
    let mut meshes_ok = true;
    for (name, at) in section_entries(data, &header, sections::MESHES, sink, &meshes_path) {
        let path = format!("{meshes_path}/{name}");
        match read_polygon(data, at, &model, sink, &path) {
            Ok(record) => {
                valid &= record.header_valid;
                meshes.push(record.polygon);
            }
            Err(Error::UnsupportedMesh { message, .. }) => {
                tracing::debug!("Mesh '{}' unsupported: {}", name, message);
                sink.callback(MessageClass::Warning, &path, "Mesh unsupported.");
                sink.escalate(TransactionState::Failure);
                meshes_ok = false;
            }
            Err(e) => {
                section_failure(sink, &path, &e);
                meshes_ok = false;
            }
        }
    }
    model.meshes = meshes;
    if !meshes_ok {
        return Ok(model);
    }

    // Render tree
    if bones_ok {
        let tree_path = format!("{root}/RenderTree");
        let mut methods = Vec::new();
        for (name, at) in section_entries(data, &header, sections::RENDER_TREE, sink, &tree_path)
        {
            match read_method(data, at, &name) {
                Ok(method) => methods.push(method),
                Err(e) => section_failure(sink, &format!("{tree_path}/{name}"), &e),
            }
        }
        if let Err(e) = apply_draw_calls(&mut model.bones, &methods) {
            section_failure(sink, &tree_path, &e);
        }
    }

    let multiple_bones = model.bones.len() > 1;
    if !valid && multiple_bones {
        sink.callback(MessageClass::Error, &root, BRAWLBOX_INVALID);
        sink.escalate(TransactionState::FailureToSave);
    } else if !valid {
        sink.callback(MessageClass::Warning, &root, BRAWLBOX_NOTE);
    } else if multiple_bones {
        sink.callback(MessageClass::Error, &root, RIGGING_UNTESTED);
        sink.escalate(TransactionState::FailureToSave);
    }

    tracing::debug!(
        "Read MDL0 '{}': {} bones, {} materials, {} meshes",
        model.name,
        model.bones.len(),
        model.materials.len(),
        model.meshes.len()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::g3d::buffer::{VertexFormat, VertexQuantization};
    use crate::formats::g3d::material::Material;
    use crate::formats::g3d::write_model;
    use crate::formats::gx::ComponentType;
    use crate::transaction::IoTransaction;
    use glam::Vec3;

    #[test]
    fn test_buffer_failure_stops_before_materials() {
        let mut model = Model::new("lit");
        model.materials.push(Material::new("mat"));
        let q = VertexQuantization::new(
            BufferKind::Normal,
            0,
            VertexFormat::Generic(ComponentType::S16),
            14,
        );
        let mut normals = GenericBuffer::new("nrm", q);
        normals.entries.push(Vec3::Y);
        model.normals.push(normals);

        let mut bytes = write_model(&model).unwrap();
        let header = read_header(&bytes).unwrap();
        let at = header.sections[sections::NORMALS] as u64;
        let dict = Dictionary::read_at(&bytes, at).unwrap();
        let record = dict.entries().next().unwrap().data_destination as usize;
        // S16 normals must use divisor 14
        bytes[record + 0x1C] = 6;

        let mut tx = IoTransaction::new();
        let decoded = read_model(&bytes, &mut tx).unwrap();
        assert_eq!(tx.state(), TransactionState::Failure);
        assert!(decoded.normals.is_empty());
        assert!(decoded.materials.is_empty());
        assert!(decoded.meshes.is_empty());
    }
}
