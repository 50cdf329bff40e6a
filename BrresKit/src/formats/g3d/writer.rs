//! MDL0 writer.
//!
//! The whole model is laid out in one [`Section`]: header, info block, bone
//! table, one dictionary per section, then the records. Every offset is a
//! fixup against a label and is resolved by [`Section::finish`].

use glam::Vec3;

use super::bone::{link_children, world_matrices, write_bone, bone_label};
use super::buffer::{BufferKind, GenericBuffer, VertexElement, write_buffer};
use super::bytecode::{build_render_tree, write_method};
use super::dictionary::Dictionary;
use super::material::{material_label, write_material};
use super::model::Model;
use super::polygon::{polygon_label, resolve_buffers, write_polygon};
use super::reader::{INFO_OFFSET, INFO_SIZE, MDL0_MAGIC, MDL0_VERSION, sections};
use super::section::{Section, Target};
use crate::error::{Error, Result};

const BONE_TABLE: &str = "bone_table";

fn section_label(index: usize) -> String {
    format!("sect:{index}")
}

fn buffer_label(kind: BufferKind, index: usize) -> String {
    let prefix = match kind {
        BufferKind::Position => "pos",
        BufferKind::Normal => "nrm",
        BufferKind::Color => "clr",
        BufferKind::TexCoord => "uv",
    };
    format!("{prefix}:{index}")
}

fn tree_label(index: usize) -> String {
    format!("tree:{index}")
}

/// Emit a dictionary for section `index` if it has entries.
fn write_dictionary<S: AsRef<str>>(
    section: &mut Section,
    index: usize,
    names: &[S],
    targets: Vec<Target>,
) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    section.align(4);
    section.label(section_label(index));
    Dictionary::from_names(names)?.write(section, &targets)
}

fn write_pool<T: VertexElement>(
    section: &mut Section,
    pool: &[GenericBuffer<T>],
    kind: BufferKind,
) -> Result<()> {
    for (i, buffer) in pool.iter().enumerate() {
        write_buffer(section, buffer, kind, &buffer_label(kind, i))?;
    }
    Ok(())
}

fn pool_dictionary<T>(
    section: &mut Section,
    index: usize,
    pool: &[GenericBuffer<T>],
    kind: BufferKind,
) -> Result<()> {
    let names: Vec<&str> = pool.iter().map(|b| b.name.as_str()).collect();
    let targets = (0..pool.len())
        .map(|i| Target::Label(buffer_label(kind, i)))
        .collect();
    write_dictionary(section, index, &names, targets)
}

fn validate(model: &Model) -> Result<()> {
    for bone in &model.bones {
        for call in &bone.draw_calls {
            if call.mesh as usize >= model.meshes.len() {
                return Err(Error::model(format!(
                    "bone '{}' draws missing mesh {}",
                    bone.name, call.mesh
                )));
            }
        }
    }
    Ok(())
}

/// Encode `model` as MDL0 bytes.
pub fn write_model(model: &Model) -> Result<Vec<u8>> {
    validate(model)?;
    let mut bones = model.bones.clone();
    link_children(&mut bones);
    let worlds = world_matrices(&bones)?;
    let roots: Vec<usize> = (0..bones.len()).filter(|i| bones[*i].parent < 0).collect();
    let tree = build_render_tree(&bones, &model.materials)?;
    let mesh_buffers = model
        .meshes
        .iter()
        .map(|poly| resolve_buffers(poly, model))
        .collect::<Result<Vec<_>>>()?;
    let (vertices, triangles) = model.stats();

    let mut s = Section::new();

    // Header
    s.write_bytes(MDL0_MAGIC);
    s.write_u32(0); // size, patched after finish
    s.write_u32(MDL0_VERSION);
    s.write_i32(0); // BRRES offset
    let present = [
        !tree.is_empty(),
        !bones.is_empty(),
        !model.positions.is_empty(),
        !model.normals.is_empty(),
        !model.colors.is_empty(),
        !model.texcoords.is_empty(),
        false,
        false,
        !model.materials.is_empty(),
        false,
        !model.meshes.is_empty(),
        false,
        false,
        false,
    ];
    for (i, has) in present.iter().enumerate() {
        if *has {
            s.write_label_ptr(0, section_label(i));
        } else {
            s.write_i32(0);
        }
    }
    s.write_name(0, &model.name);
    debug_assert_eq!(s.pos(), INFO_OFFSET);

    // Info block
    let info = &model.info;
    s.write_u32(INFO_SIZE);
    s.write_model_offset(INFO_OFFSET);
    s.write_u32(info.scaling_rule.to_u32());
    s.write_u32(info.texture_matrix_mode.to_u32());
    s.write_u32(vertices as u32);
    s.write_u32(triangles as u32);
    s.write_name(INFO_OFFSET, &info.source_location);
    s.write_u32(bones.len() as u32);
    s.write_u8(1); // matrix array present
    s.write_u8(0);
    s.write_u8(0);
    s.write_u8(info.envelope_matrix_mode.to_u32() as u8);
    s.write_label_ptr(INFO_OFFSET, BONE_TABLE);
    s.write_vec3(info.aabb.min);
    s.write_vec3(info.aabb.max);

    // Matrix -> bone table
    s.label(BONE_TABLE);
    s.write_u32(bones.len() as u32);
    for matrix in 0..bones.len() {
        let bone = bones
            .iter()
            .position(|b| b.matrix_id as usize == matrix)
            .map_or(-1, |i| i as i32);
        s.write_i32(bone);
    }

    // Dictionaries
    let tree_names: Vec<&str> = tree.iter().map(|m| m.name.as_str()).collect();
    write_dictionary(
        &mut s,
        sections::RENDER_TREE,
        &tree_names,
        (0..tree.len()).map(|i| Target::Label(tree_label(i))).collect(),
    )?;
    let bone_names: Vec<&str> = bones.iter().map(|b| b.name.as_str()).collect();
    write_dictionary(
        &mut s,
        sections::BONES,
        &bone_names,
        (0..bones.len()).map(|i| Target::Label(bone_label(i))).collect(),
    )?;
    pool_dictionary(&mut s, sections::POSITIONS, &model.positions, BufferKind::Position)?;
    pool_dictionary(&mut s, sections::NORMALS, &model.normals, BufferKind::Normal)?;
    pool_dictionary(&mut s, sections::COLORS, &model.colors, BufferKind::Color)?;
    pool_dictionary(&mut s, sections::TEXCOORDS, &model.texcoords, BufferKind::TexCoord)?;
    let material_names: Vec<&str> = model.materials.iter().map(|m| m.name.as_str()).collect();
    write_dictionary(
        &mut s,
        sections::MATERIALS,
        &material_names,
        (0..model.materials.len())
            .map(|i| Target::Label(material_label(i)))
            .collect(),
    )?;
    let mesh_names: Vec<&str> = model.meshes.iter().map(|m| m.name.as_str()).collect();
    write_dictionary(
        &mut s,
        sections::MESHES,
        &mesh_names,
        (0..model.meshes.len())
            .map(|i| Target::Label(polygon_label(i)))
            .collect(),
    )?;

    // Records
    for (i, method) in tree.iter().enumerate() {
        s.label(tree_label(i));
        write_method(&mut s, method)?;
    }
    s.align(4);
    for i in 0..bones.len() {
        write_bone(&mut s, &bones, i, &roots, &worlds[i]);
    }
    write_pool(&mut s, &model.positions, BufferKind::Position)?;
    write_pool(&mut s, &model.normals, BufferKind::Normal)?;
    write_pool(&mut s, &model.colors, BufferKind::Color)?;
    write_pool(&mut s, &model.texcoords, BufferKind::TexCoord)?;
    for (i, mat) in model.materials.iter().enumerate() {
        write_material(&mut s, mat, i)?;
    }
    for (i, (poly, (handles, vat))) in model.meshes.iter().zip(&mesh_buffers).enumerate() {
        write_polygon(&mut s, poly, i, handles, vat)?;
    }

    tracing::debug!(
        "Wrote MDL0 '{}': {} bones, {} materials, {} meshes",
        model.name,
        bones.len(),
        model.materials.len(),
        model.meshes.len()
    );
    let mut data = s.finish()?;
    let size = data.len() as u32;
    data[4..8].copy_from_slice(&size.to_be_bytes());
    Ok(data)
}

/// Recompute the bounding box from the position buffers when it is unset.
pub fn refresh_bounds(model: &mut Model) {
    if model.info.aabb.min == Vec3::ZERO && model.info.aabb.max == Vec3::ZERO {
        model.info.aabb = model.compute_bounds();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::g3d::bone::Bone;
    use crate::formats::g3d::read_model;
    use crate::transaction::{IoTransaction, TransactionSink, TransactionState};

    #[test]
    fn test_empty_model_round_trip() {
        let model = Model::new("empty");
        let bytes = write_model(&model).unwrap();
        assert_eq!(&bytes[..4], b"MDL0");
        assert_eq!(
            u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
            bytes.len()
        );
        let mut tx = IoTransaction::new();
        let decoded = read_model(&bytes, &mut tx).unwrap();
        assert_eq!(decoded, model);
        assert_eq!(tx.state(), TransactionState::Success);
    }

    #[test]
    fn test_bone_hierarchy_round_trip() {
        let mut model = Model::new("rig");
        let mut child = Bone::new("child");
        child.parent = 1;
        child.matrix_id = 0;
        let mut root = Bone::new("root");
        root.matrix_id = 1;
        root.translate = Vec3::new(0.0, 5.0, 0.0);
        model.bones = vec![child, root];
        link_children(&mut model.bones);

        let bytes = write_model(&model).unwrap();
        let mut tx = IoTransaction::new();
        let decoded = read_model(&bytes, &mut tx).unwrap();
        assert_eq!(decoded.bones, model.bones);
        // two bones trip the rigging advisory
        assert_eq!(tx.state(), TransactionState::FailureToSave);
    }

    #[test]
    fn test_missing_mesh_reference() {
        let mut model = Model::new("bad");
        let mut bone = Bone::new("root");
        bone.draw_calls.push(crate::formats::g3d::DrawCall {
            material: 0,
            mesh: 4,
            priority: 0,
        });
        model.bones.push(bone);
        assert!(matches!(write_model(&model), Err(Error::InvalidModel { .. })));
    }
}
