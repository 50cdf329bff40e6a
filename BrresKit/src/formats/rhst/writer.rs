//! RHST token writer.
//!
//! Produces the same layout exporters emit: every object begins with a
//! `name` entry and every entry is a single child dictionary.

use super::token::tags;
use super::{Bone, Material, MatrixPrimitive, Mesh, Primitive, SceneTree, Vertex, WeightMatrix};
use crate::error::{Error, Result};
use crate::formats::gx::VertexAttribute;

/// RHST revision written to the header.
pub const RHST_VERSION: i32 = 1;

/// Little-endian token sink.
#[derive(Debug, Clone)]
pub struct TokenWriter {
    data: Vec<u8>,
}

impl Default for TokenWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenWriter {
    /// Start a stream with the `RHST` header.
    #[must_use]
    pub fn new() -> Self {
        let mut data = b"RHST".to_vec();
        data.extend_from_slice(&RHST_VERSION.to_le_bytes());
        Self { data }
    }

    fn write_raw_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    fn write_inline_string(&mut self, s: &str) {
        self.write_raw_i32(s.len() as i32);
        self.data.extend_from_slice(s.as_bytes());
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
    }

    pub fn begin_object(&mut self, name: &str, size: u32) {
        self.write_raw_i32(tags::DICT);
        self.write_raw_i32(size as i32);
        self.write_inline_string(name);
    }

    pub fn end_object(&mut self) {
        self.write_raw_i32(tags::END_DICT);
    }

    pub fn begin_array(&mut self, size: u32, element_type: u32) {
        self.write_raw_i32(tags::ARRAY);
        self.write_raw_i32(size as i32);
        self.write_raw_i32(element_type as i32);
    }

    pub fn end_array(&mut self) {
        self.write_raw_i32(tags::END_ARRAY);
    }

    pub fn write_s32(&mut self, v: i32) {
        self.write_raw_i32(tags::S32);
        self.write_raw_i32(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_raw_i32(tags::F32);
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_raw_i32(tags::STRING);
        self.write_inline_string(s);
    }

    /// One `key: value` entry.
    pub fn entry(&mut self, key: &str, value: impl FnOnce(&mut Self)) {
        self.begin_object(key, 1);
        value(self);
        self.end_object();
    }

    pub fn write_floats(&mut self, values: &[f32]) {
        self.begin_array(values.len() as u32, 0);
        for v in values {
            self.write_f32(*v);
        }
        self.end_array();
    }

    pub fn write_ints(&mut self, values: &[i32]) {
        self.begin_array(values.len() as u32, 0);
        for v in values {
            self.write_s32(*v);
        }
        self.end_array();
    }

    /// Append the null terminator and return the stream.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.write_raw_i32(tags::NULL);
        self.data
    }
}

/// Encode a scene tree as an RHST stream.
///
/// # Errors
/// Returns [`Error::InvalidModel`] if a mesh descriptor names per-vertex
/// matrix indices, which facepoints cannot carry.
pub fn write_scene_tree(scene: &SceneTree) -> Result<Vec<u8>> {
    for mesh in &scene.meshes {
        if mesh.attributes().any(VertexAttribute::is_matrix_index) {
            return Err(Error::model(format!(
                "mesh '{}' uses per-vertex matrix indices",
                mesh.name
            )));
        }
    }

    let mut w = TokenWriter::new();
    w.begin_object("root", 2);

    let meta = &scene.meta_data;
    w.begin_object("head", 4);
    w.entry("name", |w| w.write_string("head"));
    w.entry("generator", |w| w.write_string(&meta.exporter));
    w.entry("type", |w| w.write_string(&meta.format));
    w.entry("version", |w| w.write_string(&meta.exporter_version));
    w.end_object();

    w.begin_object("body", 5);
    w.entry("name", |w| w.write_string("body"));
    w.entry("materials", |w| {
        w.begin_array(scene.materials.len() as u32, 0);
        for material in &scene.materials {
            write_material(w, material);
        }
        w.end_array();
    });
    w.entry("polygons", |w| {
        w.begin_array(scene.meshes.len() as u32, 0);
        for mesh in &scene.meshes {
            write_mesh(w, mesh);
        }
        w.end_array();
    });
    w.entry("weights", |w| {
        w.begin_array(scene.weights.len() as u32, 0);
        for matrix in &scene.weights {
            write_weight_matrix(w, matrix);
        }
        w.end_array();
    });
    w.entry("bones", |w| {
        w.begin_array(scene.bones.len() as u32, 0);
        for bone in &scene.bones {
            write_bone(w, bone);
        }
        w.end_array();
    });
    w.end_object();

    w.end_object();
    Ok(w.finish())
}

fn write_weight_matrix(w: &mut TokenWriter, matrix: &WeightMatrix) {
    w.begin_array(matrix.weights.len() as u32, 0);
    for weight in &matrix.weights {
        w.write_ints(&[weight.bone_index, weight.influence]);
    }
    w.end_array();
}

fn write_bone(w: &mut TokenWriter, bone: &Bone) {
    w.begin_object(&bone.name, 10);
    w.entry("name", |w| w.write_string(&bone.name));
    w.entry("parent", |w| w.write_s32(bone.parent));
    w.entry("child", |w| w.write_s32(bone.child));
    w.entry("scale", |w| w.write_floats(&bone.scale.to_array()));
    w.entry("rotate", |w| w.write_floats(&bone.rotate.to_array()));
    w.entry("translate", |w| w.write_floats(&bone.translate.to_array()));
    w.entry("min", |w| w.write_floats(&bone.min.to_array()));
    w.entry("max", |w| w.write_floats(&bone.max.to_array()));
    w.entry("billboard", |w| w.write_string("none"));
    w.entry("draws", |w| {
        w.begin_array(bone.draw_calls.len() as u32, 0);
        for call in &bone.draw_calls {
            w.write_ints(&[call.mat_index, call.poly_index, call.prio]);
        }
        w.end_array();
    });
    w.end_object();
}

fn write_material(w: &mut TokenWriter, material: &Material) {
    w.begin_object(&material.name, 10);
    w.entry("name", |w| w.write_string(&material.name));
    w.entry("texture", |w| w.write_string(&material.texture_name));
    w.entry("wrap_u", |w| w.write_string(material.wrap_u.name()));
    w.entry("wrap_v", |w| w.write_string(material.wrap_v.name()));
    w.entry("display_front", |w| w.write_s32(i32::from(material.show_front)));
    w.entry("display_back", |w| w.write_s32(i32::from(material.show_back)));
    w.entry("pe", |w| w.write_string(material.alpha_mode.name()));
    w.entry("lightset", |w| w.write_s32(material.lightset_index));
    w.entry("fog", |w| w.write_s32(material.fog_index));
    w.entry("preset_path_mdl0mat", |w| {
        w.write_string(&material.preset_path_mdl0mat);
    });
    w.end_object();
}

fn write_mesh(w: &mut TokenWriter, mesh: &Mesh) {
    let attributes: Vec<VertexAttribute> = mesh.attributes().collect();
    let format: Vec<i32> = VertexAttribute::all()
        .map(|attr| i32::from(mesh.has_attribute(attr)))
        .collect();

    w.begin_object(&mesh.name, 4);
    w.entry("name", |w| w.write_string(&mesh.name));
    w.entry("current_matrix", |w| w.write_s32(mesh.current_matrix));
    w.entry("facepoint_format", |w| w.write_ints(&format));
    w.entry("matrix_primitives", |w| {
        w.begin_array(mesh.matrix_primitives.len() as u32, 0);
        for (i, mp) in mesh.matrix_primitives.iter().enumerate() {
            write_matrix_primitive(w, &format!("{}_mp{i}", mesh.name), mp, &attributes);
        }
        w.end_array();
    });
    w.end_object();
}

fn write_matrix_primitive(
    w: &mut TokenWriter,
    name: &str,
    mp: &MatrixPrimitive,
    attributes: &[VertexAttribute],
) {
    w.begin_object(name, 3);
    w.entry("name", |w| w.write_string(name));
    w.entry("matrix", |w| w.write_ints(&mp.draw_matrices));
    w.entry("primitives", |w| {
        w.begin_array(mp.primitives.len() as u32, 0);
        for (i, prim) in mp.primitives.iter().enumerate() {
            write_primitive(w, &format!("{name}_p{i}"), prim, attributes);
        }
        w.end_array();
    });
    w.end_object();
}

fn write_primitive(w: &mut TokenWriter, name: &str, prim: &Primitive, attributes: &[VertexAttribute]) {
    w.begin_object(name, 3);
    w.entry("name", |w| w.write_string(name));
    w.entry("primitive_type", |w| w.write_string(prim.topology.name()));
    w.entry("facepoints", |w| {
        w.begin_array(prim.vertices.len() as u32, 0);
        for vertex in &prim.vertices {
            write_vertex(w, vertex, attributes);
        }
        w.end_array();
    });
    w.end_object();
}

fn write_vertex(w: &mut TokenWriter, vertex: &Vertex, attributes: &[VertexAttribute]) {
    w.begin_array(attributes.len() as u32, 0);
    for attr in attributes {
        let bit = *attr as usize;
        match attr {
            VertexAttribute::Position => w.write_floats(&vertex.position.to_array()),
            VertexAttribute::Normal => w.write_floats(&vertex.normal.to_array()),
            VertexAttribute::Color0 | VertexAttribute::Color1 => {
                w.write_floats(&vertex.colors[bit - VertexAttribute::Color0 as usize].to_array());
            }
            VertexAttribute::TexCoord0
            | VertexAttribute::TexCoord1
            | VertexAttribute::TexCoord2
            | VertexAttribute::TexCoord3
            | VertexAttribute::TexCoord4
            | VertexAttribute::TexCoord5
            | VertexAttribute::TexCoord6
            | VertexAttribute::TexCoord7 => {
                w.write_floats(&vertex.uvs[bit - VertexAttribute::TexCoord0 as usize].to_array());
            }
            // rejected by write_scene_tree
            _ => {}
        }
    }
    w.end_array();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::rhst::{
        AlphaMode, DrawCall, Topology, Weight, WrapMode, read_scene_tree,
    };
    use glam::{Vec2, Vec3, Vec4};
    use pretty_assertions::assert_eq;

    fn sample_scene() -> SceneTree {
        let mut scene = SceneTree::default();
        scene.meta_data.exporter = "RiiStudio Blender".to_string();
        scene.meta_data.format = "JMDL".to_string();
        scene.meta_data.exporter_version = "Beta 1".to_string();

        let mut root = Bone {
            name: "root".to_string(),
            scale: Vec3::splat(2.0),
            translate: Vec3::new(0.0, 1.0, 0.0),
            ..Bone::default()
        };
        root.draw_calls.push(DrawCall {
            mat_index: 0,
            poly_index: 0,
            prio: 3,
        });
        scene.bones.push(root);

        scene.materials.push(Material {
            name: "grass".to_string(),
            texture_name: "grass_tex".to_string(),
            wrap_u: WrapMode::Mirror,
            wrap_v: WrapMode::Clamp,
            show_back: true,
            alpha_mode: AlphaMode::Clip,
            lightset_index: 1,
            fog_index: -1,
            ..Material::default()
        });

        let vcd = (1 << VertexAttribute::Position as u32)
            | (1 << VertexAttribute::Normal as u32)
            | (1 << VertexAttribute::Color1 as u32)
            | (1 << VertexAttribute::TexCoord7 as u32);
        let vertices = (0..3)
            .map(|i| {
                let f = i as f32;
                let mut v = Vertex {
                    position: Vec3::new(f, f * 2.0, -f),
                    normal: Vec3::Y,
                    ..Vertex::default()
                };
                v.colors[1] = Vec4::new(1.0, 0.5, 0.25, 1.0);
                v.uvs[7] = Vec2::new(f * 0.5, 1.0 - f);
                v
            })
            .collect();
        scene.meshes.push(Mesh {
            name: "ground".to_string(),
            current_matrix: 0,
            vertex_descriptor: vcd,
            matrix_primitives: vec![
                MatrixPrimitive {
                    draw_matrices: vec![0],
                    primitives: vec![Primitive {
                        topology: Topology::TriangleFan,
                        vertices,
                    }],
                },
                MatrixPrimitive {
                    draw_matrices: vec![0, 1],
                    primitives: Vec::new(),
                },
            ],
        });

        scene.weights.push(WeightMatrix {
            weights: vec![Weight {
                bone_index: 0,
                influence: 100,
            }],
        });
        scene
    }

    #[test]
    fn test_scene_round_trip() {
        let scene = sample_scene();
        let data = write_scene_tree(&scene).unwrap();
        assert_eq!(&data[..4], b"RHST");
        assert_eq!(data.len() % 4, 0);
        let decoded = read_scene_tree(&data).unwrap();
        assert_eq!(decoded, scene);
        assert_eq!(decoded.meshes[0].vertex_count(), 3);
    }

    #[test]
    fn test_inline_strings_are_padded() {
        let mut w = TokenWriter::new();
        w.write_string("abcde");
        let data = w.finish();
        // header, tag, length, 8 padded bytes, null
        assert_eq!(data.len(), 8 + 4 + 4 + 8 + 4);
        assert_eq!(&data[16..21], b"abcde");
        assert_eq!(&data[21..24], &[0, 0, 0]);
    }

    #[test]
    fn test_matrix_index_descriptor_rejected() {
        let mut scene = SceneTree::default();
        scene.meshes.push(Mesh {
            name: "skinned".to_string(),
            vertex_descriptor: 1 | (1 << VertexAttribute::Position as u32),
            ..Mesh::default()
        });
        assert!(matches!(
            write_scene_tree(&scene),
            Err(Error::InvalidModel { .. })
        ));
    }
}
