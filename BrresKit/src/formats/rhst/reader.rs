//! RHST scene tree reader.
//!
//! The stream is a tree of dictionaries and arrays. Every object is a
//! dictionary whose children are single key dictionaries:
//! `dict-begin(key) value dict-end`. Any token that does not fit the scene
//! grammar aborts the read.

use glam::{Vec2, Vec3, Vec4};

use super::token::{Token, TokenReader};
use super::{
    AlphaMode, Bone, DrawCall, FACEPOINT_FORMAT_LEN, Material, MatrixPrimitive, Mesh, Primitive,
    SceneTree, Topology, Vertex, Weight, WeightMatrix, WrapMode,
};
use crate::error::{Error, Result};
use crate::formats::gx::VertexAttribute;

/// Decode a complete scene tree.
///
/// # Errors
/// Returns [`Error::RhstGrammar`] at the first token that does not match
/// the scene grammar. No partial tree is returned.
pub fn read_scene_tree(data: &[u8]) -> Result<SceneTree> {
    let mut reader = SceneTreeReader {
        tokens: TokenReader::new(data)?,
        tree: SceneTree::default(),
    };
    reader.read_root()?;
    tracing::debug!(
        "Read RHST scene: {} bones, {} materials, {} meshes, {} weight matrices",
        reader.tree.bones.len(),
        reader.tree.materials.len(),
        reader.tree.meshes.len(),
        reader.tree.weights.len()
    );
    Ok(reader.tree)
}

struct SceneTreeReader<'a> {
    tokens: TokenReader<'a>,
    tree: SceneTree,
}

impl SceneTreeReader<'_> {
    fn fail<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(self.tokens.error(message))
    }

    fn unexpected<T>(&self, wanted: &str, found: &Token) -> Result<T> {
        self.fail(format!("expected {wanted}, found {}", found.kind()))
    }

    // ==================== Structure ====================

    fn expect_dict(&mut self) -> Result<(String, u32)> {
        match self.tokens.next_token()? {
            Token::DictBegin { name, size } => Ok((name, size)),
            other => self.unexpected("a dictionary", &other),
        }
    }

    fn expect_dict_end(&mut self) -> Result<()> {
        match self.tokens.next_token()? {
            Token::DictEnd => Ok(()),
            other => self.unexpected("a dictionary terminator", &other),
        }
    }

    fn expect_array(&mut self) -> Result<u32> {
        match self.tokens.next_token()? {
            Token::ArrayBegin { size } => Ok(size),
            other => self.unexpected("an array", &other),
        }
    }

    fn expect_array_end(&mut self) -> Result<()> {
        match self.tokens.next_token()? {
            Token::ArrayEnd => Ok(()),
            other => self.unexpected("an array terminator", &other),
        }
    }

    /// Run `f` once per array element.
    fn array<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, u32) -> Result<()>,
    {
        let size = self.expect_array()?;
        for i in 0..size {
            f(self, i)?;
        }
        self.expect_array_end()
    }

    /// `count` key/value entries followed by the terminator of the
    /// enclosing dictionary.
    fn entries<F>(&mut self, count: u32, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &str) -> Result<()>,
    {
        for _ in 0..count {
            let (key, _) = self.expect_dict()?;
            f(self, &key)?;
            self.expect_dict_end()?;
        }
        self.expect_dict_end()
    }

    fn object<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &str) -> Result<()>,
    {
        let (_, count) = self.expect_dict()?;
        self.entries(count, f)
    }

    /// Discard one value, including any nested children.
    fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.tokens.next_token()? {
                Token::DictBegin { .. } | Token::ArrayBegin { .. } => depth += 1,
                Token::DictEnd | Token::ArrayEnd => {
                    if depth == 0 {
                        return self.fail("unbalanced terminator");
                    }
                    depth -= 1;
                }
                Token::Null => return self.fail("unexpected end of scene"),
                Token::String(_) | Token::S32(_) | Token::F32(_) => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    // ==================== Values ====================

    fn string(&mut self) -> Result<String> {
        match self.tokens.next_token()? {
            Token::String(s) => Ok(s),
            other => self.unexpected("a string", &other),
        }
    }

    fn int(&mut self) -> Result<i32> {
        match self.tokens.next_token()? {
            Token::S32(v) => Ok(v),
            other => self.unexpected("an s32", &other),
        }
    }

    fn number(&mut self) -> Result<f32> {
        match self.tokens.next_token()? {
            Token::F32(v) => Ok(v),
            Token::S32(v) => Ok(v as f32),
            other => self.unexpected("a number", &other),
        }
    }

    fn numbers<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0; N];
        self.array(|r, i| {
            let Some(slot) = out.get_mut(i as usize) else {
                return r.fail(format!("expected {N} components"));
            };
            *slot = r.number()?;
            Ok(())
        })?;
        Ok(out)
    }

    fn vec2(&mut self) -> Result<Vec2> {
        self.numbers::<2>().map(Vec2::from_array)
    }

    fn vec3(&mut self) -> Result<Vec3> {
        self.numbers::<3>().map(Vec3::from_array)
    }

    fn vec4(&mut self) -> Result<Vec4> {
        self.numbers::<4>().map(Vec4::from_array)
    }

    fn int_array(&mut self) -> Result<Vec<i32>> {
        let mut out = Vec::new();
        self.array(|r, _| {
            out.push(r.int()?);
            Ok(())
        })?;
        Ok(out)
    }

    fn int_tuple<const N: usize>(&mut self) -> Result<[i32; N]> {
        let values = self.int_array()?;
        match <[i32; N]>::try_from(values) {
            Ok(tuple) => Ok(tuple),
            Err(values) => self.fail(format!("expected {N} integers, found {}", values.len())),
        }
    }

    // ==================== Scene ====================

    fn read_root(&mut self) -> Result<()> {
        let (_, count) = self.expect_dict()?;
        for _ in 0..count {
            let (domain, entries) = self.expect_dict()?;
            match domain.as_str() {
                "head" => self.entries(entries, Self::read_meta_entry)?,
                "body" => self.entries(entries, Self::read_body_entry)?,
                other => return self.fail(format!("unknown domain '{other}'")),
            }
        }
        self.expect_dict_end()
    }

    fn read_meta_entry(&mut self, key: &str) -> Result<()> {
        let value = self.string()?;
        match key {
            "generator" => self.tree.meta_data.exporter = value,
            "type" => self.tree.meta_data.format = value,
            "version" => self.tree.meta_data.exporter_version = value,
            "name" => {}
            other => return self.fail(format!("unsupported metadata trait '{other}'")),
        }
        Ok(())
    }

    fn read_body_entry(&mut self, key: &str) -> Result<()> {
        match key {
            "name" => self.string().map(drop),
            "bones" => self.array(|r, _| r.read_bone()),
            "polygons" => self.array(|r, _| r.read_mesh()),
            "materials" => self.array(|r, _| r.read_material()),
            "weights" => self.array(|r, _| r.read_weight_matrix()),
            other => self.fail(format!("unknown section '{other}'")),
        }
    }

    fn read_weight_matrix(&mut self) -> Result<()> {
        let mut matrix = WeightMatrix::default();
        self.array(|r, _| {
            let [bone_index, influence] = r.int_tuple::<2>()?;
            matrix.weights.push(Weight {
                bone_index,
                influence,
            });
            Ok(())
        })?;
        self.tree.weights.push(matrix);
        Ok(())
    }

    fn read_bone(&mut self) -> Result<()> {
        let mut bone = Bone::default();
        self.object(|r, key| {
            match key {
                "name" => bone.name = r.string()?,
                "billboard" => r.skip_value()?,
                "parent" => bone.parent = r.int()?,
                "child" => bone.child = r.int()?,
                "scale" => bone.scale = r.vec3()?,
                "rotate" => bone.rotate = r.vec3()?,
                "translate" => bone.translate = r.vec3()?,
                "min" => bone.min = r.vec3()?,
                "max" => bone.max = r.vec3()?,
                "draws" => r.array(|r, _| {
                    let [mat_index, poly_index, prio] = r.int_tuple::<3>()?;
                    bone.draw_calls.push(DrawCall {
                        mat_index,
                        poly_index,
                        prio,
                    });
                    Ok(())
                })?,
                other => return r.fail(format!("unexpected bone key '{other}'")),
            }
            Ok(())
        })?;
        self.tree.bones.push(bone);
        Ok(())
    }

    fn wrap_mode(&mut self) -> Result<WrapMode> {
        let name = self.string()?;
        match WrapMode::from_name(&name) {
            Some(mode) => Ok(mode),
            None => self.fail(format!("invalid wrap mode '{name}'")),
        }
    }

    fn read_material(&mut self) -> Result<()> {
        let mut material = Material::default();
        self.object(|r, key| {
            match key {
                "name" => material.name = r.string()?,
                "texture" => material.texture_name = r.string()?,
                "wrap_u" => material.wrap_u = r.wrap_mode()?,
                "wrap_v" => material.wrap_v = r.wrap_mode()?,
                "display_front" => material.show_front = r.int()? != 0,
                "display_back" => material.show_back = r.int()? != 0,
                "pe" => {
                    let name = r.string()?;
                    material.alpha_mode = match AlphaMode::from_name(&name) {
                        Some(mode) => mode,
                        None => return r.fail(format!("invalid alpha mode '{name}'")),
                    };
                }
                "lightset" => material.lightset_index = r.int()?,
                "fog" => material.fog_index = r.int()?,
                "preset_path_mdl0mat" => material.preset_path_mdl0mat = r.string()?,
                other => return r.fail(format!("unexpected material key '{other}'")),
            }
            Ok(())
        })?;
        self.tree.materials.push(material);
        Ok(())
    }

    fn read_mesh(&mut self) -> Result<()> {
        let mut mesh = Mesh::default();
        self.object(|r, key| {
            match key {
                "name" => mesh.name = r.string()?,
                "primitive_type" => r.skip_value()?,
                "current_matrix" => mesh.current_matrix = r.int()?,
                "facepoint_format" => {
                    let format = r.int_tuple::<FACEPOINT_FORMAT_LEN>()?;
                    mesh.vertex_descriptor = format
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v != 0)
                        .fold(0, |vcd, (bit, _)| vcd | (1u32 << bit));
                }
                "matrix_primitives" => {
                    let vcd = mesh.vertex_descriptor;
                    r.array(|r, _| {
                        let mp = r.read_matrix_primitive(vcd)?;
                        mesh.matrix_primitives.push(mp);
                        Ok(())
                    })?;
                }
                other => return r.fail(format!("unexpected mesh key '{other}'")),
            }
            Ok(())
        })?;
        self.tree.meshes.push(mesh);
        Ok(())
    }

    fn read_matrix_primitive(&mut self, vcd: u32) -> Result<MatrixPrimitive> {
        let mut mp = MatrixPrimitive::default();
        self.object(|r, key| {
            match key {
                "name" => drop(r.string()?),
                "matrix" => mp.draw_matrices = r.int_array()?,
                "primitives" => r.array(|r, _| {
                    let prim = r.read_primitive(vcd)?;
                    mp.primitives.push(prim);
                    Ok(())
                })?,
                other => return r.fail(format!("unexpected matrix primitive key '{other}'")),
            }
            Ok(())
        })?;
        Ok(mp)
    }

    fn read_primitive(&mut self, vcd: u32) -> Result<Primitive> {
        let mut prim = Primitive::default();
        self.object(|r, key| {
            match key {
                "name" => drop(r.string()?),
                "primitive_type" => {
                    let name = r.string()?;
                    prim.topology = match Topology::from_name(&name) {
                        Some(topology) => topology,
                        None => return r.fail(format!("invalid topology type '{name}'")),
                    };
                }
                "facepoints" => r.array(|r, _| {
                    let vertex = r.read_vertex(vcd)?;
                    prim.vertices.push(vertex);
                    Ok(())
                })?,
                other => return r.fail(format!("unexpected primitive key '{other}'")),
            }
            Ok(())
        })?;
        Ok(prim)
    }

    /// The n-th element of a facepoint belongs to the n-th set descriptor
    /// bit, counting from the LSB.
    fn read_vertex(&mut self, vcd: u32) -> Result<Vertex> {
        let mut vertex = Vertex::default();
        let mut cursor = 0usize;
        self.array(|r, _| {
            while cursor < FACEPOINT_FORMAT_LEN && vcd & (1u32 << cursor) == 0 {
                cursor += 1;
            }
            if cursor >= FACEPOINT_FORMAT_LEN {
                return r.fail("missing vertex data");
            }
            let bit = cursor;
            cursor += 1;

            let Some(attr) = VertexAttribute::from_u32(bit as u32) else {
                return r.fail(format!("unexpected vertex attribute {bit}"));
            };
            match attr {
                VertexAttribute::Position => vertex.position = r.vec3()?,
                VertexAttribute::Normal => vertex.normal = r.vec3()?,
                VertexAttribute::Color0 | VertexAttribute::Color1 => {
                    vertex.colors[bit - VertexAttribute::Color0 as usize] = r.vec4()?;
                }
                VertexAttribute::TexCoord0
                | VertexAttribute::TexCoord1
                | VertexAttribute::TexCoord2
                | VertexAttribute::TexCoord3
                | VertexAttribute::TexCoord4
                | VertexAttribute::TexCoord5
                | VertexAttribute::TexCoord6
                | VertexAttribute::TexCoord7 => {
                    vertex.uvs[bit - VertexAttribute::TexCoord0 as usize] = r.vec2()?;
                }
                _ => return r.fail(format!("unsupported vertex attribute {attr:?}")),
            }
            Ok(())
        })?;
        Ok(vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::rhst::writer::TokenWriter;

    fn header(w: &mut TokenWriter, entries: &[(&str, &str)]) {
        w.begin_object("head", entries.len() as u32);
        for (key, value) in entries {
            w.begin_object(key, 1);
            w.write_string(value);
            w.end_object();
        }
        w.end_object();
    }

    fn mesh_stream(vcd_bits: &[usize], facepoint: impl Fn(&mut TokenWriter)) -> Vec<u8> {
        let mut w = TokenWriter::new();
        w.begin_object("root", 2);
        header(&mut w, &[("name", "head"), ("generator", "test")]);
        w.begin_object("body", 1);
        w.begin_object("polygons", 1);
        w.begin_array(1, 0);
        w.begin_object("mesh", 2);
        w.begin_object("facepoint_format", 1);
        w.begin_array(FACEPOINT_FORMAT_LEN as u32, 0);
        for bit in 0..FACEPOINT_FORMAT_LEN {
            w.write_s32(i32::from(vcd_bits.contains(&bit)));
        }
        w.end_array();
        w.end_object();
        w.begin_object("matrix_primitives", 1);
        w.begin_array(1, 0);
        w.begin_object("mp", 1);
        w.begin_object("primitives", 1);
        w.begin_array(1, 0);
        w.begin_object("prim", 2);
        w.begin_object("primitive_type", 1);
        w.write_string("triangles");
        w.end_object();
        w.begin_object("facepoints", 1);
        w.begin_array(1, 0);
        facepoint(&mut w);
        w.end_array();
        w.end_object();
        w.end_object(); // prim
        w.end_array();
        w.end_object();
        w.end_object(); // mp
        w.end_array();
        w.end_object();
        w.end_object(); // mesh
        w.end_array();
        w.end_object();
        w.end_object(); // body
        w.end_object(); // root
        w.finish()
    }

    fn write_vec(w: &mut TokenWriter, values: &[f32]) {
        w.begin_array(values.len() as u32, 0);
        for v in values {
            w.write_f32(*v);
        }
        w.end_array();
    }

    #[test]
    fn test_vertex_cursor_follows_descriptor_bits() {
        let data = mesh_stream(&[9, 11, 15], |w| {
            w.begin_array(3, 0);
            write_vec(w, &[1.0, 2.0, 3.0]);
            write_vec(w, &[0.25, 0.5, 0.75, 1.0]);
            w.begin_array(2, 0);
            w.write_s32(4);
            w.write_f32(0.5);
            w.end_array();
            w.end_array();
        });
        let scene = read_scene_tree(&data).unwrap();
        assert_eq!(scene.meta_data.exporter, "test");
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertex_descriptor, (1 << 9) | (1 << 11) | (1 << 15));
        let vertex = &mesh.matrix_primitives[0].primitives[0].vertices[0];
        assert_eq!(vertex.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vertex.colors[0], Vec4::new(0.25, 0.5, 0.75, 1.0));
        assert_eq!(vertex.uvs[2], Vec2::new(4.0, 0.5));
        assert_eq!(vertex.normal, Vec3::ZERO);
    }

    #[test]
    fn test_extra_facepoint_element_fails() {
        let data = mesh_stream(&[9], |w| {
            w.begin_array(2, 0);
            write_vec(w, &[1.0, 2.0, 3.0]);
            write_vec(w, &[1.0, 2.0, 3.0]);
            w.end_array();
        });
        let err = read_scene_tree(&data).unwrap_err();
        assert!(matches!(err, Error::RhstGrammar { ref message, .. } if message == "missing vertex data"));
    }

    #[test]
    fn test_matrix_index_attribute_fails() {
        let data = mesh_stream(&[0, 9], |w| {
            w.begin_array(1, 0);
            w.write_s32(0);
            w.end_array();
        });
        assert!(matches!(
            read_scene_tree(&data),
            Err(Error::RhstGrammar { .. })
        ));
    }

    #[test]
    fn test_unknown_metadata_fails() {
        let mut w = TokenWriter::new();
        w.begin_object("root", 1);
        header(&mut w, &[("author", "someone")]);
        w.end_object();
        let data = w.finish();
        assert!(matches!(
            read_scene_tree(&data),
            Err(Error::RhstGrammar { .. })
        ));
    }

    #[test]
    fn test_header_only() {
        assert!(read_scene_tree(b"RHST").is_err());
    }
}
