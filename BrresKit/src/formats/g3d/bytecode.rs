//! Render tree bytecode.
//!
//! The render tree is a set of named command streams. `NodeTree` walks the
//! bone hierarchy; `DrawOpa` and `DrawXlu` list the draw calls of the opaque
//! and translucent passes.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;

use super::bone::{Bone, DrawCall};
use super::io::cursor_at;
use super::material::Material;
use super::section::Section;
use crate::error::{Error, Result};

pub const NODE_TREE: &str = "NodeTree";
pub const DRAW_OPA: &str = "DrawOpa";
pub const DRAW_XLU: &str = "DrawXlu";

mod op {
    pub const NO_OP: u8 = 0x00;
    pub const RETURN: u8 = 0x01;
    pub const NODE_DESCENDENCE: u8 = 0x02;
    pub const NODE_MIX: u8 = 0x03;
    pub const DRAW: u8 = 0x04;
    pub const ENVELOPE_MATRIX: u8 = 0x05;
    pub const MATRIX_DUPLICATE: u8 = 0x06;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderCommand {
    NoOp,
    /// Bone `bone` inherits from draw matrix `parent_matrix`.
    NodeDescendence { bone: u16, parent_matrix: u16 },
    /// Matrix `matrix` is a weighted blend of other matrices.
    NodeMix {
        matrix: u16,
        blends: Vec<(u16, f32)>,
    },
    Draw {
        material: u16,
        mesh: u16,
        bone: u16,
        priority: u8,
    },
    EnvelopeMatrix { matrix: u16, bone: u16 },
    MatrixDuplicate { to: u16, from: u16 },
}

/// A named command stream. The terminating `Return` is implied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByteCodeMethod {
    pub name: String,
    pub commands: Vec<RenderCommand>,
}

fn malformed(name: &str, message: impl Into<String>) -> Error {
    Error::InvalidRenderTree {
        name: name.to_string(),
        message: message.into(),
    }
}

fn read_command(r: &mut Cursor<&[u8]>, opcode: u8, name: &str) -> Result<RenderCommand> {
    Ok(match opcode {
        op::NO_OP => RenderCommand::NoOp,
        op::NODE_DESCENDENCE => RenderCommand::NodeDescendence {
            bone: r.read_u16::<BigEndian>()?,
            parent_matrix: r.read_u16::<BigEndian>()?,
        },
        op::NODE_MIX => {
            let matrix = r.read_u16::<BigEndian>()?;
            let count = r.read_u8()?;
            let blends = (0..count)
                .map(|_| Ok((r.read_u16::<BigEndian>()?, r.read_f32::<BigEndian>()?)))
                .collect::<Result<Vec<_>>>()?;
            RenderCommand::NodeMix { matrix, blends }
        }
        op::DRAW => RenderCommand::Draw {
            material: r.read_u16::<BigEndian>()?,
            mesh: r.read_u16::<BigEndian>()?,
            bone: r.read_u16::<BigEndian>()?,
            priority: r.read_u8()?,
        },
        op::ENVELOPE_MATRIX => RenderCommand::EnvelopeMatrix {
            matrix: r.read_u16::<BigEndian>()?,
            bone: r.read_u16::<BigEndian>()?,
        },
        op::MATRIX_DUPLICATE => RenderCommand::MatrixDuplicate {
            to: r.read_u16::<BigEndian>()?,
            from: r.read_u16::<BigEndian>()?,
        },
        other => return Err(malformed(name, format!("unknown opcode {other:#04x}"))),
    })
}

/// Decode the stream at `start` up to its `Return`.
pub fn read_method(data: &[u8], start: u64, name: &str) -> Result<ByteCodeMethod> {
    let mut r = cursor_at(data, start)?;
    let mut commands = Vec::new();
    loop {
        let opcode = r
            .read_u8()
            .map_err(|_| malformed(name, "stream ends without Return"))?;
        if opcode == op::RETURN {
            break;
        }
        let cmd = read_command(&mut r, opcode, name)
            .map_err(|e| match e {
                Error::Io(_) => malformed(name, format!("truncated command {opcode:#04x}")),
                other => other,
            })?;
        commands.push(cmd);
    }
    Ok(ByteCodeMethod {
        name: name.to_string(),
        commands,
    })
}

/// Emit `method` followed by `Return`.
pub fn write_method(section: &mut Section, method: &ByteCodeMethod) -> Result<()> {
    for cmd in &method.commands {
        match cmd {
            RenderCommand::NoOp => section.write_u8(op::NO_OP),
            RenderCommand::NodeDescendence {
                bone,
                parent_matrix,
            } => {
                section.write_u8(op::NODE_DESCENDENCE);
                section.write_u16(*bone);
                section.write_u16(*parent_matrix);
            }
            RenderCommand::NodeMix { matrix, blends } => {
                let count = u8::try_from(blends.len()).map_err(|_| {
                    malformed(&method.name, format!("{} blends in one NodeMix", blends.len()))
                })?;
                section.write_u8(op::NODE_MIX);
                section.write_u16(*matrix);
                section.write_u8(count);
                for (m, weight) in blends {
                    section.write_u16(*m);
                    section.write_f32(*weight);
                }
            }
            RenderCommand::Draw {
                material,
                mesh,
                bone,
                priority,
            } => {
                section.write_u8(op::DRAW);
                section.write_u16(*material);
                section.write_u16(*mesh);
                section.write_u16(*bone);
                section.write_u8(*priority);
            }
            RenderCommand::EnvelopeMatrix { matrix, bone } => {
                section.write_u8(op::ENVELOPE_MATRIX);
                section.write_u16(*matrix);
                section.write_u16(*bone);
            }
            RenderCommand::MatrixDuplicate { to, from } => {
                section.write_u8(op::MATRIX_DUPLICATE);
                section.write_u16(*to);
                section.write_u16(*from);
            }
        }
    }
    section.write_u8(op::RETURN);
    Ok(())
}

fn index16(what: &str, value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| malformed(what, format!("index {value} exceeds u16")))
}

/// The render tree describing `bones`: the hierarchy plus both draw passes.
/// Empty passes are omitted.
pub fn build_render_tree(bones: &[Bone], materials: &[Material]) -> Result<Vec<ByteCodeMethod>> {
    let mut tree = Vec::with_capacity(bones.len());
    for (i, bone) in bones.iter().enumerate() {
        let parent_matrix = usize::try_from(bone.parent)
            .ok()
            .and_then(|p| bones.get(p))
            .map_or(0, |p| p.matrix_id);
        tree.push(RenderCommand::NodeDescendence {
            bone: index16(NODE_TREE, i)?,
            parent_matrix: index16(NODE_TREE, parent_matrix as usize)?,
        });
    }

    let mut opa = Vec::new();
    let mut xlu = Vec::new();
    for (i, bone) in bones.iter().enumerate() {
        for call in &bone.draw_calls {
            let material = materials.get(call.material as usize).ok_or_else(|| {
                malformed(
                    DRAW_OPA,
                    format!("bone '{}' draws missing material {}", bone.name, call.material),
                )
            })?;
            let cmd = RenderCommand::Draw {
                material: index16(DRAW_OPA, call.material as usize)?,
                mesh: index16(DRAW_OPA, call.mesh as usize)?,
                bone: index16(DRAW_OPA, i)?,
                priority: call.priority,
            };
            if material.xlu {
                xlu.push(cmd);
            } else {
                opa.push(cmd);
            }
        }
    }

    let mut methods = Vec::with_capacity(3);
    if !tree.is_empty() {
        methods.push(ByteCodeMethod {
            name: NODE_TREE.to_string(),
            commands: tree,
        });
    }
    for (name, commands) in [(DRAW_OPA, opa), (DRAW_XLU, xlu)] {
        if !commands.is_empty() {
            methods.push(ByteCodeMethod {
                name: name.to_string(),
                commands,
            });
        }
    }
    Ok(methods)
}

/// Attach the draws of the draw passes to their bones, opaque pass first.
pub fn apply_draw_calls(bones: &mut [Bone], methods: &[ByteCodeMethod]) -> Result<()> {
    for pass in [DRAW_OPA, DRAW_XLU] {
        let Some(method) = methods.iter().find(|m| m.name == pass) else {
            continue;
        };
        for cmd in &method.commands {
            let RenderCommand::Draw {
                material,
                mesh,
                bone,
                priority,
            } = cmd
            else {
                continue;
            };
            let count = bones.len();
            let target = bones.get_mut(usize::from(*bone)).ok_or_else(|| {
                malformed(pass, format!("draw references bone {bone} of {count}"))
            })?;
            target.draw_calls.push(DrawCall {
                material: u32::from(*material),
                mesh: u32::from(*mesh),
                priority: *priority,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_round_trip() {
        let method = ByteCodeMethod {
            name: "Custom".to_string(),
            commands: vec![
                RenderCommand::NoOp,
                RenderCommand::NodeDescendence {
                    bone: 1,
                    parent_matrix: 0,
                },
                RenderCommand::NodeMix {
                    matrix: 4,
                    blends: vec![(0, 0.25), (1, 0.75)],
                },
                RenderCommand::Draw {
                    material: 2,
                    mesh: 3,
                    bone: 1,
                    priority: 7,
                },
                RenderCommand::EnvelopeMatrix { matrix: 5, bone: 1 },
                RenderCommand::MatrixDuplicate { to: 6, from: 5 },
            ],
        };
        let mut section = Section::new();
        write_method(&mut section, &method).unwrap();
        let data = section.finish().unwrap();
        assert_eq!(read_method(&data, 0, "Custom").unwrap(), method);
    }

    #[test]
    fn test_missing_return_and_unknown_opcode() {
        assert!(matches!(
            read_method(&[0x00, 0x00], 0, "x"),
            Err(Error::InvalidRenderTree { .. })
        ));
        assert!(matches!(
            read_method(&[0x09, 0x01], 0, "x"),
            Err(Error::InvalidRenderTree { .. })
        ));
        assert!(matches!(
            read_method(&[0x02, 0x00], 0, "x"),
            Err(Error::InvalidRenderTree { .. })
        ));
    }

    #[test]
    fn test_draw_calls_split_by_pass() {
        let mut bones = vec![Bone::new("root")];
        bones[0].draw_calls = vec![
            DrawCall {
                material: 1,
                mesh: 0,
                priority: 0,
            },
            DrawCall {
                material: 0,
                mesh: 1,
                priority: 2,
            },
        ];
        let mut xlu = Material::new("glass");
        xlu.xlu = true;
        let materials = vec![Material::new("opaque"), xlu];

        let methods = build_render_tree(&bones, &materials).unwrap();
        let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, [NODE_TREE, DRAW_OPA, DRAW_XLU]);

        let mut decoded = vec![Bone::new("root")];
        apply_draw_calls(&mut decoded, &methods).unwrap();
        // opaque pass first
        assert_eq!(decoded[0].draw_calls[0].material, 0);
        assert_eq!(decoded[0].draw_calls[1].material, 1);
    }

    #[test]
    fn test_draw_to_missing_bone() {
        let methods = vec![ByteCodeMethod {
            name: DRAW_OPA.to_string(),
            commands: vec![RenderCommand::Draw {
                material: 0,
                mesh: 0,
                bone: 3,
                priority: 0,
            }],
        }];
        assert!(apply_draw_calls(&mut [Bone::new("a")], &methods).is_err());
    }
}
