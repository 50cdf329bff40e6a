//! Bone records and hierarchy.

use byteorder::{BigEndian, ReadBytesExt};
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Serialize;

use super::io::{cursor_at, read_name, read_vec3};
use super::section::Section;
use crate::error::{Error, Result};

/// On-disk size of a bone record.
pub const BONE_RECORD_SIZE: u32 = 0xD0;

hw_enum! {
    /// Billboard behaviour of a bone.
    #[derive(Default)]
    pub enum Billboard {
        #[default]
        Off = 0,
        Standard = 1,
        StandardPerspective = 2,
        Rotation = 3,
        RotationPerspective = 4,
        Y = 5,
        YPerspective = 6,
    }
}

/// A (material, mesh) pair drawn at a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawCall {
    pub material: u32,
    pub mesh: u32,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    pub id: u32,
    pub matrix_id: u32,
    pub flag: u32,
    pub billboard: Billboard,
    pub billboard_parent: u32,
    /// Index of the parent bone, -1 for roots.
    pub parent: i32,
    /// Derived from `parent` by [`link_children`].
    pub children: Vec<usize>,
    pub scale: Vec3,
    /// Euler angles in degrees.
    pub rotate: Vec3,
    pub translate: Vec3,
    pub min: Vec3,
    pub max: Vec3,
    pub draw_calls: Vec<DrawCall>,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            id: 0,
            matrix_id: 0,
            flag: 0,
            billboard: Billboard::Off,
            billboard_parent: 0,
            parent: -1,
            children: Vec::new(),
            scale: Vec3::ONE,
            rotate: Vec3::ZERO,
            translate: Vec3::ZERO,
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            draw_calls: Vec::new(),
        }
    }
}

impl Bone {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Scale, then XYZ rotation, then translation.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        let r = self.rotate;
        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            r.z.to_radians(),
            r.y.to_radians(),
            r.x.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translate)
    }
}

/// Rebuild every bone's children list from the parent indices.
pub fn link_children(bones: &mut [Bone]) {
    for bone in bones.iter_mut() {
        bone.children.clear();
    }
    for i in 0..bones.len() {
        if let Ok(parent) = usize::try_from(bones[i].parent) {
            if let Some(p) = bones.get_mut(parent) {
                p.children.push(i);
            }
        }
    }
}

/// Model-space matrix of every bone. Parents may follow their children.
pub fn world_matrices(bones: &[Bone]) -> Result<Vec<Mat4>> {
    bones
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let mut world = bone.local_matrix();
            let mut cursor = bone.parent;
            let mut depth = 0;
            while cursor >= 0 {
                let parent = bones.get(cursor as usize).ok_or_else(|| Error::InvalidBone {
                    name: bone.name.clone(),
                    message: format!("parent index {cursor} out of range"),
                })?;
                depth += 1;
                if depth > bones.len() {
                    return Err(Error::InvalidBone {
                        name: bones[i].name.clone(),
                        message: "cycle in bone hierarchy".to_string(),
                    });
                }
                world = parent.local_matrix() * world;
                cursor = parent.parent;
            }
            Ok(world)
        })
        .collect()
}

/// A decoded bone plus its unresolved parent link.
#[derive(Debug, Clone)]
pub(crate) struct BoneRecord {
    pub bone: Bone,
    pub start: u64,
    /// Offset from the record to its parent, 0 for roots.
    pub parent_offset: i32,
}

pub(crate) fn read_bone(data: &[u8], start: u64) -> Result<BoneRecord> {
    let mut r = cursor_at(data, start)?;
    let _size = r.read_u32::<BigEndian>()?;
    let _model_offset = r.read_i32::<BigEndian>()?;
    let name_offset = r.read_i32::<BigEndian>()?;
    let name = read_name(data, start, name_offset)?;

    let id = r.read_u32::<BigEndian>()?;
    let matrix_id = r.read_u32::<BigEndian>()?;
    let flag = r.read_u32::<BigEndian>()?;
    let raw_billboard = r.read_u32::<BigEndian>()?;
    let billboard = Billboard::from_u32(raw_billboard).ok_or_else(|| Error::InvalidBone {
        name: name.clone(),
        message: format!("unknown billboard mode {raw_billboard}"),
    })?;
    let billboard_parent = r.read_u32::<BigEndian>()?;

    let scale = read_vec3(&mut r)?;
    let rotate = read_vec3(&mut r)?;
    let translate = read_vec3(&mut r)?;
    let min = read_vec3(&mut r)?;
    let max = read_vec3(&mut r)?;

    // Parent, child, next, previous, user data; only the parent is kept.
    let parent_offset = r.read_i32::<BigEndian>()?;
    for _ in 0..4 {
        r.read_i32::<BigEndian>()?;
    }
    // World and inverse world matrices are derived on write.
    for _ in 0..24 {
        r.read_f32::<BigEndian>()?;
    }

    Ok(BoneRecord {
        bone: Bone {
            name,
            id,
            matrix_id,
            flag,
            billboard,
            billboard_parent,
            parent: -1,
            children: Vec::new(),
            scale,
            rotate,
            translate,
            min,
            max,
            draw_calls: Vec::new(),
        },
        start,
        parent_offset,
    })
}

/// Turn parent offsets into indices.
pub(crate) fn resolve_parents(records: Vec<BoneRecord>) -> Result<Vec<Bone>> {
    let starts: Vec<u64> = records.iter().map(|r| r.start).collect();
    records
        .into_iter()
        .map(|record| {
            let mut bone = record.bone;
            if record.parent_offset != 0 {
                let target = record.start as i64 + i64::from(record.parent_offset);
                let index = starts
                    .iter()
                    .position(|s| *s as i64 == target)
                    .ok_or_else(|| Error::InvalidBone {
                        name: bone.name.clone(),
                        message: format!("parent offset {:#x} is not a bone", record.parent_offset),
                    })?;
                bone.parent = index as i32;
            }
            Ok(bone)
        })
        .collect()
}

pub(crate) fn bone_label(index: usize) -> String {
    format!("bone:{index}")
}

fn write_matrix(section: &mut Section, m: &Mat4) {
    for row in 0..3 {
        let r = m.row(row);
        section.write_f32(r.x);
        section.write_f32(r.y);
        section.write_f32(r.z);
        section.write_f32(r.w);
    }
}

/// Emit bone `index`. Siblings are taken from the parent's children list,
/// or from `roots` for top-level bones.
pub(crate) fn write_bone(
    section: &mut Section,
    bones: &[Bone],
    index: usize,
    roots: &[usize],
    world: &Mat4,
) {
    let bone = &bones[index];
    let start = section.pos();
    section.label(bone_label(index));

    section.write_u32(BONE_RECORD_SIZE);
    section.write_model_offset(start);
    section.write_name(start, &bone.name);
    section.write_u32(bone.id);
    section.write_u32(bone.matrix_id);
    section.write_u32(bone.flag);
    section.write_u32(bone.billboard.to_u32());
    section.write_u32(bone.billboard_parent);
    section.write_vec3(bone.scale);
    section.write_vec3(bone.rotate);
    section.write_vec3(bone.translate);
    section.write_vec3(bone.min);
    section.write_vec3(bone.max);

    let siblings = usize::try_from(bone.parent)
        .ok()
        .and_then(|p| bones.get(p))
        .map_or(roots, |p| p.children.as_slice());
    let slot = siblings.iter().position(|s| *s == index);
    let next = slot.and_then(|s| siblings.get(s + 1)).copied();
    let prev = slot.and_then(|s| s.checked_sub(1)).map(|s| siblings[s]);

    let link = |section: &mut Section, target: Option<usize>| match target {
        Some(t) => section.write_label_ptr(start, bone_label(t)),
        None => section.write_i32(0),
    };
    link(section, usize::try_from(bone.parent).ok());
    link(section, bone.children.first().copied());
    link(section, next);
    link(section, prev);
    section.write_i32(0); // user data

    write_matrix(section, world);
    write_matrix(section, &world.inverse());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Bone> {
        // child listed before its parent
        let mut child = Bone::new("child");
        child.parent = 1;
        child.translate = Vec3::new(0.0, 1.0, 0.0);
        let mut root = Bone::new("root");
        root.translate = Vec3::new(2.0, 0.0, 0.0);
        root.rotate = Vec3::new(0.0, 0.0, 90.0);
        vec![child, root]
    }

    #[test]
    fn test_link_children() {
        let mut bones = chain();
        link_children(&mut bones);
        assert_eq!(bones[1].children, vec![0]);
        assert!(bones[0].children.is_empty());
        link_children(&mut bones);
        assert_eq!(bones[1].children, vec![0]);
    }

    #[test]
    fn test_world_matrices_follow_parent() {
        let bones = chain();
        let worlds = world_matrices(&bones).unwrap();
        let p = worlds[0].transform_point3(Vec3::ZERO);
        // (0,1,0) rotated 90 degrees about Z is (-1,0,0), then offset by (2,0,0)
        assert!((p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut bones = chain();
        bones[1].parent = 0;
        assert!(world_matrices(&bones).is_err());
    }

    #[test]
    fn test_record_round_trip() {
        let mut bones = chain();
        link_children(&mut bones);
        let worlds = world_matrices(&bones).unwrap();
        let roots = [1];

        let mut section = Section::new();
        write_bone(&mut section, &bones, 0, &roots, &worlds[0]);
        write_bone(&mut section, &bones, 1, &roots, &worlds[1]);
        assert_eq!(section.len(), 2 * BONE_RECORD_SIZE as usize);
        let data = section.finish().unwrap();

        let records = vec![
            read_bone(&data, 0).unwrap(),
            read_bone(&data, u64::from(BONE_RECORD_SIZE)).unwrap(),
        ];
        let decoded = resolve_parents(records).unwrap();
        assert_eq!(decoded[0].name, "child");
        assert_eq!(decoded[0].parent, 1);
        assert_eq!(decoded[1].parent, -1);
        assert_eq!(decoded[1].rotate, Vec3::new(0.0, 0.0, 90.0));
    }
}
