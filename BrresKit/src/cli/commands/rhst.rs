//! RHST CLI commands

use std::path::Path;

use anyhow::Context;

use crate::formats::rhst::read_scene_tree;

/// Decode a scene tree and print a summary.
pub fn inspect(path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    println!("Inspecting RHST file: {}", path.display());
    println!();

    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let scene = read_scene_tree(&data)?;

    let meta = &scene.meta_data;
    println!("Generator: {} {}", meta.exporter, meta.exporter_version);
    println!("Type:      {}", meta.format);
    println!();

    println!("Bones ({}):", scene.bones.len());
    for bone in &scene.bones {
        println!("  - {} ({} draw calls)", bone.name, bone.draw_calls.len());
    }
    println!("Materials ({}):", scene.materials.len());
    for mat in &scene.materials {
        println!("  - {} (texture '{}', {})", mat.name, mat.texture_name, mat.alpha_mode.name());
    }
    println!("Meshes ({}):", scene.meshes.len());
    for mesh in &scene.meshes {
        println!(
            "  - {} ({} matrix primitives, {} facepoints)",
            mesh.name,
            mesh.matrix_primitives.len(),
            mesh.vertex_count()
        );
    }
    println!("Weight matrices: {}", scene.weights.len());

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&scene)?;
        std::fs::write(output, json)?;
        println!("Written to: {}", output.display());
    }
    Ok(())
}
