//! MDL0 CLI commands
//!
//! Commands for inspecting, rebuilding and batch-validating MDL0 models.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, bail};
use indicatif::ProgressBar;

use crate::cli::progress::{DISK, GEAR, LOOKING_GLASS, bar_style, print_done, print_step};
use crate::formats::g3d::{
    Mdl0Report, Model, batch_inspect, find_mdl0_files, inspect_file, refresh_bounds, write_model,
};
use crate::transaction::{IoTransaction, MessageClass, TransactionSink, TransactionState};

fn print_messages(tx: &IoTransaction) {
    if tx.messages().is_empty() {
        return;
    }
    println!();
    println!("Diagnostics:");
    for msg in tx.messages() {
        let class = match msg.class {
            MessageClass::Error => "error",
            MessageClass::Warning => "warning",
        };
        println!("  [{class}] {}: {}", msg.path, msg.message);
    }
}

fn print_model(model: &Model) {
    let (vertices, triangles) = model.stats();
    println!("MDL0 Model: {}", model.name);
    println!("==========");
    println!("Scaling rule:  {:?}", model.info.scaling_rule);
    println!("Tex matrices:  {:?}", model.info.texture_matrix_mode);
    println!("Envelopes:     {:?}", model.info.envelope_matrix_mode);
    println!("Bounds:        {} .. {}", model.info.aabb.min, model.info.aabb.max);
    println!("Vertices:      {vertices}");
    println!("Triangles:     {triangles}");
    println!();

    println!("Bones ({}):", model.bones.len());
    for bone in &model.bones {
        println!(
            "  - {} (parent {}, {} draw calls)",
            bone.name,
            bone.parent,
            bone.draw_calls.len()
        );
    }
    println!(
        "Buffers: {} positions, {} normals, {} colors, {} texcoords",
        model.positions.len(),
        model.normals.len(),
        model.colors.len(),
        model.texcoords.len()
    );
    println!("Materials ({}):", model.materials.len());
    for mat in &model.materials {
        println!(
            "  - {} ({} TEV stages, {} samplers{})",
            mat.name,
            mat.gx.tev_stages.len(),
            mat.samplers.len(),
            if mat.xlu { ", translucent" } else { "" }
        );
    }
    println!("Meshes ({}):", model.meshes.len());
    for mesh in &model.meshes {
        let (vertices, triangles) = mesh.stats();
        println!(
            "  - {} ({} matrix primitives, {vertices} vertices, {triangles} triangles)",
            mesh.name,
            mesh.matrix_primitives.len()
        );
    }
}

/// Decode a model and display its structure.
pub fn inspect(path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    println!("Inspecting MDL0 file: {}", path.display());
    println!();

    let (model, tx) =
        inspect_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
    print_model(&model);
    print_messages(&tx);
    println!();
    println!("State: {:?}", tx.state());

    if let Some(output) = output {
        let report = Mdl0Report::new(path, &model, &tx);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(output, json)?;
        println!("Written to: {}", output.display());
    }
    Ok(())
}

/// Decode a model and encode it again.
pub fn rebuild(source: &Path, destination: &Path, force: bool) -> anyhow::Result<()> {
    let start = Instant::now();

    print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    let (mut model, tx) =
        inspect_file(source).with_context(|| format!("Failed to read {}", source.display()))?;
    print_messages(&tx);

    match tx.state() {
        TransactionState::Success => {}
        TransactionState::FailureToSave if force => {
            println!("Writing despite advisories (--force)");
        }
        TransactionState::FailureToSave => {
            bail!("{} is not safe to save; pass --force to write it anyway", source.display())
        }
        TransactionState::Failure => {
            bail!("{} did not decode completely; refusing to write", source.display())
        }
    }

    print_step(2, 3, GEAR, "Encoding model...");
    refresh_bounds(&mut model);
    let data = write_model(&model)?;

    print_step(3, 3, DISK, &format!("Writing {}...", destination.display()));
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    std::fs::write(destination, &data)?;

    println!("Wrote {} bytes", data.len());
    print_done(start.elapsed());
    Ok(())
}

/// Validate every model under `dir`.
pub fn batch(dir: &Path, quiet: bool) -> anyhow::Result<()> {
    let files = find_mdl0_files(dir);
    if files.is_empty() {
        println!("No MDL0 files found in {}", dir.display());
        return Ok(());
    }
    println!("Found {} MDL0 files", files.len());

    let result = if !quiet {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(bar_style());
        let result = batch_inspect(&files, |current, _, name| {
            pb.set_position(current as u64);
            pb.set_message(name.to_string());
        });
        pb.finish_and_clear();
        result
    } else {
        batch_inspect(&files, |_, _, _| {})
    };

    println!();
    println!("Batch validation complete:");
    println!("  Succeeded: {}", result.success_count);
    println!("  Failed: {}", result.fail_count);

    let flagged: Vec<_> = result
        .reports
        .iter()
        .filter(|r| r.state != TransactionState::Success)
        .collect();
    if !flagged.is_empty() {
        println!();
        println!("Diagnostics:");
        for report in flagged {
            println!("  {} ({:?})", report.path.display(), report.state);
            for msg in &report.messages {
                println!("    {}: {}", msg.path, msg.message);
            }
        }
    }

    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for msg in &result.errors {
            println!("  {msg}");
        }
    }

    Ok(())
}
