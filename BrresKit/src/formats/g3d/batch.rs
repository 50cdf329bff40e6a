//! Batch MDL0 validation
//!
//! Discovers `.mdl0` files under a directory and decodes them in parallel,
//! one independent reader per file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use super::model::Model;
use super::reader::read_model;
use crate::error::Result;
use crate::transaction::{IoMessage, IoTransaction, TransactionSink, TransactionState};

/// Summary of one decoded model
#[derive(Debug, Clone, Serialize)]
pub struct Mdl0Report {
    pub path: PathBuf,
    pub name: String,
    pub state: TransactionState,
    pub bones: usize,
    pub materials: usize,
    pub meshes: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub messages: Vec<IoMessage>,
}

impl Mdl0Report {
    #[must_use]
    pub fn new(path: &Path, model: &Model, tx: &IoTransaction) -> Self {
        let (vertices, triangles) = model.stats();
        Self {
            path: path.to_path_buf(),
            name: model.name.clone(),
            state: tx.state(),
            bones: model.bones.len(),
            materials: model.materials.len(),
            meshes: model.meshes.len(),
            vertices,
            triangles,
            messages: tx.messages().to_vec(),
        }
    }
}

/// Result of a batch validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchInspectResult {
    /// Files that decoded without a failure state
    pub success_count: usize,
    /// Files that failed outright or decoded with `Failure`
    pub fail_count: usize,
    /// Reports of every file that produced a model
    pub reports: Vec<Mdl0Report>,
    /// Messages for files that could not be read at all
    pub errors: Vec<String>,
}

/// Find all .mdl0 files in a directory recursively
///
/// # Returns
/// A sorted list of paths to .mdl0 files found in the directory tree.
pub fn find_mdl0_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mdl0"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Read and decode one file.
///
/// # Errors
/// Returns an error if the file cannot be read or the model header is fatal.
pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<(Model, IoTransaction)> {
    let data = std::fs::read(path.as_ref())?;
    let mut tx = IoTransaction::new();
    let model = read_model(&data, &mut tx)?;
    Ok((model, tx))
}

/// Decode many files in parallel
///
/// # Arguments
/// * `files` - MDL0 files to decode
/// * `progress` - Callback for progress updates (current, total, description)
pub fn batch_inspect<F>(files: &[PathBuf], progress: F) -> BatchInspectResult
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    let total = files.len();
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);

    let outcomes: Vec<std::result::Result<Mdl0Report, String>> = files
        .par_iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string_lossy().to_string());
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(current, total, &file_name);

            match inspect_file(path) {
                Ok((model, tx)) => {
                    if tx.state() == TransactionState::Failure {
                        fail_counter.fetch_add(1, Ordering::SeqCst);
                    } else {
                        success_counter.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(Mdl0Report::new(path, &model, &tx))
                }
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    Err(format!("Failed {file_name}: {e}"))
                }
            }
        })
        .collect();

    let mut result = BatchInspectResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        ..BatchInspectResult::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(report) => result.reports.push(report),
            Err(message) => result.errors.push(message),
        }
    }
    result
}
