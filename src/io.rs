use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SplitLayout;
use crate::types::{LabelRecord, IMAGE_EXTENSIONS};

/// Manifest written by the merge job.
pub const MASTER_MANIFEST: &str = "master.yaml";
/// Manifest written by the filter job.
pub const FILTERED_MANIFEST: &str = "master_new.yaml";

/// Create `<root>/<split>/labels` and `<root>/<split>/images`, returning the
/// pair. Safe to call repeatedly; a re-run overwrites in place.
pub fn ensure_split_dirs(root: &Path, split: &str) -> std::io::Result<(PathBuf, PathBuf)> {
    let labels_dir = root.join(split).join("labels");
    let images_dir = root.join(split).join("images");
    fs::create_dir_all(&labels_dir)?;
    fs::create_dir_all(&images_dir)?;
    Ok((labels_dir, images_dir))
}

/// All `*.txt` label files in a directory, sorted for deterministic order.
pub fn list_label_files(labels_dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/*.txt", labels_dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)
        .map(|entries| entries.filter_map(|entry| entry.ok()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

/// Find the image matching a label file's base name, trying extensions in
/// preference order. The first existing match wins.
pub fn resolve_image(images_dir: &Path, stem: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.exists())
}

/// Write one remapped label file: newline-joined records, no trailing newline.
pub fn write_label_file(path: &Path, records: &[LabelRecord]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(crate::labels::render_records(records).as_bytes())?;
    writer.flush()
}

/// Write the merge manifest: per-split image paths plus the full target
/// vocabulary in index order, independent of which classes were actually used.
pub fn write_master_manifest(
    output_dir: &Path,
    names: &[String],
    layout: &SplitLayout,
) -> std::io::Result<PathBuf> {
    let manifest_path = output_dir.join(MASTER_MANIFEST);
    let mut writer = BufWriter::new(File::create(&manifest_path)?);

    // Resolve to an absolute root so the manifest stays usable no matter
    // where the merge was invoked from.
    let resolved = fs::canonicalize(output_dir)?;
    let root = resolved.display();
    let mut content = format!(
        "train: {root}/train/images\nval: {root}/{val}/images\ntest: {root}/test/images\n\nnames:\n",
        root = root,
        val = layout.val_dir(),
    );
    for (id, name) in names.iter().enumerate() {
        content.push_str(&format!("  {}: {}\n", id, name));
    }
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(manifest_path)
}

#[derive(Debug, Serialize)]
struct FilteredManifest {
    path: String,
    train: String,
    val: String,
    test: String,
    names: BTreeMap<usize, String>,
}

/// Write the filter manifest: resolved root path, per-split relative
/// directories, and the kept vocabulary as an id to name mapping.
pub fn write_filtered_manifest(
    output_dir: &Path,
    names: &[String],
    layout: &SplitLayout,
) -> std::io::Result<PathBuf> {
    let resolved = fs::canonicalize(output_dir)?;
    let manifest = FilteredManifest {
        path: resolved.to_string_lossy().into_owned(),
        train: "train/images".to_string(),
        val: format!("{}/images", layout.val_dir()),
        test: "test/images".to_string(),
        names: names
            .iter()
            .enumerate()
            .map(|(id, name)| (id, name.clone()))
            .collect(),
    };
    let content = serde_yaml::to_string(&manifest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let manifest_path = output_dir.join(FILTERED_MANIFEST);
    fs::write(&manifest_path, content)?;
    Ok(manifest_path)
}

/// Progress bar for one dataset/split pass.
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
