use log::info;
use std::fs;
use std::path::Path;

use crate::config::FilterConfig;
use crate::io::{
    create_progress_bar, ensure_split_dirs, list_label_files, resolve_image, write_label_file,
    write_filtered_manifest, MASTER_MANIFEST,
};
use crate::labels::{remap_lines, DropReason};
use crate::types::{RunReport, Warning};
use crate::vocabulary::{ClassVocabulary, RemapTable};

/// Prune a merged dataset down to a whitelist of class names.
///
/// Same algorithm as the merge, against an already-merged tree: the target
/// vocabulary is the whitelist-restricted subsequence of the merged
/// vocabulary, files keep their (already disambiguated) names, and the
/// manifest is the structured variant with a resolved root path.
pub fn run(config: &FilterConfig) -> Result<RunReport, Box<dyn std::error::Error>> {
    let mut report = RunReport::default();

    // The merged manifest is the vocabulary source; without it there is no
    // way to interpret class ids, so this one is fatal.
    let manifest_path = config.input_dir.join(MASTER_MANIFEST);
    let merged = ClassVocabulary::from_data_yaml(&manifest_path)?;
    info!("Loaded merged vocabulary with {} classes.", merged.len());

    let (table, kept_names) = RemapTable::from_whitelist(&merged, &config.whitelist);
    if kept_names.is_empty() {
        return Err("whitelist matches no classes in the merged vocabulary".into());
    }
    info!(
        "Keeping {} classes, discarding {}.",
        kept_names.len(),
        merged.len() - kept_names.len()
    );

    let dataset_name = config
        .input_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());

    fs::create_dir_all(&config.output_dir)?;
    for split in config.layout.splits() {
        process_split(config, split, &dataset_name, &table, &mut report)?;
    }

    let manifest_path = write_filtered_manifest(&config.output_dir, &kept_names, &config.layout)?;
    info!("Filtered manifest written to {}", manifest_path.display());
    report.manifest_path = Some(manifest_path);
    Ok(report)
}

fn process_split(
    config: &FilterConfig,
    split: &str,
    dataset_name: &str,
    table: &RemapTable,
    report: &mut RunReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let source_labels = config.input_dir.join(split).join("labels");
    let source_images = config.input_dir.join(split).join("images");
    if !source_labels.is_dir() {
        report.warn(Warning::MissingSplitDir {
            dataset: dataset_name.to_string(),
            split: split.to_string(),
        });
        return Ok(());
    }

    let (dest_labels, dest_images) = ensure_split_dirs(&config.output_dir, split)?;
    let files = list_label_files(&source_labels);
    let pb = create_progress_bar(files.len() as u64, split);

    for label_path in &files {
        process_label_file(
            label_path,
            &source_images,
            &dest_labels,
            &dest_images,
            split,
            dataset_name,
            table,
            report,
        )?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} complete", split));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_label_file(
    label_path: &Path,
    source_images: &Path,
    dest_labels: &Path,
    dest_images: &Path,
    split: &str,
    dataset_name: &str,
    table: &RemapTable,
    report: &mut RunReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = label_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = label_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let content = fs::read_to_string(label_path)?;
    let outcome = remap_lines(&content, table);
    for drop in &outcome.dropped {
        match drop {
            DropReason::InvalidIndex(class_id) => report.warn(Warning::InvalidClassIndex {
                dataset: dataset_name.to_string(),
                file: file_name.clone(),
                class_id: *class_id,
            }),
            DropReason::Malformed(line) => report.warn(Warning::MalformedLine {
                dataset: dataset_name.to_string(),
                file: file_name.clone(),
                line: line.clone(),
            }),
            // Whitelisted-out classes drop silently: that is the whole
            // point of the filter. Unknown cannot occur with a whitelist
            // table.
            DropReason::Excluded(_) | DropReason::UnknownClass(_) => {}
        }
    }

    if outcome.is_empty() {
        return Ok(());
    }

    let Some(image_path) = resolve_image(source_images, &stem) else {
        report.warn(Warning::MissingImage {
            dataset: dataset_name.to_string(),
            file: file_name,
        });
        return Ok(());
    };

    // Names are already unique from the merge, so they are kept as-is.
    write_label_file(&dest_labels.join(&file_name), &outcome.records)?;
    let extension = image_path.extension().unwrap_or_default();
    fs::copy(&image_path, dest_images.join(&stem).with_extension(extension))?;
    report.stats.record(dataset_name, split);
    Ok(())
}
