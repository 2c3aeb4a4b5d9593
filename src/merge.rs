use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::{MergeConfig, SourceDataset, VocabularySource};
use crate::io::{
    create_progress_bar, ensure_split_dirs, list_label_files, resolve_image, write_label_file,
    write_master_manifest,
};
use crate::labels::{remap_lines, DropReason};
use crate::types::{RunReport, Warning};
use crate::vocabulary::{ClassVocabulary, MasterVocabulary, RemapTable};

/// A source dataset whose remap table has been computed and is ready to run.
struct PreparedDataset<'a> {
    source: &'a SourceDataset,
    vocabulary: Option<ClassVocabulary>,
    table: RemapTable,
}

/// Merge all configured source datasets into one master dataset.
///
/// Strictly sequential: one dataset, one split, one label file at a time.
/// Degraded inputs are warned about and skipped; only real output I/O
/// failures abort the run.
pub fn run(config: &MergeConfig) -> Result<RunReport, Box<dyn std::error::Error>> {
    let mut report = RunReport::default();

    let resolved = resolve_vocabularies(config, &mut report);
    let master = build_master(config, &resolved)?;
    if master.is_empty() {
        return Err("master vocabulary is empty; nothing to merge".into());
    }
    info!("Master vocabulary has {} classes.", master.len());

    let prepared = prepare_datasets(resolved, &master)?;

    fs::create_dir_all(&config.output_dir)?;
    for dataset in &prepared {
        info!("Processing dataset: {}", dataset.source.name);
        for split in config.layout.splits() {
            process_split(dataset, split, config, &mut report)?;
        }
    }

    let manifest_path = write_master_manifest(&config.output_dir, master.names(), &config.layout)?;
    info!("Master manifest written to {}", manifest_path.display());
    report.manifest_path = Some(manifest_path);
    Ok(report)
}

enum ResolvedVocab {
    Names(ClassVocabulary),
    Explicit(HashMap<usize, usize>),
}

fn resolve_vocabularies<'a>(
    config: &'a MergeConfig,
    report: &mut RunReport,
) -> Vec<(&'a SourceDataset, ResolvedVocab)> {
    let mut resolved = Vec::new();
    for source in &config.sources {
        match &source.vocabulary {
            VocabularySource::DataYaml(path) => match ClassVocabulary::from_data_yaml(path) {
                Ok(vocab) => {
                    info!("{}: {} classes", source.name, vocab.len());
                    resolved.push((source, ResolvedVocab::Names(vocab)));
                }
                Err(e) => report.warn(Warning::VocabularyUnavailable {
                    dataset: source.name.clone(),
                    reason: e.to_string(),
                }),
            },
            VocabularySource::Inline(names) => {
                resolved.push((source, ResolvedVocab::Names(ClassVocabulary::new(names.clone()))));
            }
            VocabularySource::ExplicitIds(mapping) => {
                resolved.push((source, ResolvedVocab::Explicit(mapping.clone())));
            }
        }
    }
    resolved
}

fn build_master(
    config: &MergeConfig,
    resolved: &[(&SourceDataset, ResolvedVocab)],
) -> Result<MasterVocabulary, Box<dyn std::error::Error>> {
    match &config.master {
        Some(names) => MasterVocabulary::new(names.clone()),
        None => {
            if resolved
                .iter()
                .any(|(_, vocab)| matches!(vocab, ResolvedVocab::Explicit(_)))
            {
                return Err(
                    "explicit id tables require an explicit master class list (--classes)".into(),
                );
            }
            let vocabularies = resolved.iter().filter_map(|(_, vocab)| match vocab {
                ResolvedVocab::Names(v) => Some(v),
                ResolvedVocab::Explicit(_) => None,
            });
            Ok(MasterVocabulary::union_of(vocabularies))
        }
    }
}

fn prepare_datasets<'a>(
    resolved: Vec<(&'a SourceDataset, ResolvedVocab)>,
    master: &MasterVocabulary,
) -> Result<Vec<PreparedDataset<'a>>, Box<dyn std::error::Error>> {
    let mut prepared = Vec::with_capacity(resolved.len());
    for (source, vocab) in resolved {
        let (vocabulary, table) = match vocab {
            ResolvedVocab::Names(v) => {
                let table = RemapTable::from_name_matching(&v, master);
                (Some(v), table)
            }
            ResolvedVocab::Explicit(mapping) => {
                if let Some((&old_id, &new_id)) =
                    mapping.iter().find(|(_, &new_id)| new_id >= master.len())
                {
                    return Err(format!(
                        "mapping for dataset '{}' sends id {} to {}, outside the {}-class master vocabulary",
                        source.name, old_id, new_id, master.len()
                    )
                    .into());
                }
                let len = mapping.keys().max().map_or(0, |max| max + 1);
                (None, RemapTable::from_explicit(&mapping, len))
            }
        };
        prepared.push(PreparedDataset {
            source,
            vocabulary,
            table,
        });
    }
    Ok(prepared)
}

fn process_split(
    dataset: &PreparedDataset<'_>,
    split: &str,
    config: &MergeConfig,
    report: &mut RunReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let source_labels = dataset.source.root.join(split).join("labels");
    let source_images = dataset.source.root.join(split).join("images");
    if !source_labels.is_dir() || !source_images.is_dir() {
        report.warn(Warning::MissingSplitDir {
            dataset: dataset.source.name.clone(),
            split: split.to_string(),
        });
        return Ok(());
    }

    let (dest_labels, dest_images) = ensure_split_dirs(&config.output_dir, split)?;
    let files = list_label_files(&source_labels);
    let pb = create_progress_bar(
        files.len() as u64,
        &format!("{}/{}", dataset.source.name, split),
    );

    for label_path in &files {
        process_label_file(
            dataset,
            label_path,
            &source_images,
            &dest_labels,
            &dest_images,
            split,
            report,
        )?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} {} complete", dataset.source.name, split));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_label_file(
    dataset: &PreparedDataset<'_>,
    label_path: &Path,
    source_images: &Path,
    dest_labels: &Path,
    dest_images: &Path,
    split: &str,
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
    let outcome = remap_lines(&content, &dataset.table);
    report_drops(&outcome.dropped, dataset, &file_name, report);

    // An example with zero surviving annotations produces no output at all.
    if outcome.is_empty() {
        return Ok(());
    }

    // Resolve the image before writing anything so a missing image drops the
    // whole example instead of leaving an orphan label file.
    let Some(image_path) = resolve_image(source_images, &stem) else {
        report.warn(Warning::MissingImage {
            dataset: dataset.source.name.clone(),
            file: file_name,
        });
        return Ok(());
    };

    // Prefix with the dataset name so identical base names from different
    // sources cannot overwrite each other.
    let new_stem = sanitize_filename::sanitize(format!("{}_{}", dataset.source.name, stem));
    write_label_file(
        &dest_labels.join(format!("{}.txt", new_stem)),
        &outcome.records,
    )?;
    let extension = image_path.extension().unwrap_or_default();
    fs::copy(
        &image_path,
        dest_images.join(&new_stem).with_extension(extension),
    )?;
    report.stats.record(&dataset.source.name, split);
    Ok(())
}

fn report_drops(
    dropped: &[DropReason],
    dataset: &PreparedDataset<'_>,
    file_name: &str,
    report: &mut RunReport,
) {
    for drop in dropped {
        match drop {
            DropReason::UnknownClass(old_id) => {
                let class_name = dataset
                    .vocabulary
                    .as_ref()
                    .and_then(|v| v.get(*old_id))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("id {}", old_id));
                report.warn(Warning::UnknownClass {
                    dataset: dataset.source.name.clone(),
                    file: file_name.to_string(),
                    class_name,
                });
            }
            DropReason::InvalidIndex(old_id) => report.warn(Warning::InvalidClassIndex {
                dataset: dataset.source.name.clone(),
                file: file_name.to_string(),
                class_id: *old_id,
            }),
            DropReason::Malformed(line) => report.warn(Warning::MalformedLine {
                dataset: dataset.source.name.clone(),
                file: file_name.to_string(),
                line: line.clone(),
            }),
            // Deliberately filtered classes are not warning-worthy.
            DropReason::Excluded(_) => {}
        }
    }
}
