use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line interface for merging and filtering YOLO datasets.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge several YOLO datasets into one master dataset
    Merge(MergeArgs),
    /// Filter a merged dataset down to a whitelist of classes
    Filter(FilterArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct MergeArgs {
    /// Parent directory containing one sub-directory per source dataset
    #[arg(short = 'd', long = "datasets_dir")]
    pub datasets_dir: PathBuf,

    /// Destination directory for the merged dataset
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// File listing the master class names, one per line. When omitted the
    /// master vocabulary is the union of the source vocabularies.
    #[arg(long = "classes")]
    pub classes: Option<PathBuf>,

    /// Directory name used for the validation split
    #[arg(long = "val_split", value_enum, default_value = "valid")]
    pub val_split: ValSplit,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Root of the merged dataset (must contain master.yaml)
    #[arg(short = 'i', long = "input_dir")]
    pub input_dir: PathBuf,

    /// Destination directory for the filtered dataset
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// File listing the class names to keep, one per line
    #[arg(short = 'k', long = "keep")]
    pub keep: PathBuf,

    /// Directory name used for the validation split
    #[arg(long = "val_split", value_enum, default_value = "valid")]
    pub val_split: ValSplit,
}

/// Spelling of the validation split directory.
///
/// Both spellings occur across exported datasets, so this is explicit
/// configuration rather than a guess.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ValSplit {
    Val,
    Valid,
}

impl ValSplit {
    pub fn dir_name(self) -> &'static str {
        match self {
            ValSplit::Val => "val",
            ValSplit::Valid => "valid",
        }
    }
}

/// The split directories a run visits, in processing order.
#[derive(Copy, Clone, Debug)]
pub struct SplitLayout {
    pub val_split: ValSplit,
}

impl SplitLayout {
    pub fn new(val_split: ValSplit) -> Self {
        Self { val_split }
    }

    pub fn splits(&self) -> [&'static str; 3] {
        ["train", self.val_split.dir_name(), "test"]
    }

    pub fn val_dir(&self) -> &'static str {
        self.val_split.dir_name()
    }
}

impl Default for SplitLayout {
    fn default() -> Self {
        Self::new(ValSplit::Valid)
    }
}

/// Where a source dataset's class ids get their meaning from.
#[derive(Debug, Clone)]
pub enum VocabularySource {
    /// A YOLO `data.yaml` sidecar manifest with a `names` list or mapping.
    DataYaml(PathBuf),
    /// A hard-coded ordered class list.
    Inline(Vec<String>),
    /// An explicit old-id to new-id table straight into the master id space.
    /// Contributes no names, so it requires an explicit master list.
    ExplicitIds(HashMap<usize, usize>),
}

/// One source dataset to merge.
#[derive(Debug, Clone)]
pub struct SourceDataset {
    /// Identifier used for warning context and output filename prefixes.
    pub name: String,
    pub root: PathBuf,
    pub vocabulary: VocabularySource,
}

/// Full configuration for a merge run, independent of the CLI.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub sources: Vec<SourceDataset>,
    pub output_dir: PathBuf,
    /// Explicit master class list; `None` derives the union of source names.
    pub master: Option<Vec<String>>,
    pub layout: SplitLayout,
}

/// Full configuration for a filter run, independent of the CLI.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub whitelist: Vec<String>,
    pub layout: SplitLayout,
}

impl MergeArgs {
    pub fn into_config(self) -> Result<MergeConfig, Box<dyn std::error::Error>> {
        let sources = discover_sources(&self.datasets_dir)?;
        let master = self.classes.as_deref().map(read_class_list).transpose()?;
        Ok(MergeConfig {
            sources,
            output_dir: self.output_dir,
            master,
            layout: SplitLayout::new(self.val_split),
        })
    }
}

impl FilterArgs {
    pub fn into_config(self) -> Result<FilterConfig, Box<dyn std::error::Error>> {
        let whitelist = read_class_list(&self.keep)?;
        Ok(FilterConfig {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            whitelist,
            layout: SplitLayout::new(self.val_split),
        })
    }
}

/// Treat every sub-directory of `parent` as one source dataset, expecting a
/// `data.yaml` at its root. Sorted by name for a deterministic merge order.
pub fn discover_sources(parent: &Path) -> Result<Vec<SourceDataset>, Box<dyn std::error::Error>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(parent)
        .map_err(|e| format!("failed to read datasets dir {}: {}", parent.display(), e))?
    {
        let entry = entry?;
        let root = entry.path();
        if !root.is_dir() {
            continue;
        }
        let Some(name) = root.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        sources.push(SourceDataset {
            name: name.to_string(),
            vocabulary: VocabularySource::DataYaml(root.join("data.yaml")),
            root,
        });
    }
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    if sources.is_empty() {
        return Err(format!("no dataset directories found under {}", parent.display()).into());
    }
    Ok(sources)
}

/// Read a class list file: one name per line, trimmed, blanks skipped.
pub fn read_class_list(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read class list {}: {}", path.display(), e))?;
    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(format!("class list {} is empty", path.display()).into());
    }
    Ok(names)
}
