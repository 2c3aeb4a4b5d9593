use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// Image extensions tried when resolving the image for a label file.
// Order matters: the first existing match wins.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// One detection line from a YOLO label file: a class id plus the
/// remaining whitespace-separated tokens, kept verbatim.
///
/// The geometry is opaque to the remapper; only the leading class id is
/// ever rewritten, so the tokens are carried as strings to guarantee the
/// output is byte-identical to the input past the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub class_id: usize,
    pub geometry: Vec<String>,
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_id)?;
        for token in &self.geometry {
            write!(f, " {}", token)?;
        }
        Ok(())
    }
}

/// A degraded-but-recoverable condition encountered during a run.
///
/// Each variant is one greppable warning category. The pipelines log every
/// warning as it happens and also collect them into the run report, so tests
/// can assert on them without capturing console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A split's `labels/` or `images/` directory does not exist.
    MissingSplitDir { dataset: String, split: String },
    /// The dataset's class vocabulary could not be loaded; dataset skipped.
    VocabularyUnavailable { dataset: String, reason: String },
    /// A class name has no home in the target vocabulary; line dropped.
    UnknownClass {
        dataset: String,
        file: String,
        class_name: String,
    },
    /// A class id outside the source vocabulary; line dropped.
    InvalidClassIndex {
        dataset: String,
        file: String,
        class_id: usize,
    },
    /// A line whose leading token is not a non-negative integer; line dropped.
    MalformedLine {
        dataset: String,
        file: String,
        line: String,
    },
    /// No image matched the label file's base name; example dropped.
    MissingImage { dataset: String, file: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingSplitDir { dataset, split } => {
                write!(f, "missing split directory '{}' in {}", split, dataset)
            }
            Warning::VocabularyUnavailable { dataset, reason } => {
                write!(f, "could not load vocabulary for {}: {}", dataset, reason)
            }
            Warning::UnknownClass {
                dataset,
                file,
                class_name,
            } => write!(f, "unknown class '{}' in {}/{}", class_name, dataset, file),
            Warning::InvalidClassIndex {
                dataset,
                file,
                class_id,
            } => write!(
                f,
                "invalid class index {} in {}/{}",
                class_id, dataset, file
            ),
            Warning::MalformedLine {
                dataset,
                file,
                line,
            } => write!(f, "malformed label line '{}' in {}/{}", line, dataset, file),
            Warning::MissingImage { dataset, file } => {
                write!(f, "no image found for {}/{}", dataset, file)
            }
        }
    }
}

/// Images successfully copied, keyed by (dataset, split).
///
/// Purely observational; BTreeMap so the summary prints in a stable order.
#[derive(Debug, Default, Clone)]
pub struct CopyStats {
    counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CopyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dataset: &str, split: &str) {
        *self
            .counts
            .entry(dataset.to_string())
            .or_default()
            .entry(split.to_string())
            .or_default() += 1;
    }

    pub fn count(&self, dataset: &str, split: &str) -> usize {
        self.counts
            .get(dataset)
            .and_then(|splits| splits.get(split))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts
            .values()
            .flat_map(|splits| splits.values())
            .sum()
    }

    pub fn print_summary(&self) {
        log::info!("=== Copy Summary ===");
        if self.counts.is_empty() {
            log::info!("No images were copied.");
            return;
        }
        for (dataset, splits) in &self.counts {
            for (split, count) in splits {
                log::info!("{} / {}: {} images", dataset, split, count);
            }
        }
        log::info!("Total images copied: {}", self.total());
    }
}

/// Everything a pipeline run produced besides the output tree itself.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: CopyStats,
    pub warnings: Vec<Warning>,
    pub manifest_path: Option<PathBuf>,
}

impl RunReport {
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}
