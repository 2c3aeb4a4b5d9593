//! YOLO dataset merge and filter toolkit
//!
//! This library merges several YOLO-format object detection datasets into one
//! unified dataset with a master class vocabulary, and filters a merged
//! dataset down to a whitelist of high-accuracy classes.

pub mod config;
pub mod detect;
pub mod filter;
pub mod io;
pub mod labels;
pub mod merge;
pub mod types;
pub mod vocabulary;

// Re-export commonly used types and entry points
pub use config::{
    Cli, Command, FilterConfig, MergeConfig, SourceDataset, SplitLayout, ValSplit, VocabularySource,
};
pub use types::{CopyStats, LabelRecord, RunReport, Warning};
pub use vocabulary::{ClassVocabulary, MasterVocabulary, RemapTable};
