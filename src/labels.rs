use crate::types::LabelRecord;
use crate::vocabulary::{RemapEntry, RemapTable};

/// The outcome of parsing one raw label line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Whitespace-only line, skipped without a warning.
    Blank,
    /// Leading token is not a non-negative integer.
    Malformed,
    Record(LabelRecord),
}

/// Parse one label line: `<class_id> <token> <token> ...`.
pub fn parse_line(line: &str) -> ParsedLine {
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
        return ParsedLine::Blank;
    };
    match first.parse::<usize>() {
        Ok(class_id) => ParsedLine::Record(LabelRecord {
            class_id,
            geometry: tokens.map(str::to_string).collect(),
        }),
        Err(_) => ParsedLine::Malformed,
    }
}

/// Why a line was dropped during remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Class id at or past the end of the source vocabulary.
    InvalidIndex(usize),
    /// Class has no home in the target vocabulary.
    UnknownClass(usize),
    /// Class was deliberately filtered out; no warning is owed.
    Excluded(usize),
    /// Leading token was not an integer.
    Malformed(String),
}

/// Records that survived remapping plus the per-line drops.
#[derive(Debug, Default)]
pub struct RemapOutcome {
    pub records: Vec<LabelRecord>,
    pub dropped: Vec<DropReason>,
}

impl RemapOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Remap every line of a label file against the table.
///
/// Surviving records keep their original order and their geometry tokens
/// untouched; only the class id is rewritten. Blank lines vanish silently,
/// everything else that cannot be remapped lands in `dropped` with a reason
/// so the caller can attach file context to the warning.
pub fn remap_lines(content: &str, table: &RemapTable) -> RemapOutcome {
    let mut outcome = RemapOutcome::default();
    for line in content.lines() {
        let record = match parse_line(line) {
            ParsedLine::Blank => continue,
            ParsedLine::Malformed => {
                outcome.dropped.push(DropReason::Malformed(line.to_string()));
                continue;
            }
            ParsedLine::Record(record) => record,
        };
        match table.entry(record.class_id) {
            Some(RemapEntry::Mapped(new_id)) => outcome.records.push(LabelRecord {
                class_id: new_id,
                geometry: record.geometry,
            }),
            Some(RemapEntry::Unknown) => outcome
                .dropped
                .push(DropReason::UnknownClass(record.class_id)),
            Some(RemapEntry::Excluded) => outcome
                .dropped
                .push(DropReason::Excluded(record.class_id)),
            None => outcome
                .dropped
                .push(DropReason::InvalidIndex(record.class_id)),
        }
    }
    outcome
}

/// Render surviving records as label-file text: one record per line,
/// newline-joined, no trailing newline.
pub fn render_records(records: &[LabelRecord]) -> String {
    records
        .iter()
        .map(LabelRecord::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
