use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Normalize a class name for matching: trimmed and lower-cased.
///
/// Matching across datasets is done on normalized names so that
/// "Tomato Late Blight" and "tomato late blight " land in the same class.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The ordered class names of one dataset. Index position is the class id
/// used inside that dataset's label files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

// `names` in a data.yaml is either a plain sequence or an `id: name` mapping;
// both forms show up in exported datasets.
#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

impl ClassVocabulary {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Read the class list from a YOLO `data.yaml` sidecar manifest.
    pub fn from_data_yaml(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let parsed: DataYaml = serde_yaml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;

        let names = match parsed.names {
            DataYamlNames::Sequence(names) => names,
            DataYamlNames::Mapping(mapping) => {
                let len = mapping.keys().max().map_or(0, |max| max + 1);
                let mut names = vec![String::new(); len];
                for (id, name) in mapping {
                    names[id] = name;
                }
                // A mapping with holes would hand out empty class names and
                // every label hitting the hole would warn as unknown class
                // ''; better to refuse the manifest up front.
                if let Some(hole) = names.iter().position(|name| name.trim().is_empty()) {
                    return Err(format!(
                        "names mapping in {} has no entry for id {}",
                        path.display(),
                        hole
                    )
                    .into());
                }
                names
            }
        };

        if names.is_empty() {
            return Err(format!("no class names found in {}", path.display()).into());
        }
        Ok(Self::new(names))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The ordered class names of the merged output dataset.
///
/// Index position is the new class id. Names must be unique after
/// normalization: a collision would silently merge two source classes into
/// one target class, which has to be a deliberate configuration choice.
#[derive(Debug, Clone)]
pub struct MasterVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl MasterVocabulary {
    pub fn new(names: Vec<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut index = HashMap::with_capacity(names.len());
        for (id, name) in names.iter().enumerate() {
            if let Some(&existing) = index.get(&normalize(name)) {
                return Err(format!(
                    "duplicate class name '{}' (ids {} and {}) in master vocabulary",
                    name, existing, id
                )
                .into());
            }
            index.insert(normalize(name), id);
        }
        Ok(Self { names, index })
    }

    /// Build the master vocabulary as the union of source vocabularies, in
    /// discovery order. The first occurrence of a normalized name wins and
    /// supplies the display spelling.
    pub fn union_of<'a, I>(vocabularies: I) -> Self
    where
        I: IntoIterator<Item = &'a ClassVocabulary>,
    {
        let mut names = Vec::new();
        let mut index = HashMap::new();
        for vocab in vocabularies {
            for name in vocab.names() {
                let key = normalize(name);
                if !index.contains_key(&key) {
                    index.insert(key, names.len());
                    names.push(name.clone());
                }
            }
        }
        Self { names, index }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(&normalize(name)).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What became of one source class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapEntry {
    /// The class has a home in the target vocabulary.
    Mapped(usize),
    /// The class name has no match in the target; lines warn when dropped.
    Unknown,
    /// The class was deliberately filtered out; lines drop silently.
    Excluded,
}

/// The per-dataset mapping from old class id to new class id.
///
/// Computed once per source dataset and reused for every label file in it.
/// Ids at or past `len()` are out of range for the source vocabulary.
#[derive(Debug, Clone)]
pub struct RemapTable {
    entries: Vec<RemapEntry>,
}

impl RemapTable {
    /// Match each source class name against the master vocabulary.
    pub fn from_name_matching(source: &ClassVocabulary, master: &MasterVocabulary) -> Self {
        let entries = source
            .names()
            .iter()
            .map(|name| match master.lookup(name) {
                Some(new_id) => RemapEntry::Mapped(new_id),
                None => RemapEntry::Unknown,
            })
            .collect();
        Self { entries }
    }

    /// Build from an explicit old-id to new-id table. Ids missing from the
    /// table are unknown, not excluded: an explicit table is expected to be
    /// total, so holes get a warning.
    pub fn from_explicit(mapping: &HashMap<usize, usize>, source_len: usize) -> Self {
        let entries = (0..source_len)
            .map(|old_id| match mapping.get(&old_id) {
                Some(&new_id) => RemapEntry::Mapped(new_id),
                None => RemapEntry::Unknown,
            })
            .collect();
        Self { entries }
    }

    /// Restrict a merged vocabulary to a whitelist of class names, preserving
    /// the merged vocabulary's relative order. Returns the table together
    /// with the kept names, which become the filtered dataset's vocabulary.
    pub fn from_whitelist(merged: &ClassVocabulary, whitelist: &[String]) -> (Self, Vec<String>) {
        let keep: Vec<String> = whitelist.iter().map(|name| normalize(name)).collect();

        let mut kept_names = Vec::new();
        let mut entries = Vec::with_capacity(merged.len());
        for name in merged.names() {
            if keep.contains(&normalize(name)) {
                entries.push(RemapEntry::Mapped(kept_names.len()));
                kept_names.push(name.clone());
            } else {
                entries.push(RemapEntry::Excluded);
            }
        }
        (Self { entries }, kept_names)
    }

    pub fn entry(&self, old_id: usize) -> Option<RemapEntry> {
        self.entries.get(old_id).copied()
    }

    /// Total lookup: `None` covers out-of-range, unknown, and excluded ids.
    pub fn lookup(&self, old_id: usize) -> Option<usize> {
        match self.entry(old_id) {
            Some(RemapEntry::Mapped(new_id)) => Some(new_id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
