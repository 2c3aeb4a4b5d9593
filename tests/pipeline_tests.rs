use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use yolo_merge::{
    filter, merge, FilterConfig, MergeConfig, SourceDataset, SplitLayout, ValSplit, Warning,
    VocabularySource,
};

/// Lay down one source dataset: a data.yaml plus label/image files in the
/// given split.
fn write_dataset(
    parent: &Path,
    name: &str,
    classes: &[&str],
    split: &str,
    examples: &[(&str, &str, Option<&str>)],
) -> SourceDataset {
    let root = parent.join(name);
    let labels_dir = root.join(split).join("labels");
    let images_dir = root.join(split).join("images");
    fs::create_dir_all(&labels_dir).unwrap();
    fs::create_dir_all(&images_dir).unwrap();

    let mut yaml = String::from("names:\n");
    for class in classes {
        yaml.push_str(&format!("  - {}\n", class));
    }
    fs::write(root.join("data.yaml"), yaml).unwrap();

    for (stem, label_content, image_ext) in examples {
        fs::write(labels_dir.join(format!("{}.txt", stem)), label_content).unwrap();
        if let Some(ext) = image_ext {
            fs::write(images_dir.join(format!("{}.{}", stem, ext)), b"fakeimage").unwrap();
        }
    }

    SourceDataset {
        name: name.to_string(),
        vocabulary: VocabularySource::DataYaml(root.join("data.yaml")),
        root,
    }
}

fn merge_config(sources: Vec<SourceDataset>, output: PathBuf, master: Option<&[&str]>) -> MergeConfig {
    MergeConfig {
        sources,
        output_dir: output,
        master: master.map(|names| names.iter().map(|s| s.to_string()).collect()),
        layout: SplitLayout::new(ValSplit::Valid),
    }
}

#[test]
fn merge_remaps_ids_and_prefixes_filenames() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire", "smoke"],
        "train",
        &[("img1", "0 0.5 0.5 0.2 0.2\n1 0.3 0.3 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![source], output.clone(), Some(&["fire", "smoke"]));

    let report = merge::run(&config).unwrap();

    let label = output.join("train/labels/fire_smoke_img1.txt");
    assert_eq!(
        fs::read_to_string(label).unwrap(),
        "0 0.5 0.5 0.2 0.2\n1 0.3 0.3 0.1 0.1"
    );
    assert!(output.join("train/images/fire_smoke_img1.jpg").exists());
    assert_eq!(report.stats.count("fire_smoke", "train"), 1);
    assert!(report.warnings.is_empty());
}

#[test]
fn merge_rewrites_ids_against_master_order() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire", "smoke"],
        "train",
        &[("img1", "0 0.5 0.5 0.2 0.2", Some("jpg"))],
    );
    let output = dir.path().join("master");
    // Master lists smoke first, so fire must become id 1.
    let config = merge_config(vec![source], output.clone(), Some(&["smoke", "fire"]));

    merge::run(&config).unwrap();

    let content = fs::read_to_string(output.join("train/labels/fire_smoke_img1.txt")).unwrap();
    assert_eq!(content, "1 0.5 0.5 0.2 0.2");
}

#[test]
fn merge_drops_lines_with_unknown_classes() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire", "smoke"],
        "train",
        &[("img1", "0 0.5 0.5 0.2 0.2\n1 0.3 0.3 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![source], output.clone(), Some(&["fire"]));

    let report = merge::run(&config).unwrap();

    let content = fs::read_to_string(output.join("train/labels/fire_smoke_img1.txt")).unwrap();
    assert_eq!(content, "0 0.5 0.5 0.2 0.2");
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UnknownClass { class_name, .. } if class_name == "smoke")));
}

#[test]
fn merge_emits_nothing_for_emptied_label_files() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "chilli",
        &["chilli_leaf_spot"],
        "train",
        &[("lonely", "0 0.5 0.5 0.2 0.2", Some("png"))],
    );
    let output = dir.path().join("master");
    // Master has no home for the only class in the dataset.
    let config = merge_config(vec![source], output.clone(), Some(&["fire"]));

    let report = merge::run(&config).unwrap();

    assert!(!output.join("train/labels/chilli_lonely.txt").exists());
    assert!(!output.join("train/images/chilli_lonely.png").exists());
    assert_eq!(report.stats.total(), 0);
}

#[test]
fn merge_drops_example_when_image_is_missing() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "tomato",
        &["late_blight"],
        "train",
        &[("img9", "0 0.5 0.5 0.2 0.2", None)],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![source], output.clone(), Some(&["late_blight"]));

    let report = merge::run(&config).unwrap();

    assert!(!output.join("train/labels/tomato_img9.txt").exists());
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::MissingImage { .. })));
    assert_eq!(report.stats.total(), 0);
}

#[test]
fn merge_disambiguates_identical_basenames_across_datasets() {
    let dir = TempDir::new().unwrap();
    let a = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire"],
        "train",
        &[("img1", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let b = write_dataset(
        dir.path(),
        "tomato",
        &["late_blight"],
        "train",
        &[("img1", "0 0.2 0.2 0.2 0.2", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![a, b], output.clone(), Some(&["fire", "late_blight"]));

    let report = merge::run(&config).unwrap();

    assert!(output.join("train/labels/fire_smoke_img1.txt").exists());
    assert!(output.join("train/labels/tomato_img1.txt").exists());
    assert!(output.join("train/images/fire_smoke_img1.jpg").exists());
    assert!(output.join("train/images/tomato_img1.jpg").exists());
    assert_eq!(report.stats.count("fire_smoke", "train"), 1);
    assert_eq!(report.stats.count("tomato", "train"), 1);
}

#[test]
fn merge_manifest_lists_the_full_master_vocabulary() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire"],
        "train",
        &[("img1", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    // "unused" never appears in any label file but must still be listed.
    let config = merge_config(vec![source], output.clone(), Some(&["fire", "unused"]));

    let report = merge::run(&config).unwrap();

    let manifest = fs::read_to_string(report.manifest_path.unwrap()).unwrap();
    assert!(manifest.contains("  0: fire\n"));
    assert!(manifest.contains("  1: unused\n"));
    assert!(manifest.contains("/valid/images"));
}

#[test]
fn merge_derives_union_master_in_discovery_order() {
    let dir = TempDir::new().unwrap();
    let a = write_dataset(
        dir.path(),
        "alpha",
        &["fire", "smoke"],
        "train",
        &[("a", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let b = write_dataset(
        dir.path(),
        "beta",
        &["Smoke", "chilli"],
        "train",
        &[("b", "1 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![a, b], output.clone(), None);

    let report = merge::run(&config).unwrap();

    let manifest = fs::read_to_string(report.manifest_path.unwrap()).unwrap();
    assert!(manifest.contains("  0: fire\n"));
    assert!(manifest.contains("  1: smoke\n"));
    assert!(manifest.contains("  2: chilli\n"));
    // beta's "chilli" (id 1) remaps to master id 2.
    let content = fs::read_to_string(output.join("train/labels/beta_b.txt")).unwrap();
    assert_eq!(content, "2 0.1 0.1 0.1 0.1");
}

#[test]
fn merge_skips_dataset_without_vocabulary() {
    let dir = TempDir::new().unwrap();
    let good = write_dataset(
        dir.path(),
        "good",
        &["fire"],
        "train",
        &[("img1", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let bad_root = dir.path().join("bad");
    fs::create_dir_all(bad_root.join("train/labels")).unwrap();
    let bad = SourceDataset {
        name: "bad".to_string(),
        vocabulary: VocabularySource::DataYaml(bad_root.join("data.yaml")),
        root: bad_root,
    };
    let output = dir.path().join("master");
    let config = merge_config(vec![good, bad], output.clone(), Some(&["fire"]));

    let report = merge::run(&config).unwrap();

    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::VocabularyUnavailable { dataset, .. } if dataset == "bad")));
    assert_eq!(report.stats.count("good", "train"), 1);
}

#[test]
fn merge_warns_on_missing_split_directories() {
    let dir = TempDir::new().unwrap();
    // Only a train split exists; valid and test are missing.
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire"],
        "train",
        &[("img1", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = merge_config(vec![source], output, Some(&["fire"]));

    let report = merge::run(&config).unwrap();

    let missing: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::MissingSplitDir { .. }))
        .collect();
    assert_eq!(missing.len(), 2);
}

#[test]
fn merge_applies_explicit_id_table() {
    let dir = TempDir::new().unwrap();
    let mut source = write_dataset(
        dir.path(),
        "tomato",
        &[],
        "train",
        &[(
            "img1",
            "0 0.5 0.5 0.2 0.2\n1 0.3 0.3 0.1 0.1\n2 0.4 0.4 0.1 0.1",
            Some("jpg"),
        )],
    );
    // Old ids 0 and 2 map straight into master id space; id 1 is a hole.
    source.vocabulary =
        VocabularySource::ExplicitIds(HashMap::from([(0, 4), (2, 5)]));
    let output = dir.path().join("master");
    let config = merge_config(
        vec![source],
        output.clone(),
        Some(&["fire", "smoke", "chilli_leaf_spot", "chilli_powdery_mildew", "tomato_late_blight", "tomato_leaf_mold"]),
    );

    let report = merge::run(&config).unwrap();

    let content = fs::read_to_string(output.join("train/labels/tomato_img1.txt")).unwrap();
    assert_eq!(content, "4 0.5 0.5 0.2 0.2\n5 0.4 0.4 0.1 0.1");
    // The hole in the table warns; with no name list the class is named by id.
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UnknownClass { class_name, .. } if class_name == "id 1")));
    assert_eq!(report.stats.count("tomato", "train"), 1);
}

#[test]
fn explicit_id_table_requires_a_master_list() {
    let dir = TempDir::new().unwrap();
    let mut source = write_dataset(
        dir.path(),
        "tomato",
        &[],
        "train",
        &[("img1", "0 0.5 0.5 0.2 0.2", Some("jpg"))],
    );
    source.vocabulary = VocabularySource::ExplicitIds(HashMap::from([(0, 4)]));
    let config = merge_config(vec![source], dir.path().join("master"), None);

    let err = merge::run(&config).unwrap_err();
    assert!(err.to_string().contains("explicit master class list"));
}

#[test]
fn explicit_id_table_must_stay_inside_the_master() {
    let dir = TempDir::new().unwrap();
    let mut source = write_dataset(
        dir.path(),
        "tomato",
        &[],
        "train",
        &[("img1", "0 0.5 0.5 0.2 0.2", Some("jpg"))],
    );
    source.vocabulary = VocabularySource::ExplicitIds(HashMap::from([(0, 9)]));
    let config = merge_config(vec![source], dir.path().join("master"), Some(&["fire", "smoke"]));

    let err = merge::run(&config).unwrap_err();
    assert!(err.to_string().contains("outside"));
}

#[test]
fn filter_restricts_to_whitelist_and_remaps() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "farm",
        &["fire", "smoke", "chilli", "tomato"],
        "train",
        &[
            ("a", "0 0.1 0.1 0.1 0.1\n3 0.2 0.2 0.2 0.2", Some("jpg")),
            ("b", "1 0.3 0.3 0.3 0.3", Some("jpg")),
        ],
    );
    let merged = dir.path().join("master");
    let config = merge_config(
        vec![source],
        merged.clone(),
        Some(&["fire", "smoke", "chilli", "tomato"]),
    );
    merge::run(&config).unwrap();

    let filtered = dir.path().join("filtered");
    let filter_config = FilterConfig {
        input_dir: merged,
        output_dir: filtered.clone(),
        whitelist: vec!["smoke".to_string(), "tomato".to_string()],
        layout: SplitLayout::new(ValSplit::Valid),
    };
    let report = filter::run(&filter_config).unwrap();

    // "a" keeps only its tomato line; tomato is whitelist id 1.
    let a = fs::read_to_string(filtered.join("train/labels/farm_a.txt")).unwrap();
    assert_eq!(a, "1 0.2 0.2 0.2 0.2");
    // "b" keeps its smoke line; smoke is whitelist id 0.
    let b = fs::read_to_string(filtered.join("train/labels/farm_b.txt")).unwrap();
    assert_eq!(b, "0 0.3 0.3 0.3 0.3");

    // Every surviving id is < whitelist length.
    for file in ["farm_a.txt", "farm_b.txt"] {
        let content = fs::read_to_string(filtered.join("train/labels").join(file)).unwrap();
        for line in content.lines() {
            let id: usize = line.split_whitespace().next().unwrap().parse().unwrap();
            assert!(id < 2);
        }
    }
    assert_eq!(report.stats.total(), 2);
}

#[test]
fn filter_drops_examples_with_no_whitelisted_classes() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "farm",
        &["fire", "smoke"],
        "train",
        &[("only_fire", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let merged = dir.path().join("master");
    merge::run(&merge_config(
        vec![source],
        merged.clone(),
        Some(&["fire", "smoke"]),
    ))
    .unwrap();

    let filtered = dir.path().join("filtered");
    let report = filter::run(&FilterConfig {
        input_dir: merged,
        output_dir: filtered.clone(),
        whitelist: vec!["smoke".to_string()],
        layout: SplitLayout::new(ValSplit::Valid),
    })
    .unwrap();

    assert!(!filtered.join("train/labels/farm_only_fire.txt").exists());
    assert!(!filtered.join("train/images/farm_only_fire.jpg").exists());
    // Deliberate filtering is silent: no unknown-class warnings.
    assert!(!report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UnknownClass { .. })));
    assert_eq!(report.stats.total(), 0);
}

#[test]
fn filter_writes_structured_manifest() {
    let dir = TempDir::new().unwrap();
    let source = write_dataset(
        dir.path(),
        "farm",
        &["fire", "smoke"],
        "train",
        &[("a", "1 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let merged = dir.path().join("master");
    merge::run(&merge_config(
        vec![source],
        merged.clone(),
        Some(&["fire", "smoke"]),
    ))
    .unwrap();

    let filtered = dir.path().join("filtered");
    let report = filter::run(&FilterConfig {
        input_dir: merged,
        output_dir: filtered,
        whitelist: vec!["smoke".to_string()],
        layout: SplitLayout::new(ValSplit::Valid),
    })
    .unwrap();

    let manifest = fs::read_to_string(report.manifest_path.unwrap()).unwrap();
    assert!(manifest.contains("path:"));
    assert!(manifest.contains("train: train/images"));
    assert!(manifest.contains("val: valid/images"));
    assert!(manifest.contains("0: smoke"));
    assert!(!manifest.contains("fire"));
}

#[test]
fn val_split_spelling_is_configuration() {
    let dir = TempDir::new().unwrap();
    // Dataset uses the short "val" spelling.
    let source = write_dataset(
        dir.path(),
        "fire_smoke",
        &["fire"],
        "val",
        &[("img1", "0 0.1 0.1 0.1 0.1", Some("jpg"))],
    );
    let output = dir.path().join("master");
    let config = MergeConfig {
        sources: vec![source],
        output_dir: output.clone(),
        master: Some(vec!["fire".to_string()]),
        layout: SplitLayout::new(ValSplit::Val),
    };

    let report = merge::run(&config).unwrap();

    assert!(output.join("val/labels/fire_smoke_img1.txt").exists());
    assert_eq!(report.stats.count("fire_smoke", "val"), 1);
}
