use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use coco_recategorize::archive::{zip_file, zip_path_for};
use coco_recategorize::config::DEFAULT_DATASET_VERSION;
use coco_recategorize::integrity::{check_dataset_file, IntegrityOptions};
use coco_recategorize::io::{read_dataset, write_json};
use coco_recategorize::preview::{write_preview, PreviewOptions};
use coco_recategorize::{
    run, transform, Error, ErrorPolicy, PipelineConfig, Taxonomy, TransformOptions, Violation,
};

fn original_dataset() -> Value {
    json!({
        "info": { "version": "2021.01.01", "description": "NOAA estuary fish" },
        "licenses": [{ "id": 1, "name": "CDLA-permissive" }],
        "images": [
            { "id": "img_a", "file_name": "a.jpg", "width": 640, "height": 480 },
            { "id": "img_b", "file_name": "b.jpg", "width": 640, "height": 480 },
            { "id": "img_c", "file_name": "sub/c.jpg", "width": 640, "height": 480 }
        ],
        "annotations": [
            { "id": "ann_1", "image_id": "img_a", "category_id": 0, "sequence_level_annotation": false },
            { "id": "ann_2", "image_id": "img_a", "category_id": 0, "sequence_level_annotation": false },
            { "id": "ann_3", "image_id": "img_b", "category_id": 1, "sequence_level_annotation": false,
              "bbox": [1.0, 2.0, 3.0, 4.0] },
            { "id": "ann_4", "image_id": "img_b", "category_id": 1, "sequence_level_annotation": false,
              "bbox": [5.0, 6.0, 7.0, 8.0] },
            { "id": "ann_5", "image_id": "img_c", "category_id": 1, "sequence_level_annotation": false,
              "bbox": [9.0, 9.0, 9.0, 9.0] }
        ],
        "categories": [{ "id": 0, "name": "empty" }, { "id": 1, "name": "animal" }]
    })
}

fn meta(id: &str, file_name: &str, habitat: &str, visibility: &str, animal: Option<&str>) -> Value {
    let mut record = json!({
        "id": id,
        "file_name": file_name,
        "filter": animal.is_some(),
        "standardized_habitat_type": habitat,
        "visibility": visibility,
        "width": 640,
        "height": 480,
        "location": "SD42"
    });
    if let Some(animal) = animal {
        record["animal_type"] = json!(animal);
    }
    record
}

fn new_metadata() -> Value {
    json!({
        "images": [
            meta("img_a", "a.jpg", "Sediment", "Low", None),
            meta("img_b", "b.jpg", "Oyster Off Bottom", "High", Some("both")),
            meta("img_c", "sub/c.jpg", "Eelgrass", "Medium", Some("crab"))
        ]
    })
}

struct Fixture {
    _tmp: tempfile::TempDir,
    config: PipelineConfig,
}

fn setup(original: &Value, metadata: &Value) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let image_folder = root.join("JPEGImages");
    fs::create_dir_all(image_folder.join("sub")).unwrap();
    for name in ["a.jpg", "b.jpg", "sub/c.jpg"] {
        fs::write(image_folder.join(name), b"\xFF\xD8\xFF").unwrap();
    }

    let input_dataset_path = root.join("noaa_estuary_fish.json");
    let new_metadata_path = root.join("updated_noaa_estuary_fish.json");
    write_json(original, &input_dataset_path).unwrap();
    write_json(metadata, &new_metadata_path).unwrap();

    let config = PipelineConfig {
        input_dataset_path,
        new_metadata_path,
        output_path: root.join("out/noaa_estuary_fish-2023.08.19.json"),
        image_folder,
        preview_folder: Some(root.join("preview")),
        transform: TransformOptions::default(),
        integrity_check: true,
        zip_output: true,
        preview: PreviewOptions::default(),
    };
    Fixture { _tmp: tmp, config }
}

fn read_value(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// Full run

#[test]
fn test_run_writes_refined_dataset() {
    let fixture = setup(&original_dataset(), &new_metadata());
    let summary = run(&fixture.config, &Taxonomy::default()).unwrap();

    assert_eq!(summary.transform.cleanup.annotations_removed(), 1);
    assert_eq!(summary.transform.merge.images_merged, 3);
    assert_eq!(summary.transform.merge.remapped_annotations, 3);

    let out = read_value(&fixture.config.output_path);
    assert_eq!(out["info"]["version"], json!(DEFAULT_DATASET_VERSION));
    assert_eq!(out["info"]["description"], json!("NOAA estuary fish"));
    assert_eq!(out["licenses"][0]["name"], json!("CDLA-permissive"));
    assert_eq!(out["categories"].as_array().unwrap().len(), 5);

    let images = out["images"].as_array().unwrap();
    let b = images.iter().find(|im| im["id"] == json!("img_b")).unwrap();
    assert_eq!(b["file_name"], json!("b.jpg"));
    assert_eq!(b["habitat_type"], json!("oyster_off_bottom"));
    assert_eq!(b["visibility"], json!("high"));
    assert_eq!(b["filter"], json!(true));
    assert_eq!(b["width"], json!(640));

    let annotations = out["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 4);
    let category = |id: &str| {
        annotations
            .iter()
            .find(|a| a["id"] == json!(id))
            .map(|a| a["category_id"].clone())
    };
    assert_eq!(category("ann_1"), Some(json!(0)));
    assert_eq!(category("ann_2"), None);
    assert_eq!(category("ann_3"), Some(json!(3)));
    assert_eq!(category("ann_4"), Some(json!(3)));
    assert_eq!(category("ann_5"), Some(json!(2)));
    assert_eq!(annotations[1]["bbox"], json!([1.0, 2.0, 3.0, 4.0]));
}

#[test]
fn test_run_output_uses_one_space_indent() {
    let fixture = setup(&original_dataset(), &new_metadata());
    run(&fixture.config, &Taxonomy::default()).unwrap();
    let text = fs::read_to_string(&fixture.config.output_path).unwrap();
    assert!(text.starts_with("{\n \"info\": {\n  \"version\""));
}

#[test]
fn test_run_output_attributes_match_metadata() {
    let fixture = setup(&original_dataset(), &new_metadata());
    run(&fixture.config, &Taxonomy::default()).unwrap();

    let out = read_dataset(&fixture.config.output_path).unwrap();
    let metadata = new_metadata();
    for new_im in metadata["images"].as_array().unwrap() {
        let im = out
            .images
            .iter()
            .find(|im| serde_json::to_value(&im.id).unwrap() == new_im["id"])
            .unwrap();
        assert_eq!(json!(im.file_name), new_im["file_name"]);
        assert_eq!(json!(im.filter), new_im["filter"]);
        let habitat = Taxonomy::normalize_habitat(new_im["standardized_habitat_type"].as_str().unwrap());
        assert_eq!(im.habitat_type.as_deref(), Some(habitat.as_str()));
        let visibility = Taxonomy::normalize_visibility(new_im["visibility"].as_str().unwrap());
        assert_eq!(im.visibility.as_deref(), Some(visibility.as_str()));
    }
    assert!(out.annotations.iter().all(|a| a.category_id <= 4));
}

#[test]
fn test_run_writes_zip_preview_and_integrity_report() {
    let fixture = setup(&original_dataset(), &new_metadata());
    let summary = run(&fixture.config, &Taxonomy::default()).unwrap();

    let zip_path = summary.zip_path.unwrap();
    assert_eq!(zip_path, zip_path_for(&fixture.config.output_path));
    assert!(zip_path.is_file());

    let preview_path = summary.preview_path.unwrap();
    let html = fs::read_to_string(preview_path).unwrap();
    assert!(html.contains("fish_or_crab"));
    assert!(html.contains("sub/c.jpg"));

    let integrity = summary.integrity.unwrap();
    assert_eq!(integrity.structural_problems(), 0);
    assert!(integrity.missing_images.is_empty());
    assert!(integrity.unused_images.is_empty());
    assert_eq!(integrity.sorted_categories[4].name, "unknown");
}

#[test]
fn test_run_file_name_mismatch_writes_nothing() {
    let mut metadata = new_metadata();
    metadata["images"][0]["file_name"] = json!("b.jpg");
    metadata["images"][1]["file_name"] = json!("a.jpg");
    let fixture = setup(&original_dataset(), &metadata);

    let err = run(&fixture.config, &Taxonomy::default()).unwrap_err();
    assert!(matches!(
        err.violations(),
        [Violation::FileNameMismatch { .. }]
    ));
    assert!(!fixture.config.output_path.exists());
    assert!(!zip_path_for(&fixture.config.output_path).exists());
}

#[test]
fn test_run_fail_slow_collects_all_merge_violations() {
    let mut metadata = new_metadata();
    metadata["images"][0]["visibility"] = json!("Murky");
    metadata["images"][2]["animal_type"] = json!("shrimp");
    let mut fixture = setup(&original_dataset(), &metadata);
    fixture.config.transform.policy = ErrorPolicy::FailSlow;

    let err = run(&fixture.config, &Taxonomy::default()).unwrap_err();
    assert_eq!(err.violations().len(), 2);
    assert!(!fixture.config.output_path.exists());
}

#[test]
fn test_run_missing_input() {
    let mut fixture = setup(&original_dataset(), &new_metadata());
    fixture.config.new_metadata_path = PathBuf::from("/nonexistent/metadata.json");
    let err = run(&fixture.config, &Taxonomy::default()).unwrap_err();
    assert!(matches!(err, Error::InputNotFound(_)));
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_transform_in_memory() {
    let mut dataset = serde_json::from_value(original_dataset()).unwrap();
    let metadata = serde_json::from_value(new_metadata()).unwrap();
    let options = TransformOptions {
        dataset_version: "test-version".to_string(),
        ..TransformOptions::default()
    };
    let summary = transform(&mut dataset, &metadata, &Taxonomy::default(), &options).unwrap();
    assert_eq!(summary.cleanup.images_affected, 1);
    assert_eq!(dataset.info.version, Some(json!("test-version")));
    assert_eq!(dataset.annotations.len(), 4);
}

// Collaborators

#[test]
fn test_integrity_reports_dangling_refs_and_files() {
    let tmp = tempfile::tempdir().unwrap();
    let images_dir = tmp.path().join("images");
    fs::create_dir_all(&images_dir).unwrap();
    fs::write(images_dir.join("a.jpg"), b"x").unwrap();
    fs::write(images_dir.join("stray.png"), b"x").unwrap();

    let dataset_path = tmp.path().join("dataset.json");
    write_json(
        &json!({
            "info": {},
            "images": [
                { "id": 1, "file_name": "a.jpg" },
                { "id": 2, "file_name": "gone.jpg" },
                { "id": 2, "file_name": "again.jpg" }
            ],
            "annotations": [
                { "id": 1, "image_id": 1, "category_id": 0 },
                { "id": 2, "image_id": 7, "category_id": 9 }
            ],
            "categories": [{ "id": 0, "name": "empty" }]
        }),
        &dataset_path,
    )
    .unwrap();

    let options = IntegrityOptions {
        base_dir: Some(images_dir.clone()),
        check_image_existence: true,
        find_unused_images: true,
    };
    let report = check_dataset_file(&dataset_path, &options).unwrap();
    assert_eq!(report.image_count, 3);
    assert_eq!(report.duplicate_image_ids.len(), 1);
    assert_eq!(report.unknown_image_refs.len(), 1);
    assert_eq!(report.unknown_category_refs.len(), 1);
    assert_eq!(report.structural_problems(), 3);
    let mut missing = report.missing_images.clone();
    missing.sort();
    assert_eq!(missing, vec!["again.jpg", "gone.jpg"]);
    assert_eq!(report.unused_images, vec![images_dir.join("stray.png")]);
    assert!(!report.is_clean());
}

#[test]
fn test_zip_file_contains_output() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("out.json");
    fs::write(&path, "{\"images\": []}").unwrap();

    let zip_path = zip_file(&path).unwrap();
    assert_eq!(zip_path, tmp.path().join("out.json.zip"));

    let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
    let mut contents = String::new();
    archive
        .by_name("out.json")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "{\"images\": []}");
}

#[test]
fn test_preview_limits_and_escapes() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset_path = tmp.path().join("dataset.json");
    write_json(
        &json!({
            "info": {},
            "images": [
                { "id": 1, "file_name": "z<1>.jpg", "habitat_type": "clam" },
                { "id": 2, "file_name": "b.jpg" },
                { "id": 3, "file_name": "a.jpg" }
            ],
            "annotations": [{ "id": 1, "image_id": 1, "category_id": 1 }],
            "categories": [{ "id": 1, "name": "fish" }]
        }),
        &dataset_path,
    )
    .unwrap();

    let options = PreviewOptions {
        num_to_visualize: Some(2),
        sort_by_filename: true,
        include_image_links: false,
    };
    let html_path = write_preview(
        &dataset_path,
        Path::new("/data/images"),
        &tmp.path().join("preview"),
        &options,
    )
    .unwrap();
    let html = fs::read_to_string(html_path).unwrap();
    assert!(html.contains("Showing 2 of 3 images"));
    assert!(html.contains("<td>a.jpg</td>"));
    assert!(html.contains("<td>b.jpg</td>"));
    assert!(!html.contains("z&lt;1&gt;.jpg"));

    let options = PreviewOptions {
        num_to_visualize: None,
        ..options
    };
    let html_path = write_preview(
        &dataset_path,
        Path::new("/data/images"),
        &tmp.path().join("preview"),
        &options,
    )
    .unwrap();
    let html = fs::read_to_string(html_path).unwrap();
    assert!(html.contains("<td>z&lt;1&gt;.jpg</td><td>fish</td><td>clam</td>"));
}
