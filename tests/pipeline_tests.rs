use clap::Parser;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{json, Map, Value};
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use journal2yolo::{
    process_dataset, process_image, ClassSchema, Detector, PrepareArgs, RawDetection, Result,
};

fn write_page(dir: &Path, name: &str) {
    let image = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 128]));
    image.save(dir.join(name)).unwrap();
}

fn region(x: u32, y: u32, width: u32, height: u32, element_type: &str) -> Value {
    json!({
        "shape_attributes": {"name": "rect", "x": x, "y": y, "width": width, "height": height},
        "region_attributes": {"element_type": element_type}
    })
}

fn write_export(path: &Path, entries: &[(&str, Vec<Value>)]) {
    let mut metadata = Map::new();
    for (filename, regions) in entries {
        metadata.insert(
            format!("{}12345", filename),
            json!({
                "filename": filename,
                "size": 12345,
                "regions": regions,
                "file_attributes": {}
            }),
        );
    }
    let export = json!({
        "_via_settings": {},
        "_via_img_metadata": metadata,
        "_via_attributes": {"region": {}, "file": {}}
    });
    fs::write(path, serde_json::to_string_pretty(&export).unwrap()).unwrap();
}

fn count_files(dir: &Path, extension: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some(extension))
        .count()
}

fn prepare_args(root: &Path, split_ratio: &str) -> PrepareArgs {
    let args: Vec<OsString> = vec![
        "journal2yolo".into(),
        "--annotations".into(),
        root.join("labeled_journals.json").into(),
        "--images_dir".into(),
        root.join("SampleJournals").into(),
        "--dataset_dir".into(),
        root.join("dataset").into(),
        "--split_ratio".into(),
        split_ratio.into(),
        "--no_train".into(),
    ];
    PrepareArgs::parse_from(args)
}

#[test]
fn test_end_to_end_dataset_with_date_regions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let source_dir = root.join("SampleJournals");
    fs::create_dir_all(&source_dir).unwrap();

    let names: Vec<_> = (0..10).map(|i| format!("page{:02}.jpg", i)).collect();
    let entries: Vec<_> = names
        .iter()
        .map(|name| {
            write_page(&source_dir, name);
            (
                name.as_str(),
                vec![region(2, 2, 10, 4, "date"), region(0, 10, 40, 20, "journal_entry")],
            )
        })
        .collect();
    write_export(&root.join("labeled_journals.json"), &entries);

    let args = prepare_args(root, "0.8");
    let yaml_path = process_dataset(&args, &ClassSchema::default()).unwrap();

    let dataset = root.join("dataset");
    assert_eq!(yaml_path, dataset.join("journal.yaml"));
    // 8 train entries, each with a date region: original + 4 variants
    assert_eq!(count_files(&dataset.join("images/train"), "jpg"), 40);
    assert_eq!(count_files(&dataset.join("labels/train"), "txt"), 40);
    // Validation entries are not augmented
    assert_eq!(count_files(&dataset.join("images/val"), "jpg"), 2);
    assert_eq!(count_files(&dataset.join("labels/val"), "txt"), 2);

    // Every entry lands in exactly one split
    for name in &names {
        let stem = Path::new(name).file_stem().unwrap().to_str().unwrap();
        let in_train = dataset.join("labels/train").join(format!("{}.txt", stem)).exists();
        let in_val = dataset.join("labels/val").join(format!("{}.txt", stem)).exists();
        assert!(in_train ^ in_val, "{} must be in exactly one split", name);
        if in_train {
            for aug_idx in 1..=4 {
                let aug = format!("{}_aug{}", stem, aug_idx);
                assert!(dataset.join("images/train").join(format!("{}.jpg", aug)).exists());
                assert!(dataset.join("labels/train").join(format!("{}.txt", aug)).exists());
            }
        }
    }

    // date x5 then journal_entry x2
    let label_file = fs::read_dir(dataset.join("labels/val"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let labels = fs::read_to_string(label_file).unwrap();
    let lines: Vec<_> = labels.lines().collect();
    assert_eq!(lines.len(), 7);
    assert!(lines[..5]
        .iter()
        .all(|line| *line == "0 0.175000 0.133333 0.250000 0.133333"));
    assert!(lines[5..]
        .iter()
        .all(|line| *line == "2 0.500000 0.666667 1.000000 0.666667"));

    let yaml = fs::read_to_string(yaml_path).unwrap();
    assert!(yaml.contains("nc: 5"));
    assert!(yaml.contains("- journal_entry"));
}

#[test]
fn test_pages_without_date_are_not_augmented() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let source_dir = root.join("SampleJournals");
    fs::create_dir_all(&source_dir).unwrap();

    write_page(&source_dir, "plain.jpg");
    write_export(
        &root.join("labeled_journals.json"),
        &[("plain.jpg", vec![region(0, 0, 20, 10, "title")])],
    );

    let args = prepare_args(root, "1.0");
    process_dataset(&args, &ClassSchema::default()).unwrap();

    let dataset = root.join("dataset");
    assert_eq!(count_files(&dataset.join("images/train"), "jpg"), 1);
    let labels = fs::read_to_string(dataset.join("labels/train/plain.txt")).unwrap();
    assert_eq!(labels.lines().count(), 4);
}

#[test]
fn test_missing_and_unreadable_images_are_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let source_dir = root.join("SampleJournals");
    fs::create_dir_all(&source_dir).unwrap();

    write_page(&source_dir, "present.jpg");
    fs::write(source_dir.join("broken.jpg"), b"not a jpeg").unwrap();
    write_export(
        &root.join("labeled_journals.json"),
        &[
            ("present.jpg", vec![region(0, 0, 20, 10, "title")]),
            ("missing.jpg", vec![region(0, 0, 20, 10, "title")]),
            ("broken.jpg", vec![region(0, 0, 20, 10, "title")]),
        ],
    );

    let args = prepare_args(root, "0.0");
    process_dataset(&args, &ClassSchema::default()).unwrap();

    let dataset = root.join("dataset");
    assert_eq!(count_files(&dataset.join("images/val"), "jpg"), 1);
    assert!(dataset.join("labels/val/present.txt").exists());
    assert!(!dataset.join("labels/val/missing.txt").exists());
    assert!(!dataset.join("labels/val/broken.txt").exists());
}

#[test]
fn test_malformed_export_is_fatal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("labeled_journals.json"), "{ not json").unwrap();

    let args = prepare_args(root, "0.8");
    assert!(process_dataset(&args, &ClassSchema::default()).is_err());
}

struct StaticDetector(Vec<RawDetection>);

impl Detector for StaticDetector {
    fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_inference_keeps_confident_detections_only() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    // PNG keeps the drawn pixels exact
    let image_path = root.join("page.png");
    RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]))
        .save(&image_path)
        .unwrap();
    let results_dir = root.join("results");

    let mut detector = StaticDetector(vec![
        RawDetection::new(10.0, 10.0, 50.0, 50.0, 0.9, 0),
        RawDetection::new(5.0, 5.0, 20.0, 20.0, 0.3, 1),
    ]);
    let schema = ClassSchema::default();
    let summary = process_image(&mut detector, &image_path, 0.5, &schema, &results_dir, None)
        .unwrap()
        .unwrap();

    assert_eq!(summary.total(), 1);
    let dates = summary.get("date").unwrap();
    assert_eq!(dates.len(), 1);
    assert_eq!(dates[0].bbox, [10, 10, 50, 50]);
    assert!(summary.get("title").unwrap().is_empty());

    let output_path = results_dir.join("detected_page.png");
    assert!(output_path.exists());
    let annotated = image::open(output_path).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (64, 64));

    let date_color = Rgb(schema.get(0).unwrap().color);
    assert_eq!(annotated.get_pixel(10, 10), &date_color);
    assert_eq!(annotated.get_pixel(49, 30), &date_color);
    // The low-confidence title box at (5,5)-(20,20) is not drawn
    let white = Rgb([255, 255, 255]);
    assert_eq!(annotated.get_pixel(5, 5), &white);
    assert_eq!(annotated.get_pixel(5, 12), &white);
    assert_eq!(annotated.get_pixel(12, 5), &white);
    assert_eq!(annotated.get_pixel(30, 30), &white);
}

#[test]
fn test_inference_on_unreadable_image_returns_none() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_path = temp_dir.path().join("broken.jpg");
    fs::write(&image_path, b"garbage").unwrap();

    let mut detector = StaticDetector(vec![]);
    let summary = process_image(
        &mut detector,
        &image_path,
        0.5,
        &ClassSchema::default(),
        &temp_dir.path().join("results"),
        None,
    )
    .unwrap();
    assert!(summary.is_none());
}
