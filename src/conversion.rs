use image::{DynamicImage, GenericImageView};
use log::{error, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::augment::augment_image;
use crate::error::Result;
use crate::schema::ClassSchema;
use crate::types::{OutputDirs, ProcessingStats, Region, ShapeAttributes, Split, ViaImage};

/// Convert a top-left pixel rectangle to a normalized YOLO box
/// `[x_center, y_center, width, height]`. Values are not clamped.
pub fn rect_to_yolo(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    image_width: f64,
    image_height: f64,
) -> [f64; 4] {
    let x_center = (x + width / 2.0) / image_width;
    let y_center = (y + height / 2.0) / image_height;
    [
        x_center,
        y_center,
        width / image_width,
        height / image_height,
    ]
}

/// Inverse of [`rect_to_yolo`]: back to a top-left pixel rectangle `[x, y, width, height]`.
pub fn yolo_to_rect(bbox: [f64; 4], image_width: f64, image_height: f64) -> [f64; 4] {
    let [x_center, y_center, width, height] = bbox;
    let width = width * image_width;
    let height = height * image_height;
    [
        x_center * image_width - width / 2.0,
        y_center * image_height - height / 2.0,
        width,
        height,
    ]
}

/// Build the YOLO label file body for one image.
///
/// Non-rectangular regions and regions whose element type is missing or not in
/// the schema are skipped. Every remaining line is repeated according to the
/// class weight, duplicates adjacent.
pub fn convert_to_yolo_format(
    regions: &[Region],
    schema: &ClassSchema,
    image_width: u32,
    image_height: u32,
) -> String {
    let mut yolo_data = String::with_capacity(regions.len() * 64);

    for region in regions {
        let ShapeAttributes::Rect {
            x,
            y,
            width,
            height,
        } = region.shape_attributes
        else {
            continue;
        };
        let Some(element_type) = region.element_type() else {
            continue;
        };
        let Some(class_id) = schema.index_of(element_type) else {
            continue;
        };

        let [x_center, y_center, width, height] = rect_to_yolo(
            x,
            y,
            width,
            height,
            f64::from(image_width),
            f64::from(image_height),
        );
        let line = format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            class_id, x_center, y_center, width, height
        );
        for _ in 0..schema.repeat_count(element_type) {
            yolo_data.push_str(&line);
        }
    }

    yolo_data
}

/// Sanitized base name under which the images and labels of `filename` are written.
pub fn output_file_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| sanitize_filename::sanitize(name.to_string_lossy()))
        .unwrap_or_else(|| sanitize_filename::sanitize(filename))
}

/// Name of the `aug_idx`-th variant of `file_name`; index 0 is the original.
pub fn augmented_file_name(file_name: &str, aug_idx: usize) -> String {
    if aug_idx == 0 {
        return file_name.to_string();
    }
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    match path.extension() {
        Some(extension) => format!("{}_aug{}.{}", stem, aug_idx, extension.to_string_lossy()),
        None => format!("{}_aug{}", stem, aug_idx),
    }
}

/// Write the label file for one image, overwriting any previous one.
pub fn write_label_file(
    label_path: &Path,
    regions: &[Region],
    schema: &ClassSchema,
    image_width: u32,
    image_height: u32,
) -> std::io::Result<()> {
    let yolo_data = convert_to_yolo_format(regions, schema, image_width, image_height);
    let mut writer = BufWriter::new(File::create(label_path)?);
    writer.write_all(yolo_data.as_bytes())?;
    writer.flush()
}

/// Process a single VIA entry: load the source image, augment it when it
/// belongs to the train split, and write every image with its label file.
///
/// A missing or unreadable source image is logged and counted, not an error.
pub fn process_entry(
    filename: &str,
    entry: &ViaImage,
    split: Split,
    source_dir: &Path,
    output_dirs: &OutputDirs,
    schema: &ClassSchema,
) -> Result<ProcessingStats> {
    let mut stats = ProcessingStats::new();
    stats.total_entries += 1;

    let source_path = source_dir.join(filename);
    if !source_path.exists() {
        warn!("Image not found: {}", source_path.display());
        stats.skipped_missing_image += 1;
        return Ok(stats);
    }

    let image = match image::open(&source_path) {
        // Alpha is dropped so every variant can be written as JPEG
        Ok(image) => DynamicImage::ImageRgb8(image.to_rgb8()),
        Err(e) => {
            error!("Could not read image {}: {}", source_path.display(), e);
            stats.skipped_unreadable_image += 1;
            return Ok(stats);
        }
    };

    let file_name = output_file_name(filename);

    let variants = match split {
        Split::Train => augment_image(&image, &entry.regions),
        Split::Val => vec![(image, entry.regions.as_slice())],
    };

    for (aug_idx, (variant, regions)) in variants.iter().enumerate() {
        let aug_file_name = augmented_file_name(&file_name, aug_idx);
        let image_output_path = output_dirs.images_dir(split).join(&aug_file_name);
        variant.save(&image_output_path)?;

        let (width, height) = variant.dimensions();
        let label_output_path = output_dirs
            .labels_dir(split)
            .join(&aug_file_name)
            .with_extension("txt");
        write_label_file(&label_output_path, regions, schema, width, height)?;

        if aug_idx > 0 {
            stats.augmented_images += 1;
        }
        stats.processed_images += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ClassSpec;

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: [f64; 4], expected: [f64; 4]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < EPSILON, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_rect_to_yolo() {
        assert_close(
            rect_to_yolo(10.0, 10.0, 10.0, 10.0, 100.0, 100.0),
            [0.15, 0.15, 0.1, 0.1],
        );
        assert_close(
            rect_to_yolo(0.0, 50.0, 200.0, 100.0, 400.0, 200.0),
            [0.25, 0.5, 0.5, 0.5],
        );
    }

    #[test]
    fn test_rect_past_the_edge_is_not_clamped() {
        let bbox = rect_to_yolo(90.0, -20.0, 40.0, 10.0, 100.0, 100.0);
        assert_close(bbox, [1.1, -0.15, 0.4, 0.1]);
    }

    #[test]
    fn test_round_trip() {
        for &(x, y, w, h, iw, ih) in &[
            (12.0, 7.5, 33.0, 41.0, 640.0, 480.0),
            (0.0, 0.0, 1.0, 1.0, 1.0, 1.0),
            (1023.0, 5.0, 300.0, 2000.0, 1700.0, 2200.0),
        ] {
            let bbox = rect_to_yolo(x, y, w, h, iw, ih);
            assert_close(yolo_to_rect(bbox, iw, ih), [x, y, w, h]);
        }
    }

    #[test]
    fn test_date_region_is_written_five_times() {
        let schema = ClassSchema::default();
        let regions = vec![Region::rect(10.0, 10.0, 10.0, 10.0, Some("date"))];
        let yolo_data = convert_to_yolo_format(&regions, &schema, 100, 100);

        let lines: Vec<_> = yolo_data.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines
            .iter()
            .all(|line| *line == "0 0.150000 0.150000 0.100000 0.100000"));
    }

    #[test]
    fn test_skipped_regions() {
        let schema = ClassSchema::default();
        let polygon = Region {
            shape_attributes: ShapeAttributes::Other,
            ..Region::rect(0.0, 0.0, 1.0, 1.0, Some("date"))
        };
        let regions = vec![
            Region::rect(0.0, 0.0, 10.0, 10.0, Some("footer")),
            Region::rect(0.0, 0.0, 10.0, 10.0, None),
            Region::rect(0.0, 0.0, 10.0, 10.0, Some("")),
            polygon,
        ];
        assert_eq!(convert_to_yolo_format(&regions, &schema, 100, 100), "");
    }

    #[test]
    fn test_lines_follow_region_order() {
        let schema = ClassSchema::new(vec![
            ClassSpec::new("a", 2.0, [0, 0, 0]),
            ClassSpec::new("b", 1.0, [0, 0, 0]),
        ])
        .unwrap();
        let regions = vec![
            Region::rect(0.0, 0.0, 50.0, 50.0, Some("b")),
            Region::rect(50.0, 50.0, 50.0, 50.0, Some("a")),
        ];
        let yolo_data = convert_to_yolo_format(&regions, &schema, 100, 100);
        assert_eq!(
            yolo_data,
            "1 0.250000 0.250000 0.500000 0.500000\n\
             0 0.750000 0.750000 0.500000 0.500000\n\
             0 0.750000 0.750000 0.500000 0.500000\n"
        );
    }

    #[test]
    fn test_augmented_file_name() {
        assert_eq!(augmented_file_name("page.jpg", 0), "page.jpg");
        assert_eq!(augmented_file_name("page.jpg", 3), "page_aug3.jpg");
        assert_eq!(augmented_file_name("page.v2.png", 1), "page.v2_aug1.png");
        assert_eq!(augmented_file_name("page", 2), "page_aug2");
    }
}
