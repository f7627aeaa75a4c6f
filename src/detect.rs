use ab_glyph::FontVec;
use log::{error, info, warn};
use std::path::Path;

use crate::annotate::annotate_image;
use crate::error::Result;
use crate::schema::ClassSchema;
use crate::utils::{create_output_directory, file_name_lossy};

/// One box as reported by a detector, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawDetection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }
}

/// An object detector: given an image, return every box it found.
pub trait Detector {
    fn detect(&mut self, image: &image::DynamicImage) -> Result<Vec<RawDetection>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`, truncated to whole pixels
    pub bbox: [i32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDetections {
    pub class_id: usize,
    pub name: String,
    pub detections: Vec<Detection>,
}

/// Detections of one image grouped by class, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub classes: Vec<ClassDetections>,
}

impl DetectionSummary {
    pub fn get(&self, name: &str) -> Option<&[Detection]> {
        self.classes
            .iter()
            .find(|class| class.name == name)
            .map(|class| class.detections.as_slice())
    }

    pub fn total(&self) -> usize {
        self.classes.iter().map(|class| class.detections.len()).sum()
    }

    pub fn print_summary(&self, image_name: &str) {
        info!("Results for {}:", image_name);
        for class in self.classes.iter().filter(|class| !class.detections.is_empty()) {
            info!("{}: {} detections", class.name, class.detections.len());
            for (i, detection) in class.detections.iter().enumerate() {
                info!("  {}. Confidence: {:.2}", i + 1, detection.confidence);
            }
        }
    }
}

/// Keep the detections with `confidence >= threshold` and group them by class.
/// Class ids outside the schema are dropped with a warning.
pub fn filter_detections(
    raw: &[RawDetection],
    threshold: f32,
    schema: &ClassSchema,
) -> DetectionSummary {
    let mut classes: Vec<ClassDetections> = schema
        .classes()
        .iter()
        .enumerate()
        .map(|(class_id, class)| ClassDetections {
            class_id,
            name: class.name.clone(),
            detections: Vec::new(),
        })
        .collect();

    for detection in raw.iter().filter(|d| d.confidence >= threshold) {
        let Some(class) = classes.get_mut(detection.class_id) else {
            warn!(
                "Dropping detection with unknown class id {} (schema has {} classes)",
                detection.class_id,
                schema.len()
            );
            continue;
        };
        class.detections.push(Detection {
            confidence: detection.confidence,
            bbox: [
                detection.x1 as i32,
                detection.y1 as i32,
                detection.x2 as i32,
                detection.y2 as i32,
            ],
        });
    }

    DetectionSummary { classes }
}

/// Detect layout regions on one image, save an annotated copy as
/// `<results_dir>/detected_<file name>` and log the per-class summary.
///
/// Returns `Ok(None)` when the image cannot be read.
pub fn process_image<D: Detector + ?Sized>(
    detector: &mut D,
    image_path: &Path,
    threshold: f32,
    schema: &ClassSchema,
    results_dir: &Path,
    font: Option<&FontVec>,
) -> Result<Option<DetectionSummary>> {
    let image = match image::open(image_path) {
        Ok(image) => image,
        Err(e) => {
            error!("Could not read image {}: {}", image_path.display(), e);
            return Ok(None);
        }
    };

    let raw = detector.detect(&image)?;
    let summary = filter_detections(&raw, threshold, schema);
    let annotated = annotate_image(&image, &summary, schema, font);

    let file_name = file_name_lossy(image_path);
    summary.print_summary(&file_name);

    create_output_directory(results_dir)?;
    let output_path = results_dir.join(format!("detected_{}", file_name));
    annotated.save(&output_path)?;
    info!("Annotated image saved to: {}", output_path.display());

    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_filters_and_groups() {
        let schema = ClassSchema::default();
        let raw = [
            RawDetection::new(10.0, 10.0, 50.0, 50.0, 0.9, 0),
            RawDetection::new(5.0, 5.0, 20.0, 20.0, 0.3, 1),
        ];
        let summary = filter_detections(&raw, 0.5, &schema);

        assert_eq!(summary.total(), 1);
        assert_eq!(
            summary.get("date").unwrap(),
            &[Detection {
                confidence: 0.9,
                bbox: [10, 10, 50, 50]
            }]
        );
        assert!(summary.get("title").unwrap().is_empty());
        assert_eq!(summary.classes.len(), schema.len());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let schema = ClassSchema::default();
        let raw = [RawDetection::new(0.0, 0.0, 1.0, 1.0, 0.5, 2)];
        assert_eq!(filter_detections(&raw, 0.5, &schema).total(), 1);
    }

    #[test]
    fn test_unknown_class_is_dropped() {
        let schema = ClassSchema::default();
        let raw = [RawDetection::new(0.0, 0.0, 1.0, 1.0, 0.99, 17)];
        assert_eq!(filter_detections(&raw, 0.5, &schema).total(), 0);
    }

    #[test]
    fn test_bbox_truncates_to_pixels() {
        let schema = ClassSchema::default();
        let raw = [RawDetection::new(10.9, 3.2, 40.7, 60.5, 0.8, 4)];
        let summary = filter_detections(&raw, 0.5, &schema);
        assert_eq!(summary.get("sub_image").unwrap()[0].bbox, [10, 3, 40, 60]);
    }
}
