use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

// Only the images in these formats are picked up in directory mode
pub const IMG_FORMATS: &[&str] = &["jpg"];

// The element type whose presence triggers augmentation
pub const DATE_CLASS: &str = "date";

// The shape of a VIA region. Only rectangles become labels; every other
// VIA shape (polygon, circle, ellipse, point, polyline) is kept as `Other`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ShapeAttributes {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    #[default]
    #[serde(other)]
    Other,
}

// Shapes without a usable `name` tag, or with malformed rect fields, become `Other`
fn lenient_shape<'de, D>(deserializer: D) -> Result<ShapeAttributes, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeShape {
        Known(ShapeAttributes),
        Unknown(IgnoredAny),
    }

    Ok(match MaybeShape::deserialize(deserializer)? {
        MaybeShape::Known(shape) => shape,
        MaybeShape::Unknown(_) => ShapeAttributes::Other,
    })
}

// A single annotated region of an image
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Region {
    #[serde(default, deserialize_with = "lenient_shape")]
    pub shape_attributes: ShapeAttributes,
    #[serde(default)]
    pub region_attributes: Map<String, Value>,
}

impl Region {
    /// Build a rectangular region, optionally tagged with an element type.
    pub fn rect(x: f64, y: f64, width: f64, height: f64, element_type: Option<&str>) -> Self {
        let mut region_attributes = Map::new();
        if let Some(element_type) = element_type {
            region_attributes.insert(
                "element_type".to_string(),
                Value::String(element_type.to_string()),
            );
        }
        Self {
            shape_attributes: ShapeAttributes::Rect {
                x,
                y,
                width,
                height,
            },
            region_attributes,
        }
    }

    /// The `element_type` attribute, if it is present and a string.
    pub fn element_type(&self) -> Option<&str> {
        self.region_attributes
            .get("element_type")
            .and_then(Value::as_str)
            .filter(|element_type| !element_type.is_empty())
    }
}

// The annotation information of one image in a VIA export
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViaImage {
    pub filename: String,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl ViaImage {
    pub fn has_element_type(&self, element_type: &str) -> bool {
        has_element_type(&self.regions, element_type)
    }
}

pub fn has_element_type(regions: &[Region], element_type: &str) -> bool {
    regions
        .iter()
        .any(|region| region.element_type() == Some(element_type))
}

// The subset an entry is assigned to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Struct to hold the paths to the output directories for train/val splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub dataset_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: Split) -> &PathBuf {
        match split {
            Split::Train => &self.train_images_dir,
            Split::Val => &self.val_images_dir,
        }
    }

    pub fn labels_dir(&self, split: Split) -> &PathBuf {
        match split {
            Split::Train => &self.train_labels_dir,
            Split::Val => &self.val_labels_dir,
        }
    }
}

// Struct to hold the split datasets for training and validation
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub train_entries: Vec<(String, ViaImage)>,
    pub val_entries: Vec<(String, ViaImage)>,
}

impl SplitData {
    pub fn entries(&self, split: Split) -> &[(String, ViaImage)] {
        match split {
            Split::Train => &self.train_entries,
            Split::Val => &self.val_entries,
        }
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_entries: usize,
    pub processed_images: usize,
    pub augmented_images: usize,
    pub skipped_missing_image: usize,
    pub skipped_unreadable_image: usize,
    pub skipped_duplicate_entry: usize,
    pub failed_entries: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine the counters of two partial runs.
    pub fn merge(mut self, other: Self) -> Self {
        self.total_entries += other.total_entries;
        self.processed_images += other.processed_images;
        self.augmented_images += other.augmented_images;
        self.skipped_missing_image += other.skipped_missing_image;
        self.skipped_unreadable_image += other.skipped_unreadable_image;
        self.skipped_duplicate_entry += other.skipped_duplicate_entry;
        self.failed_entries += other.failed_entries;
        self
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total entries: {}", self.total_entries);
        log::info!(
            "Successfully processed {} images ({} augmented)",
            self.processed_images,
            self.augmented_images
        );
        log::info!("Skipped (missing image file): {}", self.skipped_missing_image);
        log::info!(
            "Skipped (unreadable image file): {}",
            self.skipped_unreadable_image
        );
        log::info!(
            "Skipped (superseded duplicate file name): {}",
            self.skipped_duplicate_entry
        );
        log::info!("Failed entries: {}", self.failed_entries);

        let total_skipped = self.skipped_missing_image + self.skipped_unreadable_image;
        if total_skipped > 0 {
            log::warn!(
                "Total skipped entries: {} (missing image file: {}, unreadable image file: {})",
                total_skipped,
                self.skipped_missing_image,
                self.skipped_unreadable_image
            );
        }
    }
}
