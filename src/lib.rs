//! VIA journal-layout annotations to YOLO dataset converter
//!
//! This library turns a VIA export of annotated journal scans into a YOLO
//! dataset (with date-focused augmentation and weighted oversampling), drives
//! the external YOLOv5 trainer on it, and runs the trained detector on new
//! pages.

pub mod annotate;
pub mod augment;
pub mod config;
pub mod conversion;
pub mod detect;
pub mod error;
pub mod io;
pub mod schema;
pub mod train;
pub mod types;
pub mod utils;
pub mod via;
pub mod yolo_dataset;
pub mod yolov5;

// Re-export commonly used types and functions
pub use config::{DetectArgs, PrepareArgs};
pub use detect::{process_image, DetectionSummary, Detector, RawDetection};
pub use error::{Error, Result};
pub use io::{collect_images, create_dataset_yaml, setup_output_directories};
pub use schema::{ClassSchema, ClassSpec};
pub use train::{run_training, TrainConfig};
pub use types::{OutputDirs, ProcessingStats, Region, Split, SplitData, ViaImage};
pub use yolo_dataset::{process_dataset, split_entries};
pub use yolov5::{Device, ExternalDetector};
