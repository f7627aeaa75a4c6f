use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::yolov5::Device;

pub const DEFAULT_DETECT_WEIGHTS: &str = "yolov5/runs/train/exp7/weights/best.pt";

/// Convert a VIA journal-layout export to a YOLO dataset and train YOLOv5 on it.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct PrepareArgs {
    /// VIA project (or annotation) export
    #[arg(short = 'a', long = "annotations", default_value = "labeled_journals.json")]
    pub annotations: PathBuf,

    /// Directory holding the annotated journal scans
    #[arg(long = "images_dir", default_value = "SampleJournals")]
    pub images_dir: PathBuf,

    /// Root of the generated YOLO dataset
    #[arg(long = "dataset_dir", default_value = "dataset")]
    pub dataset_dir: PathBuf,

    /// Proportion of the entries that go to the training split
    #[arg(long = "split_ratio", default_value_t = 0.8, value_parser = validate_ratio)]
    pub split_ratio: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// YAML class schema (names, weights, colors); the journal classes by default
    #[arg(long = "schema")]
    pub schema: Option<PathBuf>,

    /// Number of training epochs
    #[arg(long = "epochs", default_value_t = 200)]
    pub epochs: u32,

    /// Training batch size
    #[arg(long = "batch", default_value_t = 16)]
    pub batch: u32,

    /// Training image size in pixels
    #[arg(long = "img", default_value_t = 640)]
    pub img: u32,

    /// Pretrained weights to start from
    #[arg(long = "weights", default_value = "yolov5s.pt")]
    pub weights: String,

    /// Epochs without improvement before early stopping
    #[arg(long = "patience", default_value_t = 50)]
    pub patience: u32,

    /// Do not cache images in memory while training
    #[arg(long = "no_cache")]
    pub no_cache: bool,

    /// Python interpreter used to run YOLOv5
    #[arg(long = "python", default_value = "python3")]
    pub python: PathBuf,

    /// YOLOv5 training script
    #[arg(long = "train_script", default_value = "yolov5/train.py")]
    pub train_script: PathBuf,

    /// Only build the dataset, do not start training
    #[arg(long = "no_train")]
    pub no_train: bool,
}

/// Run the trained journal-layout detector on images.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct DetectArgs {
    /// Path to journal image
    #[arg(long = "image", conflicts_with = "dir")]
    pub image: Option<PathBuf>,

    /// Path to directory of journal images (*.jpg, not recursive)
    #[arg(long = "dir")]
    pub dir: Option<PathBuf>,

    /// Confidence threshold
    #[arg(long = "conf", default_value_t = 0.5, value_parser = validate_conf)]
    pub conf: f32,

    /// Trained weights
    #[arg(long = "weights", default_value = DEFAULT_DETECT_WEIGHTS)]
    pub weights: PathBuf,

    /// YAML class schema; must match the one the dataset was built with
    #[arg(long = "schema")]
    pub schema: Option<PathBuf>,

    /// Directory for the annotated images
    #[arg(long = "results_dir", default_value = "results")]
    pub results_dir: PathBuf,

    /// Python interpreter used to run YOLOv5
    #[arg(long = "python", default_value = "python3")]
    pub python: PathBuf,

    /// YOLOv5 detection script
    #[arg(long = "detect_script", default_value = "yolov5/detect.py")]
    pub detect_script: PathBuf,

    /// TrueType font for the box labels; common system fonts are tried otherwise
    #[arg(long = "font")]
    pub font: Option<PathBuf>,

    /// Compute device ('cpu' or a CUDA index); picked by availability when omitted
    #[arg(long = "device")]
    pub device: Option<Device>,
}

// Validate that the ratio is between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

// Validate that the confidence threshold is between 0.0 and 1.0
pub fn validate_conf(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("CONF must be between 0.0 and 1.0".to_string()),
    }
}
