use glob::{glob, Pattern};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::schema::ClassSchema;
use crate::types::{OutputDirs, IMG_FORMATS};
use crate::utils::create_output_directory;

pub const DATASET_YAML: &str = "journal.yaml";

/// Set up the directory structure for YOLO dataset output
pub fn setup_output_directories(dataset_dir: &Path) -> std::io::Result<OutputDirs> {
    let dataset_dir = create_output_directory(dataset_dir)?;
    let labels_dir = create_output_directory(&dataset_dir.join("labels"))?;
    let images_dir = create_output_directory(&dataset_dir.join("images"))?;

    let train_labels_dir = create_output_directory(&labels_dir.join("train"))?;
    let val_labels_dir = create_output_directory(&labels_dir.join("val"))?;
    let train_images_dir = create_output_directory(&images_dir.join("train"))?;
    let val_images_dir = create_output_directory(&images_dir.join("val"))?;

    Ok(OutputDirs {
        dataset_dir,
        train_labels_dir,
        val_labels_dir,
        train_images_dir,
        val_images_dir,
    })
}

// Key order is the order the trainer documents: path, train, val, nc, names
#[derive(Debug, Serialize)]
struct DatasetYaml<'a> {
    path: String,
    train: String,
    val: String,
    nc: usize,
    names: Vec<&'a str>,
}

/// Create the dataset yaml file consumed by the YOLOv5 trainer and return its path
pub fn create_dataset_yaml(output_dirs: &OutputDirs, schema: &ClassSchema) -> Result<PathBuf> {
    let absolute_path = fs::canonicalize(&output_dirs.dataset_dir)?;
    let content = DatasetYaml {
        path: absolute_path.to_string_lossy().into_owned(),
        train: absolute_path
            .join("images")
            .join("train")
            .to_string_lossy()
            .into_owned(),
        val: absolute_path
            .join("images")
            .join("val")
            .to_string_lossy()
            .into_owned(),
        nc: schema.len(),
        names: schema.names(),
    };

    let dataset_yaml_path = output_dirs.dataset_dir.join(DATASET_YAML);
    let mut writer = BufWriter::new(File::create(&dataset_yaml_path)?);
    serde_yaml::to_writer(&mut writer, &content)?;
    writer.flush()?;
    Ok(dataset_yaml_path)
}

/// Collect the images directly inside `dir` (no recursion), sorted by path
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let mut images = Vec::new();
    for ext in IMG_FORMATS {
        let pattern = format!("{}/*.{}", escaped, ext);
        let entries = glob(&pattern).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?;
        images.extend(entries.filter_map(|entry| entry.ok()).filter(|path| path.is_file()));
    }
    images.sort();
    Ok(images)
}
