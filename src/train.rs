//! Driver for the external YOLOv5 trainer.

use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::PrepareArgs;
use crate::error::{Error, Result};

/// Hyperparameters and locations handed to `train.py`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub python: PathBuf,
    pub script: PathBuf,
    pub img_size: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub weights: String,
    pub cache: bool,
    pub patience: u32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            script: PathBuf::from("yolov5/train.py"),
            img_size: 640,
            batch_size: 16,
            epochs: 200,
            weights: "yolov5s.pt".to_string(),
            cache: true,
            patience: 50,
        }
    }
}

impl From<&PrepareArgs> for TrainConfig {
    fn from(args: &PrepareArgs) -> Self {
        Self {
            python: args.python.clone(),
            script: args.train_script.clone(),
            img_size: args.img,
            batch_size: args.batch,
            epochs: args.epochs,
            weights: args.weights.clone(),
            cache: !args.no_cache,
            patience: args.patience,
        }
    }
}

pub fn build_command(config: &TrainConfig, data_yaml: &Path) -> Command {
    let mut command = Command::new(&config.python);
    command
        .arg(&config.script)
        .arg("--img")
        .arg(config.img_size.to_string())
        .arg("--batch")
        .arg(config.batch_size.to_string())
        .arg("--epochs")
        .arg(config.epochs.to_string())
        .arg("--data")
        .arg(data_yaml)
        .arg("--weights")
        .arg(&config.weights);
    if config.cache {
        command.arg("--cache");
    }
    command.arg("--patience").arg(config.patience.to_string());
    command
}

/// Run the trainer and block until it exits. A non-zero exit is an error.
pub fn run_training(config: &TrainConfig, data_yaml: &Path) -> Result<()> {
    info!("Starting training with {} epochs", config.epochs);
    info!("Using configuration file: {}", data_yaml.display());

    let status = build_command(config, data_yaml)
        .status()
        .map_err(|source| Error::Spawn {
            program: config.python.display().to_string(),
            source,
        })?;

    if !status.success() {
        return Err(Error::TrainingFailed { status });
    }
    info!("Training finished");
    Ok(())
}
