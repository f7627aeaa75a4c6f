use clap::Parser;

use log::{error, info};
use std::process::ExitCode;

use journal2yolo::{process_dataset, run_training, ClassSchema, PrepareArgs, TrainConfig};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = PrepareArgs::parse();

    if !args.annotations.exists() {
        error!(
            "The specified annotations file does not exist: {}",
            args.annotations.display()
        );
        return ExitCode::FAILURE;
    }

    let schema = match ClassSchema::load(args.schema.as_deref()) {
        Ok(schema) => schema,
        Err(e) => {
            error!("Failed to load class schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting the conversion process...");
    let dataset_yaml = match process_dataset(&args, &schema) {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.no_train {
        info!("Skipping training, dataset config at {}", dataset_yaml.display());
        return ExitCode::SUCCESS;
    }

    match run_training(&TrainConfig::from(&args), &dataset_yaml) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Training failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
