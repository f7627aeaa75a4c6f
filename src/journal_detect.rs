use clap::Parser;

use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use journal2yolo::annotate::load_font;
use journal2yolo::{
    collect_images, process_image, ClassSchema, DetectArgs, Device, ExternalDetector, Result,
};

fn run(args: &DetectArgs, schema: &ClassSchema) -> Result<()> {
    let device = args.device.unwrap_or_else(Device::detect);
    let mut detector = ExternalDetector::new(
        args.python.clone(),
        args.detect_script.clone(),
        args.weights.clone(),
        device,
        args.conf,
    )?;
    let font = load_font(args.font.as_deref());

    let process = |detector: &mut ExternalDetector, image_path: &Path| {
        process_image(
            detector,
            image_path,
            args.conf,
            schema,
            &args.results_dir,
            font.as_ref(),
        )
    };

    if let Some(image_path) = &args.image {
        process(&mut detector, image_path)?;
    } else if let Some(image_dir) = &args.dir {
        for image_path in collect_images(image_dir)? {
            info!("Processing {}", image_path.display());
            process(&mut detector, &image_path)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = DetectArgs::parse();

    if args.image.is_none() && args.dir.is_none() {
        println!("Please provide either --image or --dir argument");
        return ExitCode::SUCCESS;
    }

    let schema = match ClassSchema::load(args.schema.as_deref()) {
        Ok(schema) => schema,
        Err(e) => {
            error!("Failed to load class schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &schema) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Detection failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
