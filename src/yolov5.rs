//! [`Detector`] backed by the YOLOv5 `detect.py` script.
//!
//! Each call writes the image into a scratch directory, runs the script with
//! `--save-txt --save-conf` and reads the normalized boxes back from the
//! generated label file.

use image::{DynamicImage, GenericImageView};
use log::{debug, info};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::conversion::yolo_to_rect;
use crate::detect::{Detector, RawDetection};
use crate::error::{Error, Result};

const SOURCE_STEM: &str = "page";
const RUN_NAME: &str = "run";
const STDERR_TAIL: usize = 2000;

/// Compute device passed to YOLOv5 as `--device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda(u32),
    Cpu,
}

impl Device {
    /// Prefer the first CUDA device when `nvidia-smi` answers, else the CPU.
    pub fn detect() -> Self {
        let probe = Command::new("nvidia-smi")
            .arg("--query-gpu=name")
            .arg("--format=csv,noheader")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if probe.is_ok_and(|status| status.success()) {
            Device::Cuda(0)
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda(index) => write!(f, "{}", index),
            Device::Cpu => f.write_str("cpu"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Device::Cpu);
        }
        let index = s.strip_prefix("cuda:").unwrap_or(&s);
        if s == "cuda" {
            return Ok(Device::Cuda(0));
        }
        index
            .parse()
            .map(Device::Cuda)
            .map_err(|_| format!("unknown device '{}', expected 'cpu' or a CUDA index", s))
    }
}

#[derive(Debug, Clone)]
pub struct ExternalDetector {
    python: PathBuf,
    script: PathBuf,
    weights: PathBuf,
    device: Device,
    conf_thres: f32,
}

impl ExternalDetector {
    pub fn new(
        python: PathBuf,
        script: PathBuf,
        weights: PathBuf,
        device: Device,
        conf_thres: f32,
    ) -> Result<Self> {
        if !weights.exists() {
            return Err(Error::MissingWeights(weights));
        }
        info!("Using device: {}", device);
        Ok(Self {
            python,
            script,
            weights,
            device,
            conf_thres,
        })
    }

    pub fn build_command(&self, source: &Path, project: &Path) -> Command {
        let mut command = Command::new(&self.python);
        command
            .arg(&self.script)
            .arg("--weights")
            .arg(&self.weights)
            .arg("--source")
            .arg(source)
            .arg("--conf-thres")
            .arg(self.conf_thres.to_string())
            .arg("--device")
            .arg(self.device.to_string())
            .args(["--save-txt", "--save-conf", "--nosave", "--exist-ok"])
            .arg("--project")
            .arg(project)
            .arg("--name")
            .arg(RUN_NAME);
        command
    }
}

impl Detector for ExternalDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let workdir = tempfile::Builder::new()
            .prefix("journal_detect")
            .tempdir()?;
        let source = workdir.path().join(format!("{}.png", SOURCE_STEM));
        image.save(&source)?;

        let output = self
            .build_command(&source, workdir.path())
            .output()
            .map_err(|source| Error::Spawn {
                program: self.python.display().to_string(),
                source,
            })?;
        debug!("detect.py: {}", String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let start = (start..stderr.len())
                .find(|&i| stderr.is_char_boundary(i))
                .unwrap_or(stderr.len());
            return Err(Error::DetectionFailed {
                status: output.status,
                stderr: stderr[start..].trim().to_string(),
            });
        }

        let labels = workdir
            .path()
            .join(RUN_NAME)
            .join("labels")
            .join(format!("{}.txt", SOURCE_STEM));
        if !labels.exists() {
            // YOLOv5 writes no label file for an image without detections
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&labels)?;
        let (width, height) = image.dimensions();
        parse_yolo_detections(&content, width, height)
    }
}

/// Parse `class x_center y_center width height confidence` lines (normalized
/// units) into pixel-space detections for an image of the given size.
pub fn parse_yolo_detections(content: &str, width: u32, height: u32) -> Result<Vec<RawDetection>> {
    let malformed = |line: &str, reason: &str| Error::MalformedDetection {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut detections = Vec::new();
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let fields: Vec<_> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(malformed(line, "expected 6 fields"));
        }
        let class_id: usize = fields[0]
            .parse()
            .map_err(|_| malformed(line, "invalid class id"))?;
        let mut values = [0.0f64; 5];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            *value = field
                .parse()
                .map_err(|_| malformed(line, "invalid number"))?;
        }
        let [x_center, y_center, box_width, box_height, confidence] = values;

        let [x, y, w, h] = yolo_to_rect(
            [x_center, y_center, box_width, box_height],
            f64::from(width),
            f64::from(height),
        );
        detections.push(RawDetection::new(
            x as f32,
            y as f32,
            (x + w) as f32,
            (y + h) as f32,
            confidence as f32,
            class_id,
        ));
    }
    Ok(detections)
}
