//! Drawing of detections onto a copy of the input image.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::detect::DetectionSummary;
use crate::schema::ClassSchema;

pub const LINE_THICKNESS: u32 = 2;
pub const LABEL_SCALE: f32 = 16.0;
pub const LABEL_OFFSET: i32 = 5;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn read_font(path: &Path) -> Option<FontVec> {
    let data = fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Load the label font from `path`, or from the first usable system font.
/// Returns `None` when no font can be loaded; only boxes are drawn then.
pub fn load_font(path: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = path {
        match read_font(path) {
            Some(font) => return Some(font),
            None => warn!("Could not load font {}", path.display()),
        }
    }
    for candidate in FONT_CANDIDATES {
        if let Some(font) = read_font(Path::new(candidate)) {
            debug!("Using font {}", candidate);
            return Some(font);
        }
    }
    warn!("No usable font found, detections are drawn without labels");
    None
}

fn color_of(schema: &ClassSchema, class_id: usize) -> Rgb<u8> {
    schema
        .get(class_id)
        .map_or(Rgb([128, 128, 128]), |class| Rgb(class.color))
}

fn draw_box(canvas: &mut RgbImage, bbox: [i32; 4], color: Rgb<u8>) {
    // Edges beyond the margin fall outside the canvas anyway
    let margin = LINE_THICKNESS as i32;
    let clamp_x = |x: i32| x.clamp(-margin, canvas.width() as i32 + margin);
    let clamp_y = |y: i32| y.clamp(-margin, canvas.height() as i32 + margin);

    let [x1, y1, x2, y2] = bbox;
    let (x1, x2) = (clamp_x(x1), clamp_x(x2));
    let (y1, y2) = (clamp_y(y1), clamp_y(y2));
    let (x_min, x_max) = (x1.min(x2), x1.max(x2));
    let (y_min, y_max) = (y1.min(y2), y1.max(y2));
    let width = (x_max - x_min).max(1) as u32;
    let height = (y_max - y_min).max(1) as u32;

    for inset in 0..LINE_THICKNESS {
        if width <= 2 * inset || height <= 2 * inset {
            break;
        }
        let rect = Rect::at(x_min + inset as i32, y_min + inset as i32)
            .of_size(width - 2 * inset, height - 2 * inset);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Draw every detection of `summary` in its class color, with a
/// `"<class> <confidence>"` label above the box when a font is available.
pub fn annotate_image(
    image: &DynamicImage,
    summary: &DetectionSummary,
    schema: &ClassSchema,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let scale = PxScale::from(LABEL_SCALE);

    for class in &summary.classes {
        let color = color_of(schema, class.class_id);
        for detection in &class.detections {
            draw_box(&mut canvas, detection.bbox, color);

            if let Some(font) = font {
                let [x1, y1, _, _] = detection.bbox;
                let text = format!("{} {:.2}", class.name, detection.confidence);
                let (_, text_height) = text_size(scale, font, &text);
                let x = x1.clamp(0, canvas.width() as i32);
                let y = y1
                    .saturating_sub(LABEL_OFFSET + text_height as i32)
                    .clamp(0, canvas.height() as i32);
                draw_text_mut(&mut canvas, color, x, y, scale, font, &text);
            }
        }
    }

    canvas
}
