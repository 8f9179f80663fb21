use std::path::Path;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use crate::common::BvrDetection;

pub const BOX_COLOUR: Rgb<u8> = Rgb([0x36, 0xC1, 0x27]);
pub const LABEL_COLOUR: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);
pub const CANVAS_FILL: Rgb<u8> = Rgb([0, 50, 0]);

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 18.0;

const SYSTEM_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Draws boxes and labels on copies of frames.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("font", &self.font.is_some())
            .field("scale", &self.scale.y)
            .finish()
    }
}

impl Annotator {
    /// Uses `font_path` if it loads, otherwise the first system font that does. Without any font
    /// only boxes are drawn.
    pub fn new(font_path: Option<&Path>) -> Self {
        let configured = font_path.and_then(|path| {
            let font = load_font(path);
            if font.is_none() {
                log::warn!("Label font {} could not be loaded, trying system fonts", path.display());
            }
            font
        });
        let font = configured.or_else(|| SYSTEM_FONTS.iter().find_map(|p| load_font(Path::new(p))));
        if font.is_none() {
            log::warn!("No label font could be loaded, detections will be drawn without labels");
        }
        Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
        }
    }

    pub fn without_font() -> Self {
        Self {
            font: None,
            scale: PxScale::from(LABEL_SCALE),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(&self, frame: &RgbImage, detections: &[BvrDetection]) -> RgbImage {
        let mut img = frame.clone();
        for det in detections {
            let (x, y, w, h) = det.bbox.as_xy_wh_i32();
            for t in 0..BOX_THICKNESS {
                let (rw, rh) = (w - 2 * t, h - 2 * t);
                if rw <= 0 || rh <= 0 {
                    break;
                }
                draw_hollow_rect_mut(&mut img, Rect::at(x + t, y + t).of_size(rw as u32, rh as u32), BOX_COLOUR);
            }

            if let Some(font) = &self.font {
                let label_y = (y - self.scale.y as i32 - 1).max(0);
                draw_text_mut(&mut img, LABEL_COLOUR, x.max(0), label_y, self.scale, font, &det.get_label());
            }
        }
        img
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            log::debug!("Loaded label font {}", path.display());
            Some(font)
        }
        Err(err) => {
            log::debug!("Skipping font {}: {}", path.display(), err);
            None
        }
    }
}
