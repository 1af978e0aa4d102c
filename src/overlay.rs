//! Overlay rendering.
//!
//! `render` maps a prediction set to draw calls on an `OverlaySurface`. Each
//! call resets the surface to the frame's native size first, so nothing from
//! a previous prediction set survives. Per prediction it draws:
//! - the box outline in the class stroke colour
//! - a label plate sized to the measured label width, just above the box
//! - the label text `"<class> <percent>%"` on the plate
//!
//! Two surfaces ship with the crate: `DrawList` records commands, and
//! `RasterOverlay` paints boxes, plates and glyphs into a transparent RGBA
//! image that can be saved as PNG.

use ab_glyph::{FontRef, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::path::Path;

use crate::detect::{BoundingBox, Prediction};
use crate::frame::FrameDimensions;

static LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Label font size in pixels.
pub const FONT_PX: f32 = 16.0;
/// Per-character advance `DrawList` uses in place of real font metrics.
pub const GLYPH_ADVANCE: f32 = FONT_PX * 0.6;
/// Padding between the plate edge and the label text.
pub const LABEL_PADDING: f32 = 2.0;
/// Total height of a label plate.
pub const LABEL_HEIGHT: f32 = FONT_PX + 2.0 * LABEL_PADDING;

// ----------------------------------------------------------------------------
// Styles
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassStyle {
    pub stroke: Rgba<u8>,
    pub fill: Rgba<u8>,
    pub text: Rgba<u8>,
    pub line_width: f32,
}

impl ClassStyle {
    /// Stroke in `colour`, opaque plate in the same colour, black text.
    pub fn solid(colour: [u8; 3]) -> Self {
        let [r, g, b] = colour;
        Self {
            stroke: Rgba([r, g, b, 255]),
            fill: Rgba([r, g, b, 255]),
            text: Rgba([0, 0, 0, 255]),
            line_width: 2.0,
        }
    }
}

/// Class-keyed style lookup with an explicit fallback for unknown classes.
#[derive(Clone, Debug)]
pub struct StyleTable {
    styles: HashMap<String, ClassStyle>,
    default_style: ClassStyle,
}

impl StyleTable {
    pub fn new(default_style: ClassStyle) -> Self {
        Self {
            styles: HashMap::new(),
            default_style,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>, style: ClassStyle) -> Self {
        self.insert(class, style);
        self
    }

    pub fn insert(&mut self, class: impl Into<String>, style: ClassStyle) {
        self.styles.insert(class.into(), style);
    }

    pub fn style_for(&self, class: &str) -> &ClassStyle {
        self.styles.get(class).unwrap_or(&self.default_style)
    }

    pub fn is_known(&self, class: &str) -> bool {
        self.styles.contains_key(class)
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        StyleTable::new(ClassStyle::solid([0xE0, 0xE0, 0xE0]))
            .with_class("book", ClassStyle::solid([0xFF, 0x6B, 0x35]))
            .with_class("laptop", ClassStyle::solid([0x00, 0xB4, 0xD8]))
    }
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_colour(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(anyhow!("colour '{}' must look like #RRGGBB", value));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).with_context(|| format!("invalid colour '{}'", value))
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

// ----------------------------------------------------------------------------
// Surfaces
// ----------------------------------------------------------------------------

pub trait OverlaySurface {
    /// Drop everything drawn so far and resize to `dims`.
    fn reset(&mut self, dims: FrameDimensions);
    fn stroke_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>, line_width: f32);
    fn fill_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>);
    /// Width of `text` in pixels at `FONT_PX`.
    fn measure_text(&self, text: &str) -> f32;
    /// Draw `text` with its top-left corner at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, colour: Rgba<u8>);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear {
        width: u32,
        height: u32,
    },
    StrokeRect {
        rect: BoundingBox,
        colour: Rgba<u8>,
        line_width: f32,
    },
    FillRect {
        rect: BoundingBox,
        colour: Rgba<u8>,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        colour: Rgba<u8>,
    },
}

/// Surface that records draw commands.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Label texts in draw order.
    pub fn labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl OverlaySurface for DrawList {
    fn reset(&mut self, dims: FrameDimensions) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear {
            width: dims.width,
            height: dims.height,
        });
    }

    fn stroke_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>, line_width: f32) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            colour,
            line_width,
        });
    }

    fn fill_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>) {
        self.commands.push(DrawCommand::FillRect { rect, colour });
    }

    fn measure_text(&self, text: &str) -> f32 {
        monospace_width(text)
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, colour: Rgba<u8>) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            colour,
        });
    }
}

/// Transparent RGBA raster of the overlay layer.
///
/// Labels are rasterized with the bundled DejaVu Sans Mono face at `FONT_PX`;
/// the drawn texts are also kept in `labels()` with their origins.
pub struct RasterOverlay {
    image: RgbaImage,
    font: FontRef<'static>,
    labels: Vec<(String, f32, f32)>,
}

impl RasterOverlay {
    pub fn new() -> Result<Self> {
        let font = FontRef::try_from_slice(LABEL_FONT).context("load label font")?;
        Ok(Self {
            image: RgbaImage::new(0, 0),
            font,
            labels: Vec::new(),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn labels(&self) -> &[(String, f32, f32)] {
        &self.labels
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write overlay png {}", path.display()))
    }

    fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Smallest pixel rect covering `rect`, `None` when it covers nothing.
    fn pixel_rect(&self, rect: BoundingBox) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        let x0 = rect.x.floor();
        let y0 = rect.y.floor();
        let width = (rect.x + rect.w).ceil() - x0;
        let height = (rect.y + rect.h).ceil() - y0;
        if !(width >= 1.0 && height >= 1.0) {
            return None;
        }
        Some(Rect::at(x0 as i32, y0 as i32).of_size(width as u32, height as u32))
    }
}

impl OverlaySurface for RasterOverlay {
    fn reset(&mut self, dims: FrameDimensions) {
        self.image = RgbaImage::new(dims.width, dims.height);
        self.labels.clear();
    }

    fn stroke_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>, line_width: f32) {
        let Some(outer) = self.pixel_rect(rect) else {
            return;
        };
        // Thick outlines grow inwards, one ring per pixel.
        let thickness = line_width.round().max(1.0) as u32;
        for t in 0..thickness {
            let inset = 2 * t;
            if outer.width() <= inset || outer.height() <= inset {
                break;
            }
            let ring = Rect::at(outer.left() + t as i32, outer.top() + t as i32)
                .of_size(outer.width() - inset, outer.height() - inset);
            draw_hollow_rect_mut(&mut self.image, ring, colour);
        }
    }

    fn fill_rect(&mut self, rect: BoundingBox, colour: Rgba<u8>) {
        if let Some(rect) = self.pixel_rect(rect) {
            draw_filled_rect_mut(&mut self.image, rect, colour);
        }
    }

    fn measure_text(&self, text: &str) -> f32 {
        let (width, _) = text_size(PxScale::from(FONT_PX), &self.font, text);
        width as f32
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, colour: Rgba<u8>) {
        if self.is_empty() {
            return;
        }
        draw_text_mut(
            &mut self.image,
            colour,
            x.round() as i32,
            y.round() as i32,
            PxScale::from(FONT_PX),
            &self.font,
            text,
        );
        self.labels.push((text.to_string(), x, y));
    }
}

fn monospace_width(text: &str) -> f32 {
    text.chars().count() as f32 * GLYPH_ADVANCE
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// Clear `surface` to `dims` and draw every prediction.
pub fn render<S: OverlaySurface + ?Sized>(
    surface: &mut S,
    predictions: &[Prediction],
    dims: FrameDimensions,
    styles: &StyleTable,
) {
    surface.reset(dims);
    for prediction in predictions {
        let style = styles.style_for(&prediction.class_label);
        surface.stroke_rect(prediction.bbox, style.stroke, style.line_width);

        let label = prediction.label();
        let plate = label_plate(prediction.bbox, surface.measure_text(&label));
        surface.fill_rect(plate, style.fill);
        surface.fill_text(
            &label,
            plate.x + LABEL_PADDING,
            plate.y + LABEL_PADDING,
            style.text,
        );
    }
}

/// Label plate rectangle for a box whose label measures `text_width`.
pub fn label_plate(bbox: BoundingBox, text_width: f32) -> BoundingBox {
    BoundingBox::new(
        bbox.x,
        (bbox.y - LABEL_HEIGHT).max(0.0),
        text_width + 2.0 * LABEL_PADDING,
        LABEL_HEIGHT,
    )
}
