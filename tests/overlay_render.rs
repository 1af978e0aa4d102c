use image::Rgba;
use tempfile::tempdir;

use live_detect::overlay::{label_plate, GLYPH_ADVANCE, LABEL_HEIGHT, LABEL_PADDING};
use live_detect::{
    render, BoundingBox, ClassStyle, DrawCommand, DrawList, FrameDimensions, OverlaySurface,
    Prediction, RasterOverlay, StyleTable,
};

const BOOK: Rgba<u8> = Rgba([0xFF, 0x6B, 0x35, 255]);
const LAPTOP: Rgba<u8> = Rgba([0x00, 0xB4, 0xD8, 255]);
const FALLBACK: Rgba<u8> = Rgba([0xE0, 0xE0, 0xE0, 255]);

fn book() -> Prediction {
    Prediction::new("book", 0.9, BoundingBox::new(10.0, 50.0, 20.0, 20.0))
}

#[test]
fn draws_box_plate_and_label_in_order() {
    let mut list = DrawList::new();
    render(
        &mut list,
        &[book()],
        FrameDimensions::new(640, 480),
        &StyleTable::default(),
    );

    let plate_width = "book 90%".len() as f32 * GLYPH_ADVANCE + 2.0 * LABEL_PADDING;
    assert_eq!(
        list.commands(),
        &[
            DrawCommand::Clear {
                width: 640,
                height: 480
            },
            DrawCommand::StrokeRect {
                rect: BoundingBox::new(10.0, 50.0, 20.0, 20.0),
                colour: BOOK,
                line_width: 2.0,
            },
            DrawCommand::FillRect {
                rect: BoundingBox::new(10.0, 50.0 - LABEL_HEIGHT, plate_width, LABEL_HEIGHT),
                colour: BOOK,
            },
            DrawCommand::Text {
                text: "book 90%".to_string(),
                x: 10.0 + LABEL_PADDING,
                y: 50.0 - LABEL_HEIGHT + LABEL_PADDING,
                colour: Rgba([0, 0, 0, 255]),
            },
        ]
    );
}

#[test]
fn each_render_replaces_the_previous_one() {
    let styles = StyleTable::default();
    let mut list = DrawList::new();
    render(&mut list, &[book()], FrameDimensions::new(64, 64), &styles);
    render(&mut list, &[], FrameDimensions::new(32, 24), &styles);
    assert_eq!(
        list.commands(),
        &[DrawCommand::Clear {
            width: 32,
            height: 24
        }]
    );
}

#[test]
fn classes_pick_their_style_and_unknown_falls_back() {
    let predictions = vec![
        Prediction::new("laptop", 0.5, BoundingBox::new(0.0, 30.0, 10.0, 10.0)),
        Prediction::new("giraffe", 0.333, BoundingBox::new(20.0, 30.0, 10.0, 10.0)),
    ];
    let mut list = DrawList::new();
    render(
        &mut list,
        &predictions,
        FrameDimensions::new(64, 64),
        &StyleTable::default(),
    );

    let strokes: Vec<Rgba<u8>> = list
        .commands()
        .iter()
        .filter_map(|cmd| match cmd {
            DrawCommand::StrokeRect { colour, .. } => Some(*colour),
            _ => None,
        })
        .collect();
    assert_eq!(strokes, vec![LAPTOP, FALLBACK]);
    assert_eq!(list.labels(), vec!["laptop 50%", "giraffe 33%"]);
}

#[test]
fn custom_style_table_overrides_builtins() {
    let styles = StyleTable::default().with_class("book", ClassStyle::solid([1, 2, 3]));
    let mut list = DrawList::new();
    render(&mut list, &[book()], FrameDimensions::new(64, 64), &styles);
    assert!(list.commands().iter().any(|cmd| matches!(
        cmd,
        DrawCommand::StrokeRect { colour, .. } if *colour == Rgba([1, 2, 3, 255])
    )));
}

#[test]
fn label_at_top_edge_stays_on_canvas() {
    let top = Prediction::new("book", 0.42, BoundingBox::new(4.0, 3.0, 10.0, 10.0));
    let mut list = DrawList::new();
    render(
        &mut list,
        &[top],
        FrameDimensions::new(64, 64),
        &StyleTable::default(),
    );
    let plate = list
        .commands()
        .iter()
        .find_map(|cmd| match cmd {
            DrawCommand::FillRect { rect, .. } => Some(*rect),
            _ => None,
        })
        .expect("label plate");
    assert_eq!(plate.y, 0.0);
    let text_width = "book 42%".len() as f32 * GLYPH_ADVANCE;
    assert_eq!(
        plate,
        label_plate(BoundingBox::new(4.0, 3.0, 10.0, 10.0), text_width)
    );
}

#[test]
fn raster_overlay_matches_frame_size_and_paints_boxes() {
    let mut overlay = RasterOverlay::new().expect("overlay");
    render(
        &mut overlay,
        &[book()],
        FrameDimensions::new(80, 80),
        &StyleTable::default(),
    );

    assert_eq!(overlay.image().dimensions(), (80, 80));
    // Box outline corners.
    assert_eq!(overlay.image().get_pixel(10, 50), &BOOK);
    assert_eq!(overlay.image().get_pixel(29, 69), &BOOK);
    // Box interior stays transparent.
    assert_eq!(overlay.image().get_pixel(20, 60)[3], 0);
    // Plate padding row above the box.
    assert_eq!(overlay.image().get_pixel(11, 30), &BOOK);
    assert_eq!(overlay.labels().len(), 1);
    assert_eq!(overlay.labels()[0].0, "book 90%");

    render(&mut overlay, &[], FrameDimensions::new(80, 80), &StyleTable::default());
    assert!(overlay.image().pixels().all(|p| p[3] == 0));
    assert!(overlay.labels().is_empty());
}

#[test]
fn raster_overlay_saves_png() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("overlay.png");
    let mut overlay = RasterOverlay::new().expect("overlay");
    overlay.reset(FrameDimensions::new(32, 16));
    overlay.fill_rect(BoundingBox::new(0.0, 0.0, 4.0, 4.0), LAPTOP);
    overlay.save_png(&path).expect("save png");

    let loaded = image::open(&path).expect("open png").to_rgba8();
    assert_eq!(loaded.dimensions(), (32, 16));
    assert_eq!(loaded.get_pixel(1, 1), &LAPTOP);
    assert_eq!(loaded.get_pixel(20, 10)[3], 0);
}

#[test]
fn raster_label_text_is_drawn_on_its_plate() {
    let mut overlay = RasterOverlay::new().expect("overlay");
    render(
        &mut overlay,
        &[book()],
        FrameDimensions::new(200, 100),
        &StyleTable::default(),
    );

    let plate = label_plate(book().bbox, overlay.measure_text("book 90%"));
    assert_eq!(plate.y, 30.0);
    assert!(plate.w > 2.0 * LABEL_PADDING);

    // Black glyphs darken the plate wherever they cover it.
    let brightness = |p: &Rgba<u8>| p[0] as u32 + p[1] as u32 + p[2] as u32;
    let image = overlay.image();
    let mut text_pixels = 0;
    for y in plate.y as u32..(plate.y + plate.h) as u32 {
        for x in plate.x as u32..(plate.x + plate.w) as u32 {
            if brightness(image.get_pixel(x, y)) < brightness(&BOOK) {
                text_pixels += 1;
            }
        }
    }
    assert!(text_pixels > 20, "{} text pixels", text_pixels);

    // Plate spans the full measured width.
    let right_edge = (plate.x + plate.w) as u32;
    assert_eq!(image.get_pixel(right_edge - 1, 30), &BOOK);
}

