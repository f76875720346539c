use super::*;
use base64::Engine as _;
use crate::scene::LockFlags;

// =============================================================
// Helpers
// =============================================================

fn drawable(shape: Shape, left: f64, top: f64, fill: &str) -> Drawable {
    Drawable {
        id: uuid::Uuid::new_v4(),
        shape,
        left,
        top,
        scale_x: 1.0,
        scale_y: 1.0,
        angle: 0.0,
        fill: fill.into(),
        locks: LockFlags::default(),
    }
}

fn render(scene: &Scene) -> RgbaImage {
    let mut backend = RasterBackend::new(scene.width, scene.height).unwrap();
    backend.render(scene).unwrap();
    backend.pixels().unwrap().clone()
}

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// =============================================================
// parse_color
// =============================================================

#[test]
fn parse_color_hex_forms() {
    assert_eq!(parse_color("#ff0000"), Some(RED));
    assert_eq!(parse_color("#F00"), Some(RED));
    assert_eq!(parse_color("#ff000080"), Some(Rgba([255, 0, 0, 128])));
    assert_eq!(parse_color(" white "), Some(WHITE));
    assert_eq!(parse_color("transparent"), Some(Rgba([0, 0, 0, 0])));
}

#[test]
fn parse_color_rejects_garbage() {
    assert_eq!(parse_color("red-ish"), None);
    assert_eq!(parse_color("#12"), None);
    assert_eq!(parse_color("#gggggg"), None);
    assert_eq!(parse_color("#éé"), None);
}

// =============================================================
// Backend lifecycle
// =============================================================

#[test]
fn new_rejects_invalid_dimensions() {
    assert!(matches!(RasterBackend::new(0, 10), Err(BackendError::InvalidDimensions { .. })));
    assert!(matches!(
        RasterBackend::new(MAX_RASTER_DIMENSION + 1, 10),
        Err(BackendError::InvalidDimensions { .. })
    ));
}

#[test]
fn released_backend_reports_context_loss() {
    let mut backend = RasterBackend::new(4, 4).unwrap();
    assert!(!backend.is_context_lost());
    backend.release();
    assert!(backend.is_context_lost());
    assert!(matches!(backend.render(&Scene::empty(4, 4)), Err(BackendError::ContextLost)));
    assert!(matches!(backend.encode_png(), Err(BackendError::ContextLost)));
}

#[test]
fn factory_creates_backend() {
    let backend = RasterFactory.create(8, 8).unwrap();
    assert!(!backend.is_context_lost());
}

#[test]
fn encode_png_writes_png_signature() {
    let mut backend = RasterBackend::new(3, 2).unwrap();
    backend.render(&Scene::empty(3, 2)).unwrap();
    let bytes = backend.encode_png().unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (3, 2));
}

// =============================================================
// Drawing
// =============================================================

#[test]
fn background_fills_every_pixel() {
    let mut scene = Scene::empty(5, 5);
    scene.background = "#ff0000".into();
    let pixels = render(&scene);
    assert!(pixels.pixels().all(|p| *p == RED));
}

#[test]
fn rect_covers_its_box_only() {
    let mut scene = Scene::empty(20, 20);
    scene.objects.push(drawable(Shape::Rect { width: 5.0, height: 5.0 }, 10.0, 10.0, "#ff0000"));
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(12, 12), RED);
    assert_eq!(*pixels.get_pixel(5, 5), WHITE);
    assert_eq!(*pixels.get_pixel(15, 15), WHITE);
}

#[test]
fn scale_stretches_rect() {
    let mut scene = Scene::empty(20, 20);
    let mut rect = drawable(Shape::Rect { width: 2.0, height: 2.0 }, 0.0, 0.0, "#ff0000");
    rect.scale_x = 5.0;
    scene.objects.push(rect);
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(9, 1), RED);
    assert_eq!(*pixels.get_pixel(11, 1), WHITE);
}

#[test]
fn rotation_turns_around_left_top() {
    let mut scene = Scene::empty(20, 20);
    let mut rect = drawable(Shape::Rect { width: 8.0, height: 2.0 }, 10.0, 2.0, "#ff0000");
    rect.angle = 90.0;
    scene.objects.push(rect);
    let pixels = render(&scene);
    // Rotated 90° clockwise the bar hangs down and to the left of (10, 2).
    assert_eq!(*pixels.get_pixel(9, 7), RED);
    assert_eq!(*pixels.get_pixel(14, 2), WHITE);
}

#[test]
fn circle_leaves_corners_untouched() {
    let mut scene = Scene::empty(20, 20);
    scene.objects.push(drawable(Shape::Circle { radius: 5.0 }, 0.0, 0.0, "#ff0000"));
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(5, 5), RED);
    assert_eq!(*pixels.get_pixel(0, 0), WHITE);
}

#[test]
fn path_uses_stroke_color() {
    let mut scene = Scene::empty(20, 20);
    let path = Shape::Path {
        path: vec![PathPoint { x: 0.0, y: 0.0 }, PathPoint { x: 10.0, y: 0.0 }],
        stroke: "#0000ff".into(),
        stroke_width: 4.0,
    };
    scene.objects.push(drawable(path, 5.0, 10.0, "#ff0000"));
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(10, 10), Rgba([0, 0, 255, 255]));
    assert_eq!(*pixels.get_pixel(10, 15), WHITE);
}

#[test]
fn later_objects_paint_over_earlier_ones() {
    let mut scene = Scene::empty(10, 10);
    scene.objects.push(drawable(Shape::Rect { width: 10.0, height: 10.0 }, 0.0, 0.0, "#00ff00"));
    scene.objects.push(drawable(Shape::Rect { width: 10.0, height: 10.0 }, 0.0, 0.0, "#ff0000"));
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(4, 4), RED);
}

#[test]
fn data_url_image_is_drawn_scaled() {
    let mut source = RgbaImage::new(1, 1);
    source.put_pixel(0, 0, Rgba([0, 0, 255, 255]));
    let mut png = Vec::new();
    source.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
    let src = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&png));

    let mut scene = Scene::empty(10, 10);
    scene.objects.push(drawable(Shape::Image { src, width: 4.0, height: 4.0 }, 2.0, 2.0, "#000000"));
    let pixels = render(&scene);
    assert_eq!(*pixels.get_pixel(3, 3), Rgba([0, 0, 255, 255]));
    assert_eq!(*pixels.get_pixel(7, 7), WHITE);
}

#[test]
fn remote_image_and_text_are_skipped() {
    let mut scene = Scene::empty(10, 10);
    scene.objects.push(drawable(
        Shape::Image { src: "https://cdn.example/a.png".into(), width: 10.0, height: 10.0 },
        0.0,
        0.0,
        "#000000",
    ));
    scene.objects.push(drawable(Shape::Text { text: "hey".into(), font_size: 8.0 }, 0.0, 0.0, "#000000"));
    let pixels = render(&scene);
    assert!(pixels.pixels().all(|p| *p == WHITE));
}

#[test]
fn half_transparent_fill_blends_with_background() {
    let mut scene = Scene::empty(4, 4);
    scene.objects.push(drawable(Shape::Rect { width: 4.0, height: 4.0 }, 0.0, 0.0, "#00000080"));
    let pixels = render(&scene);
    let p = pixels.get_pixel(1, 1);
    assert_eq!(p[3], 255);
    assert!(p[0] > 100 && p[0] < 140, "expected mid grey, got {p:?}");
}
