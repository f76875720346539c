#![allow(clippy::float_cmp)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::*;
use crate::raster::RasterFactory;

// =============================================================
// Helpers
// =============================================================

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy { attempts, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(4) }
}

async fn surface() -> CanvasSurface {
    CanvasSurface::create(&RasterFactory, 60, 80, fast_retry(1)).await.unwrap()
}

fn rect() -> Shape {
    Shape::Rect { width: 10.0, height: 10.0 }
}

/// Fails the first `failures` calls, then hands out raster backends.
struct FlakyFactory {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyFactory {
    fn new(failures: u32) -> Self {
        Self { failures, calls: AtomicU32::new(0) }
    }
}

impl BackendFactory for FlakyFactory {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(BackendError::Unavailable(format!("gpu busy ({call})")));
        }
        RasterFactory.create(width, height)
    }
}

/// Backend whose context loss is toggled from the test.
struct LosableBackend {
    lost: Arc<AtomicBool>,
}

impl RenderBackend for LosableBackend {
    fn render(&mut self, _scene: &Scene) -> Result<(), BackendError> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(BackendError::ContextLost);
        }
        Ok(())
    }

    fn encode_png(&self) -> Result<Vec<u8>, BackendError> {
        Ok(vec![1, 2, 3])
    }

    fn is_context_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    fn release(&mut self) {}
}

struct LosableFactory {
    lost: Arc<AtomicBool>,
}

impl BackendFactory for LosableFactory {
    fn create(&self, _width: u32, _height: u32) -> Result<Box<dyn RenderBackend>, BackendError> {
        self.lost.store(false, Ordering::SeqCst);
        Ok(Box::new(LosableBackend { lost: Arc::clone(&self.lost) }))
    }
}

// =============================================================
// Initialization
// =============================================================

#[tokio::test]
async fn create_retries_until_backend_available() {
    let factory = FlakyFactory::new(2);
    let surface = CanvasSurface::create(&factory, 10, 10, fast_retry(3)).await.unwrap();
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    assert!(surface.scene().is_empty());
    assert!(!surface.is_context_lost());
}

#[tokio::test]
async fn create_gives_up_after_bounded_attempts() {
    let factory = FlakyFactory::new(10);
    let result = CanvasSurface::create(&factory, 10, 10, fast_retry(3)).await;
    assert!(matches!(result, Err(SurfaceError::Initialization { attempts: 3, .. })));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn create_with_invalid_dimensions_is_fatal() {
    let result = CanvasSurface::create(&RasterFactory, 0, 10, fast_retry(2)).await;
    let err = result.err().unwrap();
    assert_eq!(err.error_code(), "E_SURFACE_INIT");
}

// =============================================================
// Drawables and notifications
// =============================================================

#[tokio::test]
async fn add_drawable_goes_on_top_and_is_selected() {
    let mut s = surface().await;
    let first = s.add_drawable(rect(), DrawableProps::at(1.0, 2.0)).unwrap();
    let second = s.add_drawable(Shape::Circle { radius: 3.0 }, DrawableProps::default()).unwrap();

    assert_eq!(s.scene().index_of(&first), Some(0));
    assert_eq!(s.scene().index_of(&second), Some(1));
    assert_eq!(s.selection(), Some(second));
    assert_eq!(s.drain_changes(), vec![Change::Added(first), Change::Added(second)]);
    assert!(s.drain_changes().is_empty());
}

#[tokio::test]
async fn add_drawable_applies_props() {
    let mut s = surface().await;
    let props = DrawableProps { locks: LockFlags::all(), ..DrawableProps::at(4.0, 5.0).with_fill("#123456") };
    let id = s.add_drawable(rect(), props).unwrap();
    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.left, d.top), (4.0, 5.0));
    assert_eq!(d.fill, "#123456");
    assert_eq!(d.locks, LockFlags::all());
}

#[tokio::test]
async fn add_drawable_rejects_non_finite_position() {
    let mut s = surface().await;
    let result = s.add_drawable(rect(), DrawableProps::at(f64::INFINITY, 0.0));
    assert!(matches!(result, Err(SurfaceError::InvalidGeometry(_))));
    assert!(s.drain_changes().is_empty());
}

#[tokio::test]
async fn remove_missing_drawable_is_noop() {
    let mut s = surface().await;
    assert!(!s.remove_drawable(&uuid::Uuid::new_v4()).unwrap());
    assert!(s.drain_changes().is_empty());
}

#[tokio::test]
async fn remove_selected_without_selection_fails() {
    let mut s = surface().await;
    assert!(matches!(s.remove_selected(), Err(SurfaceError::NoSelection)));
}

#[tokio::test]
async fn remove_selected_clears_selection() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();
    assert_eq!(s.remove_selected().unwrap(), id);
    assert_eq!(s.selection(), None);
    assert_eq!(s.drain_changes(), vec![Change::Removed(id)]);
}

// =============================================================
// Tool modes and fill
// =============================================================

#[tokio::test]
async fn entering_draw_or_fill_clears_selection() {
    let mut s = surface().await;
    s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.set_tool_mode(ToolMode::Draw).unwrap();
    assert_eq!(s.selection(), None);
    assert_eq!(s.tool_mode(), ToolMode::Draw);

    s.set_tool_mode(ToolMode::Select).unwrap();
    let id = s.scene().objects[0].id;
    s.select(&id).unwrap();
    s.set_tool_mode(ToolMode::Fill).unwrap();
    assert_eq!(s.selection(), None);
    assert_eq!(s.tool_mode(), ToolMode::Fill);
}

#[tokio::test]
async fn fill_in_select_mode_recolors_selection() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();
    assert_eq!(s.apply_fill("#ff00ff").unwrap(), id);
    assert_eq!(s.scene().get(&id).unwrap().fill, "#ff00ff");
    assert_eq!(s.drain_changes(), vec![Change::Modified(id)]);
}

#[tokio::test]
async fn fill_in_select_mode_without_selection_fails() {
    let mut s = surface().await;
    assert!(matches!(s.apply_fill("#fff"), Err(SurfaceError::NoSelection)));
}

#[tokio::test]
async fn fill_mode_inserts_backdrop_at_back() {
    let mut s = surface().await;
    let top = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.set_tool_mode(ToolMode::Fill).unwrap();
    s.drain_changes();

    let backdrop = s.apply_fill("#00ff00").unwrap();
    let scene = s.scene();
    assert_eq!(scene.objects[0].id, backdrop);
    assert_eq!(scene.objects[1].id, top);
    assert_eq!(scene.objects[0].shape, Shape::Rect { width: 60.0, height: 80.0 });
    assert_eq!(scene.objects[0].fill, "#00ff00");
    assert_eq!(s.drain_changes(), vec![Change::Added(backdrop)]);
}

#[tokio::test]
async fn fill_in_draw_mode_is_rejected() {
    let mut s = surface().await;
    s.set_tool_mode(ToolMode::Draw).unwrap();
    assert!(matches!(s.apply_fill("#fff"), Err(SurfaceError::WrongMode(ToolMode::Draw))));
}

#[tokio::test]
async fn stroke_requires_draw_mode_and_uses_brush() {
    let mut s = surface().await;
    let points = [PathPoint { x: 10.0, y: 10.0 }, PathPoint { x: 14.0, y: 13.0 }];
    assert!(matches!(s.add_stroke(&points), Err(SurfaceError::WrongMode(ToolMode::Select))));

    s.set_tool_mode(ToolMode::Draw).unwrap();
    s.set_brush("#abcdef", 3.0).unwrap();
    let id = s.add_stroke(&points).unwrap();
    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.left, d.top), (10.0, 10.0));
    match &d.shape {
        Shape::Path { path, stroke, stroke_width } => {
            assert_eq!(path[1], PathPoint { x: 4.0, y: 3.0 });
            assert_eq!(stroke, "#abcdef");
            assert_eq!(*stroke_width, 3.0);
        }
        other => panic!("expected path, got {other:?}"),
    }
    assert!(matches!(s.add_stroke(&[]), Err(SurfaceError::InvalidGeometry(_))));
}

#[tokio::test]
async fn brush_rejects_non_positive_width() {
    let mut s = surface().await;
    assert!(s.set_brush("#000", 0.0).is_err());
    assert_eq!(s.brush(), &Brush::default());
}

// =============================================================
// Transforms and locks
// =============================================================

#[tokio::test]
async fn move_respects_axis_locks() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::at(10.0, 10.0)).unwrap();
    s.set_locks(&id, LockFlags { movement_x: true, ..LockFlags::default() }).unwrap();
    s.drain_changes();

    s.move_by(&id, 5.0, 7.0).unwrap();
    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.left, d.top), (10.0, 17.0));
    assert_eq!(s.drain_changes(), vec![Change::Modified(id)]);
}

#[tokio::test]
async fn fully_locked_move_records_nothing() {
    let mut s = surface().await;
    let props = DrawableProps { locks: LockFlags::all(), ..DrawableProps::default() };
    let id = s.add_drawable(rect(), props).unwrap();
    s.drain_changes();
    s.move_by(&id, 5.0, 5.0).unwrap();
    s.rotate_to(&id, 45.0).unwrap();
    s.scale_by(&id, 2.0, 2.0).unwrap();
    assert!(s.drain_changes().is_empty());
}

#[tokio::test]
async fn scale_and_rotate_update_transform() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.scale_by(&id, 2.0, 0.5).unwrap();
    s.rotate_to(&id, -90.0).unwrap();
    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.scale_x, d.scale_y), (2.0, 0.5));
    assert_eq!(d.angle, 270.0);
    assert!(matches!(s.scale_by(&id, 0.0, 1.0), Err(SurfaceError::InvalidGeometry(_))));
}

#[tokio::test]
async fn transforms_on_unknown_drawable_fail() {
    let mut s = surface().await;
    let ghost = uuid::Uuid::new_v4();
    assert!(matches!(s.move_by(&ghost, 1.0, 1.0), Err(SurfaceError::UnknownDrawable(_))));
    assert!(matches!(s.select(&ghost), Err(SurfaceError::UnknownDrawable(_))));
}

#[tokio::test]
async fn move_overflow_is_rejected_without_mutating() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();

    s.move_by(&id, f64::MAX, 0.0).unwrap();
    let result = s.move_by(&id, f64::MAX, 0.0);
    assert!(matches!(result, Err(SurfaceError::InvalidGeometry(_))));

    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.left, d.top), (f64::MAX, 0.0));
    assert_eq!(s.drain_changes(), vec![Change::Modified(id)]);
    assert!(s.serialize().is_ok());
}

#[tokio::test]
async fn scale_overflow_is_rejected_without_mutating() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();

    s.scale_by(&id, f64::MAX, 1.0).unwrap();
    assert!(matches!(s.scale_by(&id, 4.0, 1.0), Err(SurfaceError::InvalidGeometry(_))));

    let d = s.scene().get(&id).unwrap();
    assert_eq!((d.scale_x, d.scale_y), (f64::MAX, 1.0));
    assert_eq!(s.drain_changes(), vec![Change::Modified(id)]);
    assert!(s.serialize().is_ok());
}

#[tokio::test]
async fn reorder_moves_between_front_and_back() {
    let mut s = surface().await;
    let a = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    let b = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    let c = s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();

    s.bring_to_front(&a).unwrap();
    assert_eq!(s.scene().objects.iter().map(|d| d.id).collect::<Vec<_>>(), vec![b, c, a]);
    s.send_to_back(&c).unwrap();
    assert_eq!(s.scene().objects.iter().map(|d| d.id).collect::<Vec<_>>(), vec![c, b, a]);
    s.send_to_back(&c).unwrap();
    assert_eq!(s.drain_changes(), vec![Change::Reordered(a), Change::Reordered(c)]);
}

#[tokio::test]
async fn background_and_clear_record_changes() {
    let mut s = surface().await;
    s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();
    s.set_background("#000000").unwrap();
    s.set_background("#000000").unwrap();
    s.clear().unwrap();
    s.clear().unwrap();
    assert_eq!(s.drain_changes(), vec![Change::BackgroundChanged, Change::Cleared]);
    assert!(s.scene().is_empty());
}

// =============================================================
// Snapshots
// =============================================================

#[tokio::test]
async fn serialize_restore_round_trip() {
    let mut s = surface().await;
    let id = s.add_drawable(rect(), DrawableProps::at(3.0, 4.0).with_fill("#010203")).unwrap();
    s.set_locks(&id, LockFlags { rotation: true, ..LockFlags::default() }).unwrap();
    s.add_drawable(Shape::Text { text: "bio".into(), font_size: 20.0 }, DrawableProps::at(9.0, 9.0)).unwrap();
    let before = s.scene().clone();
    let snapshot = s.serialize().unwrap();

    s.clear().unwrap();
    s.drain_changes();
    s.restore(&snapshot).unwrap();
    assert_eq!(s.scene(), &before);
    assert!(s.drain_changes().is_empty(), "restore must not notify");
}

#[tokio::test]
async fn restore_malformed_snapshot_falls_back_to_empty_scene() {
    let mut s = surface().await;
    s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.drain_changes();

    let result = s.restore(&Snapshot::from_raw("{\"objects\": [{\"type\": \"blob\"}]}"));
    assert!(result.is_err());
    assert!(s.scene().is_empty());
    assert_eq!((s.scene().width, s.scene().height), (60, 80));
    assert_eq!(s.selection(), None);
    assert!(s.drain_changes().is_empty());
}

// =============================================================
// Backend lifecycle
// =============================================================

#[tokio::test]
async fn export_png_renders_scene() {
    let mut s = surface().await;
    s.add_drawable(rect(), DrawableProps::default().with_fill("#ff0000")).unwrap();
    let png = s.export_png().unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (60, 80));
}

#[tokio::test]
async fn context_loss_is_recovered_with_a_new_backend() {
    let lost = Arc::new(AtomicBool::new(false));
    let factory = LosableFactory { lost: Arc::clone(&lost) };
    let mut s = CanvasSurface::create(&factory, 10, 10, fast_retry(2)).await.unwrap();
    let id = s.add_drawable(rect(), DrawableProps::default()).unwrap();

    lost.store(true, Ordering::SeqCst);
    assert!(s.is_context_lost());
    assert!(matches!(s.export_png(), Err(SurfaceError::Backend(BackendError::ContextLost))));

    s.recover(&factory).await.unwrap();
    assert!(!s.is_context_lost());
    assert_eq!(s.export_png().unwrap(), vec![1, 2, 3]);
    assert!(s.scene().get(&id).is_some());
}

#[tokio::test]
async fn dispose_releases_backend_and_blocks_operations() {
    let mut s = surface().await;
    s.add_drawable(rect(), DrawableProps::default()).unwrap();
    s.dispose();

    assert!(s.is_disposed());
    assert!(s.is_context_lost());
    assert!(s.drain_changes().is_empty());
    assert!(matches!(s.add_drawable(rect(), DrawableProps::default()), Err(SurfaceError::Unavailable)));
    assert!(matches!(s.export_png(), Err(SurfaceError::Unavailable)));
    assert!(matches!(s.recover(&RasterFactory).await, Err(SurfaceError::Unavailable)));
    assert!(matches!(s.set_tool_mode(ToolMode::Draw), Err(SurfaceError::Unavailable)));
    assert_eq!(s.tool_mode(), ToolMode::Select);
}

#[test]
fn export_file_name_uses_iso_date() {
    let date = time::Date::from_calendar_date(2026, time::Month::October, 16).unwrap();
    assert_eq!(export_file_name(date), "canvas-2026-10-16.png");
}
