//! Canvas surface — the owned, mutable scene behind the profile editor.
//!
//! DESIGN
//! ======
//! The surface is the only thing allowed to mutate the live scene. It exposes
//! a narrow API (add, remove, transform, fill, reorder) and records one
//! [`Change`] per structural mutation. The editor drains those changes to
//! decide when to commit history. Replays (`restore`, `load_scene`) never
//! record changes, so undo/redo cannot feed back into history.
//!
//! A boxed [`RenderBackend`] turns the scene into pixels. Backends can lose
//! their drawing context; creation and recovery retry with exponential
//! backoff and give up with a fatal `Initialization` error.
//!
//! ERROR HANDLING
//! ==============
//! A malformed snapshot never leaves the surface half-populated: `restore`
//! falls back to an empty scene of the current size and reports the parse
//! error to the caller.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::consts::{DEFAULT_BRUSH_COLOR, DEFAULT_BRUSH_WIDTH};
use crate::error::ErrorCode;
use crate::raster::{BackendError, BackendFactory, RenderBackend};
use crate::scene::{Drawable, DrawableId, LockFlags, PathPoint, Scene, Shape, Snapshot, SnapshotError};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("rendering surface could not be created after {attempts} attempts: {source}")]
    Initialization { attempts: u32, source: BackendError },
    #[error("surface has been disposed")]
    Unavailable,
    #[error("no drawable selected")]
    NoSelection,
    #[error("drawable not found: {0}")]
    UnknownDrawable(DrawableId),
    #[error("operation not allowed in {0:?} mode")]
    WrongMode(ToolMode),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl ErrorCode for SurfaceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "E_SURFACE_INIT",
            Self::Unavailable => "E_SURFACE_UNAVAILABLE",
            Self::NoSelection => "E_NO_SELECTION",
            Self::UnknownDrawable(_) => "E_UNKNOWN_DRAWABLE",
            Self::WrongMode(_) => "E_WRONG_MODE",
            Self::InvalidGeometry(_) => "E_INVALID_GEOMETRY",
            Self::Backend(_) => "E_BACKEND",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backend(e) if e.retryable())
    }
}

/// Exclusive interaction mode of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Pick and transform existing drawables (default).
    #[default]
    Select,
    /// Free-hand strokes.
    Draw,
    /// Paint a backdrop layer behind everything.
    Fill,
}

/// A structural mutation of the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(DrawableId),
    Removed(DrawableId),
    Modified(DrawableId),
    Reordered(DrawableId),
    Cleared,
    BackgroundChanged,
}

/// Initial attributes for a new drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableProps {
    pub left: f64,
    pub top: f64,
    pub fill: Option<String>,
    pub locks: LockFlags,
}

impl DrawableProps {
    #[must_use]
    pub fn at(left: f64, top: f64) -> Self {
        Self { left, top, fill: None, locks: LockFlags::default() }
    }

    #[must_use]
    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }
}

impl Default for DrawableProps {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

/// Free-hand brush settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub color: String,
    pub width: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self { color: DEFAULT_BRUSH_COLOR.to_string(), width: DEFAULT_BRUSH_WIDTH }
    }
}

/// Create a backend, retrying with exponential backoff.
///
/// # Errors
///
/// Returns `SurfaceError::Initialization` once every attempt has failed.
pub async fn create_backend_with_retry(
    factory: &dyn BackendFactory,
    width: u32,
    height: u32,
    policy: RetryPolicy,
) -> Result<Box<dyn RenderBackend>, SurfaceError> {
    let attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match factory.create(width, height) {
            Ok(backend) => {
                if attempt > 1 {
                    info!(attempt, "rendering backend created after retry");
                }
                return Ok(backend);
            }
            Err(e) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(error = %e, attempt, total = attempts, delay = ?delay, "backend creation failed; retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(error = %e, attempts, "backend creation failed after retries");
                return Err(SurfaceError::Initialization { attempts, source: e });
            }
        }
    }
}

/// The live scene plus its rendering backend.
pub struct CanvasSurface {
    scene: Scene,
    backend: Option<Box<dyn RenderBackend>>,
    mode: ToolMode,
    selected: Option<DrawableId>,
    brush: Brush,
    changes: Vec<Change>,
    retry: RetryPolicy,
    disposed: bool,
}

impl CanvasSurface {
    /// Create a surface with an empty scene, initializing the backend with
    /// bounded retries.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceError::Initialization` if no backend could be created.
    pub async fn create(
        factory: &dyn BackendFactory,
        width: u32,
        height: u32,
        retry: RetryPolicy,
    ) -> Result<Self, SurfaceError> {
        let backend = create_backend_with_retry(factory, width, height, retry).await?;
        debug!(width, height, "canvas surface created");
        Ok(Self {
            scene: Scene::empty(width, height),
            backend: Some(backend),
            mode: ToolMode::Select,
            selected: None,
            brush: Brush::default(),
            changes: Vec::new(),
            retry,
            disposed: false,
        })
    }

    fn ensure_live(&self) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Unavailable);
        }
        Ok(())
    }

    fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Take the structural changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    // --- Drawables ---

    /// Insert on top of the z-order and select it.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` after dispose, `InvalidGeometry` for non-finite
    /// input.
    pub fn add_drawable(&mut self, shape: Shape, props: DrawableProps) -> Result<DrawableId, SurfaceError> {
        self.ensure_live()?;
        let mut drawable = Drawable::new(shape);
        drawable.left = props.left;
        drawable.top = props.top;
        drawable.locks = props.locks;
        if let Some(fill) = props.fill {
            drawable.fill = fill;
        }
        if !drawable.is_finite() {
            return Err(SurfaceError::InvalidGeometry("non-finite drawable attributes"));
        }
        let id = drawable.id;
        self.scene.objects.push(drawable);
        self.selected = Some(id);
        self.record(Change::Added(id));
        Ok(id)
    }

    /// Remove a drawable. Returns `false` if it was not in the scene.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` after dispose.
    pub fn remove_drawable(&mut self, id: &DrawableId) -> Result<bool, SurfaceError> {
        self.ensure_live()?;
        let Some(index) = self.scene.index_of(id) else {
            debug!(%id, "remove ignored; drawable not in scene");
            return Ok(false);
        };
        self.scene.objects.remove(index);
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        self.record(Change::Removed(*id));
        Ok(true)
    }

    /// Remove the selected drawable.
    ///
    /// # Errors
    ///
    /// Returns `NoSelection` if nothing is selected.
    pub fn remove_selected(&mut self) -> Result<DrawableId, SurfaceError> {
        self.ensure_live()?;
        let id = self.selected.ok_or(SurfaceError::NoSelection)?;
        self.remove_drawable(&id)?;
        Ok(id)
    }

    /// Append a free-hand stroke using the current brush.
    ///
    /// # Errors
    ///
    /// Returns `WrongMode` outside draw mode and `InvalidGeometry` for an
    /// empty or non-finite stroke.
    pub fn add_stroke(&mut self, points: &[PathPoint]) -> Result<DrawableId, SurfaceError> {
        self.ensure_live()?;
        if self.mode != ToolMode::Draw {
            return Err(SurfaceError::WrongMode(self.mode));
        }
        let Some(origin) = points.first().copied() else {
            return Err(SurfaceError::InvalidGeometry("empty stroke"));
        };
        let relative = points.iter().map(|p| PathPoint { x: p.x - origin.x, y: p.y - origin.y }).collect();
        let mut drawable = Drawable::new(Shape::Path {
            path: relative,
            stroke: self.brush.color.clone(),
            stroke_width: self.brush.width,
        });
        drawable.left = origin.x;
        drawable.top = origin.y;
        drawable.fill = "transparent".to_string();
        if !drawable.is_finite() {
            return Err(SurfaceError::InvalidGeometry("non-finite stroke point"));
        }
        let id = drawable.id;
        self.scene.objects.push(drawable);
        self.record(Change::Added(id));
        Ok(id)
    }

    fn drawable_mut(&mut self, id: &DrawableId) -> Result<&mut Drawable, SurfaceError> {
        self.ensure_live()?;
        self.scene.get_mut(id).ok_or(SurfaceError::UnknownDrawable(*id))
    }

    /// Translate, skipping any axis whose movement is locked.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable` or `InvalidGeometry`.
    pub fn move_by(&mut self, id: &DrawableId, dx: f64, dy: f64) -> Result<(), SurfaceError> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(SurfaceError::InvalidGeometry("non-finite offset"));
        }
        let d = self.drawable_mut(id)?;
        let before = (d.left, d.top);
        let left = if d.locks.movement_x { d.left } else { d.left + dx };
        let top = if d.locks.movement_y { d.top } else { d.top + dy };
        if !(left.is_finite() && top.is_finite()) {
            return Err(SurfaceError::InvalidGeometry("position overflow"));
        }
        (d.left, d.top) = (left, top);
        if (left, top) != before {
            self.record(Change::Modified(*id));
        }
        Ok(())
    }

    /// Multiply the scale factors, skipping locked axes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable` or `InvalidGeometry`.
    pub fn scale_by(&mut self, id: &DrawableId, fx: f64, fy: f64) -> Result<(), SurfaceError> {
        if !(fx.is_finite() && fy.is_finite()) || fx == 0.0 || fy == 0.0 {
            return Err(SurfaceError::InvalidGeometry("scale factors must be finite and non-zero"));
        }
        let d = self.drawable_mut(id)?;
        let before = (d.scale_x, d.scale_y);
        let scale_x = if d.locks.scaling_x { d.scale_x } else { d.scale_x * fx };
        let scale_y = if d.locks.scaling_y { d.scale_y } else { d.scale_y * fy };
        if !(scale_x.is_finite() && scale_y.is_finite()) || scale_x == 0.0 || scale_y == 0.0 {
            return Err(SurfaceError::InvalidGeometry("scale overflow"));
        }
        (d.scale_x, d.scale_y) = (scale_x, scale_y);
        if (scale_x, scale_y) != before {
            self.record(Change::Modified(*id));
        }
        Ok(())
    }

    /// Set the rotation in degrees unless rotation is locked.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable` or `InvalidGeometry`.
    pub fn rotate_to(&mut self, id: &DrawableId, angle: f64) -> Result<(), SurfaceError> {
        if !angle.is_finite() {
            return Err(SurfaceError::InvalidGeometry("non-finite angle"));
        }
        let d = self.drawable_mut(id)?;
        let angle = angle.rem_euclid(360.0);
        if d.locks.rotation || d.angle == angle {
            return Ok(());
        }
        d.angle = angle;
        self.record(Change::Modified(*id));
        Ok(())
    }

    /// Replace the lock flags.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable`.
    pub fn set_locks(&mut self, id: &DrawableId, locks: LockFlags) -> Result<(), SurfaceError> {
        let d = self.drawable_mut(id)?;
        if d.locks == locks {
            return Ok(());
        }
        d.locks = locks;
        self.record(Change::Modified(*id));
        Ok(())
    }

    /// Recolor a specific drawable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable`.
    pub fn fill_drawable(&mut self, id: &DrawableId, color: &str) -> Result<(), SurfaceError> {
        let d = self.drawable_mut(id)?;
        if d.fill == color {
            return Ok(());
        }
        d.fill = color.to_string();
        self.record(Change::Modified(*id));
        Ok(())
    }

    /// Apply the fill tool.
    ///
    /// In select mode the selected drawable is recolored. In fill mode a
    /// canvas-sized rect is inserted at the back as a painted backdrop; this
    /// is not a pixel flood fill.
    ///
    /// # Errors
    ///
    /// Returns `NoSelection` in select mode with nothing selected and
    /// `WrongMode` in draw mode.
    pub fn apply_fill(&mut self, color: &str) -> Result<DrawableId, SurfaceError> {
        self.ensure_live()?;
        match self.mode {
            ToolMode::Select => {
                let id = self.selected.ok_or(SurfaceError::NoSelection)?;
                self.fill_drawable(&id, color)?;
                Ok(id)
            }
            ToolMode::Fill => {
                let mut backdrop = Drawable::new(Shape::Rect {
                    width: f64::from(self.scene.width),
                    height: f64::from(self.scene.height),
                });
                backdrop.fill = color.to_string();
                let id = backdrop.id;
                self.scene.objects.insert(0, backdrop);
                self.record(Change::Added(id));
                Ok(id)
            }
            ToolMode::Draw => Err(SurfaceError::WrongMode(ToolMode::Draw)),
        }
    }

    /// Move to the top of the z-order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable`.
    pub fn bring_to_front(&mut self, id: &DrawableId) -> Result<(), SurfaceError> {
        self.reorder(id, true)
    }

    /// Move to the bottom of the z-order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable`.
    pub fn send_to_back(&mut self, id: &DrawableId) -> Result<(), SurfaceError> {
        self.reorder(id, false)
    }

    fn reorder(&mut self, id: &DrawableId, to_front: bool) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        let index = self.scene.index_of(id).ok_or(SurfaceError::UnknownDrawable(*id))?;
        let target = if to_front { self.scene.len() - 1 } else { 0 };
        if index == target {
            return Ok(());
        }
        let drawable = self.scene.objects.remove(index);
        self.scene.objects.insert(target, drawable);
        self.record(Change::Reordered(*id));
        Ok(())
    }

    /// Change the canvas background color.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` after dispose.
    pub fn set_background(&mut self, color: &str) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if self.scene.background == color {
            return Ok(());
        }
        self.scene.background = color.to_string();
        self.record(Change::BackgroundChanged);
        Ok(())
    }

    /// Remove every drawable.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` after dispose.
    pub fn clear(&mut self) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if self.scene.is_empty() {
            return Ok(());
        }
        self.scene.objects.clear();
        self.selected = None;
        self.record(Change::Cleared);
        Ok(())
    }

    // --- Tool / selection (non-structural) ---

    /// Switch the exclusive tool mode. Entering draw or fill clears the
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` after dispose.
    pub fn set_tool_mode(&mut self, mode: ToolMode) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if matches!(mode, ToolMode::Draw | ToolMode::Fill) {
            self.selected = None;
        }
        self.mode = mode;
        Ok(())
    }

    #[must_use]
    pub fn tool_mode(&self) -> ToolMode {
        self.mode
    }

    /// Select a drawable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDrawable` if it is not in the scene.
    pub fn select(&mut self, id: &DrawableId) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if self.scene.index_of(id).is_none() {
            return Err(SurfaceError::UnknownDrawable(*id));
        }
        self.selected = Some(*id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selection(&self) -> Option<DrawableId> {
        self.selected
    }

    /// Update the free-hand brush.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` for a non-positive or non-finite width.
    pub fn set_brush(&mut self, color: &str, width: f64) -> Result<(), SurfaceError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(SurfaceError::InvalidGeometry("brush width must be positive"));
        }
        self.brush = Brush { color: color.to_string(), width };
        Ok(())
    }

    #[must_use]
    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    // --- Snapshots ---

    /// Serialize the live scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be represented as a snapshot.
    pub fn serialize(&self) -> Result<Snapshot, SnapshotError> {
        self.scene.snapshot()
    }

    /// Replace the scene from a snapshot without recording a change. A
    /// malformed snapshot leaves an empty scene of the current size.
    ///
    /// # Errors
    ///
    /// Returns the parse error after falling back to the empty scene.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        match snapshot.parse() {
            Ok(scene) => {
                self.load_scene(scene);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "snapshot restore failed; falling back to empty scene");
                self.load_scene(Scene::empty(self.scene.width, self.scene.height));
                Err(e)
            }
        }
    }

    /// Replace the scene without recording a change.
    pub fn load_scene(&mut self, scene: Scene) {
        self.scene = scene;
        self.selected = None;
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    // --- Backend ---

    /// Whether the backend needs to be recreated before rendering.
    #[must_use]
    pub fn is_context_lost(&self) -> bool {
        self.backend.as_ref().is_none_or(|b| b.is_context_lost())
    }

    /// Recreate a lost backend, keeping the scene.
    ///
    /// # Errors
    ///
    /// Returns `Initialization` if retries are exhausted, `Unavailable` after
    /// dispose.
    pub async fn recover(&mut self, factory: &dyn BackendFactory) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if let Some(mut old) = self.backend.take() {
            old.release();
        }
        let backend = create_backend_with_retry(factory, self.scene.width, self.scene.height, self.retry).await?;
        self.backend = Some(backend);
        info!("rendering backend recovered");
        Ok(())
    }

    /// Render and encode the current scene as PNG.
    ///
    /// # Errors
    ///
    /// Returns `Backend(ContextLost)` when the backend must be recovered
    /// first.
    pub fn export_png(&mut self) -> Result<Vec<u8>, SurfaceError> {
        self.ensure_live()?;
        let backend = self.backend.as_mut().ok_or(BackendError::ContextLost)?;
        if backend.is_context_lost() {
            return Err(BackendError::ContextLost.into());
        }
        backend.render(&self.scene)?;
        Ok(backend.encode_png()?)
    }

    /// Release the backend and drop pending changes. Every later operation
    /// fails with `Unavailable`.
    pub fn dispose(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
        }
        self.changes.clear();
        self.selected = None;
        self.disposed = true;
        debug!("canvas surface disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Download file name for an export made on `date`.
#[must_use]
pub fn export_file_name(date: time::Date) -> String {
    format!("canvas-{date}.png")
}
