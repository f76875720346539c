//! Editor controller — the profile canvas edit session.
//!
//! DESIGN
//! ======
//! The controller owns one `CanvasSurface` and one `HistoryLog` and is the
//! only caller of either. Every user action runs through it so that:
//!
//! - structural changes on the surface become exactly one history commit,
//! - undo/redo replays never feed back into history,
//! - the view/edit state machine gates who may mutate.
//!
//! Load and save are split into `begin_*` (synchronous, takes the snapshot
//! and marks the request in flight), a `Pending*` value that owns everything
//! the request needs and can be awaited anywhere, and `finish_*` (applies the
//! outcome). A save therefore always sends the scene as it was when the user
//! pressed save; edits made while the request is in flight stay local.
//!
//! Each outcome carries the surface generation it was issued against. After
//! `dispose` or `replace_surface` the generation moves on and late outcomes
//! are rejected as `Stale` instead of being applied.
//!
//! ERROR HANDLING
//! ==============
//! - Backend initialization failure is fatal: the editor becomes unavailable.
//! - Corrupt stored data falls back to an empty scene and is reported, not
//!   raised.
//! - Transient store failures leave the local scene and history untouched.
//! - A missing profile starts the session from an empty scene and surfaces
//!   the error.

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::EditorConfig;
use crate::consts::DEFAULT_BRUSH_COLOR;
use crate::error::ErrorCode;
use crate::gateway::{CanvasGateway, GatewayError, UserId};
use crate::history::HistoryLog;
use crate::raster::BackendFactory;
use crate::scene::{DrawableId, LockFlags, PathPoint, Scene, Shape, Snapshot, SnapshotError};
use crate::surface::{CanvasSurface, DrawableProps, SurfaceError, ToolMode, export_file_name};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("another load or save is in progress")]
    Busy,
    #[error("editor is not in edit mode")]
    NotEditing,
    #[error("only the profile owner may edit this canvas")]
    NotOwner,
    #[error("sign in to open the canvas")]
    Unauthenticated,
    #[error("editor is unavailable")]
    Unavailable,
    #[error("outcome belongs to a replaced or disposed surface")]
    Stale,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl ErrorCode for EditorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "E_EDITOR_BUSY",
            Self::NotEditing => "E_NOT_EDITING",
            Self::NotOwner => "E_NOT_OWNER",
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Unavailable => "E_EDITOR_UNAVAILABLE",
            Self::Stale => "E_STALE_OUTCOME",
            Self::Surface(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::Snapshot(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Surface(e) => e.retryable(),
            Self::Gateway(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Who is looking at the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Access {
    /// Authenticated viewer, if any.
    pub viewer: Option<UserId>,
    /// Explicit edit grant for a viewer who is not the owner.
    pub is_owner: bool,
}

impl Access {
    #[must_use]
    pub fn viewer(user_id: UserId) -> Self {
        Self { viewer: Some(user_id), is_owner: false }
    }

    #[must_use]
    pub fn owner(user_id: UserId) -> Self {
        Self { viewer: Some(user_id), is_owner: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Viewing,
    Editing,
}

/// Tool bar entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Draw,
    Fill,
    Shape,
    Text,
    Image,
}

impl Tool {
    /// The surface mode backing this tool. Insertion tools place a drawable
    /// and leave the surface selecting.
    #[must_use]
    pub fn surface_mode(self) -> ToolMode {
        match self {
            Self::Draw => ToolMode::Draw,
            Self::Fill => ToolMode::Fill,
            Self::Select | Self::Shape | Self::Text | Self::Image => ToolMode::Select,
        }
    }
}

/// How a successful load was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadReport {
    /// A stored scene was restored.
    Restored,
    /// Nothing was ever saved; the scene is empty.
    Empty,
    /// The stored scene was unreadable; the scene is empty.
    RecoveredFromCorruption,
}

// =============================================================================
// PENDING REQUESTS
// =============================================================================

/// An issued load, independent of the editor until it is finished.
pub struct PendingLoad {
    gateway: Arc<dyn CanvasGateway>,
    user_id: UserId,
    generation: u64,
}

impl PendingLoad {
    pub async fn fetch(self) -> LoadOutcome {
        let result = self.gateway.load(self.user_id).await;
        LoadOutcome { generation: self.generation, result }
    }
}

pub struct LoadOutcome {
    generation: u64,
    result: Result<Option<Snapshot>, GatewayError>,
}

/// An issued save. The snapshot was taken when the save began.
pub struct PendingSave {
    gateway: Arc<dyn CanvasGateway>,
    user_id: UserId,
    snapshot: Snapshot,
    generation: u64,
    edits_at_start: u64,
}

impl PendingSave {
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub async fn send(self) -> SaveOutcome {
        let result = self.gateway.save(self.user_id, &self.snapshot).await;
        SaveOutcome {
            generation: self.generation,
            edits_at_start: self.edits_at_start,
            snapshot: self.snapshot,
            result,
        }
    }
}

pub struct SaveOutcome {
    generation: u64,
    edits_at_start: u64,
    snapshot: Snapshot,
    result: Result<(), GatewayError>,
}

// =============================================================================
// EDITOR
// =============================================================================

pub struct Editor {
    config: EditorConfig,
    gateway: Arc<dyn CanvasGateway>,
    factory: Arc<dyn BackendFactory>,
    owner: UserId,
    can_edit: bool,
    surface: CanvasSurface,
    history: HistoryLog,
    mode: EditorMode,
    tool: Tool,
    /// Bumped on every surface disposal or replacement.
    generation: u64,
    /// Bumped whenever the live scene changes.
    edits: u64,
    load_in_flight: bool,
    save_in_flight: bool,
    persisted: Option<Snapshot>,
    unavailable: bool,
}

impl Editor {
    /// Open a viewing session on `owner`'s canvas with an empty scene.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` without a viewer identity, `Surface(Initialization)`
    /// if no rendering backend could be created.
    pub async fn open(
        config: EditorConfig,
        gateway: Arc<dyn CanvasGateway>,
        factory: Arc<dyn BackendFactory>,
        owner: UserId,
        access: Access,
    ) -> Result<Self, EditorError> {
        let Some(viewer) = access.viewer else {
            return Err(EditorError::Unauthenticated);
        };
        let surface = create_surface(&config, factory.as_ref()).await?;

        let initial = surface.serialize()?;
        let mut history = HistoryLog::with_capacity(config.history_capacity);
        history.initialize(initial.clone());
        let can_edit = access.is_owner || viewer == owner;
        info!(%owner, %viewer, can_edit, "canvas editor opened");

        Ok(Self {
            config,
            gateway,
            factory,
            owner,
            can_edit,
            surface,
            history,
            mode: EditorMode::Viewing,
            tool: Tool::Select,
            generation: 0,
            edits: 0,
            load_in_flight: false,
            save_in_flight: false,
            persisted: Some(initial),
            unavailable: false,
        })
    }

    // --- Guards ---

    fn ensure_live(&self) -> Result<(), EditorError> {
        if self.unavailable || self.surface.is_disposed() {
            return Err(EditorError::Unavailable);
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), EditorError> {
        self.ensure_live()?;
        if self.load_in_flight {
            return Err(EditorError::Busy);
        }
        if self.mode != EditorMode::Editing {
            return Err(EditorError::NotEditing);
        }
        Ok(())
    }

    // --- Mode ---

    /// Switch to edit mode.
    ///
    /// # Errors
    ///
    /// `NotOwner` unless the viewer owns the canvas or holds an edit grant.
    pub fn enter_edit_mode(&mut self) -> Result<(), EditorError> {
        self.ensure_live()?;
        if !self.can_edit {
            return Err(EditorError::NotOwner);
        }
        if self.mode != EditorMode::Editing {
            self.mode = EditorMode::Editing;
            info!(owner = %self.owner, "entered edit mode");
        }
        Ok(())
    }

    /// Return to viewing without saving. Local edits are kept.
    pub fn exit_edit_mode(&mut self) {
        self.leave_edit_mode();
    }

    fn leave_edit_mode(&mut self) {
        self.mode = EditorMode::Viewing;
        self.tool = Tool::Select;
        if let Err(e) = self.surface.set_tool_mode(ToolMode::Select) {
            debug!(error = %e, "surface gone; tool reset skipped");
        }
        self.surface.clear_selection();
    }

    // --- Structural edits ---

    /// Run a surface mutation and commit whatever it changed.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut CanvasSurface) -> Result<T, SurfaceError>,
    ) -> Result<T, EditorError> {
        self.ensure_mutable()?;
        let result = op(&mut self.surface);
        if let Err(e) = self.commit_changes() {
            self.roll_back_to_history();
            return Err(e);
        }
        Ok(result?)
    }

    /// Put the surface back on the current history entry so the scene never
    /// holds a mutation history did not record.
    fn roll_back_to_history(&mut self) {
        match self.history.current().map(Snapshot::parse) {
            Some(Ok(scene)) => self.surface.load_scene(scene),
            Some(Err(e)) => warn!(error = %e, "history entry unreadable; rollback skipped"),
            None => {}
        }
        self.surface.drain_changes();
        warn!(cursor = self.history.cursor(), "uncommitted mutation rolled back");
    }

    fn commit_changes(&mut self) -> Result<(), EditorError> {
        let changes = self.surface.drain_changes();
        if changes.is_empty() {
            return Ok(());
        }
        let snapshot = self.surface.serialize()?;
        if self.history.commit(snapshot) {
            self.edits += 1;
            debug!(changes = changes.len(), cursor = self.history.cursor(), "history committed");
        }
        Ok(())
    }

    /// Insert a drawable on top of the scene.
    ///
    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or the surface error.
    pub fn add_drawable(&mut self, shape: Shape, props: DrawableProps) -> Result<DrawableId, EditorError> {
        self.apply(|s| s.add_drawable(shape, props))
    }

    /// Remove a drawable; `false` if it was already gone.
    ///
    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn remove_drawable(&mut self, id: &DrawableId) -> Result<bool, EditorError> {
        self.apply(|s| s.remove_drawable(id))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(NoSelection)`.
    pub fn remove_selected(&mut self) -> Result<DrawableId, EditorError> {
        self.apply(CanvasSurface::remove_selected)
    }

    /// # Errors
    ///
    /// `Surface(WrongMode)` unless the draw tool is active.
    pub fn stroke(&mut self, points: &[PathPoint]) -> Result<DrawableId, EditorError> {
        self.apply(|s| s.add_stroke(points))
    }

    /// Apply the fill tool with `color`.
    ///
    /// # Errors
    ///
    /// See [`CanvasSurface::apply_fill`].
    pub fn fill(&mut self, color: &str) -> Result<DrawableId, EditorError> {
        self.apply(|s| s.apply_fill(color))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(UnknownDrawable)`.
    pub fn move_by(&mut self, id: &DrawableId, dx: f64, dy: f64) -> Result<(), EditorError> {
        self.apply(|s| s.move_by(id, dx, dy))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or a surface error.
    pub fn scale_by(&mut self, id: &DrawableId, fx: f64, fy: f64) -> Result<(), EditorError> {
        self.apply(|s| s.scale_by(id, fx, fy))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or a surface error.
    pub fn rotate_to(&mut self, id: &DrawableId, angle: f64) -> Result<(), EditorError> {
        self.apply(|s| s.rotate_to(id, angle))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(UnknownDrawable)`.
    pub fn set_locks(&mut self, id: &DrawableId, locks: LockFlags) -> Result<(), EditorError> {
        self.apply(|s| s.set_locks(id, locks))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(UnknownDrawable)`.
    pub fn bring_to_front(&mut self, id: &DrawableId) -> Result<(), EditorError> {
        self.apply(|s| s.bring_to_front(id))
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(UnknownDrawable)`.
    pub fn send_to_back(&mut self, id: &DrawableId) -> Result<(), EditorError> {
        self.apply(|s| s.send_to_back(id))
    }

    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn set_background(&mut self, color: &str) -> Result<(), EditorError> {
        self.apply(|s| s.set_background(color))
    }

    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn clear(&mut self) -> Result<(), EditorError> {
        self.apply(CanvasSurface::clear)
    }

    // --- Non-structural ---

    /// Switch tools. Never commits history.
    ///
    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn set_tool(&mut self, tool: Tool) -> Result<(), EditorError> {
        self.ensure_mutable()?;
        self.surface.set_tool_mode(tool.surface_mode())?;
        self.tool = tool;
        debug!(?tool, "tool selected");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(InvalidGeometry)`.
    pub fn set_brush(&mut self, color: &str, width: f64) -> Result<(), EditorError> {
        self.ensure_mutable()?;
        Ok(self.surface.set_brush(color, width)?)
    }

    /// # Errors
    ///
    /// `NotEditing`, `Busy`, or `Surface(UnknownDrawable)`.
    pub fn select(&mut self, id: &DrawableId) -> Result<(), EditorError> {
        self.ensure_mutable()?;
        Ok(self.surface.select(id)?)
    }

    // --- History ---

    /// Step back one history entry. `Ok(false)` when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.ensure_mutable()?;
        let Some(scene) = self.history.undo() else {
            return Ok(false);
        };
        self.replay(scene);
        Ok(true)
    }

    /// Step forward one history entry. `Ok(false)` when there is nothing to
    /// redo.
    ///
    /// # Errors
    ///
    /// `NotEditing` or `Busy`.
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.ensure_mutable()?;
        let Some(scene) = self.history.redo() else {
            return Ok(false);
        };
        self.replay(scene);
        Ok(true)
    }

    fn replay(&mut self, scene: Scene) {
        self.surface.load_scene(scene);
        self.edits += 1;
        debug!(cursor = self.history.cursor(), len = self.history.len(), "history replayed");
    }

    // --- Load ---

    /// Issue a load of the owner's canvas.
    ///
    /// # Errors
    ///
    /// `Busy` while another load or save is in flight.
    pub fn begin_load(&mut self) -> Result<PendingLoad, EditorError> {
        self.ensure_live()?;
        if self.load_in_flight || self.save_in_flight {
            return Err(EditorError::Busy);
        }
        self.load_in_flight = true;
        debug!(owner = %self.owner, "load issued");
        Ok(PendingLoad { gateway: Arc::clone(&self.gateway), user_id: self.owner, generation: self.generation })
    }

    /// Apply a load outcome. History is always initialized afterwards.
    ///
    /// # Errors
    ///
    /// `Stale` for outcomes of a replaced surface, `Gateway(NotFound)` after
    /// starting empty, `Gateway(Transient)` with the scene untouched.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> Result<LoadReport, EditorError> {
        if outcome.generation != self.generation {
            warn!(
                issued = outcome.generation,
                current = self.generation,
                "discarding stale load outcome"
            );
            return Err(EditorError::Stale);
        }
        self.load_in_flight = false;

        match outcome.result {
            Ok(Some(snapshot)) => match self.surface.restore(&snapshot) {
                Ok(()) => {
                    self.reset_history()?;
                    info!(owner = %self.owner, objects = self.surface.scene().len(), "canvas loaded");
                    Ok(LoadReport::Restored)
                }
                Err(e) => {
                    warn!(owner = %self.owner, error = %e, "stored canvas unreadable; starting empty");
                    self.start_empty()?;
                    Ok(LoadReport::RecoveredFromCorruption)
                }
            },
            Ok(None) => {
                self.start_empty()?;
                debug!(owner = %self.owner, "no stored canvas");
                Ok(LoadReport::Empty)
            }
            Err(GatewayError::CorruptData(reason)) => {
                warn!(owner = %self.owner, %reason, "stored canvas corrupt; starting empty");
                self.start_empty()?;
                Ok(LoadReport::RecoveredFromCorruption)
            }
            Err(e @ GatewayError::NotFound(_)) => {
                warn!(owner = %self.owner, error = %e, "profile missing; starting empty");
                self.start_empty()?;
                Err(e.into())
            }
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "canvas load failed; keeping local scene");
                if self.history.is_empty() {
                    self.reset_history()?;
                }
                Err(e.into())
            }
        }
    }

    /// Begin, fetch, and finish a load.
    ///
    /// # Errors
    ///
    /// See [`Editor::begin_load`] and [`Editor::finish_load`].
    pub async fn load(&mut self) -> Result<LoadReport, EditorError> {
        let pending = self.begin_load()?;
        let outcome = pending.fetch().await;
        self.finish_load(outcome)
    }

    fn start_empty(&mut self) -> Result<(), EditorError> {
        self.surface.load_scene(Scene::empty(self.config.canvas_width, self.config.canvas_height));
        self.reset_history()
    }

    fn reset_history(&mut self) -> Result<(), EditorError> {
        // Replays never record changes; anything left over predates the load.
        self.surface.drain_changes();
        let snapshot = self.surface.serialize()?;
        self.history.initialize(snapshot.clone());
        self.persisted = Some(snapshot);
        self.edits += 1;
        Ok(())
    }

    // --- Save ---

    /// Snapshot the scene and issue a save.
    ///
    /// # Errors
    ///
    /// `NotEditing` outside edit mode, `Busy` while another load or save is
    /// in flight.
    pub fn begin_save(&mut self) -> Result<PendingSave, EditorError> {
        self.ensure_live()?;
        if self.load_in_flight || self.save_in_flight {
            return Err(EditorError::Busy);
        }
        if self.mode != EditorMode::Editing {
            return Err(EditorError::NotEditing);
        }
        let snapshot = self.surface.serialize()?;
        self.save_in_flight = true;
        debug!(owner = %self.owner, bytes = snapshot.as_str().len(), "save issued");
        Ok(PendingSave {
            gateway: Arc::clone(&self.gateway),
            user_id: self.owner,
            snapshot,
            generation: self.generation,
            edits_at_start: self.edits,
        })
    }

    /// Apply a save outcome. Leaves edit mode only if nothing changed while
    /// the request was in flight.
    ///
    /// # Errors
    ///
    /// `Stale` for outcomes of a replaced surface, `Gateway` when the store
    /// rejected the save (the editor stays in edit mode).
    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Result<(), EditorError> {
        if outcome.generation != self.generation {
            warn!(
                issued = outcome.generation,
                current = self.generation,
                "discarding stale save outcome"
            );
            return Err(EditorError::Stale);
        }
        self.save_in_flight = false;

        if let Err(e) = outcome.result {
            error!(owner = %self.owner, error = %e, "canvas save failed");
            return Err(e.into());
        }

        self.persisted = Some(outcome.snapshot);
        if self.edits == outcome.edits_at_start {
            self.leave_edit_mode();
            info!(owner = %self.owner, "canvas saved");
        } else {
            info!(owner = %self.owner, "canvas saved; newer edits remain in edit mode");
        }
        Ok(())
    }

    /// Begin, send, and finish a save.
    ///
    /// # Errors
    ///
    /// See [`Editor::begin_save`] and [`Editor::finish_save`].
    pub async fn save(&mut self) -> Result<(), EditorError> {
        let pending = self.begin_save()?;
        let outcome = pending.send().await;
        self.finish_save(outcome)
    }

    // --- Export ---

    /// Render the scene as PNG, recovering a lost backend first.
    ///
    /// Returns the download file name and the encoded bytes.
    ///
    /// # Errors
    ///
    /// `Surface(Initialization)` when recovery fails; the editor is
    /// unavailable afterwards.
    pub async fn export(&mut self) -> Result<(String, Vec<u8>), EditorError> {
        self.ensure_live()?;
        if self.surface.is_context_lost() {
            warn!("rendering context lost; recovering before export");
            if let Err(e) = self.surface.recover(self.factory.as_ref()).await {
                error!(error = %e, "backend recovery failed; editor unavailable");
                self.unavailable = true;
                return Err(e.into());
            }
        }
        let bytes = self.surface.export_png()?;
        let file_name = export_file_name(time::OffsetDateTime::now_utc().date());
        info!(%file_name, bytes = bytes.len(), "canvas exported");
        Ok((file_name, bytes))
    }

    // --- Lifecycle ---

    /// Release the surface. In-flight outcomes become stale.
    pub fn dispose(&mut self) {
        self.surface.dispose();
        self.retire_generation();
        debug!(owner = %self.owner, "editor disposed");
    }

    /// Dispose the current surface and create a fresh one holding the same
    /// scene. In-flight outcomes become stale.
    ///
    /// # Errors
    ///
    /// `Surface(Initialization)` if the new backend could not be created; the
    /// editor is unavailable afterwards.
    pub async fn replace_surface(&mut self) -> Result<(), EditorError> {
        if self.unavailable {
            return Err(EditorError::Unavailable);
        }
        let scene = self.surface.scene().clone();
        self.surface.dispose();
        self.retire_generation();

        let mut surface = match create_surface(&self.config, self.factory.as_ref()).await {
            Ok(surface) => surface,
            Err(e) => {
                error!(error = %e, "surface replacement failed; editor unavailable");
                self.unavailable = true;
                return Err(e);
            }
        };
        surface.load_scene(scene);
        surface.set_tool_mode(self.tool.surface_mode())?;
        self.surface = surface;
        info!(generation = self.generation, "surface replaced");
        Ok(())
    }

    fn retire_generation(&mut self) {
        self.generation += 1;
        self.load_in_flight = false;
        self.save_in_flight = false;
    }

    // --- Accessors ---

    #[must_use]
    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        self.surface.scene()
    }

    #[must_use]
    pub fn selection(&self) -> Option<DrawableId> {
        self.surface.selection()
    }

    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.load_in_flight || self.save_in_flight
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.ensure_live().is_ok()
    }

    /// Whether the live scene differs from what was last loaded or saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.history.current() != self.persisted.as_ref()
    }
}

async fn create_surface(config: &EditorConfig, factory: &dyn BackendFactory) -> Result<CanvasSurface, EditorError> {
    let mut surface = CanvasSurface::create(factory, config.canvas_width, config.canvas_height, config.retry).await?;
    if let Err(e) = surface.set_brush(DEFAULT_BRUSH_COLOR, config.brush_width) {
        warn!(error = %e, width = config.brush_width, "configured brush width rejected; using default");
    }
    Ok(surface)
}
