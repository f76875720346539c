//! Scene model: drawables, their whitelisted properties, and snapshots.
//!
//! This module defines what is on the profile canvas (`Scene`, `Drawable`,
//! `Shape`, `LockFlags`) and the serialized form those values take in the
//! history log and in the remote store (`Snapshot`).
//!
//! The wire format follows the object layout of the browser canvas library
//! the profile editor was built on: camelCase keys, a `type` tag per object,
//! and lock flags inline on every object. Only the fields modelled here
//! survive a round trip; anything else in an incoming payload is dropped.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{
    DEFAULT_BACKGROUND, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_FILL, DEFAULT_FONT_SIZE, MAX_RASTER_DIMENSION,
    SNAPSHOT_VERSION,
};
use crate::error::ErrorCode;

/// Unique identifier for a drawable.
pub type DrawableId = Uuid;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not a valid scene: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot payload has unsupported shape: {0}")]
    UnsupportedPayload(&'static str),
}

impl ErrorCode for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_SNAPSHOT_MALFORMED",
            Self::UnsupportedPayload(_) => "E_SNAPSHOT_UNSUPPORTED",
        }
    }
}

// =============================================================================
// DRAWABLES
// =============================================================================

/// A point of a free-hand stroke, relative to the drawable's `left`/`top`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

/// Per-variant geometry and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    #[serde(rename = "rect")]
    Rect { width: f64, height: f64 },
    #[serde(rename = "circle")]
    Circle { radius: f64 },
    #[serde(rename = "i-text", alias = "text", alias = "textbox")]
    Text {
        text: String,
        #[serde(rename = "fontSize", default = "default_font_size")]
        font_size: f64,
    },
    #[serde(rename = "image")]
    Image { src: String, width: f64, height: f64 },
    #[serde(rename = "path")]
    Path {
        path: Vec<PathPoint>,
        stroke: String,
        #[serde(rename = "strokeWidth")]
        stroke_width: f64,
    },
}

impl Shape {
    /// Short lowercase name used in logs and summaries.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Rect { .. } => "rect",
            Self::Circle { .. } => "circle",
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Path { .. } => "path",
        }
    }

    /// Unscaled bounding box `(min_x, min_y, max_x, max_y)` in the drawable's
    /// local coordinates.
    #[must_use]
    pub fn local_bounds(&self) -> (f64, f64, f64, f64) {
        match self {
            Self::Rect { width, height } | Self::Image { width, height, .. } => (0.0, 0.0, *width, *height),
            Self::Circle { radius } => (0.0, 0.0, radius * 2.0, radius * 2.0),
            Self::Text { text, font_size } => {
                #[allow(clippy::cast_precision_loss)]
                let chars = text.chars().count() as f64;
                (0.0, 0.0, chars * font_size * 0.6, font_size * 1.2)
            }
            Self::Path { path, stroke_width, .. } => {
                if path.is_empty() {
                    return (0.0, 0.0, 0.0, 0.0);
                }
                let half = stroke_width / 2.0;
                let mut bounds = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
                for p in path {
                    bounds.0 = bounds.0.min(p.x);
                    bounds.1 = bounds.1.min(p.y);
                    bounds.2 = bounds.2.max(p.x);
                    bounds.3 = bounds.3.max(p.y);
                }
                (bounds.0 - half, bounds.1 - half, bounds.2 + half, bounds.3 + half)
            }
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Self::Rect { width, height } | Self::Image { width, height, .. } => width.is_finite() && height.is_finite(),
            Self::Circle { radius } => radius.is_finite(),
            Self::Text { font_size, .. } => font_size.is_finite(),
            Self::Path { path, stroke_width, .. } => {
                stroke_width.is_finite() && path.iter().all(|p| p.x.is_finite() && p.y.is_finite())
            }
        }
    }
}

/// Independently lockable transforms.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFlags {
    #[serde(rename = "lockMovementX", default)]
    pub movement_x: bool,
    #[serde(rename = "lockMovementY", default)]
    pub movement_y: bool,
    #[serde(rename = "lockRotation", default)]
    pub rotation: bool,
    #[serde(rename = "lockScalingX", default)]
    pub scaling_x: bool,
    #[serde(rename = "lockScalingY", default)]
    pub scaling_y: bool,
}

impl LockFlags {
    /// Every transform locked.
    #[must_use]
    pub fn all() -> Self {
        Self { movement_x: true, movement_y: true, rotation: true, scaling_x: true, scaling_y: true }
    }
}

/// One object on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawable {
    #[serde(default = "Uuid::new_v4")]
    pub id: DrawableId,
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(rename = "scaleX", default = "unit_scale")]
    pub scale_x: f64,
    #[serde(rename = "scaleY", default = "unit_scale")]
    pub scale_y: f64,
    /// Clockwise rotation in degrees around `left`/`top`.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(flatten)]
    pub locks: LockFlags,
}

impl Drawable {
    /// A new drawable at the origin with identity transform.
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            id: Uuid::new_v4(),
            shape,
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            fill: DEFAULT_FILL.to_string(),
            locks: LockFlags::default(),
        }
    }

    /// Whether every numeric attribute is finite. Non-finite values cannot be
    /// represented in a snapshot.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.scale_x.is_finite()
            && self.scale_y.is_finite()
            && self.angle.is_finite()
            && self.shape.is_finite()
    }
}

fn unit_scale() -> f64 {
    1.0
}

fn default_fill() -> String {
    DEFAULT_FILL.to_string()
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

fn default_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}

// =============================================================================
// SCENE
// =============================================================================

/// Everything on the canvas at a point in time. `objects[0]` is drawn first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub objects: Vec<Drawable>,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Scene {
    /// An empty scene of the given size.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self { version: default_version(), objects: Vec::new(), background: default_background(), width, height }
    }

    /// Position of a drawable in z-order.
    #[must_use]
    pub fn index_of(&self, id: &DrawableId) -> Option<usize> {
        self.objects.iter().position(|d| &d.id == id)
    }

    #[must_use]
    pub fn get(&self, id: &DrawableId) -> Option<&Drawable> {
        self.objects.iter().find(|d| &d.id == id)
    }

    pub fn get_mut(&mut self, id: &DrawableId) -> Option<&mut Drawable> {
        self.objects.iter_mut().find(|d| &d.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize into an immutable snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if any drawable holds a non-finite number, which the
    /// wire format cannot carry.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        if !self.objects.iter().all(Drawable::is_finite) {
            return Err(SnapshotError::UnsupportedPayload("non-finite geometry"));
        }
        let text = serde_json::to_string(self)?;
        Ok(Snapshot(Arc::from(text)))
    }

    /// Build a scene from a parsed JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object, does not match the
    /// scene structure, or carries a size no surface can be created at.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        if !value.is_object() {
            return Err(SnapshotError::UnsupportedPayload("scene must be a JSON object"));
        }
        let scene: Self = serde_json::from_value(value)?;
        let in_range = |d: u32| d > 0 && d <= MAX_RASTER_DIMENSION;
        if !(in_range(scene.width) && in_range(scene.height)) {
            return Err(SnapshotError::UnsupportedPayload("canvas dimensions out of range"));
        }
        Ok(scene)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::empty(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable serialized scene. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    /// Wrap already-serialized text without validating it.
    pub fn from_raw(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse back into a scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid scene.
    pub fn parse(&self) -> Result<Scene, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(&self.0)?;
        Scene::from_value(value)
    }

    /// Parse into a generic JSON value, for stores that keep structured JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn to_value(&self) -> Result<serde_json::Value, SnapshotError> {
        Ok(serde_json::from_str(&self.0)?)
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
