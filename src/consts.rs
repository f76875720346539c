//! Shared constants for the profile canvas crate.

// ── History ─────────────────────────────────────────────────────

/// Default number of snapshots retained by the history log.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

// ── Canvas ──────────────────────────────────────────────────────

/// Default profile canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: u32 = 600;

/// Default profile canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 800;

/// Largest raster edge the software backend will allocate.
pub const MAX_RASTER_DIMENSION: u32 = 8192;

/// Snapshot format version written into every serialized scene.
pub const SNAPSHOT_VERSION: &str = "5.3.0";

/// Background color of a fresh scene.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Fill color for drawables that don't specify one.
pub const DEFAULT_FILL: &str = "#000000";

/// Font size for text drawables that don't specify one.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

// ── Brush ───────────────────────────────────────────────────────

/// Free-hand brush color until the user picks another.
pub const DEFAULT_BRUSH_COLOR: &str = "#000000";

/// Free-hand brush width in canvas units.
pub const DEFAULT_BRUSH_WIDTH: f64 = 5.0;

// ── Surface initialization ─────────────────────────────────────

/// Attempts made to create a rendering backend before giving up.
pub const DEFAULT_INIT_RETRIES: u32 = 3;

/// Delay before the second attempt; doubles on every further attempt.
pub const DEFAULT_INIT_RETRY_BASE_MS: u64 = 100;

/// Upper bound on a single backoff delay.
pub const MAX_INIT_RETRY_DELAY_MS: u64 = 5_000;

// ── Store ──────────────────────────────────────────────────────

/// Postgres pool size unless `DB_MAX_CONNECTIONS` overrides it.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Timeout for a single REST store request.
pub const STORE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for the REST store.
pub const STORE_CONNECT_TIMEOUT_SECS: u64 = 10;
