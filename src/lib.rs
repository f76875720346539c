//! Edit history and persistence for the profile canvas editor.
//!
//! A profile owner arranges shapes, text, images and free-hand strokes on a
//! canvas shown on their profile. This crate owns everything behind that
//! surface: the scene model and its snapshot format, the mutable canvas
//! surface, linear undo/redo, loading and saving through a remote store, and
//! PNG export through a software raster backend. The host UI only forwards
//! user actions to [`editor::Editor`] and redraws from its scene.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`editor`] | Edit session: view/edit modes, commit rule, async load/save |
//! | [`surface`] | Owned scene, tool mode, selection and change notifications |
//! | [`history`] | Bounded undo/redo log over snapshots |
//! | [`gateway`] | Remote store trait plus Postgres, REST and in-memory stores |
//! | [`scene`] | Drawables, lock flags and the snapshot wire format |
//! | [`raster`] | Rendering backend trait and the `image`-based PNG backend |
//! | [`config`] | Environment-driven editor and store configuration |
//! | [`error`] | The `ErrorCode` trait shared by every error enum |
//! | [`consts`] | Defaults (canvas size, history capacity, retry timing) |

pub mod config;
pub mod consts;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod history;
pub mod raster;
pub mod scene;
pub mod surface;
