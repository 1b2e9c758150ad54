//! # tilde-editor — Editor core for tilde
//!
//! - **[`config`]** — `EditorConfig`: banner name, row marker, quit key, read timing
//! - **[`state`]** — `EditorState`: cursor and viewport, clamped cursor motions
//! - **[`painter`]** — `Painter`: composes one frame into a `RenderBuffer`
//! - **[`session`]** — `Session`: paint, decode one key, dispatch, repeat
//!
//! There is no text model yet: every row shows the row marker, with a
//! version banner a third of the way down.

pub mod config;
pub mod painter;
pub mod session;
pub mod state;
