//! Window registry and per-window playback loops.
//!
//! The manager owns every floating window's state and the catalog they
//! share. It never touches the OS directly: each call returns
//! [`ManagerEvent`]s for the display layer to apply.

mod geometry;
mod manager;
mod opener;
mod playback;

pub use geometry::{clamp_to_screen, random_position, Point, Rect, Size};
pub use manager::{
    CloseReason, Command, FloatingWindow, ManagerError, ManagerEvent, ManagerOptions, Placement,
    WindowId, WindowManager,
};
pub use opener::{FfmpegOpener, SourceOpener};
pub use playback::{Playback, PlaybackState, Tick};
