//! Chroma-key compositing for floating clip windows.
//!
//! ```text
//!   FrameSource (ffmpeg / memory) ──▶ Compositor::step ──▶ key_frame ──▶ RgbaImage
//! ```
//!
//! `key_frame` is the per-frame transform: classify pixels against a
//! tolerance band around the backdrop colour, soften the resulting mask, then
//! emit colour plus alpha. Frame sources are sequential and loop through
//! `rewind`.

mod compositor;
mod ffmpeg;
mod key;
mod source;

pub use compositor::{Compositor, Keyed};
pub use ffmpeg::{probe_clip, ClipInfo, FfmpegSource, FfmpegTools};
pub use key::{foreground_mask, key_frame, soften_mask, KeySettings, MAX_BLUR_RADIUS};
pub use source::{FrameRead, FrameSource, MediaError, MemorySource};
