//! Display layer for floating pet windows.
//!
//! ```text
//!   floatpet
//!      │ WindowManager + DisplayConfig
//!      ▼
//!   renderer::run ──▶ winit event loop ──▶ WindowManager::tick_due / dispatch
//!                           ▲                        │ ManagerEvent
//!                           │                        ▼
//!                     input / menu           PetWindow (wgpu surface)
//! ```
//!
//! Every pet is a borderless, transparent, always-on-top winit window. The
//! keyed RGBA frame is uploaded as a texture and drawn onto a wgpu surface
//! configured with a premultiplied or postmultiplied composite alpha mode, so
//! keyed pixels reveal the desktop. The event loop sleeps until the earliest
//! frame deadline across all windows.

mod menu;
mod surface;
mod types;
mod window;

pub use menu::{MenuAction, MenuModel, PopupMenu};
pub use types::{DisplayConfig, Startup};
pub use window::run;
