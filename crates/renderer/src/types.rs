use scheduler::{Point, Rect, Size};

use crate::menu::MenuModel;

/// What the display does once the event loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Startup {
    /// One window with the manager's spawn animation at the default position.
    #[default]
    Single,
    /// One randomly placed window per catalog entry.
    Rave,
}

/// Settings consumed by [`crate::run`].
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub startup: Startup,
    pub menu: MenuModel,
    /// Screen used for placement when the platform reports no monitor.
    pub fallback_screen: Rect,
}

impl DisplayConfig {
    pub const FALLBACK_SCREEN: Rect = Rect::new(Point::new(0, 0), Size::new(1920, 1080));

    pub fn new(menu: MenuModel) -> Self {
        Self {
            startup: Startup::default(),
            menu,
            fallback_screen: Self::FALLBACK_SCREEN,
        }
    }
}
