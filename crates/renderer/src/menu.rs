//! Right-click menu for pet windows.
//!
//! The menu model is platform independent: every entry maps to a
//! [`MenuAction`], and the same actions are reachable from the keyboard.
//! Windows and macOS additionally get a native popup through `muda`; on other
//! platforms a right click logs the shortcut table instead.

use petconfig::Catalog;
use scheduler::{Command, WindowId};
use winit::keyboard::{Key, NamedKey};

/// Digit shortcuts cover the first nine catalog entries.
const MAX_DIGIT_SHORTCUTS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Animation(usize),
    Spawn,
    Rave,
    Remove,
    Exit,
}

impl MenuAction {
    const ANIMATION_PREFIX: &'static str = "animation:";

    pub fn command(self, window: WindowId) -> Command {
        match self {
            MenuAction::Animation(animation) => Command::ChangeAnimation { window, animation },
            MenuAction::Spawn => Command::Spawn,
            MenuAction::Rave => Command::Rave,
            MenuAction::Remove => Command::Remove(window),
            MenuAction::Exit => Command::Exit,
        }
    }

    /// Stable identifier used for native menu items.
    pub fn id(self) -> String {
        match self {
            MenuAction::Animation(index) => format!("{}{index}", Self::ANIMATION_PREFIX),
            MenuAction::Spawn => "spawn".into(),
            MenuAction::Rave => "rave".into(),
            MenuAction::Remove => "remove".into(),
            MenuAction::Exit => "exit".into(),
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        if let Some(index) = id.strip_prefix(Self::ANIMATION_PREFIX) {
            return index.parse().ok().map(MenuAction::Animation);
        }
        match id {
            "spawn" => Some(MenuAction::Spawn),
            "rave" => Some(MenuAction::Rave),
            "remove" => Some(MenuAction::Remove),
            "exit" => Some(MenuAction::Exit),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            MenuAction::Animation(_) => "",
            MenuAction::Spawn => "Spawn New",
            MenuAction::Rave => "Rave",
            MenuAction::Remove => "Remove",
            MenuAction::Exit => "Exit",
        }
    }
}

/// Entries shown under the animation submenu, followed by the fixed actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuModel {
    animations_label: String,
    animations: Vec<String>,
}

impl MenuModel {
    pub const ACTIONS: [MenuAction; 4] = [
        MenuAction::Spawn,
        MenuAction::Rave,
        MenuAction::Remove,
        MenuAction::Exit,
    ];

    pub fn new(animations_label: impl Into<String>, catalog: &Catalog) -> Self {
        Self {
            animations_label: animations_label.into(),
            animations: catalog.iter().map(|def| def.name.clone()).collect(),
        }
    }

    pub fn animations_label(&self) -> &str {
        &self.animations_label
    }

    pub fn animations(&self) -> &[String] {
        &self.animations
    }

    /// Human readable key bindings, one `(key, action)` pair per line.
    pub fn shortcut_table(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = self
            .animations
            .iter()
            .take(MAX_DIGIT_SHORTCUTS)
            .enumerate()
            .map(|(index, name)| {
                (
                    (index + 1).to_string(),
                    format!("{} > {name}", self.animations_label),
                )
            })
            .collect();
        rows.push(("N".into(), MenuAction::Spawn.label().into()));
        rows.push(("R".into(), MenuAction::Rave.label().into()));
        rows.push(("Delete".into(), MenuAction::Remove.label().into()));
        rows.push(("Escape".into(), MenuAction::Exit.label().into()));
        rows
    }

    /// Maps a pressed key to the menu entry it stands in for.
    pub fn shortcut(&self, key: &Key) -> Option<MenuAction> {
        match key {
            Key::Named(NamedKey::Delete | NamedKey::Backspace) => Some(MenuAction::Remove),
            Key::Named(NamedKey::Escape) => Some(MenuAction::Exit),
            Key::Character(value) => {
                let mut chars = value.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                match ch.to_ascii_lowercase() {
                    'n' => Some(MenuAction::Spawn),
                    'r' => Some(MenuAction::Rave),
                    '1'..='9' => {
                        let index = ch as usize - '1' as usize;
                        (index < self.animations.len()).then_some(MenuAction::Animation(index))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
mod native {
    use anyhow::{anyhow, Result};
    use crossbeam_channel::{unbounded, Receiver};
    use muda::{ContextMenu, Menu, MenuEvent, MenuItem, Submenu};
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use scheduler::WindowId;
    use tracing::{debug, warn};
    use winit::window::Window;

    use super::{MenuAction, MenuModel};

    /// Native popup menu shared by every pet window.
    pub struct PopupMenu {
        menu: Menu,
        events: Receiver<MenuEvent>,
        target: Option<WindowId>,
    }

    impl PopupMenu {
        pub fn new(model: &MenuModel) -> Result<Self> {
            let menu = Menu::new();
            let animations = Submenu::new(model.animations_label(), true);
            for (index, name) in model.animations().iter().enumerate() {
                let item = MenuItem::with_id(MenuAction::Animation(index).id(), name, true, None);
                animations
                    .append(&item)
                    .map_err(|err| anyhow!("failed to build animation menu: {err}"))?;
            }
            menu.append(&animations)
                .map_err(|err| anyhow!("failed to build popup menu: {err}"))?;
            for action in MenuModel::ACTIONS {
                let item = MenuItem::with_id(action.id(), action.label(), true, None);
                menu.append(&item)
                    .map_err(|err| anyhow!("failed to build popup menu: {err}"))?;
            }

            let (sender, receiver) = unbounded();
            MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
                let _ = sender.send(event);
            }));

            Ok(Self {
                menu,
                events: receiver,
                target: None,
            })
        }

        /// Opens the popup at the cursor. Selections arrive through [`poll`].
        ///
        /// [`poll`]: PopupMenu::poll
        pub fn show(&mut self, window: &Window, target: WindowId) {
            let Ok(handle) = window.window_handle() else {
                warn!(window = %target, "no native handle; cannot open popup menu");
                return;
            };
            self.target = Some(target);
            let shown = match handle.as_raw() {
                #[cfg(target_os = "windows")]
                RawWindowHandle::Win32(win32) => unsafe {
                    self.menu
                        .show_context_menu_for_hwnd(win32.hwnd.get(), None)
                },
                #[cfg(target_os = "macos")]
                RawWindowHandle::AppKit(appkit) => unsafe {
                    self.menu
                        .show_context_menu_for_nsview(appkit.ns_view.as_ptr() as *const _, None)
                },
                _ => false,
            };
            debug!(window = %target, shown, "popup menu");
        }

        pub fn poll(&mut self) -> Option<(WindowId, MenuAction)> {
            while let Ok(event) = self.events.try_recv() {
                let Some(action) = MenuAction::from_id(event.id().0.as_str()) else {
                    continue;
                };
                if let Some(target) = self.target {
                    return Some((target, action));
                }
            }
            None
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
mod native {
    use anyhow::Result;
    use scheduler::WindowId;
    use tracing::info;
    use winit::window::Window;

    use super::{MenuAction, MenuModel};

    pub(crate) const NO_POPUP_NOTICE: &str =
        "no popup menu on this platform; focus the pet and use these keys";

    /// Stand-in popup for platforms without a native context menu: nothing is
    /// drawn, a right click only logs the keyboard bindings.
    pub struct PopupMenu {
        shortcuts: Vec<(String, String)>,
    }

    impl PopupMenu {
        pub fn new(model: &MenuModel) -> Result<Self> {
            Ok(Self {
                shortcuts: model.shortcut_table(),
            })
        }

        pub fn show(&mut self, _window: &Window, target: WindowId) {
            info!(window = %target, "{NO_POPUP_NOTICE}");
            for line in self.help_lines() {
                info!("{line}");
            }
        }

        pub(crate) fn help_lines(&self) -> Vec<String> {
            self.shortcuts
                .iter()
                .map(|(key, action)| format!("  {key:>6}  {action}"))
                .collect()
        }

        pub fn poll(&mut self) -> Option<(WindowId, MenuAction)> {
            None
        }
    }
}

pub use native::PopupMenu;

#[cfg(test)]
mod tests {
    use super::*;
    use petconfig::{AnimationDef, Catalog};
    use winit::keyboard::SmolStr;

    fn model(count: usize) -> MenuModel {
        let catalog = Catalog::new(
            (0..count)
                .map(|i| AnimationDef::new(format!("clip{i}"), format!("clip{i}.mp4")))
                .collect(),
        );
        MenuModel::new("Toot", &catalog)
    }

    fn ch(value: &str) -> Key {
        Key::Character(SmolStr::new(value))
    }

    #[test]
    fn action_ids_are_reversible() {
        for action in [
            MenuAction::Animation(0),
            MenuAction::Animation(12),
            MenuAction::Spawn,
            MenuAction::Rave,
            MenuAction::Remove,
            MenuAction::Exit,
        ] {
            assert_eq!(MenuAction::from_id(&action.id()), Some(action));
        }
        assert_eq!(MenuAction::from_id("animation:x"), None);
        assert_eq!(MenuAction::from_id("quit"), None);
    }

    #[test]
    fn digit_shortcuts_select_existing_animations() {
        let model = model(3);
        assert_eq!(model.shortcut(&ch("1")), Some(MenuAction::Animation(0)));
        assert_eq!(model.shortcut(&ch("3")), Some(MenuAction::Animation(2)));
        assert_eq!(model.shortcut(&ch("4")), None);
        assert_eq!(model.shortcut(&ch("0")), None);
    }

    #[test]
    fn letter_and_named_shortcuts() {
        let model = model(1);
        assert_eq!(model.shortcut(&ch("n")), Some(MenuAction::Spawn));
        assert_eq!(model.shortcut(&ch("N")), Some(MenuAction::Spawn));
        assert_eq!(model.shortcut(&ch("r")), Some(MenuAction::Rave));
        assert_eq!(
            model.shortcut(&Key::Named(NamedKey::Delete)),
            Some(MenuAction::Remove)
        );
        assert_eq!(
            model.shortcut(&Key::Named(NamedKey::Backspace)),
            Some(MenuAction::Remove)
        );
        assert_eq!(
            model.shortcut(&Key::Named(NamedKey::Escape)),
            Some(MenuAction::Exit)
        );
        assert_eq!(model.shortcut(&ch("nn")), None);
        assert_eq!(model.shortcut(&Key::Named(NamedKey::Space)), None);
    }

    #[test]
    fn shortcut_table_lists_animations_under_label() {
        let table = model(11).shortcut_table();
        assert_eq!(table[0], ("1".to_string(), "Toot > clip0".to_string()));
        assert_eq!(table[8].0, "9");
        assert_eq!(table[9], ("N".to_string(), "Spawn New".to_string()));
        assert_eq!(table.len(), 9 + 4);
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn fallback_menu_says_it_only_lists_keys() {
        assert!(native::NO_POPUP_NOTICE.starts_with("no popup menu"));
        let popup = PopupMenu::new(&model(2)).unwrap();
        let lines = popup.help_lines();
        assert_eq!(lines.len(), 2 + 4);
        assert_eq!(lines[0], "       1  Toot > clip0");
        assert_eq!(lines.last().unwrap(), "  Escape  Exit");
    }
}
