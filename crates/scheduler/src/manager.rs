use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use compositor::{Compositor, KeySettings, MediaError};
use image::RgbaImage;
use petconfig::Catalog;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::geometry::{clamp_to_screen, random_position, Point, Rect, Size};
use crate::opener::SourceOpener;
use crate::playback::{Playback, PlaybackState, Tick};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("animation #{0} is not in the catalog")]
    UnknownAnimation(usize),
    #[error("window {0} is not registered")]
    UnknownWindow(WindowId),
    #[error("failed to open animation '{animation}': {source}")]
    Media {
        animation: String,
        #[source]
        source: MediaError,
    },
}

/// Generational handle into the window registry. A handle to a removed
/// window never matches a window created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The configured default offset from the screen origin.
    Default,
    /// Uniformly random, fully on screen.
    Random,
}

/// User-level actions, one per menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ChangeAnimation { window: WindowId, animation: usize },
    Spawn,
    Rave,
    Remove(WindowId),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Removed,
    MediaFailed(String),
}

/// Effects the display layer must apply after a manager call.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    Spawned {
        id: WindowId,
        position: Point,
        size: Size,
        animation: usize,
    },
    Resized {
        id: WindowId,
        size: Size,
    },
    Frame {
        id: WindowId,
        image: RgbaImage,
    },
    Closed {
        id: WindowId,
        reason: CloseReason,
    },
    /// The registry emptied or exit was requested. Emitted at most once.
    Terminate,
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub key_settings: KeySettings,
    pub frame_interval: Duration,
    /// Offset of default placements from the screen origin.
    pub default_offset: Point,
    /// Catalog index used by `Command::Spawn`.
    pub spawn_animation: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            key_settings: KeySettings::default(),
            frame_interval: Duration::from_millis(33),
            default_offset: Point::new(100, 100),
            spawn_animation: 0,
        }
    }
}

#[derive(Debug)]
pub struct FloatingWindow {
    position: Point,
    size: Size,
    animation: usize,
    playback: Playback,
}

impl FloatingWindow {
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn animation(&self) -> usize {
        self.animation
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.state()
    }
}

struct Slot {
    generation: u32,
    window: Option<FloatingWindow>,
}

/// Registry of live floating windows plus the shared catalog.
pub struct WindowManager {
    catalog: Arc<Catalog>,
    opener: Box<dyn SourceOpener>,
    options: ManagerOptions,
    screen: Rect,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    rng: StdRng,
    terminated: bool,
}

impl WindowManager {
    pub fn new(
        catalog: Arc<Catalog>,
        opener: Box<dyn SourceOpener>,
        options: ManagerOptions,
        screen: Rect,
        seed: u64,
    ) -> Self {
        Self {
            catalog,
            opener,
            options,
            screen,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            rng: StdRng::seed_from_u64(seed),
            terminated: false,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    pub fn set_screen(&mut self, screen: Rect) {
        self.screen = screen;
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn get(&self, id: WindowId) -> Option<&FloatingWindow> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.window.as_ref()
    }

    fn get_mut(&mut self, id: WindowId) -> Option<&mut FloatingWindow> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.window.as_mut()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.window.is_some())
            .map(|(index, slot)| WindowId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    fn open_compositor(&self, animation: usize) -> Result<Compositor, ManagerError> {
        let def = self
            .catalog
            .get(animation)
            .ok_or(ManagerError::UnknownAnimation(animation))?;
        let source = self
            .opener
            .open(def)
            .map_err(|source| ManagerError::Media {
                animation: def.name.clone(),
                source,
            })?;
        Ok(Compositor::new(source, self.options.key_settings))
    }

    /// Opens the clip, places the window and starts its playback loop.
    pub fn spawn(
        &mut self,
        animation: usize,
        placement: Placement,
        now: Instant,
    ) -> Result<WindowId, ManagerError> {
        let compositor = self.open_compositor(animation)?;
        let size = Size::from(compositor.dimensions());
        let origin = match placement {
            Placement::Default => Point::new(
                self.screen.origin.x.saturating_add(self.options.default_offset.x),
                self.screen.origin.y.saturating_add(self.options.default_offset.y),
            ),
            Placement::Random => random_position(&mut self.rng, self.screen, size),
        };
        let bounds = clamp_to_screen(Rect::new(origin, size), self.screen);
        let window = FloatingWindow {
            position: bounds.origin,
            size,
            animation,
            playback: Playback::start(compositor, self.options.frame_interval, now),
        };
        let id = self.insert(window);
        info!(
            window = %id,
            animation = %self.catalog.get(animation).map(|a| a.name.as_str()).unwrap_or("?"),
            x = bounds.origin.x,
            y = bounds.origin.y,
            width = size.width,
            height = size.height,
            "spawned window"
        );
        Ok(id)
    }

    fn insert(&mut self, window: FloatingWindow) -> WindowId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.window = Some(window);
            return WindowId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            window: Some(window),
        });
        WindowId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Deregisters a window. Returns `true` when this removal emptied the
    /// registry and the termination signal fired.
    pub fn remove(&mut self, id: WindowId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation {
            return false;
        }
        let Some(mut window) = slot.window.take() else {
            return false;
        };
        window.playback.stop();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        debug!(window = %id, remaining = self.live, "removed window");
        self.signal_if_empty()
    }

    fn signal_if_empty(&mut self) -> bool {
        if self.live == 0 && !self.terminated {
            self.terminated = true;
            info!("last window closed; terminating");
            true
        } else {
            false
        }
    }

    /// Spawns one randomly placed window per catalog entry, in catalog order.
    pub fn rave(&mut self, now: Instant) -> Vec<WindowId> {
        let mut spawned = Vec::with_capacity(self.catalog.len());
        for animation in 0..self.catalog.len() {
            match self.spawn(animation, Placement::Random, now) {
                Ok(id) => spawned.push(id),
                Err(err) => warn!(error = %err, "rave skipped an animation"),
            }
        }
        spawned
    }

    /// Replaces the window's clip: stop, release the old decoder, open the
    /// new one, resume. On failure the window is left stopped for the caller
    /// to close.
    pub fn change_animation(
        &mut self,
        id: WindowId,
        animation: usize,
        now: Instant,
    ) -> Result<Size, ManagerError> {
        if !self.contains(id) {
            return Err(ManagerError::UnknownWindow(id));
        }
        if self.catalog.get(animation).is_none() {
            return Err(ManagerError::UnknownAnimation(animation));
        }
        if let Some(window) = self.get_mut(id) {
            window.playback.stop();
        }
        let compositor = self.open_compositor(animation)?;
        let window = self.get_mut(id).ok_or(ManagerError::UnknownWindow(id))?;
        window.size = Size::from(compositor.dimensions());
        window.animation = animation;
        window.playback.restart(compositor, now);
        Ok(window.size)
    }

    /// Records a position reported by the display after a drag.
    pub fn move_to(&mut self, id: WindowId, position: Point) {
        if let Some(window) = self.get_mut(id) {
            window.position = position;
        }
    }

    /// Earliest frame deadline across running windows.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|slot| slot.window.as_ref())
            .filter_map(|window| window.playback.next_due())
            .min()
    }

    /// Advances every window whose deadline has passed.
    pub fn tick_due(&mut self, now: Instant) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        for id in self.ids() {
            self.tick_window(id, now, &mut events);
        }
        events
    }

    fn tick_window(&mut self, id: WindowId, now: Instant, events: &mut Vec<ManagerEvent>) {
        let Some(window) = self.get_mut(id) else {
            return;
        };
        match window.playback.tick(now) {
            Ok(Tick::Idle) | Ok(Tick::Rewound) => {}
            Ok(Tick::Frame { image, resized }) => {
                if let Some(size) = resized {
                    window.size = size;
                    events.push(ManagerEvent::Resized { id, size });
                }
                events.push(ManagerEvent::Frame { id, image });
            }
            Err(err) => {
                error!(window = %id, error = %err, "playback failed; closing window");
                self.close_failed(id, err.to_string(), events);
            }
        }
    }

    fn close_failed(&mut self, id: WindowId, message: String, events: &mut Vec<ManagerEvent>) {
        let emptied = self.remove(id);
        events.push(ManagerEvent::Closed {
            id,
            reason: CloseReason::MediaFailed(message),
        });
        if emptied {
            events.push(ManagerEvent::Terminate);
        }
    }

    fn spawned_event(&self, id: WindowId) -> Option<ManagerEvent> {
        let window = self.get(id)?;
        Some(ManagerEvent::Spawned {
            id,
            position: window.position,
            size: window.size,
            animation: window.animation,
        })
    }

    /// Applies one user command and reports what the display must do.
    pub fn dispatch(&mut self, command: Command, now: Instant) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        match command {
            Command::ChangeAnimation { window, animation } => {
                match self.change_animation(window, animation, now) {
                    Ok(size) => events.push(ManagerEvent::Resized { id: window, size }),
                    Err(ManagerError::UnknownWindow(_)) => {
                        debug!(window = %window, "ignoring command for closed window");
                    }
                    Err(err @ ManagerError::UnknownAnimation(_)) => {
                        warn!(error = %err, "ignoring animation change");
                    }
                    Err(err) => {
                        error!(window = %window, error = %err, "animation switch failed; closing window");
                        self.close_failed(window, err.to_string(), &mut events);
                    }
                }
            }
            Command::Spawn => {
                match self.spawn(self.options.spawn_animation, Placement::Default, now) {
                    Ok(id) => events.extend(self.spawned_event(id)),
                    Err(err) => error!(error = %err, "spawn failed"),
                }
            }
            Command::Rave => {
                for id in self.rave(now) {
                    events.extend(self.spawned_event(id));
                }
            }
            Command::Remove(window) => {
                if self.contains(window) {
                    let emptied = self.remove(window);
                    events.push(ManagerEvent::Closed {
                        id: window,
                        reason: CloseReason::Removed,
                    });
                    if emptied {
                        events.push(ManagerEvent::Terminate);
                    }
                }
            }
            Command::Exit => {
                if !self.terminated {
                    self.terminated = true;
                    info!(windows = self.live, "exit requested");
                    events.push(ManagerEvent::Terminate);
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use compositor::{FrameRead, FrameSource, MemorySource};
    use image::{Rgb, RgbImage};
    use petconfig::AnimationDef;

    const SCREEN: Rect = Rect::new(Point::new(0, 0), Size::new(1920, 1080));

    #[derive(Default)]
    struct Ledger {
        opened: Vec<String>,
        released: Vec<String>,
    }

    /// Memory-backed source that records its own release.
    struct TrackedSource {
        name: String,
        inner: MemorySource,
        ledger: Rc<RefCell<Ledger>>,
    }

    impl FrameSource for TrackedSource {
        fn dimensions(&self) -> (u32, u32) {
            self.inner.dimensions()
        }

        fn next_frame(&mut self) -> Result<FrameRead, MediaError> {
            self.inner.next_frame()
        }

        fn rewind(&mut self) -> Result<(), MediaError> {
            self.inner.rewind()
        }

        fn describe(&self) -> String {
            self.name.clone()
        }
    }

    impl Drop for TrackedSource {
        fn drop(&mut self) {
            self.ledger.borrow_mut().released.push(self.name.clone());
        }
    }

    struct StubOpener {
        sizes: HashMap<String, (u32, u32)>,
        ledger: Rc<RefCell<Ledger>>,
    }

    impl SourceOpener for StubOpener {
        fn open(&self, animation: &AnimationDef) -> Result<Box<dyn FrameSource>, MediaError> {
            let Some(&(width, height)) = self.sizes.get(&animation.name) else {
                return Err(MediaError::Open {
                    path: animation.path.clone(),
                    reason: "file not found".into(),
                });
            };
            let frames = vec![RgbImage::from_pixel(width, height, Rgb([200, 50, 50])); 2];
            self.ledger
                .borrow_mut()
                .opened
                .push(animation.name.clone());
            Ok(Box::new(TrackedSource {
                name: animation.name.clone(),
                inner: MemorySource::new(animation.name.clone(), frames)?,
                ledger: self.ledger.clone(),
            }))
        }
    }

    fn manager_with(
        entries: &[(&str, Option<(u32, u32)>)],
    ) -> (WindowManager, Rc<RefCell<Ledger>>) {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let catalog = Catalog::new(
            entries
                .iter()
                .map(|(name, _)| AnimationDef::new(*name, format!("{name}.mp4")))
                .collect(),
        );
        let sizes = entries
            .iter()
            .filter_map(|(name, size)| size.map(|s| (name.to_string(), s)))
            .collect();
        let opener = StubOpener {
            sizes,
            ledger: ledger.clone(),
        };
        let manager = WindowManager::new(
            Arc::new(catalog),
            Box::new(opener),
            ManagerOptions::default(),
            SCREEN,
            7,
        );
        (manager, ledger)
    }

    #[test]
    fn switch_then_close_scenario() {
        let (mut manager, ledger) =
            manager_with(&[("Normal", Some((300, 200))), ("Party", Some((320, 240)))]);
        let now = Instant::now();

        let id = manager.spawn(0, Placement::Default, now).unwrap();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(id).unwrap().animation(), 0);
        assert_eq!(manager.get(id).unwrap().position(), Point::new(100, 100));

        let events = manager.dispatch(
            Command::ChangeAnimation {
                window: id,
                animation: 1,
            },
            now,
        );
        assert_eq!(
            events,
            vec![ManagerEvent::Resized {
                id,
                size: Size::new(320, 240)
            }]
        );
        let window = manager.get(id).unwrap();
        assert_eq!(window.animation(), 1);
        assert_eq!(window.state(), PlaybackState::Running);
        assert_eq!(ledger.borrow().opened, vec!["Normal", "Party"]);
        assert_eq!(ledger.borrow().released, vec!["Normal"]);

        let events = manager.dispatch(Command::Remove(id), now);
        assert_eq!(
            events,
            vec![
                ManagerEvent::Closed {
                    id,
                    reason: CloseReason::Removed
                },
                ManagerEvent::Terminate
            ]
        );
        assert!(manager.is_empty());
        assert!(manager.is_terminated());
        assert_eq!(ledger.borrow().released, vec!["Normal", "Party"]);
    }

    #[test]
    fn termination_fires_once() {
        let (mut manager, _) = manager_with(&[("Normal", Some((10, 10)))]);
        let now = Instant::now();
        let a = manager.spawn(0, Placement::Default, now).unwrap();
        let b = manager.spawn(0, Placement::Default, now).unwrap();
        assert!(!manager.remove(a));
        assert!(manager.remove(b));
        assert!(!manager.remove(b));
        assert!(manager.dispatch(Command::Remove(b), now).is_empty());
        assert!(manager.dispatch(Command::Exit, now).is_empty());
    }

    #[test]
    fn rave_adds_one_window_per_entry() {
        let (mut manager, _) = manager_with(&[
            ("Normal", Some((300, 300))),
            ("Shorty", Some((200, 150))),
            ("Wings", Some((640, 480))),
        ]);
        let now = Instant::now();
        manager.spawn(0, Placement::Default, now).unwrap();
        let events = manager.dispatch(Command::Rave, now);
        assert_eq!(manager.len(), 4);
        let animations: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                ManagerEvent::Spawned { animation, .. } => Some(*animation),
                _ => None,
            })
            .collect();
        assert_eq!(animations, vec![0, 1, 2]);
        for id in manager.ids() {
            assert!(SCREEN.contains_rect(&manager.get(id).unwrap().bounds()));
        }
    }

    #[test]
    fn rave_skips_unopenable_entries() {
        let (mut manager, _) = manager_with(&[("Normal", Some((30, 30))), ("Broken", None)]);
        let spawned = manager.rave(Instant::now());
        assert_eq!(spawned.len(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn random_spawns_fit_on_screen() {
        let (mut manager, _) = manager_with(&[("Normal", Some((500, 700)))]);
        let now = Instant::now();
        for _ in 0..50 {
            let id = manager.spawn(0, Placement::Random, now).unwrap();
            assert!(SCREEN.contains_rect(&manager.get(id).unwrap().bounds()));
        }
    }

    #[test]
    fn default_placement_is_clamped() {
        let (mut manager, _) = manager_with(&[("Huge", Some((1900, 1000)))]);
        let id = manager.spawn(0, Placement::Default, Instant::now()).unwrap();
        assert_eq!(manager.get(id).unwrap().position(), Point::new(20, 80));
    }

    #[test]
    fn failed_switch_closes_only_that_window() {
        let (mut manager, _) = manager_with(&[("Normal", Some((10, 10))), ("Broken", None)]);
        let now = Instant::now();
        let a = manager.spawn(0, Placement::Default, now).unwrap();
        let b = manager.spawn(0, Placement::Default, now).unwrap();
        let events = manager.dispatch(
            Command::ChangeAnimation {
                window: a,
                animation: 1,
            },
            now,
        );
        assert!(matches!(
            events.as_slice(),
            [ManagerEvent::Closed {
                reason: CloseReason::MediaFailed(_),
                ..
            }]
        ));
        assert!(!manager.contains(a));
        assert!(manager.contains(b));
        assert!(!manager.is_terminated());
    }

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let (mut manager, _) = manager_with(&[("Normal", Some((10, 10)))]);
        let now = Instant::now();
        let a = manager.spawn(0, Placement::Default, now).unwrap();
        let keep = manager.spawn(0, Placement::Default, now).unwrap();
        manager.remove(a);
        let c = manager.spawn(0, Placement::Default, now).unwrap();
        assert_ne!(a, c);
        assert!(!manager.contains(a));
        assert!(manager.contains(c));
        assert!(manager.contains(keep));
        assert!(manager.dispatch(Command::Remove(a), now).is_empty());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn ticks_produce_frames_for_due_windows() {
        let (mut manager, _) = manager_with(&[("Normal", Some((4, 4)))]);
        let now = Instant::now();
        let id = manager.spawn(0, Placement::Default, now).unwrap();
        assert_eq!(manager.next_deadline(), Some(now));

        let events = manager.tick_due(now);
        assert!(matches!(events.as_slice(), [ManagerEvent::Frame { id: got, .. }] if *got == id));
        assert!(manager.tick_due(now).is_empty());
        assert_eq!(
            manager.next_deadline(),
            Some(now + Duration::from_millis(33))
        );
    }

    #[test]
    fn removed_windows_stop_ticking() {
        let (mut manager, _) = manager_with(&[("Normal", Some((4, 4)))]);
        let now = Instant::now();
        let a = manager.spawn(0, Placement::Default, now).unwrap();
        let _b = manager.spawn(0, Placement::Default, now).unwrap();
        manager.remove(a);
        let events = manager.tick_due(now);
        assert_eq!(events.len(), 1);
        assert!(events
            .iter()
            .all(|event| !matches!(event, ManagerEvent::Frame { id, .. } if *id == a)));
    }
}
