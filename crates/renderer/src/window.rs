use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use image::RgbaImage;
use scheduler::{
    CloseReason, Command, ManagerEvent, Point, Rect, Size, WindowId as PetId, WindowManager,
};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, StartCause, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder, WindowId, WindowLevel};

use crate::menu::{MenuModel, PopupMenu};
use crate::surface::{PetSurface, Presenter};
use crate::types::{DisplayConfig, Startup};

/// OS window plus presentation state for one registered pet.
struct PetWindow {
    pet: PetId,
    window: Arc<Window>,
    surface: PetSurface,
    pending: Option<RgbaImage>,
}

impl PetWindow {
    fn open(
        pet: PetId,
        title: &str,
        position: Point,
        size: Size,
        presenter: &mut Presenter,
        elwt: &EventLoopWindowTarget<()>,
    ) -> Result<Self> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_inner_size(PhysicalSize::new(size.width, size.height))
            .with_position(PhysicalPosition::new(position.x, position.y))
            .build(elwt)
            .map_err(|err| anyhow!("failed to create pet window: {err}"))?;
        let window = Arc::new(window);
        let surface = presenter.attach(window.clone())?;
        Ok(Self {
            pet,
            window,
            surface,
            pending: None,
        })
    }

    fn resize(&self, size: Size) {
        let _ = self
            .window
            .request_inner_size(PhysicalSize::new(size.width, size.height));
    }

    fn queue_frame(&mut self, image: RgbaImage) {
        self.pending = Some(image);
        self.window.request_redraw();
    }

    fn redraw(&mut self) {
        let Some(frame) = self.pending.take() else {
            return;
        };
        if let Err(err) = self.surface.present(&frame) {
            warn!(window = %self.pet, "failed to present frame: {err:?}");
        }
    }
}

/// Event-loop side of the application: maps OS windows to manager handles
/// and applies the manager's events.
struct Display {
    manager: WindowManager,
    menu_model: MenuModel,
    popup: PopupMenu,
    presenter: Presenter,
    startup: Startup,
    fallback_screen: Rect,
    windows: HashMap<WindowId, PetWindow>,
    by_pet: HashMap<PetId, WindowId>,
}

impl Display {
    fn new(manager: WindowManager, config: DisplayConfig) -> Result<Self> {
        let popup = PopupMenu::new(&config.menu)?;
        Ok(Self {
            manager,
            menu_model: config.menu,
            popup,
            presenter: Presenter::new(),
            startup: config.startup,
            fallback_screen: config.fallback_screen,
            windows: HashMap::new(),
            by_pet: HashMap::new(),
        })
    }

    fn start(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let screen = screen_geometry(elwt, self.fallback_screen);
        info!(
            x = screen.origin.x,
            y = screen.origin.y,
            width = screen.size.width,
            height = screen.size.height,
            "placement screen"
        );
        self.manager.set_screen(screen);

        let command = match self.startup {
            Startup::Single => Command::Spawn,
            Startup::Rave => Command::Rave,
        };
        self.dispatch(command, elwt);
        if self.manager.is_empty() {
            error!("no pet window could be opened; exiting");
            elwt.exit();
        }
    }

    fn dispatch(&mut self, command: Command, elwt: &EventLoopWindowTarget<()>) {
        debug!(?command, "dispatch");
        let events = self.manager.dispatch(command, Instant::now());
        self.apply(events, elwt);
    }

    fn apply(&mut self, events: Vec<ManagerEvent>, elwt: &EventLoopWindowTarget<()>) {
        let mut queue = VecDeque::from(events);
        while let Some(event) = queue.pop_front() {
            match event {
                ManagerEvent::Spawned {
                    id,
                    position,
                    size,
                    animation,
                } => {
                    let title = self
                        .manager
                        .catalog()
                        .get(animation)
                        .map(|def| def.name.clone())
                        .unwrap_or_default();
                    let opened =
                        PetWindow::open(id, &title, position, size, &mut self.presenter, elwt);
                    match opened {
                        Ok(pet) => {
                            self.by_pet.insert(id, pet.window.id());
                            self.windows.insert(pet.window.id(), pet);
                        }
                        Err(err) => {
                            error!(window = %id, "{err:?}");
                            queue.extend(self.manager.dispatch(Command::Remove(id), Instant::now()));
                        }
                    }
                }
                ManagerEvent::Resized { id, size } => {
                    if let Some(pet) = self.pet(id) {
                        pet.resize(size);
                    }
                }
                ManagerEvent::Frame { id, image } => {
                    if let Some(pet) = self.pet(id) {
                        pet.queue_frame(image);
                    }
                }
                ManagerEvent::Closed { id, reason } => {
                    if let Some(window_id) = self.by_pet.remove(&id) {
                        self.windows.remove(&window_id);
                    }
                    match reason {
                        CloseReason::Removed => debug!(window = %id, "window closed"),
                        CloseReason::MediaFailed(message) => {
                            warn!(window = %id, "window closed after media failure: {message}")
                        }
                    }
                }
                ManagerEvent::Terminate => {
                    info!("shutting down");
                    elwt.exit();
                }
            }
        }
    }

    fn pet(&mut self, id: PetId) -> Option<&mut PetWindow> {
        let window_id = self.by_pet.get(&id)?;
        self.windows.get_mut(window_id)
    }

    fn handle_window_event(
        &mut self,
        window_id: WindowId,
        event: WindowEvent,
        elwt: &EventLoopWindowTarget<()>,
    ) {
        let Some(pet) = self.windows.get_mut(&window_id) else {
            return;
        };
        let id = pet.pet;
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.dispatch(Command::Remove(id), elwt);
            }
            WindowEvent::RedrawRequested => pet.redraw(),
            WindowEvent::Resized(size) => pet.surface.resize(size.width, size.height),
            WindowEvent::Moved(position) => {
                self.manager.move_to(id, Point::new(position.x, position.y));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => match button {
                MouseButton::Left => {
                    if let Err(err) = pet.window.drag_window() {
                        debug!(window = %id, "drag unavailable: {err}");
                    }
                }
                MouseButton::Right => {
                    let window = pet.window.clone();
                    self.popup.show(&window, id);
                    self.poll_menu(elwt);
                }
                _ => {}
            },
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let Some(action) = self.menu_model.shortcut(&event.logical_key) {
                    self.dispatch(action.command(id), elwt);
                }
            }
            _ => {}
        }
    }

    fn poll_menu(&mut self, elwt: &EventLoopWindowTarget<()>) {
        while let Some((target, action)) = self.popup.poll() {
            self.dispatch(action.command(target), elwt);
        }
    }

    fn about_to_wait(&mut self, elwt: &EventLoopWindowTarget<()>) {
        if self.manager.is_terminated() {
            return;
        }
        self.poll_menu(elwt);

        let now = Instant::now();
        let events = self.manager.tick_due(now);
        self.apply(events, elwt);

        match self.manager.next_deadline() {
            Some(deadline) => {
                let ms = deadline.saturating_duration_since(now).as_millis();
                trace!(deadline_ms = ms, "waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            None => {
                trace!("idle (no running windows)");
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
    }
}

/// Primary monitor bounds, or the first monitor when the platform has no
/// notion of a primary one (Wayland).
fn screen_geometry(elwt: &EventLoopWindowTarget<()>, fallback: Rect) -> Rect {
    let monitor = elwt
        .primary_monitor()
        .or_else(|| elwt.available_monitors().next());
    match monitor {
        Some(monitor) if monitor.size().width > 0 && monitor.size().height > 0 => {
            let position = monitor.position();
            let size = monitor.size();
            Rect::new(
                Point::new(position.x, position.y),
                Size::new(size.width, size.height),
            )
        }
        _ => {
            warn!(
                width = fallback.size.width,
                height = fallback.size.height,
                "no monitor reported; using fallback screen"
            );
            fallback
        }
    }
}

/// Runs the pet event loop on the calling thread until the last window closes
/// or exit is requested.
pub fn run(manager: WindowManager, config: DisplayConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let mut display = Display::new(manager, config)?;

    event_loop
        .run(move |event, elwt| match event {
            Event::NewEvents(StartCause::Init) => display.start(elwt),
            Event::WindowEvent { window_id, event } => {
                display.handle_window_event(window_id, event, elwt)
            }
            Event::AboutToWait => display.about_to_wait(elwt),
            Event::LoopExiting => {
                let windows = display.windows.len();
                debug!(windows, "event loop exiting");
            }
            _ => {}
        })
        .map_err(|err| anyhow!("pet event loop error: {err}"))
}
