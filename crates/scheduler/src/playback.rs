use std::time::{Duration, Instant};

use compositor::{Compositor, Keyed, MediaError};
use image::RgbaImage;

use crate::geometry::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Running,
    Stopped,
}

/// What a window should do after one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Not due yet, or stopped.
    Idle,
    /// Clip looped back to the start; nothing to present this tick.
    Rewound,
    Frame {
        image: RgbaImage,
        /// Set when the frame size differs from the previous frame.
        resized: Option<Size>,
    },
}

/// Fixed-interval playback loop for one window.
///
/// Running while it holds a compositor; stopping drops the compositor and
/// with it the decoder.
#[derive(Debug)]
pub struct Playback {
    compositor: Option<Compositor>,
    interval: Duration,
    next_due: Instant,
    frame_size: Size,
}

impl Playback {
    pub fn start(compositor: Compositor, interval: Duration, now: Instant) -> Self {
        let frame_size = Size::from(compositor.dimensions());
        Self {
            compositor: Some(compositor),
            interval,
            next_due: now,
            frame_size,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.compositor.is_some() {
            PlaybackState::Running
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn stop(&mut self) {
        self.compositor = None;
    }

    /// Re-enters the running state with a freshly opened compositor.
    pub fn restart(&mut self, compositor: Compositor, now: Instant) {
        self.stop();
        self.frame_size = Size::from(compositor.dimensions());
        self.compositor = Some(compositor);
        self.next_due = now;
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.compositor.as_ref().map(|_| self.next_due)
    }

    pub fn tick(&mut self, now: Instant) -> Result<Tick, MediaError> {
        let Some(compositor) = self.compositor.as_mut() else {
            return Ok(Tick::Idle);
        };
        if now < self.next_due {
            return Ok(Tick::Idle);
        }

        self.next_due += self.interval;
        if self.next_due <= now {
            // Fell behind; drop the backlog instead of bursting.
            self.next_due = now + self.interval;
        }

        match compositor.step()? {
            Keyed::Rewound => Ok(Tick::Rewound),
            Keyed::Frame(image) => {
                let size = Size::from(image.dimensions());
                let resized = (size != self.frame_size).then_some(size);
                self.frame_size = size;
                Ok(Tick::Frame { image, resized })
            }
        }
    }
}
