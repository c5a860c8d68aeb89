use image::RgbaImage;

use crate::key::{key_frame, KeySettings};
use crate::source::{FrameRead, FrameSource, MediaError};

/// Output of one compositor step.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyed {
    Frame(RgbaImage),
    /// The clip ended and was rewound; nothing to show this step.
    Rewound,
}

/// Binds a frame source to the key settings of one window.
pub struct Compositor {
    source: Box<dyn FrameSource>,
    settings: KeySettings,
}

impl Compositor {
    pub fn new(source: Box<dyn FrameSource>, settings: KeySettings) -> Self {
        Self { source, settings }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.source.dimensions()
    }

    pub fn settings(&self) -> &KeySettings {
        &self.settings
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Pulls the next frame and keys it, rewinding on end of stream.
    pub fn step(&mut self) -> Result<Keyed, MediaError> {
        match self.source.next_frame()? {
            FrameRead::Frame(frame) => Ok(Keyed::Frame(key_frame(&frame, &self.settings))),
            FrameRead::EndOfStream => {
                self.source.rewind()?;
                Ok(Keyed::Rewound)
            }
        }
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("source", &self.source.describe())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use image::{Rgb, RgbImage};

    #[test]
    fn steps_through_clip_and_loops() {
        let frames = vec![
            RgbImage::from_pixel(3, 3, Rgb([140, 140, 140])),
            RgbImage::from_pixel(3, 3, Rgb([200, 50, 50])),
        ];
        let source = MemorySource::new("clip", frames).unwrap();
        let mut compositor = Compositor::new(Box::new(source), KeySettings::default());
        assert_eq!(compositor.dimensions(), (3, 3));

        let Keyed::Frame(first) = compositor.step().unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(first.get_pixel(1, 1).0[3], 0);
        let Keyed::Frame(second) = compositor.step().unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(second.get_pixel(1, 1).0, [200, 50, 50, 255]);

        assert_eq!(compositor.step().unwrap(), Keyed::Rewound);
        let Keyed::Frame(again) = compositor.step().unwrap() else {
            panic!("expected a frame after rewind");
        };
        assert_eq!(again, first);
    }
}
