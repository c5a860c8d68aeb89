use std::path::PathBuf;

use image::RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("could not open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("failed to probe {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of pulling one frame from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead {
    Frame(RgbImage),
    /// The stream is exhausted; call [`FrameSource::rewind`] to loop.
    EndOfStream,
}

/// Sequential frame access over a looping clip.
pub trait FrameSource {
    /// Native frame size in pixels.
    fn dimensions(&self) -> (u32, u32);

    fn next_frame(&mut self) -> Result<FrameRead, MediaError>;

    /// Seeks back to the first frame.
    fn rewind(&mut self) -> Result<(), MediaError>;

    /// Label used in diagnostics.
    fn describe(&self) -> String;
}

/// A clip held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    frames: Vec<RgbImage>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, frames: Vec<RgbImage>) -> Result<Self, MediaError> {
        let label = label.into();
        let Some(first) = frames.first() else {
            return Err(MediaError::Open {
                path: PathBuf::from(&label),
                reason: "clip contains no frames".into(),
            });
        };
        let size = first.dimensions();
        if size.0 == 0 || size.1 == 0 {
            return Err(MediaError::Open {
                path: PathBuf::from(&label),
                reason: "clip has zero-sized frames".into(),
            });
        }
        if frames.iter().any(|frame| frame.dimensions() != size) {
            return Err(MediaError::Open {
                path: PathBuf::from(&label),
                reason: "clip frames differ in size".into(),
            });
        }
        Ok(Self {
            label,
            frames,
            cursor: 0,
        })
    }

    /// Drains `source` from its current position into memory.
    pub fn preload(source: &mut dyn FrameSource) -> Result<Self, MediaError> {
        let mut frames = Vec::new();
        while let FrameRead::Frame(frame) = source.next_frame()? {
            frames.push(frame);
        }
        let label = source.describe();
        tracing::debug!(clip = %label, frames = frames.len(), "preloaded clip into memory");
        Self::new(label, frames)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn dimensions(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    fn next_frame(&mut self) -> Result<FrameRead, MediaError> {
        match self.frames.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                Ok(FrameRead::Frame(frame.clone()))
            }
            None => Ok(FrameRead::EndOfStream),
        }
    }

    fn rewind(&mut self) -> Result<(), MediaError> {
        self.cursor = 0;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn numbered(count: u8) -> Vec<RgbImage> {
        (0..count)
            .map(|i| RgbImage::from_pixel(2, 2, Rgb([i, i, i])))
            .collect()
    }

    #[test]
    fn loops_after_rewind() {
        let frames = numbered(3);
        let mut source = MemorySource::new("clip", frames.clone()).unwrap();
        for expected in &frames {
            assert_eq!(source.next_frame().unwrap(), FrameRead::Frame(expected.clone()));
        }
        assert_eq!(source.next_frame().unwrap(), FrameRead::EndOfStream);
        assert_eq!(source.next_frame().unwrap(), FrameRead::EndOfStream);

        source.rewind().unwrap();
        assert_eq!(source.next_frame().unwrap(), FrameRead::Frame(frames[0].clone()));
    }

    #[test]
    fn rejects_empty_and_ragged_clips() {
        assert!(matches!(
            MemorySource::new("empty", Vec::new()),
            Err(MediaError::Open { .. })
        ));
        let ragged = vec![RgbImage::new(2, 2), RgbImage::new(3, 2)];
        assert!(MemorySource::new("ragged", ragged).is_err());
    }

    #[test]
    fn preload_copies_remaining_frames() {
        let mut inner = MemorySource::new("inner", numbered(4)).unwrap();
        inner.next_frame().unwrap();
        let loaded = MemorySource::preload(&mut inner).unwrap();
        assert_eq!(loaded.frame_count(), 3);
        assert_eq!(loaded.describe(), "inner");
    }
}
