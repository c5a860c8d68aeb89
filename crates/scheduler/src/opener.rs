use compositor::{FfmpegSource, FfmpegTools, FrameSource, MediaError, MemorySource};
use petconfig::AnimationDef;

/// Opens a fresh frame source for an animation. Every call returns an
/// independent decoder; windows never share one.
pub trait SourceOpener {
    fn open(&self, animation: &AnimationDef) -> Result<Box<dyn FrameSource>, MediaError>;
}

/// Opens clips through ffmpeg, optionally decoding them fully into memory.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOpener {
    tools: FfmpegTools,
    preload: bool,
}

impl FfmpegOpener {
    pub fn new(tools: FfmpegTools, preload: bool) -> Self {
        Self { tools, preload }
    }
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, animation: &AnimationDef) -> Result<Box<dyn FrameSource>, MediaError> {
        let mut source = FfmpegSource::open(&self.tools, &animation.path)?;
        if self.preload {
            let memory = MemorySource::preload(&mut source)?;
            return Ok(Box::new(memory));
        }
        Ok(Box::new(source))
    }
}
