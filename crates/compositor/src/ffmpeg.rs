//! Clip decoding through the `ffprobe`/`ffmpeg` executables.
//!
//! `probe_clip` asks ffprobe for the first video stream's geometry, then
//! `FfmpegSource` keeps one ffmpeg child streaming packed `rgb24` frames over
//! its stdout. Rewinding kills the child and starts a fresh one at frame 0.

use std::ffi::OsString;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use tracing::{debug, warn};

use crate::source::{FrameRead, FrameSource, MediaError};

/// Locations of the decoder executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

impl ClipInfo {
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

pub fn probe_clip(tools: &FfmpegTools, path: &Path) -> Result<ClipInfo, MediaError> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    if !path.is_file() {
        return Err(MediaError::Open {
            path: path.to_path_buf(),
            reason: "file not found".into(),
        });
    }

    let out = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| MediaError::Spawn {
            program: tools.ffprobe.clone(),
            source,
        })?;
    if !out.status.success() {
        return Err(MediaError::Probe {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }

    let probe_err = |reason: &str| MediaError::Probe {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|err| probe_err(&format!("ffprobe json parse failed: {err}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| probe_err("no video stream found"))?;
    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| probe_err("missing video width"))?;
    let height = stream
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| probe_err("missing video height"))?;
    let (fps_num, fps_den) =
        parse_ff_ratio(stream.r_frame_rate.as_deref().unwrap_or("0/1")).unwrap_or((0, 1));

    Ok(ClipInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.trim().parse::<u32>().ok()?;
    let b = parts.next()?.trim().parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Arguments that stream `path` as packed `rgb24` frames on stdout.
///
/// Autorotation stays off so decoded frames keep the coded dimensions that
/// ffprobe reports; rotated clips would otherwise arrive transposed.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        ["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl Decoder {
    fn stop(mut self) {
        if let Err(err) = self.child.kill() {
            if err.kind() != ErrorKind::InvalidInput {
                warn!(error = %err, "failed to kill ffmpeg decoder");
            }
        }
        let _ = self.child.wait();
    }
}

/// Streams a clip from an ffmpeg child process.
pub struct FfmpegSource {
    tools: FfmpegTools,
    info: ClipInfo,
    decoder: Option<Decoder>,
    frames_since_start: u64,
}

impl FfmpegSource {
    pub fn open(tools: &FfmpegTools, path: &Path) -> Result<Self, MediaError> {
        let info = probe_clip(tools, path)?;
        let mut source = Self {
            tools: tools.clone(),
            info,
            decoder: None,
            frames_since_start: 0,
        };
        source.start()?;
        debug!(
            clip = %source.info.path.display(),
            width = source.info.width,
            height = source.info.height,
            fps = source.info.fps(),
            "opened clip"
        );
        Ok(source)
    }

    pub fn info(&self) -> &ClipInfo {
        &self.info
    }

    fn start(&mut self) -> Result<(), MediaError> {
        if let Some(old) = self.decoder.take() {
            old.stop();
        }
        let mut child = Command::new(&self.tools.ffmpeg)
            .args(decoder_args(&self.info.path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MediaError::Spawn {
                program: self.tools.ffmpeg.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| MediaError::Open {
            path: self.info.path.clone(),
            reason: "ffmpeg stdout was not captured".into(),
        })?;
        self.decoder = Some(Decoder {
            child,
            stdout: BufReader::with_capacity(self.info.frame_len(), stdout),
        });
        self.frames_since_start = 0;
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn next_frame(&mut self) -> Result<FrameRead, MediaError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(FrameRead::EndOfStream);
        };
        let mut buf = vec![0u8; self.info.frame_len()];
        match decoder.stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                if let Some(done) = self.decoder.take() {
                    done.stop();
                }
                if self.frames_since_start == 0 {
                    return Err(MediaError::Decode {
                        path: self.info.path.clone(),
                        reason: "decoder produced no frames".into(),
                    });
                }
                return Ok(FrameRead::EndOfStream);
            }
            Err(err) => {
                return Err(MediaError::Decode {
                    path: self.info.path.clone(),
                    reason: err.to_string(),
                })
            }
        }
        self.frames_since_start += 1;
        let frame = RgbImage::from_raw(self.info.width, self.info.height, buf).ok_or_else(|| {
            MediaError::Decode {
                path: self.info.path.clone(),
                reason: "frame buffer has unexpected length".into(),
            }
        })?;
        Ok(FrameRead::Frame(frame))
    }

    fn rewind(&mut self) -> Result<(), MediaError> {
        self.start()
    }

    fn describe(&self) -> String {
        self.info.path.display().to_string()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.stop();
        }
    }
}
