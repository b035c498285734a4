//! Turning a directory of numbered frames into one WebM clip

use crate::error::*;
use crate::extract::frame_pattern;
use crate::Settings;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Extension of the produced clips
pub const OUTPUT_EXT: &str = "webm";

/// Everything needed to encode one logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    pub name: String,
    pub frame_dir: PathBuf,
    pub output: PathBuf,
    /// Rate the frames were estimated to play at
    pub input_fps: u32,
    pub output_fps_cap: u32,
    /// Seconds; longer animations are cut, not sped up
    pub max_duration: u32,
    pub crf: u8,
    pub bitrate: String,
    pub width: u32,
    pub height: u32,
}

impl EncodeJob {
    pub fn new(name: &str, frame_dir: PathBuf, output_dir: &Path, input_fps: u32, settings: &Settings) -> Self {
        Self {
            name: name.to_owned(),
            output: output_dir.join(format!("{name}.{OUTPUT_EXT}")),
            frame_dir,
            input_fps,
            output_fps_cap: settings.max_fps,
            max_duration: settings.max_duration,
            crf: settings.crf,
            bitrate: settings.bitrate.clone(),
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Something that can run an [`EncodeJob`].
///
/// Jobs may be handed out from several threads at once.
pub trait VideoEncoder: Sync {
    fn encode(&self, job: &EncodeJob) -> CatResult<()>;
}

/// Runs the `ffmpeg` executable, VP9 with alpha
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Whether the executable can be started at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Complete argument vector for `job`, without the program name
    pub fn args(job: &EncodeJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"].map(OsString::from).into();
        // ffmpeg rejects a zero rate, which animations slower than 1fps would estimate to
        args.extend([OsString::from("-r"), job.input_fps.max(1).to_string().into()]);
        args.extend([OsString::from("-i"), frame_pattern(&job.frame_dir).into_os_string()]);
        args.extend([
            "-vf".into(), format!("scale={}:{}", job.width, job.height),
            "-c:v".into(), "libvpx-vp9".into(),
            "-pix_fmt".into(), "yuva420p".into(),
            "-crf".into(), job.crf.to_string(),
            "-b:v".into(), job.bitrate.clone(),
            "-auto-alt-ref".into(), "0".into(),
            "-lossless".into(), "0".into(),
            "-t".into(), job.max_duration.to_string(),
            "-fpsmax".into(), job.output_fps_cap.to_string(),
        ].map(OsString::from));
        args.push(job.output.clone().into_os_string());
        args
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, job: &EncodeJob) -> CatResult<()> {
        let args = Self::args(job);
        tracing::debug!(program = %self.program.display(), ?args, "running encoder");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::EncodeProcess(job.output.clone(), format!("can't start {}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::EncodeProcess(job.output.clone(), format!("{} ({})", output.status, stderr.trim())));
        }
        Ok(())
    }
}
