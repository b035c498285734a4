/*
 webp2webm: animated emotes to short looping WebM clips

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Converts a folder of animated WebP (or GIF) emotes into VP9 WebM clips.
//!
//! The conversion runs in two phases. First every source is split into
//! numbered PNG frames and its frame rate is estimated from the frames'
//! display durations ([`extract`]). Then every frame directory is matched back
//! to that estimate by name and handed to `ffmpeg` ([`orchestrate`]).
//!
//! [`run`] drives both phases with a [`Settings`].

mod error;
pub use crate::error::*;
mod minipool;
mod ordqueue;
pub mod progress;

mod gif_source;
mod webp_source;
pub mod source;

pub mod encoder;
pub mod extract;
pub mod orchestrate;
pub mod pipeline;
pub mod registry;

pub use crate::encoder::{EncodeJob, FfmpegEncoder, VideoEncoder};
pub use crate::extract::{extract_frames, Extraction};
pub use crate::orchestrate::{EncodeOrchestrator, EncodeReport, JobOutcome};
pub use crate::pipeline::{run, RunSummary};
pub use crate::registry::FpsRegistry;
pub use crate::source::{AnimatedImageSource, FrameRecord, Source};

use std::path::PathBuf;

/// Every tunable of a conversion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Folder with the `.webp`/`.gif` sources
    pub webp_dir: PathBuf,
    /// Folder that receives the `.webm` clips
    pub webm_dir: PathBuf,
    /// Where extracted frames are kept between the two phases
    pub temp_frames_dir: PathBuf,
    /// Output frame rate cap
    pub max_fps: u32,
    /// Clips are cut after this many seconds
    pub max_duration: u32,
    /// Constant rate factor, 0-63. Lower keeps more detail
    pub crf: u8,
    /// Target bitrate in ffmpeg syntax, e.g. `100K`
    pub bitrate: String,
    pub width: u32,
    pub height: u32,
    /// Worker threads for each phase
    pub jobs: usize,
    /// Delete extracted frames once encoding is done
    pub clean_frames: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webp_dir: PathBuf::new(),
            webm_dir: PathBuf::new(),
            temp_frames_dir: PathBuf::from("frames"),
            max_fps: 30,
            max_duration: 3,
            crf: 4,
            bitrate: "100K".into(),
            width: 100,
            height: 100,
            jobs: 1,
            clean_frames: false,
        }
    }
}

impl Settings {
    pub fn new(webp_dir: impl Into<PathBuf>, webm_dir: impl Into<PathBuf>) -> Self {
        Self {
            webp_dir: webp_dir.into(),
            webm_dir: webm_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CatResult<()> {
        let invalid = |msg: &str| Err(Error::InvalidSettings(msg.into()));
        if self.webp_dir.as_os_str().is_empty() {
            return invalid("The input folder (--webp-dir) is required");
        }
        if self.webm_dir.as_os_str().is_empty() {
            return invalid("The output folder (--webm-dir) is required");
        }
        if self.temp_frames_dir.as_os_str().is_empty() {
            return invalid("The frames folder can't be empty");
        }
        if self.max_fps == 0 {
            return invalid("Max fps must be at least 1");
        }
        if self.max_duration == 0 {
            return invalid("Max duration must be at least 1 second");
        }
        if self.crf > 63 {
            return invalid("CRF 63 is maximum");
        }
        if self.width == 0 || self.height == 0 {
            return invalid("Width and height must be at least 1px");
        }
        if !is_valid_bitrate(&self.bitrate) {
            return Err(Error::InvalidSettings(format!("Bitrate \"{}\" is not a number with an optional K or M suffix", self.bitrate)));
        }
        if self.jobs == 0 || self.jobs > 64 {
            return invalid("Jobs must be between 1 and 64");
        }
        Ok(())
    }
}

fn is_valid_bitrate(bitrate: &str) -> bool {
    let number = bitrate.strip_suffix(&['K', 'k', 'M', 'm'][..]).unwrap_or(bitrate);
    let (int, frac) = number.split_once('.').unwrap_or((number, "0"));
    !int.is_empty() && !frac.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new("webp", "webm")
    }

    #[test]
    fn defaults_are_valid() {
        let s = settings();
        s.validate().unwrap();
        assert_eq!(s.temp_frames_dir, PathBuf::from("frames"));
        assert_eq!((s.max_fps, s.max_duration, s.crf), (30, 3, 4));
        assert_eq!(s.bitrate, "100K");
        assert_eq!((s.width, s.height), (100, 100));
    }

    #[test]
    fn dirs_are_required() {
        assert!(Settings::default().validate().is_err());
        assert!(Settings::new("webp", "").validate().is_err());
    }

    #[test]
    fn out_of_range_values() {
        assert!(Settings { crf: 64, ..settings() }.validate().is_err());
        assert!(Settings { crf: 63, ..settings() }.validate().is_ok());
        assert!(Settings { max_fps: 0, ..settings() }.validate().is_err());
        assert!(Settings { max_duration: 0, ..settings() }.validate().is_err());
        assert!(Settings { width: 0, ..settings() }.validate().is_err());
        assert!(Settings { jobs: 0, ..settings() }.validate().is_err());
    }

    #[test]
    fn bitrates() {
        for ok in ["100K", "1M", "250k", "1.5M", "800000"] {
            assert!(is_valid_bitrate(ok), "{ok}");
        }
        for bad in ["", "K", "fast", "1.M", "-5K", "10KB"] {
            assert!(!is_valid_bitrate(bad), "{bad}");
        }
    }
}
