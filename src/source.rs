//! Animated inputs, decoded one frame at a time

use crate::error::*;
use crate::gif_source::GifSource;
use crate::webp_source::WebpSource;
use imgref::ImgVec;
use rgb::RGBA8;
use std::path::{Path, PathBuf};

/// One decoded frame of an animation
pub struct FrameRecord {
    /// Position in the animation, starting at 0
    pub index: usize,
    /// Full-canvas pixels, already composited over previous frames
    pub image: ImgVec<RGBA8>,
    /// How long the frame is shown, in milliseconds
    pub duration_ms: u32,
}

/// A decoder that hands out frames until the animation ends.
///
/// `Ok(None)` marks the end of the sequence.
pub trait Source {
    fn next_frame(&mut self) -> CatResult<Option<FrameRecord>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    Webp,
    Gif,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("webp") {
            Some(Self::Webp)
        } else if ext.eq_ignore_ascii_case("gif") {
            Some(Self::Gif)
        } else {
            None
        }
    }
}

/// An input file and the logical name that follows it through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatedImageSource {
    pub path: PathBuf,
    pub name: String,
    pub format: SourceFormat,
}

impl AnimatedImageSource {
    /// `None` if the file isn't WebP or GIF, or has no usable stem
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = SourceFormat::from_path(&path)?;
        let name = path.file_stem()?.to_str()?.to_owned();
        Some(Self { path, name, format })
    }

    pub fn open(&self) -> CatResult<Box<dyn Source>> {
        if !self.path.is_file() {
            return Err(Error::InputNotFound(self.path.clone()));
        }
        Ok(match self.format {
            SourceFormat::Webp => Box::new(WebpSource::new(&self.path)?),
            SourceFormat::Gif => Box::new(GifSource::new(&self.path)?),
        })
    }
}
