//! This is for reading animated WebP emotes

use crate::error::*;
use crate::source::{FrameRecord, Source};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, RgbaImage};
use imgref::ImgVec;
use rgb::{FromSlice, RGBA8};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

enum Frameset {
    Animated(Frames<'static>),
    /// Not an animation; handed out once, with no declared duration
    Still(Option<RgbaImage>),
}

pub struct WebpSource {
    frames: Frameset,
    next_index: usize,
}

impl WebpSource {
    pub fn new(path: &Path) -> CatResult<Self> {
        let file = BufReader::new(File::open(path)?);
        let decoder = WebPDecoder::new(file)?;
        let frames = if decoder.has_animation() {
            Frameset::Animated(decoder.into_frames())
        } else {
            Frameset::Still(Some(DynamicImage::from_decoder(decoder)?.into_rgba8()))
        };
        Ok(Self { frames, next_index: 0 })
    }
}

impl Source for WebpSource {
    fn next_frame(&mut self) -> CatResult<Option<FrameRecord>> {
        let (buffer, duration_ms) = match &mut self.frames {
            Frameset::Animated(frames) => match frames.next().transpose()? {
                Some(frame) => {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    let denom = denom.max(1);
                    (frame.into_buffer(), (numer + denom / 2) / denom)
                },
                None => return Ok(None),
            },
            Frameset::Still(image) => match image.take() {
                Some(image) => (image, 0),
                None => return Ok(None),
            },
        };

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(FrameRecord {
            index,
            image: to_imgvec(buffer),
            duration_ms,
        }))
    }
}

fn to_imgvec(buffer: RgbaImage) -> ImgVec<RGBA8> {
    let (width, height) = buffer.dimensions();
    let pixels = buffer.into_raw().as_rgba().to_vec();
    ImgVec::new(pixels, width as usize, height as usize)
}
