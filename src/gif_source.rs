//! This is for reading GIF emotes

use crate::error::*;
use crate::source::{FrameRecord, Source};
use gif::Decoder;
use imgref::ImgVec;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct GifSource {
    decoder: Decoder<BufReader<File>>,
    screen: gif_dispose::Screen,
    next_index: usize,
}

impl GifSource {
    pub fn new(path: &Path) -> CatResult<Self> {
        let file = BufReader::new(File::open(path)?);

        let mut gif_opts = gif::DecodeOptions::new();
        // Important:
        gif_opts.set_color_output(gif::ColorOutput::Indexed);

        let decoder = gif_opts.read_info(file)?;
        let screen = gif_dispose::Screen::new_decoder(&decoder);

        Ok(Self {
            decoder,
            screen,
            next_index: 0,
        })
    }
}

impl Source for GifSource {
    fn next_frame(&mut self) -> CatResult<Option<FrameRecord>> {
        let Some(frame) = self.decoder.read_next_frame()? else {
            return Ok(None);
        };
        self.screen.blit_frame(frame)?;
        // GIF delays are in 1/100s
        let duration_ms = u32::from(frame.delay) * 10;

        let pixels = self.screen.pixels_rgba();
        let image = ImgVec::new(pixels.pixels().collect(), pixels.width(), pixels.height());

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(FrameRecord { index, image, duration_ms }))
    }
}
