//! Splitting an animation into numbered PNG frames
//!
//! Each source gets its own directory under the frames root, named after the
//! source's logical name. Frames are written as `frame_000.png`, `frame_001.png`, …
//! which is the pattern the encoder reads back.

use crate::error::*;
use crate::source::{AnimatedImageSource, FrameRecord, Source};
use std::fs;
use std::path::{Path, PathBuf};

/// Digits in a frame file's index
pub const FRAME_INDEX_WIDTH: usize = 3;
/// Indices that fit in [`FRAME_INDEX_WIDTH`] digits
pub const MAX_FRAMES: usize = 1000;
const FRAME_PREFIX: &str = "frame_";
const FRAME_EXT: &str = "png";

/// What was learned from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub name: String,
    pub source: PathBuf,
    pub estimated_fps: u32,
    pub frame_count: usize,
    pub frame_dir: PathBuf,
}

/// File name of the frame at `index`
pub fn frame_file_name(index: usize) -> String {
    format!("{FRAME_PREFIX}{index:0width$}.{FRAME_EXT}", width = FRAME_INDEX_WIDTH)
}

/// printf-style pattern matching every [`frame_file_name`], as ffmpeg expects it
pub fn frame_pattern(frame_dir: &Path) -> PathBuf {
    frame_dir.join(format!("{FRAME_PREFIX}%0{FRAME_INDEX_WIDTH}d.{FRAME_EXT}"))
}

/// Input frame rate implied by the frames' display durations.
///
/// This is `floor(1000 / mean_duration)` with a plain, unweighted mean, so
/// uneven timings only get an approximate rate.
pub fn estimate_fps(durations_ms: &[u32]) -> Option<u32> {
    let total_ms: u64 = durations_ms.iter().copied().map(u64::from).sum();
    if total_ms == 0 {
        return None;
    }
    // 1000 / (total / n) without rounding through floats
    let fps = 1000 * durations_ms.len() as u64 / total_ms;
    Some(u32::try_from(fps).unwrap_or(u32::MAX))
}

/// Decodes `source`, writes its frames to `<frames_root>/<name>/`,
/// and returns the estimated input frame rate.
pub fn extract_frames(source: &AnimatedImageSource, frames_root: &Path) -> CatResult<Extraction> {
    let mut decoder = source.open()?;
    extract_from(&mut *decoder, source, frames_root)
}

/// Same as [`extract_frames`], for an already opened decoder.
///
/// Frames are written as they are decoded. If decoding fails part way, the
/// frames written so far are removed again.
pub fn extract_from(decoder: &mut dyn Source, source: &AnimatedImageSource, frames_root: &Path) -> CatResult<Extraction> {
    let frame_dir = frames_root.join(&source.name);
    fs::create_dir_all(&frame_dir)?;
    remove_stale_frames(&frame_dir)?;

    let written = write_frames(decoder, &source.path, &frame_dir).and_then(|durations| {
        let fps = estimate_fps(&durations)
            .ok_or_else(|| Error::Decode(format!("Frames of \"{}\" declare no display duration", source.path.display())))?;
        Ok((fps, durations.len()))
    });
    let (estimated_fps, frame_count) = match written {
        Ok(res) => res,
        Err(err) => {
            discard_frames(&frame_dir);
            return Err(err);
        },
    };

    tracing::info!(name = %source.name, frames = frame_count, fps = estimated_fps, "extracted frames");
    Ok(Extraction {
        name: source.name.clone(),
        source: source.path.clone(),
        estimated_fps,
        frame_count,
        frame_dir,
    })
}

/// Returns the display duration of every frame written
fn write_frames(decoder: &mut dyn Source, path: &Path, frame_dir: &Path) -> CatResult<Vec<u32>> {
    let mut durations = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        if durations.len() == MAX_FRAMES {
            return Err(Error::Decode(format!(
                "\"{}\" has more than {MAX_FRAMES} frames, which don't fit {FRAME_INDEX_WIDTH}-digit frame names",
                path.display()
            )));
        }
        debug_assert_eq!(frame.index, durations.len());
        write_frame(frame_dir, &frame)?;
        durations.push(frame.duration_ms);
    }
    if durations.is_empty() {
        return Err(Error::NoFrames(path.to_path_buf()));
    }
    Ok(durations)
}

/// Leaves other files alone; the directory goes only if nothing else is in it
fn discard_frames(frame_dir: &Path) {
    if let Err(err) = remove_stale_frames(frame_dir) {
        tracing::warn!(dir = %frame_dir.display(), %err, "can't remove partial frames");
        return;
    }
    let _ = fs::remove_dir(frame_dir);
}

/// Frames from a previous, longer run would otherwise be picked up by the encoder
fn remove_stale_frames(frame_dir: &Path) -> CatResult<()> {
    for entry in fs::read_dir(frame_dir)? {
        let path = entry?.path();
        if is_frame_file(&path) {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn is_frame_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FRAME_EXT))
        .and_then(|rest| rest.strip_suffix('.'))
        .map_or(false, |digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        && path.is_file()
}

fn write_frame(frame_dir: &Path, frame: &FrameRecord) -> CatResult<()> {
    let path = frame_dir.join(frame_file_name(frame.index));
    let image = frame.image.as_ref();
    lodepng::encode32_file(&path, image.buf(), image.width(), image.height())
        .map_err(|err| Error::PNG(format!("Can't write {}: {}", path.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;
    use rgb::RGBA8;

    struct Synthetic {
        remaining: Vec<u32>,
        index: usize,
    }

    impl Synthetic {
        fn new(durations: &[u32]) -> Self {
            Self { remaining: durations.iter().rev().copied().collect(), index: 0 }
        }
    }

    impl Source for Synthetic {
        fn next_frame(&mut self) -> CatResult<Option<FrameRecord>> {
            let Some(duration_ms) = self.remaining.pop() else {
                return Ok(None);
            };
            let index = self.index;
            self.index += 1;
            let shade = (index * 40) as u8;
            Ok(Some(FrameRecord {
                index,
                image: ImgVec::new(vec![RGBA8::new(shade, 0, 255 - shade, 200); 4 * 3], 4, 3),
                duration_ms,
            }))
        }
    }

    /// Hands out the inner frames, then fails
    struct Breaks(Synthetic);

    impl Source for Breaks {
        fn next_frame(&mut self) -> CatResult<Option<FrameRecord>> {
            match self.0.next_frame()? {
                Some(frame) => Ok(Some(frame)),
                None => Err(Error::Decode("corrupt frame".into())),
            }
        }
    }

    fn source(name: &str) -> AnimatedImageSource {
        AnimatedImageSource::new(format!("{name}.webp")).unwrap()
    }

    fn frame_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir).unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn fps_is_floor_of_mean() {
        assert_eq!(estimate_fps(&[100, 100, 100]), Some(10));
        assert_eq!(estimate_fps(&[50]), Some(20));
        assert_eq!(estimate_fps(&[30, 40]), Some(28));
        assert_eq!(estimate_fps(&[33]), Some(30));
        assert_eq!(estimate_fps(&[1000]), Some(1));
        assert_eq!(estimate_fps(&[10, 1990]), Some(1));
        assert_eq!(estimate_fps(&[2000]), Some(0));
        assert_eq!(estimate_fps(&[0, 20]), Some(100));
    }

    #[test]
    fn fps_needs_some_duration() {
        assert_eq!(estimate_fps(&[]), None);
        assert_eq!(estimate_fps(&[0, 0]), None);
    }

    #[test]
    fn fps_is_at_least_one_up_to_a_second() {
        for d in 1..=1000 {
            assert!(estimate_fps(&[d, d, d]).unwrap() >= 1, "{d}ms");
        }
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_file_name(0), "frame_000.png");
        assert_eq!(frame_file_name(42), "frame_042.png");
        assert_eq!(frame_file_name(999), "frame_999.png");
        assert_eq!(frame_pattern(Path::new("frames/a")), Path::new("frames/a/frame_%03d.png"));
    }

    #[test]
    fn writes_n_frames() {
        let root = tempfile::tempdir().unwrap();
        let mut decoder = Synthetic::new(&[40; 7]);
        let res = extract_from(&mut decoder, &source("wave"), root.path()).unwrap();

        assert_eq!(res.name, "wave");
        assert_eq!(res.estimated_fps, 25);
        assert_eq!(res.frame_count, 7);
        assert_eq!(res.frame_dir, root.path().join("wave"));
        let expected: Vec<_> = (0..7).map(frame_file_name).collect();
        assert_eq!(frame_names(&res.frame_dir), expected);

        let png = lodepng::decode32_file(res.frame_dir.join("frame_001.png")).unwrap();
        assert_eq!((png.width, png.height), (4, 3));
        assert_eq!(png.buffer[0], RGBA8::new(40, 0, 215, 200));
    }

    #[test]
    fn no_frames_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = extract_from(&mut Synthetic::new(&[]), &source("empty"), root.path()).unwrap_err();
        assert!(matches!(err, Error::NoFrames(_)), "{err}");
        assert!(!root.path().join("empty").exists());
    }

    #[test]
    fn zero_durations_are_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = extract_from(&mut Synthetic::new(&[0, 0]), &source("still"), root.path()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err}");
    }

    #[test]
    fn too_many_frames_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = extract_from(&mut Synthetic::new(&[10; MAX_FRAMES + 1]), &source("long"), root.path()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err}");
    }

    #[test]
    fn failure_mid_stream_leaves_no_frames() {
        let root = tempfile::tempdir().unwrap();
        let err = extract_from(&mut Breaks(Synthetic::new(&[40, 40])), &source("cut"), root.path()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err}");
        assert!(!root.path().join("cut").exists());
    }

    #[test]
    fn failed_rerun_keeps_other_files() {
        let root = tempfile::tempdir().unwrap();
        extract_from(&mut Synthetic::new(&[100; 3]), &source("blink"), root.path()).unwrap();
        fs::write(root.path().join("blink").join("notes.txt"), "not a frame").unwrap();

        let err = extract_from(&mut Breaks(Synthetic::new(&[50])), &source("blink"), root.path()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err}");
        assert_eq!(frame_names(&root.path().join("blink")), ["notes.txt"]);
    }

    #[test]
    fn zero_durations_leave_no_frames() {
        let root = tempfile::tempdir().unwrap();
        extract_from(&mut Synthetic::new(&[0, 0]), &source("still"), root.path()).unwrap_err();
        assert!(!root.path().join("still").exists());
    }

    #[test]
    fn rerun_removes_stale_frames() {
        let root = tempfile::tempdir().unwrap();
        extract_from(&mut Synthetic::new(&[100; 5]), &source("blink"), root.path()).unwrap();
        let keep = root.path().join("blink").join("notes.txt");
        fs::write(&keep, "not a frame").unwrap();

        let res = extract_from(&mut Synthetic::new(&[50, 50]), &source("blink"), root.path()).unwrap();
        assert_eq!(res.estimated_fps, 20);
        assert_eq!(frame_names(&res.frame_dir), ["frame_000.png", "frame_001.png", "notes.txt"]);
    }
}
