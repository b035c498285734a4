//! Whole-folder conversion: find sources, extract them all, then encode them all

use crate::encoder::VideoEncoder;
use crate::error::*;
use crate::extract::{extract_frames, Extraction};
use crate::orchestrate::{EncodeOrchestrator, EncodeReport};
use crate::progress::ProgressReporter;
use crate::registry::FpsRegistry;
use crate::source::{AnimatedImageSource, SourceFormat};
use crate::{minipool, ordqueue, Settings};
use std::fs;
use std::path::Path;

/// What a finished run did
#[derive(Debug)]
pub struct RunSummary {
    /// In source order
    pub extracted: Vec<Extraction>,
    pub registry: FpsRegistry,
    pub report: EncodeReport,
}

impl RunSummary {
    /// Every clip was encoded
    pub fn is_success(&self) -> bool {
        self.report.failed().next().is_none()
    }
}

/// WebP and GIF files directly inside `dir`, in natural name order.
///
/// When two files share a logical name, the later one replaces the earlier.
pub fn discover_sources(dir: &Path) -> CatResult<Vec<AnimatedImageSource>> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound(dir.to_path_buf()));
    }
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if SourceFormat::from_path(&path).is_none() {
            continue;
        }
        match AnimatedImageSource::new(&path) {
            Some(source) => sources.push(source),
            None => tracing::warn!(path = %path.display(), "skipped: the file name is not valid UTF-8"),
        }
    }
    if sources.is_empty() {
        return Err(Error::NoInputs(dir.to_path_buf()));
    }
    sources.sort_by(|a, b| natord::compare(&a.path.to_string_lossy(), &b.path.to_string_lossy()));

    let mut unique: Vec<AnimatedImageSource> = Vec::with_capacity(sources.len());
    for source in sources {
        if let Some(prev) = unique.iter_mut().find(|s| s.name == source.name) {
            tracing::warn!(name = %source.name, replaced = %prev.path.display(), by = %source.path.display(), "two sources share a name; the later one is used");
            *prev = source;
        } else {
            unique.push(source);
        }
    }
    Ok(unique)
}

/// First phase. Any failure stops the run.
pub fn extract_all(sources: &[AnimatedImageSource], frames_root: &Path, jobs: usize, reporter: &mut dyn ProgressReporter) -> CatResult<(FpsRegistry, Vec<Extraction>)> {
    fs::create_dir_all(frames_root)?;
    reporter.begin(Phase::Extract, sources.len() as u64);

    let (queue, results) = ordqueue::new::<Extraction>();
    let progress = &mut *reporter;
    let (registry, extracted) = minipool::new(jobs, "extract", move |s| {
        for item in sources.iter().enumerate() {
            s.send(item)?;
        }
        drop(s);

        let mut registry = FpsRegistry::new();
        let mut extracted = Vec::with_capacity(sources.len());
        for extraction in results {
            if let Some(prev) = registry.put(extraction.name.as_str(), extraction.estimated_fps) {
                tracing::warn!(name = %extraction.name, prev, fps = extraction.estimated_fps, "frame rate replaced");
            }
            extracted.push(extraction);
            if !progress.increase() {
                return Err(Error::Aborted);
            }
        }
        Ok((registry, extracted))
    }, move |(index, source): (usize, &AnimatedImageSource)| {
        let extraction = extract_frames(source, frames_root).map_err(|e| e.in_phase(Phase::Extract, &source.path))?;
        queue.push(index, extraction).map_err(|_| Error::Aborted)
    })?;

    reporter.done(&format!("{} sources extracted", extracted.len()));
    Ok((registry, extracted))
}

/// Converts every source in `settings.webp_dir`.
///
/// Extraction errors fail the run. Encode errors are only recorded in the
/// summary's report, so check [`RunSummary::is_success`].
pub fn run(settings: &Settings, encoder: &dyn VideoEncoder, reporter: &mut dyn ProgressReporter) -> CatResult<RunSummary> {
    settings.validate()?;
    let sources = discover_sources(&settings.webp_dir)?;
    let (registry, extracted) = extract_all(&sources, &settings.temp_frames_dir, settings.jobs, reporter)?;

    let report = EncodeOrchestrator::new(&registry, encoder, settings)
        .run(&settings.temp_frames_dir, &settings.webm_dir, reporter)?;

    for (name, fps) in registry.iter() {
        tracing::info!(%name, fps, "original frame rate");
    }

    if settings.clean_frames {
        clean_frames(&extracted, &settings.temp_frames_dir)?;
    }

    Ok(RunSummary { extracted, registry, report })
}

/// Removes the frame directories this run wrote, and the root if nothing else is left in it
fn clean_frames(extracted: &[Extraction], frames_root: &Path) -> CatResult<()> {
    for extraction in extracted {
        fs::remove_dir_all(&extraction.frame_dir)?;
    }
    if fs::read_dir(frames_root)?.next().is_none() {
        fs::remove_dir(frames_root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn finds_only_animation_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.webp", "a10.gif", "a2.WEBP", "notes.txt", "c.png"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.webp")).unwrap();

        let names: Vec<_> = discover_sources(dir.path()).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["a2", "a10", "b"]);
    }

    #[test]
    fn nothing_to_convert() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");
        assert!(matches!(discover_sources(dir.path()), Err(Error::NoInputs(_))));
        assert!(matches!(discover_sources(&dir.path().join("missing")), Err(Error::InputNotFound(_))));
    }

    #[test]
    fn later_duplicate_replaces_earlier() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "wave.gif");
        touch(dir.path(), "wave.webp");
        let sources = discover_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].path.ends_with("wave.webp"));
    }

    #[test]
    fn bad_source_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "broken.gif");
        let sources = discover_sources(dir.path()).unwrap();
        let frames = dir.path().join("frames");

        let err = extract_all(&sources, &frames, 1, &mut crate::progress::NoProgress {}).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("extract failed"), "{msg}");
        assert!(msg.contains("broken.gif"), "{msg}");
        assert!(matches!(err.root(), Error::Decode(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.webp")), b"").unwrap();
        assert!(matches!(discover_sources(dir.path()), Err(Error::NoInputs(_))));

        touch(dir.path(), "ok.webp");
        let names: Vec<_> = discover_sources(dir.path()).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["ok"]);
    }
}
