//! Second phase: one encode job per extracted frame directory

use crate::encoder::{EncodeJob, VideoEncoder};
use crate::error::*;
use crate::progress::ProgressReporter;
use crate::registry::FpsRegistry;
use crate::{minipool, ordqueue, Settings};
use std::fs;
use std::path::{Path, PathBuf};

/// How a single job ended
#[derive(Debug)]
pub enum JobOutcome {
    Encoded { name: String, output: PathBuf },
    Failed { name: String, error: Error },
}

impl JobOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Encoded { name, .. } | Self::Failed { name, .. } => name,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Encoded { .. })
    }
}

/// Outcomes in frame directory order
#[derive(Debug, Default)]
pub struct EncodeReport {
    pub outcomes: Vec<JobOutcome>,
}

impl EncodeReport {
    pub fn encoded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Failed { name, error } => Some((name.as_str(), error)),
            JobOutcome::Encoded { .. } => None,
        })
    }
}

pub struct EncodeOrchestrator<'a> {
    registry: &'a FpsRegistry,
    encoder: &'a dyn VideoEncoder,
    settings: &'a Settings,
}

impl<'a> EncodeOrchestrator<'a> {
    pub fn new(registry: &'a FpsRegistry, encoder: &'a dyn VideoEncoder, settings: &'a Settings) -> Self {
        Self { registry, encoder, settings }
    }

    /// Immediate subdirectories of `frames_root`, in natural name order
    pub fn frame_dirs(frames_root: &Path) -> CatResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(frames_root)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort_by(|a, b| natord::compare(&dir_name(a), &dir_name(b)));
        Ok(dirs)
    }

    /// Looks up the frame rate the directory's frames were extracted at
    pub fn job_for(&self, frame_dir: &Path, output_dir: &Path) -> CatResult<EncodeJob> {
        let name = dir_name(frame_dir);
        let input_fps = self.registry.get(&name)?;
        Ok(EncodeJob::new(&name, frame_dir.to_path_buf(), output_dir, input_fps, self.settings))
    }

    /// Encodes every frame directory under `frames_root` into `output_dir`.
    ///
    /// A failed job is recorded in the report and doesn't stop the others.
    /// Only I/O trouble with the directories themselves, or an abort from
    /// the `reporter`, fails the whole batch.
    pub fn run(&self, frames_root: &Path, output_dir: &Path, reporter: &mut dyn ProgressReporter) -> CatResult<EncodeReport> {
        let dirs = Self::frame_dirs(frames_root)?;
        fs::create_dir_all(output_dir)?;
        reporter.begin(Phase::Encode, dirs.len() as u64);

        let (queue, outcomes) = ordqueue::new::<JobOutcome>();
        let progress = &mut *reporter;
        let report = minipool::new(self.settings.jobs, "encode", move |s| {
            for item in dirs.into_iter().enumerate() {
                s.send(item)?;
            }
            drop(s);

            let mut report = EncodeReport::default();
            for outcome in outcomes {
                match &outcome {
                    JobOutcome::Encoded { name, output } => tracing::info!(%name, output = %output.display(), "encoded"),
                    JobOutcome::Failed { name, error } => tracing::warn!(%name, %error, "encode job failed"),
                }
                report.outcomes.push(outcome);
                if !progress.increase() {
                    return Err(Error::Aborted);
                }
            }
            Ok(report)
        }, move |(index, frame_dir): (usize, PathBuf)| {
            let outcome = self.encode_one(&frame_dir, output_dir);
            // the reader only goes away when the run was aborted
            queue.push(index, outcome).map_err(|_| Error::Aborted)
        })?;

        reporter.done(&format!("{} of {} clips encoded", report.encoded(), report.outcomes.len()));
        Ok(report)
    }

    fn encode_one(&self, frame_dir: &Path, output_dir: &Path) -> JobOutcome {
        let name = dir_name(frame_dir);
        let res = self.job_for(frame_dir, output_dir).and_then(|job| {
            self.encoder.encode(&job)?;
            Ok(job.output)
        });
        match res {
            Ok(output) => JobOutcome::Encoded { name, output },
            Err(err) => JobOutcome::Failed { name, error: err.in_phase(Phase::Encode, frame_dir) },
        }
    }
}

/// Logical name of a frame directory
fn dir_name(dir: &Path) -> String {
    dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
