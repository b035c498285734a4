use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use webp2webm::progress::{NoProgress, ProgressReporter};
use webp2webm::{FfmpegEncoder, JobOutcome, Phase, Settings};

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Converts animated WebP/GIF emotes into short looping WebM (VP9) clips")
        .arg_required_else_help(true)
        .arg(Arg::new("webp-dir")
            .long("webp-dir")
            .help("Folder that contains webp files")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("webm-dir")
            .long("webm-dir")
            .help("Folder that will contain the resulting webm files")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("temp-frames-dir")
            .long("temp-frames-dir")
            .help("Folder that would store frames of original webp files")
            .value_name("dir")
            .value_parser(value_parser!(PathBuf))
            .default_value("frames"))
        .arg(Arg::new("max-fps")
            .long("max-fps")
            .help("Maximum FPS of the resulting webm files")
            .value_name("num")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("30"))
        .arg(Arg::new("max-duration")
            .long("max-duration")
            .help("Maximum duration of the resulting webm files in seconds. Longer animations are cut")
            .value_name("s")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("3"))
        .arg(Arg::new("crf")
            .long("crf")
            .help("Constant rate factor, the lower the CRF the more details are preserved during conversion")
            .value_name("0-63")
            .value_parser(value_parser!(u8).range(0..=63))
            .default_value("4"))
        .arg(Arg::new("bitrate")
            .long("bitrate")
            .help("Output bitrate of the webm files, e.g. 100K or 1M. More bitrate keeps more details")
            .value_name("rate")
            .default_value("100K"))
        .arg(Arg::new("width")
            .long("width")
            .short('W')
            .help("Width of resulting webm files")
            .value_name("px")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("100"))
        .arg(Arg::new("height")
            .long("height")
            .short('H')
            .help("Height of the resulting webm files")
            .value_name("px")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("100"))
        .arg(Arg::new("jobs")
            .long("jobs")
            .short('j')
            .help("Number of sources decoded and clips encoded at the same time")
            .value_name("num")
            .value_parser(value_parser!(usize))
            .default_value("1"))
        .arg(Arg::new("ffmpeg")
            .long("ffmpeg")
            .help("ffmpeg executable to run")
            .value_name("path")
            .value_parser(value_parser!(PathBuf))
            .default_value("ffmpeg"))
        .arg(Arg::new("clean-frames")
            .long("clean-frames")
            .action(ArgAction::SetTrue)
            .help("Delete the extracted frames after encoding"))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .action(ArgAction::SetTrue)
            .conflicts_with("quiet")
            .help("Log every step, including the ffmpeg command lines"))
}

fn settings_from(matches: &ArgMatches) -> BinResult<Settings> {
    fn arg<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> BinResult<T> {
        Ok(matches.get_one::<T>(id).cloned().ok_or_else(|| format!("Missing {id}"))?)
    }

    Ok(Settings {
        webp_dir: arg(matches, "webp-dir")?,
        webm_dir: arg(matches, "webm-dir")?,
        temp_frames_dir: arg(matches, "temp-frames-dir")?,
        max_fps: arg(matches, "max-fps")?,
        max_duration: arg(matches, "max-duration")?,
        crf: arg(matches, "crf")?,
        bitrate: arg(matches, "bitrate")?,
        width: arg(matches, "width")?,
        height: arg(matches, "height")?,
        jobs: arg(matches, "jobs")?,
        clean_frames: matches.get_flag("clean-frames"),
    })
}

fn bin_main() -> BinResult<()> {
    let matches = cli().get_matches_from(wild::args_os());

    let quiet = matches.get_flag("quiet");
    init_logging(matches.get_flag("verbose"));

    let settings = settings_from(&matches)?;
    settings.validate()?;
    check_if_dir_exists(&settings.webp_dir)?;

    let ffmpeg: PathBuf = matches.get_one::<PathBuf>("ffmpeg").cloned().ok_or("Missing ffmpeg")?;
    let encoder = FfmpegEncoder::new(&ffmpeg);
    if !encoder.is_available() {
        return Err(format!("Unable to run \"{}\". Install FFmpeg (https://ffmpeg.org/download.html) or point --ffmpeg at it", ffmpeg.display()).into());
    }

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::new();
        &mut pb
    };

    let summary = webp2webm::run(&settings, &encoder, progress)?;

    if !quiet {
        println!("original fps:");
        for (name, fps) in summary.registry.iter() {
            println!("  {name}: {fps}");
        }
    }
    for outcome in &summary.report.outcomes {
        match outcome {
            JobOutcome::Encoded { output, .. } if !quiet => println!("Video saved to {}", DisplayPath(output)),
            JobOutcome::Encoded { .. } => {},
            JobOutcome::Failed { error, .. } => eprintln!("error: {error}"),
        }
    }

    let failed = summary.report.failed().count();
    if failed > 0 {
        return Err(format!("{failed} of {} clips could not be encoded", summary.report.outcomes.len()).into());
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "webp2webm=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn check_if_dir_exists(path: &Path) -> BinResult<()> {
    if !path.is_dir() {
        let mut msg = format!("Unable to find the input folder: \"{}\"", path.display());
        if path.to_str().map_or(false, |p| p.contains('*')) {
            msg += "\nThe path contains a literal \"*\" character. Give the folder, not the files in it.";
        } else if path.is_relative() {
            msg += &format!(" (searched in \"{}\")", env::current_dir()?.display());
        }
        return Err(msg.into());
    }
    Ok(())
}

struct DisplayPath<'a>(&'a Path);

impl std::fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let abs_path = dunce::canonicalize(self.0);
        write!(f, "{}", abs_path.as_ref().map(|p| p.as_path()).unwrap_or(self.0).display())
    }
}

/// A `pbr` bar per phase
struct ProgressBar {
    bar: Option<pbr::ProgressBar<io::Stderr>>,
}

impl ProgressBar {
    fn new() -> Self {
        Self { bar: None }
    }
}

impl ProgressReporter for ProgressBar {
    fn begin(&mut self, phase: Phase, total: u64) {
        let mut pb = pbr::ProgressBar::on(io::stderr(), total);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message(match phase {
            Phase::Extract => "Extracting ",
            Phase::Encode => "Encoding ",
        });
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        self.bar = Some(pb);
    }

    fn increase(&mut self) -> bool {
        if let Some(pb) = &mut self.bar {
            pb.inc();
        }
        true
    }

    fn done(&mut self, msg: &str) {
        if let Some(mut pb) = self.bar.take() {
            pb.finish_print(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn defaults_match_settings() {
        let matches = cli().try_get_matches_from(["webp2webm", "--webp-dir", "in", "--webm-dir", "out"]).unwrap();
        let settings = settings_from(&matches).unwrap();
        assert_eq!(settings, Settings::new("in", "out"));
    }

    #[test]
    fn options_are_parsed() {
        let matches = cli().try_get_matches_from([
            "webp2webm", "--webp-dir", "in", "--webm-dir", "out", "--temp-frames-dir", "tmp",
            "--max-fps", "24", "--max-duration", "5", "--crf", "10", "--bitrate", "1M",
            "-W", "64", "-H", "48", "-j", "4", "--clean-frames",
        ]).unwrap();
        let settings = settings_from(&matches).unwrap();
        assert_eq!(settings.temp_frames_dir, PathBuf::from("tmp"));
        assert_eq!((settings.max_fps, settings.max_duration, settings.crf), (24, 5, 10));
        assert_eq!(settings.bitrate, "1M");
        assert_eq!((settings.width, settings.height, settings.jobs), (64, 48, 4));
        assert!(settings.clean_frames);
    }

    #[test]
    fn dirs_are_required() {
        assert!(cli().try_get_matches_from(["webp2webm", "--webp-dir", "in"]).is_err());
    }

    #[test]
    fn crf_range_is_checked() {
        assert!(cli().try_get_matches_from(["webp2webm", "--webp-dir", "in", "--webm-dir", "out", "--crf", "64"]).is_err());
    }
}
