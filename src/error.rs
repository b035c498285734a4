use std::fmt;
use std::io;
use std::path::PathBuf;
use quick_error::quick_error;

/// Which half of the pipeline a failure belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Encode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extract => "extract",
            Self::Encode => "encode",
        })
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Internal error
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
        Aborted {
            display("aborted")
        }
        InputNotFound(path: PathBuf) {
            display("Unable to find the input file: \"{}\"", path.display())
        }
        NoInputs(dir: PathBuf) {
            display("No .webp or .gif files found in \"{}\"", dir.display())
        }
        Decode(msg: String) {
            display("{}", msg)
            from(err: image::ImageError) -> (format!("WebP decoding error: {err}"))
            from(err: gif_dispose::Error) -> (format!("GIF dispose error: {err}"))
        }
        NoFrames(path: PathBuf) {
            display("Found no frames in \"{}\"", path.display())
        }
        KeyNotFound(name: String) {
            display("No frame rate was recorded for \"{}\"; its frames were not extracted in this run", name)
        }
        EncodeProcess(output: PathBuf, status: String) {
            display("ffmpeg could not create \"{}\": {}", output.display(), status)
        }
        InvalidSettings(msg: String) {
            display("{}", msg)
        }
        Io(err: io::Error) {
            from()
            display("I/O: {}", err)
        }
        PNG(msg: String) {
            display("{}", msg)
        }
        InPhase(phase: Phase, subject: PathBuf, err: Box<Error>) {
            display("{} failed for \"{}\": {}", phase, subject.display(), err)
            source(&**err)
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;

impl Error {
    /// Tags the error with the phase and the file or directory it concerns
    #[cold]
    pub fn in_phase(self, phase: Phase, subject: impl Into<PathBuf>) -> Self {
        match self {
            already @ Self::InPhase(..) => already,
            other => Self::InPhase(phase, subject.into(), Box::new(other)),
        }
    }

    /// The error without its phase tag
    pub fn root(&self) -> &Self {
        match self {
            Self::InPhase(_, _, err) => err.root(),
            other => other,
        }
    }
}

/// A cut-off GIF surfaces as `DecodingError::Io(UnexpectedEof)`, so every
/// decoder error is a `Decode`. Opening the file is where real I/O fails.
impl From<gif::DecodingError> for Error {
    #[cold]
    fn from(err: gif::DecodingError) -> Self {
        Error::Decode(format!("GIF decoding error: {err}"))
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    #[cold]
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::ThreadSend
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    #[cold]
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::Aborted
    }
}
