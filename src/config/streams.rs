//! Standard stream configuration handed to plugins.

use std::fs::File;
use std::io::{self, Write};
use std::process::Stdio;

/// Where one standard stream goes.
#[derive(Debug)]
pub enum Stream {
    /// The parent process's own stream.
    Inherit,
    /// Discard output / empty input.
    Null,
    /// An open file handle.
    File(File),
}

impl Stream {
    /// A `Stdio` for a child process. File handles are duplicated so the
    /// stream can be handed out more than once.
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Stream::Inherit => Stdio::inherit(),
            Stream::Null => Stdio::null(),
            Stream::File(file) => Stdio::from(file.try_clone()?),
        })
    }

    /// A writer for in-process commands.
    pub fn writer(&self, fallback: Fallback) -> io::Result<Box<dyn Write + Send>> {
        Ok(match self {
            Stream::Inherit => match fallback {
                Fallback::Stdout => Box::new(io::stdout()),
                Fallback::Stderr => Box::new(io::stderr()),
            },
            Stream::Null => Box::new(io::sink()),
            Stream::File(file) => Box::new(file.try_clone()?),
        })
    }
}

/// Which process stream `Stream::Inherit` refers to when writing.
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    Stdout,
    Stderr,
}

/// The input/output/error streams the CLI is configured with.
#[derive(Debug)]
pub struct Streams {
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
}

impl Default for Streams {
    fn default() -> Self {
        Self::inherit()
    }
}

impl Streams {
    /// Pass the parent's streams straight through.
    pub fn inherit() -> Self {
        Self {
            stdin: Stream::Inherit,
            stdout: Stream::Inherit,
            stderr: Stream::Inherit,
        }
    }

    pub fn out(&self) -> io::Result<Box<dyn Write + Send>> {
        self.stdout.writer(Fallback::Stdout)
    }

    pub fn err(&self) -> io::Result<Box<dyn Write + Send>> {
        self.stderr.writer(Fallback::Stderr)
    }
}
