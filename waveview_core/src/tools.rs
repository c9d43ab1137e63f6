use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::WaveviewError;

/// External programs the pipeline delegates to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Magick,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Ffmpeg, Tool::Ffprobe, Tool::Magick];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
            Tool::Magick => "magick",
        }
    }

    /// Executable names searched on `PATH`, most preferred first.
    fn candidates(self) -> &'static [&'static str] {
        match self {
            Tool::Ffmpeg => &["ffmpeg"],
            Tool::Ffprobe => &["ffprobe"],
            // ImageMagick 6 only ships the legacy `convert` entry point.
            Tool::Magick => &["magick", "convert"],
        }
    }
}

/// Explicit tool locations that replace the `PATH` lookup.
#[derive(Clone, Debug, Default)]
pub struct ToolOverrides {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub magick: Option<PathBuf>,
}

impl ToolOverrides {
    fn get(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Ffmpeg => self.ffmpeg.as_deref(),
            Tool::Ffprobe => self.ffprobe.as_deref(),
            Tool::Magick => self.magick.as_deref(),
        }
    }
}

/// Resolved executables plus the cancellation flag checked around each call.
#[derive(Clone, Debug)]
pub struct Toolchain {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    magick: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
}

impl Toolchain {
    /// Resolve every tool, failing on the first one that cannot be found.
    pub fn locate(
        overrides: &ToolOverrides,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, WaveviewError> {
        Self::locate_only(overrides, &Tool::ALL, cancel)
    }

    /// Resolve just `tools`; running any other tool reports it as missing.
    pub fn locate_only(
        overrides: &ToolOverrides,
        tools: &[Tool],
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, WaveviewError> {
        let resolve = |tool: Tool| {
            if !tools.contains(&tool) {
                return Ok(None);
            }
            let found = match overrides.get(tool) {
                Some(path) => resolve_override(path),
                None => tool.candidates().iter().find_map(|name| search_path(name)),
            };
            let path = found.ok_or(WaveviewError::MissingTool(tool.name()))?;
            debug!("using {} at {}", tool.name(), path.display());
            Ok::<_, WaveviewError>(Some(path))
        };

        Ok(Self {
            ffmpeg: resolve(Tool::Ffmpeg)?,
            ffprobe: resolve(Tool::Ffprobe)?,
            magick: resolve(Tool::Magick)?,
            cancel,
        })
    }

    pub fn path(&self, tool: Tool) -> Result<&Path, WaveviewError> {
        let path = match tool {
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::Ffprobe => &self.ffprobe,
            Tool::Magick => &self.magick,
        };
        path.as_deref().ok_or(WaveviewError::MissingTool(tool.name()))
    }

    /// Run `tool` to completion and return its standard output.
    ///
    /// A non-zero exit becomes [`WaveviewError::ToolFailed`] carrying the
    /// tool's stderr, or [`WaveviewError::Interrupted`] when the run was
    /// cancelled in the meantime. A tool that finished successfully keeps its
    /// result even if the cancel flag was raised while it ran.
    pub fn run<I, S>(&self, tool: Tool, args: I) -> Result<String, WaveviewError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.check_cancelled()?;

        let mut command = Command::new(self.path(tool)?);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("running {command:?}");

        let output = command.output().map_err(|source| WaveviewError::Spawn {
            tool: tool.name(),
            source,
        })?;

        if !output.status.success() {
            self.check_cancelled()?;
            return Err(WaveviewError::ToolFailed {
                tool: tool.name(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn check_cancelled(&self) -> Result<(), WaveviewError> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(WaveviewError::Interrupted)
        } else {
            Ok(())
        }
    }
}

// A bare name is looked up on PATH; anything with a directory part must exist.
fn resolve_override(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        path.is_file().then(|| path.to_path_buf())
    } else {
        search_path(path.as_os_str())
    }
}

fn search_path<S: AsRef<OsStr>>(name: S) -> Option<PathBuf> {
    let name = name.as_ref();
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
