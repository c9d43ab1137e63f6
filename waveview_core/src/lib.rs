use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{debug, info};
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

pub mod layout;
pub mod probe;
pub mod render;
pub mod selection;
pub mod title;
pub mod tools;

pub use layout::{format_time, snap_interval, AxisMark, NiceInterval, TickLayout, TimeAxis};
pub use probe::AudioProperties;
pub use render::{Layers, Renderer, Rgb, Theme};
pub use selection::Selection;
pub use title::{synthesize_title, TagSet};
pub use tools::{Tool, ToolOverrides, Toolchain};

/// Width and height used when the caller does not choose an image size.
pub const DEFAULT_SIZE: ImageSize = ImageSize {
    width: 1000,
    height: 500,
};

/// Errors that can occur while rendering a waveform image.
#[derive(Debug, Error)]
pub enum WaveviewError {
    /// Wrapper around errors produced by the Symphonia tag reader.
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),

    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A prerequisite executable could not be found.
    #[error("required tool '{0}' was not found; install it or point to it explicitly")]
    MissingTool(&'static str),

    /// The input path does not name a regular file.
    #[error("input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    /// The output path is taken and overwriting was not requested.
    #[error("output file already exists: {} (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    /// Error returned when either image dimension is zero.
    #[error("image size must be positive, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Error returned for negative or non-finite second values.
    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidSeconds { name: &'static str, value: f64 },

    /// An external tool could not be started.
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    /// An external tool ran but reported failure.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    /// The probed file exposes no audio stream.
    #[error("input does not contain an audio stream")]
    NoAudioStream,

    /// A stream property required for layout was not reported.
    #[error("probe output does not report '{0}'")]
    MissingProbeField(&'static str),

    /// A stream property could not be parsed.
    #[error("probe field '{field}' has unusable value '{value}'")]
    InvalidProbeField { field: &'static str, value: String },

    /// The start offset lies at or after the end of the file.
    #[error("start offset {start}s is not before the end of the file ({duration}s)")]
    StartBeyondEnd { start: f64, duration: f64 },

    /// The selected range contains no samples.
    #[error("the selected range contains no audio samples")]
    EmptySelection,

    /// The image is too narrow or the selection too short for a time axis.
    #[error("cannot lay out a time axis for {width}px over {duration_ms}ms: {reason}")]
    DegenerateLayout {
        width: u64,
        duration_ms: u64,
        reason: &'static str,
    },

    /// The run was cancelled by an interrupt.
    #[error("interrupted")]
    Interrupted,
}

/// Pixel dimensions of the waveform area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Construct a size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, WaveviewError> {
        if width == 0 || height == 0 {
            return Err(WaveviewError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        DEFAULT_SIZE
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for a single render.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized path of the audio file to render.
    pub input_path: PathBuf,
    /// Path of the image to write.
    pub output_path: PathBuf,
    /// Whether an existing output file may be replaced.
    pub force: bool,
    /// Title shown instead of the one synthesized from tags.
    pub title: Option<String>,
    /// Size of the waveform area; the title and time bars are added on top.
    pub size: ImageSize,
    /// Offset into the file where the selection starts.
    pub start_seconds: f64,
    /// Requested selection length; `None` runs to the end of the file.
    pub duration_seconds: Option<f64>,
    pub tools: ToolOverrides,
    pub theme: Theme,
    /// Directory the scratch directory is created in; the system temporary
    /// directory when unset.
    pub scratch_parent: Option<PathBuf>,
    /// Set from a signal handler to abandon the run between tool invocations.
    pub cancel: Arc<AtomicBool>,
}

impl Config {
    /// Construct a [`Config`] with default settings for everything but the input.
    pub fn new<P: AsRef<Path>>(input: P) -> Result<Self, WaveviewError> {
        Self::builder(input).build()
    }

    /// Start building a [`Config`] for the given input file.
    pub fn builder<P: AsRef<Path>>(input: P) -> ConfigBuilder {
        ConfigBuilder {
            input: input.as_ref().to_path_buf(),
            output: None,
            force: false,
            title: None,
            size: DEFAULT_SIZE,
            start_seconds: 0.0,
            duration_seconds: None,
            tools: ToolOverrides::default(),
            theme: Theme::default(),
            scratch_parent: None,
            cancel: None,
        }
    }
}

/// Builder for [`Config`]; validation happens in [`ConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input: PathBuf,
    output: Option<PathBuf>,
    force: bool,
    title: Option<String>,
    size: ImageSize,
    start_seconds: f64,
    duration_seconds: Option<f64>,
    tools: ToolOverrides,
    theme: Theme,
    scratch_parent: Option<PathBuf>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ConfigBuilder {
    pub fn output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = Some(output.as_ref().to_path_buf());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    pub fn start_seconds(mut self, start: f64) -> Self {
        self.start_seconds = start;
        self
    }

    pub fn duration_seconds(mut self, duration: f64) -> Self {
        self.duration_seconds = Some(duration);
        self
    }

    pub fn tools(mut self, tools: ToolOverrides) -> Self {
        self.tools = tools;
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn scratch_parent<P: AsRef<Path>>(mut self, parent: P) -> Self {
        self.scratch_parent = Some(parent.as_ref().to_path_buf());
        self
    }

    /// Share a cancellation flag with the caller, typically a Ctrl-C handler.
    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate the request and produce a [`Config`].
    ///
    /// Checks run in the order a user would fix them: input, output, numbers.
    pub fn build(self) -> Result<Config, WaveviewError> {
        if !self.input.is_file() {
            return Err(WaveviewError::MissingInput(self.input));
        }
        let input_path = fs::canonicalize(&self.input)?;

        let output_path = self
            .output
            .unwrap_or_else(|| self.input.with_extension("png"));
        if output_path.exists() && !self.force {
            return Err(WaveviewError::OutputExists(output_path));
        }

        let size = ImageSize::new(self.size.width, self.size.height)?;
        check_seconds("start", self.start_seconds)?;
        if let Some(duration) = self.duration_seconds {
            check_seconds("duration", duration)?;
        }

        Ok(Config {
            input_path,
            output_path,
            force: self.force,
            title: self.title,
            size,
            start_seconds: self.start_seconds,
            duration_seconds: self.duration_seconds,
            tools: self.tools,
            theme: self.theme,
            scratch_parent: self.scratch_parent,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

fn check_seconds(name: &'static str, value: f64) -> Result<(), WaveviewError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(WaveviewError::InvalidSeconds { name, value })
    }
}

/// Steps of the rendering pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Probe,
    TitleBar,
    TimeBar,
    Background,
    Waveform,
    Compose,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Probe,
        Stage::TitleBar,
        Stage::TimeBar,
        Stage::Background,
        Stage::Waveform,
        Stage::Compose,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Probe => "probing input",
            Stage::TitleBar => "rendering title bar",
            Stage::TimeBar => "rendering time axis",
            Stage::Background => "rendering background grid",
            Stage::Waveform => "rendering waveform",
            Stage::Compose => "composing image",
        };
        f.write_str(label)
    }
}

/// Progress notifications emitted by [`run_with_progress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Start { stages: usize },
    Stage { index: usize, stage: Stage },
    Finish,
}

/// Everything decided before any pixels are drawn.
#[derive(Clone, Debug)]
pub struct Plan {
    pub properties: AudioProperties,
    pub selection: Selection,
    pub title: String,
    pub layout: TickLayout,
}

/// Probe the input and compute the title and time-axis layout without rendering.
///
/// Only `ffprobe` has to be available.
pub fn plan(config: &Config) -> Result<Plan, WaveviewError> {
    let tools =
        Toolchain::locate_only(&config.tools, &[Tool::Ffprobe], Arc::clone(&config.cancel))?;
    plan_with(&tools, config)
}

fn plan_with(tools: &Toolchain, config: &Config) -> Result<Plan, WaveviewError> {
    let properties = probe::probe(tools, &config.input_path)?;
    info!(
        "'{}': {}, {:.3}s, {} samples",
        config.input_path.display(),
        properties.summary(),
        properties.duration,
        properties.total_samples
    );

    let selection =
        Selection::resolve(&properties, config.start_seconds, config.duration_seconds)?;

    let title = match &config.title {
        Some(title) => title.clone(),
        None => {
            let tags = title::read_tags(&config.input_path);
            synthesize_title(&tags, &file_name(&config.input_path))
        }
    };

    let layout = TickLayout::compute(config.size.width, &selection, properties.sample_rate)?;
    debug!(
        "ticks every {}ms ({} subdivisions), {} ticks {}px apart",
        layout.interval_ms, layout.subdivisions, layout.num_ticks, layout.major_px
    );

    Ok(Plan {
        properties,
        selection,
        title,
        layout,
    })
}

/// Render the image described by the supplied [`Config`].
pub fn run(config: Config) -> Result<Plan, WaveviewError> {
    run_with_progress(config, |_| {})
}

/// Render the image, reporting each pipeline stage to `progress`.
///
/// Intermediate layers live in a scratch directory that is removed when this
/// function returns, whether or not rendering succeeded.
pub fn run_with_progress<F>(config: Config, mut progress: F) -> Result<Plan, WaveviewError>
where
    F: FnMut(ProgressEvent),
{
    let tools = Toolchain::locate(&config.tools, Arc::clone(&config.cancel))?;
    let mut builder = tempfile::Builder::new();
    builder.prefix("waveview-");
    let scratch = match &config.scratch_parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    debug!("scratch directory: {}", scratch.path().display());

    progress(ProgressEvent::Start {
        stages: Stage::ALL.len(),
    });
    let mut stage = |stage: Stage| {
        let index = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0);
        progress(ProgressEvent::Stage { index, stage });
    };

    stage(Stage::Probe);
    let plan = plan_with(&tools, &config)?;

    let renderer = Renderer::new(&tools, &config.theme, scratch.path(), config.size);

    stage(Stage::TitleBar);
    let title_bar = renderer.title_bar(&plan.title, &plan.properties.summary())?;

    stage(Stage::TimeBar);
    let time_bar = renderer.time_bar(&plan.layout.time_axis())?;

    stage(Stage::Background);
    let background = renderer.background(plan.properties.channels)?;

    stage(Stage::Waveform);
    let waveform =
        renderer.waveform(&config.input_path, &plan.selection, plan.properties.channels)?;

    stage(Stage::Compose);
    let layers = Layers {
        title_bar,
        time_bar,
        background,
        waveform,
    };
    renderer.compose(&layers, &config.output_path)?;

    scratch.close()?;
    progress(ProgressEvent::Finish);

    Ok(plan)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
