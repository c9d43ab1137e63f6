//! Layer rendering and composition.
//!
//! Every layer is drawn by an external tool into the scratch directory: the
//! title bar, time bar and background grid by ImageMagick, the waveform by an
//! `ffmpeg` filter graph. [`Renderer::compose`] stacks them into the output.

use std::ffi::{OsStr, OsString};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::layout::{AxisMark, TimeAxis};
use crate::selection::Selection;
use crate::tools::{Tool, Toolchain};
use crate::{ImageSize, WaveviewError};

/// An opaque colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `0xRRGGBB`, the spelling `ffmpeg` filter options accept without quoting.
    pub fn ffmpeg(self) -> String {
        format!("0x{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Colours and metrics of the rendered view.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub title_height: u32,
    pub axis_height: u32,
    pub font_size: u32,
    pub title_background: Rgb,
    pub title_foreground: Rgb,
    pub axis_background: Rgb,
    pub axis_foreground: Rgb,
    pub grid_background: Rgb,
    pub grid_reference: Rgb,
    pub grid_divider: Rgb,
    pub peak: Rgb,
    pub rms: Rgb,
    /// Encoder quality passed to ImageMagick for the final image.
    pub quality: u32,
    /// Length of a minor tick line, in pixels from the top of the time bar.
    pub minor_tick_length: u32,
    /// Radius of the dot marking a major tick.
    pub major_tick_radius: u32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title_height: 24,
            axis_height: 24,
            font_size: 11,
            title_background: Rgb(0x46, 0x46, 0x4b),
            title_foreground: Rgb(0xf0, 0xf0, 0xf0),
            axis_background: Rgb(0xe6, 0xe6, 0xea),
            axis_foreground: Rgb(0x20, 0x20, 0x20),
            grid_background: Rgb(0xff, 0xff, 0xff),
            grid_reference: Rgb(0xb4, 0xb4, 0xc8),
            grid_divider: Rgb(0x50, 0x50, 0x50),
            peak: Rgb(0x32, 0x32, 0xc8),
            rms: Rgb(0x64, 0x64, 0xdc),
            quality: 95,
            minor_tick_length: 4,
            major_tick_radius: 2,
        }
    }
}

/// Scratch files holding each rendered layer.
#[derive(Clone, Debug)]
pub struct Layers {
    pub title_bar: PathBuf,
    pub time_bar: PathBuf,
    pub background: PathBuf,
    pub waveform: PathBuf,
}

/// Drives the external tools for one image.
pub struct Renderer<'a> {
    tools: &'a Toolchain,
    theme: &'a Theme,
    scratch: &'a Path,
    size: ImageSize,
}

impl<'a> Renderer<'a> {
    pub fn new(tools: &'a Toolchain, theme: &'a Theme, scratch: &'a Path, size: ImageSize) -> Self {
        Self {
            tools,
            theme,
            scratch,
            size,
        }
    }

    /// Title on the left, stream summary on the right.
    pub fn title_bar(&self, title: &str, summary: &str) -> Result<PathBuf, WaveviewError> {
        let path = self.scratch.join("title.png");
        let theme = self.theme;
        let fill = theme.title_foreground.to_string();
        let point_size = (theme.font_size + 2).to_string();
        let title = escape_annotation(title);
        let summary = escape_annotation(summary);

        let mut args = canvas_args(self.size.width, theme.title_height, theme.title_background);
        args.extend(os_args([
            "-fill",
            fill.as_str(),
            "-pointsize",
            point_size.as_str(),
            "-gravity",
            "West",
            "-annotate",
            "+8+0",
            title.as_str(),
            "-gravity",
            "East",
            "-annotate",
            "+8+0",
            summary.as_str(),
        ]));
        args.push(path.clone().into_os_string());
        self.tools.run(Tool::Magick, args)?;
        Ok(path)
    }

    pub fn time_bar(&self, axis: &TimeAxis) -> Result<PathBuf, WaveviewError> {
        let path = self.scratch.join("time.png");
        let theme = self.theme;
        let mut args = canvas_args(self.size.width, theme.axis_height, theme.axis_background);
        let program = time_axis_program(axis, theme);
        args.extend(os_args(["-draw", program.as_str()]));
        args.push(path.clone().into_os_string());
        self.tools.run(Tool::Magick, args)?;
        Ok(path)
    }

    pub fn background(&self, channels: u32) -> Result<PathBuf, WaveviewError> {
        let path = self.scratch.join("background.png");
        let theme = self.theme;
        let mut args = canvas_args(self.size.width, self.size.height, theme.grid_background);
        let program = grid_program(self.size, channels, theme);
        args.extend(os_args(["-draw", program.as_str()]));
        args.push(path.clone().into_os_string());
        self.tools.run(Tool::Magick, args)?;
        Ok(path)
    }

    /// Peak envelope with the RMS envelope drawn over it, on a transparent canvas.
    pub fn waveform(
        &self,
        input: &Path,
        selection: &Selection,
        channels: u32,
    ) -> Result<PathBuf, WaveviewError> {
        let path = self.scratch.join("waveform.png");
        let graph = waveform_filter_graph(selection, self.size, channels, self.theme);
        let mut args = os_args(["-v", "error", "-nostdin", "-y", "-i"]);
        args.push(input.as_os_str().to_os_string());
        args.extend(os_args([
            "-filter_complex",
            graph.as_str(),
            "-map",
            "[waveform]",
            "-frames:v",
            "1",
        ]));
        args.push(path.clone().into_os_string());
        self.tools.run(Tool::Ffmpeg, args)?;
        Ok(path)
    }

    /// Flatten the waveform onto the grid and stack the bars above it.
    pub fn compose(&self, layers: &Layers, output: &Path) -> Result<(), WaveviewError> {
        let mut args: Vec<OsString> = vec![
            layers.title_bar.clone().into_os_string(),
            layers.time_bar.clone().into_os_string(),
            "(".into(),
            layers.background.clone().into_os_string(),
            layers.waveform.clone().into_os_string(),
            "-flatten".into(),
            ")".into(),
            "-append".into(),
        ];
        let quality = self.theme.quality.to_string();
        args.extend(os_args(["-quality", quality.as_str()]));
        args.push(output.as_os_str().to_os_string());
        self.tools.run(Tool::Magick, args)?;
        Ok(())
    }
}

fn os_args<'s, I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = &'s str>,
{
    args.into_iter().map(OsString::from).collect()
}

fn canvas_args(width: u32, height: u32, background: Rgb) -> Vec<OsString> {
    vec![
        OsStr::new("-size").to_os_string(),
        format!("{width}x{height}").into(),
        format!("xc:{background}").into(),
    ]
}

/// MVG program drawing the tick marks and labels of the time bar.
///
/// A major tick that lands exactly on the right edge is drawn in the last
/// pixel column.
pub fn time_axis_program(axis: &TimeAxis, theme: &Theme) -> String {
    let last_column = axis.width.saturating_sub(1);
    let mut lines = String::new();
    let mut dots = String::new();
    let mut labels = String::new();
    let centre = i64::try_from(axis.width / 2).unwrap_or(i64::MAX);
    let label_y = theme.minor_tick_length + theme.major_tick_radius + 1;
    let dot_y = theme.major_tick_radius + 1;

    for mark in &axis.marks {
        // Writing into a String cannot fail.
        let _ = match mark {
            AxisMark::Minor { x } => writeln!(
                lines,
                "line {x},0 {x},{}",
                theme.minor_tick_length.saturating_sub(1)
            ),
            AxisMark::Major { x } => {
                let x = (*x).min(last_column);
                writeln!(
                    dots,
                    "circle {x},{dot_y} {},{dot_y}",
                    x + u64::from(theme.major_tick_radius)
                )
            }
            AxisMark::Label { x, text } => {
                let x = (*x).min(last_column);
                let offset = i64::try_from(x).unwrap_or(i64::MAX) - centre;
                writeln!(labels, "text {offset},{label_y} '{}'", escape_mvg(text))
            }
        };
    }

    let colour = theme.axis_foreground;
    format!(
        "stroke '{colour}'\nstroke-width 1\n{lines}fill '{colour}'\n{dots}stroke none\nfont-size {}\ngravity North\n{labels}",
        theme.font_size
    )
}

/// MVG program for the background: a solid divider between channel lanes and
/// a dashed reference line through the centre of each lane.
pub fn grid_program(size: ImageSize, channels: u32, theme: &Theme) -> String {
    let lanes = channels.max(1);
    let lane_height = size.height / lanes;
    let right = size.width.saturating_sub(1);
    let mut program = String::new();

    let _ = writeln!(program, "stroke '{}'\nstroke-width 1", theme.grid_divider);
    for lane in 1..lanes {
        let y = lane * lane_height;
        let _ = writeln!(program, "line 0,{y} {right},{y}");
    }

    let _ = writeln!(
        program,
        "stroke '{}'\nstroke-dasharray 4 4",
        theme.grid_reference
    );
    for lane in 0..lanes {
        let y = lane * lane_height + lane_height / 2;
        let _ = writeln!(program, "line 0,{y} {right},{y}");
    }

    program
}

/// `ffmpeg` filter graph: trim the selection by sample index, then render a
/// peak-mode and an RMS-mode picture with one lane per channel and overlay them.
///
/// `showwavespic` calls its mean-amplitude mode `average`; that is the RMS
/// envelope here.
pub fn waveform_filter_graph(
    selection: &Selection,
    size: ImageSize,
    channels: u32,
    theme: &Theme,
) -> String {
    let lanes = channels.max(1) as usize;
    let colours = |colour: Rgb| vec![colour.ffmpeg(); lanes].join("|");
    format!(
        "[0:a]atrim=start_sample={start}:end_sample={end},asetpts=PTS-STARTPTS,asplit=2[peak_in][rms_in];\
         [peak_in]showwavespic=s={size}:split_channels=1:draw=full:filter=peak:colors={peak}[peak];\
         [rms_in]showwavespic=s={size}:split_channels=1:draw=full:filter=average:colors={rms}[rms];\
         [peak][rms]overlay=format=auto[waveform]",
        start = selection.start_sample,
        end = selection.end_sample(),
        peak = colours(theme.peak),
        rms = colours(theme.rms),
    )
}

/// Escape text for ImageMagick's `-annotate`, which expands `%` escapes and
/// reads a file when the text starts with `@`.
pub fn escape_annotation(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    if text.starts_with('@') {
        escaped.push('\\');
    }
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '%' => escaped.push_str("%%"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_mvg(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}
