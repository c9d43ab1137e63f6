//! Time-axis layout.
//!
//! Picks a readable interval between labelled ticks and maps every tick to a
//! pixel column. Positions are derived from sample counts rather than by
//! repeatedly adding a rounded pixel step, so the last tick on a wide image
//! sits exactly where its sample lands.

use crate::selection::Selection;
use crate::WaveviewError;

/// Desired distance between major ticks before the interval is snapped.
pub const TARGET_TICK_SPACING_PX: u64 = 100;

/// One entry of the interval palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NiceInterval {
    /// Raw intervals strictly below this bound snap to this entry.
    pub upper_bound_ms: u64,
    pub interval_ms: u64,
    /// Number of minor steps a major interval is divided into.
    pub subdivisions: u64,
}

const fn nice(upper_bound_ms: u64, interval_ms: u64, subdivisions: u64) -> NiceInterval {
    NiceInterval {
        upper_bound_ms,
        interval_ms,
        subdivisions,
    }
}

/// Interval palette ordered by bound. The last entry catches everything else.
pub const NICE_INTERVALS: [NiceInterval; 11] = [
    nice(10, 10, 2),
    nice(50, 50, 5),
    nice(100, 100, 2),
    nice(500, 500, 5),
    nice(1_000, 1_000, 2),
    nice(5_000, 5_000, 5),
    nice(15_000, 15_000, 3),
    nice(30_000, 30_000, 3),
    nice(60_000, 60_000, 2),
    nice(300_000, 300_000, 5),
    nice(u64::MAX, 900_000, 3),
];

/// Snap a raw interval up to the first palette entry whose bound exceeds it.
pub fn snap_interval(raw_ms: u64) -> &'static NiceInterval {
    NICE_INTERVALS
        .iter()
        .find(|entry| raw_ms < entry.upper_bound_ms)
        .unwrap_or(&NICE_INTERVALS[NICE_INTERVALS.len() - 1])
}

/// Tick spacing for one image, computed once and consumed by the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickLayout {
    pub width: u64,
    pub sample_rate: u64,
    pub start_sample: u64,
    pub duration_samples: u64,
    pub interval_ms: u64,
    pub subdivisions: u64,
    pub interval_samples: u64,
    /// Number of major ticks, recomputed from the real spacing of tick 1.
    pub num_ticks: u64,
    /// Pixel position of tick 1, i.e. the length of one major interval.
    pub major_px: u64,
    pub minor_px: u64,
    /// Labels carry a fractional-second suffix.
    pub show_ms: bool,
}

impl TickLayout {
    /// Lay out the axis for `width` pixels covering `selection`.
    pub fn compute(
        width: u32,
        selection: &Selection,
        sample_rate: u32,
    ) -> Result<Self, WaveviewError> {
        let width = u64::from(width);
        let degenerate = |reason: &'static str| WaveviewError::DegenerateLayout {
            width,
            duration_ms: selection.duration_ms,
            reason,
        };

        let estimate = width / TARGET_TICK_SPACING_PX;
        let raw_interval_ms = selection
            .duration_ms
            .checked_div(estimate)
            .ok_or_else(|| degenerate("the image is narrower than one tick interval"))?;
        let nice = snap_interval(raw_interval_ms);

        if selection.sample_count == 0 {
            return Err(degenerate("the selection contains no samples"));
        }

        let sample_rate = u64::from(sample_rate);
        let mut layout = Self {
            width,
            sample_rate,
            start_sample: selection.start_sample,
            duration_samples: selection.sample_count,
            interval_ms: nice.interval_ms,
            subdivisions: nice.subdivisions,
            interval_samples: sample_rate * nice.interval_ms / 1_000,
            num_ticks: 0,
            major_px: 0,
            minor_px: 0,
            show_ms: false,
        };

        let major_px = layout.tick_position(1);
        layout.num_ticks = width
            .checked_div(major_px)
            .ok_or_else(|| degenerate("one tick interval is narrower than a pixel"))?;
        layout.major_px = major_px;
        layout.minor_px = major_px / nice.subdivisions;
        layout.show_ms = layout.needs_ms_labels();

        Ok(layout)
    }

    /// Pixel column of the `n`-th major tick.
    pub fn tick_position(&self, n: u64) -> u64 {
        let scaled =
            u128::from(self.width) * u128::from(n) * u128::from(self.interval_samples);
        (scaled / u128::from(self.duration_samples.max(1))) as u64
    }

    /// Time of the `n`-th major tick within the file, in milliseconds.
    pub fn tick_time_ms(&self, n: u64) -> u64 {
        let sample = self.start_sample + n * self.interval_samples;
        sample * 1_000 / self.sample_rate.max(1)
    }

    pub fn label(&self, n: u64) -> String {
        format_time(self.tick_time_ms(n), self.show_ms)
    }

    // Whole-second labels are ambiguous as soon as two neighbours share one.
    fn needs_ms_labels(&self) -> bool {
        let seconds: Vec<u64> = (1..=self.num_ticks)
            .map(|n| self.tick_time_ms(n) / 1_000)
            .collect();
        seconds.windows(2).any(|pair| pair[0] == pair[1])
    }

    /// Turn the layout into draw operations, left to right.
    ///
    /// Each major tick is preceded by its minor ticks. A trailing set of
    /// minor ticks fills the space after the last major tick.
    pub fn time_axis(&self) -> TimeAxis {
        let mut marks = Vec::new();
        let mut previous = 0;

        for n in 1..=self.num_ticks {
            let x = self.tick_position(n);
            if x > self.width {
                break;
            }
            self.push_minor_ticks(&mut marks, previous);
            marks.push(AxisMark::Major { x });
            marks.push(AxisMark::Label {
                x,
                text: self.label(n),
            });
            previous = x;
        }

        if previous < self.width {
            self.push_minor_ticks(&mut marks, previous);
        }

        TimeAxis {
            width: self.width,
            marks,
        }
    }

    fn push_minor_ticks(&self, marks: &mut Vec<AxisMark>, from: u64) {
        for k in 1..self.subdivisions {
            let x = from + k * self.minor_px;
            if x < self.width {
                marks.push(AxisMark::Minor { x });
            }
        }
    }
}

/// A single draw operation on the time bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AxisMark {
    Minor { x: u64 },
    Major { x: u64 },
    /// Text centred horizontally on `x`.
    Label { x: u64, text: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeAxis {
    pub width: u64,
    pub marks: Vec<AxisMark>,
}

impl TimeAxis {
    pub fn major_positions(&self) -> impl Iterator<Item = u64> + '_ {
        self.marks.iter().filter_map(|mark| match mark {
            AxisMark::Major { x } => Some(*x),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.marks.iter().filter_map(|mark| match mark {
            AxisMark::Label { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Format a time as `H:MM:SS`, `M:SS` or `S`.
///
/// With `show_ms` the fractional second is appended without trailing zeros,
/// keeping at least one digit (`1.5`, `2.25`, `3.0`).
pub fn format_time(ms: u64, show_ms: bool) -> String {
    let total_seconds = ms / 1_000;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    let mut text = if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        seconds.to_string()
    };

    if show_ms {
        let fraction = format!("{:03}", ms % 1_000);
        let trimmed = fraction.trim_end_matches('0');
        text.push('.');
        text.push_str(if trimmed.is_empty() { "0" } else { trimmed });
    }

    text
}
