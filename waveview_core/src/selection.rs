use log::info;

use crate::probe::AudioProperties;
use crate::WaveviewError;

/// The part of the file that ends up in the image.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub start_sample: u64,
    pub sample_count: u64,
    pub start_ms: u64,
    pub duration_ms: u64,
    /// The requested duration ran past the end of the file and was shortened.
    pub clamped: bool,
}

impl Selection {
    /// Resolve a start offset and optional duration against the probed file.
    ///
    /// Integer positions are truncations of the scaled seconds. A start at or
    /// after the end of the file is an error; a duration that overruns the
    /// end is clamped and logged.
    pub fn resolve(
        properties: &AudioProperties,
        start: f64,
        duration: Option<f64>,
    ) -> Result<Self, WaveviewError> {
        if start >= properties.duration {
            return Err(WaveviewError::StartBeyondEnd {
                start,
                duration: properties.duration,
            });
        }

        let available = properties.duration - start;
        let (duration, clamped) = match duration {
            Some(requested) if requested > available => {
                info!(
                    "requested duration {requested}s exceeds the {available}s left after the start offset; using {available}s"
                );
                (available, true)
            }
            Some(requested) => (requested, false),
            None => (available, false),
        };

        let rate = f64::from(properties.sample_rate);
        let selection = Self {
            start_seconds: start,
            duration_seconds: duration,
            start_sample: (start * rate) as u64,
            sample_count: (duration * rate) as u64,
            start_ms: (start * 1_000.0) as u64,
            duration_ms: (duration * 1_000.0) as u64,
            clamped,
        };

        if selection.sample_count == 0 {
            return Err(WaveviewError::EmptySelection);
        }

        Ok(selection)
    }

    /// First sample after the selection.
    pub fn end_sample(&self) -> u64 {
        self.start_sample + self.sample_count
    }
}
