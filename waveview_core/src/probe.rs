use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

use crate::tools::{Tool, Toolchain};
use crate::WaveviewError;

const STREAM_ENTRIES: &str = "stream=codec_name,sample_rate,bits_per_sample,bits_per_raw_sample,channels,duration,duration_ts,time_base:format=duration";

/// Stream properties of the first audio stream.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioProperties {
    pub codec: String,
    pub sample_rate: u32,
    /// Absent for formats without a meaningful sample width, such as MP3.
    pub bit_depth: Option<u32>,
    pub channels: u32,
    /// Length of the stream in seconds.
    pub duration: f64,
    pub total_samples: u64,
}

impl AudioProperties {
    /// One-line description such as `flac, 44100 Hz, 16-bit, stereo`.
    pub fn summary(&self) -> String {
        let layout = match self.channels {
            1 => "mono".to_owned(),
            2 => "stereo".to_owned(),
            n => format!("{n} channels"),
        };
        match self.bit_depth {
            Some(bits) => format!(
                "{}, {} Hz, {bits}-bit, {layout}",
                self.codec, self.sample_rate
            ),
            None => format!("{}, {} Hz, {layout}", self.codec, self.sample_rate),
        }
    }
}

/// Query the first audio stream of `input` with `ffprobe`.
pub fn probe(tools: &Toolchain, input: &Path) -> Result<AudioProperties, WaveviewError> {
    let flags = [
        "-v",
        "error",
        "-select_streams",
        "a:0",
        "-show_entries",
        STREAM_ENTRIES,
        "-of",
        "flat",
    ];
    let args = flags
        .into_iter()
        .map(OsStr::new)
        .chain([input.as_os_str()]);
    let output = tools.run(Tool::Ffprobe, args)?;
    parse_probe_output(&output)
}

/// Parse `ffprobe -of flat` output into [`AudioProperties`].
///
/// Stream keys look like `streams.stream.0.sample_rate="44100"`, container
/// keys like `format.duration="12.5"`.
pub fn parse_probe_output(text: &str) -> Result<AudioProperties, WaveviewError> {
    let mut stream = HashMap::new();
    let mut format = HashMap::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if let Some(field) = key.strip_prefix("streams.stream.0.") {
            stream.insert(field, value);
        } else if let Some(field) = key.strip_prefix("format.") {
            format.insert(field, value);
        }
    }

    let codec = stream
        .get("codec_name")
        .ok_or(WaveviewError::NoAudioStream)?
        .to_string();
    let sample_rate: u32 = parse_field(&stream, "sample_rate")?;
    if sample_rate == 0 {
        return Err(invalid("sample_rate", "0"));
    }
    let channels: u32 = parse_field(&stream, "channels")?;

    let bit_depth = first_positive([
        stream.get("bits_per_raw_sample").copied(),
        stream.get("bits_per_sample").copied(),
    ]);

    let duration = [stream.get("duration"), format.get("duration")]
        .into_iter()
        .flatten()
        .find_map(|value| value.parse::<f64>().ok().filter(|d| d.is_finite()))
        .ok_or(WaveviewError::MissingProbeField("duration"))?;

    let total_samples = samples_from_timestamps(&stream, sample_rate)
        .unwrap_or_else(|| (duration * f64::from(sample_rate)) as u64);

    Ok(AudioProperties {
        codec,
        sample_rate,
        bit_depth,
        channels,
        duration,
        total_samples,
    })
}

/// First candidate that parses as a positive integer, in the given order.
pub fn first_positive<'a, I>(candidates: I) -> Option<u32>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find_map(|value| value.parse::<u32>().ok().filter(|bits| *bits > 0))
}

// duration_ts counts time_base units, which only match samples for some containers.
fn samples_from_timestamps(stream: &HashMap<&str, &str>, sample_rate: u32) -> Option<u64> {
    let duration_ts: u128 = stream.get("duration_ts")?.parse().ok()?;
    let (num, den) = stream.get("time_base")?.split_once('/')?;
    let num: u128 = num.parse().ok()?;
    let den: u128 = den.parse().ok().filter(|den| *den > 0)?;
    u64::try_from(duration_ts * num * u128::from(sample_rate) / den).ok()
}

fn parse_field<T: std::str::FromStr>(
    fields: &HashMap<&str, &str>,
    name: &'static str,
) -> Result<T, WaveviewError> {
    let value = fields
        .get(name)
        .ok_or(WaveviewError::MissingProbeField(name))?;
    value.parse().map_err(|_| invalid(name, value))
}

fn invalid(field: &'static str, value: &str) -> WaveviewError {
    WaveviewError::InvalidProbeField {
        field,
        value: value.to_owned(),
    }
}
