use std::fmt;

use waveview_core::ImageSize;

/// Parse an image size of the form `WIDTHxHEIGHT`, e.g. `1000x500`.
///
/// Both dimensions are positive decimal integers; no whitespace, signs, or
/// uppercase `X` are accepted.
pub fn parse_size(value: &str) -> Result<ImageSize, SizeParseError> {
    let (width, height) = value
        .split_once('x')
        .ok_or(SizeParseError::MissingSeparator)?;
    let width = parse_dimension(width, Dimension::Width)?;
    let height = parse_dimension(height, Dimension::Height)?;
    ImageSize::new(width, height).map_err(|_| SizeParseError::Zero)
}

fn parse_dimension(text: &str, dimension: Dimension) -> Result<u32, SizeParseError> {
    if text.is_empty() {
        return Err(SizeParseError::MissingDigits { dimension });
    }
    if let Some((index, found)) = text.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        return Err(SizeParseError::UnexpectedChar {
            dimension,
            index,
            found,
        });
    }
    text.parse()
        .map_err(|_| SizeParseError::TooLarge { dimension })
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => write!(f, "width"),
            Dimension::Height => write!(f, "height"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeParseError {
    MissingSeparator,
    MissingDigits {
        dimension: Dimension,
    },
    UnexpectedChar {
        dimension: Dimension,
        index: usize,
        found: char,
    },
    TooLarge {
        dimension: Dimension,
    },
    Zero,
}

impl std::error::Error for SizeParseError {}

impl fmt::Display for SizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeParseError::MissingSeparator => {
                write!(f, "expected WIDTHxHEIGHT, e.g. 1000x500")
            }
            SizeParseError::MissingDigits { dimension } => {
                write!(f, "{dimension} is missing")
            }
            SizeParseError::UnexpectedChar {
                dimension,
                index,
                found,
            } => write!(
                f,
                "unexpected character '{}' at position {} of the {}",
                found,
                index + 1,
                dimension
            ),
            SizeParseError::TooLarge { dimension } => {
                write!(f, "{dimension} exceeds {}", u32::MAX)
            }
            SizeParseError::Zero => write!(f, "width and height must be greater than zero"),
        }
    }
}

/// Parse a non-negative decimal number of seconds such as `90`, `1.5` or
/// `0.250`.
///
/// # Grammar
///
/// ```text
/// seconds = digits [ "." digits ] ;
/// digits  = digit , { digit } ;
/// ```
pub fn parse_seconds(value: &str) -> Result<f64, SecondsParseError> {
    if value.is_empty() {
        return Err(SecondsParseError::Empty);
    }

    let bytes = value.as_bytes();
    let mut index = 0usize;
    let integer_digits = skip_digits(bytes, &mut index);
    if integer_digits == 0 {
        return Err(unexpected(value, index));
    }

    if index < bytes.len() {
        if bytes[index] != b'.' {
            return Err(unexpected(value, index));
        }
        let dot_index = index;
        index += 1;
        if skip_digits(bytes, &mut index) == 0 {
            if index < bytes.len() {
                return Err(unexpected(value, index));
            }
            return Err(SecondsParseError::MissingFractionDigits { index: dot_index });
        }
        if index < bytes.len() {
            return Err(unexpected(value, index));
        }
    }

    let seconds: f64 = value.parse().map_err(|_| SecondsParseError::TooLarge)?;
    if !seconds.is_finite() {
        return Err(SecondsParseError::TooLarge);
    }
    Ok(seconds)
}

fn skip_digits(bytes: &[u8], index: &mut usize) -> usize {
    let start = *index;
    while *index < bytes.len() && bytes[*index].is_ascii_digit() {
        *index += 1;
    }
    *index - start
}

fn unexpected(value: &str, index: usize) -> SecondsParseError {
    match value[index..].chars().next() {
        Some(found) => SecondsParseError::UnexpectedChar { index, found },
        None => SecondsParseError::Empty,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondsParseError {
    Empty,
    UnexpectedChar { index: usize, found: char },
    MissingFractionDigits { index: usize },
    TooLarge,
}

impl std::error::Error for SecondsParseError {}

impl fmt::Display for SecondsParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondsParseError::Empty => write!(f, "seconds cannot be empty"),
            SecondsParseError::UnexpectedChar { index, found } => write!(
                f,
                "unexpected character '{}' at position {}; expected a non-negative decimal number of seconds",
                found,
                index + 1
            ),
            SecondsParseError::MissingFractionDigits { index } => write!(
                f,
                "expected digits after decimal point at position {}",
                index + 1
            ),
            SecondsParseError::TooLarge => write!(f, "number of seconds is too large"),
        }
    }
}
