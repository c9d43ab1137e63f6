use std::fs::File;
use std::path::Path;

use log::debug;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

use crate::WaveviewError;

/// Placeholder for artist or album when the tag is missing.
pub const UNSET: &str = "<unset>";

/// The tag fields that feed the title bar.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    pub disc: Option<String>,
    pub totaldiscs: Option<String>,
}

impl TagSet {
    /// Collect the relevant fields from raw tags; the first value seen wins.
    ///
    /// `n/total` values are reduced to `n`. The total of a disc number fills
    /// `totaldiscs` only when no explicit total tag is present.
    pub fn from_tags<'a, I>(tags: I) -> Self
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let mut set = TagSet::default();
        let mut disc_total_from_fraction = None;

        for tag in tags {
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match field_for(tag) {
                Some(Field::Title) => keep_first(&mut set.title, value),
                Some(Field::Artist) => keep_first(&mut set.artist, value),
                Some(Field::Album) => keep_first(&mut set.album, value),
                Some(Field::Track) => keep_first(&mut set.track, split_fraction(value).0),
                Some(Field::Disc) => {
                    let (number, total) = split_fraction(value);
                    keep_first(&mut set.disc, number);
                    if disc_total_from_fraction.is_none() {
                        disc_total_from_fraction = total.map(str::to_owned);
                    }
                }
                Some(Field::DiscTotal) => keep_first(&mut set.totaldiscs, value),
                None => {}
            }
        }

        if set.totaldiscs.is_none() {
            set.totaldiscs = disc_total_from_fraction;
        }
        set
    }
}

enum Field {
    Title,
    Artist,
    Album,
    Track,
    Disc,
    DiscTotal,
}

fn field_for(tag: &Tag) -> Option<Field> {
    match tag.std_key {
        Some(StandardTagKey::TrackTitle) => return Some(Field::Title),
        Some(StandardTagKey::Artist) => return Some(Field::Artist),
        Some(StandardTagKey::Album) => return Some(Field::Album),
        Some(StandardTagKey::TrackNumber) => return Some(Field::Track),
        Some(StandardTagKey::DiscNumber) => return Some(Field::Disc),
        Some(StandardTagKey::DiscTotal) => return Some(Field::DiscTotal),
        _ => {}
    }
    match tag.key.to_ascii_lowercase().as_str() {
        "title" => Some(Field::Title),
        "artist" => Some(Field::Artist),
        "album" => Some(Field::Album),
        "track" | "tracknumber" => Some(Field::Track),
        "disc" | "discnumber" => Some(Field::Disc),
        "totaldiscs" | "disctotal" => Some(Field::DiscTotal),
        _ => None,
    }
}

fn keep_first(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_owned());
    }
}

fn split_fraction(value: &str) -> (&str, Option<&str>) {
    match value.split_once('/') {
        Some((number, total)) => {
            let total = total.trim();
            (number.trim(), (!total.is_empty()).then_some(total))
        }
        None => (value, None),
    }
}

/// Read the tags of `path`, treating unreadable metadata as no metadata.
pub fn read_tags(path: &Path) -> TagSet {
    match probe_tags(path) {
        Ok(tags) => tags,
        Err(err) => {
            debug!("no tag metadata read from '{}': {err}", path.display());
            TagSet::default()
        }
    }
}

fn probe_tags(path: &Path) -> Result<TagSet, WaveviewError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    // Tags found ahead of the container (such as ID3v2) come first.
    let mut tags: Vec<Tag> = Vec::new();
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.extend(revision.tags().iter().cloned());
        }
    }
    let container = probed.format.metadata();
    if let Some(revision) = container.current() {
        tags.extend(revision.tags().iter().cloned());
    }

    Ok(TagSet::from_tags(&tags))
}

/// Build the title bar text from tags, falling back to the file name.
pub fn synthesize_title(tags: &TagSet, file_name: &str) -> String {
    let Some(title) = tags.title.as_deref() else {
        return file_name.to_owned();
    };

    let mut built = title.to_owned();
    if let Some(track) = tags.track.as_deref() {
        built = format!("{track}. {built}");
        if let Some(disc) = tags.disc.as_deref() {
            if tags.totaldiscs.as_deref() != Some("1") {
                built = format!("{disc}-{built}");
            }
        }
    }

    format!(
        "{} / {} / {built}",
        tags.artist.as_deref().unwrap_or(UNSET),
        tags.album.as_deref().unwrap_or(UNSET)
    )
}
