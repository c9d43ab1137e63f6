mod value;

use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub use value::{parse_seconds, parse_size};

pub const DEFAULT_SIZE: &str = "1000x500";

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Render an audio file as a waveform image with a time axis and title bar")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Path to the input audio file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Image to write [default: input path with a .png extension]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("force")
                .short('F')
                .long("force")
                .help("Overwrite the output file if it already exists")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("title")
                .short('t')
                .long("title")
                .value_name("TITLE")
                .help("Title bar text [default: built from artist, album and title tags]"),
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("WIDTHxHEIGHT")
                .help("Size of the waveform area in pixels")
                .default_value(DEFAULT_SIZE)
                .value_parser(ValueParser::new(parse_size)),
        )
        .arg(
            Arg::new("start")
                .short('S')
                .long("start")
                .value_name("SECONDS")
                .help("Offset into the file where the image starts (e.g. 90, 1.5)")
                .default_value("0")
                .value_parser(ValueParser::new(parse_seconds)),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("Length of audio to show [default: until the end of the file]")
                .value_parser(ValueParser::new(parse_seconds)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the probed stream, title and tick layout without rendering")
                .action(ArgAction::SetTrue),
        )
        .arg(tool_arg("ffmpeg", "WAVEVIEW_FFMPEG"))
        .arg(tool_arg("ffprobe", "WAVEVIEW_FFPROBE"))
        .arg(tool_arg("magick", "WAVEVIEW_MAGICK"))
}

fn tool_arg(name: &'static str, env: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("PATH")
        .help(format!("Use this {name} executable instead of searching PATH"))
        .env(env)
        .hide_env_values(true)
        .value_parser(value_parser!(PathBuf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use waveview_core::ImageSize;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn applies_defaults() {
        let matches = build_cli()
            .try_get_matches_from(["waveview", "-i", "song.flac"])
            .unwrap();
        assert_eq!(
            matches.get_one::<ImageSize>("size"),
            Some(&ImageSize::new(1000, 500).unwrap())
        );
        assert_eq!(matches.get_one::<f64>("start"), Some(&0.0));
        assert_eq!(matches.get_one::<f64>("duration"), None);
        assert!(!matches.get_flag("force"));
    }

    #[test]
    fn parses_short_flags() {
        let matches = build_cli()
            .try_get_matches_from([
                "waveview", "-i", "in.wav", "-o", "out.jpg", "-F", "-t", "Demo", "-s", "640x120",
                "-S", "12.5", "-d", "30",
            ])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("output"),
            Some(&PathBuf::from("out.jpg"))
        );
        assert!(matches.get_flag("force"));
        assert_eq!(matches.get_one::<String>("title").map(String::as_str), Some("Demo"));
        assert_eq!(
            matches.get_one::<ImageSize>("size"),
            Some(&ImageSize::new(640, 120).unwrap())
        );
        assert_eq!(matches.get_one::<f64>("start"), Some(&12.5));
        assert_eq!(matches.get_one::<f64>("duration"), Some(&30.0));
    }

    #[test]
    fn rejects_malformed_numbers() {
        for args in [
            ["waveview", "-i", "a.wav", "-s", "640by480"],
            ["waveview", "-i", "a.wav", "-S", "1,5"],
            ["waveview", "-i", "a.wav", "-d", "1m"],
        ] {
            let err = build_cli().try_get_matches_from(args).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{args:?}");
        }
    }

    #[test]
    fn requires_an_input() {
        let err = build_cli().try_get_matches_from(["waveview"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
