use assert_cmd::Command;
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;
use waveview_core::{ToolOverrides, Toolchain};

/// Generate a small single-channel WAV file for testing.
///
/// The fixtures are produced on the fly by emitting a PCM RIFF header followed by
/// procedurally generated sine-wave samples.
fn write_test_tone<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let total_samples = u64::from(sample_rate) * duration_ms / 1_000;
    let mut samples = Vec::with_capacity(total_samples as usize * 2);

    for n in 0..total_samples {
        let theta = (n as f32 / sample_rate as f32) * 2.0 * std::f32::consts::PI * 440.0;
        let sample = (theta.sin() * i16::MAX as f32) as i16;
        samples.extend_from_slice(&sample.to_le_bytes());
    }

    let mut file = File::create(path)?;
    let data_len = samples.len() as u32;
    let chunk_size = 36u32 + data_len;
    file.write_all(b"RIFF")?;
    file.write_all(&chunk_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?; // PCM header size
    file.write_all(&1u16.to_le_bytes())?; // audio format = PCM
    file.write_all(&1u16.to_le_bytes())?; // channels
    file.write_all(&sample_rate.to_le_bytes())?;
    let byte_rate = sample_rate * 2;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?; // block align
    file.write_all(&16u16.to_le_bytes())?; // bits per sample
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    file.write_all(&samples)?;
    Ok(())
}

fn waveview() -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("waveview")?;
    cmd.env_remove("WAVEVIEW_FFMPEG")
        .env_remove("WAVEVIEW_FFPROBE")
        .env_remove("WAVEVIEW_MAGICK");
    Ok(cmd)
}

fn tools_available() -> bool {
    let found = Toolchain::locate(&ToolOverrides::default(), Arc::new(AtomicBool::new(false)));
    if found.is_err() {
        eprintln!("skipping: ffmpeg, ffprobe or ImageMagick not found on PATH");
    }
    found.is_ok()
}

#[test]
fn cli_help_exits_successfully() -> Result<(), Box<dyn Error>> {
    let assert = waveview()?.arg("--help").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("--dry-run"));
    Ok(())
}

#[test]
fn cli_usage_errors_exit_with_one_and_print_help() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("input.wav");
    write_test_tone(&input_path, 8_000, 500)?;

    for extra in [["-s", "1000by500"], ["-S", "soon"], ["-d", "1m"]] {
        let assert = waveview()?
            .arg("-i")
            .arg(&input_path)
            .args(extra)
            .assert()
            .code(1);
        let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
        assert!(
            stderr.contains("Usage:") && stderr.contains("Options:"),
            "help missing for {extra:?}: {stderr}"
        );
    }

    waveview()?.assert().code(1);
    Ok(())
}

#[test]
fn cli_reports_missing_input_file() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("missing.wav");

    let assert = waveview()?.arg("-i").arg(&input_path).assert().code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("input file does not exist"), "{stderr}");
    assert!(!work_dir.path().join("missing.png").exists());
    Ok(())
}

#[test]
fn cli_keeps_existing_output_without_force() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    let output_path = work_dir.path().join("input.png");
    write_test_tone(&input_path, 8_000, 500)?;
    fs::write(&output_path, b"previous render")?;

    let assert = waveview()?.arg("-i").arg(&input_path).assert().code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("already exists"), "{stderr}");
    assert_eq!(fs::read(&output_path)?, b"previous render");
    Ok(())
}

#[test]
fn cli_renders_png_next_to_input() -> Result<(), Box<dyn Error>> {
    if !tools_available() {
        return Ok(());
    }
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_test_tone(&input_path, 8_000, 1_500)?;

    waveview()?
        .arg("-i")
        .arg(&input_path)
        .args(["-s", "300x80"])
        .assert()
        .success();

    let bytes = fs::read(work_dir.path().join("input.png"))?;
    assert_eq!(&bytes[1..4], b"PNG");
    let width = u32::from_be_bytes(bytes[16..20].try_into()?);
    assert_eq!(width, 300);

    // A second run only succeeds with --force.
    waveview()?.arg("-i").arg(&input_path).assert().code(1);
    waveview()?
        .arg("-i")
        .arg(&input_path)
        .args(["-s", "300x80", "--force"])
        .assert()
        .success();
    Ok(())
}

#[test]
fn cli_dry_run_prints_plan_without_creating_files() -> Result<(), Box<dyn Error>> {
    if !tools_available() {
        return Ok(());
    }
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_test_tone(&input_path, 8_000, 2_000)?;

    let assert = waveview()?
        .arg("-i")
        .arg(&input_path)
        .args(["-s", "400x100", "-t", "Dry Tone", "--dry-run"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("Dry run: would render"), "{stdout}");
    assert!(stdout.contains("title:     Dry Tone"), "{stdout}");
    assert!(stdout.contains("8000 Hz"), "{stdout}");
    assert!(stdout.contains("labels:    1 2"), "{stdout}");

    let produced: Vec<_> = fs::read_dir(work_dir.path())?.collect::<Result<_, _>>()?;
    assert_eq!(produced.len(), 1, "dry run should not create files");
    Ok(())
}

#[test]
fn cli_rejects_start_beyond_end() -> Result<(), Box<dyn Error>> {
    if !tools_available() {
        return Ok(());
    }
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_test_tone(&input_path, 8_000, 1_000)?;

    let assert = waveview()?
        .arg("-i")
        .arg(&input_path)
        .args(["-S", "30"])
        .assert()
        .code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("not before the end of the file"), "{stderr}");
    assert!(!work_dir.path().join("input.png").exists());
    Ok(())
}

#[cfg(unix)]
mod fake_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::process::{self, Stdio};
    use std::thread;
    use std::time::{Duration, Instant};

    const PROBE_OUTPUT: &str = r#"streams.stream.0.codec_name="pcm_s16le"
streams.stream.0.sample_rate="8000"
streams.stream.0.bits_per_sample=16
streams.stream.0.channels=1
streams.stream.0.duration="2.000000"
streams.stream.0.duration_ts=16000
streams.stream.0.time_base="1/8000"
format.duration="2.000000""#;

    fn write_tool(dir: &Path, name: &str, body: &str) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    #[test]
    fn dry_run_needs_only_ffprobe() -> Result<(), Box<dyn Error>> {
        let work_dir = tempdir()?;
        let input_path = work_dir.path().join("input.wav");
        write_test_tone(&input_path, 8_000, 2_000)?;
        let ffprobe = write_tool(
            work_dir.path(),
            "ffprobe",
            &format!("cat <<'EOF'\n{PROBE_OUTPUT}\nEOF"),
        )?;

        let assert = waveview()?
            .arg("-i")
            .arg(&input_path)
            .args(["-s", "400x100", "--dry-run"])
            .arg("--ffprobe")
            .arg(&ffprobe)
            .args(["--ffmpeg", "/nonexistent/ffmpeg"])
            .args(["--magick", "/nonexistent/magick"])
            .assert()
            .success();

        let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
        assert!(stdout.contains("pcm_s16le, 8000 Hz, 16-bit, mono"), "{stdout}");
        assert!(stdout.contains("labels:    1 2"), "{stdout}");
        Ok(())
    }

    #[test]
    fn terminate_signal_removes_scratch() -> Result<(), Box<dyn Error>> {
        let work_dir = tempdir()?;
        let scratch_parent = work_dir.path().join("tmp");
        fs::create_dir(&scratch_parent)?;
        let input_path = work_dir.path().join("input.wav");
        write_test_tone(&input_path, 8_000, 2_000)?;
        let started = work_dir.path().join("ffprobe.started");

        let ffprobe = write_tool(
            work_dir.path(),
            "ffprobe",
            &format!(
                ": > '{}'\nsleep 2\ncat <<'EOF'\n{PROBE_OUTPUT}\nEOF",
                started.display()
            ),
        )?;
        let other = write_tool(work_dir.path(), "other", "exit 0")?;

        let child = process::Command::new(env!("CARGO_BIN_EXE_waveview"))
            .arg("-i")
            .arg(&input_path)
            .args(["-t", "Signal"])
            .arg("--ffprobe")
            .arg(&ffprobe)
            .arg("--ffmpeg")
            .arg(&other)
            .arg("--magick")
            .arg(&other)
            .env("TMPDIR", &scratch_parent)
            .env_remove("WAVEVIEW_FFMPEG")
            .env_remove("WAVEVIEW_FFPROBE")
            .env_remove("WAVEVIEW_MAGICK")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let deadline = Instant::now() + Duration::from_secs(10);
        while !started.exists() {
            assert!(Instant::now() < deadline, "ffprobe never started");
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(fs::read_dir(&scratch_parent)?.count(), 1);

        let kill = process::Command::new("kill")
            .args(["-TERM", &child.id().to_string()])
            .status()?;
        assert!(kill.success());

        let output = child.wait_with_output()?;
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8(output.stderr)?;
        assert!(stderr.contains("interrupted"), "{stderr}");
        assert_eq!(fs::read_dir(&scratch_parent)?.count(), 0);
        assert!(!work_dir.path().join("input.png").exists());
        Ok(())
    }
}
