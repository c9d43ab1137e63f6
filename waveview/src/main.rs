mod cli;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};
use waveview_core::{
    format_time, plan, run_with_progress, Config, ImageSize, Plan, ProgressEvent, ToolOverrides,
};

use crate::cli::build_cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => exit_with_usage(err),
    };

    let input_path = matches
        .get_one::<PathBuf>("input")
        .expect("required argument");
    let size = *matches
        .get_one::<ImageSize>("size")
        .expect("defaulted argument");
    let start = *matches
        .get_one::<f64>("start")
        .expect("defaulted argument");
    let dry_run = matches.get_flag("dry-run");
    let tools = ToolOverrides {
        ffmpeg: matches.get_one::<PathBuf>("ffmpeg").cloned(),
        ffprobe: matches.get_one::<PathBuf>("ffprobe").cloned(),
        magick: matches.get_one::<PathBuf>("magick").cloned(),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("failed to install the interrupt handler: {err}");
    }

    // A dry run never writes, so an existing output is not in the way.
    let mut builder = Config::builder(input_path)
        .force(matches.get_flag("force") || dry_run)
        .size(size)
        .start_seconds(start)
        .tools(tools)
        .cancel_flag(cancel);
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        builder = builder.output(output);
    }
    if let Some(title) = matches.get_one::<String>("title") {
        builder = builder.title(title.clone());
    }
    if let Some(duration) = matches.get_one::<f64>("duration") {
        builder = builder.duration_seconds(*duration);
    }

    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for '{}'",
            input_path.display()
        )
    })?;

    if dry_run {
        let plan = plan(&config)
            .with_context(|| format!("failed to plan '{}'", input_path.display()))?;
        print_plan(&config, &plan);
        return Ok(());
    }

    let progress = ProgressBar::new_spinner();
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let spinner_style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    progress.set_style(spinner_style);

    let output_path = config.output_path.clone();
    let progress_handle = progress.clone();
    let mut total_stages = 0;
    let result = run_with_progress(config, move |event| match event {
        ProgressEvent::Start { stages } => {
            total_stages = stages;
            progress_handle.enable_steady_tick(Duration::from_millis(100));
        }
        ProgressEvent::Stage { index, stage } => {
            progress_handle.set_message(format!("[{}/{total_stages}] {stage}", index + 1));
        }
        ProgressEvent::Finish => {
            progress_handle.set_message(String::from("Completed"));
        }
    })
    .with_context(|| format!("failed to render '{}'", input_path.display()));

    progress.finish_and_clear();

    let plan = result?;
    info!(
        "wrote '{}': {} ticks every {}",
        output_path.display(),
        plan.layout.num_ticks,
        format_time(plan.layout.interval_ms, plan.layout.interval_ms < 1_000)
    );

    Ok(())
}

/// Usage errors exit with status 1 after printing the help text.
fn exit_with_usage(err: clap::Error) -> ! {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::exit(0),
        _ => {
            eprintln!("\n{}", build_cli().render_help());
            process::exit(1)
        }
    }
}

fn print_plan(config: &Config, plan: &Plan) {
    let selection = &plan.selection;
    let layout = &plan.layout;

    println!("Dry run: would render '{}'", config.output_path.display());
    println!("  input:     {}", config.input_path.display());
    println!("  stream:    {}", plan.properties.summary());
    println!("  title:     {}", plan.title);
    println!(
        "  selection: {} + {}{}",
        format_time(selection.start_ms, true),
        format_time(selection.duration_ms, true),
        if selection.clamped { " (clamped)" } else { "" }
    );
    println!(
        "  ticks:     {} every {} ({} subdivisions), {}px apart",
        layout.num_ticks,
        format_time(layout.interval_ms, layout.interval_ms < 1_000),
        layout.subdivisions,
        layout.major_px
    );
    let axis = layout.time_axis();
    let labels: Vec<&str> = axis.labels().collect();
    println!("  labels:    {}", labels.join(" "));
}
