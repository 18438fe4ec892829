mod cli;

use cutlist::{config, manifest::Manifest};
use cutlist_av::args::{concat_copy_command, concat_reencode_command, cut_command};
use cutlist_av::{FfprobeProber, ScaleFilterBuilder, ToolRegistry, Workspace};
use cutlist_core::config::Config;
use cutlist_core::{
    ExportTask, MediaFile, Preset, ProgressEvent, Resolution, Segment, Stage, Watermark,
};
use cutlist_pipeline::{EngineSettings, ExportOrchestrator};

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "cutlist=trace,cutlist_pipeline=debug,cutlist_av=debug,cutlist_core=debug".to_string()
        } else {
            "cutlist=info,cutlist_pipeline=info,cutlist_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Export {
            manifest,
            output,
            dry_run,
        } => export(&manifest, output, dry_run, cli.config.as_deref()),
        Commands::Merge {
            files,
            output,
            preset,
            resolution,
            codec,
            watermark,
            web_optimize,
        } => {
            let opts = MergeOptions {
                output,
                preset,
                resolution,
                codec,
                watermark,
                web_optimize,
            };
            merge(files, opts, cli.config.as_deref())
        }
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Presets => {
            list_presets();
            Ok(())
        }
        Commands::Version => {
            println!("cutlist {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// export / merge
// ---------------------------------------------------------------------------

fn export(
    manifest_path: &Path,
    output: Option<PathBuf>,
    dry_run: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !manifest_path.exists() {
        bail!("Manifest does not exist: {:?}", manifest_path);
    }
    let mut manifest = Manifest::load(manifest_path)?;
    if let Some(output) = output {
        manifest.output = output;
    }

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = match tools.ffmpeg() {
        Ok(path) => path.to_path_buf(),
        // A dry run only prints commands, so a missing ffmpeg is not fatal.
        Err(_) if dry_run => PathBuf::from("ffmpeg"),
        Err(e) => return Err(e.into()),
    };

    let task = manifest.into_task(&ffmpeg, &config.export)?;

    if dry_run {
        return print_plan(&task, &config);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_task(task, &config))
}

struct MergeOptions {
    output: Option<PathBuf>,
    preset: Option<String>,
    resolution: Option<String>,
    codec: Option<String>,
    watermark: Option<PathBuf>,
    web_optimize: bool,
}

fn merge(files: Vec<PathBuf>, opts: MergeOptions, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for file in &files {
        if !file.exists() {
            bail!("File does not exist: {:?}", file);
        }
    }

    let preset = match opts.preset {
        Some(ref name) => name.parse::<Preset>()?,
        None => config.export.default_preset(),
    };
    let mut profile = preset.profile();
    if let Some(ref speed) = config.export.speed {
        profile.speed = Some(speed.clone());
    }
    profile.web_optimize = opts.web_optimize || config.export.web_optimize;
    if let Some(ref res) = opts.resolution {
        profile = profile.with_resolution(res.parse::<Resolution>()?);
        profile.letterbox = true;
    }
    if let Some(codec) = opts.codec {
        profile.codec = codec;
    }
    profile.watermark = opts.watermark.map(Watermark::new);

    let output = match opts.output {
        Some(path) => path,
        None => default_merge_output(&files[0]),
    };

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools.ffmpeg()?.to_path_buf();
    let prober = FfprobeProber::new(tools.ffprobe()?.to_path_buf());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let infos = prober
            .probe_all(&files, config.export.probe_concurrency)
            .await;

        let mut task = ExportTask::new(ffmpeg, profile, output);
        for (order, (path, info)) in files.iter().zip(infos).enumerate() {
            let info = info.with_context(|| format!("Failed to probe {:?}", path))?;
            let file = MediaFile::new(path).with_info(info);
            task = add_whole_file(task, &file, order as i64);
        }

        run_task(task, &config).await
    })
}

/// Register `file` with `task` and append one segment spanning its probed
/// duration.
fn add_whole_file(task: ExportTask, file: &MediaFile, order: i64) -> ExportTask {
    let duration = file.info.as_ref().map_or(0.0, |info| info.duration);
    if let Some(ref info) = file.info {
        tracing::info!("{}: {}", file.path.display(), info.badge());
    }
    task.with_file(file.id, &file.path)
        .with_segment(Segment::new(file.id, 0.0, duration, order))
}

/// `merged_<timestamp>.mp4` next to `first`.
fn default_merge_output(first: &Path) -> PathBuf {
    let name = format!(
        "merged_{}.mp4",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    match first.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// Run `task` to completion, printing progress and cancelling on Ctrl-C.
async fn run_task(task: ExportTask, config: &Config) -> Result<()> {
    let orchestrator =
        ExportOrchestrator::system().with_settings(EngineSettings::from(&config.export));

    tracing::info!(
        "Exporting {} segment(s) to {}",
        task.segments.len(),
        task.output_path.display()
    );

    let mut handle = orchestrator.spawn(task);
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            token.cancel();
        }
    });

    let mut printer = ProgressPrinter::default();
    while let Some(event) = handle.next_event().await {
        printer.show(&event);
    }

    let result = handle.wait().await;
    if result.success {
        println!("\nExport complete!");
        if let Some(ref output) = result.output {
            println!("Output: {}", output.display());
        }
        Ok(())
    } else if result.is_cancelled() {
        // Cancellation is an outcome, not an error.
        println!("\nExport cancelled; no output was written.");
        Ok(())
    } else {
        let kind = result
            .error_kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        bail!("Export failed ({}): {}", kind, result.message)
    }
}

/// Prints a line whenever the stage changes or the whole percent advances.
#[derive(Default)]
struct ProgressPrinter {
    stage: Option<Stage>,
    percent: i32,
}

impl ProgressPrinter {
    fn show(&mut self, event: &ProgressEvent) {
        if let Some(ref line) = event.log_line {
            tracing::trace!(target: "cutlist::ffmpeg", "{}", line);
            return;
        }
        let whole = event.percent.floor() as i32;
        if self.stage != Some(event.stage) || whole > self.percent {
            eprintln!("[{:>3}%] {}", whole, event.stage_label());
            self.stage = Some(event.stage);
            self.percent = whole;
        }
    }
}

/// Validate `task` and print what would run, without spawning anything.
fn print_plan(task: &ExportTask, config: &Config) -> Result<()> {
    let ordered = task.validate()?;
    let chain = ScaleFilterBuilder::from_profile(&task.profile).build()?;
    let settings = EngineSettings::from(&config.export);
    let ws = Workspace::new(task.id, &task.output_path, settings.temp_dir.as_deref())?;

    println!(
        "Export plan: {} segment(s) -> {}",
        ordered.len(),
        task.output_path.display()
    );
    println!("Profile: {} ({})", task.profile.preset_name, task.profile.codec);
    if let Some(ref chain) = chain {
        println!("Video filter: {}", chain.to_arg());
    }

    println!("\nCuts:");
    let mut cuts = Vec::with_capacity(ordered.len());
    for (index, segment) in ordered.iter().enumerate() {
        let source = task
            .source_for(segment)
            .with_context(|| format!("Segment {} has no source", segment.id))?;
        let output = ws.cut_path(index);
        let cmd = cut_command(
            &task.tool_path,
            segment,
            source,
            &task.profile,
            chain.as_ref(),
            &output,
        )?;
        println!("  {}. {}", index + 1, cmd.display());
        cuts.push(output);
    }

    let copy = concat_copy_command(
        &task.tool_path,
        &ws.manifest_path(),
        &task.profile,
        ws.staging_path(),
    );
    let fallback =
        concat_reencode_command(&task.tool_path, &cuts, &task.profile, ws.staging_path())?;
    println!("\nConcat:\n  {}", copy.display());
    println!("\nFallback:\n  {}", fallback.display());

    println!("\n[DRY RUN] Nothing was executed");
    Ok(())
}

// ---------------------------------------------------------------------------
// probe / check-tools / validate / presets
// ---------------------------------------------------------------------------

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.ffprobe()?.to_path_buf());

    let rt = tokio::runtime::Runtime::new()?;
    let info = rt.block_on(prober.probe(file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File: {}", file.display());
        println!("{}", info.badge());
        println!("\nCodec: {}", info.codec);
        println!("Resolution: {}x{}", info.width, info.height);
        println!(
            "Frame rate: {}/{} ({:.3} fps)",
            info.fps_num,
            info.fps_den,
            info.fps()
        );
        println!("Pixel format: {}", info.pix_fmt);
        println!("Duration: {:.3}s", info.duration);
        if let Some(bitrate) = info.bitrate {
            println!("Bitrate: {} kbps", bitrate / 1000);
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to export.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).or_else(config::find_default_config);
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(&p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!("\nWarnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        None => {
            println!("No config file specified, using defaults");
            print_config_summary(&Config::default());
        }
    }

    Ok(())
}

fn print_config_summary(config: &Config) {
    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(auto)".to_string())
    };
    println!("  ffmpeg: {}", show(&config.tools.ffmpeg_path));
    println!("  ffprobe: {}", show(&config.tools.ffprobe_path));
    println!("  Preset: {}", config.export.default_preset());
    println!("  Web optimize: {}", config.export.web_optimize);
    println!("  Temp dir: {}", show(&config.export.temp_dir));
}

fn list_presets() {
    println!("Presets:");
    for preset in Preset::ALL {
        let (crf, speed, audio) = preset.settings();
        println!(
            "  {:<14} crf {:<3} speed {:<8} audio {}",
            preset.to_string(),
            crf,
            speed,
            audio
        );
    }

    println!("\nResolutions:");
    for res in Resolution::ALL {
        let (w, h) = res.dimensions();
        println!("  {:<6} {}x{}", res.to_string(), w, h);
    }
}
