use std::{
    env,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use vigil_capture::{open_source, SourceSpec};
use vigil_inference::OllamaClient;
use vigil_ops::{init_tracing, JsonReportWriter};
use vigil_orchestrator::{aggregate::SessionOutcome, LifecycleController};
use vigil_types::config::VigilConfig;

const DEFAULT_CONFIG: &str = "configs/vigil.toml";

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Sampled video safety monitoring")]
struct Args {
    /// Config file (defaults to $VIGIL_CONFIG, then configs/vigil.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Device index, video file, frame directory, or synthetic://WxH?frames=N.
    /// Prompted for interactively when omitted.
    #[arg(short, long)]
    source: Option<String>,
    /// Where to write the session summary.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    endpoint: Option<String>,
    /// Seconds between analyzed frames.
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.ops)?;

    let raw_source = match &args.source {
        Some(source) => source.clone(),
        None => prompt_for_source()?,
    };
    let spec = SourceSpec::parse(&raw_source)?;
    let capture = config.capture.clone();
    let source = tokio::task::spawn_blocking(move || open_source(&spec, &capture))
        .await?
        .context("Cannot open video source")?;

    let client = OllamaClient::new(&config.inference)?;
    let mut controller =
        LifecycleController::new(client, config.capture.clone(), config.pipeline.clone());

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            stop.cancel();
        }
    });

    info!("Monitoring started | Press Ctrl-C to stop");
    let sink = JsonReportWriter::new(&config.report.output_path);
    let report = controller.run(source, &sink).await?;

    let stats = report.stats;
    info!(
        "Session finished ({:?}): read={} sampled={} skipped={} analyzed={} failed={}",
        report.producer_exit,
        stats.frames_read,
        stats.frames_sampled,
        stats.frames_dropped,
        stats.frames_analyzed,
        stats.inference_failures
    );
    if let SessionOutcome::Summary(summary) = &report.outcome {
        info!(
            "Average people {:.2}, max {}, dominant density {}",
            summary.average_people,
            summary.max_people,
            summary.dominant_density.as_str()
        );
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<VigilConfig> {
    let explicit = args
        .config
        .clone()
        .or_else(|| env::var_os("VIGIL_CONFIG").map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => VigilConfig::from_file(&path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => VigilConfig::from_file(DEFAULT_CONFIG)?,
        None => {
            eprintln!("No config at '{DEFAULT_CONFIG}'. Falling back to internal defaults.");
            VigilConfig::default()
        }
    };

    if let Some(output) = &args.output {
        config.report.output_path = output.to_string_lossy().into_owned();
    }
    if let Some(model) = &args.model {
        config.inference.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.inference.endpoint = endpoint.clone();
    }
    if let Some(interval) = args.interval {
        config.capture.frame_interval_secs = interval;
    }

    config.validate()?;
    Ok(config)
}

fn prompt_for_source() -> Result<String> {
    println!("1 → Webcam");
    println!("2 → Video file");
    let choice = read_line("Select input: ")?;
    if choice == "1" {
        return Ok("0".into());
    }
    let path = read_line("Enter video path: ")?;
    if path.is_empty() {
        warn!("No video path entered");
        bail!("no video source selected");
    }
    Ok(path)
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_missing_config_is_an_error() {
        let args = Args::parse_from(["vigil", "--config", "/nonexistent/vigil.toml"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let path = env::temp_dir().join("vigil-cli-override-test.toml");
        fs::write(
            &path,
            "[inference]\nmodel = \"moondream\"\n[capture]\nframe_interval_secs = 5\n",
        )
        .expect("write temp config");
        let config_arg = path.to_string_lossy().into_owned();

        let args = Args::parse_from([
            "vigil",
            "--config",
            config_arg.as_str(),
            "--source",
            "synthetic://64x48?frames=5",
            "--output",
            "out/summary.json",
            "--interval",
            "3",
        ]);
        let config = load_config(&args).expect("load config");
        fs::remove_file(&path).expect("cleanup temp config");

        assert_eq!(args.source.as_deref(), Some("synthetic://64x48?frames=5"));
        assert_eq!(config.inference.model, "moondream");
        assert_eq!(config.capture.frame_interval_secs, 3);
        assert_eq!(config.report.output_path, "out/summary.json");
    }

    #[test]
    fn zero_interval_flag_fails_validation() {
        let path = env::temp_dir().join("vigil-cli-zero-interval-test.toml");
        fs::write(&path, "").expect("write temp config");
        let config_arg = path.to_string_lossy().into_owned();
        let args = Args::parse_from(["vigil", "--config", config_arg.as_str(), "--interval", "0"]);
        let result = load_config(&args);
        fs::remove_file(&path).expect("cleanup temp config");
        assert!(result.is_err());
    }
}
