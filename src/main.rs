//! Classify one video from the command line.
//!
//! Usage: realies <video> [--threshold T] [--verbose]
//!
//! Prints the result as JSON. Exit status is 0 for a classification,
//! 1 when no usable frames were found and 2 on any other failure.

use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;

use realies::decoder::FfmpegDecoder;
use realies::{Analyzer, AnalyzerSettings, Config, Status};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    realies::logging::init(if verbose { "debug" } else { "info" });

    match run(&args) {
        Ok(status) => std::process::exit(match status {
            Status::Ok => 0,
            Status::NoFrames => 1,
            Status::Error => 2,
        }),
        Err(e) => {
            eprintln!("realies: {:#}", e);
            eprintln!("Usage: realies <video> [--threshold T] [--verbose]");
            std::process::exit(2);
        }
    }
}

fn run(args: &[String]) -> Result<Status> {
    let threshold = args
        .iter()
        .position(|a| a == "--threshold")
        .map(|i| {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("--threshold needs a value"))?
                .parse::<f64>()
                .context("--threshold must be a number")
        })
        .transpose()?;

    let video = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(i, a)| !a.starts_with("--") && args[i - 1] != "--threshold")
        .map(|(_, a)| PathBuf::from(a))
        .ok_or_else(|| anyhow!("missing video path"))?;

    let config = Config::from_env();
    let strategy = realies::models::load_strategy(&config)?;
    let decoder = FfmpegDecoder::with_binaries(config.ffmpeg.clone(), config.ffprobe.clone());
    let analyzer = Analyzer::new(Box::new(decoder), strategy, AnalyzerSettings::from(&config));

    let result = analyzer.analyze(&video, threshold);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.status)
}
