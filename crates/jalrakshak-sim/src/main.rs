//! jal-sim - synthetic water-network telemetry
//!
//! Usage:
//!   jal-sim list
//!   jal-sim generate --scenario pipe_leak --points 60 --format json-lines
//!   jal-sim evaluate --scenario contamination_event --points 40
//!   jal-sim replay --target http://127.0.0.1:5000 --scenario pump_wear

use std::error::Error;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jalrakshak_core::{DiagnosticEngine, EngineConfig, TelemetrySample};
use jalrakshak_sim::{SensorGenerator, evaluate, scenarios};

#[derive(Parser)]
#[command(name = "jal-sim")]
#[command(about = "Synthetic sensor telemetry with scenario injection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available scenarios
    List,

    /// Print generated samples to stdout
    Generate {
        #[arg(short, long, default_value = "normal")]
        scenario: String,

        #[arg(short, long, default_value = "60")]
        points: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Run generated samples through the engine in-process
    Evaluate {
        #[arg(short, long, default_value = "normal")]
        scenario: String,

        #[arg(short, long, default_value = "60")]
        points: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Print every per-sample verdict, not only the summary
        #[arg(short, long)]
        verbose: bool,
    },

    /// POST generated samples to a running gateway's /analyze
    Replay {
        #[arg(short, long, default_value = "http://127.0.0.1:5000")]
        target: String,

        #[arg(short, long, default_value = "normal")]
        scenario: String,

        #[arg(short, long, default_value = "60")]
        points: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Pause between requests in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Json,
    JsonLines,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => run_list(),
        Commands::Generate {
            scenario,
            points,
            seed,
            format,
        } => run_generate(&scenario, points, seed, format),
        Commands::Evaluate {
            scenario,
            points,
            seed,
            verbose,
        } => run_evaluate(&scenario, points, seed, verbose).await,
        Commands::Replay {
            target,
            scenario,
            points,
            seed,
            delay_ms,
        } => run_replay(&target, &scenario, points, seed, delay_ms).await,
    }
}

fn generator_for(scenario: &str, seed: u64) -> Result<SensorGenerator, Box<dyn Error>> {
    SensorGenerator::from_scenario_name(scenario, seed)
        .ok_or_else(|| format!("unknown scenario '{scenario}' (try `jal-sim list`)").into())
}

fn run_list() -> Result<(), Box<dyn Error>> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              Available Simulation Scenarios                  ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (name, description) in scenarios::list_scenarios() {
        println!("║ {:20} - {:37} ║", name, description);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\nUsage: jal-sim generate --scenario <SCENARIO> --points <N>");
    Ok(())
}

fn run_generate(
    scenario: &str,
    points: usize,
    seed: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let mut generator = generator_for(scenario, seed)?;
    info!(scenario = generator.scenario_name(), points, seed, "Generating samples");
    let samples = generator.samples(points);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&samples)?),
        OutputFormat::JsonLines => {
            for sample in &samples {
                println!("{}", serde_json::to_string(sample)?);
            }
        }
        OutputFormat::Pretty => {
            for (step, s) in samples.iter().enumerate() {
                println!(
                    "[{step:>4}] {} flow={:6.2} L/min pressure={:5.2} bar turbidity={:5.2} NTU temp={:5.2} °C",
                    s.device_id, s.flow_rate, s.pressure, s.turbidity, s.temperature
                );
            }
        }
    }
    Ok(())
}

async fn run_evaluate(
    scenario: &str,
    points: usize,
    seed: u64,
    verbose: bool,
) -> Result<(), Box<dyn Error>> {
    let mut generator = generator_for(scenario, seed)?;

    // Fitting both models is CPU-bound
    let engine = tokio::task::spawn_blocking(|| {
        DiagnosticEngine::bootstrap(&EngineConfig::default(), None, None)
    })
    .await??;

    let report = evaluate(&engine, &mut generator, points)?;

    if verbose {
        for (step, verdict) in report.verdicts.iter().enumerate() {
            println!("{step:>4} {}", serde_json::to_string(verdict)?);
        }
    }

    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║                     Evaluation Summary                       ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Scenario: {:50} ║", report.scenario);
    eprintln!("║ Samples: {:51} ║", report.points);
    eprintln!("║ Anomalies: {:49} ║", report.anomalies);
    for (kind, count) in &report.anomalies_by_type {
        eprintln!("║   {:20} {:37} ║", kind, count);
    }
    eprintln!("║ Leak (history): {:44} ║", report.leak_history.detected);
    eprintln!("║ Contamination (pattern): {:35} ║", report.contamination_pattern.detected);
    eprintln!("║ Maintenance needed: {:40} ║", report.maintenance.maintenance_needed);
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_replay(
    target: &str,
    scenario: &str,
    points: usize,
    seed: u64,
    delay_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let mut generator = generator_for(scenario, seed)?;
    let url = format!("{}/analyze", target.trim_end_matches('/'));
    let client = reqwest::Client::new();
    info!(url = %url, scenario = generator.scenario_name(), points, "Replaying samples");

    let mut anomalies = 0usize;
    let mut failures = 0usize;
    for step in 0..points {
        let sample: TelemetrySample = generator.next_sample();
        let response = client.post(&url).json(&sample).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            failures += 1;
            warn!(step, status = %status, body = %body, "Gateway rejected sample");
        } else if body["anomaly_detected"].as_bool().unwrap_or(false) {
            anomalies += 1;
            info!(
                step,
                kind = body["anomaly_type"].as_str().unwrap_or("unclassified"),
                severity = body["severity"].as_str().unwrap_or("unknown"),
                "Anomaly reported"
            );
        }

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    info!(points, anomalies, failures, "Replay complete");
    Ok(())
}
