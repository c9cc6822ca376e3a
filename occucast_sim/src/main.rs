//! Occucast Simulator CLI
//!
//! Run the prediction node against simulated humans.

use clap::Parser;
use occucast_core::PredictionConfig;
use occucast_sim::scenarios::ScenarioId;
use occucast_sim::{RerunLogger, ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Occucast simulation CLI
#[derive(Parser, Debug)]
#[command(name = "occucast-sim")]
#[command(about = "Run occupancy prediction scenarios against a simulated human", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (walk, round_trip, excursion, flaky_planner, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Prediction config (JSON); defaults to a 10x10 grid of 1m cells
    #[arg(short, long)]
    config: Option<String>,

    /// Simulated duration in seconds (one full walk of the route)
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Pose updates per second
    #[arg(short, long, default_value = "10")]
    rate: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export simulation frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Stream to a Rerun viewer (needs the `visualization` feature)
    #[arg(long)]
    rerun: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Occucast Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = match &args.config {
        Some(path) => PredictionConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }),
        None => PredictionConfig::default(),
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: walk, round_trip, excursion, flaky_planner, all");
            std::process::exit(1);
        })]
    };

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let logger = if args.rerun {
        RerunLogger::new("occucast-sim")
    } else {
        RerunLogger::disabled()
    };

    let runner = ScenarioRunner::new(seed)
        .with_config(config)
        .with_duration(args.duration)
        .with_rate(args.rate)
        .with_logger(logger);

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let result = runner.run_with_export(scenarios[0], export_path);
        report(&result, args.json);
        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    let results: Vec<ScenarioResult> = scenarios.iter().map(|s| runner.run(*s)).collect();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed_count,
            "failed": failed_count,
            "results": results.iter().map(summary_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    } else {
        for result in &results {
            report(result, false);
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", results.len());
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, results.len());
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

fn summary_json(r: &ScenarioResult) -> serde_json::Value {
    serde_json::json!({
        "scenario": r.scenario.name(),
        "seed": r.seed,
        "passed": r.passed,
        "ticks": r.total_ticks,
        "time_secs": r.final_time_secs,
        "metrics": r.metrics,
        "failure_reason": r.failure_reason,
    })
}

fn report(result: &ScenarioResult, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary_json(result)).unwrap_or_default()
        );
    } else if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario.name(), result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}
