//! Vault balance simulator CLI.
//!
//! Run Monte Carlo simulations to analyze the vault economy.
//!
//! Usage:
//!   cargo run --bin simulate -- [OPTIONS]
//!
//! Examples:
//!   cargo run --bin simulate                        # Default: 200 runs, 120 items
//!   cargo run --bin simulate -- -n 50 -l 300       # 50 runs with 300 items
//!   cargo run --bin simulate -- --seed 42          # Reproducible run
//!   cargo run --bin simulate -- -c config/balance.json

use std::env;
use std::sync::Arc;
use vault_escape::core::{BalanceConfig, ConfigLoader};
use vault_escape::simulator::{run_simulation, SimConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = parse_args(&args);

    let balance = match &config.balance_path {
        Some(path) => ConfigLoader::new(path).get(),
        None => Arc::new(BalanceConfig::default()),
    };

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║              VAULT BALANCE SIMULATOR                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Configuration:");
    println!("  Runs:           {}", config.num_runs);
    println!("  Library Size:   {}", config.library_size);
    println!("  Unplayed:       {:.0}%", config.unplayed_fraction * 100.0);
    println!("  Max Actions:    {}", config.max_actions);
    match &config.balance_path {
        Some(path) => println!("  Balance:        {}", path.display()),
        None => println!("  Balance:        built-in defaults"),
    }
    if let Some(seed) = config.seed {
        println!("  Seed:           {}", seed);
    }
    println!();
    println!("Running simulation...");
    println!();

    let report = run_simulation(&config, balance);

    println!("{}", report.to_text());

    // Optionally save JSON report
    if args.iter().any(|a| a == "--json") {
        let json = report.to_json();
        let filename = format!(
            "sim_report_{}.json",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        );
        match std::fs::write(&filename, json) {
            Ok(()) => println!("JSON report saved to: {}", filename),
            Err(err) => eprintln!("Failed to write JSON report: {}", err),
        }
    }
}

fn parse_args(args: &[String]) -> SimConfig {
    let mut config = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-n" | "--runs" => {
                if i + 1 < args.len() {
                    config.num_runs = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "-l" | "--library" => {
                if i + 1 < args.len() {
                    config.library_size = args[i + 1].parse().unwrap_or(120);
                    i += 1;
                }
            }
            "-u" | "--unplayed" => {
                if i + 1 < args.len() {
                    config.unplayed_fraction = args[i + 1].parse().unwrap_or(0.3);
                    i += 1;
                }
            }
            "-s" | "--seed" => {
                if i + 1 < args.len() {
                    config.seed = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "-a" | "--actions" => {
                if i + 1 < args.len() {
                    config.max_actions = args[i + 1].parse().unwrap_or(200_000);
                    i += 1;
                }
            }
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config.balance_path = Some(args[i + 1].clone().into());
                    i += 1;
                }
            }
            "-v" | "--verbose" => {
                config.verbosity = 2;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--quick" => {
                config = SimConfig::quick();
            }
            "--large" => {
                config = SimConfig::large_library();
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("Vault Balance Simulator");
    println!();
    println!("USAGE:");
    println!("    cargo run --bin simulate -- [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -n, --runs <N>       Number of simulation runs (default: 200)");
    println!("    -l, --library <N>    Items per synthetic library (default: 120)");
    println!("    -u, --unplayed <F>   Share of never-played items (default: 0.3)");
    println!("    -s, --seed <S>       Random seed for reproducibility");
    println!("    -a, --actions <A>    Max actions per run (default: 200,000)");
    println!("    -c, --config <PATH>  Balance document to simulate");
    println!("    -v, --verbose        Print every run");
    println!("    --json               Save JSON report");
    println!("    --quick              Quick test (25 runs, 40 items)");
    println!("    --large              Large backlog (50 runs, 600 items)");
    println!("    -h, --help           Show this help");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run --bin simulate                     # Default run");
    println!("    cargo run --bin simulate -- --seed 42        # Reproducible");
    println!("    cargo run --bin simulate -- --quick          # Quick balance check");
    println!("    cargo run --bin simulate -- -c tuned.json    # Try a tuned document");
}
