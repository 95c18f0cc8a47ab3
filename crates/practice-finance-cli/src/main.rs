mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cash_flow::CashFlowArgs;
use commands::loans::{CostOfCapitalArgs, DetectLoansArgs};
use commands::valuation::{ValuationArgs, ValuationHistoryArgs};

/// Dental practice financial analytics
#[derive(Parser)]
#[command(
    name = "pfa",
    version,
    about = "Dental practice financial analytics",
    long_about = "Analyzes a practice's categorized transactions with decimal precision. \
                  Produces free-cash-flow reports, detects recurring loans, computes the \
                  blended cost of capital with payoff simulation, and estimates practice value."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Monthly free-cash-flow report over a trailing window
    CashFlow(CashFlowArgs),
    /// Detect recurring loans from payment history
    DetectLoans(DetectLoansArgs),
    /// Blended cost of capital and payoff simulation
    CostOfCapital(CostOfCapitalArgs),
    /// Estimate practice value from trailing free cash flow
    Valuation(ValuationArgs),
    /// List persisted valuation snapshots, oldest first
    ValuationHistory(ValuationHistoryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,audit=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::CashFlow(args) => commands::cash_flow::run_cash_flow(args),
        Commands::DetectLoans(args) => commands::loans::run_detect_loans(args),
        Commands::CostOfCapital(args) => commands::loans::run_cost_of_capital(args),
        Commands::Valuation(args) => commands::valuation::run_valuation(args),
        Commands::ValuationHistory(args) => commands::valuation::run_valuation_history(args),
        Commands::Version => {
            println!("pfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
