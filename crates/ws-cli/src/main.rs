//! webshield CLI
//!
//! Developer tools for filter lists: lint/compile-check, one-shot request
//! matching, and a simple throughput benchmark.

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use ws_engine::{optimize_rules, parse_filter_list, Engine};

mod bench;

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(about = "webshield filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse filter lists and report compilation statistics
    Lint {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Per-list breakdown
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compile lists and evaluate a single request
    Match {
        /// Input filter list files (merged into one engine)
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Host of the source document ("" = main-frame request)
        #[arg(long, default_value = "")]
        source_host: String,

        /// Resource type label ("" = unspecified)
        #[arg(long, default_value = "")]
        resource_type: String,

        /// Third-party hint (recomputed when both hosts are known)
        #[arg(long)]
        third_party: bool,

        /// Emit the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure matching throughput over a request file
    Bench {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Request file: one `url[,source_host[,resource_type]]` per line
        #[arg(short, long)]
        requests: String,

        /// Passes over the request file
        #[arg(long, default_value_t = 20)]
        iterations: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lint { input, verbose } => cmd_lint(&input, verbose),
        Commands::Match {
            input,
            url,
            source_host,
            resource_type,
            third_party,
            json,
        } => cmd_match(&input, &url, &source_host, &resource_type, third_party, json),
        Commands::Bench {
            input,
            requests,
            iterations,
        } => bench::run(&input, &requests, iterations),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_list(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read '{path}': {e}"))
}

fn cmd_lint(inputs: &[String], verbose: bool) -> Result<(), String> {
    let start = Instant::now();
    let mut all_rules = Vec::new();
    let mut total_lines = 0usize;
    let mut total_errors = 0usize;
    let mut total_cosmetic = 0usize;

    for path in inputs {
        let content = read_list(path)?;
        let (rules, stats) = parse_filter_list(&content);

        if verbose {
            println!(
                "  {} - {} lines, {} rules, {} cosmetic, {} skipped",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy(),
                stats.total_lines,
                stats.rules,
                stats.cosmetic,
                stats.errors,
            );
        }

        total_lines += stats.total_lines;
        total_errors += stats.errors;
        total_cosmetic += stats.cosmetic;
        all_rules.extend(rules);
    }

    let opt = optimize_rules(&mut all_rules);

    println!(
        "{} list(s): {} lines -> {} rules ({} deduped, {} badfiltered, {} cosmetic, {} skipped) in {:.1}ms",
        inputs.len(),
        total_lines,
        all_rules.len(),
        opt.deduped,
        opt.badfiltered_rules,
        total_cosmetic,
        total_errors,
        start.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(())
}

fn cmd_match(
    inputs: &[String],
    url: &str,
    source_host: &str,
    resource_type: &str,
    third_party: bool,
    json: bool,
) -> Result<(), String> {
    let mut text = String::new();
    for path in inputs {
        text.push_str(&read_list(path)?);
        text.push('\n');
    }

    let engine = Engine::from_filter_list(&text).map_err(|e| e.to_string())?;
    let result = engine.match_request(url, "", source_host, third_party, resource_type);

    if json {
        let line = serde_json::to_string(&result).map_err(|e| e.to_string())?;
        println!("{line}");
    } else {
        println!(
            "matched={} exception={} important={}",
            result.matched, result.exception, result.important
        );
    }

    Ok(())
}
