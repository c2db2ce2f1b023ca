//! Sage CLI - interactive front end for the optimization engine.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use sage::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sage=warn")),
        )
        .init();

    println!("Sage Query Optimizer v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for available commands, 'exit' to quit.\n");

    let engine = OptimizationEngine::with_defaults();
    let mut session = Session::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("sage> ");
        if stdout.flush().is_err() {
            break; // Output stream closed
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break, // EOF or read error
            Ok(_) => {}
        }

        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" | ".exit" | ".quit" => {
                println!("Goodbye!");
                break;
            }
            "help" | ".help" => {
                print_help();
                continue;
            }
            ".metrics" => {
                print_metrics(&engine);
                continue;
            }
            ".cache" => {
                let stats = engine.cache_stats();
                println!(
                    "  entries: {}  hits: {}  misses: {}  hit rate: {:.1}%",
                    stats.total_entries,
                    stats.hits,
                    stats.misses,
                    stats.hit_rate() * 100.0
                );
                println!(
                    "  evictions: {}  expirations: {}",
                    stats.evictions, stats.expirations
                );
                continue;
            }
            ".clear" => {
                engine.clear_cache();
                println!("Cache cleared.");
                continue;
            }
            ".json" => {
                session.json_output = !session.json_output;
                println!(
                    "JSON output {}.",
                    if session.json_output { "on" } else { "off" }
                );
                continue;
            }
            ".tables" => {
                if session.tables.is_empty() {
                    println!("No table statistics registered.");
                } else {
                    for table in &session.tables {
                        println!("  {} ({} rows)", table.table_name, table.row_count);
                    }
                }
                continue;
            }
            _ => {}
        }

        // Handle parameterized commands
        if input.starts_with(".level") {
            let parts: Vec<&str> = input.split_whitespace().collect();
            if parts.len() == 2 {
                match OptimizationLevel::from_str(parts[1]) {
                    Ok(level) => {
                        session.level = level;
                        println!("Optimization level set to {}.", level);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            } else {
                println!("Usage: .level <basic|intermediate|standard|advanced|aggressive|1-5>");
            }
            continue;
        }

        if input.starts_with(".stats") {
            let parts: Vec<&str> = input.split_whitespace().collect();
            if parts.len() == 3 {
                match parts[2].parse::<u64>() {
                    Ok(rows) => {
                        let name = parts[1].to_string();
                        session.tables.retain(|t| t.table_name != name);
                        session.tables.push(TableStatistics::new(name.clone(), rows));
                        println!("Registered statistics for '{}'.", name);
                    }
                    Err(_) => println!("Error: row count must be an integer"),
                }
            } else {
                println!("Usage: .stats <table_name> <row_count>");
            }
            continue;
        }

        if input.starts_with(".dbtype") {
            let parts: Vec<&str> = input.split_whitespace().collect();
            if parts.len() == 2 {
                session.database_type = parts[1].to_string();
                println!("Database type set to '{}'.", session.database_type);
            } else {
                println!("Usage: .dbtype <database_type>");
            }
            continue;
        }

        // Optimize SQL
        let request = OptimizationRequest::new(input, &session.database_type)
            .with_level(session.level)
            .with_table_statistics(session.tables.clone());

        let response = engine.optimize_blocking(&request);
        print_response(&response, session.json_output);
    }

    Ok(())
}

/// REPL state that shapes the next optimization request.
struct Session {
    level: OptimizationLevel,
    database_type: String,
    tables: Vec<TableStatistics>,
    json_output: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            level: OptimizationLevel::default(),
            database_type: "generic".to_string(),
            tables: Vec::new(),
            json_output: false,
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .stats <table> <rows>  - Register table statistics");
    println!("  .tables                - List registered table statistics");
    println!("  .level <level>         - Set optimization level (basic..aggressive or 1-5)");
    println!("  .dbtype <type>         - Set the database type tag");
    println!("  .metrics               - Show engine metrics");
    println!("  .cache                 - Show cache statistics");
    println!("  .clear                 - Clear the response cache");
    println!("  .json                  - Toggle JSON output");
    println!("  exit, quit             - Exit the CLI");
    println!();
    println!("Any other input is optimized as SQL:");
    println!("  SELECT * FROM orders;");
    println!("  SELECT id FROM a JOIN b ON a.id = b.a_id;");
}

fn print_metrics(engine: &OptimizationEngine) {
    let metrics = engine.metrics();
    println!(
        "  requests: {}  ok: {}  failed: {}  success rate: {:.1}%",
        metrics.total_requests,
        metrics.successes,
        metrics.failures,
        metrics.success_rate() * 100.0
    );
    println!(
        "  cache hits: {}  timeouts: {}  avg latency: {} ms",
        metrics.cache_hits,
        metrics.timeouts,
        metrics.average_latency().as_millis()
    );
    if !metrics.applied_optimizations.is_empty() {
        println!("  applied optimizations:");
        for (ty, count) in &metrics.applied_optimizations {
            println!("    {}: {}", ty, count);
        }
    }
}

fn print_response(response: &OptimizationResponse, json_output: bool) {
    if json_output {
        match serde_json::to_string_pretty(response) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("Error: {}", e),
        }
        return;
    }

    println!("{}", response.summary());
    if let Some(ref plan) = response.execution_plan {
        println!("\nExecution plan:");
        for line in plan.render().lines() {
            println!("  {}", line);
        }
        if !plan.recommendations.is_empty() {
            println!("Recommendations:");
            for recommendation in &plan.recommendations {
                println!("  - {}", recommendation);
            }
        }
    }
}
