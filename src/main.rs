// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! GG-DISPATCH command line entry point.
//!
//! ## CLI Subcommands
//!
//! - `gg-dispatch-cli demo` - Run the sample queues (default)
//! - `gg-dispatch-cli config show|defaults|validate` - Inspect configuration
//! - `gg-dispatch-cli version` / `help`

use std::process::ExitCode;

use gg_dispatch::cli::{config_cmd, run_demo};
use gg_dispatch::config as dispatch_config;
use gg_dispatch::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("demo");

    match command {
        "demo" | "" => {
            let env = dispatch_config::load();
            if let Err(e) = telemetry::init_logging(&env.log) {
                eprintln!("Logging disabled: {}", e);
            }
            ExitCode::from(run_demo().await as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    ExitCode::from(config_cmd::run_show(json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("gg-dispatch {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "gg-dispatch - request admission and ordering engine v{}

USAGE:
    gg-dispatch-cli [COMMAND] [OPTIONS]

COMMANDS:
    demo         Run the sample queues against the simulated transport (default)
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    GG_DISPATCH_CONFIG        Queue file (TOML)
    GG_DISPATCH_LOG_LEVEL     Log filter (default: info)
    GG_DISPATCH_LOG_FORMAT    json or pretty (default: json)
    GG_DISPATCH_SIM_DELAY_MS  Simulated transport delay (default: 20)

EXIT CODES:
    0  Success
    1  Failure
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "demo" => {
            eprintln!(
                "gg-dispatch-cli demo - Run the sample queues

USAGE:
    gg-dispatch-cli demo

DESCRIPTION:
    Creates a request-mode queue and a response-mode queue, submits a slow
    request followed by a fast one to each, and prints every queue event.
    The request-mode queue sends the second request only after the first
    completes. The response-mode queue sends both at once but runs their
    callbacks in queue order.
"
            );
        }
        "config" => {
            eprintln!(
                "gg-dispatch-cli config - Inspect configuration

USAGE:
    gg-dispatch-cli config show [--json]
    gg-dispatch-cli config defaults
    gg-dispatch-cli config validate

DESCRIPTION:
    show      Print effective values and declared queues
    defaults  Print default environment values
    validate  Check the log filter and the queue file (exit 1 on problems)
"
            );
        }
        _ => {
            eprintln!("No detailed help for '{}'.", command);
            print_usage();
        }
    }
}
