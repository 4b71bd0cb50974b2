// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These read `GG_DISPATCH_*` environment variables and the queue file they
//! point at; no engine is started.

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config to stdout. Returns 1 if the queue file is invalid.
pub fn run_show(json: bool) -> i32 {
    match config::load().effective_config() {
        Ok(cfg) if json => match serde_json::to_string_pretty(&cfg) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Failed to serialize config: {}", e);
                1
            }
        },
        Ok(cfg) => {
            print_config(&cfg);
            0
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            1
        }
    }
}

/// Print default values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("GG_DISPATCH_CONFIG=");
    println!("GG_DISPATCH_LOG_LEVEL=info");
    println!("GG_DISPATCH_LOG_FORMAT=json");
    println!("GG_DISPATCH_SIM_DELAY_MS=20");
}

/// Validate the queue file and logging settings.
///
/// Returns 0 if valid, 1 on any error or warning.
pub fn run_validate() -> i32 {
    let findings = validate(&config::load());
    if findings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        for finding in &findings {
            eprintln!("{}", finding);
        }
        1
    }
}

fn validate(env: &EnvConfig) -> Vec<String> {
    let mut findings = Vec::new();
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&env.log.level) {
        findings.push(format!("WARNING: GG_DISPATCH_LOG_LEVEL is not a valid filter: {}", e));
    }
    match env.engine_config() {
        Ok(engine) => {
            if env.config_path.is_some() && engine.queues.is_empty() {
                findings.push("WARNING: queue file declares no queues".to_string());
            }
        }
        Err(e) => findings.push(format!("ERROR: {}", e)),
    }
    findings
}

fn print_config(cfg: &EffectiveConfig) {
    let path = cfg.config_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    println!("GG_DISPATCH_CONFIG={}", path);
    println!("GG_DISPATCH_LOG_LEVEL={}", cfg.log_level);
    println!("GG_DISPATCH_LOG_FORMAT={}", cfg.log_format);
    println!("GG_DISPATCH_SIM_DELAY_MS={}", cfg.simulated_delay_ms);
    for queue in &cfg.queues {
        println!(
            "queue {} order={} priority={} mode={} enabled={}",
            queue.id, queue.order, queue.priority, queue.mode, queue.enabled
        );
    }
}
