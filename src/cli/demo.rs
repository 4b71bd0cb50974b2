// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `demo` subcommand: runs two sample queues against the simulated
//! transport and prints every queue event.
//!
//! - `serial`: fifo, request mode. `A` (slow) is dispatched first and `B`
//!   only after `A` completes.
//! - `ordered`: fifo, response mode. Both are dispatched at once; `B`
//!   completes first but its callbacks wait for `A`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config;
use crate::engine::{Engine, EngineError, SimulatedTransport};
use crate::scheduler::{Mode, QueueCounters, QueueEvent, QueueSettings, RequestSettings};

/// Errors raised while running the demo.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Queue '{0}' did not finish in time")]
    Timeout(String),
}

/// Events and final counters of one demo queue.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub queue: String,
    pub events: Vec<String>,
    pub counters: QueueCounters,
}

struct Scenario {
    settings: QueueSettings,
    requests: [(&'static str, u64); 2],
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            settings: QueueSettings::new("serial").mode(Mode::Request),
            requests: [("A", 40), ("B", 10)],
        },
        Scenario {
            settings: QueueSettings::new("ordered").mode(Mode::Response),
            requests: [("A", 60), ("B", 10)],
        },
    ]
}

fn describe(event: &QueueEvent) -> String {
    match event.request() {
        Some(request) => {
            let name = request.payload()["name"].as_str().unwrap_or("?");
            format!("{} {}", event.name(), name)
        }
        None => event.name().to_string(),
    }
}

/// Run every scenario concurrently on `engine` and wait for each queue to
/// report `allProcessed`.
pub async fn run_scenarios(engine: &Engine, limit: Duration) -> Result<Vec<ScenarioReport>, DemoError> {
    let mut pending = Vec::new();
    for scenario in scenarios() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));
        let log = Arc::clone(&events);
        let queue = engine.create_queue(scenario.settings.with_listener(move |_, event| {
            log.lock().push(describe(event));
            if matches!(event, QueueEvent::AllProcessed) {
                if let Some(tx) = done_tx.lock().take() {
                    let _ = tx.send(());
                }
            }
        }))?;
        for (name, sleep) in scenario.requests {
            engine.submit(RequestSettings::new(json!({ "name": name, "sleep": sleep })).with_queue(&queue))?;
        }
        pending.push(async move {
            let finished = tokio::time::timeout(limit, done_rx).await;
            match finished {
                Ok(Ok(())) => Ok(ScenarioReport {
                    queue: queue.id().to_string(),
                    events: events.lock().clone(),
                    counters: queue.counters(),
                }),
                _ => Err(DemoError::Timeout(queue.id().to_string())),
            }
        });
    }
    futures::future::join_all(pending).await.into_iter().collect()
}

/// Entry point for `gg-dispatch-cli demo`.
pub async fn run_demo() -> i32 {
    let env = config::load();
    let transport = Arc::new(SimulatedTransport::new(env.simulated_delay));
    let engine = match Engine::new(transport) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 1;
        }
    };
    match run_scenarios(&engine, Duration::from_secs(10)).await {
        Ok(reports) => {
            for report in reports {
                println!("[{}]", report.queue);
                for event in &report.events {
                    println!("  {}", event);
                }
                println!(
                    "  -> added={} sent={} processed={}",
                    report.counters.added, report.counters.sent, report.counters.processed
                );
            }
            0
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            1
        }
    }
}
