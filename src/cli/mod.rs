// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for GG-DISPATCH commands.
//!
//! ## Usage
//!
//! ```bash
//! gg-dispatch-cli demo             # Run the sample scenarios
//! gg-dispatch-cli config show      # Print effective configuration
//! gg-dispatch-cli config validate  # Check the queue file
//! ```

pub mod config_cmd;
pub mod demo;

pub use demo::{run_demo, run_scenarios, DemoError, ScenarioReport};
