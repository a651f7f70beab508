// SPDX-License-Identifier: BUSL-1.1
//! # tollgate CLI
//!
//! Subcommand handlers for the `tollgate` binary:
//!
//! - `serve` — assemble the policy gate, payment rail, and engine, and run
//!   the HTTP API server.
//! - `run` — drive a single action through the execute → 402 → pay
//!   handshake against a running server.

pub mod run;
pub mod serve;
