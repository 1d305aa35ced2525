// SPDX-License-Identifier: AGPL-3.0-or-later
#![warn(missing_docs, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
//! `TaskMill` — synthetic task-graph benchmark core
//!
//! Materializes families of directed acyclic task graphs with precisely
//! specified topologies, per-task compute kernels and payload sizes,
//! and exercises them through whatever execution backend links against
//! this crate. The point is to put different task-scheduling runtimes
//! on *identical*, reproducible workloads and compare what they do with
//! them.
//!
//! No DAG is ever stored. Topology queries are closed-form functions of
//! the configuration plus a deterministic hash, so graphs scale to
//! billions of tasks for free and every process in a distributed run
//! agrees on every edge without communicating.
//!
//! # Modules
//!
//! - [`rng`] — deterministic hash randomness underneath every random
//!   decision
//! - [`kernel`] — the synthetic kernel catalog (compute, memory, I/O,
//!   imbalance) with contractual FLOP/byte accounting
//! - [`graph`] — closed-form topology queries and the execute-point
//!   primitive
//! - [`output_plan`] — per-task output payload sizing
//! - [`payload`] — the 16-byte record wire format and scratch
//!   preparation
//! - [`config`] — chained `-and` command-line configuration and graph
//!   validation
//! - [`report`] — task/dependency/FLOP/byte accounting and printing
//! - [`error`] — configuration/validation error type
//! - [`validation`] — pass/fail harness for the `validate_*` binaries
//!
//! The `track-execution` cargo feature adds a process-wide bitmask of
//! executed graphs so reporting can fail when a configured graph never
//! ran.
//!
//! # A minimal backend
//!
//! A backend iterates timesteps, collects each task's input buffers
//! from the previous row, and calls
//! [`TaskGraph::execute_point`](graph::TaskGraph::execute_point):
//!
//! ```
//! use taskmill::config::{App, Parsed};
//!
//! let args = ["-steps", "2", "-width", "2", "-type", "stencil_1d"];
//! let Parsed::App(app) = App::parse(&args).unwrap() else {
//!     unreachable!()
//! };
//! let g = &app.graphs[0];
//! let mut row0 = vec![vec![0_u8; 16]; 2];
//! for p in 0..2 {
//!     g.execute_point(0, p, &mut row0[p as usize], &[], &mut []);
//! }
//! let inputs: Vec<&[u8]> = row0.iter().map(Vec::as_slice).collect();
//! let mut out = vec![0_u8; 16];
//! g.execute_point(1, 0, &mut out, &inputs, &mut []);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod kernel;
pub mod output_plan;
pub mod payload;
pub mod report;
pub mod rng;
#[cfg(feature = "track-execution")]
pub mod tracking;
pub mod validation;
