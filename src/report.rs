// SPDX-License-Identifier: AGPL-3.0-or-later
//! Accounting and reporting: task, dependency, FLOP and byte totals.
//!
//! Everything here is derived from the configuration alone, with no
//! runtime telemetry. Task counts come from the per-timestep window widths,
//! dependency counts from the closed-form queries clamped to the
//! previous row, and FLOP/byte totals from the kernel catalog's
//! contractual formulas. With a node count, points are partitioned into
//! contiguous blocks (`point * nodes / width`) and every dependency is
//! split into its local and non-local parts, giving an estimate of the
//! traffic a distributed run would ship.

use crate::config::App;
use crate::graph::TaskGraph;

/// Aggregate totals for an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Tasks across all graphs.
    pub total_tasks: i64,
    /// Dependencies clamped to live points.
    pub total_deps: i64,
    /// Dependencies whose endpoints share a node (only with `nodes > 0`).
    pub local_deps: i64,
    /// Dependencies crossing a node boundary (only with `nodes > 0`).
    pub nonlocal_deps: i64,
    /// FLOPs across all tasks.
    pub flops: i64,
    /// Bytes moved by kernels across all tasks.
    pub bytes: i64,
    /// Estimated bytes shipped between points on the same node.
    pub local_transfer: i64,
    /// Estimated bytes shipped across node boundaries.
    pub nonlocal_transfer: i64,
    /// Node count the estimates were computed for (zero = no estimate).
    pub nodes: i64,
}

impl Report {
    /// Compute the totals for `app`.
    #[must_use]
    pub fn for_app(app: &App) -> Self {
        let mut report = Self {
            nodes: app.nodes,
            ..Self::default()
        };
        for graph in &app.graphs {
            report.add_graph(graph, app.nodes);
        }
        report
    }

    fn add_graph(&mut self, g: &TaskGraph, nodes: i64) {
        for t in 0..g.timesteps {
            let offset = g.offset_at_timestep(t);
            let width = g.width_at_timestep(t);
            let last_offset = g.offset_at_timestep(t - 1);
            let last_width = g.width_at_timestep(t - 1);
            let dset = g.dependence_set_at_timestep(t);

            self.total_tasks += width;

            for p in offset..offset + width {
                self.flops += g
                    .kernel
                    .flops_per_task(g.scratch_bytes_per_task, g.graph_index, t, p);
                self.bytes += g.kernel.bytes_per_task(g.scratch_bytes_per_task);

                // Node-local point range for p under a contiguous
                // block partition.
                let (node_first, node_last) = if nodes > 0 {
                    let node = p * nodes / g.max_width;
                    (node * g.max_width / nodes, (node + 1) * g.max_width / nodes - 1)
                } else {
                    (0, -1)
                };

                for dep in g.dependencies(dset, p) {
                    let live = dep.clamp(last_offset, last_offset + last_width - 1);
                    self.total_deps += live.count();
                    if nodes > 0 {
                        let local = live.clamp(node_first, node_last);
                        let local_count = local.count();
                        self.local_deps += local_count;
                        self.nonlocal_deps += live.count() - local_count;
                        let payload = g.output_bytes_per_task as i64;
                        self.local_transfer += local_count * payload;
                        self.nonlocal_transfer += (live.count() - local_count) * payload;
                    }
                }
            }
        }
    }

    /// Print the totals and rates for a measured elapsed time.
    #[allow(clippy::cast_precision_loss)]
    pub fn print(&self, elapsed_seconds: f64) {
        println!("Total Tasks {}", self.total_tasks);
        println!("Total Dependencies {}", self.total_deps);
        if self.nodes > 0 {
            println!("  Local Dependencies {} (estimated)", self.local_deps);
            println!("  Nonlocal Dependencies {} (estimated)", self.nonlocal_deps);
            println!("  Number of Nodes (used for estimate) {}", self.nodes);
        } else {
            println!("  Unable to estimate local/nonlocal dependencies");
        }
        println!("Total FLOPs {}", self.flops);
        println!("Total Bytes {}", self.bytes);
        println!("Elapsed Time {elapsed_seconds:e} seconds");
        println!("FLOP/s {:e}", self.flops as f64 / elapsed_seconds);
        println!("B/s {:e}", self.bytes as f64 / elapsed_seconds);
        println!("Transfer (estimated):");
        if self.nodes > 0 {
            println!("  Local Bytes {}", self.local_transfer);
            println!("  Nonlocal Bytes {}", self.nonlocal_transfer);
            println!(
                "  Local Bandwidth {:e} B/s",
                self.local_transfer as f64 / elapsed_seconds
            );
            println!(
                "  Nonlocal Bandwidth {:e} B/s",
                self.nonlocal_transfer as f64 / elapsed_seconds
            );
        } else {
            println!("  Unable to estimate local/nonlocal transfer");
        }
    }
}

/// Compute and print the report for `app`.
///
/// # Panics
///
/// With the `track-execution` feature, panics if validation is enabled
/// and some configured graph never executed a task.
pub fn report_timing(app: &App, elapsed_seconds: f64) {
    #[cfg(feature = "track-execution")]
    if app.enable_graph_validation {
        for g in &app.graphs {
            assert!(
                crate::tracking::graph_executed(g.graph_index),
                "graph {} was configured but never executed",
                g.graph_index
            );
        }
    }
    let report = Report::for_app(app);
    report.print(elapsed_seconds);
    #[cfg(feature = "track-execution")]
    println!(
        "Task Graph Execution Mask {:x}",
        crate::tracking::executed_mask()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parsed;

    fn app(args: &[&str]) -> App {
        match App::parse(args).expect("parse") {
            Parsed::App(app) => app,
            Parsed::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn stencil_totals() {
        let report = Report::for_app(&app(&["-steps", "4", "-width", "4", "-type", "stencil_1d"]));
        assert_eq!(report.total_tasks, 16);
        // Row 0 has no previous row; rows 1..4 each have 3+3+3+... per
        // point pattern: interior points 3 deps, edge points 2.
        // Width 4: 2 + 3 + 3 + 2 = 10 per row, 3 rows.
        assert_eq!(report.total_deps, 30);
    }

    #[test]
    fn trivial_has_no_deps() {
        let report = Report::for_app(&app(&["-steps", "5", "-width", "3"]));
        assert_eq!(report.total_tasks, 15);
        assert_eq!(report.total_deps, 0);
    }

    #[test]
    fn all_to_all_deps_square() {
        let report = Report::for_app(&app(&["-steps", "3", "-width", "4", "-type", "all_to_all"]));
        // 2 rows with deps, each point sees the whole previous row.
        assert_eq!(report.total_deps, 2 * 4 * 4);
    }

    #[test]
    fn dom_tasks_follow_window() {
        let report = Report::for_app(&app(&["-steps", "6", "-width", "4", "-type", "dom"]));
        // widths: 1, 2, 3, 3, 2, 1
        assert_eq!(report.total_tasks, 12);
    }

    #[test]
    fn node_split_partitions_all_deps() {
        let report = Report::for_app(&app(&[
            "-steps", "4", "-width", "8", "-type", "stencil_1d", "-nodes", "2",
        ]));
        assert_eq!(report.local_deps + report.nonlocal_deps, report.total_deps);
        assert!(report.nonlocal_deps > 0, "stencil crosses the node seam");
        assert_eq!(
            report.local_transfer + report.nonlocal_transfer,
            report.total_deps * 16
        );
    }

    #[test]
    fn single_node_sees_everything_local() {
        let report = Report::for_app(&app(&[
            "-steps", "4", "-width", "8", "-type", "stencil_1d", "-nodes", "1",
        ]));
        assert_eq!(report.nonlocal_deps, 0);
        assert_eq!(report.local_deps, report.total_deps);
    }

    #[test]
    fn compute_bound_flops() {
        let report = Report::for_app(&app(&[
            "-steps", "2", "-width", "2", "-kernel", "compute_bound", "-iter", "10",
        ]));
        assert_eq!(report.flops, 4 * (2 * 64 * 10 + 64));
        assert_eq!(report.bytes, 0);
    }

    #[test]
    fn memory_bound_bytes() {
        let report = Report::for_app(&app(&[
            "-steps", "2", "-width", "2", "-kernel", "memory_bound", "-scratch", "1024",
            "-iter", "32", "-sample", "4",
        ]));
        assert_eq!(report.bytes, 4 * (1024 * 32 / 4));
        assert_eq!(report.flops, 0);
    }

    #[test]
    fn load_imbalance_flops_are_deterministic() {
        let args = [
            "-steps", "3", "-width", "5", "-kernel", "load_imbalance", "-iter", "100",
            "-imbalance", "1.0",
        ];
        let a = Report::for_app(&app(&args));
        let b = Report::for_app(&app(&args));
        assert_eq!(a.flops, b.flops);
        assert!(a.flops > 0);
    }
}
