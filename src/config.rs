// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command-line configuration: chained graph definitions and validation.
//!
//! An application is configured from a flat argument list. Each graph
//! starts from the default configuration and accumulates flags until an
//! `-and` token closes it and opens the next one, so a single command
//! line can describe a whole family of graphs:
//!
//! ```text
//! -steps 1000 -width 64 -type stencil_1d -kernel compute_bound -iter 1024 \
//!   -and -steps 1000 -width 64 -type fft -kernel memory_bound -scratch 65536
//! ```
//!
//! Unrecognized tokens are skipped without complaint: the same argv is
//! usually shared with a host runtime (MPI launchers, threading
//! runtimes) that has flags of its own.
//!
//! Parsing is strict about values, and [`App::check`] then proves every
//! graph structurally sound before anything runs: period rules, scratch
//! alignment, per-timestep window invariants, and an exhaustive
//! dependency ↔ reverse-dependency cross-check (skippable with
//! `-skip-graph-validation` for very wide graphs).

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::graph::{Dependence, TaskGraph};
use crate::kernel::{DistKind, Kernel, KernelKind};
use crate::output_plan::assign_output_sizes;
use crate::payload::RECORD_BYTES;

/// A fully configured application: an ordered list of task graphs plus
/// application-wide options.
#[derive(Debug, Clone)]
pub struct App {
    /// Graphs in command-line order; `graph_index` matches position.
    pub graphs: Vec<TaskGraph>,
    /// Node count used to estimate local/non-local dependency splits
    /// (zero disables the estimate).
    pub nodes: i64,
    /// Verbosity: 0 quiet, 1 adds per-timestep dependencies, 2 adds
    /// reverse dependencies.
    pub verbose: u32,
    /// Whether the expensive graph cross-validation (and the
    /// executed-graph accounting, when compiled in) is enabled.
    pub enable_graph_validation: bool,
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum Parsed {
    /// A validated application, ready to run.
    App(App),
    /// `-h` was present; print [`help_text`] and exit cleanly.
    Help,
}

/// Default graph configuration, before any flags apply.
fn default_graph(graph_index: i64) -> TaskGraph {
    TaskGraph {
        graph_index,
        timesteps: 4,
        max_width: 4,
        dependence: Dependence::Trivial,
        radix: 3,
        period: -1, // sentinel: resolved when the graph is closed
        fraction_connected: 0.25,
        kernel: Kernel::default(),
        output_bytes_per_task: RECORD_BYTES,
        scratch_bytes_per_task: 0,
        nb_fields: 0, // sentinel: defaults to timesteps
        output_case: 0,
        onormal_mu: 2.0,
        onormal_std: 2.0,
        ogamma_alpha: 2.0,
        ogamma_beta: 2.0,
        output_sizes: Vec::new(),
    }
}

fn value<'a, S: AsRef<str>>(args: &'a [S], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(|token| token.as_ref())
        .ok_or_else(|| Error::Config(format!("flag \"{flag}\" requires an argument")))
}

fn parse_i64<S: AsRef<str>>(args: &[S], i: &mut usize, flag: &str) -> Result<i64> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| Error::Config(format!("flag \"{flag} {raw}\" is not an integer")))
}

fn parse_f64<S: AsRef<str>>(args: &[S], i: &mut usize, flag: &str) -> Result<f64> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| Error::Config(format!("flag \"{flag} {raw}\" is not a number")))
}

fn require(ok: bool, flag: &str, shown: impl std::fmt::Display, rule: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid flag \"{flag} {shown}\" must be {rule}"
        )))
    }
}

/// Close the current graph: resolve the period sentinel.
fn close_graph(mut graph: TaskGraph) -> TaskGraph {
    if graph.period < 0 {
        graph.period = if graph.dependence.needs_period() { 3 } else { 0 };
    }
    graph
}

impl App {
    /// Parse an argument list into a validated application.
    ///
    /// The program name must already be stripped (pass
    /// `std::env::args().skip(1)` collected, or any slice of tokens).
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for malformed flags or out-of-range values,
    /// [`Error::Validation`] when a configured graph is structurally
    /// unsound.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Parsed> {
        let mut app = Self {
            graphs: Vec::new(),
            nodes: 0,
            verbose: 0,
            enable_graph_validation: true,
        };
        let mut graph = default_graph(0);

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_ref();
            match flag {
                "-h" => return Ok(Parsed::Help),
                "-v" => app.verbose += 1,
                "-vv" => app.verbose += 2,
                "-skip-graph-validation" => app.enable_graph_validation = false,
                "-nodes" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    app.nodes = v;
                }
                "-steps" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.timesteps = v;
                }
                "-width" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.max_width = v;
                }
                "-type" => {
                    let name = value(args, &mut i, flag)?;
                    graph.dependence = Dependence::from_name(name).ok_or_else(|| {
                        Error::Config(format!("invalid flag \"{flag} {name}\""))
                    })?;
                }
                "-radix" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v >= 0, flag, v, ">= 0")?;
                    graph.radix = v;
                }
                "-period" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v >= 0, flag, v, ">= 0")?;
                    graph.period = v;
                }
                "-fraction" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require((0.0..=1.0).contains(&v), flag, v, ">= 0 and <= 1")?;
                    graph.fraction_connected = v;
                }
                "-kernel" => {
                    let name = value(args, &mut i, flag)?;
                    graph.kernel.kind = KernelKind::from_name(name).ok_or_else(|| {
                        Error::Config(format!("invalid flag \"{flag} {name}\""))
                    })?;
                }
                "-iter" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v >= 0, flag, v, ">= 0")?;
                    graph.kernel.iterations = v;
                }
                "-output" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(
                        v >= RECORD_BYTES as i64,
                        flag,
                        v,
                        &format!(">= {RECORD_BYTES}"),
                    )?;
                    graph.output_bytes_per_task = v as usize;
                }
                "-scratch" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v >= 0, flag, v, ">= 0")?;
                    graph.scratch_bytes_per_task = v as usize;
                }
                "-sample" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v >= 0, flag, v, ">= 0")?;
                    graph.kernel.samples = v;
                }
                "-imbalance" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require((0.0..=2.0).contains(&v), flag, v, ">= 0 and <= 2")?;
                    graph.kernel.imbalance = v;
                }
                "-mem-fraction" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require((0.0..=1.0).contains(&v), flag, v, ">= 0 and <= 1")?;
                    graph.kernel.fraction_mem = v;
                }
                "-dist" => {
                    let name = value(args, &mut i, flag)?;
                    graph.kernel.dist.kind = DistKind::from_name(name).ok_or_else(|| {
                        Error::Config(format!("invalid flag \"{flag} {name}\""))
                    })?;
                }
                "-dist-max" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.kernel.dist.max = v;
                }
                "-dist-std" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.kernel.dist.std_dev = v;
                }
                "-dist-alpha" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.kernel.dist.alpha = v;
                }
                "-dist-beta" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require(v > 0.0, flag, v, "> 0")?;
                    graph.kernel.dist.beta = v;
                }
                "-field" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require(v > 0, flag, v, "> 0")?;
                    graph.nb_fields = v;
                }
                "-output-case" => {
                    let v = parse_i64(args, &mut i, flag)?;
                    require((0..=3).contains(&v), flag, v, "between 0 and 3")?;
                    graph.output_case = v;
                }
                "-output-mean" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require(v >= 0.0, flag, v, ">= 0")?;
                    graph.onormal_mu = v;
                }
                "-output-std" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require(v >= 0.0, flag, v, ">= 0")?;
                    graph.onormal_std = v;
                }
                "-output-gamma-a" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require(v > 0.0, flag, v, "> 0")?;
                    graph.ogamma_alpha = v;
                }
                "-output-gamma-b" => {
                    let v = parse_f64(args, &mut i, flag)?;
                    require(v > 0.0, flag, v, "> 0")?;
                    graph.ogamma_beta = v;
                }
                "-and" => {
                    app.graphs.push(close_graph(graph));
                    graph = default_graph(app.graphs.len() as i64);
                }
                // Foreign tokens (host-runtime flags) pass through.
                _ => {}
            }
            i += 1;
        }
        app.graphs.push(close_graph(graph));

        for g in &mut app.graphs {
            if g.nb_fields == 0 {
                g.nb_fields = g.timesteps;
            }
            assign_output_sizes(g);
        }

        app.check()?;
        Ok(Parsed::App(app))
    }

    /// Validate every graph: period rules, scratch alignment, window
    /// invariants, and (unless disabled) the full dependency ↔
    /// reverse-dependency cross-check.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming the graph and the violated
    /// property.
    pub fn check(&self) -> Result<()> {
        for g in &self.graphs {
            let name = g.dependence.name();
            let gi = g.graph_index;
            if g.dependence.needs_period() && g.period == 0 {
                return Err(Error::Validation(format!(
                    "graph {gi}: type \"{name}\" requires a non-zero period \
                     (specify with -period)"
                )));
            }
            if !g.dependence.needs_period() && g.period != 0 {
                return Err(Error::Validation(format!(
                    "graph {gi}: type \"{name}\" does not support a user-configurable period"
                )));
            }
            // Later dependence sets must not wrap into each other.
            if g.dependence == Dependence::Spread && g.radix > 0 {
                let spread = (g.max_width + g.radix - 1) / g.radix;
                if g.period > spread {
                    return Err(Error::Validation(format!(
                        "graph {gi}: type \"{name}\" requires a period that is at most {spread}"
                    )));
                }
            }
            if g.scratch_bytes_per_task % 8 != 0 {
                return Err(Error::Validation(format!(
                    "graph {gi}: scratch bytes {} must be a multiple of 8",
                    g.scratch_bytes_per_task
                )));
            }
            if g.kernel.kind.uses_samples() && g.kernel.samples <= 0 {
                return Err(Error::Validation(format!(
                    "graph {gi}: kernel \"{}\" requires -sample > 0",
                    g.kernel.kind
                )));
            }
            if g.kernel.kind == KernelKind::DistImbalance {
                check_dist(g)?;
            }

            for t in 0..g.timesteps {
                let offset = g.offset_at_timestep(t);
                let width = g.width_at_timestep(t);
                if offset < 0 || width < 0 || offset + width > g.max_width {
                    return Err(Error::Validation(format!(
                        "graph {gi}: window [{offset}, {}) at timestep {t} escapes \
                         width {}",
                        offset + width,
                        g.max_width
                    )));
                }
                let dset = g.dependence_set_at_timestep(t);
                if dset < 0 || dset >= g.max_dependence_sets() {
                    return Err(Error::Validation(format!(
                        "graph {gi}: dependence set {dset} at timestep {t} outside \
                         [0, {})",
                        g.max_dependence_sets()
                    )));
                }
            }

            if self.enable_graph_validation {
                check_symmetry(g)?;
            }
        }
        Ok(())
    }

    /// Print the configuration, with per-timestep dependency dumps at
    /// higher verbosity.
    pub fn display(&self) {
        println!("Running task-graph benchmark");
        println!("  Configuration:");
        for (n, g) in self.graphs.iter().enumerate() {
            println!("    Task Graph {}:", n + 1);
            println!("      Time Steps: {}", g.timesteps);
            println!("      Max Width: {}", g.max_width);
            println!("      Dependence Type: {}", g.dependence);
            println!("      Radix: {}", g.radix);
            println!("      Period: {}", g.period);
            println!("      Fraction Connected: {:.6}", g.fraction_connected);
            println!("      Kernel:");
            println!("        Type: {}", g.kernel.kind);
            println!("        Iterations: {}", g.kernel.iterations);
            println!("        Samples: {}", g.kernel.samples);
            println!("        Imbalance: {:.6}", g.kernel.imbalance);
            println!("      Output Bytes: {}", g.output_bytes_per_task);
            println!("      Scratch Bytes: {}", g.scratch_bytes_per_task);

            if self.verbose > 0 {
                self.display_timesteps(g);
            }
        }
    }

    fn display_timesteps(&self, g: &TaskGraph) {
        for t in 0..g.timesteps {
            let offset = g.offset_at_timestep(t);
            let width = g.width_at_timestep(t);
            let last_offset = g.offset_at_timestep(t - 1);
            let last_width = g.width_at_timestep(t - 1);
            let dset = g.dependence_set_at_timestep(t);

            println!(
                "      Timestep {t} (offset {offset}, width {width}, last offset \
                 {last_offset}, last width {last_width}):"
            );
            let points: Vec<String> = (offset..offset + width).map(|p| p.to_string()).collect();
            println!("        Points: {}", points.join(" "));

            println!("        Dependencies:");
            for p in offset..offset + width {
                let deps: Vec<String> = g
                    .dependencies(dset, p)
                    .iter()
                    .flat_map(|i| i.points())
                    .filter(|&d| d >= last_offset && d < last_offset + last_width)
                    .map(|d| d.to_string())
                    .collect();
                println!("          Point {p}: {}", deps.join(" "));
            }
            if self.verbose > 1 {
                println!("        Reverse Dependencies:");
                for p in last_offset..last_offset + last_width {
                    let rdeps: Vec<String> = g
                        .reverse_dependencies(dset, p)
                        .iter()
                        .flat_map(|i| i.points())
                        .filter(|&d| d >= offset && d < offset + width)
                        .map(|d| d.to_string())
                        .collect();
                    println!("          Point {p}: {}", rdeps.join(" "));
                }
            }
        }
    }
}

/// Sanity-check the `dist_imbalance` distribution parameters.
fn check_dist(g: &TaskGraph) -> Result<()> {
    let gi = g.graph_index;
    let dist = g.kernel.dist;
    match dist.kind {
        DistKind::Uniform if dist.max < g.kernel.iterations => Err(Error::Validation(format!(
            "graph {gi}: uniform distribution requires a maximum no smaller than the \
             minimum given to -iter"
        ))),
        DistKind::Normal if dist.std_dev <= 0 => Err(Error::Validation(format!(
            "graph {gi}: normal distribution requires a standard deviation greater \
             than 0 (-dist-std)"
        ))),
        DistKind::Gamma if dist.alpha <= 0 => Err(Error::Validation(format!(
            "graph {gi}: gamma distribution requires a shape greater than 0 (-dist-alpha)"
        ))),
        DistKind::Cauchy if dist.beta <= 0.0 => Err(Error::Validation(format!(
            "graph {gi}: cauchy distribution requires a scale greater than 0 (-dist-beta)"
        ))),
        _ => Ok(()),
    }
}

/// Materialize each dependence set in both directions and prove that
/// the two relations mirror each other exactly, with no duplicate
/// edges on either side.
fn check_symmetry(g: &TaskGraph) -> Result<()> {
    let gi = g.graph_index;
    for dset in 0..g.max_dependence_sets() {
        let mut forward: HashMap<i64, HashSet<i64>> = HashMap::new();
        for point in 0..g.max_width {
            let entry = forward.entry(point).or_default();
            for interval in g.dependencies(dset, point) {
                for dep in interval.points() {
                    if !entry.insert(dep) {
                        return Err(Error::Validation(format!(
                            "graph {gi}: duplicate dependency {dep} of point {point} \
                             in dependence set {dset}"
                        )));
                    }
                }
            }
        }
        let mut reverse: HashMap<i64, HashSet<i64>> = HashMap::new();
        for point in 0..g.max_width {
            let entry = reverse.entry(point).or_default();
            for interval in g.reverse_dependencies(dset, point) {
                for rdep in interval.points() {
                    if !entry.insert(rdep) {
                        return Err(Error::Validation(format!(
                            "graph {gi}: duplicate reverse dependency {rdep} of point \
                             {point} in dependence set {dset}"
                        )));
                    }
                    if !forward.get(&rdep).is_some_and(|deps| deps.contains(&point)) {
                        return Err(Error::Validation(format!(
                            "graph {gi}: reverse edge {point} -> {rdep} has no forward \
                             counterpart in dependence set {dset}"
                        )));
                    }
                }
            }
        }
        for (point, deps) in &forward {
            for dep in deps {
                if !reverse.get(dep).is_some_and(|rdeps| rdeps.contains(point)) {
                    return Err(Error::Validation(format!(
                        "graph {gi}: forward edge {dep} -> {point} has no reverse \
                         counterpart in dependence set {dset}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Help text for the `-h` flag.
#[must_use]
pub fn help_text(program: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{program}: a task-graph benchmark");
    let _ = writeln!(out, "\nGeneral options:");
    let _ = writeln!(out, "  {:<18} show this help message and exit", "-h");
    let _ = writeln!(
        out,
        "  {:<18} number of nodes to use for estimating transfer statistics",
        "-nodes [INT]"
    );
    let _ = writeln!(out, "  {:<18} enable verbose output", "-v");
    let _ = writeln!(out, "  {:<18} enable extra verbose output", "-vv");
    let _ = writeln!(out, "\nOptions for configuring the task graph:");
    let _ = writeln!(out, "  {:<18} height of task graph", "-steps [INT]");
    let _ = writeln!(out, "  {:<18} width of task graph", "-width [INT]");
    let _ = writeln!(
        out,
        "  {:<18} dependency pattern (see available list below)",
        "-type [DEP]"
    );
    let _ = writeln!(
        out,
        "  {:<18} radix of dependency pattern (only for nearest, spread, and random)",
        "-radix [INT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} period of dependency pattern (only for spread and random)",
        "-period [INT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} fraction of connected dependencies (only for random)",
        "-fraction [FLOAT]"
    );
    let _ = writeln!(out, "  {:<18} start configuring the next task graph", "-and");
    let _ = writeln!(out, "\nOptions for configuring kernels:");
    let _ = writeln!(
        out,
        "  {:<18} kernel type (see available list below)",
        "-kernel [KERNEL]"
    );
    let _ = writeln!(out, "  {:<18} number of iterations", "-iter [INT]");
    let _ = writeln!(out, "  {:<18} output bytes per task", "-output [INT]");
    let _ = writeln!(
        out,
        "  {:<18} scratch bytes per task (only for memory-bound kernels)",
        "-scratch [INT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} number of samples (only for memory-bound kernels)",
        "-sample [INT]"
    );
    let _ = writeln!(out, "  {:<18} amount of load imbalance", "-imbalance [FLOAT]");
    let _ = writeln!(
        out,
        "  {:<18} fraction of memory iterations (only for compute_memory)",
        "-mem-fraction [FLOAT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} distribution type (see available list below)",
        "-dist [DIST]"
    );
    let _ = writeln!(out, "\nOptions for configuring output sizes:");
    let _ = writeln!(
        out,
        "  {:<18} output size distribution case (0-3)",
        "-output-case [INT]"
    );
    let _ = writeln!(out, "  {:<18} mean for output case 1", "-output-mean [FLOAT]");
    let _ = writeln!(
        out,
        "  {:<18} deviation for output case 1",
        "-output-std [FLOAT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} gamma shape (accepted; case 3 samples a fixed Gamma(2, 2))",
        "-output-gamma-a [FLOAT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} gamma scale (accepted; case 3 samples a fixed Gamma(2, 2))",
        "-output-gamma-b [FLOAT]"
    );
    let _ = writeln!(out, "\nSupported dependency patterns:");
    for name in Dependence::NAMES {
        let _ = writeln!(out, "  {name}");
    }
    let _ = writeln!(out, "\nSupported kernel types:");
    for name in KernelKind::NAMES {
        let _ = writeln!(out, "  {name}");
    }
    let _ = writeln!(out, "\nSupported distribution types:");
    for name in DistKind::NAMES {
        let _ = writeln!(out, "  {name}");
    }
    let _ = writeln!(out, "\nSupported distribution parameters:");
    for name in ["-dist-max", "-dist-std", "-dist-alpha", "-dist-beta"] {
        let _ = writeln!(out, "  {name}");
    }
    let _ = writeln!(out, "\nLess frequently used options:");
    let _ = writeln!(
        out,
        "  {:<18} number of fields (buffer-rotation depth for some backends)",
        "-field [INT]"
    );
    let _ = writeln!(
        out,
        "  {:<18} skip the expensive task-graph cross-validation",
        "-skip-graph-validation"
    );
    out
}
