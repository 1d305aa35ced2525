// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task graph model: closed-form topology queries and point execution.
//!
//! A [`TaskGraph`] never materializes its DAG. Every query (the live
//! point range at a timestep, the dependence set in force, the forward
//! or reverse dependencies of a point) is computed on demand from the
//! configuration, so a graph of a billion tasks costs the same to
//! describe as a graph of sixteen. Random patterns stay closed-form by
//! hashing the edge coordinates through [`crate::rng::random_uniform`]:
//! the forward decision for edge a→b and the reverse decision for b→a
//! consult the same hash key, which is what makes the two sides of the
//! relation agree without ever exchanging state.
//!
//! [`TaskGraph::execute_point`] is the single execution primitive every
//! backend calls: it validates the task's inputs record-by-record,
//! stamps the output payload, and dispatches the configured kernel.
//! Validation failures are fatal. A wrong record means the host runtime
//! delivered the wrong buffer, and there is nothing sensible to do but
//! stop and name the task.

use std::fmt;

use crate::kernel::Kernel;
use crate::payload::{RECORD_BYTES, decode_record, fill_output, scratch_is_prepared};
use crate::rng::random_uniform;

/// Dependence patterns. Each pattern defines, per timestep, which
/// points of the previous timestep feed each point of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependence {
    /// No edges at all.
    Trivial,
    /// Each point depends only on itself.
    NoComm,
    /// Three-point stencil clipped at the edges.
    Stencil1D,
    /// Three-point stencil with wrap-around.
    Stencil1DPeriodic,
    /// Diamond DAG: the live window narrows toward both ends.
    Dom,
    /// Binary-tree parent edges.
    Tree,
    /// Butterfly exchange, stride doubling with the dependence set.
    Fft,
    /// Every point depends on the whole previous row.
    AllToAll,
    /// A `radix`-wide window centred on the point.
    Nearest,
    /// `radix` singletons spread evenly across the row, rotating with
    /// the dependence set.
    Spread,
    /// `nearest` window with each candidate edge kept at probability
    /// `fraction_connected` (self-edge always kept).
    RandomNearest,
    /// Mirror image of `random_nearest`: the same random relation
    /// queried from the consumer side.
    RandomSpread,
}

impl Dependence {
    /// All pattern names, in the order shown by help output.
    pub const NAMES: [&'static str; 12] = [
        "trivial",
        "no_comm",
        "stencil_1d",
        "stencil_1d_periodic",
        "dom",
        "tree",
        "fft",
        "all_to_all",
        "nearest",
        "spread",
        "random_nearest",
        "random_spread",
    ];

    /// Parse a pattern name as written on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "trivial" => Some(Self::Trivial),
            "no_comm" => Some(Self::NoComm),
            "stencil_1d" => Some(Self::Stencil1D),
            "stencil_1d_periodic" => Some(Self::Stencil1DPeriodic),
            "dom" => Some(Self::Dom),
            "tree" => Some(Self::Tree),
            "fft" => Some(Self::Fft),
            "all_to_all" => Some(Self::AllToAll),
            "nearest" => Some(Self::Nearest),
            "spread" => Some(Self::Spread),
            "random_nearest" => Some(Self::RandomNearest),
            "random_spread" => Some(Self::RandomSpread),
            _ => None,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::NoComm => "no_comm",
            Self::Stencil1D => "stencil_1d",
            Self::Stencil1DPeriodic => "stencil_1d_periodic",
            Self::Dom => "dom",
            Self::Tree => "tree",
            Self::Fft => "fft",
            Self::AllToAll => "all_to_all",
            Self::Nearest => "nearest",
            Self::Spread => "spread",
            Self::RandomNearest => "random_nearest",
            Self::RandomSpread => "random_spread",
        }
    }

    /// Whether the pattern repeats with a user-configurable period.
    #[must_use]
    pub const fn needs_period(self) -> bool {
        matches!(self, Self::Spread | Self::RandomNearest | Self::RandomSpread)
    }
}

impl fmt::Display for Dependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive point interval `[start, end]`. An interval with
/// `end < start` is empty; clamping produces such intervals rather than
/// an option so arithmetic on counts stays branch-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// First point.
    pub start: i64,
    /// Last point, inclusive.
    pub end: i64,
}

impl Interval {
    /// Interval covering `[start, end]`.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Single-point interval.
    #[must_use]
    pub const fn point(p: i64) -> Self {
        Self { start: p, end: p }
    }

    /// Number of points covered (zero when empty).
    #[must_use]
    pub const fn count(self) -> i64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Iterate the covered points.
    pub fn points(self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }

    /// Intersect with `[min, max]`, yielding an empty interval anchored
    /// at the nearer bound when there is no overlap.
    #[must_use]
    pub const fn clamp(self, min: i64, max: i64) -> Self {
        if self.end < min {
            Self::new(min, min - 1)
        } else if self.start > max {
            Self::new(max, max - 1)
        } else {
            Self::new(
                if self.start > min { self.start } else { min },
                if self.end < max { self.end } else { max },
            )
        }
    }
}

/// Which side of the random relation is being queried. The two sides
/// swap the final two hash-key words so that they sample the same bits
/// for any given edge.
#[derive(Clone, Copy)]
enum RandomSide {
    Producer,
    Consumer,
}

/// One task graph: topology, kernel, payload sizing.
///
/// Built by the configuration layer, validated once, then immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGraph {
    /// Position of this graph in the application's graph list.
    pub graph_index: i64,
    /// Number of timesteps (rows).
    pub timesteps: i64,
    /// Maximum row width; points are indexed in `[0, max_width)`.
    pub max_width: i64,
    /// Dependence pattern.
    pub dependence: Dependence,
    /// Pattern fan-out (nearest/spread/random patterns).
    pub radix: i64,
    /// Pattern repetition period (spread/random patterns, zero
    /// otherwise).
    pub period: i64,
    /// Edge retention probability for random patterns.
    pub fraction_connected: f64,
    /// Kernel run by every task of this graph.
    pub kernel: Kernel,
    /// Nominal output payload bytes per task (≥ 16).
    pub output_bytes_per_task: usize,
    /// Scratch bytes per task; multiple of 8.
    pub scratch_bytes_per_task: usize,
    /// Depth of the backend's rotating output-buffer ring.
    pub nb_fields: i64,
    /// Output-size distribution selector (0..=3).
    pub output_case: i64,
    /// Mean for output-size case 1.
    pub onormal_mu: f64,
    /// Deviation for output-size case 1.
    pub onormal_std: f64,
    /// Gamma shape from the command line; the case-3 planner uses a
    /// fixed shape of 2 and does not read this.
    pub ogamma_alpha: f64,
    /// Gamma scale from the command line; the case-3 planner uses a
    /// fixed scale of 2 and does not read this.
    pub ogamma_beta: f64,
    /// Planned output bytes per `[timestep][point]`; filled by the
    /// output-size planner at configuration time.
    pub output_sizes: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// First live point at `timestep` (zero before the first row).
    #[must_use]
    pub fn offset_at_timestep(&self, timestep: i64) -> i64 {
        if timestep < 0 {
            return 0;
        }
        match self.dependence {
            Dependence::Dom => 0.max(timestep + self.max_width - self.timesteps),
            _ => 0,
        }
    }

    /// Number of live points at `timestep` (zero before the first row).
    #[must_use]
    pub fn width_at_timestep(&self, timestep: i64) -> i64 {
        if timestep < 0 {
            return 0;
        }
        match self.dependence {
            Dependence::Dom => self
                .max_width
                .min(timestep + 1)
                .min(self.timesteps - timestep),
            _ => self.max_width,
        }
    }

    /// Number of distinct dependence sets the pattern cycles through.
    #[must_use]
    pub fn max_dependence_sets(&self) -> i64 {
        match self.dependence {
            Dependence::Fft => ceil_log2(self.max_width).max(1),
            Dependence::Spread | Dependence::RandomNearest | Dependence::RandomSpread => {
                self.period
            }
            _ => 1,
        }
    }

    /// Timesteps after which the dependence pattern repeats.
    #[must_use]
    pub fn timestep_period(&self) -> i64 {
        // Every defined pattern repeats once its dependence sets cycle.
        self.max_dependence_sets()
    }

    /// Dependence set in force at `timestep`.
    #[must_use]
    pub fn dependence_set_at_timestep(&self, timestep: i64) -> i64 {
        match self.dependence {
            Dependence::Fft => {
                let m = self.max_dependence_sets();
                (timestep + m - 1) % m
            }
            Dependence::Spread | Dependence::RandomNearest | Dependence::RandomSpread => {
                timestep % self.max_dependence_sets()
            }
            _ => 0,
        }
    }

    /// Forward dependencies of `point` under dependence set `dset`:
    /// the previous-row intervals that feed it.
    #[must_use]
    pub fn dependencies(&self, dset: i64, point: i64) -> Vec<Interval> {
        let w = self.max_width;
        match self.dependence {
            Dependence::Trivial => Vec::new(),
            Dependence::NoComm => vec![Interval::point(point)],
            Dependence::Stencil1D => {
                vec![Interval::new(0.max(point - 1), (point + 1).min(w - 1))]
            }
            Dependence::Stencil1DPeriodic => {
                let mut deps = vec![Interval::new(0.max(point - 1), (point + 1).min(w - 1))];
                if point - 1 < 0 {
                    deps.push(Interval::point(w - 1));
                }
                if point + 1 >= w {
                    deps.push(Interval::point(0));
                }
                deps
            }
            Dependence::Dom => vec![Interval::new(0.max(point - 1), point)],
            Dependence::Tree => vec![Interval::point(point / 2)],
            Dependence::Fft => {
                let stride = 1_i64 << dset;
                let mut deps = Vec::with_capacity(3);
                if point - stride >= 0 {
                    deps.push(Interval::point(point - stride));
                }
                deps.push(Interval::point(point));
                if point + stride < w {
                    deps.push(Interval::point(point + stride));
                }
                deps
            }
            Dependence::AllToAll => vec![Interval::new(0, w - 1)],
            Dependence::Nearest => {
                if self.radix > 0 {
                    vec![Interval::new(
                        0.max(point - self.radix / 2),
                        (point + (self.radix - 1) / 2).min(w - 1),
                    )]
                } else {
                    Vec::new()
                }
            }
            Dependence::Spread => (0..self.radix)
                .map(|i| {
                    let shift = i * w / self.radix + if i > 0 { dset } else { 0 };
                    Interval::point((point + shift).rem_euclid(w))
                })
                .collect(),
            Dependence::RandomNearest => self.random_runs(dset, point, RandomSide::Producer),
            Dependence::RandomSpread => self.random_runs(dset, point, RandomSide::Consumer),
        }
    }

    /// Reverse dependencies of `point` under dependence set `dset`: the
    /// next-row intervals it feeds. Mirrors [`dependencies`]
    /// (`q ∈ deps(p)` exactly when `p ∈ rdeps(q)`).
    ///
    /// [`dependencies`]: Self::dependencies
    #[must_use]
    pub fn reverse_dependencies(&self, dset: i64, point: i64) -> Vec<Interval> {
        let w = self.max_width;
        match self.dependence {
            Dependence::Trivial => Vec::new(),
            Dependence::NoComm => vec![Interval::point(point)],
            Dependence::Stencil1D => {
                vec![Interval::new(0.max(point - 1), (point + 1).min(w - 1))]
            }
            Dependence::Stencil1DPeriodic => {
                let mut deps = vec![Interval::new(0.max(point - 1), (point + 1).min(w - 1))];
                if point - 1 < 0 {
                    deps.push(Interval::point(w - 1));
                }
                if point + 1 >= w {
                    deps.push(Interval::point(0));
                }
                deps
            }
            Dependence::Dom => vec![Interval::new(point, (point + 1).min(w - 1))],
            Dependence::Tree => {
                let child1 = point * 2;
                let child2 = point * 2 + 1;
                if child2 < w {
                    vec![Interval::new(child1, child2)]
                } else if child1 < w {
                    vec![Interval::point(child1)]
                } else {
                    Vec::new()
                }
            }
            Dependence::Fft => {
                let stride = 1_i64 << dset;
                let mut deps = Vec::with_capacity(3);
                if point - stride >= 0 {
                    deps.push(Interval::point(point - stride));
                }
                deps.push(Interval::point(point));
                if point + stride < w {
                    deps.push(Interval::point(point + stride));
                }
                deps
            }
            Dependence::AllToAll => vec![Interval::new(0, w - 1)],
            Dependence::Nearest => {
                if self.radix > 0 {
                    vec![Interval::new(
                        0.max(point - (self.radix - 1) / 2),
                        (point + self.radix / 2).min(w - 1),
                    )]
                } else {
                    Vec::new()
                }
            }
            Dependence::Spread => (0..self.radix)
                .map(|i| {
                    let shift = i * w / self.radix + if i > 0 { dset } else { 0 };
                    Interval::point((point - shift).rem_euclid(w))
                })
                .collect(),
            Dependence::RandomNearest => self.random_runs(dset, point, RandomSide::Consumer),
            Dependence::RandomSpread => self.random_runs(dset, point, RandomSide::Producer),
        }
    }

    /// Sweep the candidate window of the random patterns and coalesce
    /// the retained points into maximal intervals.
    ///
    /// The producer side sweeps candidates `i` feeding `point` and
    /// hashes `(graph, radix, dset, i, point)`; the consumer side
    /// sweeps candidates fed by `point` and hashes `(graph, radix,
    /// dset, point, i)`. Edge (i → point) therefore hashes identically
    /// from both sides, which is what keeps the relation symmetric.
    fn random_runs(&self, dset: i64, point: i64, side: RandomSide) -> Vec<Interval> {
        let w = self.max_width;
        let r = self.radix;
        let (lo, hi) = match side {
            RandomSide::Producer => (0.max(point - r / 2), (point + (r - 1) / 2).min(w - 1)),
            RandomSide::Consumer => (0.max(point - (r - 1) / 2), (point + r / 2).min(w - 1)),
        };
        let mut runs = Vec::new();
        let mut run_start: Option<i64> = None;
        for i in lo..=hi {
            let key = match side {
                RandomSide::Producer => [self.graph_index, r, dset, i, point],
                RandomSide::Consumer => [self.graph_index, r, dset, point, i],
            };
            let include =
                random_uniform(&key) < self.fraction_connected || (r > 0 && i == point);
            if include {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                runs.push(Interval::new(start, i - 1));
            }
        }
        if let Some(start) = run_start {
            runs.push(Interval::new(start, hi));
        }
        runs
    }

    /// Planned output bytes for task `(timestep, point)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the planned table.
    #[must_use]
    pub fn output_bytes(&self, timestep: i64, point: i64) -> usize {
        self.output_sizes[usize::try_from(timestep).expect("non-negative timestep")]
            [usize::try_from(point).expect("non-negative point")]
    }

    /// Execute task `(timestep, point)`.
    ///
    /// Checks every input buffer record-by-record against the expected
    /// `(timestep - 1, dependency)` pair, stamps `(timestep, point)`
    /// into every 16-byte slot of `output`, verifies the scratch
    /// preparation mark, and runs the configured kernel. Input buffers
    /// must be supplied in dependency order (intervals in query order,
    /// ascending within each interval), restricted to dependencies that
    /// were live in the previous row; surplus trailing entries are
    /// tolerated.
    ///
    /// # Panics
    ///
    /// Panics (these are caller bugs or runtime corruption, and the
    /// process must not keep producing numbers)
    /// when the coordinates are out of range, an input buffer is
    /// missing, short, or carries a wrong record, the output buffer
    /// cannot hold one record, the scratch length does not match the
    /// configuration, or the scratch magic is gone.
    pub fn execute_point(
        &self,
        timestep: i64,
        point: i64,
        output: &mut [u8],
        inputs: &[&[u8]],
        scratch: &mut [u64],
    ) {
        #[cfg(feature = "track-execution")]
        crate::tracking::record_executed(self.graph_index);

        assert!(
            (0..self.timesteps).contains(&timestep),
            "graph {}: timestep {timestep} outside [0, {})",
            self.graph_index,
            self.timesteps
        );
        let offset = self.offset_at_timestep(timestep);
        let width = self.width_at_timestep(timestep);
        assert!(
            (offset..offset + width).contains(&point),
            "graph {}: point {point} outside [{offset}, {}) at timestep {timestep}",
            self.graph_index,
            offset + width
        );

        let last_offset = self.offset_at_timestep(timestep - 1);
        let last_width = self.width_at_timestep(timestep - 1);
        let dset = self.dependence_set_at_timestep(timestep);

        let mut idx = 0;
        for interval in self.dependencies(dset, point) {
            for dep in interval.points() {
                if dep < last_offset || dep >= last_offset + last_width {
                    continue;
                }
                assert!(
                    idx < inputs.len(),
                    "graph {}: task ({timestep}, {point}) expects input {idx} for \
                     dependency {dep} but only {} inputs were supplied",
                    self.graph_index,
                    inputs.len()
                );
                let input = inputs[idx];
                assert!(
                    input.len() >= RECORD_BYTES,
                    "graph {}: task ({timestep}, {point}) input {idx} holds {} bytes, \
                     less than one record",
                    self.graph_index,
                    input.len()
                );
                for (pos, slot) in input.chunks_exact(RECORD_BYTES).enumerate() {
                    let (got_t, got_p) = decode_record(slot);
                    assert!(
                        got_t == timestep - 1 && got_p == dep,
                        "corrupted value in task (graph {} timestep {timestep} point \
                         {point}) input {idx}: at position {pos} expected (timestep {} \
                         point {dep}) but got (timestep {got_t} point {got_p})",
                        self.graph_index,
                        timestep - 1
                    );
                }
                idx += 1;
            }
        }

        assert!(
            output.len() >= RECORD_BYTES,
            "graph {}: task ({timestep}, {point}) output buffer holds {} bytes, \
             less than one record",
            self.graph_index,
            output.len()
        );
        fill_output(output, timestep, point);

        assert_eq!(
            scratch.len() * 8,
            self.scratch_bytes_per_task,
            "graph {}: scratch length mismatch",
            self.graph_index
        );
        if !scratch.is_empty() {
            assert!(
                scratch_is_prepared(scratch),
                "graph {}: scratch buffer lost its preparation mark (was \
                 prepare_scratch called?)",
                self.graph_index
            );
        }

        self.kernel
            .execute(self.graph_index, timestep, point, scratch);
    }
}

/// `⌈log₂ w⌉` for `w ≥ 1`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn ceil_log2(w: i64) -> i64 {
    debug_assert!(w >= 1);
    i64::from(64 - ((w as u64) - 1).leading_zeros())
}
