// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synthetic task kernels.
//!
//! Each task in a graph runs one kernel from a fixed catalog. The
//! kernels compute nothing meaningful; each one is shaped to stress a
//! single resource: floating-point throughput, memory bandwidth, I/O
//! latency, or scheduler tolerance to imbalance. Iteration counts for
//! the imbalanced variants are derived per-task from the deterministic
//! hash in [`crate::rng`], so every process agrees on the cost of every
//! task without communicating.
//!
//! The FLOP and byte formulas in [`Kernel::flops_per_task`] and
//! [`Kernel::bytes_per_task`] are contractual: the reporting layer sums
//! exactly these expressions, so kernel bodies and accounting must move
//! together.

use std::fmt;
use std::hint::black_box;
use std::time::Duration;

use crate::rng::{HashRng, random_uniform};

/// Distribution family for the `dist_imbalance` kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistKind {
    /// Uniform on `[iterations, max)`.
    #[default]
    Uniform,
    /// Normal with mean `iterations` and deviation `std`.
    Normal,
    /// Gamma with shape `alpha` and scale `beta`.
    Gamma,
    /// Cauchy with location `iterations` and scale `beta`.
    Cauchy,
}

impl DistKind {
    /// All distribution names, in the order shown by help output.
    pub const NAMES: [&'static str; 4] = ["uniform", "normal", "gamma", "cauchy"];

    /// Parse a distribution name as written on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uniform" => Some(Self::Uniform),
            "normal" => Some(Self::Normal),
            "gamma" => Some(Self::Gamma),
            "cauchy" => Some(Self::Cauchy),
            _ => None,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Normal => "normal",
            Self::Gamma => "gamma",
            Self::Cauchy => "cauchy",
        }
    }
}

impl fmt::Display for DistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Distribution parameters. Which fields matter depends on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dist {
    /// Distribution family.
    pub kind: DistKind,
    /// Upper bound for the uniform distribution.
    pub max: i64,
    /// Standard deviation for the normal distribution.
    pub std_dev: i64,
    /// Shape for the gamma distribution.
    pub alpha: i64,
    /// Scale for the gamma and cauchy distributions.
    pub beta: f64,
}

/// Kernel variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// Return immediately.
    Empty,
    /// Integer spin loop; no FLOPs, no memory traffic.
    BusyWait,
    /// Stream the scratch buffer.
    MemoryBound,
    /// Dense square GEMM sized to the scratch buffer.
    ComputeDgemm,
    /// DAXPY over the scratch buffer.
    MemoryDaxpy,
    /// 64 register-resident FMA lanes.
    ComputeBound,
    /// 32 register-resident FMA lanes, no reduction.
    ComputeBound2,
    /// Block briefly on a synthetic I/O wait.
    IoBound,
    /// Compute-bound with a per-task iteration count drawn uniformly
    /// from `[(1-imbalance)*iterations, (1+imbalance)*iterations)`.
    LoadImbalance,
    /// Compute-bound with a per-task iteration count drawn from the
    /// configured distribution, clamped non-negative.
    DistImbalance,
    /// Mix of memory streaming and compute, split by `fraction_mem`.
    ComputeMemory,
}

impl KernelKind {
    /// All kernel names, in the order shown by help output.
    pub const NAMES: [&'static str; 11] = [
        "empty",
        "busy_wait",
        "memory_bound",
        "compute_dgemm",
        "memory_daxpy",
        "compute_bound",
        "compute_bound2",
        "io_bound",
        "load_imbalance",
        "dist_imbalance",
        "compute_memory",
    ];

    /// Parse a kernel name as written on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "empty" => Some(Self::Empty),
            "busy_wait" => Some(Self::BusyWait),
            "memory_bound" => Some(Self::MemoryBound),
            "compute_dgemm" => Some(Self::ComputeDgemm),
            "memory_daxpy" => Some(Self::MemoryDaxpy),
            "compute_bound" => Some(Self::ComputeBound),
            "compute_bound2" => Some(Self::ComputeBound2),
            "io_bound" => Some(Self::IoBound),
            "load_imbalance" => Some(Self::LoadImbalance),
            "dist_imbalance" => Some(Self::DistImbalance),
            "compute_memory" => Some(Self::ComputeMemory),
            _ => None,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::BusyWait => "busy_wait",
            Self::MemoryBound => "memory_bound",
            Self::ComputeDgemm => "compute_dgemm",
            Self::MemoryDaxpy => "memory_daxpy",
            Self::ComputeBound => "compute_bound",
            Self::ComputeBound2 => "compute_bound2",
            Self::IoBound => "io_bound",
            Self::LoadImbalance => "load_imbalance",
            Self::DistImbalance => "dist_imbalance",
            Self::ComputeMemory => "compute_memory",
        }
    }

    /// Whether this kernel requires a non-empty scratch buffer.
    #[must_use]
    pub const fn uses_scratch(self) -> bool {
        matches!(
            self,
            Self::MemoryBound | Self::ComputeDgemm | Self::MemoryDaxpy | Self::ComputeMemory
        )
    }

    /// Whether this kernel divides work by `samples` (and therefore
    /// needs `samples > 0`).
    #[must_use]
    pub const fn uses_samples(self) -> bool {
        matches!(
            self,
            Self::MemoryBound | Self::MemoryDaxpy | Self::ComputeMemory
        )
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured kernel: variant plus tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    /// Which kernel body to run.
    pub kind: KernelKind,
    /// Base iteration count.
    pub iterations: i64,
    /// Scratch partition count for the memory-streaming kernels.
    pub samples: i64,
    /// Fractional spread around `iterations` for `load_imbalance`,
    /// in `[0, 2]`.
    pub imbalance: f64,
    /// Fraction of iterations spent streaming memory for
    /// `compute_memory`, in `[0, 1]`.
    pub fraction_mem: f64,
    /// Distribution for `dist_imbalance`.
    pub dist: Dist,
}

impl Default for Kernel {
    fn default() -> Self {
        Self {
            kind: KernelKind::Empty,
            iterations: 0,
            samples: 16,
            imbalance: 0.0,
            fraction_mem: 0.0,
            dist: Dist::default(),
        }
    }
}

impl Kernel {
    /// Run the kernel for task `(timestep, point)` of graph
    /// `graph_index`.
    ///
    /// # Panics
    ///
    /// Panics if a scratch-using kernel is invoked with an empty
    /// scratch buffer. Scratch sizing is the caller's contract.
    pub fn execute(
        &self,
        graph_index: i64,
        timestep: i64,
        point: i64,
        scratch: &mut [u64],
    ) {
        assert!(
            !self.kind.uses_scratch() || !scratch.is_empty(),
            "kernel {} requires a scratch buffer",
            self.kind
        );
        match self.kind {
            KernelKind::Empty => {}
            KernelKind::BusyWait => busy_wait(self.iterations),
            KernelKind::MemoryBound => {
                stream_words(scratch, self.iterations, self.samples, timestep);
            }
            KernelKind::ComputeDgemm => dgemm(scratch, self.iterations),
            KernelKind::MemoryDaxpy => daxpy(scratch, self.iterations, self.samples, timestep),
            KernelKind::ComputeBound => {
                black_box(run_lanes::<64>(self.iterations).iter().sum::<f64>());
            }
            KernelKind::ComputeBound2 => {
                black_box(run_lanes::<32>(self.iterations));
            }
            KernelKind::IoBound => synthetic_io(self.iterations),
            KernelKind::LoadImbalance => {
                let iters = self.imbalanced_iterations(graph_index, timestep, point);
                black_box(run_lanes::<64>(iters).iter().sum::<f64>());
            }
            KernelKind::DistImbalance => {
                let iters = self.dist_iterations(graph_index, timestep, point);
                black_box(run_lanes::<64>(iters).iter().sum::<f64>());
            }
            KernelKind::ComputeMemory => {
                let mem_iters = self.memory_iterations();
                stream_words(scratch, mem_iters, self.samples, timestep);
                black_box(
                    run_lanes::<64>(self.iterations - mem_iters)
                        .iter()
                        .sum::<f64>(),
                );
            }
        }
    }

    /// FLOPs charged to one task. The reporting layer sums exactly
    /// this expression over all tasks of a graph.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn flops_per_task(
        &self,
        scratch_bytes: usize,
        graph_index: i64,
        timestep: i64,
        point: i64,
    ) -> i64 {
        match self.kind {
            KernelKind::Empty
            | KernelKind::BusyWait
            | KernelKind::MemoryBound
            | KernelKind::MemoryDaxpy
            | KernelKind::IoBound => 0,
            KernelKind::ComputeDgemm => {
                let n = dgemm_order(scratch_bytes / 8) as i64;
                2 * n * n * n * self.iterations
            }
            KernelKind::ComputeBound => 2 * 64 * self.iterations + 64,
            KernelKind::ComputeBound2 => 2 * 32 * self.iterations,
            KernelKind::LoadImbalance => {
                2 * 64 * self.imbalanced_iterations(graph_index, timestep, point) + 64
            }
            KernelKind::DistImbalance => {
                2 * 64 * self.dist_iterations(graph_index, timestep, point) + 64
            }
            KernelKind::ComputeMemory => {
                (2.0 * 64.0 * self.iterations as f64 * (1.0 - self.fraction_mem)) as i64 + 64
            }
        }
    }

    /// Bytes moved by one task. Contractual, like
    /// [`flops_per_task`](Self::flops_per_task).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn bytes_per_task(&self, scratch_bytes: usize) -> i64 {
        let scratch_bytes = scratch_bytes as i64;
        match self.kind {
            KernelKind::MemoryBound | KernelKind::MemoryDaxpy => {
                scratch_bytes * self.iterations / self.samples
            }
            KernelKind::ComputeMemory => {
                (scratch_bytes as f64 * self.iterations as f64 * self.fraction_mem
                    / self.samples as f64) as i64
            }
            _ => 0,
        }
    }

    /// Per-task iteration count for `load_imbalance`: uniform over
    /// `[(1-imbalance)*iterations, (1+imbalance)*iterations)`, keyed by
    /// `(graph_index, timestep, point)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn imbalanced_iterations(&self, graph_index: i64, timestep: i64, point: i64) -> i64 {
        let u = random_uniform(&[graph_index, timestep, point]);
        let base = self.iterations as f64;
        (((1.0 - self.imbalance) + 2.0 * self.imbalance * u) * base) as i64
    }

    /// Per-task iteration count for `dist_imbalance`: one draw from the
    /// configured distribution, clamped non-negative, keyed by
    /// `(graph_index, timestep, point)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn dist_iterations(&self, graph_index: i64, timestep: i64, point: i64) -> i64 {
        let mut rng = HashRng::from_key(&[graph_index, timestep, point]);
        let base = self.iterations as f64;
        let value = match self.dist.kind {
            DistKind::Uniform => rng.uniform(base, self.dist.max as f64),
            DistKind::Normal => rng.normal(base, self.dist.std_dev as f64),
            DistKind::Gamma => rng.gamma(self.dist.alpha as f64, self.dist.beta),
            DistKind::Cauchy => rng.cauchy(base, self.dist.beta),
        };
        value.max(0.0) as i64
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn memory_iterations(&self) -> i64 {
        (self.iterations as f64 * self.fraction_mem) as i64
    }
}

/// Integer spin with a data dependence the optimizer cannot remove.
fn busy_wait(iterations: i64) {
    let mut acc: u64 = 113;
    for _ in 0..iterations {
        acc = acc
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
    }
    black_box(acc);
}

/// `LANES` independent register-resident accumulators, two FLOPs per
/// lane per iteration. The update contracts toward a fixed point so
/// values stay normal no matter the iteration count.
fn run_lanes<const LANES: usize>(iterations: i64) -> [f64; LANES] {
    let mut lanes = [1.234_5_f64; LANES];
    for _ in 0..iterations {
        for lane in &mut lanes {
            *lane = *lane * 0.5 + 0.25;
        }
    }
    lanes
}

/// One full sweep of the scratch region per `samples` iterations: each
/// iteration copies one chunk onto the next, so after `iterations`
/// iterations `scratch_bytes * iterations / samples` bytes have moved.
/// Copying prepared words preserves the scratch magic in word 0.
#[allow(clippy::cast_sign_loss)]
fn stream_words(scratch: &mut [u64], iterations: i64, samples: i64, timestep: i64) {
    let samples_us = samples as usize;
    let chunk = scratch.len() / samples_us;
    if chunk == 0 {
        return;
    }
    for k in 0..iterations {
        let src = ((timestep + k) % samples) as usize * chunk;
        let dst = ((timestep + k + 1) % samples) as usize * chunk;
        scratch.copy_within(src..src + chunk, dst);
    }
}

/// DAXPY over the scratch viewed as doubles: the lower half is `x`
/// (read-only, so word 0 keeps its magic), the upper half is `y`.
#[allow(clippy::cast_sign_loss)]
fn daxpy(scratch: &mut [u64], iterations: i64, samples: i64, timestep: i64) {
    let doubles: &mut [f64] = bytemuck::cast_slice_mut(scratch);
    let half = doubles.len() / 2;
    let (x, y) = doubles.split_at_mut(half);
    let chunk = half / samples as usize;
    if chunk == 0 {
        return;
    }
    for k in 0..iterations {
        let start = ((timestep + k) % samples) as usize * chunk;
        for (yi, &xi) in y[start..start + chunk]
            .iter_mut()
            .zip(&x[start..start + chunk])
        {
            *yi = 2.0 * xi + *yi;
        }
    }
}

/// Square matrix order for the GEMM kernel: the largest `n` such that
/// three `n x n` double matrices fit in the scratch words.
const fn dgemm_order(scratch_words: usize) -> usize {
    (scratch_words / 3).isqrt()
}

/// `iterations` back-to-back square GEMMs. Only the `C` panel is
/// written; `A` and `B` keep their prepared bit patterns.
fn dgemm(scratch: &mut [u64], iterations: i64) {
    let doubles: &mut [f64] = bytemuck::cast_slice_mut(scratch);
    let n = dgemm_order(doubles.len());
    if n == 0 {
        return;
    }
    let (a, rest) = doubles.split_at_mut(n * n);
    let (b, c) = rest.split_at_mut(n * n);
    let c = &mut c[..n * n];
    for _ in 0..iterations {
        for i in 0..n {
            for k in 0..n {
                let aik = a[i * n + k];
                let brow = &b[k * n..(k + 1) * n];
                let crow = &mut c[i * n..(i + 1) * n];
                for (cij, &bkj) in crow.iter_mut().zip(brow) {
                    *cij += aik * bkj;
                }
            }
        }
    }
}

/// Short blocking wait standing in for a real I/O round trip.
#[allow(clippy::cast_sign_loss)]
fn synthetic_io(iterations: i64) {
    std::thread::sleep(Duration::from_micros(iterations.max(1) as u64));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{SCRATCH_MAGIC, prepare_scratch};

    fn prepared(words: usize) -> Vec<u64> {
        let mut scratch = vec![0_u64; words];
        prepare_scratch(&mut scratch);
        scratch
    }

    #[test]
    fn kernel_names_roundtrip() {
        for name in KernelKind::NAMES {
            let kind = KernelKind::from_name(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert!(KernelKind::from_name("bogus").is_none());
    }

    #[test]
    fn dist_names_roundtrip() {
        for name in DistKind::NAMES {
            assert_eq!(DistKind::from_name(name).unwrap().name(), name);
        }
        assert!(DistKind::from_name("zipf").is_none());
    }

    #[test]
    fn empty_and_busy_wait_run_without_scratch() {
        let kernel = Kernel {
            kind: KernelKind::BusyWait,
            iterations: 1000,
            ..Kernel::default()
        };
        kernel.execute(0, 0, 0, &mut []);
    }

    #[test]
    #[should_panic(expected = "requires a scratch buffer")]
    fn memory_kernel_rejects_empty_scratch() {
        let kernel = Kernel {
            kind: KernelKind::MemoryBound,
            iterations: 4,
            samples: 2,
            ..Kernel::default()
        };
        kernel.execute(0, 0, 0, &mut []);
    }

    #[test]
    fn streaming_preserves_magic_word() {
        let kernel = Kernel {
            kind: KernelKind::MemoryBound,
            iterations: 64,
            samples: 4,
            ..Kernel::default()
        };
        let mut scratch = prepared(64);
        for t in 0..8 {
            kernel.execute(0, t, 0, &mut scratch);
            assert_eq!(scratch[0], SCRATCH_MAGIC);
        }
    }

    #[test]
    fn daxpy_preserves_magic_word() {
        let kernel = Kernel {
            kind: KernelKind::MemoryDaxpy,
            iterations: 32,
            samples: 4,
            ..Kernel::default()
        };
        let mut scratch = prepared(64);
        kernel.execute(0, 3, 1, &mut scratch);
        assert_eq!(scratch[0], SCRATCH_MAGIC);
    }

    #[test]
    fn dgemm_preserves_magic_word() {
        let kernel = Kernel {
            kind: KernelKind::ComputeDgemm,
            iterations: 2,
            ..Kernel::default()
        };
        // 48 words -> n = 4, panels of 16 words each. The prepared
        // words read as subnormal doubles whose products underflow to
        // zero, so even the written C panel keeps its bit pattern;
        // what matters is that A (and with it word 0) is never written.
        let mut scratch = prepared(48);
        kernel.execute(0, 0, 0, &mut scratch);
        assert_eq!(scratch[0], SCRATCH_MAGIC);
    }

    #[test]
    fn dgemm_order_fits_three_panels() {
        assert_eq!(dgemm_order(48), 4);
        assert_eq!(dgemm_order(3), 1);
        assert_eq!(dgemm_order(2), 0);
        for words in [3, 27, 48, 300, 3000] {
            let n = dgemm_order(words);
            assert!(3 * n * n <= words);
            assert!(3 * (n + 1) * (n + 1) > words);
        }
    }

    #[test]
    fn imbalanced_iterations_within_band() {
        let kernel = Kernel {
            kind: KernelKind::LoadImbalance,
            iterations: 1000,
            imbalance: 0.5,
            ..Kernel::default()
        };
        for p in 0..200 {
            let iters = kernel.imbalanced_iterations(0, 3, p);
            assert!((500..1500).contains(&iters), "iters {iters}");
        }
    }

    #[test]
    fn imbalanced_iterations_deterministic() {
        let kernel = Kernel {
            kind: KernelKind::LoadImbalance,
            iterations: 500,
            imbalance: 1.0,
            ..Kernel::default()
        };
        assert_eq!(
            kernel.imbalanced_iterations(2, 7, 11),
            kernel.imbalanced_iterations(2, 7, 11)
        );
    }

    #[test]
    fn dist_iterations_never_negative() {
        let kernel = Kernel {
            kind: KernelKind::DistImbalance,
            iterations: 10,
            dist: Dist {
                kind: DistKind::Cauchy,
                beta: 100.0,
                ..Dist::default()
            },
            ..Kernel::default()
        };
        for p in 0..500 {
            assert!(kernel.dist_iterations(1, 0, p) >= 0);
        }
    }

    #[test]
    fn dist_iterations_deterministic_per_task() {
        let kernel = Kernel {
            kind: KernelKind::DistImbalance,
            iterations: 100,
            dist: Dist {
                kind: DistKind::Normal,
                std_dev: 30,
                ..Dist::default()
            },
            ..Kernel::default()
        };
        assert_eq!(
            kernel.dist_iterations(0, 1, 2),
            kernel.dist_iterations(0, 1, 2)
        );
        assert_ne!(
            kernel.dist_iterations(0, 1, 2),
            kernel.dist_iterations(0, 1, 3),
            "distinct tasks should draw distinct counts (with near certainty)"
        );
    }

    #[test]
    fn flop_accounting_matches_catalog() {
        let base = Kernel {
            iterations: 10,
            ..Kernel::default()
        };
        let compute = Kernel {
            kind: KernelKind::ComputeBound,
            ..base
        };
        assert_eq!(compute.flops_per_task(0, 0, 0, 0), 2 * 64 * 10 + 64);
        let compute2 = Kernel {
            kind: KernelKind::ComputeBound2,
            ..base
        };
        assert_eq!(compute2.flops_per_task(0, 0, 0, 0), 2 * 32 * 10);
        let gemm = Kernel {
            kind: KernelKind::ComputeDgemm,
            ..base
        };
        // 384 bytes = 48 words -> n = 4
        assert_eq!(gemm.flops_per_task(384, 0, 0, 0), 2 * 64 * 10);
        let empty = Kernel {
            kind: KernelKind::Empty,
            ..base
        };
        assert_eq!(empty.flops_per_task(384, 0, 0, 0), 0);
    }

    #[test]
    fn byte_accounting_matches_catalog() {
        let kernel = Kernel {
            kind: KernelKind::MemoryBound,
            iterations: 32,
            samples: 4,
            ..Kernel::default()
        };
        assert_eq!(kernel.bytes_per_task(1024), 1024 * 32 / 4);
        let mixed = Kernel {
            kind: KernelKind::ComputeMemory,
            iterations: 32,
            samples: 4,
            fraction_mem: 0.5,
            ..Kernel::default()
        };
        assert_eq!(mixed.bytes_per_task(1024), 1024 * 32 / 2 / 4);
        let compute = Kernel {
            kind: KernelKind::ComputeBound,
            iterations: 32,
            ..Kernel::default()
        };
        assert_eq!(compute.bytes_per_task(1024), 0);
    }
}
