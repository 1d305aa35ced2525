// SPDX-License-Identifier: AGPL-3.0-or-later
//! Serial reference driver.
//!
//! The simplest possible backend: one process, one thread, timesteps in
//! order, points in order. Each task's inputs are the previous row's
//! output buffers, selected by the graph's dependency queries; the
//! graphs run twice and the second pass is timed, so one-time costs
//! (page faults, allocator warm-up) stay out of the reported rates.
//!
//! Distributed backends replicate exactly this loop, with sends and
//! receives where this driver reads `previous` directly.

use std::time::Instant;

use taskmill::config::{App, Parsed, help_text};
use taskmill::graph::TaskGraph;
use taskmill::payload::prepare_scratch;
use taskmill::report::report_timing;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let app = match App::parse(&args) {
        Ok(Parsed::App(app)) => app,
        Ok(Parsed::Help) => {
            print!("{}", help_text("taskmill"));
            return;
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    app.display();

    let mut elapsed = 0.0;
    for _ in 0..2 {
        let start = Instant::now();
        for graph in &app.graphs {
            run_graph(graph);
        }
        elapsed = start.elapsed().as_secs_f64();
    }

    report_timing(&app, elapsed);
}

/// Run one graph to completion, timestep by timestep.
fn run_graph(g: &TaskGraph) {
    let width = usize::try_from(g.max_width).expect("positive width");
    let scratch_words = g.scratch_bytes_per_task / 8;

    // Per-point scratch, prepared once and reused across timesteps.
    let mut scratch: Vec<Vec<u64>> = vec![vec![0_u64; scratch_words]; width];
    for buffer in &mut scratch {
        prepare_scratch(buffer);
    }

    let mut previous: Vec<Vec<u8>> = vec![Vec::new(); width];
    for t in 0..g.timesteps {
        let offset = g.offset_at_timestep(t);
        let live = g.width_at_timestep(t);
        let last_offset = g.offset_at_timestep(t - 1);
        let last_width = g.width_at_timestep(t - 1);
        let dset = g.dependence_set_at_timestep(t);

        let mut current: Vec<Vec<u8>> = vec![Vec::new(); width];
        for p in offset..offset + live {
            let mut inputs: Vec<&[u8]> = Vec::new();
            for interval in g.dependencies(dset, p) {
                for dep in interval.points() {
                    if dep >= last_offset && dep < last_offset + last_width {
                        inputs.push(&previous[usize::try_from(dep).expect("point index")]);
                    }
                }
            }
            let point_index = usize::try_from(p).expect("point index");
            let mut output = vec![0_u8; g.output_bytes(t, p)];
            g.execute_point(t, p, &mut output, &inputs, &mut scratch[point_index]);
            current[point_index] = output;
        }
        previous = current;
    }
}
