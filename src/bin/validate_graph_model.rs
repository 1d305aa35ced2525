// SPDX-License-Identifier: AGPL-3.0-or-later
//! Validation: graph-model queries against hand-derived expectations.
//!
//! Walks a set of small configurations whose dependency structure can
//! be worked out on paper, and checks the closed-form queries, the
//! execute-point payload contract, and the reporting totals against
//! those expectations. Exit code 0 = all checks passed, 1 = at least
//! one failed.

use taskmill::config::{App, Parsed};
use taskmill::graph::{Interval, TaskGraph};
use taskmill::payload::{decode_record, fill_output};
use taskmill::report::Report;
use taskmill::rng::random_uniform;
use taskmill::validation::Validator;

fn parse(args: &[&str]) -> App {
    match App::parse(args) {
        Ok(Parsed::App(app)) => app,
        Ok(Parsed::Help) => unreachable!("no -h in validation configs"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn points(intervals: &[Interval]) -> Vec<i64> {
    intervals.iter().flat_map(|i| i.points()).collect()
}

fn stencil_graph_checks(v: &mut Validator) {
    v.section("── stencil_1d: 4 steps x width 4 ──");
    let app = parse(&["-steps", "4", "-width", "4", "-type", "stencil_1d"]);
    let g = &app.graphs[0];
    let report = Report::for_app(&app);
    v.check_count("total tasks", report.total_tasks, 16);
    v.check_points(
        "deps of point 1",
        &points(&g.dependencies(0, 1)),
        &[0, 1, 2],
    );

    // Execute (2, 2) with well-formed inputs and read back the output.
    let mut inputs: Vec<Vec<u8>> = Vec::new();
    for dep in points(&g.dependencies(0, 2)) {
        let mut buffer = vec![0_u8; 16];
        fill_output(&mut buffer, 1, dep);
        inputs.push(buffer);
    }
    let input_refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
    let mut output = vec![0_u8; g.output_bytes(2, 2)];
    g.execute_point(2, 2, &mut output, &input_refs, &mut []);
    let (t, p) = decode_record(&output[..16]);
    v.check_points("output record of (2, 2)", &[t, p], &[2, 2]);
}

fn fft_checks(v: &mut Validator) {
    v.section("── fft: 3 steps x width 8 ──");
    let app = parse(&["-steps", "3", "-width", "8", "-type", "fft"]);
    let g = &app.graphs[0];
    v.check_count("max dependence sets", g.max_dependence_sets(), 3);
    v.check_count("dset at timestep 1", g.dependence_set_at_timestep(1), 0);
    v.check_count("dset at timestep 2", g.dependence_set_at_timestep(2), 1);
    v.check_count("dset at timestep 3", g.dependence_set_at_timestep(3), 2);
    v.check_points(
        "deps of point 4 at dset 1",
        &points(&g.dependencies(1, 4)),
        &[2, 4, 6],
    );
}

fn tree_checks(v: &mut Validator) {
    v.section("── tree: 5 steps x width 8 ──");
    let app = parse(&["-steps", "5", "-width", "8", "-type", "tree"]);
    let g = &app.graphs[0];
    v.check_points("deps of point 3", &points(&g.dependencies(0, 3)), &[1]);
    v.check_points(
        "reverse deps of point 1",
        &points(&g.reverse_dependencies(0, 1)),
        &[2, 3],
    );
}

fn dom_checks(v: &mut Validator) {
    v.section("── dom: 6 steps x width 4 ──");
    let app = parse(&["-steps", "6", "-width", "4", "-type", "dom"]);
    let g = &app.graphs[0];
    v.check_count("offset at timestep 3", g.offset_at_timestep(3), 1);
    v.check_count("width at timestep 3", g.width_at_timestep(3), 3);
    v.check_count("width at timestep 0", g.width_at_timestep(0), 1);
    v.check_count("width at timestep 5", g.width_at_timestep(5), 1);
}

fn spread_checks(v: &mut Validator) {
    v.section("── spread: radix 3, period 2, width 8 ──");
    let app = parse(&[
        "-steps", "4", "-width", "8", "-type", "spread", "-radix", "3", "-period", "2",
    ]);
    let g = &app.graphs[0];
    v.check_points(
        "deps of point 0 at dset 0",
        &points(&g.dependencies(0, 0)),
        &[0, 2, 5],
    );
    v.check_points(
        "deps of point 0 at dset 1",
        &points(&g.dependencies(1, 0)),
        &[0, 3, 6],
    );
}

fn random_checks(v: &mut Validator) {
    v.section("── random_nearest: fraction 0 keeps only self-edges ──");
    let app = parse(&[
        "-steps", "4", "-width", "8", "-type", "random_nearest", "-radix", "5", "-period",
        "1", "-fraction", "0.0",
    ]);
    let g = &app.graphs[0];
    let mut all_self = true;
    for p in 0..8 {
        all_self &= points(&g.dependencies(0, p)) == [p];
        all_self &= points(&g.reverse_dependencies(0, p)) == [p];
    }
    v.check_that("every point keeps exactly its self-edge", all_self);

    v.section("── random_nearest: symmetry at fraction 0.5 ──");
    let app = parse(&[
        "-steps", "4", "-width", "16", "-type", "random_nearest", "-radix", "6", "-period",
        "2", "-fraction", "0.5",
    ]);
    let g = &app.graphs[0];
    v.check_that("forward and reverse mirror", symmetric(g));
    v.check_that(
        "edge decisions reproduce across calls",
        random_uniform(&[0, 6, 1, 3, 5]).to_bits() == random_uniform(&[0, 6, 1, 3, 5]).to_bits(),
    );
}

fn symmetric(g: &TaskGraph) -> bool {
    for dset in 0..g.max_dependence_sets() {
        for p in 0..g.max_width {
            for q in points(&g.dependencies(dset, p)) {
                if !points(&g.reverse_dependencies(dset, q)).contains(&p) {
                    return false;
                }
            }
            for q in points(&g.reverse_dependencies(dset, p)) {
                if !points(&g.dependencies(dset, q)).contains(&p) {
                    return false;
                }
            }
        }
    }
    true
}

fn main() {
    let mut v = Validator::new("Graph model validation");
    stencil_graph_checks(&mut v);
    fft_checks(&mut v);
    tree_checks(&mut v);
    dom_checks(&mut v);
    spread_checks(&mut v);
    random_checks(&mut v);
    v.finish()
}
