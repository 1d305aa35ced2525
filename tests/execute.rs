// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execute-point contract: payload stamping, input validation,
//! scratch checks, and fatal corruption detection.

use taskmill::config::{App, Parsed};
use taskmill::graph::TaskGraph;
use taskmill::payload::{RECORD_BYTES, SCRATCH_MAGIC, decode_record, fill_output, prepare_scratch};

fn graph(args: &[&str]) -> TaskGraph {
    match App::parse(args).expect("valid configuration") {
        Parsed::App(app) => app.graphs.into_iter().next().unwrap(),
        Parsed::Help => panic!("unexpected help"),
    }
}

/// Run the whole graph serially, checking outputs along the way.
/// Returns the final row's output buffers.
fn run_serially(g: &TaskGraph) -> Vec<Vec<u8>> {
    let width = g.max_width as usize;
    let mut scratch: Vec<Vec<u64>> = vec![vec![0; g.scratch_bytes_per_task / 8]; width];
    for s in &mut scratch {
        prepare_scratch(s);
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
                        inputs.push(&previous[dep as usize]);
                    }
                }
            }
            let mut output = vec![0_u8; g.output_bytes(t, p)];
            g.execute_point(t, p, &mut output, &inputs, &mut scratch[p as usize]);
            for slot in output.chunks_exact(RECORD_BYTES) {
                assert_eq!(decode_record(slot), (t, p));
            }
            current[p as usize] = output;
        }
        previous = current;
    }
    previous
}

#[test]
fn round_trip_across_patterns() {
    for (pattern, extra) in [
        ("trivial", &[][..]),
        ("no_comm", &[]),
        ("stencil_1d", &[]),
        ("stencil_1d_periodic", &[]),
        ("dom", &[]),
        ("tree", &[]),
        ("fft", &[]),
        ("all_to_all", &[]),
        ("nearest", &[]),
        ("spread", &["-period", "2"]),
        ("random_nearest", &["-period", "2"]),
        ("random_spread", &["-period", "2"]),
    ] {
        let mut args = vec!["-steps", "5", "-width", "8", "-type", pattern, "-radix", "3"];
        args.extend_from_slice(extra);
        let g = graph(&args);
        let final_row = run_serially(&g);
        let live = g.width_at_timestep(g.timesteps - 1);
        let offset = g.offset_at_timestep(g.timesteps - 1);
        for p in offset..offset + live {
            assert!(
                !final_row[p as usize].is_empty(),
                "{pattern}: final row point {p} never produced"
            );
        }
    }
}

#[test]
fn skewed_output_sizes_flow_through_execution() {
    let g = graph(&[
        "-steps", "4", "-width", "6", "-type", "stencil_1d", "-output", "64",
        "-output-case", "1",
    ]);
    let final_row = run_serially(&g);
    for (p, buffer) in final_row.iter().enumerate() {
        assert_eq!(buffer.len(), g.output_bytes(g.timesteps - 1, p as i64));
        assert_eq!(buffer.len() % RECORD_BYTES, 0);
    }
}

#[test]
fn scratch_kernels_keep_their_magic_through_a_run() {
    let g = graph(&[
        "-steps", "4", "-width", "4", "-type", "stencil_1d", "-kernel", "memory_daxpy",
        "-scratch", "512", "-iter", "8", "-sample", "2",
    ]);
    let mut scratch = vec![0_u64; 64];
    prepare_scratch(&mut scratch);
    let mut output = vec![0_u8; 16];
    g.execute_point(0, 1, &mut output, &[], &mut scratch);
    assert_eq!(scratch[0], SCRATCH_MAGIC);
}

#[test]
fn extra_trailing_inputs_are_tolerated() {
    let g = graph(&["-steps", "2", "-width", "2", "-type", "no_comm"]);
    let mut dep = vec![0_u8; 16];
    fill_output(&mut dep, 0, 1);
    let stray = vec![0xFF_u8; 16];
    let mut output = vec![0_u8; 16];
    // no_comm point 1 needs exactly one input; the stray one is ignored.
    g.execute_point(1, 1, &mut output, &[&dep, &stray], &mut []);
    assert_eq!(decode_record(&output), (1, 1));
}

#[test]
#[should_panic(expected = "corrupted value")]
fn wrong_point_in_input_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2", "-type", "no_comm"]);
    let mut dep = vec![0_u8; 16];
    fill_output(&mut dep, 0, 0); // point 1 expects (0, 1)
    let mut output = vec![0_u8; 16];
    g.execute_point(1, 1, &mut output, &[&dep], &mut []);
}

#[test]
#[should_panic(expected = "corrupted value")]
fn stale_timestep_in_input_is_fatal() {
    let g = graph(&["-steps", "3", "-width", "2", "-type", "no_comm"]);
    let mut dep = vec![0_u8; 16];
    fill_output(&mut dep, 0, 1); // timestep 2 expects (1, 1)
    let mut output = vec![0_u8; 16];
    g.execute_point(2, 1, &mut output, &[&dep], &mut []);
}

#[test]
#[should_panic(expected = "less than one record")]
fn short_input_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2", "-type", "no_comm"]);
    let dep = vec![0_u8; 8];
    let mut output = vec![0_u8; 16];
    g.execute_point(1, 1, &mut output, &[&dep], &mut []);
}

#[test]
#[should_panic(expected = "inputs were supplied")]
fn missing_input_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2", "-type", "no_comm"]);
    let mut output = vec![0_u8; 16];
    g.execute_point(1, 1, &mut output, &[], &mut []);
}

#[test]
#[should_panic(expected = "output buffer")]
fn short_output_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2"]);
    let mut output = vec![0_u8; 8];
    g.execute_point(0, 0, &mut output, &[], &mut []);
}

#[test]
#[should_panic(expected = "timestep")]
fn out_of_range_timestep_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2"]);
    let mut output = vec![0_u8; 16];
    g.execute_point(2, 0, &mut output, &[], &mut []);
}

#[test]
#[should_panic(expected = "point")]
fn out_of_range_point_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2"]);
    let mut output = vec![0_u8; 16];
    g.execute_point(0, 5, &mut output, &[], &mut []);
}

#[test]
#[should_panic(expected = "scratch length mismatch")]
fn wrong_scratch_size_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2", "-scratch", "64"]);
    let mut scratch = vec![0_u64; 4]; // 32 bytes, configured for 64
    prepare_scratch(&mut scratch);
    let mut output = vec![0_u8; 16];
    g.execute_point(0, 0, &mut output, &[], &mut scratch);
}

#[test]
#[should_panic(expected = "preparation mark")]
fn unprepared_scratch_is_fatal() {
    let g = graph(&["-steps", "2", "-width", "2", "-scratch", "64"]);
    let mut scratch = vec![0_u64; 8]; // never prepared
    let mut output = vec![0_u8; 16];
    g.execute_point(0, 0, &mut output, &[], &mut scratch);
}

#[test]
fn dom_narrowing_rows_validate() {
    let g = graph(&["-steps", "6", "-width", "4", "-type", "dom"]);
    run_serially(&g);
}
