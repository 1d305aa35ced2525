// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]
use libfuzzer_sys::fuzz_target;
use taskmill::config::App;

fuzz_target!(|data: &[u8]| {
    // Tokenize arbitrary text the way a shell would and feed it to the
    // argument parser; any outcome except a panic is fine.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let args: Vec<&str> = text.split_whitespace().collect();
    // Bound the workload: pathological -steps/-width/-radix values are
    // legitimate configs whose size tables and cross-validation are too
    // big for a fuzz iteration.
    if args
        .iter()
        .any(|t| t.parse::<i64>().is_ok_and(|v| v.abs() > 256))
    {
        return;
    }
    let _ = App::parse(&args);
});
