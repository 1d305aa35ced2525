// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task payload wire format and scratch-buffer preparation.
//!
//! Every task output is a contiguous run of 16-byte records, each
//! holding the producing `(timestep, point)` as two little-endian
//! signed 64-bit integers. Consumers at the next timestep check every
//! record bit-exactly, which is how the benchmark detects a runtime
//! that delivered the wrong buffer, a stale buffer, or a partial one.
//!
//! Scratch buffers are word-oriented (`u64`). Preparation stamps every
//! word with [`SCRATCH_MAGIC`]; execute-point later checks the first
//! word so a clobbered or never-prepared scratch is caught at the first
//! task that touches it.

/// Bytes per `(timestep, point)` record: two `i64` words.
pub const RECORD_BYTES: usize = 16;

/// Sentinel stamped over prepared scratch ("SCRATCHB", squinting).
pub const SCRATCH_MAGIC: u64 = 0x5C4A_7C8B;

/// Write one `(timestep, point)` record into a 16-byte slot.
///
/// # Panics
///
/// Panics if `slot` is shorter than [`RECORD_BYTES`].
#[inline]
pub fn encode_record(slot: &mut [u8], timestep: i64, point: i64) {
    slot[..8].copy_from_slice(&timestep.to_le_bytes());
    slot[8..RECORD_BYTES].copy_from_slice(&point.to_le_bytes());
}

/// Read one `(timestep, point)` record from a 16-byte slot.
///
/// # Panics
///
/// Panics if `slot` is shorter than [`RECORD_BYTES`].
#[inline]
#[must_use]
pub fn decode_record(slot: &[u8]) -> (i64, i64) {
    let t = i64::from_le_bytes(slot[..8].try_into().expect("8-byte timestep word"));
    let p = i64::from_le_bytes(slot[8..RECORD_BYTES].try_into().expect("8-byte point word"));
    (t, p)
}

/// Stamp `(timestep, point)` into every complete 16-byte slot of
/// `output`. A trailing remainder shorter than one record is left
/// untouched.
pub fn fill_output(output: &mut [u8], timestep: i64, point: i64) {
    for slot in output.chunks_exact_mut(RECORD_BYTES) {
        encode_record(slot, timestep, point);
    }
}

/// Initialize a scratch buffer: every word becomes [`SCRATCH_MAGIC`].
///
/// Backends call this once per scratch allocation; kernels preserve the
/// first word thereafter, so the magic check in execute-point holds for
/// the lifetime of the buffer.
pub fn prepare_scratch(scratch: &mut [u64]) {
    scratch.fill(SCRATCH_MAGIC);
}

/// Whether a scratch buffer still carries its preparation mark.
#[inline]
#[must_use]
pub fn scratch_is_prepared(scratch: &[u64]) -> bool {
    scratch.first().copied() == Some(SCRATCH_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let mut slot = [0_u8; RECORD_BYTES];
        encode_record(&mut slot, 7, -3);
        assert_eq!(decode_record(&slot), (7, -3));
    }

    #[test]
    fn record_is_little_endian() {
        let mut slot = [0_u8; RECORD_BYTES];
        encode_record(&mut slot, 1, 2);
        assert_eq!(slot[0], 1);
        assert_eq!(slot[8], 2);
        assert!(slot[1..8].iter().all(|&b| b == 0));
        assert!(slot[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fill_output_stamps_every_slot() {
        let mut buf = vec![0_u8; 48];
        fill_output(&mut buf, 5, 9);
        for slot in buf.chunks_exact(RECORD_BYTES) {
            assert_eq!(decode_record(slot), (5, 9));
        }
    }

    #[test]
    fn fill_output_leaves_partial_tail() {
        let mut buf = vec![0xAB_u8; 40];
        fill_output(&mut buf, 1, 1);
        // 2 complete records, 8 stray bytes untouched
        assert_eq!(decode_record(&buf[16..32]), (1, 1));
        assert!(buf[32..].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn prepare_marks_every_word() {
        let mut scratch = vec![0_u64; 16];
        prepare_scratch(&mut scratch);
        assert!(scratch.iter().all(|&w| w == SCRATCH_MAGIC));
        assert!(scratch_is_prepared(&scratch));
    }

    #[test]
    fn empty_scratch_is_not_prepared() {
        assert!(!scratch_is_prepared(&[]));
    }
}
