//! Waiting on more objects than a primitive accepts per call.
//!
//! Each round sweeps every chunk with a zero timeout. If nothing is ready,
//! the engine blocks on one chunk (rotating between rounds) for at most the
//! slice length, then sweeps again. Objects signalled in the blocking wait
//! are carried into the next sweep so edge-style primitives lose nothing.

use super::{Deadline, WaitOutcome, WaitPrimitive, Waitable};
use crate::error::Result;

pub(super) fn wait(
    primitive: &dyn WaitPrimitive,
    objects: &[Waitable],
    limit: usize,
    timeout_ms: i32,
    slice_ms: i32,
) -> Result<WaitOutcome> {
    let limit = limit.max(1);
    let slice_ms = slice_ms.max(1);
    let deadline = Deadline::after(timeout_ms);
    let chunk_count = objects.len().div_ceil(limit);
    let mut carried: Vec<usize> = Vec::new();
    let mut turn = 0usize;

    loop {
        let mut ready = std::mem::take(&mut carried);
        for (n, chunk) in objects.chunks(limit).enumerate() {
            match primitive.wait(chunk, 0)? {
                WaitOutcome::Ready(indices) => {
                    ready.extend(indices.into_iter().map(|i| n * limit + i));
                }
                WaitOutcome::TimedOut => {}
                WaitOutcome::Interrupted => return Ok(WaitOutcome::Interrupted),
            }
        }
        if !ready.is_empty() {
            ready.sort_unstable();
            ready.dedup();
            return Ok(WaitOutcome::Ready(ready));
        }

        let remaining = deadline.remaining_ms();
        if remaining == 0 {
            return Ok(WaitOutcome::TimedOut);
        }
        let block = if remaining < 0 {
            slice_ms
        } else {
            remaining.min(slice_ms)
        };

        let n = turn % chunk_count;
        turn = turn.wrapping_add(1);
        let start = n * limit;
        let end = (start + limit).min(objects.len());
        match primitive.wait(&objects[start..end], block)? {
            WaitOutcome::Ready(indices) => {
                carried = indices.into_iter().map(|i| start + i).collect();
            }
            WaitOutcome::TimedOut => {}
            WaitOutcome::Interrupted => return Ok(WaitOutcome::Interrupted),
        }
    }
}
