//! Sample mixing with a wide accumulator and saturation on output

use crate::format::Sample;

/// Add `samples` into the accumulator
///
/// Accumulates in `i32`, which holds the sum of up to 65536 full-scale
/// 16-bit sources without overflow.
pub fn accumulate(acc: &mut [i32], samples: &[Sample]) {
    for (slot, &sample) in acc.iter_mut().zip(samples) {
        *slot += sample as i32;
    }
}

/// Clamp accumulated values to the 16-bit range
pub fn saturate(acc: &[i32], out: &mut [Sample]) {
    for (slot, &value) in out.iter_mut().zip(acc) {
        *slot = value.clamp(Sample::MIN as i32, Sample::MAX as i32) as Sample;
    }
}

/// Mix several frames into `out`
pub fn mix_frames(frames: &[&[Sample]], out: &mut [Sample]) {
    let mut acc = vec![0i32; out.len()];
    for frame in frames {
        accumulate(&mut acc, frame);
    }
    saturate(&acc, out);
}
