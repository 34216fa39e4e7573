//! Software volume for 16-bit little-endian PCM.

/// Scale every sample of `block` by `volume` percent in place.
///
/// Samples are truncated toward zero. At 100 the block is left untouched.
/// A trailing odd byte is left as-is.
pub fn scale_block(block: &mut [u8], volume: u8) {
    if volume >= 100 {
        return;
    }

    let volume = i32::from(volume);
    for sample in block.chunks_exact_mut(2) {
        let value = i32::from(i16::from_le_bytes([sample[0], sample[1]]));
        let scaled = (value * volume / 100) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}
