//! G.711 mu-law companding and cheap integer-rate conversion.
//!
//! Narrowband telephony transports deliver 8-bit mu-law samples at 8 kHz;
//! recognizers want 16-bit linear PCM, usually at 16 kHz. Everything here is
//! pure and allocation-light so it can sit on the per-frame hot path and be
//! property-tested in isolation.

/// Companding bias added before the logarithmic segment search.
const BIAS: i32 = 0x84;

/// Largest magnitude representable after bias without overflowing the
/// 8-segment encoding.
const CLIP: i32 = 32_635;

/// Compress one linear 16-bit sample to 8-bit mu-law.
pub fn encode(sample: i16) -> u8 {
    let mut value = i32::from(sample);
    let sign: u8 = if value < 0 {
        value = -value;
        0x00
    } else {
        0x80
    };
    if value > CLIP {
        value = CLIP;
    }
    value += BIAS;

    // Locate the segment (exponent) containing the sample magnitude.
    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && (value & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((value >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa) ^ 0x80
}

/// Expand one 8-bit mu-law sample to linear 16-bit. Defined for all byte
/// values; there is no error condition.
pub fn decode(byte: u8) -> i16 {
    let value = !byte;
    let sign = value & 0x80;
    let exponent = (value >> 4) & 0x07;
    let mantissa = i32::from(value & 0x0F);

    let magnitude = ((mantissa << 3) + BIAS) << exponent;
    let linear = magnitude - BIAS;

    if sign != 0 { (-linear) as i16 } else { linear as i16 }
}

/// Decode a companded frame into linear samples.
pub fn decode_frame(frame: &[u8]) -> Vec<i16> {
    frame.iter().map(|&b| decode(b)).collect()
}

/// Encode a linear frame into companded bytes.
pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode(s)).collect()
}

/// Double the sample rate by duplicating each sample.
///
/// Deliberately not anti-aliased: telephony bandwidth is narrow and the
/// latency budget does not allow a filter pass.
pub fn upsample_x2(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.push(s);
        out.push(s);
    }
    out
}

/// Halve the sample rate by averaging adjacent pairs. A trailing odd sample
/// is passed through unchanged.
pub fn downsample_x2(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len().div_ceil(2));
    let mut chunks = samples.chunks_exact(2);
    for pair in &mut chunks {
        out.push(((i32::from(pair[0]) + i32::from(pair[1])) / 2) as i16);
    }
    if let [last] = chunks.remainder() {
        out.push(*last);
    }
    out
}

/// Serialize linear samples as little-endian bytes, the layout streaming
/// recognizers expect.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Reassemble little-endian bytes into linear samples. A trailing odd byte
/// is dropped.
pub fn le_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
