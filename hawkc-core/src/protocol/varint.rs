//! LEB128 varints and zig-zag mapping.
//!
//! Zig-zag folds signed integers onto unsigned ones so that small magnitudes stay
//! small: `0 → 0, -1 → 1, 1 → 2, -2 → 3, ...`.
use super::DecodeError;

/// Longest encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Longest encoding of a 32-bit varint.
pub const MAX_VARINT32_LEN: usize = 5;

pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Encodes `value` into `buf`, returning the number of bytes used.
pub fn encode(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut len = 0;
    loop {
        if value < 0x80 {
            buf[len] = value as u8;
            return len + 1;
        }
        buf[len] = (value as u8 & 0x7f) | 0x80;
        value >>= 7;
        len += 1;
    }
}

/// Number of bytes [`encode`] produces for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Incrementally decodes a varint one byte at a time.
#[derive(Debug, Clone, Copy)]
pub struct VarintDecoder {
    value: u64,
    shift: u32,
    len: usize,
    max_len: usize,
}

impl VarintDecoder {
    /// `max_len` is [`MAX_VARINT_LEN`] for 64-bit values and [`MAX_VARINT32_LEN`] for
    /// 32-bit ones.
    pub fn new(max_len: usize) -> Self {
        Self {
            value: 0,
            shift: 0,
            len: 0,
            max_len,
        }
    }

    /// Feeds one byte. Returns the value once its last byte has been seen.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>, DecodeError> {
        self.len += 1;
        if self.len > self.max_len {
            return Err(DecodeError::VarintOverflow);
        }

        let bits = u64::from(byte & 0x7f);
        if self.shift == 63 && bits > 1 {
            return Err(DecodeError::VarintOverflow);
        }
        self.value |= bits << self.shift;

        if byte & 0x80 == 0 {
            return Ok(Some(self.value));
        }
        self.shift += 7;
        Ok(None)
    }
}

/// Decodes a varint from the start of `bytes`, returning it with the number of bytes
/// consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut decoder = VarintDecoder::new(MAX_VARINT_LEN);
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(value) = decoder.push(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vec(value: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode(value, &mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn zigzag_interleaves_signs() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
    }

    #[test]
    fn signed_values_round_trip() {
        let mut samples = vec![0, 1, -1, 63, -64, 64, -65, i64::MAX, i64::MIN];
        samples.extend((0..63).flat_map(|shift| {
            let p = 1i64 << shift;
            [p, -p, p - 1, -(p - 1), p + 1, -(p + 1)]
        }));

        for n in samples {
            let bytes = encode_vec(zigzag_encode(n));
            let (decoded, used) = decode(&bytes).unwrap();
            assert_eq!(used, bytes.len());
            assert_eq!(zigzag_decode(decoded), n, "value {n}");
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_vec(0), [0x00]);
        assert_eq!(encode_vec(1), [0x01]);
        assert_eq!(encode_vec(127), [0x7f]);
        assert_eq!(encode_vec(128), [0x80, 0x01]);
        assert_eq!(encode_vec(300), [0xac, 0x02]);
        assert_eq!(encode_vec(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn length_grows_with_magnitude() {
        let mut previous = 0;
        for shift in 0..63 {
            let magnitude = 1i64 << shift;
            for n in [-magnitude, magnitude] {
                let len = encoded_len(zigzag_encode(n));
                assert_eq!(len, encode_vec(zigzag_encode(n)).len());
                assert!(len >= previous, "{n} encoded shorter than a smaller magnitude");
                previous = len;
            }
        }
        assert_eq!(encoded_len(zigzag_encode(-1)), 1);
        assert_eq!(encoded_len(zigzag_encode(-64)), 1);
        assert_eq!(encoded_len(zigzag_encode(-65)), 2);
        assert!(encoded_len(zigzag_encode(-3)) < encoded_len(zigzag_encode(-300_000)));
    }

    #[test]
    fn truncated_and_overlong_inputs_fail() {
        assert_eq!(decode(&[]), Err(DecodeError::Truncated));
        assert_eq!(decode(&[0x80, 0x80]), Err(DecodeError::Truncated));
        assert_eq!(decode(&[0xff; 11]), Err(DecodeError::VarintOverflow));
        // Tenth byte may only contribute the top bit.
        assert_eq!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02]),
            Err(DecodeError::VarintOverflow)
        );
    }

    #[test]
    fn thirty_two_bit_decoder_stops_after_five_bytes() {
        let mut decoder = VarintDecoder::new(MAX_VARINT32_LEN);
        for _ in 0..5 {
            assert_eq!(decoder.push(0x80), Ok(None));
        }
        assert_eq!(decoder.push(0x01), Err(DecodeError::VarintOverflow));
    }
}
