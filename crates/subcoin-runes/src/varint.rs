//! LEB128 varint codec used for every integer in a runestone payload.
//!
//! Integers are split into 7-bit groups, least significant group first. Every byte but the
//! last has its high bit set. A `u128` needs at most 19 bytes.

/// Varint decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("varint overflows u128")]
    Overflow,
    #[error("varint is unterminated")]
    Unterminated,
}

/// Appends the varint encoding of `n` to `v`.
pub fn encode_to_vec(mut n: u128, v: &mut Vec<u8>) {
    while n >> 7 > 0 {
        v.push(n.to_le_bytes()[0] | 0b1000_0000);
        n >>= 7;
    }
    v.push(n.to_le_bytes()[0]);
}

pub fn encode(n: u128) -> Vec<u8> {
    let mut v = Vec::new();
    encode_to_vec(n, &mut v);
    v
}

/// Decodes a single varint from the start of `buffer`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(buffer: &[u8]) -> Result<(u128, usize), Error> {
    let mut n = 0u128;

    for (i, &byte) in buffer.iter().enumerate() {
        let value = u128::from(byte) & 0b0111_1111;

        // The 19th byte only has room for the two highest bits of a u128 and must be the last.
        if i == 18 && (value & 0b0111_1100 != 0 || byte & 0b1000_0000 != 0) {
            return Err(Error::Overflow);
        }

        n |= value << (7 * i);

        if byte & 0b1000_0000 == 0 {
            return Ok((n, i + 1));
        }
    }

    Err(Error::Unterminated)
}

/// Decodes a payload made entirely of varints.
pub fn decode_all(mut buffer: &[u8]) -> Result<Vec<u128>, Error> {
    let mut integers = Vec::new();

    while !buffer.is_empty() {
        let (integer, length) = decode(buffer)?;
        integers.push(integer);
        buffer = &buffer[length..];
    }

    Ok(integers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(127), [0x7f]);
        assert_eq!(encode(128), [0x80, 0x01]);
        assert_eq!(encode(300), [0xac, 0x02]);
        assert_eq!(encode(16384), [0x80, 0x80, 0x01]);
    }

    #[test]
    fn u128_max_round_trips() {
        let encoded = encode(u128::MAX);
        assert_eq!(encoded.len(), 19);
        assert_eq!(&encoded[..18], &[0xff; 18]);
        assert_eq!(encoded[18], 0x03);
        assert_eq!(decode(&encoded), Ok((u128::MAX, 19)));
    }

    #[test]
    fn powers_of_two_round_trip() {
        for i in 0..128 {
            let n = 1u128 << i;
            assert_eq!(decode(&encode(n)), Ok((n, encode(n).len())));
            assert_eq!(decode(&encode(n - 1)).map(|(n, _)| n), Ok(n - 1));
        }
    }

    #[test]
    fn decode_stops_at_terminator() {
        assert_eq!(decode(&[0xac, 0x02, 0xff]), Ok((300, 2)));
    }

    #[test]
    fn truncated_varint_is_unterminated() {
        assert_eq!(decode(&[]), Err(Error::Unterminated));
        assert_eq!(decode(&[0x80]), Err(Error::Unterminated));
        assert_eq!(decode(&[0xff, 0xff]), Err(Error::Unterminated));
    }

    #[test]
    fn oversized_varint_overflows() {
        let mut buffer = vec![0xff; 18];
        buffer.push(0x04);
        assert_eq!(decode(&buffer), Err(Error::Overflow));

        let mut buffer = vec![0x80; 19];
        buffer.push(0x00);
        assert_eq!(decode(&buffer), Err(Error::Overflow));
    }

    #[test]
    fn continuation_on_last_possible_byte_overflows() {
        assert_eq!(decode(&[0x80; 19]), Err(Error::Overflow));
        assert_eq!(decode(&[0xff; 19]), Err(Error::Overflow));
        assert_eq!(decode(&[0x80; 18]), Err(Error::Unterminated));
    }

    #[test]
    fn decode_all_reports_first_failure() {
        assert_eq!(decode_all(&[0x01, 0xac, 0x02]), Ok(vec![1, 300]));
        assert_eq!(decode_all(&[0x01, 0x80]), Err(Error::Unterminated));
        assert_eq!(decode_all(&[]), Ok(vec![]));
    }
}
