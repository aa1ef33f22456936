//! Proof-of-work predicate.
//!
//! Difficulty is the number of leading zero bits required of the 256-bit
//! block hash read as a big-endian integer, i.e. `hash < 2^(256 - difficulty)`.
//! Every 4 bits of difficulty is one leading `0` in the hex form, so a
//! difficulty of 16 means the hash starts with `"0000"`.

/// Largest meaningful difficulty (an all-zero hash).
pub const MAX_DIFFICULTY: u32 = 256;

/// Count the leading zero bits of `hash`.
pub fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Returns `true` when `hash` satisfies `difficulty`.
pub fn meets_difficulty(hash: &[u8; 32], difficulty: u32) -> bool {
    difficulty <= MAX_DIFFICULTY && leading_zero_bits(hash) >= difficulty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bits_across_bytes() {
        let mut hash = [0xffu8; 32];
        assert_eq!(leading_zero_bits(&hash), 0);

        hash[0] = 0x00;
        hash[1] = 0x0f;
        assert_eq!(leading_zero_bits(&hash), 12);

        assert_eq!(leading_zero_bits(&[0u8; 32]), MAX_DIFFICULTY);
    }

    #[test]
    fn sixteen_bits_is_four_hex_zeros() {
        let mut hash = [0xabu8; 32];
        hash[0] = 0;
        hash[1] = 0;
        assert!(meets_difficulty(&hash, 16));
        assert!(hex::encode(hash).starts_with("0000"));
        assert!(!meets_difficulty(&hash, 17));
    }

    #[test]
    fn zero_difficulty_accepts_anything_and_overflow_accepts_nothing() {
        assert!(meets_difficulty(&[0xff; 32], 0));
        assert!(!meets_difficulty(&[0; 32], MAX_DIFFICULTY + 1));
    }
}
