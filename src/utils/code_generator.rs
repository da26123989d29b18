//! Random short-code generation.
//!
//! Codes are fixed-length strings over the 62-character alphanumeric
//! alphabet, drawn from the OS entropy source. At the default length of
//! 8 there are 62^8 (about 2.2e14) possible codes, so collisions are
//! rare but possible under concurrent writers - the retry loop lives in
//! the coordinator, not here.

/// Alphabet used for short codes: digits, uppercase, lowercase.
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Default short-code length.
pub const CODE_LENGTH: usize = 8;

/// Generates a random alphanumeric code of `length` characters.
///
/// Uses rejection sampling over the raw bytes so every alphabet
/// character is equally likely.
///
/// # Panics
///
/// Panics if the system random number generator fails. Entropy failure
/// is fatal and not worth retrying.
pub fn generate_code(length: usize) -> String {
    let mut code = String::with_capacity(length);
    let mut buffer = [0u8; 64];

    // Largest multiple of the alphabet size below 256; bytes at or
    // above it would bias the low characters and are discarded.
    const LIMIT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

    while code.len() < length {
        getrandom::fill(&mut buffer).expect("system entropy source failed");

        for &byte in &buffer {
            if byte < LIMIT {
                code.push(ALPHABET[(byte as usize) % ALPHABET.len()] as char);
                if code.len() == length {
                    break;
                }
            }
        }
    }

    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_length() {
        assert_eq!(generate_code(CODE_LENGTH).len(), 8);
    }

    #[test]
    fn test_requested_lengths() {
        for length in [1, 4, 8, 16, 100] {
            assert_eq!(generate_code(length).len(), length);
        }
    }

    #[test]
    fn test_zero_length() {
        assert_eq!(generate_code(0), "");
    }

    #[test]
    fn test_alphanumeric_only() {
        let code = generate_code(256);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_codes_are_unique_in_practice() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            seen.insert(generate_code(CODE_LENGTH));
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_all_alphabet_positions_reachable() {
        // With 2000 characters of output every bucket of the alphabet
        // should appear; a missing bucket would point at sampling bias.
        let sample: String = (0..250).map(|_| generate_code(8)).collect();
        let distinct: HashSet<char> = sample.chars().collect();
        assert!(distinct.len() > 50, "only {} distinct chars", distinct.len());
    }
}
