//! Random connection identifiers.
//!
//! The streaming endpoint expects a numeric session id and a short signature
//! drawn from a 32-symbol alphabet (`a`-`z` plus `0`-`5`). The alphabet is
//! kept as the endpoint has always been fed it; digits `6`-`9` never appear.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::RandomSourceError;

/// Symbols used for signatures. Its length divides 256, so `byte % len` is unbiased.
pub const SIGNATURE_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz012345";

/// Source of random bytes backing the identifier generator.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomSourceError>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomSourceError> {
        OsRng.try_fill_bytes(dest).map_err(RandomSourceError::from)
    }
}

/// Generates unguessable per-connection identifiers.
#[derive(Clone)]
pub struct IdentifierGenerator {
    source: Arc<dyn EntropySource>,
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new(Arc::new(OsEntropy))
    }
}

impl std::fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierGenerator").finish_non_exhaustive()
    }
}

impl IdentifierGenerator {
    pub fn new(source: Arc<dyn EntropySource>) -> Self {
        Self { source }
    }

    /// Returns `length` symbols drawn uniformly from [`SIGNATURE_ALPHABET`].
    pub fn random_alphanumeric(&self, length: usize) -> Result<String, RandomSourceError> {
        if length == 0 {
            return Ok(String::new());
        }

        let mut bytes = vec![0_u8; length];
        self.source.fill(&mut bytes)?;

        Ok(bytes
            .iter()
            .map(|byte| char::from(SIGNATURE_ALPHABET[usize::from(*byte) % SIGNATURE_ALPHABET.len()]))
            .collect())
    }

    /// Returns a value uniform over `[0, max)`, zero-padded to the width of `max - 1`.
    ///
    /// `max <= 1` always yields `"0"`.
    pub fn random_decimal_string(&self, max: u64) -> Result<String, RandomSourceError> {
        if max <= 1 {
            return Ok(String::from("0"));
        }

        let width = (max - 1).to_string().len();
        let value = self.random_below(max)?;
        Ok(format!("{value:0width$}"))
    }

    /// Rejection sampling over whole multiples of `max`.
    fn random_below(&self, max: u64) -> Result<u64, RandomSourceError> {
        let limit = u64::MAX - (u64::MAX % max);
        loop {
            let mut buf = [0_u8; 8];
            self.source.fill(&mut buf)?;
            let candidate = u64::from_le_bytes(buf);
            if candidate < limit {
                return Ok(candidate % max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed byte sequence, cycling when exhausted.
    struct ScriptedEntropy {
        bytes: Vec<u8>,
        cursor: Mutex<usize>,
    }

    impl ScriptedEntropy {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                cursor: Mutex::new(0),
            }
        }
    }

    impl EntropySource for ScriptedEntropy {
        fn fill(&self, dest: &mut [u8]) -> Result<(), RandomSourceError> {
            let mut cursor = self.cursor.lock().expect("cursor lock");
            for slot in dest.iter_mut() {
                *slot = self.bytes[*cursor % self.bytes.len()];
                *cursor += 1;
            }
            Ok(())
        }
    }

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), RandomSourceError> {
            Err(RandomSourceError::new("device not readable"))
        }
    }

    #[test]
    fn zero_length_yields_empty_string() {
        let generator = IdentifierGenerator::new(Arc::new(BrokenEntropy));
        assert_eq!(generator.random_alphanumeric(0).expect("no entropy needed"), "");
    }

    #[test]
    fn alphanumeric_uses_restricted_alphabet() {
        let generator = IdentifierGenerator::default();
        for length in [1_usize, 8, 64, 257] {
            let value = generator.random_alphanumeric(length).expect("os entropy");
            assert_eq!(value.len(), length);
            assert!(
                value.bytes().all(|b| SIGNATURE_ALPHABET.contains(&b)),
                "unexpected symbol in {value}"
            );
            assert!(!value.chars().any(|c| matches!(c, '6'..='9')));
        }
    }

    #[test]
    fn alphanumeric_maps_bytes_modulo_alphabet() {
        let generator = IdentifierGenerator::new(Arc::new(ScriptedEntropy::new(vec![0, 31, 32, 255])));
        assert_eq!(generator.random_alphanumeric(4).expect("scripted"), "a5a5");
    }

    #[test]
    fn decimal_string_is_zero_for_tiny_max() {
        let generator = IdentifierGenerator::new(Arc::new(BrokenEntropy));
        assert_eq!(generator.random_decimal_string(0).expect("no entropy needed"), "0");
        assert_eq!(generator.random_decimal_string(1).expect("no entropy needed"), "0");
    }

    #[test]
    fn decimal_string_is_left_padded() {
        let generator = IdentifierGenerator::new(Arc::new(ScriptedEntropy::new(vec![7, 0, 0, 0, 0, 0, 0, 0])));
        assert_eq!(generator.random_decimal_string(1000).expect("scripted"), "007");
    }

    #[test]
    fn decimal_string_has_fixed_width() {
        let generator = IdentifierGenerator::default();
        for _ in 0..500 {
            let value = generator.random_decimal_string(1000).expect("os entropy");
            assert_eq!(value.len(), 3);
            let parsed: u64 = value.parse().expect("decimal");
            assert!(parsed < 1000);
        }
    }

    #[test]
    fn entropy_failure_is_reported() {
        let generator = IdentifierGenerator::new(Arc::new(BrokenEntropy));

        let error = generator.random_alphanumeric(8).expect_err("broken source");
        assert_eq!(error.message(), "device not readable");
        assert!(generator.random_decimal_string(1000).is_err());
    }
}
