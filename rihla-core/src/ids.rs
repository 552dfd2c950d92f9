use rand::Rng;

use crate::{CoreError, CoreResult};

pub const BOOKING_PREFIX: &str = "BK";
pub const TRANSACTION_PREFIX: &str = "TXN";

/// Default bound on uniqueness retries before giving up.
pub const DEFAULT_ID_ATTEMPTS: usize = 5;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

/// Produces candidate external identifiers (booking references, transaction ids).
///
/// Candidates are only proposals: the owner of the id space still checks uniqueness
/// with [`claim_unique`].
pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self, prefix: &str) -> String;
}

/// `prefix` + base36 milliseconds since epoch + random uppercase suffix.
///
/// The time component keeps ids roughly sortable and makes collisions possible only
/// within the same millisecond.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOrderedGenerator;

impl ReferenceGenerator for TimeOrderedGenerator {
    fn generate(&self, prefix: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}{}{}", prefix, to_base36(millis), suffix)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % 36) as usize;
        // ALPHABET is letters first; base36 wants digits first
        let c = if digit < 10 {
            (b'0' + digit as u8) as char
        } else {
            (b'A' + (digit - 10) as u8) as char
        };
        digits.push(c);
        value /= 36;
    }
    digits.iter().rev().collect()
}

/// Draws candidates until `try_claim` accepts one, at most `attempts` times.
///
/// `try_claim` must atomically check and record the candidate. Exhausting the
/// attempts is an invariant violation.
pub fn claim_unique<F>(
    generator: &dyn ReferenceGenerator,
    prefix: &str,
    attempts: usize,
    mut try_claim: F,
) -> CoreResult<String>
where
    F: FnMut(&str) -> bool,
{
    for attempt in 1..=attempts.max(1) {
        let candidate = generator.generate(prefix);
        if try_claim(&candidate) {
            return Ok(candidate);
        }
        tracing::warn!(prefix, attempt, candidate = %candidate, "Identifier collision, retrying");
    }

    Err(CoreError::invariant(format!(
        "could not allocate a unique {} identifier after {} attempts",
        prefix, attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Fixed(&'static str);

    impl ReferenceGenerator for Fixed {
        fn generate(&self, prefix: &str) -> String {
            format!("{}{}", prefix, self.0)
        }
    }

    #[test]
    fn test_generated_format() {
        let id = TimeOrderedGenerator.generate(BOOKING_PREFIX);
        assert!(id.starts_with("BK"));
        assert!(id[2..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(id.len() > 2 + SUFFIX_LEN);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_claim_retries_then_fails() {
        let mut taken: HashSet<String> = HashSet::new();
        taken.insert("TXNSAME".to_string());

        let mut calls = 0;
        let result = claim_unique(&Fixed("SAME"), TRANSACTION_PREFIX, 3, |candidate| {
            calls += 1;
            taken.insert(candidate.to_string())
        });

        assert_eq!(calls, 3);
        assert!(matches!(result, Err(CoreError::InvariantViolation(_))));
    }

    #[test]
    fn test_claim_first_free() {
        let mut taken: HashSet<String> = HashSet::new();
        let id = claim_unique(&TimeOrderedGenerator, BOOKING_PREFIX, DEFAULT_ID_ATTEMPTS, |c| {
            taken.insert(c.to_string())
        })
        .unwrap();
        assert!(taken.contains(&id));
    }
}
