//! Request id generation.

use rand::Rng;

/// Produces correlation ids of the form `<prefix>-<counter>`.
///
/// The prefix is random per generator, so two engines in the same process
/// (or a reconnecting client talking to a server with a long memory) do
/// not hand out colliding ids. The counter makes ids unique within one
/// generator for its whole lifetime.
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    counter: u64,
}

impl RequestIdGenerator {
    /// Creates a generator with a fresh random prefix.
    pub fn new() -> Self {
        Self::with_prefix(random_prefix())
    }

    /// Creates a generator with a fixed prefix. Useful in tests, where
    /// predictable ids make assertions readable.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }

    /// Returns the next id.
    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}-{}", self.prefix, self.counter)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Eight lowercase hex characters (32 bits of randomness).
fn random_prefix() -> String {
    let bytes: [u8; 4] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_next_id_is_prefixed_and_sequential() {
        let mut ids = RequestIdGenerator::with_prefix("t");
        assert_eq!(ids.next_id(), "t-1");
        assert_eq!(ids.next_id(), "t-2");
    }

    #[test]
    fn test_next_id_never_repeats() {
        let mut ids = RequestIdGenerator::new();
        let seen: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_random_prefix_is_eight_hex_chars() {
        let prefix = random_prefix();
        assert_eq!(prefix.len(), 8);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_safe_for_the_req_id_scanner() {
        // No quotes or backslashes, so the permissive scanner can read them.
        let id = RequestIdGenerator::new().next_id();
        assert!(!id.contains('"') && !id.contains('\\'));
    }
}
