//! Random secret generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;

pub trait CredentialGenerator: Send + Sync {
    /// Opaque random secret of exactly `length` characters.
    fn generate(&self, length: usize) -> String;
}

/// Alphanumeric secrets drawn from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCredentialGenerator;

impl CredentialGenerator for RandomCredentialGenerator {
    fn generate(&self, length: usize) -> String {
        OsRng
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}
