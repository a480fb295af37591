//! Entropy abstraction for deterministic testing.
//!
//! The only ambient resource the arbitration core consumes is randomness
//! (frame nonces). Decoupling it behind a trait lets driver tests run with
//! a fixed sequence while production uses the OS RNG. Time is deliberately
//! not abstracted here: the driver receives its cadences as events, so it
//! never reads a clock.

/// Source of frame-nonce entropy.
pub trait Environment: Send + 'static {
    /// Fill the buffer with random bytes.
    ///
    /// Production implementations use cryptographically secure entropy;
    /// test implementations may be deterministic.
    fn random_bytes(&mut self, buffer: &mut [u8]);

    /// A fresh 4-byte frame nonce.
    fn nonce(&mut self) -> [u8; 4] {
        let mut nonce = [0u8; 4];
        self.random_bytes(&mut nonce);
        nonce
    }
}

/// Deterministic counter entropy for tests.
#[derive(Debug, Default)]
pub struct CountingEnv(u32);

impl Environment for CountingEnv {
    fn random_bytes(&mut self, buffer: &mut [u8]) {
        for chunk in buffer.chunks_mut(4) {
            self.0 = self.0.wrapping_add(1);
            let bytes = self.0.to_be_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_env_is_deterministic() {
        let mut env = CountingEnv::default();
        assert_eq!(env.nonce(), [0, 0, 0, 1]);
        assert_eq!(env.nonce(), [0, 0, 0, 2]);

        let mut again = CountingEnv::default();
        assert_eq!(again.nonce(), [0, 0, 0, 1]);
    }
}
