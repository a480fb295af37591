//! Production entropy source.

use sigbridge_core::env::Environment;

/// OS-backed entropy for frame nonces.
///
/// # Panics
///
/// Panics if the OS RNG fails. Intentional: without working entropy the
/// bridge would emit predictable nonces, and RNG failure indicates an
/// OS-level fault the process cannot work around.
#[derive(Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&mut self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_differ() {
        let mut env = SystemEnv::new();
        assert_ne!(env.nonce(), env.nonce());
    }
}
