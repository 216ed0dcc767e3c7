use std::fmt;
use std::str::FromStr;

use sha3::{Digest, Sha3_256};

use crate::plugins::PluginSet;

/// Deterministic identifier for a plugin set, used as the build cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash the canonically ordered plugin list. The separator byte keeps
    /// adjacent module names from colliding.
    pub fn of(plugins: &PluginSet) -> Self {
        let mut hasher = Sha3_256::new();
        for plugin in plugins.plugins() {
            hasher.update(plugin.module().as_bytes());
            hasher.update([0u8]);
        }
        Self(hasher.finalize().into())
    }

    /// A short prefix suitable for an image tag.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Ok(Self(
            bytes
                .try_into()
                .map_err(|_| hex::FromHexError::InvalidStringLength)?,
        ))
    }
}
