//! Configuration Module - Allocator Tuning Parameters
//!
//! Most users never need to touch this; `AllocConfig::from_env` is what the
//! global allocator samples once, lazily, on first use.

use crate::error::{AllocError, Result};
use serde::{Deserialize, Serialize};

/// Allocator-wide tuning knobs, read from an optional TOML config by
/// `rt-cli` and merged with the `RT_ALLOC_PURIFY` environment variable.
///
/// # Examples
///
/// ```rust
/// use rt_alloc::AllocConfig;
///
/// let config = AllocConfig::default();
/// assert!(!config.purify_mode);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocConfig {
    /// Bypass the bucket cache entirely and route every request straight to
    /// the system allocator. Mirrors `tclAllocPurify.c`'s passthrough build;
    /// useful under sanitizers that need to see every individual `malloc`.
    pub purify_mode: bool,

    /// Override how many blocks move between a thread's cache and the
    /// shared spill cache per refill/spill, for every bucket. `None` keeps
    /// the geometric default derived from the bucket table.
    pub num_move_override: Option<usize>,

    /// Override the per-bucket high-water mark that triggers a spill to the
    /// shared cache. `None` keeps the geometric default.
    pub max_blocks_override: Option<usize>,
}

impl Default for AllocConfig {
    fn default() -> Self {
        AllocConfig {
            purify_mode: false,
            num_move_override: None,
            max_blocks_override: None,
        }
    }
}

impl AllocConfig {
    /// Build a configuration from `RT_ALLOC_PURIFY` (any of `1`/`true`/`yes`,
    /// case-insensitively, enables purify mode). Everything else uses
    /// defaults; `rt-cli` layers a TOML file on top of this before calling
    /// `rt_alloc::configure`.
    pub fn from_env() -> Self {
        let purify_mode = std::env::var("RT_ALLOC_PURIFY")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        AllocConfig {
            purify_mode,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_move_override {
            if n == 0 {
                return Err(AllocError::Configuration(
                    "num_move_override must be nonzero".into(),
                ));
            }
        }
        if let Some(n) = self.max_blocks_override {
            if n == 0 {
                return Err(AllocError::Configuration(
                    "max_blocks_override must be nonzero".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_purify() {
        assert!(!AllocConfig::default().purify_mode);
    }

    #[test]
    fn rejects_zero_overrides() {
        let mut cfg = AllocConfig::default();
        cfg.num_move_override = Some(0);
        assert!(cfg.validate().is_err());
    }
}
