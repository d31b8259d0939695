//! Per-bucket configuration, recognised keys per spec.md §6.

use serde::{Deserialize, Serialize};

fn default_download_size_limit() -> u64 {
    1_073_741_824 // 1 GiB
}

/// Configuration for one bucket/filesystem root. Deserialised from
/// YAML the way the teacher deserialised `PipelineSpec` with
/// `serde_yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Cap on readable chunk size in bytes; `0` disables enforcement.
    #[serde(default = "default_download_size_limit")]
    pub download_size_limit: u64,

    /// When true, all mutating operations fail with `ACCESS_DENIED`.
    #[serde(default)]
    pub read_only: bool,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            download_size_limit: default_download_size_limit(),
            read_only: false,
        }
    }
}

impl BucketConfig {
    /// `true` if `size` exceeds the configured limit (a `0` limit
    /// disables enforcement entirely).
    pub fn exceeds_limit(&self, size: u64) -> bool {
        self.download_size_limit != 0 && size > self.download_size_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_disables_enforcement() {
        let cfg = BucketConfig {
            download_size_limit: 0,
            read_only: false,
        };
        assert!(!cfg.exceeds_limit(u64::MAX));
    }

    #[test]
    fn limit_equal_to_size_is_accepted() {
        let cfg = BucketConfig {
            download_size_limit: 100,
            read_only: false,
        };
        assert!(!cfg.exceeds_limit(100));
        assert!(cfg.exceeds_limit(101));
    }
}
