//! The configuration surface (spec.md §6). Every recognized option has a
//! spec-mandated or RFC default; construction rejects nothing by itself —
//! unknown options are rejected at the point they're parsed from an
//! external format (see the `config-serde` feature), not here.

use crate::flow::ThresholdStrategy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub worker_pool_size: usize,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
    pub idle_timeout: Duration,
    pub rapid_reset_threshold_ms: u64,
    pub rapid_reset_window: Duration,
    pub enable_push: bool,
    pub flow_control_strategy: ThresholdStrategy,
}

impl Default for Config {
    fn default() -> Self {
        use crate::frame::types::*;
        Self {
            worker_pool_size: num_cpus_fallback(),
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: DEFAULT_MAX_HEADER_LIST_SIZE,
            idle_timeout: Duration::from_secs(300),
            rapid_reset_threshold_ms: 100,
            rapid_reset_window: Duration::from_secs(60),
            enable_push: DEFAULT_ENABLE_PUSH != 0,
            flow_control_strategy: ThresholdStrategy::Moderate,
        }
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(feature = "config-serde")]
mod serde_support {
    use super::Config;
    use serde::Deserialize;
    use std::time::Duration;

    /// Mirrors [`Config`] field-for-field so unrecognized JSON keys are
    /// rejected by `#[serde(deny_unknown_fields)]` instead of silently
    /// ignored, per spec.md §6 ("unknown options rejected").
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields, default)]
    struct RawConfig {
        worker_pool_size: usize,
        max_concurrent_streams: u32,
        initial_window_size: u32,
        max_frame_size: u32,
        max_header_list_size: u32,
        idle_timeout_secs: u64,
        rapid_reset_threshold_ms: u64,
        rapid_reset_window_secs: u64,
        enable_push: bool,
    }

    impl Default for RawConfig {
        fn default() -> Self {
            let c = Config::default();
            Self {
                worker_pool_size: c.worker_pool_size,
                max_concurrent_streams: c.max_concurrent_streams,
                initial_window_size: c.initial_window_size,
                max_frame_size: c.max_frame_size,
                max_header_list_size: c.max_header_list_size,
                idle_timeout_secs: c.idle_timeout.as_secs(),
                rapid_reset_threshold_ms: c.rapid_reset_threshold_ms,
                rapid_reset_window_secs: c.rapid_reset_window.as_secs(),
                enable_push: c.enable_push,
            }
        }
    }

    impl Config {
        pub fn from_json(data: &str) -> serde_json::Result<Self> {
            let raw: RawConfig = serde_json::from_str(data)?;
            Ok(Self {
                worker_pool_size: raw.worker_pool_size,
                max_concurrent_streams: raw.max_concurrent_streams,
                initial_window_size: raw.initial_window_size,
                max_frame_size: raw.max_frame_size,
                max_header_list_size: raw.max_header_list_size,
                idle_timeout: Duration::from_secs(raw.idle_timeout_secs),
                rapid_reset_threshold_ms: raw.rapid_reset_threshold_ms,
                rapid_reset_window: Duration::from_secs(raw.rapid_reset_window_secs),
                enable_push: raw.enable_push,
                ..Config::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc_values() {
        let config = Config::default();
        assert_eq!(config.initial_window_size, 65_535);
        assert_eq!(config.max_frame_size, 16_384);
        assert_eq!(config.max_concurrent_streams, 100);
        assert!(!config.enable_push);
    }

    #[cfg(feature = "config-serde")]
    #[test]
    fn unknown_field_is_rejected() {
        let err = Config::from_json(r#"{"bogus_option": 1}"#);
        assert!(err.is_err());
    }

    #[cfg(feature = "config-serde")]
    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = Config::from_json(r#"{"max_concurrent_streams": 42}"#).unwrap();
        assert_eq!(config.max_concurrent_streams, 42);
        assert_eq!(config.initial_window_size, 65_535);
    }
}
