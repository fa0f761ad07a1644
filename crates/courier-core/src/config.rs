use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Throughput limits applied to outbound calls.
///
/// Rates of zero (or periods of zero) disable the corresponding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Calls admitted across all chats per `overall_time_period`.
    pub overall_max_rate: usize,
    /// Length of the global window, in seconds.
    pub overall_time_period: f64,
    /// Calls admitted per group chat per `group_time_period`.
    pub group_max_rate: usize,
    /// Length of each group window, in seconds.
    pub group_time_period: f64,
    /// Minimum spacing between consecutive calls, in seconds.
    pub min_delay_sec: f64,
    /// Network-error retries per call. Server-mandated waits never count.
    pub max_retries: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            overall_max_rate: 25,
            overall_time_period: 1.0,
            group_max_rate: 18,
            group_time_period: 60.0,
            min_delay_sec: 0.0,
            max_retries: 2,
        }
    }
}

impl LimiterConfig {
    /// Read limits from `RATE_LIMIT_*` variables, falling back to defaults
    /// for anything missing or unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            overall_max_rate: parse_rate(
                lookup("RATE_LIMIT_OVERALL_MAX"),
                defaults.overall_max_rate,
            ),
            overall_time_period: parse_seconds(
                lookup("RATE_LIMIT_OVERALL_PERIOD"),
                defaults.overall_time_period,
            ),
            group_max_rate: parse_rate(lookup("RATE_LIMIT_GROUP_MAX"), defaults.group_max_rate),
            group_time_period: parse_seconds(
                lookup("RATE_LIMIT_GROUP_PERIOD"),
                defaults.group_time_period,
            ),
            min_delay_sec: parse_seconds(
                lookup("RATE_LIMIT_MIN_DELAY_SEC"),
                defaults.min_delay_sec,
            ),
            max_retries: lookup("RATE_LIMIT_MAX_RETRIES")
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .map_or(defaults.max_retries, |n| n.clamp(0, i64::from(u32::MAX)) as u32),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("overall_time_period", self.overall_time_period),
            ("group_time_period", self.group_time_period),
            ("min_delay_sec", self.min_delay_sec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn overall_period(&self) -> Duration {
        seconds(self.overall_time_period)
    }

    pub fn group_period(&self) -> Duration {
        seconds(self.group_time_period)
    }

    pub fn min_delay(&self) -> Duration {
        seconds(self.min_delay_sec)
    }
}

/// Top-level configuration for a courier process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Bot API token. Falls back to `BOT_TOKEN` when absent.
    pub bot_token: Option<String>,
    pub limits: LimiterConfig,
}

impl CourierConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        // Try to load .env file if it exists (ignore if it doesn't)
        let _ = dotenvy::dotenv();
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        config.limits.validate()?;
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bot_token = lookup("BOT_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Self {
            bot_token,
            limits: LimiterConfig::from_lookup(lookup),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.limits.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Token from the config, or from `BOT_TOKEN` in the environment.
    pub fn resolve_token(&self) -> Option<String> {
        self.bot_token
            .clone()
            .or_else(|| std::env::var("BOT_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Negative rates disable the window, like zero.
fn parse_rate(raw: Option<String>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map_or(default, |n| usize::try_from(n.max(0)).unwrap_or(usize::MAX))
}

/// Accepts decimal commas ("0,5").
fn parse_seconds(raw: Option<String>, default: f64) -> f64 {
    raw.and_then(|value| value.trim().replace(',', ".").parse::<f64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_platform_limits() {
        let config = LimiterConfig::default();
        assert_eq!(config.overall_max_rate, 25);
        assert_eq!(config.overall_period(), Duration::from_secs(1));
        assert_eq!(config.group_max_rate, 18);
        assert_eq!(config.group_period(), Duration::from_secs(60));
        assert_eq!(config.min_delay(), Duration::ZERO);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_reads_overrides_from_lookup() {
        let config = CourierConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", " 123:abc "),
            ("RATE_LIMIT_OVERALL_MAX", "30"),
            ("RATE_LIMIT_GROUP_PERIOD", "30,5"),
            ("RATE_LIMIT_MIN_DELAY_SEC", "0.2"),
            ("RATE_LIMIT_MAX_RETRIES", "5"),
        ]));
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.limits.overall_max_rate, 30);
        assert!((config.limits.group_time_period - 30.5).abs() < f64::EPSILON);
        assert_eq!(config.limits.min_delay(), Duration::from_millis(200));
        assert_eq!(config.limits.max_retries, 5);
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = LimiterConfig::from_lookup(lookup_from(&[
            ("RATE_LIMIT_OVERALL_MAX", "lots"),
            ("RATE_LIMIT_OVERALL_PERIOD", ""),
            ("RATE_LIMIT_MAX_RETRIES", "two"),
        ]));
        assert_eq!(config, LimiterConfig::default());
    }

    #[test]
    fn test_negative_rate_disables_window() {
        let config = LimiterConfig::from_lookup(lookup_from(&[("RATE_LIMIT_GROUP_MAX", "-1")]));
        assert_eq!(config.group_max_rate, 0);
    }

    #[test]
    fn test_validate_rejects_negative_periods() {
        let config = LimiterConfig {
            min_delay_sec: -0.5,
            ..LimiterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LimiterConfig {
            overall_time_period: f64::NAN,
            ..LimiterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_fills_missing_fields_with_defaults() {
        let config = CourierConfig::from_yaml_str(
            "limits:\n  group_max_rate: 10\n  min_delay_sec: 0.05\n",
        )
        .unwrap();
        assert_eq!(config.bot_token, None);
        assert_eq!(config.limits.group_max_rate, 10);
        assert_eq!(config.limits.overall_max_rate, 25);
        assert_eq!(config.limits.min_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_yaml_file_is_validated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "limits:\n  group_time_period: -3").unwrap();

        let err = CourierConfig::from_yaml_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("group_time_period"));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = CourierConfig::from_yaml_str("limits: [not, a, map]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
