//! Retry configuration and the `@Retry=...` tag grammar.
//!
//! A retry tag looks like `@Retry=failAfter:3,maxDelay:100,initialDelay:50`.
//! Every key is optional; missing keys are filled from the run's default
//! configuration when the scenario executes. `@Retry=disabled` forces a single
//! attempt regardless of the run default.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::normalize_tag;

const RETRY_TAG_PREFIX: &str = "Retry=";

/// Backoff settings for re-attempting a failed scenario. Delays are milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfiguration {
    pub initial_delay: u64,
    pub max_delay: u64,
    pub fail_after: u32,
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        Self {
            initial_delay: 250,
            max_delay: 5000,
            fail_after: 2,
        }
    }
}

impl RetryConfiguration {
    /// Configuration that allows exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            initial_delay: 0,
            max_delay: 0,
            fail_after: 1,
        }
    }

    /// Total number of attempts, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.fail_after.max(1)
    }

    /// Delay to wait before `attempt` (1-based).
    ///
    /// The first attempt starts immediately; attempt `k >= 2` waits
    /// `min(initial_delay * 2^(k-2), max_delay)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 2).unwrap_or(u64::MAX);
        let delay = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        Duration::from_millis(delay)
    }
}

/// Retry settings declared through a tag, before defaults are applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryTag {
    Disabled,
    Configured {
        initial_delay: Option<u64>,
        max_delay: Option<u64>,
        fail_after: Option<u32>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid retry tag '{tag}': {reason}")]
pub struct RetryTagError {
    pub tag: String,
    pub reason: String,
}

impl RetryTag {
    /// Parses a single tag. Returns `None` when the tag is not a retry tag.
    pub fn parse(tag: &str) -> Option<Result<Self, RetryTagError>> {
        let settings = normalize_tag(tag).strip_prefix(RETRY_TAG_PREFIX)?;
        Some(parse_settings(settings).map_err(|reason| RetryTagError {
            tag: tag.to_string(),
            reason,
        }))
    }

    /// Finds the first retry tag in `tags`.
    pub fn from_tags(tags: &[String]) -> Result<Option<Self>, RetryTagError> {
        tags.iter().find_map(|tag| Self::parse(tag)).transpose()
    }

    /// Fills unspecified keys from `fallback`. `None` means retries are disabled.
    pub fn resolve(&self, fallback: &RetryConfiguration) -> Option<RetryConfiguration> {
        match *self {
            Self::Disabled => None,
            Self::Configured {
                initial_delay,
                max_delay,
                fail_after,
            } => Some(RetryConfiguration {
                initial_delay: initial_delay.unwrap_or(fallback.initial_delay),
                max_delay: max_delay.unwrap_or(fallback.max_delay),
                fail_after: fail_after.unwrap_or(fallback.fail_after),
            }),
        }
    }
}

fn parse_settings(settings: &str) -> Result<RetryTag, String> {
    let settings = settings.trim();
    if settings.eq_ignore_ascii_case("disabled") || settings.eq_ignore_ascii_case("false") {
        return Ok(RetryTag::Disabled);
    }

    let mut initial_delay = None;
    let mut max_delay = None;
    let mut fail_after = None;
    for pair in settings.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| format!("expected 'key:value', got '{pair}'"))?;
        let value = value.trim();
        let number: u64 = value
            .parse()
            .map_err(|_| format!("value '{value}' for '{}' is not a non-negative integer", key.trim()))?;
        match key.trim() {
            "initialDelay" => initial_delay = Some(number),
            "maxDelay" => max_delay = Some(number),
            "failAfter" => {
                let attempts = u32::try_from(number).map_err(|_| format!("failAfter {number} is too large"))?;
                fail_after = Some(attempts);
            }
            other => return Err(format!("unknown key '{other}'")),
        }
    }

    Ok(RetryTag::Configured {
        initial_delay,
        max_delay,
        fail_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_retry_tag() {
        let tag = RetryTag::parse("@Retry=failAfter:3,maxDelay:100,initialDelay:50")
            .expect("retry tag")
            .expect("valid tag");
        let resolved = tag.resolve(&RetryConfiguration::default()).expect("enabled");
        assert_eq!(
            resolved,
            RetryConfiguration {
                initial_delay: 50,
                max_delay: 100,
                fail_after: 3,
            }
        );
    }

    #[test]
    fn missing_keys_fall_back() {
        let tag = RetryTag::parse("Retry=failAfter:5").expect("retry tag").expect("valid tag");
        let resolved = tag.resolve(&RetryConfiguration::default()).expect("enabled");
        assert_eq!(resolved.fail_after, 5);
        assert_eq!(resolved.initial_delay, 250);
        assert_eq!(resolved.max_delay, 5000);
    }

    #[test]
    fn non_retry_tags_are_ignored() {
        assert!(RetryTag::parse("@Skip").is_none());
        assert_eq!(RetryTag::from_tags(&["Only".into()]), Ok(None));
    }

    #[test]
    fn malformed_tag_is_an_error() {
        let error = RetryTag::parse("@Retry=failAfter:three").expect("retry tag").expect_err("invalid");
        assert!(error.to_string().contains("not a non-negative integer"), "unexpected: {error}");
        assert!(RetryTag::parse("@Retry=bogus:1").expect("retry tag").is_err());
    }

    #[test]
    fn disabled_tag_resolves_to_none() {
        let tag = RetryTag::parse("@Retry=disabled").expect("retry tag").expect("valid tag");
        assert_eq!(tag.resolve(&RetryConfiguration::default()), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfiguration {
            initial_delay: 50,
            max_delay: 100,
            fail_after: 5,
        };
        assert_eq!(config.delay_before(1), Duration::ZERO);
        assert_eq!(config.delay_before(2), Duration::from_millis(50));
        assert_eq!(config.delay_before(3), Duration::from_millis(100));
        assert_eq!(config.delay_before(4), Duration::from_millis(100));
        assert_eq!(config.delay_before(90), Duration::from_millis(100));
    }
}
