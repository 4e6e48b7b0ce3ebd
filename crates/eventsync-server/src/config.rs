//! Sync configuration.

use std::time::Duration;

use chrono_tz::Tz;
use eventsync_providers::{DEFAULT_GEOCODING_DOMAIN, EventTransformer, SiteConfig};

use crate::error::ConfigError;

/// Retry schedule for push deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Builder: set max attempts (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.multiplier = multiplier;
        self
    }

    /// Delay to wait after `failed_attempts` consecutive failures.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        exponential_backoff(
            self.initial_backoff,
            self.max_backoff,
            self.multiplier,
            failed_attempts,
        )
    }
}

/// `initial * multiplier^(failures - 1)`, capped at `max`; zero before any failure.
pub(crate) fn exponential_backoff(
    initial: Duration,
    max: Duration,
    multiplier: f64,
    failures: u32,
) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let delay = initial.as_secs_f64() * multiplier.powi(failures as i32 - 1);
    Duration::from_secs_f64(delay.min(max.as_secs_f64()))
}

/// Everything the sync engine needs to know about its environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote calendar to mirror.
    pub calendar_id: String,
    /// Zone local dates and times are expressed in.
    pub timezone: Tz,
    /// Public site, used to link pushed events back to their page.
    pub site: Option<SiteConfig>,
    pub geocoding_domain: String,
    pub pull_interval: Duration,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a configuration for a calendar, in UTC.
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            timezone: Tz::UTC,
            site: None,
            geocoding_domain: DEFAULT_GEOCODING_DOMAIN.to_string(),
            pull_interval: Duration::from_secs(900),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = Some(site);
        self
    }

    pub fn with_geocoding_domain(mut self, domain: impl Into<String>) -> Self {
        self.geocoding_domain = domain.into();
        self
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the transformer for this calendar and site.
    pub fn transformer(&self) -> Result<EventTransformer, ConfigError> {
        let transformer = EventTransformer::new(self.calendar_id.clone(), self.timezone);
        match &self.site {
            Some(site) => {
                let url = site.base_url().map_err(|source| ConfigError::InvalidSiteUrl {
                    domain: site.domain.clone(),
                    source,
                })?;
                Ok(transformer.with_site_url(url))
            }
            None => Ok(transformer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SyncConfig::new("primary");
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.geocoding_domain, "maps.googleapis.com");
        assert_eq!(config.pull_interval, Duration::from_secs(900));
        assert!(config.site.is_none());
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let retry = RetryPolicy::default().with_backoff(
            Duration::from_secs(1),
            Duration::from_secs(10),
            2.0,
        );

        assert_eq!(retry.backoff_delay(0), Duration::ZERO);
        assert_eq!(retry.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(retry.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(retry.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(retry.backoff_delay(8), Duration::from_secs(10));
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn transformer_carries_site_url() {
        let config = SyncConfig::new("primary")
            .with_timezone(chrono_tz::Europe::London)
            .with_site(SiteConfig::new("events.example.org"));
        let transformer = config.transformer().unwrap();
        assert_eq!(transformer.calendar_id(), "primary");
        assert_eq!(transformer.timezone(), chrono_tz::Europe::London);
    }

    #[test]
    fn bad_site_domain_is_reported() {
        let config = SyncConfig::new("primary").with_site(SiteConfig::new("bad domain"));
        let err = config.transformer().unwrap_err();
        assert!(err.to_string().contains("bad domain"));
    }
}
