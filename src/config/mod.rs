// src/config/mod.rs
//! Immutable orchestrator configuration.
//!
//! Loaded once at startup and handed to each queue, pool and job by value.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "ORCHESTRATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/orchestrator.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub queues: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub recovery: RecoveryConfig,
    pub briefing: BriefingConfig,
    pub email: EmailConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub fetch_capacity: usize,
    pub briefing_capacity: usize,
    pub fetch_workers: usize,
    pub briefing_workers: usize,
    /// How long an idle worker waits on the queue before re-checking shutdown.
    pub poll_timeout_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            fetch_capacity: 100,
            briefing_capacity: 20,
            fetch_workers: 4,
            briefing_workers: 1,
            poll_timeout_ms: 1_000,
            shutdown_grace_secs: 30,
        }
    }
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub feed_interval_secs: u64,
    pub briefing_interval_secs: u64,
    /// Coarse pre-filter for the fetch candidate query. Keep it at or below
    /// the smallest refresh interval any source may have.
    pub fetch_cutoff_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            feed_interval_secs: 60,
            briefing_interval_secs: 60,
            fetch_cutoff_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub interval_secs: u64,
    pub source_threshold_minutes: i64,
    pub item_threshold_minutes: i64,
    pub briefing_threshold_minutes: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            source_threshold_minutes: 10,
            item_threshold_minutes: 10,
            briefing_threshold_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefingConfig {
    pub top_items: usize,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self { top_items: 10 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_user: String,
    /// "ENV" means: read from SMTP_PASS.
    pub smtp_pass: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "briefing-orchestrator/0.1".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: OrchestratorConfig = toml::from_str(s).context("parsing orchestrator toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading orchestrator config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $ORCHESTRATOR_CONFIG_PATH (must exist)
    /// 2) config/orchestrator.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied last.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        let mut cfg = base.with_env_overrides().sanitized();
        if cfg.email.enabled && cfg.email.smtp_pass.trim().eq_ignore_ascii_case("env") {
            cfg.email.smtp_pass = std::env::var("SMTP_PASS")
                .map_err(|_| anyhow!("Missing SMTP_PASS env var"))?;
        }
        Ok(cfg)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_usize("FETCH_WORKERS") {
            self.queues.fetch_workers = v;
        }
        if let Some(v) = env_usize("BRIEFING_WORKERS") {
            self.queues.briefing_workers = v;
        }
        if let Some(v) = env_usize("FETCH_QUEUE_CAPACITY") {
            self.queues.fetch_capacity = v;
        }
        if let Some(v) = env_usize("BRIEFING_QUEUE_CAPACITY") {
            self.queues.briefing_capacity = v;
        }
        self
    }

    /// Zero sizes would deadlock a pool or reject every enqueue; clamp to 1.
    fn sanitized(mut self) -> Self {
        let q = &mut self.queues;
        q.fetch_capacity = q.fetch_capacity.max(1);
        q.briefing_capacity = q.briefing_capacity.max(1);
        q.fetch_workers = q.fetch_workers.max(1);
        q.briefing_workers = q.briefing_workers.max(1);
        self.briefing.top_items = self.briefing.top_items.max(1);
        self.scheduler.fetch_cutoff_minutes = self.scheduler.fetch_cutoff_minutes.max(0);
        self
    }
}

// parse optional usize env; invalid values are ignored
fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn defaults_match_documented_values() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.queues.fetch_workers, 4);
        assert_eq!(cfg.queues.briefing_workers, 1);
        assert_eq!(cfg.scheduler.feed_interval_secs, 60);
        assert_eq!(cfg.recovery.interval_secs, 300);
        assert_eq!(cfg.recovery.source_threshold_minutes, 10);
        assert_eq!(cfg.recovery.item_threshold_minutes, 10);
        assert_eq!(cfg.recovery.briefing_threshold_minutes, 15);
        assert_eq!(cfg.briefing.top_items, 10);
    }

    #[test]
    fn partial_toml_keeps_defaults_and_clamps_zeroes() {
        let cfg = OrchestratorConfig::from_toml_str(
            r#"
            [queues]
            fetch_workers = 0
            fetch_capacity = 7

            [recovery]
            briefing_threshold_minutes = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.queues.fetch_workers, 1);
        assert_eq!(cfg.queues.fetch_capacity, 7);
        assert_eq!(cfg.queues.briefing_capacity, 20);
        assert_eq!(cfg.recovery.briefing_threshold_minutes, 30);
        assert_eq!(cfg.recovery.source_threshold_minutes, 10);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_path_then_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("orchestrator.toml");
        fs::write(&p, "[queues]\nfetch_workers = 2\nbriefing_workers = 3\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("BRIEFING_WORKERS", "5");
        env::set_var("FETCH_QUEUE_CAPACITY", "not-a-number");
        let cfg = OrchestratorConfig::load_default().unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var("BRIEFING_WORKERS");
        env::remove_var("FETCH_QUEUE_CAPACITY");

        assert_eq!(cfg.queues.fetch_workers, 2);
        assert_eq!(cfg.queues.briefing_workers, 5);
        assert_eq!(cfg.queues.fetch_capacity, 100);
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        let res = OrchestratorConfig::load_default();
        env::remove_var(ENV_CONFIG_PATH);
        assert!(res.is_err());
    }
}
