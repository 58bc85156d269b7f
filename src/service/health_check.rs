//! Health checker — active HTTP probes that flip backend health

use super::LoadBalancer;
use crate::config::HealthCheckConfig;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive probe results for one backend
#[derive(Debug, Clone, Copy, Default)]
struct Streak {
    successes: u32,
    failures: u32,
}

/// Active health checker that periodically probes every backend of a
/// load balancer
pub struct HealthChecker {
    lb: Arc<LoadBalancer>,
    client: reqwest::Client,
    path: String,
    interval: Duration,
    unhealthy_threshold: u32,
    healthy_threshold: u32,
    streaks: Vec<Streak>,
}

impl HealthChecker {
    /// Create a checker for `lb` from its service's health check section
    pub fn new(lb: Arc<LoadBalancer>, config: &HealthCheckConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout_duration().unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .unwrap_or_default();
        let streaks = vec![Streak::default(); lb.backends().len()];
        Self {
            lb,
            client,
            path: config.path.clone(),
            interval: config.interval_duration().unwrap_or(DEFAULT_INTERVAL),
            unhealthy_threshold: config.unhealthy_threshold.max(1),
            healthy_threshold: config.healthy_threshold.max(1),
            streaks,
        }
    }

    /// Probe loop; runs until the task is aborted
    pub async fn run(mut self) {
        loop {
            self.check_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Probe every backend once and apply the thresholds
    pub async fn check_once(&mut self) {
        for (backend, streak) in self.lb.backends().iter().zip(self.streaks.iter_mut()) {
            let url = format!("{}{}", backend.url.trim_end_matches('/'), self.path);
            let ok = matches!(
                self.client.get(&url).send().await,
                Ok(resp) if resp.status().is_success()
            );

            if ok {
                streak.successes = streak.successes.saturating_add(1);
                streak.failures = 0;
                if !backend.is_healthy() && streak.successes >= self.healthy_threshold {
                    backend.set_healthy(true);
                    tracing::info!(service = self.lb.name.as_str(), backend = backend.url.as_str(), "Backend marked healthy");
                }
            } else {
                streak.failures = streak.failures.saturating_add(1);
                streak.successes = 0;
                if backend.is_healthy() && streak.failures >= self.unhealthy_threshold {
                    backend.set_healthy(false);
                    tracing::warn!(service = self.lb.name.as_str(), backend = backend.url.as_str(), "Backend marked unhealthy");
                }
            }
        }
    }
}
