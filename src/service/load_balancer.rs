//! Load balancer — distributes requests across backend servers

use crate::config::{ServerConfig, Strategy};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A single backend server
#[derive(Debug)]
pub struct Backend {
    /// Server URL
    pub url: String,
    /// Weight for weighted balancing
    pub weight: u32,
    healthy: AtomicBool,
    active_connections: AtomicUsize,
}

impl Backend {
    pub(crate) fn new(url: String, weight: u32) -> Self {
        Self {
            url,
            weight,
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Check if this backend is healthy
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Set the health status
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub(crate) fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Active connection count
    pub fn connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Load balancer — selects a healthy backend for each request
#[derive(Debug)]
pub struct LoadBalancer {
    /// Qualified service name
    pub name: String,
    strategy: Strategy,
    backends: Vec<Arc<Backend>>,
    counter: AtomicUsize,
}

impl LoadBalancer {
    /// Create a new load balancer
    pub fn new(name: impl Into<String>, strategy: Strategy, servers: &[ServerConfig]) -> Self {
        Self {
            name: name.into(),
            strategy,
            backends: servers
                .iter()
                .map(|s| Arc::new(Backend::new(s.url.clone(), s.weight)))
                .collect(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Select the next healthy backend
    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        let healthy: Vec<&Arc<Backend>> = self.backends.iter().filter(|b| b.is_healthy()).collect();
        if healthy.is_empty() {
            return None;
        }

        let picked = match self.strategy {
            Strategy::RoundRobin => {
                let idx = self.counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
                healthy[idx]
            }
            Strategy::Weighted => {
                let total: usize = healthy.iter().map(|b| b.weight as usize).sum();
                if total == 0 {
                    healthy[0]
                } else {
                    let mut target = self.counter.fetch_add(1, Ordering::Relaxed) % total;
                    healthy
                        .iter()
                        .find(|b| {
                            let w = b.weight as usize;
                            if target < w {
                                true
                            } else {
                                target -= w;
                                false
                            }
                        })
                        .copied()
                        .unwrap_or(healthy[0])
                }
            }
            Strategy::LeastConnections => healthy
                .iter()
                .copied()
                .min_by_key(|b| b.connections())
                .unwrap_or(healthy[0]),
        };
        Some(picked.clone())
    }

    /// All backends, healthy or not
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Number of healthy backends
    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }

    /// Total number of backends
    pub fn total_count(&self) -> usize {
        self.backends.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(specs: &[(&str, u32)]) -> Vec<ServerConfig> {
        specs
            .iter()
            .map(|(url, weight)| ServerConfig {
                url: url.to_string(),
                weight: *weight,
            })
            .collect()
    }

    fn lb(strategy: Strategy, specs: &[(&str, u32)]) -> LoadBalancer {
        LoadBalancer::new("svc@file", strategy, &servers(specs))
    }

    #[test]
    fn test_round_robin_cycles() {
        let lb = lb(
            Strategy::RoundRobin,
            &[("http://a:8001", 1), ("http://b:8002", 1), ("http://c:8003", 1)],
        );
        let urls: Vec<String> = (0..6).map(|_| lb.next_backend().unwrap().url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "http://a:8001",
                "http://b:8002",
                "http://c:8003",
                "http://a:8001",
                "http://b:8002",
                "http://c:8003"
            ]
        );
    }

    #[test]
    fn test_round_robin_skips_unhealthy() {
        let lb = lb(Strategy::RoundRobin, &[("http://a:8001", 1), ("http://b:8002", 1)]);
        lb.backends()[0].set_healthy(false);
        for _ in 0..3 {
            assert_eq!(lb.next_backend().unwrap().url, "http://b:8002");
        }
    }

    #[test]
    fn test_all_unhealthy_returns_none() {
        let lb = lb(Strategy::RoundRobin, &[("http://a:8001", 1)]);
        lb.backends()[0].set_healthy(false);
        assert!(lb.next_backend().is_none());
    }

    #[test]
    fn test_weighted_distribution_is_exact_per_cycle() {
        let lb = lb(Strategy::Weighted, &[("http://a:8001", 3), ("http://b:8002", 1)]);
        let a = (0..8)
            .filter(|_| lb.next_backend().unwrap().url == "http://a:8001")
            .count();
        assert_eq!(a, 6);
    }

    #[test]
    fn test_weighted_zero_total_falls_back_to_first() {
        let lb = lb(Strategy::Weighted, &[("http://a:8001", 0), ("http://b:8002", 0)]);
        assert_eq!(lb.next_backend().unwrap().url, "http://a:8001");
    }

    #[test]
    fn test_least_connections() {
        let lb = lb(
            Strategy::LeastConnections,
            &[("http://a:8001", 1), ("http://b:8002", 1)],
        );
        lb.backends()[0].inc_connections();
        lb.backends()[0].inc_connections();
        assert_eq!(lb.next_backend().unwrap().url, "http://b:8002");
    }

    #[test]
    fn test_backend_state() {
        let b = Backend::new("http://test:8001".to_string(), 1);
        assert!(b.is_healthy());
        b.set_healthy(false);
        assert!(!b.is_healthy());

        b.inc_connections();
        b.inc_connections();
        b.dec_connections();
        assert_eq!(b.connections(), 1);
    }

    #[test]
    fn test_counts() {
        let lb = lb(
            Strategy::RoundRobin,
            &[("http://a:8001", 1), ("http://b:8002", 1), ("http://c:8003", 1)],
        );
        lb.backends()[1].set_healthy(false);
        assert_eq!(lb.healthy_count(), 2);
        assert_eq!(lb.total_count(), 3);
    }

    #[test]
    fn test_empty_backends() {
        let lb = lb(Strategy::RoundRobin, &[]);
        assert!(lb.next_backend().is_none());
        assert_eq!(lb.total_count(), 0);
    }
}
