//! Connection Limiter Service
//!
//! Two-tier slot accounting for a probe batch: a global pool bounding all
//! in-flight probes and one pool per upstream host. Host pools are created up
//! front for every host in the batch and live exactly as long as the batch.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::per_host_slots;

/// Slots held by one in-flight probe
///
/// Dropping the permit returns the host slot and the global slot. Drop runs on
/// normal completion, early return and unwinding alike.
#[derive(Debug)]
pub struct ProbePermit {
    _host: Option<OwnedSemaphorePermit>,
    _global: OwnedSemaphorePermit,
}

/// Global plus per-host concurrency limiter
#[derive(Debug)]
pub struct HostLimiter {
    global: Arc<Semaphore>,
    hosts: HashMap<String, Arc<Semaphore>>,
    global_limit: usize,
    per_host_limit: usize,
}

impl HostLimiter {
    /// Create a limiter with no host pools yet
    ///
    /// The per-host limit is resolved with [`per_host_slots`].
    pub fn new(concurrency: usize, per_host_limit: usize) -> Self {
        let per_host_limit = per_host_slots(concurrency, per_host_limit);
        Self {
            global: Arc::new(Semaphore::new(concurrency)),
            hosts: HashMap::new(),
            global_limit: concurrency,
            per_host_limit,
        }
    }

    /// Create a limiter with a pool for each distinct host
    pub fn for_hosts<I, S>(concurrency: usize, per_host_limit: usize, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut limiter = Self::new(concurrency, per_host_limit);
        for host in hosts {
            limiter.register_host(host);
        }
        debug!(
            "Limiter ready: {} global slots, {} per host across {} hosts",
            limiter.global_limit,
            limiter.per_host_limit,
            limiter.hosts.len()
        );
        limiter
    }

    /// Add a pool for `host` unless one exists
    pub fn register_host(&mut self, host: impl Into<String>) {
        let limit = self.per_host_limit;
        self.hosts
            .entry(host.into())
            .or_insert_with(|| Arc::new(Semaphore::new(limit)));
    }

    /// Wait for a global slot, then for a slot of `host`
    ///
    /// Hosts without a pool only take a global slot.
    pub async fn acquire(&self, host: &str) -> Result<ProbePermit, AcquireError> {
        let global = self.global.clone().acquire_owned().await?;
        let host_permit = match self.hosts.get(host) {
            Some(pool) => Some(pool.clone().acquire_owned().await?),
            None => None,
        };
        Ok(ProbePermit {
            _host: host_permit,
            _global: global,
        })
    }

    pub fn per_host_limit(&self) -> usize {
        self.per_host_limit
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Free global slots right now
    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    /// Free slots for `host`, if it has a pool
    pub fn available_for_host(&self, host: &str) -> Option<usize> {
        self.hosts.get(host).map(|pool| pool.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_hold_both_tiers_until_dropped() {
        let limiter = HostLimiter::for_hosts(3, 2, ["a.example", "b.example"]);
        assert_eq!(limiter.host_count(), 2);

        let first = limiter.acquire("a.example").await.unwrap();
        let second = limiter.acquire("a.example").await.unwrap();
        assert_eq!(limiter.available_global(), 1);
        assert_eq!(limiter.available_for_host("a.example"), Some(0));
        assert_eq!(limiter.available_for_host("b.example"), Some(2));

        // Host a is full, so a third acquire must wait even though a global slot is free
        let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.acquire("a.example")).await;
        assert!(blocked.is_err());

        drop(first);
        drop(second);
        assert_eq!(limiter.available_global(), 3);
        assert_eq!(limiter.available_for_host("a.example"), Some(2));
    }

    #[tokio::test]
    async fn unknown_host_takes_only_global_slot() {
        let limiter = HostLimiter::for_hosts(2, 1, ["known"]);
        let permit = limiter.acquire("unknown").await.unwrap();
        assert_eq!(limiter.available_global(), 1);
        assert_eq!(limiter.available_for_host("known"), Some(1));
        assert_eq!(limiter.available_for_host("unknown"), None);
        drop(permit);
        assert_eq!(limiter.available_global(), 2);
    }

    #[test]
    fn per_host_limit_is_clamped() {
        assert_eq!(HostLimiter::new(4, 0).per_host_limit(), 4);
        assert_eq!(HostLimiter::new(4, 10).per_host_limit(), 4);
        assert_eq!(HostLimiter::new(4, 2).per_host_limit(), 2);
    }

    #[test]
    fn registering_a_host_twice_keeps_one_pool() {
        let mut limiter = HostLimiter::new(5, 2);
        limiter.register_host("h");
        limiter.register_host("h".to_string());
        assert_eq!(limiter.host_count(), 1);
    }

    #[tokio::test]
    async fn panicking_holder_releases_both_slots() {
        let limiter = Arc::new(HostLimiter::for_hosts(2, 1, ["h"]));

        let task_limiter = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = task_limiter.acquire("h").await.unwrap();
            panic!("probe blew up");
        });
        assert!(handle.await.unwrap_err().is_panic());

        assert_eq!(limiter.available_global(), 2);
        assert_eq!(limiter.available_for_host("h"), Some(1));
    }
}
