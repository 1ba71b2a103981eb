//! TTL cache in front of the agent directory.

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use concord_contracts::agent::AgentDescriptor;

use crate::traits::AgentDirectory;

struct CachedAgents {
    agents: Vec<AgentDescriptor>,
    fetched_at: Instant,
}

/// Instance-owned discovery cache.
///
/// Only successful, non-empty fetches are stored; the whole set is replaced
/// at once. The lock is released while the directory is queried.
pub struct DiscoveryCache {
    directory: Box<dyn AgentDirectory>,
    ttl: Duration,
    state: Mutex<Option<CachedAgents>>,
}

impl DiscoveryCache {
    pub fn new(directory: Box<dyn AgentDirectory>, ttl: Duration) -> Self {
        Self {
            directory,
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Every known agent. Directory errors are logged and yield an empty list.
    pub fn all(&self) -> Vec<AgentDescriptor> {
        {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = state.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    debug!(agents = cached.agents.len(), "using cached agent list");
                    return cached.agents.clone();
                }
            }
        }

        let agents = match self.directory.list_agents() {
            Ok(agents) => agents,
            Err(e) => {
                error!(error = %e, "agent discovery failed");
                return Vec::new();
            }
        };

        if agents.is_empty() {
            warn!("agent directory returned no agents");
            return agents;
        }

        info!(agents = agents.len(), "discovered agents");
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = Some(CachedAgents {
            agents: agents.clone(),
            fetched_at: Instant::now(),
        });
        agents
    }

    /// Agents whose names match any of `names` (trimmed, case-insensitive).
    /// An empty `names` means no filter.
    pub fn filtered(&self, names: &[String]) -> Vec<AgentDescriptor> {
        let all = self.all();
        if names.is_empty() {
            return all;
        }
        let matched: Vec<AgentDescriptor> = all
            .into_iter()
            .filter(|a| names.iter().any(|n| a.name_matches(n)))
            .collect();
        debug!(requested = names.len(), matched = matched.len(), "filtered agents");
        matched
    }

    /// Drop the cached set so the next lookup hits the directory.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use concord_contracts::error::{ConcordError, ConcordResult};

    use super::*;

    struct CountingDirectory {
        agents: Vec<AgentDescriptor>,
        fail: bool,
        calls: Arc<Mutex<u32>>,
    }

    impl AgentDirectory for CountingDirectory {
        fn list_agents(&self) -> ConcordResult<Vec<AgentDescriptor>> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ConcordError::Discovery {
                    reason: "directory offline".to_string(),
                });
            }
            Ok(self.agents.clone())
        }
    }

    fn cache(agents: Vec<AgentDescriptor>, fail: bool, ttl: Duration) -> (DiscoveryCache, Arc<Mutex<u32>>) {
        let calls = Arc::new(Mutex::new(0));
        let dir = CountingDirectory {
            agents,
            fail,
            calls: calls.clone(),
        };
        (DiscoveryCache::new(Box::new(dir), ttl), calls)
    }

    fn two_agents() -> Vec<AgentDescriptor> {
        vec![
            AgentDescriptor::new("Inventory Agent", "Planner", "Stock"),
            AgentDescriptor::new("Supplier Agent", "Procurement", "Suppliers"),
        ]
    }

    #[test]
    fn second_lookup_within_ttl_is_cached() {
        let (c, calls) = cache(two_agents(), false, Duration::from_secs(300));
        assert_eq!(c.all().len(), 2);
        assert_eq!(c.all().len(), 2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let (c, calls) = cache(two_agents(), false, Duration::ZERO);
        c.all();
        c.all();
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let (c, calls) = cache(two_agents(), false, Duration::from_secs(300));
        c.all();
        c.invalidate();
        c.all();
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn failures_and_empty_results_are_not_cached() {
        let (c, calls) = cache(two_agents(), true, Duration::from_secs(300));
        assert!(c.all().is_empty());
        assert!(c.all().is_empty());
        assert_eq!(*calls.lock().unwrap(), 2);

        let (c, calls) = cache(vec![], false, Duration::from_secs(300));
        c.all();
        c.all();
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn filter_is_case_insensitive_and_empty_means_all() {
        let (c, _) = cache(two_agents(), false, Duration::from_secs(300));
        let picked = c.filtered(&[" supplier agent ".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Supplier Agent");

        assert_eq!(c.filtered(&[]).len(), 2);
        assert!(c.filtered(&["Nobody".to_string()]).is_empty());
    }
}
