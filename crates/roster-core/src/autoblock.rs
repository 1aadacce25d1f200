//! Escalating auto-block manager.
//!
//! Tracks a trigger counter per opaque client identity. Enough triggers put
//! the client at block level 0; further triggers while blocked escalate
//! through the configured levels, each with its own block duration. Elapsed
//! quiet time forgives triggers at the level's decay rate. The manager only
//! decides *when* and *for how long* to block; enforcement is the
//! `on_client_blocked` callback's job.
//!
//! All time arithmetic uses the monotonic clock. The map tolerates
//! concurrent invocation: updates to any one key run inside that key's
//! critical section, and the periodic sweep iterates weakly consistently.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{AutoBlockConfig, BlockLevel};

/// Callback invoked with the client identity and the block duration in
/// seconds every time the manager decides to (re-)block.
pub type OnClientBlocked<K> = Box<dyn Fn(&K, u64) + Send + Sync>;

#[derive(Debug)]
struct BlockStatus {
    /// `None` while the client has not reached level 0 yet. While unset,
    /// the level-0 config drives decay so the math never lacks a config.
    current_level: Option<usize>,
    trigger_times: u32,
    last_trigger: Instant,
}

/// The auto-block manager, keyed by an opaque client identity.
pub struct AutoBlockManager<K: Eq + Hash> {
    on_client_blocked: OnClientBlocked<K>,
    enabled: bool,
    levels: Vec<BlockLevel>,
    max_level: usize,
    block_trigger_times: u32,
    statuses: DashMap<K, BlockStatus>,
}

impl<K: Eq + Hash> AutoBlockManager<K> {
    /// Build a manager from configuration. A disabled flag or an empty
    /// level list yields an inert manager.
    pub fn new(config: &AutoBlockConfig, on_client_blocked: OnClientBlocked<K>) -> Self {
        let enabled = config.enabled && !config.block_levels.is_empty();
        Self {
            on_client_blocked,
            enabled,
            max_level: config.block_levels.len().saturating_sub(1),
            levels: config.block_levels.clone(),
            block_trigger_times: config.block_trigger_times,
            statuses: DashMap::new(),
        }
    }

    /// Whether the manager does anything at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of currently tracked clients.
    pub fn tracked_client_count(&self) -> usize {
        self.statuses.len()
    }

    /// Record one abusive trigger for `id`, blocking or escalating when the
    /// thresholds say so.
    ///
    /// The update runs inside the key's critical section; the callback fires
    /// within it and must not call back into this manager.
    pub fn try_block_client(&self, id: K) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        let mut entry = self.statuses.entry(id).or_insert_with(|| BlockStatus {
            current_level: None,
            trigger_times: 0,
            last_trigger: now,
        });
        let status = entry.value_mut();
        // Capture the previous trigger instant before overwriting it, or the
        // decay below always sees zero elapsed time.
        let previous_trigger = status.last_trigger;
        status.last_trigger = now;

        let level_config = &self.levels[status.current_level.unwrap_or(0)];
        if level_config.reduce_one_trigger_time_interval_millis > 0 {
            let forgiven = (now - previous_trigger).as_millis()
                / u128::from(level_config.reduce_one_trigger_time_interval_millis);
            status.trigger_times = status
                .trigger_times
                .saturating_sub(forgiven.min(u128::from(u32::MAX)) as u32);
        }
        status.trigger_times += 1;

        match status.current_level {
            Some(mut level) => {
                if status.trigger_times >= level_config.go_next_level_trigger_times
                    && level < self.max_level
                {
                    level += 1;
                    status.current_level = Some(level);
                    status.trigger_times = 0;
                }
                let duration = self.levels[level].block_duration_seconds;
                (self.on_client_blocked)(entry.key(), duration);
            }
            None => {
                if status.trigger_times >= self.block_trigger_times {
                    status.current_level = Some(0);
                    status.trigger_times = 0;
                    (self.on_client_blocked)(entry.key(), self.levels[0].block_duration_seconds);
                }
            }
        }
    }

    /// Forget everything about `id`.
    pub fn unblock_client(&self, id: &K) {
        if !self.enabled {
            return;
        }
        self.statuses.remove(id);
    }

    /// Periodic sweep: evict every entry whose decay would bring its trigger
    /// count to zero or below. Iteration is weakly consistent with
    /// concurrent updates.
    pub fn evict_expired_blocked_clients(&self) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        self.statuses.retain(|_, status| {
            let interval = self.levels[status.current_level.unwrap_or(0)]
                .reduce_one_trigger_time_interval_millis;
            if interval == 0 {
                return true;
            }
            let forgiven = (now - status.last_trigger).as_millis() / u128::from(interval);
            i128::from(status.trigger_times) - (forgiven as i128) > 0
        });
    }
}

impl<K: Eq + Hash + Send + Sync + 'static> AutoBlockManager<K> {
    /// Spawn the periodic eviction sweep.
    pub fn spawn_sweep(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                manager.evict_expired_blocked_clients();
            }
        })
    }
}
