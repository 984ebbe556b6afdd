use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::metrics::BANS_TOTAL;

// Rate limit policy - one global policy for every guarded route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub min_interval: TimeDelta, // minimum gap between accepted requests
    pub ban_duration: TimeDelta,
    pub max_violations: u32, // violations that trigger a ban
}

impl Policy {
    // Build from config units: interval in seconds, ban in minutes
    pub fn new(
        request_interval_secs: u64,
        ban_duration_mins: u64,
        max_violations: u32,
    ) -> Result<Self, ConfigError> {
        if max_violations == 0 {
            return Err(ConfigError::ZeroMaxViolations);
        }
        if ban_duration_mins == 0 {
            return Err(ConfigError::ZeroBanDuration);
        }
        let min_interval = i64::try_from(request_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(ConfigError::OutOfRange("request interval"))?;
        let ban_duration = i64::try_from(ban_duration_mins)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .ok_or(ConfigError::OutOfRange("ban duration"))?;

        Ok(Self {
            min_interval,
            ban_duration,
            max_violations,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Banned,
    TooFrequent,
}

// Why a request was turned away and when the client may come back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub retry_after: Duration, // whole minutes for bans, whole seconds otherwise
    pub violations: u32,
    pub max_violations: u32,
}

impl Rejection {
    pub fn retry_after_minutes(&self) -> u64 {
        self.retry_after.as_secs().div_ceil(60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject(Rejection),
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Decision::Admit => None,
            Decision::Reject(rejection) => Some(rejection.reason),
        }
    }
}

/// Per-client bookkeeping.
///
/// `banned_until` coexists with the frozen cadence fields while a ban is in
/// force; once the controller sees a request at or after expiry the whole
/// record is replaced by a fresh one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientState {
    pub last_accepted: Option<DateTime<Utc>>, // None until the first accepted request
    pub violations: u32,
    pub banned_until: Option<DateTime<Utc>>,
}

/// Keyed admission controller with ban escalation.
///
/// State lives in one sharded map so every decision is a single
/// read-modify-write under the key's shard lock. Entries are never swept:
/// a ban is only cleared when the same key shows up again after it expired.
pub struct AdmissionController {
    policy: Policy,
    clients: DashMap<String, ClientState>,
}

impl AdmissionController {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            clients: DashMap::new(),
        }
    }

    /// Decide whether the request from `key` at `now` may proceed.
    pub fn admit(&self, key: &str, now: DateTime<Utc>) -> Decision {
        let mut entry = self.clients.entry(key.to_string()).or_default();
        let state = entry.value_mut();

        // still banned..? reject without touching anything
        if let Some(expires_at) = state.banned_until {
            if now < expires_at {
                let minutes = ceil_minutes(expires_at - now);
                debug!(client = key, remaining_minutes = minutes, "client still banned");
                return self.banned(minutes, state.violations);
            }
            // ban over, start from scratch
            *state = ClientState::default();
            info!(client = key, "ban expired");
        }

        let too_soon = state
            .last_accepted
            .is_some_and(|last| now - last < self.policy.min_interval);

        if too_soon {
            state.violations = state.violations.saturating_add(1);

            if state.violations >= self.policy.max_violations {
                let expires_at = now
                    .checked_add_signed(self.policy.ban_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                state.banned_until = Some(expires_at);
                BANS_TOTAL.inc();

                let minutes = ceil_minutes(self.policy.ban_duration);
                warn!(
                    client = key,
                    violations = state.violations,
                    ban_minutes = minutes,
                    "client banned for rate limit violations"
                );
                return self.banned(minutes, state.violations);
            }

            warn!(
                client = key,
                "rate limit violation {}/{}", state.violations, self.policy.max_violations
            );
            return Decision::Reject(Rejection {
                reason: RejectReason::TooFrequent,
                retry_after: Duration::from_secs(ceil_seconds(self.policy.min_interval)),
                violations: state.violations,
                max_violations: self.policy.max_violations,
            });
        }

        let previous = state.last_accepted.replace(now);

        // well-behaved client: one violation forgiven per idle gap of twice the interval
        if state.violations > 0
            && previous.is_some_and(|prev| now - prev > self.policy.min_interval * 2)
        {
            state.violations -= 1;
            info!(client = key, violations = state.violations, "reduced violation count");
        }

        Decision::Admit
    }

    /// Same as [`admit`](Self::admit) using the wall clock.
    pub fn admit_now(&self, key: &str) -> Decision {
        self.admit(key, Utc::now())
    }

    pub fn snapshot(&self, key: &str) -> Option<ClientState> {
        self.clients.get(key).map(|entry| *entry.value())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    fn banned(&self, minutes: u64, violations: u32) -> Decision {
        Decision::Reject(Rejection {
            reason: RejectReason::Banned,
            retry_after: Duration::from_secs(minutes.saturating_mul(60)),
            violations,
            max_violations: self.policy.max_violations,
        })
    }
}

fn ceil_minutes(delta: TimeDelta) -> u64 {
    (delta.num_milliseconds().max(0) as u64).div_ceil(60_000)
}

fn ceil_seconds(delta: TimeDelta) -> u64 {
    (delta.num_milliseconds().max(0) as u64).div_ceil(1_000)
}
