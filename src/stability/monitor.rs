//! Post-restore stability polling

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::gateway::ClusterGateway;
use crate::observability::{Event, Logger, Timer};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StabilityError {
    #[error("units still not stable after {waited:?}: {}", units.join(", "))]
    Timeout { units: Vec<String>, waited: Duration },
}

/// Polls per-unit distribution state until every unit reports the best state.
pub struct StabilityMonitor {
    gateway: Arc<dyn ClusterGateway>,
    poll_interval: Duration,
    max_wait: Option<Duration>,
}

impl StabilityMonitor {
    /// Without `max_wait` the wait is unbounded
    pub fn new(gateway: Arc<dyn ClusterGateway>, poll_interval: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            gateway,
            poll_interval,
            max_wait,
        }
    }

    /// Block until every unit is stable and return the time spent.
    ///
    /// Units already seen stable are not polled again. A failed poll only
    /// means the unit is polled again next round.
    pub fn wait_for_stable(&self, units: &[String]) -> Result<Duration, StabilityError> {
        let timer = Timer::new();
        let mut pending: Vec<String> = units.to_vec();
        pending.sort();
        pending.dedup();
        let mut round: u64 = 0;

        loop {
            round += 1;
            let round_str = round.to_string();

            pending.retain(|unit| match self.gateway.unit_distribution_state(unit) {
                Ok(state) if state.is_best() => false,
                Ok(state) => {
                    Logger::event(
                        Event::StabilityPoll,
                        &[("unit", unit), ("state", state.as_str()), ("round", &round_str)],
                    );
                    true
                }
                Err(err) => {
                    let reason = err.to_string();
                    Logger::event(
                        Event::StabilityPollError,
                        &[("unit", unit), ("reason", &reason), ("round", &round_str)],
                    );
                    true
                }
            });

            if pending.is_empty() {
                let elapsed = timer.elapsed();
                Logger::event(
                    Event::StabilityWaitComplete,
                    &[
                        ("units", &units.len().to_string()),
                        ("rounds", &round_str),
                        ("elapsed_ms", &timer.elapsed_ms()),
                    ],
                );
                return Ok(elapsed);
            }

            if let Some(max_wait) = self.max_wait {
                if timer.elapsed() >= max_wait {
                    let waiting = pending.join(",");
                    Logger::event(
                        Event::StabilityTimeout,
                        &[("units", &waiting), ("elapsed_ms", &timer.elapsed_ms())],
                    );
                    return Err(StabilityError::Timeout {
                        units: pending,
                        waited: timer.elapsed(),
                    });
                }
            }

            thread::sleep(self.poll_interval);
        }
    }
}
