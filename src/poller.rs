//! The monitor loop.
//!
//! Polls the controller's bulk telemetry command on a fixed interval,
//! decodes the configured readings and posts them to the spool according to
//! each reading's trigger policy. Any transaction failure is followed by a
//! device reopen before the next cycle; the loop itself never gives up
//! after startup.

use crate::config::MonitorConfig;
use crate::constants::{CMD_FIRMWARE_VERSION, CMD_READ_ALL};
use crate::error::ThzError;
use crate::payload::fixed_point::fixed_point;
use crate::payload::readings::ReadingDef;
use crate::spool::spool_value;
use crate::thz::serial::{SerialConfig, ThzDeviceHandle};
use chrono::Utc;
use log::{debug, error, info, warn};

/// Shortest bulk payload the monitor accepts before decoding readings.
const MIN_BULK_LEN: usize = 77;

/// Liveness attempts at startup before the monitor gives up.
const STARTUP_PINGS: u32 = 3;

/// Decide whether a fresh value should be posted, given the last posted
/// value and the def's trigger.
///
/// * trigger > 0: post when the absolute delta exceeds the trigger.
/// * trigger < 0: edge mode around |trigger|: post on any zero/non-zero
///   change and on crossing the threshold in either direction.
/// * trigger == 0: never (the minimum post interval still applies).
pub fn should_trigger(def: &ReadingDef, posted_value: f64, value: f64) -> bool {
    if def.trigger > 0.0 {
        (value - posted_value).abs() > def.trigger
    } else if def.trigger < 0.0 {
        let threshold = -def.trigger;
        let prev = posted_value;
        (prev == 0.0 && value != 0.0)
            || (prev != 0.0 && value == 0.0)
            || (value < threshold && prev >= threshold)
            || (value >= threshold && prev < threshold)
    } else {
        false
    }
}

/// Per-reading posting state carried across cycles.
#[derive(Debug, Default, Clone)]
struct ReadingState {
    /// Most recent read as (timestamp, value).
    last: Option<(u64, f64)>,
    posted_value: f64,
    posted_ts: u64,
    posted_last_cycle: bool,
}

/// Owns the collection loop over one controller.
pub struct Monitor {
    config: MonitorConfig,
    states: Vec<ReadingState>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        let states = vec![ReadingState::default(); config.defs.len()];
        Monitor { config, states }
    }

    /// Run the collection loop.
    ///
    /// Returns only if the controller never answers the startup probe;
    /// after that every failure is handled by reopening the device.
    pub async fn run(&mut self) -> Result<(), ThzError> {
        let serial = SerialConfig::default();
        let mut handle = ThzDeviceHandle::open_retrying(&self.config.port, serial).await;

        let mut alive = false;
        for _ in 0..STARTUP_PINGS {
            alive = handle.ping().await.unwrap_or(false);
            info!("ping {}", if alive { "ok" } else { "failed" });
            if alive {
                break;
            }
        }
        if !alive {
            error!("no ping reply");
            return Err(ThzError::Timeout);
        }

        match handle.request(CMD_FIRMWARE_VERSION, None).await {
            Ok(data) => {
                if let Some(version) = fixed_point(&data, 2) {
                    info!("version: {version:.2}");
                }
            }
            Err(e) => warn!("version query failed: {e}"),
        }

        loop {
            let started = Utc::now();
            let ts = started.timestamp_millis() as u64;

            match handle.request(CMD_READ_ALL, None).await {
                Ok(data) if data.len() >= MIN_BULK_LEN => self.process_cycle(ts, &data),
                Ok(data) => {
                    warn!("data too short ({})", data.len());
                    handle.reopen(&self.config.port).await;
                }
                Err(e) => {
                    warn!("read failed: {e}");
                    handle.reopen(&self.config.port).await;
                }
            }

            let elapsed = (Utc::now() - started).to_std().unwrap_or_default();
            if let Some(remaining) = self.config.read_interval.checked_sub(elapsed) {
                tokio::time::sleep(remaining).await;
            }

            // make sure the peer is still there before the next cycle
            while !handle.ping().await.unwrap_or(false) {
                handle.reopen(&self.config.port).await;
            }
        }
    }

    /// Decode every configured reading from one bulk payload and apply the
    /// posting policy.
    fn process_cycle(&mut self, ts: u64, data: &[u8]) {
        let mut line = String::new();
        for (def, state) in self.config.defs.iter().zip(self.states.iter_mut()) {
            let Some(value) = def.decode(data) else {
                debug!("{}: offset {} beyond payload", def.name, def.pos);
                continue;
            };

            let interval_due = match self.config.min_post_interval {
                Some(min) => ts.saturating_sub(state.posted_ts) > min.as_millis() as u64,
                None => false,
            };
            let post = def.uuid.is_some()
                && (interval_due || should_trigger(def, state.posted_value, value));

            if post {
                let uuid = def.uuid.as_deref().unwrap_or_default();
                if let Some(dir) = &self.config.spool {
                    // spool the previous quiet value first so the importer
                    // sees the step, not a ramp
                    if !state.posted_last_cycle {
                        if let Some((last_ts, last_value)) = state.last {
                            if let Err(e) = spool_value(dir, last_ts, uuid, last_value) {
                                error!("{e}");
                            }
                        }
                    }
                    if let Err(e) = spool_value(dir, ts, uuid, value) {
                        error!("{e}");
                    }
                } else {
                    warn!("spool without spool path, check config");
                }
                state.posted_last_cycle = true;
                state.posted_value = value;
                state.posted_ts = ts;
            } else {
                state.posted_last_cycle = false;
            }
            state.last = Some((ts, value));

            let precision = def.decimals.max(0) as usize;
            line.push_str(&format!(
                "{}{} {:.*}  ",
                if state.posted_last_cycle { '*' } else { ' ' },
                def.name,
                precision,
                value
            ));
        }
        info!("{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(trigger: f64) -> ReadingDef {
        ReadingDef {
            pos: 0,
            name: "x".into(),
            decimals: 1,
            uuid: Some("uuid".into()),
            trigger,
        }
    }

    #[test]
    fn threshold_trigger_fires_on_delta() {
        let d = def(0.5);
        assert!(!should_trigger(&d, 20.0, 20.4));
        assert!(should_trigger(&d, 20.0, 20.6));
        assert!(should_trigger(&d, 20.0, 19.4));
    }

    #[test]
    fn edge_trigger_fires_on_zero_transitions() {
        let d = def(-10.0);
        assert!(should_trigger(&d, 0.0, 4.0));
        assert!(should_trigger(&d, 4.0, 0.0));
        assert!(!should_trigger(&d, 4.0, 6.0));
    }

    #[test]
    fn edge_trigger_fires_on_threshold_crossing() {
        let d = def(-10.0);
        assert!(should_trigger(&d, 9.0, 11.0));
        assert!(should_trigger(&d, 11.0, 9.0));
        assert!(!should_trigger(&d, 11.0, 12.0));
    }

    #[test]
    fn zero_trigger_never_fires() {
        let d = def(0.0);
        assert!(!should_trigger(&d, 0.0, 100.0));
    }
}
