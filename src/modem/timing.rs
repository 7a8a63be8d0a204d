//! Wait, pacing and retry budgets for the modem engine.
//!
//! Values are milliseconds so the `[timing]` table in `config.toml` stays
//! readable; every field is optional there and falls back to the defaults below,
//! which are tuned for SIM800-class modems at 9600 baud.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Extra tries of the same command after a failure token, per attempt.
    pub command_retry_count: u32,
    /// Floor for the per-try response wait.
    pub command_timeout_ms: u64,
    /// Stale input drained before each command.
    pub drain_window_ms: u64,
    /// Pause after every try when the command hold is zero.
    pub pace_floor_ms: u64,
    /// Pause before retrying a failed command when the hold is zero.
    pub backoff_floor_ms: u64,
    /// Sleep between channel reads while waiting.
    pub poll_interval_ms: u64,

    pub attach_window_ms: u64,
    pub attach_poll_interval_ms: u64,
    pub attach_query_window_ms: u64,
    /// Quiescence after configuring the start task, before bearer bring-up.
    pub context_settle_ms: u64,
    pub bringup_hold_ms: u64,
    pub bringup_settle_ms: u64,
    pub ip_window_ms: u64,
    pub ip_settle_ms: u64,

    pub open_window_ms: u64,
    pub open_settle_ms: u64,
    pub prompt_window_ms: u64,
    /// Gap between the payload bytes and the 0x1A terminator.
    pub payload_settle_ms: u64,
    pub confirm_window_ms: u64,
    pub confirm_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_retry_count: 2,
            command_timeout_ms: 8_000,
            drain_window_ms: 30,
            pace_floor_ms: 100,
            backoff_floor_ms: 300,
            poll_interval_ms: 10,
            attach_window_ms: 20_000,
            attach_poll_interval_ms: 300,
            attach_query_window_ms: 1_200,
            context_settle_ms: 1_500,
            bringup_hold_ms: 85_000,
            bringup_settle_ms: 1_200,
            ip_window_ms: 8_000,
            ip_settle_ms: 300,
            open_window_ms: 30_000,
            open_settle_ms: 800,
            prompt_window_ms: 25_000,
            payload_settle_ms: 30,
            confirm_window_ms: 15_000,
            confirm_settle_ms: 300,
        }
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

impl Timing {
    /// Per-try response wait for a command holding `hold`.
    pub fn response_budget(&self, hold: Duration) -> Duration {
        hold.max(ms(self.command_timeout_ms))
    }

    /// Pause after every try, whatever the outcome.
    pub fn pace(&self, hold: Duration) -> Duration {
        if hold.is_zero() {
            ms(self.pace_floor_ms)
        } else {
            hold / 2
        }
    }

    /// Pause before re-sending a command that answered with a failure token.
    pub fn backoff(&self, hold: Duration) -> Duration {
        if hold.is_zero() {
            ms(self.backoff_floor_ms)
        } else {
            hold
        }
    }

    pub fn drain_window(&self) -> Duration {
        ms(self.drain_window_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        ms(self.poll_interval_ms.max(1))
    }
    pub fn attach_window(&self) -> Duration {
        ms(self.attach_window_ms)
    }
    pub fn attach_poll_interval(&self) -> Duration {
        ms(self.attach_poll_interval_ms)
    }
    pub fn attach_query_window(&self) -> Duration {
        ms(self.attach_query_window_ms)
    }
    pub fn context_settle(&self) -> Duration {
        ms(self.context_settle_ms)
    }
    pub fn bringup_hold(&self) -> Duration {
        ms(self.bringup_hold_ms)
    }
    pub fn bringup_settle(&self) -> Duration {
        ms(self.bringup_settle_ms)
    }
    pub fn ip_window(&self) -> Duration {
        ms(self.ip_window_ms)
    }
    pub fn ip_settle(&self) -> Duration {
        ms(self.ip_settle_ms)
    }
    pub fn open_window(&self) -> Duration {
        ms(self.open_window_ms)
    }
    pub fn open_settle(&self) -> Duration {
        ms(self.open_settle_ms)
    }
    pub fn prompt_window(&self) -> Duration {
        ms(self.prompt_window_ms)
    }
    pub fn payload_settle(&self) -> Duration {
        ms(self.payload_settle_ms)
    }
    pub fn confirm_window(&self) -> Duration {
        ms(self.confirm_window_ms)
    }
    pub fn confirm_settle(&self) -> Duration {
        ms(self.confirm_settle_ms)
    }
}
