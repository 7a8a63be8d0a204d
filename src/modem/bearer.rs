//! Packet-data bearer lifecycle.
//!
//! Bring-up is always a full rebuild: stale context shut, attach, attach poll,
//! PDP context, start task, radio bring-up, local IP. Any failing step stops the
//! sequence and leaves the controller in [`BearerState::Failed`]; the next call
//! starts over from the shut.

use log::{debug, info, warn};
use std::fmt;
use std::net::Ipv4Addr;
use tokio::time::{sleep, Instant};

use super::channel::ModemChannel;
use super::error::{ModemError, Result};
use super::matcher::{find_ipv4, Detection, Matcher};
use super::transactor::{Command, Outcome, Transactor};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerState {
    Down,
    Attaching,
    Attached,
    ContextConfigured,
    Up(Ipv4Addr),
    Failed,
}

impl fmt::Display for BearerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BearerState::Down => write!(f, "down"),
            BearerState::Attaching => write!(f, "attaching"),
            BearerState::Attached => write!(f, "attached"),
            BearerState::ContextConfigured => write!(f, "context-configured"),
            BearerState::Up(ip) => write!(f, "up({ip})"),
            BearerState::Failed => write!(f, "failed"),
        }
    }
}

pub fn pdp_context_command(apn: &str) -> String {
    format!("AT+CGDCONT=1,\"IP\",\"{apn}\"")
}

pub fn start_task_command(apn: &str) -> String {
    format!("AT+CSTT=\"{apn}\",\"\",\"\"")
}

/// Owns the [`BearerState`]; nothing else mutates it.
#[derive(Debug)]
pub struct BearerController {
    apn: String,
    state: BearerState,
}

impl BearerController {
    pub fn new(apn: impl Into<String>) -> Self {
        Self {
            apn: apn.into(),
            state: BearerState::Down,
        }
    }

    pub fn state(&self) -> BearerState {
        self.state
    }

    /// Rebuild the bearer from scratch and return the assigned local IP.
    pub async fn bring_up<C: ModemChannel>(
        &mut self,
        tx: &mut Transactor<C>,
    ) -> Result<Ipv4Addr> {
        metrics::inc_bearer_bringups();
        match self.run_bring_up(tx).await {
            Ok(ip) => {
                info!("Bearer up on APN {} with local IP {}", self.apn, ip);
                self.state = BearerState::Up(ip);
                Ok(ip)
            }
            Err(e) => {
                warn!("Bearer bring-up failed: {}", e);
                metrics::inc_bearer_failures();
                self.state = BearerState::Failed;
                Err(e)
            }
        }
    }

    async fn run_bring_up<C: ModemChannel>(&mut self, tx: &mut Transactor<C>) -> Result<Ipv4Addr> {
        let timing = tx.timing().clone();

        // Best effort: a context that is not there cannot be shut
        let shut = tx.execute(&Command::new("AT+CIPSHUT").hold_ms(1_200)).await?;
        if !shut.is_success() {
            debug!("Stale context shut reported {:?}, continuing", shut);
        }
        self.state = BearerState::Attaching;
        let attach = tx.execute(&Command::new("AT+CGATT=1").hold_ms(600)).await?;
        if !attach.is_success() {
            return Err(ModemError::AttachFailure(format!(
                "AT+CGATT=1: {:?}",
                attach
            )));
        }
        self.poll_attached(tx).await?;
        self.state = BearerState::Attached;

        let pdp = tx
            .execute(&Command::new(pdp_context_command(&self.apn)).hold_ms(500))
            .await?;
        if !pdp.is_success() {
            return Err(ModemError::BearerBringupFailure(format!(
                "AT+CGDCONT: {:?}",
                pdp
            )));
        }

        let task = tx
            .execute(&Command::new(start_task_command(&self.apn)).hold_ms(800))
            .await?;
        if !task.is_success() {
            return Err(ModemError::BearerBringupFailure(format!(
                "AT+CSTT: {:?}",
                task
            )));
        }
        sleep(timing.context_settle()).await;
        self.state = BearerState::ContextConfigured;

        let radio = tx
            .execute(&Command::new("AT+CIICR").hold(timing.bringup_hold()))
            .await?;
        if !radio.is_success() {
            return Err(ModemError::BearerBringupFailure(format!(
                "AT+CIICR: {:?}",
                radio
            )));
        }
        sleep(timing.bringup_settle()).await;

        let reply = tx
            .transact_once("AT+CIFSR", &Matcher::Ipv4Address, timing.ip_window())
            .await?;
        sleep(timing.ip_settle()).await;
        match (reply.detection, find_ipv4(&reply.text)) {
            (Some(Detection::Success), Some(ip)) => Ok(ip),
            (detection, _) => Err(ModemError::IpAcquisitionFailure(format!(
                "AT+CIFSR returned no address ({:?}): {:?}",
                detection,
                reply.text.trim()
            ))),
        }
    }

    /// Query attach status until attached or the window closes. Polling, not
    /// resending under the retry policy: each query gets one short wait, cut
    /// short so the last one still ends inside the window.
    async fn poll_attached<C: ModemChannel>(&mut self, tx: &mut Transactor<C>) -> Result<()> {
        let timing = tx.timing().clone();
        let deadline = Instant::now() + timing.attach_window();
        let mut polls = 0u32;
        loop {
            // The query is preceded by a drain, which must fit as well
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining <= timing.drain_window() {
                break;
            }
            polls += 1;
            let window = timing
                .attach_query_window()
                .min(remaining - timing.drain_window());
            let reply = tx
                .transact_once("AT+CGATT?", &Matcher::ATTACHED, window)
                .await?;
            if reply.detection == Some(Detection::Success) {
                debug!("Attached after {} poll(s)", polls);
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(timing.attach_poll_interval().min(remaining)).await;
        }
        Err(ModemError::AttachFailure(format!(
            "not attached after {} poll(s) in {:?}",
            polls,
            timing.attach_window()
        )))
    }

    /// Shut the IP context. The state is `Down` afterwards whatever the modem
    /// answered; the returned outcome is informational.
    pub async fn teardown<C: ModemChannel>(&mut self, tx: &mut Transactor<C>) -> Result<Outcome> {
        let outcome = tx.execute(&Command::new("AT+CIPSHUT").hold_ms(4_000)).await;
        self.state = BearerState::Down;
        let outcome = outcome?;
        info!("Bearer shut ({:?})", outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_commands_quote_apn() {
        assert_eq!(
            pdp_context_command("internet.netone"),
            "AT+CGDCONT=1,\"IP\",\"internet.netone\""
        );
        assert_eq!(
            start_task_command("internet.netone"),
            "AT+CSTT=\"internet.netone\",\"\",\"\""
        );
    }

    #[test]
    fn new_controller_is_down() {
        let bearer = BearerController::new("apn");
        assert_eq!(bearer.state(), BearerState::Down);
        assert_eq!(bearer.state().to_string(), "down");
    }
}
