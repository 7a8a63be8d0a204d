//! TCP delivery sequencer: one open / send / close cycle through the bearer.

use log::{debug, info, warn};
use std::fmt;
use tokio::time::{sleep, Instant};

use super::bearer::BearerController;
use super::channel::ModemChannel;
use super::error::{ModemError, Result};
use super::matcher::{Detection, Matcher};
use super::transactor::{Command, Transactor};
use crate::metrics;

/// End-of-data marker for `AT+CIPSEND` (Ctrl-Z).
pub const CTRL_Z: u8 = 0x1A;

/// Largest payload a single `AT+CIPSEND` accepts on SIM800-class modems.
pub const MAX_SEND_LEN: usize = 1460;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    Opening,
    Connected,
    SendPrompted,
    Sent,
    Failed,
}

/// Remote TCP endpoint the telemetry is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn open_command(&self) -> String {
        format!("AT+CIPSTART=\"TCP\",\"{}\",\"{}\"", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Owns the [`SocketState`] for one delivery at a time.
#[derive(Debug)]
pub struct DeliverySequencer {
    endpoint: Endpoint,
    state: SocketState,
}

impl DeliverySequencer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: SocketState::Closed,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Bring the bearer up, open the socket, stream `payload`, confirm it and
    /// close. The close is issued on every path once an open was attempted.
    pub async fn deliver<C: ModemChannel>(
        &mut self,
        tx: &mut Transactor<C>,
        bearer: &mut BearerController,
        payload: &[u8],
    ) -> Result<()> {
        let started = Instant::now();
        self.state = SocketState::Closed;
        if payload.is_empty() || payload.len() > MAX_SEND_LEN {
            metrics::inc_deliveries_failed();
            return Err(ModemError::SendFailure(format!(
                "payload length {} outside 1..={}",
                payload.len(),
                MAX_SEND_LEN
            )));
        }

        if let Err(e) = bearer.bring_up(tx).await {
            self.state = SocketState::Failed;
            metrics::inc_deliveries_failed();
            return Err(e);
        }

        let result = self.open_and_send(tx, bearer, payload).await;
        let closed = self.close(tx).await;

        match (result, closed) {
            (Ok(()), Ok(())) => {
                let elapsed = started.elapsed();
                metrics::observe_delivery(elapsed);
                info!(
                    "Delivered {} bytes to {} in {:?}",
                    payload.len(),
                    self.endpoint,
                    elapsed
                );
                Ok(())
            }
            (Err(e), _) | (Ok(()), Err(e)) => {
                metrics::inc_deliveries_failed();
                warn!("Delivery to {} failed: {}", self.endpoint, e);
                Err(e)
            }
        }
    }

    async fn open_and_send<C: ModemChannel>(
        &mut self,
        tx: &mut Transactor<C>,
        bearer: &mut BearerController,
        payload: &[u8],
    ) -> Result<()> {
        self.open(tx, bearer).await?;

        // Non-critical; only logged
        let status = tx
            .execute(&Command::new("AT+CIPSTATUS").hold_ms(1_200))
            .await?;
        debug!("Socket status probe: {:?}", status);

        self.transmit(tx, payload).await
    }

    /// Open the socket, rebuilding the bearer once if the network tore the
    /// context down during the first try.
    async fn open<C: ModemChannel>(
        &mut self,
        tx: &mut Transactor<C>,
        bearer: &mut BearerController,
    ) -> Result<()> {
        let timing = tx.timing().clone();
        let line = self.endpoint.open_command();
        let mut rebuilt = false;
        loop {
            self.state = SocketState::Opening;
            let reply = tx
                .transact_once(&line, &Matcher::SOCKET_OPEN, timing.open_window())
                .await?;
            sleep(timing.open_settle()).await;
            match reply.detection {
                Some(Detection::Success) => {
                    self.state = SocketState::Connected;
                    debug!("Socket to {} connected", self.endpoint);
                    return Ok(());
                }
                Some(Detection::Teardown) if !rebuilt => {
                    warn!("Bearer torn down while opening {}, rebuilding", self.endpoint);
                    metrics::inc_bearer_rebuilds();
                    rebuilt = true;
                    if let Err(e) = bearer.bring_up(tx).await {
                        self.state = SocketState::Failed;
                        return Err(e);
                    }
                }
                detection => {
                    self.state = SocketState::Failed;
                    let context = if rebuilt { " after bearer rebuild" } else { "" };
                    return Err(ModemError::SocketOpenFailure(format!(
                        "{}{} ({:?}): {:?}",
                        self.endpoint,
                        context,
                        detection,
                        reply.text.trim()
                    )));
                }
            }
        }
    }

    async fn transmit<C: ModemChannel>(
        &mut self,
        tx: &mut Transactor<C>,
        payload: &[u8],
    ) -> Result<()> {
        let timing = tx.timing().clone();
        let prompt = tx
            .transact_once("AT+CIPSEND", &Matcher::DATA_PROMPT, timing.prompt_window())
            .await?;
        if prompt.detection != Some(Detection::Success) {
            self.state = SocketState::Failed;
            return Err(ModemError::SendFailure(format!(
                "no data prompt ({:?})",
                prompt.detection
            )));
        }
        self.state = SocketState::SendPrompted;

        tx.write_raw(payload)?;
        sleep(timing.payload_settle()).await;
        tx.write_raw(&[CTRL_Z])?;

        let confirm = tx
            .await_signal(&Matcher::SEND_CONFIRM, timing.confirm_window())
            .await?;
        sleep(timing.confirm_settle()).await;
        match confirm.detection {
            Some(Detection::Success) => {
                self.state = SocketState::Sent;
                Ok(())
            }
            detection => {
                self.state = SocketState::Failed;
                Err(ModemError::SendFailure(format!(
                    "{} bytes not confirmed ({:?}): {:?}",
                    payload.len(),
                    detection,
                    confirm.text.trim()
                )))
            }
        }
    }

    async fn close<C: ModemChannel>(&mut self, tx: &mut Transactor<C>) -> Result<()> {
        let outcome = tx
            .execute(&Command::new("AT+CIPCLOSE").hold_ms(1_500))
            .await;
        self.state = SocketState::Closed;
        debug!("Socket close: {:?}", outcome);
        outcome.map(|_| ())
    }
}
