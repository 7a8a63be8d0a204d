//! # Modem Protocol Engine
//!
//! Drives a SIM800-class cellular modem over its AT command dialect: attach to
//! the packet network, bring a bearer up, and push one telemetry record over TCP.
//!
//! ## Layers
//!
//! Leaf first, each depending only on the one before it:
//!
//! - [`collector`] - bounded accumulation of raw modem output and token search
//! - [`transactor`] - one command, one completion token, retry and pacing policy
//! - [`bearer`] - shut / attach / poll / context / bring-up / IP state machine
//! - [`delivery`] - socket open (with one bearer rebuild), prompt, payload, confirm, close
//!
//! [`Modem`] ties them to a single exclusively owned [`ModemChannel`]. All waits
//! are async sleeps against deadlines; there is never more than one exchange in
//! flight, and cancellation is by deadline only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use simtrack::config::Config;
//! use simtrack::modem::{Modem, SerialChannel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let channel = SerialChannel::open(&config.modem.port, config.modem.baud_rate).await?;
//!     let mut modem = Modem::from_config(channel, &config);
//!     modem.initialize().await?;
//!     let ip = modem.bring_up_bearer().await?;
//!     println!("bearer up, local IP {ip}");
//!     modem.deliver(b"{\"hello\":1}").await?;
//!     Ok(())
//! }
//! # }
//! ```
//!
//! ## Errors
//!
//! Every operation returns a [`ModemError`] kind instead of a bare failure; none
//! of them is fatal and the next call starts again from `Down` / `Closed`.

pub mod bearer;
pub mod channel;
pub mod collector;
pub mod delivery;
pub mod error;
pub mod matcher;
pub mod mock;
pub mod timing;
pub mod transactor;

pub use bearer::{BearerController, BearerState};
pub use channel::ModemChannel;
#[cfg(feature = "serial")]
pub use channel::SerialChannel;
pub use delivery::{DeliverySequencer, Endpoint, SocketState};
pub use error::{ModemError, Result};
pub use matcher::{Detection, Matcher};
pub use timing::Timing;
pub use transactor::{Command, Exchange, Outcome, Transactor};

use log::{info, warn};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::telemetry::{encode_record, Fix, Identity};

/// Baud rates the modem's `AT+IPR` accepts.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200,
];

/// A modem on one channel with its bearer and socket state.
pub struct Modem<C> {
    transactor: Transactor<C>,
    bearer: BearerController,
    delivery: DeliverySequencer,
    baud_rate: u32,
}

impl<C: ModemChannel> Modem<C> {
    pub fn new(channel: C, apn: &str, endpoint: Endpoint, baud_rate: u32, timing: Timing) -> Self {
        Self {
            transactor: Transactor::new(channel, timing),
            bearer: BearerController::new(apn),
            delivery: DeliverySequencer::new(endpoint),
            baud_rate,
        }
    }

    pub fn from_config(channel: C, config: &Config) -> Self {
        Self::new(
            channel,
            &config.network.apn,
            Endpoint::new(config.server.host.clone(), config.server.port),
            config.modem.baud_rate,
            config.timing.clone(),
        )
    }

    /// Handshake and base setup: `AT` must answer, the rest is best effort
    /// (echo off, full functionality, fixed baud, send prompt on).
    pub async fn initialize(&mut self) -> Result<()> {
        sleep(Duration::from_millis(250)).await;
        self.transactor
            .require(&Command::new("AT").hold_ms(300))
            .await?;
        let setup = [
            "ATE0".to_string(),
            "AT+CFUN=1".to_string(),
            format!("AT+IPR={}", self.baud_rate),
            "AT+CIPSPRT=1".to_string(),
        ];
        for line in setup {
            let outcome = self
                .transactor
                .execute(&Command::new(line.as_str()).hold_ms(300))
                .await?;
            if !outcome.is_success() {
                warn!("Modem setup {} reported {:?}", line, outcome);
            }
        }
        info!("Modem initialised");
        Ok(())
    }

    /// Rebuild the bearer and return the local IP.
    pub async fn bring_up_bearer(&mut self) -> Result<Ipv4Addr> {
        self.bearer.bring_up(&mut self.transactor).await
    }

    /// Shut the IP context (`AT+CIPSHUT`).
    pub async fn shutdown_bearer(&mut self) -> Result<Outcome> {
        self.bearer.teardown(&mut self.transactor).await
    }

    /// One full deliver-and-close cycle for `payload`.
    pub async fn deliver(&mut self, payload: &[u8]) -> Result<()> {
        self.delivery
            .deliver(&mut self.transactor, &mut self.bearer, payload)
            .await
    }

    /// Encode `fix` for `identity` and deliver it.
    pub async fn send_telemetry(&mut self, identity: &Identity, fix: &Fix) -> Result<()> {
        let record = encode_record(identity, fix)?;
        self.deliver(record.as_bytes()).await
    }

    /// Run one arbitrary command under the retry policy.
    pub async fn execute(&mut self, command: &Command) -> Result<Outcome> {
        self.transactor.execute(command).await
    }

    pub fn bearer_state(&self) -> BearerState {
        self.bearer.state()
    }

    pub fn socket_state(&self) -> SocketState {
        self.delivery.state()
    }
}
