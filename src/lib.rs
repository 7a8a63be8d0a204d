//! # Simtrack - Cellular Telemetry Uplink over AT Commands
//!
//! Simtrack drives a SIM800-class GSM/GPRS modem over a serial line to bring up a
//! packet-data bearer and deliver small telemetry records over TCP.
//!
//! ## Features
//!
//! - **AT Protocol Engine**: Bounded response collection, per-command retry and pacing,
//!   explicit `Success` / `Failure` / `Timeout` outcomes.
//! - **Bearer Lifecycle**: Shut, attach, attach polling, APN context, radio bring-up and
//!   local IP validation as one state machine.
//! - **TCP Delivery**: Socket open with a single bearer rebuild on context teardown,
//!   prompt-gated payload streaming, send confirmation and an unconditional close.
//! - **Typed Failures**: Every operation returns a [`modem::ModemError`] kind; nothing
//!   is fatal to the process.
//! - **Async Design**: Built on Tokio; all waits are deadline-bounded sleeps.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use simtrack::config::Config;
//! use simtrack::modem::{Modem, SerialChannel};
//! use simtrack::telemetry::Fix;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let channel = SerialChannel::open(&config.modem.port, config.modem.baud_rate).await?;
//!     let mut modem = Modem::from_config(channel, &config);
//!     modem.initialize().await?;
//!     let fix = Fix::new(-17.812345, 31.052345).with_speed(42.1).with_heading(123.4);
//!     modem.send_telemetry(&config.device.identity(), &fix).await?;
//!     Ok(())
//! }
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`modem`] - AT command engine: collector, transactor, bearer, delivery
//! - [`telemetry`] - fixes, fix providers and the compact wire record
//! - [`config`] - TOML configuration and validation
//! - [`metrics`] - process-wide counters
//! - [`logutil`] - single-line escaping of raw modem traffic
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ Delivery Sequencer  │ ← open / prompt / payload / confirm / close
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │ Bearer Controller   │ ← attach, APN context, bring-up, IP
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │ Transactor          │ ← command, token, retry, pacing
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │ Response Collector  │ ← bounded buffer over the serial channel
//! └─────────────────────┘
//! ```

pub mod config;
pub mod logutil;
pub mod metrics;
pub mod modem;
pub mod telemetry;
