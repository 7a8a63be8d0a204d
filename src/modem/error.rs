use std::time::Duration;
use thiserror::Error;

use crate::telemetry::TelemetryError;

/// Failure kinds surfaced by the modem engine.
///
/// None of these are fatal: each leaves the engine ready for a fresh attempt
/// from `Closed`/`Down`.
#[derive(Debug, Error)]
pub enum ModemError {
    /// The modem answered with a failure token on every attempt.
    #[error("command {command:?} failed after all retries")]
    TransientCommandFailure { command: String },

    /// No completion token was observed within the budget.
    #[error("no response to {command:?} within {budget:?}")]
    Timeout { command: String, budget: Duration },

    /// The packet network attach request failed or never reported attached.
    #[error("packet network attach failed: {0}")]
    AttachFailure(String),

    /// Context configuration or radio bearer activation failed.
    #[error("bearer bring-up failed: {0}")]
    BearerBringupFailure(String),

    /// The modem did not report a usable local IP address.
    #[error("local IP acquisition failed: {0}")]
    IpAcquisitionFailure(String),

    /// The TCP socket could not be opened.
    #[error("socket open failed: {0}")]
    SocketOpenFailure(String),

    /// The payload was not accepted by the modem.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// The telemetry record could not be built.
    #[error("payload error: {0}")]
    Payload(#[from] TelemetryError),

    /// Channel read/write error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
