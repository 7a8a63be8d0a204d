//! Shared fixtures for the modem integration tests.
//! Every test runs on a paused tokio clock, so the real 8 s / 20 s / 85 s budgets
//! elapse instantly while still being measurable with `Instant`.

use simtrack::config::Config;
use simtrack::modem::mock::ScriptedChannel;
use simtrack::modem::Modem;

/// Lines a successful bearer bring-up sends, in order.
#[allow(dead_code)]
pub const BRING_UP_LINES: &[&str] = &[
    "AT+CIPSHUT",
    "AT+CGATT=1",
    "AT+CGATT?",
    "AT+CGDCONT=1,\"IP\",\"internet.netone\"",
    "AT+CSTT=\"internet.netone\",\"\",\"\"",
    "AT+CIICR",
    "AT+CIFSR",
];

/// A modem with the default configuration talking to a clone of `channel`.
pub fn modem(channel: &ScriptedChannel) -> Modem<ScriptedChannel> {
    Modem::from_config(channel.clone(), &Config::default())
}

/// Payload of exactly `len` printable bytes.
#[allow(dead_code)]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}
