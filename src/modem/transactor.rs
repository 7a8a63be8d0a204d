//! Command/response transactor.
//!
//! One command line out, one completion token back, within a deadline. The
//! channel is owned exclusively for the whole exchange; there is never more than
//! one command in flight.

use log::{debug, warn};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::channel::ModemChannel;
use super::collector::{self, ResponseBuffer};
use super::error::{ModemError, Result};
use super::matcher::{Detection, Matcher};
use super::timing::Timing;
use crate::logutil::{escape_log, escape_response};
use crate::metrics;

/// Line terminator appended to every command.
pub const LINE_END: &str = "\r\n";

/// Terminal outcome of a command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// Neither token was observed before the deadline.
    Timeout,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// An outbound AT command with its retry and hold policy. Completion is the
/// generic status reply ([`Matcher::STATUS`]).
///
/// `hold` is both the minimum response wait (raised to the default timeout
/// when shorter) and the basis for pacing between tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub line: String,
    pub attempts: u32,
    pub hold: Duration,
}

impl Command {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            attempts: 1,
            hold: Duration::ZERO,
        }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn hold_ms(mut self, ms: u64) -> Self {
        self.hold = Duration::from_millis(ms);
        self
    }

    pub fn hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }
}

/// What one wait on the channel produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub detection: Option<Detection>,
    /// Captured response text (lossy UTF-8, bounded by the buffer capacity).
    pub text: String,
    pub truncated: bool,
}

impl Exchange {
    pub fn outcome(&self) -> Outcome {
        match self.detection {
            Some(Detection::Success) => Outcome::Success,
            Some(Detection::Failure) | Some(Detection::Teardown) => Outcome::Failure,
            None => Outcome::Timeout,
        }
    }

    fn from_buffer(detection: Option<Detection>, buffer: &ResponseBuffer) -> Self {
        Self {
            detection,
            text: buffer.text().into_owned(),
            truncated: buffer.is_truncated(),
        }
    }
}

/// Drives single commands over an exclusively owned [`ModemChannel`].
pub struct Transactor<C> {
    channel: C,
    timing: Timing,
}

impl<C: ModemChannel> Transactor<C> {
    pub fn new(channel: C, timing: Timing) -> Self {
        Self { channel, timing }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Run `command` under the retry policy and report how it ended.
    pub async fn execute(&mut self, command: &Command) -> Result<Outcome> {
        Ok(self.exchange(command).await?.outcome())
    }

    /// Like [`execute`](Self::execute) but a non-success outcome becomes
    /// `TransientCommandFailure` or `Timeout`.
    pub async fn require(&mut self, command: &Command) -> Result<Exchange> {
        let exchange = self.exchange(command).await?;
        match exchange.outcome() {
            Outcome::Success => Ok(exchange),
            Outcome::Failure => Err(ModemError::TransientCommandFailure {
                command: command.line.clone(),
            }),
            Outcome::Timeout => Err(ModemError::Timeout {
                command: command.line.clone(),
                budget: self.timing.response_budget(command.hold),
            }),
        }
    }

    /// Run `command` under the retry policy, returning the last exchange.
    ///
    /// For each of `attempts` outer iterations, up to `command_retry_count + 1`
    /// tries are made. A success returns at once. A failure token is retried
    /// after a backoff while retries remain; a timeout or exhausted retries move
    /// on to the next outer attempt. Every try is followed by a pacing pause.
    pub async fn exchange(&mut self, command: &Command) -> Result<Exchange> {
        let budget = self.timing.response_budget(command.hold);
        let retries = self.timing.command_retry_count;
        let mut last = Exchange {
            detection: None,
            text: String::new(),
            truncated: false,
        };

        for attempt in 0..command.attempts.max(1) {
            for retry in 0..=retries {
                if attempt > 0 || retry > 0 {
                    metrics::inc_command_retries();
                }
                last = self
                    .transact_once(&command.line, &Matcher::STATUS, budget)
                    .await?;
                sleep(self.timing.pace(command.hold)).await;

                match last.outcome() {
                    Outcome::Success => return Ok(last),
                    Outcome::Failure if retry < retries => {
                        debug!(
                            "{} failed (try {}/{}), retrying",
                            command.line,
                            retry + 1,
                            retries + 1
                        );
                        sleep(self.timing.backoff(command.hold)).await;
                    }
                    Outcome::Failure => {
                        metrics::inc_command_failures();
                        break;
                    }
                    Outcome::Timeout => {
                        metrics::inc_command_timeouts();
                        break;
                    }
                }
            }
        }
        if last.outcome() != Outcome::Success {
            warn!(
                "{} gave up after {} attempt(s): {:?}",
                command.line,
                command.attempts.max(1),
                last.outcome()
            );
        }
        Ok(last)
    }

    /// Single try: drain, send `line`, wait up to `window` for `matcher`.
    pub async fn transact_once(
        &mut self,
        line: &str,
        matcher: &Matcher,
        window: Duration,
    ) -> Result<Exchange> {
        collector::drain(&mut self.channel, &self.timing).await?;
        self.send_line(line)?;
        self.await_signal(matcher, window).await
    }

    /// Wait for `matcher` on a fresh buffer without sending anything first.
    pub async fn await_signal(&mut self, matcher: &Matcher, window: Duration) -> Result<Exchange> {
        let mut buffer = ResponseBuffer::new();
        let deadline = Instant::now() + window;
        let detection = buffer
            .absorb(&mut self.channel, matcher, deadline, &self.timing)
            .await?;
        debug!(
            "RX {:?} <- {}",
            detection,
            escape_response(buffer.as_bytes())
        );
        Ok(Exchange::from_buffer(detection, &buffer))
    }

    /// Transmit one command line with the line terminator.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        debug!("TX {}", escape_log(line));
        metrics::inc_commands_sent();
        let mut framed = String::with_capacity(line.len() + LINE_END.len());
        framed.push_str(line);
        framed.push_str(LINE_END);
        self.channel.write_all(framed.as_bytes())?;
        Ok(())
    }

    /// Write bytes verbatim (payload data, the 0x1A terminator).
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.channel.write_all(data)?;
        Ok(())
    }
}
