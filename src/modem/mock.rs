//! Scripted in-memory modem.
//!
//! Each write is matched against a table of reply scripts keyed by command
//! line. A matching write consumes the next reply of its script; the last reply
//! repeats once the script is exhausted. Clones share state, so a test can keep
//! one handle and give the other to the engine.
//!
//! Keys match the written line without its terminator, either exactly or, when
//! the key ends in `*`, by prefix. The raw 0x1A terminator is matched by the key
//! `"\u{1a}"`.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::channel::ModemChannel;
use super::delivery::CTRL_Z;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bytes available immediately after the write.
    Text(String),
    /// Bytes available once the delay has elapsed.
    Delayed(Duration, String),
    /// Nothing comes back.
    Silence,
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub fn after(ms: u64, s: impl Into<String>) -> Self {
        Reply::Delayed(Duration::from_millis(ms), s.into())
    }
}

#[derive(Debug)]
struct Script {
    key: String,
    replies: Vec<Reply>,
    served: usize,
}

impl Script {
    fn matches(&self, line: &str) -> bool {
        match self.key.strip_suffix('*') {
            Some(prefix) => line.starts_with(prefix),
            None => line == self.key,
        }
    }

    fn next_reply(&mut self) -> Option<Reply> {
        let idx = self.served.min(self.replies.len().checked_sub(1)?);
        self.served += 1;
        Some(self.replies[idx].clone())
    }
}

#[derive(Debug, Default)]
struct Inner {
    scripts: Vec<Script>,
    writes: Vec<Vec<u8>>,
    written_at: Vec<Instant>,
    pending: VecDeque<(Instant, Vec<u8>)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedChannel {
    /// A modem that never answers anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A healthy SIM800 conversation for every command the engine issues.
    pub fn sim800() -> Self {
        Self::new()
            .set("AT", vec![Reply::text("\r\nOK\r\n")])
            .set("ATE0", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CFUN=1", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+IPR=*", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CIPSPRT=1", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CIPSHUT", vec![Reply::text("\r\nSHUT OK\r\n")])
            .set("AT+CGATT=1", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CGATT?", vec![Reply::text("\r\n+CGATT: 1\r\n\r\nOK\r\n")])
            .set("AT+CGDCONT=*", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CSTT=*", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CIICR", vec![Reply::text("\r\nOK\r\n")])
            .set("AT+CIFSR", vec![Reply::text("\r\n10.112.34.56\r\n")])
            .set(
                "AT+CIPSTART=*",
                vec![Reply::text("\r\nOK\r\n\r\nCONNECT OK\r\n")],
            )
            .set(
                "AT+CIPSTATUS",
                vec![Reply::text("\r\nOK\r\n\r\nSTATE: CONNECT OK\r\n")],
            )
            .set("AT+CIPSEND", vec![Reply::text("\r\n> ")])
            .set("\u{1a}", vec![Reply::text("\r\nSEND OK\r\n")])
            .set("AT+CIPCLOSE", vec![Reply::text("\r\nCLOSE OK\r\n")])
    }

    /// Replace (or add) the reply script for `key`.
    pub fn set(self, key: &str, replies: Vec<Reply>) -> Self {
        {
            let mut inner = self.lock();
            inner.scripts.retain(|s| s.key != key);
            inner.scripts.push(Script {
                key: key.to_string(),
                replies,
                served: 0,
            });
        }
        self
    }

    /// Queue unsolicited bytes, as if the modem emitted them on its own.
    pub fn inject(&self, data: &str) {
        self.lock()
            .pending
            .push_back((Instant::now(), data.as_bytes().to_vec()));
    }

    /// Every write, in order, as raw bytes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Written command lines with terminators stripped; raw payload writes included.
    pub fn lines(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|w| strip_terminator(&String::from_utf8_lossy(w)).to_string())
            .collect()
    }

    /// How many writes matched `key` (same matching rules as scripts).
    pub fn count(&self, key: &str) -> usize {
        self.write_times(key).len()
    }

    /// Clock readings of the writes that matched `key`, in order.
    pub fn write_times(&self, key: &str) -> Vec<Instant> {
        let wanted = Script {
            key: key.to_string(),
            replies: Vec::new(),
            served: 0,
        };
        let inner = self.lock();
        inner
            .writes
            .iter()
            .zip(&inner.written_at)
            .filter(|(w, _)| wanted.matches(strip_terminator(&String::from_utf8_lossy(w))))
            .map(|(_, at)| *at)
            .collect()
    }

    /// Number of single 0x1A terminator writes.
    pub fn terminators(&self) -> usize {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.as_slice() == [CTRL_Z])
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the writes from the assertion
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn strip_terminator(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'].as_slice())
}

impl ModemChannel for ScriptedChannel {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.writes.push(data.to_vec());
        inner.written_at.push(now);
        let line = String::from_utf8_lossy(data);
        let line = strip_terminator(&line);
        let reply = inner
            .scripts
            .iter_mut()
            .find(|s| s.matches(line))
            .and_then(Script::next_reply);
        match reply {
            Some(Reply::Text(text)) => inner.pending.push_back((now, text.into_bytes())),
            Some(Reply::Delayed(delay, text)) => {
                inner.pending.push_back((now + delay, text.into_bytes()))
            }
            Some(Reply::Silence) | None => {}
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        let now = Instant::now();
        let mut n = 0usize;
        while n < buf.len() {
            let Some((ready_at, data)) = inner.pending.front_mut() else {
                break;
            };
            if *ready_at > now {
                break;
            }
            let take = data.len().min(buf.len() - n);
            buf[n..n + take].copy_from_slice(&data[..take]);
            data.drain(..take);
            n += take;
            if data.is_empty() {
                inner.pending.pop_front();
            }
        }
        Ok(n)
    }
}
