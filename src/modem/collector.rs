//! Response collector: bounded accumulation of modem output.

use bytes::BytesMut;
use log::trace;
use std::borrow::Cow;
use tokio::time::{sleep, Instant};

use super::channel::ModemChannel;
use super::error::Result;
use super::matcher::{Detection, Matcher};
use super::timing::Timing;
use crate::logutil::escape_response;

/// Default capacity of a per-transaction response buffer.
pub const RESPONSE_CAPACITY: usize = 256;

const READ_CHUNK: usize = 64;

/// Fixed-capacity, append-only buffer of raw modem output.
///
/// Bytes arriving after the buffer is full are dropped, never spilled. A token
/// that only appears past the cut is therefore invisible and the wait degrades to
/// "token not found"; memory stays bounded.
#[derive(Debug)]
pub struct ResponseBuffer {
    buf: BytesMut,
    capacity: usize,
    dropped: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_capacity(RESPONSE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append as much of `data` as fits; returns the number of bytes kept.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let room = self.capacity - self.buf.len();
        let keep = room.min(data.len());
        self.buf.extend_from_slice(&data[..keep]);
        self.dropped += data.len() - keep;
        keep
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes discarded since the last reset because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    pub fn detect(&self, matcher: &Matcher) -> Option<Detection> {
        matcher.detect(&self.text())
    }

    /// Read everything the channel has for us until `matcher` fires or
    /// `deadline` passes. Returns the detection, or `None` on timeout.
    ///
    /// The whole buffer is re-scanned after every chunk, so a token split
    /// across two reads is still found.
    pub async fn absorb<C: ModemChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        matcher: &Matcher,
        deadline: Instant,
        timing: &Timing,
    ) -> Result<Option<Detection>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = channel.read_available(&mut chunk)?;
            if n > 0 {
                trace!("RX {} bytes: {}", n, escape_response(&chunk[..n]));
                self.append(&chunk[..n]);
                if let Some(hit) = self.detect(matcher) {
                    return Ok(Some(hit));
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if n > 0 {
                // More may already be queued; only yield, don't sleep
                tokio::task::yield_now().await;
            } else {
                sleep(timing.poll_interval().min(deadline - now)).await;
            }
        }
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Discard whatever arrives during `window` so leftovers from a previous
/// exchange cannot be read as the next command's reply.
pub async fn drain<C: ModemChannel + ?Sized>(channel: &mut C, timing: &Timing) -> Result<usize> {
    let deadline = Instant::now() + timing.drain_window();
    let mut chunk = [0u8; READ_CHUNK];
    let mut discarded = 0usize;
    loop {
        loop {
            let n = channel.read_available(&mut chunk)?;
            if n == 0 {
                break;
            }
            discarded += n;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(timing.poll_interval().min(deadline - now)).await;
    }
    if discarded > 0 {
        trace!("Drained {} stale bytes", discarded);
    }
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_truncates_silently_at_capacity() {
        let mut buf = ResponseBuffer::with_capacity(8);
        assert_eq!(buf.append(b"0123"), 4);
        assert_eq!(buf.append(b"456789"), 4);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.dropped(), 2);
        assert!(buf.is_truncated());
        assert_eq!(buf.append(b"OK"), 0);
        assert_eq!(buf.detect(&Matcher::STATUS), None);
    }

    #[test]
    fn fresh_buffer_sees_nothing() {
        let buf = ResponseBuffer::new();
        assert!(buf.is_empty());
        assert!(!buf.is_truncated());
        assert_eq!(buf.detect(&Matcher::STATUS), None);
    }

    #[test]
    fn token_split_across_chunks_is_found() {
        let mut buf = ResponseBuffer::new();
        buf.append(b"\r\nSEND O");
        assert_eq!(buf.detect(&Matcher::SEND_CONFIRM), None);
        buf.append(b"K\r\n");
        assert_eq!(buf.detect(&Matcher::SEND_CONFIRM), Some(Detection::Success));
    }
}
