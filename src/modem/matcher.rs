//! Token matching over accumulated modem output.
//!
//! Responses are never parsed line by line. The whole accumulated buffer is
//! searched for fixed substrings, which survives the modem's inconsistent line
//! endings, unsolicited notifications interleaved with replies, and tokens split
//! across read chunks.
//!
//! When more than one class of token is present the priority is fixed here and
//! nowhere else: **teardown, then failure, then success**. A diagnostic line
//! that happens to contain `OK` never masks an `ERROR`, and a context
//! deactivation report wins over the generic failure that usually follows it.

use std::net::Ipv4Addr;

/// What a matcher observed in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Success,
    Failure,
    /// The network dropped the packet-data context.
    Teardown,
}

/// Fixed substring sets for one completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSet {
    pub success: &'static [&'static str],
    pub failure: &'static [&'static str],
    pub teardown: &'static [&'static str],
}

impl TokenSet {
    fn detect(&self, text: &str) -> Option<Detection> {
        let any = |tokens: &[&str]| tokens.iter().any(|t| text.contains(t));
        if any(self.teardown) {
            Some(Detection::Teardown)
        } else if any(self.failure) {
            Some(Detection::Failure)
        } else if any(self.success) {
            Some(Detection::Success)
        } else {
            None
        }
    }
}

/// Completion condition for one exchange with the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Tokens(TokenSet),
    /// Success is a complete dotted-quad line rather than a status token.
    Ipv4Address,
}

impl Matcher {
    /// Generic `OK` / `ERROR` / `FAIL` status reply.
    pub const STATUS: Matcher = Matcher::Tokens(TokenSet {
        success: &["OK"],
        failure: &["ERROR", "FAIL"],
        teardown: &[],
    });

    /// `AT+CGATT?` answer. `+CGATT: 0` is a completed "not yet" reply.
    pub const ATTACHED: Matcher = Matcher::Tokens(TokenSet {
        success: &["+CGATT: 1"],
        failure: &["+CGATT: 0", "ERROR"],
        teardown: &[],
    });

    pub const SOCKET_OPEN: Matcher = Matcher::Tokens(TokenSet {
        success: &["CONNECT OK", "ALREADY CONNECT"],
        failure: &["CONNECT FAIL", "ERROR"],
        teardown: &["PDP DEACT", "+PDP: DEACT"],
    });

    pub const DATA_PROMPT: Matcher = Matcher::Tokens(TokenSet {
        success: &[">"],
        failure: &["ERROR"],
        teardown: &[],
    });

    pub const SEND_CONFIRM: Matcher = Matcher::Tokens(TokenSet {
        success: &["SEND OK"],
        failure: &["SEND FAIL", "ERROR"],
        teardown: &[],
    });

    pub fn detect(&self, text: &str) -> Option<Detection> {
        match self {
            Matcher::Tokens(set) => set.detect(text),
            Matcher::Ipv4Address => {
                if find_ipv4(text).is_some() {
                    Some(Detection::Success)
                } else if text.contains("ERROR") {
                    Some(Detection::Failure)
                } else {
                    None
                }
            }
        }
    }
}

/// First complete line of `text` that parses as a usable IPv4 address.
///
/// A line only counts once its terminator has arrived, so `10.0.0.1` is not
/// reported while `10.0.0.12` is still streaming in.
pub fn find_ipv4(text: &str) -> Option<Ipv4Addr> {
    let end = text.rfind(is_line_end)?;
    text[..end]
        .split(is_line_end)
        .map(str::trim)
        .filter(|line| line.len() >= 7 && line.contains('.'))
        .filter_map(|line| line.parse::<Ipv4Addr>().ok())
        .find(|ip| !ip.is_unspecified())
}

fn is_line_end(c: char) -> bool {
    c == '\r' || c == '\n'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_wins_over_ok_substring() {
        let text = "\r\nCONNECT FAIL\r\nSTATE: TCP CLOSED OK\r\n";
        assert_eq!(Matcher::STATUS.detect(text), Some(Detection::Failure));
    }

    #[test]
    fn teardown_wins_over_failure() {
        let text = "\r\nPDP DEACT\r\n\r\nERROR\r\n";
        assert_eq!(Matcher::SOCKET_OPEN.detect(text), Some(Detection::Teardown));
    }

    #[test]
    fn plain_ok_does_not_complete_socket_open() {
        assert_eq!(Matcher::SOCKET_OPEN.detect("\r\nOK\r\n"), None);
        assert_eq!(
            Matcher::SOCKET_OPEN.detect("\r\nOK\r\n\r\nALREADY CONNECT\r\n"),
            Some(Detection::Success)
        );
    }

    #[test]
    fn attach_poll_distinguishes_states() {
        assert_eq!(
            Matcher::ATTACHED.detect("\r\n+CGATT: 1\r\n\r\nOK\r\n"),
            Some(Detection::Success)
        );
        assert_eq!(
            Matcher::ATTACHED.detect("\r\n+CGATT: 0\r\n\r\nOK\r\n"),
            Some(Detection::Failure)
        );
        assert_eq!(Matcher::ATTACHED.detect("\r\nOK\r\n"), None);
    }

    #[test]
    fn ipv4_requires_complete_line() {
        assert_eq!(find_ipv4("\r\n10.112.34.5"), None);
        assert_eq!(
            find_ipv4("\r\n10.112.34.56\r\n"),
            Some(Ipv4Addr::new(10, 112, 34, 56))
        );
        assert_eq!(
            Matcher::Ipv4Address.detect("AT+CIFSR\r\n100.64.1.9\r\n"),
            Some(Detection::Success)
        );
    }

    #[test]
    fn ipv4_rejects_garbage_and_unspecified() {
        assert_eq!(find_ipv4("\r\n0.0.0.0\r\n"), None);
        assert_eq!(find_ipv4("\r\n1.2.3\r\n"), None);
        assert_eq!(find_ipv4("\r\n+CME: 3.1.4.1.5\r\n"), None);
        assert_eq!(
            Matcher::Ipv4Address.detect("\r\nERROR\r\n"),
            Some(Detection::Failure)
        );
    }
}
