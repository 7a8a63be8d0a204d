mod common;

use common::modem;
use simtrack::modem::mock::{Reply, ScriptedChannel};
use simtrack::modem::{Command, ModemError, Outcome};

#[tokio::test(start_paused = true)]
async fn initialize_sends_setup_sequence() {
    let ch = ScriptedChannel::sim800();
    let mut m = modem(&ch);
    m.initialize().await.unwrap();
    assert_eq!(
        ch.lines(),
        ["AT", "ATE0", "AT+CFUN=1", "AT+IPR=9600", "AT+CIPSPRT=1"]
    );
}

#[tokio::test(start_paused = true)]
async fn silent_modem_fails_handshake() {
    let ch = ScriptedChannel::new();
    let mut m = modem(&ch);
    let err = m.initialize().await.unwrap_err();
    assert!(
        matches!(err, ModemError::Timeout { ref command, .. } if command == "AT"),
        "got {err:?}"
    );
    assert_eq!(ch.count("ATE0"), 0);
}

#[tokio::test(start_paused = true)]
async fn setup_errors_are_best_effort() {
    let ch = ScriptedChannel::sim800()
        .set("ATE0", vec![Reply::text("\r\nERROR\r\n")])
        .set("AT+IPR=*", vec![Reply::Silence]);
    let mut m = modem(&ch);
    m.initialize().await.unwrap();
    assert_eq!(ch.count("ATE0"), 3);
    assert_eq!(ch.count("AT+CIPSPRT=1"), 1);
}

#[tokio::test(start_paused = true)]
async fn arbitrary_command_runs_under_retry_policy() {
    let ch = ScriptedChannel::sim800().set(
        "AT+CSQ",
        vec![Reply::text("\r\n+CSQ: 18,0\r\n\r\nOK\r\n")],
    );
    let mut m = modem(&ch);
    let outcome = m.execute(&Command::new("AT+CSQ").attempts(2)).await.unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(ch.count("AT+CSQ"), 1);
}
