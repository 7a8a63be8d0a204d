use simtrack::modem::mock::{Reply, ScriptedChannel};
use simtrack::modem::{Command, Outcome, Timing, Transactor};
use std::time::Duration;
use tokio::time::Instant;

fn transactor(channel: &ScriptedChannel) -> Transactor<ScriptedChannel> {
    Transactor::new(channel.clone(), Timing::default())
}

#[tokio::test(start_paused = true)]
async fn success_returns_after_first_try() {
    let ch = ScriptedChannel::sim800();
    let mut tx = transactor(&ch);
    let outcome = tx
        .execute(&Command::new("AT").attempts(3).hold_ms(300))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(ch.count("AT"), 1);
    assert_eq!(ch.writes()[0], b"AT\r\n".to_vec());
}

#[tokio::test(start_paused = true)]
async fn failure_token_retries_same_command() {
    let ch = ScriptedChannel::new().set(
        "AT+CGATT=1",
        vec![
            Reply::text("\r\nERROR\r\n"),
            Reply::text("\r\nERROR\r\n"),
            Reply::text("\r\nOK\r\n"),
        ],
    );
    let mut tx = transactor(&ch);
    let outcome = tx
        .execute(&Command::new("AT+CGATT=1").hold_ms(600))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(ch.count("AT+CGATT=1"), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_exhausts_every_attempt_and_retry() {
    let ch = ScriptedChannel::new().set("AT+CSTT=*", vec![Reply::text("\r\nERROR\r\n")]);
    let mut tx = transactor(&ch);
    let outcome = tx
        .execute(&Command::new("AT+CSTT=\"x\",\"\",\"\"").attempts(2).hold_ms(300))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Failure);
    // 2 attempts x (2 retries + 1)
    assert_eq!(ch.count("AT+CSTT=*"), 6);
}

#[tokio::test(start_paused = true)]
async fn silence_is_timeout_within_budget() {
    let ch = ScriptedChannel::new();
    let mut tx = transactor(&ch);
    let start = Instant::now();
    let outcome = tx
        .execute(&Command::new("AT+CIPSTATUS").attempts(2).hold_ms(300))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome, Outcome::Timeout);
    // A timeout moves straight to the next attempt, no inner retries
    assert_eq!(ch.count("AT+CIPSTATUS"), 2);
    assert!(elapsed >= Duration::from_secs(16), "elapsed {elapsed:?}");
    // attempts x (retries + 1) x max(hold, default timeout) plus pacing
    let bound = Duration::from_secs(2 * 3 * 8) + Duration::from_millis(2 * 3 * (30 + 150 + 300));
    assert!(elapsed <= bound, "elapsed {elapsed:?} over {bound:?}");
}

#[tokio::test(start_paused = true)]
async fn require_maps_outcomes_to_errors() {
    let ch = ScriptedChannel::new().set("AT+CFUN=1", vec![Reply::text("\r\nERROR\r\n")]);
    let mut tx = transactor(&ch);
    let err = tx.require(&Command::new("AT+CFUN=1")).await.unwrap_err();
    assert!(matches!(
        err,
        simtrack::modem::ModemError::TransientCommandFailure { ref command } if command == "AT+CFUN=1"
    ));

    let err = tx.require(&Command::new("AT")).await.unwrap_err();
    assert!(matches!(
        err,
        simtrack::modem::ModemError::Timeout { budget, .. } if budget == Duration::from_secs(8)
    ));
}

#[tokio::test(start_paused = true)]
async fn failure_token_is_not_masked_by_ok() {
    let ch = ScriptedChannel::new().set(
        "AT+CIPCLOSE",
        vec![Reply::text("\r\nSTATE: IP OK\r\n\r\nERROR\r\n")],
    );
    let mut tx = transactor(&ch);
    let exchange = tx
        .exchange(&Command::new("AT+CIPCLOSE").hold_ms(1_500))
        .await
        .unwrap();
    assert_eq!(exchange.outcome(), Outcome::Failure);
    assert!(exchange.text.contains("ERROR"));
}

#[tokio::test(start_paused = true)]
async fn stale_input_is_not_read_as_the_reply() {
    let ch = ScriptedChannel::new();
    ch.inject("\r\nOK\r\n");
    let mut tx = transactor(&ch);
    let outcome = tx.execute(&Command::new("AT+CIICR")).await.unwrap();
    assert_eq!(outcome, Outcome::Timeout);
}

#[tokio::test(start_paused = true)]
async fn token_beyond_capacity_is_unobservable() {
    let mut noise = "x".repeat(300);
    noise.push_str("\r\nOK\r\n");
    let ch = ScriptedChannel::new().set("AT+CIPSTATUS", vec![Reply::text(noise)]);
    let mut tx = transactor(&ch);
    let exchange = tx
        .exchange(&Command::new("AT+CIPSTATUS"))
        .await
        .unwrap();
    assert_eq!(exchange.outcome(), Outcome::Timeout);
    assert!(exchange.truncated);
    assert_eq!(exchange.text.len(), simtrack::modem::collector::RESPONSE_CAPACITY);
}

#[tokio::test(start_paused = true)]
async fn delayed_reply_within_budget_succeeds() {
    let ch = ScriptedChannel::new().set("AT", vec![Reply::after(5_000, "\r\nOK\r\n")]);
    let mut tx = transactor(&ch);
    let start = Instant::now();
    let outcome = tx.execute(&Command::new("AT").hold_ms(300)).await.unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(ch.count("AT"), 1);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(8));
}
