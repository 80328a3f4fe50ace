//! Link-button pairing.
//!
//! The bridge only issues an application key while its link button is
//! pressed, so [`PairingWaiter`] re-sends the request on a fixed interval
//! until a key arrives, the bridge refuses, the deadline passes, or the
//! provider is stopped.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::{
    PAIRING_INTERVAL, PAIRING_MAX_TRANSIENT_FAILURES, PAIRING_TIMEOUT, REQUEST_TIMEOUT,
};
use crate::error::AuthError;

/// Hue error type meaning "link button not pressed".
const LINK_BUTTON_NOT_PRESSED: u32 = 101;

/// Outcome of one accepted pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    /// The bridge is waiting for the link button; ask again later.
    LinkButtonNotPressed,
    /// The bridge issued an application key.
    Issued(String),
}

/// Failure of one pairing request.
#[derive(Debug, Error)]
pub enum PairingAttemptError {
    /// The bridge refused the request.
    #[error("{0}")]
    Rejected(String),
    /// The request never reached the bridge or timed out.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sends a single pairing request to a bridge.
#[async_trait]
pub trait PairingClient: Send + Sync {
    /// Ask the bridge at `bridge_address` for a new application key.
    async fn request_key(&self, bridge_address: &str)
        -> Result<PairingStatus, PairingAttemptError>;
}

/// States of the pairing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// Not started.
    Idle,
    /// Waiting for the link button.
    Polling,
    /// A key was issued.
    Paired,
    /// The deadline passed first.
    TimedOut,
    /// The bridge refused, or transport kept failing.
    Failed,
    /// The provider was stopped.
    Cancelled,
}

/// Time window of one pairing run.
#[derive(Debug, Clone, Copy)]
pub struct PairingAttempt {
    /// When polling started.
    pub started_at: Instant,
    /// When polling gives up.
    pub deadline: Instant,
}

impl PairingAttempt {
    fn start() -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + PAIRING_TIMEOUT,
        }
    }
}

/// Polls a bridge until it issues an application key.
pub struct PairingWaiter<'a> {
    client: &'a dyn PairingClient,
    cancel: watch::Receiver<bool>,
    state: PairingState,
    ticks: u32,
}

impl<'a> PairingWaiter<'a> {
    /// Create a waiter. Raising the `cancel` flag stops it at the next tick.
    pub fn new(client: &'a dyn PairingClient, cancel: watch::Receiver<bool>) -> Self {
        Self {
            client,
            cancel,
            state: PairingState::Idle,
            ticks: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Number of pairing requests sent so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Run the state machine to a terminal state.
    #[instrument(skip(self), fields(bridge_ip = %bridge_address))]
    pub async fn wait(&mut self, bridge_address: &str) -> Result<String, AuthError> {
        let attempt = PairingAttempt::start();
        self.state = PairingState::Polling;

        let mut ticker = interval(PAIRING_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep_until(attempt.deadline);
        tokio::pin!(deadline);

        let mut transient_failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    self.state = PairingState::TimedOut;
                    warn!(ticks = self.ticks, "Pairing deadline reached");
                    return Err(AuthError::PairingTimeout);
                }
                _ = ticker.tick() => {}
            }

            if *self.cancel.borrow() {
                self.state = PairingState::Cancelled;
                return Err(AuthError::PairingCancelled);
            }

            info!("Waiting for hue bridge button to be pressed");
            self.ticks += 1;

            match self.client.request_key(bridge_address).await {
                Ok(PairingStatus::LinkButtonNotPressed) => {
                    transient_failures = 0;
                }
                Ok(PairingStatus::Issued(key)) => {
                    self.state = PairingState::Paired;
                    info!(
                        ticks = self.ticks,
                        elapsed_ms = attempt.started_at.elapsed().as_millis() as u64,
                        "Paired with Hue Bridge"
                    );
                    return Ok(key);
                }
                Err(PairingAttemptError::Transport(reason))
                    if transient_failures < PAIRING_MAX_TRANSIENT_FAILURES =>
                {
                    transient_failures += 1;
                    debug!(%reason, transient_failures, "Pairing request did not reach the bridge");
                }
                Err(err) => {
                    self.state = PairingState::Failed;
                    return Err(AuthError::PairingFailed(err.to_string()));
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PairingResponseItem {
    #[serde(default)]
    success: Option<PairingSuccess>,
    #[serde(default)]
    error: Option<BridgeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct PairingSuccess {
    username: String,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    #[serde(rename = "type")]
    kind: u32,
    #[serde(default)]
    description: String,
}

fn interpret_response(
    items: Vec<PairingResponseItem>,
) -> Result<PairingStatus, PairingAttemptError> {
    let item = items
        .into_iter()
        .next()
        .ok_or_else(|| PairingAttemptError::Rejected("empty pairing response".to_string()))?;

    match (item.success, item.error) {
        (Some(success), _) => Ok(PairingStatus::Issued(success.username)),
        (None, Some(err)) if err.kind == LINK_BUTTON_NOT_PRESSED => {
            Ok(PairingStatus::LinkButtonNotPressed)
        }
        (None, Some(err)) => Err(PairingAttemptError::Rejected(format!(
            "bridge error {}: {}",
            err.kind, err.description
        ))),
        (None, None) => Err(PairingAttemptError::Rejected(
            "pairing response had neither success nor error".to_string(),
        )),
    }
}

/// [`PairingClient`] talking to a real bridge over HTTPS.
#[derive(Debug, Clone)]
pub struct BridgeAuthenticator {
    http: reqwest::Client,
    device_type: String,
}

impl BridgeAuthenticator {
    /// Create an authenticator that trusts the bridge's self-signed certificate.
    pub fn new() -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::PairingFailed(format!("failed to create authenticator: {}", e)))?;

        Ok(Self {
            http,
            device_type: format!("{}#{}", env!("CARGO_PKG_NAME"), std::env::consts::OS),
        })
    }
}

#[async_trait]
impl PairingClient for BridgeAuthenticator {
    async fn request_key(
        &self,
        bridge_address: &str,
    ) -> Result<PairingStatus, PairingAttemptError> {
        let items: Vec<PairingResponseItem> = self
            .http
            .post(format!("https://{}/api", bridge_address))
            .json(&serde_json::json!({
                "devicetype": self.device_type,
                "generateclientkey": true,
            }))
            .send()
            .await
            .map_err(|e| PairingAttemptError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| PairingAttemptError::Rejected(format!("unexpected response: {}", e)))?;

        interpret_response(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPairing;
    use std::time::Duration;

    fn not_pressed() -> Result<PairingStatus, PairingAttemptError> {
        Ok(PairingStatus::LinkButtonNotPressed)
    }

    fn parse(json: &str) -> Result<PairingStatus, PairingAttemptError> {
        interpret_response(serde_json::from_str(json).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairs_after_button_press() {
        let client = ScriptedPairing::new(vec![
            not_pressed(),
            not_pressed(),
            not_pressed(),
            Ok(PairingStatus::Issued("new-key".into())),
        ]);
        let (_tx, rx) = watch::channel(false);
        let mut waiter = PairingWaiter::new(&client, rx);
        assert_eq!(waiter.state(), PairingState::Idle);

        let start = Instant::now();
        let key = waiter.wait("10.0.0.2").await.unwrap();

        assert_eq!(key, "new-key");
        assert_eq!(waiter.state(), PairingState::Paired);
        assert_eq!(waiter.ticks(), 4);
        assert_eq!(client.calls(), 4);
        assert!(start.elapsed() >= PAIRING_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_one_minute() {
        let client = ScriptedPairing::new(vec![]);
        let (_tx, rx) = watch::channel(false);
        let mut waiter = PairingWaiter::new(&client, rx);

        let start = Instant::now();
        let err = waiter.wait("10.0.0.2").await.unwrap_err();

        assert!(matches!(err, AuthError::PairingTimeout));
        assert_eq!(waiter.state(), PairingState::TimedOut);
        assert!(start.elapsed() >= PAIRING_TIMEOUT);
        assert!(start.elapsed() < PAIRING_TIMEOUT + PAIRING_INTERVAL);
        assert_eq!(client.calls(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_fails_immediately() {
        let client = ScriptedPairing::new(vec![
            not_pressed(),
            Err(PairingAttemptError::Rejected("bridge error 7: invalid value".into())),
            Ok(PairingStatus::Issued("never".into())),
        ]);
        let (_tx, rx) = watch::channel(false);
        let mut waiter = PairingWaiter::new(&client, rx);

        let err = waiter.wait("10.0.0.2").await.unwrap_err();

        assert!(matches!(err, AuthError::PairingFailed(ref msg) if msg.contains("invalid value")));
        assert_eq!(waiter.state(), PairingState::Failed);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_transport_errors_are_retried() {
        let client = ScriptedPairing::new(vec![
            Err(PairingAttemptError::Transport("connection refused".into())),
            Err(PairingAttemptError::Transport("connection refused".into())),
            not_pressed(),
            Err(PairingAttemptError::Transport("timed out".into())),
            Ok(PairingStatus::Issued("key".into())),
        ]);
        let (_tx, rx) = watch::channel(false);
        let mut waiter = PairingWaiter::new(&client, rx);

        assert_eq!(waiter.wait("10.0.0.2").await.unwrap(), "key");
        assert_eq!(client.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transport_errors_fail() {
        let script = (0..4)
            .map(|_| Err(PairingAttemptError::Transport("unreachable".into())))
            .collect();
        let client = ScriptedPairing::new(script);
        let (_tx, rx) = watch::channel(false);
        let mut waiter = PairingWaiter::new(&client, rx);

        let err = waiter.wait("10.0.0.2").await.unwrap_err();
        assert!(matches!(err, AuthError::PairingFailed(_)));
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_request() {
        let client = ScriptedPairing::new(vec![]);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut waiter = PairingWaiter::new(&client, rx);

        let err = waiter.wait("10.0.0.2").await.unwrap_err();
        assert!(matches!(err, AuthError::PairingCancelled));
        assert_eq!(waiter.state(), PairingState::Cancelled);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_polling() {
        let client = ScriptedPairing::new(vec![]);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            let _ = tx.send(true);
            // keep the sender alive until the waiter observed the flag
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let mut waiter = PairingWaiter::new(&client, rx);

        let start = Instant::now();
        let err = waiter.wait("10.0.0.2").await.unwrap_err();
        assert!(matches!(err, AuthError::PairingCancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(client.calls() < 5);
    }

    #[test]
    fn test_interpret_success() {
        let status = parse(r#"[{"success":{"username":"abc","clientkey":"DEF"}}]"#).unwrap();
        assert_eq!(status, PairingStatus::Issued("abc".into()));
    }

    #[test]
    fn test_interpret_link_button() {
        let status = parse(
            r#"[{"error":{"type":101,"address":"","description":"link button not pressed"}}]"#,
        )
        .unwrap();
        assert_eq!(status, PairingStatus::LinkButtonNotPressed);
    }

    #[test]
    fn test_interpret_other_error() {
        let err = parse(r#"[{"error":{"type":7,"description":"invalid value"}}]"#).unwrap_err();
        assert!(matches!(err, PairingAttemptError::Rejected(ref m) if m == "bridge error 7: invalid value"));
    }

    #[test]
    fn test_interpret_empty() {
        assert!(matches!(
            parse("[]"),
            Err(PairingAttemptError::Rejected(_))
        ));
        assert!(matches!(
            parse("[{}]"),
            Err(PairingAttemptError::Rejected(_))
        ));
    }
}
