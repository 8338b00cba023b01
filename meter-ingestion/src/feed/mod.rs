//! Broker feed subscription.
//!
//! The MQTT event loop runs on its own task and forwards raw payloads over a
//! bounded channel; the dispatcher drains that channel and hands each message
//! to the [`crate::ingest::IngestionWriter`] on a task of its own.

use std::{sync::Arc, time::SystemTime};

use tokio::sync::watch;

pub mod dispatch;
pub mod mqtt;

pub use dispatch::{handle_message, run_dispatcher, DispatchOutcome, DropReason};
pub use mqtt::{parse_broker_url, BrokerAddr, FeedError, MqttSubscriber};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl FeedState {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Subscribed => "subscribed",
        }
    }
}

/// Shared view of the subscription state. Written by the event loop, read
/// by the health reporter.
#[derive(Clone)]
pub struct FeedStatus {
    tx: Arc<watch::Sender<FeedState>>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, state: FeedState) {
        let prev = self.tx.send_replace(state);
        if prev != state {
            tracing::debug!(from = prev.as_str(), to = state.as_str(), "feed state changed");
        }
    }

    pub fn state(&self) -> FeedState {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == FeedState::Subscribed
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_starts_disconnected_and_tracks_transitions() {
        let status = FeedStatus::new();
        assert_eq!(status.state(), FeedState::Disconnected);

        let observer = status.clone();
        status.set(FeedState::Connecting);
        assert!(!observer.is_connected());

        status.set(FeedState::Subscribed);
        assert!(observer.is_connected());

        status.set(FeedState::Connecting);
        assert_eq!(observer.state(), FeedState::Connecting);
    }
}
