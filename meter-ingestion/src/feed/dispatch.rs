use std::time::SystemTime;

use futures::{Stream, StreamExt};
use meter_client::domain::MeterReading;
use tokio::task::JoinSet;

use super::Envelope;
use crate::ingest::{decode_feed_payload, IngestError, IngestSource, IngestionWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Decode,
    Store,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Decode => "decode",
            DropReason::Store => "store",
        }
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Stored(MeterReading),
    Dropped(DropReason),
}

/// Decode and write one feed message. Failures are logged and the message
/// is dropped; nothing is retried.
pub async fn handle_message(writer: &IngestionWriter, env: Envelope<Vec<u8>>) -> DispatchOutcome {
    let reading = match decode_feed_payload(&env.payload) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, bytes = env.payload.len(), "dropping undecodable feed message");
            return dropped(DropReason::Decode);
        }
    };

    match writer.write(reading, IngestSource::Feed).await {
        Ok(row) => {
            if let Ok(dur) = SystemTime::now().duration_since(env.received_at) {
                metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
            }
            DispatchOutcome::Stored(row)
        }
        Err(IngestError::Validation(e)) => {
            tracing::warn!(error = %e, "dropping invalid feed message");
            dropped(DropReason::Decode)
        }
        Err(IngestError::Store(e)) => {
            tracing::error!(error = %e, "failed to store feed message, dropping");
            dropped(DropReason::Store)
        }
    }
}

fn dropped(reason: DropReason) -> DispatchOutcome {
    metrics::counter!("feed_messages_dropped_total", "reason" => reason.as_str()).increment(1);
    DispatchOutcome::Dropped(reason)
}

/// Drain `messages` until the stream ends, writing each one on its own task
/// so a slow insert never holds up receiving. Returns once every in-flight
/// write has finished.
pub async fn run_dispatcher<S>(mut messages: S, writer: IngestionWriter)
where
    S: Stream<Item = Envelope<Vec<u8>>> + Unpin,
{
    let mut in_flight = JoinSet::new();

    while let Some(env) = messages.next().await {
        let writer = writer.clone();
        in_flight.spawn(async move { handle_message(&writer, env).await });

        // Reap completed writes so the set doesn't grow with uptime.
        while let Some(res) = in_flight.try_join_next() {
            log_join_error(res);
        }
    }

    while let Some(res) = in_flight.join_next().await {
        log_join_error(res);
    }
    tracing::info!("feed dispatcher stopped");
}

fn log_join_error(res: Result<DispatchOutcome, tokio::task::JoinError>) {
    if let Err(e) = res {
        tracing::error!(error = %e, "feed write task failed");
    }
}
