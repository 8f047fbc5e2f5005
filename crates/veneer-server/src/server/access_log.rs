//! Buffered request-log channel.
//!
//! The serving layer pushes one entry per completed request without blocking;
//! a single aggregator task drains the channel and emits structured lines for
//! the external log collector.

use tokio::sync::mpsc;
use tracing::info;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct AccessLog {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub remote: String,
}

#[derive(Clone)]
pub struct AccessLogSender {
    tx: mpsc::Sender<AccessLog>,
}

impl AccessLogSender {
    /// Non-blocking send; entries are dropped when the aggregator lags.
    pub fn record(&self, entry: AccessLog) {
        let _ = self.tx.try_send(entry);
    }
}

/// Spawn the aggregator task and hand back the sending half.
pub fn start() -> AccessLogSender {
    let (tx, mut rx) = mpsc::channel::<AccessLog>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            info!(
                target: "veneer::access",
                method = %entry.method,
                path = %entry.path,
                status = entry.status,
                duration_ms = entry.duration_ms,
                remote = %entry.remote,
                "request"
            );
        }
    });

    AccessLogSender { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_does_not_block_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = AccessLogSender { tx };
        for _ in 0..10 {
            sender.record(AccessLog {
                method: "GET".to_string(),
                path: "/x".to_string(),
                status: 200,
                duration_ms: 1,
                remote: "127.0.0.1:9".to_string(),
            });
        }
    }
}
