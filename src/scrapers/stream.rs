//! Lazy lead streams backed by a producer task.
//!
//! The producer runs in its own task and pushes leads through a bounded
//! channel, so fetching stays at most one page ahead of the consumer. Dropping
//! or closing the stream stops the producer.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use super::ScrapeError;
use crate::models::RawLead;

/// One item from a lead stream.
pub type LeadResult = Result<RawLead, ScrapeError>;

/// Default channel capacity between producer and consumer.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Sending half handed to a producer.
#[derive(Clone)]
pub struct LeadSink {
    tx: mpsc::Sender<LeadResult>,
}

impl LeadSink {
    /// Send a lead. Returns false once the consumer has gone away.
    pub async fn send(&self, lead: RawLead) -> bool {
        self.tx.send(Ok(lead)).await.is_ok()
    }

    /// True once the consumer has dropped or closed the stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A finite, lazily produced sequence of raw leads.
pub struct LeadStream {
    receiver: mpsc::Receiver<LeadResult>,
    producer: Option<JoinHandle<()>>,
}

impl LeadStream {
    /// Run `produce` in a new task. An error it returns becomes the last item.
    pub fn spawn<F, Fut>(capacity: usize, produce: F) -> Self
    where
        F: FnOnce(LeadSink) -> Fut,
        Fut: Future<Output = Result<(), ScrapeError>> + Send + 'static,
    {
        let (tx, receiver) = mpsc::channel(capacity.max(1));
        let producing = produce(LeadSink { tx: tx.clone() });
        let producer = tokio::spawn(async move {
            if let Err(e) = producing.await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Self {
            receiver,
            producer: Some(producer),
        }
    }

    /// A stream over fixed items.
    pub fn from_results(items: Vec<LeadResult>) -> Self {
        Self::spawn(DEFAULT_STREAM_CAPACITY, |sink| async move {
            for item in items {
                let sent = match item {
                    Ok(lead) => sink.send(lead).await,
                    Err(e) => return Err(e),
                };
                if !sent {
                    break;
                }
            }
            Ok(())
        })
    }

    /// A stream that yields nothing.
    pub fn empty() -> Self {
        Self::from_results(Vec::new())
    }

    /// Next lead, or `None` once the producer is done.
    ///
    /// A producer panic is reported as a final error item.
    pub async fn next(&mut self) -> Option<LeadResult> {
        if let Some(item) = self.receiver.recv().await {
            return Some(item);
        }
        let producer = self.producer.take()?;
        match producer.await {
            Err(e) if e.is_panic() => {
                error!("Lead producer panicked");
                Some(Err(ScrapeError::ProducerPanicked))
            }
            _ => None,
        }
    }

    /// Stop the producer and discard anything buffered.
    pub fn close(&mut self) {
        self.receiver.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for LeadStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_producer_error_is_last_item() {
        let mut stream = LeadStream::spawn(4, |sink| async move {
            sink.send(RawLead::named("A")).await;
            Err(ScrapeError::Other("page 2 failed".into()))
        });

        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(stream.next().await, Some(Err(ScrapeError::Other(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_producer_reported() {
        let mut stream = LeadStream::spawn(4, |_sink| async move {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        assert!(matches!(
            stream.next().await,
            Some(Err(ScrapeError::ProducerPanicked))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let mut stream = LeadStream::spawn(1, move |sink| async move {
            loop {
                if !sink.send(RawLead::named("X")).await {
                    return Ok(());
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..3 {
            stream.next().await.unwrap().unwrap();
        }
        drop(stream);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let after_drop = produced.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(produced.load(Ordering::SeqCst), after_drop);
        // Bounded channel keeps the producer close behind the consumer.
        assert!(after_drop <= 5);
    }
}
