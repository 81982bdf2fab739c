//! Control signals delivered to a live playback driver.
//!
//! A signal is a rendezvous: the sender only succeeds once the driver has
//! taken the signal out of the mailbox and acknowledged it. The mailbox has a
//! single slot, so a sender blocks while the driver is busy and every send is
//! raced against a timeout.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{MusicError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Toggles between paused and playing
    Pause,
    /// Ends the current track early
    Skip,
}

/// A signal together with the acknowledgement channel of its sender.
#[derive(Debug)]
pub struct SignalEnvelope {
    signal: ControlSignal,
    ack: oneshot::Sender<()>,
}

impl SignalEnvelope {
    pub fn signal(&self) -> ControlSignal {
        self.signal
    }

    /// Confirms receipt to the sender.
    ///
    /// Returns `false` when the sender already gave up (timed out); such a
    /// signal must not be applied.
    pub fn acknowledge(self) -> bool {
        self.ack.send(()).is_ok()
    }
}

/// Single-consumer mailbox owned by a session.
#[derive(Debug)]
pub struct SignalMailbox {
    sender: mpsc::Sender<SignalEnvelope>,
    receiver: Mutex<mpsc::Receiver<SignalEnvelope>>,
}

pub type SignalReceiver<'a> = MutexGuard<'a, mpsc::Receiver<SignalEnvelope>>;

impl SignalMailbox {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(1);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Exclusive access to the receiving end. Held by the driver for its
    /// whole lifetime, so at most one driver consumes signals.
    pub async fn receiver(&self) -> SignalReceiver<'_> {
        self.receiver.lock().await
    }

    /// Delivers `signal` and waits for the driver to acknowledge it.
    ///
    /// Fails with [`MusicError::SignalTimeout`] if that does not happen within
    /// `timeout`.
    pub async fn send_with_timeout(&self, signal: ControlSignal, timeout: Duration) -> Result<()> {
        let (ack, acked) = oneshot::channel();
        let envelope = SignalEnvelope { signal, ack };

        let delivery = async {
            self.sender
                .send(envelope)
                .await
                .map_err(|_| MusicError::SignalTimeout)?;
            acked.await.map_err(|_| MusicError::SignalTimeout)
        };

        match tokio::time::timeout(timeout, delivery).await {
            Ok(Ok(())) => {
                debug!("📨 {:?} signal acknowledged", signal);
                Ok(())
            }
            Ok(Err(err)) => {
                warn!("📭 {:?} signal dropped by the driver", signal);
                Err(err)
            }
            Err(_) => {
                warn!("⏰ {:?} signal timed out after {:?}", signal, timeout);
                Err(MusicError::SignalTimeout)
            }
        }
    }
}

impl Default for SignalMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn send_succeeds_once_acknowledged() {
        let mailbox = Arc::new(SignalMailbox::new());

        let consumer = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move {
                let mut receiver = mailbox.receiver().await;
                let envelope = receiver.recv().await.expect("mailbox open");
                let signal = envelope.signal();
                assert!(envelope.acknowledge());
                signal
            })
        };

        mailbox
            .send_with_timeout(ControlSignal::Skip, TIMEOUT)
            .await
            .expect("delivered");
        assert_eq!(consumer.await.unwrap(), ControlSignal::Skip);
    }

    #[tokio::test(start_paused = true)]
    async fn send_without_listener_times_out() {
        let mailbox = SignalMailbox::new();
        let started = tokio::time::Instant::now();

        let result = mailbox.send_with_timeout(ControlSignal::Pause, TIMEOUT).await;

        assert!(matches!(result, Err(MusicError::SignalTimeout)));
        assert!(started.elapsed() >= TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn late_receipt_of_timed_out_signal_is_not_acknowledged() {
        let mailbox = SignalMailbox::new();
        let result = mailbox.send_with_timeout(ControlSignal::Pause, TIMEOUT).await;
        assert!(matches!(result, Err(MusicError::SignalTimeout)));

        // The envelope still sits in the single slot, but its sender is gone.
        let mut receiver = mailbox.receiver().await;
        let stale = receiver.try_recv().expect("stale envelope buffered");
        assert!(!stale.acknowledge());
    }
}
