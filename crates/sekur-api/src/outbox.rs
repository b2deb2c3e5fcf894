//! # Notification Outbox
//!
//! Post-commit event delivery decoupled from the request path. The
//! engine hands each committed event to [`OutboxEmitter`], which does a
//! non-blocking push onto a bounded channel; a background drain task
//! fans the event out as one notification per party. A full channel
//! drops the event with a warning — notifications are best-effort and
//! must never slow down or fail settlement.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sekur_engine::{EscrowEvent, NotificationEmitter, NotifyError};

/// Default outbox depth before events are dropped.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Engine-facing side of the outbox.
pub struct OutboxEmitter {
    tx: mpsc::Sender<EscrowEvent>,
}

impl NotificationEmitter for OutboxEmitter {
    fn emit(&self, event: &EscrowEvent) -> Result<(), NotifyError> {
        self.tx
            .try_send(event.clone())
            .map_err(|err| NotifyError(format!("outbox full or closed: {err}")))
    }
}

/// Create the outbox channel and spawn its drain task. Must be called
/// within a Tokio runtime.
pub fn spawn(capacity: usize) -> (OutboxEmitter, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(drain(rx));
    (OutboxEmitter { tx }, handle)
}

/// Drain loop: one notification per party per event. The structured
/// log is the delivery transport; a push gateway can tail it.
async fn drain(mut rx: mpsc::Receiver<EscrowEvent>) {
    while let Some(event) = rx.recv().await {
        for recipient in [&event.payer_id, &event.receiver_id] {
            tracing::info!(
                event = event.kind.as_str(),
                recipient = recipient.as_str(),
                escrow_id = %event.escrow_id,
                status = event.status.as_str(),
                amount = event.amount,
                currency = event.currency.as_str(),
                "notification"
            );
        }
    }
    tracing::debug!("notification outbox drained and closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sekur_core::{CurrencyCode, EscrowId, PartyId};
    use sekur_engine::{EscrowStatus, EventKind};

    fn event() -> EscrowEvent {
        EscrowEvent {
            kind: EventKind::EscrowReleased,
            escrow_id: EscrowId::new(),
            payer_id: PartyId::new("payer").unwrap(),
            receiver_id: PartyId::new("receiver").unwrap(),
            status: EscrowStatus::Released,
            amount: 9_750,
            currency: CurrencyCode::new("GNF").unwrap(),
        }
    }

    #[tokio::test]
    async fn emit_delivers_through_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let emitter = OutboxEmitter { tx };
        emitter.emit(&event()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::EscrowReleased);
    }

    #[tokio::test]
    async fn full_outbox_rejects_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let emitter = OutboxEmitter { tx };
        emitter.emit(&event()).unwrap();
        let err = emitter.emit(&event()).unwrap_err();
        assert!(err.to_string().contains("outbox"));
    }

    #[tokio::test]
    async fn spawned_drain_consumes_events() {
        let (emitter, handle) = spawn(8);
        emitter.emit(&event()).unwrap();
        drop(emitter);
        // Drain task ends once the sender side is gone.
        handle.await.unwrap();
    }
}
