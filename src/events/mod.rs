use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services, consumed by a background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated { order_id: Uuid },
    OrderFinalized { order_id: Uuid },
    OrderPaid { order_id: Uuid, print_job_id: Uuid },
    OrderCancelled { order_id: Uuid },
    PrintJobQueued { print_job_id: Uuid },
    PrintJobCompleted { print_job_id: Uuid },
    PrintJobFailed { print_job_id: Uuid, retry_count: i32 },
}

/// Cloneable handle for emitting events into the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Creates the event channel with a bounded buffer.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPaid {
                order_id,
                print_job_id,
            } => {
                info!(order_id = %order_id, print_job_id = %print_job_id, "event: order paid");
            }
            Event::PrintJobFailed {
                print_job_id,
                retry_count,
            } => {
                warn!(print_job_id = %print_job_id, retry_count, "event: print job failed");
            }
            other => info!(event = ?other, "event"),
        }
    }
    info!("Event channel closed; processor exiting");
}
