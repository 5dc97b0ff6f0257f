use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};

use crate::store::{NoteStore, StoreError};

/// How long a sent intent may wait for the panel's acknowledgement before
/// it is dropped. Covers a panel surface that is still initializing.
pub const DELIVERY_WINDOW: Duration = Duration::from_secs(3);

const CHANNEL_CAPACITY: usize = 8;

/// Background → panel intents, fired from the context-menu action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelIntent {
    /// Select this existing note.
    OpenNote { id: String },
    /// Start the note-creation flow for this page.
    CreateNote { url: String, title: Option<String> },
}

/// The intent had no acknowledging receiver within the delivery window.
/// Logged and dropped, never retried.
#[derive(Debug, thiserror::Error)]
#[error("panel intent not acknowledged within {DELIVERY_WINDOW:?}")]
pub struct DeliveryMiss;

type Envelope = (PanelIntent, oneshot::Sender<()>);

/// Sending half, owned by the background process. Intents are buffered in
/// the channel until the panel attaches, so a just-opened panel picks up
/// the pending intent on its own schedule — no fixed-delay guesswork.
#[derive(Clone)]
pub struct Messenger {
    tx: mpsc::Sender<Envelope>,
}

/// Receiving half, owned by the panel.
pub struct PanelReceiver {
    rx: mpsc::Receiver<Envelope>,
}

pub fn channel() -> (Messenger, PanelReceiver) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (Messenger { tx }, PanelReceiver { rx })
}

impl Messenger {
    /// Deliver one intent and wait for the panel to acknowledge it.
    /// Unacknowledged intents expire after [`DELIVERY_WINDOW`]; the panel
    /// discards expired envelopes if it attaches later.
    pub async fn send(&self, intent: PanelIntent) -> Result<(), DeliveryMiss> {
        let deadline = Instant::now() + DELIVERY_WINDOW;
        let (ack_tx, ack_rx) = oneshot::channel();

        let sent = timeout_at(deadline, self.tx.send((intent.clone(), ack_tx))).await;
        match sent {
            Ok(Ok(())) => {}
            // Channel closed or full past the window: nobody will ever ack.
            _ => {
                tracing::warn!(?intent, "panel intent dropped: channel unavailable");
                return Err(DeliveryMiss);
            }
        }

        match timeout_at(deadline, ack_rx).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                tracing::warn!(?intent, "panel intent dropped: no acknowledgement");
                Err(DeliveryMiss)
            }
        }
    }
}

impl PanelReceiver {
    /// Next live intent, acknowledged on receipt. Envelopes whose sender
    /// already gave up are discarded. None once the background side is gone.
    pub async fn recv(&mut self) -> Option<PanelIntent> {
        while let Some((intent, ack)) = self.rx.recv().await {
            if ack.send(()).is_ok() {
                return Some(intent);
            }
            tracing::debug!(?intent, "discarding expired panel intent");
        }
        None
    }
}

/// Decide what the context-menu action should do for a tab: open the most
/// recent note whose URL exactly matches, or create one for the page.
pub async fn page_intent(
    store: &NoteStore,
    url: &str,
    title: Option<&str>,
) -> Result<PanelIntent, StoreError> {
    let matches = store.get_by_url(url).await?;
    Ok(match matches.first() {
        Some(note) => PanelIntent::OpenNote {
            id: note.id.clone(),
        },
        None => PanelIntent::CreateNote {
            url: url.to_string(),
            title: title.map(str::to_string),
        },
    })
}
