use std::sync::Arc;
use tokio::sync::Mutex;

use crate::backend::SharedBackend;
use crate::models::{ConversationSummary, PeerId};

#[derive(Default)]
struct ConversationState {
    summaries: Vec<ConversationSummary>,
    loaded: bool,
    /// Refreshes overlap (poller, after select, after send), so count them.
    in_flight: usize,
    disposed: bool,
}

/// Read-only copy of the list for rendering.
#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    pub summaries: Vec<ConversationSummary>,
    pub loaded: bool,
    pub refreshing: bool,
}

/// Owns the list of per-peer summaries. The list is replaced wholesale on
/// each successful fetch and kept in server order.
#[derive(Clone)]
pub struct ConversationStore {
    backend: SharedBackend,
    state: Arc<Mutex<ConversationState>>,
}

impl ConversationStore {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(ConversationState::default())),
        }
    }

    /// Fetch the list and replace the local copy. Returns whether a new list was applied.
    pub async fn refresh(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.disposed {
                return false;
            }
            state.in_flight += 1;
        }

        let result = self.backend.conversations().await;

        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.disposed {
            crate::debug_log!("conversations: store disposed, dropping response");
            return false;
        }
        match result {
            Ok(summaries) => {
                crate::debug_log!("conversations: refreshed, {} summaries", summaries.len());
                state.summaries = summaries;
                state.loaded = true;
                true
            }
            Err(e) => {
                crate::warn_log!(
                    "conversations: refresh failed, keeping {} cached summaries: {}",
                    state.summaries.len(),
                    e
                );
                false
            }
        }
    }

    pub async fn find_by_peer_id(&self, id: PeerId) -> Option<ConversationSummary> {
        self.state
            .lock()
            .await
            .summaries
            .iter()
            .find(|s| s.peer.id == id)
            .cloned()
    }

    pub async fn view(&self) -> ConversationView {
        let state = self.state.lock().await;
        ConversationView {
            summaries: state.summaries.clone(),
            loaded: state.loaded,
            refreshing: state.in_flight > 0,
        }
    }

    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.disposed = true;
        // abandoned poller refreshes never decrement
        state.in_flight = 0;
        state.summaries.clear();
    }
}
