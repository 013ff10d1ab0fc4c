use std::sync::Arc;
use tokio::sync::Mutex;

use crate::backend::SharedBackend;
use crate::conversations::ConversationStore;
use crate::models::{Message, Peer};

/// The one open conversation. With no peer there are no messages and
/// nothing can be sent.
#[derive(Debug, Clone, Default)]
pub struct ActiveThread {
    pub peer: Option<Peer>,
    pub messages: Vec<Message>,
    pub loading: bool,
}

#[derive(Default)]
struct ThreadState {
    thread: ActiveThread,
    /// Bumped on every selection; a fetch only lands if its generation is current.
    generation: u64,
}

#[derive(Clone)]
pub struct ThreadLoader {
    backend: SharedBackend,
    conversations: ConversationStore,
    state: Arc<Mutex<ThreadState>>,
}

impl ThreadLoader {
    pub fn new(backend: SharedBackend, conversations: ConversationStore) -> Self {
        Self {
            backend,
            conversations,
            state: Arc::new(Mutex::new(ThreadState::default())),
        }
    }

    /// Open `peer`: show it right away, load its log, then refresh the
    /// conversation list so the unread count catches up with the server.
    pub async fn select(&self, peer: Peer) -> bool {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.thread = ActiveThread {
                peer: Some(peer.clone()),
                messages: Vec::new(),
                loading: true,
            };
            state.generation
        };
        crate::debug_log!("thread: selected peer {} (generation {})", peer.id, generation);

        let applied = self.fetch_into(&peer, generation).await;
        self.conversations.refresh().await;
        applied
    }

    /// Re-fetch the log of the currently open peer.
    pub async fn reload(&self) -> bool {
        let (peer, generation) = {
            let mut state = self.state.lock().await;
            let peer = match state.thread.peer.clone() {
                Some(peer) => peer,
                None => return false,
            };
            state.generation += 1;
            state.thread.loading = true;
            (peer, state.generation)
        };
        self.fetch_into(&peer, generation).await
    }

    async fn fetch_into(&self, peer: &Peer, generation: u64) -> bool {
        let result = self.backend.messages_with(peer.id).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            crate::debug_log!(
                "thread: discarding stale log for peer {} (generation {} != {})",
                peer.id,
                generation,
                state.generation
            );
            return false;
        }
        state.thread.loading = false;
        match result {
            Ok(messages) => {
                crate::debug_log!("thread: loaded {} messages for peer {}", messages.len(), peer.id);
                state.thread.messages = messages;
                true
            }
            Err(e) => {
                crate::warn_log!("thread: failed to load messages for peer {}: {}", peer.id, e);
                false
            }
        }
    }

    /// Append a server-acknowledged message if it belongs to the open thread
    /// and is not already there.
    pub async fn append_sent(&self, message: Message) -> bool {
        let mut state = self.state.lock().await;
        let is_open = state
            .thread
            .peer
            .as_ref()
            .is_some_and(|p| p.id == message.recipient_id);
        if !is_open {
            crate::debug_log!(
                "thread: sent message {:?} is for peer {}, not the open thread",
                message.id,
                message.recipient_id
            );
            return false;
        }
        if state.thread.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        state.thread.messages.push(message);
        true
    }

    pub async fn peer(&self) -> Option<Peer> {
        self.state.lock().await.thread.peer.clone()
    }

    pub async fn snapshot(&self) -> ActiveThread {
        self.state.lock().await.thread.clone()
    }

    /// Close the thread. In-flight fetches land on a stale generation and are dropped.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.thread = ActiveThread::default();
    }
}
