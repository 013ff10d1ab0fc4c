use std::sync::Arc;
use tokio::sync::Mutex;

use crate::backend::SharedBackend;
use crate::conversations::ConversationStore;
use crate::models::{Message, OutgoingMessage};
use crate::thread::ThreadLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send, no open thread, or a send already in flight.
    Skipped,
    Sent(Message),
    /// Server or network refusal; the text is kept for a retry.
    Failed(String),
}

/// Input line state for rendering.
#[derive(Debug, Clone, Default)]
pub struct ComposerView {
    pub input: String,
    pub sending: bool,
    /// False disables the input: no open thread, nothing typed, or a send in flight.
    pub can_send: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct ComposerState {
    input: String,
    sending: bool,
    last_error: Option<String>,
}

/// Send pipeline. Nothing is shown until the server has acknowledged the
/// message; only one send may be in flight at a time.
#[derive(Clone)]
pub struct Composer {
    backend: SharedBackend,
    thread: ThreadLoader,
    conversations: ConversationStore,
    state: Arc<Mutex<ComposerState>>,
}

impl Composer {
    pub fn new(backend: SharedBackend, thread: ThreadLoader, conversations: ConversationStore) -> Self {
        Self {
            backend,
            thread,
            conversations,
            state: Arc::new(Mutex::new(ComposerState::default())),
        }
    }

    /// Replace the input text. Ignored while a send is in flight.
    pub async fn set_input(&self, text: impl Into<String>) {
        let mut state = self.state.lock().await;
        if !state.sending {
            state.input = text.into();
        }
    }

    pub async fn push_char(&self, c: char) {
        let mut state = self.state.lock().await;
        if !state.sending {
            state.input.push(c);
        }
    }

    pub async fn pop_char(&self) {
        let mut state = self.state.lock().await;
        if !state.sending {
            state.input.pop();
        }
    }

    pub async fn input(&self) -> String {
        self.state.lock().await.input.clone()
    }

    /// True when `send` would actually post something.
    pub async fn can_send(&self) -> bool {
        let has_text = {
            let state = self.state.lock().await;
            !state.sending && !state.input.trim().is_empty()
        };
        has_text && self.thread.peer().await.is_some()
    }

    pub async fn send(&self) -> SendOutcome {
        let peer = match self.thread.peer().await {
            Some(peer) => peer,
            None => return SendOutcome::Skipped,
        };

        let content = {
            let mut state = self.state.lock().await;
            if state.sending || state.input.trim().is_empty() {
                return SendOutcome::Skipped;
            }
            state.sending = true;
            state.last_error = None;
            state.input.clone()
        };

        let outgoing = OutgoingMessage {
            recipient: peer.id,
            content,
        };
        let result = self.backend.send_message(&outgoing).await;

        match result {
            Ok(message) => {
                crate::info_log!("composer: message {:?} sent to peer {}", message.id, peer.id);
                {
                    let mut state = self.state.lock().await;
                    state.sending = false;
                    state.input.clear();
                }
                self.thread.append_sent(message.clone()).await;
                self.conversations.refresh().await;
                SendOutcome::Sent(message)
            }
            Err(e) => {
                crate::warn_log!("composer: send to peer {} failed: {}", peer.id, e);
                let reason = e.user_message();
                let mut state = self.state.lock().await;
                state.sending = false;
                state.last_error = Some(reason.clone());
                SendOutcome::Failed(reason)
            }
        }
    }

    pub async fn view(&self) -> ComposerView {
        let can_send = self.can_send().await;
        let state = self.state.lock().await;
        ComposerView {
            input: state.input.clone(),
            sending: state.sending,
            can_send,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.last_error = None;
    }
}
