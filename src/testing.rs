//! Scripted in-memory backend for unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::backend::MessagingBackend;
use crate::error::{MessagingError, Result};
use crate::models::{ConversationSummary, Message, MessageId, OutgoingMessage, Peer, PeerId};

pub const ME: PeerId = PeerId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    UnreadCount,
    Conversations,
    MessagesWith(PeerId),
    Send(PeerId, String),
    Search(String),
    Profile(PeerId),
}

#[derive(Default)]
struct FakeState {
    unread: VecDeque<Result<u64>>,
    conversations: VecDeque<Result<Vec<ConversationSummary>>>,
    last_conversations: Vec<ConversationSummary>,
    threads: HashMap<PeerId, Vec<Message>>,
    thread_failures: HashMap<PeerId, u16>,
    send_failure: Option<(u16, String)>,
    users: Vec<Peer>,
    calls: Vec<Call>,
}

/// Which kind of call a gate holds open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Gate {
    Thread(PeerId),
    Conversations,
    Send,
}

pub struct FakeBackend {
    state: Mutex<FakeState>,
    gates: Mutex<HashMap<Gate, Arc<Notify>>>,
    next_id: AtomicI64,
}

pub fn peer(id: i64, name: &str) -> Peer {
    Peer {
        id: PeerId(id),
        display_name: name.to_string(),
        avatar: None,
    }
}

pub fn message(id: i64, from: PeerId, to: PeerId, content: &str) -> Message {
    Message {
        id: MessageId(id),
        sender_id: from,
        recipient_id: to,
        content: content.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(id),
        read_at: None,
    }
}

pub fn summary(peer: &Peer, unread: u32, preview: &str) -> ConversationSummary {
    ConversationSummary {
        peer: peer.clone(),
        last_activity_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        unread_count: unread,
        preview_text: preview.to_string(),
    }
}

pub fn server_error(status: u16) -> MessagingError {
    MessagingError::rejected(status, br#"{"error": "scripted failure"}"#)
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            gates: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1000),
        })
    }

    /// Queue the answer for the next unread-count poll.
    pub fn push_unread(&self, result: Result<u64>) {
        self.state.lock().unwrap().unread.push_back(result);
    }

    /// Queue the answer for the next conversation fetch. Once the queue is empty
    /// the last successful list is repeated.
    pub fn push_conversations(&self, result: Result<Vec<ConversationSummary>>) {
        self.state.lock().unwrap().conversations.push_back(result);
    }

    pub fn set_thread(&self, peer: PeerId, messages: Vec<Message>) {
        self.state.lock().unwrap().threads.insert(peer, messages);
    }

    pub fn fail_thread(&self, peer: PeerId, status: u16) {
        self.state.lock().unwrap().thread_failures.insert(peer, status);
    }

    pub fn fail_sends(&self, status: u16, body: &str) {
        self.state.lock().unwrap().send_failure = Some((status, body.to_string()));
    }

    pub fn add_user(&self, peer: Peer) {
        self.state.lock().unwrap().users.push(peer);
    }

    /// Hold thread fetches for `peer` until the returned gate is notified.
    pub fn gate_thread(&self, peer: PeerId) -> Arc<Notify> {
        self.install_gate(Gate::Thread(peer))
    }

    /// Hold conversation fetches; each `notify_one` releases one of them.
    pub fn gate_conversations(&self) -> Arc<Notify> {
        self.install_gate(Gate::Conversations)
    }

    /// Hold sends until the returned gate is notified.
    pub fn gate_sends(&self) -> Arc<Notify> {
        self.install_gate(Gate::Send)
    }

    fn install_gate(&self, key: Gate) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(key, gate.clone());
        gate
    }

    async fn pass_gate(&self, key: Gate) {
        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl MessagingBackend for FakeBackend {
    async fn unread_count(&self) -> Result<u64> {
        self.record(Call::UnreadCount);
        self.state
            .lock()
            .unwrap()
            .unread
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.record(Call::Conversations);
        self.pass_gate(Gate::Conversations).await;
        let mut state = self.state.lock().unwrap();
        match state.conversations.pop_front() {
            Some(Ok(list)) => {
                state.last_conversations = list.clone();
                Ok(list)
            }
            Some(Err(e)) => Err(e),
            None => Ok(state.last_conversations.clone()),
        }
    }

    async fn messages_with(&self, peer: PeerId) -> Result<Vec<Message>> {
        self.record(Call::MessagesWith(peer));
        self.pass_gate(Gate::Thread(peer)).await;
        let state = self.state.lock().unwrap();
        if let Some(status) = state.thread_failures.get(&peer) {
            return Err(server_error(*status));
        }
        Ok(state.threads.get(&peer).cloned().unwrap_or_default())
    }

    async fn send_message(&self, outgoing: &OutgoingMessage) -> Result<Message> {
        self.record(Call::Send(outgoing.recipient, outgoing.content.clone()));
        self.pass_gate(Gate::Send).await;
        let mut state = self.state.lock().unwrap();
        if let Some((status, ref body)) = state.send_failure {
            return Err(MessagingError::rejected(status, body.as_bytes()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sent = message(id, ME, outgoing.recipient, &outgoing.content);
        state
            .threads
            .entry(outgoing.recipient)
            .or_default()
            .push(sent.clone());
        Ok(sent)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Peer>> {
        self.record(Call::Search(query.to_string()));
        let needle = query.to_lowercase();
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .filter(|p| p.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn profile(&self, peer: PeerId) -> Result<Peer> {
        self.record(Call::Profile(peer));
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|p| p.id == peer)
            .cloned()
            .ok_or_else(|| server_error(404))
    }
}
