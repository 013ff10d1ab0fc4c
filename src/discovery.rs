use std::sync::Arc;
use tokio::sync::Mutex;

use crate::backend::SharedBackend;
use crate::conversations::ConversationStore;
use crate::models::{Peer, PeerId};
use crate::thread::ThreadLoader;

/// How a peer id was turned into an open thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A conversation already existed; its history was opened.
    Existing(Peer),
    /// No conversation yet; the profile was fetched and an empty thread opened.
    Started(Peer),
    /// The profile lookup failed. Nothing was opened.
    Unresolved(PeerId),
}

/// Search picker state for rendering.
#[derive(Debug, Clone, Default)]
pub struct PickerView {
    pub open: bool,
    pub query: String,
    pub results: Vec<Peer>,
}

#[derive(Default)]
struct SearchState {
    open: bool,
    query: String,
    results: Vec<Peer>,
}

#[derive(Clone)]
pub struct PeerDiscovery {
    backend: SharedBackend,
    conversations: ConversationStore,
    thread: ThreadLoader,
    search: Arc<Mutex<SearchState>>,
}

impl PeerDiscovery {
    pub fn new(backend: SharedBackend, conversations: ConversationStore, thread: ThreadLoader) -> Self {
        Self {
            backend,
            conversations,
            thread,
            search: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    /// Open the conversation with `peer_id`, starting a new empty one if none exists.
    pub async fn resolve(&self, peer_id: PeerId) -> Resolution {
        if let Some(summary) = self.conversations.find_by_peer_id(peer_id).await {
            crate::debug_log!("discovery: peer {} has a conversation, opening it", peer_id);
            self.thread.select(summary.peer.clone()).await;
            return Resolution::Existing(summary.peer);
        }

        match self.backend.profile(peer_id).await {
            Ok(peer) => {
                crate::debug_log!("discovery: starting new conversation with peer {}", peer_id);
                self.thread.select(peer.clone()).await;
                Resolution::Started(peer)
            }
            Err(e) => {
                // Indistinguishable from "still loading" for the view.
                crate::warn_log!("discovery: profile lookup for peer {} failed: {}", peer_id, e);
                Resolution::Unresolved(peer_id)
            }
        }
    }

    /// Query the user directory. A blank query clears the results without a fetch.
    pub async fn search(&self, query: &str) -> Vec<Peer> {
        {
            let mut state = self.search.lock().await;
            state.open = true;
            state.query = query.to_string();
            if query.trim().is_empty() {
                state.results.clear();
                return Vec::new();
            }
        }

        match self.backend.search_users(query.trim()).await {
            Ok(results) => {
                let mut state = self.search.lock().await;
                if state.query != query {
                    crate::debug_log!("discovery: dropping results for superseded query {:?}", query);
                    return state.results.clone();
                }
                crate::debug_log!("discovery: {} results for {:?}", results.len(), query);
                state.results = results.clone();
                results
            }
            Err(e) => {
                crate::warn_log!("discovery: user search for {:?} failed: {}", query, e);
                self.search.lock().await.results.clone()
            }
        }
    }

    /// Open the search result at `index` and close the picker.
    pub async fn pick(&self, index: usize) -> Option<Peer> {
        let peer = {
            let mut state = self.search.lock().await;
            let peer = state.results.get(index).cloned()?;
            state.open = false;
            state.query.clear();
            state.results.clear();
            peer
        };
        self.thread.select(peer.clone()).await;
        Some(peer)
    }

    pub async fn close_picker(&self) {
        let mut state = self.search.lock().await;
        state.open = false;
        state.query.clear();
        state.results.clear();
    }

    pub async fn picker(&self) -> PickerView {
        let state = self.search.lock().await;
        PickerView {
            open: state.open,
            query: state.query.clone(),
            results: state.results.clone(),
        }
    }
}
