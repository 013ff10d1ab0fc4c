use reqwest::Url;

use crate::discovery::{PeerDiscovery, Resolution};
use crate::models::PeerId;

/// Where the initial selection came from, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRequest {
    Navigation(PeerId),
    QueryParam(PeerId),
    Nothing,
}

impl EntryRequest {
    pub fn peer_id(&self) -> Option<PeerId> {
        match *self {
            EntryRequest::Navigation(id) | EntryRequest::QueryParam(id) => Some(id),
            EntryRequest::Nothing => None,
        }
    }
}

/// One-shot payload handed over by whatever opened the view
/// (a notification click, a profile "Message" button).
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    target: Option<PeerId>,
}

impl NavigationState {
    pub fn with_target(peer: PeerId) -> Self {
        Self { target: Some(peer) }
    }

    /// Read and clear the payload so it fires once.
    pub fn take(&mut self) -> Option<PeerId> {
        self.target.take()
    }
}

/// Extract a positive `user_id` query parameter from a link.
pub fn peer_id_from_url(link: &str) -> Option<PeerId> {
    let url = Url::parse(link).ok()?;
    let (_, value) = url.query_pairs().find(|(key, _)| key == "user_id")?;
    let id: PeerId = value.parse().ok()?;
    (id.0 > 0).then_some(id)
}

/// Decides which conversation, if any, is opened when the view activates.
#[derive(Debug, Clone, Default)]
pub struct EntryResolver {
    navigation: NavigationState,
    location: Option<String>,
}

impl EntryResolver {
    pub fn new(navigation: NavigationState, location: Option<String>) -> Self {
        Self {
            navigation,
            location,
        }
    }

    /// Navigation payload wins and is consumed; the URL is consulted on every activation.
    pub fn next_request(&mut self) -> EntryRequest {
        if let Some(id) = self.navigation.take() {
            return EntryRequest::Navigation(id);
        }
        match self.location.as_deref().and_then(peer_id_from_url) {
            Some(id) => EntryRequest::QueryParam(id),
            None => EntryRequest::Nothing,
        }
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    /// Route the request through peer resolution.
    pub async fn activate(&mut self, discovery: &PeerDiscovery) -> Option<Resolution> {
        let request = self.next_request();
        crate::debug_log!("entry: activation request {:?}", request);
        let peer_id = request.peer_id()?;
        Some(discovery.resolve(peer_id).await)
    }
}
