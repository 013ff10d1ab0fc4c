use std::time::Duration;

use crate::backend::SharedBackend;
use crate::badge::{UnreadBadge, BADGE_POLL_INTERVAL};
use crate::composer::{Composer, ComposerView};
use crate::conversations::{ConversationStore, ConversationView};
use crate::discovery::{PeerDiscovery, PickerView, Resolution};
use crate::entry::EntryResolver;
use crate::poller::{spawn_periodic, PollHandle};
use crate::thread::{ActiveThread, ThreadLoader};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub badge_interval: Duration,
    /// `None` disables background refreshes of the conversation list.
    pub conversation_interval: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            badge_interval: BADGE_POLL_INTERVAL,
            conversation_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Everything the view needs for one frame.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub conversations: ConversationView,
    pub thread: ActiveThread,
    pub composer: ComposerView,
    pub picker: PickerView,
    pub badge: Option<String>,
}

/// Owns the stores of one mounted messaging view.
pub struct MessagingSession {
    pub conversations: ConversationStore,
    pub thread: ThreadLoader,
    pub composer: Composer,
    pub discovery: PeerDiscovery,
    pub badge: UnreadBadge,
    options: SessionOptions,
    pollers: Vec<PollHandle>,
}

impl MessagingSession {
    pub fn create(backend: SharedBackend, options: SessionOptions) -> Self {
        let conversations = ConversationStore::new(backend.clone());
        let thread = ThreadLoader::new(backend.clone(), conversations.clone());
        let composer = Composer::new(backend.clone(), thread.clone(), conversations.clone());
        let discovery = PeerDiscovery::new(backend.clone(), conversations.clone(), thread.clone());
        let badge = UnreadBadge::new(backend);

        Self {
            conversations,
            thread,
            composer,
            discovery,
            badge,
            options,
            pollers: Vec::new(),
        }
    }

    /// Start the pollers, load the conversation list, then apply the entry request.
    ///
    /// The first refresh completes before the resolver runs so an existing
    /// conversation is found instead of a blank thread being opened.
    pub async fn activate(&mut self, entry: &mut EntryResolver) -> Option<Resolution> {
        let first_activation = self.pollers.is_empty();
        if first_activation {
            self.pollers
                .push(self.badge.spawn_poller(self.options.badge_interval));
        }

        self.conversations.refresh().await;

        if let (true, Some(period)) = (first_activation, self.options.conversation_interval) {
            let conversations = self.conversations.clone();
            // first tick would duplicate the refresh above
            let mut skip_first = true;
            self.pollers.push(spawn_periodic("conversations", period, move || {
                let conversations = conversations.clone();
                let skip = std::mem::replace(&mut skip_first, false);
                async move {
                    if !skip {
                        conversations.refresh().await;
                    }
                }
            }));
        }

        let resolution = entry.activate(&self.discovery).await;
        crate::info_log!("session: activated, entry resolution {:?}", resolution);
        resolution
    }

    pub async fn view(&self) -> SessionView {
        let (conversations, thread, composer, picker) = futures::join!(
            self.conversations.view(),
            self.thread.snapshot(),
            self.composer.view(),
            self.discovery.picker(),
        );
        SessionView {
            conversations,
            thread,
            composer,
            picker,
            badge: self.badge.label(),
        }
    }

    /// Stop polling and drop local state. In-flight requests finish against
    /// disposed stores and change nothing.
    pub async fn dispose(&mut self) {
        for poller in self.pollers.drain(..) {
            crate::debug_log!("session: stopping {}", poller.name());
            poller.stop().await;
        }
        self.thread.clear().await;
        self.conversations.dispose().await;
        crate::info_log!("session: disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NavigationState;
    use crate::models::PeerId;
    use crate::testing::{message, peer, summary, Call, FakeBackend, ME};

    fn options() -> SessionOptions {
        SessionOptions {
            badge_interval: Duration::from_secs(10),
            conversation_interval: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_finds_existing_conversation_from_link() {
        let backend = FakeBackend::new();
        let alice = peer(2, "alice");
        backend.add_user(alice.clone());
        backend.push_conversations(Ok(vec![summary(&alice, 3, "gg")]));
        backend.set_thread(alice.id, vec![message(10, alice.id, ME, "gg")]);
        let mut session = MessagingSession::create(backend.clone(), options());
        let mut entry = EntryResolver::new(
            NavigationState::default(),
            Some("https://squad.example/messages?user_id=2".to_string()),
        );

        let resolution = session.activate(&mut entry).await;

        assert_eq!(resolution, Some(Resolution::Existing(alice.clone())));
        assert_eq!(backend.count(|c| matches!(c, Call::Profile(_))), 0);
        let view = session.view().await;
        assert_eq!(view.thread.peer, Some(alice));
        assert_eq!(view.thread.messages.len(), 1);
        assert_eq!(view.conversations.summaries.len(), 1);

        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_badge_runs_independently_and_stops_on_dispose() {
        let backend = FakeBackend::new();
        backend.push_unread(Ok(12));
        let mut session = MessagingSession::create(backend.clone(), options());
        let mut entry = EntryResolver::default();

        assert_eq!(session.activate(&mut entry).await, None);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(session.view().await.badge.as_deref(), Some("9+"));

        tokio::time::sleep(Duration::from_secs(21)).await;
        let polls = backend.count(|c| *c == Call::UnreadCount);
        assert_eq!(polls, 3);

        session.dispose().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.count(|c| *c == Call::UnreadCount), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversation_poller_refreshes_after_interval() {
        let backend = FakeBackend::new();
        let alice = peer(2, "alice");
        backend.push_conversations(Ok(vec![]));
        backend.push_conversations(Ok(vec![summary(&alice, 1, "new message")]));
        let mut session = MessagingSession::create(
            backend.clone(),
            SessionOptions {
                badge_interval: Duration::from_secs(10),
                conversation_interval: Some(Duration::from_secs(30)),
            },
        );
        let mut entry = EntryResolver::default();
        session.activate(&mut entry).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(backend.count(|c| *c == Call::Conversations), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.count(|c| *c == Call::Conversations), 2);
        assert!(session.conversations.find_by_peer_id(alice.id).await.is_some());

        session.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_returns_while_list_poll_hangs() {
        let backend = FakeBackend::new();
        let mut session = MessagingSession::create(
            backend.clone(),
            SessionOptions {
                badge_interval: Duration::from_secs(10),
                conversation_interval: Some(Duration::from_secs(30)),
            },
        );
        let mut entry = EntryResolver::default();
        session.activate(&mut entry).await;

        // the next scheduled list refresh never gets an answer
        let _gate = backend.gate_conversations();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.count(|c| *c == Call::Conversations), 2);

        let disposed = tokio::time::timeout(Duration::from_secs(300), session.dispose()).await;
        assert!(disposed.is_ok());
        let view = session.view().await;
        assert!(view.conversations.summaries.is_empty());
        assert!(!view.conversations.refreshing);
    }

    #[tokio::test]
    async fn test_dispose_drops_late_thread_response() {
        let backend = FakeBackend::new();
        let alice = peer(2, "alice");
        backend.set_thread(alice.id, vec![message(10, alice.id, ME, "late")]);
        let gate = backend.gate_thread(alice.id);
        let mut session = MessagingSession::create(backend.clone(), options());

        let thread = session.thread.clone();
        let pending = tokio::spawn({
            let alice = alice.clone();
            async move { thread.select(alice).await }
        });
        while backend.count(|c| *c == Call::MessagesWith(PeerId(2))) == 0 {
            tokio::task::yield_now().await;
        }

        session.dispose().await;
        gate.notify_one();
        assert!(!pending.await.unwrap());

        let view = session.view().await;
        assert!(view.thread.peer.is_none());
        assert!(view.thread.messages.is_empty());
        assert!(view.conversations.summaries.is_empty());
    }
}
