use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::backend::SharedBackend;
use crate::poller::{spawn_periodic, PollHandle};

pub const BADGE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Counts above this render as "9+".
const BADGE_MAX_EXACT: u64 = 9;

/// Global unread indicator. Only ever replaced by a poll result; never
/// decremented locally when a thread is read.
#[derive(Clone)]
pub struct UnreadBadge {
    backend: SharedBackend,
    count: Arc<watch::Sender<Option<u64>>>,
}

impl UnreadBadge {
    pub fn new(backend: SharedBackend) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            count: Arc::new(tx),
        }
    }

    /// Fetch the count once. On failure the previous value stays displayed.
    pub async fn poll_once(&self) -> bool {
        match self.backend.unread_count().await {
            Ok(count) => {
                let previous = self.count.send_replace(Some(count));
                if previous != Some(count) {
                    crate::debug_log!("badge: unread count {:?} -> {}", previous, count);
                }
                true
            }
            Err(e) => {
                crate::warn_log!("badge: unread count poll failed: {}", e);
                false
            }
        }
    }

    /// Last successfully fetched count, `None` before the first success.
    pub fn count(&self) -> Option<u64> {
        *self.count.borrow()
    }

    /// Text for the badge, or `None` when there is nothing unread.
    pub fn label(&self) -> Option<String> {
        self.count().filter(|c| *c > 0).map(badge_label)
    }

    pub fn spawn_poller(&self, period: Duration) -> PollHandle {
        let badge = self.clone();
        spawn_periodic("unread-badge", period, move || {
            let badge = badge.clone();
            async move {
                badge.poll_once().await;
            }
        })
    }
}

pub fn badge_label(count: u64) -> String {
    if count > BADGE_MAX_EXACT {
        format!("{}+", BADGE_MAX_EXACT)
    } else {
        count.to_string()
    }
}
