//! Refresh events between screens.
//!
//! Screens that change remote data publish a [`RefreshEvent`]; the home
//! screen subscribes while it is mounted and refreshes its feed once on focus,
//! however many events arrived in between. Pull-to-refresh waits out the same
//! debounce, and only the last of several quick pulls fetches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::feed::{FeedController, FetchOutcome};
use crate::logging::LogConfig;
use crate::log_refresh;
use revue_types::FeedCategory;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    PostCreated { post_id: Uuid },
    CommentAdded { post_id: Uuid },
}

/// Broadcast channel for [`RefreshEvent`]s; cheap to clone
#[derive(Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshEvent>,
    log_config: Arc<LogConfig>,
}

impl RefreshBus {
    pub fn new() -> Self {
        Self::with_log_config(LogConfig::disabled())
    }

    pub fn with_log_config(log_config: LogConfig) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            log_config: Arc::new(log_config),
        }
    }

    /// Publish an event, returning how many subscribers will see it.
    /// Publishing with nobody subscribed is not an error.
    pub fn publish(&self, event: RefreshEvent) -> usize {
        log_refresh!(self.log_config, "publish {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> RefreshSubscription {
        RefreshSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RefreshSubscription {
    receiver: broadcast::Receiver<RefreshEvent>,
}

impl RefreshSubscription {
    /// Take every event received so far without waiting.
    /// Returns the number taken; an overflowed channel counts as pending.
    pub fn drain(&mut self) -> usize {
        let mut pending = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(_) => pending += 1,
                Err(TryRecvError::Lagged(skipped)) => pending += skipped as usize,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return pending,
            }
        }
    }
}

/// Home screen lifecycle around the `for_you` feed
pub struct HomeScreen {
    feed: FeedController,
    bus: RefreshBus,
    subscription: Option<RefreshSubscription>,
    debounce: Duration,
    /// Number of the latest pull-to-refresh gesture
    pulls: AtomicU64,
}

impl HomeScreen {
    pub fn new(feed: FeedController, bus: RefreshBus) -> Self {
        Self {
            feed,
            bus,
            subscription: None,
            debounce: DEFAULT_DEBOUNCE,
            pulls: AtomicU64::new(0),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn feed(&self) -> &FeedController {
        &self.feed
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to refresh events and load the first page
    pub async fn mount(&mut self) -> FetchOutcome {
        self.subscription = Some(self.bus.subscribe());
        self.feed.set_mounted(true).await;
        self.feed.refresh(FeedCategory::ForYou).await
    }

    /// Drop the subscription; fetches still in flight are discarded on arrival
    pub async fn unmount(&mut self) {
        self.subscription = None;
        self.feed.set_mounted(false).await;
    }

    /// Refresh once if any event arrived since the last focus.
    /// Returns whether a refresh ran.
    pub async fn on_focus(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };

        let mut pending = subscription.drain();
        if pending == 0 {
            return false;
        }

        tokio::time::sleep(self.debounce).await;
        // Events published during the debounce are folded into this refresh
        pending += subscription.drain();
        log_refresh!(self.bus.log_config, "focus: {} pending events, refreshing for_you", pending);

        self.feed.refresh(FeedCategory::ForYou).await;
        true
    }

    /// Refresh `for_you` once the debounce passes without another pull.
    /// Returns whether this pull ran the refresh.
    pub async fn pull_to_refresh(&self) -> bool {
        if !self.is_mounted() {
            return false;
        }

        let pull = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if self.pulls.load(Ordering::SeqCst) != pull {
            log_refresh!(self.bus.log_config, "pull {} folded into a later pull", pull);
            return false;
        }

        log_refresh!(self.bus.log_config, "pull {}: refreshing for_you", pull);
        self.feed.refresh(FeedCategory::ForYou).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResult;
    use crate::service::ReviewService;
    use async_trait::async_trait;
    use revue_types::{Comment, CreateCommentParams, CreatePostParams, FeedParams, FeedPost, LikeState};
    use std::sync::atomic::AtomicUsize;

    /// Counts feed fetches and returns nothing
    #[derive(Default)]
    struct CountingService {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ReviewService for CountingService {
        async fn fetch_feed(&self, _category: FeedCategory, _page: FeedParams) -> ApiResult<Vec<FeedPost>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn create_post(&self, _params: CreatePostParams) -> ApiResult<Uuid> {
            unimplemented!("not used by refresh tests")
        }

        async fn toggle_post_like(&self, _post_id: Uuid) -> ApiResult<LikeState> {
            unimplemented!("not used by refresh tests")
        }

        async fn create_comment(&self, _params: CreateCommentParams) -> ApiResult<Comment> {
            unimplemented!("not used by refresh tests")
        }

        async fn get_post_comments(&self, _post_id: Uuid, _page: FeedParams) -> ApiResult<Vec<Comment>> {
            unimplemented!("not used by refresh tests")
        }
    }

    fn home(service: Arc<CountingService>) -> HomeScreen {
        HomeScreen::new(FeedController::new(service), RefreshBus::new()).with_debounce(Duration::from_millis(20))
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = RefreshBus::new();
        assert_eq!(bus.publish(RefreshEvent::CommentAdded { post_id: Uuid::new_v4() }), 0);
    }

    #[test]
    fn test_drain_counts_pending_events() {
        let bus = RefreshBus::new();
        let mut subscription = bus.subscribe();
        assert_eq!(subscription.drain(), 0);

        bus.publish(RefreshEvent::PostCreated { post_id: Uuid::new_v4() });
        bus.publish(RefreshEvent::CommentAdded { post_id: Uuid::new_v4() });
        assert_eq!(subscription.drain(), 2);
        assert_eq!(subscription.drain(), 0);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = RefreshBus::new();
        let subscription = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_overflow_still_counts_as_pending() {
        let bus = RefreshBus::new();
        let mut subscription = bus.subscribe();
        for _ in 0..(CHANNEL_CAPACITY + 10) {
            bus.publish(RefreshEvent::PostCreated { post_id: Uuid::new_v4() });
        }
        assert!(subscription.drain() > 0);
    }

    #[tokio::test]
    async fn test_quick_pulls_fetch_once() {
        let service = Arc::new(CountingService::default());
        let mut home = home(service.clone());
        home.mount().await;
        assert_eq!(service.fetches.load(Ordering::SeqCst), 1);

        let (first, second) = tokio::join!(home.pull_to_refresh(), home.pull_to_refresh());
        assert!(!first);
        assert!(second);
        assert_eq!(service.fetches.load(Ordering::SeqCst), 2);

        // A pull after the window has passed fetches again
        assert!(home.pull_to_refresh().await);
        assert_eq!(service.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pull_on_unmounted_home_does_nothing() {
        let service = Arc::new(CountingService::default());
        let home = home(service.clone());

        assert!(!home.pull_to_refresh().await);
        assert_eq!(service.fetches.load(Ordering::SeqCst), 0);
    }
}
