//! Feed assembly: per-tab state for the home screen.
//!
//! Each [`FeedCategory`] keeps its own [`FeedState`]. A refresh takes a
//! generation ticket before it goes to the network; when the response
//! arrives it is applied only if no newer refresh started in the meantime
//! and the screen is still mounted. Superseded requests are not cancelled,
//! their results are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, ApiResult};
use crate::log_feed;
use crate::logging::LogConfig;
use crate::refresh::{RefreshBus, RefreshEvent};
use crate::service::ReviewService;
use revue_types::{
    Comment, CreateCommentParams, FeedCategory, FeedParams, FeedPost, LikeState, MediaType, Visibility,
    DEFAULT_PAGE_SIZE,
};

/// Shown when neither the live profile nor the cached fields have a name
pub const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSummary {
    pub id: String,
    pub title: Option<String>,
    pub media_type: Option<MediaType>,
    pub cover_url: Option<String>,
}

/// A post as the feed displays it
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub avatar_url: Option<String>,
    pub content: String,
    pub rating: Option<i32>,
    pub contains_spoilers: bool,
    pub visibility: Visibility,
    /// `None` for posts that do not review a media item
    pub media: Option<MediaSummary>,
    pub like_count: i32,
    pub comment_count: i32,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<FeedPost> for FeedItem {
    fn from(feed_post: FeedPost) -> Self {
        let FeedPost {
            post,
            username,
            display_name,
            avatar_url,
            media_title,
            media_type,
            media_cover_url,
            liked_by_me,
        } = feed_post;

        let author = non_blank(display_name)
            .or_else(|| non_blank(post.author_display_name.clone()))
            .or_else(|| non_blank(username))
            .or_else(|| non_blank(post.author_username.clone()))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let media = post.media_item_id.map(|id| MediaSummary {
            id,
            title: media_title,
            media_type,
            cover_url: media_cover_url,
        });

        Self {
            post_id: post.id,
            author_id: post.user_id,
            author,
            avatar_url: avatar_url.or(post.author_avatar_url),
            content: post.content,
            rating: post.rating,
            contains_spoilers: post.contains_spoilers,
            visibility: post.visibility,
            media,
            like_count: post.like_count,
            comment_count: post.comment_count,
            liked_by_me,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedStatus {
    /// Nothing fetched yet
    Idle,
    Loaded,
    /// The fetch succeeded and there are no posts
    Empty,
    /// The fetch failed; items from the last good fetch are kept
    Failed { message: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    pub items: Vec<FeedItem>,
    /// Offset of the next page on the server
    pub next_offset: u32,
    /// The last page came back short
    pub exhausted: bool,
    pub status: FeedStatus,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_offset: 0,
            exhausted: false,
            status: FeedStatus::Idle,
        }
    }
}

impl FeedState {
    fn fail(&mut self, error: &ApiError) {
        self.status = FeedStatus::Failed {
            message: error.to_string(),
            retryable: error.is_retryable(),
        };
    }

    fn settle_status(&mut self) {
        self.status = if self.items.is_empty() {
            FeedStatus::Empty
        } else {
            FeedStatus::Loaded
        };
    }
}

/// What happened to a fetch once its response came back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer refresh started, or the screen unmounted, while this one was in flight
    Discarded,
    /// Not sent: the tab is exhausted or a page load is already running
    Skipped,
}

#[derive(Default)]
struct TabSlot {
    state: FeedState,
    generation: u64,
    loading_more: bool,
}

struct Tabs {
    slots: HashMap<FeedCategory, TabSlot>,
    mounted: bool,
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    category: FeedCategory,
    generation: u64,
}

/// Per-tab feed state shared by the home screen and its background fetches
#[derive(Clone)]
pub struct FeedController {
    service: Arc<dyn ReviewService>,
    tabs: Arc<Mutex<Tabs>>,
    page_size: u32,
    log_config: Arc<LogConfig>,
    /// Told about comments written through this controller
    bus: Option<RefreshBus>,
}

impl FeedController {
    pub fn new(service: Arc<dyn ReviewService>) -> Self {
        Self {
            service,
            tabs: Arc::new(Mutex::new(Tabs {
                slots: HashMap::new(),
                mounted: true,
            })),
            page_size: DEFAULT_PAGE_SIZE,
            log_config: Arc::new(LogConfig::disabled()),
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: RefreshBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = Arc::new(log_config);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Snapshot of one tab
    pub async fn state(&self, category: FeedCategory) -> FeedState {
        let tabs = self.tabs.lock().await;
        tabs.slots
            .get(&category)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    pub async fn set_mounted(&self, mounted: bool) {
        let mut tabs = self.tabs.lock().await;
        tabs.mounted = mounted;
    }

    /// Reload a tab from offset 0, replacing its items
    pub async fn refresh(&self, category: FeedCategory) -> FetchOutcome {
        let ticket = {
            let mut tabs = self.tabs.lock().await;
            let slot = tabs.slots.entry(category).or_default();
            slot.generation += 1;
            Ticket {
                category,
                generation: slot.generation,
            }
        };
        log_feed!(self.log_config, "refresh {} (generation {})", category.as_str(), ticket.generation);

        let page = FeedParams {
            limit: self.page_size,
            offset: 0,
        };
        let result = self.service.fetch_feed(category, page).await;

        let mut tabs = self.tabs.lock().await;
        let Some(slot) = Self::current_slot(&mut tabs, ticket) else {
            log_feed!(self.log_config, "discarded refresh {} (generation {})", category.as_str(), ticket.generation);
            return FetchOutcome::Discarded;
        };

        let state = &mut slot.state;
        match result {
            Ok(posts) => {
                state.exhausted = (posts.len() as u32) < self.page_size;
                state.next_offset = posts.len() as u32;
                state.items = posts.into_iter().map(FeedItem::from).collect();
                state.settle_status();
            }
            Err(e) => {
                log::warn!("Feed refresh for {} failed: {}", category.as_str(), e);
                state.fail(&e);
            }
        }
        FetchOutcome::Applied
    }

    /// Fetch the next page and append it, skipping posts already shown
    pub async fn load_more(&self, category: FeedCategory) -> FetchOutcome {
        let (ticket, offset) = {
            let mut tabs = self.tabs.lock().await;
            let slot = tabs.slots.entry(category).or_default();
            if slot.state.exhausted || slot.loading_more {
                return FetchOutcome::Skipped;
            }
            slot.loading_more = true;
            (
                Ticket {
                    category,
                    generation: slot.generation,
                },
                slot.state.next_offset,
            )
        };
        log_feed!(self.log_config, "load more {} at offset {}", category.as_str(), offset);

        let page = FeedParams {
            limit: self.page_size,
            offset,
        };
        let result = self.service.fetch_feed(category, page).await;

        let mut tabs = self.tabs.lock().await;
        if let Some(slot) = tabs.slots.get_mut(&category) {
            slot.loading_more = false;
        }
        let Some(slot) = Self::current_slot(&mut tabs, ticket) else {
            return FetchOutcome::Discarded;
        };

        let state = &mut slot.state;
        match result {
            Ok(posts) => {
                state.exhausted = (posts.len() as u32) < self.page_size;
                state.next_offset += posts.len() as u32;
                let seen: HashSet<Uuid> = state.items.iter().map(|item| item.post_id).collect();
                state.items.extend(
                    posts
                        .into_iter()
                        .filter(|post| !seen.contains(&post.post.id))
                        .map(FeedItem::from),
                );
                state.settle_status();
            }
            Err(e) => {
                log::warn!("Loading more {} failed: {}", category.as_str(), e);
                state.fail(&e);
            }
        }
        FetchOutcome::Applied
    }

    /// Toggle a like remotely and apply the returned count to every tab
    pub async fn toggle_like(&self, post_id: Uuid) -> ApiResult<LikeState> {
        let like_state = self.service.toggle_post_like(post_id).await?;
        self.apply_like(&like_state).await;
        Ok(like_state)
    }

    /// Apply a like state returned by the service to cached items
    async fn apply_like(&self, like_state: &LikeState) {
        let mut tabs = self.tabs.lock().await;
        for slot in tabs.slots.values_mut() {
            for item in slot.state.items.iter_mut().filter(|i| i.post_id == like_state.post_id) {
                item.liked_by_me = like_state.liked;
                item.like_count = like_state.like_count;
            }
        }
    }

    /// Write a comment, bump the cached counter and announce it on the bus
    pub async fn add_comment(&self, params: CreateCommentParams) -> ApiResult<Comment> {
        let post_id = params.post_id;
        let comment = self.service.create_comment(params).await?;
        log_feed!(self.log_config, "comment {} added to post {}", comment.id, post_id);

        self.note_comment_added(post_id).await;
        if let Some(bus) = &self.bus {
            bus.publish(RefreshEvent::CommentAdded { post_id });
        }
        Ok(comment)
    }

    /// One page of a post's comments, oldest first
    pub async fn comments(&self, post_id: Uuid, page: FeedParams) -> ApiResult<Vec<Comment>> {
        log_feed!(self.log_config, "comments for {} at offset {}", post_id, page.offset);
        self.service.get_post_comments(post_id, page).await
    }

    async fn note_comment_added(&self, post_id: Uuid) {
        let mut tabs = self.tabs.lock().await;
        for slot in tabs.slots.values_mut() {
            for item in slot.state.items.iter_mut().filter(|i| i.post_id == post_id) {
                item.comment_count += 1;
            }
        }
    }

    /// The slot a ticket was issued for, if the result may still be applied
    fn current_slot(tabs: &mut Tabs, ticket: Ticket) -> Option<&mut TabSlot> {
        if !tabs.mounted {
            return None;
        }
        tabs.slots
            .get_mut(&ticket.category)
            .filter(|slot| slot.generation == ticket.generation)
    }
}
