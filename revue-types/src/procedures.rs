//! Remote procedure contract.
//!
//! Each procedure the service exposes is a marker type implementing [`Procedure`].
//! The type carries the one canonical name, the parameter payload and the output
//! payload, so a caller cannot reach the service through any other name or id type.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{MediaType, Visibility};
use crate::models::{
    Comment, FeedPost, FollowState, LikeState, MediaItem, MediaPreference, Notification,
    UserProfile,
};

/// Canonical procedure names, as routed under `/rest/v1/rpc/{name}`
pub mod names {
    pub const CREATE_POST: &str = "create_post";
    pub const TOGGLE_POST_LIKE: &str = "toggle_post_like";
    pub const CREATE_COMMENT: &str = "create_comment";
    pub const GET_POST_COMMENTS: &str = "get_post_comments";
    pub const GET_FOR_YOU_FEED: &str = "get_for_you_feed";
    pub const GET_FOLLOWING_FEED: &str = "get_following_feed";
    pub const GET_POST: &str = "get_post";
    pub const GET_USER_MEDIA_PREFERENCES: &str = "get_user_media_preferences";
    pub const SET_USER_MEDIA_PREFERENCES: &str = "set_user_media_preferences";
    pub const GET_USER_NOTIFICATIONS: &str = "get_user_notifications";
    pub const MARK_NOTIFICATION_READ: &str = "mark_notification_read";
    pub const SEARCH_MEDIA_ITEMS: &str = "search_media_items";
    pub const COMPLETE_ONBOARDING: &str = "complete_onboarding";
    pub const TOGGLE_FOLLOW: &str = "toggle_follow";

    pub const ALL: [&str; 14] = [
        CREATE_POST,
        TOGGLE_POST_LIKE,
        CREATE_COMMENT,
        GET_POST_COMMENTS,
        GET_FOR_YOU_FEED,
        GET_FOLLOWING_FEED,
        GET_POST,
        GET_USER_MEDIA_PREFERENCES,
        SET_USER_MEDIA_PREFERENCES,
        GET_USER_NOTIFICATIONS,
        MARK_NOTIFICATION_READ,
        SEARCH_MEDIA_ITEMS,
        COMPLETE_ONBOARDING,
        TOGGLE_FOLLOW,
    ];
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest post or comment body accepted, in characters
pub const MAX_CONTENT_CHARS: usize = 2000;
/// Star ratings run from 1 to 5
pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub trait Procedure {
    const NAME: &'static str;
    type Params: Serialize + DeserializeOwned + Send + Sync;
    type Output: Serialize + DeserializeOwned + Send;
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostParams {
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub media_item_id: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub contains_spoilers: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Envelope returned by `create_post`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostResult {
    pub success: bool,
    #[serde(default)]
    pub post_id: Option<Uuid>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CreatePostResult {
    pub fn created(post_id: Uuid) -> Self {
        Self {
            success: true,
            post_id: Some(post_id),
            error: None,
        }
    }

    /// Envelope for a post the procedure refused to write
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            post_id: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostIdParams {
    pub post_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostCommentsParams {
    pub post_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdParams {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMediaPreferencesParams {
    pub media_types: Vec<MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetNotificationsParams {
    pub user_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIdParams {
    pub notification_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMediaParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteOnboardingParams {
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub contacts_synced: bool,
}

macro_rules! procedure {
    ($(#[$meta:meta])* $ty:ident, $name:expr, $params:ty => $output:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $ty;

        impl Procedure for $ty {
            const NAME: &'static str = $name;
            type Params = $params;
            type Output = $output;
        }
    };
}

procedure!(
    /// Write a post as the calling user
    CreatePost, names::CREATE_POST, CreatePostParams => CreatePostResult
);
procedure!(
    /// Flip the calling user's like on a post
    TogglePostLike, names::TOGGLE_POST_LIKE, PostIdParams => LikeState
);
procedure!(
    /// Append a comment, optionally as a reply to another comment on the same post
    CreateComment, names::CREATE_COMMENT, CreateCommentParams => Comment
);
procedure!(
    /// Comments of a post, oldest first
    GetPostComments, names::GET_POST_COMMENTS, GetPostCommentsParams => Vec<Comment>
);
procedure!(
    /// Public posts plus the caller's own, newest first
    GetForYouFeed, names::GET_FOR_YOU_FEED, FeedParams => Vec<FeedPost>
);
procedure!(
    /// Posts by followed users plus the caller's own, newest first
    GetFollowingFeed, names::GET_FOLLOWING_FEED, FeedParams => Vec<FeedPost>
);
procedure!(GetPost, names::GET_POST, PostIdParams => FeedPost);
procedure!(
    GetUserMediaPreferences, names::GET_USER_MEDIA_PREFERENCES, UserIdParams => Vec<MediaPreference>
);
procedure!(
    /// Replace the caller's media preferences
    SetUserMediaPreferences, names::SET_USER_MEDIA_PREFERENCES, SetMediaPreferencesParams => Vec<MediaPreference>
);
procedure!(
    GetUserNotifications, names::GET_USER_NOTIFICATIONS, GetNotificationsParams => Vec<Notification>
);
procedure!(
    MarkNotificationRead, names::MARK_NOTIFICATION_READ, NotificationIdParams => Notification
);
procedure!(SearchMediaItems, names::SEARCH_MEDIA_ITEMS, SearchMediaParams => Vec<MediaItem>);
procedure!(
    CompleteOnboarding, names::COMPLETE_ONBOARDING, CompleteOnboardingParams => UserProfile
);
procedure!(
    /// Follow or unfollow another user
    ToggleFollow, names::TOGGLE_FOLLOW, UserIdParams => FollowState
);
