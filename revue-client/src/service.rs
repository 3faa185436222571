use async_trait::async_trait;
use uuid::Uuid;

use crate::api::{ApiClient, ApiResult};
use revue_types::{
    Comment, CreateCommentParams, CreatePostParams, FeedCategory, FeedParams, FeedPost, LikeState,
};

/// Remote operations the feed and the post wizard depend on
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn fetch_feed(&self, category: FeedCategory, page: FeedParams) -> ApiResult<Vec<FeedPost>>;

    /// Write a post and return its id
    async fn create_post(&self, params: CreatePostParams) -> ApiResult<Uuid>;

    async fn toggle_post_like(&self, post_id: Uuid) -> ApiResult<LikeState>;

    async fn create_comment(&self, params: CreateCommentParams) -> ApiResult<Comment>;

    async fn get_post_comments(&self, post_id: Uuid, page: FeedParams) -> ApiResult<Vec<Comment>>;
}

#[async_trait]
impl ReviewService for ApiClient {
    async fn fetch_feed(&self, category: FeedCategory, page: FeedParams) -> ApiResult<Vec<FeedPost>> {
        self.get_feed(category, page).await
    }

    async fn create_post(&self, params: CreatePostParams) -> ApiResult<Uuid> {
        ApiClient::create_post(self, &params).await
    }

    async fn toggle_post_like(&self, post_id: Uuid) -> ApiResult<LikeState> {
        ApiClient::toggle_post_like(self, post_id).await
    }

    async fn create_comment(&self, params: CreateCommentParams) -> ApiResult<Comment> {
        ApiClient::create_comment(self, &params).await
    }

    async fn get_post_comments(&self, post_id: Uuid, page: FeedParams) -> ApiResult<Vec<Comment>> {
        ApiClient::get_post_comments(self, post_id, page.limit, page.offset).await
    }
}
