use revue_types::{
    CreatePostParams, CreatePostResult, FeedCategory, FeedParams, FeedPost, LikeState,
    PostIdParams, MAX_CONTENT_CHARS, MAX_RATING, MIN_RATING,
};

use super::{page_limit, ApiError, ApiResult, Caller};
use crate::db::repositories::{LikeRepository, NewPost, PostRepository};
use crate::state::AppState;

/// Reason a post body is refused, if any
fn post_rejection(params: &CreatePostParams) -> Option<String> {
    if params.content.trim().is_empty() {
        return Some("Post content cannot be empty".to_string());
    }
    let length = params.content.chars().count();
    if length > MAX_CONTENT_CHARS {
        return Some(format!(
            "Post content is {} characters, the limit is {}",
            length, MAX_CONTENT_CHARS
        ));
    }
    match params.rating {
        Some(rating) if !(MIN_RATING..=MAX_RATING).contains(&rating) => Some(format!(
            "Rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )),
        Some(_) if media_item_id(params).is_none() => {
            Some("A rating needs a media item to rate".to_string())
        }
        _ => None,
    }
}

/// The media item a post is about; blank ids count as none
fn media_item_id(params: &CreatePostParams) -> Option<&str> {
    params
        .media_item_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// `create_post`: validation failures come back as `success: false`, broken
/// references as a foreign-key error
pub fn create_post(
    state: &AppState,
    caller: &Caller,
    params: CreatePostParams,
) -> ApiResult<CreatePostResult> {
    caller.ensure_acting_for(&params.user_id)?;

    if let Some(reason) = post_rejection(&params) {
        tracing::debug!("Rejected post for user {}: {}", params.user_id, reason);
        return Ok(CreatePostResult::rejected(reason));
    }

    let repo = PostRepository::new(state.db.pool.clone());
    let media_item_id = media_item_id(&params).map(str::to_string);
    let post = repo.create(&NewPost {
        user_id: params.user_id,
        content: params.content,
        media_item_id,
        rating: params.rating,
        contains_spoilers: params.contains_spoilers,
        visibility: params.visibility,
    })?;

    Ok(CreatePostResult::created(post.id))
}

/// `get_for_you_feed` and `get_following_feed`
pub fn get_feed(
    state: &AppState,
    caller: &Caller,
    category: FeedCategory,
    params: FeedParams,
) -> ApiResult<Vec<FeedPost>> {
    let repo = PostRepository::new(state.db.pool.clone());
    let posts = repo.get_feed(
        category,
        caller.user_id.as_ref(),
        page_limit(params.limit),
        params.offset,
    )?;
    Ok(posts)
}

pub fn get_post(state: &AppState, caller: &Caller, params: PostIdParams) -> ApiResult<FeedPost> {
    let repo = PostRepository::new(state.db.pool.clone());
    repo.get_feed_post(&params.post_id, caller.user_id.as_ref())?
        .ok_or_else(|| ApiError::NotFound(format!("post {}", params.post_id)))
}

/// `toggle_post_like`: flips the session user's like and returns the recomputed count
pub fn toggle_post_like(
    state: &AppState,
    caller: &Caller,
    params: PostIdParams,
) -> ApiResult<LikeState> {
    let user_id = caller.require_user()?;
    let repo = LikeRepository::new(state.db.pool.clone());
    Ok(repo.toggle(&user_id, &params.post_id)?)
}
