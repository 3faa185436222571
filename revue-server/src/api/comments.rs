use revue_types::{Comment, CreateCommentParams, GetPostCommentsParams, MAX_CONTENT_CHARS};

use super::{page_limit, ApiError, ApiResult, Caller};
use crate::db::repositories::CommentRepository;
use crate::state::AppState;

/// `create_comment`: appends a comment as the session user
pub fn create_comment(
    state: &AppState,
    caller: &Caller,
    params: CreateCommentParams,
) -> ApiResult<Comment> {
    let user_id = caller.require_user()?;

    let content = params.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Comment exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    let repo = CommentRepository::new(state.db.pool.clone());
    let comment = repo.create(
        &user_id,
        &params.post_id,
        content,
        params.parent_comment_id.as_ref(),
    )?;
    Ok(comment)
}

/// `get_post_comments`: oldest first
pub fn get_post_comments(
    state: &AppState,
    caller: &Caller,
    params: GetPostCommentsParams,
) -> ApiResult<Vec<Comment>> {
    let repo = CommentRepository::new(state.db.pool.clone());
    let comments = repo.list(
        &params.post_id,
        caller.user_id.as_ref(),
        page_limit(params.limit),
        params.offset,
    )?;
    Ok(comments)
}
