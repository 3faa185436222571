//! `POST /rest/v1/rpc/:name` dispatcher.
//!
//! Each canonical name from [`revue_types::names`] is bound to exactly one
//! handler through its [`Procedure`] type, which fixes how the JSON body is
//! read and how the result is written.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use revue_types::{
    names, CompleteOnboarding, CreateComment, CreatePost, FeedCategory, GetFollowingFeed,
    GetForYouFeed, GetPost, GetPostComments, GetUserMediaPreferences, GetUserNotifications,
    MarkNotificationRead, Procedure, SearchMediaItems, SetUserMediaPreferences, ToggleFollow,
    TogglePostLike,
};
use serde_json::Value;

use super::{comments, media, notifications, posts, profiles};
use super::{ApiError, ApiResult, Caller};
use crate::state::AppState;

/// Read the request body as a JSON object; an empty body is an empty object
fn parse_body(body: &[u8]) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidParams(format!("Request body is not valid JSON: {}", e)))
}

/// Decode params as `P::Params`, run the handler and encode its output
fn run<P, F>(params: Value, handler: F) -> ApiResult<Json<Value>>
where
    P: Procedure,
    F: FnOnce(P::Params) -> ApiResult<P::Output>,
{
    let params: P::Params = serde_json::from_value(params)
        .map_err(|e| ApiError::InvalidParams(format!("{}: {}", P::NAME, e)))?;
    let output = handler(params)?;
    let value = serde_json::to_value(output)
        .map_err(|e| ApiError::InternalError(format!("Failed to encode {} result: {}", P::NAME, e)))?;
    Ok(Json(value))
}

pub async fn call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let caller = Caller::from_headers(&state, &headers)?;

    if !names::ALL.contains(&name.as_str()) {
        tracing::warn!("Call to unknown procedure '{}'", name);
        return Err(ApiError::MissingProcedure(name));
    }

    let params = parse_body(&body)?;
    tracing::debug!("rpc {} (user {:?})", name, caller.user_id);

    let state = &state;
    let caller = &caller;
    match name.as_str() {
        names::CREATE_POST => run::<CreatePost, _>(params, |p| posts::create_post(state, caller, p)),
        names::TOGGLE_POST_LIKE => {
            run::<TogglePostLike, _>(params, |p| posts::toggle_post_like(state, caller, p))
        }
        names::GET_FOR_YOU_FEED => run::<GetForYouFeed, _>(params, |p| {
            posts::get_feed(state, caller, FeedCategory::ForYou, p)
        }),
        names::GET_FOLLOWING_FEED => run::<GetFollowingFeed, _>(params, |p| {
            posts::get_feed(state, caller, FeedCategory::Following, p)
        }),
        names::GET_POST => run::<GetPost, _>(params, |p| posts::get_post(state, caller, p)),
        names::CREATE_COMMENT => {
            run::<CreateComment, _>(params, |p| comments::create_comment(state, caller, p))
        }
        names::GET_POST_COMMENTS => {
            run::<GetPostComments, _>(params, |p| comments::get_post_comments(state, caller, p))
        }
        names::GET_USER_MEDIA_PREFERENCES => run::<GetUserMediaPreferences, _>(params, |p| {
            profiles::get_user_media_preferences(state, caller, p)
        }),
        names::SET_USER_MEDIA_PREFERENCES => run::<SetUserMediaPreferences, _>(params, |p| {
            profiles::set_user_media_preferences(state, caller, p)
        }),
        names::COMPLETE_ONBOARDING => run::<CompleteOnboarding, _>(params, |p| {
            profiles::complete_onboarding(state, caller, p)
        }),
        names::TOGGLE_FOLLOW => {
            run::<ToggleFollow, _>(params, |p| profiles::toggle_follow(state, caller, p))
        }
        names::GET_USER_NOTIFICATIONS => run::<GetUserNotifications, _>(params, |p| {
            notifications::get_user_notifications(state, caller, p)
        }),
        names::MARK_NOTIFICATION_READ => run::<MarkNotificationRead, _>(params, |p| {
            notifications::mark_notification_read(state, caller, p)
        }),
        names::SEARCH_MEDIA_ITEMS => {
            run::<SearchMediaItems, _>(params, |p| media::search_media_items(state, p))
        }
        _ => Err(ApiError::MissingProcedure(name.clone())),
    }
}
