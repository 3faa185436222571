use revue_types::{
    CompleteOnboardingParams, FollowState, MediaPreference, SetMediaPreferencesParams,
    UserIdParams, UserProfile,
};

use super::{ApiError, ApiResult, Caller};
use crate::db::repositories::{FollowRepository, PreferenceRepository, ProfileRepository};
use crate::state::AppState;

const MAX_DISPLAY_NAME_CHARS: usize = 50;

pub fn get_user_media_preferences(
    state: &AppState,
    caller: &Caller,
    params: UserIdParams,
) -> ApiResult<Vec<MediaPreference>> {
    caller.ensure_acting_for(&params.user_id)?;
    let repo = PreferenceRepository::new(state.db.pool.clone());
    Ok(repo.list(&params.user_id)?)
}

pub fn set_user_media_preferences(
    state: &AppState,
    caller: &Caller,
    params: SetMediaPreferencesParams,
) -> ApiResult<Vec<MediaPreference>> {
    let user_id = caller.require_user()?;
    let repo = PreferenceRepository::new(state.db.pool.clone());
    Ok(repo.replace(&user_id, &params.media_types)?)
}

/// `complete_onboarding`: stores the profile fields the onboarding flow collects
pub fn complete_onboarding(
    state: &AppState,
    caller: &Caller,
    params: CompleteOnboardingParams,
) -> ApiResult<UserProfile> {
    let user_id = caller.require_user()?;

    let display_name = params.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("Display name cannot be empty".to_string()));
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Display name exceeds {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }

    let repo = ProfileRepository::new(state.db.pool.clone());
    let profile = repo.complete_onboarding(
        &user_id,
        display_name,
        params.avatar_url.as_deref().filter(|url| !url.trim().is_empty()),
        params.contacts_synced,
    )?;
    Ok(profile)
}

pub fn toggle_follow(
    state: &AppState,
    caller: &Caller,
    params: UserIdParams,
) -> ApiResult<FollowState> {
    let follower_id = caller.require_user()?;
    let repo = FollowRepository::new(state.db.pool.clone());
    Ok(repo.toggle(&follower_id, &params.user_id)?)
}
