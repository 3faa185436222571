use revue_types::{GetNotificationsParams, Notification, NotificationIdParams};

use super::{page_limit, ApiError, ApiResult, Caller};
use crate::db::repositories::NotificationRepository;
use crate::state::AppState;

/// `get_user_notifications`: newest first
pub fn get_user_notifications(
    state: &AppState,
    caller: &Caller,
    params: GetNotificationsParams,
) -> ApiResult<Vec<Notification>> {
    caller.ensure_acting_for(&params.user_id)?;
    let repo = NotificationRepository::new(state.db.pool.clone());
    let notifications = repo.list(
        &params.user_id,
        page_limit(params.limit),
        params.offset,
        params.unread_only,
    )?;
    Ok(notifications)
}

pub fn mark_notification_read(
    state: &AppState,
    caller: &Caller,
    params: NotificationIdParams,
) -> ApiResult<Notification> {
    let user_id = caller.require_user()?;
    let repo = NotificationRepository::new(state.db.pool.clone());
    repo.mark_read(&user_id, &params.notification_id)?
        .ok_or_else(|| ApiError::NotFound(format!("notification {}", params.notification_id)))
}
