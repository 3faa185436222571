use axum::http::{header::AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the project key
pub const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Key shipped with client apps
    Anon,
    /// Administrative key; may act on behalf of any user
    ServiceRole,
}

/// Who is making a request: which key they presented and, when a bearer
/// token was sent, the user it belongs to
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub role: Role,
    pub user_id: Option<Uuid>,
}

impl Caller {
    pub fn from_headers(state: &AppState, headers: &HeaderMap) -> ApiResult<Self> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing apikey header".to_string()))?;

        let role = if key == state.auth.service_role_key {
            Role::ServiceRole
        } else if key == state.auth.anon_key {
            Role::Anon
        } else {
            return Err(ApiError::Unauthorized("Invalid API key".to_string()));
        };

        let user_id = match bearer_token(headers) {
            // The anon key doubles as a bearer value for unauthenticated calls
            Some(token) if token == key => None,
            Some(token) => Some(
                state
                    .user_id_for_token(token)
                    .ok_or_else(|| ApiError::Unauthorized("Invalid or expired access token".to_string()))?,
            ),
            None => None,
        };

        Ok(Self { role, user_id })
    }

    /// The session user, for procedures that act as the caller
    pub fn require_user(&self) -> ApiResult<Uuid> {
        self.user_id
            .ok_or_else(|| ApiError::Unauthorized("This procedure requires a signed-in user".to_string()))
    }

    /// Check the caller may act for `user_id`: either it is the session user
    /// or the caller holds the service-role key
    pub fn ensure_acting_for(&self, user_id: &Uuid) -> ApiResult<()> {
        if self.role == Role::ServiceRole {
            return Ok(());
        }
        let session_user = self.require_user()?;
        if session_user != *user_id {
            return Err(ApiError::Forbidden(format!(
                "Cannot act on behalf of user {}",
                user_id
            )));
        }
        Ok(())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, user_id: Option<Uuid>) -> Caller {
        Caller { role, user_id }
    }

    #[test]
    fn test_acting_for_self() {
        let me = Uuid::new_v4();
        assert!(caller(Role::Anon, Some(me)).ensure_acting_for(&me).is_ok());
    }

    #[test]
    fn test_acting_for_someone_else_is_forbidden() {
        let me = Uuid::new_v4();
        let result = caller(Role::Anon, Some(me)).ensure_acting_for(&Uuid::new_v4());
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_anonymous_caller_is_unauthorized() {
        let result = caller(Role::Anon, None).ensure_acting_for(&Uuid::new_v4());
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_service_role_may_act_for_anyone() {
        assert!(caller(Role::ServiceRole, None)
            .ensure_acting_for(&Uuid::new_v4())
            .is_ok());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
