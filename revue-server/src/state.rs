use uuid::Uuid;

use crate::config::Auth;
use crate::db::Database;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub session_manager: SessionManager,
    pub auth: Auth,
}

impl AppState {
    pub fn new(db: Database, auth: Auth) -> Self {
        let session_manager = SessionManager::new(db.clone(), auth.session_ttl_days);
        Self {
            db,
            session_manager,
            auth,
        }
    }

    /// Get authenticated user ID from an access token
    pub fn user_id_for_token(&self, token: &str) -> Option<Uuid> {
        match self.session_manager.validate_session(token) {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                None
            }
        }
    }
}
