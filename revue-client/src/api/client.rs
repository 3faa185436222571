use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::log_api_call;
use crate::logging::LogConfig;
use revue_types::*;

/// Client for the revue data service.
///
/// Every remote operation goes through [`ApiClient::rpc`], keyed by a
/// [`Procedure`] type; the typed methods below are thin wrappers over it.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    log_config: LogConfig,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the access token sent as `Authorization: Bearer`
    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Attach the project key and, when signed in, the access token
    fn add_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.header("apikey", &self.api_key);
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Decode a success body, or classify the failure from status and error code
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let error = classify_error(status, &error_text);
        log_api_call!(self.log_config, "Request failed: {}", error);
        Err(error)
    }

    /// Call a stored procedure by its canonical name
    pub async fn rpc<P: Procedure>(&self, params: &P::Params) -> ApiResult<P::Output> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, P::NAME);
        log_api_call!(self.log_config, "rpc {}", P::NAME);

        let req = self.add_auth_headers(self.client.post(&url).json(params));
        let response = req.send().await?;
        self.handle_response(response).await
    }

    // Authentication endpoints

    /// Create an account; the returned token is kept for later calls
    pub async fn sign_up(&mut self, username: &str, display_name: Option<&str>) -> ApiResult<AuthResponse> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let request = SignUpRequest {
            username: username.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let response = self
            .add_auth_headers(self.client.post(&url))
            .json(&request)
            .send()
            .await?;
        let auth: AuthResponse = self.handle_response(response).await?;

        self.access_token = Some(auth.access_token.clone());
        Ok(auth)
    }

    pub async fn sign_in(&mut self, username: &str) -> ApiResult<AuthResponse> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let request = SignInRequest {
            username: username.to_string(),
        };
        // A stale token would be rejected before the sign-in is looked at
        self.access_token = None;
        let response = self
            .add_auth_headers(self.client.post(&url))
            .json(&request)
            .send()
            .await?;
        let auth: AuthResponse = self.handle_response(response).await?;

        self.access_token = Some(auth.access_token.clone());
        Ok(auth)
    }

    pub async fn sign_out(&mut self) -> ApiResult<()> {
        if self.access_token.is_none() {
            return Ok(());
        }
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self.add_auth_headers(self.client.post(&url)).send().await?;
        let _: serde_json::Value = self.handle_response(response).await?;

        self.access_token = None;
        Ok(())
    }

    // Posts

    /// Write a post through `create_post` and return its id.
    /// A `success: false` envelope is reported as [`ApiError::Rejected`].
    pub async fn create_post(&self, params: &CreatePostParams) -> ApiResult<Uuid> {
        let result = self.rpc::<CreatePost>(params).await?;
        match result {
            CreatePostResult {
                success: true,
                post_id: Some(post_id),
                ..
            } => Ok(post_id),
            CreatePostResult { success: true, .. } => Err(ApiError::Rejected(
                "create_post succeeded without returning a post id".to_string(),
            )),
            CreatePostResult { error, .. } => Err(ApiError::Rejected(
                error.unwrap_or_else(|| "create_post was rejected".to_string()),
            )),
        }
    }

    pub async fn get_feed(&self, category: FeedCategory, params: FeedParams) -> ApiResult<Vec<FeedPost>> {
        match category {
            FeedCategory::ForYou => self.rpc::<GetForYouFeed>(&params).await,
            FeedCategory::Following => self.rpc::<GetFollowingFeed>(&params).await,
        }
    }

    pub async fn get_post(&self, post_id: Uuid) -> ApiResult<FeedPost> {
        self.rpc::<GetPost>(&PostIdParams { post_id }).await
    }

    pub async fn toggle_post_like(&self, post_id: Uuid) -> ApiResult<LikeState> {
        self.rpc::<TogglePostLike>(&PostIdParams { post_id }).await
    }

    // Comments

    pub async fn create_comment(&self, params: &CreateCommentParams) -> ApiResult<Comment> {
        self.rpc::<CreateComment>(params).await
    }

    pub async fn get_post_comments(&self, post_id: Uuid, limit: u32, offset: u32) -> ApiResult<Vec<Comment>> {
        self.rpc::<GetPostComments>(&GetPostCommentsParams {
            post_id,
            limit,
            offset,
        })
        .await
    }

    // Profile, preferences and follows

    pub async fn get_user_media_preferences(&self, user_id: Uuid) -> ApiResult<Vec<MediaPreference>> {
        self.rpc::<GetUserMediaPreferences>(&UserIdParams { user_id }).await
    }

    pub async fn set_user_media_preferences(
        &self,
        media_types: Vec<MediaType>,
    ) -> ApiResult<Vec<MediaPreference>> {
        self.rpc::<SetUserMediaPreferences>(&SetMediaPreferencesParams { media_types })
            .await
    }

    pub async fn complete_onboarding(&self, params: &CompleteOnboardingParams) -> ApiResult<UserProfile> {
        self.rpc::<CompleteOnboarding>(params).await
    }

    pub async fn toggle_follow(&self, user_id: Uuid) -> ApiResult<FollowState> {
        self.rpc::<ToggleFollow>(&UserIdParams { user_id }).await
    }

    // Notifications and media

    pub async fn get_user_notifications(&self, params: &GetNotificationsParams) -> ApiResult<Vec<Notification>> {
        self.rpc::<GetUserNotifications>(params).await
    }

    pub async fn mark_notification_read(&self, notification_id: Uuid) -> ApiResult<Notification> {
        self.rpc::<MarkNotificationRead>(&NotificationIdParams { notification_id })
            .await
    }

    pub async fn search_media_items(&self, query: &str, limit: u32) -> ApiResult<Vec<MediaItem>> {
        self.rpc::<SearchMediaItems>(&SearchMediaParams {
            query: query.to_string(),
            limit,
        })
        .await
    }
}

/// Map a failed response onto an [`ApiError`]. The error code in the body
/// wins over the HTTP status.
fn classify_error(status: StatusCode, body: &str) -> ApiError {
    // Clean up HTML error pages from proxies in front of the service
    if body.contains("<html>") || body.contains("<!DOCTYPE") {
        return ApiError::Api {
            status: status.as_u16(),
            message: format!(
                "Server returned {} error. Please check the service URL.",
                status.as_u16()
            ),
        };
    }

    let (message, code) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            error,
            details,
            code,
        }) => {
            let message = match details {
                Some(details) => format!("{}: {}", error, details),
                None => error,
            };
            (message, code)
        }
        Err(_) => (body.to_string(), None),
    };

    match (code.as_deref(), status.as_u16()) {
        (Some("PGRST202"), _) => ApiError::MissingProcedure(message),
        (Some("23503"), _) => ApiError::ForeignKeyViolation(message),
        (Some("22P02"), _) | (_, 400) => ApiError::BadRequest(message),
        (_, 404) => ApiError::NotFound(message),
        (_, 401) => ApiError::Unauthorized(message),
        (_, 403) => ApiError::Forbidden(message),
        (_, status) => ApiError::Api { status, message },
    }
}
