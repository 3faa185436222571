//! Review composer: a four step wizard that ends in a single `create_post` call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;
use crate::log_composer;
use crate::logging::LogConfig;
use crate::refresh::{RefreshBus, RefreshEvent};
use crate::service::ReviewService;
use revue_types::{CreatePostParams, MediaItem, Visibility, MAX_CONTENT_CHARS, MAX_RATING, MIN_RATING};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    SelectMedia,
    Rate,
    Write,
    Review,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    /// `None` for a general post that reviews nothing in particular
    pub media: Option<MediaItem>,
    pub rating: Option<i32>,
    pub content: String,
    pub contains_spoilers: bool,
    pub visibility: Visibility,
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Pick a rating before continuing")]
    MissingRating,

    #[error("Rating {0} is out of range")]
    InvalidRating(i32),

    #[error("Write something before continuing")]
    EmptyContent,

    #[error("Post is {0} characters, which is over the limit")]
    ContentTooLong(usize),

    #[error("Already at the review step")]
    NoNextStep,

    #[error("Finish the {0:?} step before submitting")]
    NotReady(WizardStep),

    #[error("A submission is already in progress")]
    SubmitInProgress,

    #[error(transparent)]
    Service(#[from] ApiError),
}

impl PostDraft {
    fn check_rating(&self) -> Result<(), WizardError> {
        match (self.media.is_some(), self.rating) {
            (true, None) => Err(WizardError::MissingRating),
            (_, Some(rating)) if !(MIN_RATING..=MAX_RATING).contains(&rating) => {
                Err(WizardError::InvalidRating(rating))
            }
            _ => Ok(()),
        }
    }

    /// Measured on the trimmed text, which is what gets sent
    fn check_content(&self) -> Result<(), WizardError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(WizardError::EmptyContent);
        }
        let length = content.chars().count();
        if length > MAX_CONTENT_CHARS {
            return Err(WizardError::ContentTooLong(length));
        }
        Ok(())
    }

    fn to_params(&self, user_id: Uuid) -> CreatePostParams {
        CreatePostParams {
            user_id,
            content: self.content.trim().to_string(),
            media_item_id: self.media.as_ref().map(|m| m.id.clone()),
            // A rating only means something next to a media item
            rating: self.media.as_ref().and(self.rating),
            contains_spoilers: self.contains_spoilers,
            visibility: self.visibility,
        }
    }
}

struct WizardState {
    step: WizardStep,
    draft: PostDraft,
    last_error: Option<String>,
}

/// Clears the in-flight flag however the submission ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Post submission wizard: SelectMedia, Rate, Write, Review.
///
/// Without a media item the Rate step is skipped. Navigating back never
/// clears what was entered.
pub struct PostWizard {
    service: Arc<dyn ReviewService>,
    bus: RefreshBus,
    author_id: Uuid,
    state: Mutex<WizardState>,
    submitting: AtomicBool,
    log_config: LogConfig,
}

impl PostWizard {
    pub fn new(service: Arc<dyn ReviewService>, bus: RefreshBus, author_id: Uuid) -> Self {
        Self {
            service,
            bus,
            author_id,
            state: Mutex::new(WizardState {
                step: WizardStep::SelectMedia,
                draft: PostDraft::default(),
                last_error: None,
            }),
            submitting: AtomicBool::new(false),
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub async fn step(&self) -> WizardStep {
        self.state.lock().await.step
    }

    pub async fn draft(&self) -> PostDraft {
        self.state.lock().await.draft.clone()
    }

    /// Message of the last failed submission, cleared by the next success
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub async fn select_media(&self, media: Option<MediaItem>) {
        self.state.lock().await.draft.media = media;
    }

    pub async fn set_rating(&self, rating: i32) {
        self.state.lock().await.draft.rating = Some(rating);
    }

    pub async fn set_content(&self, content: impl Into<String>) {
        self.state.lock().await.draft.content = content.into();
    }

    pub async fn set_spoilers(&self, contains_spoilers: bool) {
        self.state.lock().await.draft.contains_spoilers = contains_spoilers;
    }

    pub async fn set_visibility(&self, visibility: Visibility) {
        self.state.lock().await.draft.visibility = visibility;
    }

    /// Validate the current step and advance
    pub async fn next(&self) -> Result<WizardStep, WizardError> {
        let mut state = self.state.lock().await;
        let next = match state.step {
            WizardStep::SelectMedia if state.draft.media.is_some() => WizardStep::Rate,
            WizardStep::SelectMedia => WizardStep::Write,
            WizardStep::Rate => {
                state.draft.check_rating()?;
                WizardStep::Write
            }
            WizardStep::Write => {
                state.draft.check_content()?;
                WizardStep::Review
            }
            WizardStep::Review => return Err(WizardError::NoNextStep),
        };
        log_composer!(self.log_config, "step {:?} -> {:?}", state.step, next);
        state.step = next;
        Ok(next)
    }

    /// Go back one step, keeping the draft
    pub async fn back(&self) -> WizardStep {
        let mut state = self.state.lock().await;
        state.step = match state.step {
            WizardStep::SelectMedia | WizardStep::Rate => WizardStep::SelectMedia,
            WizardStep::Write if state.draft.media.is_some() => WizardStep::Rate,
            WizardStep::Write => WizardStep::SelectMedia,
            WizardStep::Review => WizardStep::Write,
        };
        state.step
    }

    /// Submit the draft with exactly one `create_post` call.
    ///
    /// On success the draft resets and a [`RefreshEvent::PostCreated`] is
    /// published. On failure the wizard keeps its step and draft and records
    /// the error message.
    pub async fn submit(&self) -> Result<Uuid, WizardError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WizardError::SubmitInProgress);
        }
        let _in_flight = InFlight(&self.submitting);

        let params = {
            let state = self.state.lock().await;
            if state.step != WizardStep::Review {
                return Err(WizardError::NotReady(state.step));
            }
            state.draft.check_rating()?;
            state.draft.check_content()?;
            state.draft.to_params(self.author_id)
        };

        log_composer!(self.log_config, "submitting post (media {:?})", params.media_item_id);
        let result = self.service.create_post(params).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(post_id) => {
                state.step = WizardStep::SelectMedia;
                state.draft = PostDraft::default();
                state.last_error = None;
                drop(state);

                self.bus.publish(RefreshEvent::PostCreated { post_id });
                log::info!("Created post {}", post_id);
                Ok(post_id)
            }
            Err(e) => {
                log::warn!("Post submission failed: {}", e);
                state.last_error = Some(e.to_string());
                Err(WizardError::Service(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResult;
    use async_trait::async_trait;
    use revue_types::{Comment, CreateCommentParams, FeedCategory, FeedParams, FeedPost, LikeState, MediaType};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingService {
        created: StdMutex<Vec<CreatePostParams>>,
        reject_with: StdMutex<Option<String>>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ReviewService for RecordingService {
        async fn fetch_feed(&self, _category: FeedCategory, _page: FeedParams) -> ApiResult<Vec<FeedPost>> {
            Ok(Vec::new())
        }

        async fn create_post(&self, params: CreatePostParams) -> ApiResult<Uuid> {
            self.created.lock().unwrap().push(params);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.reject_with.lock().unwrap().clone() {
                Some(message) => Err(ApiError::ForeignKeyViolation(message)),
                None => Ok(Uuid::new_v4()),
            }
        }

        async fn toggle_post_like(&self, _post_id: Uuid) -> ApiResult<LikeState> {
            unimplemented!("not used by composer tests")
        }

        async fn create_comment(&self, _params: CreateCommentParams) -> ApiResult<Comment> {
            unimplemented!("not used by composer tests")
        }

        async fn get_post_comments(&self, _post_id: Uuid, _page: FeedParams) -> ApiResult<Vec<Comment>> {
            Ok(Vec::new())
        }
    }

    fn matrix() -> MediaItem {
        MediaItem {
            id: "tmdb:603".to_string(),
            title: "The Matrix".to_string(),
            media_type: MediaType::Movie,
            cover_url: None,
            release_year: Some(1999),
        }
    }

    async fn wizard_at_review(service: Arc<RecordingService>, bus: RefreshBus) -> PostWizard {
        let wizard = PostWizard::new(service, bus, Uuid::new_v4());
        wizard.select_media(Some(matrix())).await;
        wizard.next().await.unwrap();
        wizard.set_rating(5).await;
        wizard.next().await.unwrap();
        wizard.set_content("Still holds up").await;
        wizard.next().await.unwrap();
        wizard
    }

    #[tokio::test]
    async fn test_steps_validate() {
        let wizard = PostWizard::new(Arc::new(RecordingService::default()), RefreshBus::new(), Uuid::new_v4());
        wizard.select_media(Some(matrix())).await;
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Rate);

        assert!(matches!(wizard.next().await, Err(WizardError::MissingRating)));
        wizard.set_rating(6).await;
        assert!(matches!(wizard.next().await, Err(WizardError::InvalidRating(6))));
        wizard.set_rating(4).await;
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Write);

        wizard.set_content("   ").await;
        assert!(matches!(wizard.next().await, Err(WizardError::EmptyContent)));
        wizard.set_content("x".repeat(MAX_CONTENT_CHARS + 1)).await;
        assert!(matches!(wizard.next().await, Err(WizardError::ContentTooLong(_))));
        wizard.set_content("Good").await;
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Review);
        assert!(matches!(wizard.next().await, Err(WizardError::NoNextStep)));
    }

    #[tokio::test]
    async fn test_padding_does_not_count_toward_limit() {
        let service = Arc::new(RecordingService::default());
        let wizard = PostWizard::new(service.clone(), RefreshBus::new(), Uuid::new_v4());
        wizard.next().await.unwrap();

        let body = "x".repeat(MAX_CONTENT_CHARS);
        wizard.set_content(format!("  {}\n\n", body)).await;
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Review);

        wizard.submit().await.unwrap();
        let created = service.created.lock().unwrap();
        assert_eq!(created[0].content, body);
    }

    #[tokio::test]
    async fn test_rate_step_skipped_without_media() {
        let wizard = PostWizard::new(Arc::new(RecordingService::default()), RefreshBus::new(), Uuid::new_v4());
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Write);
        assert_eq!(wizard.back().await, WizardStep::SelectMedia);
    }

    #[tokio::test]
    async fn test_back_keeps_draft() {
        let wizard = wizard_at_review(Arc::new(RecordingService::default()), RefreshBus::new()).await;
        assert_eq!(wizard.back().await, WizardStep::Write);
        assert_eq!(wizard.back().await, WizardStep::Rate);

        let draft = wizard.draft().await;
        assert_eq!(draft.rating, Some(5));
        assert_eq!(draft.content, "Still holds up");
    }

    #[tokio::test]
    async fn test_submit_success_resets_and_publishes() {
        let service = Arc::new(RecordingService::default());
        let bus = RefreshBus::new();
        let mut subscription = bus.subscribe();
        let wizard = wizard_at_review(service.clone(), bus.clone()).await;

        wizard.submit().await.unwrap();

        let created = service.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].media_item_id.as_deref(), Some("tmdb:603"));
        assert_eq!(created[0].rating, Some(5));

        assert_eq!(wizard.step().await, WizardStep::SelectMedia);
        assert_eq!(wizard.draft().await, PostDraft::default());
        assert_eq!(subscription.drain(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_draft() {
        let service = Arc::new(RecordingService::default());
        *service.reject_with.lock().unwrap() = Some("posts.media_item_id".to_string());
        let bus = RefreshBus::new();
        let mut subscription = bus.subscribe();
        let wizard = wizard_at_review(service.clone(), bus).await;

        let result = wizard.submit().await;
        assert!(matches!(result, Err(WizardError::Service(ApiError::ForeignKeyViolation(_)))));

        assert_eq!(wizard.step().await, WizardStep::Review);
        assert_eq!(wizard.draft().await.content, "Still holds up");
        assert!(wizard.last_error().await.is_some());
        assert_eq!(subscription.drain(), 0);
        assert!(!wizard.is_submitting());
    }

    #[tokio::test]
    async fn test_submit_before_review_is_rejected() {
        let service = Arc::new(RecordingService::default());
        let wizard = PostWizard::new(service.clone(), RefreshBus::new(), Uuid::new_v4());
        assert!(matches!(
            wizard.submit().await,
            Err(WizardError::NotReady(WizardStep::SelectMedia))
        ));
        assert!(service.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_double_submit_sends_one_request() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(RecordingService {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let wizard = Arc::new(wizard_at_review(service.clone(), RefreshBus::new()).await);

        let first = tokio::spawn({
            let wizard = wizard.clone();
            async move { wizard.submit().await }
        });
        while service.created.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(wizard.submit().await, Err(WizardError::SubmitInProgress)));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(service.created.lock().unwrap().len(), 1);
    }
}
