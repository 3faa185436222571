// Client side of revue: typed service wrapper, feed assembly, composer and refresh events
pub mod api;
pub mod composer;
pub mod config;
pub mod feed;
pub mod logging;
pub mod refresh;
pub mod service;

pub use api::{ApiClient, ApiError, ApiResult};
pub use composer::{PostDraft, PostWizard, WizardError, WizardStep};
pub use feed::{FeedController, FeedItem, FeedState, FeedStatus, FetchOutcome};
pub use refresh::{HomeScreen, RefreshBus, RefreshEvent};
pub use service::ReviewService;
