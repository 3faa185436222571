pub mod auth;
pub mod caller;
pub mod comments;
pub mod error;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod rpc;

pub use caller::{Caller, Role};
pub use error::{ApiError, ApiResult};

use revue_types::MAX_PAGE_SIZE;

/// Page sizes above the service maximum are clamped rather than rejected
pub(crate) fn page_limit(limit: u32) -> u32 {
    limit.min(MAX_PAGE_SIZE)
}
