use revue_types::{MediaItem, SearchMediaParams};

use super::{page_limit, ApiResult};
use crate::db::repositories::MediaRepository;
use crate::state::AppState;

/// `search_media_items`: a blank query matches nothing
pub fn search_media_items(state: &AppState, params: SearchMediaParams) -> ApiResult<Vec<MediaItem>> {
    if params.query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let repo = MediaRepository::new(state.db.pool.clone());
    Ok(repo.search(&params.query, page_limit(params.limit))?)
}
