mod comment_repository;
mod follow_repository;
mod like_repository;
mod media_repository;
mod notification_repository;
mod post_repository;
mod preference_repository;
mod profile_repository;

pub use comment_repository::CommentRepository;
pub use follow_repository::FollowRepository;
pub use like_repository::LikeRepository;
pub use media_repository::MediaRepository;
pub use notification_repository::{NewNotification, NotificationRepository};
pub use post_repository::{NewPost, PostRepository};
pub use preference_repository::PreferenceRepository;
pub use profile_repository::ProfileRepository;
