// End-to-end tests: the typed client against a real service on an ephemeral port.
// Each test gets its own in-memory database seeded with the demo catalogue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use uuid::Uuid;

use revue_client::{ApiClient, ApiError, FeedController, HomeScreen, PostWizard, RefreshBus};
use revue_server::{config::Auth, db::Database, router, state::AppState};
use revue_types::{
    CreateCommentParams, CreatePostParams, FeedCategory, FeedParams, MediaItem, Procedure, UserIdParams,
    Visibility,
};

/// Start a service and return its base URL
async fn spawn_service() -> Result<String> {
    let db = Database::in_memory()?;
    db.initialize()?;
    db.seed_demo_data()?;
    let app = router(AppState::new(db, Auth::local()));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

async fn signed_in_client(base_url: &str, username: &str) -> Result<(ApiClient, Uuid)> {
    let mut client = ApiClient::new(base_url, Auth::local().anon_key);
    let auth = client.sign_up(username, None).await?;
    Ok((client, auth.user.id))
}

fn post(user_id: Uuid, content: &str) -> CreatePostParams {
    CreatePostParams {
        user_id,
        content: content.to_string(),
        media_item_id: None,
        rating: None,
        contains_spoilers: false,
        visibility: Visibility::Public,
    }
}

#[tokio::test]
async fn test_created_post_leads_the_feed() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "ada_reviews").await?;

    client.create_post(&post(user_id, "older")).await?;
    let post_id = client
        .create_post(&CreatePostParams {
            media_item_id: Some("tmdb:603".to_string()),
            rating: Some(5),
            ..post(user_id, "Still holds up")
        })
        .await?;

    let feed = client
        .get_feed(FeedCategory::ForYou, FeedParams { limit: 1, offset: 0 })
        .await?;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.id, post_id);
    assert_eq!(feed[0].media_title.as_deref(), Some("The Matrix"));
    assert_eq!(feed[0].username.as_deref(), Some("ada_reviews"));
    Ok(())
}

#[tokio::test]
async fn test_double_like_restores_count() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "liker").await?;
    let post_id = client.create_post(&post(user_id, "like me")).await?;

    let before = client.get_post(post_id).await?.post.like_count;
    let liked = client.toggle_post_like(post_id).await?;
    assert!(liked.liked);
    assert_eq!(liked.like_count, before + 1);

    let unliked = client.toggle_post_like(post_id).await?;
    assert!(!unliked.liked);
    assert_eq!(unliked.like_count, before);
    assert_eq!(client.get_post(post_id).await?.post.like_count, before);
    Ok(())
}

#[tokio::test]
async fn test_comments_count_and_order() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "commenter").await?;
    let post_id = client.create_post(&post(user_id, "discuss")).await?;

    for text in ["first", "second", "third"] {
        client
            .create_comment(&CreateCommentParams {
                post_id,
                content: text.to_string(),
                parent_comment_id: None,
            })
            .await?;
    }

    assert_eq!(client.get_post(post_id).await?.post.comment_count, 3);

    let comments = client.get_post_comments(post_id, 20, 0).await?;
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert!(comments.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    assert!(client.get_post_comments(post_id, 20, 50).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_offset_past_end_is_empty() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "pager").await?;
    client.create_post(&post(user_id, "only one")).await?;

    let page = client
        .get_feed(FeedCategory::ForYou, FeedParams { limit: 20, offset: 100 })
        .await?;
    assert!(page.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_media_is_a_foreign_key_violation() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "dangling").await?;

    let result = client
        .create_post(&CreatePostParams {
            media_item_id: Some("tmdb:does-not-exist".to_string()),
            rating: Some(3),
            ..post(user_id, "ghost")
        })
        .await;
    assert!(matches!(result, Err(ApiError::ForeignKeyViolation(_))));
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_rating_is_rejected() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "rater").await?;

    let result = client
        .create_post(&CreatePostParams {
            media_item_id: Some("tmdb:603".to_string()),
            rating: Some(9),
            ..post(user_id, "eleven out of ten")
        })
        .await;
    assert!(matches!(result, Err(ApiError::Rejected(_))));
    Ok(())
}

struct NoSuchProcedure;

impl Procedure for NoSuchProcedure {
    const NAME: &'static str = "toggle_like";
    type Params = UserIdParams;
    type Output = serde_json::Value;
}

#[tokio::test]
async fn test_unknown_procedure_and_missing_session() -> Result<()> {
    let base_url = spawn_service().await?;
    let anonymous = ApiClient::new(&base_url, Auth::local().anon_key);

    let result = anonymous
        .rpc::<NoSuchProcedure>(&UserIdParams { user_id: Uuid::new_v4() })
        .await;
    assert!(matches!(result, Err(ApiError::MissingProcedure(_))));

    let result = anonymous.toggle_post_like(Uuid::new_v4()).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));

    let wrong_key = ApiClient::new(&base_url, "not-a-key");
    let result = wrong_key.get_feed(FeedCategory::ForYou, FeedParams::default()).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn test_wizard_submission_refreshes_home_once() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "composer").await?;
    let service = Arc::new(client);
    let bus = RefreshBus::new();

    let mut home = HomeScreen::new(FeedController::new(service.clone()), bus.clone())
        .with_debounce(Duration::from_millis(10));
    home.mount().await;
    assert!(home.feed().state(FeedCategory::ForYou).await.items.is_empty());

    let wizard = PostWizard::new(service.clone(), bus.clone(), user_id);
    let matrix = service
        .search_media_items("tmdb:603", 5)
        .await?
        .into_iter()
        .find(|m| m.id == "tmdb:603");
    assert!(matches!(matrix, Some(MediaItem { .. })));

    wizard.select_media(matrix).await;
    wizard.next().await?;
    wizard.set_rating(4).await;
    wizard.next().await?;
    wizard.set_content("Rewatched it, still great").await;
    wizard.next().await?;
    let post_id = wizard.submit().await?;

    assert!(home.on_focus().await);
    let state = home.feed().state(FeedCategory::ForYou).await;
    assert_eq!(state.items.first().map(|i| i.post_id), Some(post_id));
    assert_eq!(state.items[0].rating, Some(4));

    // Nothing new since the last focus
    assert!(!home.on_focus().await);
    Ok(())
}

#[tokio::test]
async fn test_unmounted_home_ignores_events() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "away").await?;
    let service = Arc::new(client);
    let bus = RefreshBus::new();

    let mut home = HomeScreen::new(FeedController::new(service.clone()), bus.clone());
    home.mount().await;
    home.unmount().await;
    assert_eq!(bus.subscriber_count(), 0);

    let wizard = PostWizard::new(service, bus, user_id);
    wizard.next().await?;
    wizard.set_content("posted while away").await;
    wizard.next().await?;
    wizard.submit().await?;

    assert!(!home.on_focus().await);
    Ok(())
}

#[tokio::test]
async fn test_comment_from_feed_reaches_home() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "replier").await?;
    let post_id = client.create_post(&post(user_id, "thoughts?")).await?;
    let service = Arc::new(client);
    let bus = RefreshBus::new();

    let mut home = HomeScreen::new(FeedController::new(service.clone()), bus.clone())
        .with_debounce(Duration::from_millis(10));
    home.mount().await;

    let thread = FeedController::new(service.clone()).with_bus(bus.clone());
    thread.refresh(FeedCategory::ForYou).await;
    thread
        .add_comment(CreateCommentParams {
            post_id,
            content: "agreed".to_string(),
            parent_comment_id: None,
        })
        .await?;
    assert_eq!(thread.state(FeedCategory::ForYou).await.items[0].comment_count, 1);

    assert!(home.on_focus().await);
    let state = home.feed().state(FeedCategory::ForYou).await;
    assert_eq!(state.items[0].post_id, post_id);
    assert_eq!(state.items[0].comment_count, 1);

    let comments = thread.comments(post_id, FeedParams { limit: 20, offset: 0 }).await?;
    assert_eq!(comments.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rating_without_media_is_rejected() -> Result<()> {
    let base_url = spawn_service().await?;
    let (client, user_id) = signed_in_client(&base_url, "unmoored").await?;

    let result = client
        .create_post(&CreatePostParams {
            rating: Some(4),
            ..post(user_id, "four stars for what?")
        })
        .await;
    assert!(matches!(result, Err(ApiError::Rejected(_))));
    Ok(())
}
