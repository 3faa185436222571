use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use revue_client::config::{ClientSettings, ConfigManager, SessionData};
use revue_client::feed::{FeedController, FeedItem, FeedStatus};
use revue_client::logging::{init_logging, LogConfig};
use revue_client::{log_debug, ApiClient, PostWizard, RefreshBus, WizardStep};
use revue_types::{
    CompleteOnboardingParams, CreateCommentParams, FeedCategory, FeedParams, GetNotificationsParams, MediaType,
    Visibility,
};

/// revue - share what you watched, read and played
#[derive(Parser)]
#[command(name = "revue")]
#[command(about = "Command line client for the revue review service")]
#[command(version)]
struct Cli {
    /// Service URL to connect to
    #[arg(long, short)]
    server: Option<String>,

    /// Write a debug log to revue_debug.log
    #[arg(long, short)]
    verbose: bool,

    /// Present REVUE_SERVICE_ROLE_KEY instead of the anon key
    #[arg(long)]
    service_role: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Signup {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Sign in to an existing account
    Login { username: String },
    /// Revoke the stored session
    Logout,
    /// Show a feed tab
    Feed {
        /// for_you or following
        #[arg(long, default_value = "for_you")]
        category: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Load this many extra pages after the first
        #[arg(long, default_value_t = 0)]
        pages: u32,
    },
    /// Write a post, optionally reviewing a media item
    Post {
        content: String,
        /// Media item to review, e.g. tmdb:603
        #[arg(long)]
        media: Option<String>,
        /// 1 to 5, required with --media
        #[arg(long)]
        rating: Option<i32>,
        #[arg(long)]
        spoilers: bool,
        /// public or private
        #[arg(long, default_value = "public")]
        visibility: String,
    },
    /// Like a post, or remove the like
    Like { post_id: Uuid },
    /// Comment on a post
    Comment {
        post_id: Uuid,
        content: String,
        #[arg(long)]
        reply_to: Option<Uuid>,
    },
    /// List comments on a post, oldest first
    Comments {
        post_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// List your notifications
    Notifications {
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Mark a notification as read
    ReadNotification { notification_id: Uuid },
    /// Show or replace your media type preferences
    Preferences {
        /// movie, tv, book, game, music or podcast
        #[arg(long, value_delimiter = ',')]
        set: Option<Vec<String>>,
    },
    /// Search the media catalogue
    MediaSearch {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Follow a user, or unfollow
    Follow { user_id: Uuid },
    /// Finish onboarding with a display name
    Onboard {
        display_name: String,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::disabled()
    };
    init_logging(&log_config)?;

    let settings = ClientSettings::from_env(cli.server.clone());
    let config_manager = ConfigManager::new()?;
    let mut client = ApiClient::new(&settings.service_url, settings.api_key(cli.service_role)?)
        .with_log_config(log_config.clone());
    let session = config_manager.load_session()?;
    if let Some(session) = &session {
        log_debug!(log_config, "Using stored session for {}", session.username);
        client.set_access_token(Some(session.access_token.clone()));
    }
    log_debug!(
        log_config,
        "Connecting to {} (service role: {})",
        settings.service_url,
        cli.service_role
    );
    let bus = RefreshBus::with_log_config(log_config.clone());

    match cli.command {
        Command::Signup { username, display_name } => {
            let auth = client.sign_up(&username, display_name.as_deref()).await?;
            store_session(&config_manager, &auth)?;
            println!("Signed up as {} ({})", auth.user.username, auth.user.id);
        }
        Command::Login { username } => {
            let auth = client.sign_in(&username).await?;
            store_session(&config_manager, &auth)?;
            println!("Signed in as {}", auth.user.username);
        }
        Command::Logout => {
            if let Err(e) = client.sign_out().await {
                // The local session goes away even if the service already forgot it
                log::warn!("Sign out failed: {}", e);
            }
            config_manager.delete_session()?;
            println!("Signed out");
        }
        Command::Feed { category, limit, pages } => {
            let category =
                FeedCategory::parse(&category).with_context(|| format!("Unknown feed category: {}", category))?;
            let feed = FeedController::new(Arc::new(client))
                .with_page_size(limit)
                .with_log_config(log_config);
            feed.refresh(category).await;
            for _ in 0..pages {
                feed.load_more(category).await;
            }

            let state = feed.state(category).await;
            match &state.status {
                FeedStatus::Failed { message, .. } => bail!("Could not load feed: {}", message),
                FeedStatus::Empty => println!("Nothing here yet"),
                _ => state.items.iter().for_each(print_feed_item),
            }
        }
        Command::Post {
            content,
            media,
            rating,
            spoilers,
            visibility,
        } => {
            let session = require_session(&session)?;
            let visibility =
                Visibility::parse(&visibility).with_context(|| format!("Unknown visibility: {}", visibility))?;
            let media = match media {
                Some(id) => Some(find_media(&client, &id).await?),
                None => None,
            };

            let wizard = PostWizard::new(Arc::new(client), bus, session.user_id)
                .with_log_config(log_config);
            let has_media = media.is_some();
            wizard.select_media(media).await;
            wizard.next().await?;
            if has_media {
                if let Some(rating) = rating {
                    wizard.set_rating(rating).await;
                }
                wizard.next().await?;
            }
            wizard.set_content(content).await;
            wizard.set_spoilers(spoilers).await;
            wizard.set_visibility(visibility).await;
            if wizard.next().await? != WizardStep::Review {
                bail!("Post is not ready to submit");
            }

            let post_id = wizard.submit().await?;
            println!("Posted {}", post_id);
        }
        Command::Like { post_id } => {
            let feed = FeedController::new(Arc::new(client)).with_log_config(log_config);
            let state = feed.toggle_like(post_id).await?;
            let verb = if state.liked { "Liked" } else { "Unliked" };
            println!("{} ({} likes)", verb, state.like_count);
        }
        Command::Comment {
            post_id,
            content,
            reply_to,
        } => {
            let feed = FeedController::new(Arc::new(client))
                .with_log_config(log_config)
                .with_bus(bus);
            let comment = feed
                .add_comment(CreateCommentParams {
                    post_id,
                    content,
                    parent_comment_id: reply_to,
                })
                .await?;
            println!("Commented {}", comment.id);
        }
        Command::Comments { post_id, limit, offset } => {
            let feed = FeedController::new(Arc::new(client)).with_log_config(log_config);
            for comment in feed.comments(post_id, FeedParams { limit, offset }).await? {
                let author = comment
                    .author_display_name
                    .or(comment.author_username)
                    .unwrap_or_else(|| "unknown".to_string());
                println!("[{}] {}: {}", comment.created_at.format("%Y-%m-%d %H:%M"), author, comment.content);
            }
        }
        Command::Notifications { unread, limit } => {
            let session = require_session(&session)?;
            let notifications = client
                .get_user_notifications(&GetNotificationsParams {
                    user_id: session.user_id,
                    limit,
                    offset: 0,
                    unread_only: unread,
                })
                .await?;
            for n in notifications {
                let marker = if n.is_read { " " } else { "*" };
                let actor = n.actor_username.as_deref().unwrap_or("someone");
                println!("{} {} {} {}", marker, n.id, actor, n.kind.as_str());
            }
        }
        Command::ReadNotification { notification_id } => {
            client.mark_notification_read(notification_id).await?;
            println!("Marked as read");
        }
        Command::Preferences { set } => {
            let session = require_session(&session)?;
            let preferences = match set {
                Some(names) => {
                    let media_types = names
                        .iter()
                        .map(|name| MediaType::parse(name).with_context(|| format!("Unknown media type: {}", name)))
                        .collect::<Result<Vec<_>>>()?;
                    client.set_user_media_preferences(media_types).await?
                }
                None => client.get_user_media_preferences(session.user_id).await?,
            };
            let names: Vec<&str> = preferences.iter().map(|p| p.media_type.as_str()).collect();
            println!("{}", names.join(", "));
        }
        Command::MediaSearch { query, limit } => {
            for item in client.search_media_items(&query, limit).await? {
                let year = item.release_year.map(|y| format!(" ({})", y)).unwrap_or_default();
                println!("{}  {}{} [{}]", item.id, item.title, year, item.media_type.as_str());
            }
        }
        Command::Follow { user_id } => {
            let state = client.toggle_follow(user_id).await?;
            let verb = if state.following { "Following" } else { "Unfollowed" };
            println!("{} ({} followers)", verb, state.follower_count);
        }
        Command::Onboard {
            display_name,
            avatar_url,
        } => {
            let profile = client
                .complete_onboarding(&CompleteOnboardingParams {
                    display_name,
                    avatar_url,
                    contacts_synced: false,
                })
                .await?;
            println!("Welcome, {}", profile.label());
        }
    }

    Ok(())
}

fn store_session(config_manager: &ConfigManager, auth: &revue_types::AuthResponse) -> Result<()> {
    config_manager.save_session(&SessionData {
        username: auth.user.username.clone(),
        user_id: auth.user.id,
        access_token: auth.access_token.clone(),
    })
}

fn require_session(session: &Option<SessionData>) -> Result<&SessionData> {
    session
        .as_ref()
        .context("Not signed in. Run `revue login <username>` first")
}

/// Resolve a media id through search; ids are matched exactly
async fn find_media(client: &ApiClient, id: &str) -> Result<revue_types::MediaItem> {
    let candidates = client.search_media_items(id, 20).await?;
    candidates
        .into_iter()
        .find(|item| item.id == id)
        .with_context(|| format!("No media item with id {}", id))
}

fn print_feed_item(item: &FeedItem) {
    let media = item
        .media
        .as_ref()
        .and_then(|m| m.title.as_deref())
        .map(|title| format!(" on {}", title))
        .unwrap_or_default();
    let rating = item.rating.map(|r| format!(" {}/5", r)).unwrap_or_default();
    let liked = if item.liked_by_me { "♥" } else { "♡" };

    println!("{}{}{}  ({})", item.author, media, rating, item.post_id);
    if item.contains_spoilers {
        println!("  [spoilers hidden]");
    } else {
        println!("  {}", item.content);
    }
    println!(
        "  {} {}  {} comments  {}",
        liked,
        item.like_count,
        item.comment_count,
        item.created_at.format("%Y-%m-%d %H:%M")
    );
}
