use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Kind of work a media item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Book,
    Game,
    Music,
    Podcast,
}

impl MediaType {
    pub const ALL: [MediaType; 6] = [
        MediaType::Movie,
        MediaType::Tv,
        MediaType::Book,
        MediaType::Game,
        MediaType::Music,
        MediaType::Podcast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Book => "book",
            MediaType::Game => "game",
            MediaType::Music => "music",
            MediaType::Podcast => "podcast",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "movie" | "film" => Some(MediaType::Movie),
            "tv" | "show" => Some(MediaType::Tv),
            "book" => Some(MediaType::Book),
            "game" => Some(MediaType::Game),
            "music" | "album" => Some(MediaType::Music),
            "podcast" => Some(MediaType::Podcast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Reply,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Reply => "reply",
            NotificationKind::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "reply" => Some(NotificationKind::Reply),
            "follow" => Some(NotificationKind::Follow),
            _ => None,
        }
    }
}

/// Audience a feed tab is assembled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedCategory {
    #[default]
    ForYou,
    Following,
}

impl FeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedCategory::ForYou => "for_you",
            FeedCategory::Following => "following",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "for_you" | "foryou" => Some(FeedCategory::ForYou),
            "following" => Some(FeedCategory::Following),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_wire_format() {
        assert_eq!(serde_json::to_string(&Visibility::Private).unwrap(), "\"private\"");
        assert_eq!(Visibility::parse("PUBLIC"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("friends"), None);
    }

    #[test]
    fn test_media_type_aliases() {
        assert_eq!(MediaType::parse("show"), Some(MediaType::Tv));
        assert_eq!(MediaType::parse("Film"), Some(MediaType::Movie));
        for media_type in MediaType::ALL {
            assert_eq!(MediaType::parse(media_type.as_str()), Some(media_type));
        }
    }

    #[test]
    fn test_feed_category_parse() {
        assert_eq!(FeedCategory::parse("for-you"), Some(FeedCategory::ForYou));
        assert_eq!(FeedCategory::parse("following"), Some(FeedCategory::Following));
        assert_eq!(
            serde_json::to_string(&FeedCategory::ForYou).unwrap(),
            "\"for_you\""
        );
    }
}
