/// Demo profiles and media catalogue for local development.
/// Uses `INSERT OR IGNORE` so it can run on every startup.
pub const DEMO_DATA: &str = r#"
INSERT OR IGNORE INTO profiles (id, username, display_name, avatar_url, onboarding_completed, contacts_synced, created_at) VALUES
    ('5a1f0b3c-0000-4000-8000-000000000001', 'ada', 'Ada', NULL, 1, 0, '2024-01-01T00:00:00.000000Z'),
    ('5a1f0b3c-0000-4000-8000-000000000002', 'grace', 'Grace H.', NULL, 1, 1, '2024-01-01T00:00:00.000000Z'),
    ('5a1f0b3c-0000-4000-8000-000000000003', 'linus', NULL, NULL, 0, 0, '2024-01-01T00:00:00.000000Z');

INSERT OR IGNORE INTO media_items (id, title, media_type, cover_url, release_year) VALUES
    ('tmdb:603', 'The Matrix', 'movie', 'https://image.tmdb.org/t/p/w500/matrix.jpg', 1999),
    ('tmdb:27205', 'Inception', 'movie', 'https://image.tmdb.org/t/p/w500/inception.jpg', 2010),
    ('tmdb-tv:95396', 'Severance', 'tv', 'https://image.tmdb.org/t/p/w500/severance.jpg', 2022),
    ('isbn:9780441172719', 'Dune', 'book', NULL, 1965),
    ('igdb:1942', 'The Witcher 3: Wild Hunt', 'game', NULL, 2015),
    ('mb:a1b2c3', 'In Rainbows', 'music', NULL, 2007);
"#;
