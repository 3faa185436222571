use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use revue_server::db::repositories::PostRepository;
use revue_server::db::{Database, Migrator};
use rusqlite::Connection;
use uuid::Uuid;

/// revue database tool
///
/// Applies versioned schema migrations and checks that denormalized data
/// (post counters, media and author references) agrees with the source tables.
#[derive(Parser, Debug)]
#[command(name = "revue-migrate")]
#[command(about = "Migrate and check a revue database", long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "./revue.db")]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List applied and pending migrations
    Status,
    /// Apply pending migrations
    Up {
        /// Show what would run without changing the database
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Report integrity problems
    Check {
        /// Recompute drifted counters and clear dangling media references and their ratings
        #[arg(long)]
        repair: bool,
    },
}

/// A post whose cached counter disagrees with the source rows
#[derive(Debug, Clone, PartialEq, Eq)]
struct CounterDrift {
    post_id: Uuid,
    column: &'static str,
    stored: i64,
    actual: i64,
}

/// Problems found by `check`
#[derive(Debug, Default)]
struct IntegrityReport {
    /// Posts referencing a media item that no longer exists
    missing_media: Vec<Uuid>,
    /// Posts whose author profile no longer exists
    missing_authors: Vec<Uuid>,
    /// Posts whose rated media item was deleted
    orphaned_ratings: Vec<Uuid>,
    counter_drift: Vec<CounterDrift>,
}

impl IntegrityReport {
    fn is_clean(&self) -> bool {
        self.missing_media.is_empty()
            && self.missing_authors.is_empty()
            && self.orphaned_ratings.is_empty()
            && self.counter_drift.is_empty()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RepairStats {
    counters_fixed: usize,
    media_references_cleared: usize,
    ratings_cleared: usize,
}

fn post_ids(conn: &Connection, sql: &str) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
    let ids = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            Uuid::parse_str(&id).map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
        })
        .context("Failed to execute query")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to collect post ids")?;
    Ok(ids)
}

fn counter_drift(conn: &Connection, column: &'static str, source: &str) -> Result<Vec<CounterDrift>> {
    let sql = format!(
        "SELECT p.id, p.{column}, (SELECT COUNT(*) FROM {source} s WHERE s.post_id = p.id) AS actual
         FROM posts p
         WHERE p.{column} <> actual
         ORDER BY p.created_at"
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare counter query")?;
    let drift = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            Ok((id, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(id, stored, actual)| {
            Ok(CounterDrift {
                post_id: Uuid::parse_str(&id).with_context(|| format!("Invalid post id {}", id))?,
                column,
                stored,
                actual,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(drift)
}

fn check(conn: &Connection) -> Result<IntegrityReport> {
    let missing_media = post_ids(
        conn,
        "SELECT id FROM posts
         WHERE media_item_id IS NOT NULL
           AND NOT EXISTS (SELECT 1 FROM media_items m WHERE m.id = posts.media_item_id)",
    )?;
    let missing_authors = post_ids(
        conn,
        "SELECT id FROM posts WHERE NOT EXISTS (SELECT 1 FROM profiles u WHERE u.id = posts.user_id)",
    )?;
    let orphaned_ratings = post_ids(
        conn,
        "SELECT id FROM posts WHERE rating IS NOT NULL AND media_item_id IS NULL",
    )?;

    let mut drift = counter_drift(conn, "like_count", "post_likes")?;
    drift.extend(counter_drift(conn, "comment_count", "comments")?);

    Ok(IntegrityReport {
        missing_media,
        missing_authors,
        orphaned_ratings,
        counter_drift: drift,
    })
}

/// Fix what can be fixed without losing post content, in one transaction.
/// A rating never outlives its media item. Missing authors are left for an operator.
fn repair(conn: &mut Connection, report: &IntegrityReport) -> Result<RepairStats> {
    let tx = conn.transaction()?;
    let mut stats = RepairStats::default();

    for post_id in &report.missing_media {
        stats.media_references_cleared += tx.execute(
            "UPDATE posts SET media_item_id = NULL, rating = NULL WHERE id = ?",
            [post_id.to_string()],
        )?;
    }

    for post_id in &report.orphaned_ratings {
        stats.ratings_cleared += tx.execute(
            "UPDATE posts SET rating = NULL WHERE id = ?",
            [post_id.to_string()],
        )?;
    }

    for drift in &report.counter_drift {
        match drift.column {
            "like_count" => PostRepository::recount_likes_with(&tx, &drift.post_id)?,
            _ => PostRepository::recount_comments_with(&tx, &drift.post_id)?,
        };
        stats.counters_fixed += 1;
    }

    tx.commit().context("Failed to commit repairs")?;
    Ok(stats)
}

fn display_report(report: &IntegrityReport) {
    println!();
    println!("Integrity Report");
    println!("================");
    println!();
    println!("Posts with missing media: {}", report.missing_media.len());
    for id in &report.missing_media {
        println!("  {}", id);
    }
    println!("Posts with missing authors: {}", report.missing_authors.len());
    for id in &report.missing_authors {
        println!("  {}", id);
    }
    println!("Ratings without media: {}", report.orphaned_ratings.len());
    for id in &report.orphaned_ratings {
        println!("  {}", id);
    }
    println!("Counter drift: {}", report.counter_drift.len());
    for drift in &report.counter_drift {
        println!(
            "  {} {}: stored {}, actual {}",
            drift.post_id, drift.column, drift.stored, drift.actual
        );
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{} (y/N): ", prompt);
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("revue database tool");
    println!("===================");
    println!();
    println!("Database: {}", args.database);

    let db = Database::new(&args.database).context("Failed to open database connection")?;
    let mut conn = db.connection()?;
    let migrator = Migrator::new();

    match args.command {
        Command::Status => {
            for applied in migrator.applied(&conn)? {
                println!("  applied  {:>3}  {}  ({})", applied.version, applied.name, applied.applied_at);
            }
            for pending in migrator.pending(&conn)? {
                println!("  pending  {:>3}  {}", pending.version, pending.name);
            }
        }
        Command::Up { dry_run, yes } => {
            let pending = migrator.pending(&conn)?;
            if pending.is_empty() {
                println!("Schema is up to date - nothing to migrate.");
                return Ok(());
            }

            for migration in &pending {
                println!("  {:>3}  {}", migration.version, migration.name);
            }
            if dry_run {
                println!("This was a dry run - no changes were made to the database.");
                return Ok(());
            }
            if !yes && !confirm(&format!("Apply {} migrations?", pending.len()))? {
                println!("Migration cancelled.");
                return Ok(());
            }

            let applied = migrator.run(&mut conn)?;
            println!("Applied {} migrations.", applied.len());
        }
        Command::Check { repair: do_repair } => {
            let report = check(&conn)?;
            display_report(&report);

            if report.is_clean() {
                println!();
                println!("No problems found.");
            } else if do_repair {
                let stats = repair(&mut conn, &report)?;
                println!();
                println!("Counters recomputed: {}", stats.counters_fixed);
                println!("Media references cleared: {}", stats.media_references_cleared);
                println!("Ratings cleared: {}", stats.ratings_cleared);
            }
        }
    }

    Ok(())
}
