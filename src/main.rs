// Maintenance entry point for the comment engine.
//
// The HTTP layer normally drives this crate; this binary wires the same
// composition root (cipher key bootstrap, SQLite-backed document store,
// repository, moderation workflow) behind a small argv surface so comments
// can be inspected and moderated without the web stack.
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Dispatch one command against the engine

use std::sync::Arc;

use weather_comments::core::comments::{Actor, CommentRepository, NewComment, Role};
use weather_comments::core::crypto::FieldCipher;
use weather_comments::core::keys::ResolveHints;
use weather_comments::core::moderation::{ModerationDecision, ModerationWorkflow};
use weather_comments::core::store::DocumentStore;
use weather_comments::infra::crypto::load_or_generate_key;
use weather_comments::infra::store::SqliteDocumentStore;

const USAGE: &str = "\
Usage:
  add <actor-id> <role> <location-id> <content...>   create a comment
  list <location-id> [role]                          comments for a location
  pending                                            the moderation queue
  moderate <actor-id> <role> <comment-id> <status>   approve or reject (status: approved|rejected)
  delete <actor-id> <role> <comment-id>              delete a comment
";

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Keep runtime state in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    // The engine must never run without a consistent cipher key - bail out
    // of startup entirely if one cannot be established.
    let cipher_key = load_or_generate_key(
        "COMMENTS_ENCRYPTION_KEY",
        format!("{data_dir}/encryption-key.txt"),
    )
    .await
    .expect("Failed to establish encryption key");

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{data_dir}/comments.db?mode=rwc"))
        .await
        .expect("Failed to connect to comments DB");
    let store = SqliteDocumentStore::new(pool);
    store.migrate().await.expect("Failed to migrate comments DB");
    let store = Arc::new(store);

    let repository = Arc::new(CommentRepository::new(
        Arc::clone(&store),
        FieldCipher::new(&cipher_key),
    ));
    let workflow = ModerationWorkflow::new(Arc::clone(&repository));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run_command(&repository, &workflow, &args).await {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

async fn run_command<S: DocumentStore>(
    repository: &CommentRepository<S>,
    workflow: &ModerationWorkflow<S>,
    args: &[String],
) -> anyhow::Result<String> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["add", actor_id, role, location_id, content @ ..] if !content.is_empty() => {
            let actor = Actor::new(*actor_id, Role::parse_or_default(role));
            let comment = repository
                .create(
                    &actor,
                    actor_id,
                    NewComment {
                        content: content.join(" "),
                        location_id: location_id.to_string(),
                        location_name: None,
                    },
                )
                .await?;
            Ok(serde_json::to_string_pretty(&comment)?)
        }
        ["list", location_id, rest @ ..] => {
            let role = Role::parse_or_default(rest.first().copied().unwrap_or("user"));
            let comments = repository.list_for_location(location_id, role).await?;
            Ok(serde_json::to_string_pretty(&comments)?)
        }
        ["pending"] => {
            let queue = repository.list_pending().await?;
            Ok(serde_json::to_string_pretty(&queue)?)
        }
        ["moderate", moderator_id, role, comment_id, status] => {
            let decision = ModerationDecision::parse(status)?;
            let moderator = Actor::new(*moderator_id, Role::parse_or_default(role));
            let comment = workflow
                .moderate(&moderator, comment_id, ResolveHints::none(), decision)
                .await?;
            Ok(serde_json::to_string_pretty(&comment)?)
        }
        ["delete", actor_id, role, comment_id] => {
            let actor = Actor::new(*actor_id, Role::parse_or_default(role));
            repository
                .delete(comment_id, ResolveHints::none(), &actor)
                .await?;
            Ok("Comment deleted successfully".to_string())
        }
        _ => Ok(USAGE.to_string()),
    }
}
