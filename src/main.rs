//! bookshelf-rs server entry point.

use bookshelf_rs::{
    auth::AuthService,
    config::{CatalogCommand, Cli, Command, Config, UserCommand},
    db::Database,
    library::import,
    server,
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Catalog { action }) => cmd_catalog(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: bookshelf-rs catalog import <books.json>");
    println!("And: bookshelf-rs user add <phone_number> --nickname <name>");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = AuthService::new(
        db,
        config.auth.session_days,
        config.auth.registration_enabled(),
    );

    match action {
        UserCommand::Add {
            phone_number,
            nickname,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let user = auth.create_user(&phone_number, &password, &nickname)?;
            println!("Created user: {} (id: {})", user.nickname, user.id);
        }

        UserCommand::Del { phone_number } => {
            if auth.delete_user(&phone_number)? {
                println!("Deleted user: {}", phone_number);
            } else {
                println!("User not found: {}", phone_number);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<8} {:<20} {:<14} {:<8} CREATED", "ID", "NICKNAME", "PHONE", "KAKAO");
                println!("{}", "-".repeat(72));
                for user in users {
                    let created = chrono::DateTime::from_timestamp(user.created_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{:<8} {:<20} {:<14} {:<8} {}",
                        user.id,
                        user.nickname,
                        user.phone_number.as_deref().unwrap_or("-"),
                        if user.kakao_id.is_some() { "yes" } else { "no" },
                        created
                    );
                }
            }
        }

        UserCommand::Passwd {
            phone_number,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.change_password(&phone_number, &password)? {
                println!("Password changed for: {}", phone_number);
            } else {
                println!("User not found: {}", phone_number);
            }
        }
    }

    Ok(())
}

/// Catalog management commands.
async fn cmd_catalog(action: CatalogCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        CatalogCommand::Category { name } => {
            let category = db.ensure_category(&name)?;
            println!("Category: {} (id: {})", category.name, category.id);
        }

        CatalogCommand::Import { path } => {
            if !path.is_file() {
                anyhow::bail!("Not a file: {}", path.display());
            }

            let count = import::import_file(&db, &path)?;
            println!("Imported {} books from {}", count, path.display());
        }

        CatalogCommand::List => {
            let categories = db.list_categories()?;
            let books = db.list_books()?;

            if categories.is_empty() && books.is_empty() {
                println!("Catalog is empty.");
                return Ok(());
            }

            for category in &categories {
                println!("[{}] {}", category.id, category.name);
            }
            if !categories.is_empty() {
                println!();
            }

            println!("{:<6} {:<40} {:<20} {:<12} CATEGORY", "ID", "TITLE", "AUTHOR", "PUBLISHED");
            println!("{}", "-".repeat(90));
            for book in books {
                let category = book
                    .category_id
                    .and_then(|id| categories.iter().find(|c| c.id == id))
                    .map(|c| c.name.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<6} {:<40} {:<20} {:<12} {}",
                    book.id, book.title, book.author, book.publication_date, category
                );
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshelf_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::open(&config.database.path)?;

    let expired = db.cleanup_expired_sessions()?;
    if expired > 0 {
        tracing::info!(expired, "Removed expired sessions");
    }

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        registration = %config.auth.registration,
        "Starting bookshelf-rs server"
    );

    let bind = config.server.bind;
    let state = server::AppState::new_with_db(&config, db);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
