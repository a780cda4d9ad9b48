//! School dashboard entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Open the database and create the schema
//! 3. Seed the administrator account
//! 4. Connect to Redis if configured (auth rate limiting)
//! 5. Build the router and start the cleanup job
//! 6. Start Axum server
//!
//! Also supports a `hash-password` subcommand that prints the PHC string to
//! put in `ADMIN_PASSWORD_HASH`.

use school_dashboard::{
    auth::{middleware::AppState, password},
    cleanup,
    config::Config,
    routes,
    storage::{self, blob},
};
use std::net::SocketAddr;
use std::time::Duration;
use zeroize::Zeroize;

fn print_hash_usage() {
    eprintln!("Usage: school-dashboard hash-password <password>");
    eprintln!();
    eprintln!("Print the Argon2id hash of a password for ADMIN_PASSWORD_HASH.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  school-dashboard hash-password master2025");
}

#[tokio::main]
async fn main() {
    let mut args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "hash-password" {
        if args.len() != 3 {
            print_hash_usage();
            std::process::exit(1);
        }

        let result = password::hash(&args[2]);
        args[2].zeroize();
        match result {
            Ok(hash) => println!("{}", hash),
            Err(e) => {
                eprintln!("Error hashing password: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting school dashboard on {}", config.bind_addr);

    let db = storage::connect(&config.database_url)
        .await
        .expect("Failed to open database");
    storage::init_schema(&db)
        .await
        .expect("Failed to create database schema");

    let seeded = storage::account::seed_admin(
        &db,
        &config.admin_email,
        &config.admin_password_hash,
        &config.admin_name,
        &config.admin_surname,
    )
    .await
    .expect("Failed to seed admin account");
    if seeded {
        tracing::info!(email = %config.admin_email, "Admin account created");
    } else {
        tracing::info!(email = %config.admin_email, "Admin account already present");
    }

    blob::init_storage(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");

    // Redis is optional and only backs the auth rate limiter
    let redis = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).expect("Invalid Redis URL");
            client
                .get_multiplexed_async_connection()
                .await
                .expect("Failed to connect to Redis");
            tracing::info!("Auth rate limiting enabled");
            Some(client)
        }
        None => {
            tracing::warn!("REDIS_URL not set, auth rate limiting disabled");
            None
        }
    };

    let bind_addr = config.bind_addr;
    let cleanup_interval = Duration::from_secs(config.cleanup_interval_secs);
    let upload_dir = config.upload_dir.clone();

    let state = AppState::new(db.clone(), redis, config);
    let app = routes::app(state);

    tokio::spawn(async move {
        cleanup::run_cleanup_loop(db, &upload_dir, cleanup_interval).await;
    });

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
