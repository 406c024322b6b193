mod auth;
mod booking;
mod config;
mod error;
mod models;
mod routes;
mod store;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{extract::State, routing::get, Json, Router};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use config::Config;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use auth::jwt::TokenService;
use auth::middleware::AuthGate;
use auth::session::SessionManager;
use booking::BookingService;
use booking::invitations::InvitationService;
use models::user::{NewUser, UserRole};
use store::postgres::PgStore;
use store::redis_sessions::RedisSessionStore;
use store::{BookingStore, SessionStore, UserStore};

#[derive(Parser, Debug)]
#[command(name = "appointments-backend", about = "Appointment scheduling API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (the default)
    Serve,
    /// Create a user account; the password is prompted for
    CreateUser {
        username: String,
        name: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long, value_enum, default_value_t = UserRole::Member)]
        role: UserRole,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub gate: AuthGate,
    pub bookings: BookingService,
    pub invitations: InvitationService,
    pub users: Arc<dyn UserStore>,
    booking_store: Arc<dyn BookingStore>,
    session_store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(
        tokens: TokenService,
        users: Arc<dyn UserStore>,
        booking_store: Arc<dyn BookingStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(users.clone(), session_store.clone(), tokens.clone()),
            gate: AuthGate::new(tokens, session_store.clone()),
            bookings: BookingService::new(booking_store.clone(), users.clone()),
            invitations: InvitationService::new(booking_store.clone(), users.clone()),
            users,
            booking_store,
            session_store,
        }
    }
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db = state
        .booking_store
        .ping()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "database ping failed"))
        .is_ok();
    let sessions = state
        .session_store
        .ping()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "session store ping failed"))
        .is_ok();

    let status = if db && sessions {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "db": db,
        "sessions": sessions,
    });
    (status, Json(body))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .merge(routes::api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::CreateUser {
            username,
            name,
            timezone,
            role,
        } => {
            if let Err(e) = create_user(&username, &name, &timezone, role).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn connect_db(url: &str) -> PgPool {
    let db = PgPool::connect(url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&db)
        .await
        .expect("failed to run migrations");

    db
}

async fn serve() {
    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::error!("invalid configuration: {e}");
        std::process::exit(1);
    });
    tracing::debug!(?config, "configuration loaded");

    let db = connect_db(&config.database_url).await;
    let redis = RedisSessionStore::connect(&config.redis_url)
        .await
        .expect("failed to connect to redis");

    let pg = Arc::new(PgStore::new(db));
    let state = AppState::new(
        TokenService::new(config.tokens.clone()),
        pg.clone(),
        pg,
        Arc::new(redis),
    );

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}

async fn create_user(
    username: &str,
    name: &str,
    timezone: &str,
    role: UserRole,
) -> Result<(), Box<dyn std::error::Error>> {
    let username = username.trim().to_lowercase();
    if username.is_empty() || name.trim().is_empty() {
        return Err("username and name must not be empty".into());
    }
    if timezone.parse::<Tz>().is_err() {
        return Err(format!("unknown timezone: {timezone}").into());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        return Err("password must not be empty".into());
    }
    if rpassword::prompt_password("Repeat password: ")? != password {
        return Err("passwords do not match".into());
    }

    let db = connect_db(&config::database_url_from_env()).await;
    let user = PgStore::new(db)
        .insert(&NewUser {
            name: name.trim().to_string(),
            username,
            role,
            password_hash: auth::password::hash_password(&password)?,
            timezone: timezone.to_string(),
        })
        .await?;

    tracing::info!(user_id = user.user_id, username = %user.username, "user created");
    Ok(())
}
