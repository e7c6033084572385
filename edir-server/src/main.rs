use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

mod assets;
mod db;
mod error;
mod extractors;
mod handlers;
mod payment;

pub use error::Error;
use extractors::{AppState, PgPool};

/// Multipart envelope headroom on top of the audio size limit; the real
/// limit is enforced per-file by the asset store.
const BODY_LIMIT: usize = assets::MAX_AUDIO_BYTES as usize + 64 * 1024;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Port to listen on
    #[structopt(short, long, default_value = "5000")]
    port: u16,

    /// Directory where uploaded feedback audio is stored
    #[structopt(long, default_value = "uploads/feedback")]
    upload_dir: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = sqlx::postgres::PgPoolOptions::new()
        .connect(&db_url)
        .await
        .with_context(|| format!("Error opening database {:?}", db_url))?;
    sqlx::migrate!()
        .run(&db)
        .await
        .context("running database migrations")?;

    let state = AppState {
        db: PgPool::new(db),
        assets: assets::AssetStore::new(opt.upload_dir),
        payments: payment::PaymentClient::from_env()?,
        reset_links: extractors::ResetLinkBase::from_env(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], opt.port));
    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await
        .context("serving axum webserver")
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/auth", post(handlers::auth))
        .route("/api/unauth", post(handlers::unauth))
        .route("/api/whoami", get(handlers::whoami))
        .route("/api/forgot-contact", post(handlers::forgot_contact))
        .route("/api/reset-contact", post(handlers::reset_contact))
        .route(
            "/api/members",
            get(handlers::fetch_members).post(handlers::register_member),
        )
        .route(
            "/api/members/:id",
            put(handlers::update_member).delete(handlers::delete_member),
        )
        .route(
            "/api/events",
            get(handlers::fetch_events).post(handlers::create_event),
        )
        .route(
            "/api/events/:id",
            put(handlers::update_event).delete(handlers::delete_event),
        )
        .route("/api/events/:id/attendance", put(handlers::toggle_attendance))
        .route(
            "/api/contributions",
            get(handlers::fetch_contributions).post(handlers::record_contribution),
        )
        .route("/api/payment/initialize", post(handlers::initialize_payment))
        .route("/api/verify-payment/:tx_ref", get(handlers::verify_payment))
        .route("/api/feedback", post(handlers::submit_feedback))
        .route("/api/feedback/:id", get(handlers::fetch_feedback))
        .route("/api/feedback/event/:event_id", get(handlers::feedback_for_event))
        .route("/api/feedback/audio/:filename", get(handlers::feedback_audio))
        .route("/api/feedback/:id/like", put(handlers::like_feedback))
        .route("/api/feedback/:id/dislike", put(handlers::dislike_feedback))
        .route("/api/feedback/:id/comment", put(handlers::comment_feedback))
        .route("/api/feedback/:id/verify", put(handlers::toggle_verification))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
