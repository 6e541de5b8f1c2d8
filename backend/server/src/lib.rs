//! Backend of a meal marketplace: users review meals that chefs post.
//!
//!
//!
//! # Access
//! - Users and chefs log in separately and receive a signed access token carrying their id and role
//! - The client sends it back as `x-access-token: Bearer <token>` (plain `Authorization` works too)
//! - Every protected endpoint names the exact role it needs, chefs are not users and users are not chefs
//! - The single page client asks `/api/views/authorize` before rendering a protected page and is
//!   redirected to the sign up form when denied
//!
//!
//!
//! # Reviews
//! - Only users write reviews, only the author may change or remove one
//! - Each meal carries a running rating and review count, see [`reviews`] for how they stay exact
//! - Review row and meal aggregate are written in one SQLite transaction, see [`database`]
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Success |
//! | --- | --- | --- |
//! | POST | `/api/users/login` | 200 `{ token }` |
//! | POST | `/api/chefs/login` | 200 `{ token }` |
//! | POST | `/api/users/meals/reviews` | 201 review |
//! | PUT | `/api/users/meals/reviews/{id}` | 200 `{ review: { ..., meal } }` |
//! | DELETE | `/api/users/meals/reviews/{id}` | 204 |
//! | GET | `/api/users/{id}/meals/reviews` | 200 reviews ordered by id |
//! | GET | `/api/meals/{id}` | 200 meal |
//! | GET | `/api/meals/{id}/reviews` | 200 reviews ordered by id |
//! | GET | `/api/views/authorize?path=` | 200 render or redirect |
//!
//! Missing, bad or expired tokens answer 401, a wrong role or a foreign review 403, invalid
//! payloads 400.
//!
//!
//!
//! # Setup
//!
//! Environment, all optional except the secret.
//! ```sh
//! RUST_PORT=1111
//! DATABASE_PATH=meals.db
//! TOKEN_TTL_SECS=86400
//! DB_BUSY_TIMEOUT_MS=5000
//! RUST_LOG=info
//! ```
//!
//! The signing secret is read from `/run/secrets/JWT_SECRET`, or the `JWT_SECRET` variable.
//!
//! Seed accounts and meals.
//! ```sh
//! cargo run -p seed -- fixtures.json --database meals.db
//! ```
//!
//! Mint a token by hand.
//! ```sh
//! cargo run -p tester -- --id 1 --role user
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod guard;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod token;
pub mod utils;

use config::Config;
use guard::ACCESS_TOKEN_HEADER;
use routes::{
    chef_login_handler, create_review_handler, delete_review_handler, health_handler,
    meal_handler, meal_reviews_handler, update_review_handler, user_login_handler,
    user_reviews_handler, view_handler,
};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(ACCESS_TOKEN_HEADER),
            AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/users/login", post(user_login_handler))
        .route("/api/chefs/login", post(chef_login_handler))
        .route("/api/users/meals/reviews", post(create_review_handler))
        .route(
            "/api/users/meals/reviews/{review_id}",
            put(update_review_handler).delete(delete_review_handler),
        )
        .route("/api/users/{user_id}/meals/reviews", get(user_reviews_handler))
        .route("/api/meals/{meal_id}", get(meal_handler))
        .route("/api/meals/{meal_id}/reviews", get(meal_reviews_handler))
        .route("/api/views/authorize", get(view_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new(Config::load())?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
