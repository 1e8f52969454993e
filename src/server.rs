//! HTTP server and routes.

mod extract;
mod handlers;
mod state;

pub use extract::{AuthUser, JsonBody, PathParam, QueryParams, authorization_token};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let book_routes = Router::new()
        .route("/search", get(handlers::search_books))
        .route("/recent", get(handlers::recent_books))
        .route("/upcoming", get(handlers::upcoming_books))
        .route("/landing", get(handlers::landing_books))
        .route("/best", get(handlers::best_sellers))
        .route("/reviews/like", patch(handlers::toggle_like))
        .route("/{id}", get(handlers::book_detail))
        .route("/{id}/statistics", get(handlers::book_statistics))
        .route("/{id}/progress", post(handlers::record_progress))
        .route(
            "/{id}/reviews",
            get(handlers::list_reviews)
                .post(handlers::create_review)
                .delete(handlers::delete_review),
        );

    let library_routes = Router::new()
        .route("/", get(handlers::library_info))
        .route(
            "/books",
            get(handlers::library_books).post(handlers::add_to_library),
        )
        .route("/statistics", get(handlers::library_statistics));

    let user_routes = Router::new()
        .route("/sign_up", post(handlers::sign_up))
        .route("/sign_in", post(handlers::sign_in))
        .route("/kakao_sign_in", post(handlers::kakao_sign_in))
        .route("/sign_out", post(handlers::sign_out))
        .route(
            "/sms",
            get(handlers::check_sms).post(handlers::request_sms),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/books", book_routes)
        .nest("/library", library_routes)
        .nest("/users", user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
