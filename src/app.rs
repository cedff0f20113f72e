use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/posts", post(handlers::submit_post))
        .route("/posts/:id/delete", post(handlers::submit_delete))
        .route("/status/adjust", post(handlers::submit_adjust))
        .route("/api/analyze", post(handlers::analyze))
        .route(
            "/api/users/:user_id/status",
            get(handlers::get_status)
                .put(handlers::set_status)
                .post(handlers::add_status),
        )
        .route("/api/users/:user_id/status/reset", post(handlers::reset_status))
        .route("/api/users/:user_id/stats/:stat", post(handlers::adjust_stat))
        .route(
            "/api/users/:user_id/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route(
            "/api/users/:user_id/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/users/:user_id/posts/:id",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/api/users/:user_id/posts/:id/comment", post(handlers::comment_post))
        .route("/api/users/:user_id/calendar/:month", get(handlers::get_calendar))
        .route("/api/users/:user_id/trends", get(handlers::get_trends))
        .with_state(state)
}
