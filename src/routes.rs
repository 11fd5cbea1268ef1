// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, editor},
    state::AppState,
    utils::jwt::{auth_middleware, editor_middleware},
};

/// Assembles the main application router.
///
/// * Student attempt routes and editor routes, both behind token auth.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let attempt_routes = Router::new()
        .route(
            "/{id}/attempt",
            post(attempt::start_attempt).get(attempt::get_attempt),
        )
        .route("/{id}/attempt/submit", post(attempt::submit_attempt))
        .route("/{id}/attempt/review", get(attempt::review_attempt))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let editor_routes = Router::new()
        .route("/quizzes", post(editor::create_quiz))
        .route("/quizzes/{id}", get(editor::get_quiz))
        .route("/quizzes/{id}/questions", post(editor::add_question))
        .route(
            "/quizzes/{id}/questions/{index}",
            put(editor::update_question).delete(editor::delete_question),
        )
        .route(
            "/quizzes/{id}/questions-to-show",
            put(editor::set_questions_to_show),
        )
        // Auth first, then the editor role check
        .layer(middleware::from_fn(editor_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/quizzes", attempt_routes)
        .nest("/api/editor", editor_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config, quiz::selection::SelectionStrategy, store::MemoryStore,
        utils::jwt::sign_jwt,
    };

    fn app() -> Router {
        let config = Config {
            database_url: "memory".into(),
            jwt_secret: "router-secret".into(),
            rust_log: "error".into(),
            log_dir: "logs".into(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            selection_strategy: SelectionStrategy::Sequential,
        };
        create_router(AppState {
            store: Arc::new(MemoryStore::new()),
            config,
        })
    }

    fn get(uri: &str, token: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_attempt_routes_need_token() {
        let response = app()
            .oneshot(get("/api/quizzes/1/attempt", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_editor_routes_need_editor_role() {
        let token = sign_jwt(3, "student", "router-secret", 60).unwrap();
        let response = app()
            .oneshot(get("/api/editor/quizzes/1", Some(token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_quiz_is_not_found() {
        let token = sign_jwt(3, "editor", "router-secret", 60).unwrap();
        let response = app()
            .oneshot(get("/api/editor/quizzes/41", Some(token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
