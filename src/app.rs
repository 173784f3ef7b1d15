use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::SessionRegistry;
use crate::config::AppConfig;
use crate::store::Store;
use crate::{routes_analytics, routes_auth, routes_tasks};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<AppConfig>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        // auth
        .route("/auth/register", post(routes_auth::register))
        .route("/auth/login", post(routes_auth::login))
        .route("/auth/logout", post(routes_auth::logout))
        .route("/auth/me", get(routes_auth::me))
        .route(
            "/auth/preferences",
            get(routes_auth::get_preferences).put(routes_auth::put_preferences),
        )
        // tasks
        .route("/tasks", get(routes_tasks::get_tasks).post(routes_tasks::create_task))
        .route("/tasks/shared", get(routes_tasks::get_shared_tasks))
        .route("/tasks/:id", put(routes_tasks::update_task).delete(routes_tasks::delete_task))
        // focus mode
        .route("/tasks/:id/focus/start", post(routes_tasks::start_focus))
        .route("/tasks/:id/focus/end", post(routes_tasks::end_focus))
        .route("/tasks/:id/focus/break", post(routes_tasks::record_break))
        // collaboration
        .route("/tasks/:id/share", post(routes_tasks::share_task))
        .route("/tasks/:id/assign", post(routes_tasks::assign_task))
        .route("/tasks/:id/comment", post(routes_tasks::add_comment))
        .route("/tasks/:id/complete", post(routes_tasks::complete_task))
        // analytics
        .route("/analytics", get(routes_analytics::get_analytics))
        .route("/suggestions", get(routes_analytics::get_suggestions));

    let mut app = Router::new().nest("/api", api);

    if state.config.static_dir.is_dir() {
        app = app.fallback_service(ServeDir::new(&state.config.static_dir));
    }

    if state.config.cors_allow_any {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("db.json"),
            static_dir: dir.path().join("no-static"),
            ..AppConfig::default()
        };
        let state = AppState {
            store: Arc::new(Store::open(&config.db_path, false).unwrap()),
            sessions: Arc::new(SessionRegistry::new(chrono::Duration::hours(1))),
            config: Arc::new(config),
        };
        (build_router(state), dir)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _dir) = test_app();
        let (status, body) = call(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn tasks_require_a_token() {
        let (app, _dir) = test_app();
        let (status, _) = call(&app, "GET", "/api/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/api/tasks", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (app, _dir) = test_app();
        register(&app, "a@b.com").await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "a@b.com", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User already exists");
    }

    #[tokio::test]
    async fn login_me_and_logout() {
        let (app, _dir) = test_app();
        register(&app, "ada@b.com").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@b.com", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user"].get("password_hash").is_none());
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "ada");

        let (status, _) = call(&app, "POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn full_task_flow() {
        let (app, _dir) = test_app();
        let owner = register(&app, "owner@b.com").await;
        let friend = register(&app, "friend@b.com").await;

        let (status, task) = call(
            &app,
            "POST",
            "/api/tasks",
            Some(&owner),
            Some(json!({ "title": "Ship it", "importance": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = task["id"].as_str().unwrap().to_string();

        // friend cannot comment before being shared
        let comment_uri = format!("/api/tasks/{id}/comment");
        let (status, _) = call(&app, "POST", &comment_uri, Some(&friend), Some(json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, shared) = call(
            &app,
            "POST",
            &format!("/api/tasks/{id}/share"),
            Some(&owner),
            Some(json!({ "email": "friend@b.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shared["shared"], true);

        let (status, commented) =
            call(&app, "POST", &comment_uri, Some(&friend), Some(json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(commented["comments"][0]["author"], "friend@b.com");

        let (_, list) = call(&app, "GET", "/api/tasks/shared", Some(&friend), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        // friend is not the owner
        let (status, _) = call(
            &app,
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&friend),
            Some(json!({ "title": "mine now" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // focus session
        let (status, _) = call(&app, "POST", &format!("/api/tasks/{id}/focus/break"), Some(&owner), Some(json!({
            "start_time": "2024-03-01T10:00:00Z",
            "end_time": "2024-03-01T10:05:00Z",
            "duration": 300
        }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        call(&app, "POST", &format!("/api/tasks/{id}/focus/start"), Some(&owner), None).await;
        let (status, ended) = call(
            &app,
            "POST",
            &format!("/api/tasks/{id}/focus/end"),
            Some(&owner),
            Some(json!({ "duration": 120 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ended["last_time_spent"], 120);
        assert_eq!(ended["focus_sessions"][0]["duration"], 120);

        let (status, done) = call(
            &app,
            "POST",
            &format!("/api/tasks/{id}/complete"),
            Some(&owner),
            Some(json!({ "time_spent": 600 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["completed"], true);
        assert_eq!(done["completion_records"].as_array().unwrap().len(), 1);

        let (status, summary) = call(&app, "GET", "/api/analytics", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["completion_rate"], 100);
        assert_eq!(summary["total_focus_time"], 240);
        assert_eq!(summary["tasks_by_priority"], json!([0, 0, 0, 1, 0]));

        let (status, _) = call(&app, "DELETE", &format!("/api/tasks/{id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = call(&app, "GET", "/api/tasks", Some(&owner), None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn suggestions_list_open_tasks() {
        let (app, _dir) = test_app();
        let token = register(&app, "s@b.com").await;
        for (title, importance) in [("low", 1), ("high", 5)] {
            call(
                &app,
                "POST",
                "/api/tasks",
                Some(&token),
                Some(json!({ "title": title, "importance": importance })),
            )
            .await;
        }

        let (status, body) = call(&app, "GET", "/api/suggestions", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prioritized_tasks"][0]["title"], "low");
        assert_eq!(body["time_blocks"][1]["suggested_minutes"], 125);
        assert!(body["daily_tip"].is_string());

        let (status, _) = call(&app, "GET", "/api/suggestions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn resharing_does_not_rewrite_the_database() {
        let (app, dir) = test_app();
        let owner = register(&app, "o@b.com").await;
        let (_, task) = call(&app, "POST", "/api/tasks", Some(&owner), Some(json!({ "title": "t" }))).await;
        let share_uri = format!("/api/tasks/{}/share", task["id"].as_str().unwrap());

        let (status, _) = call(&app, "POST", &share_uri, Some(&owner), Some(json!({ "email": "f@b.com" }))).await;
        assert_eq!(status, StatusCode::OK);

        let db_path = dir.path().join("db.json");
        std::fs::write(&db_path, "sentinel").unwrap();
        let (status, again) =
            call(&app, "POST", &share_uri, Some(&owner), Some(json!({ "email": "F@b.com" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["shared_with"].as_array().unwrap().len(), 1);
        assert_eq!(std::fs::read_to_string(&db_path).unwrap(), "sentinel");
    }

    #[tokio::test]
    async fn strangers_get_unauthorized_whatever_the_payload() {
        let (app, _dir) = test_app();
        let owner = register(&app, "own@b.com").await;
        let stranger = register(&app, "str@b.com").await;
        let (_, task) = call(&app, "POST", "/api/tasks", Some(&owner), Some(json!({ "title": "t" }))).await;
        let id = task["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/tasks/{id}/share"),
            Some(&stranger),
            Some(json!({ "email": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/tasks/{id}/comment"),
            Some(&stranger),
            Some(json!({ "text": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let missing = uuid::Uuid::new_v4();
        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/tasks/{missing}/comment"),
            Some(&stranger),
            Some(json!({ "text": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_and_unknown_ids() {
        let (app, _dir) = test_app();
        let token = register(&app, "x@b.com").await;
        let (status, _) = call(&app, "DELETE", "/api/tasks/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let missing = uuid::Uuid::new_v4();
        let (status, _) = call(&app, "DELETE", &format!("/api/tasks/{missing}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preferences_round_trip() {
        let (app, _dir) = test_app();
        let token = register(&app, "p@b.com").await;
        let (status, prefs) = call(
            &app,
            "PUT",
            "/api/auth/preferences",
            Some(&token),
            Some(json!({ "theme": "dark", "break_duration": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["theme"], "dark");
        assert_eq!(prefs["break_duration"], 10);

        let (_, prefs) = call(&app, "GET", "/api/auth/preferences", Some(&token), None).await;
        assert_eq!(prefs["focus_session_duration"], 25);
        assert_eq!(prefs["theme"], "dark");
    }
}
