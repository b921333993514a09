//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST API under `/api/...`
/// - Static SPA from `STATIC_DIR` with index fallback
/// - CORS from `CORS_ORIGINS` (any origin when unset)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.http.static_dir.clone();
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));
    let cors = cors_layer(&state.http.cors_origins);

    Router::new()
        .route("/api/", get(http::http_banner))
        .route("/api/health", get(http::http_health))
        // Accounts
        .route("/api/auth/parent/register", post(http::http_register_parent))
        .route("/api/auth/parent/login", post(http::http_login_parent))
        .route("/api/auth/child/login", post(http::http_login_child))
        // Child profiles
        .route("/api/child/profile", post(http::http_create_child))
        .route("/api/child/profiles", get(http::http_list_children))
        .route(
            "/api/child/profile/:id",
            get(http::http_get_child).delete(http::http_delete_child),
        )
        // Activities, sessions, progress
        .route("/api/activities/math", post(http::http_math_activities))
        .route(
            "/api/progress/session",
            post(http::http_start_session).put(http::http_complete_session),
        )
        .route("/api/progress/:child_id", get(http::http_progress))
        .route("/api/dashboard/parent/:child_id", get(http::http_parent_dashboard))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(target: "adventure_backend", origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScriptedGenerator;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        state: Arc<AppState>,
        store: MemoryStore,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryStore::new();
            let state = Arc::new(AppState::for_tests(store.clone(), None));
            Self { state, store }
        }

        fn with_generator(gen: ScriptedGenerator) -> Self {
            let store = MemoryStore::new();
            let state = Arc::new(AppState::for_tests(store.clone(), Some(Arc::new(gen))));
            Self { state, store }
        }

        /// Same store, clock moved forward.
        fn later(&self, delta: chrono::Duration) -> Self {
            let mut state = AppState::for_tests(self.store.clone(), None);
            state.clock.advance(delta);
            Self { state: Arc::new(state), store: self.store.clone() }
        }

        async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(t) = token {
                req = req.header("authorization", format!("Bearer {t}"));
            }
            let req = match body {
                Some(b) => req
                    .header("content-type", "application/json")
                    .body(Body::from(b.to_string()))
                    .unwrap(),
                None => req.body(Body::empty()).unwrap(),
            };
            let res = build_router(self.state.clone()).oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        async fn register(&self, email: &str) -> String {
            let (status, v) = self
                .call(
                    Method::POST,
                    "/api/auth/parent/register",
                    None,
                    Some(json!({"email": email, "password": "secret1", "name": "Sam"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{v}");
            v["access_token"].as_str().unwrap().to_string()
        }

        async fn create_child(&self, token: &str) -> String {
            let (status, v) = self
                .call(
                    Method::POST,
                    "/api/child/profile",
                    Some(token),
                    Some(json!({"name": "Mia", "age": 5, "avatar_id": "fox", "picture_password_id": "star"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{v}");
            v["id"].as_str().unwrap().to_string()
        }

        async fn start(&self, token: &str, child: &str) -> String {
            let (status, v) = self
                .call(
                    Method::POST,
                    "/api/progress/session",
                    Some(token),
                    Some(json!({"child_id": child, "activity_type": "counting", "difficulty_level": 2})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{v}");
            v["session"]["id"].as_str().unwrap().to_string()
        }

        async fn complete(&self, token: &str, session: &str, correct: u32, total: u32) -> (StatusCode, Value) {
            self.call(
                Method::PUT,
                "/api/progress/session",
                Some(token),
                Some(json!({"session_id": session, "score": correct * 10, "correct_answers": correct, "total_questions": total})),
            )
            .await
        }
    }

    fn achievement_titles(v: &Value) -> Vec<String> {
        v["achievements"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn health_and_banner() {
        let h = Harness::new();
        let (status, v) = h.call(Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["content_generator"], "templates");

        let (status, v) = h.call(Method::GET, "/api/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Adventure Academy Heroes API");
    }

    #[tokio::test]
    async fn parent_accounts() {
        let h = Harness::new();
        h.register("sam@example.com").await;

        let (status, v) = h
            .call(
                Method::POST,
                "/api/auth/parent/register",
                None,
                Some(json!({"email": "SAM@example.com", "password": "secret1", "name": "Sam"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["error"], "conflict");

        let (status, _) = h
            .call(
                Method::POST,
                "/api/auth/parent/register",
                None,
                Some(json!({"email": "kim@example.com", "password": "123", "name": "Kim"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, v) = h
            .call(
                Method::POST,
                "/api/auth/parent/login",
                None,
                Some(json!({"email": "sam@example.com", "password": "secret1"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["role"], "parent");
        assert_eq!(v["parent"]["email"], "sam@example.com");

        let (status, _) = h
            .call(
                Method::POST,
                "/api/auth/parent/login",
                None,
                Some(json!({"email": "sam@example.com", "password": "wrong!!"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn requests_without_token_are_unauthorized() {
        let h = Harness::new();
        let (status, v) = h.call(Method::GET, "/api/child/profiles", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(v["error"], "unauthorized");

        let (status, _) = h.call(Method::GET, "/api/child/profiles", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn child_profile_lifecycle() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let (status, v) = h.call(Method::GET, &format!("/api/child/profile/{child}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["age_group"], "preschool_4-5");
        assert_eq!(v["current_level"], 1);

        let (_, v) = h.call(Method::GET, &format!("/api/progress/{child}"), Some(&token), None).await;
        assert_eq!(v["skills"].as_array().unwrap().len(), 4);

        let (status, _) = h
            .call(
                Method::POST,
                "/api/child/profile",
                Some(&token),
                Some(json!({"name": "Old", "age": 15, "avatar_id": "fox", "picture_password_id": "star"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, v) = h.call(Method::GET, "/api/child/profiles", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v.as_array().unwrap().len(), 1);

        let session = h.start(&token, &child).await;
        h.complete(&token, &session, 3, 5).await;

        let (status, v) = h.call(Method::DELETE, &format!("/api/child/profile/{child}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["deleted"], true);
        assert_eq!(v["sessions_removed"], 1);
        assert_eq!(v["skills_removed"], 4);
        assert_eq!(v["achievements_removed"], 1);

        let (status, _) = h.call(Method::GET, &format!("/api/child/profile/{child}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_parents_children_are_forbidden() {
        let h = Harness::new();
        let owner = h.register("sam@example.com").await;
        let stranger = h.register("kim@example.com").await;
        let child = h.create_child(&owner).await;

        let (status, v) = h.call(Method::GET, &format!("/api/progress/{child}"), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(v["error"], "forbidden");

        let (status, _) = h
            .call(Method::GET, &format!("/api/dashboard/parent/{child}"), Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn child_login_scopes_access_to_itself() {
        let h = Harness::new();
        let parent = h.register("sam@example.com").await;
        let child = h.create_child(&parent).await;

        let (status, _) = h
            .call(
                Method::POST,
                "/api/auth/child/login",
                None,
                Some(json!({"child_id": child, "picture_password_id": "moon"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, v) = h
            .call(
                Method::POST,
                "/api/auth/child/login",
                None,
                Some(json!({"child_id": child, "picture_password_id": "star"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["role"], "child");
        let kid_token = v["access_token"].as_str().unwrap().to_string();

        let (status, _) = h.call(Method::GET, &format!("/api/progress/{child}"), Some(&kid_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let session = h.start(&kid_token, &child).await;
        let (status, _) = h.complete(&kid_token, &session, 2, 3).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = h
            .call(
                Method::POST,
                "/api/child/profile",
                Some(&kid_token),
                Some(json!({"name": "Twin", "age": 5, "avatar_id": "fox", "picture_password_id": "star"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn activities_are_generated_and_persisted() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let (status, v) = h
            .call(
                Method::POST,
                "/api/activities/math",
                Some(&token),
                Some(json!({"child_id": child, "activity_type": "shapes", "count": 3})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{v}");
        assert_eq!(v["difficulty_level"], 1);
        assert_eq!(v["encouragement"], crate::encouragement::SESSION_START);
        let activities = v["activities"].as_array().unwrap();
        assert_eq!(activities.len(), 3);
        assert!(activities.iter().all(|a| a["activity_type"] == "shapes" && a["age_group"] == "preschool_4-5"));
        assert_eq!(h.store.activity_count().await, 3);

        // seeded randomness: same request, same content
        let (_, again) = h
            .call(
                Method::POST,
                "/api/activities/math",
                Some(&token),
                Some(json!({"child_id": child, "activity_type": "shapes", "count": 3})),
            )
            .await;
        assert_eq!(again["activities"][0]["question_text"], activities[0]["question_text"]);
    }

    #[tokio::test]
    async fn activity_requests_are_validated() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        for body in [
            json!({"child_id": child, "activity_type": "subtraction"}),
            json!({"child_id": child, "count": 0}),
            json!({"child_id": child, "count": 21}),
        ] {
            let (status, v) = h.call(Method::POST, "/api/activities/math", Some(&token), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(v["error"], "validation");
        }
        assert_eq!(h.store.activity_count().await, 0);

        let (status, _) = h
            .call(Method::POST, "/api/activities/math", Some(&token), Some(json!({"child_id": "nobody"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn broken_generator_falls_back_to_templates() {
        let h = Harness::with_generator(ScriptedGenerator { reply: Ok("I cannot do that".into()), delay: None });
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let (status, v) = h
            .call(
                Method::POST,
                "/api/activities/math",
                Some(&token),
                Some(json!({"child_id": child, "activity_type": "patterns", "count": 4})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let activities = v["activities"].as_array().unwrap();
        assert_eq!(activities.len(), 4);
        assert!(activities.iter().all(|a| a["source"] == "template"));
    }

    #[tokio::test]
    async fn session_completion_awards_and_rejects_repeats() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let first = h.start(&token, &child).await;
        let (status, v) = h.complete(&token, &first, 5, 5).await;
        assert_eq!(status, StatusCode::OK, "{v}");
        assert_eq!(achievement_titles(&v), ["First Steps!", "Perfect Hero!"]);
        assert_eq!(v["session"]["is_completed"], true);
        assert_eq!(v["skill"]["total_attempts"], 5);
        // 5/5 at level 2 moves up one step
        assert_eq!(v["next_difficulty"], 3);
        assert_eq!(v["reward"]["xp_earned"], 50);
        assert_eq!(v["reward"]["coins_earned"], 25);
        assert_eq!(v["reward"]["new_level"], Value::Null);

        let (status, v) = h.complete(&token, &first, 1, 5).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["error"], "conflict");

        let second = h.start(&token, &child).await;
        let (status, v) = h.complete(&token, &second, 4, 4).await;
        assert_eq!(status, StatusCode::OK);
        assert!(achievement_titles(&v).is_empty());

        let third = h.start(&token, &child).await;
        let (status, _) = h.complete(&token, &third, 6, 5).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h.complete(&token, "missing-session", 1, 1).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, v) = h.call(Method::GET, &format!("/api/progress/{child}"), Some(&token), None).await;
        assert_eq!(v["achievements_count"], 2);
        assert_eq!(v["streak_days"], 1);
        assert_eq!(v["total_score"], 90);
        assert_eq!(v["coins"], 45);
        let counting = v["skills"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["skill_type"] == "counting")
            .unwrap()
            .clone();
        assert_eq!(counting["successful_attempts"], 9);
        assert_eq!(counting["total_attempts"], 9);
    }

    #[tokio::test]
    async fn session_without_difficulty_starts_at_advised_level() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let first = h.start(&token, &child).await;
        h.complete(&token, &first, 5, 5).await;

        let (status, v) = h
            .call(
                Method::POST,
                "/api/progress/session",
                Some(&token),
                Some(json!({"child_id": child, "activity_type": "counting"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{v}");
        assert_eq!(v["session"]["difficulty_level"], 3);
        let second = v["session"]["id"].as_str().unwrap().to_string();

        let (status, v) = h.complete(&token, &second, 5, 5).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["reward"]["new_level"], 2);
        assert_eq!(v["reward"]["total_xp"], 100);
        assert_eq!(v["reward"]["total_coins"], 50);

        let (_, v) = h.call(Method::GET, &format!("/api/child/profile/{child}"), Some(&token), None).await;
        assert_eq!(v["current_level"], 2);
        assert_eq!(v["coins"], 50);
    }

    #[tokio::test]
    async fn unlisted_skill_row_is_created_on_completion() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let (_, v) = h
            .call(
                Method::POST,
                "/api/progress/session",
                Some(&token),
                Some(json!({"child_id": child, "activity_type": "simple_addition"})),
            )
            .await;
        assert_eq!(v["session"]["difficulty_level"], 1);
        let session = v["session"]["id"].as_str().unwrap().to_string();

        let (status, v) = h.complete(&token, &session, 2, 4).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["skill"]["skill_type"], "simple_addition");
        assert_eq!(v["skill"]["mastery_percentage"], 50.0);

        let (_, v) = h.call(Method::GET, &format!("/api/progress/{child}"), Some(&token), None).await;
        assert_eq!(v["skills"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn dashboard_projects_weekly_progress() {
        let h = Harness::new();
        let token = h.register("sam@example.com").await;
        let child = h.create_child(&token).await;

        let (status, v) = h.call(Method::GET, &format!("/api/dashboard/parent/{child}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["weekly_stats"]["sessions_count"], 0);
        assert_eq!(v["weekly_stats"]["accuracy_rate"], 0);
        assert_eq!(v["weekly_stats"]["minutes_goal"], 120);
        assert_eq!(v["focus_areas"].as_array().unwrap().len(), 2);
        assert_eq!(v["recommendations"].as_array().unwrap().len(), 3);

        for (correct, total) in [(5, 5), (3, 5)] {
            let s = h.start(&token, &child).await;
            h.complete(&token, &s, correct, total).await;
        }
        // the weekly window is half-open at `now`
        let (_, v) = h.call(Method::GET, &format!("/api/dashboard/parent/{child}"), Some(&token), None).await;
        assert_eq!(v["weekly_stats"]["sessions_count"], 0);

        let h = h.later(chrono::Duration::hours(1));
        let (_, v) = h.call(Method::GET, &format!("/api/dashboard/parent/{child}"), Some(&token), None).await;
        assert_eq!(v["weekly_stats"]["sessions_count"], 2);
        assert_eq!(v["weekly_stats"]["accuracy_rate"], 80);
        assert_eq!(v["weekly_stats"]["streak_days"], 1);
        assert_eq!(v["recent_sessions"].as_array().unwrap().len(), 2);
        assert_eq!(v["achievements"].as_array().unwrap().len(), 2);
        assert_eq!(v["recommendations"][0], "🎯 Mia is doing great with counting!");
        let insights: Vec<&str> =
            v["engagement_insights"].as_array().unwrap().iter().map(|i| i.as_str().unwrap()).collect();
        assert!(insights.iter().any(|i| i.contains("weekly minutes goal")));
    }
}
