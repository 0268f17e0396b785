use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field::Empty, Span};

use crate::state::AppState;
use crate::{catalog, users};

pub fn build_app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                status = Empty,
                latency_ms = Empty,
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, span: &Span| {
            let status = res.status();
            span.record("status", status.as_u16());
            span.record("latency_ms", latency.as_millis() as u64);
            if status.is_server_error() {
                tracing::error!("request failed");
            } else if status.is_client_error() {
                tracing::warn!("request rejected");
            } else {
                tracing::info!("request served");
            }
        });

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(catalog::router())
        .nest("/user", users::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(trace)
}

/// Bind `addr` and serve until `shutdown` resolves, letting in-flight
/// requests finish.
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "pokedex api listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    use super::*;
    use crate::auth::services::seed_admin;
    use crate::mirror::testing::{Recorded, RecordingMirror};
    use crate::mail::LogMailer;
    use crate::clock::SystemClock;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        send(app, req).await
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn signup(app: &Router, email: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/user/signup",
            None,
            Some(json!({
                "email": email,
                "password": "Abcdef12",
                "first_name": "Ash",
                "last_name": "Ketchum"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["data"]["_id"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/user/signin",
            None,
            Some(json!({ "email": "admin@admin", "password": "Adm1nPassword" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    fn assert_no_secrets(v: &Value) {
        let text = v.to_string();
        assert!(!text.contains("password"), "leaked: {text}");
        assert!(!text.contains("$argon2"), "leaked: {text}");
        assert!(!text.contains("reset"), "leaked: {text}");
    }

    #[tokio::test]
    async fn health_and_catalog_are_public() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/list", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"][24]["name"], "Pikachu");

        let res = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_signin_roundtrip_over_http() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signup",
            None,
            Some(json!({"email":"A@B.com","password":"Abcdef12","first_name":"A","last_name":"B"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["email"], "a@b.com");
        assert_eq!(body["data"]["captured"], json!([]));
        assert_no_secrets(&body["data"]);

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signin",
            None,
            Some(json!({"email":"A@b.COM","password":"Abcdef12"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_no_secrets(&body["data"]);

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signup",
            None,
            Some(json!({"email":" a@b.COM ","password":"Abcdef12","first_name":"A","last_name":"B"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "USER_EXISTS");
    }

    #[tokio::test]
    async fn signup_rejections() {
        let app = build_app(AppState::fake());
        let (status, body) =
            call(&app, Method::POST, "/user/signup", None, Some(json!({"email":"a@b.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_FIELDS");

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signup",
            None,
            Some(json!({"email":"a@b.com","password":"short","first_name":"A","last_name":"B"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PASSWORD");

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signin",
            None,
            Some(json!({"email":"a@b.com","password":"Abcdef12"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_USER");
    }

    #[tokio::test]
    async fn auth_middleware_states() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let (status, body) = call(&app, Method::GET, "/user/captured", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_TOKEN");

        let (status, body) = call(&app, Method::GET, "/user/captured", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");

        let req = Request::get("/user/captured")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // Valid signature, but the user does not exist.
        let ghost = crate::auth::jwt::JwtKeys::from(&state.config.jwt).sign("ghost").unwrap();
        let (status, body) = call(&app, Method::GET, "/user/captured", Some(&ghost), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn capture_toggle_over_http() {
        let app = build_app(AppState::fake());
        let (token, _) = signup(&app, "red@pallet.town").await;

        for _ in 0..2 {
            let (status, body) = call(
                &app,
                Method::POST,
                "/user/capture",
                Some(&token),
                Some(json!({"pokemonId": 25, "capture": true})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["captured"], json!([25]));
        }

        let (_, body) = call(
            &app,
            Method::POST,
            "/user/capture",
            Some(&token),
            Some(json!({"pokemonId": 1, "capture": false})),
        )
        .await;
        assert_eq!(body["captured"], json!([25]));

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/capture",
            Some(&token),
            Some(json!({"pokemonId": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_FIELDS");

        let (status, body) = call(&app, Method::GET, "/user/captured", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "captured": [25]}));
    }

    #[tokio::test]
    async fn profile_update_is_self_only() {
        let app = build_app(AppState::fake());
        let (ash_token, ash_id) = signup(&app, "ash@pallet.town").await;
        let (_, gary_id) = signup(&app, "gary@pallet.town").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/{gary_id}"),
            Some(&ash_token),
            Some(json!({"first_name": "Hacked"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/user/does-not-exist",
            Some(&ash_token),
            Some(json!({"first_name": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/{ash_id}"),
            Some(&ash_token),
            Some(json!({"password": "weak"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PASSWORD");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/{ash_id}"),
            Some(&ash_token),
            Some(json!({"first_name": "Satoshi", "last_name": "", "password": "Newpass99"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_name"], "Satoshi");
        assert_eq!(body["data"]["last_name"], "Ketchum");
        assert_no_secrets(&body);

        let (status, _) = call(
            &app,
            Method::POST,
            "/user/signin",
            None,
            Some(json!({"email": "ash@pallet.town", "password": "Newpass99"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let state = AppState::fake();
        seed_admin(&state).await.unwrap();
        let app = build_app(state);
        let (user_token, _) = signup(&app, "ash@pallet.town").await;

        let (status, body) = call(&app, Method::GET, "/user/admin/users", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, body) = call(&app, Method::GET, "/user/admin/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_TOKEN");

        let token = admin_token(&app).await;
        let (status, body) = call(&app, Method::GET, "/user/admin/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_no_secrets(&body);
    }

    #[tokio::test]
    async fn admin_edit_and_delete() {
        let store = Arc::new(RecordingMirror::default());
        let state = AppState::fake_with(store.clone(), Arc::new(LogMailer), Arc::new(SystemClock));
        seed_admin(&state).await.unwrap();
        let admin_id = state.directory.find_by_email("admin@admin").await.unwrap().id;
        let app = build_app(state.clone());
        let token = admin_token(&app).await;
        let (_, ash_id) = signup(&app, "ash@pallet.town").await;
        signup(&app, "gary@pallet.town").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/admin/users/{ash_id}"),
            Some(&token),
            Some(json!({"email": "GARY@pallet.town"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "EMAIL_EXISTS");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/admin/users/{ash_id}"),
            Some(&token),
            Some(json!({"email": " Satoshi@Pallet.town", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PASSWORD");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/admin/users/{ash_id}"),
            Some(&token),
            Some(json!({"email": " Satoshi@Pallet.town", "first_name": "Satoshi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "satoshi@pallet.town");
        assert_eq!(body["data"]["first_name"], "Satoshi");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/user/admin/users/unknown",
            Some(&token),
            Some(json!({"first_name": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/user/admin/delete/{admin_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CANNOT_DELETE_ADMIN");

        let (status, body) =
            call(&app, Method::POST, "/user/admin/delete/unknown", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/user/admin/delete/{ash_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.directory.find_by_id(&ash_id).await.is_none());

        state.mirror.flush().await;
        assert_eq!(store.ops().last(), Some(&Recorded::Delete(ash_id.clone())));
        assert!(store.stored(&ash_id).is_none());
    }

    #[tokio::test]
    async fn forgot_password_always_succeeds() {
        let app = build_app(AppState::fake());
        signup(&app, "ash@pallet.town").await;
        for email in ["ash@pallet.town", "nobody@nowhere.io"] {
            let (status, body) = call(
                &app,
                Method::POST,
                "/user/forgot-password",
                None,
                Some(json!({ "email": email })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["ok"], true);
        }

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/reset-password",
            None,
            Some(json!({"email": "ash@pallet.town", "code": "000000", "newPassword": "Newpass99"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["code"] == "INVALID_CODE");

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/reset-password",
            None,
            Some(json!({"email": "ash@pallet.town"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let app = build_app(AppState::fake());

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signup",
            None,
            Some(json!({
                "email": "ash@pallet.town",
                "password": "Abcdef12",
                "first_name": 5,
                "last_name": "Ketchum"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "INVALID_BODY");

        let req = Request::post("/user/signin")
            .body(Body::from(r#"{"email":"a@b.c","password":"Abcdef12"}"#))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_BODY");

        let req = Request::post("/user/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn bearer_scheme_needs_a_separator() {
        let app = build_app(AppState::fake());
        let (token, _) = signup(&app, "red@pallet.town").await;

        let req = Request::get("/user/captured")
            .header(header::AUTHORIZATION, format!("Bearer{token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");

        let req = Request::get("/user/captured")
            .header(header::AUTHORIZATION, "Bearer")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NO_TOKEN");

        let req = Request::get("/user/captured")
            .header(header::AUTHORIZATION, format!("bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn whitespace_password_is_validated_on_profile_update() {
        let app = build_app(AppState::fake());
        let (token, id) = signup(&app, "ash@pallet.town").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/user/{id}"),
            Some(&token),
            Some(json!({ "password": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PASSWORD");

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/user/{id}"),
            Some(&token),
            Some(json!({ "password": "", "first_name": "Satoshi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_delete_sticks_when_mirror_delete_fails() {
        let store = Arc::new(RecordingMirror::refusing_deletes());
        let state = AppState::fake_with(store.clone(), Arc::new(LogMailer), Arc::new(SystemClock));
        seed_admin(&state).await.unwrap();
        let app = build_app(state.clone());
        let token = admin_token(&app).await;
        let (victim_token, victim_id) = signup(&app, "v@x.io").await;

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/user/admin/delete/{victim_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        state.mirror.flush().await;
        assert!(store.stored(&victim_id).is_some());

        let (status, body) = call(
            &app,
            Method::POST,
            "/user/signin",
            None,
            Some(json!({ "email": "v@x.io", "password": "Abcdef12" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_USER");

        let (status, body) =
            call(&app, Method::GET, "/user/captured", Some(&victim_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "USER_NOT_FOUND");

        let (status, body) = call(&app, Method::GET, "/user/admin/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}
