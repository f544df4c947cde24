// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        payment::payment_handler,
        payout::{commission_handler, payout_handler},
        technician::technician_handler,
        wallet::wallet_handler,
        work_order::work_order_handler,
    },
    middleware::{auth, role_check},
    models::usermodel::UserRole,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let technician_routes = technician_handler().layer(middleware::from_fn(|req, next| {
        role_check(req, next, vec![UserRole::Admin])
    }));

    let api_route = Router::new()
        .nest("/work-orders", work_order_handler())
        .nest("/payments", payment_handler())
        .nest("/wallets", wallet_handler())
        .nest("/payouts", payout_handler())
        .nest("/commissions", commission_handler())
        .nest("/technicians", technician_routes)
        .layer(middleware::from_fn(auth))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::memorydb::MemoryStore,
        models::usermodel::Actor,
        utils::token::create_token,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret";

    fn config() -> Config {
        Config {
            database_url: None,
            jwt_secret: SECRET.to_string(),
            port: 0,
            response_window_minutes: 30,
            wallet_internal_technicians: false,
            deadline_sweep_secs: 0,
            db_max_connections: 1,
        }
    }

    fn router() -> Router {
        let state = AppState::new(config(), Arc::new(MemoryStore::new()), None);
        create_router(Arc::new(state))
    }

    fn bearer(role: UserRole) -> (Uuid, String) {
        let actor = Actor::new(Uuid::new_v4(), role);
        let token = create_token(&actor, SECRET.as_bytes(), 60).unwrap();
        (actor.user_id, format!("Bearer {}", token))
    }

    fn json_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_rejects_missing_token() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/wallets/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dispatcher_creates_and_technician_reads_own_wallet() {
        let app = router();
        let (_, dispatcher) = bearer(UserRole::Dispatcher);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/work-orders",
                &dispatcher,
                json!({ "customer_id": Uuid::new_v4(), "summary": "Fix the generator" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["status"], "UNASSIGNED");

        let (technician_id, technician) = bearer(UserRole::Technician);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/wallets/{}", technician_id))
                    .header(header::AUTHORIZATION, technician)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["balance"], 0);
    }

    #[tokio::test]
    async fn technicians_cannot_run_weekly_batch() {
        let (_, technician) = bearer(UserRole::Technician);

        let response = router()
            .oneshot(json_request(Method::POST, "/api/payouts/weekly-batch", &technician, json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_work_order_is_404() {
        let (_, dispatcher) = bearer(UserRole::Dispatcher);

        let response = router()
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/work-orders/{}/assign", Uuid::new_v4()),
                &dispatcher,
                json!({ "technician_id": Uuid::new_v4() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_summary_is_a_bad_request() {
        let (_, dispatcher) = bearer(UserRole::Dispatcher);

        let response = router()
            .oneshot(json_request(
                Method::POST,
                "/api/work-orders",
                &dispatcher,
                json!({ "customer_id": Uuid::new_v4(), "summary": "" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
