use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{admin, auth, daily, exercises, foods, meals, photos, points, streaks, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(foods::router())
                .merge(meals::router())
                .merge(daily::router())
                .merge(points::router())
                .merge(exercises::router())
                .merge(streaks::router())
                .merge(photos::router())
                .merge(admin::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use crate::calendar::test_support::fixed_calendar;
    use crate::daily::services::test_support::competitor;
    use crate::users::repo_types::UserColor;
    use axum::body::{to_bytes, Body};
    use axum::extract::FromRef;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(res).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn saving_a_meal_shows_up_in_the_day() {
        let state = AppState::fake().with_calendar(fixed_calendar());
        let user = competitor(&state, UserColor::Green, 2000.0).await;
        let token = JwtKeys::from_ref(&state).sign_access(user).unwrap();
        let app = build_app(state);

        let meal = serde_json::json!({
            "slot": "breakfast",
            "items": [{
                "food": {
                    "kind": "scaled",
                    "name": "Tapioca",
                    "calories": 350.0,
                    "protein": 4.0,
                    "carbs": 70.0,
                    "fat": 5.0
                },
                "quantity": 1.0,
                "unit": "unit"
            }]
        });
        let res = app
            .clone()
            .oneshot(
                Request::post("/api/v1/meals")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(meal.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(res.status().is_success());

        let res = app
            .oneshot(
                Request::get("/api/v1/daily/2026-03-10")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let day = body_json(res).await;
        assert_eq!(day["goal_met"], true);
        assert_eq!(day["totals"]["calories"], 350.0);
    }
}
