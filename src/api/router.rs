//! HTTP router for the interaction service.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the service router with tracing and CORS layers.
pub fn interaction_router(core: Arc<CoreState>) -> Router {
    let cors = cors_layer(&core.settings.cors_origins);
    let ctx = ApiContext::new(core);

    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/analyze-interaction", post(endpoints::interaction::compare))
        .route("/analyze-patient-drug", post(endpoints::patient::screen))
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Permissive when no origins are configured (or `*` is listed),
/// otherwise restricted to the listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::Settings;
    use crate::pipeline::llm::GenerationOptions;
    use crate::pipeline::testing::{MockFetcher, MockLlmClient, MockLookup, MockSearcher};
    use crate::pipeline::{
        Adjudicator, InteractionResolver, NarrativeAnalyzer, NarrativeConfig,
    };

    const MODERATE_REPLY: &str = "```json\n{\"severity\": \"Moderate\", \"report\": \"Monitor INR.\", \"reasoning\": \"Bleeding records.\"}\n```";

    fn core_with(lookup: MockLookup, searcher: MockSearcher, settings: Settings) -> CoreState {
        let analyzer = NarrativeAnalyzer::new(
            Arc::new(searcher),
            Arc::new(MockFetcher::new()),
            Arc::new(MockLlmClient::new("Bleeding risk is elevated [1].")),
            NarrativeConfig::default(),
        );
        let adjudicator = Adjudicator::new(
            Arc::new(MockLlmClient::new(MODERATE_REPLY)),
            GenerationOptions::default(),
            2,
        );
        let resolver = InteractionResolver::new(Arc::new(lookup), analyzer, adjudicator, 2);
        CoreState::new(settings, resolver)
    }

    fn test_app() -> Router {
        let lookup = MockLookup::new()
            .with_record("Warfarin", "Aspirin", "bleeding")
            .with_record("Warfarin", "Aspirin", "bruising");
        interaction_router(Arc::new(core_with(
            lookup,
            MockSearcher::three(),
            Settings::defaults(),
        )))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_backends() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["llm_backend"], "ollama");
        assert_eq!(json["search_backend"], "brave");
    }

    #[tokio::test]
    async fn analyze_returns_verdict() {
        let req = post_json(
            "/analyze",
            r#"{"test_drug": "Warfarin", "current_medications": ["Aspirin"], "allergies": ["Penicillin"]}"#,
        );
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["severity"], "Moderate");
        assert_eq!(json["report"], "Monitor INR.");
        assert_eq!(json["reasoning"], "Bleeding records.");
        assert_eq!(json["evidence"]["pairs_with_records"], 1);
    }

    #[tokio::test]
    async fn analyze_without_medications_is_no_interaction() {
        let req = post_json("/analyze", r#"{"test_drug": "Warfarin"}"#);
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["severity"], "No Interaction");
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let response = test_app()
            .oneshot(post_json("/analyze", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");

        // Missing required field would be 422 from the bare extractor.
        let response = test_app()
            .oneshot(post_json("/analyze-interaction", r#"{"drug1": "Warfarin"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_test_drug_is_400() {
        let req = post_json("/analyze", r#"{"test_drug": "  ", "current_medications": ["Aspirin"]}"#);
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_interaction_returns_records_and_report() {
        let req = post_json(
            "/analyze-interaction",
            r#"{"drug1": "warfarin", "drug2": "ASPIRIN"}"#,
        );
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["db_results"].as_array().unwrap().len(), 2);
        assert_eq!(json["db_results"][0]["side_effect_name"], "bleeding");
        let report = json["ai_analysis"].as_str().unwrap();
        assert!(report.starts_with("# Drug Interaction Analysis Report"));
        assert_eq!(json["sources"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn analyze_patient_drug_lists_conflicts() {
        let req = post_json(
            "/analyze-patient-drug",
            r#"{"patient_info": {"current_medications": ["Metformin", "Aspirin"], "demographics": {"age": 71}}, "new_drug": "Warfarin"}"#,
        );
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let conflicts = json["conflicts"].as_array().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0]["drug"], "Aspirin");
        assert!(json["ai_analysis"].as_str().unwrap().contains("- Drug 2: Aspirin"));
    }

    #[tokio::test]
    async fn all_pairs_failing_is_502() {
        let app = interaction_router(Arc::new(core_with(
            MockLookup::failing(),
            MockSearcher::failing(),
            Settings::defaults(),
        )));
        let req = post_json(
            "/analyze",
            r#"{"test_drug": "Warfarin", "current_medications": ["Aspirin"]}"#,
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NO_EVIDENCE_AVAILABLE");
    }

    #[tokio::test]
    async fn storage_down_during_screen_is_503() {
        let app = interaction_router(Arc::new(core_with(
            MockLookup::failing(),
            MockSearcher::three(),
            Settings::defaults(),
        )));
        let req = post_json(
            "/analyze-patient-drug",
            r#"{"patient_info": {"current_medications": ["Aspirin"]}, "new_drug": "Warfarin"}"#,
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_credentials_is_500() {
        let core = core_with(MockLookup::new(), MockSearcher::three(), Settings::defaults())
            .with_missing_credentials("SEARCH_API_KEY");
        let app = interaction_router(Arc::new(core));
        let req = post_json("/analyze-interaction", r#"{"drug1": "A", "drug2": "B"}"#);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "MISSING_CREDENTIALS");
    }

    #[tokio::test]
    async fn restricted_cors_echoes_only_listed_origin() {
        let mut settings = Settings::defaults();
        settings.cors_origins = vec!["http://localhost:3000".to_string()];
        let app = interaction_router(Arc::new(core_with(
            MockLookup::new(),
            MockSearcher::three(),
            settings,
        )));

        let req = Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let req = Request::builder()
            .uri("/health")
            .header("Origin", "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
