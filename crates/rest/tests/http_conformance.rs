//! HTTP behavior of an assembled server.
//!
//! Tests:
//! - Capabilities interaction, content negotiation and ETags
//! - Paging through stored searches
//! - Interceptors (authorization, browser highlighting)
//! - Health probes

mod common;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};

use claimcdr_rest::interceptor::Interceptor;
use claimcdr_rest::registry::{BeanRegistry, keys};
use claimcdr_rest::settings::{ETagSupport, NarrativeMode};
use claimcdr_rest::{RestfulServer, ServerBootstrap, ServerConfig, StartupGuard, create_app};

use common::{BearerOnly, config_for, full_registry};

const ACCEPT: HeaderName = HeaderName::from_static("accept");
const AUTHORIZATION: HeaderName = HeaderName::from_static("authorization");
const CONTENT_TYPE: HeaderName = HeaderName::from_static("content-type");
const ETAG: HeaderName = HeaderName::from_static("etag");
const HOST: HeaderName = HeaderName::from_static("host");
const IF_NONE_MATCH: HeaderName = HeaderName::from_static("if-none-match");

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

fn assemble(config: ServerConfig, registry: BeanRegistry) -> RestfulServer {
    ServerBootstrap::new(config, Arc::new(registry))
        .initialize(&StartupGuard::new())
        .expect("Failed to assemble server")
}

/// Creates a test server for a configuration.
fn create_test_server(config: ServerConfig) -> (TestServer, RestfulServer) {
    let (registry, _) = full_registry();
    let server = assemble(config, registry);
    let test_server =
        TestServer::new(create_app(server.clone())).expect("Failed to create test server");
    (test_server, server)
}

fn header_str(response: &axum_test::TestResponse, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn patients(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "resourceType": "Patient",
                "id": format!("p{}", i),
                "active": true
            })
        })
        .collect()
}

// =============================================================================
// Capabilities
// =============================================================================

mod capabilities {
    use super::*;

    #[tokio::test]
    async fn test_metadata_r4() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server.get("/metadata").await;

        response.assert_status_ok();
        let content_type = header_str(&response, CONTENT_TYPE).unwrap();
        assert!(content_type.starts_with("application/fhir+json"));
        assert!(content_type.contains("fhirVersion=4.0"));

        let body: Value = response.json();
        assert_eq!(body["resourceType"], "CapabilityStatement");
        assert_eq!(body["fhirVersion"], "4.0.1");
        assert_eq!(body["implementation"]["description"], "CLAIMCDR-FHIRJPA");
        assert_eq!(body["format"], json!(["application/fhir+json"]));

        let types: Vec<&str> = body["rest"][0]["resource"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["Claim", "Coverage", "ExplanationOfBenefit", "Patient"]);
    }

    #[tokio::test]
    async fn test_metadata_dstu2() {
        let (server, _) = create_test_server(config_for("DSTU2"));

        let response = server.get("/metadata").await;

        response.assert_status_ok();
        let content_type = header_str(&response, CONTENT_TYPE).unwrap();
        assert!(content_type.contains("fhirVersion=1.0"));
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "Conformance");
        assert_eq!(body["acceptUnknown"], "no");
    }

    #[tokio::test]
    async fn test_metadata_includes_resource_counts() {
        let (server, _) = create_test_server(config_for("R4"));

        let body: Value = server.get("/metadata").await.json();

        let patient = body["rest"][0]["resource"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["type"] == "Patient")
            .unwrap();
        assert_eq!(patient["extension"][0]["valueDecimal"], 7);
    }

    #[tokio::test]
    async fn test_metadata_without_resource_counts() {
        let (server, _) = create_test_server(ServerConfig {
            include_resource_counts: false,
            ..config_for("R4")
        });

        let body: Value = server.get("/metadata").await.json();

        let resources = body["rest"][0]["resource"].as_array().unwrap();
        assert!(resources.iter().all(|r| r.get("extension").is_none()));
    }

    #[tokio::test]
    async fn test_pretty_print_default_and_override() {
        let (server, _) = create_test_server(config_for("R4"));

        let pretty = server.get("/metadata").await.text();
        assert!(pretty.contains('\n'));

        let compact = server
            .get("/metadata")
            .add_query_param("_pretty", "false")
            .await
            .text();
        assert!(!compact.contains('\n'));
    }

    #[tokio::test]
    async fn test_invalid_pretty_value() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_query_param("_pretty", "maybe")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "OperationOutcome");
        assert_eq!(body["issue"][0]["code"], "invalid");
    }

    #[tokio::test]
    async fn test_xml_is_not_acceptable() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_query_param("_format", "xml")
            .await;

        response.assert_status(StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_unknown_format_is_not_acceptable() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_query_param("_format", "turtle")
            .await;

        response.assert_status(StatusCode::NOT_ACCEPTABLE);
        let body: Value = response.json();
        assert_eq!(body["issue"][0]["code"], "not-supported");
    }
}

// =============================================================================
// ETags
// =============================================================================

mod etags {
    use super::*;

    #[tokio::test]
    async fn test_etag_enabled() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server.get("/metadata").await;
        let etag = header_str(&response, ETAG).expect("ETag header");
        assert!(etag.starts_with("W/\""));

        let response = server
            .get("/metadata")
            .add_header(IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap())
            .await;
        response.assert_status(StatusCode::NOT_MODIFIED);
        assert_eq!(header_str(&response, ETAG).as_deref(), Some(etag.as_str()));
    }

    #[tokio::test]
    async fn test_etag_ignores_pretty_printing() {
        let (server, _) = create_test_server(config_for("R4"));

        let pretty = server.get("/metadata").await;
        let compact = server
            .get("/metadata")
            .add_query_param("_pretty", "false")
            .await;

        assert_eq!(header_str(&pretty, ETAG), header_str(&compact, ETAG));
    }

    #[tokio::test]
    async fn test_stale_etag_returns_body() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_header(IF_NONE_MATCH, HeaderValue::from_static("W/\"stale\""))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "CapabilityStatement");
    }

    #[tokio::test]
    async fn test_etag_conditional() {
        let (server, _) = create_test_server(ServerConfig {
            etag_support: ETagSupport::Conditional,
            ..config_for("R4")
        });

        let response = server.get("/metadata").await;
        response.assert_status_ok();
        assert!(header_str(&response, ETAG).is_none());

        let response = server
            .get("/metadata")
            .add_header(IF_NONE_MATCH, HeaderValue::from_static("*"))
            .await;
        response.assert_status(StatusCode::NOT_MODIFIED);
        assert!(header_str(&response, ETAG).is_some());
    }

    #[tokio::test]
    async fn test_etag_disabled() {
        let (server, _) = create_test_server(ServerConfig {
            etag_support: ETagSupport::Disabled,
            ..config_for("R4")
        });

        let response = server
            .get("/metadata")
            .add_header(IF_NONE_MATCH, HeaderValue::from_static("*"))
            .await;

        response.assert_status_ok();
        assert!(header_str(&response, ETAG).is_none());
    }
}

// =============================================================================
// Paging
// =============================================================================

mod paging {
    use super::*;

    fn hardcoded_config() -> ServerConfig {
        ServerConfig {
            hardcoded_server_address: Some("http://mydomain.com/fhir/baseR4".to_string()),
            ..config_for("R4")
        }
    }

    #[tokio::test]
    async fn test_first_page_links() {
        let (server, fhir) = create_test_server(hardcoded_config());
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let response = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .await;

        response.assert_status_ok();
        let bundle: Value = response.json();
        assert_eq!(bundle["resourceType"], "Bundle");
        assert_eq!(bundle["type"], "searchset");
        assert_eq!(bundle["total"], 25);
        assert_eq!(bundle["entry"].as_array().unwrap().len(), 10);
        assert_eq!(
            bundle["entry"][0]["fullUrl"],
            "http://mydomain.com/fhir/baseR4/Patient/p0"
        );

        let relations: Vec<&str> = bundle["link"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["relation"].as_str().unwrap())
            .collect();
        assert_eq!(relations, vec!["self", "next"]);

        let next = bundle["link"][1]["url"].as_str().unwrap();
        assert!(next.starts_with("http://mydomain.com/fhir/baseR4?_getpages="));
        assert!(next.contains("_getpagesoffset=10"));
        assert!(next.contains("_count=10"));
    }

    #[tokio::test]
    async fn test_last_page_links() {
        let (server, fhir) = create_test_server(hardcoded_config());
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let bundle: Value = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_getpagesoffset", "20")
            .await
            .json();

        assert_eq!(bundle["entry"].as_array().unwrap().len(), 5);
        let relations: Vec<&str> = bundle["link"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["relation"].as_str().unwrap())
            .collect();
        assert_eq!(relations, vec!["self", "previous"]);
    }

    #[tokio::test]
    async fn test_links_follow_request_host() {
        let (server, fhir) = create_test_server(ServerConfig {
            base_url: "https://cdr.example.com".to_string(),
            ..config_for("R4")
        });
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let bundle: Value = server
            .get("/")
            .add_header(HOST, HeaderValue::from_static("fhir.example.com"))
            .add_query_param("_getpages", &search_id)
            .await
            .json();

        let next = bundle["link"][1]["url"].as_str().unwrap();
        assert!(next.starts_with("https://"));
        assert!(next.contains("?_getpages="));
    }

    #[tokio::test]
    async fn test_count_is_capped() {
        let (server, fhir) = create_test_server(config_for("R4"));
        let search_id = fhir.paging().store_results(patients(150)).await.unwrap();

        let bundle: Value = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_count", "500")
            .await
            .json();

        assert_eq!(bundle["entry"].as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_narrative_is_generated() {
        let (server, fhir) = create_test_server(config_for("R4"));
        let search_id = fhir.paging().store_results(patients(1)).await.unwrap();

        let bundle: Value = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .await
            .json();

        let text = &bundle["entry"][0]["resource"]["text"];
        assert_eq!(text["status"], "generated");
        assert!(text["div"].as_str().unwrap().contains("Patient"));
    }

    #[tokio::test]
    async fn test_narrative_disabled() {
        let (server, fhir) = create_test_server(ServerConfig {
            narrative: NarrativeMode::Disabled,
            ..config_for("R4")
        });
        let search_id = fhir.paging().store_results(patients(1)).await.unwrap();

        let bundle: Value = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .await
            .json();

        assert!(bundle["entry"][0]["resource"].get("text").is_none());
    }

    #[tokio::test]
    async fn test_unknown_search_is_gone() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/")
            .add_query_param("_getpages", "does-not-exist")
            .await;

        response.assert_status(StatusCode::GONE);
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "OperationOutcome");
    }

    #[tokio::test]
    async fn test_missing_search_id() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server.get("/").await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_offset() {
        let (server, fhir) = create_test_server(config_for("R4"));
        let search_id = fhir.paging().store_results(patients(3)).await.unwrap();

        let response = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_getpagesoffset", "-1")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_offset_at_end_is_empty_page() {
        let (server, fhir) = create_test_server(hardcoded_config());
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let response = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_getpagesoffset", "25")
            .await;

        response.assert_status_ok();
        let bundle: Value = response.json();
        assert_eq!(bundle["total"], 25);
        assert!(bundle["entry"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offset_past_end() {
        let (server, fhir) = create_test_server(config_for("R4"));
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let response = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_getpagesoffset", "30")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "OperationOutcome");
    }

    #[tokio::test]
    async fn test_largest_offset_is_rejected() {
        let (server, fhir) = create_test_server(config_for("R4"));
        let search_id = fhir.paging().store_results(patients(25)).await.unwrap();

        let response = server
            .get("/")
            .add_query_param("_getpages", &search_id)
            .add_query_param("_getpagesoffset", usize::MAX.to_string())
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Interceptors
// =============================================================================

mod interceptors {
    use super::*;

    fn authorized_server() -> TestServer {
        let (mut registry, _) = full_registry();
        registry.register(
            keys::AUTHORIZATION_INTERCEPTOR,
            Arc::new(BearerOnly) as Arc<dyn Interceptor>,
        );
        let server = assemble(config_for("R4"), registry);
        TestServer::new(create_app(server)).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn test_authorization_rejects() {
        let server = authorized_server();

        let response = server.get("/metadata").await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["issue"][0]["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_authorization_accepts() {
        let server = authorized_server();

        let response = server
            .get("/metadata")
            .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer token"))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_browser_gets_highlighted_html() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_header(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT))
            .await;

        response.assert_status_ok();
        let content_type = header_str(&response, CONTENT_TYPE).unwrap();
        assert!(content_type.starts_with("text/html"));
        let body = response.text();
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("hlKey"));
        assert!(body.contains("CapabilityStatement"));
    }

    #[tokio::test]
    async fn test_explicit_format_skips_highlighting() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/metadata")
            .add_query_param("_format", "json")
            .add_header(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["resourceType"], "CapabilityStatement");
    }

    #[tokio::test]
    async fn test_errors_are_highlighted_for_browsers() {
        let (server, _) = create_test_server(config_for("R4"));

        let response = server
            .get("/")
            .add_query_param("_getpages", "unknown")
            .add_header(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT))
            .await;

        response.assert_status(StatusCode::GONE);
        assert!(response.text().contains("OperationOutcome"));
        assert!(header_str(&response, CONTENT_TYPE).unwrap().starts_with("text/html"));
    }
}

// =============================================================================
// Health
// =============================================================================

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let (server, _) = create_test_server(config_for("DSTU3"));

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["fhirVersion"], "3.0.1");
    }

    #[tokio::test]
    async fn test_liveness() {
        let (server, _) = create_test_server(config_for("R4"));
        server.get("/_liveness").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_readiness() {
        let (server, _) = create_test_server(config_for("R4"));

        let body: Value = server.get("/_readiness").await.json();

        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["resourceProviders"], 4);
        assert_eq!(body["checks"]["interceptors"], json!(["responseHighlighter"]));
    }
}
