/// Integration tests with a mocked registry
/// Tests the complete retrieval workflow without hitting the real Companies House API
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_ch_retrieval::config::Config;
use rust_ch_retrieval::handlers::{self, AppState, SearchQueryParams};
use rust_ch_retrieval::models::EntityKind;
use rust_ch_retrieval::registry_client::RegistryClient;
use rust_ch_retrieval::retrieval::{CompanyRetriever, RetrievalOptions, Skip};
use rust_ch_retrieval::search::{uncancellable, CompanyOutcome, SearchOrchestrator, SearchParams};
use rust_ch_retrieval::sink::{CsvSink, MemorySink, RecordSink, RunId};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a client pointed at the mock server
fn create_test_client(server: &MockServer) -> RegistryClient {
    RegistryClient::new(&server.uri(), "key".to_string(), Duration::from_secs(5), 4).unwrap()
}

/// Helper function to create test config
fn create_test_config(base_url: String, data_dir: std::path::PathBuf) -> Config {
    Config {
        api_key: "key".to_string(),
        base_url,
        data_dir,
        port: 8080,
        max_concurrent_companies: 2,
        max_in_flight_requests: 4,
        request_timeout_secs: 5,
    }
}

fn create_test_state(server: &MockServer, data_dir: std::path::PathBuf) -> Arc<AppState> {
    let config = create_test_config(server.uri(), data_dir);
    let client = create_test_client(server);
    Arc::new(AppState {
        orchestrator: SearchOrchestrator::new(CompanyRetriever::new(client.clone()), 2),
        client,
        config,
    })
}

async fn mount_json(server: &MockServer, at: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, at: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream error"))
        .mount(server)
        .await;
}

fn profile(number: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "company_number": number,
        "company_name": name,
        "company_status": "active",
        "type": "ltd",
        "has_insolvency_history": false,
        "sic_codes": ["62020"],
        "links": {
            "officers": format!("/company/{}/officers", number)
        }
    })
}

#[tokio::test]
async fn test_end_to_end_single_officer_with_appointment() {
    let server = MockServer::start().await;

    mount_json(&server, "/company/123", profile("123", "ACME LTD")).await;
    mount_json(
        &server,
        "/company/123/officers",
        serde_json::json!({
            "items": [{
                "name": "Doe, Jane",
                "officer_role": "director",
                "links": {"officer": {"appointments": "/officers/xyz/appointments"}}
            }]
        }),
    )
    .await;
    mount_json(
        &server,
        "/officers/xyz/appointments",
        serde_json::json!({
            "kind": "personal-appointment",
            "is_corporate_officer": false,
            "total_results": 1,
            "items": [{
                "appointed_to": {
                    "company_number": "123",
                    "company_name": "ACME LTD",
                    "company_status": "active"
                },
                "officer_role": "director",
                "appointed_on": "2020-01-01"
            }]
        }),
    )
    .await;

    let retriever = CompanyRetriever::new(create_test_client(&server));
    let sink = MemorySink::new();
    sink.write_headers().unwrap();

    let report = retriever.retrieve("123", &sink).await.unwrap();

    assert_eq!(sink.column(EntityKind::Company, "company_number"), vec!["123"]);
    assert_eq!(sink.column(EntityKind::SicCode, "sic_codes"), vec!["62020"]);

    assert_eq!(sink.column(EntityKind::Officer, "officer_surname"), vec!["Doe"]);
    assert_eq!(sink.column(EntityKind::Officer, "officer_forename"), vec!["Jane"]);
    assert_eq!(sink.column(EntityKind::Officer, "officer_id"), vec!["xyz"]);
    assert_eq!(
        sink.column(EntityKind::Officer, "total_company_appointments"),
        vec!["1"]
    );

    assert_eq!(
        sink.column(EntityKind::OfficerAppointment, "officer_id"),
        vec!["xyz"]
    );
    assert_eq!(
        sink.column(EntityKind::OfficerAppointment, "company_name"),
        vec!["ACME LTD"]
    );

    // Absent links are skips, not failures
    assert!(report.is_complete());
    assert!(report.skipped.contains(&Skip::MissingLink {
        link: "persons_with_significant_control".to_string()
    }));
    assert!(report.skipped.contains(&Skip::MissingLink {
        link: "charges".to_string()
    }));
    assert!(sink.rows(EntityKind::SignificantControlPerson).is_empty());
    assert!(sink.rows(EntityKind::Charge).is_empty());
}

#[tokio::test]
async fn test_requests_carry_basic_auth_credential() {
    let server = MockServer::start().await;

    // base64("key:")
    Mock::given(method("GET"))
        .and(path("/company/123"))
        .and(header("authorization", "Basic a2V5Og=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "company_number": "123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let raw = client.get_company("123").await.unwrap();
    assert_eq!(raw["company_number"], "123");
}

#[tokio::test]
async fn test_failed_company_does_not_affect_others() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/company/AAA",
        serde_json::json!({
            "company_number": "AAA",
            "company_name": "ALPHA LTD",
            "sic_codes": ["62020"],
            "links": {
                "officers": "/company/AAA/officers",
                "persons_with_significant_control": "/company/AAA/persons-with-significant-control"
            }
        }),
    )
    .await;
    mount_json(
        &server,
        "/company/AAA/officers",
        serde_json::json!({
            "items": [{
                "name": "ADAMS, Alice",
                "officer_role": "director",
                "links": {"officer": {"appointments": "/officers/alice/appointments"}}
            }]
        }),
    )
    .await;
    mount_json(
        &server,
        "/officers/alice/appointments",
        serde_json::json!({
            "items": [{"appointed_to": {"company_number": "AAA"}, "officer_role": "director"}]
        }),
    )
    .await;
    mount_json(
        &server,
        "/company/AAA/persons-with-significant-control",
        serde_json::json!({
            "items": [{
                "name": "Ms Alice Adams",
                "kind": "individual-person-with-significant-control",
                "etag": "a1",
                "natures_of_control": ["ownership-of-shares-75-to-100-percent"]
            }]
        }),
    )
    .await;
    mount_status(&server, "/company/BBB", 500).await;

    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 2);
    let sink = MemorySink::new();
    sink.write_headers().unwrap();

    let summary = orchestrator
        .run_companies(
            RunId::new("batch"),
            vec!["AAA".to_string(), "BBB".to_string()],
            &sink,
            uncancellable(),
        )
        .await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.outcome("AAA").unwrap().is_success());
    match summary.outcome("BBB").unwrap() {
        CompanyOutcome::Failed { error, .. } => assert!(error.contains("500")),
        other => panic!("expected failure, got {:?}", other),
    }

    // Every table AAA reached holds its rows and nothing from BBB
    assert_eq!(sink.column(EntityKind::Company, "company_number"), vec!["AAA"]);
    assert_eq!(sink.column(EntityKind::SicCode, "company_number"), vec!["AAA"]);
    assert_eq!(sink.column(EntityKind::Officer, "company_number"), vec!["AAA"]);
    assert_eq!(sink.column(EntityKind::Officer, "officer_id"), vec!["alice"]);
    assert_eq!(
        sink.column(EntityKind::OfficerAppointment, "officer_id"),
        vec!["alice"]
    );
    assert_eq!(
        sink.column(EntityKind::SignificantControlPerson, "company_number"),
        vec!["AAA"]
    );
    assert_eq!(
        sink.column(EntityKind::SignificantControlPerson, "name"),
        vec!["Ms Alice Adams"]
    );
    assert_eq!(
        sink.column(EntityKind::NatureOfControl, "etag"),
        vec!["a1"]
    );
}

#[tokio::test]
async fn test_officer_without_appointments_link_keeps_row() {
    let server = MockServer::start().await;

    mount_json(&server, "/company/123", profile("123", "ACME LTD")).await;
    mount_json(
        &server,
        "/company/123/officers",
        serde_json::json!({
            "items": [{"name": "BROWN, Bob", "officer_role": "secretary"}]
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path_regex("^/officers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
        .expect(0)
        .mount(&server)
        .await;

    let retriever = CompanyRetriever::with_options(
        create_test_client(&server),
        RetrievalOptions {
            include_appointments: true,
            include_charges: true,
        },
    );
    let sink = MemorySink::new();
    sink.write_headers().unwrap();

    let report = retriever.retrieve("123", &sink).await.unwrap();

    assert_eq!(sink.column(EntityKind::Officer, "officer_surname"), vec!["BROWN"]);
    assert_eq!(sink.column(EntityKind::Officer, "officer_id"), vec![""]);
    assert!(sink.rows(EntityKind::OfficerAppointment).is_empty());
    assert_eq!(report.rows.officers, 1);
    assert!(report.is_complete());
    assert!(report.skipped.contains(&Skip::MissingOfficerId {
        officer_name: "BROWN, Bob".to_string()
    }));
}

#[tokio::test]
async fn test_appointment_failure_keeps_other_officers() {
    let server = MockServer::start().await;

    mount_json(&server, "/company/123", profile("123", "ACME LTD")).await;
    mount_json(
        &server,
        "/company/123/officers",
        serde_json::json!({
            "items": [
                {
                    "name": "SMITH, John Michael",
                    "links": {"officer": {"appointments": "/officers/broken/appointments"}}
                },
                {
                    "name": "JONES, Anna",
                    "links": {"officer": {"appointments": "/officers/ok/appointments"}}
                },
                {
                    "name": "",
                    "links": {"officer": {"appointments": "/officers/nameless/appointments"}}
                }
            ]
        }),
    )
    .await;
    mount_status(&server, "/officers/broken/appointments", 503).await;
    mount_json(
        &server,
        "/officers/ok/appointments",
        serde_json::json!({
            "items": [{"appointed_to": {"company_number": "123"}, "officer_role": "secretary"}]
        }),
    )
    .await;

    let retriever = CompanyRetriever::new(create_test_client(&server));
    let sink = MemorySink::new();

    let report = retriever.retrieve("123", &sink).await.unwrap();

    // Both named officers keep their rows; the nameless one is skipped
    let mut ids = sink.column(EntityKind::Officer, "officer_id");
    ids.sort();
    assert_eq!(ids, vec!["broken", "ok"]);
    assert_eq!(
        sink.column(EntityKind::OfficerAppointment, "officer_id"),
        vec!["ok"]
    );

    assert_eq!(report.rows.officers, 2);
    assert_eq!(report.rows.appointments, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.is_complete());
    assert!(report
        .skipped
        .contains(&Skip::UnnamedOfficer { position: 2 }));
}

#[tokio::test]
async fn test_officers_follow_pagination() {
    let server = MockServer::start().await;

    mount_json(&server, "/company/123", profile("123", "ACME LTD")).await;
    // Mounted first so it wins for the second page
    Mock::given(method("GET"))
        .and(path("/company/123/officers"))
        .and(query_param("start_index", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_results": 2,
            "items": [{"name": "SECOND, Officer"}]
        })))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/company/123/officers",
        serde_json::json!({
            "total_results": 2,
            "items": [{"name": "FIRST, Officer"}]
        }),
    )
    .await;

    let retriever = CompanyRetriever::with_options(
        create_test_client(&server),
        RetrievalOptions {
            include_appointments: false,
            include_charges: false,
        },
    );
    let sink = MemorySink::new();
    let report = retriever.retrieve("123", &sink).await.unwrap();

    assert_eq!(
        sink.column(EntityKind::Officer, "officer_surname"),
        vec!["FIRST", "SECOND"]
    );
    assert_eq!(report.rows.officers, 2);
    assert!(report.skipped.contains(&Skip::Disabled {
        section: "charges".to_string()
    }));
}

#[tokio::test]
async fn test_significant_control_and_charges() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/company/123",
        serde_json::json!({
            "company_number": "123",
            "company_name": "ACME LTD",
            "links": {
                "persons_with_significant_control": "/company/123/persons-with-significant-control",
                "charges": "/company/123/charges"
            }
        }),
    )
    .await;
    mount_json(
        &server,
        "/company/123/persons-with-significant-control",
        serde_json::json!({
            "items": [
                {
                    "name": "Mr John Smith",
                    "kind": "individual-person-with-significant-control",
                    "name_elements": {"surname": "Smith", "forename": "John"},
                    "etag": "e1",
                    "natures_of_control": [
                        "ownership-of-shares-75-to-100-percent",
                        "voting-rights-75-to-100-percent"
                    ]
                },
                {
                    "name": "Holdings Ltd",
                    "kind": "corporate-entity-person-with-significant-control",
                    "identification": {"registration_number": "0999"}
                }
            ]
        }),
    )
    .await;
    mount_json(
        &server,
        "/company/123/charges",
        serde_json::json!({
            "items": [{
                "id": "ch-1",
                "charge_number": 1,
                "status": "outstanding",
                "classification": {"type": "charge-description", "description": "A registered charge"},
                "persons_entitled": [{"name": "Big Bank PLC"}],
                "transactions": [
                    {"filing_type": "create-charge-with-deed", "delivered_on": "2021-05-01",
                     "links": {"filing": "/company/123/filing-history/abc"}}
                ]
            }]
        }),
    )
    .await;

    let retriever = CompanyRetriever::new(create_test_client(&server));
    let sink = MemorySink::new();
    let report = retriever.retrieve("123", &sink).await.unwrap();

    // Both persons keep their rows, with or without natures of control
    assert_eq!(
        sink.column(EntityKind::SignificantControlPerson, "name"),
        vec!["Mr John Smith", "Holdings Ltd"]
    );
    assert_eq!(report.rows.natures_of_control, 2);
    assert_eq!(
        sink.column(EntityKind::NatureOfControl, "etag"),
        vec!["e1", "e1"]
    );

    assert_eq!(sink.column(EntityKind::Charge, "charge_id"), vec!["ch-1"]);
    assert_eq!(
        sink.column(EntityKind::ChargePersonEntitled, "name"),
        vec!["Big Bank PLC"]
    );
    assert_eq!(
        sink.column(EntityKind::ChargeTransaction, "filing_link"),
        vec!["/company/123/filing-history/abc"]
    );
    assert!(report.skipped.contains(&Skip::MissingLink {
        link: "officers".to_string()
    }));
}

#[tokio::test]
async fn test_empty_search_writes_header_only_tables() {
    let server = MockServer::start().await;
    mount_json(&server, "/search", serde_json::json!({"items": [], "total_results": 0})).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 2);

    let (summary, sink) = orchestrator
        .run_search(
            "zz",
            SearchParams::default(),
            |run| CsvSink::create(dir.path(), run.clone()),
            uncancellable(),
        )
        .await
        .unwrap();

    assert_eq!(summary.run.prefix, "zz___");
    assert!(summary.companies.is_empty());

    for kind in EntityKind::ALL {
        let contents = std::fs::read_to_string(sink.path_for(kind)).unwrap();
        assert_eq!(contents.lines().count(), 1, "{:?}", kind);
        assert_eq!(contents.trim_end(), kind.headers().join(","));
    }
}

#[tokio::test]
async fn test_failed_search_creates_no_files() {
    let server = MockServer::start().await;
    mount_status(&server, "/search", 500).await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 2);

    let result = orchestrator
        .run_search(
            "acme",
            SearchParams::default(),
            |run| CsvSink::create(&out, run.clone()),
            uncancellable(),
        )
        .await;

    assert!(result.unwrap_err().is_transport());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_search_run_retrieves_every_listed_company() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/search",
        serde_json::json!({
            "items": [
                {"kind": "searchresults#company", "company_number": "AAA"},
                {"kind": "searchresults#officer", "title": "SOMEONE"},
                {"kind": "searchresults#company", "company_number": "BBB"}
            ]
        }),
    )
    .await;
    mount_json(&server, "/company/AAA", profile("AAA", "ALPHA LTD")).await;
    mount_json(&server, "/company/BBB", profile("BBB", "BETA LTD")).await;
    mount_json(&server, "/company/AAA/officers", serde_json::json!({"items": []})).await;
    mount_json(&server, "/company/BBB/officers", serde_json::json!({"items": []})).await;

    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 2);
    let (summary, sink) = orchestrator
        .run_search(
            "Alphabet",
            SearchParams::default(),
            |_| Ok(MemorySink::new()),
            uncancellable(),
        )
        .await
        .unwrap();

    assert_eq!(summary.run.prefix, "Alpha");
    assert_eq!(summary.keyword.as_deref(), Some("Alphabet"));
    assert_eq!(summary.succeeded, 2);

    let mut numbers = sink.column(EntityKind::Company, "company_number");
    numbers.sort();
    assert_eq!(numbers, vec!["AAA", "BBB"]);
    assert!(sink.headers(EntityKind::Charge).is_some());
}

#[tokio::test]
async fn test_cancelled_batch_reports_every_company() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 2);
    let sink = MemorySink::new();
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    cancel_tx.send(true).unwrap();

    let summary = orchestrator
        .run_companies(
            RunId::new("c"),
            vec!["AAA".to_string(), "BBB".to_string()],
            &sink,
            cancel_rx,
        )
        .await;

    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.succeeded, 0);
    assert!(sink.rows(EntityKind::Company).is_empty());
}

#[tokio::test]
async fn test_cancel_lets_started_company_finish() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/company/AAA"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile("AAA", "ALPHA LTD"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_json(&server, "/company/AAA/officers", serde_json::json!({"items": []})).await;
    Mock::given(method("GET"))
        .and(path_regex("^/company/BBB"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile("BBB", "BETA LTD")))
        .expect(0)
        .mount(&server)
        .await;

    // One company at a time: AAA is in flight when the signal fires, BBB has not started
    let orchestrator = SearchOrchestrator::new(CompanyRetriever::new(create_test_client(&server)), 1);
    let sink = MemorySink::new();
    sink.write_headers().unwrap();
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);

    let (summary, _) = tokio::join!(
        orchestrator.run_companies(
            RunId::new("c"),
            vec!["AAA".to_string(), "BBB".to_string()],
            &sink,
            cancel_rx,
        ),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_tx.send(true).unwrap();
        }
    );

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.cancelled, 1);
    assert!(summary.outcome("AAA").unwrap().is_success());
    assert!(matches!(
        summary.outcome("BBB").unwrap(),
        CompanyOutcome::Cancelled { .. }
    ));
    assert_eq!(sink.column(EntityKind::Company, "company_number"), vec!["AAA"]);
    assert_eq!(sink.column(EntityKind::SicCode, "company_number"), vec!["AAA"]);
}

#[tokio::test]
async fn test_search_handler_requires_query() {
    let server = MockServer::start().await;
    let state = create_test_state(&server, std::env::temp_dir());

    let response = handlers::search(
        State(state),
        Query(SearchQueryParams {
            query: None,
            items_per_page: None,
            start_index: None,
        }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_handler_maps_upstream_failure_to_bad_gateway() {
    let server = MockServer::start().await;
    mount_status(&server, "/search", 500).await;
    let state = create_test_state(&server, std::env::temp_dir());

    let response = handlers::search(
        State(state),
        Query(SearchQueryParams {
            query: Some("acme".to_string()),
            items_per_page: None,
            start_index: None,
        }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_search_handler_returns_raw_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "acme"))
        .and(query_param("items_per_page", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"company_number": "AAA"}],
            "kind": "search#all"
        })))
        .mount(&server)
        .await;
    let state = create_test_state(&server, std::env::temp_dir());

    let axum::Json(result) = handlers::search(
        State(state),
        Query(SearchQueryParams {
            query: Some("acme".to_string()),
            items_per_page: None,
            start_index: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(result["kind"], "search#all");
    assert_eq!(result["items"][0]["company_number"], "AAA");
}

#[tokio::test]
async fn test_export_company_pads_number_and_writes_tables() {
    let server = MockServer::start().await;
    mount_json(&server, "/company/00000123", profile("00000123", "ACME LTD")).await;
    mount_json(
        &server,
        "/company/00000123/officers",
        serde_json::json!({"items": []}),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let state = create_test_state(&server, dir.path().to_path_buf());

    let (status, axum::Json(response)) =
        handlers::export_company(State(state), Path("123".to_string()))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.summary.run.prefix, "00000123");
    assert_eq!(response.files.len(), EntityKind::ALL.len());

    let companies = std::fs::read_to_string(&response.files[0]).unwrap();
    assert_eq!(companies.lines().count(), 2);
    assert!(companies.lines().nth(1).unwrap().starts_with("00000123,ACME LTD"));
}

#[tokio::test]
async fn test_export_company_rejects_invalid_number() {
    let server = MockServer::start().await;
    let state = create_test_state(&server, std::env::temp_dir());

    let response = handlers::export_company(State(state), Path("not/a/number".to_string()))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
