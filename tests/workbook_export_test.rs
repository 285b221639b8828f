//! Tests for the rent workbook export endpoint

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rent_desk_backend::api::workbook::{export_rent_workbook, DATA_SOURCE_HEADER};
use rent_desk_backend::chat::runtime::{AgentRuntime, DeltaStream, RunRequest, RuntimeError};
use rent_desk_backend::config::Config;
use rent_desk_backend::state::AppState;
use rent_desk_backend::workbook::template::write_blank_template;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Runtime whose only use here is the lookup's `complete` call
struct CannedLookup(Option<String>);

#[async_trait]
impl AgentRuntime for CannedLookup {
    async fn stream(&self, _request: RunRequest) -> Result<DeltaStream, RuntimeError> {
        Err(RuntimeError::Failed("streaming not used".to_string()))
    }

    async fn complete(&self, _request: RunRequest) -> Result<String, RuntimeError> {
        self.0
            .clone()
            .ok_or_else(|| RuntimeError::Failed("lookup unavailable".to_string()))
    }
}

fn full_payload(year: i32) -> Value {
    let properties: Vec<Value> = (1..=10)
        .map(|n| {
            let rows: Vec<Value> = (1..=12)
                .map(|m| {
                    json!({
                        "month_number": m,
                        "month": MONTHS[m - 1],
                        "rent_due": 950,
                        "housing_dept": "County Housing",
                        "housing_paid": 500,
                        "tenant_paid": 450,
                        "total_received": 950,
                        "month_balance_due": 0,
                        "year_balance_due": 0,
                        "remarks": ""
                    })
                })
                .collect();
            json!({
                "property_id": format!("KN{:02}", n),
                "property_address": format!("{} Elm St", n),
                "tenant_name": "Tenant",
                "period_months": 12,
                "rows": rows
            })
        })
        .collect();
    json!({
        "template_version": "property_rents_received_v1",
        "year": year,
        "properties": properties
    })
}

struct Fixture {
    dir: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let template = dir.path().join("templates").join("template.xlsx");
        write_blank_template(&template).expect("Failed to write template");

        let mut config = Config::default();
        config.workbook.template_path = template;
        config.workbook.data_dir = dir.path().join("data");
        Self { dir, config }
    }

    fn write_ledger(&self, body: &str) {
        let data_dir = self.dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        let header = "property_id\tproperty_address\ttenant_name\tmonth_number\tmonth_name\tscheduled_rent_amount\thousing_dept_name\thousing_amount_paid\ttenant_amount_paid\ttotal_amount_received\tmonth_balance_due\tyear_balance_due\tnotes";
        std::fs::write(
            data_dir.join("RENT_Payments_2025.txt"),
            format!("{}\n{}\n", header, body),
        )
        .unwrap();
    }

    fn state(self, lookup_reply: Option<&str>, vector_store: bool) -> (TempDir, Arc<AppState>) {
        let mut config = self.config;
        if vector_store {
            config.openai.vector_store_id = Some("vs_rent".to_string());
        }
        let runtime = Arc::new(CannedLookup(lookup_reply.map(str::to_string)));
        (self.dir, Arc::new(AppState::with_runtime(config, runtime)))
    }
}

async fn export(state: Arc<AppState>, body: Value) -> Response {
    export_raw(state, &body.to_string()).await
}

async fn export_raw(state: Arc<AppState>, body: &str) -> Response {
    match export_rent_workbook(State(state), Bytes::from(body.to_string())).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn error_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn source(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(DATA_SOURCE_HEADER)
        .and_then(|h| h.to_str().ok())
}

#[tokio::test]
async fn test_complete_client_payload_is_exported() {
    let (_dir, state) = Fixture::new().state(None, false);
    let response = export(state, full_payload(2025)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source(&response), Some("client"));
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|h| h.to_str().ok()),
        Some("attachment; filename=\"Rent_Workbook_2025.xlsx\"")
    );
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok()),
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_incomplete_payload_uses_local_ledger() {
    let fixture = Fixture::new();
    fixture.write_ledger("KN01\t1 Elm St\tAlice\t1\tJan\t$1,200.00\tCounty\t600\t600\t1200\t0\t0\tpaid");
    let (dir, state) = fixture.state(None, false);

    let response = export(state, json!({"properties": []})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source(&response), Some("local"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let out = dir.path().join("out.xlsx");
    std::fs::write(&out, &bytes).unwrap();
    let book = umya_spreadsheet::reader::xlsx::read(&out).unwrap();
    let kn01 = book.get_sheet_by_name("KN01").unwrap();
    assert_eq!(kn01.get_value("B4"), "1 Elm St");
    assert_eq!(kn01.get_value("B9"), "1200");
    assert_eq!(kn01.get_value("I10"), "Missing data");
}

#[tokio::test]
async fn test_missing_data_row_triggers_fallback() {
    let mut payload = full_payload(2025);
    payload["properties"][3]["rows"][5]["remarks"] = json!("missing data");

    let (_dir, state) = Fixture::new().state(None, false);
    let response = export(state, payload).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Missing data file:"));
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn test_lookup_used_without_ledger() {
    let reply = format!("```json\n{}\n```", full_payload(2025));
    let (_dir, state) = Fixture::new().state(Some(&reply), true);

    let response = export(state, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source(&response), Some("lookup"));
}

#[tokio::test]
async fn test_lookup_failure_is_server_error() {
    let (_dir, state) = Fixture::new().state(None, true);
    let response = export(state, json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Rent data lookup failed:"));
}

#[tokio::test]
async fn test_invalid_lookup_payload_is_server_error() {
    let reply = full_payload(2024).to_string();
    let (_dir, state) = Fixture::new().state(Some(&reply), true);

    let response = export(state, json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(response).await["error"],
        "Rent data lookup failed: agent payload is invalid: year must be 2025"
    );
}

#[tokio::test]
async fn test_invalid_client_payload_is_bad_request() {
    let (_dir, state) = Fixture::new().state(None, false);
    let response = export(state, full_payload(2024)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await["error"], "year must be 2025");
}

#[tokio::test]
async fn test_bad_ledger_amount_is_local_data_error() {
    let fixture = Fixture::new();
    fixture.write_ledger("KN02\t\t\t3\tMar\tabc\t\t\t\t\t\t\t");
    let (_dir, state) = fixture.state(None, false);

    let response = export(state, json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(response).await["error"],
        "Local data error: KN02 month 3: scheduled_rent_amount is not a number (abc)"
    );
}

#[tokio::test]
async fn test_non_finite_ledger_amount_is_local_data_error() {
    let fixture = Fixture::new();
    fixture.write_ledger("KN01\t\t\t1\tJan\tinf\t\t\t\t\t\t\t");
    let (_dir, state) = fixture.state(None, false);

    let response = export(state, json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(response).await["error"],
        "Local data error: KN01 month 1: scheduled_rent_amount is not a number (inf)"
    );
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let (_dir, state) = Fixture::new().state(None, false);
    let response = export_raw(state, "{\"year\": 2025,").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = error_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Bad request: Invalid workbook payload:"));
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_float_year_client_payload_is_exported() {
    let mut payload = full_payload(2025);
    payload["year"] = json!(2025.0);
    payload["properties"][0]["period_months"] = json!(12.0);

    let (_dir, state) = Fixture::new().state(None, false);
    let response = export(state, payload).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source(&response), Some("client"));
}

#[tokio::test]
async fn test_missing_template_is_reported() {
    let mut fixture = Fixture::new();
    fixture.config.workbook.template_path = Path::new("/nonexistent/template.xlsx").to_path_buf();
    let (_dir, state) = fixture.state(None, false);

    let response = export(state, full_payload(2025)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(response).await["error"],
        "Template not found: /nonexistent/template.xlsx"
    );
}
