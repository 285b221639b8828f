//! Rent workbook export endpoint
//!
//! Picks the payload source (client, local ledger, vector-store lookup),
//! validates it and returns the filled template as an xlsx download.

use crate::error::AppError;
use crate::state::AppState;
use crate::workbook::{
    ledger::{self, LedgerError},
    lookup::LookupError,
    payload::{self, RentWorkbookPayload},
    template,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Media type of the exported workbook
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Response header naming where the data came from
pub const DATA_SOURCE_HEADER: &str = "x-rent-data-source";

/// Where the exported data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Complete payload sent by the client
    Client,
    /// Rebuilt from the local ledger file
    Local,
    /// Produced by the vector-store lookup
    Lookup,
}

impl DataSource {
    /// Header value
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Client => "client",
            DataSource::Local => "local",
            DataSource::Lookup => "lookup",
        }
    }

    fn context(&self) -> &'static str {
        match self {
            DataSource::Client => "client payload",
            DataSource::Local => "local ledger",
            DataSource::Lookup => "vector store lookup",
        }
    }
}

/// POST /api/rent-workbook
pub async fn export_rent_workbook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let body = serde_json::from_slice::<Value>(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid workbook payload: {}", e)))?;
    let (payload, source) = resolve_payload(&state, body).await?;

    let template_path = state.config.workbook.template_path.clone();
    let file_name = payload.file_name();
    let bytes = tokio::task::spawn_blocking(move || template::fill_template(&template_path, &payload))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Workbook task failed: {}", e)))??;

    info!(
        source = source.as_str(),
        file_name = %file_name,
        bytes = bytes.len(),
        "Rent workbook generated"
    );

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static(DATA_SOURCE_HEADER),
                HeaderValue::from_static(source.as_str()),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Choose and validate the payload to export
///
/// A complete client payload wins; otherwise the local ledger when its file
/// exists, then the lookup when one is configured.
async fn resolve_payload(
    state: &AppState,
    body: Value,
) -> Result<(RentWorkbookPayload, DataSource), AppError> {
    let year = state.config.workbook.year;

    let (value, source) = if !payload::needs_local_data(&body) {
        (body, DataSource::Client)
    } else {
        let data_dir = state.config.workbook.data_dir.clone();
        let path = ledger::ledger_path(&data_dir, year);
        if path.is_file() {
            info!(path = %path.display(), "Payload missing data; rebuilding from local ledger");
            let rebuilt = tokio::task::spawn_blocking(move || ledger::load_payload(&data_dir, year))
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Ledger task failed: {}", e)))??;
            let value = serde_json::to_value(&rebuilt).map_err(|e| AppError::Internal(e.into()))?;
            (value, DataSource::Local)
        } else if let Some(lookup) = &state.lookup {
            info!("Payload missing data and no local ledger; using vector store lookup");
            (lookup.fetch_payload().await?, DataSource::Lookup)
        } else {
            return Err(LedgerError::Missing(path).into());
        }
    };

    let payload = match payload::validate(&value, year, source.context()) {
        Ok(payload) => payload,
        Err(e) if source == DataSource::Lookup => return Err(LookupError::from(e).into()),
        Err(e) => return Err(e.into()),
    };
    Ok((payload, source))
}
