//! Patient-level interaction verdict.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AnalyzeResponse, ApiContext};
use crate::models::PatientContext;

/// `POST /analyze`: adjudicated severity for `test_drug` against the
/// patient's current medications.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PatientContext>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(patient) = payload?;
    let resolver = ctx.core.resolver()?;

    tracing::info!(
        test_drug = %patient.test_drug,
        current_medications = patient.current_medications.len(),
        "Analyze request"
    );

    let resolution = resolver
        .resolve_patient(&patient, ctx.core.deadline())
        .await?;

    Ok(Json(AnalyzeResponse {
        verdict: resolution.verdict,
        evidence: resolution.evidence,
    }))
}
