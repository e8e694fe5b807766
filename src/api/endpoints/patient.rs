//! New-drug screen against a patient profile.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PatientDrugRequest, PatientDrugResponse};

/// `POST /analyze-patient-drug`
pub async fn screen(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PatientDrugRequest>, JsonRejection>,
) -> Result<Json<PatientDrugResponse>, ApiError> {
    let Json(request) = payload?;
    let resolver = ctx.core.resolver()?;

    let screening = resolver
        .screen_new_drug(&request.patient_info, &request.new_drug, ctx.core.deadline())
        .await?;

    let (ai_analysis, sources) = match screening.ai_analysis {
        Some(analysis) => (Some(analysis.report), analysis.sources),
        None => (None, Vec::new()),
    };

    Ok(Json(PatientDrugResponse {
        conflicts: screening.conflicts,
        ai_analysis,
        sources,
    }))
}
