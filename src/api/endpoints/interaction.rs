//! Two-drug comparison.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, InteractionRequest, InteractionResponse};

/// `POST /analyze-interaction`: stored side effects plus a narrative
/// analysis for one pair.
pub async fn compare(
    State(ctx): State<ApiContext>,
    payload: Result<Json<InteractionRequest>, JsonRejection>,
) -> Result<Json<InteractionResponse>, ApiError> {
    let Json(request) = payload?;
    let resolver = ctx.core.resolver()?;

    let comparison = resolver
        .compare(&request.drug1, &request.drug2, ctx.core.deadline())
        .await?;

    Ok(Json(InteractionResponse {
        db_results: comparison.db_results,
        ai_analysis: comparison.ai_analysis.report,
        sources: comparison.ai_analysis.sources,
    }))
}
