//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;
use crate::models::{
    AdjudicatedVerdict, EvidenceSummary, MedicationConflict, PatientProfile, SideEffectRecord,
    SourceRef,
};

/// Shared context for all routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub drug1: String,
    pub drug2: String,
}

#[derive(Debug, Deserialize)]
pub struct PatientDrugRequest {
    pub patient_info: PatientProfile,
    pub new_drug: String,
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

/// `{severity, report, reasoning}` plus the evidence tally.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub verdict: AdjudicatedVerdict,
    pub evidence: EvidenceSummary,
}

#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    pub db_results: Vec<SideEffectRecord>,
    pub ai_analysis: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Serialize)]
pub struct PatientDrugResponse {
    pub conflicts: Vec<MedicationConflict>,
    pub ai_analysis: Option<String>,
    pub sources: Vec<SourceRef>,
}
