use serde::{Deserialize, Serialize};

use super::enums::Severity;

/// A drug name was blank after trimming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Drug name must not be empty")]
pub struct EmptyDrugName;

/// Two drugs evaluated together. Display order is preserved (target drug
/// first); matching against stored evidence ignores order and case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrugPair {
    first: String,
    second: String,
}

impl DrugPair {
    pub fn new(first: &str, second: &str) -> Result<Self, EmptyDrugName> {
        let first = first.trim();
        let second = second.trim();
        if first.is_empty() || second.is_empty() {
            return Err(EmptyDrugName);
        }
        Ok(Self {
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn label(&self) -> String {
        format!("{} + {}", self.first, self.second)
    }
}

/// One documented side effect for a drug combination, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectRecord {
    pub drug_name_1: String,
    pub drug_name_2: String,
    pub side_effect_name: String,
}

/// One web source gathered for a narrative analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebEvidenceItem {
    pub url: String,
    pub title: String,
    /// Empty when the page was fetched but yielded no readable text.
    pub extracted_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// LLM-written interaction analysis for one pair, built from web evidence.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeAnalysis {
    pub pair: DrugPair,
    pub report: String,
    pub sources: Vec<SourceRef>,
    /// Result count asked of the search provider.
    pub sources_requested: usize,
    pub sources_scraped: usize,
}

/// Terminal artifact of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicatedVerdict {
    pub severity: Severity,
    pub report: String,
    pub reasoning: String,
}

impl AdjudicatedVerdict {
    /// Verdict for a target drug with no co-medications to compare against.
    pub fn no_pairs(target_drug: &str) -> Self {
        Self {
            severity: Severity::NoInteraction,
            report: format!(
                "No current medications were provided, so there are no drug pairs to \
                 evaluate for {target_drug}."
            ),
            reasoning: format!(
                "Interaction screening needs at least one co-medication; with none listed \
                 there is nothing that {target_drug} could interact with."
            ),
        }
    }
}

/// Patient record submitted with `/analyze`.
///
/// Only `test_drug` and `current_medications` drive pair generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientContext {
    pub test_drug: String,
    #[serde(default)]
    pub past_medications: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub supplements: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub adverse_events: Vec<String>,
    #[serde(default)]
    pub family_history: Vec<String>,
}

/// Patient profile submitted with `/analyze-patient-drug`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub past_medications: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub demographics: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub family_history: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Pipeline outputs
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPair {
    pub pair: String,
    pub reason: String,
}

/// What evidence a resolution actually had to work with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    pub pairs_evaluated: usize,
    pub pairs_with_records: usize,
    pub narratives: usize,
    pub skipped: Vec<SkippedPair>,
    /// Storage failed and no structured evidence reached adjudication.
    pub storage_unavailable: bool,
}

impl EvidenceSummary {
    /// Human-readable caveats worth surfacing alongside the verdict.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.storage_unavailable {
            notes.push(
                "The structured interaction database was unreachable; this verdict relies \
                 on web-derived analysis only."
                    .to_string(),
            );
        }
        for skipped in &self.skipped {
            notes.push(format!("{} was not evaluated: {}", skipped.pair, skipped.reason));
        }
        notes
    }
}

/// Verdict plus the evidence tally behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub verdict: AdjudicatedVerdict,
    pub evidence: EvidenceSummary,
}

/// Two-drug comparison without adjudication.
#[derive(Debug, Clone, Serialize)]
pub struct PairComparison {
    pub db_results: Vec<SideEffectRecord>,
    pub ai_analysis: NarrativeAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationConflict {
    pub drug: String,
    pub side_effects: Vec<SideEffectRecord>,
}

/// New-drug screen against a patient's current medications.
#[derive(Debug, Clone, Serialize)]
pub struct PatientScreening {
    pub conflicts: Vec<MedicationConflict>,
    pub ai_analysis: Option<NarrativeAnalysis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drug_pair_trims_and_preserves_order() {
        let pair = DrugPair::new("  Ibuprofen ", "aspirin").unwrap();
        assert_eq!(pair.first(), "Ibuprofen");
        assert_eq!(pair.second(), "aspirin");
        assert_eq!(pair.label(), "Ibuprofen + aspirin");
    }

    #[test]
    fn drug_pair_rejects_blank_names() {
        assert_eq!(DrugPair::new("", "aspirin"), Err(EmptyDrugName));
        assert_eq!(DrugPair::new("warfarin", "   "), Err(EmptyDrugName));
    }

    #[test]
    fn no_pairs_verdict_is_no_interaction() {
        let verdict = AdjudicatedVerdict::no_pairs("Metformin");
        assert_eq!(verdict.severity, Severity::NoInteraction);
        assert!(verdict.report.contains("Metformin"));
        assert!(verdict.reasoning.contains("Metformin"));
    }

    #[test]
    fn patient_context_fills_missing_lists() {
        let ctx: PatientContext =
            serde_json::from_str(r#"{"test_drug": "Warfarin", "current_medications": ["Aspirin"]}"#)
                .unwrap();
        assert_eq!(ctx.current_medications, vec!["Aspirin"]);
        assert!(ctx.allergies.is_empty());
        assert!(ctx.family_history.is_empty());
    }

    #[test]
    fn evidence_notes_cover_storage_and_skips() {
        let summary = EvidenceSummary {
            pairs_evaluated: 2,
            storage_unavailable: true,
            skipped: vec![SkippedPair {
                pair: "A + B".into(),
                reason: "deadline exceeded".into(),
            }],
            ..Default::default()
        };
        let notes = summary.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("unreachable"));
        assert!(notes[1].starts_with("A + B"));
        assert!(EvidenceSummary::default().notes().is_empty());
    }
}
