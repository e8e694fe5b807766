//! Interaction-resolution orchestrator.
//!
//! ```text
//! START -> EXPAND_PAIRS -> FOR_EACH_PAIR{LOOKUP, ANALYZE} -> AGGREGATE -> ADJUDICATE -> DONE
//! ```
//!
//! Pair work is blocking (SQLite, blocking HTTP) and runs on the blocking
//! pool, one task per pair, bounded by a semaphore. Results land in
//! index-addressed slots so aggregation order never depends on completion
//! order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::{Adjudicator, InteractionLookup, NarrativeAnalyzer, PairEvidence, PipelineError};
use crate::models::{
    AdjudicatedVerdict, DrugPair, EvidenceSummary, MedicationConflict, NarrativeAnalysis,
    PairComparison, PatientContext, PatientProfile, PatientScreening, Resolution,
    SideEffectRecord, SkippedPair,
};

const DEADLINE_SKIP_REASON: &str = "deadline reached before evaluation finished";

pub struct InteractionResolver {
    lookup: Arc<dyn InteractionLookup>,
    analyzer: Arc<NarrativeAnalyzer>,
    adjudicator: Arc<Adjudicator>,
    pair_limit: Arc<Semaphore>,
}

/// Raw results of one pair's lookup and narrative analysis.
struct PairOutcome {
    lookup: Result<Vec<SideEffectRecord>, PipelineError>,
    narrative: Result<NarrativeAnalysis, PipelineError>,
}

#[derive(Default)]
struct Aggregate {
    structured: Vec<PairEvidence>,
    narratives: Vec<String>,
    summary: EvidenceSummary,
    timed_out: usize,
}

impl InteractionResolver {
    pub fn new(
        lookup: Arc<dyn InteractionLookup>,
        analyzer: NarrativeAnalyzer,
        adjudicator: Adjudicator,
        max_concurrent_pairs: usize,
    ) -> Self {
        Self {
            lookup,
            analyzer: Arc::new(analyzer),
            adjudicator: Arc::new(adjudicator),
            pair_limit: Arc::new(Semaphore::new(max_concurrent_pairs.max(1))),
        }
    }

    /// Severity verdict for `target_drug` against every current medication.
    pub async fn resolve(
        &self,
        target_drug: &str,
        current_medications: &[String],
        deadline: Instant,
    ) -> Result<Resolution, PipelineError> {
        let pairs = expand_pairs(target_drug, current_medications)?;
        if pairs.is_empty() {
            tracing::info!(target_drug = %target_drug.trim(), "No co-medications, nothing to evaluate");
            return Ok(Resolution {
                verdict: AdjudicatedVerdict::no_pairs(target_drug.trim()),
                evidence: EvidenceSummary::default(),
            });
        }

        tracing::info!(
            target_drug = %target_drug.trim(),
            pairs = pairs.len(),
            "Resolving interactions"
        );

        let slots = self.evaluate_pairs(&pairs, deadline).await;
        let aggregate = aggregate(&pairs, slots);

        // Empty lookups alone are not evidence.
        if aggregate.summary.pairs_with_records == 0 && aggregate.summary.narratives == 0 {
            return Err(if aggregate.timed_out > 0 {
                PipelineError::DeadlineExceeded
            } else {
                PipelineError::NoEvidenceAvailable
            });
        }

        let notes = aggregate.summary.notes();
        let adjudicator = Arc::clone(&self.adjudicator);
        let Aggregate {
            structured,
            narratives,
            summary,
            ..
        } = aggregate;

        let adjudication_notes = notes.clone();
        let mut verdict = tokio::task::spawn_blocking(move || {
            adjudicator.adjudicate(&structured, &narratives, &adjudication_notes)
        })
        .await??;

        if !notes.is_empty() {
            verdict.report.push_str("\n\nEvidence notes:");
            for note in &notes {
                verdict.report.push_str("\n- ");
                verdict.report.push_str(note);
            }
        }

        Ok(Resolution {
            verdict,
            evidence: summary,
        })
    }

    /// `resolve` for a full patient record. Fields other than the test drug
    /// and current medications are accepted but not used.
    pub async fn resolve_patient(
        &self,
        patient: &PatientContext,
        deadline: Instant,
    ) -> Result<Resolution, PipelineError> {
        tracing::debug!(
            past_medications = patient.past_medications.len(),
            supplements = patient.supplements.len(),
            allergies = patient.allergies.len(),
            adverse_events = patient.adverse_events.len(),
            family_history = patient.family_history.len(),
            "Patient fields not used for pair generation"
        );
        self.resolve(&patient.test_drug, &patient.current_medications, deadline)
            .await
    }

    /// Lookup and narrative for a single pair, without adjudication.
    /// A failed lookup yields no records; a failed narrative is an error.
    pub async fn compare(
        &self,
        drug_a: &str,
        drug_b: &str,
        deadline: Instant,
    ) -> Result<PairComparison, PipelineError> {
        let pair = DrugPair::new(drug_a, drug_b)?;
        let lookup = Arc::clone(&self.lookup);
        let analyzer = Arc::clone(&self.analyzer);

        blocking_until(deadline, move || {
            let db_results = lookup
                .lookup(pair.first(), pair.second())
                .unwrap_or_else(|e| {
                    tracing::warn!(pair = %pair.label(), error = %e, "Lookup failed, continuing without records");
                    Vec::new()
                });
            let ai_analysis = analyzer.analyze(&pair)?;
            Ok(PairComparison {
                db_results,
                ai_analysis,
            })
        })
        .await
    }

    /// Screen `new_drug` against the patient's current medications. Every
    /// medication with recorded side effects is a conflict; only the first
    /// conflict gets a narrative analysis.
    pub async fn screen_new_drug(
        &self,
        patient: &PatientProfile,
        new_drug: &str,
        deadline: Instant,
    ) -> Result<PatientScreening, PipelineError> {
        let new_drug = new_drug.trim().to_string();
        if new_drug.is_empty() {
            return Err(PipelineError::InvalidInput("new_drug must not be empty".into()));
        }
        let medications: Vec<String> = patient
            .current_medications
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        let lookup = Arc::clone(&self.lookup);
        let analyzer = Arc::clone(&self.analyzer);

        blocking_until(deadline, move || {
            let mut conflicts = Vec::new();
            let mut last_error = None;
            let mut failures = 0;

            for medication in &medications {
                match lookup.lookup(&new_drug, medication) {
                    Ok(records) if !records.is_empty() => conflicts.push(MedicationConflict {
                        drug: medication.clone(),
                        side_effects: records,
                    }),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(new_drug = %new_drug, medication = %medication, error = %e, "Lookup failed");
                        failures += 1;
                        last_error = Some(e);
                    }
                }
            }

            if failures > 0 && failures == medications.len() {
                if let Some(e) = last_error {
                    return Err(e);
                }
            }

            let ai_analysis = conflicts
                .first()
                .and_then(|conflict| DrugPair::new(&new_drug, &conflict.drug).ok())
                .and_then(|pair| match analyzer.analyze(&pair) {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        tracing::warn!(pair = %pair.label(), error = %e, "Narrative for first conflict failed");
                        None
                    }
                });

            tracing::info!(new_drug = %new_drug, conflicts = conflicts.len(), "Screening complete");
            Ok(PatientScreening {
                conflicts,
                ai_analysis,
            })
        })
        .await
    }

    async fn evaluate_pairs(&self, pairs: &[DrugPair], deadline: Instant) -> Vec<Option<PairOutcome>> {
        let mut slots: Vec<Option<PairOutcome>> = pairs.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (idx, pair) in pairs.iter().cloned().enumerate() {
            let lookup = Arc::clone(&self.lookup);
            let analyzer = Arc::clone(&self.analyzer);
            let pair_limit = Arc::clone(&self.pair_limit);

            tasks.spawn(async move {
                let _permit = pair_limit
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
                let outcome = tokio::task::spawn_blocking(move || {
                    evaluate_pair(lookup.as_ref(), &analyzer, &pair)
                })
                .await?;
                Ok::<_, PipelineError>((idx, outcome))
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(None) => break,
                Ok(Some(Ok(Ok((idx, outcome))))) => slots[idx] = Some(outcome),
                Ok(Some(Ok(Err(e)))) => tracing::error!(error = %e, "Pair task failed"),
                Ok(Some(Err(e))) => tracing::error!(error = %e, "Pair task panicked or was cancelled"),
                Err(_) => {
                    tracing::warn!(pending = tasks.len(), "Deadline reached, abandoning unfinished pairs");
                    tasks.abort_all();
                    break;
                }
            }
        }

        slots
    }
}

fn evaluate_pair(
    lookup: &dyn InteractionLookup,
    analyzer: &NarrativeAnalyzer,
    pair: &DrugPair,
) -> PairOutcome {
    let lookup = lookup.lookup(pair.first(), pair.second());
    let narrative = analyzer.analyze(pair);
    PairOutcome { lookup, narrative }
}

fn aggregate(pairs: &[DrugPair], slots: Vec<Option<PairOutcome>>) -> Aggregate {
    let mut agg = Aggregate::default();
    let mut storage_failures = 0;

    for (pair, slot) in pairs.iter().zip(slots) {
        let label = pair.label();
        let Some(outcome) = slot else {
            agg.timed_out += 1;
            agg.summary.skipped.push(SkippedPair {
                pair: label,
                reason: DEADLINE_SKIP_REASON.to_string(),
            });
            continue;
        };

        match (outcome.lookup, outcome.narrative) {
            (Err(lookup_err), Err(narrative_err)) => {
                if matches!(lookup_err, PipelineError::StorageUnavailable(_)) {
                    storage_failures += 1;
                }
                tracing::warn!(pair = %label, %lookup_err, %narrative_err, "Skipping pair");
                agg.summary.skipped.push(SkippedPair {
                    pair: label,
                    reason: format!("lookup failed ({lookup_err}); narrative failed ({narrative_err})"),
                });
            }
            (lookup, narrative) => {
                agg.summary.pairs_evaluated += 1;
                match lookup {
                    Ok(records) => {
                        if !records.is_empty() {
                            agg.summary.pairs_with_records += 1;
                        }
                        agg.structured.push(PairEvidence {
                            pair: label.clone(),
                            side_effects: records,
                        });
                    }
                    Err(e) => {
                        if matches!(e, PipelineError::StorageUnavailable(_)) {
                            storage_failures += 1;
                        }
                        tracing::warn!(pair = %label, error = %e, "Continuing without structured evidence");
                    }
                }
                match narrative {
                    Ok(analysis) => {
                        agg.summary.narratives += 1;
                        agg.narratives.push(analysis.report);
                    }
                    Err(e) => {
                        tracing::warn!(pair = %label, error = %e, "Continuing without narrative");
                    }
                }
            }
        }
    }

    agg.summary.storage_unavailable = agg.structured.is_empty() && storage_failures > 0;
    agg
}

/// One pair per non-blank current medication, target drug first.
pub fn expand_pairs(
    target_drug: &str,
    current_medications: &[String],
) -> Result<Vec<DrugPair>, PipelineError> {
    if target_drug.trim().is_empty() {
        return Err(PipelineError::InvalidInput("test_drug must not be empty".into()));
    }
    current_medications
        .iter()
        .filter(|m| !m.trim().is_empty())
        .map(|m| DrugPair::new(target_drug, m).map_err(PipelineError::from))
        .collect()
}

async fn blocking_until<T, F>(deadline: Instant, work: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    match tokio::time::timeout_at(deadline, tokio::task::spawn_blocking(work)).await {
        Ok(joined) => joined?,
        Err(_) => Err(PipelineError::DeadlineExceeded),
    }
}
