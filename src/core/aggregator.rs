//! Compliance aggregator.
//!
//! A plain merge of stage findings. It never looks at raw stage output; the
//! status follows from finding severities alone.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    ComplianceVerdict, FindingSet, Provenance, StageCompletion, StageName, StageRecord,
    VerdictStatus,
};

/// Stage findings in pipeline order
#[derive(Debug, Clone, Default)]
pub struct StageOutputs {
    pub extraction: FindingSet,
    pub quality: FindingSet,
    pub ai: FindingSet,
    pub regulatory: FindingSet,
}

/// Which stages ran, read off the audit trail
pub fn stage_completion(stages: &[StageRecord]) -> StageCompletion {
    let ran = |name: StageName| stages.iter().any(|s| s.stage == name && s.ran());
    StageCompletion {
        extraction: ran(StageName::Extraction),
        ai_validation: ran(StageName::AiValidation),
        regulatory_check: ran(StageName::RegulatoryCheck),
    }
}

/// Merge stage outputs into a verdict
pub fn aggregate(
    run_id: Uuid,
    filename: impl Into<String>,
    stages: Vec<StageRecord>,
    outputs: StageOutputs,
    provenance: Provenance,
) -> ComplianceVerdict {
    let mut findings = Vec::new();
    let mut recommendations = Vec::new();
    for set in [outputs.extraction, outputs.quality, outputs.ai, outputs.regulatory] {
        findings.extend(set.findings);
        recommendations.extend(set.recommendations);
    }

    let status = if findings.iter().any(|f| f.severity.requires_review()) {
        VerdictStatus::RequiresReview
    } else {
        VerdictStatus::Approved
    };

    ComplianceVerdict {
        run_id,
        filename: filename.into(),
        status,
        findings,
        recommendations,
        stage_completion: stage_completion(&stages),
        stages,
        provenance,
        completed_at: Utc::now(),
    }
}
