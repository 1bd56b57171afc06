//! Analysis pipeline - score a resume against jobs and stream the progress.

use crate::error::{Error, Result};
use crate::ports::{CompletionNotifier, StreamEmitter};
use async_trait::async_trait;
use jobstream_bus::event_types as events;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use tracing::{error, info};

/// Input of one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Candidate resume
    #[serde(default)]
    pub resume_text: String,
    /// Job ids (or URLs) to score
    #[serde(default)]
    pub job_ids: Vec<String>,
}

/// Score of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobScore {
    /// Fit in `[0, 1]`
    pub score: f64,
    /// Short explanation
    pub rationale: String,
}

/// Final analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Tailored resume text
    pub resume: String,
    /// Tailored cover letter text
    pub cover_letter: String,
    /// Average score as a percentage
    pub ats_score: u32,
    /// Human-readable insights
    pub insights: Vec<String>,
}

/// Scores a resume against one job.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score `resume_text` for the job.
    async fn score(
        &self,
        resume_text: &str,
        job_id: &str,
        job_title: &str,
        company: &str,
    ) -> Result<JobScore>;
}

/// Keyword heuristic: 0.3 base, +0.3 rust, +0.2 backend, +0.2 async, capped at 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

#[async_trait]
impl Scorer for HeuristicScorer {
    async fn score(
        &self,
        resume_text: &str,
        _job_id: &str,
        job_title: &str,
        company: &str,
    ) -> Result<JobScore> {
        let text = resume_text.to_lowercase();
        let mut score: f64 = 0.3;
        for (keyword, weight) in [("rust", 0.3), ("backend", 0.2), ("async", 0.2)] {
            if text.contains(keyword) {
                score += weight;
            }
        }
        Ok(JobScore {
            score: score.min(1.0),
            rationale: format!("Heuristic score for {job_title} @ {company}"),
        })
    }
}

/// Run the analysis pipeline.
///
/// On failure `analysisError` is emitted and the error is returned; the
/// notifier is only called on success.
pub async fn run_analysis(
    request_id: &str,
    request: &AnalysisRequest,
    scorer: &dyn Scorer,
    emitter: &dyn StreamEmitter,
    notifier: &dyn CompletionNotifier,
) -> Result<AnalysisOutcome> {
    if request.job_ids.is_empty() {
        return Err(Error::InvalidRequest(
            "provide at least one job id or url".to_string(),
        ));
    }

    info!(request_id = %request_id, jobs = request.job_ids.len(), "Starting analysis");
    match analyze(request_id, request, scorer, emitter).await {
        Ok(outcome) => {
            notifier.completed(request_id);
            info!(request_id = %request_id, ats_score = outcome.ats_score, "Analysis completed");
            Ok(outcome)
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Analysis failed");
            emitter.emit(
                request_id,
                events::ANALYSIS_ERROR,
                json!({ "kind": events::ANALYSIS_ERROR, "stage": "error", "error": e.to_string() }),
            );
            Err(e)
        }
    }
}

async fn analyze(
    request_id: &str,
    request: &AnalysisRequest,
    scorer: &dyn Scorer,
    emitter: &dyn StreamEmitter,
) -> Result<AnalysisOutcome> {
    let total = request.job_ids.len();
    emitter.emit(
        request_id,
        events::ANALYSIS_PROGRESS,
        json!({
            "kind": events::ANALYSIS_PROGRESS,
            "stage": "starting",
            "message": "Beginning job analysis",
            "totalJobs": total,
        }),
    );

    // Job metadata is not looked up yet; every job is scored as a generic role.
    let (job_title, company) = ("Software Engineer", "Tech Company");

    let mut total_score = 0.0;
    let mut insights = String::new();
    for (index, job_id) in request.job_ids.iter().enumerate() {
        let result = scorer
            .score(&request.resume_text, job_id, job_title, company)
            .await?;
        total_score += result.score;
        let _ = writeln!(insights, "Job {job_id}: {}", result.rationale);

        emitter.emit(
            request_id,
            events::JOB_ANALYZED,
            json!({
                "kind": events::JOB_ANALYZED,
                "jobId": job_id,
                "score": result.score,
                "rationale": result.rationale,
                "progress": index + 1,
                "total": total,
            }),
        );
    }

    let average = total_score / total as f64;
    emitter.emit(
        request_id,
        events::GENERATING_RESUME,
        json!({
            "kind": events::GENERATING_RESUME,
            "stage": "resume_generation",
            "message": "Generating tailored resume and cover letter",
        }),
    );

    let outcome = AnalysisOutcome {
        resume: tailored_resume(&request.resume_text, &insights, average),
        cover_letter: cover_letter(&request.resume_text),
        ats_score: (average * 100.0).round() as u32,
        insights: vec![
            format!("Average match score: {:.1}%", average * 100.0),
            format!("Analyzed {total} job opportunities"),
            format!("Best matches found in {total} positions"),
        ],
    };

    emitter.emit(
        request_id,
        events::ANALYSIS_COMPLETE,
        json!({
            "kind": events::ANALYSIS_COMPLETE,
            "stage": "complete",
            "results": outcome,
        }),
    );
    Ok(outcome)
}

fn tailored_resume(resume: &str, insights: &str, average: f64) -> String {
    format!(
        "TAILORED RESUME\n\n\
         Based on your profile and job analysis:\n\
         {resume}\n\n\
         KEY HIGHLIGHTS FOR TARGET ROLES:\n\
         - Match Score: {:.0}%\n\
         - Optimized for ATS systems\n\
         - Tailored keywords included\n\n\
         INSIGHTS:\n{insights}",
        average * 100.0
    )
}

fn cover_letter(resume: &str) -> String {
    format!(
        "TAILORED COVER LETTER\n\n\
         Dear Hiring Manager,\n\n\
         I am excited to apply for the position. Based on my experience and the role requirements:\n\n\
         {resume}\n\n\
         My background aligns well with your needs, as evidenced by our analysis.\n\n\
         Best regards,\n\
         [Your Name]"
    )
}

#[cfg(test)]
mod tests;
