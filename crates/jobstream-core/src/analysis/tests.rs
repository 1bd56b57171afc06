use super::*;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, Value)>>,
    completed: AtomicUsize,
}

impl Recorder {
    fn types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }
}

impl StreamEmitter for Recorder {
    fn emit(&self, _request_id: &str, event_type: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((event_type.to_string(), payload));
    }
}

impl CompletionNotifier for Recorder {
    fn source_complete(&self, _request_id: &str, _source: &str) {}

    fn completed(&self, _request_id: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fails on the given job id.
struct FailingScorer(&'static str);

#[async_trait]
impl Scorer for FailingScorer {
    async fn score(&self, _: &str, job_id: &str, _: &str, _: &str) -> Result<JobScore> {
        if job_id == self.0 {
            return Err(Error::Analysis(format!("cannot score {job_id}")));
        }
        Ok(JobScore {
            score: 0.5,
            rationale: "ok".to_string(),
        })
    }
}

#[tokio::test]
async fn test_heuristic_scorer() {
    let scorer = HeuristicScorer;
    let base = scorer.score("Gardener", "j", "t", "c").await.unwrap();
    assert!((base.score - 0.3).abs() < f64::EPSILON);

    let full = scorer
        .score("Rust backend engineer, async everything", "j", "SRE", "Acme")
        .await
        .unwrap();
    assert!((full.score - 1.0).abs() < 1e-9);
    assert_eq!(full.rationale, "Heuristic score for SRE @ Acme");
}

#[tokio::test]
async fn test_pipeline_event_sequence() {
    let recorder = Recorder::default();
    let request = AnalysisRequest {
        resume_text: "Rust developer".to_string(),
        job_ids: vec!["a".to_string(), "b".to_string()],
    };

    let outcome = run_analysis("r1", &request, &HeuristicScorer, &recorder, &recorder)
        .await
        .unwrap();

    assert_eq!(
        recorder.types(),
        vec![
            "analysisProgress",
            "jobAnalyzed",
            "jobAnalyzed",
            "generatingResume",
            "analysisComplete"
        ]
    );
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 1);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events[0].1["totalJobs"], 2);
    assert_eq!(events[2].1["jobId"], "b");
    assert_eq!(events[2].1["progress"], 2);
    assert_eq!(events[4].1["results"]["atsScore"], 60);

    assert_eq!(outcome.ats_score, 60);
    assert!(outcome.resume.contains("Rust developer"));
    assert!(outcome.resume.contains("Job a: Heuristic score"));
    assert!(outcome.cover_letter.starts_with("TAILORED COVER LETTER"));
    assert_eq!(outcome.insights[1], "Analyzed 2 job opportunities");
}

#[tokio::test]
async fn test_failure_emits_analysis_error() {
    let recorder = Recorder::default();
    let request = AnalysisRequest {
        resume_text: String::new(),
        job_ids: vec!["a".to_string(), "bad".to_string(), "c".to_string()],
    };

    let err = run_analysis("r1", &request, &FailingScorer("bad"), &recorder, &recorder)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Analysis(_)));

    assert_eq!(
        recorder.types(),
        vec!["analysisProgress", "jobAnalyzed", "analysisError"]
    );
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 0);
    let events = recorder.events.lock().unwrap();
    assert!(events[2].1["error"].as_str().unwrap().contains("cannot score bad"));
}

#[tokio::test]
async fn test_empty_job_list_rejected() {
    let recorder = Recorder::default();
    let err = run_analysis(
        "r1",
        &AnalysisRequest::default(),
        &HeuristicScorer,
        &recorder,
        &recorder,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(recorder.types().is_empty());
}
