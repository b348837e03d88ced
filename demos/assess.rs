use std::sync::Arc;
use std::time::Instant;

use pronounce_rs::{
    engines::pronunciation::{
        AssessmentRequest, AudioQuality, AudioReport, InMemoryHistory, PronunciationEngine,
        RecognizedWord,
    },
    PronunciationAssessor,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let setup_start = Instant::now();
    #[cfg(feature = "espeak")]
    let engine = PronunciationEngine::with_espeak(None, None);
    #[cfg(not(feature = "espeak"))]
    let engine = PronunciationEngine::new();
    let engine = engine.with_history(Arc::new(InMemoryHistory::new()));
    println!("Engine ready in {:.2?}", setup_start.elapsed());

    println!(
        "Native languages: {:?}",
        engine.l1_registry().languages()
    );

    let request = AssessmentRequest::from_transcript("think this", "tink dis")
        .with_native_language("spanish")
        .with_learner("demo-learner");

    let assess_start = Instant::now();
    let assessment = engine.assess(&request);
    println!("Assessed in {:.2?}", assess_start.elapsed());
    println!("{}", serde_json::to_string_pretty(&assessment)?);

    // Same phrase with per-word confidences and a noisy recording.
    let request = AssessmentRequest {
        reference_text: "very good water".to_string(),
        recognized: vec![
            RecognizedWord::new("wery").with_confidence(0.71).with_span(0, 380),
            RecognizedWord::new("good").with_confidence(0.55).with_span(380, 640),
            RecognizedWord::new("wata").with_confidence(0.64).with_span(640, 1100),
        ],
        native_language: Some("hi".to_string()),
        audio: AudioReport {
            quality: AudioQuality::Poor,
            snr_db: Some(6.5),
        },
        learner_id: Some("demo-learner".to_string()),
    };

    let assessment = engine.assess(&request);
    println!(
        "Overall {:.1} (audio adjusted: {})",
        assessment.overall_score, assessment.audio_quality_adjusted
    );
    for word in &assessment.word_scores {
        println!(
            "  {:<8} {:>5.1}  {:?}  {:?}",
            word.word, word.score, word.issues, word.problem_phonemes
        );
    }
    for tip in &assessment.ranked_tips {
        println!("  tip: {}", tip.text);
    }
    println!("{}", assessment.encouragement);

    Ok(())
}
