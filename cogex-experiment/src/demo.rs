//! Built-in Stroop task-switching experiment.

use cogex_core::{Block, Experiment, Expr, StimulusTemplate, TimelineTable, TimelineVariableRecord, TrialSpec};

use crate::feedback::FeedbackStyle;

fn stroop_record(word: &str, color: &str, correct: &str) -> TimelineVariableRecord {
    let congruency = if word.eq_ignore_ascii_case(color) {
        "congruent"
    } else {
        "incongruent"
    };
    TimelineVariableRecord::new()
        .with("word", word)
        .with("color", color)
        .with("correct", correct)
        .with("congruency", congruency)
}

fn switch_record(task: &str, word: &str, color: &str) -> TimelineVariableRecord {
    TimelineVariableRecord::new()
        .with("task", task)
        .with("word", word)
        .with("color", color)
}

/// Key for a color or word name: red → j, green → f.
fn key_for(name: Expr) -> Expr {
    Expr::lookup(name, [("red", "j"), ("green", "f")])
}

/// Colour-naming Stroop block followed by a randomized task-switching block
/// in which a cue says whether to name the ink colour or read the word.
/// Correct responses count towards a shared `score`.
pub fn stroop_task_switching() -> Experiment {
    let score = Expr::shared("score").add(Expr::if_else(Expr::bean("correct", 1), 1, 0));
    // Fixation, onset gap, stimulus, offset gap, feedback: the stimulus is two
    // trials back when feedback is shown.
    let feedback = FeedbackStyle::default().with_window(2).trial(800);

    let stroop = Block::new(
        vec![
            TrialSpec::fixation(1000),
            TrialSpec::blank(400),
            TrialSpec::response(
                StimulusTemplate::text(Expr::timeline("word"), Expr::timeline("color")),
                ["f", "j"],
                Expr::timeline("correct"),
            )
            .with_duration(2000u64)
            .with_side_effect("score", score.clone()),
            TrialSpec::blank(300),
            feedback.clone(),
        ],
        TimelineTable::new(vec![
            stroop_record("red", "red", "j"),
            stroop_record("green", "green", "f"),
            stroop_record("green", "red", "j"),
            stroop_record("red", "green", "f"),
        ]),
    )
    .named("stroop");

    let cue = TrialSpec::stimulus(StimulusTemplate::text(
        Expr::lookup(Expr::timeline("task"), [("color", "COLOR"), ("word", "WORD")]),
        "white",
    ))
    .with_duration(500u64);
    let correct_key = Expr::lookup(
        Expr::timeline("task"),
        [
            ("color", key_for(Expr::timeline("color"))),
            ("word", key_for(Expr::timeline("word"))),
        ],
    );
    let switching = Block::new(
        vec![
            cue,
            TrialSpec::blank(400),
            TrialSpec::response(
                StimulusTemplate::text(Expr::timeline("word"), Expr::timeline("color")),
                ["f", "j"],
                correct_key,
            )
            .with_duration(2000u64)
            .with_side_effect("score", score),
            TrialSpec::blank(300),
            feedback,
        ],
        TimelineTable::new(vec![
            switch_record("color", "red", "green"),
            switch_record("word", "red", "green"),
            switch_record("color", "green", "green"),
            switch_record("word", "green", "red"),
        ]),
    )
    .named("task switching")
    .randomized();

    Experiment::new(vec![stroop, switching]).with_shared("score", 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExperimentConfig, ParticipantConfig};
    use crate::responder::SimulatedParticipant;
    use crate::state::ExperimentRunner;
    use cogex_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    #[test]
    fn demo_is_valid_and_sized() {
        let experiment = stroop_task_switching();

        assert!(experiment.validate().is_ok());
        assert_eq!(experiment.trial_count(), 40);
    }

    #[test]
    fn perfect_participant_scores_every_response_trial() {
        let config = ExperimentConfig {
            seed: Some(3),
            participant: ParticipantConfig {
                accuracy: 1.0,
                miss_rate: 0.0,
                rt_range_ms: (300, 600),
            },
            ..ExperimentConfig::default()
        };
        let mut participant =
            SimulatedParticipant::new(config.participant.clone(), StdRng::seed_from_u64(3));
        let runner = ExperimentRunner::new(config, ManualTimer::new(), StdRng::seed_from_u64(3));

        let log = runner.run(&stroop_task_switching(), &mut participant).unwrap();
        let summary = log.summary();

        assert_eq!(summary.trials, 40);
        assert_eq!(summary.response_trials, 8);
        assert_eq!(summary.correct, 8);
        assert_eq!(log.last().and_then(|r| r.echoed("text")), Some(&json!("Correct!")));
        let final_score = log.iter().filter_map(|r| r.echoed("score")).last();
        assert_eq!(final_score, Some(&json!(8)));
        assert_eq!(log.as_slice()[2].echoed("congruency"), Some(&json!("congruent")));
    }

    #[test]
    fn example_record_scores_by_key() {
        let record = stroop_record("green", "red", "j");
        assert_eq!(record.get("congruency"), Some(&json!("incongruent")));
        assert_eq!(record.get("correct"), Some(&json!("j")));
    }
}
