use std::time::Duration;

use cogex_core::trial::echo_key;
use cogex_core::{Block, EvalContext, Experiment, SharedState, TimelineVariableRecord, TrialSpec};
use cogex_timing::Timer;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::config::ExperimentConfig;
use super::data::ResultLog;
use super::error::Result;
use super::presentation::{Capture, Presentation};
use super::responder::Responder;
use super::scoring;

/// Sequential reference evaluator of a timeline: one trial at a time, each
/// resolved against the records and results that came before it.
pub struct ExperimentRunner<T, R>
where
    T: Timer,
    R: Rng,
{
    pub timer: T,
    pub rng: R,
    pub config: ExperimentConfig,
    shared: SharedState,
    log: ResultLog,
}

impl<T, R> ExperimentRunner<T, R>
where
    T: Timer,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, timer: T, rng: R) -> Self {
        Self {
            timer,
            rng,
            config,
            shared: SharedState::new(),
            log: ResultLog::new(),
        }
    }

    /// Runs every block in order and returns the result log.
    pub fn run<P: Responder>(mut self, experiment: &Experiment, responder: &mut P) -> Result<ResultLog> {
        experiment.validate()?;
        self.shared = experiment.initial_state();
        info!(
            blocks = experiment.blocks.len(),
            trials = experiment.trial_count(),
            "starting run"
        );

        for (index, block) in experiment.blocks.iter().enumerate() {
            self.run_block(index, block, responder)?;
        }

        info!(
            trials = self.log.len(),
            elapsed_ms = self.timer.now_ms(),
            "run complete"
        );
        Ok(self.log)
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    fn run_block<P: Responder>(&mut self, index: usize, block: &Block, responder: &mut P) -> Result<()> {
        let order = self.block_order(block);
        debug!(
            block = index,
            name = block.name.as_deref().unwrap_or(""),
            iterations = order.len(),
            "block started"
        );
        for record in order {
            for spec in &block.trials {
                self.run_trial(spec, record, responder)?;
            }
        }
        Ok(())
    }

    /// Each repetition walks the table once, shuffled independently when the
    /// block asks for random order.
    fn block_order<'b>(&mut self, block: &'b Block) -> Vec<&'b TimelineVariableRecord> {
        let mut order = Vec::with_capacity(block.records().len() * block.repetitions);
        for _ in 0..block.repetitions {
            let mut records = block.records();
            if block.randomize_order {
                records.shuffle(&mut self.rng);
            }
            order.extend(records);
        }
        order
    }

    fn run_trial<P: Responder>(
        &mut self,
        spec: &TrialSpec,
        record: &TimelineVariableRecord,
        responder: &mut P,
    ) -> Result<()> {
        let trial_index = self.log.len();
        let presentation = {
            let ctx = EvalContext::new(record, self.log.as_slice(), &self.shared);
            Presentation::resolve(spec, &ctx)?
        };

        let started = self.timer.now();
        let raw = responder.respond(&presentation)?;
        let measured = self.timer.elapsed(started).as_millis() as u64;
        let capture = presentation.admit(Capture {
            rt_ms: raw.rt_ms.or(raw.response.as_ref().map(|_| measured)),
            ..raw
        });

        let length_ms = match presentation.duration_ms {
            Some(duration)
                if !(presentation.response_ends_trial && capture.response.is_some()) =>
            {
                duration
            }
            _ => capture.rt_ms.unwrap_or(measured),
        };
        let spent = self.timer.elapsed(started);
        let length = Duration::from_millis(length_ms);
        if length > spent {
            self.timer.sleep(length - spent);
        }

        let mut result = {
            let ctx = EvalContext::new(record, self.log.as_slice(), &self.shared);
            scoring::score(spec, &ctx, &presentation, &capture, trial_index, self.timer.now_ms())?
        };
        for effect in &spec.side_effects {
            let value = {
                let ctx = EvalContext::new(record, self.log.as_slice(), &self.shared)
                    .with_current(&result);
                effect.value.evaluate(&ctx)?
            };
            result.echo.insert(echo_key(&effect.target), value.clone());
            self.shared.insert(effect.target.clone(), value);
        }

        debug!(
            trial = trial_index,
            kind = spec.kind.as_str(),
            response = capture.response.as_deref().unwrap_or(""),
            rt = capture.rt_ms,
            correct = result.correct,
            "trial complete"
        );
        self.log.push(result);

        if self.config.inter_trial_interval_ms > 0 {
            self.timer
                .sleep(Duration::from_millis(self.config.inter_trial_interval_ms));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackStyle;
    use crate::responder::ScriptedResponder;
    use cogex_core::{Expr, StimulusTemplate, TimelineTable};
    use cogex_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn runner() -> ExperimentRunner<ManualTimer, StdRng> {
        ExperimentRunner::new(
            ExperimentConfig::default(),
            ManualTimer::new(),
            StdRng::seed_from_u64(7),
        )
    }

    fn stroop_block(records: Vec<TimelineVariableRecord>) -> Block {
        Block::new(
            vec![
                TrialSpec::fixation(500),
                TrialSpec::response(
                    StimulusTemplate::text(Expr::timeline("word"), Expr::timeline("color")),
                    ["f", "j"],
                    Expr::timeline("correct"),
                )
                .with_duration(2000u64),
                FeedbackStyle::default().trial(800),
            ],
            TimelineTable::new(records),
        )
    }

    fn green_in_red() -> TimelineVariableRecord {
        TimelineVariableRecord::new()
            .with("word", "green")
            .with("color", "red")
            .with("correct", "j")
    }

    #[test]
    fn scores_and_feeds_back_each_iteration() {
        let experiment = Experiment::new(vec![stroop_block(vec![green_in_red(); 3])]);
        let mut responder = ScriptedResponder::new([
            Capture::none(),
            Capture::key("j", 450),
            Capture::none(),
            Capture::none(),
            Capture::key("f", 600),
            Capture::none(),
            Capture::none(),
            Capture::none(),
            Capture::none(),
        ]);

        let log = runner().run(&experiment, &mut responder).unwrap();
        let results = log.as_slice();

        assert_eq!(results.len(), 9);
        assert!(results[0].correct);
        assert!(results[1].correct);
        assert_eq!(results[2].echoed("text"), Some(&json!("Correct!")));
        assert_eq!(results[2].echoed("color"), Some(&json!("green")));
        assert!(!results[4].correct);
        assert_eq!(results[5].echoed("text"), Some(&json!("Wrong!")));
        assert_eq!(results[5].echoed("color"), Some(&json!("red")));
        assert!(!results[7].correct);
        assert_eq!(results[8].echoed("text"), Some(&json!("Too slow!")));
    }

    #[test]
    fn clock_follows_trial_lengths() {
        let experiment = Experiment::new(vec![stroop_block(vec![green_in_red()])]);
        let mut responder =
            ScriptedResponder::new([Capture::none(), Capture::key("j", 450), Capture::none()]);

        let log = runner().run(&experiment, &mut responder).unwrap();
        let elapsed: Vec<u64> = log.iter().map(|r| r.time_elapsed).collect();

        assert_eq!(elapsed, [500, 950, 1750]);
        assert_eq!(log.as_slice()[1].rt, Some(450));
    }

    #[test]
    fn keys_outside_choices_and_late_keys_are_not_recorded() {
        let experiment = Experiment::new(vec![stroop_block(vec![green_in_red(); 2])]);
        let mut responder = ScriptedResponder::new([
            Capture::none(),
            Capture::key("x", 300),
            Capture::none(),
            Capture::none(),
            Capture::key("j", 2500),
        ]);

        let log = runner().run(&experiment, &mut responder).unwrap();
        let results = log.as_slice();

        assert_eq!(results[1].response, None);
        assert_eq!(results[1].rt, None);
        assert_eq!(results[4].response, None);
        assert_eq!(results[5].echoed("text"), Some(&json!("Too slow!")));
    }

    #[test]
    fn side_effects_update_shared_state_and_echo() {
        let trial = TrialSpec::response(StimulusTemplate::text("X", "white"), ["f"], "f")
            .with_side_effect(
                "score",
                Expr::shared("score").add(Expr::if_else(Expr::bean("correct", 1), 1, 0)),
            );
        let experiment = Experiment::new(vec![
            Block::new(vec![trial], TimelineTable::default()).repeated(3),
        ])
        .with_shared("score", 0);
        let mut responder = ScriptedResponder::new([
            Capture::key("f", 300),
            Capture::none(),
            Capture::key("f", 300),
        ]);

        let log = runner().run(&experiment, &mut responder).unwrap();
        let scores: Vec<_> = log.iter().map(|r| r.echoed("score").cloned()).collect();

        assert_eq!(scores, [Some(json!(1)), Some(json!(1)), Some(json!(2))]);
    }

    #[test]
    fn randomized_blocks_visit_every_record_each_repetition() {
        let records: Vec<_> = (0..6)
            .map(|i| green_in_red().with("id", i))
            .collect();
        let block = Block::new(
            vec![TrialSpec::stimulus(StimulusTemplate::text(Expr::timeline("id"), "white"))
                .with_duration(10u64)],
            TimelineTable::new(records),
        )
        .randomized()
        .repeated(2);
        let experiment = Experiment::new(vec![block]);

        let log = runner()
            .run(&experiment, &mut ScriptedResponder::default())
            .unwrap();
        let ids: Vec<i64> = log
            .iter()
            .map(|r| r.echoed("text").and_then(|v| v.as_i64()).unwrap())
            .collect();

        assert_eq!(ids.len(), 12);
        for half in ids.chunks(6) {
            let mut sorted = half.to_vec();
            sorted.sort();
            assert_eq!(sorted, [0, 1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn feedback_before_any_trial_is_an_error() {
        let experiment = Experiment::new(vec![Block::new(
            vec![FeedbackStyle::default().trial(800)],
            TimelineTable::default(),
        )]);

        let err = runner()
            .run(&experiment, &mut ScriptedResponder::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::RunError::Experiment(cogex_core::Error::DataWindow { .. })
        ));
    }
}
