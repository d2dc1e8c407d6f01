use std::collections::VecDeque;
use std::io::{BufRead, Write};

use cogex_core::TrialResult;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::config::ParticipantConfig;
use crate::error::Result;
use crate::presentation::{Capture, Presentation};

/// Stands in for the subject: sees a resolved trial and returns the key
/// press, if any. An `rt_ms` of `None` with a response means the runner
/// measures the reaction time on its own clock.
pub trait Responder {
    fn respond(&mut self, presentation: &Presentation) -> Result<Capture>;
}

/// Replays previously captured responses in order; once exhausted every
/// trial gets no response.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponder {
    captures: VecDeque<Capture>,
}

impl ScriptedResponder {
    pub fn new(captures: impl IntoIterator<Item = Capture>) -> Self {
        Self {
            captures: captures.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.captures.len()
    }
}

impl Responder for ScriptedResponder {
    fn respond(&mut self, _presentation: &Presentation) -> Result<Capture> {
        Ok(self.captures.pop_front().unwrap_or_else(|| {
            debug!("script exhausted, no response");
            Capture::none()
        }))
    }
}

/// Resumes an interrupted session: the captures of an earlier log are
/// replayed trial by trial, then `fallback` takes over.
#[derive(Debug, Clone)]
pub struct ReplayResponder<R: Responder> {
    replay: ScriptedResponder,
    fallback: R,
}

impl<R: Responder> ReplayResponder<R> {
    pub fn new(records: &[TrialResult], fallback: R) -> Self {
        let captures = records.iter().map(|record| Capture {
            response: record.response.clone(),
            rt_ms: record.rt,
        });
        Self {
            replay: ScriptedResponder::new(captures),
            fallback,
        }
    }

    pub fn remaining(&self) -> usize {
        self.replay.remaining()
    }

    pub fn into_inner(self) -> R {
        self.fallback
    }
}

impl<R: Responder> Responder for ReplayResponder<R> {
    fn respond(&mut self, presentation: &Presentation) -> Result<Capture> {
        if self.replay.remaining() == 0 {
            return self.fallback.respond(presentation);
        }
        let capture = self.replay.respond(presentation)?;
        if self.replay.remaining() == 0 {
            debug!("replay finished, handing over");
        }
        Ok(capture)
    }
}

/// Random participant that answers correctly with probability `accuracy`,
/// misses with probability `miss_rate`, and responds within `rt_range_ms`.
#[derive(Debug, Clone)]
pub struct SimulatedParticipant<R: Rng> {
    config: ParticipantConfig,
    rng: R,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(config: ParticipantConfig, rng: R) -> Self {
        Self { config, rng }
    }
}

impl<R: Rng> Responder for SimulatedParticipant<R> {
    fn respond(&mut self, presentation: &Presentation) -> Result<Capture> {
        if presentation.choices.is_empty() || self.rng.random::<f64>() < self.config.miss_rate {
            return Ok(Capture::none());
        }
        let (lo, hi) = self.config.rt_range_ms;
        let rt = self.rng.random_range(lo..=hi);

        let expected = presentation
            .correct_key
            .as_str()
            .filter(|key| presentation.accepts(key));
        let key = match expected {
            Some(key) if self.rng.random::<f64>() < self.config.accuracy => key.to_string(),
            _ => {
                let others: Vec<&String> = presentation
                    .choices
                    .iter()
                    .filter(|c| Some(c.as_str()) != expected)
                    .collect();
                let pool = if others.is_empty() {
                    presentation.choices.iter().collect()
                } else {
                    others
                };
                match pool.choose(&mut self.rng) {
                    Some(key) => key.to_string(),
                    None => return Ok(Capture::none()),
                }
            }
        };
        Ok(Capture::key(key, rt))
    }
}

/// Text-mode subject: prints each screen and reads one line per response
/// trial. An empty line or end of input counts as no response.
pub struct PromptResponder<I: BufRead, O: Write> {
    input: I,
    output: O,
}

impl<I: BufRead, O: Write> PromptResponder<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}

impl<I: BufRead, O: Write> Responder for PromptResponder<I, O> {
    fn respond(&mut self, presentation: &Presentation) -> Result<Capture> {
        if presentation.choices.is_empty() {
            writeln!(self.output, "{}", presentation.describe())?;
            return Ok(Capture::none());
        }
        write!(self.output, "{} You press <<", presentation.describe())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Capture::none());
        }
        let key = line.trim().to_lowercase();
        if key.is_empty() {
            return Ok(Capture::none());
        }
        Ok(Capture {
            response: Some(key),
            rt_ms: None,
        })
    }
}
