use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cogex_core::{Experiment, TimelineTable, TrialResult};
use cogex_experiment::data::{strip_namespace, until_response};
use cogex_experiment::demo::stroop_task_switching;
use cogex_experiment::{
    ExperimentConfig, ExperimentRunner, PromptResponder, ReplayResponder, Responder, ResultLog,
    SimulatedParticipant, Summary,
};
use cogex_jspsych::{CompileOptions, SaveTarget};
use cogex_timing::{HighPrecisionTimer, ManualTimer, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::cli::{Commands, Replay};

pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compile {
            experiment,
            output,
            format,
            sync,
            save,
            title,
            timelines,
        } => {
            let experiment = load_experiment(&experiment, &timelines.tables)?;
            let options = CompileOptions {
                format: format.into(),
                is_async: !sync,
                save: save.as_deref().map(SaveTarget::from_path).transpose()?,
                title,
            };
            let program = cogex_jspsych::compile(&experiment, &options)?;
            write_output(output.as_deref(), &program)
        }
        Commands::Simulate {
            experiment,
            config,
            seed,
            output,
            strip,
            timelines,
            replay,
        } => {
            let experiment = load_experiment(&experiment, &timelines.tables)?;
            let mut config = load_config(config.as_deref())?;
            config.seed = seed.or(config.seed);
            let replayed = load_replay(&replay)?;

            let (runner_rng, participant_rng) = rngs(config.seed);
            let mut participant = ReplayResponder::new(
                &replayed,
                SimulatedParticipant::new(config.participant.clone(), participant_rng),
            );
            let runner = ExperimentRunner::new(config, ManualTimer::new(), runner_rng);
            let log = runner.run(&experiment, &mut participant)?;

            report(&log.summary());
            write_log(output.as_deref(), &log, strip)
        }
        Commands::Run {
            experiment,
            config,
            output,
            realtime,
            timelines,
            replay,
        } => {
            let experiment = load_experiment(&experiment, &timelines.tables)?;
            let config = load_config(config.as_deref())?;
            let replayed = load_replay(&replay)?;
            let stdin = io::stdin();
            let mut prompt =
                ReplayResponder::new(&replayed, PromptResponder::new(stdin.lock(), io::stdout()));

            let log = if realtime {
                execute(&experiment, config, HighPrecisionTimer::new(), &mut prompt)?
            } else {
                execute(&experiment, config, ManualTimer::new(), &mut prompt)?
            };
            println!();
            report(&log.summary());
            match output {
                Some(path) => write_log(Some(&path), &log, false),
                None => Ok(()),
            }
        }
        Commands::Demo { output } => {
            let experiment = stroop_task_switching();
            let json = serde_json::to_string_pretty(&experiment)?;
            write_output(output.as_deref(), &json)
        }
    }
}

fn execute<T: Timer, P: Responder>(
    experiment: &Experiment,
    config: ExperimentConfig,
    timer: T,
    responder: &mut P,
) -> Result<ResultLog> {
    let (rng, _) = rngs(config.seed);
    let runner = ExperimentRunner::new(config, timer, rng);
    Ok(runner.run(experiment, responder)?)
}

/// Runner and participant draw from separate streams so that changing the
/// participant does not change block order.
fn rngs(seed: Option<u64>) -> (StdRng, StdRng) {
    match seed {
        Some(seed) => (
            StdRng::seed_from_u64(seed),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
    }
}

fn load_experiment(path: &Path, tables: &[(String, PathBuf)]) -> Result<Experiment> {
    let mut experiment = Experiment::load(path)
        .with_context(|| format!("failed to load experiment from {}", path.display()))?;
    for (block, csv) in tables {
        let table = TimelineTable::from_csv(csv, None)
            .with_context(|| format!("failed to read timeline table {}", csv.display()))?;
        info!(block = %block, path = %csv.display(), records = table.len(), "replaced timeline table");
        experiment.block_mut(block)?.timeline = table;
    }
    info!(
        path = %path.display(),
        blocks = experiment.blocks.len(),
        "loaded experiment"
    );
    Ok(experiment)
}

/// Records of an earlier session to replay, cut after `until` responses.
fn load_replay(replay: &Replay) -> Result<Vec<TrialResult>> {
    let Some(path) = &replay.log else {
        return Ok(Vec::new());
    };
    let log = ResultLog::load_json(path)
        .with_context(|| format!("failed to load result log from {}", path.display()))?;
    let records = match replay.until {
        Some(n) => until_response(log.as_slice(), n),
        None => log.as_slice(),
    };
    info!(path = %path.display(), records = records.len(), "replaying responses");
    Ok(records.to_vec())
}

fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    match path {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ExperimentConfig::default()),
    }
}

fn write_log(path: Option<&Path>, log: &ResultLog, strip: bool) -> Result<()> {
    let json = if strip {
        serde_json::to_string_pretty(&strip_namespace(log.as_slice())?)?
    } else {
        log.to_json_string()?
    };
    write_output(path, &json)
}

fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = contents.len(), "wrote output");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

fn report(summary: &Summary) {
    let accuracy = summary
        .accuracy()
        .map(|a| format!("{:.1}%", a * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    let mean_rt = summary
        .mean_rt_ms
        .map(|rt| format!("{rt:.0}ms"))
        .unwrap_or_else(|| "n/a".to_string());
    eprintln!(
        "{} trials, {}/{} responses, accuracy {accuracy}, mean rt {mean_rt}",
        summary.trials, summary.responses, summary.response_trials
    );
}
