use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cogex_jspsych::OutputFormat;

#[derive(Parser)]
#[command(
    name = "cogex",
    about = "Build, simulate and compile trial timelines for keyboard-response experiments",
    version
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile an experiment definition to a jsPsych program
    Compile {
        /// Experiment definition (JSON)
        experiment: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,

        /// Emit a synchronous `runExperiment()` (function format only)
        #[arg(long)]
        sync: bool,

        /// Have the browser save the data when the run ends (.json or .csv)
        #[arg(long)]
        save: Option<String>,

        /// Page title (html format only)
        #[arg(long, default_value = "Experiment")]
        title: String,

        #[command(flatten)]
        timelines: Timelines,
    },

    /// Run an experiment against a simulated participant
    Simulate {
        experiment: PathBuf,

        /// Runner and participant settings (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the result log (JSON); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write rows without the parameter namespace
        #[arg(long)]
        strip: bool,

        #[command(flatten)]
        timelines: Timelines,

        #[command(flatten)]
        replay: Replay,
    },

    /// Run an experiment in the terminal, one prompt per screen
    Run {
        experiment: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Wait out trial durations and measure reaction times on the wall
        /// clock
        #[arg(long)]
        realtime: bool,

        #[command(flatten)]
        timelines: Timelines,

        #[command(flatten)]
        replay: Replay,
    },

    /// Write the Stroop / task switching demo experiment
    Demo {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct Timelines {
    /// Replace a block's variable table with the rows of a CSV file; the
    /// block is given by name or position (repeatable)
    #[arg(long = "timeline", value_name = "BLOCK=PATH", value_parser = parse_assignment)]
    pub tables: Vec<(String, PathBuf)>,
}

#[derive(Args, Debug, Default)]
pub struct Replay {
    /// Result log of an earlier session whose responses are replayed before
    /// the participant takes over
    #[arg(long = "replay", value_name = "LOG")]
    pub log: Option<PathBuf>,

    /// Replay only up to the N-th response of the log
    #[arg(long, value_name = "N", requires = "log")]
    pub until: Option<usize>,
}

fn parse_assignment(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((block, path)) if !block.is_empty() && !path.is_empty() => {
            Ok((block.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected BLOCK=PATH, got `{arg}`")),
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    Html,
    Script,
    Function,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => OutputFormat::Html,
            Format::Script => OutputFormat::Script,
            Format::Function => OutputFormat::Function,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_assignment_splits_on_first_equals() {
        assert_eq!(
            parse_assignment("stroop=tables/a=b.csv").unwrap(),
            ("stroop".to_string(), PathBuf::from("tables/a=b.csv"))
        );
        assert!(parse_assignment("stroop.csv").is_err());
        assert!(parse_assignment("=a.csv").is_err());
    }

    #[test]
    fn until_requires_replay() {
        assert!(Cli::try_parse_from(["cogex", "simulate", "e.json", "--until", "3"]).is_err());

        let cli = Cli::try_parse_from([
            "cogex", "run", "e.json", "--replay", "log.json", "--until", "3", "--timeline", "0=t.csv",
        ])
        .unwrap();
        let Commands::Run { replay, timelines, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(replay.until, Some(3));
        assert_eq!(timelines.tables, [("0".to_string(), PathBuf::from("t.csv"))]);
    }
}
