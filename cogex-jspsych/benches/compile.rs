use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pprof::criterion::{Output, PProfProfiler};

use cogex_core::{
    Block, Experiment, Expr, StimulusTemplate, TimelineTable, TimelineVariableRecord, TrialSpec,
};
use cogex_jspsych::{CompileOptions, OutputFormat, compile};

const COLORS: [(&str, &str); 4] = [("red", "f"), ("green", "j"), ("blue", "f"), ("yellow", "j")];

/// Stroop blocks with feedback and a running score, `records` rows each.
fn synthetic_experiment(blocks: usize, records: usize) -> Experiment {
    let table: TimelineTable = (0..records)
        .map(|i| {
            let (word, _) = COLORS[i % COLORS.len()];
            let (color, key) = COLORS[(i / COLORS.len()) % COLORS.len()];
            TimelineVariableRecord::new()
                .with("word", word.to_uppercase())
                .with("color", color)
                .with("correct", key)
        })
        .collect();
    let trials = vec![
        TrialSpec::fixation(500),
        TrialSpec::response(
            StimulusTemplate::text(Expr::timeline("word"), Expr::timeline("color")),
            ["f", "j"],
            Expr::timeline("correct"),
        )
        .with_duration(2000u64)
        .with_side_effect(
            "score",
            Expr::shared("score").add(Expr::if_else(Expr::bean("correct", 1), 1, 0)),
        ),
        TrialSpec::stimulus(StimulusTemplate::text(
            Expr::if_else(Expr::bean("correct", 1), "Correct!", "Wrong!"),
            Expr::if_else(Expr::bean("correct", 1), "green", "red"),
        ))
        .with_duration(800u64),
    ];
    let blocks = (0..blocks)
        .map(|_| Block::new(trials.clone(), table.clone()).randomized())
        .collect();
    Experiment::new(blocks).with_shared("score", 0)
}

pub fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (blocks, records) in [(1, 16), (4, 64), (16, 256)] {
        let experiment = synthetic_experiment(blocks, records);
        for format in [OutputFormat::Html, OutputFormat::Function] {
            let options = CompileOptions {
                format,
                ..CompileOptions::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{format:?}"), format!("{blocks}x{records}")),
                &experiment,
                |b, experiment| b.iter(|| compile(black_box(experiment), &options)),
            );
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
        .noise_threshold(0.02);
    targets = bench_compile
}

criterion_main!(benches);
