//! Benchmarks for artifact extraction and transition selection.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devflow::core::{StageId, Transcript};
use devflow::extract::{ArtifactExtractor, DelimiterConfig};
use devflow::pipeline::{PipelineSpec, RevisionCounter, TransitionTable};

fn sample_transcript(files_per_stage: usize) -> Transcript {
    let delimiters = DelimiterConfig::default();
    let mut transcript = Transcript::new();
    for stage in StageId::ALL {
        let mut output = format!("Notes from {stage}.\n");
        for i in 0..files_per_stage {
            let body = format!("def f{i}():\n    return {i}\n");
            output.push_str(&delimiters.render(&format!("{stage}_{i}.py"), &body));
            output.push('\n');
        }
        transcript.append(stage, output);
    }
    transcript
}

fn extraction_benchmark(c: &mut Criterion) {
    let extractor =
        ArtifactExtractor::new(&DelimiterConfig::default()).expect("default delimiters are valid");
    let small = sample_transcript(2);
    let large = sample_transcript(50);

    c.bench_function("extract_small_transcript", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&small))));
    });
    c.bench_function("extract_large_transcript", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&large))));
    });
}

fn transition_benchmark(c: &mut Criterion) {
    let table = TransitionTable::new(&PipelineSpec::standard());
    let mut transcript = Transcript::new();
    transcript.append(StageId::Implementation, "code");
    transcript.append(StageId::Review, "FIX_REQUIRED: handle division by zero");

    c.bench_function("select_next_rework", |b| {
        b.iter(|| {
            black_box(table.select_next(
                StageId::Review,
                black_box(&transcript),
                RevisionCounter::new(),
            ))
        });
    });
}

criterion_group!(benches, extraction_benchmark, transition_benchmark);
criterion_main!(benches);
