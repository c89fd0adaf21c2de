use ci_explain::extract::{extract, DEFAULT_MAX_LINES};
use ci_explain::llm::normalize;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn synthetic_log(line_count: usize) -> String {
    let mut lines = Vec::with_capacity(line_count + 8);
    for i in 0..line_count {
        match i % 50 {
            0 => lines.push(format!("##[group]Run step {i}")),
            7 => lines.push(format!("WARN: retrying download {i}")),
            _ => lines.push(format!("2024-01-15T10:00:{:02}Z compiling crate_{i} v0.1.0", i % 60)),
        }
    }
    lines.push("##[error]Process completed with exit code 1.".to_string());
    lines.push("Traceback (most recent call last):".to_string());
    lines.push("  File \"build.py\", line 42, in <module>".to_string());
    lines.push("RuntimeError: linker failed".to_string());
    lines.join("\n")
}

fn bench_extract(c: &mut Criterion) {
    let log = synthetic_log(50_000);

    c.bench_function("extract_large_log", |b| {
        b.iter(|| {
            let parsed = extract(black_box(&log), DEFAULT_MAX_LINES);
            black_box(parsed.top_error.len());
        });
    });
}

fn bench_normalize(c: &mut Criterion) {
    let well_formed =
        r#"{"summary": "Linker failed", "remediations": ["install lld"], "patch": "run: apt-get install lld"}"#;
    let multiline_patch = "```json\n{\"summary\": \"Missing checkout\", \"remediations\": [\"add checkout\"], \"patch\": \"steps:\n  - uses: actions/checkout@v4\n  - run: make\"}\n```";
    let garbage = "The build failed because of something in the linker step. ".repeat(40);

    c.bench_function("normalize_direct", |b| {
        b.iter(|| black_box(normalize(black_box(well_formed))));
    });

    c.bench_function("normalize_field_reescape", |b| {
        b.iter(|| black_box(normalize(black_box(multiline_patch))));
    });

    c.bench_function("normalize_last_resort", |b| {
        b.iter(|| black_box(normalize(black_box(&garbage))));
    });
}

criterion_group!(perf_core, bench_extract, bench_normalize);
criterion_main!(perf_core);
