// SPDX-License-Identifier: Apache-2.0

//! Benchmark for parsing, extraction and correlation of a typical module.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use guardrail_core::{
    PatternExtractor, Revisions, SyntaxTree, correlate, diff_lines,
};

/// A module of ~600 lines with a guarded handler every few functions.
fn generate_module(guarded: bool) -> String {
    let mut code = String::new();
    for i in 0..100 {
        code.push_str(&format!("def load_item_{i}(item_id, state):\n"));
        if guarded && i % 4 == 0 {
            code.push_str("    if state.role != \"manager\":\n");
            code.push_str("        raise PermissionError(\"Managers only\")\n");
            code.push_str(&format!("    log_event(\"item_{i}\", state.session_id)\n"));
        }
        code.push_str("    item = fetch(item_id)\n");
        code.push_str("    return item\n\n");
    }
    code
}

fn bench_extract(c: &mut Criterion) {
    let extractor = PatternExtractor::default();
    let code = generate_module(true);

    c.bench_function("parse_and_extract_module", |b| {
        b.iter(|| {
            let tree = SyntaxTree::parse(black_box(&code), "new").unwrap();
            extractor.extract(&tree)
        });
    });
}

fn bench_correlate(c: &mut Criterion) {
    let extractor = PatternExtractor::default();
    let old = generate_module(true);
    let new = generate_module(false);
    let old_patterns = extractor.extract(&SyntaxTree::parse(&old, "old").unwrap());
    let new_patterns = extractor.extract(&SyntaxTree::parse(&new, "new").unwrap());

    c.bench_function("diff_and_correlate_module", |b| {
        b.iter(|| {
            let diff = diff_lines(black_box(&old), black_box(&new));
            correlate(
                Revisions {
                    old: Some(&old_patterns),
                    new: Some(&new_patterns),
                },
                &diff,
            )
        });
    });
}

criterion_group!(benches, bench_extract, bench_correlate);
criterion_main!(benches);
