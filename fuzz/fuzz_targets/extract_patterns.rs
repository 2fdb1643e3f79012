// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(tree) = guardrail_core::SyntaxTree::parse(s, "new")
    {
        let patterns = guardrail_core::PatternExtractor::default().extract(&tree);
        for pattern in &patterns {
            assert!(pattern.line_range.start <= pattern.line_range.end);
            assert!(pattern.line_range.start >= 1);
        }
    }
});
