// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for the metric query parser and builder.
// Run with: cargo +nightly fuzz run fuzz_query_parser
//
// Arbitrary input must be rejected with an error, never a panic. Anything
// that parses must also render, and the rendering must parse again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mqb_builder::{filter, parse_query, Render};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 4096 {
        return;
    }

    let _ = mqb_grammar::parse(input);

    let Ok(parsed) = parse_query(input) else {
        return;
    };
    if let Ok(rendered) = parsed.build() {
        assert!(
            parse_query(&rendered).is_ok(),
            "rendered query does not parse: {rendered:?}"
        );
    }
    let _ = parsed.filter(filter("fuzz").equal("1")).build();
});
