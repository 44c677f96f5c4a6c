//! Fuzz target for search filter validation.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_filter_validation -- -max_total_time=600

#![no_main]

use arbitrary::Arbitrary;
use dirtree_core::search::validate_filter;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FilterInput {
    attribute: String,
    value: String,
    wrap: bool,
}

fuzz_target!(|input: FilterInput| {
    // Skip very long strings to avoid memory issues
    if input.attribute.len() > 256 || input.value.len() > 1024 {
        return;
    }

    let raw = format!("{}={}", input.attribute, input.value);
    let filter = if input.wrap { format!("({raw})") } else { raw };

    if validate_filter(&filter).is_ok() {
        let trimmed = filter.trim();
        assert!(trimmed.starts_with('(') && trimmed.ends_with(')'));
    }
});
