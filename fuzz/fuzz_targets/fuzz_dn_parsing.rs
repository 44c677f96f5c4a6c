//! Fuzz target for distinguished name parsing.
//!
//! Malformed names must be rejected with an error, never a panic, and
//! every accepted name must agree with its own parent.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_dn_parsing -- -max_total_time=600

#![no_main]

use dirtree_core::dn::DistinguishedName;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(dn) = DistinguishedName::parse(s) else {
        return;
    };

    if let Some(parent) = dn.parent() {
        assert_eq!(parent.len() + 1, dn.len());
        assert!(parent.is_parent_of(&dn));
        assert!(dn.is_descendant_of(&parent));
    }

    // Rendering an accepted name must not panic, and neither may reparsing it
    let rendered = dn.to_string();
    let _ = DistinguishedName::parse(&rendered);
});
