//! Fuzz target: `ChannelConfig::apply_form`
//!
//! Feeds arbitrary request bodies into the form parser and asserts that the
//! resulting record never leaves the accepted ranges, whatever the input.
//!
//! cargo fuzz run fuzz_config_form

#![no_main]

use libfuzzer_sys::fuzz_target;
use s0meter::config::{ChannelConfig, NAME_CAPACITY};

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };

    let mut rec = ChannelConfig::default_for(0);
    rec.pin = 4;
    let before = rec.clone();
    let changed = rec.apply_form(body);

    assert!(rec.validate().is_ok(), "form produced an invalid record");
    assert!(rec.name.len() <= NAME_CAPACITY);
    assert!(changed || rec == before, "record changed without being reported");
});
