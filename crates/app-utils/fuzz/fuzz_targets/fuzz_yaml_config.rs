//! Fuzz target for YamlParser::parse
//!
//! Arbitrary YAML must parse into a configuration or fail with an error;
//! malformed, deeply nested or binary input must never panic.

#![no_main]

use app_utils::config::{ConfigParser, YamlParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(config) = YamlParser.parse(data) {
        let _ = config.with_overrides(|_| None);
    }
});
