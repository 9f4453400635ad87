//! Fuzz target for RuleSetLoader::load_str
//!
//! Arbitrary rule file text must either load or fail with an error. A loaded
//! rule set must then answer checks for arbitrary names without panicking.

#![no_main]

use core_context::RequesterContext;
use core_protection::RuleSetLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(rules) = RuleSetLoader::new().load_str(data) {
        let requester = RequesterContext::new(["admin", "member"]);
        for action in ["create", "read", "update", "delete", "write"] {
            let _ = rules.check(data, action, &requester);
        }
    }
});
