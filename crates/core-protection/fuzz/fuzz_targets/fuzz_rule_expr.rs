//! Fuzz target for RuleExpr parser (stack safety)
//!
//! Deep nesting, long operator chains and unbalanced parentheses must be
//! rejected with an error, never a stack overflow or panic.

#![no_main]

use core_context::RequesterContext;
use core_protection::RuleExpr;
use libfuzzer_sys::fuzz_target;

fn no_rules<'a>(_: &str) -> Option<&'a RuleExpr> {
    None
}

fuzz_target!(|data: &str| {
    if let Ok(expr) = RuleExpr::parse(data) {
        let requester = RequesterContext::new(["member"]).with_user("fuzz");
        let _ = expr.evaluate(&requester, &no_rules, 0);
    }
});
