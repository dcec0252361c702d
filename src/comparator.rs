//! Comparators answer one question: does the stored text equal the fresh text?

use serde_json::Value;

use crate::strategy::StrategyContext;

pub trait SnapshotComparator: Send + Sync {
    fn matches(&self, stored: &str, fresh: &str) -> bool;

    /// Header-aware entry point; the engine calls this one.
    fn matches_in(&self, stored: &str, fresh: &str, _ctx: &StrategyContext) -> bool {
        self.matches(stored, fresh)
    }
}

/// Exact string equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextComparator;

impl SnapshotComparator for PlainTextComparator {
    fn matches(&self, stored: &str, fresh: &str) -> bool {
        stored == fresh
    }
}

/// Structural JSON equality (formatting and key order don't matter).
/// Falls back to exact equality when either side isn't valid JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonComparator;

impl SnapshotComparator for JsonComparator {
    fn matches(&self, stored: &str, fresh: &str) -> bool {
        match (
            serde_json::from_str::<Value>(stored),
            serde_json::from_str::<Value>(fresh),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => stored == fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_exact() {
        assert!(PlainTextComparator.matches("a", "a"));
        assert!(!PlainTextComparator.matches("a", "a "));
    }

    #[test]
    fn json_ignores_layout() {
        let c = JsonComparator;
        assert!(c.matches("{\"a\":1,\"b\":[1,2]}", "{\n  \"b\": [1, 2],\n  \"a\": 1\n}"));
        assert!(!c.matches("{\"a\":1}", "{\"a\":2}"));
        assert!(c.matches("not json", "not json"));
        assert!(!c.matches("not json", "{}"));
    }

    struct CaseInsensitiveWhenAsked;

    impl SnapshotComparator for CaseInsensitiveWhenAsked {
        fn matches(&self, stored: &str, fresh: &str) -> bool {
            stored == fresh
        }

        fn matches_in(&self, stored: &str, fresh: &str, ctx: &StrategyContext) -> bool {
            match ctx.header("case") {
                Some("ignore") => stored.eq_ignore_ascii_case(fresh),
                _ => self.matches(stored, fresh),
            }
        }
    }

    #[test]
    fn headers_reach_custom_comparators() {
        let c = CaseInsensitiveWhenAsked;
        let plain = StrategyContext::new("k");
        let relaxed = StrategyContext::new("k").with_header("case", "ignore");
        assert!(!c.matches_in("Abc", "abc", &plain));
        assert!(c.matches_in("Abc", "abc", &relaxed));
        assert!(PlainTextComparator.matches_in("a", "a", &relaxed));
    }
}
