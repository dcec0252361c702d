//! Snapshot keys.
//!
//! Key = `<class>.<method>` or, with a scenario, `<class>.<method>[<scenario>]`.
//! A name override (the `snapshot_name`) replaces `<class>.<method>` as the base.
//!
//! Resolution is pure. Per-run uniqueness is enforced by `SnapshotFile::claim`,
//! because uniqueness is only meaningful inside one snapshot file.

use std::fmt;

use crate::error::{SnapResult, SnapshotError};

/// Identity of one test: grouping unit (`class`, in Rust the module path) + test function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestId {
    pub class: String,
    pub method: String,
    pub name_override: Option<String>,
}

impl TestId {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            name_override: None,
        }
    }

    /// Use an explicit snapshot name instead of `<class>.<method>`.
    pub fn with_snapshot_name(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    /// Key base without scenario.
    pub fn base_name(&self) -> String {
        match &self.name_override {
            Some(n) => n.clone(),
            None => format!("{}.{}", self.class, self.method),
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// Build a `TestId` for the enclosing function: class = `module_path!()`, method = fn name.
#[macro_export]
macro_rules! test_id {
    () => {{
        fn __quiversnap_here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let full = __type_name_of(__quiversnap_here);
        let full = full.strip_suffix("::__quiversnap_here").unwrap_or(full);
        let full = full.trim_end_matches("::{{closure}}");
        let method = full.rsplit("::").next().unwrap_or(full);
        $crate::key::TestId::new(module_path!(), method)
    }};
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    raw: String,
    has_scenario: bool,
}

impl SnapshotKey {
    /// Derive the key for `test` and an optional scenario.
    ///
    /// The key ends up on a header line of its own, so both the base name and the
    /// scenario must be non-empty single lines without surrounding whitespace.
    pub fn resolve(test: &TestId, scenario: Option<&str>) -> SnapResult<Self> {
        let base = test.base_name();
        if let Some(reason) = single_line_problem(&base) {
            return Err(SnapshotError::InvalidSnapshotName {
                name: base,
                reason: reason.to_string(),
            });
        }
        match scenario {
            None => Ok(Self {
                raw: base,
                has_scenario: false,
            }),
            Some(s) => {
                if let Some(reason) = single_line_problem(s) {
                    return Err(SnapshotError::InvalidScenario {
                        scenario: s.to_string(),
                        reason: reason.to_string(),
                    });
                }
                Ok(Self {
                    raw: format!("{base}[{s}]"),
                    has_scenario: true,
                })
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_scenario(&self) -> bool {
        self.has_scenario
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for SnapshotKey {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

fn single_line_problem(s: &str) -> Option<&'static str> {
    if s.is_empty() {
        Some("must not be empty")
    } else if s.contains('\n') || s.contains('\r') {
        Some("must be a single line")
    } else if s.trim() != s {
        Some("must not start or end with whitespace")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_without_scenario() {
        let id = TestId::new("my_crate::parser", "parses_empty");
        let k = SnapshotKey::resolve(&id, None).unwrap();
        assert_eq!(k.as_str(), "my_crate::parser.parses_empty");
        assert!(!k.has_scenario());
    }

    #[test]
    fn key_with_scenario_and_override() {
        let id = TestId::new("a", "b").with_snapshot_name("custom");
        let k = SnapshotKey::resolve(&id, Some("case 1")).unwrap();
        assert_eq!(k.as_str(), "custom[case 1]");
        assert!(k.has_scenario());
    }

    #[test]
    fn multiline_scenario_rejected() {
        let id = TestId::new("a", "b");
        let err = SnapshotKey::resolve(&id, Some("x\ny")).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidScenario { .. }));
    }

    #[test]
    fn snapshot_name_must_fit_a_header_line() {
        for bad in ["two\nlines", " padded", ""] {
            let id = TestId::new("a", "b").with_snapshot_name(bad);
            let err = SnapshotKey::resolve(&id, None).unwrap_err();
            assert!(matches!(err, SnapshotError::InvalidSnapshotName { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_id_macro_picks_up_function_name() {
        let id = crate::test_id!();
        assert_eq!(id.method, "test_id_macro_picks_up_function_name");
        assert_eq!(id.class, module_path!());
    }
}
