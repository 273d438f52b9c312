//! The selection primitive and the record of passes it applied.
//!
//! [`select`] is the only way blocks get filtered. Every larger policy
//! (see [`crate::profile`]) is an ordered list of calls to it.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::TestBlock;

/// Errors raised while describing or applying selection passes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// A pass described in data carried a non-boolean `keep`.
    #[error("keep must be true or false, got {value}")]
    InvalidKeep {
        /// The offending value, rendered for the message.
        value: String,
    },

    /// A custom profile was requested that no settings file declares.
    #[error("unknown selection profile `{name}`")]
    UnknownProfile { name: String },
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// One call of [`select`]: a direction and its marker strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pass {
    #[serde(deserialize_with = "strict_keep")]
    pub keep: bool,
    pub matches: Vec<String>,
}

impl Pass {
    #[must_use]
    pub fn with<S: AsRef<str>>(matches: &[S]) -> Self {
        Self {
            keep: true,
            matches: matches.iter().map(|m| m.as_ref().to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn without<S: AsRef<str>>(matches: &[S]) -> Self {
        Self {
            keep: false,
            matches: matches.iter().map(|m| m.as_ref().to_owned()).collect(),
        }
    }

    /// Apply this pass to `blocks`, recording each marker in `report`.
    #[must_use]
    pub fn apply(
        &self,
        blocks: Vec<TestBlock>,
        report: &mut SelectionReport,
    ) -> Vec<TestBlock> {
        select_recorded(blocks, &self.matches, self.keep, report)
    }
}

/// Accepts a boolean and nothing else; everything else is [`SelectError::InvalidKeep`].
fn strict_keep<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeepVisitor;

    impl Visitor<'_> for KeepVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("true or false")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            Err(invalid_keep(format!("\"{v}\"")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Err(invalid_keep(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Err(invalid_keep(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Err(invalid_keep(v))
        }
    }

    deserializer.deserialize_any(KeepVisitor)
}

fn invalid_keep<E: de::Error>(value: impl fmt::Display) -> E {
    E::custom(SelectError::InvalidKeep {
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// SelectionReport
// ---------------------------------------------------------------------------

/// One applied filter pass over a single marker string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedPass {
    pub keep: bool,
    pub marker: String,
    pub before: usize,
    pub after: usize,
}

impl fmt::Display for AppliedPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.keep { "with" } else { "without" };
        write!(f, "Selecting tests {direction} {}", self.marker)
    }
}

/// Every pass applied during a run, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SelectionReport {
    /// Names of the profiles that ran, in order.
    pub profiles: Vec<String>,
    pub passes: Vec<AppliedPass>,
}

impl SelectionReport {
    pub fn begin_profile(&mut self, name: &str) {
        tracing::info!(profile = name, "applying selection profile");
        self.profiles.push(name.to_owned());
    }
}

// ---------------------------------------------------------------------------
// select
// ---------------------------------------------------------------------------

/// Keep (`keep = true`) or drop (`keep = false`) blocks by marker strings.
///
/// Each string is its own pass. Keeping retains blocks that contain every
/// string; dropping discards blocks that contain any of them. An empty
/// `match_strings` leaves `blocks` untouched. Relative order is preserved.
#[must_use]
pub fn select<S: AsRef<str>>(blocks: Vec<TestBlock>, match_strings: &[S], keep: bool) -> Vec<TestBlock> {
    select_recorded(blocks, match_strings, keep, &mut SelectionReport::default())
}

/// [`select`], appending one [`AppliedPass`] per string to `report`.
#[must_use]
pub fn select_recorded<S: AsRef<str>>(
    blocks: Vec<TestBlock>,
    match_strings: &[S],
    keep: bool,
    report: &mut SelectionReport,
) -> Vec<TestBlock> {
    match_strings.iter().fold(blocks, |blocks, marker| {
        let marker = marker.as_ref();
        let before = blocks.len();
        let kept: Vec<TestBlock> = blocks
            .into_iter()
            .filter(|b| b.contains(marker) == keep)
            .collect();
        let pass = AppliedPass {
            keep,
            marker: marker.to_owned(),
            before,
            after: kept.len(),
        };
        tracing::debug!(keep, marker, before, after = kept.len(), "{pass}");
        report.passes.push(pass);
        kept
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::block::extract_blocks;

    fn blocks(bodies: &[&str]) -> Vec<TestBlock> {
        let doc: String = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| format!("[t{i}]\ninputFile = in{i}\n{body}\n\n"))
            .collect();
        extract_blocks(&doc).blocks
    }

    fn names(blocks: &[TestBlock]) -> Vec<&str> {
        blocks.iter().map(TestBlock::name).collect()
    }

    #[test]
    fn keep_intersects_every_marker() {
        let bs = blocks(&["dim = 1\nUSE_RZ=TRUE", "dim = 1", "dim = 2\nUSE_RZ=TRUE"]);
        assert_eq!(names(&select(bs, &["dim = 1", "USE_RZ=TRUE"], true)), vec!["t0"]);
    }

    #[test]
    fn drop_removes_blocks_with_any_marker() {
        let bs = blocks(&["PRECISION=FLOAT", "USE_SINGLE_PRECISION_PARTICLES=TRUE", "dim = 3"]);
        let out = select(bs, &["PRECISION=FLOAT", "USE_SINGLE_PRECISION_PARTICLES=TRUE"], false);
        assert_eq!(names(&out), vec!["t2"]);
    }

    #[test]
    fn empty_marker_list_is_a_no_op() {
        let bs = blocks(&["a", "b"]);
        assert_eq!(select::<&str>(bs.clone(), &[], true), bs);
        assert_eq!(select::<&str>(bs.clone(), &[], false), bs);
    }

    #[test]
    fn order_is_preserved() {
        let bs = blocks(&["x", "y", "x", "x"]);
        assert_eq!(names(&select(bs, &["x"], true)), vec!["t0", "t2", "t3"]);
    }

    #[test]
    fn passes_are_recorded_per_marker() {
        let mut report = SelectionReport::default();
        let bs = blocks(&["QED=TRUE", "USE_EB=TRUE", "plain"]);
        let out = select_recorded(bs, &["QED=TRUE", "USE_EB=TRUE"], false, &mut report);
        assert_eq!(names(&out), vec!["t2"]);
        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[0].before, 3);
        assert_eq!(report.passes[0].after, 2);
        assert_eq!(report.passes[1].after, 1);
        assert_eq!(report.passes[0].to_string(), "Selecting tests without QED=TRUE");
    }

    #[test]
    fn pass_deserializes_boolean_keep() {
        let pass: Pass = toml::from_str("keep = true\nmatches = [\"dim = 2\"]").unwrap();
        assert_eq!(pass, Pass::with(&["dim = 2"]));
    }

    #[test]
    fn pass_rejects_non_boolean_keep() {
        for raw in ["keep = \"yes\"", "keep = 1", "keep = \"true\""] {
            let doc = format!("{raw}\nmatches = [\"x\"]");
            let err = toml::from_str::<Pass>(&doc).unwrap_err();
            assert!(
                err.to_string().contains("keep must be true or false"),
                "unexpected error for {raw}: {err}"
            );
        }
    }

    #[test]
    fn invalid_keep_display() {
        let err = SelectError::InvalidKeep {
            value: "\"maybe\"".to_owned(),
        };
        assert_eq!(err.to_string(), "keep must be true or false, got \"maybe\"");
    }

    fn arb_body() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["alpha", "beta", "gamma", "delta"]), 0..4)
            .prop_map(|words| words.join("\n"))
    }

    fn arb_markers() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::sample::select(vec!["alpha", "beta", "gamma", "delta"]).prop_map(String::from),
            0..4,
        )
    }

    proptest! {
        #[test]
        fn prop_keep_single_block(body in arb_body(), markers in arb_markers()) {
            let bs = blocks(&[body.as_str()]);
            let block = bs[0].clone();
            let out = select(bs, &markers, true);
            if markers.iter().all(|m| block.contains(m)) {
                prop_assert_eq!(out, vec![block]);
            } else {
                prop_assert!(out.is_empty());
            }
        }

        #[test]
        fn prop_drop_single_block(body in arb_body(), markers in arb_markers()) {
            let bs = blocks(&[body.as_str()]);
            let block = bs[0].clone();
            let out = select(bs, &markers, false);
            if markers.iter().any(|m| block.contains(m)) {
                prop_assert!(out.is_empty());
            } else {
                prop_assert_eq!(out, vec![block]);
            }
        }

        #[test]
        fn prop_select_never_invents_blocks(
            bodies in prop::collection::vec(arb_body(), 0..6),
            markers in arb_markers(),
            keep in any::<bool>(),
        ) {
            let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
            let bs = blocks(&refs);
            let out = select(bs.clone(), &markers, keep);
            prop_assert!(out.len() <= bs.len());
            prop_assert!(out.iter().all(|b| bs.contains(b)));
        }
    }
}
