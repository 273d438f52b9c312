//! Named selection profiles.
//!
//! A profile is an ordered list of [`Pass`]es. The built-in profiles mirror
//! the CI matrix; each is activated by one flag in [`CiFlags`]. The
//! `rz-or-nompi` profile is the only one that is not a plain sequence: it
//! unions two subsets taken from the same input list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::TestBlock;
use crate::flags::CiFlags;
use crate::select::{Pass, SelectError, SelectionReport, select_recorded};

pub const DIM_1: &str = "dim = 1";
pub const DIM_2: &str = "dim = 2";
pub const DIM_3: &str = "dim = 3";
pub const RZ: &str = "USE_RZ=TRUE";
pub const FLOAT_PRECISION: &str = "PRECISION=FLOAT";
pub const SINGLE_PRECISION_PARTICLES: &str = "USE_SINGLE_PRECISION_PARTICLES=TRUE";
pub const NO_MPI: &str = "useMPI = 0";
pub const QED: &str = "QED=TRUE";
pub const EB: &str = "USE_EB=TRUE";

const SINGLE_PRECISION: [&str; 2] = [FLOAT_PRECISION, SINGLE_PRECISION_PARTICLES];

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// How a profile combines its passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Combine {
    /// Apply passes one after another.
    Sequence(Vec<Pass>),
    /// Apply each pass to the same input and concatenate the results.
    Union(Vec<Pass>),
}

/// A named selection policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub combine: Combine,
}

/// A profile declared in the settings file. Always a sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomProfile {
    pub name: String,
    #[serde(default)]
    pub passes: Vec<Pass>,
}

impl From<CustomProfile> for Profile {
    fn from(custom: CustomProfile) -> Self {
        Self {
            name: custom.name,
            combine: Combine::Sequence(custom.passes),
        }
    }
}

/// Options that do not come from the environment flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Drop repeated blocks from union profiles (first occurrence wins).
    pub dedupe_union: bool,
}

impl Profile {
    fn sequence(name: &str, passes: Vec<Pass>) -> Self {
        Self {
            name: name.to_owned(),
            combine: Combine::Sequence(passes),
        }
    }

    /// Narrow to one dimensionality, then exclude every orthogonal feature.
    fn regular_cartesian(name: &str, dim: &str, exclude_rz: bool) -> Self {
        let mut passes = vec![Pass::with(&[dim])];
        if exclude_rz {
            passes.push(Pass::without(&[RZ]));
        }
        passes.extend([
            Pass::without(&SINGLE_PRECISION),
            Pass::without(&[NO_MPI]),
            Pass::without(&[QED]),
            Pass::without(&[EB]),
        ]);
        Self::sequence(name, passes)
    }

    #[must_use]
    pub fn regular_cartesian_1d() -> Self {
        Self::regular_cartesian("regular-cartesian-1d", DIM_1, true)
    }

    #[must_use]
    pub fn regular_cartesian_2d() -> Self {
        Self::regular_cartesian("regular-cartesian-2d", DIM_2, true)
    }

    /// No RZ pass: RZ geometry never declares `dim = 3`.
    #[must_use]
    pub fn regular_cartesian_3d() -> Self {
        Self::regular_cartesian("regular-cartesian-3d", DIM_3, false)
    }

    #[must_use]
    pub fn single_precision() -> Self {
        Self::sequence("single-precision", vec![Pass::with(&SINGLE_PRECISION)])
    }

    #[must_use]
    pub fn rz_or_nompi() -> Self {
        Self {
            name: "rz-or-nompi".to_owned(),
            combine: Combine::Union(vec![Pass::with(&[RZ]), Pass::with(&[NO_MPI])]),
        }
    }

    #[must_use]
    pub fn qed() -> Self {
        Self::sequence("qed", vec![Pass::with(&[QED])])
    }

    #[must_use]
    pub fn eb() -> Self {
        Self::sequence("eb", vec![Pass::without(&[RZ]), Pass::with(&[EB])])
    }

    /// Run this profile over `blocks`.
    #[must_use]
    pub fn apply(
        &self,
        blocks: Vec<TestBlock>,
        options: &SelectOptions,
        report: &mut SelectionReport,
    ) -> Vec<TestBlock> {
        report.begin_profile(&self.name);
        match &self.combine {
            Combine::Sequence(passes) => passes
                .iter()
                .fold(blocks, |acc, pass| pass.apply(acc, report)),
            Combine::Union(passes) => {
                let mut picked = Vec::new();
                for pass in passes {
                    let kept = select_recorded(blocks.clone(), &pass.matches, pass.keep, report);
                    picked.extend(positions(&blocks, &kept));
                }

                let mut seen = HashSet::new();
                let unique: Vec<usize> = picked.iter().copied().filter(|&i| seen.insert(i)).collect();
                if options.dedupe_union {
                    picked = unique;
                } else if unique.len() < picked.len() {
                    tracing::warn!(
                        profile = %self.name,
                        repeated = picked.len() - unique.len(),
                        "union selected some tests more than once"
                    );
                }
                picked.into_iter().map(|i| blocks[i].clone()).collect()
            }
        }
    }
}

/// Indices into `all` of `kept`, a subsequence of it.
///
/// Identical blocks always pass or fail a filter together, so greedy
/// matching recovers the exact positions.
fn positions(all: &[TestBlock], kept: &[TestBlock]) -> Vec<usize> {
    let mut out = Vec::with_capacity(kept.len());
    let mut rest = kept.iter().peekable();
    for (i, block) in all.iter().enumerate() {
        if rest.peek() == Some(&block) {
            out.push(i);
            rest.next();
        }
    }
    out
}

/// Built-in profiles whose flag is set, in their fixed application order.
#[must_use]
pub fn active_profiles(flags: &CiFlags) -> Vec<Profile> {
    let table: [(bool, fn() -> Profile); 7] = [
        (flags.regular_cartesian_1d, Profile::regular_cartesian_1d),
        (flags.regular_cartesian_2d, Profile::regular_cartesian_2d),
        (flags.regular_cartesian_3d, Profile::regular_cartesian_3d),
        (flags.single_precision, Profile::single_precision),
        (flags.rz_or_nompi, Profile::rz_or_nompi),
        (flags.qed, Profile::qed),
        (flags.eb, Profile::eb),
    ];
    table
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, build)| build())
        .collect()
}

/// Look up `requested` names among `custom` profiles, preserving request order.
///
/// # Errors
/// Returns [`SelectError::UnknownProfile`] for the first name not declared.
pub fn resolve_custom(
    custom: &[CustomProfile],
    requested: &[String],
) -> Result<Vec<Profile>, SelectError> {
    requested
        .iter()
        .map(|name| {
            custom
                .iter()
                .find(|p| &p.name == name)
                .cloned()
                .map(Profile::from)
                .ok_or_else(|| SelectError::UnknownProfile { name: name.clone() })
        })
        .collect()
}

/// Run `profiles` in order over `blocks`.
#[must_use]
pub fn apply_profiles(
    blocks: Vec<TestBlock>,
    profiles: &[Profile],
    options: &SelectOptions,
    report: &mut SelectionReport,
) -> Vec<TestBlock> {
    profiles
        .iter()
        .fold(blocks, |acc, profile| profile.apply(acc, options, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::extract_blocks;

    fn blocks(bodies: &[(&str, &str)]) -> Vec<TestBlock> {
        let doc: String = bodies
            .iter()
            .map(|(name, body)| format!("[{name}]\ninputFile = inputs\n{body}\n\n"))
            .collect();
        extract_blocks(&doc).blocks
    }

    fn names(blocks: &[TestBlock]) -> Vec<&str> {
        blocks.iter().map(TestBlock::name).collect()
    }

    fn run(profile: &Profile, blocks: Vec<TestBlock>, dedupe_union: bool) -> Vec<TestBlock> {
        profile.apply(
            blocks,
            &SelectOptions { dedupe_union },
            &mut SelectionReport::default(),
        )
    }

    fn matrix() -> Vec<TestBlock> {
        blocks(&[
            ("plain_1d", "dim = 1"),
            ("rz_1d", "dim = 1\naddToCompileString = USE_RZ=TRUE"),
            ("float_1d", "dim = 1\naddToCompileString = PRECISION=FLOAT"),
            ("plain_2d", "dim = 2"),
            ("rz_2d", "dim = 2\naddToCompileString = USE_RZ=TRUE"),
            ("nompi_2d", "dim = 2\nuseMPI = 0"),
            ("rz_nompi", "dim = 2\nuseMPI = 0\naddToCompileString = USE_RZ=TRUE"),
            ("qed_3d", "dim = 3\naddToCompileString = QED=TRUE"),
            ("eb_3d", "dim = 3\naddToCompileString = USE_EB=TRUE"),
            ("plain_3d", "dim = 3"),
            ("single_3d", "dim = 3\naddToCompileString = PRECISION=FLOAT USE_SINGLE_PRECISION_PARTICLES=TRUE"),
        ])
    }

    #[test]
    fn one_d_drops_rz_and_other_features() {
        assert_eq!(names(&run(&Profile::regular_cartesian_1d(), matrix(), false)), vec!["plain_1d"]);
    }

    #[test]
    fn two_d_keeps_only_plain_cartesian() {
        assert_eq!(names(&run(&Profile::regular_cartesian_2d(), matrix(), false)), vec!["plain_2d"]);
    }

    #[test]
    fn three_d_excludes_features_but_has_no_rz_pass() {
        let three_d = Profile::regular_cartesian_3d();
        let Combine::Sequence(passes) = &three_d.combine else {
            panic!("3d profile should be a sequence");
        };
        assert!(passes.iter().all(|p| !p.matches.iter().any(|m| m == RZ)));
        assert_eq!(names(&run(&three_d, matrix(), false)), vec!["plain_3d"]);
    }

    #[test]
    fn single_precision_requires_both_markers() {
        assert_eq!(names(&run(&Profile::single_precision(), matrix(), false)), vec!["single_3d"]);
    }

    #[test]
    fn qed_and_eb_include_their_feature() {
        assert_eq!(names(&run(&Profile::qed(), matrix(), false)), vec!["qed_3d"]);
        assert_eq!(names(&run(&Profile::eb(), matrix(), false)), vec!["eb_3d"]);
    }

    #[test]
    fn eb_excludes_rz_blocks() {
        let bs = blocks(&[("eb_rz", "USE_EB=TRUE\nUSE_RZ=TRUE"), ("eb", "USE_EB=TRUE")]);
        assert_eq!(names(&run(&Profile::eb(), bs, false)), vec!["eb"]);
    }

    #[test]
    fn rz_or_nompi_union_keeps_duplicates_by_default() {
        let out = run(&Profile::rz_or_nompi(), matrix(), false);
        assert_eq!(
            names(&out),
            vec!["rz_1d", "rz_2d", "rz_nompi", "nompi_2d", "rz_nompi"]
        );
    }

    #[test]
    fn rz_or_nompi_union_size_is_plain_sum_or_deduplicated() {
        let rz = run(&Profile::sequence("rz", vec![Pass::with(&[RZ])]), matrix(), false).len();
        let nompi = run(&Profile::sequence("nompi", vec![Pass::with(&[NO_MPI])]), matrix(), false).len();
        let both = run(
            &Profile::sequence("both", vec![Pass::with(&[RZ, NO_MPI])]),
            matrix(),
            false,
        )
        .len();

        assert_eq!(run(&Profile::rz_or_nompi(), matrix(), false).len(), rz + nompi);
        assert_eq!(run(&Profile::rz_or_nompi(), matrix(), true).len(), rz + nompi - both);
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let out = run(&Profile::rz_or_nompi(), matrix(), true);
        assert_eq!(names(&out), vec!["rz_1d", "rz_2d", "rz_nompi", "nompi_2d"]);
    }

    #[test]
    fn dedupe_tells_identical_sections_apart() {
        let twins = || {
            blocks(&[
                ("t", "addToCompileString = USE_RZ=TRUE"),
                ("t", "addToCompileString = USE_RZ=TRUE"),
            ])
        };
        assert_eq!(names(&run(&Profile::rz_or_nompi(), twins(), true)), vec!["t", "t"]);
        assert_eq!(names(&run(&Profile::rz_or_nompi(), twins(), false)), vec!["t", "t"]);
    }

    #[test]
    fn positions_of_subsequence() {
        let all = matrix();
        let kept = vec![all[1].clone(), all[4].clone()];
        assert_eq!(positions(&all, &kept), vec![1, 4]);
        assert!(positions(&all, &[]).is_empty());
    }

    #[test]
    fn active_profiles_follow_fixed_order() {
        let flags = CiFlags {
            eb: true,
            regular_cartesian_2d: true,
            qed: true,
            ..CiFlags::default()
        };
        let names: Vec<_> = active_profiles(&flags).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["regular-cartesian-2d", "qed", "eb"]);
        assert!(active_profiles(&CiFlags::default()).is_empty());
    }

    #[test]
    fn overlapping_profiles_compose_in_sequence() {
        let profiles = vec![Profile::regular_cartesian_2d(), Profile::qed()];
        let mut report = SelectionReport::default();
        let out = apply_profiles(matrix(), &profiles, &SelectOptions::default(), &mut report);
        assert!(out.is_empty());
        assert_eq!(report.profiles, vec!["regular-cartesian-2d", "qed"]);
    }

    #[test]
    fn custom_profiles_resolve_by_name() {
        let custom = vec![CustomProfile {
            name: "nompi".to_owned(),
            passes: vec![Pass::with(&[NO_MPI]), Pass::without(&[RZ])],
        }];
        let resolved = resolve_custom(&custom, &["nompi".to_owned()]).unwrap();
        assert_eq!(names(&run(&resolved[0], matrix(), false)), vec!["nompi_2d"]);

        let err = resolve_custom(&custom, &["missing".to_owned()]).unwrap_err();
        assert_eq!(
            err,
            SelectError::UnknownProfile {
                name: "missing".to_owned()
            }
        );
    }
}
