use super::model::ResolvedArtifact;
use crate::error::ResolutionError;
use crate::runtime::RuntimeIdentifier;
use crate::version::PackageVersion;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// What happened when an artifact was offered to a [`ReferenceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The identity was new.
    Added,
    /// The offered artifact won arbitration against an existing one.
    Replaced { previous: Box<ResolvedArtifact> },
    /// The existing artifact was kept; the offer was a duplicate or lost.
    Kept,
    /// The offer is a different file with the same identity and nothing
    /// ranks it above or below the existing one; the existing one stays.
    Shadowed { existing: Box<ResolvedArtifact> },
}

/// Deduplicated mapping from artifact identity key to artifact.
///
/// Conflicts between two artifacts with the same key are arbitrated before
/// insertion so the set never holds two locations for one identity:
/// 1. the higher version wins, regardless of insertion order;
/// 2. for equal versions, an asset specific to the host runtime beats a
///    portable one;
/// 3. otherwise the artifact already present is kept, and an offer from a
///    different location is reported as shadowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSet {
    entries: BTreeMap<String, ResolvedArtifact>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedArtifact> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedArtifact> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<ResolvedArtifact> {
        self.entries.values().cloned().collect()
    }

    /// Offers one artifact to the set, applying the arbitration rules.
    pub fn insert(&mut self, artifact: ResolvedArtifact, runtime: &RuntimeIdentifier) -> MergeOutcome {
        match self.entries.entry(artifact.key()) {
            Entry::Vacant(slot) => {
                slot.insert(artifact);
                MergeOutcome::Added
            }
            Entry::Occupied(mut slot) => {
                if prefers(&artifact, slot.get(), runtime) {
                    let previous = slot.insert(artifact);
                    MergeOutcome::Replaced {
                        previous: Box::new(previous),
                    }
                } else if shadows(&artifact, slot.get(), runtime) {
                    MergeOutcome::Shadowed {
                        existing: Box::new(slot.get().clone()),
                    }
                } else {
                    MergeOutcome::Kept
                }
            }
        }
    }

    /// Offers every artifact in order. Returns a warning for each offer that
    /// was shadowed by a different file already in the set.
    pub fn merge<I>(&mut self, artifacts: I, runtime: &RuntimeIdentifier) -> Vec<ResolutionError>
    where
        I: IntoIterator<Item = ResolvedArtifact>,
    {
        let mut shadowed = Vec::new();
        for artifact in artifacts {
            let ignored = artifact.location.clone();
            if let MergeOutcome::Shadowed { existing } = self.insert(artifact, runtime) {
                shadowed.push(ResolutionError::ShadowedArtifact {
                    identity: existing.identity.to_string(),
                    kept: existing.location,
                    ignored,
                });
            }
        }
        shadowed
    }

    /// Whether a package with this name (and version, when given) already
    /// contributed artifacts to the set.
    pub fn contains_package(&self, name: &str, version: Option<&PackageVersion>) -> bool {
        self.entries.values().any(|artifact| {
            artifact
                .package_name()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
                && version.is_none_or(|v| artifact.package_version() == Some(v))
        })
    }

    /// Artifacts present in `self` that are absent from (or different in) `base`.
    pub fn added_since(&self, base: &ReferenceSet) -> Vec<ResolvedArtifact> {
        self.entries
            .iter()
            .filter(|(key, artifact)| base.entries.get(*key) != Some(*artifact))
            .map(|(_, artifact)| artifact.clone())
            .collect()
    }
}

/// True when `candidate` should replace `existing`.
fn prefers(candidate: &ResolvedArtifact, existing: &ResolvedArtifact, runtime: &RuntimeIdentifier) -> bool {
    if candidate == existing {
        return false;
    }
    match candidate.identity.version.cmp(&existing.identity.version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => runtime_rank(candidate, runtime) < runtime_rank(existing, runtime),
    }
}

/// Same identity and precedence, but another file.
fn shadows(candidate: &ResolvedArtifact, existing: &ResolvedArtifact, runtime: &RuntimeIdentifier) -> bool {
    candidate.location != existing.location
        && candidate.identity.version == existing.identity.version
        && runtime_rank(candidate, runtime) == runtime_rank(existing, runtime)
}

/// Lower is better: host-specific assets first, portable next, foreign last.
fn runtime_rank(artifact: &ResolvedArtifact, runtime: &RuntimeIdentifier) -> usize {
    let portable = runtime.fallback_chain().len() - 1;
    match &artifact.runtime {
        None => portable,
        Some(rid) => runtime.specificity(rid).unwrap_or(usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactIdentity, ArtifactSource};
    use std::path::PathBuf;

    fn package_artifact(name: &str, version: &str, rid: Option<&str>) -> ResolvedArtifact {
        let version: PackageVersion = version.parse().unwrap();
        let folder = rid.unwrap_or("lib");
        ResolvedArtifact {
            identity: ArtifactIdentity::new(name, Some(version.clone())),
            location: PathBuf::from(format!("/packages/{}/{}/{}/{}.dll", name, version, folder, name)),
            display: format!("{} {}", name, version),
            framework: None,
            runtime: rid.map(|r| r.parse().unwrap()),
            pulled_in: Vec::new(),
            source: ArtifactSource::Package {
                name: name.to_string(),
                version,
            },
        }
    }

    fn host() -> RuntimeIdentifier {
        "win-x64".parse().unwrap()
    }

    #[test]
    fn higher_version_wins_in_either_order() {
        for order in [["1.0", "2.0"], ["2.0", "1.0"]] {
            let mut set = ReferenceSet::new();
            for v in order {
                set.insert(package_artifact("P", v, None), &host());
            }
            assert_eq!(set.len(), 1);
            assert_eq!(set.get("p").unwrap().identity.version, Some("2.0".parse().unwrap()));
        }
    }

    #[test]
    fn reinserting_same_artifact_is_noop() {
        let mut set = ReferenceSet::new();
        assert_eq!(set.insert(package_artifact("P", "1.0", None), &host()), MergeOutcome::Added);
        assert_eq!(set.insert(package_artifact("P", "1.0", None), &host()), MergeOutcome::Kept);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn host_specific_asset_beats_portable_at_same_version() {
        let mut set = ReferenceSet::new();
        set.insert(package_artifact("Native", "1.0", None), &host());
        let outcome = set.insert(package_artifact("Native", "1.0", Some("win-x64")), &host());
        assert!(matches!(outcome, MergeOutcome::Replaced { .. }));

        // And the portable one does not take the slot back.
        assert_eq!(set.insert(package_artifact("Native", "1.0", None), &host()), MergeOutcome::Kept);
        assert_eq!(set.get("native").unwrap().runtime, Some(host()));
    }

    #[test]
    fn foreign_runtime_asset_never_wins() {
        let mut set = ReferenceSet::new();
        set.insert(package_artifact("Native", "1.0", None), &host());
        let outcome = set.insert(package_artifact("Native", "1.0", Some("linux-x64")), &host());
        assert_eq!(outcome, MergeOutcome::Kept);
    }

    #[test]
    fn same_file_name_in_another_folder_is_shadowed() {
        let mut set = ReferenceSet::new();
        let first = ResolvedArtifact::assembly(PathBuf::from("/work/v1/Foo.dll"));
        let second = ResolvedArtifact::assembly(PathBuf::from("/work/v2/Foo.dll"));

        assert!(set.merge(vec![first.clone()], &host()).is_empty());
        let warnings = set.merge(vec![second.clone()], &host());
        assert_eq!(
            warnings,
            vec![ResolutionError::ShadowedArtifact {
                identity: "Foo".to_string(),
                kept: first.location.clone(),
                ignored: second.location.clone(),
            }]
        );
        assert_eq!(set.get("foo").unwrap().location, first.location);

        // The same file again is a plain duplicate.
        assert!(set.merge(vec![first], &host()).is_empty());
    }

    #[test]
    fn losing_lower_version_is_not_shadowing() {
        let mut set = ReferenceSet::new();
        set.insert(package_artifact("P", "2.0", None), &host());
        let warnings = set.merge(vec![package_artifact("P", "1.0", None)], &host());
        assert!(warnings.is_empty());
    }

    #[test]
    fn contains_package_matches_name_and_optional_version() {
        let mut set = ReferenceSet::new();
        set.insert(package_artifact("Humanizer", "2.14.1", None), &host());
        assert!(set.contains_package("humanizer", None));
        assert!(set.contains_package("Humanizer", Some(&"2.14.1".parse().unwrap())));
        assert!(!set.contains_package("Humanizer", Some(&"2.0".parse().unwrap())));
        assert!(!set.contains_package("Other", None));
    }

    #[test]
    fn added_since_reports_new_and_replaced() {
        let mut base = ReferenceSet::new();
        base.insert(package_artifact("A", "1.0", None), &host());
        let mut candidate = base.clone();
        candidate.insert(package_artifact("A", "2.0", None), &host());
        candidate.insert(package_artifact("B", "1.0", None), &host());
        let added = candidate.added_since(&base);
        assert_eq!(added.len(), 2);
    }
}
