//! Property-based tests for the diff partition.
//!
//! Arbitrary local/reference layouts with random suppressions must always
//! yield four disjoint partitions whose union is exactly the set of known
//! paths minus excluded and suppressed ones.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

use super::diff::{Classification, DiffEngine};
use super::exclusion::ExclusionPolicy;
use super::fingerprint::{ChecksumAlgorithm, FingerprintComputer};
use crate::core::paths::PathResolver;
use crate::reference::ReferenceSnapshot;
use crate::store::suppression::{SuppressionRecord, path_hash};

const NAMES: &[&str] = &[
    "index.php",
    "wp-login.php",
    "wp-admin/index.php",
    "wp-admin/includes/file.php",
    "wp-includes/load.php",
    "wp-includes/js/jquery.js",
    "wp-content/index.php",
    // Excluded by built-in rules.
    "wp-config.php",
    "wp-includes/class.bak",
    "wp-content/plugins/akismet/akismet.php",
];

// ──────────────────── strategies ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Absent,
    LocalOnly,
    ReferenceOnly,
    Identical,
    Different,
}

fn arb_presence() -> impl Strategy<Value = Presence> {
    prop_oneof![
        Just(Presence::Absent),
        Just(Presence::LocalOnly),
        Just(Presence::ReferenceOnly),
        Just(Presence::Identical),
        Just(Presence::Different),
    ]
}

fn arb_layout() -> impl Strategy<Value = Vec<(Presence, bool)>> {
    prop::collection::vec((arb_presence(), any::<bool>()), NAMES.len())
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn partitions_are_disjoint_and_complete(layout in arb_layout()) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let algorithm = ChecksumAlgorithm::Md5;
        let policy = ExclusionPolicy::new("en_US", "wp-content", &[]).unwrap();
        let at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();

        let mut local_paths = Vec::new();
        let mut reference = BTreeMap::new();
        let mut suppressions = BTreeMap::new();
        let mut expected = BTreeSet::new();

        for (name, (presence, suppressed)) in NAMES.iter().zip(&layout) {
            let local = matches!(
                presence,
                Presence::LocalOnly | Presence::Identical | Presence::Different
            );
            if local {
                let path = root.join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, name.as_bytes()).unwrap();
                local_paths.push((*name).to_string());
            }
            match presence {
                Presence::ReferenceOnly | Presence::Identical => {
                    reference.insert((*name).to_string(), algorithm.digest_bytes(name.as_bytes()));
                }
                Presence::Different => {
                    reference.insert((*name).to_string(), algorithm.digest_bytes(b"pristine"));
                }
                Presence::Absent | Presence::LocalOnly => {}
            }
            if *suppressed {
                suppressions.insert(
                    path_hash(name),
                    SuppressionRecord::new(name, Classification::Modified, at),
                );
            }
            if *presence != Presence::Absent
                && !*suppressed
                && !policy.should_exclude(name, false)
            {
                expected.insert((*name).to_string());
            }
        }

        let computer = FingerprintComputer::new(root, algorithm);
        let records = computer.fingerprint(&local_paths).records;
        let engine = DiffEngine::new(
            PathResolver::new(root, "wp-content", None),
            FingerprintComputer::new(root, algorithm),
        );
        let snapshot = ReferenceSnapshot::new("6.4.2", algorithm, reference);
        let result = engine.diff(records, &snapshot, &policy, &suppressions);

        let mut seen = BTreeSet::new();
        for entry in result.entries() {
            prop_assert!(seen.insert(entry.path().to_string()), "duplicate {}", entry.path());
        }
        prop_assert_eq!(&seen, &expected);

        for (name, (presence, _)) in NAMES.iter().zip(&layout) {
            let Some(entry) = result.find(name) else { continue };
            let want = match presence {
                Presence::LocalOnly => Classification::Added,
                Presence::ReferenceOnly => Classification::Removed,
                Presence::Identical => Classification::Stable,
                Presence::Different => Classification::Modified,
                Presence::Absent => unreachable!("absent path {name} was classified"),
            };
            prop_assert_eq!(entry.classification(), want, "{}", name);
        }
    }
}
