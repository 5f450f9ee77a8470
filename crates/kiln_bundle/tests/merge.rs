//! Properties of combining bundle results.

use kiln_bundle::{BundleResult, FileType, InitialFileRecord, InitialFiles, Metafile};
use kiln_common::OutputFile;
use kiln_diagnostics::Message;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn result_strategy() -> impl Strategy<Value = BundleResult> {
    let paths = prop::collection::btree_set("[a-e]/[a-c]\\.(js|css)", 0..4);
    (paths, any::<bool>(), any::<bool>(), 0usize..3).prop_map(
        |(paths, entrypoint, failed, warnings)| {
            let warnings: Vec<Message> =
                (0..warnings).map(|i| Message::text(format!("w{i}"))).collect();
            if failed {
                return BundleResult::Failure {
                    errors: vec![Message::text("failed")],
                    warnings,
                };
            }
            let initial_files: InitialFiles = paths
                .iter()
                .map(|p| {
                    (
                        p.clone(),
                        InitialFileRecord {
                            name: None,
                            file_type: FileType::from_path(p),
                            entrypoint,
                            external: None,
                        },
                    )
                })
                .collect();
            BundleResult::Success {
                warnings,
                metafile: Metafile::default(),
                output_files: paths.iter().map(|p| OutputFile::from_text(p, "")).collect(),
                initial_files,
            }
        },
    )
}

fn output_multiset(result: &BundleResult) -> Vec<String> {
    let mut paths = match result {
        BundleResult::Success { output_files, .. } => output_files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect(),
        BundleResult::Failure { .. } => Vec::new(),
    };
    paths.sort();
    paths
}

fn initial_keys(result: &BundleResult) -> BTreeSet<String> {
    match result {
        BundleResult::Success { initial_files, .. } => initial_files.keys().cloned().collect(),
        BundleResult::Failure { .. } => BTreeSet::new(),
    }
}

proptest! {
    #[test]
    fn merge_is_associative(
        a in result_strategy(),
        b in result_strategy(),
        c in result_strategy(),
    ) {
        let flat = BundleResult::merge([a.clone(), b.clone(), c.clone()]);
        let left = BundleResult::merge([
            BundleResult::merge([a.clone(), b.clone()]),
            c.clone(),
        ]);
        let right = BundleResult::merge([a, BundleResult::merge([b, c])]);
        for nested in [&left, &right] {
            prop_assert_eq!(flat.is_success(), nested.is_success());
            prop_assert_eq!(output_multiset(&flat), output_multiset(nested));
            prop_assert_eq!(initial_keys(&flat), initial_keys(nested));
            prop_assert_eq!(flat.errors(), nested.errors());
            prop_assert_eq!(flat.warnings().len(), nested.warnings().len());
        }
    }

    #[test]
    fn any_failure_fails_the_merge(
        results in prop::collection::vec(result_strategy(), 2..5),
    ) {
        let any_failed = results.iter().any(|r| !r.is_success());
        let error_count: usize = results.iter().map(|r| r.errors().len()).sum();
        let merged = BundleResult::merge(results);
        prop_assert_eq!(merged.is_success(), !any_failed);
        prop_assert_eq!(merged.errors().len(), error_count);
    }

    #[test]
    fn entrypoints_survive_merging(
        a in result_strategy(),
        b in result_strategy(),
    ) {
        let merged = BundleResult::merge([a.clone(), b.clone()]);
        if let BundleResult::Success { initial_files, .. } = &merged {
            for input in [&a, &b] {
                if let BundleResult::Success { initial_files: own, .. } = input {
                    for (key, record) in own.iter().filter(|(_, r)| r.entrypoint) {
                        prop_assert!(initial_files[key].entrypoint, "{} lost entrypoint", key);
                        prop_assert_eq!(initial_files[key].file_type, record.file_type);
                    }
                }
            }
        }
    }
}
