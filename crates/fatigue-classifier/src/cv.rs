//! Grouped K-Fold Splits
//!
//! Every group (recording) lands in exactly one validation fold. Groups
//! are placed largest first into the fold currently holding the fewest
//! rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ClassifierError;

/// Row indices of one fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Split rows into `n_splits` folds so that no group appears on both sides
pub fn group_k_fold<S: AsRef<str>>(groups: &[S], n_splits: usize) -> Result<Vec<Fold>, ClassifierError> {
    if n_splits < 2 {
        return Err(ClassifierError::InvalidConfig(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }

    let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
    for g in groups {
        *sizes.entry(g.as_ref()).or_insert(0) += 1;
    }
    if sizes.len() < n_splits {
        return Err(ClassifierError::TooFewGroups {
            groups: sizes.len(),
            n_splits,
        });
    }

    let mut by_size: Vec<(&str, usize)> = sizes.into_iter().collect();
    by_size.sort_by(|a, b| b.1.cmp(&a.1));

    let mut fold_rows = vec![0usize; n_splits];
    let mut assignment: BTreeMap<&str, usize> = BTreeMap::new();
    for (group, size) in by_size {
        let lightest = (0..n_splits)
            .min_by_key(|&k| fold_rows[k])
            .unwrap_or(0);
        fold_rows[lightest] += size;
        assignment.insert(group, lightest);
    }

    let folds = (0..n_splits)
        .map(|k| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..groups.len()).partition(|&i| assignment[groups[i].as_ref()] == k);
            Fold {
                index: k,
                train,
                validation,
            }
        })
        .collect();
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_balanced_assignment() {
        let groups = ["a", "a", "a", "a", "b", "b", "b", "c", "c", "d"];
        let folds = group_k_fold(&groups, 2).unwrap();
        // a(4) -> 0, b(3) -> 1, c(2) -> 1, d(1) -> 0
        assert_eq!(folds[0].validation, vec![0, 1, 2, 3, 9]);
        assert_eq!(folds[1].validation, vec![4, 5, 6, 7, 8]);
        assert_eq!(folds[0].train, folds[1].validation);
    }

    #[test]
    fn test_too_few_groups() {
        let groups = ["a", "a", "b"];
        assert!(matches!(
            group_k_fold(&groups, 3),
            Err(ClassifierError::TooFewGroups { groups: 2, n_splits: 3 })
        ));
        assert!(matches!(group_k_fold(&groups, 1), Err(ClassifierError::InvalidConfig(_))));
    }

    proptest! {
        #[test]
        fn prop_groups_never_straddle_folds(
            ids in prop::collection::vec(0u8..12, 4..80),
            n_splits in 2usize..5,
        ) {
            let groups: Vec<String> = ids.iter().map(|i| format!("file{}", i)).collect();
            let distinct: BTreeSet<&String> = groups.iter().collect();
            prop_assume!(distinct.len() >= n_splits);

            let folds = group_k_fold(&groups, n_splits).unwrap();
            let mut seen = vec![0usize; groups.len()];
            for fold in &folds {
                let train: BTreeSet<&str> = fold.train.iter().map(|&i| groups[i].as_str()).collect();
                let validation: BTreeSet<&str> = fold.validation.iter().map(|&i| groups[i].as_str()).collect();
                prop_assert!(train.is_disjoint(&validation));
                prop_assert!(!fold.validation.is_empty());
                prop_assert_eq!(fold.train.len() + fold.validation.len(), groups.len());
                for &i in &fold.validation {
                    seen[i] += 1;
                }
            }
            prop_assert!(seen.iter().all(|&c| c == 1));
        }
    }
}
