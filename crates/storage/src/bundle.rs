//! Model Bundle Persistence

use std::path::Path;

use fatigue_classifier::ModelBundle;
use tracing::info;

use crate::StorageError;

/// Serialize a bundle with postcard
pub fn save_bundle(path: impl AsRef<Path>, bundle: &ModelBundle) -> Result<(), StorageError> {
    let path = path.as_ref();
    let bytes = postcard::to_allocvec(bundle).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    std::fs::write(path, &bytes).map_err(|e| StorageError::io(path, e))?;
    info!("Saved model bundle ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}

/// Load a bundle and check it against this build's feature layout
pub fn load_bundle(path: impl AsRef<Path>) -> Result<ModelBundle, StorageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let bundle: ModelBundle =
        postcard::from_bytes(&bytes).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    bundle
        .validate()
        .map_err(|e| StorageError::IncompatibleBundle(e.to_string()))?;
    info!(
        "Loaded model bundle trained {} (threshold {:.3})",
        bundle.trained_at, bundle.threshold
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatigue_classifier::{BundleParams, LogisticConfig};
    use feature_engine::{add_baseline_features, label_rows, MasterDataset, RepFeatures};

    fn bundle() -> ModelBundle {
        let mut rows = Vec::new();
        for (id, failure) in [("a", 4), ("b", 5)] {
            let reps: Vec<RepFeatures> = (2..=7)
                .map(|k| RepFeatures {
                    rep: k,
                    start: k * 100,
                    end: k * 100 + 90,
                    peak_index: k * 100 + 45,
                    peak_time: k as f64,
                    rms: if k >= failure { 2.0 } else { 1.0 } + 0.01 * k as f64,
                    median_frequency: if k >= failure { 90.0 } else { 120.0 },
                    envelope_peak: 0.5,
                    rep_duration: 90.0,
                })
                .collect();
            rows.extend(label_rows(id, &add_baseline_features(&reps), failure));
        }
        let dataset = MasterDataset::from_rows(rows);
        ModelBundle::train(&dataset, 0.45, &LogisticConfig::default(), BundleParams::default()).unwrap()
    }

    #[test]
    fn test_bundle_file_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let original = bundle();
        save_bundle(&path, &original).unwrap();
        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_rejects_garbage_and_mismatched_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a bundle").unwrap();
        assert!(matches!(load_bundle(&path), Err(StorageError::SerializationError(_))));

        let mut stale = bundle();
        stale.feature_names.pop();
        save_bundle(&path, &stale).unwrap();
        assert!(matches!(load_bundle(&path), Err(StorageError::IncompatibleBundle(_))));

        assert!(matches!(load_bundle(dir.path().join("none.bin")), Err(StorageError::Io { .. })));
    }
}
