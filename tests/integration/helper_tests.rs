//! Normalization, batching and scope helpers as used by callers

use hub_utils::{
    batchify, compute_lcm, flatten, norm_cache, norm_shape, Dim, NoopLock, ScopedLock, Settings,
    Shape, SuppressingScope,
};
use serde_json::json;

#[test]
fn test_shape_and_cache_from_config_document() {
    let doc = json!({
        "tensors": {
            "image": {"shape": [null, 224, 224, 3], "cache": 64},
            "label": {"shape": 1, "cache": null},
            "text": {"shape": null}
        }
    });

    let image = norm_shape(&doc["tensors"]["image"]["shape"]).unwrap();
    assert_eq!(image.rank(), 4);
    assert_eq!(image.dims()[0], Dim::Unknown);
    assert_eq!(norm_cache(&doc["tensors"]["image"]["cache"]).unwrap(), 64);

    let label = norm_shape(&doc["tensors"]["label"]["shape"]).unwrap();
    assert_eq!(label, Shape::from(1u64));
    assert_eq!(norm_cache(&doc["tensors"]["label"]["cache"]).unwrap(), 0);

    // missing keys index as null
    assert_eq!(norm_shape(&doc["tensors"]["text"]["shape"]).unwrap(), Shape::unknown());
    assert_eq!(norm_cache(&doc["tensors"]["text"]["cache"]).unwrap(), 0);
}

#[test]
fn test_lcm_of_chunk_sizes_drives_batching() {
    let chunk_sizes = [4u64, 6];
    let lcm = compute_lcm(&chunk_sizes).unwrap().unwrap();
    assert_eq!(lcm, 12);

    let samples: Vec<u32> = (0..30).collect();
    let batches = batchify(&samples, lcm as usize).unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].len(), 6);
    assert_eq!(flatten(batches.iter().map(|b| b.to_vec())), samples);
}

#[test]
fn test_default_batch_size_from_settings() {
    let settings = Settings::default();
    let items = ["a", "b", "c"];
    let batches = batchify(&items, settings.batch.default_size).unwrap();
    assert_eq!(batches.len(), 3);
}

#[test]
fn test_suppressing_scope_lets_caller_continue() {
    let scope = SuppressingScope::new("cleanup");
    let mut steps = Vec::new();

    steps.push("before");
    let outcome = scope.run(|| norm_cache(&json!("5")));
    steps.push("after");

    assert!(outcome.is_none());
    assert_eq!(steps, vec!["before", "after"]);
}

#[test]
fn test_noop_lock_propagates_validation_errors() {
    let lock = NoopLock::new();
    let result = lock.with(|| norm_shape(&json!("x")));
    assert!(result.unwrap_err().is_type_mismatch());
}
