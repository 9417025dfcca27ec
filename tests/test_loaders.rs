//! Integration tests for dataset/loader construction.
//!
//! Split resolution is checked against a counting in-memory lister; full
//! builds run against a temporary data tree of small `.npy` volumes.

mod common;

use common::{CountingLister, DataTree};
use futures_util::StreamExt;
use std::path::PathBuf;

use sade::config::InlierSplit;
use sade::data_loader::Dataset;
use sade::datasets::loaders::{resolve_splits, ResolvedSplits};
use sade::datasets::{
    get_dataloaders, get_dataloaders_with, BuildOptions, LoaderError, NameError, RunMode,
    TransformKind,
};

fn quiet(mode: RunMode) -> BuildOptions {
    BuildOptions::default().mode(mode).num_workers(2).progress(false)
}

fn resolve(tree: &DataTree, dataset: &str, ood: &str, mode: RunMode, lister: &CountingLister) -> ResolvedSplits {
    resolve_splits(&tree.config(dataset, ood), mode, lister).expect("resolve")
}

// ────────────────────────────────────────────────────────────────────────────
// Name validation
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn bad_dataset_name_fails_before_enumeration() {
    let tree = DataTree::new();
    let lister = CountingLister::new(4, 2, 2);
    for mode in [RunMode::Training, RunMode::Evaluation, RunMode::OodEvaluation] {
        let err = get_dataloaders_with(&tree.config("brats", "tumor"), &quiet(mode), &lister).unwrap_err();
        assert!(matches!(err, LoaderError::Name(NameError::Dataset(ref n)) if n == "brats"));
    }
    assert_eq!(lister.calls(), 0);
}

#[test]
fn bad_ood_name_fails_before_enumeration() {
    let tree = DataTree::new();
    let lister = CountingLister::new(4, 2, 2);
    // checked even when OOD samples are not needed
    let err = get_dataloaders_with(&tree.config("ABCD", "atlas"), &quiet(RunMode::Training), &lister)
        .unwrap_err();
    assert!(matches!(err, LoaderError::Name(NameError::Ood(_))));
    assert_eq!(lister.calls(), 0);
}

// ────────────────────────────────────────────────────────────────────────────
// Split resolution per mode
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn training_enumerates_once_with_configured_name() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let splits = resolve(&tree, "IBIS", "tumor", RunMode::Training, &lister);

    assert_eq!(lister.calls(), 1);
    assert_eq!(lister.seen(), vec![("IBIS".to_string(), tree.data_dir.clone())]);

    let train = splits.train.expect("training split");
    assert_eq!(train.records, lister.files.train);
    assert_eq!(train.transform, TransformKind::Train);
    assert_eq!(splits.val.records, lister.files.val);
    assert_eq!(splits.val.transform, TransformKind::Validation);
    assert_eq!(splits.test.records, lister.files.test);
    assert_eq!(splits.test.transform, TransformKind::Validation);
}

#[test]
fn evaluation_has_no_training_split() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let splits = resolve(&tree, "abcd", "tumor", RunMode::Evaluation, &lister);

    assert!(splits.train.is_none());
    assert_eq!(splits.val.records, lister.files.val);
    assert_eq!(splits.test.records, lister.files.test);
}

#[test]
fn tumor_ood_uses_primary_files_with_tumor_pipeline() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let splits = resolve(&tree, "abcd", "Tumor", RunMode::OodEvaluation, &lister);

    assert!(splits.train.is_none());
    assert_eq!(splits.test.records, lister.files.test);
    assert_eq!(splits.test.transform, TransformKind::Tumor);
    assert_eq!(splits.test.source.dir, tree.data_dir);
    assert_eq!(splits.val.records, lister.files.val);
    assert_eq!(splits.val.transform, TransformKind::Validation);
}

#[test]
fn generic_ood_uses_primary_files_with_validation_pipeline() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let splits = resolve(&tree, "abcd", "ds-sa", RunMode::OodEvaluation, &lister);

    assert_eq!(splits.test.records, lister.files.test);
    assert_eq!(splits.test.transform, TransformKind::Validation);
    assert_eq!(lister.calls(), 1);
}

#[test]
fn inlier_split_can_be_switched_to_test() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let mut cfg = tree.config("abcd", "tumor");
    cfg.data.ood_inlier_split = InlierSplit::Test;
    let splits = resolve_splits(&cfg, RunMode::OodEvaluation, &lister).unwrap();

    assert_eq!(splits.val.records, lister.files.test);
    assert_eq!(splits.test.records, lister.files.test);
}

#[test]
fn lesion_ood_reads_from_lesion_dir() {
    let tree = DataTree::new();
    let expected = tree.add_lesions("lesion_load_20", "abcd", 2);
    let lister = CountingLister::new(5, 2, 3);
    let splits = resolve(&tree, "abcd", "Lesion_Load_20", RunMode::OodEvaluation, &lister);

    assert_eq!(splits.test.source.dir, expected);
    assert_eq!(splits.test.source.name, "lesion_load_20");
    assert_eq!(splits.test.transform, TransformKind::Lesion);

    // lesion set first, then the primary dataset
    let seen = lister.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ("lesion_load_20".to_string(), expected));
    assert_eq!(seen[1], ("abcd".to_string(), tree.data_dir.clone()));
}

#[test]
fn missing_lesion_dir_is_fatal() {
    let tree = DataTree::new();
    let lister = CountingLister::new(5, 2, 3);
    let err = resolve_splits(&tree.config("abcd", "lesion"), RunMode::OodEvaluation, &lister).unwrap_err();

    match err {
        LoaderError::MissingOodDirectory(dir) => {
            assert_eq!(dir, tree.lesion_dir("lesion", "abcd"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(lister.calls(), 0);
}

#[test]
fn empty_eval_splits_are_fatal() {
    let tree = DataTree::new();
    let no_val = CountingLister::new(5, 0, 3);
    let err = resolve_splits(&tree.config("abcd", "tumor"), RunMode::Training, &no_val).unwrap_err();
    assert!(matches!(err, LoaderError::EmptySplit("val")));

    let no_test = CountingLister::new(5, 3, 0);
    let err = resolve_splits(&tree.config("abcd", "tumor"), RunMode::Evaluation, &no_test).unwrap_err();
    assert!(matches!(err, LoaderError::EmptySplit("test")));
}

#[test]
fn empty_training_split_is_allowed() {
    let tree = DataTree::new();
    let lister = CountingLister::new(0, 2, 2);
    let splits = resolve(&tree, "abcd", "tumor", RunMode::Training, &lister);
    assert!(splits.train.is_some_and(|t| t.records.is_empty()));
}

// ────────────────────────────────────────────────────────────────────────────
// Full builds from disk
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn training_build_from_split_files() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 5, 3, 4);
    let cfg = tree.config("abcd", "tumor");

    let (loaders, datasets) = get_dataloaders(&cfg, &quiet(RunMode::Training)).unwrap();

    let train = loaders.train.as_ref().expect("training loader");
    assert_eq!(train.batch_size(), 2);
    assert!(train.options().shuffle);
    assert!(train.pin_memory());
    assert_eq!(train.num_workers(), 2);
    assert_eq!(datasets.train.as_ref().map(|d| d.len()), Some(5));
    assert_eq!(datasets.eval.len(), 3);
    assert_eq!(datasets.test.len(), 4);
    assert_eq!(datasets.eval.transform_name(), "validation");
    assert_eq!(datasets.eval.cached_len(), 3);

    let batches: Vec<_> = train.stream().collect().await;
    assert_eq!(batches.len(), 3);
    let first = batches[0].as_ref().unwrap();
    assert_eq!(first[0].image.dim(), (4, 4, 4));

    let eval: Vec<_> = loaders.eval.stream().collect().await;
    let sizes: Vec<usize> = eval.into_iter().map(|b| b.unwrap().len()).collect();
    assert_eq!(sizes, vec![3]);
}

#[tokio::test]
async fn evaluation_build_has_no_training_artifacts() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 5, 3, 4);
    let (loaders, datasets) =
        get_dataloaders(&tree.config("abcd", "tumor"), &quiet(RunMode::Evaluation)).unwrap();

    assert!(loaders.train.is_none());
    assert!(datasets.train.is_none());
    assert!(!loaders.eval.options().shuffle);
    assert!(!loaders.test.options().shuffle);
}

#[tokio::test]
async fn lesion_build_loads_masks() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 5, 3, 4);
    let lesion_dir = tree.add_lesions("lesion", "abcd", 2);

    let (loaders, datasets) =
        get_dataloaders(&tree.config("abcd", "lesion"), &quiet(RunMode::OodEvaluation)).unwrap();

    assert_eq!(datasets.test.source_dir(), lesion_dir.as_path());
    assert_eq!(datasets.test.transform_name(), "lesion");
    assert_eq!(datasets.test.len(), 2);

    let batch = loaders.test.stream().next().await.unwrap().unwrap();
    assert_eq!(batch.len(), 2);
    for sample in &batch {
        let mask = sample.label.as_ref().expect("lesion mask");
        assert_eq!(mask.dim(), (4, 4, 4));
        assert!(mask.iter().all(|&v| v == 0.0 || v == 1.0));
    }
}

#[tokio::test]
async fn tumor_build_paints_tumors() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 5, 3, 4);
    let mut cfg = tree.config("abcd", "tumor");
    cfg.data.image_size = [8, 8, 8];

    let (loaders, datasets) = get_dataloaders(&cfg, &quiet(RunMode::OodEvaluation)).unwrap();
    assert_eq!(datasets.test.transform_name(), "tumor");
    assert_eq!(datasets.test.records().len(), 4);

    let batch = loaders.test.stream().next().await.unwrap().unwrap();
    for sample in &batch {
        let mask = sample.label.as_ref().expect("tumor mask");
        assert!(mask.iter().any(|&v| v == 1.0));
    }
}

#[tokio::test]
async fn infinite_sampler_applies_to_every_loader() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 3, 2, 2);
    let opts = quiet(RunMode::Training).infinite_sampler(true);
    let (loaders, _) = get_dataloaders(&tree.config("abcd", "tumor"), &opts).unwrap();

    let train = loaders.train.as_ref().unwrap();
    assert_eq!(train.num_batches(), None);
    assert_eq!(loaders.eval.num_batches(), None);
    assert_eq!(loaders.test.num_batches(), None);

    // more batches than one pass over the data
    let batches: Vec<_> = train.stream().take(5).collect().await;
    assert_eq!(batches.len(), 5);
    assert!(batches.iter().all(|b| b.as_ref().is_ok_and(|b| b.len() == 2)));
}

#[tokio::test]
async fn partial_cache_rate() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 4, 4, 4);
    let mut cfg = tree.config("abcd", "tumor");
    cfg.data.cache_rate = 0.5;

    let (loaders, datasets) = get_dataloaders(&cfg, &quiet(RunMode::Evaluation)).unwrap();
    assert_eq!(datasets.eval.cached_len(), 2);

    let total: usize = loaders
        .eval
        .stream()
        .map(|b| b.unwrap().len())
        .fold(0, |acc, n| async move { acc + n })
        .await;
    assert_eq!(total, 4);
}

#[test]
fn unreadable_volume_names_the_split() {
    let tree = DataTree::new();
    tree.add_dataset("abcd", 2, 2, 2);
    std::fs::write(tree.splits_dir.join("abcd_val.txt"), "missing.npy").unwrap();

    let err = get_dataloaders(&tree.config("abcd", "tumor"), &quiet(RunMode::Evaluation)).unwrap_err();
    assert!(matches!(err, LoaderError::Dataset { split: "val", .. }));
}

#[test]
fn builder_is_idempotent() {
    let tree = DataTree::new();
    let lister = CountingLister::new(4, 2, 2);
    let opts = quiet(RunMode::Training);
    // the lister's paths do not exist; nothing is read while the cache is off
    let mut cfg = tree.config("abcd", "tumor");
    cfg.data.cache_rate = 0.0;

    let (a, _) = get_dataloaders_with(&cfg, &opts, &lister).unwrap();
    let (b, _) = get_dataloaders_with(&cfg, &opts, &lister).unwrap();

    let (ta, tb) = (a.train.unwrap(), b.train.unwrap());
    assert_eq!(ta.options(), tb.options());
    assert_eq!(a.eval.options(), b.eval.options());
    assert_eq!(a.test.options(), b.test.options());
    assert_eq!(
        a.eval.dataset().records().iter().map(|r| r.image.clone()).collect::<Vec<PathBuf>>(),
        b.eval.dataset().records().iter().map(|r| r.image.clone()).collect::<Vec<PathBuf>>()
    );
}

#[test]
fn flags_pick_the_mode() {
    assert_eq!(RunMode::from_flags(false, false), RunMode::Training);
    assert_eq!(RunMode::from_flags(true, false), RunMode::Evaluation);
    assert_eq!(RunMode::from_flags(true, true), RunMode::OodEvaluation);
}
