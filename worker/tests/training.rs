use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use futures::future;
use machine_learning::{NetworkState, checkpoint::CheckpointStore, dataset::Dataset};

use worker::{AllReduce, LocalAllReduce, Trainer, TrainingConfig, WorkerErr};

const SIZES: [usize; 3] = [4, 3, 2];
const SEED: u64 = 7;

/// Two classes of 2x2 images, bright on the left half or on the right half.
fn raw_samples(n: usize) -> (Vec<u8>, Vec<u8>) {
    let mut pixels = Vec::with_capacity(n * 4);
    let mut labels = Vec::with_capacity(n);

    for i in 0..n {
        let class = (i % 2) as u8;
        let jitter = (i * 7 % 32) as u8;
        let (hi, lo) = (255 - jitter, jitter);

        match class {
            0 => pixels.extend_from_slice(&[hi, lo, hi, lo]),
            _ => pixels.extend_from_slice(&[lo, hi, lo, hi]),
        }
        labels.push(class);
    }

    (pixels, labels)
}

fn dataset(indices: &[usize]) -> Dataset {
    let (pixels, labels) = raw_samples(indices.iter().max().map_or(0, |i| i + 1));
    let pixels: Vec<u8> = indices
        .iter()
        .flat_map(|&i| pixels[i * 4..(i + 1) * 4].iter().copied())
        .collect();
    let labels: Vec<u8> = indices.iter().map(|&i| labels[i]).collect();

    Dataset::from_raw(&pixels, &labels, 4, 2).unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("orchestra-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_idx(dir: &Path, name: &str, n: usize) -> (PathBuf, PathBuf) {
    let (pixels, labels) = raw_samples(n);

    let mut images = vec![0, 0, 8, 3];
    for dim in [n as u32, 2, 2] {
        images.extend_from_slice(&dim.to_be_bytes());
    }
    images.extend_from_slice(&pixels);

    let mut tags = vec![0, 0, 8, 1];
    tags.extend_from_slice(&(n as u32).to_be_bytes());
    tags.extend_from_slice(&labels);

    let images_path = dir.join(format!("{name}-images"));
    let labels_path = dir.join(format!("{name}-labels"));
    fs::write(&images_path, images).unwrap();
    fs::write(&labels_path, tags).unwrap();

    (images_path, labels_path)
}

fn config(batch_size: usize, epochs: usize) -> TrainingConfig {
    TrainingConfig::from_json(&format!(
        r#"{{
            "layer_sizes": [4, 3, 2],
            "epochs": {epochs},
            "batch_size": {batch_size},
            "learning_rate": 0.5,
            "checkpoint_dir": "unused",
            "train": {{ "images": "unused", "labels": "unused", "samples": 8 }}
        }}"#
    ))
    .unwrap()
}

/// Config reading from IDX files in `dir`, with a held-out set and checkpoints.
fn file_config(dir: &Path, epochs: usize, extra: &str) -> TrainingConfig {
    let (train_images, train_labels) = write_idx(dir, "train", 8);
    let (test_images, test_labels) = write_idx(dir, "test", 6);

    TrainingConfig::from_json(&format!(
        r#"{{
            "layer_sizes": [4, 3, 2],
            "epochs": {epochs},
            "batch_size": 2,
            "learning_rate": 0.5,
            "checkpoint_frequency": 1,
            "checkpoint_dir": {checkpoints:?},
            "train": {{ "images": {train_images:?}, "labels": {train_labels:?}, "samples": 8 }},
            "test": {{ "images": {test_images:?}, "labels": {test_labels:?}, "samples": 6 }},
            "seed": {SEED}{extra}
        }}"#,
        checkpoints = dir.join("checkpoints"),
    ))
    .unwrap()
}

fn world(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn assert_close(a: &[f32], b: &[f32]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < 1e-5, "{x} != {y}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_ranks_train_like_one_rank_with_the_same_global_batches() {
    // rank 0 holds samples 0..4 and rank 1 holds 4..8, their second local batch together is the
    // single rank's second batch.
    let single_order = [0, 1, 4, 5, 2, 3, 6, 7];
    let state = NetworkState::seeded(&SIZES, SEED).unwrap();

    let mut single = Trainer::new(0, config(4, 3), state.clone(), dataset(&single_order), None)
        .unwrap();
    let mut collective = LocalAllReduce::group(world(1)).pop().unwrap();
    let single_report = single.run(&mut collective).await.unwrap();

    let shards = [dataset(&[0, 1, 2, 3]), dataset(&[4, 5, 6, 7])];
    let handles = LocalAllReduce::group(world(2))
        .into_iter()
        .zip(shards)
        .map(|(mut collective, shard)| {
            // rank 1 starts elsewhere, it must receive rank 0's parameters
            let state = match collective.rank() {
                0 => state.clone(),
                _ => NetworkState::seeded(&SIZES, SEED + 1).unwrap(),
            };
            let mut trainer = Trainer::new(collective.rank(), config(2, 3), state, shard, None)
                .unwrap();

            tokio::spawn(async move {
                let report = trainer.run(&mut collective).await.unwrap();
                (trainer.into_state(), report)
            })
        });

    for ret in future::join_all(handles).await {
        let (state, report) = ret.unwrap();
        assert_close(state.params(), single.state().params());

        for (ours, theirs) in report.epochs.iter().zip(&single_report.epochs) {
            assert_eq!(ours.samples, 8);
            assert!((ours.mean_loss - theirs.mean_loss).abs() < 1e-5);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trains_from_idx_files_evaluating_and_checkpointing() {
    let dir = temp_dir("e2e");
    let config = file_config(&dir, 4, "");
    let store = CheckpointStore::new(&config.checkpoint_dir);

    let mut trainer = Trainer::from_config(config, 0, world(1)).unwrap();
    let mut collective = LocalAllReduce::group(world(1)).pop().unwrap();
    let report = trainer.run(&mut collective).await.unwrap();

    assert_eq!(report.epochs.len(), 4);
    for (epoch, metrics) in report.epochs.iter().enumerate() {
        assert_eq!(metrics.epoch, epoch);
        assert_eq!(metrics.samples, 8);
        assert!(metrics.mean_loss.is_finite());
        assert!(!metrics.distorted);
        assert!(metrics.correct.is_some_and(|c| c <= 6));
    }

    let best = report.best.unwrap();
    let best_correct = report.epochs.iter().filter_map(|m| m.correct).max().unwrap();
    assert_eq!(best.correct(), best_correct);

    assert!(store.exists());
    let saved = store.load(&SIZES).unwrap();
    assert_eq!(&saved, trainer.state());

    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resumes_from_the_last_checkpoint() {
    let dir = temp_dir("resume");

    let mut first = Trainer::from_config(file_config(&dir, 2, ""), 0, world(1)).unwrap();
    let mut collective = LocalAllReduce::group(world(1)).pop().unwrap();
    first.run(&mut collective).await.unwrap();

    let resumed = Trainer::from_config(file_config(&dir, 2, r#", "resume": true"#), 0, world(1))
        .unwrap();
    assert_eq!(resumed.state(), first.state());

    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_the_evaluating_rank_evaluates() {
    let dir = temp_dir("eval-rank");
    let config = file_config(&dir, 2, "");

    let handles = LocalAllReduce::group(world(2)).into_iter().map(|mut collective| {
        let mut trainer = Trainer::from_config(config.clone(), collective.rank(), world(2)).unwrap();
        tokio::spawn(async move {
            let report = trainer.run(&mut collective).await.unwrap();
            (trainer.is_evaluator(), report)
        })
    });

    for ret in future::join_all(handles).await {
        let (evaluator, report) = ret.unwrap();
        assert_eq!(report.best.is_some(), evaluator);
        assert!(report.epochs.iter().all(|m| m.correct.is_some() == evaluator));
        assert!(report.epochs.iter().all(|m| m.samples == 8));
    }

    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn distorts_the_shard_on_scheduled_epochs() {
    let dir = temp_dir("augment");
    let config = file_config(
        &dir,
        4,
        r#", "augmentation_frequency": 2, "image_side": 2"#,
    );

    let mut trainer = Trainer::from_config(config, 0, world(1)).unwrap();
    let mut collective = LocalAllReduce::group(world(1)).pop().unwrap();
    let report = trainer.run(&mut collective).await.unwrap();

    let distorted: Vec<_> = report.epochs.iter().map(|m| m.distorted).collect();
    assert_eq!(distorted, [false, false, true, true]);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn rejects_a_network_of_other_sizes() {
    let state = NetworkState::seeded(&[4, 2], SEED).unwrap();
    let ret = Trainer::new(0, config(2, 1), state, dataset(&[0, 1]), None);
    assert!(ret.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn evaluates_on_epochs_divisible_by_the_frequency() {
    let dir = temp_dir("eval-frequency");
    let config = file_config(&dir, 5, r#", "eval_frequency": 2"#);

    let mut trainer = Trainer::from_config(config, 0, world(1)).unwrap();
    let mut collective = LocalAllReduce::group(world(1)).pop().unwrap();
    let report = trainer.run(&mut collective).await.unwrap();

    let evaluated: Vec<_> = report.epochs.iter().map(|m| m.correct.is_some()).collect();
    assert_eq!(evaluated, [true, false, true, false, true]);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn rejects_a_rank_outside_the_world() {
    let ret = Trainer::from_config(config(2, 1), 2, world(2));
    assert!(matches!(ret, Err(WorkerErr::InvalidConfig(_))));
}
