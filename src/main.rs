use std::{env, num::NonZeroUsize, process};

use anyhow::{Context, Result};
use futures::future;
use log::{error, info};

use worker::{AllReduce, LocalAllReduce, Trainer, TrainingConfig};

const DEFAULT_WORLD_SIZE: usize = 1;

/// Runs every rank of a training job inside this process, one task per rank.
#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [world_size]", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(&args[1], args.get(2)).await {
        error!("training failed: {e:#}");
        process::exit(1);
    }
}

async fn run(path: &str, world_size: Option<&String>) -> Result<()> {
    let world_size = match world_size {
        Some(raw) => raw
            .parse::<NonZeroUsize>()
            .with_context(|| format!("invalid world size {raw}"))?,
        None => NonZeroUsize::new(DEFAULT_WORLD_SIZE).context("world size can't be zero")?,
    };

    let config = TrainingConfig::from_file(path)
        .with_context(|| format!("failed to read the configuration at {path}"))?;
    info!(world_size = world_size.get(); "launching {world_size} local ranks");

    let mut handles = Vec::with_capacity(world_size.get());
    for mut collective in LocalAllReduce::group(world_size) {
        let rank = collective.rank();
        let mut trainer = Trainer::from_config(config.clone(), rank, world_size)
            .with_context(|| format!("failed to set up rank {rank}"))?;

        let handle = tokio::spawn(async move {
            let report = trainer.run(&mut collective).await?;
            anyhow::Ok((trainer.is_evaluator(), report))
        });

        // a failed rank must end the job, the others would wait for it forever
        handles.push(async move { handle.await.context("rank panicked")? });
    }

    for (evaluator, report) in future::try_join_all(handles).await? {
        if let (true, Some(best)) = (evaluator, report.best) {
            info!("best score {} at epoch {}", best.correct(), best.epoch());
        }

        if let Some(last) = report.last() {
            info!(epoch = last.epoch; "final mean loss {:.6}", last.mean_loss);
        }
    }

    Ok(())
}
