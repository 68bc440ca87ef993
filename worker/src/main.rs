use std::{env, io};

use log::{error, info};
use tokio::signal;

use worker::{ClusterEnv, TcpAllReduce, Trainer, TrainingConfig, TrainingReport, WorkerErr};

const DEFAULT_CONFIG: &str = "config.json";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    tokio::select! {
        ret = run() => {
            let report = ret.inspect_err(|e| error!("training failed: {e}"))?;
            if let Some(best) = report.best {
                info!("best score {} at epoch {}", best.correct(), best.epoch());
            }
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}

async fn run() -> Result<TrainingReport, WorkerErr> {
    let env = ClusterEnv::from_env()?;
    let path = env::var("CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config = TrainingConfig::from_file(&path)?;
    info!(rank = env.rank, world_size = env.world_size.get(); "read configuration from {path}");

    let mut trainer = Trainer::from_config(config, env.rank, env.world_size)?;

    let world_size = env.world_size.get();
    let mut collective = match env.rank {
        0 => TcpAllReduce::bind(env.root_addr.as_str(), world_size).await?,
        rank => TcpAllReduce::connect(env.root_addr.as_str(), rank, world_size).await?,
    };

    let report = trainer.run(&mut collective).await?;
    collective.shutdown().await?;
    Ok(report)
}
