use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cloudtail_core::{
    cloud::AwsCloudWatchLogs,
    logging,
    publisher::{ConsolePublisher, EventPublisher},
    registry::{MemoryRegistry, Registry, S3Registry},
    service::{Context, GroupManager},
    Config,
};

#[derive(Parser, Debug)]
#[command(
    name = "cloudtail",
    about = "Tails CloudWatch Logs groups and forwards normalized events"
)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "CLOUDTAIL_CONFIG", default_value = "cloudtail.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration (fail fast on misconfigurations)
    let config = load_config(&args.config)?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("{config}");
    if config.hot_streams_enabled() {
        info!("hot streams activated");
    }

    // 3. Build the AWS client with bounded retries
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(10))
        .load()
        .await;
    let cloud = Arc::new(AwsCloudWatchLogs::new(aws_sdk_cloudwatchlogs::Client::new(
        &sdk_config,
    )));

    // 4. Select the cursor registry
    let registry: Arc<dyn Registry> = if config.s3_bucket_name.is_empty() {
        info!("working with in-memory registry");
        Arc::new(MemoryRegistry::new())
    } else {
        info!(bucket = %config.s3_bucket_name, "working with s3 registry");
        Arc::new(S3Registry::new(
            &config.s3_bucket_name,
            &config.aws_region,
            &config.s3_key_prefix,
        )?)
    };

    // 5. Wire the publisher and spawn the manager
    let publisher: Arc<dyn EventPublisher> = Arc::new(ConsolePublisher::new());
    let cancel = CancellationToken::new();
    let ctx = Context {
        config: Arc::new(config),
        cloud,
        registry,
        publisher: Arc::clone(&publisher),
    };
    let manager = GroupManager::new(ctx, cancel.child_token());
    let manager_task = tokio::spawn(manager.run());

    info!("cloudtail is running, hit ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    // 6. Shut down: stop the supervisors, then release the sink
    cancel.cancel();
    let _ = manager_task.await;
    publisher.close().await;
    info!("cloudtail stopped");

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let config = if std::path::Path::new(path).exists() {
        Config::from_file(path)?
    } else {
        eprintln!("Config file {path} not found, using environment variables and defaults");
        Config::from_env()?
    };

    if let Err(errors) = config.validate() {
        anyhow::bail!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        );
    }

    Ok(config)
}
