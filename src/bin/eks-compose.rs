//! Compose an EKS cluster from a JSON definition.
//!
//! Writes the plan (`--plan-only`) or the provisioning result to stdout as
//! JSON. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use eks_component_sdk::{
    execute, init_logging_with_default, AwsEnvironment, Composition, GrpcResourceProvider,
    HANDSHAKE_PREFIX,
};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Compose a managed EKS cluster on a remote resource provider",
    long_about = None,
    after_help = "Examples:
  # Validate and show what would be created:
  eks-compose --definition cluster.json --plan-only

  # Provision through a provider listening locally:
  eks-compose --definition cluster.json --provider http://127.0.0.1:50051

  # Provision using the handshake line a provider printed:
  eks-compose --definition cluster.json --provider 'EKS_RESOURCE_PROVIDER|1|127.0.0.1:50051'"
)]
struct Args {
    /// Composition definition (JSON)
    #[arg(short, long, env = "EKS_COMPOSITION", value_name = "FILE")]
    definition: PathBuf,

    /// Provider endpoint or handshake line
    #[arg(short, long, env = "EKS_RESOURCE_PROVIDER")]
    provider: Option<String>,

    /// Validate and print the plan without creating anything
    #[arg(long)]
    plan_only: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn connect(provider: &str) -> Result<GrpcResourceProvider> {
    let client = if provider.starts_with(HANDSHAKE_PREFIX) {
        GrpcResourceProvider::from_handshake(provider).await
    } else {
        GrpcResourceProvider::connect(provider).await
    };
    client.with_context(|| format!("failed to connect to provider {}", provider))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging_with_default(&args.log_level);

    let composition = Composition::from_path(&args.definition)?;
    let mut plan = composition.plan()?;

    if args.plan_only {
        let output = json!({ "plan": plan, "resources": plan.resources() });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let environment = AwsEnvironment::from_env()?;
    environment.apply_to(&mut plan.cluster.kubeconfig);
    info!(
        profile = %environment.profile,
        region = %environment.region,
        cluster = %plan.cluster.name,
        "Composing cluster"
    );

    let Some(provider) = args.provider.as_deref() else {
        bail!("--provider is required unless --plan-only is set");
    };
    let provider = connect(provider).await?;

    let result = execute(&provider, &plan).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_complete() {
        warn!(
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            "Composition incomplete"
        );
        bail!(
            "{} resource(s) failed and {} were skipped",
            result.failed.len(),
            result.skipped.len()
        );
    }
    Ok(())
}
