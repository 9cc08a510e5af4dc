use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sharegate_core::app::{BrokerBuilder, BrokerConfig, ExpirySweeper, GrantCounts, SweepReport};
use sharegate_core::domain::export_file_name;
use sharegate_core::impls::{LocalArtifactGateway, TracingNotifier};
use sharegate_core::{ArtifactSource, Delivery, Resolution, RevokeOutcome};

/// Share an export file through a time-limited download link.
#[derive(Debug, Parser)]
#[command(name = "sharegate", version)]
struct Args {
    /// Config file (.toml or .json). SHAREGATE_* env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// File to share. Without it a small sample export is generated.
    artifact: Option<PathBuf>,

    #[arg(long, default_value = "ops@example.com")]
    recipient: String,

    #[arg(long, default_value = "")]
    message: String,

    /// Link lifetime; defaults to broker.default_ttl_secs.
    #[arg(long)]
    ttl_secs: Option<i64>,

    /// Revoke the link right after issuing it.
    #[arg(long)]
    revoke: bool,

    /// Keep the expiry sweeper running this long before exiting.
    #[arg(long, default_value_t = 0)]
    watch_secs: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    token: String,
    recipient: String,
    download_url: String,
    expires_at: String,
    delivered: bool,
    resolved: Option<String>,
    revoked: Option<bool>,
    sweeps: Vec<SweepReport>,
    counts: GrantCounts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // (A) tracing: RUST_LOG があればそれを使う
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (B) 設定を読み込み（ファイル → 環境変数）
    let config = BrokerConfig::load(args.config.as_deref()).context("loading config")?;

    // (C) ローカルストレージと通知を組み立てて broker を作る
    let artifacts = LocalArtifactGateway::new(
        &config.storage.root,
        config.storage.bucket.clone(),
        config.storage.public_base_url.clone(),
    )
    .await
    .context("preparing storage root")?;

    let broker = BrokerBuilder::new(config.clone())
        .artifacts(Arc::new(artifacts))
        .notifier(Arc::new(TracingNotifier))
        .build()
        .context("building broker")?;
    let broker = Arc::new(broker);

    // (D) 共有リンクを発行
    let source = match &args.artifact {
        Some(path) => ArtifactSource::file(path),
        None => {
            let today = chrono::Utc::now().date_naive();
            ArtifactSource::bytes(
                export_file_name(&config.storage.file_prefix, today),
                b"barcode,client,status\nLX-0001,ACME,shipped\n".to_vec(),
            )
        }
    };
    let issued = match args.ttl_secs {
        Some(secs) => {
            let ttl = chrono::Duration::try_seconds(secs)
                .with_context(|| format!("--ttl-secs {secs} is out of range"))?;
            broker
                .issue(source, &args.recipient, &args.message, ttl)
                .await?
        }
        None => {
            broker
                .issue_default(source, &args.recipient, &args.message)
                .await?
        }
    };
    let token = issued.grant.token.clone();

    // (E) 解決してみる
    let resolved = match broker.resolve(&token).await? {
        Resolution::Available(url) => Some(url),
        other => {
            tracing::warn!(?other, "freshly issued link did not resolve");
            None
        }
    };

    // (F) 必要なら取り消す
    let revoked = if args.revoke {
        Some(broker.revoke(&token).await? == RevokeOutcome::Revoked)
    } else {
        None
    };

    // (G) watch の間だけ sweeper を回す（Ctrl-C で早期終了）
    let mut sweeps = Vec::new();
    if args.watch_secs > 0 {
        let sweeper = ExpirySweeper::from_config(broker.clone(), &config);
        sweeps.push(sweeper.sweep_once().await);

        let handle = sweeper.spawn();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(args.watch_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping sweeper");
            }
        }
        handle.shutdown_and_join().await;
    }

    // (H) 結果を出力
    let report = Report {
        token: token.to_string(),
        recipient: issued.grant.recipient.to_string(),
        download_url: issued.download_url,
        expires_at: issued.grant.expires_at.to_rfc3339(),
        delivered: issued.delivery == Delivery::Sent,
        resolved,
        revoked,
        sweeps,
        counts: broker.counts().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
