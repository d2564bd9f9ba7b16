use std::path::Path;

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches};
use tokio::signal::unix::{SignalKind, signal};

use cpudra::common::cli::{CommonOpts, PrepareOpts, RootOptions, SubCommand, UnprepareOpts};
use cpudra::common::setup::setup_logging;
use cpudra::config::DriverConfig;
use cpudra::driver::{
    ClaimRef, Driver, MemoryClaimFetcher, NodePrepareResourcesRequest,
    NodeUnprepareResourcesRequest, default_claim_fetcher,
};
use cpudra_core::checkpoint::{CheckpointStore, FileStorage};
use cpudra_core::claim::{ClaimUid, ResourceClaim};

async fn command_run(common: CommonOpts) -> anyhow::Result<()> {
    let config = DriverConfig::from_opts(common)?;
    let driver = Driver::create(&config, default_claim_fetcher(&config))?;

    log::info!(
        "Driver {} started on node {} (plugin dir {}, CDI root {})",
        cpudra::DRIVER_NAME,
        config.node_name,
        config.plugin_dir.display(),
        config.cdi_root.display()
    );
    for device in driver.resources() {
        log::info!("Publishing device {} ({})", device.name(), device.class());
    }
    let prepared = driver.prepared_claims()?;
    if !prepared.is_empty() {
        log::info!("{} claim(s) restored from checkpoint", prepared.len());
    }

    wait_for_termination().await?;
    log::info!("Shutting down");
    Ok(())
}

async fn wait_for_termination() -> anyhow::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;
    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    };
    log::info!("Received {name}");
    Ok(())
}

fn read_claim(path: &Path) -> anyhow::Result<ResourceClaim> {
    let data =
        std::fs::read(path).with_context(|| format!("Cannot read claim {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Cannot parse claim {}", path.display()))
}

fn command_prepare(common: CommonOpts, prepare: PrepareOpts) -> anyhow::Result<()> {
    let config = DriverConfig::from_opts(common)?;
    let (request, driver) = if config.claims_dir.is_some() {
        let claims = prepare
            .claims
            .iter()
            .map(|reference| reference.parse::<ClaimRef>())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let driver = Driver::create(&config, default_claim_fetcher(&config))?;
        (NodePrepareResourcesRequest { claims }, driver)
    } else {
        let claims = prepare
            .claims
            .iter()
            .map(|path| read_claim(Path::new(path)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let request = NodePrepareResourcesRequest {
            claims: claims.iter().map(ClaimRef::from_claim).collect(),
        };
        let fetcher = claims.into_iter().collect::<MemoryClaimFetcher>();
        (request, Driver::create(&config, Box::new(fetcher))?)
    };

    let response = driver.node_prepare_resources(request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn command_unprepare(common: CommonOpts, unprepare: UnprepareOpts) -> anyhow::Result<()> {
    let request = NodeUnprepareResourcesRequest {
        claims: unprepare
            .uids
            .into_iter()
            .map(|uid| ClaimRef {
                namespace: String::new(),
                name: String::new(),
                uid: ClaimUid::new(uid),
            })
            .collect(),
    };

    let config = DriverConfig::from_opts(common)?;
    let driver = Driver::create(&config, default_claim_fetcher(&config))?;
    let response = driver.node_unprepare_resources(request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn command_checkpoint(common: CommonOpts) -> anyhow::Result<()> {
    let storage = FileStorage::open(&common.plugin_dir).with_context(|| {
        format!(
            "Cannot open plugin directory {}",
            common.plugin_dir.display()
        )
    })?;
    let store = CheckpointStore::new(Box::new(storage));
    let claims = store.load()?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> cpudra::Result<()> {
    let matches = RootOptions::command().get_matches();
    let RootOptions { common, subcmd } = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(common.debug);

    let result = match subcmd {
        SubCommand::Run => command_run(common).await,
        SubCommand::Prepare(opts) => command_prepare(common, opts),
        SubCommand::Unprepare(opts) => command_unprepare(common, opts),
        SubCommand::Checkpoint => command_checkpoint(common),
    };

    if let Err(e) = result {
        log::error!("{e:?}");
        std::process::exit(1);
    }

    Ok(())
}
