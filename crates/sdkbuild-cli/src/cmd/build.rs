//! The whole run: validate, install dependencies, build, test, package.

use anyhow::{Context as _, Result};
use sdkbuild_core::{Context, DependencyPipeline, InstallLayout, StepOutcome, ToolEnv, host, sdk};
use sdkbuild_schema::{PlatformPair, VERSION_FILE, VersionMap};

use crate::Cli;

pub fn build(cli: &Cli) -> Result<()> {
    let host = host::build_platform(&ToolEnv::new())?;
    let target = cli.target.descriptor(&host);
    // Nothing is created on disk until the pair is known to be buildable.
    let pair = PlatformPair::validate(host, target)?;
    tracing::info!("Build platform: {}", pair.build());
    tracing::info!("Target platform: {}", pair.target());

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("project root {} not found", cli.root.display()))?;
    let versions = VersionMap::load(&root.join(VERSION_FILE))?;

    let layout = InstallLayout::new(&root, pair.target(), cli.debug);
    layout
        .create_dirs()
        .context("failed to create the working directories")?;
    let mut ctx = Context::new(pair, layout, versions, cli.debug, cli.webrtc.source());

    let outcomes = DependencyPipeline::new(&mut ctx)
        .force(cli.force.iter().copied())
        .force_all(cli.force_all)
        .run()?;
    let installed = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome != StepOutcome::Skipped)
        .count();
    tracing::info!(
        "Dependencies ready ({installed} of {} installed or run)",
        outcomes.len()
    );

    if cli.deps_only {
        return Ok(());
    }

    sdk::build(&mut ctx)?;
    if cli.test {
        sdk::build_tests(&mut ctx, cli.run)?;
    }
    if cli.package {
        let archive = sdk::package(&ctx)?;
        tracing::info!("Wrote {}", archive.display());
    }
    Ok(())
}
