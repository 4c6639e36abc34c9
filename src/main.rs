use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

use advisor_cache::config::{AppConfig, ComponentConfig};
use advisor_cache::logging::{init_logging, LoggingConfig};
use advisor_cache::prelude::*;

/// Resolve advisors from components declared in a TOML file
#[derive(Debug, Parser)]
#[command(name = "advisor-cache", version)]
struct Args {
    /// Component configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// How many times to resolve; later rounds are served from cache
    #[arg(short, long, default_value_t = 2)]
    rounds: usize,

    /// Log level when ADVISOR_CACHE_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Instance handed out for every declared component
#[derive(Debug)]
struct DeclaredComponent {
    name: String,
}

fn build_registry(components: &[ComponentConfig]) -> ComponentRegistry {
    let registry = ComponentRegistry::new();
    for component in components {
        let name = component.name.clone();
        registry.register(
            component.name.clone(),
            ComponentDefinition::new(component.descriptor.clone(), component.scope, move || {
                Ok(DeclaredComponent { name: name.clone() })
            }),
        );
    }
    registry
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::production().with_level(args.log_level))
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize logging")?;

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let registry = Arc::new(build_registry(&config.components));
    if registry.is_empty() {
        tracing::warn!(config = %args.config.display(), "No components declared");
    } else {
        tracing::info!(components = registry.len(), "Registered components");
    }
    let cache = ResolutionCache::from_config(registry.clone(), DeclarativeAdvisorFactory::new(), &config.resolver)?;

    for round in 1..=args.rounds.max(1) {
        let advisors = cache.resolve_all()?;
        println!("round {round}: {} advisor(s)", advisors.len());
        for advisor in &advisors {
            let owner = advisor
                .instance
                .downcast_ref::<DeclaredComponent>()
                .map(|c| c.name.as_str())
                .unwrap_or("?");
            println!("  {advisor} <- {owner}");
        }
    }

    let stats = cache.stats();
    println!(
        "providers: {}, discovery passes: {}, artifact builds: {}, cache hit rate: {:.2}, instantiations: {}",
        cache.discovered_names().map(|n| n.len()).unwrap_or(0),
        stats.discovery_attempts,
        stats.artifact_builds,
        stats.hit_rate(),
        registry.stats().instantiations,
    );
    Ok(())
}
