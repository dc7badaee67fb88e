use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use artifact_resolver::{
    Backends, Configuration, RequestContext, Resolver,
    page::{PageParams, SortParams},
    reference::Reference,
    resolver::{FileQuery, VersionQuery},
    store::{FsBlobStore, MemoryStore},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Opt {
    /// Configuration files, later files override earlier ones
    #[clap(short, long, value_parser)]
    pub config: Vec<PathBuf>,
    /// JSON snapshot of registries, tags, manifests and versions
    #[clap(long, value_parser)]
    pub catalog: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Platform manifests behind a tag or digest
    Manifests {
        registry: String,
        image: String,
        reference: String,
    },
    /// Build history of a single manifest
    Layers {
        registry: String,
        image: String,
        digest: String,
    },
    /// Detail record of one version
    Detail {
        registry: String,
        image: String,
        version: String,
        #[arg(long)]
        digest: Option<String>,
    },
    /// One page of versions of an artifact
    Versions {
        registry: String,
        image: String,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// List manifests by digest instead of tags
        #[arg(long)]
        untagged: bool,
    },
    /// Files stored for one version of a package
    Files {
        registry: String,
        image: String,
        version: String,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
}

impl Command {
    fn registry(&self) -> &str {
        match self {
            Command::Manifests { registry, .. }
            | Command::Layers { registry, .. }
            | Command::Detail { registry, .. }
            | Command::Versions { registry, .. }
            | Command::Files { registry, .. } => registry,
        }
    }
}

fn parse_reference(raw: &str) -> Result<Reference> {
    Ok(match raw.contains(':') {
        true => Reference::digest(raw)?,
        false => Reference::tag(raw)?,
    })
}

fn print(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(options: Opt, config: Configuration, cancel: CancellationToken) -> Result<()> {
    let store = Arc::new(MemoryStore::load(&options.catalog).await?);
    let registry = store
        .registry(options.command.registry())
        .cloned()
        .with_context(|| format!("Unknown registry {}", options.command.registry()))?;

    let blobs = Arc::new(FsBlobStore::new(config.storage.relative()));
    let resolver = Resolver::from_config(&config, Backends::from_memory(store, blobs))?;

    let ctx = RequestContext::new("cli").with_cancellation(cancel);
    let ctx = match config.request_timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    };

    match options.command {
        Command::Manifests {
            image, reference, ..
        } => {
            let reference = parse_reference(&reference)?;
            print(
                &resolver
                    .resolve_manifests(&ctx, &registry, &image, &reference)
                    .await?,
            )
        }
        Command::Layers { image, digest, .. } => print(
            &resolver
                .resolve_layers(&ctx, &registry, &image, &digest)
                .await?,
        ),
        Command::Detail {
            image,
            version,
            digest,
            ..
        } => print(
            &resolver
                .resolve_manifest_detail(&ctx, &registry, &image, &version, digest.as_deref())
                .await?,
        ),
        Command::Versions {
            image,
            page,
            size,
            sort,
            order,
            search,
            untagged,
            ..
        } => {
            let query = VersionQuery {
                page: PageParams { page, size },
                sort: SortParams::new(sort.as_deref(), order.as_deref()),
                search,
                untagged: untagged || config.untagged_images,
            };
            print(
                &resolver
                    .enumerate_versions(&ctx, &registry, &image, &query)
                    .await?,
            )
        }
        Command::Files {
            image,
            version,
            page,
            size,
            sort,
            order,
            search,
            ..
        } => {
            let query = FileQuery {
                page: PageParams { page, size },
                sort: SortParams::new(sort.as_deref(), order.as_deref()),
                search,
            };
            print(
                &resolver
                    .resolve_files(&ctx, &registry, &image, &version, &query)
                    .await?,
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the parameters passed by arguments.
    let options = Opt::parse();

    let config = Configuration::config(Configuration::figment(options.config.clone()))?;

    artifact_resolver::log::init(&config.logging)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, cancelling request");
                interrupt.cancel();
            }
            Err(err) => {
                warn!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    run(options, config, cancel).await
}
