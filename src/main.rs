use anime_source_resolver::{AnimeWorldScraper, CacheOptions, Config, ContentType};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anime-resolver")]
#[command(about = "Browse an anime catalog and resolve episode stream sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to anime-resolver.toml lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the catalog base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Cache TTL in seconds for this run
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show title metadata
    Info {
        /// `movie` or `series`
        content_type: String,
        id: String,
    },
    /// List episodes of a title
    Episodes {
        /// `movie` or `series`
        content_type: String,
        id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List hosting servers of an episode
    Servers {
        /// `movie` or `series`
        content_type: String,
        episode_id: String,
    },
    /// Resolve playable sources for a server of an episode
    Sources {
        /// `movie` or `series`
        content_type: String,
        episode_id: String,
        server_id: String,
    },
    /// List languages available for a title
    Languages {
        /// `movie` or `series`
        content_type: String,
        id: String,
    },
    /// Find a catalog entry by title
    Lookup { title: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.origin.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(ttl) = cli.ttl {
        config.cache.default_ttl_seconds = ttl;
    }

    // Initialize logging
    let directives = log_directives(
        cli.verbose,
        std::env::var("RUST_LOG").ok(),
        &config.logging.filter,
    );
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    if cli.verbose {
        info!("{}", config.summary());
    }

    let scraper = AnimeWorldScraper::from_config(&config)?;
    let ttl = config.cache.default_ttl_seconds;

    match cli.command {
        Commands::Search { query, page } => {
            let response = scraper
                .search(&query, page, &CacheOptions::search(&query, page, ttl))
                .await;
            print_json(&response)?;
        }
        Commands::Info { content_type, id } => {
            let content_type = ContentType::from_discriminator(&content_type);
            let full_id = content_type.full_id(&id);
            let info = scraper
                .get_anime_info(&full_id, &CacheOptions::info(&full_id, ttl))
                .await?;
            print_json(&info)?;
        }
        Commands::Episodes {
            content_type,
            id,
            page,
        } => {
            let content_type = ContentType::from_discriminator(&content_type);
            let episodes = scraper
                .get_episodes(
                    content_type,
                    &id,
                    page,
                    &CacheOptions::episodes(content_type, &id, page, ttl),
                )
                .await?;
            print_json(&episodes)?;
        }
        Commands::Servers {
            content_type,
            episode_id,
        } => {
            let content_type = ContentType::from_discriminator(&content_type);
            let servers = scraper
                .get_episode_servers(
                    content_type,
                    &episode_id,
                    &CacheOptions::servers(content_type, &episode_id, ttl),
                )
                .await;
            print_json(&servers)?;
        }
        Commands::Sources {
            content_type,
            episode_id,
            server_id,
        } => {
            let content_type = ContentType::from_discriminator(&content_type);
            let sources = scraper
                .get_episode_sources(
                    content_type,
                    &episode_id,
                    &server_id,
                    &CacheOptions::sources(content_type, &episode_id, &server_id, ttl),
                )
                .await;
            print_json(&sources)?;

            match sources.first() {
                Some(source) if source.is_usable() => {}
                Some(source) => {
                    let message = source.error.clone().unwrap_or_else(|| "Unusable source".to_string());
                    return Err(anyhow!("❌ {}", message));
                }
                None => return Err(anyhow!("❌ No sources found")),
            }
        }
        Commands::Languages { content_type, id } => {
            let content_type = ContentType::from_discriminator(&content_type);
            let languages = scraper.get_languages(content_type, &id, ttl).await?;
            print_json(&languages)?;
        }
        Commands::Lookup { title } => match scraper.find_by_title(&title, ttl).await {
            Some(result) => print_json(&result)?,
            None => {
                warn!("📭 No results found for title: {}", title);
                return Err(anyhow!("No results found for title"));
            }
        },
    }

    Ok(())
}

/// `-v` wins, then a non-empty `RUST_LOG`, then the configured filter
fn log_directives(verbose: bool, env: Option<String>, configured: &str) -> String {
    if verbose {
        return "anime_source_resolver=debug,info".to_string();
    }

    env.filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
