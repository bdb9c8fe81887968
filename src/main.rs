mod cli;

use stillbox::{config, server, storage, uploads::StoragePaths};
use storage::StorageAccountant;
use stillbox_db::pool::init_pool;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stillbox=trace,stillbox_db=debug,stillbox_common=debug,tower_http=debug".to_string()
        } else {
            "stillbox=debug,stillbox_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Summary => print_summary(cli.config.as_deref()),
        Commands::Prune { dry_run } => run_prune(cli.config.as_deref(), dry_run),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("stillbox {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(host: String, port: u16, config_path: Option<&std::path::Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Stillbox server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    std::fs::create_dir_all(&config.storage.data_dir)?;

    let db_path = config.storage.db_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Initializing database at {}", db_path_str);
    let db_pool = init_pool(&db_path_str)?;

    server::start_server(config, db_pool).await
}

fn open_accountant(config_path: Option<&std::path::Path>) -> Result<(config::Config, StorageAccountant)> {
    let config = config::load_config_or_default(config_path)?;
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_pool = init_pool(&config.storage.db_path().to_string_lossy())?;
    let paths = StoragePaths::new(config.storage.upload_root(), config.storage.temp_root())?;
    let accountant = StorageAccountant::new(db_pool, paths);
    Ok((config, accountant))
}

fn print_summary(config_path: Option<&std::path::Path>) -> Result<()> {
    let (_config, accountant) = open_accountant(config_path)?;
    let summary = accountant.summary()?;

    println!("Storage summary");
    println!("  Images:        {}", summary.total_images);
    println!("  DB size:       {}", summary.total_image_size_formatted);
    println!("  Disk size:     {}", summary.total_disk_size_formatted);
    println!("  Temp size:     {}", summary.temp_size_formatted);

    let per_user = accountant.all_user_stats()?;
    if !per_user.is_empty() {
        println!("\nPer user:");
        for stats in per_user {
            println!(
                "  user {:>6}: {:>5} images, {}",
                stats.user_id,
                stats.image_count,
                storage::format_bytes(stats.total_bytes as u64)
            );
        }
    }

    Ok(())
}

fn run_prune(config_path: Option<&std::path::Path>, dry_run: bool) -> Result<()> {
    let (config, accountant) = open_accountant(config_path)?;
    let grace = chrono::Duration::days(config.uploads.prune_grace_days as i64);

    if dry_run {
        let candidates = accountant.orphan_candidate_count(grace)?;
        println!("Would remove {} orphaned image(s)", candidates);
        return Ok(());
    }

    let orphans = accountant.prune_orphaned_images(grace)?;
    let temp = accountant.prune_temp(
        std::time::Duration::from_secs(config.uploads.temp_max_age_secs),
        &Default::default(),
    );
    println!("Removed {} orphaned image(s), {} temp file(s)", orphans, temp);

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data dir: {:?}", config.storage.data_dir);
            println!("  Upload root: {:?}", config.storage.upload_root());
            println!("  Session idle: {}s", config.uploads.session_idle_secs);
            println!("  Prune grace: {} days", config.uploads.prune_grace_days);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data dir: {:?}", config.storage.data_dir);
        }
    }

    Ok(())
}
