//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::store::create_store;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
}

/// Write a default config, create the database, and prepare the vector collection
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.validate()?;
    config.save()?;

    std::fs::create_dir_all(&config.paths.upload_dir)?;
    info!("Upload directory at {:?}", config.paths.upload_dir);

    let db = MetaDb::connect(&config.paths.db_file).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    // The vector store may not be running yet; serve creates the collection too
    match create_store(&config).await {
        Ok(store) => match store.ensure_collection().await {
            Ok(()) => info!(
                "Collection '{}' ready on {}",
                config.vector.collection_name,
                store.name()
            ),
            Err(e) => warn!("Could not create collection: {}. It will be created on serve.", e),
        },
        Err(e) => warn!(
            "Could not reach vector store at {}: {}",
            config.vector.qdrant_url, e
        ),
    }

    Ok(config)
}

/// Print the outcome of `init`
pub fn print_init(config: &Config) {
    println!("✓ Initialized scholar at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("Uploads: {:?}", config.paths.upload_dir);
    println!("\nNext steps:");
    println!(
        "  export {}=...     # chat and embedding API key",
        config.llm.api_key_env
    );
    println!("  export {}=...     # token signing secret", config.auth.secret_env);
    println!("  scholar serve");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn init_in(dir: &TempDir, force: bool) -> Result<Config> {
        cmd_init(InitOptions {
            base_dir: dir.path().to_path_buf(),
            force,
        })
        .await
    }

    #[tokio::test]
    async fn test_init_writes_config_and_db() {
        let dir = TempDir::new().unwrap();
        let config = init_in(&dir, false).await.unwrap();

        assert!(config.paths.config_file.exists());
        assert!(config.paths.db_file.exists());
        assert!(config.paths.upload_dir.is_dir());

        let reloaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(reloaded.server.port, config.server.port);
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        init_in(&dir, false).await.unwrap();

        assert!(matches!(init_in(&dir, false).await, Err(Error::Config(_))));
        assert!(init_in(&dir, true).await.is_ok());
    }
}
