//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{GlobalStats, MetaDb};
use crate::store::VectorStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub upload_dir: String,
    pub vector_backend: String,
    pub collection_name: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub vector_store_connected: bool,
    pub vector_points: usize,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(
    config: &Config,
    db: &MetaDb,
    store: Option<&dyn VectorStore>,
) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.global_stats().await?;

    let (vector_store_connected, vector_points) = match store {
        Some(store) => match store.count().await {
            Ok(n) => (true, n),
            Err(e) => {
                debug!("Vector store count error: {:?}", e);
                (false, 0)
            }
        },
        None => (false, 0),
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        upload_dir: config.paths.upload_dir.display().to_string(),
        vector_backend: config.vector.backend.clone(),
        collection_name: config.vector.collection_name.clone(),
        llm_model: config.llm.model.clone(),
        embedding_model: config.embedding.model.clone(),
        vector_store_connected,
        vector_points,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 scholar Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Uploads: {}", status.upload_dir);
    println!("\nVector store ({}):", status.vector_backend);
    println!("  Collection: {}", status.collection_name);
    let connection = if status.vector_store_connected {
        "✓ Connected"
    } else {
        "✗ Not connected"
    };
    println!("  Status: {}", connection);
    println!("  Points: {}", status.vector_points);
    println!("\nModels:");
    println!("  Chat: {}", status.llm_model);
    println!("  Embedding: {}", status.embedding_model);

    let stats = &status.db_stats;
    println!("\nDatabase Stats:");
    println!("  Users: {}", stats.user_count);
    println!("  Sessions: {}", stats.session_count);
    println!(
        "  Documents: {} ({} indexed)",
        stats.document_count, stats.indexed_document_count
    );
    println!("  Chunks: {}", stats.chunk_count);
    println!("  Messages: {}", stats.message_count);
    println!("  Reports: {}", stats.report_count);
    println!("  Agent runs: {}", stats.agent_run_count);
}
