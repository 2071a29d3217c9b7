//! Default values for configuration

/// Default bind host
pub fn default_server_host() -> String {
    std::env::var("SCHOLAR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

/// Default bind port
pub fn default_server_port() -> u16 {
    8000
}

/// Default CORS origins (local SPA dev servers)
pub fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

/// Default maximum upload size (50 MiB)
pub fn default_max_upload_bytes() -> usize {
    52_428_800
}

/// Default upload directory (empty = `<base_dir>/uploads`)
pub fn default_upload_dir() -> String {
    std::env::var("SCHOLAR_UPLOAD_DIR").unwrap_or_default()
}

/// Default vector backend
pub fn default_vector_backend() -> String {
    "qdrant".to_string()
}

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "scholar_chunks".to_string()
}

/// Default Upstage API base URL
pub fn default_upstage_base_url() -> String {
    std::env::var("UPSTAGE_BASE_URL").unwrap_or_else(|_| "https://api.upstage.ai".to_string())
}

/// Default environment variable holding the Upstage API key
pub fn default_upstage_api_key_env() -> String {
    "UPSTAGE_API_KEY".to_string()
}

/// Default chat model
pub fn default_llm_model() -> String {
    "solar-1-mini-chat".to_string()
}

/// Default sampling temperature
pub fn default_llm_temperature() -> f32 {
    0.3
}

/// Default completion budget
pub fn default_llm_max_tokens() -> u32 {
    2000
}

/// Default nucleus sampling
pub fn default_llm_top_p() -> f32 {
    0.9
}

/// Default request timeout in seconds for outbound API calls
pub fn default_request_timeout() -> u64 {
    60
}

/// Default passage embedding model
pub fn default_embedding_model() -> String {
    "embedding-passage".to_string()
}

/// Default query embedding model
pub fn default_embedding_query_model() -> String {
    "embedding-query".to_string()
}

/// Default embedding dimension for Upstage Solar embeddings
pub fn default_embedding_dimension() -> usize {
    4096
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default environment variable holding the JWT signing secret
pub fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

/// Default access token lifetime (24 hours)
pub fn default_access_token_minutes() -> i64 {
    1440
}

/// Default refresh token lifetime
pub fn default_refresh_token_days() -> i64 {
    7
}

/// Default chunk size in tokens
pub fn default_chunk_tokens() -> usize {
    3200
}

/// Default overlap between chunks in tokens
pub fn default_chunk_overlap_tokens() -> usize {
    150
}

/// Smallest chunk size a request may ask for
pub fn default_chunk_min_tokens() -> usize {
    500
}

/// Largest chunk size a request may ask for
pub fn default_chunk_max_tokens() -> usize {
    4000
}

/// Default number of citations returned by analysis
pub fn default_analysis_top_k() -> usize {
    5
}

/// Default minimum similarity for analysis hits
pub fn default_analysis_min_relevance() -> f32 {
    0.5
}

/// Default analysis answer budget
pub fn default_analysis_max_tokens() -> u32 {
    4096
}

/// Default arXiv API endpoint
pub fn default_arxiv_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

/// Default PubMed E-utilities base URL
pub fn default_pubmed_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/".to_string()
}

/// Default minimum relevance for search candidates
pub fn default_search_min_relevance() -> f32 {
    0.7
}

/// Default number of papers when the request does not say
pub fn default_search_count() -> usize {
    5
}

/// Hard cap on papers per search
pub fn default_search_max_count() -> usize {
    20
}

/// Candidates fetched per requested paper
pub fn default_search_candidate_multiplier() -> usize {
    4
}

/// Default user agent for paper APIs
pub fn default_search_user_agent() -> String {
    format!("scholar/{} (Research Assistant)", env!("CARGO_PKG_VERSION"))
}
