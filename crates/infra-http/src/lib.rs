// Snapvault Infrastructure - HTTP Adapters
// Implements: SearchApi

pub mod search_client;

pub use search_client::HttpSearchClient;
