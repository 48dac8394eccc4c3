//! CLI configuration

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Shipyard orchestrator
    pub orchestrator_url: String,
}
