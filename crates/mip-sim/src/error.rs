use mip_ecs::EcsError;

/// Errors produced while configuring or setting up a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The config text is not valid JSON for [`SimConfig`](crate::config::SimConfig).
    #[error("failed to parse simulation config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A config value is outside its allowed range.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// Scene setup could not obtain something it cannot run without.
    #[error("scene setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Ecs(#[from] EcsError),
}
