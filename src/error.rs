//! Engine error taxonomy.
//!
//! Only configuration and data errors surface as [`EngineError`]; degenerate
//! geometry (zero-area boxes, missing collision polygons) is normalized to a
//! safe default instead of erroring, since it occurs routinely during normal
//! authoring.

use thiserror::Error;

/// Errors raised by engine configuration and asset-descriptor handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A named scene was requested but never registered.
    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    /// A named sprite sheet was requested but never registered.
    #[error("unknown sheet '{0}'")]
    UnknownSheet(String),

    /// A stage slot was addressed that holds no stage.
    #[error("no stage in slot {0}")]
    NoStage(usize),

    /// Tile data was structurally invalid (empty, ragged rows, ...).
    #[error("invalid tile data: {0}")]
    BadTileData(String),

    /// The configuration file could not be read or parsed.
    #[error("failed to load config file: {0}")]
    Config(String),

    /// Tile or sheet descriptor JSON failed to parse.
    #[error("failed to parse descriptor JSON")]
    Json(#[from] serde_json::Error),
}
