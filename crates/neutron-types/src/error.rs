// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transport Errors
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{stage} did not converge after {iterations} iterations (residual {residual:.3e})")]
    NonConvergence {
        stage: String,
        iterations: usize,
        residual: f64,
    },

    #[error("Numerical hazard in {location}: {message}")]
    NumericalHazard { location: String, message: String },

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Errors that must stop a solve before any iteration starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::ConfigError(_) | TransportError::Io(_) | TransportError::Json(_)
        )
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
