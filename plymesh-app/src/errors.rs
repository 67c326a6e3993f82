//! Error types for the plymesh command line.

use thiserror::Error;

/// Errors that can occur while inspecting a PLY file.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("PLY loading error: {0}")]
    Ply(#[from] plymesh_data::PlyError),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use plymesh_data::PlyError;

    #[test]
    fn test_ply_error_message_is_wrapped() {
        let err: AppError = PlyError::IncompleteMesh("missing faces").into();
        assert!(matches!(err, AppError::Ply(_)));
        assert!(err.to_string().starts_with("PLY loading error: "));
        assert!(err.to_string().contains("missing faces"));
    }
}
