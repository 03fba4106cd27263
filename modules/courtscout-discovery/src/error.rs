use places_client::PlacesError;
use thiserror::Error;

/// Job-level failures of a discovery pass. Per-candidate problems never
/// surface here; they are logged and swallowed inside the pass.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("places provider error: {0}")]
    Provider(#[from] PlacesError),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl DiscoveryError {
    /// A missing provider credential is a configuration error: retrying
    /// burns queue attempts with no chance of success, so the queue fails
    /// such jobs immediately. Everything else gets retry-with-backoff.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            DiscoveryError::Provider(PlacesError::MissingCredential)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_not_retryable() {
        let err = DiscoveryError::Provider(PlacesError::MissingCredential);
        assert!(!err.retryable());
    }

    #[test]
    fn upstream_and_store_errors_are_retryable() {
        let api = DiscoveryError::Provider(PlacesError::Api {
            status: "OVER_QUERY_LIMIT".to_string(),
        });
        assert!(api.retryable());

        let net = DiscoveryError::Provider(PlacesError::Network("reset".to_string()));
        assert!(net.retryable());

        let store = DiscoveryError::Store(anyhow::anyhow!("connection refused"));
        assert!(store.retryable());
    }
}
