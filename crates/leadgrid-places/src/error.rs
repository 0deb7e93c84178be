use thiserror::Error;

/// Errors returned by the places provider client.
#[derive(Debug, Error)]
pub enum PlacesError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-success envelope status
    /// (e.g. `OVER_QUERY_LIMIT`, `REQUEST_DENIED`, `INVALID_REQUEST`).
    #[error("provider returned status {status} for {context}")]
    ApiStatus { status: String, context: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A center query could not be resolved to a coordinate.
    #[error("could not geocode \"{query}\"")]
    Geocode { query: String },
}
