//! Provider response types for the nearby-search, details, and geocode
//! endpoints.
//!
//! ## Observed envelope shape
//!
//! Every endpoint wraps its payload in an envelope carrying a `status`
//! string. `OK` and `ZERO_RESULTS` are success cases; anything else
//! (`OVER_QUERY_LIMIT`, `REQUEST_DENIED`, `INVALID_REQUEST`, ...) is an
//! API-level error surfaced as [`crate::PlacesError::ApiStatus`].
//!
//! A continuation token (`next_page_token`) becomes valid only a short time
//! after it is issued; callers are expected to space the follow-up request.
//! Requesting it too early yields `INVALID_REQUEST`.

use serde::{Deserialize, Serialize};

/// One search hit from the nearby-search endpoint.
///
/// Typed fields cover what the harvest pipeline reads; the full provider
/// payload for the hit is retained in `raw` so nothing is lost before
/// enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceSummary {
    /// Provider-unique identifier; the dedup key across grid points.
    pub place_id: String,

    /// Display name of the place.
    pub name: String,

    /// Short human-readable address, when the provider includes one.
    #[serde(default)]
    pub vicinity: Option<String>,

    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub user_ratings_total: Option<u64>,

    /// The hit exactly as the provider returned it.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// One page of nearby-search results plus the continuation token, if any.
#[derive(Debug, Clone)]
pub struct NearbyPage {
    pub places: Vec<PlaceSummary>,
    pub next_page_token: Option<String>,
}

/// Extended attributes from the details endpoint.
///
/// Every field is optional: the provider omits attributes the place does not
/// have rather than sending empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceDetails {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub formatted_address: Option<String>,

    #[serde(default)]
    pub formatted_phone_number: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub user_ratings_total: Option<u64>,
}

/// Wire shape of the nearby-search envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct NearbyEnvelope {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Wire shape of the details envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct DetailsEnvelope {
    pub result: PlaceDetails,
}

/// Wire shapes of the geocode envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeEnvelope {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResult {
    pub geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeGeometry {
    pub location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeLocation {
    pub lat: f64,
    pub lng: f64,
}
