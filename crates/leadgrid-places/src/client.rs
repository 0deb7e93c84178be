//! HTTP client for the location-search provider.
//!
//! Wraps `reqwest` with provider-specific error handling, API key management,
//! and typed response deserialization. All endpoints check the `"status"`
//! field in the JSON envelope and surface API-level errors as
//! [`PlacesError::ApiStatus`].
//!
//! The client holds no throttle state. Spacing between calls (including the
//! delay a continuation token needs before it becomes valid) is the
//! orchestrator's responsibility, so it composes with checkpoint-restored
//! pacing state.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::PlacesError;
use crate::types::{
    DetailsEnvelope, GeocodeEnvelope, NearbyEnvelope, NearbyPage, PlaceDetails, PlaceSummary,
};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/";

const NEARBY_PATH: &str = "maps/api/place/nearbysearch/json";
const DETAILS_PATH: &str = "maps/api/place/details/json";
const GEOCODE_PATH: &str = "maps/api/geocode/json";

/// Detail attributes requested for every enrichment lookup.
const DETAIL_FIELDS: &str =
    "name,formatted_address,formatted_phone_number,website,rating,user_ratings_total";

/// Client for the places provider REST API.
///
/// Use [`PlacesClient::new`] for production or
/// [`PlacesClient::with_base_url`] to point at a mock server in tests.
pub struct PlacesClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl PlacesClient {
    /// Creates a new client pointed at the production provider.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, PlacesError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PlacesError::ApiStatus`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, PlacesError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends endpoint paths instead of replacing the last
        // path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| PlacesError::ApiStatus {
            status: "INVALID_BASE_URL".to_owned(),
            context: format!("{base_url}: {e}"),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Resolves a free-text query to a `(lat, lng)` coordinate.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::Geocode`] if the provider returns no match.
    /// - [`PlacesError::ApiStatus`] if the envelope status indicates failure.
    /// - [`PlacesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`PlacesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn geocode(&self, query: &str) -> Result<(f64, f64), PlacesError> {
        let url = self.build_url(GEOCODE_PATH, &[("address", query)]);
        let body = self.request_json(&url).await?;
        check_envelope_status(&body, &format!("geocode({query})"))?;

        let envelope: GeocodeEnvelope =
            serde_json::from_value(body).map_err(|e| PlacesError::Deserialize {
                context: format!("geocode({query})"),
                source: e,
            })?;

        let first = envelope.results.into_iter().next().ok_or_else(|| {
            PlacesError::Geocode {
                query: query.to_owned(),
            }
        })?;
        Ok((first.geometry.location.lat, first.geometry.location.lng))
    }

    /// Fetches one page of nearby-search results.
    ///
    /// With `page_token = None` this issues a fresh search around
    /// `(lat, lng)`; with `Some(token)` it follows a continuation token from
    /// a previous page (the provider ignores location parameters on
    /// continuation requests, so none are sent).
    ///
    /// `ZERO_RESULTS` is a success case and yields an empty page.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::ApiStatus`] if the envelope status indicates failure
    ///   (including `INVALID_REQUEST` from following a token too early).
    /// - [`PlacesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`PlacesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_m: u32,
        keyword: &str,
        page_token: Option<&str>,
    ) -> Result<NearbyPage, PlacesError> {
        let location = format!("{lat},{lng}");
        let radius = radius_m.to_string();
        let url = match page_token {
            Some(token) => self.build_url(NEARBY_PATH, &[("pagetoken", token)]),
            None => self.build_url(
                NEARBY_PATH,
                &[
                    ("location", location.as_str()),
                    ("radius", radius.as_str()),
                    ("keyword", keyword),
                ],
            ),
        };

        let context = format!("nearby_search({location}, keyword={keyword})");
        let body = self.request_json(&url).await?;
        check_envelope_status(&body, &context)?;

        let envelope: NearbyEnvelope =
            serde_json::from_value(body).map_err(|e| PlacesError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        // Hits that fail to parse are skipped rather than failing the page;
        // the provider occasionally returns malformed entries.
        let places = envelope
            .results
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<PlaceSummary>(value.clone()) {
                Ok(mut summary) => {
                    summary.raw = value;
                    Some(summary)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable nearby-search hit");
                    None
                }
            })
            .collect();

        Ok(NearbyPage {
            places,
            next_page_token: envelope.next_page_token,
        })
    }

    /// Fetches extended attributes for one place.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::ApiStatus`] if the envelope status indicates failure.
    /// - [`PlacesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`PlacesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
        let url = self.build_url(
            DETAILS_PATH,
            &[("place_id", place_id), ("fields", DETAIL_FIELDS)],
        );
        let context = format!("place_details({place_id})");
        let body = self.request_json(&url).await?;
        check_envelope_status(&body, &context)?;

        let envelope: DetailsEnvelope =
            serde_json::from_value(body).map_err(|e| PlacesError::Deserialize {
                context,
                source: e,
            })?;

        Ok(envelope.result)
    }

    /// Builds the full request URL with properly percent-encoded query
    /// parameters. The API key is always appended.
    fn build_url(&self, path: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone());
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Sends a GET request, asserts a 2xx HTTP status, and parses the
    /// response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] on network failure or a non-2xx status.
    /// Returns [`PlacesError::Deserialize`] if the body is not valid JSON.
    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, PlacesError> {
        let response = self.client.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PlacesError::Deserialize {
            context: redact_key(url),
            source: e,
        })
    }
}

/// Checks the top-level `"status"` field and returns an error unless it is
/// `OK` or `ZERO_RESULTS`.
fn check_envelope_status(body: &serde_json::Value, context: &str) -> Result<(), PlacesError> {
    let status = body
        .get("status")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("MISSING_STATUS");
    if status == "OK" || status == "ZERO_RESULTS" {
        return Ok(());
    }
    Err(PlacesError::ApiStatus {
        status: status.to_owned(),
        context: context.to_owned(),
    })
}

/// URL rendered for error context with the API key stripped.
fn redact_key(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == "key" {
                (k.into_owned(), "[redacted]".to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    {
        let mut q = redacted.query_pairs_mut();
        q.clear();
        for (k, v) in &pairs {
            q.append_pair(k, v);
        }
    }
    redacted.to_string()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
