//! Seam between the orchestrator and the places provider.
//!
//! The orchestrator is generic over this trait so tests can drive it with a
//! stub provider and call counters instead of a live HTTP client.

use std::future::Future;

use leadgrid_places::{NearbyPage, PlaceDetails, PlacesClient, PlacesError};

/// The three provider operations the harvest pipeline consumes.
pub trait PlaceSource: Send + Sync {
    /// Resolves a free-text query to a `(lat, lng)` coordinate.
    fn geocode(&self, query: &str)
        -> impl Future<Output = Result<(f64, f64), PlacesError>> + Send;

    /// One page of nearby-search results; `page_token` continues a previous
    /// page.
    fn nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_m: u32,
        keyword: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<NearbyPage, PlacesError>> + Send;

    /// Extended attributes for one place.
    fn place_details(
        &self,
        place_id: &str,
    ) -> impl Future<Output = Result<PlaceDetails, PlacesError>> + Send;
}

impl PlaceSource for PlacesClient {
    fn geocode(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<(f64, f64), PlacesError>> + Send {
        PlacesClient::geocode(self, query)
    }

    fn nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_m: u32,
        keyword: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<NearbyPage, PlacesError>> + Send {
        PlacesClient::nearby_page(self, lat, lng, radius_m, keyword, page_token)
    }

    fn place_details(
        &self,
        place_id: &str,
    ) -> impl Future<Output = Result<PlaceDetails, PlacesError>> + Send {
        PlacesClient::place_details(self, place_id)
    }
}
