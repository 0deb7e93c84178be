//! The enriched output record handed to the export collaborator.

use leadgrid_places::PlaceDetails;
use serde::{Deserialize, Serialize};

/// One exported row. Owned exclusively by the orchestration run.
///
/// Enrichment failures produce an all-empty record rather than dropping the
/// candidate, so the exported row count always equals the unique-candidate
/// count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Provider id of the candidate this record was enriched from.
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    /// Populated by the external email-scraper collaborator, never by the
    /// enrichment phase itself.
    #[serde(default)]
    pub email: String,
}

impl EnrichedRecord {
    /// All-empty record for a candidate whose detail lookup failed.
    #[must_use]
    pub fn empty(place_id: &str) -> Self {
        Self {
            place_id: place_id.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_details(place_id: &str, details: PlaceDetails) -> Self {
        Self {
            place_id: place_id.to_owned(),
            name: details.name.unwrap_or_default(),
            address: details.formatted_address.unwrap_or_default(),
            phone: details.formatted_phone_number.unwrap_or_default(),
            website: details.website.unwrap_or_default(),
            rating: details.rating,
            review_count: details.user_ratings_total,
            email: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_details_maps_all_fields() {
        let details = PlaceDetails {
            name: Some("Bean There".to_owned()),
            formatted_address: Some("1 Main St".to_owned()),
            formatted_phone_number: Some("(609) 555-0101".to_owned()),
            website: Some("https://beanthere.example".to_owned()),
            rating: Some(4.5),
            user_ratings_total: Some(120),
        };
        let record = EnrichedRecord::from_details("p1", details);
        assert_eq!(record.place_id, "p1");
        assert_eq!(record.name, "Bean There");
        assert_eq!(record.phone, "(609) 555-0101");
        assert_eq!(record.rating, Some(4.5));
        assert_eq!(record.review_count, Some(120));
        assert!(record.email.is_empty());
    }

    #[test]
    fn empty_record_keeps_the_candidate_id_only() {
        let record = EnrichedRecord::empty("p9");
        assert_eq!(record.place_id, "p9");
        assert!(record.name.is_empty());
        assert!(record.address.is_empty());
        assert!(record.rating.is_none());
    }
}
