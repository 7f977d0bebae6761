//! TripAdvisor Content API client
//!
//! Endpoint payloads are modelled as partially optional DTOs. They never
//! leave the crate's hotel path: `normalize` turns them into [`crate::Hotel`].

use crate::config::ApiKey;
use crate::normalize::{lenient, lenient_list, string_or_number};
use crate::TravelError;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

pub const TRIPADVISOR_PROVIDER: &str = "tripadvisor";

/// `/location/search` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationSearchResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub data: Option<Vec<LocationSummary>>,
}

/// Minimal record from a location search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationSummary {
    #[serde(default, deserialize_with = "string_or_number")]
    pub location_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address_obj: Option<AddressObj>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressObj {
    #[serde(default, deserialize_with = "lenient")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address_string: Option<String>,
}

/// `/location/{id}/details` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationDetails {
    #[serde(default, deserialize_with = "string_or_number")]
    pub location_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub web_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address_obj: Option<AddressObj>,
    /// Number or numeric string depending on endpoint version
    #[serde(default)]
    pub rating: Option<Value>,
    /// `"$50-$100"`, `"$75"` or a class code such as `"$$$"`
    #[serde(default, deserialize_with = "lenient")]
    pub price_level: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub hotel_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub amenities: Option<Vec<RawAmenity>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub styles: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub spoken_languages: Option<Vec<RawLanguage>>,
}

/// Amenities arrive either as bare strings or as `{ "name": ... }` objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmenity {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl RawAmenity {
    pub fn name(&self) -> Option<&str> {
        match self {
            RawAmenity::Name(name) => Some(name.as_str()),
            RawAmenity::Object { name } => name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLanguage {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// `/location/{id}/photos` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub data: Option<Vec<RawPhoto>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPhoto {
    #[serde(default, deserialize_with = "lenient")]
    pub images: Option<PhotoImages>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoImages {
    #[serde(default, deserialize_with = "lenient")]
    pub original: Option<PhotoImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub large: Option<PhotoImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub medium: Option<PhotoImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub small: Option<PhotoImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail: Option<PhotoImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoImage {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

/// `/location/{id}/reviews` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub data: Option<Vec<RawReview>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
}

/// Authenticated client for the hotel-content provider
#[derive(Clone)]
pub struct TripAdvisorClient {
    http_client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl TripAdvisorClient {
    pub fn new(http_client: Client, base_url: &str, api_key: ApiKey) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_usable()
    }

    /// Perform a GET against `endpoint`.
    ///
    /// Returns `Ok(None)` without touching the network when no usable key is
    /// configured, so callers can switch to fallback data. Non-2xx responses
    /// become [`TravelError::ProviderError`] with the response body attached.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, TravelError> {
        let Some(key) = self.api_key.usable() else {
            warn!("TripAdvisor API key not found or is a placeholder, using fallback data");
            return Ok(None);
        };

        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&[("key", key)])
            .query(params)
            .send()
            .await?;
        let status = response.status();

        debug!(
            endpoint = endpoint,
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "TripAdvisor request completed"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(endpoint = endpoint, status = %status, body = %body, "TripAdvisor request failed");
            return Err(TravelError::ProviderError {
                provider: TRIPADVISOR_PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    pub async fn search_locations(&self, query: &str) -> Result<Option<LocationSearchResponse>, TravelError> {
        info!(query = query, "Searching TripAdvisor locations");
        self.request(
            "/location/search",
            &[("searchQuery", query), ("category", "hotels"), ("language", "en")],
        )
        .await
    }

    pub async fn location_details(&self, location_id: &str) -> Result<Option<LocationDetails>, TravelError> {
        self.request(
            &format!("/location/{}/details", location_id),
            &[("language", "en"), ("currency", "USD")],
        )
        .await
    }

    pub async fn location_photos(&self, location_id: &str) -> Result<Option<PhotoResponse>, TravelError> {
        self.request(
            &format!("/location/{}/photos", location_id),
            &[("language", "en"), ("limit", "10")],
        )
        .await
    }

    pub async fn location_reviews(&self, location_id: &str) -> Result<Option<ReviewResponse>, TravelError> {
        self.request(
            &format!("/location/{}/reviews", location_id),
            &[("language", "en"), ("limit", "5")],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: &str) -> TripAdvisorClient {
        TripAdvisorClient::new(Client::new(), &server.uri(), ApiKey::from(key))
    }

    #[tokio::test]
    async fn test_unconfigured_client_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, "YOUR_TRIPADVISOR_API_KEY");
        let result = client.search_locations("Paris").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_search_sends_key_and_parses_summaries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/search"))
            .and(query_param("key", "test-key"))
            .and(query_param("searchQuery", "Bangkok"))
            .and(query_param("category", "hotels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"location_id": "123", "name": "Riverside", "address_obj": {"city": "Bangkok"}},
                    {"location_id": 456, "name": "Numeric Id"},
                    "not-an-object"
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, "test-key");
        let response = client.search_locations("Bangkok").await.unwrap().unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.len(), 2, "malformed element should be skipped");
        assert_eq!(data[0].location_id.as_deref(), Some("123"));
        assert_eq!(data[1].location_id.as_deref(), Some("456"));
    }

    #[tokio::test]
    async fn test_non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/42/details"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = client_for(&server, "bad-key");
        match client.location_details("42").await {
            Err(TravelError::ProviderError { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_details_accept_mixed_amenity_shapes() {
        let details: LocationDetails = serde_json::from_value(json!({
            "name": "Mixed",
            "amenities": ["Pool", {"name": "Bar"}, 7],
            "hotel_class": 4.5,
            "spoken_languages": [{"name": "English"}]
        }))
        .unwrap();
        let names: Vec<_> = details
            .amenities
            .unwrap()
            .iter()
            .filter_map(|a| a.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Pool", "Bar"]);
        assert_eq!(details.hotel_class.as_deref(), Some("4.5"));
    }
}
