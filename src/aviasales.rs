//! Aviasales / Travelpayouts client: job-based flight search, latest prices
//! and the public airport and city datasets.

use crate::airports::AirportDirectory;
use crate::config::ApiKey;
use crate::flights::FlightProvider;
use crate::normalize::{lenient_list, string_or_number};
use crate::{FlightQuery, TravelError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

pub const AVIASALES_PROVIDER: &str = "aviasales";

const ACCESS_TOKEN_HEADER: &str = "x-access-token";
const ECONOMY_CLASS: &str = "Y";

/// Body of `POST /v1/flight_search`
#[derive(Debug, Clone, Serialize)]
pub struct SearchJob {
    pub marker: String,
    pub passengers: Passengers,
    pub segments: Vec<SearchSegment>,
    pub trip_class: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Passengers {
    pub adults: u8,
    pub children: u8,
    pub infants: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSegment {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

impl SearchJob {
    /// One adult, economy; a return segment is added for round trips
    pub fn for_query(query: &FlightQuery, marker: &str) -> Self {
        let mut segments = vec![SearchSegment {
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            date: query.depart_date.clone(),
        }];
        if let Some(return_date) = &query.return_date {
            segments.push(SearchSegment {
                origin: query.destination.clone(),
                destination: query.origin.clone(),
                date: return_date.clone(),
            });
        }

        Self {
            marker: marker.to_string(),
            passengers: Passengers {
                adults: 1,
                children: 0,
                infants: 0,
            },
            segments,
            trip_class: ECONOMY_CLASS.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchStarted {
    #[serde(default, deserialize_with = "string_or_number")]
    search_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(default, deserialize_with = "lenient_list")]
    proposals: Option<Vec<RawProposal>>,
}

/// One priced itinerary from the job-based search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProposal {
    #[serde(default, deserialize_with = "string_or_number")]
    pub proposal_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub segments: Option<Vec<RawSegment>>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub validating_carrier: Option<String>,
    #[serde(default)]
    pub deeplink_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSegment {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub stops: Option<u32>,
    /// Minutes
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrice {
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LatestPricesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, deserialize_with = "lenient_list")]
    data: Option<Vec<LatestPrice>>,
}

/// One cached fare from `/v2/prices/latest`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestPrice {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub origin_airport: Option<String>,
    #[serde(default)]
    pub destination_airport: Option<String>,
    #[serde(default, alias = "value")]
    pub price: Option<f64>,
    #[serde(default, alias = "gate")]
    pub airline: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub flight_number: Option<String>,
    #[serde(default, alias = "depart_date")]
    pub departure_at: Option<String>,
    #[serde(default, alias = "return_date")]
    pub return_at: Option<String>,
    #[serde(default, alias = "number_of_changes")]
    pub transfers: Option<i64>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub link: Option<String>,
}

/// An airport or city from the public datasets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AirportRecord {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Flight-pricing provider client
#[derive(Clone)]
pub struct AviasalesClient {
    http_client: Client,
    base_url: String,
    api_key: ApiKey,
    partner_id: String,
}

impl AviasalesClient {
    pub fn new(http_client: Client, base_url: &str, api_key: ApiKey, partner_id: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            partner_id: partner_id.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_usable()
    }

    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }

    fn token(&self) -> Result<&str, TravelError> {
        self.api_key.usable().ok_or(TravelError::ProviderUnconfigured {
            provider: AVIASALES_PROVIDER,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Map non-2xx responses to a provider error carrying the body
    async fn checked(endpoint: &str, response: Response) -> Result<Response, TravelError> {
        let status = response.status();
        debug!(endpoint = endpoint, status = %status, "Aviasales request completed");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(endpoint = endpoint, status = %status, body = %body, "Aviasales request failed");
        Err(TravelError::ProviderError {
            provider: AVIASALES_PROVIDER,
            status: status.as_u16(),
            body,
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, TravelError> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Start a job-based search and return its id.
    ///
    /// Fails with [`TravelError::ProviderUnconfigured`] before any I/O when
    /// no usable token is set.
    #[instrument(level = "info", skip(self))]
    pub async fn submit_search(&self, query: &FlightQuery) -> Result<String, TravelError> {
        let token = self.token()?;
        let endpoint = "/v1/flight_search";
        let job = SearchJob::for_query(query, &self.partner_id);

        let response = self
            .http_client
            .post(self.url(endpoint))
            .header(ACCESS_TOKEN_HEADER, token)
            .json(&job)
            .send()
            .await?;
        let started: SearchStarted = Self::parse(Self::checked(endpoint, response).await?).await?;

        let search_id = started
            .search_id
            .ok_or_else(|| TravelError::NoData("flight search returned no search_id".to_string()))?;
        info!(search_id = %search_id, segments = job.segments.len(), "Flight search submitted");
        Ok(search_id)
    }

    /// Proposals collected so far for a search job; empty while pending
    pub async fn search_results(&self, search_id: &str) -> Result<Vec<RawProposal>, TravelError> {
        let endpoint = "/v1/flight_search_results";
        let response = self
            .http_client
            .get(self.url(endpoint))
            .query(&[("uuid", search_id)])
            .send()
            .await?;
        let results: SearchResults = Self::parse(Self::checked(endpoint, response).await?).await?;
        Ok(results.proposals.unwrap_or_default())
    }

    /// Cached fares for a route
    #[instrument(level = "info", skip(self))]
    pub async fn latest_prices(&self, query: &FlightQuery) -> Result<Vec<LatestPrice>, TravelError> {
        let token = self.token()?;
        let endpoint = "/v2/prices/latest";
        let mut params = vec![
            ("origin", query.origin.as_str()),
            ("destination", query.destination.as_str()),
            ("depart_date", query.depart_date.as_str()),
            ("token", token),
            ("currency", "usd"),
            ("limit", "20"),
        ];
        if let Some(return_date) = &query.return_date {
            params.push(("return_date", return_date.as_str()));
        }

        let response = self
            .http_client
            .get(self.url(endpoint))
            .query(&params)
            .send()
            .await?;
        let prices: LatestPricesResponse = Self::parse(Self::checked(endpoint, response).await?).await?;

        match (prices.success, prices.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(TravelError::NoData(
                "no flights found or invalid data from provider".to_string(),
            )),
        }
    }

    async fn dataset(&self, endpoint: &str) -> Result<Vec<AirportRecord>, TravelError> {
        let response = self.http_client.get(self.url(endpoint)).send().await?;
        let records: Vec<Value> = Self::parse(Self::checked(endpoint, response).await?).await?;
        let total = records.len();
        let parsed: Vec<AirportRecord> = records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();
        debug!(endpoint = endpoint, total = total, parsed = parsed.len(), "Dataset loaded");
        Ok(parsed)
    }

    /// Full airport directory (unauthenticated)
    pub async fn list_airports(&self) -> Result<Vec<AirportRecord>, TravelError> {
        self.dataset("/data/en/airports.json").await
    }

    /// Full city directory (unauthenticated)
    pub async fn list_cities(&self) -> Result<Vec<AirportRecord>, TravelError> {
        self.dataset("/data/en/cities.json").await
    }
}

#[async_trait]
impl FlightProvider for AviasalesClient {
    fn partner_id(&self) -> &str {
        &self.partner_id
    }

    async fn submit_search(&self, query: &FlightQuery) -> Result<String, TravelError> {
        AviasalesClient::submit_search(self, query).await
    }

    async fn search_results(&self, search_id: &str) -> Result<Vec<RawProposal>, TravelError> {
        AviasalesClient::search_results(self, search_id).await
    }

    async fn latest_prices(&self, query: &FlightQuery) -> Result<Vec<LatestPrice>, TravelError> {
        AviasalesClient::latest_prices(self, query).await
    }
}

#[async_trait]
impl AirportDirectory for AviasalesClient {
    async fn airports(&self) -> Result<Vec<AirportRecord>, TravelError> {
        self.list_airports().await
    }

    async fn cities(&self) -> Result<Vec<AirportRecord>, TravelError> {
        self.list_cities().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: &str) -> AviasalesClient {
        AviasalesClient::new(Client::new(), &server.uri(), ApiKey::from(key), "592431")
    }

    fn round_trip() -> FlightQuery {
        FlightQuery::new("DAC", "CXB", "2025-08-15", Some("2025-08-20")).unwrap()
    }

    #[test]
    fn test_search_job_has_return_segment() {
        let job = SearchJob::for_query(&round_trip(), "592431");
        assert_eq!(job.segments.len(), 2);
        assert_eq!(job.segments[1].origin, "CXB");
        assert_eq!(job.segments[1].destination, "DAC");
        assert_eq!(job.segments[1].date, "2025-08-20");
        assert_eq!(job.trip_class, "Y");
        assert_eq!(job.passengers.adults, 1);

        let one_way = FlightQuery::new("DAC", "CXB", "2025-08-15", None).unwrap();
        assert_eq!(SearchJob::for_query(&one_way, "m").segments.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_token_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client_for(&server, "YOUR_AVIASALES_API_KEY")
            .submit_search(&round_trip())
            .await;
        assert!(matches!(
            result,
            Err(TravelError::ProviderUnconfigured { provider: AVIASALES_PROVIDER })
        ));
    }

    #[tokio::test]
    async fn test_submit_sends_token_and_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/flight_search"))
            .and(header("x-access-token", "tp-token"))
            .and(body_partial_json(json!({
                "marker": "592431",
                "trip_class": "Y",
                "passengers": {"adults": 1, "children": 0, "infants": 0}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search_id": "abc-123"})))
            .mount(&server)
            .await;

        let search_id = client_for(&server, "tp-token")
            .submit_search(&round_trip())
            .await
            .unwrap();
        assert_eq!(search_id, "abc-123");
    }

    #[tokio::test]
    async fn test_search_results_parses_proposals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/flight_search_results"))
            .and(query_param("uuid", "abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "proposals": [{
                    "proposal_id": "p1",
                    "segments": [{"origin": "DAC", "destination": "CXB", "departure": "2025-08-15T08:00:00Z", "flight_number": 437, "stops": 1, "duration": 65}],
                    "price": {"amount": 82.5},
                    "validating_carrier": "BG",
                    "deeplink_url": "https://www.aviasales.com/book/p1"
                }]
            })))
            .mount(&server)
            .await;

        let proposals = client_for(&server, "tp-token").search_results("abc-123").await.unwrap();
        assert_eq!(proposals.len(), 1);
        let segment = &proposals[0].segments.as_ref().unwrap()[0];
        assert_eq!(segment.flight_number.as_deref(), Some("437"));
        assert_eq!(segment.duration, Some(65));
        assert_eq!(proposals[0].price.as_ref().and_then(|p| p.amount), Some(82.5));
    }

    #[tokio::test]
    async fn test_pending_search_has_no_proposals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/flight_search_results"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search_id": "abc"})))
            .mount(&server)
            .await;

        let proposals = client_for(&server, "tp-token").search_results("abc").await.unwrap();
        assert!(proposals.is_empty());
    }

    #[tokio::test]
    async fn test_latest_prices_requires_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/prices/latest"))
            .and(query_param("token", "tp-token"))
            .and(query_param("currency", "usd"))
            .and(query_param("return_date", "2025-08-20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "data": []})))
            .mount(&server)
            .await;

        let result = client_for(&server, "tp-token").latest_prices(&round_trip()).await;
        assert!(matches!(result, Err(TravelError::NoData(_))));
    }

    #[tokio::test]
    async fn test_airport_dataset_skips_malformed_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/en/airports.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"code": "DAC", "name": "Hazrat Shahjalal International Airport"},
                {"name": "No code"},
                {"code": "CXB", "name": null}
            ])))
            .mount(&server)
            .await;

        let airports = client_for(&server, "").list_airports().await.unwrap();
        assert_eq!(airports.len(), 2);
        assert_eq!(airports[1], AirportRecord { code: "CXB".to_string(), name: None });
    }

    #[tokio::test]
    async fn test_dataset_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/en/cities.json"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = client_for(&server, "").list_cities().await;
        assert!(matches!(result, Err(TravelError::ProviderError { status: 503, .. })));
    }
}
