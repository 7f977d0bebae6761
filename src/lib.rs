//! # Wayfare
//!
//! Hotel and flight search aggregation. Wayfare composes a hotel-content
//! provider (TripAdvisor), a flight-pricing provider (Aviasales/Travelpayouts)
//! and a language model (Gemini) into one stable set of entities, degrading to
//! an in-memory hotel catalog whenever the hotel provider is unavailable.

pub mod airports;
pub mod aviasales;
pub mod catalog;
pub mod config;
pub mod flights;
pub mod hotels;
pub mod llm;
pub mod logging;
pub mod normalize;
pub mod polling;
pub mod recommend;
pub mod tripadvisor;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

// Re-export main types for convenience
pub use airports::{AirportDirectory, AirportNameCache, NearbyAirportFinder, StaticNearbyAirports};
pub use aviasales::AviasalesClient;
pub use config::{ApiKey, Config, PartialItemPolicy};
pub use flights::{FlightProvider, FlightSearchOrchestrator};
pub use hotels::{DetailCache, HotelAggregator, HotelProvider, LiveHotelProvider, MockHotelProvider};
pub use llm::{GeminiClient, LanguageModel};
pub use polling::{PollOutcome, PollPolicy, Sleeper, TokioSleeper};
pub use recommend::{
    PersonalizedRecommendations, PreferenceInput, RecommendationOrchestrator, RecommendedHotel,
};
pub use tripadvisor::TripAdvisorClient;

/// Error types for the travel aggregation layer
#[derive(Error, Debug)]
pub enum TravelError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{provider} is not configured (missing or placeholder API key)")]
    ProviderUnconfigured { provider: &'static str },

    #[error("{provider} request failed with status {status}: {body}")]
    ProviderError {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("No data returned: {0}")]
    NoData(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Expected the model to choose the {tool} tool")]
    ToolNotUsed { tool: String },

    #[error("Model output did not match the expected schema: {0}")]
    InvalidModelOutput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TravelError {
    /// True for failures a caller should surface as a retryable banner
    /// rather than a configuration problem.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TravelError::ProviderUnconfigured { .. } | TravelError::ConfigError(_)
        )
    }

    /// True when the provider answered 404 for the requested record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TravelError::ProviderError { status: 404, .. })
    }
}

/// A named hotel capability such as "Pool" or "Wi-Fi"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub name: String,
}

impl Amenity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A guest review, rating on a 0-5 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub rating: u8,
    pub comment: String,
}

/// Canonical hotel entity produced by the normalizer or the mock catalog.
///
/// `rating` is always within `[0, 5]`, `price` is a positive per-night amount
/// and `gallery` holds at least one image URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub price: f64,
    pub rating: f64,
    pub amenities: Vec<Amenity>,
    pub reviews: Vec<Review>,
    pub gallery: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoken_languages: Option<Vec<String>>,
}

impl Hotel {
    /// Case-insensitive amenity lookup
    pub fn has_amenity(&self, name: &str) -> bool {
        self.amenities
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// A priced flight itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub origin_airport: String,
    pub destination_airport: String,
    pub price: f64,
    pub airline: String,
    pub flight_number: String,
    pub departure_at: String,
    pub return_at: Option<String>,
    pub transfers: u32,
    pub duration: u32,
    pub link: String,
}

impl Flight {
    /// Identity for a result: origin, destination, flight number and departure.
    pub fn synthesize_id(origin: &str, destination: &str, flight_number: &str, departure_at: &str) -> String {
        format!("{}-{}-{}-{}", origin, destination, flight_number, departure_at)
    }
}

/// A nearby-airport hint offered when a search finds nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportSuggestion {
    pub code: String,
    pub name: String,
}

/// A recommended hotel joined back to the candidate it names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub hotel_id: String,
    pub name: String,
    pub reason: String,
}

/// Flight search parameters: IATA codes and `YYYY-MM-DD` dates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub depart_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
}

impl FlightQuery {
    /// Create a validated query. Codes are upper-cased.
    pub fn new(
        origin: &str,
        destination: &str,
        depart_date: &str,
        return_date: Option<&str>,
    ) -> Result<Self, TravelError> {
        let query = Self {
            origin: origin.trim().to_uppercase(),
            destination: destination.trim().to_uppercase(),
            depart_date: depart_date.trim().to_string(),
            return_date: return_date
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<(), TravelError> {
        Self::check_iata(&self.origin)?;
        Self::check_iata(&self.destination)?;
        let depart = Self::parse_date(&self.depart_date)?;
        if let Some(return_date) = &self.return_date {
            let back = Self::parse_date(return_date)?;
            if back < depart {
                return Err(TravelError::InvalidQuery(format!(
                    "return date {} is before departure {}",
                    return_date, self.depart_date
                )));
            }
        }
        Ok(())
    }

    fn check_iata(code: &str) -> Result<(), TravelError> {
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(())
        } else {
            Err(TravelError::InvalidQuery(format!(
                "airport code must be 3 letters, got {:?}",
                code
            )))
        }
    }

    fn parse_date(date: &str) -> Result<NaiveDate, TravelError> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            TravelError::InvalidQuery(format!("date must be YYYY-MM-DD, got {:?}", date))
        })
    }
}

/// Result of a flight search; alternatives are only set when nothing was found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightSearchOutcome {
    pub flights: Vec<Flight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_origin: Option<Vec<AirportSuggestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_destination: Option<Vec<AirportSuggestion>>,
}

impl FlightSearchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Entry point wiring the providers, caches and orchestrators together
pub struct Wayfare {
    hotels: Arc<HotelAggregator>,
    flights: FlightSearchOrchestrator,
    directory: Arc<dyn AirportDirectory>,
    recommender: Option<RecommendationOrchestrator>,
}

impl Wayfare {
    /// Build every component from configuration. Provider selection happens here, once.
    pub fn from_config(config: &Config) -> Result<Self, TravelError> {
        debug!("Creating Wayfare services");
        let http_client = config.http_client()?;

        let tripadvisor = TripAdvisorClient::new(
            http_client.clone(),
            &config.tripadvisor_api_url,
            config.tripadvisor_api_key.clone(),
        );
        let hotels = Arc::new(HotelAggregator::from_config(config, tripadvisor));

        let aviasales = Arc::new(AviasalesClient::new(
            http_client.clone(),
            &config.aviasales_api_url,
            config.aviasales_api_key.clone(),
            &config.aviasales_partner_id,
        ));
        let airport_names = Arc::new(AirportNameCache::new(aviasales.clone()));
        let flights = FlightSearchOrchestrator::new(aviasales.clone(), airport_names);

        let recommender = match config.gemini_api_key.usable() {
            Some(key) => {
                let model = GeminiClient::new(
                    http_client,
                    &config.gemini_api_url,
                    key,
                    &config.gemini_model,
                );
                Some(RecommendationOrchestrator::new(Arc::new(model), hotels.clone()))
            }
            None => {
                info!("No usable Gemini API key, recommendations are disabled");
                None
            }
        };

        Ok(Self {
            hotels,
            flights,
            directory: aviasales,
            recommender,
        })
    }

    /// Assemble from pre-built parts
    pub fn new(
        hotels: Arc<HotelAggregator>,
        flights: FlightSearchOrchestrator,
        directory: Arc<dyn AirportDirectory>,
        recommender: Option<RecommendationOrchestrator>,
    ) -> Self {
        Self {
            hotels,
            flights,
            directory,
            recommender,
        }
    }

    pub async fn search_hotels_by_location(&self, location: &str) -> Vec<Hotel> {
        self.hotels.search_hotels_by_location(location).await
    }

    pub async fn get_hotel_by_id(&self, id: &str) -> Option<Hotel> {
        self.hotels.get_hotel_by_id(id).await
    }

    pub async fn get_flights(&self, query: &FlightQuery) -> Result<FlightSearchOutcome, TravelError> {
        self.flights.get_flights(query).await
    }

    pub async fn latest_prices(&self, query: &FlightQuery) -> Result<Vec<Flight>, TravelError> {
        self.flights.latest_prices(query).await
    }

    pub async fn search_airports(&self, query: &str) -> Result<Vec<AirportSuggestion>, TravelError> {
        airports::search_airports(self.directory.as_ref(), query).await
    }

    pub async fn recommend_from_candidates(
        &self,
        candidates: &[Hotel],
        search_criteria: &str,
    ) -> Result<Option<Vec<Recommendation>>, TravelError> {
        self.recommender()?
            .recommend_from_candidates(candidates, search_criteria)
            .await
    }

    pub async fn get_personalized_recommendations(
        &self,
        input: &PreferenceInput,
    ) -> Result<PersonalizedRecommendations, TravelError> {
        self.recommender()?.personalized(input).await
    }

    fn recommender(&self) -> Result<&RecommendationOrchestrator, TravelError> {
        self.recommender
            .as_ref()
            .ok_or(TravelError::ProviderUnconfigured { provider: llm::GEMINI_PROVIDER })
    }
}

/// Search hotels with configuration read from the environment
pub async fn search_hotels(location: &str) -> Result<Vec<Hotel>, TravelError> {
    let wayfare = Wayfare::from_config(&Config::from_env())?;
    Ok(wayfare.search_hotels_by_location(location).await)
}

/// Search flights with configuration read from the environment
pub async fn get_flights(query: &FlightQuery) -> Result<FlightSearchOutcome, TravelError> {
    let wayfare = Wayfare::from_config(&Config::from_env())?;
    wayfare.get_flights(query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_query_normalizes_codes() {
        let query = FlightQuery::new(" dac ", "cxb", "2025-08-15", None).unwrap();
        assert_eq!(query.origin, "DAC");
        assert_eq!(query.destination, "CXB");
        assert_eq!(query.return_date, None);
    }

    #[test]
    fn test_flight_query_rejects_bad_input() {
        assert!(FlightQuery::new("DACA", "CXB", "2025-08-15", None).is_err());
        assert!(FlightQuery::new("D1C", "CXB", "2025-08-15", None).is_err());
        assert!(FlightQuery::new("DAC", "CXB", "15/08/2025", None).is_err());
        assert!(FlightQuery::new("DAC", "CXB", "2025-08-15", Some("2025-08-10")).is_err());
    }

    #[test]
    fn test_flight_query_blank_return_is_one_way() {
        let query = FlightQuery::new("JFK", "LHR", "2025-08-15", Some("  ")).unwrap();
        assert!(query.return_date.is_none());
    }

    #[test]
    fn test_synthesized_ids_differ_by_flight_number() {
        let a = Flight::synthesize_id("JFK", "LHR", "100", "2025-08-15T10:00:00Z");
        let b = Flight::synthesize_id("JFK", "LHR", "101", "2025-08-15T10:00:00Z");
        assert_ne!(a, b);
        assert_eq!(a, "JFK-LHR-100-2025-08-15T10:00:00Z");
    }

    #[test]
    fn test_error_classification() {
        let unconfigured = TravelError::ProviderUnconfigured { provider: "aviasales" };
        assert!(!unconfigured.is_recoverable());

        let not_found = TravelError::ProviderError {
            provider: "tripadvisor",
            status: 404,
            body: String::new(),
        };
        assert!(not_found.is_recoverable());
        assert!(not_found.is_not_found());
        assert!(TravelError::ToolNotUsed { tool: "t".into() }.is_recoverable());
    }

    #[test]
    fn test_hotel_amenity_lookup_ignores_case() {
        let hotel = catalog::mock_hotels().remove(0);
        assert!(hotel.has_amenity("wi-fi"));
        assert!(!hotel.has_amenity("Casino"));
    }
}
