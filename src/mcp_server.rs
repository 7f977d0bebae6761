// src/mcp_server.rs

use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wayfare::{logging, Config, FlightQuery, PreferenceInput, Wayfare};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "wayfare-mcp.log";

/// Travel search MCP server
#[derive(Clone)]
pub struct TravelServer {
    wayfare: Arc<Wayfare>,
}

impl TravelServer {
    pub fn new(wayfare: Wayfare) -> Self {
        Self {
            wayfare: Arc::new(wayfare),
        }
    }
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct HotelSearchParams {
    #[schemars(description = "City or region to search (e.g., Bangkok, Cox's Bazar). Omit to search the default location")]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct HotelParams {
    #[schemars(description = "Hotel id as returned by search_hotels")]
    pub id: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FlightSearchParams {
    #[schemars(description = "Origin airport IATA code (e.g., DAC, JFK)")]
    pub origin: String,
    #[schemars(description = "Destination airport IATA code (e.g., CXB, LHR)")]
    pub destination: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub depart_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format for round trips")]
    pub return_date: Option<String>,
    #[schemars(description = "Use cached latest prices instead of a live search (default: false)")]
    pub latest: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AirportSearchParams {
    #[schemars(description = "Part of a city name or IATA code (e.g., lon, DAC)")]
    pub query: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct RecommendationParams {
    #[schemars(description = "Destination city for the hotel search")]
    pub location: String,
    #[schemars(description = "Free-text preferences, e.g. 'traveling with family' or 'budget-friendly near the center'")]
    pub preferences: Option<String>,
    #[schemars(description = "Search criteria to rank the location's hotels against, used when preferences are not given")]
    pub criteria: Option<String>,
}

fn error_json(context: &str, e: impl Display) -> String {
    serde_json::json!({ "error": format!("{}: {}", context, e) }).to_string()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| error_json("Failed to serialize results", e))
}

#[tool(tool_box)]
impl TravelServer {
    #[tool(description = "Search hotels in a location. Falls back to a built-in catalog when the hotel provider is unavailable.")]
    async fn search_hotels(&self, #[tool(aggr)] params: HotelSearchParams) -> String {
        let location = params.location.unwrap_or_default();
        info!(location = %location, "Hotel search request received");
        let hotels = self.wayfare.search_hotels_by_location(&location).await;
        info!(hotels_found = hotels.len(), "Hotel search completed");
        to_json(&hotels)
    }

    #[tool(description = "Get full details for one hotel: description, amenities, reviews and photo gallery.")]
    async fn get_hotel(&self, #[tool(aggr)] params: HotelParams) -> String {
        info!(hotel_id = %params.id, "Hotel lookup request received");
        match self.wayfare.get_hotel_by_id(&params.id).await {
            Some(hotel) => to_json(&hotel),
            None => {
                warn!(hotel_id = %params.id, "Hotel not found");
                serde_json::json!({ "error": format!("Hotel {} not found", params.id) }).to_string()
            }
        }
    }

    #[tool(description = "Search flights between two airports. When nothing is found, nearby alternative airports are suggested for origin and destination.")]
    async fn get_flights(&self, #[tool(aggr)] params: FlightSearchParams) -> String {
        info!(
            origin = %params.origin,
            destination = %params.destination,
            depart_date = %params.depart_date,
            return_date = params.return_date.as_deref(),
            latest = params.latest.unwrap_or(false),
            "Flight search request received"
        );

        let query = match FlightQuery::new(
            &params.origin,
            &params.destination,
            &params.depart_date,
            params.return_date.as_deref(),
        ) {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, "Invalid flight search parameters");
                return error_json("Invalid flight search", e);
            }
        };

        if params.latest.unwrap_or(false) {
            return match self.wayfare.latest_prices(&query).await {
                Ok(flights) => to_json(&flights),
                Err(e) => {
                    error!(error = %e, "Latest price lookup failed");
                    error_json("Latest price lookup failed", e)
                }
            };
        }

        match self.wayfare.get_flights(&query).await {
            Ok(outcome) => {
                info!(flights_found = outcome.flights.len(), "Flight search completed");
                to_json(&outcome)
            }
            Err(e) => {
                error!(error = %e, "Flight search failed");
                error_json("Flight search failed", e)
            }
        }
    }

    #[tool(description = "Find cities and airports whose name or IATA code contains the query. Returns up to 10 matches.")]
    async fn find_airports(&self, #[tool(aggr)] params: AirportSearchParams) -> String {
        debug!(query = %params.query, "Airport search request received");
        match self.wayfare.search_airports(&params.query).await {
            Ok(airports) => to_json(&airports),
            Err(e) => {
                error!(error = %e, "Airport search failed");
                error_json("Airport search failed", e)
            }
        }
    }

    #[tool(description = "AI hotel recommendations. Give preferences for a personalized pick of up to 3 hotels with reasoning, or criteria to rank the location's hotels.")]
    async fn recommend_hotels(&self, #[tool(aggr)] params: RecommendationParams) -> String {
        info!(location = %params.location, "Recommendation request received");

        if let Some(preferences) = params.preferences {
            let input = PreferenceInput {
                location: params.location,
                preferences,
            };
            return match self.wayfare.get_personalized_recommendations(&input).await {
                Ok(recommendations) => to_json(&recommendations),
                Err(e) => {
                    error!(error = %e, recoverable = e.is_recoverable(), "Personalized recommendations failed");
                    error_json("Could not fetch recommendations", e)
                }
            };
        }

        let Some(criteria) = params.criteria else {
            return serde_json::json!({ "error": "Provide either preferences or criteria" }).to_string();
        };
        let candidates = self.wayfare.search_hotels_by_location(&params.location).await;
        match self.wayfare.recommend_from_candidates(&candidates, &criteria).await {
            Ok(Some(recommendations)) => to_json(&serde_json::json!({ "recommendations": recommendations })),
            Ok(None) => to_json(&serde_json::json!({ "recommendations": null })),
            Err(e) => {
                error!(error = %e, recoverable = e.is_recoverable(), "Criteria recommendations failed");
                error_json("Could not fetch recommendations", e)
            }
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for TravelServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A travel search server: hotel search and details with catalog fallback, flight search with nearby-airport suggestions, airport lookup and AI hotel recommendations. All tools return JSON.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to a file
    if let Err(e) = logging::init_file(LOG_DIR, LOG_FILE) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting Wayfare MCP server");
    let wayfare = Wayfare::from_config(&Config::from_env())?;
    let server = TravelServer::new(wayfare);

    let service = server.serve(stdio()).await?;
    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
