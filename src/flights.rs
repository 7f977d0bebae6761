//! Flight search orchestration: submit, poll, map and enrich

use crate::airports::{AirportNameCache, NearbyAirportFinder, StaticNearbyAirports};
use crate::aviasales::{LatestPrice, RawProposal, AVIASALES_PROVIDER};
use crate::polling::{poll_until, PollOutcome, PollPolicy, Sleeper, TokioSleeper};
use crate::{Flight, FlightQuery, FlightSearchOutcome, TravelError};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Booking site used to absolutize relative deep links
pub const BOOKING_SITE: &str = "https://www.aviasales.com";

/// A flight-pricing provider
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Affiliate marker embedded in booking links
    fn partner_id(&self) -> &str;

    /// Start a job-based search, returning the job id
    async fn submit_search(&self, query: &FlightQuery) -> Result<String, TravelError>;

    /// Proposals for a job; empty while the job is still running
    async fn search_results(&self, search_id: &str) -> Result<Vec<RawProposal>, TravelError>;

    async fn latest_prices(&self, query: &FlightQuery) -> Result<Vec<LatestPrice>, TravelError>;
}

/// Absolute booking link carrying the affiliate marker
pub fn booking_link(link: Option<&str>, marker: &str) -> String {
    let link = link.map(str::trim).unwrap_or_default();
    let mut url = if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{}{}", BOOKING_SITE, link)
    } else {
        format!("{}/{}", BOOKING_SITE, link)
    };

    if !url.contains("marker=") {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str("marker=");
        url.push_str(marker);
    }
    url
}

/// Map one proposal to a [`Flight`]. Proposals without segments are dropped.
///
/// Airport fields hold the bare codes until enrichment resolves names.
pub fn flight_from_proposal(proposal: &RawProposal, marker: &str) -> Option<Flight> {
    let segments = proposal.segments.as_deref().filter(|s| !s.is_empty())?;
    let outbound = &segments[0];

    let origin = outbound.origin.clone().unwrap_or_default();
    let destination = outbound.destination.clone().unwrap_or_default();
    let flight_number = outbound.flight_number.clone().unwrap_or_default();
    let departure_at = outbound.departure.clone().unwrap_or_default();

    let stops: u32 = segments.iter().map(|s| s.stops.unwrap_or(0)).sum();
    let duration: u32 = segments.iter().map(|s| s.duration.unwrap_or(0)).sum();

    Some(Flight {
        id: Flight::synthesize_id(&origin, &destination, &flight_number, &departure_at),
        origin_airport: origin.clone(),
        destination_airport: destination.clone(),
        origin,
        destination,
        price: proposal.price.as_ref().and_then(|p| p.amount).unwrap_or(0.0),
        airline: proposal.validating_carrier.clone().unwrap_or_default(),
        flight_number,
        departure_at,
        return_at: segments.get(1).and_then(|s| s.departure.clone()),
        transfers: stops.saturating_sub(1),
        duration,
        link: booking_link(proposal.deeplink_url.as_deref(), marker),
    })
}

/// Map one cached fare to a [`Flight`]
pub fn flight_from_latest(price: &LatestPrice, marker: &str) -> Flight {
    let origin = price.origin.clone().unwrap_or_default();
    let destination = price.destination.clone().unwrap_or_default();
    let flight_number = price.flight_number.clone().unwrap_or_default();
    let departure_at = price.departure_at.clone().unwrap_or_default();

    Flight {
        id: Flight::synthesize_id(&origin, &destination, &flight_number, &departure_at),
        origin_airport: price.origin_airport.clone().unwrap_or_else(|| origin.clone()),
        destination_airport: price
            .destination_airport
            .clone()
            .unwrap_or_else(|| destination.clone()),
        origin,
        destination,
        price: price.price.unwrap_or(0.0),
        airline: price.airline.clone().unwrap_or_default(),
        flight_number,
        departure_at,
        return_at: price.return_at.clone(),
        transfers: price.transfers.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32,
        duration: price.duration.unwrap_or(0),
        link: booking_link(price.link.as_deref(), marker),
    }
}

/// Drives a job-based search through submit, bounded polling and enrichment.
///
/// A missing provider credential propagates as
/// [`TravelError::ProviderUnconfigured`]. Every other failure ends in an
/// empty outcome.
pub struct FlightSearchOrchestrator {
    provider: Arc<dyn FlightProvider>,
    airport_names: Arc<AirportNameCache>,
    nearby: Arc<dyn NearbyAirportFinder>,
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FlightSearchOrchestrator {
    pub fn new(provider: Arc<dyn FlightProvider>, airport_names: Arc<AirportNameCache>) -> Self {
        Self {
            provider,
            airport_names,
            nearby: Arc::new(StaticNearbyAirports::new()),
            policy: PollPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_nearby(mut self, nearby: Arc<dyn NearbyAirportFinder>) -> Self {
        self.nearby = nearby;
        self
    }

    #[instrument(level = "info", skip(self))]
    pub async fn get_flights(&self, query: &FlightQuery) -> Result<FlightSearchOutcome, TravelError> {
        query.validate()?;
        match self.search(query).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ TravelError::ProviderUnconfigured { .. }) => {
                error!(provider = AVIASALES_PROVIDER, "Flight provider is not configured");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Flight search failed, returning empty results");
                Ok(FlightSearchOutcome::empty())
            }
        }
    }

    async fn search(&self, query: &FlightQuery) -> Result<FlightSearchOutcome, TravelError> {
        let search_id = self.provider.submit_search(query).await?;
        let marker = self.provider.partner_id().to_string();

        let outcome = poll_until(&self.policy, self.sleeper.as_ref(), |attempt| {
            let search_id = search_id.clone();
            let marker = marker.clone();
            async move {
                let proposals = self.provider.search_results(&search_id).await?;
                let flights: Vec<Flight> = proposals
                    .iter()
                    .filter_map(|p| flight_from_proposal(p, &marker))
                    .collect();
                info!(attempt = attempt, proposals = proposals.len(), flights = flights.len(), "Polled flight results");
                Ok((!flights.is_empty()).then_some(flights))
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready(flights) => Ok(FlightSearchOutcome {
                flights: self.with_airport_names(flights).await,
                alternative_origin: None,
                alternative_destination: None,
            }),
            PollOutcome::Exhausted { attempts } => {
                info!(attempts = attempts, "No flights found, suggesting nearby airports");
                let (alternative_origin, alternative_destination) = tokio::join!(
                    self.nearby.nearby(&query.origin),
                    self.nearby.nearby(&query.destination),
                );
                Ok(FlightSearchOutcome {
                    flights: Vec::new(),
                    alternative_origin: Some(alternative_origin),
                    alternative_destination: Some(alternative_destination),
                })
            }
        }
    }

    async fn with_airport_names(&self, flights: Vec<Flight>) -> Vec<Flight> {
        join_all(flights.into_iter().map(|mut flight| async move {
            let (origin, destination) = tokio::join!(
                self.airport_names.resolve(&flight.origin),
                self.airport_names.resolve(&flight.destination),
            );
            flight.origin_airport = origin;
            flight.destination_airport = destination;
            flight
        }))
        .await
    }

    /// Cached fares for a route; provider errors propagate
    #[instrument(level = "info", skip(self))]
    pub async fn latest_prices(&self, query: &FlightQuery) -> Result<Vec<Flight>, TravelError> {
        query.validate()?;
        let marker = self.provider.partner_id().to_string();
        let prices = self.provider.latest_prices(query).await?;
        Ok(prices.iter().map(|p| flight_from_latest(p, &marker)).collect())
    }
}
