//! Hotel aggregation: provider strategies, detail cache and the aggregator

use crate::catalog::mock_hotels;
use crate::config::{Config, PartialItemPolicy};
use crate::normalize::{normalize, normalize_summary};
use crate::tripadvisor::{LocationSummary, TripAdvisorClient, TRIPADVISOR_PROVIDER};
use crate::{Hotel, TravelError};
use async_trait::async_trait;
use futures::future::join_all;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Searched when the caller gives no location
pub const DEFAULT_LOCATION: &str = "Dhaka";

const PLACEHOLDER_IMAGE: &str = "https://picsum.photos/800/600?random=";

/// Gallery fallback, stable per hotel id
pub fn placeholder_image(id: &str) -> String {
    format!("{}{}", PLACEHOLDER_IMAGE, id)
}

/// A source of canonical hotels
#[async_trait]
pub trait HotelProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hotels for a location; an error means the caller should fall back
    async fn search(&self, location: &str) -> Result<Vec<Hotel>, TravelError>;

    /// One hotel; `Ok(None)` when the provider has no such record
    async fn hotel(&self, id: &str) -> Result<Option<Hotel>, TravelError>;
}

/// The in-memory catalog, filtered by location substring
#[derive(Debug, Clone)]
pub struct MockHotelProvider {
    catalog: Vec<Hotel>,
}

impl MockHotelProvider {
    pub fn new() -> Self {
        Self::with_catalog(mock_hotels())
    }

    pub fn with_catalog(catalog: Vec<Hotel>) -> Self {
        Self { catalog }
    }

    /// Entries whose location contains `location`, ignoring case
    pub fn matching(&self, location: &str) -> Vec<Hotel> {
        let needle = location.to_lowercase();
        self.catalog
            .iter()
            .filter(|h| h.location.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<Hotel> {
        self.catalog.iter().find(|h| h.id == id).cloned()
    }
}

impl Default for MockHotelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HotelProvider for MockHotelProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn search(&self, location: &str) -> Result<Vec<Hotel>, TravelError> {
        Ok(self.matching(location))
    }

    async fn hotel(&self, id: &str) -> Result<Option<Hotel>, TravelError> {
        Ok(self.find(id))
    }
}

/// Normalized hotels keyed by provider location id.
///
/// Entries are only inserted when absent, so duplicate concurrent fetches
/// for one id are harmless.
pub struct DetailCache {
    entries: Mutex<LruCache<String, Hotel>>,
}

impl DetailCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Hotel> {
        self.entries.lock().await.get(id).cloned()
    }

    pub async fn insert(&self, id: &str, hotel: Hotel) {
        let mut entries = self.entries.lock().await;
        if !entries.contains(id) {
            entries.put(id.to_string(), hotel);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// TripAdvisor-backed provider: search, then bounded detail fan-out
pub struct LiveHotelProvider {
    client: TripAdvisorClient,
    cache: Arc<DetailCache>,
    fanout: usize,
    partial_items: PartialItemPolicy,
}

impl LiveHotelProvider {
    pub fn new(
        client: TripAdvisorClient,
        cache: Arc<DetailCache>,
        fanout: usize,
        partial_items: PartialItemPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            fanout: fanout.max(1),
            partial_items,
        }
    }

    /// Details, photos and reviews for one location, normalized and cached.
    ///
    /// Details are required; photo or review failures only cost the gallery
    /// or review list.
    async fn fetch_hotel(&self, id: &str) -> Result<Option<Hotel>, TravelError> {
        if let Some(hotel) = self.cache.get(id).await {
            debug!(location_id = id, "Detail cache hit");
            return Ok(Some(hotel));
        }

        let (details, photos, reviews) = tokio::join!(
            self.client.location_details(id),
            self.client.location_photos(id),
            self.client.location_reviews(id),
        );

        let details = match details {
            Ok(Some(details)) => details,
            Ok(None) => {
                return Err(TravelError::ProviderUnconfigured {
                    provider: TRIPADVISOR_PROVIDER,
                })
            }
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let photos = photos.unwrap_or_else(|e| {
            warn!(location_id = id, error = %e, "Photo fetch failed, using placeholder gallery");
            None
        });
        let reviews = reviews.unwrap_or_else(|e| {
            warn!(location_id = id, error = %e, "Review fetch failed, continuing without reviews");
            None
        });

        let hotel = normalize(
            id,
            &details,
            photos.as_ref(),
            reviews.as_ref(),
            &placeholder_image(id),
        );
        self.cache.insert(id, hotel.clone()).await;
        Ok(Some(hotel))
    }

    /// Enrich one summary; failures are isolated to this item
    async fn enrich(&self, summary: LocationSummary) -> Option<Hotel> {
        let id = summary.location_id.clone()?;
        let failure = match self.fetch_hotel(&id).await {
            Ok(Some(hotel)) => return Some(hotel),
            Ok(None) => "no detail record".to_string(),
            Err(e) => e.to_string(),
        };

        match self.partial_items {
            PartialItemPolicy::Omit => {
                warn!(location_id = %id, reason = %failure, "Dropping hotel after failed enrichment");
                None
            }
            PartialItemPolicy::Placeholder => {
                warn!(location_id = %id, reason = %failure, "Keeping partial hotel after failed enrichment");
                Some(normalize_summary(&id, &summary, &placeholder_image(&id)))
            }
        }
    }
}

#[async_trait]
impl HotelProvider for LiveHotelProvider {
    fn name(&self) -> &'static str {
        TRIPADVISOR_PROVIDER
    }

    async fn search(&self, location: &str) -> Result<Vec<Hotel>, TravelError> {
        let response = self
            .client
            .search_locations(location)
            .await?
            .ok_or(TravelError::ProviderUnconfigured {
                provider: TRIPADVISOR_PROVIDER,
            })?;
        let summaries = response
            .data
            .ok_or_else(|| TravelError::NoData(format!("location search for {:?}", location)))?;

        info!(
            location = location,
            summaries = summaries.len(),
            fanout = self.fanout,
            "Enriching hotel summaries"
        );

        let enriched = join_all(
            summaries
                .into_iter()
                .take(self.fanout)
                .map(|summary| self.enrich(summary)),
        )
        .await;

        Ok(enriched.into_iter().flatten().collect())
    }

    async fn hotel(&self, id: &str) -> Result<Option<Hotel>, TravelError> {
        self.fetch_hotel(id).await
    }
}

/// Hotel search with a guaranteed availability floor.
///
/// The primary provider is chosen once at construction. Any primary error
/// falls back to the mock catalog, so search never fails outright.
pub struct HotelAggregator {
    primary: Arc<dyn HotelProvider>,
    fallback: MockHotelProvider,
}

impl HotelAggregator {
    pub fn new(primary: Arc<dyn HotelProvider>, fallback: MockHotelProvider) -> Self {
        Self { primary, fallback }
    }

    /// Live provider when the key is usable, otherwise the mock catalog
    pub fn from_config(config: &Config, client: TripAdvisorClient) -> Self {
        let primary: Arc<dyn HotelProvider> = if client.is_configured() {
            let cache = Arc::new(DetailCache::new(config.detail_cache_size));
            Arc::new(LiveHotelProvider::new(
                client,
                cache,
                config.hotel_fanout,
                config.partial_items,
            ))
        } else {
            warn!("TripAdvisor API key missing or placeholder, serving mock hotels");
            Arc::new(MockHotelProvider::new())
        };
        info!(provider = primary.name(), "Hotel provider selected");
        Self::new(primary, MockHotelProvider::new())
    }

    pub fn provider_name(&self) -> &'static str {
        self.primary.name()
    }

    #[instrument(level = "info", skip(self))]
    pub async fn search_hotels_by_location(&self, query: &str) -> Vec<Hotel> {
        let location = match query.trim() {
            "" => DEFAULT_LOCATION,
            trimmed => trimmed,
        };

        match self.primary.search(location).await {
            Ok(hotels) => {
                info!(location = location, hotels = hotels.len(), "Hotel search completed");
                hotels
            }
            Err(e) => {
                warn!(location = location, error = %e, "Hotel search failed, falling back to mock hotels");
                self.fallback.matching(location)
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn get_hotel_by_id(&self, id: &str) -> Option<Hotel> {
        match self.primary.hotel(id).await {
            Ok(Some(hotel)) => Some(hotel),
            Ok(None) => {
                debug!(hotel_id = id, "No provider record, checking mock catalog");
                self.fallback.find(id)
            }
            Err(e) => {
                warn!(hotel_id = id, error = %e, "Hotel lookup failed, checking mock catalog");
                self.fallback.find(id)
            }
        }
    }
}
