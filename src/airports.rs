//! Airport name resolution, airport search and nearby-airport suggestions

use crate::aviasales::AirportRecord;
use crate::{AirportSuggestion, TravelError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Most matches returned by [`search_airports`]
pub const MAX_AIRPORT_MATCHES: usize = 10;
/// Most suggestions returned per airport by [`NearbyAirportFinder`]
pub const MAX_NEARBY_AIRPORTS: usize = 3;

/// Bulk airport and city datasets
#[async_trait]
pub trait AirportDirectory: Send + Sync {
    async fn airports(&self) -> Result<Vec<AirportRecord>, TravelError>;
    async fn cities(&self) -> Result<Vec<AirportRecord>, TravelError>;
}

/// `"Name (CODE)"`, or the bare code when the record has no name
pub fn display_name(record: &AirportRecord) -> String {
    match record.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{} ({})", name, record.code),
        None => record.code.clone(),
    }
}

/// Process-wide IATA code → display name memo.
///
/// The first lookup loads the whole directory in one call. The gate keeps
/// concurrent first lookups from issuing more than one fetch. A failed
/// load is not remembered, so a later lookup retries.
pub struct AirportNameCache {
    directory: Arc<dyn AirportDirectory>,
    names: RwLock<Option<HashMap<String, String>>>,
    gate: Mutex<()>,
}

impl AirportNameCache {
    pub fn new(directory: Arc<dyn AirportDirectory>) -> Self {
        Self {
            directory,
            names: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }

    async fn lookup(&self, code: &str) -> Option<Option<String>> {
        self.names
            .read()
            .await
            .as_ref()
            .map(|names| names.get(code).cloned())
    }

    /// Display name for `code`; the bare code when unknown or on failure
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, code: &str) -> String {
        if let Some(found) = self.lookup(code).await {
            return found.unwrap_or_else(|| code.to_string());
        }

        let _gate = self.gate.lock().await;
        // Another task may have loaded the directory while we waited
        if let Some(found) = self.lookup(code).await {
            return found.unwrap_or_else(|| code.to_string());
        }

        match self.directory.airports().await {
            Ok(records) => {
                let names: HashMap<String, String> = records
                    .iter()
                    .map(|r| (r.code.clone(), display_name(r)))
                    .collect();
                info!(airports = names.len(), "Airport directory cached");
                let resolved = names.get(code).cloned();
                *self.names.write().await = Some(names);
                resolved.unwrap_or_else(|| code.to_string())
            }
            Err(e) => {
                warn!(code = code, error = %e, "Airport directory fetch failed, using bare code");
                code.to_string()
            }
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.names.read().await.is_some()
    }
}

/// Cities or airports whose name or code contains `query`, ignoring case
pub async fn search_airports(
    directory: &dyn AirportDirectory,
    query: &str,
) -> Result<Vec<AirportSuggestion>, TravelError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(TravelError::InvalidQuery("query parameter is required".to_string()));
    }

    let cities = directory.cities().await?;
    let matches: Vec<AirportSuggestion> = cities
        .into_iter()
        .filter(|city| {
            city.code.to_lowercase().contains(&needle)
                || city
                    .name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .take(MAX_AIRPORT_MATCHES)
        .map(|city| AirportSuggestion {
            name: city.name.unwrap_or_else(|| city.code.clone()),
            code: city.code,
        })
        .collect();

    debug!(query = query, matches = matches.len(), "Airport search completed");
    Ok(matches)
}

/// Suggests alternative airports when a search finds nothing
#[async_trait]
pub trait NearbyAirportFinder: Send + Sync {
    async fn nearby(&self, code: &str) -> Vec<AirportSuggestion>;
}

/// Fixed table of nearby airports for a handful of hubs
#[derive(Debug, Clone)]
pub struct StaticNearbyAirports {
    table: HashMap<&'static str, Vec<(&'static str, &'static str)>>,
}

impl StaticNearbyAirports {
    pub fn new() -> Self {
        let table = HashMap::from([
            ("CXB", vec![("CGP", "Shah Amanat International Airport")]),
            ("CGP", vec![("CXB", "Cox's Bazar Airport")]),
            (
                "JFK",
                vec![
                    ("LGA", "LaGuardia Airport"),
                    ("EWR", "Newark Liberty International Airport"),
                ],
            ),
            (
                "LHR",
                vec![
                    ("LGW", "Gatwick Airport"),
                    ("STN", "Stansted Airport"),
                    ("LCY", "London City Airport"),
                ],
            ),
        ]);
        Self { table }
    }
}

impl Default for StaticNearbyAirports {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NearbyAirportFinder for StaticNearbyAirports {
    async fn nearby(&self, code: &str) -> Vec<AirportSuggestion> {
        let code = code.trim().to_uppercase();
        debug!(code = %code, "Finding nearby airports");
        self.table
            .get(code.as_str())
            .map(|airports| {
                airports
                    .iter()
                    .take(MAX_NEARBY_AIRPORTS)
                    .map(|(code, name)| AirportSuggestion {
                        code: code.to_string(),
                        name: name.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
