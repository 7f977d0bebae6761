//! AI hotel recommendations.
//!
//! Two variants share one model seam. The criteria-based variant ranks an
//! explicit candidate set in a single call. The preference-based variant
//! makes the model call the hotel recommendation tool first, then asks for a
//! structured recommendation grounded in the tool's real output.

use crate::hotels::HotelAggregator;
use crate::llm::{GenerateRequest, LanguageModel, ToolSpec};
use crate::{Hotel, Recommendation, TravelError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const HOTEL_RECOMMENDATION_TOOL: &str = "hotelRecommendationTool";
/// Below this many candidates the criteria-based variant abstains
pub const MIN_CANDIDATES: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceInput {
    pub location: String,
    pub preferences: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedHotel {
    pub name: String,
    pub price: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedRecommendations {
    pub reasoning: String,
    pub hotels: Vec<RecommendedHotel>,
}

/// Output of the hotel recommendation tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelToolOutput {
    pub hotels: Vec<RecommendedHotel>,
}

/// Looks up real hotels for a location on the model's behalf
#[derive(Clone)]
pub struct HotelRecommendationTool {
    hotels: Arc<HotelAggregator>,
}

impl HotelRecommendationTool {
    pub fn new(hotels: Arc<HotelAggregator>) -> Self {
        Self { hotels }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: HOTEL_RECOMMENDATION_TOOL.to_string(),
            description: "Get hotel recommendations for a given location.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state to search for hotels in."
                    }
                },
                "required": ["location"]
            }),
        }
    }

    pub async fn run(&self, location: &str) -> HotelToolOutput {
        info!(location = location, "Running hotel recommendation tool");
        let hotels = self.hotels.search_hotels_by_location(location).await;
        HotelToolOutput {
            hotels: hotels
                .into_iter()
                .map(|h| RecommendedHotel {
                    name: h.name,
                    price: h.price,
                    rating: h.rating,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateDetails<'a> {
    name: &'a str,
    rating: f64,
    reviews: Vec<&'a str>,
    location: &'a str,
    price: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CriteriaToolInput<'a> {
    hotel_details: Vec<CandidateDetails<'a>>,
    search_criteria: &'a str,
}

#[derive(Debug, Deserialize)]
struct CriteriaOutput {
    #[serde(default)]
    recommendations: Vec<NamedReason>,
}

#[derive(Debug, Deserialize)]
struct NamedReason {
    name: String,
    #[serde(default)]
    reason: String,
}

fn criteria_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "recommendations": {
                "type": "array",
                "description": "Up to 3 recommended hotels, best first.",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Exact name of a hotel from the list."},
                        "reason": {"type": "string", "description": "Why this hotel fits the search."}
                    },
                    "required": ["name", "reason"]
                }
            }
        },
        "required": ["recommendations"]
    })
}

fn personalized_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reasoning": {
                "type": "string",
                "description": "An explanation of why the recommended hotels were chosen, tailored to the user's preferences."
            },
            "hotels": {
                "type": "array",
                "description": "A list of up to 3 recommended hotels.",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "The name of the recommended hotel."},
                        "price": {"type": "number", "description": "The price per night for the hotel."},
                        "rating": {"type": "number", "description": "The hotel's rating out of 5."}
                    },
                    "required": ["name", "price", "rating"]
                }
            }
        },
        "required": ["reasoning", "hotels"]
    })
}

fn agent_preamble(input: &PreferenceInput) -> String {
    format!(
        "You are a travel agent who is an expert at recommending hotels. \
         A user is looking for a hotel in {} and has the following preferences: \"{}\".",
        input.location, input.preferences
    )
}

pub struct RecommendationOrchestrator {
    model: Arc<dyn LanguageModel>,
    tool: HotelRecommendationTool,
}

impl RecommendationOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, hotels: Arc<HotelAggregator>) -> Self {
        Self {
            model,
            tool: HotelRecommendationTool::new(hotels),
        }
    }

    /// Rank `candidates` against free-text criteria.
    ///
    /// Returns `Ok(None)` when there are too few candidates to compare.
    /// Names the model invents are dropped; each result carries the id of
    /// the candidate it names.
    #[instrument(level = "info", skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn recommend_from_candidates(
        &self,
        candidates: &[Hotel],
        search_criteria: &str,
    ) -> Result<Option<Vec<Recommendation>>, TravelError> {
        if candidates.len() < MIN_CANDIDATES {
            debug!("Too few candidates, skipping recommendations");
            return Ok(None);
        }

        let input = CriteriaToolInput {
            hotel_details: candidates
                .iter()
                .map(|h| CandidateDetails {
                    name: &h.name,
                    rating: h.rating,
                    reviews: h.reviews.iter().map(|r| r.comment.as_str()).collect(),
                    location: &h.location,
                    price: h.price,
                })
                .collect(),
            search_criteria,
        };
        let prompt = format!(
            "You are a travel agent. Given these hotels and the user's search criteria, \
             recommend up to {} hotels that best match and give a short reason for each. \
             Only use hotel names exactly as they appear in the list.\n\n{}",
            MAX_RECOMMENDATIONS,
            serde_json::to_string(&input)?
        );

        let response = self
            .model
            .generate(GenerateRequest::new(prompt).with_output_schema(criteria_schema()))
            .await?;
        let output: CriteriaOutput = response.parse_output()?;

        let proposed = output.recommendations.len();
        let mut seen = HashSet::new();
        let recommendations: Vec<Recommendation> = output
            .recommendations
            .into_iter()
            .filter_map(|pick| {
                let hotel = candidates.iter().find(|h| h.name == pick.name)?;
                if !seen.insert(hotel.id.as_str()) {
                    return None;
                }
                Some(Recommendation {
                    hotel_id: hotel.id.clone(),
                    name: hotel.name.clone(),
                    reason: pick.reason,
                })
            })
            .take(MAX_RECOMMENDATIONS)
            .collect();

        if recommendations.len() < proposed.min(MAX_RECOMMENDATIONS) {
            warn!(
                proposed = proposed,
                kept = recommendations.len(),
                "Dropped repeated recommendations or names outside the candidate set"
            );
        }
        Ok(Some(recommendations))
    }

    /// Two-step recommendation: the model must call the hotel tool, then
    /// recommend from the tool's real output.
    #[instrument(level = "info", skip(self))]
    pub async fn personalized(
        &self,
        input: &PreferenceInput,
    ) -> Result<PersonalizedRecommendations, TravelError> {
        if input.preferences.trim().is_empty() {
            return Err(TravelError::InvalidQuery("preferences must not be empty".to_string()));
        }
        let preamble = agent_preamble(input);

        let first = self
            .model
            .generate(
                GenerateRequest::new(format!(
                    "{} Use the hotel recommendation tool to find available hotels and then \
                     provide a personalized recommendation of up to {} hotels that best match \
                     their preferences. Explain why you are recommending these hotels.",
                    preamble, MAX_RECOMMENDATIONS
                ))
                .with_tool(HotelRecommendationTool::spec()),
            )
            .await?;
        let call = first
            .tool_call(HOTEL_RECOMMENDATION_TOOL)
            .ok_or_else(|| TravelError::ToolNotUsed {
                tool: HOTEL_RECOMMENDATION_TOOL.to_string(),
            })?;
        let location = call.str_arg("location").unwrap_or(input.location.as_str());

        let options = self.tool.run(location).await;
        let second = self
            .model
            .generate(
                GenerateRequest::new(format!(
                    "{} You have the following hotel options available: {}. Provide a \
                     personalized recommendation of up to {} hotels that best match their \
                     preferences. Explain why you are recommending these hotels.",
                    preamble,
                    serde_json::to_string(&options)?,
                    MAX_RECOMMENDATIONS
                ))
                .with_output_schema(personalized_schema()),
            )
            .await?;
        let output: PersonalizedRecommendations = second.parse_output()?;

        let proposed = output.hotels.len();
        let mut seen = HashSet::new();
        let hotels: Vec<RecommendedHotel> = output
            .hotels
            .into_iter()
            .filter_map(|pick| {
                let real = options.hotels.iter().find(|real| real.name == pick.name)?;
                seen.insert(real.name.as_str()).then(|| real.clone())
            })
            .take(MAX_RECOMMENDATIONS)
            .collect();
        info!(proposed = proposed, kept = hotels.len(), "Personalized recommendations ready");

        Ok(PersonalizedRecommendations {
            reasoning: output.reasoning,
            hotels,
        })
    }
}
