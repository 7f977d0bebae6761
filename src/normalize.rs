//! Translation from raw provider payloads into canonical [`Hotel`]s.
//!
//! Everything here is pure: no I/O, no panics on missing or malformed fields.

use crate::tripadvisor::{
    AddressObj, LocationDetails, LocationSummary, PhotoResponse, RawPhoto, ReviewResponse,
};
use crate::{Amenity, Hotel, Review};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;

/// Per-night price used when the provider gives nothing parsable
pub const DEFAULT_NIGHTLY_PRICE: f64 = 150.0;
/// Multiplier for dollar-sign class codes: `"$$$"` is 3 × 100
pub const PRICE_CLASS_SCALE: f64 = 100.0;
pub const MAX_RATING: f64 = 5.0;
/// Amenities every hotel is assumed to offer, so filters compare like with like
pub const BASELINE_AMENITIES: [&str; 2] = ["Wi-Fi", "Air Conditioning"];

pub const UNKNOWN_NAME: &str = "Hotel name not available";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const UNKNOWN_LOCATION: &str = "Location not available";
pub const SUMMARY_DESCRIPTION: &str = "Click to see more details about this hotel.";
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

static PRICE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?\s*(\d+(?:\.\d+)?)\s*(?:-\s*\$?\s*(\d+(?:\.\d+)?))?$")
        .expect("price range pattern is valid")
});

/// Parse a provider price level into a positive per-night amount.
///
/// * `"$50-$100"` → 75 (midpoint)
/// * `"$50"` → 50
/// * `"$$$"` → 300 (class code × [`PRICE_CLASS_SCALE`])
/// * anything else → [`DEFAULT_NIGHTLY_PRICE`]
pub fn parse_price(price_level: Option<&str>) -> f64 {
    let Some(raw) = price_level else {
        return DEFAULT_NIGHTLY_PRICE;
    };
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return DEFAULT_NIGHTLY_PRICE;
    }

    let parsed = if let Some(captures) = PRICE_RANGE.captures(&cleaned) {
        let low = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        let high = captures.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
        match (low, high) {
            (Some(low), Some(high)) => Some((low + high) / 2.0),
            (Some(single), None) => Some(single),
            _ => None,
        }
    } else if cleaned.chars().all(|c| c == '$') {
        Some(cleaned.len() as f64 * PRICE_CLASS_SCALE)
    } else {
        None
    };

    match parsed {
        Some(price) if price.is_finite() && price > 0.0 => price,
        _ => DEFAULT_NIGHTLY_PRICE,
    }
}

/// Parse a rating that may be a number or a numeric string, clamped to `[0, 5]`
pub fn parse_rating(raw: Option<&Value>) -> f64 {
    let value = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, MAX_RATING),
        _ => 0.0,
    }
}

/// Review ratings are whole stars; anything unparsable counts as 0
fn parse_review_rating(raw: Option<&Value>) -> u8 {
    parse_rating(raw).trunc() as u8
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// City, else country or full address, else a fixed label
fn resolve_location(address: Option<&AddressObj>) -> String {
    address
        .and_then(|a| {
            non_blank(a.city.as_ref())
                .or_else(|| non_blank(a.country.as_ref()))
                .or_else(|| non_blank(a.address_string.as_ref()))
        })
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

/// Append the baseline amenities that are missing, keeping provider order
pub fn with_baseline_amenities(mut amenities: Vec<Amenity>) -> Vec<Amenity> {
    for baseline in BASELINE_AMENITIES {
        if !amenities.iter().any(|a| a.name.eq_ignore_ascii_case(baseline)) {
            amenities.push(Amenity::new(baseline));
        }
    }
    amenities
}

/// Largest rendition available for a photo
fn largest_rendition(photo: &RawPhoto) -> Option<String> {
    let images = photo.images.as_ref()?;
    [
        &images.original,
        &images.large,
        &images.medium,
        &images.small,
        &images.thumbnail,
    ]
    .into_iter()
    .flatten()
    .find_map(|image| non_blank(image.url.as_ref()))
}

fn gallery_from(photos: Option<&PhotoResponse>, placeholder: &str) -> Vec<String> {
    let gallery: Vec<String> = photos
        .and_then(|p| p.data.as_ref())
        .map(|data| data.iter().filter_map(largest_rendition).collect())
        .unwrap_or_default();
    if gallery.is_empty() {
        vec![placeholder.to_string()]
    } else {
        gallery
    }
}

fn reviews_from(reviews: Option<&ReviewResponse>) -> Vec<Review> {
    reviews
        .and_then(|r| r.data.as_ref())
        .map(|data| {
            data.iter()
                .map(|raw| Review {
                    author: raw
                        .user
                        .as_ref()
                        .and_then(|u| non_blank(u.username.as_ref()))
                        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
                    rating: parse_review_rating(raw.rating.as_ref()),
                    comment: raw.text.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Styles from the provider's tags, else derived from the star class
fn styles_from(details: &LocationDetails) -> Option<Vec<String>> {
    let styles: Vec<String> = details
        .styles
        .iter()
        .flatten()
        .filter_map(|s| non_blank(Some(s)))
        .collect();
    if !styles.is_empty() {
        return Some(styles);
    }
    details
        .hotel_class
        .as_ref()
        .and_then(|c| non_blank(Some(c)))
        .map(|class| vec![format!("{}-star", class)])
}

/// Build a canonical hotel from a detail record and its optional photo and review sets.
///
/// `placeholder` is the image used when the provider has no usable photos.
pub fn normalize(
    id: &str,
    details: &LocationDetails,
    photos: Option<&PhotoResponse>,
    reviews: Option<&ReviewResponse>,
    placeholder: &str,
) -> Hotel {
    let amenities = details
        .amenities
        .iter()
        .flatten()
        .filter_map(|a| a.name().map(str::trim))
        .filter(|name| !name.is_empty())
        .map(Amenity::new)
        .collect();

    let spoken_languages: Vec<String> = details
        .spoken_languages
        .iter()
        .flatten()
        .filter_map(|l| non_blank(l.name.as_ref()))
        .collect();

    Hotel {
        id: id.to_string(),
        name: non_blank(details.name.as_ref()).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        description: non_blank(details.description.as_ref())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        location: resolve_location(details.address_obj.as_ref()),
        price: parse_price(details.price_level.as_deref()),
        rating: parse_rating(details.rating.as_ref()),
        amenities: with_baseline_amenities(amenities),
        reviews: reviews_from(reviews),
        gallery: gallery_from(photos, placeholder),
        web_url: non_blank(details.web_url.as_ref()),
        styles: styles_from(details),
        spoken_languages: Some(spoken_languages),
    }
}

/// Minimal hotel from a search summary, used when the detail fetch fails
pub fn normalize_summary(id: &str, summary: &LocationSummary, placeholder: &str) -> Hotel {
    Hotel {
        id: id.to_string(),
        name: non_blank(summary.name.as_ref()).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        description: SUMMARY_DESCRIPTION.to_string(),
        location: resolve_location(summary.address_obj.as_ref()),
        price: DEFAULT_NIGHTLY_PRICE,
        rating: 0.0,
        amenities: with_baseline_amenities(Vec::new()),
        reviews: Vec::new(),
        gallery: vec![placeholder.to_string()],
        web_url: None,
        styles: None,
        spoken_languages: None,
    }
}

/// Deserialize a list, dropping elements that do not fit `T`.
/// Non-array values become `None`.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

/// Deserialize an optional field, treating a value of the wrong shape as absent
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Accept identifiers that arrive as either JSON strings or numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLACEHOLDER: &str = "https://picsum.photos/800/600?random=7";

    fn details(value: Value) -> LocationDetails {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_price_range_and_single() {
        assert_eq!(parse_price(Some("$50-$100")), 75.0);
        assert_eq!(parse_price(Some("$50")), 50.0);
        assert_eq!(parse_price(Some(" $1,200 - $1,400 ")), 1300.0);
        assert_eq!(parse_price(Some("80")), 80.0);
    }

    #[test]
    fn test_parse_price_fallbacks() {
        assert_eq!(parse_price(None), DEFAULT_NIGHTLY_PRICE);
        assert_eq!(parse_price(Some("garbage")), DEFAULT_NIGHTLY_PRICE);
        assert_eq!(parse_price(Some("")), DEFAULT_NIGHTLY_PRICE);
        assert_eq!(parse_price(Some("$0")), DEFAULT_NIGHTLY_PRICE);
    }

    #[test]
    fn test_parse_price_class_code() {
        assert_eq!(parse_price(Some("$$")), 200.0);
        assert_eq!(parse_price(Some("$$$$")), 400.0);
    }

    #[test]
    fn test_parse_rating_is_clamped() {
        assert_eq!(parse_rating(Some(&json!(4.5))), 4.5);
        assert_eq!(parse_rating(Some(&json!("3.5"))), 3.5);
        assert_eq!(parse_rating(Some(&json!(9))), 5.0);
        assert_eq!(parse_rating(Some(&json!(-2))), 0.0);
        assert_eq!(parse_rating(Some(&json!("n/a"))), 0.0);
        assert_eq!(parse_rating(Some(&json!(null))), 0.0);
        assert_eq!(parse_rating(None), 0.0);
    }

    #[test]
    fn test_normalize_empty_record_uses_defaults() {
        let hotel = normalize("1", &details(json!({})), None, None, PLACEHOLDER);
        assert_eq!(hotel.name, UNKNOWN_NAME);
        assert_eq!(hotel.description, NO_DESCRIPTION);
        assert_eq!(hotel.location, UNKNOWN_LOCATION);
        assert_eq!(hotel.price, DEFAULT_NIGHTLY_PRICE);
        assert_eq!(hotel.rating, 0.0);
        assert_eq!(hotel.gallery, vec![PLACEHOLDER.to_string()]);
        assert!(hotel.reviews.is_empty());
        assert!(hotel.has_amenity("Wi-Fi"));
        assert!(hotel.has_amenity("Air Conditioning"));
    }

    #[test]
    fn test_normalize_full_record() {
        let record = details(json!({
            "name": "Sea Pearl",
            "description": "Beachfront resort",
            "web_url": "https://example.com/sea-pearl",
            "address_obj": {"city": "Cox's Bazar", "country": "Bangladesh"},
            "rating": "4.6",
            "price_level": "$100-$200",
            "amenities": [{"name": "Pool"}, "wifi", {"name": "WI-FI"}],
            "styles": ["Beachfront"],
            "spoken_languages": [{"name": "English"}, {"name": ""}]
        }));
        let photos: PhotoResponse = serde_json::from_value(json!({
            "data": [
                {"images": {"large": {"url": "https://img/large.jpg"}, "small": {"url": "https://img/small.jpg"}}},
                {"images": {"original": {"url": "https://img/original.jpg"}, "large": {"url": "https://img/l2.jpg"}}},
                {"images": {}},
                {"caption": "no images"}
            ]
        }))
        .unwrap();
        let reviews: ReviewResponse = serde_json::from_value(json!({
            "data": [
                {"user": {"username": "traveller1"}, "rating": 5, "text": "Loved it"},
                {"rating": "bad", "text": "No user"}
            ]
        }))
        .unwrap();

        let hotel = normalize("99", &record, Some(&photos), Some(&reviews), PLACEHOLDER);
        assert_eq!(hotel.id, "99");
        assert_eq!(hotel.name, "Sea Pearl");
        assert_eq!(hotel.location, "Cox's Bazar");
        assert_eq!(hotel.price, 150.0);
        assert_eq!(hotel.rating, 4.6);
        assert_eq!(
            hotel.gallery,
            vec!["https://img/large.jpg".to_string(), "https://img/original.jpg".to_string()]
        );
        assert_eq!(hotel.reviews.len(), 2);
        assert_eq!(hotel.reviews[0].author, "traveller1");
        assert_eq!(hotel.reviews[1].author, ANONYMOUS_AUTHOR);
        assert_eq!(hotel.reviews[1].rating, 0);
        // "WI-FI" already satisfies the baseline, only air conditioning is appended
        let names: Vec<_> = hotel.amenities.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Pool", "wifi", "WI-FI", "Air Conditioning"]);
        assert_eq!(hotel.styles, Some(vec!["Beachfront".to_string()]));
        assert_eq!(hotel.spoken_languages, Some(vec!["English".to_string()]));
    }

    #[test]
    fn test_location_falls_back_to_country_then_address() {
        let by_country = normalize(
            "1",
            &details(json!({"address_obj": {"country": "Thailand", "address_string": "1 Road"}})),
            None,
            None,
            PLACEHOLDER,
        );
        assert_eq!(by_country.location, "Thailand");

        let by_address = normalize(
            "1",
            &details(json!({"address_obj": {"city": " ", "address_string": "1 Road, Dubai"}})),
            None,
            None,
            PLACEHOLDER,
        );
        assert_eq!(by_address.location, "1 Road, Dubai");
    }

    #[test]
    fn test_hotel_class_becomes_style() {
        let hotel = normalize("1", &details(json!({"hotel_class": "4.0"})), None, None, PLACEHOLDER);
        assert_eq!(hotel.styles, Some(vec!["4.0-star".to_string()]));
    }

    #[test]
    fn test_malformed_records_never_break_invariants() {
        let samples = vec![
            json!({"rating": {"nested": true}, "price_level": "$$$$$$$$$$"}),
            json!({"rating": "NaN", "price_level": "-$50"}),
            json!({"rating": 1e308, "amenities": "not a list", "name": 12}),
        ];
        for sample in samples {
            let record = details(sample);
            let hotel = normalize("x", &record, None, None, PLACEHOLDER);
            assert!((0.0..=5.0).contains(&hotel.rating));
            assert!(hotel.price > 0.0 && hotel.price.is_finite());
            assert!(!hotel.gallery.is_empty());
        }
    }

    #[test]
    fn test_wrongly_typed_fields_read_as_absent() {
        let record = details(json!({
            "name": "Harbour View",
            "description": 42,
            "price_level": 7,
            "address_obj": {"city": ["Chittagong"], "country": "Bangladesh"},
            "rating": 3.5
        }));
        assert_eq!(record.name.as_deref(), Some("Harbour View"));
        assert!(record.description.is_none());
        assert!(record.price_level.is_none());

        let hotel = normalize("9", &record, None, None, PLACEHOLDER);
        assert_eq!(hotel.name, "Harbour View");
        assert_eq!(hotel.location, "Bangladesh");
        assert_eq!(hotel.rating, 3.5);

        let unnamed = details(json!({"name": 12}));
        assert_eq!(normalize("9", &unnamed, None, None, PLACEHOLDER).name, UNKNOWN_NAME);

        let summary: LocationSummary = serde_json::from_value(json!({"name": "No Id"})).unwrap();
        assert!(summary.location_id.is_none());
    }

    #[test]
    fn test_normalize_summary_keeps_name() {
        let summary: LocationSummary = serde_json::from_value(json!({
            "location_id": "5",
            "name": "Partial Inn",
            "address_obj": {"city": "Dhaka"}
        }))
        .unwrap();
        let hotel = normalize_summary("5", &summary, PLACEHOLDER);
        assert_eq!(hotel.name, "Partial Inn");
        assert_eq!(hotel.location, "Dhaka");
        assert_eq!(hotel.description, SUMMARY_DESCRIPTION);
        assert_eq!(hotel.gallery.len(), 1);
    }
}
