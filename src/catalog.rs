//! Fixed hotel catalog served whenever the hotel provider is unavailable

use crate::{Amenity, Hotel, Review};

const PICSUM: &str = "https://picsum.photos/800/600?random=";

fn amenities() -> Vec<Amenity> {
    [
        "Wi-Fi",
        "Air Conditioning",
        "Pool",
        "Restaurant",
        "Parking",
        "Fitness Center",
        "Bar",
        "24-hour front desk",
        "Room service",
    ]
    .into_iter()
    .map(Amenity::new)
    .collect()
}

fn reviews() -> Vec<Review> {
    vec![
        Review {
            author: "Jane D.".to_string(),
            rating: 5,
            comment: "Absolutely wonderful stay! The staff was amazing.".to_string(),
        },
        Review {
            author: "John S.".to_string(),
            rating: 4,
            comment: "Great location and very clean rooms. The breakfast could be better.".to_string(),
        },
        Review {
            author: "Emily R.".to_string(),
            rating: 5,
            comment: "Perfect for a family vacation. The pool was a huge hit with the kids.".to_string(),
        },
    ]
}

fn gallery(images: &[u32]) -> Vec<String> {
    images.iter().map(|n| format!("{}{}", PICSUM, n)).collect()
}

fn tags(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

#[allow(clippy::too_many_arguments)]
fn hotel(
    id: &str,
    name: &str,
    description: &str,
    location: &str,
    price: f64,
    rating: f64,
    images: &[u32],
    styles: &[&str],
    languages: &[&str],
) -> Hotel {
    Hotel {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        price,
        rating,
        amenities: amenities(),
        reviews: reviews(),
        gallery: gallery(images),
        web_url: Some("#".to_string()),
        styles: tags(styles),
        spoken_languages: tags(languages),
    }
}

/// The degraded-mode hotel set
pub fn mock_hotels() -> Vec<Hotel> {
    vec![
        hotel(
            "1",
            "Seaside Resort & Spa",
            "A luxurious resort offering stunning ocean views, a world-class spa, and gourmet dining options. Perfect for a relaxing getaway.",
            "Cox's Bazar",
            250.0,
            4.8,
            &[1, 2, 3, 4],
            &["Luxury", "Beachfront"],
            &["English", "Bengali"],
        ),
        hotel(
            "2",
            "The Grand City Hotel",
            "Located in the heart of the city, this hotel offers modern amenities and easy access to major attractions and business districts.",
            "Dhaka",
            180.0,
            4.5,
            &[5, 6],
            &["Business", "Modern"],
            &["English", "Bengali"],
        ),
        hotel(
            "3",
            "Bangkok Oasis Suites",
            "An urban oasis with spacious suites, a rooftop pool, and vibrant nightlife just steps away.",
            "Bangkok",
            150.0,
            4.6,
            &[7, 8],
            &["Boutique", "City Center"],
            &["English", "Thai"],
        ),
        hotel(
            "4",
            "Dubai Skyscraper Views",
            "Experience unparalleled luxury with breathtaking views of the Dubai skyline from every room.",
            "Dubai",
            450.0,
            4.9,
            &[9, 10],
            &["Skyscraper", "Ultra-Luxury"],
            &["English", "Arabic"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_entries_satisfy_hotel_invariants() {
        let hotels = mock_hotels();
        assert_eq!(hotels.len(), 4);
        for hotel in &hotels {
            assert!((0.0..=5.0).contains(&hotel.rating));
            assert!(hotel.price > 0.0);
            assert!(!hotel.gallery.is_empty());
            assert!(hotel.has_amenity("Wi-Fi"));
        }
    }

    #[test]
    fn test_catalog_ids_are_unique() {
        let ids: HashSet<_> = mock_hotels().into_iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), 4);
    }
}
