//! Compile-time search profiles: sport-to-phrase mapping and the fixed
//! major-city seed list for the daily scheduler sweep.

use courtscout_common::Sport;

/// Sports the scheduler fans out over.
pub const SUPPORTED_SPORTS: &[&str] = &[
    "tennis",
    "pickleball",
    "basketball",
    "volleyball",
    "badminton",
    "squash",
];

/// Default search radius for scheduler-enqueued city jobs, in meters.
pub const CITY_RADIUS_M: i32 = 10_000;

/// Search phrases for one sport. Result volume scales with phrase count,
/// so mapped sports stay at 2-3 phrases. Unmapped sports fall back to
/// `"<sport> court"`.
pub fn search_terms(sport: &Sport) -> Vec<String> {
    let phrases: &[&str] = match sport.as_str() {
        "tennis" => &["tennis court", "tennis club", "tennis center"],
        "pickleball" => &["pickleball court", "pickleball club"],
        "basketball" => &["basketball court", "basketball gym"],
        "volleyball" => &["volleyball court", "beach volleyball"],
        "badminton" => &["badminton court", "badminton club"],
        "squash" => &["squash court", "squash club"],
        other => return vec![format!("{other} court")],
    };
    phrases.iter().map(|p| p.to_string()).collect()
}

pub struct City {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// Fixed seed list for the daily low-priority sweep.
pub const MAJOR_CITIES: &[City] = &[
    City { name: "New York", latitude: 40.7128, longitude: -74.0060 },
    City { name: "Los Angeles", latitude: 34.0522, longitude: -118.2437 },
    City { name: "Chicago", latitude: 41.8781, longitude: -87.6298 },
    City { name: "Houston", latitude: 29.7604, longitude: -95.3698 },
    City { name: "Phoenix", latitude: 33.4484, longitude: -112.0740 },
    City { name: "Philadelphia", latitude: 39.9526, longitude: -75.1652 },
    City { name: "San Diego", latitude: 32.7157, longitude: -117.1611 },
    City { name: "Dallas", latitude: 32.7767, longitude: -96.7970 },
    City { name: "Austin", latitude: 30.2672, longitude: -97.7431 },
    City { name: "San Francisco", latitude: 37.7749, longitude: -122.4194 },
    City { name: "Seattle", latitude: 47.6062, longitude: -122.3321 },
    City { name: "Denver", latitude: 39.7392, longitude: -104.9903 },
    City { name: "Boston", latitude: 42.3601, longitude: -71.0589 },
    City { name: "Miami", latitude: 25.7617, longitude: -80.1918 },
    City { name: "Atlanta", latitude: 33.7490, longitude: -84.3880 },
    City { name: "Toronto", latitude: 43.6532, longitude: -79.3832 },
    City { name: "Vancouver", latitude: 49.2827, longitude: -123.1207 },
    City { name: "London", latitude: 51.5074, longitude: -0.1278 },
    City { name: "Paris", latitude: 48.8566, longitude: 2.3522 },
    City { name: "Madrid", latitude: 40.4168, longitude: -3.7038 },
    City { name: "Barcelona", latitude: 41.3851, longitude: 2.1734 },
    City { name: "Berlin", latitude: 52.5200, longitude: 13.4050 },
    City { name: "Sydney", latitude: -33.8688, longitude: 151.2093 },
    City { name: "Melbourne", latitude: -37.8136, longitude: 144.9631 },
    City { name: "Tokyo", latitude: 35.6762, longitude: 139.6503 },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_sports_have_multiple_phrases() {
        let terms = search_terms(&Sport::new("tennis"));
        assert_eq!(
            terms,
            vec!["tennis court", "tennis club", "tennis center"]
        );
        assert!(search_terms(&Sport::new("pickleball")).len() >= 2);
    }

    #[test]
    fn unmapped_sport_falls_back_to_generic_phrase() {
        let terms = search_terms(&Sport::new("Padel"));
        assert_eq!(terms, vec!["padel court"]);
    }

    #[test]
    fn every_supported_sport_is_mapped() {
        for tag in SUPPORTED_SPORTS {
            let terms = search_terms(&Sport::new(tag));
            assert!(terms.len() >= 2, "{tag} should have a curated phrase list");
        }
    }

    #[test]
    fn city_seed_list_is_populated() {
        assert_eq!(MAJOR_CITIES.len(), 25);
        for city in MAJOR_CITIES {
            assert!(city.latitude.abs() <= 90.0 && city.longitude.abs() <= 180.0, "{}", city.name);
        }
    }
}
