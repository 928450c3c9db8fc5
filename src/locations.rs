// Location reference data: wire types for the provider's location search and
// a static directory of airports the provider's test environment lacks
// (Canadian majors and Dubai), matched by keyword and merged ahead of
// upstream results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationSearchResponse {
    pub meta: Option<Value>,
    pub data: Vec<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub sub_type: String,
    pub name: String,
    pub iata_code: String,
    pub geo_code: Option<GeoCode>,
    pub address: Option<LocationAddress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoCode {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationAddress {
    pub city_name: String,
    pub city_code: String,
    pub country_name: String,
    pub country_code: String,
    pub state_code: Option<String>,
    pub region_code: Option<String>,
}

struct AirportSeed {
    sub_type: &'static str,
    name: &'static str,
    iata: &'static str,
    latitude: f64,
    longitude: f64,
    city_name: &'static str,
    city_code: &'static str,
    country_name: &'static str,
    country_code: &'static str,
    state_code: Option<&'static str>,
    region_code: &'static str,
}

const FALLBACK_AIRPORT_SEEDS: &[AirportSeed] = &[
    AirportSeed {
        sub_type: "CITY",
        name: "TORONTO",
        iata: "YYZ",
        latitude: 43.6777,
        longitude: -79.6248,
        city_name: "TORONTO",
        city_code: "YTO",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("ON"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "PEARSON INTL",
        iata: "YYZ",
        latitude: 43.6777,
        longitude: -79.6248,
        city_name: "TORONTO",
        city_code: "YTO",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("ON"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "MONTREAL",
        iata: "YUL",
        latitude: 45.4706,
        longitude: -73.7408,
        city_name: "MONTREAL",
        city_code: "YMQ",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("QC"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "TRUDEAU INTL",
        iata: "YUL",
        latitude: 45.4706,
        longitude: -73.7408,
        city_name: "MONTREAL",
        city_code: "YMQ",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("QC"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "VANCOUVER",
        iata: "YVR",
        latitude: 49.1939,
        longitude: -123.1844,
        city_name: "VANCOUVER",
        city_code: "YVR",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("BC"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "VANCOUVER INTL",
        iata: "YVR",
        latitude: 49.1939,
        longitude: -123.1844,
        city_name: "VANCOUVER",
        city_code: "YVR",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("BC"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "CALGARY",
        iata: "YYC",
        latitude: 51.1225,
        longitude: -114.0131,
        city_name: "CALGARY",
        city_code: "YYC",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("AB"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "CALGARY INTL",
        iata: "YYC",
        latitude: 51.1225,
        longitude: -114.0131,
        city_name: "CALGARY",
        city_code: "YYC",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("AB"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "OTTAWA",
        iata: "YOW",
        latitude: 45.3192,
        longitude: -75.6692,
        city_name: "OTTAWA",
        city_code: "YOW",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("ON"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "MACDONALD-CARTIER INTL",
        iata: "YOW",
        latitude: 45.3192,
        longitude: -75.6692,
        city_name: "OTTAWA",
        city_code: "YOW",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("ON"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "EDMONTON",
        iata: "YEG",
        latitude: 53.3097,
        longitude: -113.5796,
        city_name: "EDMONTON",
        city_code: "YEA",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("AB"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "EDMONTON INTL",
        iata: "YEG",
        latitude: 53.3097,
        longitude: -113.5796,
        city_name: "EDMONTON",
        city_code: "YEA",
        country_name: "CANADA",
        country_code: "CA",
        state_code: Some("AB"),
        region_code: "NAMER",
    },
    AirportSeed {
        sub_type: "CITY",
        name: "DUBAI",
        iata: "DXB",
        latitude: 25.2532,
        longitude: 55.3657,
        city_name: "DUBAI",
        city_code: "DXB",
        country_name: "UNITED ARAB EMIRATES",
        country_code: "AE",
        state_code: None,
        region_code: "MENA",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "DUBAI INTL",
        iata: "DXB",
        latitude: 25.2532,
        longitude: 55.3657,
        city_name: "DUBAI",
        city_code: "DXB",
        country_name: "UNITED ARAB EMIRATES",
        country_code: "AE",
        state_code: None,
        region_code: "MENA",
    },
    AirportSeed {
        sub_type: "AIRPORT",
        name: "AL MAKTOUM INTL",
        iata: "DWC",
        latitude: 24.8967,
        longitude: 55.1614,
        city_name: "DUBAI",
        city_code: "DXB",
        country_name: "UNITED ARAB EMIRATES",
        country_code: "AE",
        state_code: None,
        region_code: "MENA",
    },
];

impl From<&AirportSeed> for Location {
    fn from(seed: &AirportSeed) -> Self {
        Location {
            kind: "location".to_string(),
            sub_type: seed.sub_type.to_string(),
            name: seed.name.to_string(),
            iata_code: seed.iata.to_string(),
            geo_code: Some(GeoCode {
                latitude: seed.latitude,
                longitude: seed.longitude,
            }),
            address: Some(LocationAddress {
                city_name: seed.city_name.to_string(),
                city_code: seed.city_code.to_string(),
                country_name: seed.country_name.to_string(),
                country_code: seed.country_code.to_string(),
                state_code: seed.state_code.map(str::to_string),
                region_code: Some(seed.region_code.to_string()),
            }),
            extra: Map::new(),
        }
    }
}

pub fn fallback_airports() -> Vec<Location> {
    FALLBACK_AIRPORT_SEEDS.iter().map(Location::from).collect()
}

// Case-insensitive keyword match over name, IATA code and city name, the same
// fields the upstream keyword search covers.
pub fn matching_fallback_airports(keyword: &str) -> Vec<Location> {
    let needle = keyword.to_lowercase();
    fallback_airports()
        .into_iter()
        .filter(|airport| {
            airport.name.to_lowercase().contains(&needle)
                || airport.iata_code.to_lowercase().contains(&needle)
                || airport
                    .address
                    .as_ref()
                    .map_or(false, |address| address.city_name.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_contents() {
        let airports = fallback_airports();
        assert_eq!(airports.len(), 15);
        assert!(airports.iter().all(|a| a.kind == "location"));
        assert!(airports
            .iter()
            .all(|a| a.geo_code.is_some() && a.address.is_some()));
    }

    #[test]
    fn test_match_by_city_name() {
        let matches = matching_fallback_airports("toronto");
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|a| a.iata_code == "YYZ"));
    }

    #[test]
    fn test_match_by_iata_code_is_case_insensitive() {
        let matches = matching_fallback_airports("yul");
        assert_eq!(matches.len(), 2);

        // DWC only matches through its own code, not the DXB city entries
        let dxb = matching_fallback_airports("dxb");
        assert_eq!(dxb.len(), 2);
        assert!(dxb.iter().all(|a| a.iata_code == "DXB"));
    }

    #[test]
    fn test_match_by_partial_name() {
        let matches = matching_fallback_airports("maktoum");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].iata_code, "DWC");
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(matching_fallback_airports("zrh").is_empty());
    }

    #[test]
    fn test_location_decodes_from_upstream_shape() {
        let location: Location = serde_json::from_str(
            r#"{
                "type": "location",
                "subType": "AIRPORT",
                "name": "HEATHROW",
                "iataCode": "LHR",
                "geoCode": { "latitude": 51.4775, "longitude": -0.4614 },
                "address": {
                    "cityName": "LONDON",
                    "cityCode": "LON",
                    "countryName": "UNITED KINGDOM",
                    "countryCode": "GB",
                    "regionCode": "EUROP"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(location.sub_type, "AIRPORT");
        assert_eq!(location.iata_code, "LHR");
        let address = location.address.unwrap();
        assert_eq!(address.city_name, "LONDON");
        assert_eq!(address.state_code, None);
        assert_eq!(address.region_code.as_deref(), Some("EUROP"));
    }
}
