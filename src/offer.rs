// Wire data model for the upstream flight-offers search response.
// Every field the provider may omit is an Option so malformed offers are a
// typed branch rather than a decode failure; unmodeled fields pass through
// untouched via the flattened maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Response envelope for GET /v2/shopping/flight-offers
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightSearchResponse {
    pub meta: Option<Value>,
    pub data: Vec<FlightOffer>,
    pub dictionaries: Option<Value>,
}

// One priced flight option returned by the search provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightOffer {
    pub id: String,
    pub source: Option<String>,
    pub one_way: Option<bool>,
    pub itineraries: Vec<Itinerary>,
    pub price: Option<OfferPrice>,
    pub validating_airline_codes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Itinerary {
    pub duration: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// A single flown leg within an itinerary
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Segment {
    pub id: Option<String>,
    pub departure: Option<SegmentPoint>,
    pub arrival: Option<SegmentPoint>,
    pub carrier_code: Option<String>,
    pub number: Option<String>,
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentPoint {
    pub iata_code: Option<String>,
    pub terminal: Option<String>,
    // ISO-8601 local timestamp, e.g. "2025-09-14T06:25:00"
    pub at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Prices arrive as decimal strings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferPrice {
    pub currency: String,
    pub total: String,
    pub base: Option<String>,
    pub grand_total: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlightOffer {
    // Segments of the outbound itinerary; return itineraries are never
    // inspected for bucketing.
    pub fn outbound_segments(&self) -> &[Segment] {
        self.itineraries
            .first()
            .map(|itinerary| itinerary.segments.as_slice())
            .unwrap_or(&[])
    }

    // Raw departure timestamp of the first outbound segment, if present.
    pub fn first_departure(&self) -> Option<&str> {
        self.outbound_segments()
            .first()?
            .departure
            .as_ref()?
            .at
            .as_deref()
    }

    // Numeric price for ordering. Missing or unparsable totals compare as
    // zero, which pushes such offers to the front of a sorted result.
    pub fn comparable_price(&self) -> f64 {
        self.price
            .as_ref()
            .and_then(|price| price.total.parse::<f64>().ok())
            .filter(|total| total.is_finite())
            .unwrap_or(0.0)
    }
}

// A small upstream response for inline testing
pub const SAMPLE_FLIGHT_SEARCH_RESPONSE: &str = r#"{
  "meta": { "count": 2 },
  "data": [
    {
      "type": "flight-offer",
      "id": "1",
      "source": "GDS",
      "instantTicketingRequired": false,
      "oneWay": false,
      "numberOfBookableSeats": 4,
      "itineraries": [
        {
          "duration": "PT15H15M",
          "segments": [
            {
              "departure": { "iataCode": "JFK", "terminal": "4", "at": "2025-09-14T06:25:00" },
              "arrival": { "iataCode": "KEF", "at": "2025-09-14T16:10:00" },
              "carrierCode": "FI",
              "number": "614",
              "duration": "PT5H45M",
              "id": "11"
            },
            {
              "departure": { "iataCode": "KEF", "at": "2025-09-14T17:20:00" },
              "arrival": { "iataCode": "LHR", "terminal": "2", "at": "2025-09-14T21:40:00" },
              "carrierCode": "FI",
              "number": "450",
              "duration": "PT3H20M",
              "id": "12"
            }
          ]
        }
      ],
      "price": { "currency": "USD", "total": "546.70", "base": "412.00", "grandTotal": "546.70" },
      "validatingAirlineCodes": ["FI"]
    },
    {
      "type": "flight-offer",
      "id": "2",
      "source": "GDS",
      "oneWay": false,
      "itineraries": [
        {
          "duration": "PT7H5M",
          "segments": [
            {
              "departure": { "iataCode": "JFK", "terminal": "7", "at": "2025-09-14T18:30:00" },
              "arrival": { "iataCode": "LHR", "terminal": "5", "at": "2025-09-15T06:35:00" },
              "carrierCode": "BA",
              "number": "112",
              "duration": "PT7H5M",
              "id": "21"
            }
          ]
        }
      ],
      "price": { "currency": "USD", "total": "687.20", "base": "520.00", "grandTotal": "687.20" },
      "validatingAirlineCodes": ["BA"]
    }
  ],
  "dictionaries": { "carriers": { "FI": "ICELANDAIR", "BA": "BRITISH AIRWAYS" } }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_response() {
        let response: FlightSearchResponse =
            serde_json::from_str(SAMPLE_FLIGHT_SEARCH_RESPONSE).expect("sample should parse");

        assert_eq!(response.data.len(), 2);
        assert!(response.meta.is_some());
        assert!(response.dictionaries.is_some());

        let offer = &response.data[0];
        assert_eq!(offer.id, "1");
        assert_eq!(offer.source.as_deref(), Some("GDS"));
        assert_eq!(offer.outbound_segments().len(), 2);
        assert_eq!(offer.first_departure(), Some("2025-09-14T06:25:00"));
        assert_eq!(offer.comparable_price(), 546.70);

        let price = offer.price.as_ref().unwrap();
        assert_eq!(price.currency, "USD");
        assert_eq!(price.grand_total.as_deref(), Some("546.70"));

        let segment = &offer.outbound_segments()[1];
        assert_eq!(segment.carrier_code.as_deref(), Some("FI"));
        assert_eq!(
            segment.arrival.as_ref().unwrap().iata_code.as_deref(),
            Some("LHR")
        );

        let direct = &response.data[1];
        assert_eq!(direct.outbound_segments().len(), 1);
        assert_eq!(direct.comparable_price(), 687.20);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let response: FlightSearchResponse =
            serde_json::from_str(SAMPLE_FLIGHT_SEARCH_RESPONSE).unwrap();

        let offer = &response.data[0];
        assert!(offer.extra.contains_key("instantTicketingRequired"));
        assert!(offer.extra.contains_key("numberOfBookableSeats"));

        let encoded = serde_json::to_string(offer).unwrap();
        assert!(encoded.contains("instantTicketingRequired"));
        assert!(encoded.contains("numberOfBookableSeats"));
    }

    #[test]
    fn test_malformed_offer_decodes_to_empty_shapes() {
        let offer: FlightOffer = serde_json::from_str(r#"{ "id": "9" }"#).unwrap();

        assert!(offer.itineraries.is_empty());
        assert!(offer.price.is_none());
        assert!(offer.outbound_segments().is_empty());
        assert_eq!(offer.first_departure(), None);
        assert_eq!(offer.comparable_price(), 0.0);
    }

    #[test]
    fn test_missing_departure_timestamp() {
        let offer: FlightOffer = serde_json::from_str(
            r#"{
                "id": "7",
                "itineraries": [
                    { "segments": [ { "departure": { "iataCode": "JFK" } } ] }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(offer.outbound_segments().len(), 1);
        assert_eq!(offer.first_departure(), None);
    }

    #[test]
    fn test_unparsable_price_compares_as_zero() {
        let offer = FlightOffer {
            id: "x".to_string(),
            price: Some(OfferPrice {
                currency: "USD".to_string(),
                total: "free".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(offer.comparable_price(), 0.0);

        let nan = FlightOffer {
            id: "y".to_string(),
            price: Some(OfferPrice {
                currency: "USD".to_string(),
                total: "NaN".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(nan.comparable_price(), 0.0);
    }
}
