// Flight-search middleware for the travel planning API

// Wire model, result diversification, caching and the upstream client
pub mod cache;
pub mod client;
pub mod diversify;
pub mod locations;
pub mod offer;

// Re-export key types for convenience
pub use cache::{CacheStatsReport, SearchCache, SearchCacheConfig, TokenCache};
pub use client::{
    AmadeusClient, ApiError, ClientConfig, ClientError, ClientStatsReport, FlightSearchParams,
    GeoSearchParams, InspirationParams, RetryConfig, TravelApi,
};
pub use diversify::{diversify, StopBucket, TimeSlot, DEFAULT_MAX_RESULTS};
pub use locations::{Location, LocationSearchResponse};
pub use offer::{FlightOffer, FlightSearchResponse, Itinerary, OfferPrice, Segment, SegmentPoint};
