//! Wire types for the Amadeus self-service endpoints used by the tools.
//!
//! Only the fields the assistant surfaces are modelled; everything else in
//! the payloads is ignored. Hotel records are cached per session as typed
//! [`Hotel`] values, so every field but the id is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightDestinationsResponse {
    #[serde(default)]
    pub data: Vec<FlightDestination>,
    #[serde(default)]
    pub meta: Option<FlightMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightDestination {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    pub price: FlightPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightPrice {
    pub total: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightMeta {
    #[serde(default)]
    pub currency: Option<String>,
}

/// Hotel list entry from the `locations/hotels` reference-data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub hotel_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub geo_code: Option<GeoCode>,
    #[serde(default)]
    pub distance: Option<Distance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoCode {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Distance {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotelListResponse {
    #[serde(default)]
    pub data: Vec<Hotel>,
}

/// `/v3/shopping/hotel-offers` keeps the raw entries: a malformed offer is
/// skipped during formatting rather than failing the whole response.
#[derive(Debug, Clone, Deserialize)]
pub struct HotelOffersResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Guest as accepted by the hotel-orders endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub tid: i64,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
}

/// Which reference-data endpoint a hotel search goes to.
#[derive(Debug, Clone, PartialEq)]
pub enum HotelQuery {
    ByIds(Vec<String>),
    ByGeocode { latitude: f64, longitude: f64 },
    ByCity(String),
}
