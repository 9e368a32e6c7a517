//! Client for the Amadeus self-service travel APIs.
//!
//! Authentication uses the OAuth2 client-credentials grant. The access token
//! is cached and reused until shortly before it expires, so a burst of tool
//! calls in one chat turn costs a single token request.

pub mod models;

use crate::config::{AmadeusSettings, PaymentCardSettings};
use crate::errors::AgentError;
use chrono::NaiveDate;
use models::*;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub use models::{FlightDestination, Guest, Hotel, HotelQuery};

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
const FLIGHT_DESTINATIONS_PATH: &str = "/v1/shopping/flight-destinations";
const HOTELS_BY_CITY_PATH: &str = "/v1/reference-data/locations/hotels/by-city";
const HOTELS_BY_IDS_PATH: &str = "/v1/reference-data/locations/hotels/by-hotels";
const HOTELS_BY_GEOCODE_PATH: &str = "/v1/reference-data/locations/hotels/by-geocode";
const HOTEL_OFFERS_PATH: &str = "/v3/shopping/hotel-offers";
const HOTEL_ORDERS_PATH: &str = "/v2/booking/hotel-orders";

/// Refresh this long before the advertised expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime Amadeus issues when `expires_in` is absent.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 1799;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

pub struct AmadeusClient {
    http: Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    search_radius: u32,
    payment: PaymentCardSettings,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusClient {
    pub fn new(settings: &AmadeusSettings) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        if settings.api_key.is_none() || settings.api_secret.is_none() {
            log::warn!(
                "Amadeus credentials are not configured ({} / {}); travel tools will fail to authenticate",
                settings.api_key_env,
                settings.api_secret_env
            );
        }

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client_id: settings.api_key.clone(),
            client_secret: settings.api_secret.clone(),
            search_radius: settings.hotel_search_radius,
            payment: settings.payment.clone(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Returns a bearer token, requesting a new one only when the cached
    /// token is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, AgentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, AgentError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(AgentError::ConfigError(
                    "Amadeus API key and secret are not configured".to_string(),
                ))
            }
        };

        log::info!("Requesting Amadeus access token");
        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::amadeus(None, format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = read_body(response).await?;
        if status != StatusCode::OK {
            log::error!("Failed to get Amadeus access token: {} - {}", status, body);
            return Err(AgentError::amadeus(
                Some(status.as_u16()),
                format!("Failed to get access token: {}", error_detail(&body)),
            ));
        }

        let parsed: TokenResponse = serde_json::from_value(body).map_err(|e| {
            AgentError::ParsingError(format!("Invalid Amadeus token response: {}", e))
        })?;
        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AgentError::amadeus(Some(200), "Failed to retrieve access token."))?;

        let lifetime = parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        log::info!("Amadeus access token received (expires in {}s)", lifetime);

        Ok(CachedToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }

    /// Sends an authorized request and decodes the body when the status
    /// matches `expected`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<T, AgentError> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        let body = read_body(response).await?;
        if status != expected {
            return Err(AgentError::amadeus(
                Some(status.as_u16()),
                error_detail(&body),
            ));
        }

        serde_json::from_value(body)
            .map_err(|e| AgentError::ParsingError(format!("Unexpected Amadeus response: {}", e)))
    }

    /// Cheapest destinations reachable from `origin` under `max_price`.
    pub async fn search_flight_destinations(
        &self,
        origin: &str,
        max_price: u64,
        departure_date: Option<NaiveDate>,
    ) -> Result<FlightDestinationsResponse, AgentError> {
        let mut query = vec![
            ("origin", origin.to_uppercase()),
            ("maxPrice", max_price.to_string()),
        ];
        if let Some(date) = departure_date {
            query.push(("departureDate", date.format("%Y-%m-%d").to_string()));
        }

        log::info!("Searching flight destinations: {:?}", query);
        let request = self.http.get(self.url(FLIGHT_DESTINATIONS_PATH)).query(&query);
        self.send(request, StatusCode::OK).await
    }

    pub async fn list_hotels(&self, query: &HotelQuery) -> Result<Vec<Hotel>, AgentError> {
        let radius = self.search_radius.to_string();
        let request = match query {
            HotelQuery::ByIds(ids) => self
                .http
                .get(self.url(HOTELS_BY_IDS_PATH))
                .query(&[("hotelIds", ids.join(","))]),
            HotelQuery::ByGeocode { latitude, longitude } => {
                self.http.get(self.url(HOTELS_BY_GEOCODE_PATH)).query(&[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("radius", radius),
                    ("radiusUnit", "KM".to_string()),
                ])
            }
            HotelQuery::ByCity(city_code) => self.http.get(self.url(HOTELS_BY_CITY_PATH)).query(&[
                ("cityCode", city_code.to_uppercase()),
                ("radius", radius),
                ("radiusUnit", "KM".to_string()),
            ]),
        };

        log::info!("Listing hotels: {:?}", query);
        let response: HotelListResponse = self.send(request, StatusCode::OK).await?;
        Ok(response.data)
    }

    pub async fn search_hotel_offers(
        &self,
        hotel_ids: &[String],
        check_in: NaiveDate,
        check_out: NaiveDate,
        adults: u32,
    ) -> Result<Vec<Value>, AgentError> {
        let request = self.http.get(self.url(HOTEL_OFFERS_PATH)).query(&[
            ("hotelIds", hotel_ids.join(",")),
            ("checkInDate", check_in.format("%Y-%m-%d").to_string()),
            ("checkOutDate", check_out.format("%Y-%m-%d").to_string()),
            ("adults", adults.to_string()),
        ]);

        log::info!("Searching hotel offers for {:?}", hotel_ids);
        let response: HotelOffersResponse = self.send(request, StatusCode::OK).await?;
        Ok(response.data)
    }

    /// Places a hotel order and returns the Amadeus booking id.
    pub async fn book_hotel(&self, offer_id: &str, guests: &[Guest]) -> Result<String, AgentError> {
        let body = hotel_order_body(offer_id, guests, &self.payment)?;
        let request = self.http.post(self.url(HOTEL_ORDERS_PATH)).json(&body);

        log::info!("Booking hotel offer {} for {} guest(s)", offer_id, guests.len());
        let response: Value = self.send(request, StatusCode::CREATED).await?;
        response["data"]["id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| AgentError::ParsingError("Booking response has no data.id".to_string()))
    }
}

/// Request body for `/v2/booking/hotel-orders`. All guests share one room
/// and the first guest is both the agency contact and the card holder.
pub fn hotel_order_body(
    offer_id: &str,
    guests: &[Guest],
    payment: &PaymentCardSettings,
) -> Result<Value, AgentError> {
    let lead = guests
        .first()
        .ok_or_else(|| AgentError::ValidationError("Missing guest information.".to_string()))?;

    let guest_references: Vec<Value> = (1..=guests.len())
        .map(|index| json!({ "guestReference": index.to_string() }))
        .collect();

    Ok(json!({
        "data": {
            "type": "hotel-order",
            "guests": guests,
            "roomAssociations": [{
                "guestReferences": guest_references,
                "hotelOfferId": offer_id
            }],
            "travelAgent": {
                "contact": { "email": lead.email }
            },
            "payment": {
                "method": "CREDIT_CARD",
                "paymentCard": {
                    "paymentCardInfo": {
                        "vendorCode": payment.vendor_code,
                        "cardNumber": payment.card_number,
                        "expiryDate": payment.expiry_date,
                        "holderName": format!("{} {}", lead.first_name, lead.last_name)
                    }
                }
            }
        }
    }))
}

async fn read_body(response: reqwest::Response) -> Result<Value, AgentError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// The `errors` array when Amadeus sends one, otherwise the whole body.
pub fn error_detail(body: &Value) -> String {
    match body.get("errors") {
        Some(errors) => errors.to_string(),
        None => match body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
