use crate::amadeus::{AmadeusClient, Guest, Hotel, HotelQuery};
use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::session::TravelSession;
use crate::tools::{parse_args, Tool, ToolReply};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const NO_CACHED_HOTELS_MESSAGE: &str =
    "No hotel search results available. Please search for hotels first.";

/// Maps an Amadeus failure to the reply the model sees. Errors Amadeus
/// answered with a status are passed through; anything else is hidden
/// behind the generic unavailable message.
fn upstream_failure(action: &str, error: AgentError) -> ToolReply {
    match error {
        AgentError::AmadeusError {
            status: Some(status),
            message,
        } => {
            log::error!("Amadeus rejected request to {} ({}): {}", action, status, message);
            ToolReply::error(format!("Failed to {}: {}", action, message))
        }
        other => {
            log::error!("Unexpected error while trying to {}: {}", action, other);
            ToolReply::unavailable()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HotelSummary {
    pub hotel_id: String,
    pub name: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance: Option<f64>,
}

impl From<Hotel> for HotelSummary {
    fn from(hotel: Hotel) -> Self {
        let (latitude, longitude) = hotel
            .geo_code
            .map(|g| (g.latitude, g.longitude))
            .unwrap_or((None, None));
        Self {
            hotel_id: hotel.hotel_id,
            name: hotel.name.unwrap_or_else(|| "Unknown".to_string()),
            city: hotel.city_code.unwrap_or_else(|| "Unknown".to_string()),
            latitude,
            longitude,
            distance: hotel.distance.and_then(|d| d.value),
        }
    }
}

async fn next_hotel_batch(session: &TravelSession, batch_size: usize) -> ToolReply {
    let mut cache = session.hotels.lock().await;
    if cache.is_empty() || cache.is_expired(session.cache_ttl) {
        cache.clear();
        return ToolReply::empty(NO_CACHED_HOTELS_MESSAGE);
    }
    if cache.remaining() == 0 {
        return ToolReply::empty("No more hotels available.");
    }

    let hotels: Vec<HotelSummary> = cache
        .next_batch(batch_size)
        .into_iter()
        .map(HotelSummary::from)
        .collect();
    log::debug!("Returning {} hotel(s), {} remaining", hotels.len(), cache.remaining());
    ToolReply::success(json!({ "hotels": hotels }))
}

pub struct SearchHotelsTool {
    client: Arc<AmadeusClient>,
    session: Arc<TravelSession>,
    batch_size: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SearchHotelsArgs {
    #[serde(default)]
    city_code: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    hotel_ids: Option<Vec<String>>,
}

impl SearchHotelsArgs {
    fn query(&self) -> Result<HotelQuery, String> {
        let hotel_ids: Vec<String> = self
            .hotel_ids
            .iter()
            .flatten()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if !hotel_ids.is_empty() {
            return Ok(HotelQuery::ByIds(hotel_ids));
        }

        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                return Ok(HotelQuery::ByGeocode { latitude, longitude })
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err("Both latitude and longitude are required for a geocode search.".to_string())
            }
            (None, None) => {}
        }

        match self.city_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                if code.chars().count() != 3 {
                    return Err(format!(
                        "Invalid city code: '{}'. Provide a valid 3-letter IATA city code (e.g., 'SFO').",
                        code
                    ));
                }
                Ok(HotelQuery::ByCity(code.to_uppercase()))
            }
            _ => Err("Please provide city code, geocode, or hotel ID.".to_string()),
        }
    }
}

impl SearchHotelsTool {
    pub fn new(client: Arc<AmadeusClient>, session: Arc<TravelSession>, batch_size: usize) -> Self {
        Self {
            client,
            session,
            batch_size,
        }
    }

    async fn search(&self, args: SearchHotelsArgs) -> ToolReply {
        let query = match args.query() {
            Ok(query) => query,
            Err(message) => return ToolReply::error(message),
        };

        let hotels = match self.client.list_hotels(&query).await {
            Ok(hotels) => hotels,
            Err(e) => return upstream_failure("search for hotels", e),
        };

        if hotels.is_empty() {
            log::info!("No hotels found for {:?}", query);
            return ToolReply::empty("No hotels available for the specified criteria.");
        }

        log::info!("Hotel search successful, found {} hotel(s)", hotels.len());
        self.session.hotels.lock().await.replace(hotels);
        next_hotel_batch(&self.session, self.batch_size).await
    }
}

#[async_trait]
impl Tool for SearchHotelsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "search_hotels".to_string(),
            description: "Search for available hotels based on city, geocode, or hotel ID.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "city_code": {
                        "type": "string",
                        "description": "The IATA code of the destination city (e.g., 'NYC')."
                    },
                    "latitude": {
                        "type": "number",
                        "description": "Latitude for geocode-based search."
                    },
                    "longitude": {
                        "type": "number",
                        "description": "Longitude for geocode-based search."
                    },
                    "hotel_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Array of hotel IDs for direct lookup."
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let args: SearchHotelsArgs = parse_args("search_hotels", arguments)?;
        log::info!(
            "Searching hotels: city_code={:?}, latitude={:?}, longitude={:?}, hotel_ids={:?}",
            args.city_code,
            args.latitude,
            args.longitude,
            args.hotel_ids
        );
        Ok(self.search(args).await.into_output())
    }
}

pub struct NextHotelResultsTool {
    session: Arc<TravelSession>,
    batch_size: usize,
}

impl NextHotelResultsTool {
    pub fn new(session: Arc<TravelSession>, batch_size: usize) -> Self {
        Self { session, batch_size }
    }
}

#[async_trait]
impl Tool for NextHotelResultsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_next_hotel_results".to_string(),
            description: "Get the next batch of hotel search results.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<String, AgentError> {
        Ok(next_hotel_batch(&self.session, self.batch_size)
            .await
            .into_output())
    }
}

/// First offer of one hotel, flattened for the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HotelOffer {
    pub offer_id: String,
    pub hotel_id: String,
    pub name: String,
    pub city: String,
    #[serde(rename = "checkInDate")]
    pub check_in_date: String,
    #[serde(rename = "checkOutDate")]
    pub check_out_date: String,
    pub price: String,
    pub currency: String,
    pub room_type: String,
    pub payment_policy: String,
}

fn text_or(value: &Value, fallback: &str) -> String {
    match value {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Flattens one `hotel-offers` entry. Entries without a hotel id or without
/// any offer are dropped.
pub fn format_offer(entry: &Value) -> Option<HotelOffer> {
    let hotel = entry.get("hotel")?;
    let hotel_id = hotel.get("hotelId")?.as_str()?.to_string();
    let offer = entry.get("offers")?.as_array()?.first()?;

    Some(HotelOffer {
        offer_id: text_or(&offer["id"], "N/A"),
        hotel_id,
        name: text_or(&hotel["name"], "N/A"),
        city: text_or(&hotel["cityCode"], "N/A"),
        check_in_date: text_or(&offer["checkInDate"], "N/A"),
        check_out_date: text_or(&offer["checkOutDate"], "N/A"),
        price: text_or(&offer["price"]["total"], "Not Available"),
        currency: text_or(&offer["price"]["currency"], "Not Available"),
        room_type: text_or(&offer["room"]["description"]["text"], "N/A"),
        payment_policy: text_or(&offer["policies"]["paymentType"], "N/A"),
    })
}

pub fn format_offers_message(offers: &[HotelOffer]) -> String {
    let mut text = String::from("Here are the available offers:\n\n");
    for (index, offer) in offers.iter().enumerate() {
        text.push_str(&format!(
            "**{}. {}**\n➡️ **Offer ID:** `{}`\n➡️ **Room Type:** {}\n➡️ **Price:** {} {}\n➡️ **Payment Policy:** {}\n---\n",
            index + 1,
            offer.name,
            offer.offer_id,
            offer.room_type,
            offer.price,
            offer.currency,
            offer.payment_policy
        ));
    }
    text
}

/// Checks a requested stay against `today` and returns the parsed dates.
pub fn validate_stay(
    check_in: Option<&str>,
    check_out: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), String> {
    let (check_in, check_out) = match (
        check_in.map(str::trim).filter(|d| !d.is_empty()),
        check_out.map(str::trim).filter(|d| !d.is_empty()),
    ) {
        (Some(check_in), Some(check_out)) => (check_in, check_out),
        _ => return Err("Missing check-in or check-out date.".to_string()),
    };

    let parse = |raw: &str| NaiveDate::parse_from_str(raw, "%Y-%m-%d");
    let (check_in, check_out) = match (parse(check_in), parse(check_out)) {
        (Ok(check_in), Ok(check_out)) => (check_in, check_out),
        _ => return Err("Dates must be in YYYY-MM-DD format.".to_string()),
    };

    if check_in < today {
        return Err("Check-in date must be in the future.".to_string());
    }
    if check_out <= check_in {
        return Err("Check-out date must be after the check-in date.".to_string());
    }
    Ok((check_in, check_out))
}

pub struct SearchHotelOffersTool {
    client: Arc<AmadeusClient>,
}

#[derive(Debug, Deserialize)]
struct SearchHotelOffersArgs {
    #[serde(default)]
    hotel_ids: Vec<String>,
    #[serde(default)]
    check_in_date: Option<String>,
    #[serde(default)]
    check_out_date: Option<String>,
    #[serde(default)]
    adults: Option<u32>,
}

impl SearchHotelOffersTool {
    pub fn new(client: Arc<AmadeusClient>) -> Self {
        Self { client }
    }

    async fn search(&self, args: SearchHotelOffersArgs, today: NaiveDate) -> ToolReply {
        let hotel_ids: Vec<String> = args
            .hotel_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if hotel_ids.is_empty() {
            return ToolReply::error("Missing hotel IDs.");
        }

        let (check_in, check_out) = match validate_stay(
            args.check_in_date.as_deref(),
            args.check_out_date.as_deref(),
            today,
        ) {
            Ok(stay) => stay,
            Err(message) => return ToolReply::error(message),
        };
        let adults = args.adults.filter(|n| *n > 0).unwrap_or(1);

        let entries = match self
            .client
            .search_hotel_offers(&hotel_ids, check_in, check_out, adults)
            .await
        {
            Ok(entries) => entries,
            Err(e) => return upstream_failure("get offers", e),
        };

        let offers: Vec<HotelOffer> = entries
            .iter()
            .filter_map(|entry| {
                let offer = format_offer(entry);
                if offer.is_none() {
                    log::warn!("Skipping hotel offer entry without offers: {}", entry);
                }
                offer
            })
            .collect();

        if offers.is_empty() {
            log::info!("No offers found for {:?}", hotel_ids);
            return ToolReply::empty("No available offers for the selected hotels.");
        }

        log::info!("Hotel offers retrieved for {} hotel(s)", offers.len());
        let message = format_offers_message(&offers);
        ToolReply::success(json!({
            "offers": offers,
            "message": message,
        }))
    }
}

#[async_trait]
impl Tool for SearchHotelOffersTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "search_hotel_offers".to_string(),
            description: "Get available room offers for specific hotels.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hotel_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of hotel_id to search for offers. Do not use the hotel name but map the name to the hotel_id given previously"
                    },
                    "check_in_date": {
                        "type": "string",
                        "description": "Check-in date in YYYY-MM-DD format. Must be in the future. Must be explicitly provided by the user."
                    },
                    "check_out_date": {
                        "type": "string",
                        "description": "Check-out date in YYYY-MM-DD format. Must be after the check-in date. Must be explicitly provided by the user."
                    },
                    "adults": {
                        "type": "integer",
                        "description": "Number of adult guests."
                    }
                },
                "required": ["hotel_ids", "check_in_date", "check_out_date", "adults"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let args: SearchHotelOffersArgs = parse_args("search_hotel_offers", arguments)?;
        log::info!("Searching hotel offers for hotel_ids={:?}", args.hotel_ids);
        Ok(self.search(args, Local::now().date_naive()).await.into_output())
    }
}

pub struct BookHotelTool {
    client: Arc<AmadeusClient>,
}

#[derive(Debug, Deserialize)]
struct BookHotelArgs {
    #[serde(default)]
    offer_id: Option<String>,
    #[serde(default)]
    guests: Vec<Guest>,
}

impl BookHotelTool {
    pub fn new(client: Arc<AmadeusClient>) -> Self {
        Self { client }
    }

    async fn book(&self, args: BookHotelArgs) -> ToolReply {
        let offer_id = match args.offer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return ToolReply::error("Missing hotel offer ID. Please select a hotel before booking."),
        };
        if args.guests.is_empty() {
            return ToolReply::error("Missing guest information.");
        }

        match self.client.book_hotel(offer_id, &args.guests).await {
            Ok(booking_id) => {
                log::info!("Hotel booking successful, booking id {}", booking_id);
                ToolReply::success(json!({ "booking_id": booking_id }))
            }
            Err(e) => upstream_failure("book hotel", e),
        }
    }
}

#[async_trait]
impl Tool for BookHotelTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "book_hotel".to_string(),
            description: "Book a hotel using an offer ID and guest details.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "offer_id": {
                        "type": "string",
                        "description": "offer_ID is a 10 digit code for the selected offer. The offer_id is given: If offer_id is NA search for more offers"
                    },
                    "guests": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "tid": {"type": "integer", "description": "Guest reference ID."},
                                "title": {"type": "string", "description": "Title (e.g., 'MR', 'MRS')."},
                                "firstName": {"type": "string", "description": "Guest's first name."},
                                "lastName": {"type": "string", "description": "Guest's last name."},
                                "phone": {"type": "string", "description": "Guest's phone number."},
                                "email": {"type": "string", "description": "Guest's email address."}
                            },
                            "required": ["tid", "title", "firstName", "lastName", "phone", "email"]
                        },
                        "description": "List of guests for the booking."
                    }
                },
                "required": ["offer_id", "guests"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let args: BookHotelArgs = parse_args("book_hotel", arguments)?;
        log::info!(
            "Booking hotel: offer_id={:?}, {} guest(s)",
            args.offer_id,
            args.guests.len()
        );
        Ok(self.book(args).await.into_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmadeusSettings;
    use mockito::Matcher;
    use std::time::Duration;

    fn session() -> Arc<TravelSession> {
        Arc::new(TravelSession::new(Duration::from_secs(600)))
    }

    fn offline_client() -> Arc<AmadeusClient> {
        Arc::new(AmadeusClient::new(&AmadeusSettings::default()).unwrap())
    }

    async fn client_with_token(server: &mut mockito::ServerGuard) -> Arc<AmadeusClient> {
        server
            .mock("POST", "/v1/security/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok","expires_in":1799}"#)
            .create_async()
            .await;
        let settings = AmadeusSettings {
            base_url: server.url(),
            api_key: Some("id".into()),
            api_secret: Some("secret".into()),
            ..Default::default()
        };
        Arc::new(AmadeusClient::new(&settings).unwrap())
    }

    fn parse(output: String) -> Value {
        serde_json::from_str(&output).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_query_precedence() {
        let args = SearchHotelsArgs {
            city_code: Some("PAR".into()),
            latitude: Some(48.8),
            longitude: Some(2.3),
            hotel_ids: Some(vec!["HLPAR266".into()]),
        };
        assert_eq!(args.query().unwrap(), HotelQuery::ByIds(vec!["HLPAR266".into()]));

        let args = SearchHotelsArgs {
            city_code: Some("PAR".into()),
            latitude: Some(48.8),
            longitude: Some(2.3),
            hotel_ids: Some(vec![]),
        };
        assert_eq!(
            args.query().unwrap(),
            HotelQuery::ByGeocode {
                latitude: 48.8,
                longitude: 2.3
            }
        );

        let args = SearchHotelsArgs {
            city_code: Some("par".into()),
            ..Default::default()
        };
        assert_eq!(args.query().unwrap(), HotelQuery::ByCity("PAR".into()));
    }

    #[test]
    fn test_query_rejects_bad_input() {
        assert_eq!(
            SearchHotelsArgs::default().query().unwrap_err(),
            "Please provide city code, geocode, or hotel ID."
        );
        let args = SearchHotelsArgs {
            city_code: Some("PARIS".into()),
            ..Default::default()
        };
        assert_eq!(
            args.query().unwrap_err(),
            "Invalid city code: 'PARIS'. Provide a valid 3-letter IATA city code (e.g., 'SFO')."
        );
        let args = SearchHotelsArgs {
            latitude: Some(48.8),
            ..Default::default()
        };
        assert!(args.query().unwrap_err().contains("latitude and longitude"));
    }

    #[test]
    fn test_validate_stay_order_of_checks() {
        let today = date(2030, 1, 10);
        assert_eq!(
            validate_stay(None, Some("2030-01-12"), today).unwrap_err(),
            "Missing check-in or check-out date."
        );
        assert_eq!(
            validate_stay(Some("12/01/2030"), Some("2030-01-14"), today).unwrap_err(),
            "Dates must be in YYYY-MM-DD format."
        );
        assert_eq!(
            validate_stay(Some("2030-01-09"), Some("2030-01-14"), today).unwrap_err(),
            "Check-in date must be in the future."
        );
        assert_eq!(
            validate_stay(Some("2030-01-12"), Some("2030-01-12"), today).unwrap_err(),
            "Check-out date must be after the check-in date."
        );
        assert_eq!(
            validate_stay(Some("2030-01-10"), Some("2030-01-11"), today).unwrap(),
            (date(2030, 1, 10), date(2030, 1, 11))
        );
    }

    #[test]
    fn test_format_offer_fills_missing_fields() {
        let entry = json!({
            "hotel": {"hotelId": "HLPAR266", "name": "HOTEL DU LOUVRE", "cityCode": "PAR"},
            "offers": [{
                "id": "OFFER12345",
                "checkInDate": "2030-05-01",
                "checkOutDate": "2030-05-03",
                "room": {"description": {"text": "Deluxe King Room"}},
                "policies": {}
            }]
        });
        let offer = format_offer(&entry).unwrap();
        assert_eq!(offer.offer_id, "OFFER12345");
        assert_eq!(offer.room_type, "Deluxe King Room");
        assert_eq!(offer.price, "Not Available");
        assert_eq!(offer.currency, "Not Available");
        assert_eq!(offer.payment_policy, "N/A");

        let value = serde_json::to_value(&offer).unwrap();
        assert_eq!(value["checkInDate"], "2030-05-01");
    }

    #[test]
    fn test_format_offer_skips_hotel_without_offers() {
        let entry = json!({"hotel": {"hotelId": "H1"}, "offers": []});
        assert!(format_offer(&entry).is_none());
        assert!(format_offer(&json!({"available": false})).is_none());
    }

    #[tokio::test]
    async fn test_search_hotels_caches_and_paginates() {
        let mut server = mockito::Server::new_async().await;
        let client = client_with_token(&mut server).await;
        let hotels: Vec<Value> = (1..=7)
            .map(|i| {
                json!({
                    "hotelId": format!("H{}", i),
                    "name": format!("Hotel {}", i),
                    "cityCode": "PAR",
                    "geoCode": {"latitude": 48.8, "longitude": 2.3},
                    "distance": {"value": 0.5, "unit": "KM"}
                })
            })
            .collect();
        server
            .mock("GET", "/v1/reference-data/locations/hotels/by-city")
            .match_query(Matcher::UrlEncoded("cityCode".into(), "PAR".into()))
            .with_status(200)
            .with_body(json!({ "data": hotels }).to_string())
            .create_async()
            .await;

        let session = session();
        let search = SearchHotelsTool::new(client, session.clone(), 5);
        let first = parse(search.execute(json!({"city_code": "PAR"})).await.unwrap());
        assert_eq!(first["status"], "success");
        assert_eq!(first["hotels"].as_array().unwrap().len(), 5);
        assert_eq!(first["hotels"][0]["hotel_id"], "H1");
        assert_eq!(first["hotels"][0]["distance"], 0.5);

        let next = NextHotelResultsTool::new(session.clone(), 5);
        let second = parse(next.execute(json!({})).await.unwrap());
        assert_eq!(second["hotels"].as_array().unwrap().len(), 2);
        assert_eq!(second["hotels"][1]["hotel_id"], "H7");

        let done = parse(next.execute(Value::Null).await.unwrap());
        assert_eq!(done, json!({"status": "empty", "message": "No more hotels available."}));
    }

    #[tokio::test]
    async fn test_next_results_without_search() {
        let next = NextHotelResultsTool::new(session(), 5);
        let reply = parse(next.execute(json!({})).await.unwrap());
        assert_eq!(reply["status"], "empty");
        assert_eq!(reply["message"], NO_CACHED_HOTELS_MESSAGE);
    }

    #[tokio::test]
    async fn test_search_hotels_empty_and_failure() {
        let mut server = mockito::Server::new_async().await;
        let client = client_with_token(&mut server).await;
        server
            .mock("GET", "/v1/reference-data/locations/hotels/by-hotels")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/reference-data/locations/hotels/by-city")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"errors":[{"code":895,"title":"NOTHING FOUND FOR REQUESTED CITY"}]}"#)
            .create_async()
            .await;

        let search = SearchHotelsTool::new(client, session(), 5);
        let empty = parse(search.execute(json!({"hotel_ids": ["NOPE"]})).await.unwrap());
        assert_eq!(empty["message"], "No hotels available for the specified criteria.");

        let failed = parse(search.execute(json!({"city_code": "XXX"})).await.unwrap());
        assert_eq!(failed["status"], "error");
        let message = failed["message"].as_str().unwrap();
        assert!(message.starts_with("Failed to search for hotels: "));
        assert!(message.contains("NOTHING FOUND"));
    }

    #[tokio::test]
    async fn test_search_hotel_offers_success() {
        let mut server = mockito::Server::new_async().await;
        let client = client_with_token(&mut server).await;
        server
            .mock("GET", "/v3/shopping/hotel-offers")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("hotelIds".into(), "H1,H2".into()),
                Matcher::UrlEncoded("adults".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": [
                    {
                        "hotel": {"hotelId": "H1", "name": "Hotel One", "cityCode": "PAR"},
                        "offers": [{
                            "id": "OFF1",
                            "checkInDate": "2031-05-01",
                            "checkOutDate": "2031-05-03",
                            "room": {"description": {"text": "Standard Room"}},
                            "price": {"total": "240.00", "currency": "EUR"},
                            "policies": {"paymentType": "guarantee"}
                        }]
                    },
                    {"hotel": {"hotelId": "H2", "name": "Hotel Two"}, "offers": []}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let tool = SearchHotelOffersTool::new(client);
        let args: SearchHotelOffersArgs = serde_json::from_value(json!({
            "hotel_ids": ["H1", "H2"],
            "check_in_date": "2031-05-01",
            "check_out_date": "2031-05-03",
            "adults": 0
        }))
        .unwrap();
        let reply = tool.search(args, date(2031, 4, 1)).await.to_value();

        assert_eq!(reply["status"], "success");
        assert_eq!(reply["offers"].as_array().unwrap().len(), 1);
        assert_eq!(reply["offers"][0]["payment_policy"], "guarantee");
        let message = reply["message"].as_str().unwrap();
        assert!(message.starts_with("Here are the available offers:"));
        assert!(message.contains("**Offer ID:** `OFF1`"));
        assert!(message.contains("240.00 EUR"));
    }

    #[tokio::test]
    async fn test_search_hotel_offers_validation_messages() {
        let tool = SearchHotelOffersTool::new(offline_client());
        let reply = parse(
            tool.execute(json!({
                "hotel_ids": [],
                "check_in_date": "2031-05-01",
                "check_out_date": "2031-05-03",
                "adults": 1
            }))
            .await
            .unwrap(),
        );
        assert_eq!(reply["message"], "Missing hotel IDs.");

        let reply = parse(
            tool.execute(json!({
                "hotel_ids": ["H1"],
                "check_in_date": "2001-05-01",
                "check_out_date": "2001-05-03",
                "adults": 1
            }))
            .await
            .unwrap(),
        );
        assert_eq!(reply["message"], "Check-in date must be in the future.");
    }

    #[tokio::test]
    async fn test_search_hotel_offers_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let client = client_with_token(&mut server).await;
        server
            .mock("GET", "/v3/shopping/hotel-offers")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"errors":[{"code":3664,"title":"NO ROOMS AVAILABLE AT REQUESTED PROPERTY"}]}"#)
            .create_async()
            .await;

        let tool = SearchHotelOffersTool::new(client);
        let args: SearchHotelOffersArgs = serde_json::from_value(json!({
            "hotel_ids": ["H1"],
            "check_in_date": "2031-05-01",
            "check_out_date": "2031-05-03",
            "adults": 2
        }))
        .unwrap();
        let reply = tool.search(args, date(2031, 4, 1)).await;
        match reply {
            ToolReply::Error(message) => {
                assert!(message.starts_with("Failed to get offers: "));
                assert!(message.contains("NO ROOMS AVAILABLE"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_book_hotel() {
        let mut server = mockito::Server::new_async().await;
        let client = client_with_token(&mut server).await;
        server
            .mock("POST", "/v2/booking/hotel-orders")
            .with_status(201)
            .with_body(r#"{"data":{"id":"MS/1","type":"hotel-order"}}"#)
            .create_async()
            .await;

        let tool = BookHotelTool::new(client);
        let reply = parse(
            tool.execute(json!({
                "offer_id": "OFF1",
                "guests": [{
                    "tid": 1, "title": "MS", "firstName": "Ada", "lastName": "Lovelace",
                    "phone": "+33679278416", "email": "ada@example.com"
                }]
            }))
            .await
            .unwrap(),
        );
        assert_eq!(reply, json!({"status": "success", "booking_id": "MS/1"}));
    }

    #[tokio::test]
    async fn test_book_hotel_missing_input() {
        let tool = BookHotelTool::new(offline_client());
        let reply = parse(tool.execute(json!({"offer_id": " ", "guests": []})).await.unwrap());
        assert_eq!(
            reply["message"],
            "Missing hotel offer ID. Please select a hotel before booking."
        );

        let reply = parse(tool.execute(json!({"offer_id": "OFF1", "guests": []})).await.unwrap());
        assert_eq!(reply["message"], "Missing guest information.");
    }

    #[tokio::test]
    async fn test_booking_without_credentials_is_unavailable() {
        let tool = BookHotelTool::new(offline_client());
        let reply = parse(
            tool.execute(json!({
                "offer_id": "OFF1",
                "guests": [{
                    "tid": 1, "title": "MR", "firstName": "Bob", "lastName": "Smith",
                    "phone": "+33679278416", "email": "bob@example.com"
                }]
            }))
            .await
            .unwrap(),
        );
        assert_eq!(reply["message"], crate::tools::SERVICE_UNAVAILABLE_MESSAGE);
    }
}
