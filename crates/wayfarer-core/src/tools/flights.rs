use crate::amadeus::AmadeusClient;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::session::{CachedFlight, FlightBooking, TravelSession};
use crate::tools::{parse_args, Tool, ToolReply};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct SearchFlightsTool {
    client: Arc<AmadeusClient>,
    session: Arc<TravelSession>,
}

#[derive(Debug, Deserialize)]
struct SearchFlightsArgs {
    origin: String,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    departure_date: Option<String>,
    max_price: u64,
}

impl SearchFlightsTool {
    pub fn new(client: Arc<AmadeusClient>, session: Arc<TravelSession>) -> Self {
        Self { client, session }
    }

    async fn search(&self, args: SearchFlightsArgs) -> ToolReply {
        let origin = args.origin.trim().to_uppercase();
        if origin.len() != 3 || !origin.chars().all(|c| c.is_ascii_alphabetic()) {
            return ToolReply::error(format!(
                "Invalid origin: '{}'. Provide a valid 3-letter IATA code (e.g., 'JFK').",
                args.origin
            ));
        }

        let departure_date = match args.departure_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) if date < Local::now().date_naive() => {
                    return ToolReply::error("Departure date must be in the future.")
                }
                Ok(date) => Some(date),
                Err(_) => return ToolReply::error("Dates must be in YYYY-MM-DD format."),
            },
        };

        let response = match self
            .client
            .search_flight_destinations(&origin, args.max_price, departure_date)
            .await
        {
            Ok(response) => response,
            Err(AgentError::AmadeusError { status: Some(status), message }) => {
                log::error!("Flight search failed ({}): {}", status, message);
                return ToolReply::error(format!("Failed to search for flights: {}", message));
            }
            Err(e) => {
                log::error!("Unexpected error during flight search: {}", e);
                return ToolReply::unavailable();
            }
        };

        let wanted = args
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let flights: Vec<_> = response
            .data
            .into_iter()
            .filter(|f| wanted.map_or(true, |d| f.destination.eq_ignore_ascii_case(d)))
            .collect();

        if flights.is_empty() {
            log::info!("No flights found from {}", origin);
            return ToolReply::empty("No flights found. Try a different search.");
        }

        let currency = response
            .meta
            .and_then(|m| m.currency)
            .unwrap_or_else(|| "EUR".to_string());
        let cached = self.session.flights.lock().await.replace(flights, &currency);
        log::info!("Flight search successful, {} result(s) cached", cached.len());

        ToolReply::success(json!({
            "flights": cached,
            "message": format_flights(&cached),
        }))
    }
}

pub fn format_flights(flights: &[CachedFlight]) -> String {
    let mut text = String::from("---\n**Flight Search Results**:\n\n");
    for flight in flights {
        text.push_str(&format!(
            "**{}.** **From:** {} → **To:** {}\n**Departure Date:** {}\n**Price:** {} {}\n---\n",
            flight.id,
            flight.origin,
            flight.destination,
            flight.departure_date.as_deref().unwrap_or("N/A"),
            flight.price,
            flight.currency
        ));
    }
    text
}

#[async_trait]
impl Tool for SearchFlightsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "search_flights".to_string(),
            description: "Search for available flights based on the origin, destination, departure date, and maximum price. \
                If the user does not provide a date, ask them to clarify. \
                Do not assume or guess the date — only use the date explicitly provided by the user."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "origin": {
                        "type": "string",
                        "description": "The IATA code of the departure airport (e.g., 'JFK')."
                    },
                    "destination": {
                        "type": "string",
                        "description": "The IATA code of the destination airport (e.g., 'MAD'). \
                            If missing, suggest popular destinations or ask the user for clarification."
                    },
                    "departure_date": {
                        "type": "string",
                        "description": "Date of flight (YYYY-MM-DD). Must be explicitly provided by the user."
                    },
                    "max_price": {
                        "type": "integer",
                        "description": "The maximum price for flights in the preferred currency."
                    }
                },
                "required": ["origin", "destination", "departure_date", "max_price"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let args: SearchFlightsArgs = parse_args("search_flights", arguments)?;
        log::info!(
            "Searching flights: origin={}, destination={:?}, departure_date={:?}, max_price={}",
            args.origin,
            args.destination,
            args.departure_date,
            args.max_price
        );
        Ok(self.search(args).await.into_output())
    }
}

/// Reserves a flight from the last search results of this session.
pub struct BookFlightTool {
    session: Arc<TravelSession>,
}

#[derive(Debug, Deserialize)]
struct BookFlightArgs {
    booking_id: String,
    passenger_name: String,
}

impl BookFlightTool {
    pub fn new(session: Arc<TravelSession>) -> Self {
        Self { session }
    }

    async fn book(&self, args: BookFlightArgs) -> ToolReply {
        let passenger_name = args.passenger_name.trim();
        if passenger_name.is_empty() {
            return ToolReply::error("Missing passenger name.");
        }

        let flight = match self
            .session
            .flights
            .lock()
            .await
            .get(&args.booking_id, self.session.cache_ttl)
        {
            Some(flight) => flight,
            None => {
                return ToolReply::error(format!(
                    "Flight '{}' was not found. Please search for flights first.",
                    args.booking_id
                ))
            }
        };

        let reference = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let booking = FlightBooking {
            booking_reference: reference.clone(),
            passenger_name: passenger_name.to_string(),
            flight: flight.clone(),
            booked_at: chrono::Utc::now(),
        };
        self.session.bookings.lock().await.push(booking);
        log::info!(
            "Flight {} → {} booked for {} (reference {})",
            flight.origin,
            flight.destination,
            passenger_name,
            reference
        );

        ToolReply::success(json!({
            "booking_reference": reference,
            "passenger_name": passenger_name,
            "flight": flight,
            "message": format!(
                "Flight {} → {} on {} booked for {}. Booking reference: {}.",
                flight.origin,
                flight.destination,
                flight.departure_date.as_deref().unwrap_or("the selected date"),
                passenger_name,
                reference
            ),
        }))
    }
}

#[async_trait]
impl Tool for BookFlightTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "book_flight".to_string(),
            description: "Book a flight using the ID and passenger details. \
                If the ID is missing, call 'search_flights' to find the available flights first."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "booking_id": {
                        "type": "string",
                        "description": "The unique flight ID for booking (e.g., '1')."
                    },
                    "passenger_name": {
                        "type": "string",
                        "description": "Full name of the passenger for booking."
                    }
                },
                "required": ["booking_id", "passenger_name"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let args: BookFlightArgs = parse_args("book_flight", arguments)?;
        Ok(self.book(args).await.into_output())
    }
}
