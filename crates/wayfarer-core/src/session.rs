//! Per-conversation travel state.
//!
//! The model is told it can page through hotel results and book a flight by
//! the id it was shown, so search results must outlive the tool call that
//! produced them. Each chat connection owns one `TravelSession`; nothing is
//! shared between connections.

use crate::amadeus::{FlightDestination, Hotel};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Hotels from the last search, consumed in fixed-size batches.
#[derive(Debug, Default)]
pub struct HotelCache {
    hotels: Vec<Hotel>,
    pointer: usize,
    stored_at: Option<Instant>,
}

impl HotelCache {
    /// Replaces the cached list and rewinds pagination. Duplicate hotel ids
    /// keep their first occurrence.
    pub fn replace(&mut self, hotels: Vec<Hotel>) {
        let mut seen = HashSet::new();
        self.hotels = hotels
            .into_iter()
            .filter(|hotel| seen.insert(hotel.hotel_id.clone()))
            .collect();
        self.pointer = 0;
        self.stored_at = Some(Instant::now());
    }

    pub fn next_batch(&mut self, batch_size: usize) -> Vec<Hotel> {
        let end = (self.pointer + batch_size).min(self.hotels.len());
        let batch = self.hotels[self.pointer..end].to_vec();
        self.pointer = end;
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.hotels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hotels.len()
    }

    pub fn remaining(&self) -> usize {
        self.hotels.len() - self.pointer
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        match self.stored_at {
            Some(stored_at) => stored_at.elapsed() > ttl,
            None => true,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CachedFlight {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: Option<String>,
    pub return_date: Option<String>,
    pub price: String,
    pub currency: String,
}

/// Flights from the last search, addressable by the ids "1".."n".
#[derive(Debug, Default)]
pub struct FlightCache {
    flights: Vec<CachedFlight>,
    stored_at: Option<Instant>,
}

impl FlightCache {
    pub fn replace(&mut self, flights: Vec<FlightDestination>, currency: &str) -> Vec<CachedFlight> {
        self.flights = flights
            .into_iter()
            .enumerate()
            .map(|(index, flight)| CachedFlight {
                id: (index + 1).to_string(),
                origin: flight.origin,
                destination: flight.destination,
                departure_date: flight.departure_date,
                return_date: flight.return_date,
                price: flight.price.total,
                currency: currency.to_string(),
            })
            .collect();
        self.stored_at = Some(Instant::now());
        self.flights.clone()
    }

    pub fn get(&self, id: &str, ttl: Duration) -> Option<CachedFlight> {
        if self.stored_at.is_some_and(|at| at.elapsed() > ttl) {
            return None;
        }
        self.flights.iter().find(|f| f.id == id.trim()).cloned()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlightBooking {
    pub booking_reference: String,
    pub passenger_name: String,
    pub flight: CachedFlight,
    pub booked_at: chrono::DateTime<chrono::Utc>,
}

pub struct TravelSession {
    pub id: String,
    pub hotels: Mutex<HotelCache>,
    pub flights: Mutex<FlightCache>,
    pub bookings: Mutex<Vec<FlightBooking>>,
    pub cache_ttl: Duration,
}

impl TravelSession {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            hotels: Mutex::new(HotelCache::default()),
            flights: Mutex::new(FlightCache::default()),
            bookings: Mutex::new(Vec::new()),
            cache_ttl,
        }
    }
}
