//! A deterministic, in-process twin of [`crate::tx::PgStore`], used only by
//! tests (§8: "a `Store` trait with two implementations ... so the full
//! engine logic is covered deterministically without requiring a live
//! Postgres instance"). No network, no real concurrency — `with_tx` takes a
//! single mutex for the run of the whole crate's test suite, which is
//! exactly the serializability a real transaction gives the engine.
#![cfg(any(test, feature = "test-support"))]

use crate::error::{EngineError, EngineResult};
use crate::models::*;
use crate::tx::{Tx, TxStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct MemoryState {
    pub events: HashMap<Uuid, Event>,
    pub seats: HashMap<Uuid, Seat>,
    pub bookings: HashMap<Uuid, Booking>,
    pub seat_bookings: Vec<(Uuid, Uuid)>, // (booking_id, seat_id)
    pub waitlist: HashMap<Uuid, WaitlistEntry>,
    pub history: Vec<BookingHistoryEntry>,
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn seed_event(&self, new: NewEvent) -> Event {
        let now = Utc::now();
        let event = Event {
            id: new.id,
            name: new.name,
            description: new.description,
            venue: new.venue,
            event_date: new.event_date,
            total_capacity: new.total_capacity,
            available_capacity: new.available_capacity,
            price: new.price,
            has_seat_selection: new.has_seat_selection,
            version: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().events.insert(event.id, event.clone());
        event
    }

    pub fn seed_seat(&self, new: NewSeat) -> Seat {
        let seat = Seat {
            id: new.id,
            event_id: new.event_id,
            section: new.section,
            row_label: new.row_label,
            number: new.number,
            price: new.price,
            status: SeatStatus::Available,
            updated_at: Utc::now(),
        };
        self.state.lock().unwrap().seats.insert(seat.id, seat.clone());
        seat
    }

    pub fn history_for(&self, booking_id: Uuid) -> Vec<BookingHistoryEntry> {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|h| h.booking_id == booking_id)
            .cloned()
            .collect()
    }

    pub fn event(&self, id: Uuid) -> Event {
        self.state.lock().unwrap().events.get(&id).cloned().unwrap()
    }

    pub fn seat(&self, id: Uuid) -> Seat {
        self.state.lock().unwrap().seats.get(&id).cloned().unwrap()
    }
}

impl TxStore for MemoryStore {
    fn with_tx<T>(&self, f: impl FnOnce(&mut dyn Tx) -> EngineResult<T>) -> EngineResult<T> {
        let mut guard = self.state.lock().unwrap();
        let mut scratch = guard.clone();
        let mut tx = MemoryTx { state: &mut scratch };
        match f(&mut tx) {
            Ok(value) => {
                *guard = scratch;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }
}

pub struct MemoryTx<'a> {
    state: &'a mut MemoryState,
}

impl<'a> Tx for MemoryTx<'a> {
    fn get_event(&mut self, id: Uuid) -> EngineResult<Event> {
        self.state
            .events
            .get(&id)
            .cloned()
            .ok_or(EngineError::EventNotFound(id))
    }

    fn get_event_for_update(&mut self, id: Uuid) -> EngineResult<Event> {
        self.get_event(id)
    }

    fn reserve_capacity(&mut self, event_id: Uuid, n: i32, expected_version: i32) -> EngineResult<Event> {
        let event = self
            .state
            .events
            .get_mut(&event_id)
            .ok_or(EngineError::EventNotFound(event_id))?;
        if event.version != expected_version {
            return Err(EngineError::StaleVersion(event_id));
        }
        if event.available_capacity < n {
            return Err(EngineError::InsufficientCapacity(event_id));
        }
        event.available_capacity -= n;
        event.version += 1;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn restore_capacity(&mut self, event_id: Uuid, n: i32) -> EngineResult<Event> {
        let event = self
            .state
            .events
            .get_mut(&event_id)
            .ok_or(EngineError::EventNotFound(event_id))?;
        event.available_capacity = (event.available_capacity + n).min(event.total_capacity);
        event.version += 1;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn hold_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>> {
        let mut ids = seat_ids.to_vec();
        ids.sort();
        ids.dedup();

        for &id in &ids {
            let seat = self.state.seats.get(&id).ok_or(EngineError::SeatNotFound(id))?;
            if seat.event_id != event_id {
                return Err(EngineError::SeatNotFound(id));
            }
            if seat.status != SeatStatus::Available {
                return Err(EngineError::SeatNotAvailable {
                    seat_id: id,
                    status: format!("{:?}", seat.status),
                });
            }
        }
        let now = Utc::now();
        for &id in &ids {
            let seat = self.state.seats.get_mut(&id).unwrap();
            seat.status = SeatStatus::Held;
            seat.updated_at = now;
        }
        Ok(ids.iter().map(|id| self.state.seats[id].clone()).collect())
    }

    fn release_held_seats(&mut self, seat_ids: &[Uuid]) -> EngineResult<usize> {
        let now = Utc::now();
        let mut count = 0;
        for &id in seat_ids {
            if let Some(seat) = self.state.seats.get_mut(&id) {
                if seat.status == SeatStatus::Held {
                    seat.status = SeatStatus::Available;
                    seat.updated_at = now;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn hold_seats_for_booking(
        &mut self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        booking_id: Uuid,
    ) -> EngineResult<Vec<Seat>> {
        let rows = self.hold_seats(event_id, seat_ids)?;
        let mut ids = seat_ids.to_vec();
        ids.sort();
        ids.dedup();
        for id in ids {
            self.state.seat_bookings.push((booking_id, id));
        }
        Ok(rows)
    }

    fn confirm_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()> {
        let now = Utc::now();
        let seat_ids: Vec<Uuid> = self
            .state
            .seat_bookings
            .iter()
            .filter(|(b, _)| *b == booking_id)
            .map(|(_, s)| *s)
            .collect();
        for id in &seat_ids {
            if let Some(seat) = self.state.seats.get_mut(id) {
                if seat.status == SeatStatus::Held {
                    seat.status = SeatStatus::Booked;
                    seat.updated_at = now;
                }
            }
        }
        Ok(())
    }

    fn release_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()> {
        let now = Utc::now();
        let seat_ids: Vec<Uuid> = self
            .state
            .seat_bookings
            .iter()
            .filter(|(b, _)| *b == booking_id)
            .map(|(_, s)| *s)
            .collect();
        for id in &seat_ids {
            if let Some(seat) = self.state.seats.get_mut(id) {
                if matches!(seat.status, SeatStatus::Held | SeatStatus::Booked) {
                    seat.status = SeatStatus::Available;
                    seat.updated_at = now;
                }
            }
        }
        self.state.seat_bookings.retain(|(b, _)| *b != booking_id);
        Ok(())
    }

    fn seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<Vec<Seat>> {
        Ok(self
            .state
            .seat_bookings
            .iter()
            .filter(|(b, _)| *b == booking_id)
            .filter_map(|(_, s)| self.state.seats.get(s).cloned())
            .collect())
    }

    fn seats_for_ids(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>> {
        Ok(seat_ids
            .iter()
            .filter_map(|id| self.state.seats.get(id))
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect())
    }

    fn list_available_seats_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<Seat>> {
        let mut rows: Vec<Seat> = self
            .state
            .seats
            .values()
            .filter(|s| s.event_id == event_id && s.status == SeatStatus::Available)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.section, &a.row_label, a.number).cmp(&(&b.section, &b.row_label, b.number))
        });
        Ok(rows)
    }

    fn sweep_expired_holds(&mut self, now: DateTime<Utc>, hold_ttl: ChronoDuration) -> EngineResult<usize> {
        let cutoff = now - hold_ttl;
        let mut count = 0;
        for seat in self.state.seats.values_mut() {
            if seat.status == SeatStatus::Held && seat.updated_at < cutoff {
                seat.status = SeatStatus::Available;
                seat.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    fn insert_booking(&mut self, new: NewBooking) -> EngineResult<Booking> {
        let now = Utc::now();
        let booking = Booking {
            id: new.id,
            user_id: new.user_id,
            event_id: new.event_id,
            quantity: new.quantity,
            total_amount: new.total_amount,
            status: new.status,
            expires_at: new.expires_at,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };
        self.state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn get_booking(&mut self, id: Uuid) -> EngineResult<Booking> {
        self.state
            .bookings
            .get(&id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))
    }

    fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        payment_reference: Option<String>,
    ) -> EngineResult<Booking> {
        let booking = self
            .state
            .bookings
            .get_mut(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        booking.status = status;
        booking.expires_at = expires_at;
        if let Some(reference) = payment_reference {
            booking.payment_reference = Some(reference);
        }
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    fn append_history(
        &mut self,
        booking_id: Uuid,
        action: BookingHistoryAction,
        details: Option<String>,
        performed_by: Option<Uuid>,
    ) -> EngineResult<()> {
        self.state.history.push(BookingHistoryEntry {
            id: Uuid::new_v4(),
            booking_id,
            action,
            details,
            performed_by,
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn list_expired_bookings(&mut self, now: DateTime<Utc>, limit: i64) -> EngineResult<Vec<Booking>> {
        let mut rows: Vec<Booking> = self
            .state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at.map(|e| e < now).unwrap_or(false))
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.expires_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    fn waitlist_active_entry_for_user(
        &mut self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> EngineResult<Option<WaitlistEntry>> {
        Ok(self
            .state
            .waitlist
            .values()
            .find(|w| w.user_id == user_id && w.event_id == event_id && w.status.is_non_terminal())
            .cloned())
    }

    fn waitlist_max_position(&mut self, event_id: Uuid) -> EngineResult<i32> {
        Ok(self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id && w.status.is_non_terminal())
            .map(|w| w.position)
            .max()
            .unwrap_or(0))
    }

    fn insert_waitlist_entry(&mut self, new: NewWaitlistEntry) -> EngineResult<WaitlistEntry> {
        let now = Utc::now();
        let entry = WaitlistEntry {
            id: new.id,
            user_id: new.user_id,
            event_id: new.event_id,
            requested_quantity: new.requested_quantity,
            position: new.position,
            status: WaitlistStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.state.waitlist.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn get_waitlist_entry(&mut self, id: Uuid) -> EngineResult<WaitlistEntry> {
        self.state
            .waitlist
            .get(&id)
            .cloned()
            .ok_or(EngineError::WaitlistEntryNotFound(id))
    }

    fn delete_waitlist_entry(&mut self, id: Uuid) -> EngineResult<()> {
        self.state.waitlist.remove(&id);
        Ok(())
    }

    fn decrement_positions_above(&mut self, event_id: Uuid, position: i32) -> EngineResult<()> {
        let now = Utc::now();
        for entry in self.state.waitlist.values_mut() {
            if entry.event_id == event_id && entry.status.is_non_terminal() && entry.position > position {
                entry.position -= 1;
                entry.updated_at = now;
            }
        }
        Ok(())
    }

    fn active_waitlist_entries_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<WaitlistEntry>> {
        let mut rows: Vec<WaitlistEntry> = self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id && w.status == WaitlistStatus::Active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.position.cmp(&b.position).then(a.created_at.cmp(&b.created_at)));
        Ok(rows)
    }

    fn set_waitlist_status(&mut self, id: Uuid, status: WaitlistStatus) -> EngineResult<()> {
        let entry = self
            .state
            .waitlist
            .get_mut(&id)
            .ok_or(EngineError::WaitlistEntryNotFound(id))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    fn set_waitlist_status_and_position(
        &mut self,
        id: Uuid,
        status: WaitlistStatus,
        position: i32,
    ) -> EngineResult<()> {
        let entry = self
            .state
            .waitlist
            .get_mut(&id)
            .ok_or(EngineError::WaitlistEntryNotFound(id))?;
        entry.status = status;
        entry.position = position;
        entry.updated_at = Utc::now();
        Ok(())
    }

    fn list_stale_notified_waitlist(&mut self, cutoff: DateTime<Utc>) -> EngineResult<Vec<WaitlistEntry>> {
        let mut rows: Vec<WaitlistEntry> = self
            .state
            .waitlist
            .values()
            .filter(|w| w.status == WaitlistStatus::Notified && w.updated_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.updated_at);
        Ok(rows)
    }

    fn list_active_future_events(&mut self, now: DateTime<Utc>) -> EngineResult<Vec<Event>> {
        Ok(self
            .state
            .events
            .values()
            .filter(|e| e.is_active && e.event_date > now)
            .cloned()
            .collect())
    }

    fn count_bookings_in_window(
        &mut self,
        event_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<i64> {
        Ok(self
            .state
            .bookings
            .values()
            .filter(|b| {
                b.event_id == event_id
                    && b.created_at >= from
                    && b.created_at < to
                    && matches!(b.status, BookingStatus::Confirmed | BookingStatus::Pending)
            })
            .count() as i64)
    }

    fn count_waitlist(&mut self, event_id: Uuid) -> EngineResult<i64> {
        Ok(self
            .state
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id && w.status.is_non_terminal())
            .count() as i64)
    }

    fn update_event_price(&mut self, event_id: Uuid, new_price: bigdecimal::BigDecimal) -> EngineResult<()> {
        let event = self
            .state
            .events
            .get_mut(&event_id)
            .ok_or(EngineError::EventNotFound(event_id))?;
        event.price = new_price;
        event.updated_at = Utc::now();
        Ok(())
    }

    fn set_event_active(&mut self, event_id: Uuid, is_active: bool) -> EngineResult<Event> {
        let event = self
            .state
            .events
            .get_mut(&event_id)
            .ok_or(EngineError::EventNotFound(event_id))?;
        event.is_active = is_active;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn count_confirmed_bookings(&mut self, event_id: Uuid) -> EngineResult<i64> {
        Ok(self
            .state
            .bookings
            .values()
            .filter(|b| b.event_id == event_id && b.status == BookingStatus::Confirmed)
            .count() as i64)
    }

    fn delete_event(&mut self, event_id: Uuid) -> EngineResult<()> {
        let seat_ids: std::collections::HashSet<Uuid> = self
            .state
            .seats
            .values()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.id)
            .collect();
        self.state.events.remove(&event_id);
        self.state.seats.retain(|_, s| s.event_id != event_id);
        self.state.waitlist.retain(|_, w| w.event_id != event_id);
        self.state
            .seat_bookings
            .retain(|(_, seat_id)| !seat_ids.contains(seat_id));
        Ok(())
    }
}
