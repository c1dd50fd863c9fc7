//! The transactional surface `BookingEngine` and `WaitlistCoordinator` are
//! written against. `PgTx` is the real implementation, a thin wrapper over a
//! single `PgConnection` already inside a `conn.transaction(..)` closure.
//! `crate::memory::MemoryTx` (under `#[cfg(test)]`) is the deterministic
//! in-memory twin §8 calls for: "the full engine logic is covered
//! deterministically without requiring a live Postgres instance."
use crate::capacity::CapacityController;
use crate::error::EngineResult;
use crate::models::{
    Booking, BookingHistoryAction, BookingStatus, Event, NewBooking, NewWaitlistEntry, Seat,
    WaitlistEntry, WaitlistStatus,
};
use crate::seats::SeatController;
use crate::store;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::Connection;
use diesel::PgConnection;
use uuid::Uuid;

/// One logical unit of work against the store. Every method here runs inside
/// whatever transaction `TxStore::with_tx` opened; none of them commit or
/// roll back on their own.
pub trait Tx {
    fn get_event(&mut self, id: Uuid) -> EngineResult<Event>;
    fn get_event_for_update(&mut self, id: Uuid) -> EngineResult<Event>;
    fn reserve_capacity(&mut self, event_id: Uuid, n: i32, expected_version: i32) -> EngineResult<Event>;
    fn restore_capacity(&mut self, event_id: Uuid, n: i32) -> EngineResult<Event>;
    fn set_event_active(&mut self, event_id: Uuid, is_active: bool) -> EngineResult<Event>;
    fn count_confirmed_bookings(&mut self, event_id: Uuid) -> EngineResult<i64>;
    fn delete_event(&mut self, event_id: Uuid) -> EngineResult<()>;

    fn hold_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>>;
    fn release_held_seats(&mut self, seat_ids: &[Uuid]) -> EngineResult<usize>;
    fn hold_seats_for_booking(
        &mut self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        booking_id: Uuid,
    ) -> EngineResult<Vec<Seat>>;
    fn confirm_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()>;
    fn release_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()>;
    fn seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<Vec<Seat>>;
    fn seats_for_ids(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>>;
    fn list_available_seats_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<Seat>>;
    fn sweep_expired_holds(&mut self, now: DateTime<Utc>, hold_ttl: ChronoDuration) -> EngineResult<usize>;

    fn insert_booking(&mut self, new: NewBooking) -> EngineResult<Booking>;
    fn get_booking(&mut self, id: Uuid) -> EngineResult<Booking>;
    fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        payment_reference: Option<String>,
    ) -> EngineResult<Booking>;
    fn append_history(
        &mut self,
        booking_id: Uuid,
        action: BookingHistoryAction,
        details: Option<String>,
        performed_by: Option<Uuid>,
    ) -> EngineResult<()>;
    fn list_expired_bookings(&mut self, now: DateTime<Utc>, limit: i64) -> EngineResult<Vec<Booking>>;

    fn waitlist_active_entry_for_user(
        &mut self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> EngineResult<Option<WaitlistEntry>>;
    fn waitlist_max_position(&mut self, event_id: Uuid) -> EngineResult<i32>;
    fn insert_waitlist_entry(&mut self, new: NewWaitlistEntry) -> EngineResult<WaitlistEntry>;
    fn get_waitlist_entry(&mut self, id: Uuid) -> EngineResult<WaitlistEntry>;
    fn delete_waitlist_entry(&mut self, id: Uuid) -> EngineResult<()>;
    fn decrement_positions_above(&mut self, event_id: Uuid, position: i32) -> EngineResult<()>;
    fn active_waitlist_entries_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<WaitlistEntry>>;
    fn set_waitlist_status(&mut self, id: Uuid, status: WaitlistStatus) -> EngineResult<()>;
    fn set_waitlist_status_and_position(
        &mut self,
        id: Uuid,
        status: WaitlistStatus,
        position: i32,
    ) -> EngineResult<()>;
    fn list_stale_notified_waitlist(&mut self, cutoff: DateTime<Utc>) -> EngineResult<Vec<WaitlistEntry>>;

    fn list_active_future_events(&mut self, now: DateTime<Utc>) -> EngineResult<Vec<Event>>;
    fn count_bookings_in_window(
        &mut self,
        event_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<i64>;
    fn count_waitlist(&mut self, event_id: Uuid) -> EngineResult<i64>;
    fn update_event_price(&mut self, event_id: Uuid, new_price: bigdecimal::BigDecimal) -> EngineResult<()>;
}

/// Anything that can run a closure against a fresh `Tx` as one atomic unit,
/// matching `Store.WithTx(fn)` in §4.1.
pub trait TxStore: Send + Sync {
    fn with_tx<T>(&self, f: impl FnOnce(&mut dyn Tx) -> EngineResult<T>) -> EngineResult<T>;
}

/// `Tx` over a live `PgConnection`. Every method is a direct delegate to the
/// free functions in [`crate::store`], [`crate::capacity`] and
/// [`crate::seats`] so the SQL itself lives in one place and is shared by the
/// real store and by the `#[ignore]`d database tests that exercise it
/// directly.
pub struct PgTx<'a> {
    pub conn: &'a mut PgConnection,
}

impl<'a> Tx for PgTx<'a> {
    fn get_event(&mut self, id: Uuid) -> EngineResult<Event> {
        store::get_event(self.conn, id)
    }
    fn get_event_for_update(&mut self, id: Uuid) -> EngineResult<Event> {
        store::get_event_for_update(self.conn, id)
    }
    fn reserve_capacity(&mut self, event_id: Uuid, n: i32, expected_version: i32) -> EngineResult<Event> {
        CapacityController::reserve(self.conn, event_id, n, expected_version)
    }
    fn restore_capacity(&mut self, event_id: Uuid, n: i32) -> EngineResult<Event> {
        CapacityController::restore(self.conn, event_id, n)
    }
    fn set_event_active(&mut self, event_id: Uuid, is_active: bool) -> EngineResult<Event> {
        store::set_event_active(self.conn, event_id, is_active)
    }
    fn count_confirmed_bookings(&mut self, event_id: Uuid) -> EngineResult<i64> {
        store::count_confirmed_bookings(self.conn, event_id)
    }
    fn delete_event(&mut self, event_id: Uuid) -> EngineResult<()> {
        store::delete_event(self.conn, event_id)
    }

    fn hold_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>> {
        SeatController::hold_group(self.conn, event_id, seat_ids)
    }
    fn release_held_seats(&mut self, seat_ids: &[Uuid]) -> EngineResult<usize> {
        SeatController::release_held(self.conn, seat_ids)
    }
    fn hold_seats_for_booking(
        &mut self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        booking_id: Uuid,
    ) -> EngineResult<Vec<Seat>> {
        SeatController::hold_for_booking(self.conn, event_id, seat_ids, booking_id)
    }
    fn confirm_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()> {
        SeatController::confirm_for_booking(self.conn, booking_id)
    }
    fn release_seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<()> {
        SeatController::release_for_booking(self.conn, booking_id)
    }
    fn seats_for_booking(&mut self, booking_id: Uuid) -> EngineResult<Vec<Seat>> {
        SeatController::seats_for_booking(self.conn, booking_id)
    }
    fn seats_for_ids(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> EngineResult<Vec<Seat>> {
        use crate::schema::seats;
        use diesel::prelude::*;
        Ok(seats::table
            .filter(seats::id.eq_any(seat_ids))
            .filter(seats::event_id.eq(event_id))
            .load(self.conn)?)
    }
    fn sweep_expired_holds(&mut self, now: DateTime<Utc>, hold_ttl: ChronoDuration) -> EngineResult<usize> {
        SeatController::sweep_expired_holds(self.conn, now, hold_ttl)
    }
    fn list_available_seats_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<Seat>> {
        SeatController::list_available_ordered(self.conn, event_id)
    }

    fn insert_booking(&mut self, new: NewBooking) -> EngineResult<Booking> {
        store::insert_booking(self.conn, new)
    }
    fn get_booking(&mut self, id: Uuid) -> EngineResult<Booking> {
        store::get_booking(self.conn, id)
    }
    fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        payment_reference: Option<String>,
    ) -> EngineResult<Booking> {
        store::set_booking_status(self.conn, id, status, expires_at, payment_reference)
    }
    fn append_history(
        &mut self,
        booking_id: Uuid,
        action: BookingHistoryAction,
        details: Option<String>,
        performed_by: Option<Uuid>,
    ) -> EngineResult<()> {
        store::append_history(self.conn, booking_id, action, details, performed_by)
    }
    fn list_expired_bookings(&mut self, now: DateTime<Utc>, limit: i64) -> EngineResult<Vec<Booking>> {
        store::list_expired_bookings(self.conn, now, limit)
    }

    fn waitlist_active_entry_for_user(
        &mut self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> EngineResult<Option<WaitlistEntry>> {
        store::waitlist_active_entry_for_user(self.conn, user_id, event_id)
    }
    fn waitlist_max_position(&mut self, event_id: Uuid) -> EngineResult<i32> {
        store::waitlist_max_position(self.conn, event_id)
    }
    fn insert_waitlist_entry(&mut self, new: NewWaitlistEntry) -> EngineResult<WaitlistEntry> {
        store::insert_waitlist_entry(self.conn, new)
    }
    fn get_waitlist_entry(&mut self, id: Uuid) -> EngineResult<WaitlistEntry> {
        store::get_waitlist_entry(self.conn, id)
    }
    fn delete_waitlist_entry(&mut self, id: Uuid) -> EngineResult<()> {
        store::delete_waitlist_entry(self.conn, id)
    }
    fn decrement_positions_above(&mut self, event_id: Uuid, position: i32) -> EngineResult<()> {
        store::decrement_positions_above(self.conn, event_id, position)
    }
    fn active_waitlist_entries_ordered(&mut self, event_id: Uuid) -> EngineResult<Vec<WaitlistEntry>> {
        store::active_waitlist_entries_ordered(self.conn, event_id)
    }
    fn set_waitlist_status(&mut self, id: Uuid, status: WaitlistStatus) -> EngineResult<()> {
        store::set_waitlist_status(self.conn, id, status)
    }
    fn set_waitlist_status_and_position(
        &mut self,
        id: Uuid,
        status: WaitlistStatus,
        position: i32,
    ) -> EngineResult<()> {
        store::set_waitlist_status_and_position(self.conn, id, status, position)
    }
    fn list_stale_notified_waitlist(&mut self, cutoff: DateTime<Utc>) -> EngineResult<Vec<WaitlistEntry>> {
        store::list_stale_notified_waitlist(self.conn, cutoff)
    }

    fn list_active_future_events(&mut self, now: DateTime<Utc>) -> EngineResult<Vec<Event>> {
        store::list_active_future_events(self.conn, now)
    }
    fn count_bookings_in_window(
        &mut self,
        event_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<i64> {
        store::count_bookings_in_window(self.conn, event_id, from, to)
    }
    fn count_waitlist(&mut self, event_id: Uuid) -> EngineResult<i64> {
        store::count_waitlist(self.conn, event_id)
    }
    fn update_event_price(&mut self, event_id: Uuid, new_price: bigdecimal::BigDecimal) -> EngineResult<()> {
        store::update_event_price(self.conn, event_id, new_price)
    }
}

/// `TxStore` over the shared `r2d2` pool. `with_tx` is `PgConnection::transaction`,
/// matching §4.1's "commits on success, rolls back on any error" directly —
/// diesel already rolls back whenever the closure returns `Err`.
pub struct PgStore {
    pub pool: store::DbPool,
}

impl PgStore {
    pub fn new(pool: store::DbPool) -> Self {
        PgStore { pool }
    }
}

impl TxStore for PgStore {
    fn with_tx<T>(&self, f: impl FnOnce(&mut dyn Tx) -> EngineResult<T>) -> EngineResult<T> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| {
            let mut tx = PgTx { conn };
            f(&mut tx)
        })
    }
}
