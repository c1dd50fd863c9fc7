use crate::error::{EngineError, EngineResult};
use crate::models::*;
use crate::schema::{booking_history, bookings, events, waitlist};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use uuid::Uuid;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Builds the connection pool the whole engine shares, the same
/// `ConnectionManager<PgConnection>` + `r2d2::Pool` pairing the teacher wires
/// up in its own `initialize_db_pool`.
pub fn init_pool(database_url: &str, max_size: u32) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .expect("failed to create database connection pool")
}

pub fn get_event(conn: &mut PgConnection, id: Uuid) -> EngineResult<Event> {
    events::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or(EngineError::EventNotFound(id))
}

/// Row-locking read, used by callers that hold a transaction open across a
/// subsequent write to the same event (e.g. the dynamic-pricing tick).
pub fn get_event_for_update(conn: &mut PgConnection, id: Uuid) -> EngineResult<Event> {
    events::table
        .find(id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(EngineError::EventNotFound(id))
}

pub fn get_booking(conn: &mut PgConnection, id: Uuid) -> EngineResult<Booking> {
    bookings::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or(EngineError::BookingNotFound(id))
}

/// `Store.ListExpiredBookings(now, limit)` (§4.1): PENDING bookings whose
/// hold has already lapsed, oldest first so the sweep drains in FIFO order.
pub fn list_expired_bookings(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> EngineResult<Vec<Booking>> {
    use bookings::dsl;
    Ok(dsl::bookings
        .filter(dsl::status.eq(BookingStatus::Pending))
        .filter(dsl::expires_at.lt(now))
        .order(dsl::expires_at.asc())
        .limit(limit)
        .load(conn)?)
}

/// `Store.ListStaleNotifiedWaitlist(cutoff)` (§4.1): NOTIFIED entries whose
/// notification window has lapsed without conversion.
pub fn list_stale_notified_waitlist(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> EngineResult<Vec<WaitlistEntry>> {
    use waitlist::dsl;
    Ok(dsl::waitlist
        .filter(dsl::status.eq(WaitlistStatus::Notified))
        .filter(dsl::updated_at.lt(cutoff))
        .order(dsl::updated_at.asc())
        .load(conn)?)
}

pub fn list_active_future_events(conn: &mut PgConnection, now: DateTime<Utc>) -> EngineResult<Vec<Event>> {
    use events::dsl;
    Ok(dsl::events
        .filter(dsl::is_active.eq(true))
        .filter(dsl::event_date.gt(now))
        .load(conn)?)
}

pub fn append_history(
    conn: &mut PgConnection,
    booking_id: Uuid,
    action: BookingHistoryAction,
    details: Option<String>,
    performed_by: Option<Uuid>,
) -> EngineResult<()> {
    diesel::insert_into(booking_history::table)
        .values(NewBookingHistoryEntry {
            id: Uuid::new_v4(),
            booking_id,
            action,
            details,
            performed_by,
        })
        .execute(conn)?;
    Ok(())
}

pub fn count_bookings_in_window(
    conn: &mut PgConnection,
    event_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> EngineResult<i64> {
    use bookings::dsl;
    Ok(dsl::bookings
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::created_at.ge(from))
        .filter(dsl::created_at.lt(to))
        .filter(dsl::status.eq_any([BookingStatus::Confirmed, BookingStatus::Pending]))
        .count()
        .get_result(conn)?)
}

pub fn count_waitlist(conn: &mut PgConnection, event_id: Uuid) -> EngineResult<i64> {
    use waitlist::dsl;
    Ok(dsl::waitlist
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::status.eq_any([WaitlistStatus::Active, WaitlistStatus::Notified]))
        .count()
        .get_result(conn)?)
}

pub fn insert_booking(conn: &mut PgConnection, new: NewBooking) -> EngineResult<Booking> {
    Ok(diesel::insert_into(bookings::table)
        .values(&new)
        .get_result(conn)?)
}

/// Transitions a booking to a terminal or confirmed status. Clearing
/// `expires_at` here is what keeps §3's "terminal bookings always have
/// `expiresAt = None`" invariant from ever being expressed in two places.
pub fn set_booking_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: BookingStatus,
    expires_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
) -> EngineResult<Booking> {
    use bookings::dsl;
    let row: Booking = if let Some(reference) = payment_reference {
        diesel::update(dsl::bookings.filter(dsl::id.eq(id)))
            .set((
                dsl::status.eq(status),
                dsl::expires_at.eq(expires_at),
                dsl::payment_reference.eq(reference),
                dsl::updated_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)?
    } else {
        diesel::update(dsl::bookings.filter(dsl::id.eq(id)))
            .set((
                dsl::status.eq(status),
                dsl::expires_at.eq(expires_at),
                dsl::updated_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)?
    };
    Ok(row)
}

pub fn waitlist_active_entry_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    event_id: Uuid,
) -> EngineResult<Option<WaitlistEntry>> {
    use waitlist::dsl;
    Ok(dsl::waitlist
        .filter(dsl::user_id.eq(user_id))
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::status.eq_any([WaitlistStatus::Active, WaitlistStatus::Notified]))
        .first(conn)
        .optional()?)
}

pub fn waitlist_max_position(conn: &mut PgConnection, event_id: Uuid) -> EngineResult<i32> {
    use waitlist::dsl;
    let max: Option<i32> = dsl::waitlist
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::status.eq_any([WaitlistStatus::Active, WaitlistStatus::Notified]))
        .select(diesel::dsl::max(dsl::position))
        .first(conn)?;
    Ok(max.unwrap_or(0))
}

pub fn insert_waitlist_entry(
    conn: &mut PgConnection,
    new: NewWaitlistEntry,
) -> EngineResult<WaitlistEntry> {
    Ok(diesel::insert_into(waitlist::table)
        .values(&new)
        .get_result(conn)?)
}

pub fn get_waitlist_entry(conn: &mut PgConnection, id: Uuid) -> EngineResult<WaitlistEntry> {
    waitlist::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or(EngineError::WaitlistEntryNotFound(id))
}

pub fn delete_waitlist_entry(conn: &mut PgConnection, id: Uuid) -> EngineResult<()> {
    diesel::delete(waitlist::table.filter(waitlist::id.eq(id))).execute(conn)?;
    Ok(())
}

/// Closes the gap left by a departed entry, keeping positions dense over
/// `1..k` per §4.6.
pub fn decrement_positions_above(
    conn: &mut PgConnection,
    event_id: Uuid,
    position: i32,
) -> EngineResult<()> {
    use waitlist::dsl;
    diesel::update(
        dsl::waitlist
            .filter(dsl::event_id.eq(event_id))
            .filter(dsl::status.eq_any([WaitlistStatus::Active, WaitlistStatus::Notified]))
            .filter(dsl::position.gt(position)),
    )
    .set((
        dsl::position.eq(dsl::position - 1),
        dsl::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)?;
    Ok(())
}

/// Active entries for an event in strict FIFO order: ascending `position`,
/// ties (shouldn't occur, but §4.6 specifies the tiebreak) broken by
/// `created_at`.
pub fn active_waitlist_entries_ordered(
    conn: &mut PgConnection,
    event_id: Uuid,
) -> EngineResult<Vec<WaitlistEntry>> {
    use waitlist::dsl;
    Ok(dsl::waitlist
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::status.eq(WaitlistStatus::Active))
        .order((dsl::position.asc(), dsl::created_at.asc()))
        .for_update()
        .load(conn)?)
}

pub fn set_waitlist_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: WaitlistStatus,
) -> EngineResult<()> {
    diesel::update(waitlist::table.filter(waitlist::id.eq(id)))
        .set((
            waitlist::status.eq(status),
            waitlist::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn set_waitlist_status_and_position(
    conn: &mut PgConnection,
    id: Uuid,
    status: WaitlistStatus,
    position: i32,
) -> EngineResult<()> {
    diesel::update(waitlist::table.filter(waitlist::id.eq(id)))
        .set((
            waitlist::status.eq(status),
            waitlist::position.eq(position),
            waitlist::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Flips `Event.is_active` (§3 lifecycle: "may be deactivated, which
/// prevents new bookings"). Existing PENDING/CONFIRMED bookings are
/// untouched; `CreateBooking` is what actually enforces the resulting
/// `EventInactive` rejection.
pub fn set_event_active(conn: &mut PgConnection, event_id: Uuid, is_active: bool) -> EngineResult<Event> {
    use events::dsl;
    Ok(diesel::update(dsl::events.filter(dsl::id.eq(event_id)))
        .set((dsl::is_active.eq(is_active), dsl::updated_at.eq(diesel::dsl::now)))
        .get_result(conn)?)
}

pub fn count_confirmed_bookings(conn: &mut PgConnection, event_id: Uuid) -> EngineResult<i64> {
    use bookings::dsl;
    Ok(dsl::bookings
        .filter(dsl::event_id.eq(event_id))
        .filter(dsl::status.eq(BookingStatus::Confirmed))
        .count()
        .get_result(conn)?)
}

/// Deletes an event row, plus every seat and waitlist entry it owns (§3:
/// "an Event exclusively owns its Seats... and its Waitlist entries; their
/// lifetimes terminate with the event"). Callers MUST have already checked
/// `count_confirmed_bookings` is zero (§3: "deletion is refused if any
/// CONFIRMED booking exists"); this function has no opinion of its own, it
/// only removes rows. Bookings and their history are never touched here —
/// §3 is explicit that bookings are never deleted, confirmed ones are what
/// block reaching this function at all, and any already-terminal ones are
/// left as the permanent audit trail.
pub fn delete_event(conn: &mut PgConnection, event_id: Uuid) -> EngineResult<()> {
    use crate::schema::{seat_bookings, seats, waitlist};
    let seat_ids: Vec<Uuid> = seats::table
        .filter(seats::event_id.eq(event_id))
        .select(seats::id)
        .load(conn)?;
    diesel::delete(seat_bookings::table.filter(seat_bookings::seat_id.eq_any(&seat_ids))).execute(conn)?;
    diesel::delete(seats::table.filter(seats::event_id.eq(event_id))).execute(conn)?;
    diesel::delete(waitlist::table.filter(waitlist::event_id.eq(event_id))).execute(conn)?;
    diesel::delete(events::table.filter(events::id.eq(event_id))).execute(conn)?;
    Ok(())
}

pub fn update_event_price(
    conn: &mut PgConnection,
    event_id: Uuid,
    new_price: bigdecimal::BigDecimal,
) -> EngineResult<()> {
    diesel::update(events::table.filter(events::id.eq(event_id)))
        .set((
            events::price.eq(new_price),
            events::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    Ok(())
}
