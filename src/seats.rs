use crate::error::{EngineError, EngineResult};
use crate::models::{Seat, SeatBooking, SeatStatus};
use crate::schema::{seat_bookings, seats};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

/// `SeatController` (§4.3): atomic, all-or-nothing state transitions on sets
/// of seats. Every public function sorts its seat-id set first so that two
/// calls touching overlapping seats always acquire row locks in the same
/// order, the way §4.3 requires to avoid deadlocks.
pub struct SeatController;

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids.dedup();
    ids
}

fn lock_seats_for_event(
    conn: &mut PgConnection,
    event_id: Uuid,
    seat_ids: &[Uuid],
) -> EngineResult<Vec<Seat>> {
    let rows: Vec<Seat> = seats::table
        .filter(seats::id.eq_any(seat_ids))
        .filter(seats::event_id.eq(event_id))
        .order(seats::id.asc())
        .for_update()
        .load(conn)?;

    if rows.len() != seat_ids.len() {
        let found: std::collections::HashSet<Uuid> = rows.iter().map(|s| s.id).collect();
        let missing = seat_ids
            .iter()
            .find(|id| !found.contains(id))
            .copied()
            .expect("length mismatch implies a missing id");
        return Err(EngineError::SeatNotFound(missing));
    }
    Ok(rows)
}

impl SeatController {
    /// `HoldGroup(seatIds, ttl)`: `AVAILABLE -> HELD` for every seat, or no
    /// change at all. The hold's expiry is implicit in `updated_at` plus the
    /// configured hold TTL (§3); there is no separate expiry column.
    pub fn hold_group(
        conn: &mut PgConnection,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> EngineResult<Vec<Seat>> {
        let ids = sorted(seat_ids.to_vec());
        let rows = lock_seats_for_event(conn, event_id, &ids)?;

        if let Some(bad) = rows.iter().find(|s| s.status != SeatStatus::Available) {
            return Err(EngineError::SeatNotAvailable {
                seat_id: bad.id,
                status: format!("{:?}", bad.status),
            });
        }

        diesel::update(seats::table.filter(seats::id.eq_any(&ids)))
            .set((
                seats::status.eq(SeatStatus::Held),
                seats::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

        Ok(seats::table.filter(seats::id.eq_any(&ids)).load(conn)?)
    }

    /// `ReleaseHeld(seatIds)`: `HELD -> AVAILABLE`; non-held seats in the set
    /// are silently left alone rather than erroring, per §4.3.
    pub fn release_held(conn: &mut PgConnection, seat_ids: &[Uuid]) -> EngineResult<usize> {
        let ids = sorted(seat_ids.to_vec());
        let affected = diesel::update(
            seats::table
                .filter(seats::id.eq_any(&ids))
                .filter(seats::status.eq(SeatStatus::Held)),
        )
        .set((
            seats::status.eq(SeatStatus::Available),
            seats::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
        Ok(affected)
    }

    /// `ReleaseBooked(bookingId)`: frees every seat linked to the booking and
    /// deletes the `SeatBooking` rows. The distilled reference implementation
    /// only *selects* these rows instead of deleting them; that is a defect
    /// there, not a behavior to preserve — §4.3 is explicit that the rows
    /// must be removed.
    pub fn release_booked(conn: &mut PgConnection, booking_id: Uuid) -> EngineResult<()> {
        let seat_ids: Vec<Uuid> = seat_bookings::table
            .filter(seat_bookings::booking_id.eq(booking_id))
            .select(seat_bookings::seat_id)
            .load(conn)?;

        if !seat_ids.is_empty() {
            diesel::update(
                seats::table
                    .filter(seats::id.eq_any(&seat_ids))
                    .filter(seats::status.eq(SeatStatus::Booked)),
            )
            .set((
                seats::status.eq(SeatStatus::Available),
                seats::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
        }

        diesel::delete(seat_bookings::table.filter(seat_bookings::booking_id.eq(booking_id)))
            .execute(conn)?;

        Ok(())
    }

    /// `SweepExpiredHolds(now)`: transitions every seat held past the
    /// configured TTL back to `AVAILABLE`, returning the count freed.
    pub fn sweep_expired_holds(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
        hold_ttl: ChronoDuration,
    ) -> EngineResult<usize> {
        let cutoff = now - hold_ttl;
        let affected = diesel::update(
            seats::table
                .filter(seats::status.eq(SeatStatus::Held))
                .filter(seats::updated_at.lt(cutoff)),
        )
        .set((
            seats::status.eq(SeatStatus::Available),
            seats::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
        Ok(affected)
    }

    pub fn seats_for_booking(conn: &mut PgConnection, booking_id: Uuid) -> EngineResult<Vec<Seat>> {
        let seat_ids: Vec<Uuid> = seat_bookings::table
            .filter(seat_bookings::booking_id.eq(booking_id))
            .select(seat_bookings::seat_id)
            .load(conn)?;
        Ok(seats::table.filter(seats::id.eq_any(seat_ids)).load(conn)?)
    }

    /// Booking-scoped seat lifecycle: holds a group and immediately records
    /// which booking they belong to. Distinct from `hold_group` (used by the
    /// standalone `HoldSeats` surface in §6.1, which has no booking to link
    /// to) so that a still-`PENDING` booking's `Cancel` can find its seats
    /// through `seat_bookings` the same way a `CONFIRMED` one does, instead
    /// of needing the caller to remember the seat ids out of band.
    pub fn hold_for_booking(
        conn: &mut PgConnection,
        event_id: Uuid,
        seat_ids: &[Uuid],
        booking_id: Uuid,
    ) -> EngineResult<Vec<Seat>> {
        let rows = Self::hold_group(conn, event_id, seat_ids)?;
        let ids = sorted(seat_ids.to_vec());
        let bindings: Vec<SeatBooking> = ids.iter().map(|&seat_id| SeatBooking { booking_id, seat_id }).collect();
        diesel::insert_into(seat_bookings::table)
            .values(&bindings)
            .execute(conn)?;
        Ok(rows)
    }

    /// §4.3's `BookHeldOrAvailable(seatIds, bookingId)` as it's actually
    /// reached: every seat this engine ever books was already linked via
    /// `hold_for_booking` at create time, so this only ever sees `HELD`
    /// seats and never needs to write a fresh `SeatBooking` row (it already
    /// exists). `Confirm`'s seat-side effect: `HELD -> BOOKED`.
    pub fn confirm_for_booking(conn: &mut PgConnection, booking_id: Uuid) -> EngineResult<()> {
        let seat_ids: Vec<Uuid> = seat_bookings::table
            .filter(seat_bookings::booking_id.eq(booking_id))
            .select(seat_bookings::seat_id)
            .load(conn)?;
        diesel::update(
            seats::table
                .filter(seats::id.eq_any(&seat_ids))
                .filter(seats::status.eq(SeatStatus::Held)),
        )
        .set((
            seats::status.eq(SeatStatus::Booked),
            seats::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
        Ok(())
    }

    /// `Cancel`/`Expire`'s seat-side effect, for either a `PENDING`
    /// (seats `HELD`) or `CONFIRMED` (seats `BOOKED`) booking: frees every
    /// linked seat and deletes the `SeatBooking` rows.
    pub fn release_for_booking(conn: &mut PgConnection, booking_id: Uuid) -> EngineResult<()> {
        let seat_ids: Vec<Uuid> = seat_bookings::table
            .filter(seat_bookings::booking_id.eq(booking_id))
            .select(seat_bookings::seat_id)
            .load(conn)?;
        if !seat_ids.is_empty() {
            diesel::update(
                seats::table
                    .filter(seats::id.eq_any(&seat_ids))
                    .filter(seats::status.eq_any([SeatStatus::Held, SeatStatus::Booked])),
            )
            .set((
                seats::status.eq(SeatStatus::Available),
                seats::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
        }
        diesel::delete(seat_bookings::table.filter(seat_bookings::booking_id.eq(booking_id)))
            .execute(conn)?;
        Ok(())
    }

    /// `AVAILABLE` seats for an event in `(section, row, number)` order — the
    /// adjacency notion §9's bulk-booking Open Question resolves on for
    /// auto-assignment when a caller requests a quantity without naming
    /// specific seats. Row-locked so two concurrent auto-assignments don't
    /// pick the same seat before either holds it.
    pub fn list_available_ordered(conn: &mut PgConnection, event_id: Uuid) -> EngineResult<Vec<Seat>> {
        Ok(seats::table
            .filter(seats::event_id.eq(event_id))
            .filter(seats::status.eq(SeatStatus::Available))
            .order((seats::section.asc(), seats::row_label.asc(), seats::number.asc()))
            .for_update()
            .load(conn)?)
    }
}
