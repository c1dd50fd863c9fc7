use crate::error::{EngineError, EngineResult};
use crate::models::Event;
use crate::schema::events;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

/// `CapacityController` (§4.5): wraps `event.available_capacity` under
/// optimistic concurrency. The version-CAS predicate, not the caller's best
/// effort with `LockService`, is the sole guarantor of no-oversell.
pub struct CapacityController;

impl CapacityController {
    /// `Reserve(eventId, n, expectedVersion)`. Attempts the CAS update in one
    /// round trip; on zero rows affected it rereads the row to tell a stale
    /// version apart from a definitive capacity shortfall, so the caller's
    /// retry loop knows whether retrying can possibly help.
    pub fn reserve(
        conn: &mut PgConnection,
        event_id: Uuid,
        n: i32,
        expected_version: i32,
    ) -> EngineResult<Event> {
        let updated = diesel::update(
            events::table
                .filter(events::id.eq(event_id))
                .filter(events::version.eq(expected_version))
                .filter(events::available_capacity.ge(n)),
        )
        .set((
            events::available_capacity.eq(events::available_capacity - n),
            events::version.eq(events::version + 1),
            events::updated_at.eq(diesel::dsl::now),
        ))
        .get_result::<Event>(conn)
        .optional()?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let current = events::table
                    .find(event_id)
                    .first::<Event>(conn)
                    .optional()?
                    .ok_or(EngineError::EventNotFound(event_id))?;
                if current.version != expected_version {
                    Err(EngineError::StaleVersion(event_id))
                } else {
                    Err(EngineError::InsufficientCapacity(event_id))
                }
            }
        }
    }

    /// `Restore(eventId, n)`: unconditional CAS loop that increases
    /// `available_capacity` by `n`, capped at `total_capacity`. Unlike
    /// `reserve`, this never fails on contention — it just retries against
    /// whatever version it observes, since restoring capacity can never
    /// itself violate the invariant.
    pub fn restore(conn: &mut PgConnection, event_id: Uuid, n: i32) -> EngineResult<Event> {
        loop {
            let current = events::table
                .find(event_id)
                .first::<Event>(conn)
                .optional()?
                .ok_or(EngineError::EventNotFound(event_id))?;

            let new_available = (current.available_capacity + n).min(current.total_capacity);

            let updated = diesel::update(
                events::table
                    .filter(events::id.eq(event_id))
                    .filter(events::version.eq(current.version)),
            )
            .set((
                events::available_capacity.eq(new_available),
                events::version.eq(events::version + 1),
                events::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Event>(conn)
            .optional()?;

            if let Some(event) = updated {
                return Ok(event);
            }
            // Another writer won the race on this row within the same
            // transaction scope; reread and try again with the fresh version.
        }
    }
}
