//! `WaitlistCoordinator` (§4.6): the per-event FIFO, its notification
//! window, and the capacity handoff from cancellations/expirations.
//!
//! Every operation here takes a `&mut dyn Tx` rather than owning a
//! connection — it is always called from inside the same transaction as the
//! cancellation/expiration (or Scheduler tick) that triggered it, per §5's
//! "Waitlist offers are processed in a single logical stream per event."
use crate::error::{EngineError, EngineResult};
use crate::models::{NewWaitlistEntry, WaitlistEntry, WaitlistStatus};
use crate::notify::NotificationIntent;
use crate::tx::Tx;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct WaitlistCoordinator;

impl WaitlistCoordinator {
    /// `Join(userId, eventId, requestedQuantity)`. Rejected if the event
    /// isn't effectively sold out, or the user already holds a non-terminal
    /// entry (enforced here as well as by the partial unique index, so the
    /// in-memory test store gets the same guarantee without a database).
    pub fn join(
        tx: &mut dyn Tx,
        user_id: Uuid,
        event_id: Uuid,
        requested_quantity: i32,
        available_capacity: i32,
    ) -> EngineResult<WaitlistEntry> {
        if available_capacity >= requested_quantity {
            return Err(EngineError::EventNotSoldOut(event_id));
        }
        if tx.waitlist_active_entry_for_user(user_id, event_id)?.is_some() {
            return Err(EngineError::AlreadyOnWaitlist { user_id, event_id });
        }

        let position = tx.waitlist_max_position(event_id)? + 1;
        tx.insert_waitlist_entry(NewWaitlistEntry {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            requested_quantity,
            position,
        })
    }

    /// `Leave(userId, eventId)`: deletes the entry and compacts positions.
    pub fn leave(tx: &mut dyn Tx, user_id: Uuid, event_id: Uuid) -> EngineResult<bool> {
        let entry = match tx.waitlist_active_entry_for_user(user_id, event_id)? {
            Some(e) => e,
            None => return Ok(false),
        };
        tx.delete_waitlist_entry(entry.id)?;
        tx.decrement_positions_above(event_id, entry.position)?;
        Ok(true)
    }

    /// `OfferCapacity(eventId, availableQuantity)`: walks active entries in
    /// ascending position; **strict head-of-line** (§4.6, Open Question
    /// resolved in SPEC_FULL/DESIGN) — stops at the first entry whose
    /// `requestedQuantity` exceeds what remains, rather than skipping past it
    /// to satisfy a smaller entry behind it.
    pub fn offer_capacity(
        tx: &mut dyn Tx,
        event_id: Uuid,
        available_quantity: i32,
        notification_deadline: DateTime<Utc>,
    ) -> EngineResult<Vec<NotificationIntent>> {
        let mut remaining = available_quantity;
        let mut intents = Vec::new();

        for entry in tx.active_waitlist_entries_ordered(event_id)? {
            if entry.requested_quantity > remaining {
                break;
            }
            tx.set_waitlist_status(entry.id, WaitlistStatus::Notified)?;
            remaining -= entry.requested_quantity;
            intents.push(NotificationIntent::WaitlistAvailability {
                entry_id: entry.id,
                available_quantity: entry.requested_quantity,
                deadline: notification_deadline,
            });
        }

        Ok(intents)
    }

    /// `ExpireNotifications(cutoff)`: every `NOTIFIED` entry older than
    /// `cutoff` returns to `ACTIVE` at the tail. Never touches `CONVERTED`
    /// entries. Silent — no notification is emitted on this path (§9 Open
    /// Question, resolved: matches the reference implementation, which emits
    /// nothing here either).
    pub fn expire_notifications(tx: &mut dyn Tx, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        let stale = tx.list_stale_notified_waitlist(cutoff)?;
        let mut requeued = 0;
        for entry in stale {
            let position = tx.waitlist_max_position(entry.event_id)? + 1;
            tx.set_waitlist_status_and_position(entry.id, WaitlistStatus::Active, position)?;
            requeued += 1;
        }
        Ok(requeued)
    }

    /// `Convert(entryId)`: `NOTIFIED -> CONVERTED`, then compacts positions
    /// as `Leave` does (the entry leaves the non-terminal pool for good).
    pub fn convert(tx: &mut dyn Tx, entry_id: Uuid) -> EngineResult<()> {
        let entry = tx.get_waitlist_entry(entry_id)?;
        if entry.status != WaitlistStatus::Notified {
            return Err(EngineError::Validation(format!(
                "waitlist entry {entry_id} is not NOTIFIED"
            )));
        }
        tx.set_waitlist_status(entry_id, WaitlistStatus::Converted)?;
        tx.decrement_positions_above(entry.event_id, entry.position)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::NewEvent;
    use crate::tx::TxStore;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn seed_event(store: &MemoryStore, total: i32, available: i32) -> Uuid {
        let id = Uuid::new_v4();
        store.seed_event(NewEvent {
            id,
            name: "Waitlist Test".into(),
            description: None,
            venue: "Hall".into(),
            event_date: Utc::now() + chrono::Duration::days(10),
            total_capacity: total,
            available_capacity: available,
            price: BigDecimal::from_str("10.00").unwrap(),
            has_seat_selection: false,
        });
        id
    }

    #[test]
    fn offer_capacity_blocks_at_unsatisfiable_head() {
        let store = MemoryStore::new();
        let event_id = seed_event(&store, 10, 0);

        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let w3 = Uuid::new_v4();

        store
            .with_tx(|tx| {
                WaitlistCoordinator::join(tx, w1, event_id, 2, 0)?;
                WaitlistCoordinator::join(tx, w2, event_id, 1, 0)?;
                WaitlistCoordinator::join(tx, w3, event_id, 2, 0)?;
                Ok(())
            })
            .unwrap();

        let intents = store
            .with_tx(|tx| WaitlistCoordinator::offer_capacity(tx, event_id, 3, Utc::now()))
            .unwrap();

        // W1 (qty 2) then W2 (qty 1) notified; remaining=0 so W3 (qty 2) blocks.
        assert_eq!(intents.len(), 2);

        let entries = store
            .with_tx(|tx| tx.active_waitlist_entries_ordered(event_id))
            .unwrap();
        // only W3 remains ACTIVE
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, w3);
    }

    #[test]
    fn leave_compacts_positions() {
        let store = MemoryStore::new();
        let event_id = seed_event(&store, 10, 0);
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let w3 = Uuid::new_v4();

        store
            .with_tx(|tx| {
                WaitlistCoordinator::join(tx, w1, event_id, 1, 0)?;
                WaitlistCoordinator::join(tx, w2, event_id, 1, 0)?;
                WaitlistCoordinator::join(tx, w3, event_id, 1, 0)?;
                WaitlistCoordinator::leave(tx, w2, event_id)?;
                Ok(())
            })
            .unwrap();

        let entries = store
            .with_tx(|tx| tx.active_waitlist_entries_ordered(event_id))
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, w1);
        assert_eq!(entries[0].position, 1);
        assert_eq!(entries[1].user_id, w3);
        assert_eq!(entries[1].position, 2);
    }

    #[test]
    fn expire_notifications_requeues_to_tail_not_converted() {
        let store = MemoryStore::new();
        let event_id = seed_event(&store, 10, 0);
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();

        let (e1, e2) = store
            .with_tx(|tx| {
                let e1 = WaitlistCoordinator::join(tx, w1, event_id, 1, 0)?;
                let e2 = WaitlistCoordinator::join(tx, w2, event_id, 1, 0)?;
                Ok((e1, e2))
            })
            .unwrap();

        store
            .with_tx(|tx| {
                tx.set_waitlist_status(e1.id, WaitlistStatus::Notified)?;
                tx.set_waitlist_status(e2.id, WaitlistStatus::Converted)?;
                Ok(())
            })
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let requeued = store
            .with_tx(|tx| WaitlistCoordinator::expire_notifications(tx, cutoff))
            .unwrap();
        assert_eq!(requeued, 1);

        let e1_after = store.with_tx(|tx| tx.get_waitlist_entry(e1.id)).unwrap();
        assert_eq!(e1_after.status, WaitlistStatus::Active);
        let e2_after = store.with_tx(|tx| tx.get_waitlist_entry(e2.id)).unwrap();
        assert_eq!(e2_after.status, WaitlistStatus::Converted);
    }
}
