//! `BookingEngine` (§4.4): the central orchestrator. Every public method
//! acquires whatever `Locker` keys are relevant as a best-effort optimization
//! (§4.2: "lock failure is NEVER required for correctness"), then runs its
//! transactional body on a blocking thread via `tokio::task::spawn_blocking`
//! — the teacher does the equivalent with `actix_web::web::block` around
//! every `diesel` call; this crate generalizes that same "never block the
//! executor on a synchronous DB call" rule to a plain `tokio` binary with no
//! web framework underneath it.
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::lock::Locker;
use crate::models::{Booking, BookingHistoryAction, BookingStatus, Event, NewBooking, WaitlistEntry};
use crate::notify::{NotificationIntent, NotificationSink};
use crate::retry::retry_transient;
use crate::tx::{Tx, TxStore};
use crate::waitlist::WaitlistCoordinator;
use bigdecimal::BigDecimal;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct BookingEngine {
    store: Arc<dyn TxStore>,
    locker: Arc<dyn Locker>,
    notifier: Arc<dyn NotificationSink>,
    config: Config,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn TxStore>,
        locker: Arc<dyn Locker>,
        notifier: Arc<dyn NotificationSink>,
        config: Config,
    ) -> Self {
        BookingEngine {
            store,
            locker,
            notifier,
            config,
        }
    }

    /// Hands `intent` to the sink on its own task so a slow or unreachable
    /// broker never delays the caller (§6.4: "MUST NOT block a booking
    /// commit on delivery outcome").
    fn emit(&self, intent: NotificationIntent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.publish(intent).await;
        });
    }

    fn join_err(op: &str, e: tokio::task::JoinError) -> EngineError {
        EngineError::Internal(format!("{op} task panicked or was cancelled: {e}"))
    }

    /// Lets the Scheduler's PriceTick hand off an `EventUpdate` intent
    /// through the same fire-and-forget path bookings use.
    pub fn emit_event_update(&self, event_id: Uuid, message: String) {
        self.emit(NotificationIntent::EventUpdate { event_id, message });
    }

    /// `CreateBooking` (§4.4.1).
    pub async fn create(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
        seat_ids: Option<Vec<Uuid>>,
    ) -> EngineResult<Booking> {
        if let Some(ids) = &seat_ids {
            if ids.len() as i32 != quantity {
                return Err(EngineError::Validation(
                    "seatIds length must equal quantity".into(),
                ));
            }
        }

        let lock_key = format!("booking:{event_id}:{user_id}");
        let token = self
            .locker
            .acquire(&lock_key, Duration::from_secs(30), None)
            .await?;

        let hold_timeout = ChronoDuration::from_std(self.config.booking_hold_timeout)
            .unwrap_or_else(|_| ChronoDuration::minutes(15));

        let max_booking_quantity = self.config.max_booking_quantity;
        let store = Arc::clone(&self.store);
        let result = retry_transient(&self.config.retry, move || {
            let store = Arc::clone(&store);
            let seat_ids = seat_ids.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    store.with_tx(|tx| {
                        Self::create_once(
                            tx,
                            user_id,
                            event_id,
                            quantity,
                            max_booking_quantity,
                            seat_ids.clone(),
                            hold_timeout,
                        )
                    })
                })
                .await
                .unwrap_or_else(|e| Err(Self::join_err("create", e)))
            }
        })
        .await;

        if let Some(token) = token {
            let locker = Arc::clone(&self.locker);
            tokio::spawn(async move {
                let _ = locker.release(&lock_key, token).await;
            });
        }

        result
    }

    fn create_once(
        tx: &mut dyn Tx,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
        max_quantity: i32,
        seat_ids: Option<Vec<Uuid>>,
        hold_timeout: ChronoDuration,
    ) -> EngineResult<Booking> {
        let event = tx.get_event(event_id)?;
        if !event.is_active || event.event_date <= Utc::now() {
            return Err(EngineError::EventInactive(event_id));
        }
        if seat_ids.is_some() && !event.has_seat_selection {
            return Err(EngineError::SeatSelectionUnsupported(event_id));
        }
        if quantity < 1 || quantity > max_quantity {
            return Err(EngineError::InvalidQuantity(format!(
                "quantity {quantity} outside [1,{max_quantity}]"
            )));
        }
        if let Some(ids) = &seat_ids {
            let found = tx.seats_for_ids(event_id, ids)?;
            let found_ids: HashSet<Uuid> = found.iter().map(|s| s.id).collect();
            if let Some(missing) = ids.iter().find(|id| !found_ids.contains(id)) {
                return Err(EngineError::SeatNotFound(*missing));
            }
        }

        // The CAS-guarded counter is the sole oversell guard (§4.5) and is
        // kept in lockstep with seat state regardless of whether this event
        // uses seat selection — §3's invariant ties `availableCapacity` to
        // both non-terminal bookings and HELD/BOOKED seats, so both paths
        // below always go through `reserve_capacity` too.
        tx.reserve_capacity(event_id, quantity, event.version)?;

        // Seat ids are either caller-supplied, absent (general admission),
        // or absent on a seat-selection event — in which case §9's bulk
        // auto-assignment resolution picks the lexicographically first
        // available seats.
        let resolved_seat_ids = match seat_ids {
            Some(ids) => Some(ids),
            None if event.has_seat_selection => {
                let candidates = tx.list_available_seats_ordered(event_id)?;
                if (candidates.len() as i32) < quantity {
                    return Err(EngineError::Internal(format!(
                        "event {event_id} has available capacity but fewer than {quantity} AVAILABLE seats"
                    )));
                }
                Some(
                    candidates
                        .into_iter()
                        .take(quantity as usize)
                        .map(|s| s.id)
                        .collect::<Vec<_>>(),
                )
            }
            None => None,
        };

        let booking_id = Uuid::new_v4();
        let total_amount = match &resolved_seat_ids {
            Some(ids) => {
                let held = tx.hold_seats_for_booking(event_id, ids, booking_id)?;
                held.into_iter().fold(BigDecimal::from(0), |acc, s| acc + s.price)
            }
            None => event.price.clone() * BigDecimal::from(quantity),
        };

        let expires_at = Utc::now() + hold_timeout;
        let booking = tx.insert_booking(NewBooking {
            id: booking_id,
            user_id,
            event_id,
            quantity,
            total_amount,
            status: BookingStatus::Pending,
            expires_at: Some(expires_at),
        })?;
        tx.append_history(booking.id, BookingHistoryAction::Created, None, Some(user_id))?;
        Ok(booking)
    }

    /// `ConfirmBooking` (§4.4.2).
    pub async fn confirm(&self, booking_id: Uuid, payment_reference: Option<String>) -> EngineResult<Booking> {
        let store = Arc::clone(&self.store);
        let booking = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| Self::confirm_once(tx, booking_id, payment_reference.clone()))
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("confirm", e)))?;

        self.emit(NotificationIntent::BookingConfirmation { booking_id: booking.id });
        Ok(booking)
    }

    fn confirm_once(tx: &mut dyn Tx, booking_id: Uuid, payment_reference: Option<String>) -> EngineResult<Booking> {
        let booking = tx.get_booking(booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Err(EngineError::InvalidBookingState {
                booking_id,
                current: format!("{:?}", booking.status),
            });
        }
        if booking.expires_at.map(|e| Utc::now() >= e).unwrap_or(true) {
            return Err(EngineError::BookingExpired(booking_id));
        }

        if !tx.seats_for_booking(booking_id)?.is_empty() {
            tx.confirm_seats_for_booking(booking_id)?;
        }

        let updated = tx.set_booking_status(booking_id, BookingStatus::Confirmed, None, payment_reference.clone())?;
        tx.append_history(booking_id, BookingHistoryAction::Confirmed, payment_reference, None)?;
        Ok(updated)
    }

    /// `CancelBooking` (§4.4.3). Not idempotent — a second cancel of an
    /// already-terminal booking surfaces `InvalidBookingState` (§8 scenario
    /// 6).
    pub async fn cancel(&self, booking_id: Uuid, reason: Option<String>) -> EngineResult<Booking> {
        let store = Arc::clone(&self.store);
        let notify_window = ChronoDuration::from_std(self.config.waitlist_notification_timeout)
            .unwrap_or_else(|_| ChronoDuration::hours(24));

        let (booking, offer_intents) = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| {
                Self::terminate_once(
                    tx,
                    booking_id,
                    reason.clone(),
                    BookingStatus::Cancelled,
                    BookingHistoryAction::Cancelled,
                    notify_window,
                )
            })
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("cancel", e)))?;

        self.emit(NotificationIntent::BookingCancellation { booking_id: booking.id });
        for intent in offer_intents {
            self.emit(intent);
        }
        Ok(booking)
    }

    /// `ExpireBooking` (§4.4.4), driven by the Scheduler or an admin action.
    /// Idempotent on a non-`PENDING` booking: already-terminal or already-
    /// confirmed bookings are returned unchanged rather than erroring, since
    /// the Scheduler may race a user's own confirm/cancel.
    pub async fn expire(&self, booking_id: Uuid) -> EngineResult<Booking> {
        let store = Arc::clone(&self.store);
        let notify_window = ChronoDuration::from_std(self.config.waitlist_notification_timeout)
            .unwrap_or_else(|_| ChronoDuration::hours(24));

        let (booking, offer_intents) = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| Self::expire_once(tx, booking_id, notify_window))
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("expire", e)))?;

        for intent in offer_intents {
            self.emit(intent);
        }
        Ok(booking)
    }

    fn expire_once(
        tx: &mut dyn Tx,
        booking_id: Uuid,
        notify_window: ChronoDuration,
    ) -> EngineResult<(Booking, Vec<NotificationIntent>)> {
        let booking = tx.get_booking(booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Ok((booking, Vec::new()));
        }
        Self::terminate_once(
            tx,
            booking_id,
            None,
            BookingStatus::Expired,
            BookingHistoryAction::Expired,
            notify_window,
        )
    }

    /// Shared machinery behind Cancel/Expire: release whatever inventory the
    /// booking held, restore event capacity, close the booking out, and hand
    /// the freed capacity to the waitlist.
    fn terminate_once(
        tx: &mut dyn Tx,
        booking_id: Uuid,
        reason: Option<String>,
        terminal_status: BookingStatus,
        history_action: BookingHistoryAction,
        notify_window: ChronoDuration,
    ) -> EngineResult<(Booking, Vec<NotificationIntent>)> {
        let booking = tx.get_booking(booking_id)?;
        if booking.status != BookingStatus::Pending && booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidBookingState {
                booking_id,
                current: format!("{:?}", booking.status),
            });
        }

        if !tx.seats_for_booking(booking_id)?.is_empty() {
            tx.release_seats_for_booking(booking_id)?;
        }
        tx.restore_capacity(booking.event_id, booking.quantity)?;

        let updated = tx.set_booking_status(booking_id, terminal_status, None, None)?;
        tx.append_history(booking_id, history_action, reason, None)?;

        let event = tx.get_event(booking.event_id)?;
        let deadline = Utc::now() + notify_window;
        let offer_intents =
            WaitlistCoordinator::offer_capacity(tx, booking.event_id, event.available_capacity, deadline)?;

        Ok((updated, offer_intents))
    }

    /// `HoldSeats` (§6.1): a standalone hold not attached to any booking, for
    /// a seat-map "hold while the user checks out" interaction.
    pub async fn hold_seats(
        &self,
        event_id: Uuid,
        seat_ids: Vec<Uuid>,
        hold_duration: Duration,
    ) -> EngineResult<(Vec<Uuid>, chrono::DateTime<Utc>)> {
        if seat_ids.is_empty() {
            return Err(EngineError::Validation("seatIds must not be empty".into()));
        }
        if hold_duration < Duration::from_secs(60) || hold_duration > Duration::from_secs(3600) {
            return Err(EngineError::Validation(
                "holdDurationMinutes must be within [1,60]".into(),
            ));
        }

        let store = Arc::clone(&self.store);
        let held = tokio::task::spawn_blocking(move || store.with_tx(|tx| tx.hold_seats(event_id, &seat_ids)))
            .await
            .unwrap_or_else(|e| Err(Self::join_err("hold_seats", e)))?;

        let expires_at = Utc::now()
            + ChronoDuration::from_std(hold_duration).unwrap_or_else(|_| ChronoDuration::minutes(15));
        Ok((held.into_iter().map(|s| s.id).collect(), expires_at))
    }

    /// `ReleaseHeldSeats` (§6.1).
    pub async fn release_held_seats(&self, seat_ids: Vec<Uuid>) -> EngineResult<usize> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.with_tx(|tx| tx.release_held_seats(&seat_ids)))
            .await
            .unwrap_or_else(|e| Err(Self::join_err("release_held_seats", e)))
    }

    /// `JoinWaitlist` (§6.1).
    pub async fn join_waitlist(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        requested_quantity: i32,
    ) -> EngineResult<WaitlistEntry> {
        if requested_quantity < 1 {
            return Err(EngineError::InvalidQuantity(
                "requestedQuantity must be >= 1".into(),
            ));
        }
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| {
                let event = tx.get_event(event_id)?;
                if !event.is_active {
                    return Err(EngineError::EventInactive(event_id));
                }
                WaitlistCoordinator::join(tx, user_id, event_id, requested_quantity, event.available_capacity)
            })
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("join_waitlist", e)))
    }

    /// `LeaveWaitlist` (§6.1).
    pub async fn leave_waitlist(&self, user_id: Uuid, event_id: Uuid) -> EngineResult<bool> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.with_tx(|tx| WaitlistCoordinator::leave(tx, user_id, event_id)))
            .await
            .unwrap_or_else(|e| Err(Self::join_err("leave_waitlist", e)))
    }

    /// Deactivates an event (§3 lifecycle: "may be deactivated, which
    /// prevents new bookings"). Existing PENDING/CONFIRMED bookings are left
    /// alone; `create`'s own precondition check is what then rejects further
    /// `CreateBooking` calls against it. Emits `EventCancellation` when the
    /// event still has non-terminal bookings at the moment it's deactivated
    /// — §6.4 marks this notification "optional to the core's correctness",
    /// so its absence would not itself be a defect, but it is the natural
    /// trigger for it.
    pub async fn deactivate_event(&self, event_id: Uuid) -> EngineResult<Event> {
        let store = Arc::clone(&self.store);
        let (event, has_pending_bookings) = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| {
                let event = tx.set_event_active(event_id, false)?;
                let confirmed = tx.count_confirmed_bookings(event_id)?;
                Ok((event, confirmed > 0))
            })
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("deactivate_event", e)))?;

        if has_pending_bookings {
            self.emit(NotificationIntent::EventCancellation { event_id });
        }
        Ok(event)
    }

    /// Deletes an event outright (§3: "deletion is refused if any CONFIRMED
    /// booking exists"). Unlike `deactivate_event`, this is irreversible and
    /// reclaims the event's owned seats and waitlist entries; its bookings
    /// and their history rows are never deleted (§3: "Bookings... are never
    /// deleted"), so a `CONFIRMED` booking is exactly what must block it.
    pub async fn delete_event(&self, event_id: Uuid) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| {
                tx.get_event(event_id)?;
                if tx.count_confirmed_bookings(event_id)? > 0 {
                    return Err(EngineError::EventHasBookings(event_id));
                }
                tx.delete_event(event_id)
            })
        })
        .await
        .unwrap_or_else(|e| Err(Self::join_err("delete_event", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::memory::MemoryLockService;
    use crate::memory::MemoryStore;
    use crate::models::{NewEvent, NewSeat};
    use crate::notify::LoggingNotificationSink;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            database_pool_size: 1,
            amqp_url: None,
            booking_hold_timeout: Duration::from_secs(900),
            max_booking_quantity: 10,
            waitlist_notification_timeout: Duration::from_secs(3600 * 24),
            price_tick_interval: Duration::from_secs(600),
            scheduler: crate::config::SchedulerCadences {
                expire_bookings: Duration::from_secs(60),
                sweep_holds: Duration::from_secs(60),
                expire_waitlist: Duration::from_secs(3600),
            },
            retry: crate::config::RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            lock_default_ttl: Duration::from_secs(30),
        }
    }

    fn make_engine(store: Arc<MemoryStore>) -> BookingEngine {
        BookingEngine::new(
            store,
            Arc::new(MemoryLockService::new()),
            Arc::new(LoggingNotificationSink),
            test_config(),
        )
    }

    fn seed_event(store: &MemoryStore, total: i32, available: i32, has_seats: bool) -> Uuid {
        let id = Uuid::new_v4();
        store.seed_event(NewEvent {
            id,
            name: "Engine Test".into(),
            description: None,
            venue: "Hall".into(),
            event_date: Utc::now() + chrono::Duration::days(10),
            total_capacity: total,
            available_capacity: available,
            price: BigDecimal::from_str("50.00").unwrap(),
            has_seat_selection: has_seats,
        });
        id
    }

    #[tokio::test]
    async fn oversell_prevention_exactly_one_wins() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 1, 1, false);
        let engine = make_engine(Arc::clone(&store) as Arc<MemoryStore>);

        let a = engine.create(Uuid::new_v4(), event_id, 1, None).await;
        let b = engine.create(Uuid::new_v4(), event_id, 1, None).await;

        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|o| **o).count(), 1);
        assert!(matches!(
            if a.is_err() { a.unwrap_err() } else { b.unwrap_err() },
            EngineError::InsufficientCapacity(_)
        ));
        assert_eq!(store.event(event_id).available_capacity, 0);
    }

    #[tokio::test]
    async fn invalid_quantity_against_nonexistent_event_reports_missing_event_first() {
        let store = Arc::new(MemoryStore::new());
        let engine = make_engine(store);

        let result = engine.create(Uuid::new_v4(), Uuid::new_v4(), 999, None).await;

        assert!(matches!(result, Err(EngineError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn create_then_cancel_restores_capacity() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let engine = make_engine(Arc::clone(&store));

        let booking = engine.create(Uuid::new_v4(), event_id, 2, None).await.unwrap();
        assert_eq!(store.event(event_id).available_capacity, 8);

        let cancelled = engine.cancel(booking.id, Some("changed mind".into())).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(store.event(event_id).available_capacity, 10);
    }

    #[tokio::test]
    async fn cancel_twice_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let engine = make_engine(Arc::clone(&store));

        let booking = engine.create(Uuid::new_v4(), event_id, 1, None).await.unwrap();
        engine.cancel(booking.id, None).await.unwrap();
        let second = engine.cancel(booking.id, None).await;
        assert!(matches!(second, Err(EngineError::InvalidBookingState { .. })));
    }

    #[tokio::test]
    async fn confirm_after_expiry_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let mut config = test_config();
        config.booking_hold_timeout = Duration::from_millis(5);
        let engine = BookingEngine::new(
            Arc::clone(&store) as Arc<MemoryStore>,
            Arc::new(MemoryLockService::new()),
            Arc::new(LoggingNotificationSink),
            config,
        );

        let booking = engine.create(Uuid::new_v4(), event_id, 1, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        let result = engine.confirm(booking.id, None).await;
        assert!(matches!(result, Err(EngineError::BookingExpired(_))));
    }

    #[tokio::test]
    async fn seat_selection_booking_fails_atomically_if_any_seat_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, true);
        let s1 = store.seed_seat(NewSeat {
            id: Uuid::new_v4(),
            event_id,
            section: "A".into(),
            row_label: "1".into(),
            number: 1,
            price: BigDecimal::from_str("50.00").unwrap(),
        });
        let s2 = store.seed_seat(NewSeat {
            id: Uuid::new_v4(),
            event_id,
            section: "A".into(),
            row_label: "1".into(),
            number: 2,
            price: BigDecimal::from_str("50.00").unwrap(),
        });
        let s3 = store.seed_seat(NewSeat {
            id: Uuid::new_v4(),
            event_id,
            section: "A".into(),
            row_label: "1".into(),
            number: 3,
            price: BigDecimal::from_str("50.00").unwrap(),
        });
        let engine = make_engine(Arc::clone(&store));

        // hold S3 out from under the next request
        engine
            .hold_seats(event_id, vec![s3.id], Duration::from_secs(300))
            .await
            .unwrap();

        let result = engine
            .create(Uuid::new_v4(), event_id, 3, Some(vec![s1.id, s2.id, s3.id]))
            .await;
        assert!(matches!(result, Err(EngineError::SeatNotAvailable { .. })));
        assert_eq!(store.seat(s1.id).status, crate::models::SeatStatus::Available);
        assert_eq!(store.seat(s2.id).status, crate::models::SeatStatus::Available);
    }

    #[tokio::test]
    async fn waitlist_handoff_on_cancel_notifies_head_of_line() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 3, 0, false);
        let engine = make_engine(Arc::clone(&store));

        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let w3 = Uuid::new_v4();
        engine.join_waitlist(w1, event_id, 2).await.unwrap();
        engine.join_waitlist(w2, event_id, 1).await.unwrap();
        engine.join_waitlist(w3, event_id, 2).await.unwrap();

        // Restoring 3 seats of capacity directly (standing in for a separate
        // booking's cancellation) should notify W1 then W2 and stop there.
        let intents = store
            .with_tx(|tx| {
                tx.restore_capacity(event_id, 3)?;
                WaitlistCoordinator::offer_capacity(tx, event_id, 3, Utc::now() + chrono::Duration::hours(1))
            })
            .unwrap();

        assert_eq!(intents.len(), 2);
        let remaining = store
            .with_tx(|tx| tx.active_waitlist_entries_ordered(event_id))
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, w3);
    }

    #[tokio::test]
    async fn deactivated_event_rejects_new_bookings_but_keeps_existing_ones() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let engine = make_engine(Arc::clone(&store));

        let existing = engine.create(Uuid::new_v4(), event_id, 1, None).await.unwrap();
        engine.deactivate_event(event_id).await.unwrap();
        assert!(!store.event(event_id).is_active);

        let rejected = engine.create(Uuid::new_v4(), event_id, 1, None).await;
        assert!(matches!(rejected, Err(EngineError::EventInactive(_))));

        // The booking that predates deactivation is untouched.
        let still_pending = store.with_tx(|tx| tx.get_booking(existing.id)).unwrap();
        assert_eq!(still_pending.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn delete_event_is_refused_while_a_confirmed_booking_exists() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let engine = make_engine(Arc::clone(&store));

        let booking = engine.create(Uuid::new_v4(), event_id, 1, None).await.unwrap();
        engine.confirm(booking.id, None).await.unwrap();

        let result = engine.delete_event(event_id).await;
        assert!(matches!(result, Err(EngineError::EventHasBookings(_))));
    }

    #[tokio::test]
    async fn delete_event_succeeds_once_no_confirmed_booking_remains() {
        let store = Arc::new(MemoryStore::new());
        let event_id = seed_event(&store, 10, 10, false);
        let engine = make_engine(Arc::clone(&store));

        let booking = engine.create(Uuid::new_v4(), event_id, 1, None).await.unwrap();
        engine.cancel(booking.id, None).await.unwrap();

        engine.delete_event(event_id).await.unwrap();
        let lookup = store.with_tx(|tx| tx.get_event(event_id));
        assert!(matches!(lookup, Err(EngineError::EventNotFound(_))));
    }
}
