//! `Scheduler` (§4.7): the background sweepers that keep state honest without
//! a caller in the loop — expiring stale `PENDING` bookings, releasing holds
//! a client never confirmed, requeuing lapsed waitlist notifications, and
//! periodically re-evaluating event prices. Each runs on its own
//! `tokio::time::interval`, the same "one task per cadence" shape the
//! teacher's worker loop used for its single queue-drain task.
use crate::config::Config;
use crate::engine::BookingEngine;
use crate::error::EngineResult;
use crate::pricing::{evaluate_price, exceeds_persist_threshold, PricingInputs, PricingRule};
use crate::tx::{Tx, TxStore};
use crate::waitlist::WaitlistCoordinator;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

const EXPIRE_BOOKINGS_BATCH: i64 = 200;

pub struct Scheduler {
    store: Arc<dyn TxStore>,
    engine: Arc<BookingEngine>,
    config: Config,
}

impl Scheduler {
    pub fn new(store: Arc<dyn TxStore>, engine: Arc<BookingEngine>, config: Config) -> Self {
        Scheduler { store, engine, config }
    }

    /// Spawns all four sweepers and returns their handles so the caller can
    /// hold the process open (or abort them on shutdown).
    pub fn spawn_all(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            self.clone().spawn_expire_bookings(),
            self.clone().spawn_sweep_seat_holds(),
            self.clone().spawn_expire_waitlist_notifications(),
            self.clone().spawn_price_tick(),
        ]
    }

    fn spawn_expire_bookings(self: Arc<Self>) -> JoinHandle<()> {
        let cadence = self.config.scheduler.expire_bookings;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                if let Err(e) = self.expire_bookings_once().await {
                    log::error!("ExpireBookings tick failed: {e}");
                }
            }
        })
    }

    async fn expire_bookings_once(&self) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        let expired = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| tx.list_expired_bookings(Utc::now(), EXPIRE_BOOKINGS_BATCH))
        })
        .await
        .map_err(|e| crate::error::EngineError::Internal(format!("expire_bookings join error: {e}")))??;

        if !expired.is_empty() {
            log::info!("ExpireBookings: {} booking(s) past their hold deadline", expired.len());
        }
        for booking in expired {
            if let Err(e) = self.engine.expire(booking.id).await {
                log::warn!("failed to expire booking {}: {e}", booking.id);
            }
        }
        Ok(())
    }

    fn spawn_sweep_seat_holds(self: Arc<Self>) -> JoinHandle<()> {
        let cadence = self.config.scheduler.sweep_holds;
        let hold_ttl = ChronoDuration::from_std(self.config.booking_hold_timeout)
            .unwrap_or_else(|_| ChronoDuration::minutes(15));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                let store = Arc::clone(&self.store);
                let result = tokio::task::spawn_blocking(move || {
                    store.with_tx(|tx| tx.sweep_expired_holds(Utc::now(), hold_ttl))
                })
                .await;
                match result {
                    Ok(Ok(freed)) if freed > 0 => log::info!("SweepSeatHolds: freed {freed} stale seat hold(s)"),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("SweepSeatHolds tick failed: {e}"),
                    Err(e) => log::error!("SweepSeatHolds task panicked: {e}"),
                }
            }
        })
    }

    fn spawn_expire_waitlist_notifications(self: Arc<Self>) -> JoinHandle<()> {
        let cadence = self.config.scheduler.expire_waitlist;
        let notification_window = ChronoDuration::from_std(self.config.waitlist_notification_timeout)
            .unwrap_or_else(|_| ChronoDuration::hours(24));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                let store = Arc::clone(&self.store);
                let cutoff = Utc::now() - notification_window;
                let result = tokio::task::spawn_blocking(move || {
                    store.with_tx(|tx| WaitlistCoordinator::expire_notifications(tx, cutoff))
                })
                .await;
                match result {
                    Ok(Ok(requeued)) if requeued > 0 => {
                        log::info!("ExpireWaitlistNotifications: requeued {requeued} lapsed notification(s)")
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("ExpireWaitlistNotifications tick failed: {e}"),
                    Err(e) => log::error!("ExpireWaitlistNotifications task panicked: {e}"),
                }
            }
        })
    }

    fn spawn_price_tick(self: Arc<Self>) -> JoinHandle<()> {
        let cadence = self.config.price_tick_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                if let Err(e) = self.price_tick_once().await {
                    log::error!("PriceTick failed: {e}");
                }
            }
        })
    }

    /// Recomputes every active future event's price and persists it (plus an
    /// `EventUpdate` notification) when the change crosses the 1% gate.
    async fn price_tick_once(&self) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        let now = Utc::now();
        let updates = tokio::task::spawn_blocking(move || {
            store.with_tx(|tx| {
                let events = tx.list_active_future_events(now)?;
                let mut updates = Vec::new();
                for event in events {
                    let week_ago = now - ChronoDuration::days(7);
                    let two_weeks_ago = now - ChronoDuration::days(14);
                    let bookings_last_7_days = tx.count_bookings_in_window(event.id, week_ago, now)?;
                    let bookings_previous_7_days =
                        tx.count_bookings_in_window(event.id, two_weeks_ago, week_ago)?;
                    let waitlist_size = tx.count_waitlist(event.id)?;

                    let inputs = PricingInputs {
                        total_capacity: event.total_capacity as i64,
                        available_capacity: event.available_capacity as i64,
                        event_date: event.event_date,
                        now,
                        bookings_last_7_days,
                        bookings_previous_7_days,
                        waitlist_size,
                    };
                    let new_price = evaluate_price(&event.price, &inputs, &PricingRule::default());
                    if exceeds_persist_threshold(&event.price, &new_price) {
                        tx.update_event_price(event.id, new_price.clone())?;
                        updates.push((event.id, new_price));
                    }
                }
                Ok(updates)
            })
        })
        .await
        .map_err(|e| crate::error::EngineError::Internal(format!("price_tick join error: {e}")))??;

        if !updates.is_empty() {
            log::info!("PriceTick: repriced {} event(s)", updates.len());
        }
        for (event_id, new_price) in updates {
            self.engine.emit_event_update(event_id, format!("price updated to {new_price}"));
        }
        Ok(())
    }
}
