use evently_engine::config::Config;
use evently_engine::engine::BookingEngine;
use evently_engine::lock::{Locker, PgLockService};
use evently_engine::notify::{AmqpNotificationSink, LoggingNotificationSink, NotificationSink};
use evently_engine::scheduler::Scheduler;
use evently_engine::store;
use evently_engine::tx::{PgStore, TxStore};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = Config::from_env();

    let pool = store::init_pool(&config.database_url, config.database_pool_size);
    let store: Arc<dyn TxStore> = Arc::new(PgStore::new(pool.clone()));
    let locker: Arc<dyn Locker> = Arc::new(PgLockService::new(pool));

    let notifier: Arc<dyn NotificationSink> = match &config.amqp_url {
        Some(url) => match AmqpNotificationSink::connect(url).await {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                log::error!("failed to connect notification sink to {url}: {e}; falling back to logging sink");
                Arc::new(LoggingNotificationSink)
            }
        },
        None => {
            log::info!("AMQP_URL not set; notifications are logged only");
            Arc::new(LoggingNotificationSink)
        }
    };

    let engine = Arc::new(BookingEngine::new(
        Arc::clone(&store),
        locker,
        notifier,
        config.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(store, Arc::clone(&engine), config));

    log::info!("evently-engine starting background sweepers");
    let handles = scheduler.spawn_all();

    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("a scheduler task exited unexpectedly: {e}");
        }
    }
}
