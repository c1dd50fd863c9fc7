use std::env;
use std::time::Duration;

/// Process configuration, loaded once at startup from `.env` plus the process
/// environment. Consolidates what the teacher's `main` scattered across
/// individual `env::var(...).expect(...)` calls into one typed struct, the
/// way the more heavily layered services in the reference corpus do.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_pool_size: u32,
    pub amqp_url: Option<String>,
    pub booking_hold_timeout: Duration,
    pub max_booking_quantity: i32,
    pub waitlist_notification_timeout: Duration,
    pub price_tick_interval: Duration,
    pub scheduler: SchedulerCadences,
    pub retry: RetryConfig,
    pub lock_default_ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerCadences {
    pub expire_bookings: Duration,
    pub sweep_holds: Duration,
    pub expire_waitlist: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) then the process environment. Panics on a
    /// malformed numeric value; missing optional keys fall back to the
    /// defaults this document fixes in §6.5.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            database_pool_size: env_parse_or("DATABASE_POOL_SIZE", 10),
            amqp_url: env::var("AMQP_URL").ok(),
            booking_hold_timeout: Duration::from_secs(
                60 * env_parse_or::<u64>("BOOKING_HOLD_TIMEOUT_MINUTES", 15),
            ),
            max_booking_quantity: env_parse_or("MAX_BOOKING_QUANTITY", 10),
            waitlist_notification_timeout: Duration::from_secs(
                3600 * env_parse_or::<u64>("WAITLIST_NOTIFICATION_TIMEOUT_HOURS", 24),
            ),
            price_tick_interval: Duration::from_secs(env_parse_or(
                "PRICE_TICK_INTERVAL_SECONDS",
                600,
            )),
            scheduler: SchedulerCadences {
                expire_bookings: Duration::from_secs(env_parse_or(
                    "SCHEDULER_EXPIRE_BOOKINGS_SECONDS",
                    60,
                )),
                sweep_holds: Duration::from_secs(env_parse_or(
                    "SCHEDULER_SWEEP_HOLDS_SECONDS",
                    60,
                )),
                expire_waitlist: Duration::from_secs(env_parse_or(
                    "SCHEDULER_EXPIRE_WAITLIST_SECONDS",
                    3600,
                )),
            },
            retry: RetryConfig {
                max_attempts: env_parse_or("RETRY_MAX_ATTEMPTS", 3),
                base_delay: Duration::from_millis(env_parse_or("RETRY_BASE_DELAY_MS", 100)),
                max_delay: Duration::from_millis(env_parse_or("RETRY_MAX_DELAY_MS", 1000)),
            },
            lock_default_ttl: Duration::from_secs(env_parse_or("LOCK_DEFAULT_TTL_SECONDS", 30)),
        }
    }
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
