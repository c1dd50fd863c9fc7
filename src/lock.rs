//! `LockService` (§4.2): named, time-bounded mutual exclusion with fencing
//! tokens. Per SPEC_FULL/DESIGN, backed by the same Postgres pool the rest of
//! the crate already holds open rather than a second network dependency —
//! the teacher's stack has no Redis/cache client anywhere in it, and this is
//! purely an optimization (§4.2: "Lock failure is NEVER required for
//! correctness").
use crate::error::EngineResult;
use crate::schema::locks;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use std::time::Duration;
use uuid::Uuid;

/// The fencing identifier `Acquire` hands back; `Release` only succeeds if
/// the caller presents the same token, even past its own TTL (§9: "tests
/// must cover the release-after-TTL-expired-by-another-holder path as a
/// no-op").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(pub Uuid);

#[async_trait]
pub trait Locker: Send + Sync {
    /// `Acquire(key, ttl, wait?)`. Returns `None` on a timed-out wait (or an
    /// immediate miss when `wait` is `None`), never an error — §4.2/§5:
    /// lock contention is not a failure, just a missed optimization.
    async fn acquire(&self, key: &str, ttl: Duration, wait: Option<Duration>) -> EngineResult<Option<LockToken>>;
    async fn release(&self, key: &str, token: LockToken) -> EngineResult<()>;
}

pub struct PgLockService {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PgLockService {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        PgLockService { pool }
    }

    fn try_acquire_once(&self, key: &str, ttl: Duration, owner: Uuid) -> EngineResult<bool> {
        let mut conn = self.pool.get()?;
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30));
        let owner_str = owner.to_string();

        // Upsert: wins if the key is unheld, or if the previous holder's TTL
        // has lapsed. This is the set-if-absent-with-expiry §4.2 specifies,
        // expressed as a single round trip rather than read-then-write.
        let rows = diesel::sql_query(
            "INSERT INTO locks (key, owner, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at \
             WHERE locks.expires_at < now()",
        )
        .bind::<diesel::sql_types::Text, _>(key)
        .bind::<diesel::sql_types::Text, _>(&owner_str)
        .bind::<diesel::sql_types::Timestamptz, _>(expires_at)
        .execute(&mut conn)?;

        if rows > 0 {
            return Ok(true);
        }

        // The upsert's WHERE clause rejected the write (key held by someone
        // with an unexpired lease); confirm we really are not the owner.
        let existing_owner: Option<String> = locks::table
            .find(key)
            .select(locks::owner)
            .first(&mut conn)
            .optional()?;
        Ok(existing_owner.as_deref() == Some(owner_str.as_str()))
    }
}

#[async_trait]
impl Locker for PgLockService {
    async fn acquire(&self, key: &str, ttl: Duration, wait: Option<Duration>) -> EngineResult<Option<LockToken>> {
        let owner = Uuid::new_v4();
        let deadline = wait.map(|w| std::time::Instant::now() + w);

        loop {
            if self.try_acquire_once(key, ttl, owner)? {
                return Ok(Some(LockToken(owner)));
            }
            match deadline {
                Some(d) if std::time::Instant::now() < d => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                _ => return Ok(None),
            }
        }
    }

    async fn release(&self, key: &str, token: LockToken) -> EngineResult<()> {
        let mut conn = self.pool.get()?;
        diesel::delete(
            locks::table
                .filter(locks::key.eq(key))
                .filter(locks::owner.eq(token.0.to_string())),
        )
        .execute(&mut conn)?;
        Ok(())
    }
}

/// In-process `Locker` for tests and for single-instance deployments that
/// don't want the extra round trip; same fencing semantics, no database.
#[cfg(any(test, feature = "test-support"))]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    pub struct MemoryLockService {
        held: Mutex<HashMap<String, (Uuid, Instant)>>,
    }

    impl MemoryLockService {
        pub fn new() -> Self {
            MemoryLockService::default()
        }
    }

    #[async_trait]
    impl Locker for MemoryLockService {
        async fn acquire(
            &self,
            key: &str,
            ttl: Duration,
            _wait: Option<Duration>,
        ) -> EngineResult<Option<LockToken>> {
            let mut held = self.held.lock().unwrap();
            let now = Instant::now();
            let occupied = held.get(key).map(|(_, exp)| *exp > now).unwrap_or(false);
            if occupied {
                return Ok(None);
            }
            let owner = Uuid::new_v4();
            held.insert(key.to_string(), (owner, now + ttl));
            Ok(Some(LockToken(owner)))
        }

        async fn release(&self, key: &str, token: LockToken) -> EngineResult<()> {
            let mut held = self.held.lock().unwrap();
            if held.get(key).map(|(owner, _)| *owner == token.0).unwrap_or(false) {
                held.remove(key);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLockService;
    use super::*;

    #[tokio::test]
    async fn second_acquirer_is_rejected_while_held() {
        let lock = MemoryLockService::new();
        let t1 = lock.acquire("booking:e1:u1", Duration::from_secs(30), None).await.unwrap();
        assert!(t1.is_some());
        let t2 = lock.acquire("booking:e1:u1", Duration::from_secs(30), None).await.unwrap();
        assert!(t2.is_none());
    }

    #[tokio::test]
    async fn release_from_non_owner_is_a_no_op() {
        let lock = MemoryLockService::new();
        let t1 = lock.acquire("k", Duration::from_secs(30), None).await.unwrap().unwrap();
        // A stale/foreign token must not release someone else's lock.
        lock.release("k", LockToken(Uuid::new_v4())).await.unwrap();
        let t2 = lock.acquire("k", Duration::from_secs(30), None).await.unwrap();
        assert!(t2.is_none());

        lock.release("k", t1).await.unwrap();
        let t3 = lock.acquire("k", Duration::from_secs(30), None).await.unwrap();
        assert!(t3.is_some());
    }

    #[tokio::test]
    async fn release_after_ttl_expired_and_stolen_is_a_no_op() {
        let lock = MemoryLockService::new();
        let t1 = lock
            .acquire("k", Duration::from_millis(10), None)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let t2 = lock.acquire("k", Duration::from_secs(30), None).await.unwrap();
        assert!(t2.is_some(), "new holder should win after TTL lapsed");

        // The original holder's late release must not evict the new holder.
        lock.release("k", t1).await.unwrap();
        let t3 = lock.acquire("k", Duration::from_secs(30), None).await.unwrap();
        assert!(t3.is_none(), "second holder's lock must still be held");
    }
}
