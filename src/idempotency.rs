// Idempotency cache: replay protection for command-boundary operations.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::db::Database;

/// Default entry lifetime in hours.
pub const DEFAULT_TTL_HOURS: u64 = 24;

// Matches the schema's strftime format so timestamps compare as strings.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Replay cache for operations that must not run twice for the same caller
/// and arguments. Entries are stored in the database with a creation
/// timestamp; anything older than the TTL is purged on access.
pub struct IdempotencyCache<'a> {
    db: &'a Database,
    ttl: Duration,
}

impl<'a> IdempotencyCache<'a> {
    pub fn new(db: &'a Database, ttl_hours: u64) -> Self {
        Self {
            db,
            ttl: Duration::hours(ttl_hours as i64),
        }
    }

    /// Run `op` unless a live entry already holds its response.
    ///
    /// The cache key combines the caller token with a fingerprint of the
    /// operation name and its JSON arguments, so the same operation against
    /// different leagues never collides. Returns the response and whether
    /// it was replayed.
    pub fn guard<F>(
        &self,
        caller: &str,
        operation: &str,
        args: &Value,
        op: F,
    ) -> anyhow::Result<(Value, bool)>
    where
        F: FnOnce() -> anyhow::Result<Value>,
    {
        let now = Utc::now();
        self.purge_expired(now)?;

        let key = cache_key(caller, operation, args);
        if let Some((stored, created_at)) = self.db.idempotency_lookup(&key)? {
            let value: Value = serde_json::from_str(&stored)
                .with_context(|| format!("stored response for key {key} is not valid JSON"))?;
            debug!("replaying {operation} for caller {caller} (entry from {created_at})");
            return Ok((value, true));
        }

        let value = op()?;
        let response = serde_json::to_string(&value).context("failed to encode response")?;
        self.db
            .idempotency_store(&key, &response, &format_timestamp(now))?;
        Ok((value, false))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let cutoff = format_timestamp(now - self.ttl);
        let purged = self.db.idempotency_purge_older_than(&cutoff)?;
        if purged > 0 {
            info!("purged {purged} expired idempotency entries");
        }
        Ok(())
    }
}

/// SHA-1 fingerprint of the operation name plus its arguments. `serde_json`
/// keeps object keys sorted, so logically equal argument maps hash the same
/// regardless of construction order.
pub fn fingerprint(operation: &str, args: &Value) -> String {
    let digest = Sha1::digest(format!("{operation}|{args}").as_bytes());
    format!("{digest:x}")
}

fn cache_key(caller: &str, operation: &str, args: &Value) -> String {
    format!("{caller}:{}", fingerprint(operation, args))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
