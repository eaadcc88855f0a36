//! Owner-scoped transactions.
//!
//! Each registry transition begins a transaction and takes a transaction-level advisory lock
//! per owner before reading that owner's rows, so transitions for one owner serialize while
//! other owners proceed.

use sqlx::{PgPool, Postgres, Transaction};
use stowage_core::AppError;

/// Begin a transaction holding the advisory lock of every owner in `owner_ids`.
///
/// Locks are taken in sorted order so concurrent multi-owner imports can't deadlock.
pub async fn begin_owner_scoped<'a, I>(
    pool: &PgPool,
    owner_ids: I,
) -> Result<Transaction<'static, Postgres>, AppError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut owners: Vec<&str> = owner_ids.into_iter().collect();
    owners.sort_unstable();
    owners.dedup();

    let mut tx = pool.begin().await?;
    for owner_id in owners {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
    }
    Ok(tx)
}
