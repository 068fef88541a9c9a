//! Optimistic concurrency on a modification timestamp.
//!
//! An update carries the modification timestamp the caller last saw. It is
//! applied only while the stored row still holds that timestamp, and it
//! stamps a fresh one. A mismatch is reported as
//! [`UpdateOutcome::Conflict`] rather than silently overwriting.

use crate::db::Session;
use crate::error::DbResult;
use crate::metadata::Entity;
use crate::metadata::entity::short_type_name;
use crate::models::SqlValue;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::{debug, info};

/// An entity whose rows carry a nullable modification timestamp.
pub trait Versioned: Entity {
    /// Column holding the timestamp; must be one of the entity's data columns.
    const MODIFIED_AT_COLUMN: &'static str;

    fn modified_at(&self) -> Option<DateTime<Utc>>;

    fn set_modified_at(&mut self, modified_at: Option<DateTime<Utc>>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The row was written and now carries `modified_at`.
    Updated { modified_at: DateTime<Utc> },
    /// Someone else modified the row; `current` is its stored timestamp.
    Conflict { current: Option<DateTime<Utc>> },
    /// No row has the entity's key.
    NotFound,
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// A timestamp strictly after `previous`, at the microsecond precision every
/// supported backend stores.
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(previous) if now <= previous => previous.trunc_subsecs(6) + Duration::microseconds(1),
        _ => now,
    }
}

impl Session {
    /// Write every data column of `entity` if the stored modification
    /// timestamp still equals `expected`.
    ///
    /// `expected` is `None` for a row that has never been modified. On
    /// success `entity` carries the new timestamp; otherwise it is left as
    /// it was passed in.
    pub async fn update_if_unmodified<T: Versioned>(
        &mut self,
        entity: &mut T,
        expected: Option<DateTime<Utc>>,
    ) -> DbResult<UpdateOutcome> {
        let previous = entity.modified_at();
        let stamp = next_timestamp(expected);
        entity.set_modified_at(Some(stamp));

        let target: &T = entity;
        let outcome = self
            .with_transaction(async |s| compare_and_update(s, target, expected, stamp).await)
            .await;

        match &outcome {
            Ok(UpdateOutcome::Updated { modified_at }) => {
                info!(entity = short_type_name::<T>(), modified_at = %modified_at, "Versioned update applied");
            }
            Ok(rejected) => {
                debug!(entity = short_type_name::<T>(), outcome = ?rejected, "Versioned update rejected");
                entity.set_modified_at(previous);
            }
            Err(_) => entity.set_modified_at(previous),
        }
        outcome
    }
}

async fn compare_and_update<T: Versioned>(
    session: &mut Session,
    entity: &T,
    expected: Option<DateTime<Utc>>,
    stamp: DateTime<Utc>,
) -> DbResult<UpdateOutcome> {
    let generator = session.generator::<T>()?;
    let id = generator.metadata().primary_key().read(entity);

    let Some(current) = session.get_by_id::<T>(id.clone()).await? else {
        return Ok(UpdateOutcome::NotFound);
    };
    if current.modified_at() != expected {
        return Ok(UpdateOutcome::Conflict {
            current: current.modified_at(),
        });
    }

    let stmt = generator.update_guarded(entity, T::MODIFIED_AT_COLUMN, SqlValue::from(expected))?;
    let affected = session.execute_statement(&stmt).await?.rows_affected;
    if affected == 0 {
        // Changed between the read and the write
        let current = session.get_by_id::<T>(id).await?.and_then(|c| c.modified_at());
        return Ok(UpdateOutcome::Conflict { current });
    }

    Ok(UpdateOutcome::Updated { modified_at: stamp })
}
