//! Candidate query against the harvested metadata table.
//!
//! The table holds one row per metadata value:
//! `(rowID, source, idInSource, parentRowID, field, place, value, added, deleted)`.
//! Queries use `?` placeholders and backtick quoting, which MySQL and SQLite
//! both accept, so the same SQL runs against production and test databases.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{AnyPool, Row};
use tracing::{debug, info, instrument};

use super::{CandidateError, CandidateFilter, CandidateSource, EXPORT_TYPES};
use crate::record::{CandidateRecord, DATE_FORMAT};

const MAX_CONNECTIONS: u32 = 1;

/// [`CandidateSource`] backed by the metadata database.
#[derive(Debug, Clone)]
pub struct DatabaseCandidateSource {
    pool: AnyPool,
}

impl DatabaseCandidateSource {
    /// Connects to `database_url` (`mysql://…` or `sqlite:…`).
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError::Database`] when the connection fails.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, CandidateError> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Handles whose embargo date is `today` or later.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError::Database`] when the query fails.
    pub async fn embargoed_handles(
        &self,
        today: NaiveDate,
    ) -> Result<HashSet<String>, CandidateError> {
        let rows = sqlx::query(EMBARGO_QUERY)
            .bind(today.format(DATE_FORMAT).to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("handle")
                    .map_err(|e| CandidateError::InvalidRow {
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

const EMBARGO_QUERY: &str = "\
SELECT DISTINCT `idInSource` AS handle FROM `metadata` \
WHERE `source` = 'repository' \
AND `field` = 'dc.rights.embargodate' \
AND `value` >= ? \
AND `deleted` IS NULL";

/// Builds the candidate query and its bind values, in placeholder order.
pub(crate) fn candidate_query(filter: &CandidateFilter) -> (String, Vec<String>) {
    let mut binds: Vec<String> = EXPORT_TYPES.iter().map(|t| (*t).to_string()).collect();
    let type_placeholders = placeholders(EXPORT_TYPES.len());

    binds.extend(filter.communities.iter().map(ToString::to_string));
    let community_placeholders = placeholders(filter.communities.len());

    let mut sql = format!(
        "SELECT `idInSource` AS handle, CAST(MIN(`added`) AS CHAR) AS created FROM `metadata` \
         WHERE `source` = 'repository' \
         AND `field` = 'dc.type' \
         AND `value` IN ({type_placeholders}) \
         AND `idInSource` IN (\
            SELECT `idInSource` FROM `metadata` \
            WHERE `source` = 'repository' \
            AND `field` = 'dspace.community.handle' \
            AND `value` IN ({community_placeholders}) \
            AND `deleted` IS NULL) \
         AND `deleted` IS NULL"
    );

    if filter.start.is_some() || filter.end.is_some() {
        // Records that gained a bitstream inside the window; a bitstream that
        // already existed before the window does not qualify its record.
        sql.push_str(
            " AND `idInSource` IN (\
                SELECT `idInSource` FROM `metadata` \
                WHERE `source` = 'repository' \
                AND `field` = 'dspace.bitstream.uuid' \
                AND `deleted` IS NULL",
        );
        if let Some(start) = filter.start {
            let start = start.format(DATE_FORMAT).to_string();
            sql.push_str(
                " AND `added` >= ? \
                 AND `value` NOT IN (\
                    SELECT `value` FROM `metadata` \
                    WHERE `source` = 'repository' \
                    AND `field` = 'dspace.bitstream.uuid' \
                    AND `added` < ?)",
            );
            binds.push(start.clone());
            binds.push(start);
        }
        if let Some(end) = filter.end {
            // Inclusive end date: compare against the following midnight.
            let next_day = end.checked_add_days(Days::new(1)).unwrap_or(end);
            sql.push_str(" AND `added` < ?");
            binds.push(next_day.format(DATE_FORMAT).to_string());
        }
        sql.push(')');
    }

    sql.push_str(" GROUP BY `idInSource` ORDER BY `idInSource`");
    (sql, binds)
}

fn placeholders(count: usize) -> String {
    if count == 0 {
        // `IN ()` is a syntax error; match nothing instead.
        return "NULL".to_string();
    }
    vec!["?"; count].join(", ")
}

#[async_trait]
impl CandidateSource for DatabaseCandidateSource {
    #[instrument(skip(self, filter), fields(start = ?filter.start, end = ?filter.end))]
    async fn candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateRecord>, CandidateError> {
        filter.validate()?;

        let (sql, binds) = candidate_query(filter);
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        let embargoed = self.embargoed_handles(filter.today).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let handle: String =
                row.try_get("handle")
                    .map_err(|e| CandidateError::InvalidRow {
                        reason: e.to_string(),
                    })?;
            let created: Option<String> =
                row.try_get("created")
                    .map_err(|e| CandidateError::InvalidRow {
                        reason: e.to_string(),
                    })?;
            candidates.push(CandidateRecord {
                embargoed: embargoed.contains(&handle),
                handle,
                created,
            });
        }

        let embargoed_count = candidates.iter().filter(|c| c.embargoed).count();
        debug!(embargoed = embargoed_count, "embargo flags applied");
        info!(candidates = candidates.len(), "candidate query complete");
        Ok(candidates)
    }
}
