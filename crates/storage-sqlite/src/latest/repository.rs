use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::{parse_ts, LatestQuoteDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::latest_quotes::dsl as latest_dsl;
use quotefeed_core::constants::CONTROL_SYMBOL;
use quotefeed_core::storage::{ControlRecord, LatestStore};
use quotefeed_core::Result;
use quotefeed_market_data::Snapshot;

pub struct LatestQuoteRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl LatestQuoteRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn read_control_ts(conn: &mut SqliteConnection) -> std::result::Result<Option<f64>, StorageError> {
    latest_dsl::latest_quotes
        .find(CONTROL_SYMBOL)
        .select(latest_dsl::ts)
        .first::<String>(conn)
        .optional()?
        .map(|text| parse_ts(&text))
        .transpose()
}

#[async_trait]
impl LatestStore for LatestQuoteRepository {
    async fn put_latest(&self, snapshot: &Snapshot) -> Result<()> {
        let row = LatestQuoteDB::from_snapshot(snapshot)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(latest_dsl::latest_quotes)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(())
            })
            .await
    }

    fn get_latest(&self, symbol: &str) -> Result<Option<Snapshot>> {
        if symbol == CONTROL_SYMBOL {
            return Ok(None);
        }
        let mut conn = get_connection(&self.pool)?;

        let row = latest_dsl::latest_quotes
            .find(symbol)
            .select(LatestQuoteDB::as_select())
            .first::<LatestQuoteDB>(&mut conn)
            .optional()
            .into_core()?;

        Ok(row.map(LatestQuoteDB::into_snapshot).transpose()?)
    }

    fn get_control(&self) -> Result<Option<ControlRecord>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(read_control_ts(&mut conn)?.map(ControlRecord::new))
    }

    async fn swap_control(
        &self,
        expected: Option<&ControlRecord>,
        next: &ControlRecord,
    ) -> Result<bool> {
        let expected_ts = expected.map(|r| r.ts);
        let row = LatestQuoteDB::control(next);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let current = read_control_ts(conn)?;
                if current != expected_ts {
                    debug!(
                        "Control record swap rejected: expected {:?}, found {:?}",
                        expected_ts, current
                    );
                    return Ok(false);
                }

                diesel::replace_into(latest_dsl::latest_quotes)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(true)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations, spawn_writer};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tempfile::TempDir;

    fn repository(dir: &TempDir) -> LatestQuoteRepository {
        let path = dir.path().join("nested").join("quotefeed.db");
        let db_path = init(path.to_str().unwrap()).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer(pool.as_ref().clone());
        LatestQuoteRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn test_put_and_get_latest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        let mut snapshot = Snapshot::new("AAPL", dec!(123.45), 1_700_000_000.5);
        snapshot.change = Some(dec!(-1.2));
        snapshot.change_pct = Some(dec!(-0.96));
        snapshot
            .meta
            .insert("latest_trading_day".to_string(), json!("2024-03-01"));
        repo.put_latest(&snapshot).await.unwrap();

        assert_eq!(repo.get_latest("AAPL").unwrap(), Some(snapshot));
        assert_eq!(repo.get_latest("MSFT").unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_latest_overwrites_whole_row() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        let mut first = Snapshot::new("AAPL", dec!(1), 1.0);
        first.change = Some(dec!(0.5));
        repo.put_latest(&first).await.unwrap();
        repo.put_latest(&Snapshot::new("AAPL", dec!(2), 2.0)).await.unwrap();

        let stored = repo.get_latest("AAPL").unwrap().unwrap();
        assert_eq!(stored.price, dec!(2));
        assert_eq!(stored.change, None);
    }

    #[tokio::test]
    async fn test_control_record_compare_and_swap() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);
        assert_eq!(repo.get_control().unwrap(), None);

        let claimed = ControlRecord::new(1_700_000_000.123456);
        assert!(repo.swap_control(None, &claimed).await.unwrap());
        assert!(!repo
            .swap_control(None, &ControlRecord::new(5.0))
            .await
            .unwrap());
        assert_eq!(repo.get_control().unwrap(), Some(claimed.clone()));

        let rearmed = ControlRecord::new(1_700_000_060.0);
        assert!(repo.swap_control(Some(&claimed), &rearmed).await.unwrap());
        assert_eq!(repo.get_control().unwrap(), Some(rearmed));

        // the control row never surfaces as a quote
        assert_eq!(repo.get_latest(CONTROL_SYMBOL).unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(repository(&dir));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.swap_control(None, &ControlRecord::new(i as f64)).await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
