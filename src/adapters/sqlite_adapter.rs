//! SQLite order and bar store.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::RuleflowError;
use crate::domain::order::{Order, OrderStatus, OrderUpdate};
use crate::ports::bar_source::BarSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::order_store::OrderStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, params};
use std::str::FromStr;

const ORDER_COLUMNS: &str = "id, bot_id, symbol, broker, timeframe, order_type, volume, stop, entry, tp, sl,
     status, created_time, expired_time, time_stop, time_entry, time_tp, time_sl, last_time_updated";

fn pool_error(e: r2d2::Error) -> RuleflowError {
    RuleflowError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> RuleflowError {
    RuleflowError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        bot_id: row.get(1)?,
        symbol: row.get(2)?,
        broker: row.get(3)?,
        timeframe: parse_column(row, 4)?,
        order_type: parse_column(row, 5)?,
        volume: row.get(6)?,
        stop: row.get(7)?,
        entry: row.get(8)?,
        tp: row.get(9)?,
        sl: row.get(10)?,
        status: parse_column(row, 11)?,
        created_time: row.get(12)?,
        expired_time: row.get(13)?,
        time_stop: row.get(14)?,
        time_entry: row.get(15)?,
        time_tp: row.get(16)?,
        time_sl: row.get(17)?,
        last_time_updated: row.get(18)?,
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RuleflowError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| RuleflowError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("database", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, RuleflowError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, RuleflowError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), RuleflowError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                broker TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                order_type TEXT NOT NULL,
                volume REAL NOT NULL,
                stop REAL,
                entry REAL NOT NULL,
                tp REAL NOT NULL,
                sl REAL NOT NULL,
                status TEXT NOT NULL,
                created_time INTEGER NOT NULL,
                expired_time INTEGER,
                time_stop INTEGER,
                time_entry INTEGER,
                time_tp INTEGER,
                time_sl INTEGER,
                last_time_updated INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
            CREATE INDEX IF NOT EXISTS idx_orders_bot ON orders(bot_id, broker, symbol);
            CREATE TABLE IF NOT EXISTS bars (
                broker TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                is_final INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (broker, symbol, timeframe, start_time)
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_bars(&self, bars: &[Bar]) -> Result<(), RuleflowError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars
                    (broker, symbol, timeframe, start_time, open, high, low, close, volume, is_final)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    bar.broker,
                    bar.symbol,
                    bar.timeframe.as_str(),
                    bar.start_time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.is_final
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn query_orders(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Order>, RuleflowError> {
        let conn = self.conn()?;
        let query = format!("SELECT {} FROM orders WHERE {} ORDER BY id ASC", ORDER_COLUMNS, filter);
        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt.query_map(args, order_from_row).map_err(query_error)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row.map_err(query_error)?);
        }
        Ok(orders)
    }
}

impl OrderStore for SqliteAdapter {
    fn insert_order(&self, order: &Order) -> Result<i64, RuleflowError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO orders
                (bot_id, symbol, broker, timeframe, order_type, volume, stop, entry, tp, sl,
                 status, created_time, expired_time, time_stop, time_entry, time_tp, time_sl,
                 last_time_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                order.bot_id,
                order.symbol,
                order.broker,
                order.timeframe.as_str(),
                order.order_type.as_str(),
                order.volume,
                order.stop,
                order.entry,
                order.tp,
                order.sl,
                order.status.as_str(),
                order.created_time,
                order.expired_time,
                order.time_stop,
                order.time_entry,
                order.time_tp,
                order.time_sl,
                order.last_time_updated
            ],
        )
        .map_err(query_error)?;
        Ok(conn.last_insert_rowid())
    }

    fn update_order(&self, update: &OrderUpdate) -> Result<(), RuleflowError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE orders
                 SET status = ?1, time_stop = ?2, time_entry = ?3, time_tp = ?4, time_sl = ?5,
                     last_time_updated = ?6
                 WHERE id = ?7",
                params![
                    update.status.as_str(),
                    update.time_stop,
                    update.time_entry,
                    update.time_tp,
                    update.time_sl,
                    update.last_time_updated,
                    update.id
                ],
            )
            .map_err(query_error)?;
        if changed == 0 {
            return Err(RuleflowError::DatabaseQuery {
                reason: format!("order {} not found", update.id),
            });
        }
        Ok(())
    }

    fn open_orders(&self) -> Result<Vec<Order>, RuleflowError> {
        self.query_orders(
            "status IN (?1, ?2, ?3)",
            &[
                &OrderStatus::Opened.as_str(),
                &OrderStatus::MatchStop.as_str(),
                &OrderStatus::MatchEntry.as_str(),
            ],
        )
    }

    fn orders_for_bot(&self, bot_id: i64) -> Result<Vec<Order>, RuleflowError> {
        self.query_orders("bot_id = ?1", &[&bot_id])
    }

    fn cancel_open_orders(&self, bot_id: i64, broker: &str, symbol: &str) -> Result<usize, RuleflowError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE orders SET status = ?1
             WHERE bot_id = ?2 AND broker = ?3 AND symbol = ?4 AND status = ?5",
            params![
                OrderStatus::Canceled.as_str(),
                bot_id,
                broker,
                symbol,
                OrderStatus::Opened.as_str()
            ],
        )
        .map_err(query_error)
    }
}

impl BarSource for SqliteAdapter {
    fn bars_since(
        &self,
        broker: &str,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
    ) -> Result<Vec<Bar>, RuleflowError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT broker, symbol, timeframe, start_time, open, high, low, close, volume, is_final
                 FROM bars
                 WHERE broker = ?1 AND symbol = ?2 AND timeframe = ?3 AND start_time >= ?4
                 ORDER BY start_time ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![broker, symbol, timeframe.as_str(), since], |row| {
                Ok(Bar {
                    broker: row.get(0)?,
                    symbol: row.get(1)?,
                    timeframe: parse_column(row, 2)?,
                    start_time: row.get(3)?,
                    open: row.get(4)?,
                    high: row.get(5)?,
                    low: row.get(6)?,
                    close: row.get(7)?,
                    volume: row.get(8)?,
                    is_final: row.get(9)?,
                })
            })
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_error)?);
        }
        Ok(bars)
    }
}
