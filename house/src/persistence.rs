//! Write-behind SQLite persistence.
//!
//! Rows are loaded once at startup, then every mutation is queued on a bounded channel and
//! written by a dedicated thread. Every row here carries money, so a full queue makes the
//! caller wait rather than dropping the write.

use anyhow::Context;
use arcade_types::{
    DepositRecord, Token, WagerRecord, WalletAddress, WithdrawalRecord, WithdrawalStatus,
};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::ledger::BalanceSnapshot;

pub enum PersistRequest {
    Balance(BalanceSnapshot),
    Deposit(DepositRecord),
    Wager(WagerRecord),
    Withdrawal(WithdrawalRecord),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistStatus {
    Queued,
    /// The queue was full and the caller waited for room.
    Waited,
    /// The worker has stopped; the write was lost.
    Closed,
}

/// Everything loaded from disk at startup.
#[derive(Debug, Default)]
pub struct Restored {
    pub balances: Vec<BalanceSnapshot>,
    pub deposits: Vec<DepositRecord>,
    pub wagers: Vec<WagerRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
}

pub struct HousePersistence {
    sender: mpsc::Sender<PersistRequest>,
}

impl HousePersistence {
    pub fn load_and_start_sqlite(
        path: &Path,
        buffer_size: usize,
        wager_history_limit: Option<usize>,
    ) -> anyhow::Result<(Self, Restored)> {
        let conn = Connection::open(path).context("open house persistence db")?;
        init_schema_sqlite(&conn)?;

        let restored = Restored {
            balances: load_balances_sqlite(&conn)?,
            deposits: load_records_sqlite(&conn, "SELECT record FROM deposits ORDER BY id ASC")?,
            wagers: load_wagers_sqlite(&conn, wager_history_limit)?,
            withdrawals: load_records_sqlite(
                &conn,
                "SELECT record FROM withdrawals ORDER BY id ASC",
            )?,
        };
        drop(conn);

        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let path = path.to_path_buf();
        std::thread::spawn(move || {
            persistence_worker(path, receiver);
        });

        Ok((Self { sender }, restored))
    }

    pub async fn persist(&self, request: PersistRequest) -> PersistStatus {
        match self.sender.try_send(request) {
            Ok(()) => PersistStatus::Queued,
            Err(mpsc::error::TrySendError::Full(request)) => {
                warn!("House persistence channel full; waiting for room");
                match self.sender.send(request).await {
                    Ok(()) => PersistStatus::Waited,
                    Err(_) => PersistStatus::Closed,
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PersistStatus::Closed,
        }
    }

    /// Wait until every request queued before this call has been written.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(PersistRequest::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

fn init_schema_sqlite(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS balances (
             wallet TEXT NOT NULL,
             token TEXT NOT NULL,
             amount TEXT NOT NULL,
             version INTEGER NOT NULL,
             updated_at INTEGER NOT NULL,
             PRIMARY KEY (wallet, token)
         );
         CREATE TABLE IF NOT EXISTS deposits (
             id INTEGER PRIMARY KEY,
             tx_id TEXT NOT NULL UNIQUE,
             wallet TEXT NOT NULL,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS wagers (
             id INTEGER PRIMARY KEY,
             wallet TEXT NOT NULL,
             auth_id TEXT NOT NULL UNIQUE,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS wagers_by_wallet ON wagers (wallet, id);
         CREATE TABLE IF NOT EXISTS withdrawals (
             id INTEGER PRIMARY KEY,
             wallet TEXT NOT NULL,
             status TEXT NOT NULL,
             record TEXT NOT NULL
         );",
    )
    .context("init house persistence schema")?;
    Ok(())
}

fn load_balances_sqlite(conn: &Connection) -> anyhow::Result<Vec<BalanceSnapshot>> {
    let mut stmt =
        conn.prepare("SELECT wallet, token, amount, version, updated_at FROM balances")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut balances = Vec::new();
    for row in rows {
        let (wallet, token, amount, version, updated_at) = row?;
        balances.push(BalanceSnapshot {
            wallet: WalletAddress::parse(&wallet)
                .with_context(|| format!("invalid persisted wallet {wallet}"))?,
            token: Token::parse(&token)
                .with_context(|| format!("invalid persisted token {token}"))?,
            amount: Decimal::from_str(&amount)
                .with_context(|| format!("invalid persisted amount {amount}"))?,
            version: version as u64,
            updated_at: updated_at as u64,
        });
    }
    Ok(balances)
}

fn load_wagers_sqlite(
    conn: &Connection,
    max_per_wallet: Option<usize>,
) -> anyhow::Result<Vec<WagerRecord>> {
    match max_per_wallet {
        Some(limit) => load_records_sqlite(
            conn,
            &format!(
                "SELECT record FROM (
                     SELECT record, id, ROW_NUMBER() OVER (PARTITION BY wallet ORDER BY id DESC) AS rn
                     FROM wagers
                 ) WHERE rn <= {limit} ORDER BY id ASC"
            ),
        ),
        None => load_records_sqlite(conn, "SELECT record FROM wagers ORDER BY id ASC"),
    }
}

fn load_records_sqlite<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    query: &str,
) -> anyhow::Result<Vec<T>> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut records = Vec::new();
    for row in rows {
        let json = row?;
        records.push(serde_json::from_str(&json).context("decode persisted record")?);
    }
    Ok(records)
}

fn write_request(conn: &Connection, request: &PersistRequest) -> anyhow::Result<()> {
    match request {
        PersistRequest::Balance(snapshot) => {
            conn.execute(
                "INSERT INTO balances (wallet, token, amount, version, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(wallet, token) DO UPDATE SET
                     amount = excluded.amount,
                     version = excluded.version,
                     updated_at = excluded.updated_at
                 WHERE excluded.version > balances.version",
                params![
                    snapshot.wallet.as_str(),
                    snapshot.token.as_str(),
                    snapshot.amount.to_string(),
                    snapshot.version as i64,
                    snapshot.updated_at as i64,
                ],
            )?;
        }
        PersistRequest::Deposit(record) => {
            conn.execute(
                "INSERT OR IGNORE INTO deposits (id, tx_id, wallet, record) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id as i64,
                    record.tx_id,
                    record.wallet.as_str(),
                    serde_json::to_string(record)?,
                ],
            )?;
        }
        PersistRequest::Wager(record) => {
            conn.execute(
                "INSERT OR IGNORE INTO wagers (id, wallet, auth_id, record) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id as i64,
                    record.wallet.as_str(),
                    record.authorization.to_string(),
                    serde_json::to_string(record)?,
                ],
            )?;
        }
        PersistRequest::Withdrawal(record) => {
            conn.execute(
                "INSERT OR REPLACE INTO withdrawals (id, wallet, status, record) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id as i64,
                    record.wallet.as_str(),
                    match record.status {
                        WithdrawalStatus::Pending => "pending",
                    },
                    serde_json::to_string(record)?,
                ],
            )?;
        }
        PersistRequest::Flush(_) => {}
    }
    Ok(())
}

fn persistence_worker(path: PathBuf, mut receiver: mpsc::Receiver<PersistRequest>) {
    let conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            error!("House persistence open failed: {err}");
            return;
        }
    };

    if let Err(err) = init_schema_sqlite(&conn) {
        error!("House persistence init failed: {err}");
        return;
    }

    while let Some(request) = receiver.blocking_recv() {
        if let PersistRequest::Flush(done) = request {
            let _ = done.send(());
            continue;
        }
        if let Err(err) = write_request(&conn, &request) {
            error!("House persistence write failed: {err}");
        }
    }
}
