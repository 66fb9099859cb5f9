//! Bucket and entry operations on [`CacheDb`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::RequestKey;
use super::storage::{Bucket, CacheStorage};
use crate::{Error, Response};

const SELECT_ENTRY: &str = "SELECT e.url, e.status_code, e.content_type, e.headers_json, e.body FROM entries e";

/// Raw entry columns before header decoding.
type EntryRow = (String, i64, Option<String>, Option<String>, Vec<u8>);

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_entry(row: EntryRow) -> Result<Response, Error> {
    let (url, status, content_type, headers_json, body) = row;
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("{url}: status {status}")))?;
    let headers = match headers_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?,
        None => Vec::new(),
    };
    Ok(Response { url, status, content_type, headers, body })
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One entry ready to be written, detached from the caller's borrows.
struct EntryWrite {
    bucket: String,
    key: RequestKey,
    snapshot: Response,
    headers_json: String,
    stored_at: String,
}

impl EntryWrite {
    fn new(bucket: &Bucket, key: &RequestKey, response: &Response) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(format!("headers: {e}")))?;
        Ok(Self {
            bucket: bucket.name().to_string(),
            key: key.clone(),
            snapshot: response.clone(),
            headers_json,
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO entries (
                bucket, key_hash, url, status_code, content_type, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(bucket, key_hash) DO UPDATE SET
                url = excluded.url,
                status_code = excluded.status_code,
                content_type = excluded.content_type,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                &self.bucket,
                &self.key.hash,
                &self.key.url,
                self.snapshot.status as i64,
                &self.snapshot.content_type,
                &self.headers_json,
                &self.snapshot.body,
                &self.stored_at,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_bucket(&self, name: &str) -> Result<Bucket, Error> {
        let bucket = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![bucket, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Bucket::opened(name))
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        let hash = key.hash.clone();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!(
                    "{SELECT_ENTRY} JOIN buckets b ON b.name = e.bucket
                     WHERE e.key_hash = ?1 ORDER BY b.rowid ASC LIMIT 1"
                );
                let mut stmt = conn.prepare(&sql)?;
                optional(stmt.query_row(params![hash], read_entry))
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_entry).transpose()
    }

    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let bucket = bucket.to_string();
        let hash = key.hash.clone();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.bucket = ?1 AND e.key_hash = ?2");
                let mut stmt = conn.prepare(&sql)?;
                optional(stmt.query_row(params![bucket, hash], read_entry))
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_entry).transpose()
    }

    async fn put(&self, bucket: &Bucket, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let row = EntryWrite::new(bucket, key, response)?;
        self.conn
            .call(move |conn| -> Result<(), Error> { row.upsert(conn) })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, bucket: &Bucket, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(key, response)| EntryWrite::new(bucket, key, response))
            .collect::<Result<Vec<_>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.upsert(&tx)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn bucket_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<BTreeSet<_>>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_count(&self, bucket: &str) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE bucket = ?1", params![bucket], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
