use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::schema::{Schema, SCHEMA_VERSION};
use crate::error::{DataFlagError, Result};
use crate::flag::{Flag, FlagId, FlagStatus, NewFlag, StatusChange, StatusRecord};
use crate::index::IntervalIndex;
use crate::interval::{Interval, TimeRange};
use crate::provenance::{ClientInfo, DataRevision};
use crate::registry::{FlagType, FlagTypeRegistry};
use crate::scope::Scope;
use crate::store::{FlagFilter, FlagStore, VoteStore};
use crate::vote::{Decision, Vote};

const FLAG_SELECT: &str = "SELECT f.id, f.type_code, f.start_time, f.finish_time, f.scope, f.notes, \
                           f.metadata, f.status, f.superseded_by, f.created_at, f.created_by, f.version, \
                           r.name, c.client_name, c.client_version
                           FROM flags f
                           LEFT JOIN data_revisions r ON r.id = f.revision_id
                           LEFT JOIN flag_clients c ON c.id = f.client_id";

const VOTE_SELECT: &str = "SELECT v.flag_id, v.reviewer_id, v.decision, v.cast_at, v.notes, \
                           r.name, c.client_name, c.client_version
                           FROM flag_votes v
                           LEFT JOIN data_revisions r ON r.id = v.revision_id
                           LEFT JOIN flag_clients c ON c.id = v.client_id";

/// Connection settings supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound on waiting for another writer; exceeding it aborts the
    /// transaction with a timeout error.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Interval index tagged with the store generation it was built from.
#[derive(Debug)]
struct IndexSnapshot {
    generation: i64,
    index: IntervalIndex,
}

/// Time and store generation shared by every row one write touches.
#[derive(Debug, Clone, Copy)]
struct WriteStamp {
    at: DateTime<Utc>,
    generation: i64,
}

/// SQLite-backed implementation of the FlagStore and VoteStore traits.
///
/// Several processes may open the same database file; every write runs in a
/// `BEGIN IMMEDIATE` transaction and status changes are check-and-set on the
/// row version.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    registry: RwLock<FlagTypeRegistry>,
    index: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_with_connection(conn, options)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_with_connection(conn, StoreOptions::default())
    }

    fn init_with_connection(mut conn: Connection, options: StoreOptions) -> Result<Self> {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        Self::initialize(&mut conn)?;
        let registry = Self::load_registry(&conn)?;
        tracing::debug!(types = registry.len(), "Opened flag store");
        Ok(Self {
            conn: Mutex::new(conn),
            registry: RwLock::new(registry),
            index: RwLock::new(None),
        })
    }

    /// Create tables or run migrations.
    fn initialize(conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let has_version_table: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )?;
        let current_version: u32 = if has_version_table {
            tx.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )?
        } else {
            0
        };

        if current_version == 0 {
            tx.execute_batch(Schema::create_tables())?;
            tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
        } else if current_version < SCHEMA_VERSION {
            for version in current_version..SCHEMA_VERSION {
                if let Some(migration) = Schema::migration(version, version + 1) {
                    tracing::info!(from = version, to = version + 1, "Migrating flag database");
                    tx.execute_batch(migration)?;
                }
            }
            tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
        } else if current_version > SCHEMA_VERSION {
            return Err(DataFlagError::Configuration(format!(
                "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DataFlagError::Storage(e.to_string()))
    }

    /// Run `op` inside an immediate (write-locking) transaction.
    ///
    /// Any error rolls the transaction back and leaves state unchanged.
    fn write<T>(&self, op: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Advance the write generation for a write that changes flag rows.
    fn stamp(conn: &Connection) -> Result<WriteStamp> {
        let generation = conn.query_row(
            "UPDATE store_generation SET generation = generation + 1 WHERE id = 1 RETURNING generation",
            [],
            |row| row.get(0),
        )?;
        Ok(WriteStamp {
            at: Utc::now(),
            generation,
        })
    }

    // ==================== Flag types ====================

    fn load_registry(conn: &Connection) -> Result<FlagTypeRegistry> {
        let mut stmt = conn.prepare(
            "SELECT code, description, severity, metadata FROM flag_types ORDER BY position",
        )?;
        let types = stmt
            .query_map([], |row| {
                let metadata: Option<String> = row.get(3)?;
                Ok(FlagType {
                    code: row.get(0)?,
                    description: row.get(1)?,
                    severity: row.get(2)?,
                    metadata: metadata.map(|m| parse_json(3, &m)).transpose()?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        FlagTypeRegistry::from_types(types)
    }

    fn reload_registry(&self) -> Result<()> {
        let registry = {
            let conn = self.lock()?;
            Self::load_registry(&conn)?
        };
        *self
            .registry
            .write()
            .map_err(|e| DataFlagError::Storage(e.to_string()))? = registry;
        Ok(())
    }

    fn cached_type(&self, code: &str) -> Result<Option<FlagType>> {
        let registry = self
            .registry
            .read()
            .map_err(|e| DataFlagError::Storage(e.to_string()))?;
        Ok(registry.get(code).ok().cloned())
    }

    // ==================== Provenance ====================

    /// Row id of a registered revision.
    fn revision_id(conn: &Connection, name: Option<&str>) -> Result<Option<i64>> {
        let Some(name) = name else {
            return Ok(None);
        };
        conn.query_row(
            "SELECT id FROM data_revisions WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?
        .map(Some)
        .ok_or_else(|| DataFlagError::UnknownRevision(name.to_string()))
    }

    /// Row id of a client version, recorded on first use.
    fn client_id(conn: &Connection, client: Option<&ClientInfo>) -> Result<Option<i64>> {
        let Some(client) = client else {
            return Ok(None);
        };
        conn.execute(
            "INSERT INTO flag_clients (client_name, client_version) VALUES (?1, ?2)
             ON CONFLICT(client_name, client_version) DO NOTHING",
            params![client.name, client.version],
        )?;
        let id = conn.query_row(
            "SELECT id FROM flag_clients WHERE client_name = ?1 AND client_version = ?2",
            params![client.name, client.version],
            |row| row.get(0),
        )?;
        Ok(Some(id))
    }

    // ==================== Flags ====================

    fn load_flag(conn: &Connection, id: FlagId) -> Result<Option<Flag>> {
        let sql = format!("{FLAG_SELECT} WHERE f.id = ?1");
        Ok(conn.query_row(&sql, [id.0], row_to_flag).optional()?)
    }

    fn load_flags(
        conn: &Connection,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Flag>> {
        let sql = format!("{FLAG_SELECT} {where_clause}");
        let mut stmt = conn.prepare(&sql)?;
        let flags = stmt
            .query_map(args, row_to_flag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flags)
    }

    /// Check the interval and type of a flag before opening a transaction.
    fn validate_new(&self, new_flag: &NewFlag) -> Result<Interval> {
        let interval = Interval::new(new_flag.start, new_flag.end)?;
        self.flag_type(&new_flag.flag_type)?;
        Ok(interval)
    }

    /// Insert a proposed flag.
    fn insert_flag(
        conn: &Connection,
        new_flag: NewFlag,
        interval: Interval,
        stamp: WriteStamp,
    ) -> Result<Flag> {
        let scope_json = serde_json::to_string(&new_flag.scope)?;
        let metadata_json = new_flag
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let revision_id = Self::revision_id(conn, new_flag.revision.as_deref())?;
        let client_id = Self::client_id(conn, new_flag.client.as_ref())?;

        conn.execute(
            "INSERT INTO flags
             (type_code, start_time, finish_time, scope, notes, metadata, status, created_at, created_by,
              version, revision_id, client_id, row_generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?12)",
            params![
                new_flag.flag_type,
                interval.start,
                interval.end,
                scope_json,
                new_flag.notes,
                metadata_json,
                FlagStatus::Proposed.as_str(),
                format_time(&stamp.at),
                new_flag.created_by,
                revision_id,
                client_id,
                stamp.generation,
            ],
        )?;
        Ok(Flag {
            id: FlagId(conn.last_insert_rowid()),
            flag_type: new_flag.flag_type,
            interval,
            scope: new_flag.scope,
            notes: new_flag.notes,
            metadata: new_flag.metadata,
            status: FlagStatus::Proposed,
            superseded_by: None,
            created_at: stamp.at,
            created_by: new_flag.created_by,
            revision: new_flag.revision,
            client: new_flag.client,
            version: 0,
        })
    }

    /// Check-and-set the status of `flag` and append to the history.
    fn write_status(
        conn: &Connection,
        flag: &Flag,
        to: FlagStatus,
        superseded_by: Option<FlagId>,
        stamp: WriteStamp,
    ) -> Result<Flag> {
        let version = flag.version + 1;
        let rows = conn.execute(
            "UPDATE flags SET status = ?1, version = ?2, superseded_by = COALESCE(?3, superseded_by),
                 row_generation = ?4
             WHERE id = ?5 AND version = ?6",
            params![
                to.as_str(),
                version,
                superseded_by.map(|id| id.0),
                stamp.generation,
                flag.id.0,
                flag.version
            ],
        )?;
        if rows == 0 {
            let actual: u64 = conn.query_row(
                "SELECT version FROM flags WHERE id = ?1",
                [flag.id.0],
                |row| row.get(0),
            )?;
            return Err(DataFlagError::Conflict {
                id: flag.id,
                expected: flag.version,
                actual,
            });
        }
        conn.execute(
            "INSERT INTO flag_status_history (flag_id, from_status, to_status, version, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                flag.id.0,
                flag.status.as_str(),
                to.as_str(),
                version,
                format_time(&stamp.at)
            ],
        )?;
        Ok(Flag {
            status: to,
            version,
            superseded_by: superseded_by.or(flag.superseded_by),
            ..flag.clone()
        })
    }

    /// Move `current` to `to`; activation retires the active flags it covers.
    ///
    /// The caller has already checked the transition table.
    fn transition(
        conn: &Connection,
        current: Flag,
        to: FlagStatus,
        stamp: WriteStamp,
    ) -> Result<StatusChange> {
        let flag = Self::write_status(conn, &current, to, None, stamp)?;

        let mut superseded = Vec::new();
        if to == FlagStatus::Active {
            let candidates = Self::load_flags(
                conn,
                "WHERE f.type_code = ?1 AND f.status = 'active' AND f.id != ?2 AND f.start_time >= ?3",
                &[&flag.flag_type, &flag.id.0, &flag.interval.start],
            )?;
            for candidate in candidates.iter().filter(|c| flag.subsumes(c)) {
                Self::write_status(conn, candidate, FlagStatus::Superseded, Some(flag.id), stamp)?;
                superseded.push(candidate.id);
            }
        }

        Ok(StatusChange {
            flag,
            previous: current.status,
            superseded,
        })
    }

    fn log_change(change: &StatusChange) {
        let id = change.flag.id;
        tracing::info!(
            flag = %id,
            from = %change.previous,
            to = %change.flag.status,
            version = change.flag.version,
            "Flag status changed"
        );
        for superseded in &change.superseded {
            tracing::info!(flag = %superseded, by = %id, "Flag superseded");
        }
    }

    /// Current interval index, refreshed if another write happened since.
    fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.refresh_index().map(|(snapshot, _)| snapshot)
    }

    /// Bring the cached index up to the stored generation.
    ///
    /// Only rows written after the cached generation are read and merged in.
    /// Also returns how many flag rows were read.
    fn refresh_index(&self) -> Result<(Arc<IndexSnapshot>, usize)> {
        // Held until the cache is replaced, so refreshes apply in order.
        let mut conn = self.lock()?;
        // Deferred read transaction: generation and rows come from one snapshot.
        let tx = conn.transaction()?;
        let generation: i64 = tx.query_row(
            "SELECT generation FROM store_generation WHERE id = 1",
            [],
            |row| row.get(0),
        )?;

        let cached = self
            .index
            .read()
            .map_err(|e| DataFlagError::Storage(e.to_string()))?
            .clone();
        let (index, loaded) = match cached {
            Some(snapshot) if snapshot.generation == generation => return Ok((snapshot, 0)),
            Some(snapshot) => {
                let changed = Self::load_flags(
                    &tx,
                    "WHERE f.row_generation > ?1",
                    &[&snapshot.generation],
                )?;
                let loaded = changed.len();
                (snapshot.index.merged(changed), loaded)
            }
            None => {
                let flags = Self::load_flags(&tx, "", &[])?;
                let loaded = flags.len();
                (IntervalIndex::new(flags), loaded)
            }
        };
        tx.commit()?;

        let snapshot = Arc::new(IndexSnapshot { generation, index });
        tracing::debug!(
            generation,
            loaded,
            flags = snapshot.index.len(),
            "Refreshed interval index"
        );
        *self
            .index
            .write()
            .map_err(|e| DataFlagError::Storage(e.to_string()))? = Some(Arc::clone(&snapshot));
        drop(conn);
        Ok((snapshot, loaded))
    }
}

impl FlagStore for SqliteStore {
    fn register_type(&self, flag_type: FlagType) -> Result<FlagType> {
        let metadata = flag_type
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.write(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM flag_types WHERE code = ?1)",
                [&flag_type.code],
                |row| row.get(0),
            )?;
            if exists {
                return Err(DataFlagError::DuplicateType(flag_type.code.clone()));
            }
            tx.execute(
                "INSERT INTO flag_types (code, description, severity, metadata) VALUES (?1, ?2, ?3, ?4)",
                params![
                    flag_type.code,
                    flag_type.description,
                    flag_type.severity,
                    metadata
                ],
            )?;
            Ok(())
        })?;
        self.reload_registry()?;
        tracing::info!(code = %flag_type.code, severity = flag_type.severity, "Registered flag type");
        Ok(flag_type)
    }

    fn flag_type(&self, code: &str) -> Result<FlagType> {
        if let Some(flag_type) = self.cached_type(code)? {
            return Ok(flag_type);
        }
        // Another process may have registered it since we loaded.
        self.reload_registry()?;
        self.cached_type(code)?
            .ok_or_else(|| DataFlagError::UnknownType(code.to_string()))
    }

    fn flag_types(&self) -> Result<Vec<FlagType>> {
        self.reload_registry()?;
        let registry = self
            .registry
            .read()
            .map_err(|e| DataFlagError::Storage(e.to_string()))?;
        Ok(registry.list().to_vec())
    }

    fn register_revision(&self, revision: DataRevision) -> Result<DataRevision> {
        self.write(|tx| {
            let rows = tx.execute(
                "INSERT INTO data_revisions (name, description) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
                params![revision.name, revision.description],
            )?;
            if rows == 0 {
                return Err(DataFlagError::DuplicateRevision(revision.name.clone()));
            }
            Ok(())
        })?;
        tracing::info!(revision = %revision.name, "Registered data revision");
        Ok(revision)
    }

    fn revisions(&self) -> Result<Vec<DataRevision>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name, description FROM data_revisions ORDER BY id")?;
        let revisions = stmt
            .query_map([], |row| {
                Ok(DataRevision {
                    name: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(revisions)
    }

    fn create(&self, new_flag: NewFlag) -> Result<Flag> {
        let interval = self.validate_new(&new_flag)?;
        let flag = self.write(|tx| {
            let stamp = Self::stamp(tx)?;
            Self::insert_flag(tx, new_flag, interval, stamp)
        })?;

        tracing::info!(flag = %flag.id, flag_type = %flag.flag_type, by = %flag.created_by, "Created flag");
        Ok(flag)
    }

    fn create_active(&self, new_flag: NewFlag) -> Result<StatusChange> {
        let interval = self.validate_new(&new_flag)?;
        let change = self.write(|tx| {
            let stamp = Self::stamp(tx)?;
            let flag = Self::insert_flag(tx, new_flag, interval, stamp)?;
            Self::transition(tx, flag, FlagStatus::Active, stamp)
        })?;

        tracing::info!(
            flag = %change.flag.id,
            flag_type = %change.flag.flag_type,
            by = %change.flag.created_by,
            "Created active flag"
        );
        Self::log_change(&change);
        Ok(change)
    }

    fn get(&self, id: FlagId) -> Result<Flag> {
        let conn = self.lock()?;
        Self::load_flag(&conn, id)?.ok_or(DataFlagError::NotFound(id))
    }

    fn update_notes(&self, id: FlagId, notes: Option<String>) -> Result<Flag> {
        self.write(|tx| {
            let stamp = Self::stamp(tx)?;
            let rows = tx.execute(
                "UPDATE flags SET notes = ?1, row_generation = ?2 WHERE id = ?3",
                params![notes, stamp.generation, id.0],
            )?;
            if rows == 0 {
                return Err(DataFlagError::NotFound(id));
            }
            Self::load_flag(tx, id)?.ok_or(DataFlagError::NotFound(id))
        })
    }

    fn update_status(
        &self,
        id: FlagId,
        new_status: FlagStatus,
        expected_version: Option<u64>,
    ) -> Result<StatusChange> {
        let change = self.write(|tx| {
            let current = Self::load_flag(tx, id)?.ok_or(DataFlagError::NotFound(id))?;
            if let Some(expected) = expected_version {
                if current.version != expected {
                    return Err(DataFlagError::Conflict {
                        id,
                        expected,
                        actual: current.version,
                    });
                }
            }
            if !current.status.can_transition_to(&new_status) {
                return Err(DataFlagError::InvalidTransition {
                    id,
                    from: current.status,
                    to: new_status,
                });
            }

            let stamp = Self::stamp(tx)?;
            Self::transition(tx, current, new_status, stamp)
        })?;

        Self::log_change(&change);
        Ok(change)
    }

    fn query_overlapping(&self, range: &TimeRange, filter: &FlagFilter) -> Result<Vec<Flag>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .index
            .query(range)
            .into_iter()
            .filter(|flag| filter.matches(flag))
            .cloned()
            .collect())
    }

    fn status_history(&self, id: FlagId) -> Result<Vec<StatusRecord>> {
        let conn = self.lock()?;
        if Self::load_flag(&conn, id)?.is_none() {
            return Err(DataFlagError::NotFound(id));
        }
        let mut stmt = conn.prepare(
            "SELECT flag_id, from_status, to_status, version, changed_at
             FROM flag_status_history WHERE flag_id = ?1 ORDER BY seq",
        )?;
        let records = stmt
            .query_map([id.0], |row| {
                let from: String = row.get(1)?;
                let to: String = row.get(2)?;
                let changed_at: String = row.get(4)?;
                Ok(StatusRecord {
                    flag_id: FlagId(row.get(0)?),
                    from: parse_status(1, &from)?,
                    to: parse_status(2, &to)?,
                    version: row.get(3)?,
                    changed_at: parse_time(4, &changed_at)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl VoteStore for SqliteStore {
    fn upsert_vote(&self, vote: Vote) -> Result<Vote> {
        self.write(|tx| {
            let flag = Self::load_flag(tx, vote.flag_id)?
                .ok_or(DataFlagError::NotFound(vote.flag_id))?;
            if flag.status != FlagStatus::Proposed {
                return Err(DataFlagError::InvalidState {
                    id: flag.id,
                    status: flag.status,
                    reviewer: vote.reviewer_id.clone(),
                });
            }
            let revision_id = Self::revision_id(tx, vote.revision.as_deref())?;
            let client_id = Self::client_id(tx, vote.client.as_ref())?;
            tx.execute(
                "INSERT INTO flag_votes (flag_id, reviewer_id, decision, cast_at, notes, revision_id, client_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(flag_id, reviewer_id) DO UPDATE SET
                     decision = excluded.decision,
                     cast_at = excluded.cast_at,
                     notes = excluded.notes,
                     revision_id = excluded.revision_id,
                     client_id = excluded.client_id",
                params![
                    vote.flag_id.0,
                    vote.reviewer_id,
                    vote.decision.as_str(),
                    format_time(&vote.cast_at),
                    vote.notes,
                    revision_id,
                    client_id,
                ],
            )?;
            Ok(())
        })?;
        tracing::debug!(flag = %vote.flag_id, reviewer = %vote.reviewer_id, decision = %vote.decision, "Recorded vote");
        Ok(vote)
    }

    fn votes(&self, flag_id: FlagId) -> Result<Vec<Vote>> {
        let conn = self.lock()?;
        let sql = format!("{VOTE_SELECT} WHERE v.flag_id = ?1 ORDER BY v.cast_at, v.reviewer_id");
        let mut stmt = conn.prepare(&sql)?;
        let votes = stmt
            .query_map([flag_id.0], |row| {
                let decision: String = row.get(2)?;
                let cast_at: String = row.get(3)?;
                Ok(Vote {
                    flag_id: FlagId(row.get(0)?),
                    reviewer_id: row.get(1)?,
                    decision: decision
                        .parse::<Decision>()
                        .map_err(|e| conversion_error(2, e))?,
                    cast_at: parse_time(3, &cast_at)?,
                    notes: row.get(4)?,
                    revision: row.get(5)?,
                    client: client_from_row(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }
}

fn row_to_flag(row: &Row<'_>) -> rusqlite::Result<Flag> {
    let scope: String = row.get(4)?;
    let metadata: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;

    Ok(Flag {
        id: FlagId(row.get(0)?),
        flag_type: row.get(1)?,
        interval: Interval {
            start: row.get(2)?,
            end: row.get(3)?,
        },
        scope: serde_json::from_str::<Scope>(&scope).map_err(|e| conversion_error(4, e))?,
        notes: row.get(5)?,
        metadata: metadata.map(|m| parse_json(6, &m)).transpose()?,
        status: parse_status(7, &status)?,
        superseded_by: row.get::<_, Option<i64>>(8)?.map(FlagId),
        created_at: parse_time(9, &created_at)?,
        created_by: row.get(10)?,
        version: row.get(11)?,
        revision: row.get(12)?,
        client: client_from_row(row, 13)?,
    })
}

/// Client name and version from two adjacent LEFT JOIN columns.
fn client_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<ClientInfo>> {
    let name: Option<String> = row.get(idx)?;
    let version: Option<String> = row.get(idx + 1)?;
    Ok(name.zip(version).map(|(name, version)| ClientInfo { name, version }))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_status(idx: usize, s: &str) -> rusqlite::Result<FlagStatus> {
    s.parse().map_err(|e: String| conversion_error(idx, e))
}

fn parse_json(idx: usize, s: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e))
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Fixed-width RFC 3339 so stored times sort lexically.
fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}
