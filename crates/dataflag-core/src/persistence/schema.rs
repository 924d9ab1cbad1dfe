//! SQLite schema for flag storage

/// Schema version for migrations
pub const SCHEMA_VERSION: u32 = 2;

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// Get the complete schema SQL
    pub fn create_tables() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Flag types, in registration order
CREATE TABLE IF NOT EXISTS flag_types (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    description TEXT,
    severity INTEGER NOT NULL,
    metadata TEXT
);

-- Pipeline revisions that flags and votes refer to
CREATE TABLE IF NOT EXISTS data_revisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

-- Client software versions that wrote flags and votes
CREATE TABLE IF NOT EXISTS flag_clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_name TEXT NOT NULL,
    client_version TEXT NOT NULL,
    UNIQUE (client_name, client_version)
);

-- Flags (append-only; status is the only lifecycle field)
CREATE TABLE IF NOT EXISTS flags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type_code TEXT NOT NULL REFERENCES flag_types(code),
    start_time REAL NOT NULL,
    finish_time REAL,
    scope TEXT NOT NULL,
    notes TEXT,
    metadata TEXT,
    status TEXT NOT NULL
        CHECK (status IN ('proposed', 'active', 'rejected', 'superseded')),
    superseded_by INTEGER REFERENCES flags(id),
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    revision_id INTEGER REFERENCES data_revisions(id),
    client_id INTEGER REFERENCES flag_clients(id),
    -- store generation of the last write to this row
    row_generation INTEGER NOT NULL DEFAULT 0,
    CHECK (finish_time IS NULL OR start_time <= finish_time)
);

CREATE INDEX IF NOT EXISTS idx_flags_interval ON flags(start_time, finish_time);
CREATE INDEX IF NOT EXISTS idx_flags_type_status ON flags(type_code, status, start_time);
CREATE INDEX IF NOT EXISTS idx_flags_row_generation ON flags(row_generation);

-- Votes, one per reviewer per flag
CREATE TABLE IF NOT EXISTS flag_votes (
    flag_id INTEGER NOT NULL REFERENCES flags(id),
    reviewer_id TEXT NOT NULL,
    decision TEXT NOT NULL CHECK (decision IN ('approve', 'reject')),
    cast_at TEXT NOT NULL,
    notes TEXT,
    revision_id INTEGER REFERENCES data_revisions(id),
    client_id INTEGER REFERENCES flag_clients(id),
    PRIMARY KEY (flag_id, reviewer_id)
);

-- Status history (append-only audit log)
CREATE TABLE IF NOT EXISTS flag_status_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    flag_id INTEGER NOT NULL REFERENCES flags(id),
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    version INTEGER NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_flag ON flag_status_history(flag_id);

-- Write generation; bumped whenever flag rows change
CREATE TABLE IF NOT EXISTS store_generation (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    generation INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_generation (id, generation) VALUES (1, 0);
"#
    }

    /// Get migration SQL for a specific version
    pub fn migration(from_version: u32, to_version: u32) -> Option<&'static str> {
        match (from_version, to_version) {
            (1, 2) => Some(
                r#"
CREATE TABLE IF NOT EXISTS data_revisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);
CREATE TABLE IF NOT EXISTS flag_clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_name TEXT NOT NULL,
    client_version TEXT NOT NULL,
    UNIQUE (client_name, client_version)
);
ALTER TABLE flags ADD COLUMN revision_id INTEGER REFERENCES data_revisions(id);
ALTER TABLE flags ADD COLUMN client_id INTEGER REFERENCES flag_clients(id);
ALTER TABLE flags ADD COLUMN row_generation INTEGER NOT NULL DEFAULT 0;
CREATE INDEX IF NOT EXISTS idx_flags_row_generation ON flags(row_generation);
ALTER TABLE flag_votes ADD COLUMN revision_id INTEGER REFERENCES data_revisions(id);
ALTER TABLE flag_votes ADD COLUMN client_id INTEGER REFERENCES flag_clients(id);
"#,
            ),
            _ => None,
        }
    }
}
