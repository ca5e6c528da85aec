//! V002: incremental scan state and the PII review queue.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repository_state (
    repository TEXT PRIMARY KEY,
    last_commit TEXT NOT NULL,
    branch TEXT,
    scanned_at TEXT NOT NULL
) STRICT;

-- Per-file analysis cache, reused while the content hash is unchanged.
CREATE TABLE IF NOT EXISTS file_snapshots (
    repository TEXT NOT NULL,
    file_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (repository, file_path)
) STRICT;

CREATE TABLE IF NOT EXISTS pii_review_queue (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    field_path TEXT NOT NULL,
    pii_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    detection TEXT NOT NULL,
    evidence TEXT NOT NULL DEFAULT '[]',
    enqueued_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'confirmed', 'dismissed'))
) STRICT;

CREATE INDEX IF NOT EXISTS idx_pii_review_status ON pii_review_queue(status, enqueued_at);
"#;
