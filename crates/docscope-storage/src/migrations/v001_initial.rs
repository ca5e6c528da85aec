//! V001: fact tables, knowledge-base entries, provenance and full-text index.

pub const MIGRATION_SQL: &str = r#"
-- One table per fact kind. `payload` is the serialized fact; the other
-- columns are denormalized for ad-hoc queries.
CREATE TABLE IF NOT EXISTS code_types (
    entity_id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    namespace TEXT,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_code_types_repo ON code_types(repository);
CREATE INDEX IF NOT EXISTS idx_code_types_name ON code_types(name);

CREATE TABLE IF NOT EXISTS collection_mappings (
    entity_id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    type_name TEXT NOT NULL,
    collection_name TEXT,
    method TEXT NOT NULL,
    confidence REAL NOT NULL,
    is_primary INTEGER NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_collection_mappings_repo ON collection_mappings(repository);
CREATE INDEX IF NOT EXISTS idx_collection_mappings_collection
    ON collection_mappings(collection_name) WHERE collection_name IS NOT NULL;

CREATE TABLE IF NOT EXISTS query_operations (
    entity_id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    kind TEXT NOT NULL,
    collection_name TEXT,
    collection_mapping_id TEXT NOT NULL,
    is_transactional INTEGER NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_query_operations_repo ON query_operations(repository);
CREATE INDEX IF NOT EXISTS idx_query_operations_mapping ON query_operations(collection_mapping_id);

CREATE TABLE IF NOT EXISTS data_relationships (
    entity_id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_data_relationships_repo ON data_relationships(repository);
CREATE INDEX IF NOT EXISTS idx_data_relationships_source ON data_relationships(source_id);
CREATE INDEX IF NOT EXISTS idx_data_relationships_target ON data_relationships(target_id);

CREATE TABLE IF NOT EXISTS observed_schemas (
    entity_id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    collection_name TEXT NOT NULL,
    collection_mapping_id TEXT NOT NULL,
    sample_size INTEGER NOT NULL,
    pii_redacted INTEGER NOT NULL,
    payload TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_observed_schemas_repo ON observed_schemas(repository);

-- Index entry per fact. Timestamps are RFC 3339 with fixed nanosecond
-- precision so text order is time order.
CREATE TABLE IF NOT EXISTS knowledge_base_entries (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    repository TEXT NOT NULL,
    searchable_text TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    entity_references TEXT NOT NULL DEFAULT '[]',
    last_updated TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_indexed INTEGER NOT NULL DEFAULT 1,
    relevance REAL NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_kb_entries_repo ON knowledge_base_entries(repository, is_active);

CREATE TABLE IF NOT EXISTS provenance_records (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    repository TEXT NOT NULL,
    file_path TEXT NOT NULL,
    symbol TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    commit_id TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    extractor_version TEXT NOT NULL,
    branch TEXT,
    tag TEXT,
    is_clean INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_id),
    FOREIGN KEY (entity_type, entity_id)
        REFERENCES knowledge_base_entries(entity_type, entity_id) ON DELETE CASCADE
) STRICT;

CREATE INDEX IF NOT EXISTS idx_provenance_file ON provenance_records(repository, file_path);

-- Active entries only; rows are removed on retirement.
CREATE VIRTUAL TABLE IF NOT EXISTS kb_fts USING fts5(
    entity_type UNINDEXED,
    entity_id UNINDEXED,
    searchable_text,
    tags,
    repository,
    file_path,
    tokenize = 'unicode61'
);
"#;
