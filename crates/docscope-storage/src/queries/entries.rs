//! knowledge_base_entries + provenance_records + kb_fts.

use chrono::{DateTime, Utc};
use docscope_core::errors::StorageError;
use docscope_core::model::{
    EntityId, EntityReference, EntityType, KnowledgeBaseEntry, LineSpan, ProvenanceRecord,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{from_json, from_sql_time, to_json, to_sql_time};
use crate::sqlite_err;

const ENTRY_COLUMNS: &str = "e.entity_type, e.entity_id, e.searchable_text, e.tags,
    e.entity_references, e.last_updated, e.is_active, e.is_indexed, e.relevance,
    e.content_hash, p.repository, p.file_path, p.symbol, p.line_start, p.line_end,
    p.commit_id, p.extracted_at, p.extractor_version, p.branch, p.tag, p.is_clean";

const ENTRY_JOIN: &str = "knowledge_base_entries e
    JOIN provenance_records p ON p.entity_type = e.entity_type AND p.entity_id = e.entity_id";

/// Row as stored; decoded outside the rusqlite row callback so JSON and
/// timestamp failures surface as `StorageError`.
struct EntryRow {
    entity_type: String,
    entity_id: String,
    searchable_text: String,
    tags: String,
    references: String,
    last_updated: String,
    is_active: bool,
    is_indexed: bool,
    relevance: f64,
    content_hash: String,
    repository: String,
    file_path: String,
    symbol: String,
    line_start: u32,
    line_end: u32,
    commit_id: String,
    extracted_at: String,
    extractor_version: String,
    branch: Option<String>,
    tag: Option<String>,
    is_clean: bool,
}

impl EntryRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entity_type: row.get(0)?,
            entity_id: row.get(1)?,
            searchable_text: row.get(2)?,
            tags: row.get(3)?,
            references: row.get(4)?,
            last_updated: row.get(5)?,
            is_active: row.get(6)?,
            is_indexed: row.get(7)?,
            relevance: row.get(8)?,
            content_hash: row.get(9)?,
            repository: row.get(10)?,
            file_path: row.get(11)?,
            symbol: row.get(12)?,
            line_start: row.get(13)?,
            line_end: row.get(14)?,
            commit_id: row.get(15)?,
            extracted_at: row.get(16)?,
            extractor_version: row.get(17)?,
            branch: row.get(18)?,
            tag: row.get(19)?,
            is_clean: row.get(20)?,
        })
    }

    fn decode(self) -> Result<KnowledgeBaseEntry, StorageError> {
        let entity_type =
            EntityType::from_name(&self.entity_type).ok_or_else(|| StorageError::Serialization {
                entity: "knowledge_base_entries".to_string(),
                message: format!("unknown entity type {}", self.entity_type),
            })?;
        Ok(KnowledgeBaseEntry {
            entity_type,
            entity_id: EntityId::from_raw(self.entity_id),
            searchable_text: self.searchable_text,
            tags: from_json("tags", &self.tags)?,
            references: from_json::<Vec<EntityReference>>("entity_references", &self.references)?,
            last_updated: from_sql_time(&self.last_updated)?,
            is_active: self.is_active,
            is_indexed: self.is_indexed,
            relevance: self.relevance,
            content_hash: self.content_hash,
            provenance: ProvenanceRecord {
                repository: self.repository,
                file_path: self.file_path,
                symbol: self.symbol,
                line_span: LineSpan {
                    start: self.line_start,
                    end: self.line_end,
                },
                commit_id: self.commit_id,
                extracted_at: from_sql_time(&self.extracted_at)?,
                extractor_version: self.extractor_version,
                branch: self.branch,
                tag: self.tag,
                is_clean: self.is_clean,
            },
        })
    }
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<EntryRow>>,
) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
    rows.map(|row| row.map_err(sqlite_err).and_then(EntryRow::decode))
        .collect()
}

pub fn get_entry(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &EntityId,
) -> Result<Option<KnowledgeBaseEntry>, StorageError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM {ENTRY_JOIN}
         WHERE e.entity_type = ?1 AND e.entity_id = ?2"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sqlite_err)?;
    let row = stmt
        .query_row(params![entity_type.name(), entity_id.as_str()], EntryRow::read)
        .optional()
        .map_err(sqlite_err)?;
    row.map(EntryRow::decode).transpose()
}

/// All entries of a repository, active and retired.
pub fn entries_for_repository(
    conn: &Connection,
    repository: &str,
) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM {ENTRY_JOIN}
         WHERE e.repository = ?1"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![repository], EntryRow::read)
        .map_err(sqlite_err)?;
    let mut entries = collect_entries(rows)?;
    entries.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(entries)
}

/// Insert or overwrite an entry, its provenance and its full-text row.
/// Retired entries are kept out of the full-text index.
pub fn upsert_entry(conn: &Connection, entry: &KnowledgeBaseEntry) -> Result<(), StorageError> {
    let entity_type = entry.entity_type.name();
    let entity_id = entry.entity_id.as_str();
    let p = &entry.provenance;
    let tags = to_json("tags", &entry.tags)?;
    let references = to_json("entity_references", &entry.references)?;

    conn.prepare_cached(
        "INSERT INTO knowledge_base_entries
            (entity_type, entity_id, repository, searchable_text, tags, entity_references,
             last_updated, is_active, is_indexed, relevance, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(entity_type, entity_id) DO UPDATE SET
            repository = excluded.repository,
            searchable_text = excluded.searchable_text,
            tags = excluded.tags,
            entity_references = excluded.entity_references,
            last_updated = excluded.last_updated,
            is_active = excluded.is_active,
            is_indexed = excluded.is_indexed,
            relevance = excluded.relevance,
            content_hash = excluded.content_hash",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            entity_type,
            entity_id,
            p.repository,
            entry.searchable_text,
            tags,
            references,
            to_sql_time(&entry.last_updated),
            entry.is_active,
            entry.is_indexed,
            entry.relevance,
            entry.content_hash,
        ])
    })
    .map_err(sqlite_err)?;

    conn.prepare_cached(
        "INSERT OR REPLACE INTO provenance_records
            (entity_type, entity_id, repository, file_path, symbol, line_start, line_end,
             commit_id, extracted_at, extractor_version, branch, tag, is_clean)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            entity_type,
            entity_id,
            p.repository,
            p.file_path,
            p.symbol,
            p.line_span.start,
            p.line_span.end,
            p.commit_id,
            to_sql_time(&p.extracted_at),
            p.extractor_version,
            p.branch,
            p.tag,
            p.is_clean,
        ])
    })
    .map_err(sqlite_err)?;

    remove_from_index(conn, entry.entity_type, &entry.entity_id)?;
    if entry.is_active && entry.is_indexed {
        conn.prepare_cached(
            "INSERT INTO kb_fts (entity_type, entity_id, searchable_text, tags, repository, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .and_then(|mut stmt| {
            stmt.execute(params![
                entity_type,
                entity_id,
                entry.searchable_text,
                entry.tags.join(" "),
                p.repository,
                p.file_path,
            ])
        })
        .map_err(sqlite_err)?;
    }
    Ok(())
}

fn remove_from_index(conn: &Connection, entity_type: EntityType, entity_id: &EntityId) -> Result<(), StorageError> {
    conn.prepare_cached("DELETE FROM kb_fts WHERE entity_type = ?1 AND entity_id = ?2")
        .and_then(|mut stmt| stmt.execute(params![entity_type.name(), entity_id.as_str()]))
        .map_err(sqlite_err)?;
    Ok(())
}

/// Flip an active entry to retired. `last_updated` never moves backwards.
/// Returns whether the entry was active.
pub fn retire_entry(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &EntityId,
    at: &DateTime<Utc>,
) -> Result<bool, StorageError> {
    let changed = conn
        .prepare_cached(
            "UPDATE knowledge_base_entries
             SET is_active = 0, last_updated = max(last_updated, ?3)
             WHERE entity_type = ?1 AND entity_id = ?2 AND is_active = 1",
        )
        .and_then(|mut stmt| {
            stmt.execute(params![entity_type.name(), entity_id.as_str(), to_sql_time(at)])
        })
        .map_err(sqlite_err)?;
    if changed > 0 {
        remove_from_index(conn, entity_type, entity_id)?;
    }
    Ok(changed > 0)
}

/// Turn free text into an FTS5 query: every alphanumeric token quoted and
/// required. `None` when nothing searchable is left.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}

/// Full-text search over active entries, most relevant first.
pub fn search(conn: &Connection, text: &str, limit: usize) -> Result<Vec<KnowledgeBaseEntry>, StorageError> {
    let Some(query) = fts_query(text) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "SELECT {ENTRY_COLUMNS}
         FROM kb_fts
         JOIN knowledge_base_entries e
            ON e.entity_type = kb_fts.entity_type AND e.entity_id = kb_fts.entity_id
         JOIN provenance_records p
            ON p.entity_type = e.entity_type AND p.entity_id = e.entity_id
         WHERE kb_fts MATCH ?1 AND e.is_active = 1
         ORDER BY e.relevance DESC, e.entity_id
         LIMIT ?2"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![query, limit as i64], EntryRow::read)
        .map_err(sqlite_err)?;
    collect_entries(rows)
}

pub fn count_active(conn: &Connection, repository: &str) -> Result<usize, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM knowledge_base_entries WHERE repository = ?1 AND is_active = 1",
        params![repository],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(sqlite_err)
}
