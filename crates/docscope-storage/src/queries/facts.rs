//! Per-kind fact tables. Each row carries the serialized fact plus a few
//! denormalized columns.

use docscope_core::errors::StorageError;
use docscope_core::model::{EntityId, EntityType, Fact};
use rusqlite::{params, Connection, OptionalExtension};

use super::{from_json, to_json};
use crate::sqlite_err;

pub fn table_for(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::CodeType => "code_types",
        EntityType::CollectionMapping => "collection_mappings",
        EntityType::QueryOperation => "query_operations",
        EntityType::DataRelationship => "data_relationships",
        EntityType::ObservedSchema => "observed_schemas",
    }
}

pub fn upsert_fact(conn: &Connection, fact: &Fact) -> Result<(), StorageError> {
    let table = table_for(fact.entity_type());
    let payload = to_json(table, fact)?;
    let id = fact.id().as_str();
    let repository = &fact.provenance().repository;

    let written = match fact {
        Fact::CodeType(t) => conn
            .prepare_cached(
                "INSERT OR REPLACE INTO code_types (entity_id, repository, namespace, name, kind, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![id, repository, t.namespace, t.name, t.kind.name(), payload])
            }),
        Fact::CollectionMapping(m) => conn
            .prepare_cached(
                "INSERT OR REPLACE INTO collection_mappings
                    (entity_id, repository, type_name, collection_name, method, confidence, is_primary, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id,
                    repository,
                    m.type_name,
                    m.collection_name,
                    m.method.name(),
                    m.confidence,
                    m.is_primary,
                    payload
                ])
            }),
        Fact::QueryOperation(o) => conn
            .prepare_cached(
                "INSERT OR REPLACE INTO query_operations
                    (entity_id, repository, kind, collection_name, collection_mapping_id, is_transactional, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id,
                    repository,
                    o.kind.name(),
                    o.collection_name,
                    o.collection_mapping.id.as_str(),
                    o.is_transactional,
                    payload
                ])
            }),
        Fact::DataRelationship(r) => conn
            .prepare_cached(
                "INSERT OR REPLACE INTO data_relationships
                    (entity_id, repository, source_id, target_id, relationship_type, confidence, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id,
                    repository,
                    r.source.id.as_str(),
                    r.target.id.as_str(),
                    r.relationship_type.name(),
                    r.confidence,
                    payload
                ])
            }),
        Fact::ObservedSchema(s) => conn
            .prepare_cached(
                "INSERT OR REPLACE INTO observed_schemas
                    (entity_id, repository, collection_name, collection_mapping_id, sample_size, pii_redacted, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id,
                    repository,
                    s.collection_name,
                    s.collection_mapping.id.as_str(),
                    s.sample_size as i64,
                    s.pii_redacted,
                    payload
                ])
            }),
    };
    written.map_err(sqlite_err)?;
    Ok(())
}

pub fn get_fact(conn: &Connection, entity_type: EntityType, id: &EntityId) -> Result<Option<Fact>, StorageError> {
    let table = table_for(entity_type);
    let sql = format!("SELECT payload FROM {table} WHERE entity_id = ?1");
    let payload: Option<String> = conn
        .prepare_cached(&sql)
        .and_then(|mut stmt| stmt.query_row(params![id.as_str()], |row| row.get(0)).optional())
        .map_err(sqlite_err)?;
    payload.map(|raw| from_json(table, &raw)).transpose()
}

/// Facts of one repository whose entry is active, ordered by kind then id.
pub fn active_facts(conn: &Connection, repository: &str) -> Result<Vec<Fact>, StorageError> {
    let mut facts = Vec::new();
    for &entity_type in EntityType::all() {
        let table = table_for(entity_type);
        let sql = format!(
            "SELECT f.payload FROM {table} f
             JOIN knowledge_base_entries e ON e.entity_type = ?1 AND e.entity_id = f.entity_id
             WHERE f.repository = ?2 AND e.is_active = 1
             ORDER BY f.entity_id"
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(sqlite_err)?;
        let rows = stmt
            .query_map(params![entity_type.name(), repository], |row| row.get::<_, String>(0))
            .map_err(sqlite_err)?;
        for raw in rows {
            let raw = raw.map_err(sqlite_err)?;
            facts.push(from_json(table, &raw)?);
        }
    }
    Ok(facts)
}
