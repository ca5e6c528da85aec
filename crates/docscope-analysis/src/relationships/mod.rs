//! Relationship inference between code types.
//!
//! Each rule contributes one evidence item to an edge keyed by
//! (source, target, relationship type). Edges collect evidence from every
//! rule and file, then get a reliability-weighted confidence.

pub mod rules;

use docscope_core::model::{
    Cardinality, CodeType, CollectionMapping, DataRelationship, EntityId, EntityRef, EntityType,
    EvidenceType, ProvenanceRecord, QueryOperation, RelationshipEvidence,
    RelationshipType, SourceLocation, SourceRevision,
};
use docscope_core::types::{FxHashMap, FxHashSet, SmallVec4};

use crate::resolver::ResolvedMappings;
use crate::semantic::TypeIndex;
use rules::{
    aggregate_confidence, reference_stem, ATTRIBUTE_CONFIDENCE, EMBEDDED_CONFIDENCE,
    FILTER_CONFIDENCE, INHERITANCE_CONFIDENCE, LOOKUP_CONFIDENCE, NAMING_CONFIDENCE,
};

type EdgeKey = (EntityId, EntityId, RelationshipType);

struct EdgeBuilder<'a> {
    source: &'a CodeType,
    target: &'a CodeType,
    relationship_type: RelationshipType,
    cardinality: Cardinality,
    field_path: Option<String>,
    evidence: SmallVec4<RelationshipEvidence>,
    /// Provenance of the strongest evidence seen so far.
    anchor: (f64, ProvenanceRecord),
}

/// One candidate edge from a single rule.
struct Observation<'a> {
    source: &'a CodeType,
    target: &'a CodeType,
    relationship_type: RelationshipType,
    cardinality: Cardinality,
    field_path: Option<String>,
    evidence: RelationshipEvidence,
    provenance: ProvenanceRecord,
}

#[derive(Debug, Default)]
pub struct RelationshipInferencer;

impl RelationshipInferencer {
    pub fn new() -> Self {
        Self
    }

    pub fn infer(
        &self,
        types: &[CodeType],
        mappings: &ResolvedMappings,
        operations: &[QueryOperation],
        revision: &SourceRevision,
    ) -> Vec<DataRelationship> {
        let index = TypeIndex::new(types);
        let mut observations = Vec::new();
        for ty in types {
            declared_members(ty, &index, &mut observations);
        }
        let by_mapping: FxHashMap<&EntityId, &CollectionMapping> =
            mappings.mappings.iter().map(|m| (&m.id, m)).collect();
        let by_type: FxHashMap<&EntityId, &CodeType> = types.iter().map(|t| (&t.id, t)).collect();
        let type_of_mapping = |mapping: &CollectionMapping| {
            mapping
                .code_type
                .as_ref()
                .and_then(|r| by_type.get(&r.id).copied())
        };
        // Untyped handles (`GetCollection<BsonDocument>`) borrow the type of
        // another mapping of the same collection, primary first.
        let type_of_collection = |name: &str| mappings.for_collection(name).find_map(|m| type_of_mapping(m));
        for op in operations {
            let source = by_mapping
                .get(&op.collection_mapping.id)
                .and_then(|m| type_of_mapping(*m))
                .or_else(|| op.collection_name.as_deref().and_then(type_of_collection));
            let Some(source) = source else {
                continue;
            };
            query_evidence(op, source, &index, &type_of_collection, &mut observations);
        }

        let relationships = merge(observations, revision);
        tracing::debug!(
            repository = %revision.repository,
            relationships = relationships.len(),
            "relationships inferred"
        );
        relationships
    }
}

fn location(p: &ProvenanceRecord) -> Option<SourceLocation> {
    Some(SourceLocation {
        file_path: p.file_path.clone(),
        line: p.line_span.start,
    })
}

fn evidence(evidence_type: EvidenceType, confidence: f64, description: String, p: &ProvenanceRecord) -> RelationshipEvidence {
    RelationshipEvidence {
        evidence_type,
        description,
        confidence,
        location: location(p),
    }
}

/// Fields, id references and base types declared on `ty`.
fn declared_members<'a>(ty: &'a CodeType, index: &TypeIndex<'a>, out: &mut Vec<Observation<'a>>) {
    let ns = ty.namespace.as_deref();
    for base in &ty.base_types {
        let Some(target) = index.lookup(base, ns, &[]) else {
            continue;
        };
        if target.id == ty.id {
            continue;
        }
        out.push(Observation {
            source: ty,
            target,
            relationship_type: RelationshipType::Inheritance,
            cardinality: Cardinality::OneToOne,
            field_path: None,
            evidence: evidence(
                EvidenceType::Inheritance,
                INHERITANCE_CONFIDENCE,
                format!("{} derives from {}", ty.name, target.name),
                &ty.provenance,
            ),
            provenance: ty.provenance.clone(),
        });
    }

    for field in &ty.fields {
        if let Some(target) = index.lookup(field.value_type(), ns, &[]) {
            let (relationship_type, cardinality) = if field.is_collection {
                (RelationshipType::Composition, Cardinality::OneToMany)
            } else {
                (RelationshipType::Embedded, Cardinality::OneToOne)
            };
            out.push(Observation {
                source: ty,
                target,
                relationship_type,
                cardinality,
                field_path: Some(field.name.clone()),
                evidence: evidence(
                    EvidenceType::Embedded,
                    EMBEDDED_CONFIDENCE,
                    format!("{}.{} is declared as {}", ty.name, field.name, field.field_type),
                    &ty.provenance,
                ),
                provenance: ty.provenance.clone(),
            });
            continue;
        }
        if field.is_id {
            continue;
        }
        let Some((stem, plural)) = reference_stem(&field.name) else {
            continue;
        };
        let Some(target) = index.by_name_ignore_case(stem) else {
            continue;
        };
        if target.id == ty.id {
            continue;
        }
        let (relationship_type, cardinality) = if plural && field.is_collection {
            (RelationshipType::Aggregation, Cardinality::ManyToMany)
        } else if plural {
            continue;
        } else {
            (RelationshipType::RefersTo, Cardinality::ManyToOne)
        };
        out.push(Observation {
            source: ty,
            target,
            relationship_type,
            cardinality,
            field_path: Some(field.name.clone()),
            evidence: evidence(
                EvidenceType::NamingConvention,
                NAMING_CONFIDENCE,
                format!("{}.{} follows the {{Type}}Id convention", ty.name, field.name),
                &ty.provenance,
            ),
            provenance: ty.provenance.clone(),
        });
        let object_id = field.attributes.iter().any(|a| {
            a.name == "BsonRepresentation" && a.arguments.iter().any(|arg| arg.contains("ObjectId"))
        });
        if object_id && relationship_type == RelationshipType::RefersTo {
            out.push(Observation {
                source: ty,
                target,
                relationship_type,
                cardinality,
                field_path: Some(field.name.clone()),
                evidence: evidence(
                    EvidenceType::Attribute,
                    ATTRIBUTE_CONFIDENCE,
                    format!("{}.{} is stored as an ObjectId", ty.name, field.name),
                    &ty.provenance,
                ),
                provenance: ty.provenance.clone(),
            });
        }
    }
}

/// Filter paths naming another type's key, and `$lookup` stages.
fn query_evidence<'a>(
    op: &QueryOperation,
    source: &'a CodeType,
    index: &TypeIndex<'a>,
    type_of_collection: &dyn Fn(&str) -> Option<&'a CodeType>,
    out: &mut Vec<Observation<'a>>,
) {
    let collection = op.collection_name.as_deref().unwrap_or("?");
    for filter in &op.filters {
        let last = filter.path.rsplit('.').next().unwrap_or(&filter.path);
        let Some((stem, false)) = reference_stem(last) else {
            continue;
        };
        let Some(target) = index.by_name_ignore_case(stem) else {
            continue;
        };
        if target.id == source.id {
            continue;
        }
        out.push(Observation {
            source,
            target,
            relationship_type: RelationshipType::RefersTo,
            cardinality: Cardinality::ManyToOne,
            field_path: Some(filter.path.clone()),
            evidence: evidence(
                EvidenceType::Filter,
                FILTER_CONFIDENCE,
                format!("{} on {collection} filters by {}", op.method, filter.path),
                &op.provenance,
            ),
            provenance: op.provenance.clone(),
        });
    }

    for lookup in op.lookups() {
        let Some(target) = type_of_collection(&lookup.from) else {
            tracing::trace!(from = %lookup.from, "lookup target has no mapped type");
            continue;
        };
        out.push(Observation {
            source,
            target,
            relationship_type: RelationshipType::Lookup,
            cardinality: Cardinality::OneToMany,
            field_path: lookup.local_field.clone(),
            evidence: evidence(
                EvidenceType::Lookup,
                LOOKUP_CONFIDENCE,
                format!(
                    "$lookup from {collection} into {} on {} = {}",
                    lookup.from,
                    lookup.local_field.as_deref().unwrap_or("?"),
                    lookup.foreign_field.as_deref().unwrap_or("?"),
                ),
                &op.provenance,
            ),
            provenance: op.provenance.clone(),
        });
    }
}

fn merge(observations: Vec<Observation<'_>>, revision: &SourceRevision) -> Vec<DataRelationship> {
    let mut order: Vec<EdgeKey> = Vec::new();
    let mut edges: FxHashMap<EdgeKey, EdgeBuilder> = FxHashMap::default();

    for obs in observations {
        let key = (obs.source.id.clone(), obs.target.id.clone(), obs.relationship_type);
        let edge = edges.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            EdgeBuilder {
                source: obs.source,
                target: obs.target,
                relationship_type: obs.relationship_type,
                cardinality: obs.cardinality,
                field_path: None,
                evidence: SmallVec4::new(),
                anchor: (-1.0, obs.provenance.clone()),
            }
        });
        if edge.field_path.is_none() {
            edge.field_path = obs.field_path;
        }
        let duplicate = edge.evidence.iter().any(|e| {
            e.evidence_type == obs.evidence.evidence_type && e.description == obs.evidence.description
        });
        if duplicate {
            continue;
        }
        if obs.evidence.confidence > edge.anchor.0 {
            edge.anchor = (obs.evidence.confidence, obs.provenance);
        }
        edge.evidence.push(obs.evidence);
    }

    let bidirectional: FxHashSet<EdgeKey> = order
        .iter()
        .filter(|(s, t, r)| edges.contains_key(&(t.clone(), s.clone(), *r)))
        .cloned()
        .collect();

    order
        .into_iter()
        .filter_map(|key| {
            let edge = edges.remove(&key)?;
            Some(build(edge, bidirectional.contains(&key), revision))
        })
        .collect()
}

fn build(edge: EdgeBuilder<'_>, bidirectional: bool, revision: &SourceRevision) -> DataRelationship {
    let symbol = format!("{}->{}", edge.source.full_name(), edge.target.full_name());
    let (_, anchor) = edge.anchor;
    let provenance = ProvenanceRecord {
        symbol: symbol.clone(),
        ..anchor
    };
    DataRelationship {
        id: EntityId::derive(
            EntityType::DataRelationship,
            &revision.repository,
            "",
            &format!("{symbol}:{}", edge.relationship_type.name()),
            "",
        ),
        source: EntityRef::new(EntityType::CodeType, edge.source.id.clone()),
        source_name: edge.source.full_name(),
        target: EntityRef::new(EntityType::CodeType, edge.target.id.clone()),
        target_name: edge.target.full_name(),
        relationship_type: edge.relationship_type,
        cardinality: edge.cardinality,
        confidence: aggregate_confidence(&edge.evidence),
        field_path: edge.field_path,
        bidirectional,
        evidence: edge.evidence,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docscope_core::model::{
        AttributeConfig, FieldDefinition, FieldExpression, LineSpan, LookupSpec, NullabilityContext,
        OperationKind, PipelineStage, ResolutionMethod, TypeKind,
    };

    fn revision() -> SourceRevision {
        SourceRevision {
            repository: "shop".into(),
            commit_id: "c1".into(),
            branch: None,
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "docscope/test".into(),
        }
    }

    fn field(name: &str, ty: &str) -> FieldDefinition {
        let element = ty.strip_prefix("List<").map(|s| s.trim_end_matches('>').to_string());
        FieldDefinition {
            name: name.into(),
            element_name: name.into(),
            field_type: ty.into(),
            is_collection: element.is_some(),
            element_type: element,
            nullable: false,
            required: false,
            is_id: name == "Id",
            attributes: vec![],
            default_value: None,
        }
    }

    fn code_type(name: &str, fields: Vec<FieldDefinition>, bases: &[&str]) -> CodeType {
        let r = revision();
        CodeType {
            id: EntityId::derive(EntityType::CodeType, "shop", &format!("{name}.cs"), name, ""),
            name: name.into(),
            namespace: Some("Shop".into()),
            kind: TypeKind::Class,
            fields,
            attributes: vec![],
            base_types: bases.iter().map(|b| b.to_string()).collect(),
            nullability: NullabilityContext::Unspecified,
            discriminators: vec![],
            provenance: r.provenance(&format!("{name}.cs"), &format!("Shop.{name}"), LineSpan::new(1, 10)),
        }
    }

    fn mapping(ty: &CodeType, collection: &str) -> CollectionMapping {
        CollectionMapping {
            id: EntityId::derive(EntityType::CollectionMapping, "shop", "Repo.cs", &ty.name, ""),
            code_type: Some(EntityRef::new(EntityType::CodeType, ty.id.clone())),
            type_name: ty.full_name(),
            collection_name: Some(collection.into()),
            method: ResolutionMethod::Literal,
            confidence: 1.0,
            context: String::new(),
            is_primary: true,
            provenance: revision().provenance("Repo.cs", "Repo", LineSpan::new(3, 3)),
        }
    }

    fn operation(mapping: &CollectionMapping, filters: Vec<FieldExpression>, pipeline: Option<Vec<PipelineStage>>) -> QueryOperation {
        QueryOperation {
            id: EntityId::derive(EntityType::QueryOperation, "shop", "Repo.cs", "Repo.Get", "Find#0"),
            kind: OperationKind::Find,
            method: "Find".into(),
            collection_mapping: EntityRef::new(EntityType::CollectionMapping, mapping.id.clone()),
            collection_name: mapping.collection_name.clone(),
            filters,
            projections: vec![],
            sorts: vec![],
            updates: vec![],
            limit: None,
            skip: None,
            pipeline,
            is_transactional: false,
            read_preference: None,
            write_concern: None,
            is_async: false,
            provenance: revision().provenance("Repo.cs", "Repo.Get", LineSpan::new(20, 22)),
        }
    }

    fn mappings_of(list: Vec<CollectionMapping>) -> ResolvedMappings {
        ResolvedMappings {
            mappings: list,
            ..Default::default()
        }
    }

    #[test]
    fn filter_and_naming_evidence_merge_into_one_edge() {
        let customer = code_type("Customer", vec![field("Id", "string"), field("Name", "string")], &[]);
        let order = code_type("Order", vec![field("Id", "string"), field("CustomerId", "string")], &[]);
        let types = vec![customer.clone(), order.clone()];
        let m = mapping(&order, "orders");
        let op = operation(&m, vec![FieldExpression::new("CustomerId", "$eq", Some("id".into()))], None);

        let rels = RelationshipInferencer::new().infer(&types, &mappings_of(vec![m]), &[op], &revision());
        let refers: Vec<_> = rels
            .iter()
            .filter(|r| r.relationship_type == RelationshipType::RefersTo)
            .collect();
        assert_eq!(refers.len(), 1);
        let r = refers[0];
        assert_eq!(r.source.id, order.id);
        assert_eq!(r.target.id, customer.id);
        assert_eq!(r.evidence.len(), 2);
        let expected = (0.9 * 0.75 + 0.4 * 0.5) / 1.3;
        assert!((r.confidence - expected).abs() < 1e-9);
        assert!(r.provenance.is_valid());
        // Filter evidence is the stronger one.
        assert_eq!(r.provenance.file_path, "Repo.cs");
    }

    #[test]
    fn lookup_stage_links_collections() {
        let customer = code_type("Customer", vec![field("Id", "string")], &[]);
        let order = code_type("Order", vec![field("Id", "string"), field("Total", "decimal")], &[]);
        let types = vec![customer.clone(), order.clone()];
        let mc = mapping(&customer, "customers");
        let mut mo = mapping(&order, "orders");
        mo.id = EntityId::from_raw("cm-orders");
        let mut stage = PipelineStage::new("$lookup");
        stage.lookup = Some(LookupSpec {
            from: "customers".into(),
            local_field: Some("customerId".into()),
            foreign_field: Some("_id".into()),
            as_field: Some("customer".into()),
        });
        let op = operation(&mo, vec![], Some(vec![stage]));

        let rels = RelationshipInferencer::new().infer(&types, &mappings_of(vec![mc, mo]), &[op], &revision());
        let lookup = rels
            .iter()
            .find(|r| r.relationship_type == RelationshipType::Lookup)
            .unwrap();
        assert_eq!(lookup.target.id, customer.id);
        assert_eq!(lookup.field_path.as_deref(), Some("customerId"));
        assert!((lookup.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn untyped_handle_borrows_the_type_mapped_to_its_collection() {
        let customer = code_type("Customer", vec![field("Id", "string")], &[]);
        let order = code_type("Order", vec![field("Id", "string")], &[]);
        let types = vec![customer.clone(), order.clone()];
        let mc = mapping(&customer, "customers");
        let mut untyped = mapping(&order, "orders");
        untyped.id = EntityId::from_raw("cm-orders-bson");
        untyped.code_type = None;
        untyped.type_name = "BsonDocument".into();
        let mut inferred = mapping(&order, "orders");
        inferred.method = ResolutionMethod::Inferred;
        inferred.confidence = 0.3;
        inferred.is_primary = false;
        let mut stage = PipelineStage::new("$lookup");
        stage.lookup = Some(LookupSpec {
            from: "customers".into(),
            local_field: Some("customerId".into()),
            foreign_field: Some("_id".into()),
            as_field: Some("customer".into()),
        });
        let mut op = operation(&untyped, vec![], Some(vec![stage]));
        op.kind = OperationKind::Aggregate;

        let rels = RelationshipInferencer::new().infer(
            &types,
            &mappings_of(vec![mc, untyped, inferred]),
            &[op],
            &revision(),
        );
        let lookups: Vec<_> = rels
            .iter()
            .filter(|r| r.relationship_type == RelationshipType::Lookup)
            .collect();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].source.id, order.id);
        assert_eq!(lookups[0].target.id, customer.id);
    }

    #[test]
    fn embedded_composition_inheritance_and_aggregation() {
        let address = code_type("Address", vec![field("Street", "string")], &[]);
        let line = code_type("OrderLine", vec![field("Sku", "string")], &[]);
        let tag = code_type("Tag", vec![field("Id", "string"), field("Label", "string")], &[]);
        let base = code_type("AuditedEntity", vec![field("CreatedAt", "DateTime")], &[]);
        let order = code_type(
            "Order",
            vec![
                field("ShipTo", "Address"),
                field("Lines", "List<OrderLine>"),
                field("TagIds", "List<string>"),
            ],
            &["AuditedEntity"],
        );
        let types = vec![address, line, tag, base, order];
        let rels = RelationshipInferencer::new().infer(&types, &ResolvedMappings::default(), &[], &revision());
        let kinds: Vec<_> = rels.iter().map(|r| (r.target_name.as_str(), r.relationship_type)).collect();
        assert!(kinds.contains(&("Shop.Address", RelationshipType::Embedded)));
        assert!(kinds.contains(&("Shop.OrderLine", RelationshipType::Composition)));
        assert!(kinds.contains(&("Shop.Tag", RelationshipType::Aggregation)));
        assert!(kinds.contains(&("Shop.AuditedEntity", RelationshipType::Inheritance)));
        assert!(rels.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[test]
    fn object_id_attribute_adds_evidence_and_reverse_edges_are_bidirectional() {
        let mut customer_ref = field("CustomerId", "string");
        customer_ref.attributes.push(AttributeConfig {
            name: "BsonRepresentation".into(),
            arguments: vec!["BsonType.ObjectId".into()],
            named_arguments: Default::default(),
        });
        let order = code_type("Order", vec![customer_ref], &[]);
        let customer = code_type("Customer", vec![field("OrderId", "string")], &[]);
        let rels = RelationshipInferencer::new().infer(
            &[order, customer],
            &ResolvedMappings::default(),
            &[],
            &revision(),
        );
        assert_eq!(rels.len(), 2);
        assert!(rels.iter().all(|r| r.bidirectional));
        let to_customer = rels.iter().find(|r| r.target_name == "Shop.Customer").unwrap();
        assert_eq!(to_customer.evidence.len(), 2);
        assert!(to_customer
            .evidence
            .iter()
            .any(|e| e.evidence_type == EvidenceType::Attribute));
    }
}
