//! Declared-vs-observed drift between a code type and sampled documents.

use std::collections::BTreeMap;

use docscope_core::model::{BsonKind, CodeType, FieldDefinition, FieldTypeStats, SchemaDrift, TypeMismatch};

/// BSON kinds a declared C# type may be stored as. `None` when the type is
/// not one we can judge (enums, custom structs).
fn expected_kinds(field: &FieldDefinition) -> Option<&'static [BsonKind]> {
    let ty = field.field_type.trim_end_matches('?');
    let ty = ty.rsplit('.').next().unwrap_or(ty);
    let kinds: &'static [BsonKind] = match ty {
        _ if field.is_collection => &[BsonKind::Array],
        "string" | "String" | "Guid" | "char" => &[BsonKind::String],
        "int" | "long" | "short" | "byte" | "uint" | "ulong" | "Int32" | "Int64" => &[BsonKind::Integer],
        "double" | "float" | "decimal" | "Double" | "Decimal" | "Decimal128" => {
            &[BsonKind::Number, BsonKind::Integer]
        }
        "bool" | "Boolean" => &[BsonKind::Boolean],
        "DateTime" | "DateTimeOffset" | "DateOnly" => &[BsonKind::Datetime, BsonKind::String],
        "ObjectId" => &[BsonKind::Objectid, BsonKind::String],
        "BsonDocument" => &[BsonKind::Object],
        _ => return None,
    };
    Some(kinds)
}

/// Compare top-level stored names, case-insensitively. `_id` and the
/// type's id member are the document key and never drift.
pub fn compute_drift(code_type: &CodeType, observed: &BTreeMap<String, FieldTypeStats>) -> SchemaDrift {
    let declared: Vec<&FieldDefinition> = code_type.fields.iter().filter(|f| !f.is_id).collect();
    let top_level: Vec<(&String, &FieldTypeStats)> = observed
        .iter()
        .filter(|(path, _)| !path.contains('.') && path.as_str() != "_id")
        .collect();

    let mut drift = SchemaDrift::default();
    for field in &declared {
        let stored = &field.element_name;
        let Some((path, stats)) = top_level.iter().find(|(p, _)| p.eq_ignore_ascii_case(stored)) else {
            drift.declared_not_observed.push(stored.clone());
            continue;
        };
        if stats.primary_type == BsonKind::Null {
            continue;
        }
        if let Some(kinds) = expected_kinds(field) {
            if !kinds.contains(&stats.primary_type) {
                drift.type_mismatches.push(TypeMismatch {
                    field_path: (*path).clone(),
                    declared: field.field_type.clone(),
                    observed: stats.primary_type.name().to_string(),
                });
            }
        }
    }
    for (path, _) in &top_level {
        let known = declared
            .iter()
            .any(|f| f.element_name.eq_ignore_ascii_case(path) || f.name.eq_ignore_ascii_case(path));
        if !known {
            drift.observed_not_declared.push((*path).clone());
        }
    }
    drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docscope_core::model::{EntityId, EntityType, LineSpan, NullabilityContext, SourceRevision, TypeKind};

    fn field(name: &str, element: &str, ty: &str, is_id: bool) -> FieldDefinition {
        FieldDefinition {
            name: name.into(),
            element_name: element.into(),
            field_type: ty.into(),
            element_type: None,
            is_collection: false,
            nullable: false,
            required: false,
            is_id,
            attributes: vec![],
            default_value: None,
        }
    }

    fn stats(kind: BsonKind) -> FieldTypeStats {
        FieldTypeStats {
            occurrences: 1,
            frequencies: [(kind, 1.0)].into_iter().collect(),
            primary_type: kind,
            examples: vec![],
        }
    }

    #[test]
    fn reports_missing_extra_and_mismatched_fields() {
        let revision = SourceRevision {
            repository: "shop".into(),
            commit_id: "c".into(),
            branch: None,
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "t".into(),
        };
        let ty = CodeType {
            id: EntityId::derive(EntityType::CodeType, "shop", "Order.cs", "Order", ""),
            name: "Order".into(),
            namespace: None,
            kind: TypeKind::Class,
            fields: vec![
                field("Id", "_id", "string", true),
                field("Total", "total", "decimal", false),
                field("Status", "status", "string", false),
                field("Notes", "notes", "string", false),
            ],
            attributes: vec![],
            base_types: vec![],
            nullability: NullabilityContext::Unspecified,
            discriminators: vec![],
            provenance: revision.provenance("Order.cs", "Order", LineSpan::new(1, 1)),
        };
        let observed: BTreeMap<String, FieldTypeStats> = [
            ("_id".to_string(), stats(BsonKind::Objectid)),
            ("Total".to_string(), stats(BsonKind::String)),
            ("status".to_string(), stats(BsonKind::String)),
            ("legacyFlag".to_string(), stats(BsonKind::Boolean)),
        ]
        .into_iter()
        .collect();

        let drift = compute_drift(&ty, &observed);
        assert_eq!(drift.declared_not_observed, vec!["notes".to_string()]);
        assert_eq!(drift.observed_not_declared, vec!["legacyFlag".to_string()]);
        assert_eq!(drift.type_mismatches.len(), 1);
        assert_eq!(drift.type_mismatches[0].field_path, "Total");
        assert_eq!(drift.type_mismatches[0].observed, "string");
    }
}
