//! Driver method names and the operation kinds they map to.

use docscope_core::model::OperationKind;

/// Driver methods, sync names; `Async` variants map to the same kind.
const OPERATION_METHODS: &[(&str, OperationKind)] = &[
    ("Find", OperationKind::Find),
    ("FindSync", OperationKind::Find),
    ("AsQueryable", OperationKind::Find),
    ("InsertOne", OperationKind::Insert),
    ("InsertMany", OperationKind::Insert),
    ("UpdateOne", OperationKind::Update),
    ("UpdateMany", OperationKind::Update),
    ("ReplaceOne", OperationKind::Replace),
    ("DeleteOne", OperationKind::Delete),
    ("DeleteMany", OperationKind::Delete),
    ("Aggregate", OperationKind::Aggregate),
    ("CountDocuments", OperationKind::Count),
    ("EstimatedDocumentCount", OperationKind::Count),
    ("Count", OperationKind::Count),
    ("Distinct", OperationKind::Distinct),
    ("FindOneAndUpdate", OperationKind::FindOneAndUpdate),
    ("FindOneAndReplace", OperationKind::FindOneAndReplace),
    ("FindOneAndDelete", OperationKind::FindOneAndDelete),
    ("BulkWrite", OperationKind::BulkWrite),
    ("Watch", OperationKind::Watch),
];

/// Calls between a handle and the operation that configure the handle.
pub const RECEIVER_MODIFIERS: &[&str] = &[
    "WithReadPreference",
    "WithWriteConcern",
    "WithReadConcern",
    "OfType",
];

pub fn operation_kind(method: &str) -> Option<OperationKind> {
    let sync = method.strip_suffix("Async").unwrap_or(method);
    OPERATION_METHODS
        .iter()
        .find(|(name, _)| *name == sync)
        .map(|(_, kind)| *kind)
}

pub fn is_async_method(method: &str) -> bool {
    method.ends_with("Async")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_variants_share_kinds() {
        assert_eq!(operation_kind("FindAsync"), Some(OperationKind::Find));
        assert_eq!(operation_kind("Find"), Some(OperationKind::Find));
        assert_eq!(
            operation_kind("FindOneAndUpdateAsync"),
            Some(OperationKind::FindOneAndUpdate)
        );
        assert_eq!(operation_kind("CountDocumentsAsync"), Some(OperationKind::Count));
        assert_eq!(operation_kind("ToListAsync"), None);
        assert!(is_async_method("InsertOneAsync"));
    }
}
