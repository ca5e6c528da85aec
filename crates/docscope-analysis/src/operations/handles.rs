//! Receiver -> collection mapping.

use std::sync::Arc;

use docscope_core::model::{CodeType, CollectionMapping};

use crate::resolver::ResolvedMappings;
use crate::semantic::TypeIndex;
use crate::source::{FileAnalysis, HandleDecl, HandleKind, Receiver, SiteScope};
use crate::syntax::Expr;

pub struct HandleResolver<'a> {
    handles: Vec<(&'a FileAnalysis, &'a HandleDecl)>,
    mappings: &'a ResolvedMappings,
    types: &'a TypeIndex<'a>,
}

impl<'a> HandleResolver<'a> {
    pub fn new(
        analyses: &'a [Arc<FileAnalysis>],
        mappings: &'a ResolvedMappings,
        types: &'a TypeIndex<'a>,
    ) -> Self {
        let handles = analyses
            .iter()
            .flat_map(|a| a.handles.iter().map(move |h| (a.as_ref(), h)))
            .collect();
        Self {
            handles,
            mappings,
            types,
        }
    }

    pub fn resolve(
        &self,
        receiver: &Receiver,
        file: &FileAnalysis,
        scope: &SiteScope,
    ) -> Option<&'a CollectionMapping> {
        match receiver {
            Receiver::CallSite(ordinal) => self.mappings.for_site(&file.file_path, *ordinal),
            Receiver::Handle { name, qualifier } => {
                let (owner, handle) = self.find_handle(name, qualifier.is_some(), file, scope)?;
                self.mapping_for(owner, handle)
            }
            Receiver::Unknown(_) => None,
        }
    }

    /// Resolve a handle written as an expression (a `Lookup` argument).
    pub fn resolve_expr(&self, expr: &Expr, file: &FileAnalysis, scope: &SiteScope) -> Option<&'a CollectionMapping> {
        let receiver = match expr {
            Expr::Identifier(name) => Receiver::Handle {
                name: name.clone(),
                qualifier: None,
            },
            Expr::MemberAccess { object, name } => Receiver::Handle {
                name: name.clone(),
                qualifier: match object.as_ref() {
                    Expr::Identifier(this) if this == "this" => None,
                    other => Some(other.render()),
                },
            },
            _ => return None,
        };
        self.resolve(&receiver, file, scope)
    }

    /// Locals and parameters of the member, then members of the enclosing
    /// type, then a unique member of that name anywhere.
    fn find_handle(
        &self,
        name: &str,
        qualified: bool,
        file: &FileAnalysis,
        scope: &SiteScope,
    ) -> Option<(&'a FileAnalysis, &'a HandleDecl)> {
        let named = || self.handles.iter().filter(move |(_, h)| h.name == name);

        if !qualified {
            let in_member = named().find(|(owner, h)| {
                owner.file_path == file.file_path
                    && matches!(h.kind, HandleKind::Local | HandleKind::Parameter)
                    && h.scope.enclosing_type == scope.enclosing_type
                    && h.scope.enclosing_member == scope.enclosing_member
            });
            if let Some(found) = in_member {
                return Some(*found);
            }
            // Partial classes spread members across files.
            let in_type = named().find(|(_, h)| {
                matches!(h.kind, HandleKind::Field | HandleKind::Property)
                    && h.scope.enclosing_type == scope.enclosing_type
            });
            if let Some(found) = in_type {
                return Some(*found);
            }
        }

        let mut members = named().filter(|(_, h)| matches!(h.kind, HandleKind::Field | HandleKind::Property));
        let first = members.next()?;
        let same_shape = members.all(|(_, h)| h.type_argument == first.1.type_argument);
        same_shape.then_some(*first)
    }

    fn mapping_for(&self, owner: &FileAnalysis, handle: &HandleDecl) -> Option<&'a CollectionMapping> {
        if let Some(ordinal) = handle.call_site {
            if let Some(mapping) = self.mappings.for_site(&owner.file_path, ordinal) {
                return Some(mapping);
            }
        }
        let ty: &CodeType = self.types.lookup(
            &handle.type_argument,
            handle.scope.namespace.as_deref(),
            &owner.usings,
        )?;
        self.mappings.primary_for_type(&ty.id)
    }
}
