//! Syntax-tree walk producing a [`FileAnalysis`].

use docscope_core::model::{LineSpan, NullabilityContext, TypeKind};
use docscope_core::types::FxHashMap;
use tree_sitter::Node;

use super::analysis::{
    qualify, CallSiteSource, ChainCall, CollectionCallSite, DeclaredType, FileAnalysis,
    HandleDecl, HandleKind, OperationSite, Receiver, SiteScope, SymbolDecl, SymbolKind,
};
use super::declarations::{
    attribute_argument_expr, attributes, base_types, data_members, declarator_initializer,
    declarator_name, is_infrastructure_name, nullable_directives, COLLECTION_ATTRIBUTES,
};
use crate::operations::kinds::{operation_kind, RECEIVER_MODIFIERS};
use crate::parsers::is_in_error;
use crate::syntax::lower::type_arguments;
use crate::syntax::node::{
    compact, field_text, generic_argument, modifiers, named_children, simple_type_name, text,
};
use crate::syntax::{lower_arguments, lower_expr, Expr};

/// Locals kept per member for filter-variable lookup.
const MAX_TRACKED_LOCALS: usize = 64;

struct MemberScope {
    name: String,
    locals: Vec<(String, Expr)>,
    transactional: bool,
}

pub(crate) struct Walker<'a> {
    source: &'a [u8],
    handle_types: &'a [String],
    out: FileAnalysis,
    namespaces: Vec<String>,
    file_namespace: Option<String>,
    type_stack: Vec<String>,
    member: Option<MemberScope>,
    directives: Vec<(u32, NullabilityContext)>,
    call_site_by_node: FxHashMap<usize, usize>,
    op_ordinals: FxHashMap<String, usize>,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(source: &'a str, handle_types: &'a [String], file_path: &str) -> Self {
        Self {
            source: source.as_bytes(),
            handle_types,
            out: FileAnalysis {
                file_path: file_path.to_string(),
                ..Default::default()
            },
            namespaces: Vec::new(),
            file_namespace: None,
            type_stack: Vec::new(),
            member: None,
            directives: nullable_directives(source),
            call_site_by_node: FxHashMap::default(),
            op_ordinals: FxHashMap::default(),
        }
    }

    pub(crate) fn finish(mut self, root: Node) -> FileAnalysis {
        self.visit(root);
        self.link_handles();
        self.out
    }

    fn visit_children(&mut self, node: Node) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "using_directive" => {
                if let Some(name) = named_children(node).into_iter().last() {
                    self.out.usings.push(compact(text(name, self.source)));
                }
            }
            "namespace_declaration" => {
                let name = field_text(node, "name", self.source).unwrap_or("").to_string();
                self.namespaces.push(name);
                self.visit_children(node);
                self.namespaces.pop();
            }
            "file_scoped_namespace_declaration" => {
                self.file_namespace = field_text(node, "name", self.source).map(str::to_string);
                self.visit_children(node);
            }
            "class_declaration" | "record_declaration" | "struct_declaration"
            | "record_struct_declaration" => self.visit_type(node),
            "interface_declaration" | "enum_declaration" | "delegate_declaration" => {}
            "field_declaration" => self.visit_field(node),
            "property_declaration" => self.visit_property(node),
            "method_declaration" | "constructor_declaration" => self.visit_member(node),
            "local_declaration_statement" => self.visit_local(node),
            "assignment_expression" => {
                self.track_assignment(node);
                self.visit_children(node);
            }
            "invocation_expression" => self.visit_invocation(node),
            _ => self.visit_children(node),
        }
    }

    // ---- scope ----

    fn namespace(&self) -> Option<String> {
        if !self.namespaces.is_empty() {
            Some(self.namespaces.join("."))
        } else {
            self.file_namespace.clone()
        }
    }

    fn enclosing_type(&self) -> Option<String> {
        if self.type_stack.is_empty() {
            return None;
        }
        Some(qualify(self.namespace().as_deref(), &self.type_stack.join(".")))
    }

    fn scope(&self) -> SiteScope {
        SiteScope {
            namespace: self.namespace(),
            enclosing_type: self.enclosing_type(),
            enclosing_member: self.member.as_ref().map(|m| m.name.clone()),
        }
    }

    fn nullability_at(&self, line: u32) -> NullabilityContext {
        self.directives
            .iter()
            .take_while(|(l, _)| *l < line)
            .last()
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }

    fn is_handle_type(&self, type_text: &str) -> bool {
        let simple = simple_type_name(type_text);
        matches!(simple, "IMongoCollection" | "MongoCollection")
            || self.handle_types.iter().any(|h| h == simple)
    }

    // ---- declarations ----

    fn visit_type(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.source).map(str::to_string) else {
            self.visit_children(node);
            return;
        };
        let kind = match node.kind() {
            "record_declaration" | "record_struct_declaration" => TypeKind::Record,
            "struct_declaration" => TypeKind::Struct,
            _ => TypeKind::Class,
        };
        let mods = modifiers(node, self.source);
        let attrs = attributes(node, self.source);
        let line_span = LineSpan::from_rows(node.start_position().row, node.end_position().row);
        let nullability = self.nullability_at(line_span.start);

        self.type_stack.push(name.clone());

        for attribute in COLLECTION_ATTRIBUTES {
            if let Some(argument) = attribute_argument_expr(node, attribute, self.source) {
                let ordinal = self.out.call_sites.len();
                self.out.call_sites.push(CollectionCallSite {
                    ordinal,
                    type_argument: name.clone(),
                    argument,
                    source: CallSiteSource::Attribute,
                    assigned_to: None,
                    scope: self.scope(),
                    line_span,
                });
                break;
            }
        }

        let body = node.child_by_field_name("body").or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| c.kind() == "declaration_list")
        });
        let handle_types = self.handle_types;
        let is_handle = |t: &str| {
            let simple = simple_type_name(t);
            matches!(simple, "IMongoCollection" | "MongoCollection")
                || handle_types.iter().any(|h| h == simple)
        };
        let fields = data_members(
            node,
            body,
            kind == TypeKind::Record,
            nullability,
            self.source,
            &is_handle,
        );
        let declares_handles = body.is_some_and(|b| {
            named_children(b).into_iter().any(|m| {
                let ty = match m.kind() {
                    "property_declaration" => field_text(m, "type", self.source),
                    "field_declaration" => named_children(m)
                        .into_iter()
                        .find(|c| c.kind() == "variable_declaration")
                        .and_then(|d| field_text(d, "type", self.source)),
                    _ => None,
                };
                ty.is_some_and(&is_handle)
            })
        });

        let is_poco = !mods.contains(&"static")
            && !fields.is_empty()
            && !declares_handles
            && !is_infrastructure_name(&name);
        if is_poco {
            let discriminators = attrs
                .iter()
                .filter(|a| a.name == "BsonDiscriminator" || a.name == "BsonKnownTypes")
                .flat_map(|a| a.arguments.iter().cloned())
                .collect();
            self.out.types.push(DeclaredType {
                name: self.type_stack.join("."),
                namespace: self.namespace(),
                kind,
                fields,
                attributes: attrs,
                base_types: base_types(node, self.source),
                nullability,
                discriminators,
                line_span,
            });
        }

        if let Some(body) = body {
            self.visit_children(body);
        }
        self.type_stack.pop();
    }

    fn visit_field(&mut self, node: Node) {
        let mods = modifiers(node, self.source);
        let Some(decl) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "variable_declaration")
        else {
            self.visit_children(node);
            return;
        };
        let type_text = compact(field_text(decl, "type", self.source).unwrap_or(""));
        let symbol_kind = if mods.contains(&"const") {
            Some(SymbolKind::Const)
        } else if mods.contains(&"readonly") && mods.contains(&"static") {
            Some(SymbolKind::StaticReadonly)
        } else if mods.contains(&"readonly") {
            Some(SymbolKind::Readonly)
        } else {
            None
        };
        for declarator in named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
        {
            let Some(name) = declarator_name(declarator, self.source).map(str::to_string) else {
                continue;
            };
            let init = declarator_initializer(declarator);
            let line = declarator.start_position().row as u32 + 1;
            if self.is_handle_type(&type_text) {
                self.push_handle(&name, &type_text, HandleKind::Field, line);
            } else if let (Some(kind), Some(container)) = (symbol_kind, self.enclosing_type()) {
                self.out.symbols.push(SymbolDecl {
                    container,
                    name: name.clone(),
                    kind,
                    declared_type: type_text.clone(),
                    initializer: init.map(|i| lower_expr(i, self.source)),
                    line,
                });
            }
            if let Some(init) = init {
                self.visit(init);
            }
        }
    }

    fn visit_property(&mut self, node: Node) {
        let mods = modifiers(node, self.source);
        let (Some(name), Some(type_text)) = (
            field_text(node, "name", self.source).map(str::to_string),
            field_text(node, "type", self.source).map(compact),
        ) else {
            self.visit_children(node);
            return;
        };
        let line = node.start_position().row as u32 + 1;
        let value = node.child_by_field_name("value");

        if self.is_handle_type(&type_text) {
            self.push_handle(&name, &type_text, HandleKind::Property, line);
        } else if let Some(container) = self.enclosing_type() {
            let has_setter = node
                .child_by_field_name("accessors")
                .map(|accessors| {
                    named_children(accessors).into_iter().any(|a| {
                        matches!(field_text(a, "name", self.source), Some("set"))
                    })
                })
                .unwrap_or(false);
            let initializer = value.and_then(|v| {
                if v.kind() == "arrow_expression_clause" {
                    named_children(v).into_iter().next()
                } else {
                    Some(v)
                }
            });
            if let (Some(init), false) = (initializer, has_setter) {
                self.out.symbols.push(SymbolDecl {
                    container,
                    name: name.clone(),
                    kind: if mods.contains(&"static") {
                        SymbolKind::StaticReadonly
                    } else {
                        SymbolKind::Readonly
                    },
                    declared_type: type_text.clone(),
                    initializer: Some(lower_expr(init, self.source)),
                    line,
                });
            }
        }

        let previous = self.member.replace(MemberScope {
            name,
            locals: Vec::new(),
            transactional: false,
        });
        self.visit_children(node);
        self.member = previous;
    }

    fn visit_member(&mut self, node: Node) {
        let name = if node.kind() == "constructor_declaration" {
            "ctor".to_string()
        } else {
            field_text(node, "name", self.source).unwrap_or("").to_string()
        };
        let body_text = text(node, self.source);
        let transactional =
            body_text.contains("StartTransaction") || body_text.contains("WithTransaction");
        let previous = self.member.replace(MemberScope {
            name,
            locals: Vec::new(),
            transactional,
        });

        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(params) {
                let (Some(pname), Some(ptype)) = (
                    field_text(param, "name", self.source),
                    field_text(param, "type", self.source).map(compact),
                ) else {
                    continue;
                };
                if self.is_handle_type(&ptype) {
                    let line = param.start_position().row as u32 + 1;
                    self.push_handle(pname, &ptype, HandleKind::Parameter, line);
                }
            }
        }
        self.visit_children(node);
        self.member = previous;
    }

    fn visit_local(&mut self, node: Node) {
        let mods = modifiers(node, self.source);
        let Some(decl) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "variable_declaration")
        else {
            self.visit_children(node);
            return;
        };
        let type_text = compact(field_text(decl, "type", self.source).unwrap_or("var"));
        for declarator in named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
        {
            let Some(name) = declarator_name(declarator, self.source).map(str::to_string) else {
                continue;
            };
            let init = declarator_initializer(declarator);
            let line = declarator.start_position().row as u32 + 1;

            if self.is_handle_type(&type_text) {
                self.push_handle(&name, &type_text, HandleKind::Local, line);
            } else if let Some(call) = init.and_then(|i| self.find_get_collection(i)) {
                let type_arg = self.call_type_argument(call);
                let handle_type = format!("IMongoCollection<{type_arg}>");
                self.push_handle(&name, &handle_type, HandleKind::Local, line);
            }

            if let Some(init) = init {
                self.visit(init);
                let value = lower_expr(init, self.source);
                if mods.contains(&"const") {
                    if let Some(container) = self.enclosing_type() {
                        self.out.symbols.push(SymbolDecl {
                            container,
                            name: name.clone(),
                            kind: SymbolKind::Const,
                            declared_type: type_text.clone(),
                            initializer: Some(value.clone()),
                            line,
                        });
                    }
                }
                if let Some(member) = self.member.as_mut() {
                    if member.locals.len() < MAX_TRACKED_LOCALS {
                        member.locals.push((name, value));
                    }
                }
            }
        }
    }

    /// `filter = ...` and `filter &= ...` on a tracked local update its value.
    fn track_assignment(&mut self, node: Node) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = text(left, self.source);
        let op = field_text(node, "operator", self.source).unwrap_or("=").to_string();
        let value = lower_expr(right, self.source);
        let Some(member) = self.member.as_mut() else {
            return;
        };
        let Some(slot) = member.locals.iter_mut().rev().find(|(n, _)| n == name) else {
            return;
        };
        slot.1 = match op.as_str() {
            "=" => value,
            compound => Expr::Binary {
                left: Box::new(std::mem::replace(&mut slot.1, Expr::Null)),
                op: compound.trim_end_matches('=').to_string(),
                right: Box::new(value),
            },
        };
    }

    fn push_handle(&mut self, name: &str, type_text: &str, kind: HandleKind, line: u32) {
        let type_argument = generic_argument(type_text)
            .map(|a| simple_type_name(a).to_string())
            .unwrap_or_else(|| "BsonDocument".to_string());
        self.out.handles.push(HandleDecl {
            name: name.to_string(),
            type_argument,
            kind,
            scope: self.scope(),
            call_site: None,
            line,
        });
    }

    // ---- invocations ----

    fn visit_invocation(&mut self, node: Node) {
        if self.is_get_collection(node) {
            let target = self.assignment_target(node);
            self.record_call_site(node, target);
        }
        self.record_operation(node);
        self.visit_children(node);
    }

    fn is_get_collection(&self, node: Node) -> bool {
        if node.kind() != "invocation_expression" {
            return false;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return false;
        };
        let name = match function.kind() {
            "member_access_expression" => function.child_by_field_name("name"),
            "generic_name" | "identifier" => Some(function),
            _ => None,
        };
        name.is_some_and(|n| {
            let base = if n.kind() == "generic_name" {
                named_children(n)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .map(|c| text(c, self.source))
                    .unwrap_or("")
            } else {
                text(n, self.source)
            };
            base == "GetCollection"
        })
    }

    /// The `GetCollection` invocation an initializer evaluates to, looking
    /// through `await`, parentheses, casts and handle modifiers.
    fn find_get_collection<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut current = node;
        loop {
            match current.kind() {
                "invocation_expression" if self.is_get_collection(current) => return Some(current),
                "invocation_expression" => {
                    let function = current.child_by_field_name("function")?;
                    if function.kind() != "member_access_expression" {
                        return None;
                    }
                    current = function.child_by_field_name("expression")?;
                }
                "await_expression" | "parenthesized_expression" | "postfix_unary_expression" => {
                    current = named_children(current).into_iter().last()?;
                }
                "cast_expression" => current = current.child_by_field_name("value")?,
                _ => return None,
            }
        }
    }

    fn call_type_argument(&self, call: Node) -> String {
        call.child_by_field_name("function")
            .map(|f| type_arguments(f, self.source))
            .and_then(|args| args.into_iter().next())
            .map(|a| simple_type_name(&a).to_string())
            .unwrap_or_else(|| "BsonDocument".to_string())
    }

    /// Name the value of `node` is stored into, if any.
    fn assignment_target(&self, node: Node) -> Option<String> {
        let mut current = node;
        while let Some(parent) = current.parent() {
            match parent.kind() {
                "await_expression" | "parenthesized_expression" | "cast_expression"
                | "equals_value_clause" => current = parent,
                "member_access_expression" | "invocation_expression" => {
                    // `GetCollection<T>(..).WithReadPreference(..)`
                    let is_modifier_chain = parent
                        .child_by_field_name("name")
                        .map(|n| text(n, self.source))
                        .is_some_and(|n| RECEIVER_MODIFIERS.contains(&n));
                    if parent.kind() == "invocation_expression" || is_modifier_chain {
                        current = parent;
                    } else {
                        return None;
                    }
                }
                "variable_declarator" => {
                    return declarator_name(parent, self.source).map(str::to_string)
                }
                "assignment_expression" => {
                    if parent.child_by_field_name("right") != Some(current) {
                        return None;
                    }
                    let left = parent.child_by_field_name("left")?;
                    return lower_expr(left, self.source).last_name().map(str::to_string);
                }
                "arrow_expression_clause" => {
                    let owner = parent.parent()?;
                    return field_text(owner, "name", self.source).map(str::to_string);
                }
                "property_declaration" => {
                    return field_text(parent, "name", self.source).map(str::to_string)
                }
                _ => return None,
            }
        }
        None
    }

    fn record_call_site(&mut self, node: Node, assigned_to: Option<String>) -> Option<usize> {
        if let Some(&ordinal) = self.call_site_by_node.get(&node.id()) {
            if let (Some(target), Some(site)) = (assigned_to, self.out.call_sites.get_mut(ordinal))
            {
                site.assigned_to.get_or_insert(target);
            }
            return Some(ordinal);
        }
        if is_in_error(&node) {
            return None;
        }
        let arguments = node.child_by_field_name("arguments")?;
        let argument = lower_arguments(arguments, self.source).into_iter().next()?;
        let ordinal = self.out.call_sites.len();
        self.out.call_sites.push(CollectionCallSite {
            ordinal,
            type_argument: self.call_type_argument(node),
            argument: argument.value,
            source: CallSiteSource::Invocation,
            assigned_to,
            scope: self.scope(),
            line_span: LineSpan::from_rows(node.start_position().row, node.end_position().row),
        });
        self.call_site_by_node.insert(node.id(), ordinal);
        Some(ordinal)
    }

    fn record_operation(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() != "member_access_expression" || is_in_error(&node) {
            return;
        }
        let Some(name_node) = function.child_by_field_name("name") else {
            return;
        };
        let method = match lower_expr(name_node, self.source) {
            Expr::Identifier(name) => name,
            _ => return,
        };
        if operation_kind(&method).is_none() {
            return;
        }
        let Some(receiver_node) = function.child_by_field_name("expression") else {
            return;
        };
        let (receiver, receiver_modifiers) = self.receiver(receiver_node);
        if matches!(receiver, Receiver::Unknown(_)) {
            return;
        }
        let args = node
            .child_by_field_name("arguments")
            .map(|a| lower_arguments(a, self.source))
            .unwrap_or_default();
        let (chain, top) = self.chain_after(node);
        let is_awaited = top
            .parent()
            .is_some_and(|p| p.kind() == "await_expression");
        let scope = self.scope();
        let counter = self.op_ordinals.entry(scope.symbol()).or_insert(0);
        let ordinal = *counter;
        *counter += 1;
        let (locals, in_transaction_scope) = self
            .member
            .as_ref()
            .map(|m| (m.locals.clone(), m.transactional))
            .unwrap_or_default();

        self.out.operations.push(OperationSite {
            method,
            receiver,
            receiver_modifiers,
            type_args: type_arguments(function, self.source),
            args,
            chain,
            is_awaited,
            in_transaction_scope,
            locals,
            ordinal,
            scope,
            line_span: LineSpan::from_rows(node.start_position().row, top.end_position().row),
        });
    }

    fn receiver(&mut self, node: Node) -> (Receiver, Vec<ChainCall>) {
        let mut modifiers = Vec::new();
        let mut current = node;
        loop {
            match current.kind() {
                "parenthesized_expression" | "postfix_unary_expression" => {
                    match named_children(current).into_iter().next() {
                        Some(inner) => current = inner,
                        None => break,
                    }
                }
                "invocation_expression" => {
                    if self.is_get_collection(current) {
                        let receiver = self
                            .record_call_site(current, None)
                            .map(Receiver::CallSite)
                            .unwrap_or_else(|| {
                                Receiver::Unknown(text(current, self.source).to_string())
                            });
                        return (receiver, modifiers);
                    }
                    let Some(function) = current
                        .child_by_field_name("function")
                        .filter(|f| f.kind() == "member_access_expression")
                    else {
                        break;
                    };
                    let name = function
                        .child_by_field_name("name")
                        .map(|n| match lower_expr(n, self.source) {
                            Expr::Identifier(name) => name,
                            other => other.render(),
                        })
                        .unwrap_or_default();
                    if !RECEIVER_MODIFIERS.contains(&name.as_str()) {
                        break;
                    }
                    modifiers.insert(
                        0,
                        ChainCall {
                            method: name,
                            type_args: type_arguments(function, self.source),
                            args: current
                                .child_by_field_name("arguments")
                                .map(|a| lower_arguments(a, self.source))
                                .unwrap_or_default(),
                        },
                    );
                    match function.child_by_field_name("expression") {
                        Some(inner) => current = inner,
                        None => break,
                    }
                }
                "identifier" => {
                    return (
                        Receiver::Handle {
                            name: text(current, self.source).to_string(),
                            qualifier: None,
                        },
                        modifiers,
                    )
                }
                "member_access_expression" => {
                    let name = field_text(current, "name", self.source)
                        .unwrap_or("")
                        .to_string();
                    let qualifier = current
                        .child_by_field_name("expression")
                        .filter(|e| !matches!(e.kind(), "this" | "this_expression"))
                        .map(|e| text(e, self.source).to_string());
                    return (Receiver::Handle { name, qualifier }, modifiers);
                }
                _ => break,
            }
        }
        (
            Receiver::Unknown(text(current, self.source).to_string()),
            modifiers,
        )
    }

    /// Calls chained onto `node`: `.Find(f).Sort(s).Limit(10)`.
    fn chain_after<'t>(&self, node: Node<'t>) -> (Vec<ChainCall>, Node<'t>) {
        let mut chain = Vec::new();
        let mut current = node;
        while let Some(parent) = current.parent() {
            if parent.kind() != "member_access_expression"
                || parent.child_by_field_name("expression") != Some(current)
            {
                break;
            }
            let Some(call) = parent
                .parent()
                .filter(|gp| gp.kind() == "invocation_expression")
                .filter(|gp| gp.child_by_field_name("function") == Some(parent))
            else {
                break;
            };
            let method = parent
                .child_by_field_name("name")
                .map(|n| match lower_expr(n, self.source) {
                    Expr::Identifier(name) => name,
                    other => other.render(),
                })
                .unwrap_or_default();
            chain.push(ChainCall {
                method,
                type_args: type_arguments(parent, self.source),
                args: call
                    .child_by_field_name("arguments")
                    .map(|a| lower_arguments(a, self.source))
                    .unwrap_or_default(),
            });
            current = call;
        }
        (chain, current)
    }

    /// Attach each handle to the call site assigned to it in the same type
    /// (and member, for locals and parameters).
    fn link_handles(&mut self) {
        let sites = &self.out.call_sites;
        for handle in &mut self.out.handles {
            if handle.call_site.is_some() {
                continue;
            }
            let same_member = matches!(handle.kind, HandleKind::Local | HandleKind::Parameter);
            handle.call_site = sites
                .iter()
                .find(|site| {
                    site.assigned_to.as_deref() == Some(handle.name.as_str())
                        && site.scope.enclosing_type == handle.scope.enclosing_type
                        && (!same_member
                            || site.scope.enclosing_member == handle.scope.enclosing_member)
                })
                .map(|site| site.ordinal);
        }
    }
}
