//! The global symbol table.
//!
//! Declarations stay owned by their modules; the table shares them via
//! `Rc`, keyed by fully qualified `module.Name`. Duplicate qualified names
//! within a kind are fatal. Schemas are indexed both as `Name` and
//! `Name@version`; for each schema without a manually declared record of
//! the same qualified name, a record type is synthesized with `optional`
//! fields wrapped in `Option<T>`.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use lx_ast::{
    ActorDecl, ContractDecl, EffectDecl, FnDecl, Module, Param, RecordDecl, SchemaDecl, SumDecl,
    TypeAliasDecl, TypeExpr, TypeExprKind,
};
use lx_common::Diagnostic;

/// A type declaration of any flavor.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Alias(Rc<TypeAliasDecl>),
    Record(Rc<RecordDecl>),
    Sum(Rc<SumDecl>),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Alias(d) => &d.name,
            TypeDef::Record(d) => &d.name,
            TypeDef::Sum(d) => &d.name,
        }
    }

    pub fn type_params(&self) -> &[String] {
        match self {
            TypeDef::Alias(d) => &d.type_params,
            TypeDef::Record(d) => &d.type_params,
            TypeDef::Sum(d) => &d.type_params,
        }
    }
}

/// Global indexes over every loaded module, keyed by qualified name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub types: FxHashMap<String, TypeDef>,
    pub functions: FxHashMap<String, Rc<FnDecl>>,
    pub effects: FxHashMap<String, Rc<EffectDecl>>,
    /// Schemas under both `module.Name` (highest version) and
    /// `module.Name@version` (each version exactly once).
    pub schemas: FxHashMap<String, Rc<SchemaDecl>>,
    /// Contracts keyed by the qualified name of the function they target.
    pub contracts: FxHashMap<String, Rc<ContractDecl>>,
    pub actors: FxHashMap<String, Rc<ActorDecl>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any kind defines this qualified name. Used by identifier
    /// resolution to decide if a candidate qualification matches.
    pub fn contains_qualified(&self, name: &str) -> bool {
        self.types.contains_key(name)
            || self.functions.contains_key(name)
            || self.effects.contains_key(name)
            || self.schemas.contains_key(name)
            || self.actors.contains_key(name)
    }

    /// Index every declaration of `module`. Returns a diagnostic on the
    /// first duplicate qualified name within a kind.
    pub fn index_module(&mut self, module: &Module, file: &str) -> Result<(), Diagnostic> {
        use lx_ast::Decl;

        for decl in &module.decls {
            match decl {
                Decl::Fn(d) => {
                    let qn = module.qualify(&d.name);
                    self.insert_unique_fn(qn, Rc::new(d.clone()), file, decl.span())?;
                }
                Decl::Alias(d) => {
                    let qn = module.qualify(&d.name);
                    self.insert_unique_type(qn, TypeDef::Alias(Rc::new(d.clone())), file, decl.span())?;
                }
                Decl::Record(d) => {
                    let qn = module.qualify(&d.name);
                    self.insert_unique_type(qn, TypeDef::Record(Rc::new(d.clone())), file, decl.span())?;
                }
                Decl::Sum(d) => {
                    let qn = module.qualify(&d.name);
                    self.insert_unique_type(qn, TypeDef::Sum(Rc::new(d.clone())), file, decl.span())?;
                }
                Decl::Effect(d) => {
                    let qn = module.qualify(&d.name);
                    if self.effects.insert(qn.clone(), Rc::new(d.clone())).is_some() {
                        return Err(duplicate("effect", &qn, file, decl.span()));
                    }
                }
                Decl::Schema(d) => {
                    self.index_schema(module, d, file)?;
                }
                Decl::Contract(d) => {
                    let qn = module.qualify(&d.fn_name);
                    if self.contracts.insert(qn.clone(), Rc::new(d.clone())).is_some() {
                        return Err(duplicate("contract", &qn, file, decl.span()));
                    }
                }
                Decl::Actor(d) => {
                    let qn = module.qualify(&d.name);
                    if self.actors.contains_key(&qn) {
                        return Err(duplicate("actor", &qn, file, decl.span()));
                    }
                    self.actors.insert(qn, Rc::new(d.clone()));
                }
                // Tests and properties are run from their module, not
                // resolved by name across modules.
                Decl::Test(_) | Decl::Property(_) => {}
            }
        }

        // Second sweep: synthesize record types for schemas that have no
        // manually declared record of the same qualified versioned name.
        for decl in &module.decls {
            if let Decl::Schema(d) = decl {
                let qn = module.qualify(&d.versioned_name());
                if !self.types.contains_key(&qn) {
                    let record = synthesize_schema_record(d);
                    self.types.insert(qn, TypeDef::Record(Rc::new(record)));
                }
            }
        }

        Ok(())
    }

    fn insert_unique_type(
        &mut self,
        qn: String,
        def: TypeDef,
        file: &str,
        span: Option<lx_common::Span>,
    ) -> Result<(), Diagnostic> {
        if self.types.contains_key(&qn) {
            return Err(duplicate("type", &qn, file, span));
        }
        self.types.insert(qn, def);
        Ok(())
    }

    fn insert_unique_fn(
        &mut self,
        qn: String,
        decl: Rc<FnDecl>,
        file: &str,
        span: Option<lx_common::Span>,
    ) -> Result<(), Diagnostic> {
        if self.functions.contains_key(&qn) {
            return Err(duplicate("function", &qn, file, span));
        }
        self.functions.insert(qn, decl);
        Ok(())
    }

    fn index_schema(
        &mut self,
        module: &Module,
        schema: &SchemaDecl,
        file: &str,
    ) -> Result<(), Diagnostic> {
        let versioned = module.qualify(&schema.versioned_name());
        if self.schemas.contains_key(&versioned) {
            return Err(duplicate("schema", &versioned, file, schema.span));
        }
        let rc = Rc::new(schema.clone());
        self.schemas.insert(versioned, Rc::clone(&rc));

        // The bare name tracks the highest version, so unversioned lookups
        // see the newest shape while `Name@v` pins a specific one.
        let bare = module.qualify(&schema.name);
        let newer_exists = self
            .schemas
            .get(&bare)
            .map(|existing| existing.version > schema.version)
            .unwrap_or(false);
        if !newer_exists {
            self.schemas.insert(bare, rc);
        }
        Ok(())
    }
}

/// Build the record type a schema implies: same fields, `optional` ones
/// wrapped in `Option<T>`, named `Name@version`.
fn synthesize_schema_record(schema: &SchemaDecl) -> RecordDecl {
    let fields = schema
        .fields
        .iter()
        .map(|f| Param {
            name: f.name.clone(),
            ty: if f.optional {
                TypeExpr::new(TypeExprKind::Name {
                    name: "Option".into(),
                    args: vec![f.ty.clone()],
                })
            } else {
                f.ty.clone()
            },
            span: f.span,
        })
        .collect();
    RecordDecl {
        name: schema.versioned_name(),
        type_params: vec![],
        fields,
        doc: None,
        span: schema.span,
    }
}

fn duplicate(kind: &str, qn: &str, file: &str, span: Option<lx_common::Span>) -> Diagnostic {
    Diagnostic::new(format!("duplicate {} declaration `{}`", kind, qn))
        .with_file(file)
        .with_optional_span(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx_ast::{Decl, SchemaField};

    fn module_with(decls: Vec<Decl>) -> Module {
        Module {
            name: "app".into(),
            imports: vec![],
            decls,
            doc: None,
            source: None,
        }
    }

    fn schema(name: &str, version: u32, optional_field: bool) -> SchemaDecl {
        SchemaDecl {
            name: name.into(),
            version,
            fields: vec![SchemaField {
                name: "id".into(),
                ty: TypeExpr::name("Int"),
                optional: optional_field,
                span: None,
            }],
            doc: None,
            span: None,
        }
    }

    #[test]
    fn schema_indexed_under_both_names() {
        let mut table = SymbolTable::new();
        let m = module_with(vec![Decl::Schema(schema("User", 2, false))]);
        table.index_module(&m, "app.lx").unwrap();

        assert!(table.schemas.contains_key("app.User"));
        assert!(table.schemas.contains_key("app.User@2"));
    }

    #[test]
    fn bare_schema_name_tracks_highest_version() {
        let mut table = SymbolTable::new();
        let m = module_with(vec![
            Decl::Schema(schema("User", 2, false)),
            Decl::Schema(schema("User", 1, false)),
        ]);
        table.index_module(&m, "app.lx").unwrap();

        assert_eq!(table.schemas["app.User"].version, 2);
        assert!(table.schemas.contains_key("app.User@1"));
    }

    #[test]
    fn duplicate_schema_version_is_fatal() {
        let mut table = SymbolTable::new();
        let m = module_with(vec![
            Decl::Schema(schema("User", 1, false)),
            Decl::Schema(schema("User", 1, false)),
        ]);
        let err = table.index_module(&m, "app.lx").unwrap_err();
        assert!(err.message.contains("app.User@1"), "{}", err.message);
    }

    #[test]
    fn schema_synthesizes_record_with_option_wrapping() {
        let mut table = SymbolTable::new();
        let m = module_with(vec![Decl::Schema(schema("User", 1, true))]);
        table.index_module(&m, "app.lx").unwrap();

        match table.types.get("app.User@1") {
            Some(TypeDef::Record(r)) => {
                assert_eq!(r.name, "User@1");
                assert!(matches!(
                    r.fields[0].ty.kind,
                    TypeExprKind::Name { ref name, ref args } if name == "Option" && args.len() == 1
                ));
            }
            other => panic!("expected synthesized record, got {:?}", other),
        }
    }

    #[test]
    fn manual_record_suppresses_synthesis() {
        let mut table = SymbolTable::new();
        let manual = RecordDecl {
            name: "User@1".into(),
            type_params: vec![],
            fields: vec![],
            doc: None,
            span: None,
        };
        let m = module_with(vec![
            Decl::Record(manual),
            Decl::Schema(schema("User", 1, true)),
        ]);
        table.index_module(&m, "app.lx").unwrap();

        match table.types.get("app.User@1") {
            // The manual record has no fields; synthesis would have added one.
            Some(TypeDef::Record(r)) => assert!(r.fields.is_empty()),
            other => panic!("expected manual record, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_function_is_fatal() {
        let mut table = SymbolTable::new();
        let f = FnDecl {
            name: "area".into(),
            type_params: vec![],
            params: vec![],
            return_type: TypeExpr::name("Int"),
            effects: vec![],
            body: vec![],
            doc: None,
            span: None,
        };
        let m = module_with(vec![Decl::Fn(f.clone()), Decl::Fn(f)]);
        let err = table.index_module(&m, "app.lx").unwrap_err();
        assert!(err.message.contains("duplicate function"), "{}", err.message);
    }
}
