//! Import traversal and path resolution.
//!
//! The loader walks imports depth-first from the entry file. Each file is
//! parsed at most once (keyed by canonicalized path); revisiting a path
//! that is still on the traversal stack is a cyclic import. Modules come
//! back in topological order: every dependency precedes its importer.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use lx_ast::Module;
use lx_common::Diagnostic;

use crate::symbols::SymbolTable;

/// Marker file that identifies an Lx project root during upward search.
pub const PROJECT_MARKER: &str = "lx.toml";

/// File extensions tried when resolving an import, in order.
const MODULE_EXTENSIONS: &[&str] = &["lx.json", "json"];

/// The front-end bridge: turns file text into a [`Module`].
///
/// The grammar and lexer live outside this toolchain; the built-in
/// implementation decodes JSON-encoded module ASTs.
pub trait ModuleSource {
    fn parse(&self, path: &Path, text: &str) -> Result<Module, Diagnostic>;
}

/// The JSON AST bridge.
pub struct JsonAstSource;

impl ModuleSource for JsonAstSource {
    fn parse(&self, path: &Path, text: &str) -> Result<Module, Diagnostic> {
        serde_json::from_str(text).map_err(|e| {
            Diagnostic::new(format!("invalid module AST: {}", e))
                .with_file(path.display().to_string())
        })
    }
}

/// A module plus the file it was loaded from.
#[derive(Debug)]
pub struct LoadedModule {
    pub module: Module,
    pub path: PathBuf,
}

/// The loader's output: modules dependencies-first, plus the symbol table.
#[derive(Debug)]
pub struct Program {
    pub modules: Vec<LoadedModule>,
    pub symbols: SymbolTable,
}

impl Program {
    /// The entry module is always last in topological order.
    pub fn entry(&self) -> &LoadedModule {
        self.modules.last().expect("a loaded program has at least one module")
    }
}

/// Walks imports and builds the symbol table.
pub struct Loader<'p> {
    parser: &'p dyn ModuleSource,
    search_roots: Vec<PathBuf>,
}

impl<'p> Loader<'p> {
    pub fn new(parser: &'p dyn ModuleSource, search_roots: Vec<PathBuf>) -> Self {
        Loader { parser, search_roots }
    }

    /// Load the entry file and everything it transitively imports.
    pub fn load(&self, entry: &Path) -> Result<Program, Diagnostic> {
        let mut state = Traversal {
            loader: self,
            visited: FxHashSet::default(),
            stack: Vec::new(),
            order: Vec::new(),
        };
        let entry_path = canonicalize(entry)?;
        state.visit(&entry_path)?;

        let mut symbols = SymbolTable::new();
        for loaded in &state.order {
            let file = loaded.path.display().to_string();
            symbols.index_module(&loaded.module, &file)?;
        }

        Ok(Program { modules: state.order, symbols })
    }

    /// Resolve an import path (dotted module name) to a file, trying in
    /// order: the importer's directory, the search roots, the last path
    /// component next to the importer, and the project root found by
    /// walking upward from the importer.
    fn resolve_import(&self, import_path: &str, importer: &Path) -> Option<PathBuf> {
        let importer_dir = importer.parent().unwrap_or_else(|| Path::new("."));
        let relative: PathBuf = import_path.split('.').collect();

        if let Some(found) = try_extensions(&importer_dir.join(&relative)) {
            return Some(found);
        }

        for root in &self.search_roots {
            if let Some(found) = try_extensions(&root.join(&relative)) {
                return Some(found);
            }
        }

        // Sibling module sharing the importer's dotted prefix: only the
        // last component, next to the importer.
        if let Some(tail) = import_path.rsplit('.').next() {
            if let Some(found) = try_extensions(&importer_dir.join(tail)) {
                return Some(found);
            }
        }

        if let Some(project_root) = find_project_root(importer_dir) {
            if let Some(found) = try_extensions(&project_root.join(&relative)) {
                return Some(found);
            }
        }

        None
    }
}

/// Try each known module extension on a base path.
fn try_extensions(base: &Path) -> Option<PathBuf> {
    for ext in MODULE_EXTENSIONS {
        let candidate = base.with_extension(ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Walk upward looking for the project marker file.
fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(PROJECT_MARKER).is_file() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

fn canonicalize(path: &Path) -> Result<PathBuf, Diagnostic> {
    path.canonicalize().map_err(|e| {
        Diagnostic::new(format!("cannot open `{}`: {}", path.display(), e))
    })
}

/// Depth-first traversal state.
struct Traversal<'l, 'p> {
    loader: &'l Loader<'p>,
    /// Canonical paths already fully processed.
    visited: FxHashSet<PathBuf>,
    /// Canonical paths currently on the DFS stack, with module names for
    /// cycle reporting.
    stack: Vec<(PathBuf, String)>,
    order: Vec<LoadedModule>,
}

impl Traversal<'_, '_> {
    fn visit(&mut self, path: &Path) -> Result<(), Diagnostic> {
        if self.visited.contains(path) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|(p, _)| p == path) {
            let mut cycle: Vec<String> =
                self.stack[pos..].iter().map(|(_, name)| name.clone()).collect();
            cycle.push(cycle[0].clone());
            return Err(Diagnostic::new(format!(
                "cyclic import: {}",
                cycle.join(" -> ")
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::new(format!("cannot read `{}`: {}", path.display(), e))
        })?;
        let module = self.loader.parser.parse(path, &text)?;
        let file = path.display().to_string();

        self.stack.push((path.to_path_buf(), module.name.clone()));
        let mut import_cache: FxHashMap<String, PathBuf> = FxHashMap::default();
        for import in &module.imports {
            let target = match import_cache.get(&import.path) {
                Some(t) => t.clone(),
                None => {
                    let resolved = self
                        .loader
                        .resolve_import(&import.path, path)
                        .ok_or_else(|| {
                            Diagnostic::new(format!(
                                "unresolved import `{}`",
                                import.path
                            ))
                            .with_file(file.clone())
                            .with_optional_span(import.span)
                        })?;
                    let canonical = canonicalize(&resolved)?;
                    import_cache.insert(import.path.clone(), canonical.clone());
                    canonical
                }
            };
            self.visit(&target)?;
        }
        self.stack.pop();

        self.visited.insert(path.to_path_buf());
        self.order.push(LoadedModule {
            module,
            path: path.to_path_buf(),
        });
        Ok(())
    }
}
