//! Strategy interface for deriving entity-id structure per language,
//! plus two concrete strategies proving the abstraction (spec §4.3.2).

use codectx_core::SummaryLevel;

/// Components parsed out of an entity id by [`LanguageHierarchy::parse_entity_id`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityComponents {
    pub package: String,
    pub file: String,
    pub symbol: String,
    pub level: SummaryLevelRaw,
}

/// Plain level marker independent of `codectx-core`'s `SummaryLevel` so
/// this module stays decoupled from its `#[repr(u8)]` layout; convertible
/// via [`SummaryLevelRaw::as_summary_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryLevelRaw {
    #[default]
    Project,
    Package,
    File,
    Symbol,
}

impl SummaryLevelRaw {
    #[must_use]
    pub const fn as_summary_level(self) -> SummaryLevel {
        match self {
            Self::Project => SummaryLevel::Project,
            Self::Package => SummaryLevel::Package,
            Self::File => SummaryLevel::File,
            Self::Symbol => SummaryLevel::Symbol,
        }
    }
}

/// Per-language id grammar and derivation rules. Level detection is
/// purely lexical: `#` present ⇒ symbol; recognised source suffix ⇒ file;
/// non-empty ⇒ package; empty ⇒ project. `ParentOf` follows mechanically
/// from those same rules and is given a default implementation here.
pub trait LanguageHierarchy: Send + Sync {
    /// The language name this strategy handles, e.g. `"go"`.
    fn language(&self) -> &str;

    /// Always 4 per the spec's fixed project/package/file/symbol ladder.
    fn level_count(&self) -> usize {
        4
    }

    fn level_name(&self, level: SummaryLevel) -> &'static str {
        match level {
            SummaryLevel::Project => "project",
            SummaryLevel::Package => "package",
            SummaryLevel::File => "file",
            SummaryLevel::Symbol => "symbol",
        }
    }

    /// Recognised source file suffixes for this language, e.g. `[".go"]`.
    fn source_suffixes(&self) -> &[&str];

    /// Marker file/directory names that identify a project root, used by
    /// callers walking a filesystem to seed `BuildEntityID` inputs.
    fn root_markers(&self) -> &[&str];

    fn is_test_file(&self, id: &str) -> bool;

    /// Whether `id` is this language's package-initializer file, if the
    /// concept exists (e.g. Go's `doc.go`); `false` for languages with no
    /// such convention.
    fn is_package_init(&self, _id: &str) -> bool {
        false
    }

    /// Purely lexical level detection, shared by every strategy.
    fn entity_level(&self, id: &str) -> SummaryLevel {
        if id.contains('#') {
            SummaryLevel::Symbol
        } else if self.source_suffixes().iter().any(|suf| id.ends_with(suf)) {
            SummaryLevel::File
        } else if !id.is_empty() {
            SummaryLevel::Package
        } else {
            SummaryLevel::Project
        }
    }

    /// Mechanically derives the parent id from `id`'s structure:
    /// `pkg/file.go#Symbol` -> `pkg/file.go`; `pkg/file.go` -> `pkg`;
    /// `pkg/sub` -> `pkg`; anything else -> the project root `""`.
    fn parent_of(&self, id: &str) -> String {
        match self.entity_level(id) {
            SummaryLevel::Symbol => id.split('#').next().unwrap_or(id).to_string(),
            SummaryLevel::File | SummaryLevel::Package => id
                .rsplit_once('/')
                .map(|(parent, _)| parent.to_string())
                .unwrap_or_default(),
            SummaryLevel::Project => String::new(),
        }
    }

    fn parse_entity_id(&self, id: &str) -> EntityComponents {
        let level = self.entity_level(id);
        let (path_part, symbol) = match id.split_once('#') {
            Some((path, sym)) => (path, sym.to_string()),
            None => (id, String::new()),
        };
        let (package, file) = if level == SummaryLevel::Project {
            (String::new(), String::new())
        } else if level == SummaryLevel::Package {
            (path_part.to_string(), String::new())
        } else {
            match path_part.rsplit_once('/') {
                Some((pkg, _)) => (pkg.to_string(), path_part.to_string()),
                None => (String::new(), path_part.to_string()),
            }
        };
        EntityComponents {
            package,
            file,
            symbol,
            level: level_to_raw(level),
        }
    }

    fn build_entity_id(&self, components: &EntityComponents) -> String {
        match components.level {
            SummaryLevelRaw::Project => String::new(),
            SummaryLevelRaw::Package => components.package.clone(),
            SummaryLevelRaw::File => components.file.clone(),
            SummaryLevelRaw::Symbol => format!("{}#{}", components.file, components.symbol),
        }
    }
}

const fn level_to_raw(level: SummaryLevel) -> SummaryLevelRaw {
    match level {
        SummaryLevel::Project => SummaryLevelRaw::Project,
        SummaryLevel::Package => SummaryLevelRaw::Package,
        SummaryLevel::File => SummaryLevelRaw::File,
        SummaryLevel::Symbol => SummaryLevelRaw::Symbol,
    }
}

/// Curly-brace-family strategy (Go). Proves the abstraction against a
/// language with no significant indentation and `_test.go` suffix tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoHierarchy;

impl LanguageHierarchy for GoHierarchy {
    fn language(&self) -> &str {
        "go"
    }

    fn source_suffixes(&self) -> &[&str] {
        &[".go"]
    }

    fn root_markers(&self) -> &[&str] {
        &["go.mod"]
    }

    fn is_test_file(&self, id: &str) -> bool {
        id.ends_with("_test.go")
    }

    fn is_package_init(&self, id: &str) -> bool {
        id.ends_with("/doc.go") || id == "doc.go"
    }
}

/// Indentation-sensitive strategy (Python). Proves the abstraction
/// against a language whose package concept is a directory with
/// `__init__.py` rather than a curly-brace compilation unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonHierarchy;

impl LanguageHierarchy for PythonHierarchy {
    fn language(&self) -> &str {
        "python"
    }

    fn source_suffixes(&self) -> &[&str] {
        &[".py"]
    }

    fn root_markers(&self) -> &[&str] {
        &["pyproject.toml", "setup.py"]
    }

    fn is_test_file(&self, id: &str) -> bool {
        let base = id.rsplit('/').next().unwrap_or(id);
        base.starts_with("test_") || base.ends_with("_test.py")
    }

    fn is_package_init(&self, id: &str) -> bool {
        id.ends_with("/__init__.py") || id == "__init__.py"
    }
}

/// Dispatches to a registered [`LanguageHierarchy`] by language name.
#[derive(Default)]
pub struct HierarchyRegistry {
    strategies: Vec<Box<dyn LanguageHierarchy>>,
}

impl HierarchyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// Registers Go and Python, the two reference strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GoHierarchy));
        registry.register(Box::new(PythonHierarchy));
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn LanguageHierarchy>) {
        self.strategies.push(strategy);
    }

    #[must_use]
    pub fn get(&self, language: &str) -> Option<&dyn LanguageHierarchy> {
        self.strategies
            .iter()
            .find(|s| s.language() == language)
            .map(std::convert::AsRef::as_ref)
    }
}
