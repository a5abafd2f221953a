//! Generator definition boundary
//!
//! A generator is supplied from outside the crate as an implementation of
//! [`Generator`]. Construction happens in two steps, mirroring how the
//! pipeline separates graph discovery from execution:
//!
//! 1. [`Generator::define`] declares dependencies, exports, opened scopes and
//!    child generators. It runs during graph construction, before anything
//!    builds.
//! 2. [`Generator::build`] runs once, in dependency order, with every declared
//!    dependency already resolved. It publishes export values and emits
//!    [`OutputFile`] descriptors through the [`BuildContext`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BuildError, Error};
use crate::merge::MergeStrategy;
use crate::path::normalize_output_path;
use crate::provider::{ExportScope, ProviderKey, ProviderMode, ProviderType};

/// Shared, type-erased export value.
pub(crate) type ProviderValue = Arc<dyn Any + Send + Sync>;

/// A generator definition: a pure function of its configuration.
pub trait Generator: Send + Sync {
    /// Declare what this generator needs, offers and mounts.
    fn define(&self, def: &mut Definition);

    /// Produce exports and output files from resolved dependencies.
    fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError>;
}

/// A declared dependency on a provider.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub(crate) provider: ProviderKey,
    pub(crate) optional: bool,
    pub(crate) key: Option<String>,
}

impl Dependency {
    pub fn new<T>(provider: &ProviderType<T>) -> Self {
        Self {
            provider: provider.key().clone(),
            optional: false,
            key: None,
        }
    }

    /// Resolve to nothing instead of failing when no exporter is reachable.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Select the nearest exporter published under `key`.
    pub fn keyed(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn provider(&self) -> &ProviderKey {
        &self.provider
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether this dependency resolves to a single exporter.
    pub(crate) fn is_single(&self) -> bool {
        self.provider.mode() == ProviderMode::Exclusive || self.key.is_some()
    }
}

/// A declared export of a provider.
#[derive(Debug, Clone)]
pub struct Export {
    pub(crate) provider: ProviderKey,
    pub(crate) scope: Option<ExportScope>,
    pub(crate) key: Option<String>,
}

impl Export {
    pub fn new<T>(provider: &ProviderType<T>) -> Self {
        Self {
            provider: provider.key().clone(),
            scope: None,
            key: None,
        }
    }

    /// Export into a scope opened by an ancestor instead of the parent's
    /// subtree.
    pub fn scope(mut self, scope: &ExportScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Publish under a key so keyed read-only consumers can select it.
    pub fn keyed(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn provider(&self) -> &ProviderKey {
        &self.provider
    }
}

/// Collects what a generator declares in [`Generator::define`].
#[derive(Default)]
pub struct Definition {
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) exports: Vec<Export>,
    pub(crate) scopes: Vec<ExportScope>,
    pub(crate) children: Vec<(String, Arc<dyn Generator>)>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a provider.
    pub fn depends_on<T>(&mut self, provider: &ProviderType<T>) -> &mut Self {
        self.depend(Dependency::new(provider))
    }

    pub fn depend(&mut self, dependency: Dependency) -> &mut Self {
        self.dependencies.push(dependency);
        self
    }

    /// Offer a provider to the parent's subtree.
    pub fn exports<T>(&mut self, provider: &ProviderType<T>) -> &mut Self {
        self.export(Export::new(provider))
    }

    pub fn export(&mut self, export: Export) -> &mut Self {
        self.exports.push(export);
        self
    }

    /// Open an export scope for this generator's subtree.
    pub fn opens_scope(&mut self, scope: &ExportScope) -> &mut Self {
        self.scopes.push(scope.clone());
        self
    }

    /// Mount a child generator under `name`.
    pub fn child<G: Generator + 'static>(&mut self, name: &str, generator: G) -> &mut Self {
        self.children.push((name.to_string(), Arc::new(generator)));
        self
    }

    /// Mount an already shared child generator.
    pub fn child_shared(&mut self, name: &str, generator: Arc<dyn Generator>) -> &mut Self {
        self.children.push((name.to_string(), generator));
        self
    }
}

/// Per-file options attached to an output descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOptions {
    /// Recreate the file even if the user deleted it.
    pub always_regenerate: bool,
    /// Write the file only when it does not exist on disk yet.
    pub never_overwrite: bool,
}

/// Generated file content
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Rendered text, e.g. the output of a template engine.
    Text(String),
    /// A structured document, rendered in the format of the file's merge
    /// strategy.
    Structured(serde_json::Value),
}

/// A declared output file
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    /// Normalized path relative to the managed root.
    pub path: String,
    pub content: Content,
    pub strategy: MergeStrategy,
    pub options: FileOptions,
}

impl OutputFile {
    pub fn text(path: &str, content: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            content: Content::Text(content.into()),
            strategy: MergeStrategy::Auto,
            options: FileOptions::default(),
        }
    }

    pub fn structured(path: &str, value: serde_json::Value) -> Self {
        Self {
            path: path.to_string(),
            content: Content::Structured(value),
            strategy: MergeStrategy::Auto,
            options: FileOptions::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn always_regenerate(mut self) -> Self {
        self.options.always_regenerate = true;
        self
    }

    pub fn never_overwrite(mut self) -> Self {
        self.options.never_overwrite = true;
        self
    }
}

/// Resolved values for one declared dependency.
pub(crate) struct ResolvedValues {
    pub dependency: Dependency,
    pub values: Vec<ProviderValue>,
}

/// Handed to [`Generator::build`]: resolved dependencies in, exports and
/// files out.
pub struct BuildContext<'a> {
    identity: &'a str,
    resolved: Vec<ResolvedValues>,
    declared_exports: &'a [Export],
    pub(crate) exports: HashMap<u64, ProviderValue>,
    pub(crate) files: Vec<OutputFile>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        identity: &'a str,
        resolved: Vec<ResolvedValues>,
        declared_exports: &'a [Export],
    ) -> Self {
        Self {
            identity,
            resolved,
            declared_exports,
            exports: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Identity of the instance being built.
    pub fn identity(&self) -> &str {
        self.identity
    }

    /// The single value of a required exclusive or keyed dependency.
    pub fn get<T: Any + Send + Sync>(&self, provider: &ProviderType<T>) -> Result<Arc<T>, BuildError> {
        self.get_optional(provider)?.ok_or_else(|| {
            Error::UnresolvedDependency {
                instance: self.identity.to_string(),
                provider: provider.name().to_string(),
            }
            .into()
        })
    }

    /// The value of an optional dependency, if an exporter was reachable.
    pub fn get_optional<T: Any + Send + Sync>(
        &self,
        provider: &ProviderType<T>,
    ) -> Result<Option<Arc<T>>, BuildError> {
        let values = self.values_for(provider)?;
        match values.first() {
            Some(value) => Ok(Some(self.downcast(provider, value)?)),
            None => Ok(None),
        }
    }

    /// Every reachable export of a read-only dependency, nearest first.
    pub fn get_all<T: Any + Send + Sync>(
        &self,
        provider: &ProviderType<T>,
    ) -> Result<Vec<Arc<T>>, BuildError> {
        self.values_for(provider)?
            .iter()
            .map(|value| self.downcast(provider, value))
            .collect()
    }

    /// Publish the value of a declared export.
    pub fn export<T: Any + Send + Sync>(
        &mut self,
        provider: &ProviderType<T>,
        value: T,
    ) -> Result<(), BuildError> {
        if !self
            .declared_exports
            .iter()
            .any(|e| e.provider == *provider.key())
        {
            return Err(format!(
                "'{}' exported provider '{}' without declaring it",
                self.identity,
                provider.name()
            )
            .into());
        }
        self.exports.insert(provider.key().id(), Arc::new(value));
        Ok(())
    }

    /// Emit an output file.
    pub fn add_file(&mut self, mut file: OutputFile) -> Result<(), BuildError> {
        file.path = normalize_output_path(&file.path)?;
        self.files.push(file);
        Ok(())
    }

    fn values_for<T>(&self, provider: &ProviderType<T>) -> Result<&[ProviderValue], BuildError> {
        self.resolved
            .iter()
            .find(|r| r.dependency.provider == *provider.key())
            .map(|r| r.values.as_slice())
            .ok_or_else(|| {
                format!(
                    "'{}' read provider '{}' without declaring a dependency on it",
                    self.identity,
                    provider.name()
                )
                .into()
            })
    }

    fn downcast<T: Any + Send + Sync>(
        &self,
        provider: &ProviderType<T>,
        value: &ProviderValue,
    ) -> Result<Arc<T>, BuildError> {
        Arc::clone(value).downcast::<T>().map_err(|_| {
            Error::ProviderMismatch {
                instance: self.identity.to_string(),
                provider: provider.name().to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Closure-backed generators for unit tests.

    use super::*;

    type DefineFn = Box<dyn Fn(&mut Definition) + Send + Sync>;
    type BuildFn = Box<dyn Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync>;

    pub struct FnGenerator {
        define: DefineFn,
        build: BuildFn,
    }

    impl FnGenerator {
        pub fn new(
            define: impl Fn(&mut Definition) + Send + Sync + 'static,
            build: impl Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                define: Box::new(define),
                build: Box::new(build),
            }
        }

        pub fn define_only(define: impl Fn(&mut Definition) + Send + Sync + 'static) -> Self {
            Self::new(define, |_| Ok(()))
        }
    }

    impl Generator for FnGenerator {
        fn define(&self, def: &mut Definition) {
            (self.define)(def)
        }

        fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
            (self.build)(ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_builders() {
        let file = OutputFile::text("src/lib.rs", "pub fn a() {}\n")
            .with_strategy(MergeStrategy::Text)
            .always_regenerate();
        assert_eq!(file.strategy, MergeStrategy::Text);
        assert!(file.options.always_regenerate);
        assert!(!file.options.never_overwrite);
    }

    #[test]
    fn test_dependency_single_resolution() {
        let exclusive: ProviderType<u8> = ProviderType::exclusive("a");
        let read_only: ProviderType<u8> = ProviderType::read_only("b");
        assert!(Dependency::new(&exclusive).is_single());
        assert!(!Dependency::new(&read_only).is_single());
        assert!(Dependency::new(&read_only).keyed("k").is_single());
    }

    #[test]
    fn test_context_reads_and_downcasts() {
        let port: ProviderType<u16> = ProviderType::exclusive("port");
        let routes: ProviderType<String> = ProviderType::read_only("routes");
        let resolved = vec![
            ResolvedValues {
                dependency: Dependency::new(&port),
                values: vec![Arc::new(8080u16)],
            },
            ResolvedValues {
                dependency: Dependency::new(&routes),
                values: vec![Arc::new("/a".to_string()), Arc::new("/b".to_string())],
            },
        ];
        let ctx = BuildContext::new("root/server", resolved, &[]);

        assert_eq!(*ctx.get(&port).unwrap(), 8080);
        let all: Vec<String> = ctx
            .get_all(&routes)
            .unwrap()
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(all, vec!["/a", "/b"]);
    }

    #[test]
    fn test_context_rejects_undeclared_dependency() {
        let port: ProviderType<u16> = ProviderType::exclusive("port");
        let ctx = BuildContext::new("root", Vec::new(), &[]);
        let err = ctx.get(&port).unwrap_err();
        assert!(err.to_string().contains("without declaring"));
    }

    #[test]
    fn test_context_type_mismatch() {
        let port: ProviderType<u16> = ProviderType::exclusive("port");
        let resolved = vec![ResolvedValues {
            dependency: Dependency::new(&port),
            values: vec![Arc::new("not a number".to_string())],
        }];
        let ctx = BuildContext::new("root", resolved, &[]);
        let err = ctx.get(&port).unwrap_err();
        assert!(err.to_string().contains("Provider type mismatch"));
    }

    #[test]
    fn test_context_export_requires_declaration() {
        let port: ProviderType<u16> = ProviderType::exclusive("port");
        let declared = [Export::new(&port)];
        let mut ctx = BuildContext::new("root", Vec::new(), &declared);
        ctx.export(&port, 80).unwrap();
        assert!(ctx.exports.contains_key(&port.key().id()));

        let other: ProviderType<u16> = ProviderType::exclusive("other");
        assert!(ctx.export(&other, 1).is_err());
    }

    #[test]
    fn test_context_add_file_normalizes_path() {
        let mut ctx = BuildContext::new("root", Vec::new(), &[]);
        ctx.add_file(OutputFile::text("./src//main.rs", "")).unwrap();
        assert_eq!(ctx.files[0].path, "src/main.rs");
        assert!(ctx.add_file(OutputFile::text("../escape.txt", "")).is_err());
    }
}
