//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let project = Project::new();
//!     let report = project.run(files(&[("a.txt", "a\n")]));
//! }
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gensync::{
    execute_run, BuildContext, BuildError, Definition, Generator, OutputFile, RunOptions,
    RunReport,
};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::{files, FnGenerator, Project};
}

type DefineFn = Box<dyn Fn(&mut Definition) + Send + Sync>;
type BuildFn = Box<dyn Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync>;

/// A generator assembled from closures.
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

    pub fn build_only(
        build: impl Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(|_| {}, build)
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

/// A root generator emitting fixed text files.
pub fn files(entries: &[(&str, &str)]) -> Arc<dyn Generator> {
    let entries: Vec<(String, String)> = entries
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect();
    Arc::new(FnGenerator::build_only(move |ctx| {
        for (path, content) in &entries {
            ctx.add_file(OutputFile::text(path, content.clone()))?;
        }
        Ok(())
    }))
}

/// A temporary managed project.
pub struct Project {
    pub dir: tempfile::TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn options(&self) -> RunOptions {
        RunOptions::new(self.root())
    }

    /// Run `root` with default options and return the report.
    pub fn run(&self, root: Arc<dyn Generator>) -> RunReport {
        execute_run("app", root, &self.options()).unwrap()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.root().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> Option<String> {
        fs::read_to_string(self.root().join(path)).ok()
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.root().join(path)).unwrap();
    }

    /// Every file under the root with its bytes, sorted by path.
    pub fn tree(&self) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        collect(self.root(), self.root(), &mut out);
        out.sort();
        out
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let relative = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
            out.push((relative, fs::read(&path).unwrap()));
        }
    }
}
