//! Shared fixtures for ucg-engine integration tests
//!
//! - [`Facts`]: fluent builder for in-memory fact sets
//! - [`TestRepo`]: tempdir-backed projects for extraction tests

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod test_repo;

pub use test_repo::TestRepo;

use ucg_engine::facts::{
    module_path_for, CallFact, FactSet, ImportFact, ImportedName, SourceFile, SymbolFact, SymbolKind,
};
use ucg_engine::{BuildRequest, EnrichmentFlags, Engine, GraphHandle, NodeKind};

/// Fluent builder for Python fact sets
#[derive(Default)]
pub struct Facts {
    set: FactSet,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, file: &str) {
        if !self.set.files.iter().any(|f| f.path == file) {
            self.set.files.push(SourceFile {
                path: file.to_string(),
                language: "python".into(),
                content_hash: self.set.files.len() as u64 + 1,
            });
        }
    }

    pub fn function(mut self, file: &str, name: &str) -> Self {
        self.touch(file);
        let line = self.set.symbols.len() * 10 + 1;
        self.set.symbols.push(SymbolFact {
            language: "python".into(),
            file_path: file.into(),
            name: name.into(),
            kind: SymbolKind::Function,
            line,
            end_line: line + 5,
            ..SymbolFact::default()
        });
        self
    }

    pub fn class(mut self, file: &str, name: &str, bases: &[&str]) -> Self {
        self.touch(file);
        let line = self.set.symbols.len() * 10 + 1;
        self.set.symbols.push(SymbolFact {
            language: "python".into(),
            file_path: file.into(),
            name: name.into(),
            kind: SymbolKind::Class,
            line,
            end_line: line + 8,
            bases: bases.iter().map(|b| b.to_string()).collect(),
            ..SymbolFact::default()
        });
        self
    }

    pub fn method(mut self, file: &str, class: &str, name: &str) -> Self {
        self.touch(file);
        let line = self.set.symbols.len() * 10 + 1;
        self.set.symbols.push(SymbolFact {
            language: "python".into(),
            file_path: file.into(),
            name: name.into(),
            kind: SymbolKind::Method,
            enclosing_class: Some(class.into()),
            line,
            end_line: line + 3,
            ..SymbolFact::default()
        });
        self
    }

    pub fn call(mut self, file: &str, caller: &str, callee: &str) -> Self {
        self.touch(file);
        let line = self.set.calls.len() + 2;
        self.set.calls.push(CallFact {
            language: "python".into(),
            file_path: file.into(),
            caller: Some(caller.into()),
            callee: callee.into(),
            line,
        });
        self
    }

    /// `import module` (level 0) or `from .module import names`
    pub fn import(mut self, file: &str, module: &str, level: usize, names: &[&str]) -> Self {
        self.touch(file);
        self.set.imports.push(ImportFact {
            language: "python".into(),
            file_path: file.into(),
            module: module.into(),
            level,
            names: names
                .iter()
                .map(|n| ImportedName {
                    name: n.to_string(),
                    alias: None,
                })
                .collect(),
            alias: None,
            line: 1,
        });
        self
    }

    pub fn build(self) -> FactSet {
        self.set
    }
}

/// Node id for a Python symbol in `file`
pub fn py_id(file: &str, kind: NodeKind, name: &str) -> String {
    format!("python::{}::{}::{}", module_path_for(file), kind.as_str(), name)
}

pub fn py_fn(file: &str, name: &str) -> String {
    py_id(file, NodeKind::Function, name)
}

pub fn py_module(file: &str) -> String {
    let module = module_path_for(file);
    py_id(file, NodeKind::Module, &module)
}

/// Build `facts` with the default engine and the given enrichment
pub fn build_with(engine: &Engine, facts: FactSet, flags: EnrichmentFlags) -> GraphHandle {
    engine
        .build(BuildRequest::new("/fixture").with_facts(facts).with_flags(flags))
        .expect("in-memory build never fails")
        .handle
}

/// `a -> b -> c` in one file
pub fn abc_chain() -> FactSet {
    Facts::new()
        .function("m.py", "a")
        .function("m.py", "b")
        .function("m.py", "c")
        .call("m.py", "a", "b")
        .call("m.py", "b", "c")
        .build()
}

/// Linear call chain `f0 -> f1 -> ... -> f{n-1}` in one file
pub fn linear_chain(n: usize) -> FactSet {
    let mut facts = Facts::new();
    for i in 0..n {
        facts = facts.function("chain.py", &format!("f{}", i));
    }
    for i in 1..n {
        facts = facts.call("chain.py", &format!("f{}", i - 1), &format!("f{}", i));
    }
    facts.build()
}

/// Deterministic pseudo-random numbers (xorshift) for generated fact sets
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

/// Random project of `files` files with `per_file` functions and
/// `calls` call sites, some of which target names that do not exist
pub fn random_facts(seed: u64, files: usize, per_file: usize, calls: usize) -> FactSet {
    let mut rng = Rng::new(seed);
    let mut facts = Facts::new();
    for f in 0..files {
        let file = format!("pkg/m{}.py", f);
        for s in 0..per_file {
            facts = facts.function(&file, &format!("fn_{}_{}", f, s));
        }
        if f > 0 {
            let target = rng.below(files);
            facts = facts.import(&file, &format!("m{}", target), 1, &[]);
        }
    }
    for _ in 0..calls {
        let f = rng.below(files);
        let caller = format!("fn_{}_{}", f, rng.below(per_file));
        // one in five targets a name nobody defines
        let callee = if rng.below(5) == 0 {
            format!("missing_{}", rng.below(100))
        } else {
            format!("fn_{}_{}", rng.below(files), rng.below(per_file))
        };
        facts = facts.call(&format!("pkg/m{}.py", f), &caller, &callee);
    }
    facts.build()
}
