//! On-disk project fixtures for extraction tests

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Temporary project directory populated file by file
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Add a source file with the given content
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    pub fn add_bytes(&self, relative_path: &str, content: &[u8]) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    // ============================================
    // Pre-built project layouts
    // ============================================

    /// Small layered Python web app:
    /// views -> services -> db, plus a db module reaching back up into views
    pub fn python_layered_app() -> Self {
        let repo = Self::new();
        repo.add_file("app/__init__.py", "")
            .add_file(
                "app/views/home.py",
                r#"from ..services.billing import charge
from ..db.session import connect


def index(request):
    """Render the home page."""
    total = charge(request.user)
    return render(total)


def render(total):
    return str(total)
"#,
            )
            .add_file(
                "app/services/billing.py",
                r#"from ..db.session import connect


class Biller:
    def charge(self, user):
        conn = connect()
        return self.price(user)

    def price(self, user):
        return 10


def charge(user):
    return Biller().charge(user)
"#,
            )
            .add_file(
                "app/db/session.py",
                r#"from ..views.home import render


def connect():
    return object()


def unused_helper():
    return render(0)
"#,
            )
            .add_file(
                "main.py",
                r#"from app.views.home import index

if __name__ == "__main__":
    index(None)
"#,
            );
        repo
    }

    /// Rust crate with a trait impl and a test function
    pub fn rust_crate() -> Self {
        let repo = Self::new();
        repo.add_file(
            "src/lib.rs",
            r#"pub mod store;

use crate::store::Store;

pub fn open() -> Store {
    Store::new()
}
"#,
        )
        .add_file(
            "src/store.rs",
            r#"use std::fmt;

pub struct Store {
    items: Vec<String>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_capacity(4)
    }

    fn with_capacity(n: usize) -> Self {
        Store { items: Vec::with_capacity(n) }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store")
    }
}

#[test]
fn opens() {
    let _ = Store::new();
}
"#,
        );
        repo
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
