// quill-reader - Symbol type with per-package interning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Symbols are names interned in a package.
//!
//! # Interning
//!
//! A package guarantees a unique `Symbol` per name, so two symbols with the
//! same name interned in the same package share the same underlying storage:
//!
//! - **O(1) equality**: comparing symbols is a pointer comparison
//! - **O(1) hashing**: the hash is computed from the pointer address
//!
//! Symbols live as long as the package that interned them; the package
//! backreference is a `Weak` so dropping a registry reclaims both sides.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::package::{PackageInner, GLOBAL_PACKAGE, KEYWORD_PACKAGE};

/// An interned name belonging to exactly one package.
///
/// The printed form is `pkg:name`, bare `name` for the global package, and
/// `:name` for the keyword package. The exported flag is the only mutable
/// part and controls visibility through package imports.
#[derive(Clone)]
pub struct Symbol {
    inner: Rc<SymbolInner>,
}

pub(crate) struct SymbolInner {
    name: Rc<str>,
    package: Weak<RefCell<PackageInner>>,
    package_name: Rc<str>,
    exported: Cell<bool>,
}

impl Symbol {
    /// Called by `Package::intern` only; symbols are never created loose.
    pub(crate) fn new(
        name: Rc<str>,
        package: Weak<RefCell<PackageInner>>,
        package_name: Rc<str>,
    ) -> Self {
        Symbol {
            inner: Rc::new(SymbolInner {
                name,
                package,
                package_name,
                exported: Cell::new(false),
            }),
        }
    }

    /// The symbol's name, without any package prefix.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the package that interned this symbol.
    #[inline]
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.inner.package_name
    }

    /// The package that interned this symbol, if it is still alive.
    #[must_use]
    pub fn package(&self) -> Option<crate::package::Package> {
        self.inner
            .package
            .upgrade()
            .map(crate::package::Package::from_inner)
    }

    /// Whether this symbol owner is the given package.
    pub(crate) fn belongs_to(&self, package: &Rc<RefCell<PackageInner>>) -> bool {
        self.inner
            .package
            .upgrade()
            .is_some_and(|owner| Rc::ptr_eq(&owner, package))
    }

    /// Whether this symbol is visible through imports.
    #[inline]
    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.inner.exported.get()
    }

    /// Change the exported flag. Returns the previous value.
    pub fn set_exported(&self, exported: bool) -> bool {
        self.inner.exported.replace(exported)
    }

    /// Whether this symbol was interned in the keyword package.
    #[inline]
    #[must_use]
    pub fn is_keyword(&self) -> bool {
        &*self.inner.package_name == KEYWORD_PACKAGE
    }

    /// Whether this symbol was interned in the global package.
    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        &*self.inner.package_name == GLOBAL_PACKAGE
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pkg = &*self.inner.package_name;
        if pkg == GLOBAL_PACKAGE {
            write!(f, "{}", self.inner.name)
        } else if pkg == KEYWORD_PACKAGE {
            write!(f, ":{}", self.inner.name)
        } else {
            write!(f, "{}:{}", pkg, self.inner.name)
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        // Interning makes pointer comparison sufficient.
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.inner).hash(state);
    }
}

// ============================================================================
// Tests
// ============================================================================
