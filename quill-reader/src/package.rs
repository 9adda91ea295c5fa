// quill-reader - Package system for interned symbols and global bindings
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Packages: interning scopes, value bindings, and macro tables.
//!
//! A package owns the symbols interned in it, a symbol→value binding map, a
//! symbol→macro table, and an ordered list of imported packages. Name-based
//! resolution checks the package itself first, then walks the imports,
//! accepting only exported symbols there. A prefixed name (`pkg:name`)
//! resolves only in `pkg`, never through `pkg`'s imports.

// Symbols hash by interned identity, not by their mutable exported flag.
#![allow(clippy::mutable_key_type)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::symbol::Symbol;
use crate::value::QuillVal;

/// Name of the global package. Its symbols print without a prefix.
pub const GLOBAL_PACKAGE: &str = "global";
/// Name of the keyword package (the empty string). Its symbols print `:name`.
pub const KEYWORD_PACKAGE: &str = "";
/// Name of the package holding the primitives, auto-imported by user packages.
pub const CORE_PACKAGE: &str = "core";

/// Error raised when a symbol is used against a package that did not
/// intern it.
#[derive(Debug, Clone, Error)]
pub enum PackageError {
    #[error("symbol '{symbol}' belongs to package '{owner}', not '{package}'")]
    ForeignSymbol {
        symbol: String,
        owner: String,
        package: String,
    },
}

/// A compile-time macro: formal parameters plus a compiled body closure,
/// stored per symbol in the symbol's owning package.
#[derive(Debug, Clone)]
pub struct MacroDef {
    /// Symbol the macro is installed under.
    pub name: Symbol,
    /// Formal parameter list (same shapes as a lambda's).
    pub params: QuillVal,
    /// Compiled body; always a closure value.
    pub body: QuillVal,
}

/// A named container of interned symbols, bindings, macros, and imports.
///
/// Packages are cheap `Rc` handles; cloning shares the underlying state.
#[derive(Clone)]
pub struct Package {
    inner: Rc<RefCell<PackageInner>>,
}

pub(crate) struct PackageInner {
    name: Rc<str>,
    symbols: HashMap<String, Symbol>,
    bindings: HashMap<Symbol, QuillVal>,
    macros: HashMap<Symbol, Rc<MacroDef>>,
    imports: Vec<Package>,
}

impl Package {
    /// Create a new empty package. Use the registry's `find_or_create` in
    /// preference to this; a loose package is invisible to the reader.
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Package {
            inner: Rc::new(RefCell::new(PackageInner {
                name: name.into(),
                symbols: HashMap::new(),
                bindings: HashMap::new(),
                macros: HashMap::new(),
                imports: Vec::new(),
            })),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<PackageInner>>) -> Self {
        Package { inner }
    }

    /// The package name.
    #[must_use]
    pub fn name(&self) -> Rc<str> {
        self.inner.borrow().name.clone()
    }

    /// Whether this is the global package.
    #[must_use]
    pub fn is_global(&self) -> bool {
        &*self.name() == GLOBAL_PACKAGE
    }

    /// Whether this is the keyword package.
    #[must_use]
    pub fn is_keywords(&self) -> bool {
        &*self.name() == KEYWORD_PACKAGE
    }

    /// Intern `name` in this package, creating the symbol if absent.
    /// Does not consult imports; see [`Package::resolve`] for that.
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(sym) = self.inner.borrow().symbols.get(name) {
            return sym.clone();
        }
        let mut inner = self.inner.borrow_mut();
        let pkg_name = inner.name.clone();
        let sym = Symbol::new(Rc::from(name), Rc::downgrade(&self.inner), pkg_name);
        inner.symbols.insert(name.to_string(), sym.clone());
        sym
    }

    /// Look up a symbol by name in this package only.
    #[must_use]
    pub fn find_symbol(&self, name: &str) -> Option<Symbol> {
        self.inner.borrow().symbols.get(name).cloned()
    }

    /// Resolve a bare name: this package's own symbols first, then the
    /// imports in order, accepting only exported symbols there.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.find_symbol(name) {
            return Some(sym);
        }
        let imports = self.imports();
        for import in imports {
            if let Some(sym) = import.find_symbol(name) {
                if sym.is_exported() {
                    return Some(sym);
                }
            }
        }
        None
    }

    /// The value bound to `sym` in this package, if any.
    #[must_use]
    pub fn get(&self, sym: &Symbol) -> Option<QuillVal> {
        self.inner.borrow().bindings.get(sym).cloned()
    }

    /// Bind `sym` to `value` in this package. Binding nil removes the
    /// binding. Fails if `sym` was interned by another package.
    pub fn set(&self, sym: &Symbol, value: QuillVal) -> Result<(), PackageError> {
        self.check_ownership(sym)?;
        let mut inner = self.inner.borrow_mut();
        if value.is_nil() {
            inner.bindings.remove(sym);
        } else {
            inner.bindings.insert(sym.clone(), value);
        }
        Ok(())
    }

    /// The macro installed under `sym`, if any.
    #[must_use]
    pub fn macro_of(&self, sym: &Symbol) -> Option<Rc<MacroDef>> {
        self.inner.borrow().macros.get(sym).cloned()
    }

    /// Install a macro under `sym`. Fails if `sym` was interned by another
    /// package. Replaces any previous macro of the same name.
    pub fn define_macro(&self, sym: &Symbol, def: MacroDef) -> Result<(), PackageError> {
        self.check_ownership(sym)?;
        self.inner.borrow_mut().macros.insert(sym.clone(), Rc::new(def));
        Ok(())
    }

    /// Append `package` to this package's import list (no-op for self or
    /// duplicate imports).
    pub fn import(&self, package: &Package) {
        if Rc::ptr_eq(&self.inner, &package.inner) {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.imports.iter().any(|p| Rc::ptr_eq(&p.inner, &package.inner)) {
            inner.imports.push(package.clone());
        }
    }

    /// The ordered list of imported packages.
    #[must_use]
    pub fn imports(&self) -> Vec<Package> {
        self.inner.borrow().imports.clone()
    }

    /// All symbols of this package currently marked exported.
    #[must_use]
    pub fn exports(&self) -> Vec<Symbol> {
        let mut exported: Vec<Symbol> = self
            .inner
            .borrow()
            .symbols
            .values()
            .filter(|sym| sym.is_exported())
            .cloned()
            .collect();
        exported.sort_by(|a, b| a.name().cmp(b.name()));
        exported
    }

    fn check_ownership(&self, sym: &Symbol) -> Result<(), PackageError> {
        if sym.belongs_to(&self.inner) {
            Ok(())
        } else {
            Err(PackageError::ForeignSymbol {
                symbol: sym.name().to_string(),
                owner: sym.package_name().to_string(),
                package: self.name().to_string(),
            })
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        write!(
            f,
            "Package({}, {} symbols, {} bindings)",
            inner.name,
            inner.symbols.len(),
            inner.bindings.len()
        )
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of all packages plus the *current* package the reader interns
/// bare names into.
///
/// The baseline holds the global package, the keyword package (empty-string
/// name), and the core package; the global package imports core, and every
/// user package created later does too.
#[derive(Clone)]
pub struct PackageRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

struct RegistryInner {
    packages: HashMap<String, Package>,
    current: Package,
}

impl PackageRegistry {
    /// Create a registry in the baseline state, with the global package
    /// current.
    #[must_use]
    pub fn new() -> Self {
        let registry = PackageRegistry {
            inner: Rc::new(RefCell::new(RegistryInner {
                packages: HashMap::new(),
                // Placeholder replaced by reset() below.
                current: Package::new(GLOBAL_PACKAGE),
            })),
        };
        registry.reset();
        registry
    }

    /// Return the registry to the baseline state: only the global, keyword,
    /// and core packages exist, the global package imports core, and the
    /// global package is current.
    pub fn reset(&self) {
        let global = Package::new(GLOBAL_PACKAGE);
        let keywords = Package::new(KEYWORD_PACKAGE);
        let core = Package::new(CORE_PACKAGE);
        global.import(&core);

        let mut inner = self.inner.borrow_mut();
        inner.packages.clear();
        inner
            .packages
            .insert(GLOBAL_PACKAGE.to_string(), global.clone());
        inner.packages.insert(KEYWORD_PACKAGE.to_string(), keywords);
        inner.packages.insert(CORE_PACKAGE.to_string(), core);
        inner.current = global;
    }

    /// The global package.
    #[must_use]
    pub fn global(&self) -> Package {
        self.find(GLOBAL_PACKAGE).expect("global package exists")
    }

    /// The keyword package.
    #[must_use]
    pub fn keywords(&self) -> Package {
        self.find(KEYWORD_PACKAGE).expect("keyword package exists")
    }

    /// The core package.
    #[must_use]
    pub fn core(&self) -> Package {
        self.find(CORE_PACKAGE).expect("core package exists")
    }

    /// Look up a package by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Package> {
        self.inner.borrow().packages.get(name).cloned()
    }

    /// Look up a package, creating it (with a core import) if absent.
    pub fn find_or_create(&self, name: &str) -> Package {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        let package = Package::new(name);
        package.import(&self.core());
        self.inner
            .borrow_mut()
            .packages
            .insert(name.to_string(), package.clone());
        package
    }

    /// The package bare names are currently interned into.
    #[must_use]
    pub fn current(&self) -> Package {
        self.inner.borrow().current.clone()
    }

    /// Make `package` current.
    pub fn set_current(&self, package: &Package) {
        self.inner.borrow_mut().current = package.clone();
    }

    /// Names of all registered packages, sorted.
    #[must_use]
    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.borrow().packages.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PackageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_packages() {
        let registry = PackageRegistry::new();
        assert!(registry.global().is_global());
        assert!(registry.keywords().is_keywords());
        assert_eq!(&*registry.core().name(), "core");
        assert_eq!(registry.current(), registry.global());
        // The global package sees core's exported symbols.
        let plus = registry.core().intern("+");
        plus.set_exported(true);
        assert_eq!(registry.global().resolve("+"), Some(plus));
    }

    #[test]
    fn user_packages_import_core() {
        let registry = PackageRegistry::new();
        let cons = registry.core().intern("cons");
        cons.set_exported(true);
        let foo = registry.find_or_create("foo");
        assert_eq!(foo.resolve("cons"), Some(cons));
    }

    #[test]
    fn unexported_symbols_are_invisible_through_imports() {
        let registry = PackageRegistry::new();
        let hidden = registry.core().intern("hidden");
        let foo = registry.find_or_create("foo");
        assert_eq!(foo.resolve("hidden"), None);
        hidden.set_exported(true);
        assert_eq!(foo.resolve("hidden"), Some(hidden));
    }

    #[test]
    fn own_symbols_shadow_imports() {
        let registry = PackageRegistry::new();
        let core_x = registry.core().intern("x");
        core_x.set_exported(true);
        let foo = registry.find_or_create("foo");
        let foo_x = foo.intern("x");
        assert_eq!(foo.resolve("x"), Some(foo_x));
    }

    #[test]
    fn bindings_and_nil_unbinding() {
        let registry = PackageRegistry::new();
        let pkg = registry.global();
        let sym = pkg.intern("v");
        assert_eq!(pkg.get(&sym), None);
        pkg.set(&sym, QuillVal::int(5)).unwrap();
        assert_eq!(pkg.get(&sym), Some(QuillVal::int(5)));
        pkg.set(&sym, QuillVal::nil()).unwrap();
        assert_eq!(pkg.get(&sym), None);
    }

    #[test]
    fn cross_package_set_is_an_error() {
        let registry = PackageRegistry::new();
        let sym = registry.core().intern("owned");
        let err = registry.global().set(&sym, QuillVal::int(1));
        assert!(err.is_err());
    }

    #[test]
    fn reset_restores_baseline() {
        let registry = PackageRegistry::new();
        let foo = registry.find_or_create("foo");
        registry.set_current(&foo);
        registry.reset();
        assert!(registry.find("foo").is_none());
        assert_eq!(registry.current(), registry.global());
        assert_eq!(
            registry.package_names(),
            vec!["".to_string(), "core".to_string(), "global".to_string()]
        );
    }

    #[test]
    fn macro_table() {
        let registry = PackageRegistry::new();
        let pkg = registry.global();
        let sym = pkg.intern("twice");
        assert!(pkg.macro_of(&sym).is_none());
        pkg.define_macro(
            &sym,
            MacroDef {
                name: sym.clone(),
                params: QuillVal::nil(),
                body: QuillVal::nil(),
            },
        )
        .unwrap();
        assert!(pkg.macro_of(&sym).is_some());
    }
}
