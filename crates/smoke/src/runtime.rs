// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host object runtime seam.
//!
//! The engine never talks to an object system directly. Reference counting,
//! method lookup and class-hierarchy queries all go through the
//! [`ObjectRuntime`] installed with [`install`]. Until something is installed
//! the [`DetachedRuntime`] is used: retain/release do nothing and no method
//! resolves.
//!
//! Selectors are interned C strings registered with [`Selector::register`];
//! two registrations of the same name yield the same pointer, which is what
//! the `:` type code carries across a call.

use arc_swap::ArcSwap;
use dashmap::{DashMap, DashSet};
use std::ffi::{c_char, c_void, CStr, CString};
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

/// Ownership discipline of an object-typed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Retention {
    /// The slot owns one reference (retained on store, released on drop).
    Strong,
    /// Zeroing weak reference; not owned by the slot.
    Weak,
    /// Plain pointer; not owned.
    #[default]
    Unretained,
}

impl Retention {
    pub fn is_owned(self) -> bool {
        matches!(self, Self::Strong)
    }
}

/// Operations the engine needs from the host object system.
///
/// All methods take raw object pointers; null is never passed.
pub trait ObjectRuntime: Send + Sync {
    /// Take one reference; returns the object (usually `object` itself).
    fn retain(&self, object: *mut c_void) -> *mut c_void;

    /// Drop one reference.
    fn release(&self, object: *mut c_void);

    /// Implementation address for `selector` on `receiver`'s class.
    fn resolve_method(&self, _receiver: *mut c_void, _selector: Selector) -> Option<*const c_void> {
        None
    }

    /// Whether class `class` is `superclass` or inherits from it.
    fn is_subclass(&self, _class: &str, _superclass: &str) -> bool {
        false
    }

    /// Whether class `class` adopts `protocol`.
    fn conforms_to(&self, _class: &str, _protocol: &str) -> bool {
        false
    }
}

/// Runtime used when no host runtime is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedRuntime;

impl ObjectRuntime for DetachedRuntime {
    fn retain(&self, object: *mut c_void) -> *mut c_void {
        object
    }

    fn release(&self, _object: *mut c_void) {}
}

static RUNTIME: OnceLock<ArcSwap<Arc<dyn ObjectRuntime>>> = OnceLock::new();

fn slot() -> &'static ArcSwap<Arc<dyn ObjectRuntime>> {
    RUNTIME.get_or_init(|| {
        let detached: Arc<dyn ObjectRuntime> = Arc::new(DetachedRuntime);
        ArcSwap::from_pointee(detached)
    })
}

/// Install `runtime` process-wide; returns the previously installed one.
///
/// Values created under the previous runtime are released through whichever
/// runtime is current when they drop.
pub fn install(runtime: Arc<dyn ObjectRuntime>) -> Arc<dyn ObjectRuntime> {
    log::debug!("[runtime] installing object runtime");
    let previous = slot().swap(Arc::new(runtime));
    Arc::clone(&*previous)
}

/// Currently installed runtime.
pub fn current() -> Arc<dyn ObjectRuntime> {
    let guard = slot().load();
    Arc::clone(&**guard)
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Interned method name, passed to callees as a NUL-terminated `const char *`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Selector(NonNull<c_char>);

// SAFETY: the pointer targets a leaked, immutable, NUL-terminated string that
// lives for the rest of the process.
unsafe impl Send for Selector {}
// SAFETY: see above; the pointee is never written.
unsafe impl Sync for Selector {}

static SELECTORS: OnceLock<DashMap<Box<str>, Selector>> = OnceLock::new();
static ADDRESSES: OnceLock<DashSet<usize>> = OnceLock::new();

impl Selector {
    /// Intern `name`. Anything after an interior NUL is ignored.
    pub fn register(name: &str) -> Self {
        let name = name.split('\0').next().unwrap_or_default();
        let registry = SELECTORS.get_or_init(DashMap::new);
        if let Some(existing) = registry.get(name) {
            return *existing;
        }

        *registry.entry(name.into()).or_insert_with(|| {
            log::trace!("[runtime] registering selector '{}'", name);
            let owned = CString::new(name).unwrap_or_default();
            let leaked: &'static CStr = Box::leak(owned.into_boxed_c_str());
            ADDRESSES
                .get_or_init(DashSet::new)
                .insert(leaked.as_ptr() as usize);
            Selector(NonNull::from(leaked).cast())
        })
    }

    /// Selector whose interned name lives at `ptr`.
    ///
    /// Returns `None` for null and for any pointer not handed out by
    /// [`Selector::register`].
    pub fn from_ptr(ptr: *const c_char) -> Option<Self> {
        let known = ADDRESSES
            .get()
            .is_some_and(|addresses| addresses.contains(&(ptr as usize)));
        if !known {
            return None;
        }
        NonNull::new(ptr.cast_mut()).map(Selector)
    }

    pub fn name(&self) -> &'static str {
        // SAFETY: built from a leaked CString in `register`.
        let cstr = unsafe { CStr::from_ptr(self.0.as_ptr()) };
        cstr.to_str().unwrap_or_default()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0.as_ptr()
    }

    /// Number of arguments the name implies (one per colon).
    pub fn arity(&self) -> usize {
        self.name().bytes().filter(|&b| b == b':').count()
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.name()).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw `SEL` as stored in a `:` slot; may be null or foreign.
///
/// Read selectors out of values through this type and convert with
/// [`SelectorRef::selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SelectorRef(pub *const c_char);

impl SelectorRef {
    pub const NULL: Self = Self(std::ptr::null());

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// The registered selector this points at, if any.
    pub fn selector(self) -> Option<Selector> {
        Selector::from_ptr(self.0)
    }
}

impl From<Selector> for SelectorRef {
    fn from(selector: Selector) -> Self {
        Self(selector.as_ptr())
    }
}
