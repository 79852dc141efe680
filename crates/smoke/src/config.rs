// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Smoke Global Configuration
//!
//! Platform constants used by the layout engine and the invocation engine,
//! plus the process-wide engine configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: Compile-time constants (pointer width, `long double`,
//!   argument slot size, hidden-return threshold)
//! - **Level 2 (Dynamic)**: [`EngineConfig`] swapped atomically through [`set`]
//!   and read with [`get`]
//!
//! # Example
//!
//! ```
//! use smoke::config::{self, EngineConfig};
//!
//! let previous = config::get();
//! config::set(EngineConfig::default().with_descriptor_cache_capacity(64));
//! assert_eq!(config::get().descriptor_cache_capacity, 64);
//! config::set((*previous).clone());
//! ```

use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};

// =======================================================================
// Platform ABI
// =======================================================================

/// Size of a data pointer (`void *`, `id`, `SEL`, `char *`).
pub const POINTER_SIZE: usize = std::mem::size_of::<*const u8>();

/// Alignment of a data pointer.
pub const POINTER_ALIGN: usize = std::mem::align_of::<*const u8>();

/// Size of `int`: the minimum slot an argument occupies in a call frame.
pub const INT_SLOT_SIZE: usize = 4;

/// Size of libffi's `ffi_arg`: integral returns are widened to this.
pub const FFI_ARG_SIZE: usize = std::mem::size_of::<usize>();

// long double is an alias of double on Windows and Apple arm64
#[cfg(any(target_os = "windows", all(target_vendor = "apple", target_arch = "aarch64")))]
pub const LONG_DOUBLE_SIZE: usize = 8;
#[cfg(any(target_os = "windows", all(target_vendor = "apple", target_arch = "aarch64")))]
pub const LONG_DOUBLE_ALIGN: usize = 8;

// x87 extended precision padded to 12 bytes on i386
#[cfg(all(
    target_arch = "x86",
    not(target_os = "windows"),
    not(target_vendor = "apple")
))]
pub const LONG_DOUBLE_SIZE: usize = 12;
#[cfg(all(
    target_arch = "x86",
    not(target_os = "windows"),
    not(target_vendor = "apple")
))]
pub const LONG_DOUBLE_ALIGN: usize = 4;

#[cfg(not(any(
    target_os = "windows",
    all(target_vendor = "apple", target_arch = "aarch64"),
    all(
        target_arch = "x86",
        not(target_os = "windows"),
        not(target_vendor = "apple")
    )
)))]
pub const LONG_DOUBLE_SIZE: usize = 16;
#[cfg(not(any(
    target_os = "windows",
    all(target_vendor = "apple", target_arch = "aarch64"),
    all(
        target_arch = "x86",
        not(target_os = "windows"),
        not(target_vendor = "apple")
    )
)))]
pub const LONG_DOUBLE_ALIGN: usize = 16;

/// Largest aggregate returned in registers; bigger ones go through the
/// hidden result pointer.
#[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
pub const REGISTER_RETURN_LIMIT: usize = 16;
#[cfg(all(target_arch = "x86_64", target_os = "windows"))]
pub const REGISTER_RETURN_LIMIT: usize = 8;
#[cfg(target_arch = "aarch64")]
pub const REGISTER_RETURN_LIMIT: usize = 16;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const REGISTER_RETURN_LIMIT: usize = 8;

/// Vectors never align beyond this.
pub const MAX_VECTOR_ALIGN: usize = 16;

// =======================================================================
// Engine Defaults
// =======================================================================

/// Default number of call descriptors kept by the descriptor cache.
pub const DEFAULT_DESCRIPTOR_CACHE_CAPACITY: usize = 256;

/// Environment variable overriding [`EngineConfig::descriptor_cache_capacity`].
pub const DESCRIPTOR_CACHE_CAPACITY_ENV: &str = "SMOKE_DESCRIPTOR_CACHE_CAPACITY";

/// Environment variable overriding [`EngineConfig::verify_layouts`].
pub const VERIFY_LAYOUTS_ENV: &str = "SMOKE_VERIFY_LAYOUTS";

// =======================================================================
// Runtime Configuration
// =======================================================================

/// Engine configuration, swapped atomically as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of cached call descriptors (clamped to at least 1).
    pub descriptor_cache_capacity: usize,
    /// Compare libffi's aggregate layouts with the type model on every
    /// descriptor build.
    pub verify_layouts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            descriptor_cache_capacity: DEFAULT_DESCRIPTOR_CACHE_CAPACITY,
            verify_layouts: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `SMOKE_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(DESCRIPTOR_CACHE_CAPACITY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.descriptor_cache_capacity = capacity,
                Err(_) => log::warn!(
                    "[config] ignoring {}={:?}: not an unsigned integer",
                    DESCRIPTOR_CACHE_CAPACITY_ENV,
                    raw
                ),
            }
        }

        if let Ok(raw) = std::env::var(VERIFY_LAYOUTS_ENV) {
            match parse_flag(&raw) {
                Some(flag) => config.verify_layouts = flag,
                None => log::warn!(
                    "[config] ignoring {}={:?}: expected 0/1/true/false",
                    VERIFY_LAYOUTS_ENV,
                    raw
                ),
            }
        }

        config
    }

    pub fn with_descriptor_cache_capacity(mut self, capacity: usize) -> Self {
        self.descriptor_cache_capacity = capacity;
        self
    }

    pub fn with_verify_layouts(mut self, verify: bool) -> Self {
        self.verify_layouts = verify;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

static ACTIVE: OnceLock<ArcSwap<EngineConfig>> = OnceLock::new();

fn active() -> &'static ArcSwap<EngineConfig> {
    ACTIVE.get_or_init(|| ArcSwap::from_pointee(EngineConfig::from_env()))
}

/// Current engine configuration (environment defaults until [`set`] is called).
pub fn get() -> Arc<EngineConfig> {
    active().load_full()
}

/// Replace the engine configuration for all subsequent operations.
pub fn set(config: EngineConfig) {
    log::debug!("[config] engine configuration set to {:?}", config);
    active().store(Arc::new(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_constants() {
        assert_eq!(POINTER_SIZE, std::mem::size_of::<usize>());
        assert!(LONG_DOUBLE_SIZE >= 8);
        assert!(LONG_DOUBLE_ALIGN.is_power_of_two());
        assert!(FFI_ARG_SIZE >= INT_SLOT_SIZE);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::default()
            .with_descriptor_cache_capacity(8)
            .with_verify_layouts(false);
        assert_eq!(config.descriptor_cache_capacity, 8);
        assert!(!config.verify_layouts);
    }
}
