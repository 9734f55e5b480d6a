//! Process-wide dispatch context.
//!
//! Most programs want one registry shared by every module that defines
//! classes and methods. The global context is created lazily on first use
//! with the default configuration. Code that needs isolation (tests, or
//! several independent class hierarchies) should own a
//! [`DispatchContext`] instead.

use once_cell::sync::Lazy;

use crate::context::DispatchContext;

static GLOBAL: Lazy<DispatchContext> = Lazy::new(|| {
    tracing::debug!("initializing global dispatch context");
    DispatchContext::new()
});

/// The process-wide dispatch context.
pub fn global() -> &'static DispatchContext {
    &GLOBAL
}
