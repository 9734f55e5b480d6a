//! Type-level vocabulary shared by the registries and the resolver.
//!
//! # Module Organization
//!
//! - `sig_type.rs`: SigType, the per-position entry of a method signature
//!   (a class name or one of the pseudo-types `ANY` / `MISSING`)
//! - `arg_type.rs`: ArgType, the per-position observation at a call site
//!   (a concrete class name or the absent marker)

mod arg_type;
mod sig_type;


pub use arg_type::ArgType;
pub use sig_type::{SigType, ANY, MISSING};

/// Render a tuple of displayable entries as `(A, B, C)`.
pub(crate) fn render_tuple<T: std::fmt::Display>(items: &[T]) -> String {
    let names: Vec<String> = items.iter().map(|t| t.to_string()).collect();
    format!("({})", names.join(", "))
}
