//! Shared helpers for integration tests
// Each test target uses a different subset of these helpers.
#![allow(dead_code)]

use multi_dispatch::{ArgType, DispatchContext, ImplHandle};

pub const NO_PARENTS: [&str; 0] = [];

/// Context with `Animal <- Dog` and a one-argument generic `speak`.
pub fn animals() -> DispatchContext {
    let ctx = DispatchContext::new();
    ctx.register_class("Animal", NO_PARENTS).unwrap();
    ctx.register_class("Dog", ["Animal"]).unwrap();
    ctx.define_generic("speak", 1, &[0], &[]).unwrap();
    ctx
}

/// Context with the diamond `R <- B, R <- C, B <- D, C <- D` and a
/// one-argument generic `speak`.
pub fn diamond() -> DispatchContext {
    let ctx = DispatchContext::new();
    build_diamond(&ctx);
    ctx
}

pub fn build_diamond(ctx: &DispatchContext) {
    ctx.register_class("R", NO_PARENTS).unwrap();
    ctx.register_class("B", ["R"]).unwrap();
    ctx.register_class("C", ["R"]).unwrap();
    ctx.register_class("D", ["B", "C"]).unwrap();
    ctx.define_generic("speak", 1, &[0], &[]).unwrap();
}

/// Resolve a single-argument call and return the raw handle.
pub fn resolve1(ctx: &DispatchContext, generic: &str, class: &str) -> usize {
    ctx.resolve(generic, [ArgType::of(class)])
        .unwrap_or_else(|e| panic!("resolve {}({}) failed: {}", generic, class, e))
        .0
}

pub fn handle(n: usize) -> ImplHandle {
    ImplHandle(n)
}
