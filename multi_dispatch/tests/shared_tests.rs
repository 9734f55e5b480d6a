//! Tests for the process-wide dispatch context.
//!
//! Everything touching `shared::global()` lives in one test so parallel test
//! threads never reset it under each other.

mod common;

use std::thread;

use common::{handle, NO_PARENTS};
use multi_dispatch::shared;

#[test]
fn test_global_context_is_shared_and_resettable() {
    let ctx = shared::global();
    assert!(std::ptr::eq(ctx, shared::global()));

    ctx.register_class("Widget", NO_PARENTS).unwrap();
    ctx.register_class("Button", ["Widget"]).unwrap();
    ctx.define_generic("draw", 1, &[0], &[]).unwrap();
    ctx.define_method("draw", ["Widget"], handle(3)).unwrap();

    // Registrations are visible from any thread
    let seen = thread::spawn(|| shared::global().resolve("draw", ["Button"]).unwrap())
        .join()
        .unwrap();
    assert_eq!(seen, handle(3));

    ctx.reset();
    assert_eq!(shared::global().class_count(), 0);
    assert!(shared::global().resolve("draw", ["Button"]).is_err());
}
