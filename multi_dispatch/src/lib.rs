//! Multiple dispatch over a multiple-inheritance class graph.
//!
//! A [`DispatchContext`] holds classes, generic operations and the methods
//! registered against them. Resolving a call picks the method whose
//! signature is closest to the observed argument classes, summing ancestor
//! distances over the dispatch positions:
//!
//! ```
//! use multi_dispatch::{ArgType, DispatchContext, ImplHandle};
//!
//! let ctx = DispatchContext::new();
//! ctx.register_class("Animal", Vec::<String>::new()).unwrap();
//! ctx.register_class("Dog", ["Animal"]).unwrap();
//! ctx.define_generic("speak", 1, &[0], &[]).unwrap();
//! ctx.define_method("speak", ["Animal"], ImplHandle(1)).unwrap();
//! ctx.define_method("speak", ["Dog"], ImplHandle(2)).unwrap();
//!
//! assert_eq!(ctx.resolve("speak", [ArgType::of("Dog")]).unwrap(), ImplHandle(2));
//! ```

// Library code reports through `tracing`, never straight to the terminal.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

// Core modules
pub mod class_graph;
pub mod error;
pub mod generic;
pub mod method_table;
pub mod types;

// Resolution
pub mod cache;
pub mod resolver;

// Engine surface
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod shared;
pub mod snapshot;

pub use cache::CacheStats;
pub use class_graph::{ClassDescriptor, ClassGraph, ClassId};
pub use config::DispatchConfig;
pub use context::{DispatchContext, Resolution};
pub use diagnostics::{AmbiguityHook, AmbiguityReport};
pub use error::{DispatchError, DispatchResult};
pub use generic::{GenericId, GenericShape, GenericTable};
pub use method_table::{ImplHandle, MethodEntry, MethodId, MethodTable};
pub use resolver::{RankedMethod, ANY_DISTANCE};
pub use snapshot::{GenericSnapshot, MethodSnapshot, RegistrySnapshot};
pub use types::{ArgType, SigType, ANY, MISSING};
