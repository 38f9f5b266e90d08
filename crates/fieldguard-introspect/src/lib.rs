//! Type and call-site introspection for the fieldguard pipeline.
//!
//! Two metadata providers implement [`TypeIntrospector`]: an in-memory one
//! loaded from JSON or built in tests, and a source-backed one built from
//! parsed Rust `struct` items. The [`source`] module also finds handler
//! registrations and resolves their handler signatures.

pub mod adapter;
pub mod descriptor;
pub mod errors;
pub mod memory;
pub mod options;
pub mod source;

pub use adapter::{TypeIntrospector, TypeShape};
pub use descriptor::{BaseDescriptor, PropertyDescriptor, TypeDescriptor, TypeUniverse};
pub use errors::{IntrospectError, Result};
pub use memory::{InMemoryIntrospector, MetadataDocument};
pub use options::IntrospectOptions;
pub use source::{ParsedUnit, SourceIntrospector, SourceUnit};
