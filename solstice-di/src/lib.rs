//! Dependency injection container turning declarative service definitions into live instances.
//!
//! Services are described by [Container](container::Container)s holding
//! [parameter](parameter) definitions, and registered in a [Core](registry::Core) under unique
//! IDs. A service can be:
//!
//! * an **entity** - an instance of a named type, built with its constructor,
//! * a **factorization** - the result of calling a method of another service,
//! * a **lambda** - a free function returned as-is.
//!
//! Parameters can hold literal values (with `{ $VAR or "default" }` environment interpolation,
//! see [transformer]), references to other services or types, and nested collections. Missing
//! parameters annotated with a service type can be auto-wired. Services can also intercept methods
//! of other services (see [wrapper]) and declare methods to call right after activation.
//!
//! Since Rust has no runtime reflection, types and functions available to definitions need to be
//! described by [TypeDescriptor](catalog::TypeDescriptor)s and
//! [CallableDescriptor](catalog::CallableDescriptor)s, registered manually in a
//! [TypeCatalog](catalog::TypeCatalog) or statically via [inventory].
//!
//! ### Simple example
//!
//! ```
//! use solstice_di::catalog::signature::{ParameterDescriptor, Signature};
//! use solstice_di::catalog::{TypeCatalog, TypeDescriptor};
//! use solstice_di::registry::CoreBuilder;
//! use std::sync::Arc;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let catalog = TypeCatalog::new(false)
//!     .with_type(
//!         TypeDescriptor::builder::<Greeter>()
//!             .named("app::Greeter")
//!             .signature(Signature::new().with(ParameterDescriptor::required("greeting")))
//!             .constructor(|arguments| {
//!                 Ok(Greeter {
//!                     greeting: arguments.get("greeting")?,
//!                 })
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let core = CoreBuilder::new()
//!     .unwrap()
//!     .with_type_resolver(Arc::new(catalog))
//!     .build();
//!
//! core.define_entity("greeter", "app::Greeter", |context| {
//!     context.set_param("Hello", Some("greeting"))?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let greeter = core.instance::<Greeter>("greeter").unwrap();
//! assert_eq!(greeter.greeting, "Hello");
//! ```

pub mod catalog;
pub mod container;
pub mod controller;
pub mod definition;
pub mod error;
pub mod instance;
pub mod parameter;
pub mod registry;
pub mod transformer;
pub mod value;
pub mod wrapper;

pub use error::{CallResult, DefinitionError, ResolutionError};
pub use registry::{Core, CoreBuilder};
pub use value::{Arguments, Value};
