//! Type descriptors, runtime values and the type registry

mod descriptor;
mod registry;
mod value;

pub use descriptor::{ExceptionType, TypeDescriptor};
pub use registry::{Constructor, Conversion, TypeRegistry};
pub(crate) use registry::{collect_items, unify_all};
pub use value::{Closure, Collection, ExceptionValue, Value};
