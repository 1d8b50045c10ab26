mod collection;
mod conditions;
pub mod error;
mod model;
pub mod operator;
pub mod options;
pub mod order;
mod properties;
mod scope;
pub mod types;
mod value;

pub use collection::*;
pub use conditions::*;
pub use error::*;
pub use model::*;
pub use operator::*;
pub use options::{CompiledQuery, FinderOptions};
pub use order::{Direction, OrderSpec, OrderTerm, SortField};
pub use properties::*;
pub use scope::*;
pub use types::{Converter, PropertyType, TypeRegistry};
pub use value::*;
