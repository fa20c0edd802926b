mod error;
mod key;
mod value;

pub use error::{ComposeError, Slot};
pub use key::{CompositeKey, WeakCompositeKey};
pub use value::{Object, Value, ValueKind, WeakObject};

pub(crate) use value::Primitive;
