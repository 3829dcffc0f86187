//! The replicated document value model.
//!
//! Every container here is a CRDT: applying the same set of operations
//! in any delivery order, with any re-delivery, yields the same state on
//! every replica. Deletion tombstones rather than detaches; the garbage
//! collector in [`crate::gc`] reclaims tombstones once every attached
//! replica has seen them.

mod array;
mod counter;
mod errors;
mod node;
mod object;
mod root;
mod text;
mod value;

pub use array::Array;
pub use counter::Counter;
pub use errors::CrdtError;
pub use node::{Content, Node, NodeSeed};
pub use object::Object;
pub use root::{Root, ROOT_PATH};
pub use text::{Text, TextPos, TextSpan};
pub use value::Primitive;
