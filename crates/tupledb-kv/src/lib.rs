//! Ordered transactional key/value storage for TupleDB.
//!
//! This crate provides the three building blocks the SQL layer maps onto:
//!
//! - [`Tuple`]: order-preserving encoding of heterogeneous string/integer
//!   tuples into byte keys, compatible with the FoundationDB tuple layer.
//! - [`Subspace`]: a packed key prefix that namespaces tuples and produces
//!   half-open ranges for prefix scans.
//! - [`Database`]: an in-process ordered map with atomic, closure-scoped
//!   transactions and range scans.
//!
//! Keys produced by [`Subspace::pack`] sort lexicographically in tuple
//! element order, so a single range scan retrieves all keys sharing a
//! tuple prefix.

mod error;
mod store;
mod subspace;
mod tuple;

pub use error::{KvError, KvResult};
pub use store::{Database, ReadTransaction, Transaction};
pub use subspace::Subspace;
pub use tuple::{Element, Tuple};
