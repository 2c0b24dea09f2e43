/// Database Module
///
/// This module provides the low-level database layer, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Pools** (`pool.rs`): pool options, pool construction and the liveness probe
/// - **Connection Pairs** (`connection.rs`): the exec/query handle pair and its lifecycle
/// - **Execution** (`executor.rs`): the error-returning exec/query contract
/// - **Decoding** (`query.rs`): typed and string-coerced row scanning
/// - **Transactions** (`transaction.rs`): begin, commit and rollback around a handler
///
/// ## Error Handling
///
/// Every operation here returns `SqlError`. Nothing is swallowed at this layer;
/// callers who need control flow from errors should work against it directly.
pub mod connection;
pub mod executor;
pub mod pool;
pub mod query;
pub mod transaction;

pub use connection::*;
pub use executor::*;
pub use pool::*;
pub use query::*;
pub use transaction::*;
