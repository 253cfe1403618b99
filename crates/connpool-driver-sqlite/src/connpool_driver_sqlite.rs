//! SQLite driver implementation

mod driver;
mod handle;

pub use driver::SqliteDriver;
pub use handle::SqliteHandle;
