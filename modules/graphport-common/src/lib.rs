pub mod config;
pub mod error;
pub mod store;
pub mod value;

pub use config::{Config, PollPolicy};
pub use error::{MigrationError, Result};
pub use store::StoreKind;
pub use value::{RawRow, Scalar};
