pub mod persistent;
pub mod runtime;

pub use persistent::PersistentConfig;
pub use runtime::RuntimeConfig;
