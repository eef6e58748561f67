pub mod incident;
pub mod ledger;
pub mod monitor;
pub mod notify;
pub mod probe;

pub use incident::*;
pub use ledger::*;
pub use monitor::*;
pub use notify::*;
pub use probe::*;
