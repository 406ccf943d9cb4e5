pub mod ledger;
pub mod sale;
pub mod shuffle;

pub use ledger::*;
pub use sale::*;
pub use shuffle::*;
