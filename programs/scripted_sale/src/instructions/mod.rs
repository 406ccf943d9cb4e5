pub mod burn;
pub mod initialize;
pub mod purchase;
pub mod reveal;
pub mod treasury;

pub use burn::*;
pub use initialize::*;
pub use purchase::*;
pub use reveal::*;
pub use treasury::*;
