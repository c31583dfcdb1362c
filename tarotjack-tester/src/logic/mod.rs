pub mod autoplay;
pub mod reports;
pub mod tester;

pub use autoplay::{AutoplayPolicy, Autoplayer};
pub use tester::*;
