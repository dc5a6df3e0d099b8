pub mod fixtures;
pub mod mocks;
pub mod testing;

pub use fixtures::*;
pub use mocks::*;
pub use testing::*;
