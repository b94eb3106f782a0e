pub mod fixtures;
pub mod util;
