//! openSYDE node configuration model.

#![forbid(unsafe_code)]

mod handle;
pub use handle::*;

mod content;
pub use content::*;

mod datapool;
pub use datapool::*;

mod can;
pub use can::*;

mod canopen;
pub use canopen::*;

mod halc;
pub use halc::*;

mod node;
pub use node::*;

pub mod hash;
pub use hash::DefinitionHash;

mod error;
pub use error::*;
