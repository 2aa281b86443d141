pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod message;

pub use config::Config;
pub use context::{CallerIdentity, RequestContext};
pub use entity::*;
pub use error::*;
pub use message::{Message, Role, StreamChunk};
