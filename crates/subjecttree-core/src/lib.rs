pub mod config_manager;
pub mod error;
pub mod export;
pub mod extract;
pub mod identity;
pub mod model;
pub mod node;

pub use config_manager::*;
pub use error::*;
pub use export::*;
pub use extract::extract_json;
pub use identity::*;
pub use model::*;
pub use node::*;
