mod closest_nodes;
mod id;
pub mod messages;
mod node;
mod routing_table;
mod storage;

pub use closest_nodes::*;
pub use id::*;
pub use messages::ErrorCode;
pub use node::*;
pub use routing_table::*;
pub use storage::*;
