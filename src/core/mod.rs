/// Core value types shared by the protocol layer and the clients
pub mod address;
pub mod document;
pub mod query;

pub use address::{Address, AddressFamily};
pub use document::Document;
pub use query::{Query, QueryOptions};
