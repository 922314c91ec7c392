pub mod bitable;
pub mod memory;

pub use bitable::BitableClient;
pub use memory::MemoryStorage;
