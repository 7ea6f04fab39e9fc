pub mod product;
pub mod inventory;

pub use product::Product;
pub use inventory::InventoryError;
