pub mod inventory_checkout;
pub mod inventory_list;
pub mod orders;
pub mod status_change;

pub use inventory_checkout::Entity as InventoryCheckout;
pub use inventory_list::Entity as InventoryList;
pub use orders::Entity as Orders;
pub use status_change::Entity as StatusChange;
