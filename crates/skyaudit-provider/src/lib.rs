//! Skyaudit Provider
//!
//! Cloud provider boundary backed by an inventory document. The inventory
//! describes an organization, its accounts, their roles and resources, and
//! optional latency and fault injection, so that full audit runs can be
//! executed offline and reproducibly.
//!
//! # Example
//!
//! ```ignore
//! use skyaudit_provider::InventoryProvider;
//!
//! let provider = InventoryProvider::from_file(Path::new("inventory.yaml"))?;
//! let creds = provider.ambient_credentials()?;
//! ```

pub mod inventory;
mod provider;

pub use inventory::{
    AccountInventory, CallerIdentity, Fault, IamInventory, Inventory, OrganizationInventory,
    RegionInventory, RoleInventory, DEFAULT_PAGE_SIZE,
};
pub use provider::InventoryProvider;
