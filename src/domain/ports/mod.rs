//! Ports: async traits the service layer depends on, implemented by adapters.

pub mod definition_repository;
pub mod directory;
pub mod instance_repository;

pub use definition_repository::DefinitionRepository;
pub use directory::OrgDirectory;
pub use instance_repository::{InstanceFilter, InstanceRepository};
