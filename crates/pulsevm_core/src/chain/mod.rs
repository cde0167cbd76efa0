pub mod block;
pub mod deep_mind;
pub mod genesis;
pub mod resource;
pub mod resource_limits;
pub mod snapshot;
pub mod undo;
pub mod utils;

// Re-export types for easier access
pub mod name {
    pub use pulsevm_name::Name;
}
pub mod error {
    pub use pulsevm_error::ChainError;
}

pub use pulsevm_error::ChainError;
pub use resource_limits::ResourceLimitsManager;
