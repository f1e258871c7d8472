//! Endpoint lifecycle: observed state, the provisioning state machine and the
//! async manager that drives it against a control plane.

pub mod machine;
pub mod manager;
pub mod state;

pub use machine::{Action, Observation, ProvisioningMachine};
pub use manager::{EndpointHandle, EndpointLifecycleManager};
pub use state::{EndpointState, EndpointStatus};
