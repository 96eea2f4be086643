pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AvailabilityError, AvailabilityStatus, AvailabilityWindow, CreateAvailabilityRequest, Provider,
};
pub use services::{AvailabilityService, ProviderService};
