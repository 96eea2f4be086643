pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookableSlot,
    DaySlots, JoinTokenResponse, SchedulingRules,
};
pub use services::{
    AppointmentLifecycleService, BookingService, SlotGeneratorService, VideoAccessService,
};
