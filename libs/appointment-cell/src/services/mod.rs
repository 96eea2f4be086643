pub mod booking;
pub mod lifecycle;
pub mod slots;
pub mod video_access;

pub use booking::BookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use slots::SlotGeneratorService;
pub use video_access::VideoAccessService;
