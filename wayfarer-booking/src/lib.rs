pub mod booking;
pub mod changes;
pub mod checkout;
pub mod commission;
pub mod manager;
pub mod memory;
pub mod reference;
pub mod repository;
pub mod routing;

pub use booking::{Booking, BookingStatus, BookingType, ContactInfo, PaymentStatus, StayDates};
pub use changes::{BookingChange, ChangeType};
pub use checkout::{CheckoutOrchestrator, MockPaymentAdapter};
pub use commission::{Commission, CommissionStatus};
pub use manager::{AgentBookingSummary, BookingService, BookingStats, BookingUpdate, CreatedBooking, NewBooking};
pub use memory::InMemoryBookingStore;
pub use repository::{BookingChangeRepository, BookingFilter, BookingRepository, CommissionRepository};
pub use routing::{BookingRules, RoutingDecision, RoutingReason};
