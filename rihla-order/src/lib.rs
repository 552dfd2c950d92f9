pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod payments;
pub mod refunds;
pub mod request;
pub mod resiliency;
pub mod store;

pub use manager::BookingManager;
pub use models::{Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, Refund, RefundStatus};
pub use orchestrator::ReservationOrchestrator;
pub use payments::PaymentLedger;
pub use refunds::{RefundApproval, RefundDesk};
pub use request::PlaceBookingRequest;
pub use resiliency::{CircuitBreaker, GuardedGateway};
pub use store::{BookingFolio, OrderBook};
