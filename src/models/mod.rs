pub mod actor;
pub mod booking;
pub mod car;
pub mod damage;
pub mod maintenance;
pub mod review;

pub use actor::Actor;
pub use booking::{Booking, BookingStatus};
pub use car::{Car, CarStatus};
pub use damage::{DamageReport, DamageSeverity, DamageStatus};
pub use maintenance::{MaintenanceRecord, MaintenanceStatus};
pub use review::{Review, ReviewStatus};
