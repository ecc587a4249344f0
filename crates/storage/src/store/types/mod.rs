#![forbid(unsafe_code)]

mod appointments;
mod campaigns;
mod children;
mod notifications;
mod reports;
mod stock;
mod sweep;
mod users;
mod vaccinations;
mod vaccines;

pub use appointments::*;
pub use campaigns::*;
pub use children::*;
pub use notifications::*;
pub use reports::*;
pub use stock::*;
pub use sweep::*;
pub use users::*;
pub use vaccinations::*;
pub use vaccines::*;
