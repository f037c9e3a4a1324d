//! Value types shared by every Brewline component.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use phone::{PhoneError, PhoneNumber};
pub use status::*;
