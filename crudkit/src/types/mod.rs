//! Structured field types shared by records

mod phone_number;

pub use phone_number::{PhoneNumber, PhoneNumberError};
