mod admin;
mod checkout;
pub mod helpers;
mod mocks;
mod orders;
