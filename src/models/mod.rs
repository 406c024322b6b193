pub mod appointment;
pub mod invitation;
pub mod user;
