pub mod health;
pub mod markers;
pub mod uploads;
