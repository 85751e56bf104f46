pub mod envelope;
pub mod message;
pub mod reply;
pub mod team;
