pub mod message;
pub mod paper;
pub mod response;
