pub mod health_handlers;
pub mod intake_handlers;
