pub mod constants;
pub mod enums;
pub mod errors;
pub mod events;
pub mod models;
pub mod retry;
pub mod security;
pub mod state_machine;
