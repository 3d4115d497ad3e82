pub mod boards;
pub mod password_resets;
pub mod posts;
pub mod sessions;
pub mod topics;
pub mod users;
