pub mod account;
pub mod board;
pub mod create_user;
pub mod db;
pub mod index;
pub mod login;
pub mod logout;
pub mod middleware;
pub mod orm;
pub mod pagination;
pub mod password;
pub mod post;
pub mod session;
pub mod topic;
pub mod user;
pub mod web;

pub use db::{get_db_pool, init_db};
