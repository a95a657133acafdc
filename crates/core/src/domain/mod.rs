pub mod member;
pub mod review;
pub mod ticket;
pub mod user;
