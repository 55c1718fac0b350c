pub mod customer;
pub mod hair;
pub mod session;
