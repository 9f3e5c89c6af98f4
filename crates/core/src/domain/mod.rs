pub mod address;
pub mod approval;
