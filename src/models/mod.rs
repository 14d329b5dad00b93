pub mod certificate;
pub mod member;
pub mod policy;
pub mod practice;
pub mod task;
pub mod user;
