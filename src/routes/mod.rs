pub mod audit;
pub mod auth;
pub mod certificates;
pub mod health;
pub mod members;
pub mod policies;
pub mod practice;
pub mod tasks;
