pub mod assignments;
pub mod configurations;
pub mod health;
pub mod tests;
