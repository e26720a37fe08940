pub mod configuration;
pub mod test_assignment;
pub mod test_attempt;
pub mod test_type;
