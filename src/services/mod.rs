pub mod assignment_service;
pub mod configuration_service;
pub mod question_selection;
pub mod test_service;
