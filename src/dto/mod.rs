pub mod assignment_dto;
pub mod configuration_dto;
pub mod test_dto;
