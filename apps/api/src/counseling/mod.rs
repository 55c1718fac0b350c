// Counseling workflow records: customers, sessions, hair condition, staff assessment.
// Handlers stay thin; persistence goes through CounselingRepository.

pub mod handlers;
pub mod repository;
