pub mod attendance;
pub mod course;
pub mod student;
