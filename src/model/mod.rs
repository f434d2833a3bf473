pub mod attendance;
pub mod course;
pub mod enrollment;
pub mod instructor;
pub mod student;
