pub mod exec;
pub mod logs;
