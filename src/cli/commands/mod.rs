pub mod init;
pub mod log;
pub mod seed;
pub mod serve;
pub mod status;
