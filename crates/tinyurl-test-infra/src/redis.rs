mod master;

pub use master::RedisMaster;
