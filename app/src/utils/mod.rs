pub mod digest;
pub mod fixed_str;
pub mod fs_size_calculator;
#[cfg(test)]
pub mod init_test_environment;
pub mod path_util;
pub mod size_unit;
pub mod time_util;
pub mod traits;
