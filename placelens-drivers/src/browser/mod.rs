pub mod driver;
pub mod options;
