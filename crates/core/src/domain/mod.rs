pub mod profile;
pub mod subject;
