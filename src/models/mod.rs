pub mod media;
pub mod status;
pub mod upload;
