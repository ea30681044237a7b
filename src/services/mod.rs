pub mod cleanup;
pub mod credentials;
pub mod describe;
pub mod gemini;
pub mod judge;
pub mod media;
pub mod pipeline;
pub mod song;
pub mod status_store;
