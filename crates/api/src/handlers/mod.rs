pub mod archive;
pub mod dataset;
pub mod frames;
pub mod history;
pub mod settings;
