pub mod message;
pub mod run;
pub mod thread;
pub mod tool;
