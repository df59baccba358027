pub mod scripted;
pub mod stub;

pub use scripted::ScriptedBackend;
pub use stub::StubBackend;
