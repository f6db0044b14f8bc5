// src/notifier/mod.rs - Optional side-channel alert dispatchers

pub mod email;

pub use email::EmailDispatcher;
