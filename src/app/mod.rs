//! CLI application layer: settings resolution, the console UI loop and the
//! run modes built on top of the library pipeline.

pub(crate) mod runtime;
pub(crate) mod settings;
pub(crate) mod ui_loop;
