pub mod args;
pub mod cmdline;
pub mod extensions;
pub mod platform;

pub use args::CallArgs;
pub use cmdline::split_command_line;
pub use extensions::Extensions;
pub use platform::Platform;
