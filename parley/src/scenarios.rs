//! Prebuilt compositions of sessions over the in-process broker, for
//! demonstration and smoke testing.

mod shell_echo;
pub use shell_echo::shell_echo;

mod bridge_list;
pub use bridge_list::bridge_list;

mod bridge_console;
pub use bridge_console::bridge_console;
