//! D-Bus interface for the envsense daemon.
//!
//! Provides the `org.envsense.Daemon1` interface.

mod interface;

pub use interface::run_dbus_server;
