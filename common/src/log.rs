//! User-facing log macros.
//!
//! They route through `tracing` with fixed targets so the terminal formatter
//! can tell a plain status line from a success line.

#[doc(hidden)]
pub use tracing as __tracing;

pub const TARGET: &str = "vigil";
pub const SUCCESS_TARGET: &str = "vigil::success";

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::__tracing::info!(target: "vigil", $($arg)*)
    };
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::log::__tracing::info!(target: "vigil::success", $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::__tracing::warn!(target: "vigil", $($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::__tracing::error!(target: "vigil", $($arg)*)
    };
}
