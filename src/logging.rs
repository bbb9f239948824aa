//! Crate-internal logging macros.
//!
//! With the `tracing` feature every macro forwards to the matching `tracing` macro under the
//! `hyperion_stream` target. Without it the arguments are only borrowed and the call compiles
//! away, so call sites never need their own `cfg` guards.

macro_rules! log_at {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::$level!(target: "hyperion_stream", $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__log_sink!($($arg)*);
    }};
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { log_at!(error, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { log_at!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { log_at!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { log_at!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { log_at!(trace, $($arg)*) };
}

/// Borrows every value passed to a disabled log call so no binding is reported unused.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_sink {
    () => {};
    (, $($rest:tt)*) => {
        $crate::__log_sink!($($rest)*)
    };
    ($field:ident = % $value:expr $(, $($rest:tt)*)?) => {{
        let _ = &$value;
        $($crate::__log_sink!($($rest)*);)?
    }};
    ($field:ident = ? $value:expr $(, $($rest:tt)*)?) => {{
        let _ = &$value;
        $($crate::__log_sink!($($rest)*);)?
    }};
    ($field:ident = $value:expr $(, $($rest:tt)*)?) => {{
        let _ = &$value;
        $($crate::__log_sink!($($rest)*);)?
    }};
    ($message:literal $($rest:tt)*) => {
        $crate::__log_sink!($($rest)*)
    };
    ($value:expr $(, $($rest:tt)*)?) => {{
        let _ = &$value;
        $($crate::__log_sink!($($rest)*);)?
    }};
}
