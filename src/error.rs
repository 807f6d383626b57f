/// Creates an anyhow error tagged with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        ::anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(file!()),
            line!(),
            format!($($arg)*)
        )
    };
}

/// As file_error!, with a source error appended
#[macro_export]
macro_rules! file_error_with_source {
    ($source:expr, $($arg:tt)*) => {
        ::anyhow::anyhow!(
            "[{}:{}] {}: {}",
            std::path::Path::new(file!())
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(file!()),
            line!(),
            format!($($arg)*),
            $source
        )
    };
}
