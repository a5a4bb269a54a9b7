//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{
    calculate_checksum, file_name_string, has_extension, move_file, sanitize_filename,
    write_atomic,
};
pub use retry::{RetryConfig, Retryable, with_retry};
pub use text::{is_blank, title_case};
