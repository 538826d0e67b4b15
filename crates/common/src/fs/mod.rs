pub mod ndjson;

pub use ndjson::{append_json_line, drain, read_lines, truncate};
