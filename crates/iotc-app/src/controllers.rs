pub mod c2d;
pub mod command;
pub mod json;

pub use c2d::{C2dController, C2dError, C2dMessage, parse_c2d_message};
pub use command::{CommandError, parse_command};
pub use json::{FieldError, find_string_field};
