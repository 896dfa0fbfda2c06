pub mod error;
pub mod openai;
pub mod retry;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use openai::OpenAi;
pub use retry::RetryPolicy;
pub use traits::{CompletionOptions, Message, MessageRole, TextStream};
pub use util::{extract_json_array, strip_code_blocks, truncate_to_char_boundary};
