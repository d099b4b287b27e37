pub mod coach;
pub mod email;
pub mod llm;
pub mod payments;
pub mod storage;

pub use email::{EmailSender, HttpEmailSender, LogEmailSender};
pub use llm::{LlmClient, OpenAiClient};
pub use payments::{PaymentProvider, StripeClient};
pub use storage::StorageService;
