//! Adapters for every external collaborator: the LLM provider, the
//! web-search API, the music platform's GraphQL API, and SMTP. Plus the
//! process-wide account cache that sits in front of the platform client.

pub mod accounts;
pub mod llm;
pub mod mailer;
pub mod platform;
pub mod search;
mod sse;

pub use accounts::AccountCache;
pub use llm::{ChatRequest, LlmClient};
pub use mailer::Mailer;
pub use platform::{PlatformAccount, PlatformClient, PlatformZone, SchedulePlan, ScheduleSlot};
pub use search::SearchClient;
