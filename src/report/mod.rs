// src/report/mod.rs
// =============================================================================
// Everything that happens after the checks: rendering results and sending
// them on.
//
// Submodules:
// - format: Text, HTML and JSON renderings of the results
// - relay: Sends the HTML report through an e-mail relay service
// =============================================================================

mod format;
mod relay;

pub use format::{format_json, format_text, ReportOptions};
pub use relay::{MailRelay, MailRelayConfig, RelayError};
