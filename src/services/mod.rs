pub mod billing;
pub mod export;
pub mod mailer;
pub mod oauth;
pub mod pdf;
pub mod receipts;
pub mod scheduler;
