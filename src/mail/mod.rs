// src/mail/mod.rs
//! Sending mail through the webmail JSON service.

pub mod owa;

use anyhow::Result;
use async_trait::async_trait;

pub use owa::{create_item_payload, find_item_id, update_item_payload, OwaActions, OwaMailer, OwaSession};

/// A message ready to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_html: String,
}

impl Envelope {
    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<()>;
}
