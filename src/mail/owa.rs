// src/mail/owa.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Envelope, MailSender};
use crate::auth::cookies::{cookie_header, find_canary, parse_cookie_pairs};
use crate::auth::manager::OWA_COOKIE;
use crate::auth::{AuthError, Credential, CredentialManager};
use crate::core::service_client::{is_auth_rejection, preview};
use crate::core::{ConfigManager, HttpReply, ServiceClient};

const SERVICE: &str = "owa";
const TIME_ZONE: &str = "Pacific Standard Time";
/// Action id the service accepts for a one-shot send
const DIRECT_SEND_ID: &str = "-1";
/// Webmail answers this when the browser session has timed out
const LOGIN_TIMEOUT: u16 = 440;

/// Browser session rebuilt from a pasted cookie string.
#[derive(Debug, Clone)]
pub struct OwaSession {
    cookie: String,
    canary: Option<String>,
}

impl OwaSession {
    pub fn from_cookie(raw: &str) -> Result<Self> {
        let pairs = parse_cookie_pairs(raw);
        if pairs.is_empty() {
            anyhow::bail!("Cookie string is empty");
        }
        Ok(Self {
            cookie: cookie_header(&pairs),
            canary: find_canary(&pairs).map(str::to_string),
        })
    }

    pub fn from_credential(credential: &Credential) -> Result<Self> {
        Self::from_cookie(credential.cookie()?)
    }

    pub fn canary(&self) -> Option<&str> {
        self.canary.as_deref()
    }
}

/// Action ids captured from the browser for the two-step draft-then-send flow.
#[derive(Debug, Clone, Default)]
pub struct OwaActions {
    pub create_id: Option<String>,
    pub create_name: Option<String>,
    pub update_id: Option<String>,
    pub update_name: Option<String>,
}

impl OwaActions {
    fn two_step(&self) -> Option<(&str, &str)> {
        Some((self.create_id.as_deref()?, self.update_id.as_deref()?))
    }
}

fn recipients(addresses: &[String]) -> Vec<Value> {
    addresses
        .iter()
        .map(|addr| {
            json!({
                "Name": addr,
                "EmailAddress": addr,
                "RoutingType": "SMTP",
                "MailboxType": "Mailbox",
                "RelevanceScore": 2147483646
            })
        })
        .collect()
}

fn header(server_version: &str) -> Value {
    json!({
        "__type": "JsonRequestHeaders:#Exchange",
        "RequestServerVersion": server_version,
        "TimeZoneContext": {
            "__type": "TimeZoneContext:#Exchange",
            "TimeZoneDefinition": {"__type": "TimeZoneDefinitionType:#Exchange", "Id": TIME_ZONE}
        }
    })
}

fn html_body(body_html: &str) -> Value {
    json!({"__type": "BodyContentType:#Exchange", "BodyType": "HTML", "Value": body_html})
}

/// `CreateItem` request; `send_direct` sends immediately instead of saving a draft.
pub fn create_item_payload(envelope: &Envelope, send_direct: bool) -> Value {
    json!({
        "__type": "CreateItemJsonRequest:#Exchange",
        "Header": header("V2015_10_15"),
        "Body": {
            "__type": "CreateItemRequest:#Exchange",
            "Items": [{
                "__type": "Message:#Exchange",
                "Subject": envelope.subject,
                "Body": html_body(&envelope.body_html),
                "Importance": "Normal",
                "From": null,
                "ToRecipients": recipients(&envelope.to),
                "CcRecipients": recipients(&envelope.cc),
                "BccRecipients": recipients(&envelope.bcc),
                "Sensitivity": "Normal",
                "IsDeliveryReceiptRequested": false,
                "IsReadReceiptRequested": false,
                "PendingSocialActivityTagIds": []
            }],
            "ClientSupportsIrm": true,
            "OutboundCharset": "AutoDetect",
            "PromoteEmojiContentToInlineAttachmentsCount": 0,
            "UnpromotedInlineImageCount": 0,
            "MessageDisposition": if send_direct { "SendAndSaveCopy" } else { "SaveOnly" },
            "ComposeOperation": "newMail"
        }
    })
}

fn set_field(field: &str, item: Value) -> Value {
    json!({
        "__type": "SetItemField:#Exchange",
        "Path": {"__type": "PropertyUri:#Exchange", "FieldURI": field},
        "Item": item
    })
}

/// `UpdateItem` request that fills in a saved draft and sends it.
pub fn update_item_payload(envelope: &Envelope, item_id: &str, change_key: Option<&str>) -> Value {
    let mut updates = vec![set_field(
        "ToRecipients",
        json!({"__type": "Message:#Exchange", "ToRecipients": recipients(&envelope.to)}),
    )];
    if !envelope.cc.is_empty() {
        updates.push(set_field(
            "CcRecipients",
            json!({"__type": "Message:#Exchange", "CcRecipients": recipients(&envelope.cc)}),
        ));
    }
    if !envelope.bcc.is_empty() {
        updates.push(set_field(
            "BccRecipients",
            json!({"__type": "Message:#Exchange", "BccRecipients": recipients(&envelope.bcc)}),
        ));
    }
    updates.push(set_field(
        "Subject",
        json!({"__type": "Message:#Exchange", "Subject": envelope.subject}),
    ));
    updates.push(set_field(
        "Body",
        json!({"__type": "Message:#Exchange", "Body": html_body(&envelope.body_html)}),
    ));

    json!({
        "__type": "UpdateItemJsonRequest:#Exchange",
        "Header": header("Exchange2015"),
        "Body": {
            "__type": "UpdateItemRequest:#Exchange",
            "ItemChanges": [{
                "__type": "ItemChange:#Exchange",
                "Updates": updates,
                "ItemId": {"__type": "ItemId:#Exchange", "Id": item_id, "ChangeKey": change_key}
            }],
            "ConflictResolution": "AlwaysOverwrite",
            "ClientSupportsIrm": true,
            "SendCalendarInvitationsOrCancellations": "SendToNone",
            "MessageDisposition": "SendAndSaveCopy",
            "SuppressReadReceipts": false
        }
    })
}

/// First `ItemId` object anywhere in `value`, as `(Id, ChangeKey)`.
pub fn find_item_id(value: &Value) -> Option<(String, Option<String>)> {
    match value {
        Value::Object(map) => {
            if let Some(item_id) = map.get("ItemId") {
                if let Some(id) = item_id.get("Id").and_then(Value::as_str) {
                    let change_key = item_id.get("ChangeKey").and_then(Value::as_str);
                    return Some((id.to_string(), change_key.map(str::to_string)));
                }
            }
            map.values().find_map(find_item_id)
        }
        Value::Array(items) => items.iter().find_map(find_item_id),
        _ => None,
    }
}

pub struct OwaMailer {
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
    base_url: String,
    actions: OwaActions,
}

impl OwaMailer {
    pub fn new(service: ServiceClient, credentials: Arc<CredentialManager>, config: &ConfigManager) -> Self {
        let mail = &config.mail;
        Self {
            service,
            credentials,
            base_url: config.environment.endpoints.owa_base_url.trim_end_matches('/').to_string(),
            actions: OwaActions {
                create_id: mail.create_action_id.clone(),
                create_name: mail.create_action_name.clone(),
                update_id: mail.update_action_id.clone(),
                update_name: mail.update_action_name.clone(),
            },
        }
    }

    async fn action(
        &self,
        session: &OwaSession,
        action: &str,
        action_id: &str,
        action_name: Option<&str>,
        payload: &Value,
    ) -> Result<HttpReply> {
        let url = format!("{}/owa/service.svc", self.base_url);
        let mut request = self
            .service
            .http()
            .post(&url)
            .query(&[("action", action), ("ID", action_id), ("AC", "1")])
            .header("accept", "*/*")
            .header("content-type", "application/json; charset=UTF-8")
            .header("origin", self.base_url.as_str())
            .header("x-requested-with", "XMLHttpRequest")
            .header("action", action)
            .header("x-owa-actionid", action_id)
            .header("cookie", session.cookie.as_str())
            .body(payload.to_string());
        if let Some(name) = action_name {
            request = request.header("x-owa-actionname", name);
        }
        if let Some(canary) = session.canary() {
            request = request.header("x-owa-canary", canary);
        }

        let reply = self.service.send(SERVICE, request).await?;
        if matches!(reply.status, 401 | 403 | LOGIN_TIMEOUT) {
            return Err(AuthError::Rejected {
                service: SERVICE.to_string(),
                status: reply.status,
            }
            .into());
        }
        if reply.status >= 400 {
            anyhow::bail!(
                "{} failed with status {}: {}",
                action,
                reply.status,
                preview(&reply.body, 300)
            );
        }
        Ok(reply)
    }

    async fn deliver(&self, session: &OwaSession, envelope: &Envelope) -> Result<()> {
        let Some((create_id, update_id)) = self.actions.two_step() else {
            app_log!(debug, "Sending in one step to {:?}", envelope.to);
            self.action(
                session,
                "CreateItem",
                DIRECT_SEND_ID,
                self.actions.create_name.as_deref(),
                &create_item_payload(envelope, true),
            )
            .await?;
            return Ok(());
        };

        let draft = self
            .action(
                session,
                "CreateItem",
                create_id,
                self.actions.create_name.as_deref(),
                &create_item_payload(envelope, false),
            )
            .await?;
        let data: Value = draft.json().context("CreateItem returned a non-JSON body")?;
        let (item_id, change_key) = find_item_id(&data)
            .with_context(|| format!("No ItemId in CreateItem response: {}", preview(&draft.body, 300)))?;
        app_log!(debug, "Draft {} created, sending", item_id);

        self.action(
            session,
            "UpdateItem",
            update_id,
            self.actions.update_name.as_deref(),
            &update_item_payload(envelope, &item_id, change_key.as_deref()),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MailSender for OwaMailer {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        if !envelope.has_recipients() {
            anyhow::bail!("No recipients for \"{}\"", envelope.subject);
        }
        let credential = self.credentials.get(OWA_COOKIE).await?;
        let session = OwaSession::from_credential(&credential)?;

        match self.deliver(&session, envelope).await {
            Err(e) if is_auth_rejection(&e) => {
                app_log!(error, "Webmail session rejected; the cookie needs replacing");
                match self.credentials.rejected(&credential).await {
                    Err(auth) => Err(auth.into()),
                    Ok(_) => Err(e),
                }
            }
            other => other,
        }
    }
}
