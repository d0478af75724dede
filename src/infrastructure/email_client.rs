use crate::infrastructure::config::EmailConfig;
use crate::infrastructure::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInvitation {
    pub to_email: String,
    pub inviter_name: String,
    pub inviter_email: String,
    pub invite_token: String,
    pub is_existing_user: bool,
    pub expiry_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareAccepted {
    pub to_email: String,
    pub accepter_name: String,
    pub accepter_email: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_share_invitation(&self, invitation: &ShareInvitation) -> Result<(), AppError>;

    async fn send_share_accepted(&self, notice: &ShareAccepted) -> Result<(), AppError>;
}

pub fn email_sender_from_config(config: EmailConfig) -> Arc<dyn EmailSender> {
    match config.api_key {
        Some(api_key) => Arc::new(ResendEmailClient::new(api_key, config.from, config.app_url)),
        None => Arc::new(DisabledEmailSender),
    }
}

pub fn accept_link(app_url: &str, token: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(app_url)
        .map_err(|error| AppError::InvalidConfig(format!("invalid app url '{app_url}': {error}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AppError::InvalidConfig(format!("app url '{app_url}' cannot be a base")))?;
        segments.pop_if_empty().push("share").push("accept");
    }
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

fn invitation_subject(invitation: &ShareInvitation) -> String {
    format!("{} shared their focus reports with you", invitation.inviter_name)
}

fn invitation_text(invitation: &ShareInvitation, link: &Url) -> String {
    let mut text = format!(
        "{} ({}) has invited you to view their focus time reports.\n\n\
         Open the link below to access their shared reports:\n{link}\n\n\
         The link gives view-only access and expires in {} days.\n",
        invitation.inviter_name, invitation.inviter_email, invitation.expiry_days
    );
    if !invitation.is_existing_user {
        text.push_str("Sign up for a free account to track your own focus time.\n");
    }
    text.push_str("\nIf you didn't expect this invitation, you can ignore it.\n");
    text
}

fn accepted_text(notice: &ShareAccepted) -> String {
    format!(
        "{} ({}) accepted your invitation and can now view your focus reports.\n",
        notice.accepter_name, notice.accepter_email
    )
}

#[derive(Debug, serde::Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResendEmailClient {
    client: Client,
    api_key: String,
    from: String,
    app_url: String,
}

impl ResendEmailClient {
    pub fn new(api_key: String, from: String, app_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            from,
            app_url,
        }
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError> {
        let request = ResendRequest {
            from: &self.from,
            to: [to],
            subject,
            text,
        };
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| AppError::Email(format!("network error while sending email: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| AppError::Email(format!("failed reading email api response: {error}")))?;
        if !status.is_success() {
            return Err(AppError::Email(format!(
                "email api error: http {}; body={body}",
                status.as_u16()
            )));
        }

        let parsed: ResendResponse = serde_json::from_str(&body)
            .map_err(|error| AppError::Email(format!("invalid email api payload: {error}; body={body}")))?;
        tracing::debug!(to, message_id = parsed.id.as_deref().unwrap_or(""), "email accepted by provider");
        Ok(())
    }
}

#[async_trait]
impl EmailSender for ResendEmailClient {
    async fn send_share_invitation(&self, invitation: &ShareInvitation) -> Result<(), AppError> {
        let link = accept_link(&self.app_url, &invitation.invite_token)?;
        let text = invitation_text(invitation, &link);
        self.send(&invitation.to_email, &invitation_subject(invitation), &text)
            .await
    }

    async fn send_share_accepted(&self, notice: &ShareAccepted) -> Result<(), AppError> {
        let subject = format!("{} accepted your share invitation", notice.accepter_name);
        self.send(&notice.to_email, &subject, &accepted_text(notice)).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send_share_invitation(&self, _invitation: &ShareInvitation) -> Result<(), AppError> {
        Err(AppError::Email("email delivery is not configured".to_string()))
    }

    async fn send_share_accepted(&self, _notice: &ShareAccepted) -> Result<(), AppError> {
        Err(AppError::Email("email delivery is not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(is_existing_user: bool) -> ShareInvitation {
        ShareInvitation {
            to_email: "bob@example.com".to_string(),
            inviter_name: "Ada".to_string(),
            inviter_email: "ada@example.com".to_string(),
            invite_token: "abc-123".to_string(),
            is_existing_user,
            expiry_days: 7,
        }
    }

    #[test]
    fn accept_link_appends_path_and_encoded_token() {
        let link = accept_link("https://app.example.com", "a b&c").expect("valid link");
        assert_eq!(link.as_str(), "https://app.example.com/share/accept?token=a+b%26c");

        let nested = accept_link("https://example.com/app/", "t").expect("valid link");
        assert_eq!(nested.as_str(), "https://example.com/app/share/accept?token=t");
    }

    #[test]
    fn accept_link_rejects_invalid_base() {
        assert!(matches!(accept_link("not a url", "t"), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn invitation_text_mentions_signup_only_for_new_users() {
        let link = accept_link("http://localhost:3000", "abc-123").expect("valid link");
        let new_user = invitation_text(&invitation(false), &link);
        assert!(new_user.contains("Ada (ada@example.com)"));
        assert!(new_user.contains("http://localhost:3000/share/accept?token=abc-123"));
        assert!(new_user.contains("expires in 7 days"));
        assert!(new_user.contains("Sign up"));

        let existing = invitation_text(&invitation(true), &link);
        assert!(!existing.contains("Sign up"));
        assert_eq!(invitation_subject(&invitation(true)), "Ada shared their focus reports with you");
    }

    #[tokio::test]
    async fn disabled_sender_always_fails() {
        let sender = email_sender_from_config(EmailConfig {
            api_key: None,
            from: "x@example.com".to_string(),
            app_url: "http://localhost:3000".to_string(),
        });
        let result = sender.send_share_invitation(&invitation(false)).await;
        assert!(matches!(result, Err(AppError::Email(_))));
    }
}
