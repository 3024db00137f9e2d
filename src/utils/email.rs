use askama::Template;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::env;

use crate::utils::helpers::RESET_TOKEN_EXPIRATION_MINUTES;

#[derive(Template)]
#[template(
    source = "<p>You requested a password reset.</p>\
<h2 style=\"letter-spacing:4px\">{{ code }}</h2>\
<p>This code will expire in {{ minutes }} minutes.</p>\
<p>If you didn't request this, please ignore this email.</p>",
    ext = "html"
)]
struct ResetCodeEmail<'a> {
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(
    source = "<p>Hi {{ full_name }},</p><p>Your password was reset successfully.</p>\
<p>If you did not do this, contact support immediately.</p>",
    ext = "html"
)]
struct PasswordChangedEmail<'a> {
    full_name: &'a str,
}

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    /// Load email configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "465".to_string())
                .parse()
                .map_err(|_| "SMTP_PORT must be a valid number")?,
            smtp_username: env::var("SMTP_USERNAME").map_err(|_| "SMTP_USERNAME is required")?,
            smtp_password: env::var("SMTP_PASSWORD").map_err(|_| "SMTP_PASSWORD is required")?,
            from_email: env::var("SMTP_FROM_EMAIL").map_err(|_| "SMTP_FROM_EMAIL is required")?,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Blog Website".to_string()),
        })
    }
}

/// Outbound mail for account flows
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new() -> Result<Self, String> {
        Ok(Self::with_config(EmailConfig::from_env()?))
    }

    pub fn with_config(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        // Implicit TLS (SMTPS)
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        Ok(transport)
    }

    /// Send a message with both a plain-text and an HTML body
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), String> {
        let from_address = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(
                from_address
                    .parse()
                    .map_err(|e| format!("Invalid from address: {}", e))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| format!("Invalid to address: {}", e))?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text_body, html_body))
            .map_err(|e| format!("Failed to build email: {}", e))?;

        let transport = self.build_transport()?;

        transport
            .send(email)
            .await
            .map_err(|e| format!("Failed to send email: {}", e))?;

        Ok(())
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
    ) -> Result<(), String> {
        let (text, html) = password_reset_body(reset_token)?;
        self.send_email(to_email, "Password Reset Code - Blog Website", text, html)
            .await
    }

    pub async fn send_password_changed_email(
        &self,
        to_email: &str,
        full_name: &str,
    ) -> Result<(), String> {
        let (text, html) = password_changed_body(full_name)?;
        self.send_email(to_email, "Password Reset Successful - Blog Website", text, html)
            .await
    }
}

fn password_reset_body(reset_token: &str) -> Result<(String, String), String> {
    let text = format!(
        "You requested a password reset.\n\n\
        Your reset code is: {}\n\n\
        This code will expire in {} minutes.\n\n\
        If you didn't request this, please ignore this email.",
        reset_token, RESET_TOKEN_EXPIRATION_MINUTES
    );
    let html = ResetCodeEmail {
        code: reset_token,
        minutes: RESET_TOKEN_EXPIRATION_MINUTES,
    }
    .render()
    .map_err(|e| format!("Failed to render email: {}", e))?;
    Ok((text, html))
}

/// Names are user-supplied; the HTML part is escaped by the template.
fn password_changed_body(full_name: &str) -> Result<(String, String), String> {
    let text = format!(
        "Hi {},\n\n\
        Your password was reset successfully.\n\n\
        If you did not do this, contact support immediately.",
        full_name
    );
    let html = PasswordChangedEmail { full_name }
        .render()
        .map_err(|e| format!("Failed to render email: {}", e))?;
    Ok((text, html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_body_carries_code_and_window() {
        let (text, html) = password_reset_body("482913").unwrap();
        assert!(text.contains("482913"));
        assert!(html.contains("482913"));
        assert!(text.contains("10 minutes"));
        assert!(html.contains("10 minutes"));
    }

    #[test]
    fn changed_notice_escapes_the_name_in_html() {
        let (text, html) = password_changed_body("<b>Eve & co").unwrap();
        assert!(html.contains("Hi &lt;b&gt;Eve &amp; co,"));
        assert!(!html.contains("<b>"));
        assert!(text.contains("Hi <b>Eve & co,"));
    }

    #[actix_web::test]
    async fn invalid_recipient_fails_before_network() {
        let service = EmailService::with_config(EmailConfig {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            smtp_username: "u".into(),
            smtp_password: "p".into(),
            from_email: "noreply@example.com".into(),
            from_name: "Blog".into(),
        });
        let err = service
            .send_password_reset_email("not-an-address", "123456")
            .await
            .unwrap_err();
        assert!(err.starts_with("Invalid to address"));
    }
}
