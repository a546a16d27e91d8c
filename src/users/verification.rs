use reqwest::Url;

use crate::mailer::{MailMessage, MailOutcome, Mailer};

/// Branding and link settings for verification emails.
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub app_url: String,
    pub store_name: String,
}

pub fn verification_link(app_url: &str, email: &str, token: &str) -> anyhow::Result<Url> {
    let base = format!("{}/users/new/authenticate", app_url.trim_end_matches('/'));
    let url = Url::parse_with_params(&base, &[("email", email), ("token", token)])?;
    Ok(url)
}

pub fn verification_message(
    settings: &VerificationSettings,
    name: &str,
    email: &str,
    token: &str,
) -> anyhow::Result<MailMessage> {
    let link = verification_link(&settings.app_url, email, token)?;
    let store = escape_html(&settings.store_name);
    let html = format!(
        "<h2>Hello {name}</h2>\
         <p>Welcome to {store}.</p>\
         <p>Verify your e-mail address.</p>\
         <p><a href=\"{link}\">Verify e-mail address</a></p>",
        name = escape_html(name),
    );
    Ok(MailMessage {
        to: email.to_string(),
        subject: "Welcome".into(),
        html,
    })
}

/// Builds and sends the verification email; every failure becomes `Failed`.
pub async fn send_verification(
    mailer: &dyn Mailer,
    settings: &VerificationSettings,
    name: &str,
    email: &str,
    token: &str,
) -> MailOutcome {
    match verification_message(settings, name, email, token) {
        Ok(message) => mailer.send(&message).await,
        Err(e) => MailOutcome::Failed(format!("build verification message: {e}")),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VerificationSettings {
        VerificationSettings {
            app_url: "https://shop.example/".into(),
            store_name: "Acme".into(),
        }
    }

    #[test]
    fn link_encodes_query_parameters() {
        let url = verification_link("https://shop.example/", "a+b@x.com", "abc123").unwrap();
        assert_eq!(url.path(), "/users/new/authenticate");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("email".to_string(), "a+b@x.com".to_string()),
                ("token".to_string(), "abc123".to_string()),
            ]
        );
    }

    #[test]
    fn message_carries_plaintext_token_and_branding() {
        let msg = verification_message(&settings(), "Alice", "a@x.com", "deadbeef").unwrap();
        assert_eq!(msg.to, "a@x.com");
        assert_eq!(msg.subject, "Welcome");
        assert!(msg.html.contains("Hello Alice"));
        assert!(msg.html.contains("Welcome to Acme."));
        assert!(msg.html.contains("token=deadbeef"));
    }

    #[test]
    fn names_are_escaped() {
        let msg = verification_message(&settings(), "<b>Eve</b>", "e@x.com", "t").unwrap();
        assert!(msg.html.contains("Hello &lt;b&gt;Eve&lt;/b&gt;"));
    }
}
