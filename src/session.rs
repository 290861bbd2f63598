use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ScrapeError;
use crate::settings::Settings;

/// A fetched document and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A filled-in HTML form, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub action: String,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl FormSubmission {
    /// Replace the value of `name`, or append it if the form lacked that field.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Hands out fresh sessions. Sessions are never shared between calls.
#[async_trait]
pub trait Browser: Send + Sync {
    type Session: Session;

    async fn open(&self) -> Result<Self::Session, ScrapeError>;
}

#[async_trait]
pub trait Session: Send {
    async fn goto(&mut self, url: &str) -> Result<Page, ScrapeError>;

    async fn submit(&mut self, form: &FormSubmission) -> Result<Page, ScrapeError>;

    /// Release the session. Dropping also releases it; this just makes the
    /// end of the scope explicit and logged.
    fn close(self);
}

/// Plain-HTTP session factory: each session gets its own client and cookie jar.
pub struct HttpBrowser {
    settings: Settings,
    opened: AtomicU64,
}

impl HttpBrowser {
    pub fn new(settings: Settings) -> Self {
        HttpBrowser {
            settings,
            opened: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    type Session = HttpSession;

    async fn open(&self) -> Result<HttpSession, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(self.settings.user_agent.clone())
            .cookie_store(true)
            .timeout(self.settings.page_timeout())
            .build()?;
        let id = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Opened session #{}", id);
        Ok(HttpSession { id, client })
    }
}

pub struct HttpSession {
    id: u64,
    client: reqwest::Client,
}

impl HttpSession {
    async fn read(&self, response: reqwest::Response) -> Result<Page, ScrapeError> {
        let url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let html = response.text().await?;
        if html.trim().is_empty() {
            return Err(ScrapeError::EmptyPage(url));
        }
        Ok(Page { url, html })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn goto(&mut self, url: &str) -> Result<Page, ScrapeError> {
        debug!("Session #{} GET {}", self.id, url);
        let response = self.client.get(url).send().await?;
        self.read(response).await
    }

    async fn submit(&mut self, form: &FormSubmission) -> Result<Page, ScrapeError> {
        debug!(
            "Session #{} submitting {:?} {} ({} fields)",
            self.id,
            form.method,
            form.action,
            form.fields.len()
        );
        let request = match form.method {
            FormMethod::Get => self.client.get(&form.action).query(&form.fields),
            FormMethod::Post => self.client.post(&form.action).form(&form.fields),
        };
        let response = request.send().await?;
        self.read(response).await
    }

    fn close(self) {
        debug!("Closed session #{}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_set_replaces_then_appends() {
        let mut form = FormSubmission {
            action: "https://x/search".into(),
            method: FormMethod::Get,
            fields: vec![("devicename".into(), String::new())],
        };
        form.set("devicename", "pump");
        form.set("min_report_year", "2021");
        assert_eq!(form.fields.len(), 2);
        assert_eq!(form.get("devicename"), Some("pump"));
        assert_eq!(form.get("min_report_year"), Some("2021"));
        assert_eq!(form.get("missing"), None);
    }

    #[tokio::test]
    async fn sessions_are_distinct() {
        let browser = HttpBrowser::new(Settings::default());
        let a = browser.open().await.unwrap();
        let b = browser.open().await.unwrap();
        assert_ne!(a.id, b.id);
        a.close();
        b.close();
    }
}
