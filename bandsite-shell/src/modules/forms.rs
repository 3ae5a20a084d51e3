//! Newsletter signup and contact forms
//!
//! Both forms validate locally before anything is sent. Submissions go
//! through a [`FormBackend`]; without a configured API the simulated backend
//! answers success after one second.

use super::{ModuleContext, PageModule};
use crate::dom::{has_id, DomEvent};
use crate::error::{ApiError, Result};
use crate::routing::PageName;
use crate::services::analytics::Analytics;
use crate::services::api::{ApiClient, ContactForm};
use async_trait::async_trait;
use bandsite_common::events::{EventBus, SiteEvent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

pub const SIGNUP_FORM: &str = "#signup-form";
pub const CONTACT_FORM: &str = "#contact-form";

const BUSY: &str = "Still sending your previous submission.";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Validation messages for a contact form, empty when it may be sent
pub fn validate_contact(form: &ContactForm) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if form.name.trim().chars().count() < 2 {
        errors.push("Please enter your name");
    }
    if !is_valid_email(&form.email) {
        errors.push("Please enter a valid email address");
    }
    if form.message.trim().chars().count() < 10 {
        errors.push("Please enter a message (at least 10 characters)");
    }
    errors
}

/// Where form submissions go
#[async_trait]
pub trait FormBackend: Send + Sync {
    async fn subscribe(&self, email: &str) -> std::result::Result<(), ApiError>;

    async fn send_contact(&self, form: &ContactForm) -> std::result::Result<(), ApiError>;
}

#[async_trait]
impl FormBackend for ApiClient {
    async fn subscribe(&self, email: &str) -> std::result::Result<(), ApiError> {
        self.subscribe_email(email).await.map(|_| ())
    }

    async fn send_contact(&self, form: &ContactForm) -> std::result::Result<(), ApiError> {
        self.submit_contact_form(form).await.map(|_| ())
    }
}

/// Stand-in backend used when no API is configured
pub struct SimulatedBackend {
    delay: Duration,
}

impl SimulatedBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl FormBackend for SimulatedBackend {
    async fn subscribe(&self, _email: &str) -> std::result::Result<(), ApiError> {
        warn!("API not configured, simulating success");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn send_contact(&self, _form: &ContactForm) -> std::result::Result<(), ApiError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

/// Feedback shown under a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl FormMessage {
    fn success(text: &str) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.to_string(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

struct FormsState {
    backend: Arc<dyn FormBackend>,
    analytics: Option<Arc<Analytics>>,
    events: EventBus,
    messages: Mutex<BTreeMap<&'static str, FormMessage>>,
    signup_busy: AtomicBool,
    contact_busy: AtomicBool,
}

impl FormsState {
    fn show(&self, form: &'static str, message: FormMessage) -> FormMessage {
        if let Ok(mut messages) = self.messages.lock() {
            messages.insert(form, message.clone());
        }
        message
    }

    fn track(&self, category: &str, label: &str) {
        if let Some(analytics) = &self.analytics {
            analytics.track_event(category, "Submit", label, None);
        }
    }

    async fn submit_signup(&self, email: &str) -> FormMessage {
        let email = email.trim();
        if !is_valid_email(email) {
            return self.show(SIGNUP_FORM, FormMessage::error("Please enter a valid email address"));
        }

        if self.signup_busy.swap(true, Ordering::SeqCst) {
            return FormMessage::error(BUSY);
        }
        let result = self.backend.subscribe(email).await;
        self.signup_busy.store(false, Ordering::SeqCst);

        let success = result.is_ok();
        self.events.emit_lossy(SiteEvent::FormSubmitted {
            form: "signup".to_string(),
            success,
        });

        match result {
            Ok(()) => {
                self.track("Email Signup", "Newsletter");
                self.show(
                    SIGNUP_FORM,
                    FormMessage::success("Thanks for subscribing! Check your email to confirm."),
                )
            }
            Err(e) => {
                error!("Signup error: {}", e);
                self.show(
                    SIGNUP_FORM,
                    FormMessage::error("Oops! Something went wrong. Please try again."),
                )
            }
        }
    }

    async fn submit_contact(&self, form: &ContactForm) -> FormMessage {
        let errors = validate_contact(form);
        if !errors.is_empty() {
            return self.show(CONTACT_FORM, FormMessage::error(errors.join("<br>")));
        }

        if self.contact_busy.swap(true, Ordering::SeqCst) {
            return FormMessage::error(BUSY);
        }
        let result = self.backend.send_contact(form).await;
        self.contact_busy.store(false, Ordering::SeqCst);

        let success = result.is_ok();
        self.events.emit_lossy(SiteEvent::FormSubmitted {
            form: "contact".to_string(),
            success,
        });

        match result {
            Ok(()) => {
                let subject = form
                    .subject
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or("General");
                self.track("Contact Form", subject);
                self.show(
                    CONTACT_FORM,
                    FormMessage::success("Message sent! We'll get back to you soon."),
                )
            }
            Err(e) => {
                error!("Contact form error: {}", e);
                self.show(
                    CONTACT_FORM,
                    FormMessage::error("Failed to send message. Please try again."),
                )
            }
        }
    }
}

fn contact_from_event(event: &DomEvent) -> ContactForm {
    let field = |name: &str| event.field(name).unwrap_or_default().to_string();
    ContactForm {
        name: field("name"),
        email: field("email"),
        subject: event.field("subject").map(str::to_string),
        message: field("message"),
        kind: event.field("type").map(str::to_string),
    }
}

/// Signup and contact form handling
#[derive(Clone)]
pub struct Forms {
    state: Arc<FormsState>,
}

impl Forms {
    /// `analytics` receives a conversion event for every successful submission
    pub fn new(
        backend: Arc<dyn FormBackend>,
        analytics: Option<Arc<Analytics>>,
        events: EventBus,
    ) -> Self {
        Self {
            state: Arc::new(FormsState {
                backend,
                analytics,
                events,
                messages: Mutex::new(BTreeMap::new()),
                signup_busy: AtomicBool::new(false),
                contact_busy: AtomicBool::new(false),
            }),
        }
    }

    pub async fn submit_signup(&self, email: &str) -> FormMessage {
        self.state.submit_signup(email).await
    }

    pub async fn submit_contact(&self, form: &ContactForm) -> FormMessage {
        self.state.submit_contact(form).await
    }

    /// Last message shown under `form` (`#signup-form` or `#contact-form`)
    pub fn message(&self, form: &str) -> Option<FormMessage> {
        self.state
            .messages
            .lock()
            .ok()
            .and_then(|messages| messages.get(form).cloned())
    }
}

fn spawn_submission<F>(what: &str, fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => warn!("No async runtime, dropping {} submission", what),
    }
}

impl PageModule for Forms {
    fn name(&self) -> &'static str {
        "forms"
    }

    fn wants(&self, page: &PageName, markup: &str) -> bool {
        page == "contact" || has_id(markup, "signup-form") || has_id(markup, "contact-form")
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        if has_id(ctx.markup, "signup-form") {
            let state = Arc::clone(&self.state);
            ctx.listeners.add(self.name(), SIGNUP_FORM, "submit", move |event| {
                let state = Arc::clone(&state);
                let email = event.field("email").unwrap_or_default().to_string();
                spawn_submission("signup", async move {
                    state.submit_signup(&email).await;
                });
            });
        }

        if has_id(ctx.markup, "contact-form") {
            let state = Arc::clone(&self.state);
            ctx.listeners.add(self.name(), CONTACT_FORM, "submit", move |event| {
                let state = Arc::clone(&state);
                let form = contact_from_event(event);
                spawn_submission("contact", async move {
                    state.submit_contact(&form).await;
                });
            });
        }

        Ok(())
    }
}
