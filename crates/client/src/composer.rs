//! Chat and poll composers.
//!
//! Neither composer touches the chat mirror. A sent message shows up when
//! its push event arrives, for the sender too.

use lunchsync_common::{ChatMessageView, IsoWeek};

use crate::error::{ClientError, ClientResult};
use crate::gateway::{CreatedPoll, Gateway};

/// Empty option slots a fresh poll form starts with.
pub const INITIAL_OPTION_SLOTS: usize = 3;

/// The chat input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatComposer {
    /// Current input text.
    pub draft: String,
}

impl ChatComposer {
    /// Send the trimmed draft to `iso_week`'s chat.
    ///
    /// Blank input is refused without a request. The draft is cleared only
    /// once the server accepts the message.
    pub async fn submit<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        iso_week: &IsoWeek,
    ) -> ClientResult<ChatMessageView> {
        let body = self.draft.trim();
        if body.is_empty() {
            return Err(ClientError::Refused("Message is empty"));
        }
        let message = gateway.post_chat(iso_week, body).await?;
        self.draft.clear();
        Ok(message)
    }
}

/// The "start a poll" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollComposer {
    /// Optional title.
    pub title: String,
    /// Option inputs, blanks included.
    pub options: Vec<String>,
}

impl Default for PollComposer {
    fn default() -> Self {
        Self {
            title: String::new(),
            options: vec![String::new(); INITIAL_OPTION_SLOTS],
        }
    }
}

impl PollComposer {
    /// Add an empty option input.
    pub fn add_option(&mut self) {
        self.options.push(String::new());
    }

    /// Set option input `index`, growing the list if needed.
    pub fn set_option(&mut self, index: usize, value: &str) {
        if index >= self.options.len() {
            self.options.resize(index + 1, String::new());
        }
        self.options[index] = value.to_string();
    }

    /// Trimmed options with blanks dropped, in input order.
    #[must_use]
    pub fn cleaned_options(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Create the poll. Refuses when every option is blank; resets the form
    /// on success.
    pub async fn submit<G: Gateway + ?Sized>(&mut self, gateway: &G) -> ClientResult<CreatedPoll> {
        let options = self.cleaned_options();
        if options.is_empty() {
            return Err(ClientError::Refused("A poll needs at least one option"));
        }
        let title = Some(self.title.trim()).filter(|t| !t.is_empty());

        let created = gateway.create_poll(title, &options).await?;
        *self = Self::default();
        Ok(created)
    }
}
