//! Shared constants used across the application

/// First message of every fresh or cleared conversation.
pub const DEFAULT_GREETING: &str =
    "Yo! Welcome to KONGKOW. I'm your AI buddy. What's on your mind? Let's chat!";

/// Appended to the transcript when a reply stream fails.
pub const DEFAULT_APOLOGY: &str =
    "My bad, something went wrong with the connection. Let's try that again?";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are KONGKOW, a relaxed and friendly AI buddy. \
Talk like a close friend in casual everyday Indonesian, mixing in a little English when it fits. \
Keep answers short and to the point instead of robotic, and feel free to use emoji.";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
