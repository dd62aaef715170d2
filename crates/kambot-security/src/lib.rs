//! Input screening and sanitization for kambot.
//!
//! Two check catalogs are provided:
//!
//! | Catalog | Used by | Categories |
//! |---------|---------|------------|
//! | [`InputScreen::injection`] | validation stage | prompt injection, code injection, path traversal, SQL injection |
//! | [`InputScreen::harmful_intent`] | offline moderation | self-harm, harming others, weapons |
//!
//! [`sanitize`] holds the character-level rules (control characters,
//! invisible formatting characters, whitespace normalization).

pub mod checks;
pub mod sanitize;

pub use checks::{InputScreen, ScreenCategory, ScreenCheck, ScreenFinding};
pub use sanitize::{find_forbidden_char, sanitize};
