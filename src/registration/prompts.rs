//! User-visible bot replies.

use std::fmt;

/// Every reply the bot can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Welcome,
    AskUsername,
    UsernameTaken,
    AskPassword,
    AskReferral,
    Complete,
    SaveFailed,
    LookupFailed,
    LoginUnavailable,
    StartFirst,
    Cancelled,
}

impl Prompt {
    pub fn text(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome! Please choose an option:",
            Self::AskUsername => "Please enter your username:",
            Self::UsernameTaken => "Username already taken. Please enter another username:",
            Self::AskPassword => "Great! Now enter your password:",
            Self::AskReferral => {
                "Enter your referral code (or type 'skip' if you don't have one):"
            }
            Self::Complete => "Registration complete!",
            Self::SaveFailed => {
                "Sorry, we couldn't save your registration. \
                 Please send your referral code again to retry."
            }
            Self::LookupFailed => {
                "Sorry, we couldn't check that username right now. Please send it again."
            }
            Self::LoginUnavailable => "Login functionality not implemented yet.",
            Self::StartFirst => {
                "Please start the registration process first by clicking the Register button."
            }
            Self::Cancelled => "Registration cancelled. Send /start to begin again.",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_prompt_mentions_skip() {
        assert!(Prompt::AskReferral.text().contains("'skip'"));
    }

    #[test]
    fn display_matches_text() {
        assert_eq!(Prompt::Complete.to_string(), "Registration complete!");
    }
}
