//! Blocking user confirmation, abstracted.
//!
//! The layer model never talks to a UI directly. Wherever the user has to be
//! asked something (redispatching an unexpected load result, resolving an
//! `ask` preference) it goes through a [`Prompt`].

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::logging::targets;

/// Answer to a yes/no question that offers a "remember my decision" toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PromptAnswer {
    /// Whether the user answered yes.
    pub yes: bool,
    /// Whether the user asked for the answer to be remembered.
    pub remember: bool,
}

impl PromptAnswer {
    /// An answer that is not to be remembered.
    pub const fn once(yes: bool) -> Self {
        Self {
            yes,
            remember: false,
        }
    }

    /// An answer to be remembered.
    pub const fn remembered(yes: bool) -> Self {
        Self {
            yes,
            remember: true,
        }
    }
}

/// Synchronous user interaction.
///
/// # Threading
///
/// Methods may be called from any thread. The layer loader calls
/// [`confirm`](Prompt::confirm) from the resolver's completion callback, which
/// for [`WorkerResolver`](crate::WorkerResolver) is its single worker thread:
/// every queued load waits until the call returns. Implementations backed by
/// a UI must not block there; hand the question to the UI thread and answer
/// from what is already known, or run loads on a resolver with a spare
/// callback thread.
pub trait Prompt: Send + Sync {
    /// Ask for an OK/Cancel confirmation.
    fn confirm(&self, title: &str, message: &str) -> bool;

    /// Ask a yes/no question with a "remember" toggle.
    fn ask_yes_no(&self, title: &str, message: &str) -> PromptAnswer;
}

/// A prompt that answers every question the same way without asking.
///
/// Used in headless runs; it counts how often it was consulted.
#[derive(Debug, Default)]
pub struct AutoPrompt {
    answer: PromptAnswer,
    asked: AtomicUsize,
}

impl AutoPrompt {
    /// A prompt that always answers `answer`.
    pub const fn new(answer: PromptAnswer) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    /// Always yes, never remembered.
    pub const fn accepting() -> Self {
        Self::new(PromptAnswer::once(true))
    }

    /// Always no, never remembered.
    pub const fn declining() -> Self {
        Self::new(PromptAnswer::once(false))
    }

    /// How many questions have been asked so far.
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::Acquire)
    }
}

impl Prompt for AutoPrompt {
    fn confirm(&self, title: &str, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(target: targets::PROMPT, title, answer = self.answer.yes, "auto-confirmed");
        self.answer.yes
    }

    fn ask_yes_no(&self, title: &str, _message: &str) -> PromptAnswer {
        self.asked.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(target: targets::PROMPT, title, answer = self.answer.yes, "auto-answered");
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_prompt_counts() {
        let prompt = AutoPrompt::new(PromptAnswer::remembered(false));
        assert!(!prompt.confirm("t", "m"));
        assert_eq!(prompt.ask_yes_no("t", "m"), PromptAnswer::remembered(false));
        assert_eq!(prompt.asked(), 2);
    }

    #[test]
    fn test_accepting_and_declining() {
        assert!(AutoPrompt::accepting().confirm("t", "m"));
        assert!(!AutoPrompt::declining().ask_yes_no("t", "m").yes);
    }
}
