use dialoguer::{Confirm, Input};
use tracing::warn;

use graphport_migrate::{DecisionSource, DESTRUCTIVE_PROMPT};

/// Terminal prompts. A prompt that cannot be shown (no TTY, interrupted)
/// counts as "no" for gates and as the default for values. Continuation
/// gates default to yes; the destructive-reset gate defaults to no.
pub struct TerminalDecisions;

impl DecisionSource for TerminalDecisions {
    fn confirm(&self, prompt: &str) -> bool {
        let answer = Confirm::new()
            .with_prompt(prompt)
            .default(prompt != DESTRUCTIVE_PROMPT)
            .interact();
        match answer {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Prompt failed; treating as no");
                false
            }
        }
    }

    fn read_value(&self, name: &str, default: &str) -> String {
        Input::<String>::new()
            .with_prompt(name)
            .default(default.to_string())
            .interact_text()
            .unwrap_or_else(|e| {
                warn!(error = %e, field = name, "Prompt failed; keeping default");
                default.to_string()
            })
    }
}
