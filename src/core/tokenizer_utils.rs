/*
 * Token estimates for the copied bundle, so the user knows roughly how much of
 * a model's context window the selection will take. `CoreTikTokenCounter` uses
 * the `cl100k_base` encoding from `tiktoken-rs`; `SimpleWhitespaceTokenCounter`
 * is a word count used as the fallback and in tests.
 */
use tiktoken_rs::{CoreBPE, cl100k_base};

pub trait TokenCounterOperations: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/*
 * Loads the BPE tables once at construction. If they cannot be loaded the
 * counter logs the failure and degrades to whitespace counting for its lifetime.
 */
pub struct CoreTikTokenCounter {
    bpe: Option<CoreBPE>,
}

impl CoreTikTokenCounter {
    pub fn new() -> Self {
        let bpe = match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                log::error!(
                    "TokenCounter: Failed to initialize cl100k_base: {e:?}. Falling back to whitespace token count."
                );
                None
            }
        };
        CoreTikTokenCounter { bpe }
    }

    pub fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }
}

impl Default for CoreTikTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for CoreTikTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => SimpleWhitespaceTokenCounter.count_tokens(text),
        }
    }
}

pub struct SimpleWhitespaceTokenCounter;

impl SimpleWhitespaceTokenCounter {
    pub fn new() -> Self {
        SimpleWhitespaceTokenCounter
    }
}

impl Default for SimpleWhitespaceTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for SimpleWhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
