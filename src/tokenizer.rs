//! Token counting under named model encodings

use async_trait::async_trait;
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ContextError, Result};

/// Model and encoding identifiers accepted by [`TiktokenTokenizer`]
pub const SUPPORTED_ENCODINGS: &[&str] = &[
    "gpt-4",
    "gpt-3.5-turbo",
    "text-embedding-ada-002",
    "text-embedding-3-small",
    "text-embedding-3-large",
    "cl100k_base",
];

/// Token counting contract
///
/// Implementations must be deterministic for a given (encoding, text)
/// pair and return 0 for empty input.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Count the tokens in `text`
    fn count_tokens(&self, text: &str) -> Result<usize>;

    /// Cancellable token count for long inputs
    async fn count_tokens_cancellable(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        self.count_tokens(text)
    }
}

/// BPE tokenizer addressed by an opaque model or encoding identifier
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    encoding: String,
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TiktokenTokenizer {
    /// Build a tokenizer for a known model or encoding identifier
    ///
    /// An unknown identifier fails with
    /// [`ContextError::UnsupportedEncoding`] at construction time.
    pub fn for_model(model: &str) -> Result<Self> {
        if !SUPPORTED_ENCODINGS.contains(&model) {
            return Err(ContextError::UnsupportedEncoding(model.to_string()));
        }

        let bpe = match model {
            "cl100k_base" => {
                cl100k_base().map_err(|e| ContextError::UnsupportedEncoding(e.to_string()))?
            }
            _ => get_bpe_from_model(model)
                .map_err(|_| ContextError::UnsupportedEncoding(model.to_string()))?,
        };

        debug!(encoding = model, "Constructed tokenizer");
        Ok(Self {
            bpe,
            encoding: model.to_string(),
        })
    }

    /// The identifier this tokenizer was constructed for
    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

#[async_trait]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}
