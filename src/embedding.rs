//! Embedding provider contract

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::{ContextError, Result};

/// Produces fixed-dimension vectors for one or many strings
///
/// Vectors for a fixed provider always have the same positive
/// dimension. Provider failures propagate unchanged, wrapped in
/// [`ContextError::Provider`]; the library never retries them.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of every vector this provider produces
    fn dimension(&self) -> usize;

    /// Embed many texts as a lazy, order-preserving stream
    ///
    /// The stream is cancellable between items; output produced before
    /// cancellation remains valid.
    fn embed_batch<'a>(
        &'a self,
        texts: Vec<String>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<Vec<f32>>> {
        Box::pin(try_stream! {
            for text in texts {
                if cancel.is_cancelled() {
                    Err(ContextError::Cancelled)?;
                }
                let vector = self.embed(&text).await?;
                yield vector;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Deterministic fixture: maps text length onto a 3-d direction
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n = text.len() as f32;
            Ok(vec![n, n + 1.0, n + 2.0])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let provider = LengthEmbedder;
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];

        let vectors: Vec<Vec<f32>> = provider
            .embed_batch(texts, CancellationToken::new())
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0][0], 1.0);
        assert_eq!(vectors[1][0], 2.0);
        assert_eq!(vectors[2][0], 3.0);
    }

    #[tokio::test]
    async fn test_batch_stops_on_cancellation() {
        let provider = LengthEmbedder;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut stream = provider.embed_batch(vec!["a".to_string()], cancel);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(ContextError::Cancelled)));
    }
}
