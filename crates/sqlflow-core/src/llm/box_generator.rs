//! BoxTextGenerator -- object-safe dynamic dispatch wrapper for TextGenerator.
//!
//! 1. Define an object-safe `TextGeneratorDyn` trait with boxed futures
//! 2. Blanket-impl `TextGeneratorDyn` for all `T: TextGenerator`
//! 3. `BoxTextGenerator` wraps `Box<dyn TextGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use sqlflow_types::llm::{LlmError, ResponseSchema};

use super::generator::TextGenerator;

/// Object-safe version of [`TextGenerator`] with boxed futures.
pub trait TextGeneratorDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn model_dyn(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        schema: &'a ResponseSchema,
    ) -> Pin<Box<dyn Future<Output = Result<Value, LlmError>> + Send + 'a>>;
}

/// Blanket implementation: any `TextGenerator` automatically implements `TextGeneratorDyn`.
impl<T: TextGenerator> TextGeneratorDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn model_dyn(&self) -> &str {
        self.model()
    }

    fn generate_boxed<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        schema: &'a ResponseSchema,
    ) -> Pin<Box<dyn Future<Output = Result<Value, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(system_prompt, user_prompt, schema))
    }
}

/// Type-erased text generator for runtime backend selection.
///
/// Since `TextGenerator` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxTextGenerator` provides equivalent methods that delegate to
/// the inner `TextGeneratorDyn` trait object.
pub struct BoxTextGenerator {
    inner: Box<dyn TextGeneratorDyn + Send + Sync>,
}

impl BoxTextGenerator {
    /// Wrap a concrete `TextGenerator` in a type-erased box.
    pub fn new<T: TextGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    pub fn model(&self) -> &str {
        self.inner.model_dyn()
    }

    /// Generate a raw structured object.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, LlmError> {
        self.inner
            .generate_boxed(system_prompt, user_prompt, schema)
            .await
    }

    /// Generate and deserialize into `T`, deriving the schema from `T`.
    pub async fn generate_as<T>(
        &self,
        schema_name: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T, LlmError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = ResponseSchema::of::<T>(schema_name);
        let span = tracing::info_span!(
            "gen_ai.generate",
            gen_ai.system = self.name(),
            gen_ai.request.model = self.model(),
            gen_ai.response.schema = schema_name,
        );
        let value = self
            .generate(system_prompt, user_prompt, &schema)
            .instrument(span)
            .await?;
        serde_json::from_value(value).map_err(|e| {
            LlmError::Deserialization(format!("'{schema_name}' response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlflow_types::llm::{SQL_QUERY_SCHEMA, SqlQueryResponse};

    struct EchoGenerator {
        reply: Value,
    }

    impl TextGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _schema: &ResponseSchema,
        ) -> Result<Value, LlmError> {
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn generate_as_deserializes_response() {
        let generator = BoxTextGenerator::new(EchoGenerator {
            reply: json!({"sql_query": "SELECT 1"}),
        });
        let out: SqlQueryResponse = generator
            .generate_as(SQL_QUERY_SCHEMA, "sys", "user")
            .await
            .unwrap();
        assert_eq!(out.sql_query, "SELECT 1");
        assert_eq!(generator.name(), "echo");
        assert_eq!(generator.model(), "echo-1");
    }

    #[tokio::test]
    async fn generate_as_reports_shape_mismatch() {
        let generator = BoxTextGenerator::new(EchoGenerator {
            reply: json!({"query": 42}),
        });
        let err = generator
            .generate_as::<SqlQueryResponse>(SQL_QUERY_SCHEMA, "sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Deserialization(_)));
        assert!(err.to_string().contains("sql_query"));
    }
}
