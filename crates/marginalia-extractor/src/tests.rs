//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{AnalysisPipeline, Extractor, ExtractorConfig, ExtractorError};
    use marginalia_domain::{BookId, BookMetadata};
    use marginalia_llm::{MockProvider, StreamFailure};
    use std::sync::Arc;

    const CHARACTERS: &str = r#"Sure! Here you go:
{"characters": [
    {"name": "Elizabeth Bennet", "aliases": ["Lizzy"], "role": "Main", "description": "Second daughter",
     "relationships": [{"character": "Mr. Darcy", "type": "Love interest", "strength": "9"}]},
    {"name": "Mr. Darcy", "role": "Main",
     "relationships": [{"character": "Elizabeth Bennet", "type": "Admirer", "strength": 8}]},
    {"name": "Jane Bennet", "role": "Supporting"}
]}"#;

    const THEMES: &str = r#"{"themes": [{"name": "Pride"}, {"name": "Prejudice", "description": "First impressions"}],
        "sentiment": {"overall": "positive", "analysis": "Witty and warm"},
        "key_quotes": [{"quote": "It is a truth universally acknowledged...", "speaker": "Narrator"}]}"#;

    fn metadata() -> BookMetadata {
        let mut meta = BookMetadata::unknown(BookId::parse("1342").unwrap());
        meta.title = "Pride and Prejudice".to_string();
        meta.author = "Jane Austen".to_string();
        meta
    }

    fn scripted() -> MockProvider {
        let mut llm = MockProvider::default();
        llm.add_response("Main and supporting characters", CHARACTERS);
        llm.add_response("Key themes in the text", THEMES);
        llm
    }

    fn extractor(llm: &MockProvider, streaming: bool) -> Extractor {
        let config = ExtractorConfig {
            streaming,
            ..ExtractorConfig::default()
        };
        Extractor::new(Arc::new(llm.clone()), config)
    }

    #[tokio::test]
    async fn test_full_analysis_flow() {
        let llm = scripted();
        let pipeline = AnalysisPipeline::new(extractor(&llm, false));

        let text = "It is a truth universally acknowledged. ".repeat(50);
        let record = pipeline.analyze(&text, &metadata()).await.unwrap();

        assert_eq!(record.characters.len(), 3);
        assert_eq!(record.characters[0].relationships[0].strength, Some(9));
        assert_eq!(record.graph.nodes.len(), 3);
        assert_eq!(record.graph.links.len(), 1);
        assert_eq!(record.graph.links[0].kind, "Love interest");
        assert_eq!(record.themes.len(), 2);
        assert_eq!(record.sentiment.overall.as_deref(), Some("positive"));
        assert_eq!(record.key_quotes.len(), 1);

        assert_eq!(llm.call_count(), 2);
        assert_eq!(llm.stream_call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompts_carry_book_identity() {
        let llm = scripted();
        let pipeline = AnalysisPipeline::new(extractor(&llm, false));
        pipeline.analyze("Some text", &metadata()).await.unwrap();

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        for prompt in prompts {
            assert!(prompt.contains("\"Pride and Prejudice\" by Jane Austen"));
            assert!(prompt.contains("Some text"));
        }
    }

    #[tokio::test]
    async fn test_streaming_matches_plain_result() {
        let llm = scripted();
        let sample = "Sample";

        let plain = extractor(&llm, false);
        let streamed = extractor(&llm, true);

        assert_eq!(
            plain.characters(sample, &metadata()).await.unwrap(),
            streamed.characters(sample, &metadata()).await.unwrap()
        );
        assert_eq!(
            plain.themes(sample, &metadata()).await.unwrap(),
            streamed.themes(sample, &metadata()).await.unwrap()
        );
        assert_eq!(llm.stream_call_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_refused_falls_back_to_plain() {
        let mut llm = scripted();
        let expected = extractor(&llm, false)
            .characters("Sample", &metadata())
            .await
            .unwrap();
        llm.reset_call_count();

        llm.set_stream_failure(StreamFailure::OnCreate);
        let characters = extractor(&llm, true)
            .characters("Sample", &metadata())
            .await
            .unwrap();

        assert_eq!(characters, expected);
        assert_eq!(llm.stream_call_count(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_broken_midway_falls_back_to_plain() {
        let mut llm = scripted();
        llm.set_stream_failure(StreamFailure::MidStream);

        let report = extractor(&llm, true)
            .themes("Sample", &metadata())
            .await
            .unwrap();

        assert_eq!(report.themes.len(), 2);
        assert_eq!(llm.stream_call_count(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_an_error() {
        let mut llm = MockProvider::default();
        llm.add_error("Main and supporting characters");
        llm.set_stream_failure(StreamFailure::OnCreate);

        let result = extractor(&llm, true).characters("Sample", &metadata()).await;
        assert!(matches!(result, Err(ExtractorError::Llm(_))));
    }

    #[tokio::test]
    async fn test_unusable_reply_gives_empty_results() {
        let llm = MockProvider::new("I'm sorry, I cannot help with that.");
        let pipeline = AnalysisPipeline::new(extractor(&llm, false));

        let record = pipeline.analyze("Some text", &metadata()).await.unwrap();
        assert!(record.characters.is_empty());
        assert!(record.graph.nodes.is_empty());
        assert!(record.themes.is_empty());
        assert!(record.key_quotes.is_empty());
    }

    #[tokio::test]
    async fn test_sample_budget_bounds_prompt_text() {
        let llm = scripted();
        let config = ExtractorConfig {
            sample_budget: 300,
            excerpt_len: 100,
            streaming: false,
            ..ExtractorConfig::default()
        };
        let pipeline = AnalysisPipeline::new(Extractor::new(Arc::new(llm.clone()), config));

        let text = "§".repeat(100_000);
        pipeline.analyze(&text, &metadata()).await.unwrap();

        for prompt in llm.prompts() {
            let embedded = prompt.chars().filter(|c| *c == '§').count();
            assert!(embedded <= 300, "prompt embedded {} sample chars", embedded);
        }
    }
}
