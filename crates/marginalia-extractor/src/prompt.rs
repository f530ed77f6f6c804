//! LLM prompt engineering for literary analysis

use crate::sampling::excerpts;
use marginalia_domain::BookMetadata;

/// Builds prompts for character and theme extraction
pub struct PromptBuilder<'a> {
    sample: &'a str,
    title: &'a str,
    author: &'a str,
    excerpt_len: usize,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder over a text sample
    pub fn new(sample: &'a str, metadata: &'a BookMetadata, excerpt_len: usize) -> Self {
        Self {
            sample,
            title: &metadata.title,
            author: &metadata.author,
            excerpt_len,
        }
    }

    /// Prompt asking for characters and their relationships
    pub fn characters(&self) -> String {
        self.build(CHARACTER_TASK, CHARACTER_FORMAT)
    }

    /// Prompt asking for themes, sentiment and key quotes
    pub fn themes(&self) -> String {
        self.build(THEME_TASK, THEME_FORMAT)
    }

    fn build(&self, task: &str, format: &str) -> String {
        let parts = excerpts(self.sample, self.excerpt_len);
        let mut prompt = String::new();

        // 1. Role and subject
        prompt.push_str(&format!(
            "You are a literary analyst. Based on the provided text from the book \"{}\" by {}, identify the following:\n\n",
            self.title, self.author
        ));

        // 2. What to extract
        prompt.push_str(task);
        prompt.push_str("\n\n");

        // 3. Output shape
        prompt.push_str("Respond in JSON format only, with the following structure:\n");
        prompt.push_str(format);
        prompt.push_str("\n\n");

        // 4. The text to analyze
        prompt.push_str("Here's the text sample:\n\n");
        prompt.push_str(parts.beginning);
        prompt.push_str("\n\n[Text continued in middle section...]\n\n");
        prompt.push_str(parts.middle);
        prompt.push_str("\n\n[Text continued in end section...]\n\n");
        prompt.push_str(parts.end);
        prompt.push('\n');

        prompt
    }
}

const CHARACTER_TASK: &str = r#"1. Main and supporting characters in the text
2. For each character, provide:
   - Their name and any aliases
   - Their role in the story
   - Brief description
   - Key relationships with other characters"#;

const CHARACTER_FORMAT: &str = r#"{
  "characters": [
    {
      "name": "Character Name",
      "aliases": ["Alias1", "Alias2"],
      "role": "Main/Supporting/Minor",
      "description": "Brief description",
      "relationships": [
        {"character": "Related Character Name", "type": "Relationship Type", "strength": 1-10}
      ]
    }
  ]
}

The strength value (1-10) represents how strongly connected the characters are."#;

const THEME_TASK: &str = r#"1. Key themes in the text (3-5 major themes)
2. Overall sentiment analysis of the text
3. Extract 5 significant quotes with attribution and context"#;

const THEME_FORMAT: &str = r#"{
  "themes": [
    {"name": "Theme Name", "description": "Theme Description"}
  ],
  "sentiment": {
    "overall": "positive/negative/neutral/mixed",
    "analysis": "Brief analysis of the emotional tone"
  },
  "key_quotes": [
    {
      "quote": "The quote text",
      "speaker": "Character who spoke it (if applicable)",
      "context": "Brief context for the quote",
      "significance": "Why this quote is important"
    }
  ]
}"#;
