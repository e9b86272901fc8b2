//! Arabic document preprocessing pipeline
//!
//! Turns a curriculum PDF into `episodes.json`: extract text, strip
//! diacritics and layout artifacts, chunk, then ask the LLM for a short
//! title and a one-line description per chunk. The output file is the sole
//! intermediate artifact between preprocessing and ingestion.

use crate::llm::{ChatClient, ChatMessage};
use anyhow::{anyhow, Context, Result};
use madrasa_kg::{Episode, EpisodeType};
use regex::Regex;
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::info;

/// Chunks shorter than this are dropped as layout noise (headers, stray
/// page furniture).
const MIN_CHUNK_CHARS: usize = 50;

/// Prompt asking for a two-to-three word title, answer-only, in Arabic.
const TITLE_PROMPT: &str = "اكتب عنوان مكون من كلمتين او ثلاث كلمات فقط ردك يجب أن يكون إجابة وحيدة صريحة فقط بدون أي مهاترات للفقرة الأتية:";

/// Prompt asking for a one-line description, answer-only, in Arabic.
const DESCRIPTION_PROMPT: &str = "اكتب وصف من سطر واحد فقط بأقل عدد كلمات ممكنة ردك يجب أن يكون إجابة وحيدة صريحة فقط بدون أي مهاترات للفقرة الأتية:";

/// Chunking parameters for [`ArabicPreprocessor::chunk`].
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 250,
        }
    }
}

/// Text cleanup and chunking for Arabic curriculum documents.
pub struct ArabicPreprocessor {
    /// Arabic diacritics and layout artifacts: U+0610-U+061A, U+064B-U+065F,
    /// U+0670, U+06D6-U+06ED, tatweel U+0640 and the PDF bullet U+F0B7.
    diacritics: Regex,
    /// Bare page-number line starts
    page_numbers: Regex,
    whitespace: Regex,
}

impl Default for ArabicPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArabicPreprocessor {
    pub fn new() -> Self {
        Self {
            diacritics: Regex::new(
                r"[\u{0610}-\u{061A}\u{064B}-\u{065F}\u{0670}\u{06D6}-\u{06ED}\u{0640}\u{F0B7}]",
            )
            .unwrap(),
            page_numbers: Regex::new(r"(?m)^\d+\s+").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Extract the raw text of a PDF.
    pub fn load_pdf(path: &Path) -> Result<String> {
        info!("Loading PDF {}", path.display());
        pdf_extract::extract_text(path)
            .map_err(|e| anyhow!("Failed to extract text from {}: {}", path.display(), e))
    }

    /// Strip diacritics and page numbers, then collapse whitespace.
    ///
    /// Page-number lines are removed before whitespace collapsing so the
    /// multiline pattern still sees line starts.
    pub fn clean(&self, text: &str) -> String {
        let text = self.diacritics.replace_all(text, "");
        let text = self.page_numbers.replace_all(&text, "");
        let text = self.whitespace.replace_all(&text, " ");
        text.trim().to_string()
    }

    /// Split cleaned text into overlapping chunks, dropping fragments below
    /// [`MIN_CHUNK_CHARS`].
    pub fn chunk(&self, text: &str, options: &PreprocessOptions) -> Result<Vec<String>> {
        let config = ChunkConfig::new(options.chunk_size)
            .with_overlap(options.chunk_overlap)
            .map_err(|e| anyhow!("Invalid chunk configuration: {}", e))?;
        let splitter = TextSplitter::new(config);

        Ok(splitter
            .chunks(text)
            .filter(|chunk| chunk.chars().count() >= MIN_CHUNK_CHARS)
            .map(str::to_string)
            .collect())
    }

    /// Ask the LLM for a title and description, producing an episode record.
    pub async fn annotate(&self, llm: &ChatClient, chunk: &str) -> Result<Episode> {
        let name = llm
            .complete(&[ChatMessage::user(format!("{}\n{}", TITLE_PROMPT, chunk))])
            .await
            .context("Title generation failed")?;
        let description = llm
            .complete(&[ChatMessage::user(format!("{}\n{}", DESCRIPTION_PROMPT, chunk))])
            .await
            .context("Description generation failed")?;

        Ok(Episode {
            name: name.trim().to_string(),
            content: serde_json::Value::String(chunk.to_string()),
            source: EpisodeType::Text,
            description: description.trim().to_string(),
        })
    }

    /// The full pipeline: load, clean, chunk, annotate.
    ///
    /// LLM calls run one at a time; the first failure aborts the run and the
    /// command is re-run manually.
    pub async fn process_pdf(
        &self,
        llm: &ChatClient,
        pdf_path: &Path,
        options: &PreprocessOptions,
    ) -> Result<Vec<Episode>> {
        let raw = Self::load_pdf(pdf_path)?;

        info!("Cleaning text ({} chars)", raw.chars().count());
        let cleaned = self.clean(&raw);

        let chunks = self.chunk(&cleaned, options)?;
        info!("Created {} chunks", chunks.len());

        let mut episodes = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            info!("Annotating chunk {}/{}", i + 1, chunks.len());
            episodes.push(self.annotate(llm, chunk).await?);
        }

        Ok(episodes)
    }
}

/// Write episode records to the ingestion file.
pub fn write_episodes(path: &Path, episodes: &[Episode]) -> Result<()> {
    let json = serde_json::to_string_pretty(episodes)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load episode records from the ingestion file.
pub fn load_episodes(path: &Path) -> Result<Vec<Episode>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let episodes: Vec<Episode> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid episode list", path.display()))?;
    Ok(episodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_all_diacritic_ranges() {
        let preprocessor = ArabicPreprocessor::new();

        // One representative from each range of the pattern.
        let decorated = "ب\u{0610}ا\u{061A}ت\u{064B}ث\u{065F}ج\u{0670}ح\u{06D6}خ\u{06ED}د\u{0640}ذ\u{F0B7}ر";
        assert_eq!(preprocessor.clean(decorated), "باتثجحخدذر");
    }

    #[test]
    fn test_clean_strips_tashkeel_from_word() {
        let preprocessor = ArabicPreprocessor::new();
        assert_eq!(preprocessor.clean("مَدْرَسَةٌ"), "مدرسة");
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        let preprocessor = ArabicPreprocessor::new();
        assert_eq!(
            preprocessor.clean("  اللغة \t العربية \n\n مهمة  "),
            "اللغة العربية مهمة"
        );
    }

    #[test]
    fn test_clean_drops_page_number_prefixes() {
        let preprocessor = ArabicPreprocessor::new();
        let text = "12 الدرس الأول\nالنص يستمر هنا";
        assert_eq!(preprocessor.clean(text), "الدرس الأول النص يستمر هنا");
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let preprocessor = ArabicPreprocessor::new();
        let sentence = "اللغة العربية من أغنى لغات العالم وأكثرها انتشارا بين الناس. ";
        let text = sentence.repeat(60);

        let options = PreprocessOptions {
            chunk_size: 300,
            chunk_overlap: 50,
        };
        let chunks = preprocessor.chunk(&text, &options).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 300);
        }
    }

    #[test]
    fn test_chunk_rejects_overlap_exceeding_size() {
        let preprocessor = ArabicPreprocessor::new();
        let options = PreprocessOptions {
            chunk_size: 100,
            chunk_overlap: 200,
        };
        assert!(preprocessor.chunk("نص", &options).is_err());
    }

    #[test]
    fn test_short_fragments_are_dropped() {
        let preprocessor = ArabicPreprocessor::new();
        let chunks = preprocessor
            .chunk("قصير", &PreprocessOptions::default())
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_episode_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episodes.json");

        let episodes = vec![Episode {
            name: "مقدمة".to_string(),
            content: serde_json::Value::String("اللغة العربية".to_string()),
            source: EpisodeType::Text,
            description: "وصف".to_string(),
        }];

        write_episodes(&path, &episodes).unwrap();
        let loaded = load_episodes(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "مقدمة");
        assert_eq!(loaded[0].source, EpisodeType::Text);

        // The on-disk format uses the four documented keys.
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw[0];
        for key in ["content", "type", "description", "name"] {
            assert!(record.get(key).is_some(), "missing key {}", key);
        }
    }
}
