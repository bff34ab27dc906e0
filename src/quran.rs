//! Verse lookup against an external reference provider.
//!
//! A query is resolved by the first strategy that recognises it:
//! an explicit `surah:ayah` reference, a bare surah number (opening verses),
//! or a well-known nickname such as "ayat kursi".
use std::{sync::Arc, sync::OnceLock, time::Duration};

use async_trait::async_trait;
use html_escape::encode_text;
use log::{debug, info, trace, warn};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{ChapterInfo, Config, NotesError, Result, SurahRef, Verse};

/// Nicknames of frequently quoted verses: (alias, surah, ayah)
const VERSE_ALIASES: &[(&str, u32, u32)] = &[
    ("kursi", 2, 255),
    ("ayat kursi", 2, 255),
    ("fatiha", 1, 1),
    ("al-fatiha", 1, 1),
    ("ikhlas", 112, 1),
    ("al-ikhlas", 112, 1),
    ("falaq", 113, 1),
    ("al-falaq", 113, 1),
    ("nas", 114, 1),
    ("an-nas", 114, 1),
    ("light", 24, 35),
    ("nur", 24, 35),
    ("throne", 2, 255),
    ("bismillah", 1, 1),
    ("rahman", 55, 1),
    ("ar-rahman", 55, 1),
];

/// Source of verse text and chapter metadata
#[async_trait]
pub trait VerseProvider: Send + Sync {
    /// Fetches one verse with its translation.
    ///
    /// `Ok(None)` means the provider answered but has no such verse; `Err` is
    /// reserved for the provider being unreachable or answering nonsense.
    async fn fetch_verse(&self, surah: u32, ayah: u32) -> Result<Option<Verse>>;

    async fn list_chapters(&self) -> Result<Vec<ChapterInfo>>;
}

/// What a free-text verse query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerseQuery {
    /// One explicit `surah:ayah` reference
    Reference { surah: u32, ayah: u32 },
    /// The opening verses of a surah
    Surah(u32),
    /// A known nickname, already mapped to its reference
    Alias { surah: u32, ayah: u32 },
}

fn reference_regex() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| Regex::new(r"(\d+):(\d+)").expect("static regex is valid"))
}

fn surah_regex() -> &'static Regex {
    static SURAH: OnceLock<Regex> = OnceLock::new();
    SURAH.get_or_init(|| Regex::new(r"^(\d+)$").expect("static regex is valid"))
}

/// Works out which lookup strategy applies; `None` if none does.
pub fn parse_query(query: &str) -> Option<VerseQuery> {
    let query = query.trim();

    if let Some(caps) = reference_regex().captures(query) {
        // numbers too large for u32 cannot name a verse
        let surah = caps[1].parse().ok()?;
        let ayah = caps[2].parse().ok()?;
        return Some(VerseQuery::Reference { surah, ayah });
    }

    if let Some(caps) = surah_regex().captures(query) {
        return caps[1].parse().ok().map(VerseQuery::Surah);
    }

    let lowered = query.to_lowercase();
    VERSE_ALIASES
        .iter()
        .find(|(alias, _, _)| *alias == lowered)
        .map(|&(_, surah, ayah)| VerseQuery::Alias { surah, ayah })
}

/// Resolves free-text queries into verses through a [`VerseProvider`].
pub struct VerseResolver {
    provider: Arc<dyn VerseProvider>,
    preview_count: u32,
}

impl VerseResolver {
    pub fn new(provider: Arc<dyn VerseProvider>, preview_count: u32) -> Self {
        Self {
            provider,
            preview_count,
        }
    }

    /// Resolves `query`, collapsing provider failures into an empty result.
    pub async fn search(&self, query: &str) -> Vec<Verse> {
        match self.try_search(query).await {
            Ok(verses) => verses,
            Err(e) => {
                warn!("Verse lookup for {:?} failed, returning nothing: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Like [`search`](Self::search), but lets the caller tell an unreachable
    /// provider apart from a query with no matches.
    pub async fn try_search(&self, query: &str) -> Result<Vec<Verse>> {
        let Some(parsed) = parse_query(query) else {
            debug!("Verse query {:?} matched no strategy", query);
            return Ok(Vec::new());
        };
        debug!("Verse query {:?} resolved to {:?}", query, parsed);

        match parsed {
            VerseQuery::Reference { surah, ayah } | VerseQuery::Alias { surah, ayah } => {
                Ok(self.provider.fetch_verse(surah, ayah).await?.into_iter().collect())
            }
            VerseQuery::Surah(surah) => self.opening_verses(surah).await,
        }
    }

    // One request at a time; the first missing verse ends the run
    async fn opening_verses(&self, surah: u32) -> Result<Vec<Verse>> {
        let mut verses = Vec::new();
        for ayah in 1..=self.preview_count {
            match self.provider.fetch_verse(surah, ayah).await? {
                Some(verse) => verses.push(verse),
                None => {
                    trace!("Surah {} has no verse {}, stopping", surah, ayah);
                    break;
                }
            }
        }
        Ok(verses)
    }

    /// Chapter listing, empty if the provider is unavailable
    pub async fn list_chapters(&self) -> Vec<ChapterInfo> {
        self.provider.list_chapters().await.unwrap_or_else(|e| {
            warn!("Failed to list chapters: {}", e);
            Vec::new()
        })
    }
}

/// `"Al-Baqara 2:255"`
pub fn format_reference(verse: &Verse) -> String {
    format!(
        "{} {}:{}",
        verse.surah.english_name, verse.surah.number, verse.number_in_surah
    )
}

/// Renders a verse as a quotation block ready to be inserted into a note
pub fn format_for_insertion(verse: &Verse) -> String {
    format!(
        concat!(
            "<div style=\"background: #f8fafc; border-left: 4px solid #16a34a; padding: 16px; margin: 16px 0; border-radius: 8px;\">\n",
            "  <h4 style=\"color: #16a34a; margin: 0 0 12px 0; font-weight: 600;\">{reference}</h4>\n",
            "  <p style=\"text-align: right; font-size: 18px; line-height: 1.8; margin: 0 0 12px 0; font-family: 'Amiri', serif;\">{text}</p>\n",
            "  <p style=\"font-style: italic; color: #64748b; margin: 0;\">\"{translation}\"</p>\n",
            "</div>"
        ),
        reference = encode_text(&format_reference(verse)),
        text = encode_text(&verse.text),
        translation = encode_text(&verse.translation),
    )
}

/// Envelope of every alquran.cloud response
#[derive(Debug, Deserialize)]
struct Envelope {
    code: u16,
    #[serde(default)]
    data: Value,
}

/// One edition of a verse as returned by the provider
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AyahEdition {
    number: u32,
    text: String,
    surah: ApiSurah,
    number_in_surah: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSurah {
    number: u32,
    name: String,
    english_name: String,
}

/// HTTP client for the alquran.cloud API
pub struct AlQuranCloud {
    client: Client,
    base_url: String,
    original_edition: String,
    translation_edition: String,
}

impl AlQuranCloud {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NotesError::provider(format!("cannot build HTTP client: {}", e)))?;

        info!("Verse provider at {}", config.provider_base_url);
        Ok(Self {
            client,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            original_edition: config.original_edition.clone(),
            translation_edition: config.translation_edition.clone(),
        })
    }

    /// Fetches `path` and returns the `data` member of a successful envelope.
    /// Client errors and non-200 envelopes are "nothing there".
    async fn get_data(&self, path: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        trace!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.is_client_error() {
            debug!("Provider answered {} for {}", status, url);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(NotesError::provider(format!("{} answered {}", url, status)));
        }

        let envelope: Envelope = response.json().await?;
        if envelope.code != 200 {
            debug!("Provider envelope code {} for {}", envelope.code, url);
            return Ok(None);
        }
        Ok(Some(envelope.data))
    }
}

#[async_trait]
impl VerseProvider for AlQuranCloud {
    async fn fetch_verse(&self, surah: u32, ayah: u32) -> Result<Option<Verse>> {
        let path = format!(
            "/ayah/{}:{}/editions/{},{}",
            surah, ayah, self.original_edition, self.translation_edition
        );
        let Some(data) = self.get_data(&path).await? else {
            return Ok(None);
        };

        let editions: Vec<AyahEdition> = serde_json::from_value(data)
            .map_err(|e| NotesError::provider(format!("unexpected verse payload: {}", e)))?;

        let mut editions = editions.into_iter();
        let (Some(original), Some(translation)) = (editions.next(), editions.next()) else {
            debug!("Verse {}:{} came back with fewer than two editions", surah, ayah);
            return Ok(None);
        };

        Ok(Some(Verse {
            number: original.number,
            text: original.text,
            translation: translation.text,
            surah: SurahRef {
                number: original.surah.number,
                name: original.surah.name,
                english_name: original.surah.english_name,
            },
            number_in_surah: original.number_in_surah,
        }))
    }

    async fn list_chapters(&self) -> Result<Vec<ChapterInfo>> {
        let Some(data) = self.get_data("/surah").await? else {
            return Ok(Vec::new());
        };
        serde_json::from_value(data)
            .map_err(|e| NotesError::provider(format!("unexpected surah payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    /// Serves a fixed set of verses and records every fetch
    #[derive(Default)]
    struct FakeProvider {
        verses: HashMap<(u32, u32), Verse>,
        calls: Mutex<Vec<(u32, u32)>>,
        down: bool,
    }

    impl FakeProvider {
        fn with_surah(surah: u32, count: u32) -> Self {
            let verses = (1..=count)
                .map(|ayah| ((surah, ayah), verse(surah, ayah)))
                .collect();
            Self {
                verses,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VerseProvider for FakeProvider {
        async fn fetch_verse(&self, surah: u32, ayah: u32) -> Result<Option<Verse>> {
            self.calls.lock().unwrap().push((surah, ayah));
            if self.down {
                return Err(NotesError::provider("connection refused"));
            }
            Ok(self.verses.get(&(surah, ayah)).cloned())
        }

        async fn list_chapters(&self) -> Result<Vec<ChapterInfo>> {
            if self.down {
                return Err(NotesError::provider("connection refused"));
            }
            Ok(Vec::new())
        }
    }

    fn verse(surah: u32, ayah: u32) -> Verse {
        Verse {
            number: surah * 1000 + ayah,
            text: format!("نص {surah}:{ayah}"),
            translation: format!("translation of {surah}:{ayah}"),
            surah: SurahRef {
                number: surah,
                name: "سُورَةُ البَقَرَةِ".to_string(),
                english_name: "Al-Baqara".to_string(),
            },
            number_in_surah: ayah,
        }
    }

    #[test]
    fn test_parse_query_strategies() {
        assert_eq!(parse_query("2:255"), Some(VerseQuery::Reference { surah: 2, ayah: 255 }));
        assert_eq!(
            parse_query("see 18:10 tonight"),
            Some(VerseQuery::Reference { surah: 18, ayah: 10 })
        );
        assert_eq!(parse_query(" 36 "), Some(VerseQuery::Surah(36)));
        assert_eq!(parse_query("Ayat Kursi"), Some(VerseQuery::Alias { surah: 2, ayah: 255 }));
        assert_eq!(parse_query("  NUR "), Some(VerseQuery::Alias { surah: 24, ayah: 35 }));
        assert_eq!(parse_query("kursi verse"), None);
        assert_eq!(parse_query("36a"), None);
        assert_eq!(parse_query("99999999999:1"), None);
    }

    #[tokio::test]
    async fn test_reference_issues_exactly_one_fetch() {
        let provider = Arc::new(FakeProvider::with_surah(2, 255));
        let resolver = VerseResolver::new(provider.clone(), 5);

        let verses = resolver.search("2:255").await;
        assert_eq!(verses, vec![verse(2, 255)]);
        assert_eq!(provider.calls(), vec![(2, 255)]);
    }

    #[tokio::test]
    async fn test_surah_fetches_opening_verses_in_order() {
        let provider = Arc::new(FakeProvider::with_surah(2, 286));
        let resolver = VerseResolver::new(provider.clone(), 5);

        let verses = resolver.search("2").await;
        assert_eq!(verses.len(), 5);
        assert_eq!(provider.calls(), vec![(2, 1), (2, 2), (2, 3), (2, 4), (2, 5)]);
    }

    #[tokio::test]
    async fn test_surah_fetch_stops_at_first_missing_verse() {
        let provider = Arc::new(FakeProvider::with_surah(108, 3));
        let resolver = VerseResolver::new(provider.clone(), 5);

        let verses = resolver.search("108").await;
        assert_eq!(verses, vec![verse(108, 1), verse(108, 2), verse(108, 3)]);
        assert_eq!(provider.calls(), vec![(108, 1), (108, 2), (108, 3), (108, 4)]);
    }

    #[tokio::test]
    async fn test_alias_lookup() {
        let provider = Arc::new(FakeProvider::with_surah(2, 286));
        let resolver = VerseResolver::new(provider.clone(), 5);

        assert_eq!(resolver.search("Throne").await, vec![verse(2, 255)]);
        assert!(resolver.search("patience").await.is_empty());
        assert_eq!(provider.calls(), vec![(2, 255)]);
    }

    #[tokio::test]
    async fn test_provider_failure_collapses_to_empty() {
        let provider = Arc::new(FakeProvider {
            down: true,
            ..Default::default()
        });
        let resolver = VerseResolver::new(provider.clone(), 5);

        assert!(resolver.search("2:255").await.is_empty());
        assert!(resolver.search("2").await.is_empty());
        assert!(resolver.list_chapters().await.is_empty());
        assert!(matches!(
            resolver.try_search("2:255").await,
            Err(NotesError::ProviderUnavailable { .. })
        ));
        // a query no strategy recognises never reaches the provider
        assert!(resolver.try_search("hello").await.unwrap().is_empty());
    }

    #[test]
    fn test_formatting() {
        let v = verse(2, 255);
        assert_eq!(format_reference(&v), "Al-Baqara 2:255");

        let markup = format_for_insertion(&v);
        assert_eq!(markup, format_for_insertion(&v));
        assert!(markup.contains(">Al-Baqara 2:255</h4>"));
        assert!(markup.contains("text-align: right"));
        assert!(markup.contains("\"translation of 2:255\""));
    }

    fn cloud(server: &MockServer) -> AlQuranCloud {
        let config = Config {
            provider_base_url: format!("{}/", server.uri()),
            ..Config::default()
        };
        AlQuranCloud::new(&config).unwrap()
    }

    fn edition_json(text: &str) -> Value {
        json!({
            "number": 262,
            "text": text,
            "surah": {
                "number": 2,
                "name": "سُورَةُ البَقَرَةِ",
                "englishName": "Al-Baqara",
                "englishNameTranslation": "The Cow",
                "numberOfAyahs": 286,
                "revelationType": "Medinan"
            },
            "numberInSurah": 255,
            "juz": 3
        })
    }

    #[tokio::test]
    async fn test_cloud_fetch_verse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ayah/2:255/editions/quran-uthmani,en.asad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "status": "OK",
                "data": [edition_json("ٱللَّهُ لَآ إِلَٰهَ إِلَّا هُوَ"), edition_json("GOD - there is no deity save Him")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verse = cloud(&server).fetch_verse(2, 255).await.unwrap().unwrap();
        assert_eq!(verse.number, 262);
        assert_eq!(verse.number_in_surah, 255);
        assert_eq!(verse.surah.english_name, "Al-Baqara");
        assert_eq!(verse.translation, "GOD - there is no deity save Him");
        assert!(verse.text.starts_with("ٱللَّهُ"));
    }

    #[tokio::test]
    async fn test_cloud_missing_verse_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "status": "Not Found",
                "data": "Please specify an Ayah number (1 to 6236)."
            })))
            .mount(&server)
            .await;

        assert_eq!(cloud(&server).fetch_verse(2, 999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cloud_single_edition_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": [edition_json("only one")]
            })))
            .mount(&server)
            .await;

        assert_eq!(cloud(&server).fetch_verse(2, 255).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cloud_server_error_is_provider_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = cloud(&server).fetch_verse(1, 1).await.unwrap_err();
        assert!(matches!(err, NotesError::ProviderUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_cloud_list_chapters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/surah"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": [{
                    "number": 1,
                    "name": "سُورَةُ ٱلْفَاتِحَةِ",
                    "englishName": "Al-Faatiha",
                    "englishNameTranslation": "The Opening",
                    "numberOfAyahs": 7,
                    "revelationType": "Meccan"
                }]
            })))
            .mount(&server)
            .await;

        let chapters = cloud(&server).list_chapters().await.unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].english_name, "Al-Faatiha");
        assert_eq!(chapters[0].number_of_ayahs, 7);
    }
}
