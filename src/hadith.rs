//! Search over the bundled hadith collection.
//!
//! The corpus is small and fixed, so searching is a linear scan with
//! substring matching. Results keep corpus order; there is no ranking.
use html_escape::encode_text;
use log::debug;

use crate::Hadith;

/// Topic names mapped to keywords that should find the same records.
/// The canonical name is always the first keyword.
const TOPICS: &[(&str, &[&str])] = &[
    ("intention", &["intention", "نية"]),
    ("prayer", &["prayer", "صلاة", "fajr", "الفجر"]),
    ("faith", &["faith", "believe", "إيمان"]),
    ("manners", &["manners", "speak", "mercy", "أخلاق"]),
    ("cleanliness", &["cleanliness", "clean", "purification", "طهور"]),
    ("brotherhood", &["brotherhood", "brother", "love", "أخ"]),
    ("advice", &["advice", "نصيحة"]),
    ("muslim", &["muslim", "مسلم"]),
    ("protection", &["protection", "ذمة"]),
];

/// Quick searches offered to the user: (label, query)
pub const POPULAR_SEARCHES: &[(&str, &str)] = &[
    ("Intention", "intention"),
    ("Prayer", "prayer"),
    ("Faith", "faith"),
    ("Manners", "manners"),
    ("Mercy", "mercy"),
    ("Brotherhood", "brother"),
];

// (id, text, translation, book, chapter, narrator, grade)
const CORPUS: &[(&str, &str, &str, &str, &str, &str, &str)] = &[
    (
        "1",
        "إِنَّمَا الأَعْمَالُ بِالنِّيَّاتِ، وَإِنَّمَا لِكُلِّ امْرِئٍ مَا نَوَى",
        "Actions are but by intention, and every man shall have only that which he intended",
        "Sahih Bukhari",
        "Revelation",
        "Umar ibn al-Khattab",
        "Sahih",
    ),
    (
        "2",
        "مَنْ كَانَ يُؤْمِنُ بِاللَّهِ وَالْيَوْمِ الآخِرِ فَلْيَقُلْ خَيْرًا أَوْ لِيَصْمُتْ",
        "Whoever believes in Allah and the Last Day should speak good or remain silent",
        "Sahih Bukhari",
        "Manners",
        "Abu Hurairah",
        "Sahih",
    ),
    (
        "3",
        "الدِّينُ النَّصِيحَةُ",
        "Religion is sincere advice",
        "Sahih Muslim",
        "Faith",
        "Tamim ad-Dari",
        "Sahih",
    ),
    (
        "4",
        "مَنْ لَمْ يَرْحَمِ النَّاسَ لَمْ يَرْحَمْهُ اللَّهُ",
        "He who does not show mercy to people, Allah will not show mercy to him",
        "Sahih Bukhari",
        "Manners",
        "Jarir ibn Abdullah",
        "Sahih",
    ),
    (
        "5",
        "الْمُسْلِمُ مَنْ سَلِمَ الْمُسْلِمُونَ مِنْ لِسَانِهِ وَيَدِهِ",
        "A Muslim is one from whose tongue and hand the Muslims are safe",
        "Sahih Bukhari",
        "Faith",
        "Abdullah ibn Amr",
        "Sahih",
    ),
    (
        "6",
        "لَا يُؤْمِنُ أَحَدُكُمْ حَتَّى يُحِبَّ لِأَخِيهِ مَا يُحِبُّ لِنَفْسِهِ",
        "None of you believes until he loves for his brother what he loves for himself",
        "Sahih Bukhari",
        "Faith",
        "Anas ibn Malik",
        "Sahih",
    ),
    (
        "7",
        "مَنْ صَلَّى الْفَجْرَ فَهُوَ فِي ذِمَّةِ اللَّهِ",
        "Whoever prays Fajr is under Allah's protection",
        "Sahih Muslim",
        "Prayer",
        "Jundub ibn Abdullah",
        "Sahih",
    ),
    (
        "8",
        "الطَّهُورُ شَطْرُ الإِيمَانِ",
        "Cleanliness is half of faith",
        "Sahih Muslim",
        "Purification",
        "Abu Malik al-Ashari",
        "Sahih",
    ),
];

/// Lookup service over the bundled collection
pub struct HadithService {
    corpus: Vec<Hadith>,
}

impl Default for HadithService {
    fn default() -> Self {
        Self::new()
    }
}

impl HadithService {
    pub fn new() -> Self {
        let corpus = CORPUS
            .iter()
            .map(|&(id, text, translation, book, chapter, narrator, grade)| Hadith {
                id: id.to_string(),
                text: text.to_string(),
                translation: translation.to_string(),
                book: book.to_string(),
                chapter: chapter.to_string(),
                narrator: narrator.to_string(),
                grade: grade.to_string(),
            })
            .collect();
        Self { corpus }
    }

    pub fn all(&self) -> &[Hadith] {
        &self.corpus
    }

    pub fn get(&self, id: &str) -> Option<&Hadith> {
        self.corpus.iter().find(|h| h.id == id)
    }

    /// Records matching `query`, in corpus order. Empty when nothing
    /// matches or the query is blank.
    ///
    /// A query naming a topic, or one of the topic's keywords, is widened to
    /// every keyword of that topic.
    pub fn search(&self, query: &str) -> Vec<Hadith> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let terms = expand_topic(query);
        let results: Vec<Hadith> = self
            .corpus
            .iter()
            .filter(|hadith| terms.iter().any(|term| matches_term(hadith, term)))
            .cloned()
            .collect();

        debug!(
            "Hadith search {:?} ({} terms) matched {} records",
            query,
            terms.len(),
            results.len()
        );
        results
    }
}

fn expand_topic(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    TOPICS
        .iter()
        .find(|(topic, keywords)| *topic == lowered || keywords.contains(&lowered.as_str()))
        .map(|(_, keywords)| keywords.iter().map(|k| k.to_string()).collect())
        .unwrap_or_else(|| vec![query.to_string()])
}

// Translated and metadata fields fold case; the original script is matched as is
fn matches_term(hadith: &Hadith, term: &str) -> bool {
    let lowered = term.to_lowercase();
    hadith.text.contains(term)
        || [&hadith.translation, &hadith.book, &hadith.chapter, &hadith.narrator]
            .iter()
            .any(|field| field.to_lowercase().contains(&lowered))
}

/// Renders a hadith as a quotation block ready to be inserted into a note
pub fn format_for_insertion(hadith: &Hadith) -> String {
    format!(
        concat!(
            "<div style=\"background: #fef3c7; border-left: 4px solid #d97706; padding: 16px; margin: 16px 0; border-radius: 8px;\">\n",
            "  <h4 style=\"color: #d97706; margin: 0 0 12px 0; font-weight: 600;\">{book} - {chapter}</h4>\n",
            "  <p style=\"text-align: right; font-size: 18px; line-height: 1.8; margin: 0 0 12px 0; font-family: 'Amiri', serif;\">{text}</p>\n",
            "  <p style=\"font-style: italic; color: #64748b; margin: 0 0 8px 0;\">\"{translation}\"</p>\n",
            "  <p style=\"font-size: 14px; color: #6b7280; margin: 0;\"><strong>Narrator:</strong> {narrator} | <strong>Grade:</strong> {grade}</p>\n",
            "</div>"
        ),
        book = encode_text(&hadith.book),
        chapter = encode_text(&hadith.chapter),
        text = encode_text(&hadith.text),
        translation = encode_text(&hadith.translation),
        narrator = encode_text(&hadith.narrator),
        grade = encode_text(&hadith.grade),
    )
}
