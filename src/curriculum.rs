use serde::Serialize;

use crate::models::ItemStatus;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Personality {
    pub id: &'static str,
    pub name: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
}

pub const PERSONALITIES: &[Personality] = &[
    Personality {
        id: "cheerful",
        name: "Cheerful",
        subtitle: "Friendly & Warm",
        description: "Always smiling, great for beginners who need encouragement.",
    },
    Personality {
        id: "empathetic",
        name: "Empathetic",
        subtitle: "Patient & Kind",
        description: "Patient listener for stress-free practice and venting.",
    },
    Personality {
        id: "energetic",
        name: "Energetic",
        subtitle: "Fast & Fun",
        description: "Fast-paced conversation practice to boost your reflexes.",
    },
    Personality {
        id: "intellectual",
        name: "Intellectual",
        subtitle: "Smart & Deep",
        description: "Deep dives into grammar, nuance, and complex topics.",
    },
    Personality {
        id: "casual",
        name: "Casual",
        subtitle: "Relaxed & Cool",
        description: "Relaxed, slang-heavy chat for daily life scenarios.",
    },
    Personality {
        id: "calm",
        name: "Calm",
        subtitle: "Zen & Slow",
        description: "Slow, clear speech for total focus and pronunciation.",
    },
    Personality {
        id: "motivating",
        name: "Motivating",
        subtitle: "Pushy & Inspiring",
        description: "High energy coaching to push your limits.",
    },
    Personality {
        id: "creative",
        name: "Creative",
        subtitle: "Imaginative",
        description: "Imaginative roleplay and storytelling scenarios.",
    },
];

pub fn personality(id: &str) -> Option<&'static Personality> {
    PERSONALITIES.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RoadmapItem {
    pub id: &'static str,
    pub title: &'static str,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Curriculum {
    pub language: &'static str,
    pub level: &'static str,
    pub topic: &'static str,
    pub initial_message: &'static str,
    pub items: [RoadmapItem; 8],
}

const ROADMAP_IDS: [&str; 8] = [
    "greetings",
    "introductions",
    "basic-phrases",
    "numbers",
    "colors-objects",
    "food-drinks",
    "daily-routine",
    "travel",
];

// Every curriculum starts two lessons in with the third underway
const fn roadmap(titles: [&'static str; 8]) -> [RoadmapItem; 8] {
    let mut items = [RoadmapItem {
        id: "",
        title: "",
        status: ItemStatus::Locked,
    }; 8];
    let mut i = 0;
    while i < 8 {
        items[i] = RoadmapItem {
            id: ROADMAP_IDS[i],
            title: titles[i],
            status: match i {
                0 | 1 => ItemStatus::Completed,
                2 => ItemStatus::InProgress,
                _ => ItemStatus::Locked,
            },
        };
        i += 1;
    }
    items
}

pub const CURRICULA: &[Curriculum] = &[
    Curriculum {
        language: "spanish",
        level: "Level 1: Spanish Basics",
        topic: "Ordering Coffee in Spanish",
        initial_message: "Hola! ¿Cómo estás hoy? Let's practice ordering coffee.",
        items: roadmap([
            "Greetings",
            "Introductions",
            "Basic Phrases",
            "Numbers",
            "Colors & Objects",
            "Food & Drinks",
            "Daily Routine",
            "Travel",
        ]),
    },
    Curriculum {
        language: "french",
        level: "Level 1: French Basics",
        topic: "Ordering Coffee in French",
        initial_message: "Bonjour! Comment allez-vous? Let's practice ordering coffee.",
        items: roadmap([
            "Salutations",
            "Présentations",
            "Phrases de base",
            "Nombres",
            "Couleurs et Objets",
            "Nourriture et Boissons",
            "Routine Quotidienne",
            "Voyage",
        ]),
    },
    Curriculum {
        language: "german",
        level: "Level 1: German Basics",
        topic: "Ordering Coffee in German",
        initial_message: "Hallo! Wie geht es Ihnen? Let's practice ordering coffee.",
        items: roadmap([
            "Begrüßungen",
            "Vorstellungen",
            "Grundlegende Sätze",
            "Zahlen",
            "Farben & Objekte",
            "Essen & Trinken",
            "Tagesablauf",
            "Reisen",
        ]),
    },
    Curriculum {
        language: "italian",
        level: "Level 1: Italian Basics",
        topic: "Ordering Coffee in Italian",
        initial_message: "Ciao! Come stai? Let's practice ordering coffee.",
        items: roadmap([
            "Saluti",
            "Presentazioni",
            "Frasi Base",
            "Numeri",
            "Colori e Oggetti",
            "Cibo e Bevande",
            "Routine Quotidiana",
            "Viaggi",
        ]),
    },
    Curriculum {
        language: "japanese",
        level: "Level 1: Japanese Basics",
        topic: "Ordering Coffee in Japanese",
        initial_message: "Konnichiwa! Genki desu ka? Let's practice ordering coffee.",
        items: roadmap([
            "Aisatsu (Greetings)",
            "Jikoshoukai (Intros)",
            "Kihon (Basics)",
            "Suuji (Numbers)",
            "Iro to Mono",
            "Tabemono",
            "Nichijou",
            "Ryokou",
        ]),
    },
];

pub const DEFAULT_CURRICULUM: Curriculum = Curriculum {
    language: "default",
    level: "Level 1: Language Basics",
    topic: "Ordering Coffee",
    initial_message: "Hello! Ready to learn? Let's practice ordering coffee.",
    items: roadmap([
        "Greetings",
        "Introductions",
        "Basic Phrases",
        "Numbers",
        "Colors & Objects",
        "Food & Drinks",
        "Daily Routine",
        "Travel",
    ]),
};

/// Curriculum for a language name, case-insensitive, or the generic one
pub fn curriculum_for(language: &str) -> &'static Curriculum {
    let language = language.trim();
    CURRICULA
        .iter()
        .find(|c| c.language.eq_ignore_ascii_case(language))
        .unwrap_or(&DEFAULT_CURRICULUM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curriculum_lookup_is_case_insensitive() {
        assert_eq!(curriculum_for("Spanish").language, "spanish");
        assert_eq!(curriculum_for(" JAPANESE ").topic, "Ordering Coffee in Japanese");
    }

    #[test]
    fn test_unknown_language_uses_default() {
        let curriculum = curriculum_for("Klingon");
        assert_eq!(curriculum.language, "default");
        assert_eq!(curriculum.level, "Level 1: Language Basics");
    }

    #[test]
    fn test_roadmap_statuses() {
        let items = curriculum_for("french").items;
        assert_eq!(items[0].id, "greetings");
        assert_eq!(items[1].status, ItemStatus::Completed);
        assert_eq!(items[2].status, ItemStatus::InProgress);
        assert!(items[3..].iter().all(|i| i.status == ItemStatus::Locked));
        assert_eq!(items[7].title, "Voyage");
    }

    #[test]
    fn test_personality_lookup() {
        assert_eq!(PERSONALITIES.len(), 8);
        assert_eq!(personality("calm").unwrap().subtitle, "Zen & Slow");
        assert!(personality("grumpy").is_none());
    }
}
