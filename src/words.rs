//! Category → word list lookup.
//!
//! The bank is built once and handed to the generator; it is never mutated
//! afterwards. Lookups for unknown categories resolve to the default
//! category, so the generator always has a non-empty list to pick from.

use crate::error::{GameError, Result};

/// Category that unknown names fall back to
pub const DEFAULT_CATEGORY: &str = "Everyday";

/// Sentinel asking the generator to pick a category from the game code
pub const RANDOM_CATEGORY: &str = "Random";

/// Immutable, ordered word table
#[derive(Debug, Clone)]
pub struct WordBank {
    categories: Vec<(String, Vec<String>)>,
    default_index: usize,
}

impl WordBank {
    /// Build a bank from `(category, words)` pairs.
    ///
    /// Categories keep their insertion order, which is the order random
    /// category selection indexes into. Empty categories are rejected, and
    /// `default_category` must be one of the entries.
    pub fn new<C, W>(entries: Vec<(C, Vec<W>)>, default_category: &str) -> Result<Self>
    where
        C: Into<String>,
        W: Into<String>,
    {
        let mut categories = Vec::with_capacity(entries.len());
        for (name, words) in entries {
            let name = name.into();
            let words: Vec<String> = words.into_iter().map(Into::into).collect();
            if words.is_empty() {
                return Err(GameError::InvalidSettings(format!(
                    "category {} has no words",
                    name
                )));
            }
            if name == RANDOM_CATEGORY {
                return Err(GameError::InvalidSettings(format!(
                    "{} is reserved",
                    RANDOM_CATEGORY
                )));
            }
            categories.push((name, words));
        }

        let default_index = categories
            .iter()
            .position(|(name, _)| name == default_category)
            .ok_or_else(|| {
                GameError::InvalidSettings(format!(
                    "default category {} is not in the bank",
                    default_category
                ))
            })?;

        Ok(Self {
            categories,
            default_index,
        })
    }

    /// Category names in table order
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|(name, _)| name == category)
    }

    pub fn default_category(&self) -> &str {
        &self.categories[self.default_index].0
    }

    /// Resolve a category name, falling back to the default category
    pub fn resolve<'a>(&'a self, category: &str) -> (&'a str, &'a [String]) {
        let (name, words) = self
            .categories
            .iter()
            .find(|(name, _)| name == category)
            .unwrap_or(&self.categories[self.default_index]);
        (name.as_str(), words.as_slice())
    }

    /// Words for `category` (default category's words if unknown)
    pub fn words(&self, category: &str) -> &[String] {
        self.resolve(category).1
    }
}

impl Default for WordBank {
    fn default() -> Self {
        let categories: Vec<(String, Vec<String>)> = DEFAULT_WORDS
            .iter()
            .map(|(name, words)| {
                (name.to_string(), words.iter().map(|w| w.to_string()).collect())
            })
            .collect();
        let default_index = categories
            .iter()
            .position(|(name, _)| name == DEFAULT_CATEGORY)
            .unwrap_or(0);
        Self {
            categories,
            default_index,
        }
    }
}

const DEFAULT_WORDS: &[(&str, &[&str])] = &[
    ("Everyday", &[
        "coffee", "umbrella", "backpack", "toothbrush", "wallet", "headphones", "keys",
        "sunglasses", "notebook", "water bottle", "pillow", "towel", "soap", "mirror", "clock",
        "candle", "scissors", "tape", "stapler", "pen", "pencil", "eraser", "ruler",
        "calculator", "calendar", "diary", "flashlight", "batteries", "charger", "remote control",
    ]),
    ("Food", &[
        "pizza", "sushi", "burrito", "lasagna", "pancakes", "curry", "sandwich", "salad", "soup",
        "pasta", "hamburger", "hot dog", "taco", "noodles", "rice", "bread", "cheese",
        "chocolate", "ice cream", "cake", "cookies", "pie", "donut", "bagel", "cereal", "yogurt",
        "banana", "apple", "orange", "strawberry", "grapes", "watermelon", "avocado", "tomato",
        "carrot",
    ]),
    ("Places", &[
        "library", "airport", "zoo", "museum", "beach", "mountain", "park", "restaurant",
        "cinema", "hospital", "school", "office", "mall", "gym", "hotel", "bank", "post office",
        "gas station", "pharmacy", "bakery", "cafe", "theater", "stadium", "playground",
        "garden", "farm", "forest", "desert", "island", "bridge", "tunnel", "castle", "church",
        "temple", "lighthouse",
    ]),
    ("Animals", &[
        "elephant", "penguin", "butterfly", "dolphin", "tiger", "rabbit", "eagle", "frog",
        "horse", "cat", "dog", "lion", "giraffe", "zebra", "monkey", "bear", "wolf", "fox",
        "deer", "owl", "parrot", "snake", "turtle", "shark", "whale", "octopus", "crab",
        "lobster", "bee", "ant", "spider", "ladybug", "dragonfly", "mouse", "hamster",
        "guinea pig", "goldfish", "chicken",
    ]),
    ("Sports", &[
        "basketball", "swimming", "tennis", "soccer", "golf", "volleyball", "cycling", "running",
        "boxing", "skiing", "baseball", "football", "hockey", "badminton", "ping pong",
        "wrestling", "gymnastics", "archery", "bowling", "surfing", "skateboarding",
        "snowboarding", "climbing", "hiking", "fishing", "sailing", "rowing", "diving",
        "karate", "judo", "yoga", "dancing",
    ]),
    ("Technology", &[
        "smartphone", "laptop", "headphones", "camera", "robot", "drone", "tablet", "keyboard",
        "mouse", "monitor", "printer", "scanner", "router", "modem", "speaker", "microphone",
        "television", "radio", "GPS", "smartwatch", "earbuds", "charger", "battery",
        "USB drive", "hard drive", "webcam", "projector", "calculator", "computer", "server",
        "satellite", "radar",
    ]),
    ("Transportation", &[
        "car", "bus", "train", "airplane", "helicopter", "boat", "ship", "bicycle", "motorcycle",
        "truck", "taxi", "subway", "tram", "ferry", "yacht", "canoe", "kayak", "skateboard",
        "scooter", "rocket", "ambulance", "fire truck", "police car", "limousine", "van",
        "pickup truck", "trailer", "jet", "glider", "balloon",
    ]),
    ("Professions", &[
        "doctor", "teacher", "chef", "pilot", "firefighter", "police officer", "nurse",
        "engineer", "lawyer", "artist", "musician", "writer", "actor", "dancer", "photographer",
        "journalist", "scientist", "programmer", "architect", "designer", "mechanic", "plumber",
        "electrician", "carpenter", "farmer", "veterinarian", "dentist", "librarian", "cashier",
        "waiter",
    ]),
    ("Clothing", &[
        "shirt", "pants", "dress", "skirt", "jacket", "coat", "sweater", "hoodie", "jeans",
        "shorts", "socks", "shoes", "boots", "sneakers", "sandals", "hat", "cap", "scarf",
        "gloves", "belt", "tie", "suit", "uniform", "pajamas", "underwear", "bra", "swimsuit",
        "raincoat", "vest", "apron",
    ]),
    ("Weather", &[
        "sunny", "cloudy", "rainy", "snowy", "windy", "stormy", "foggy", "humid", "dry", "hot",
        "cold", "warm", "cool", "freezing", "scorching", "drizzle", "downpour", "blizzard",
        "tornado", "hurricane", "lightning", "thunder", "hail", "frost", "rainbow", "mist",
        "breeze", "gale", "monsoon", "drought",
    ]),
    ("Music", &[
        "piano", "guitar", "violin", "drums", "trumpet", "saxophone", "flute", "clarinet",
        "harp", "cello", "bass", "keyboard", "microphone", "speaker", "headphones", "concert",
        "song", "melody", "rhythm", "beat", "harmony", "chord", "note", "scale", "tempo",
        "volume", "orchestra", "band", "choir", "album",
    ]),
    ("Emotions", &[
        "happy", "sad", "angry", "excited", "nervous", "calm", "surprised", "confused", "proud",
        "embarrassed", "jealous", "grateful", "worried", "relaxed", "frustrated", "content",
        "anxious", "cheerful", "disappointed", "hopeful", "scared", "brave", "shy",
        "confident", "curious", "bored", "amazed", "disgusted", "lonely", "loved",
    ]),
    ("Colors", &[
        "red", "blue", "green", "yellow", "orange", "purple", "pink", "brown", "black", "white",
        "gray", "silver", "gold", "turquoise", "navy", "maroon", "lime", "olive", "teal", "aqua",
        "fuchsia", "coral", "salmon", "beige", "tan", "cream", "ivory", "indigo", "violet",
        "magenta",
    ]),
    ("School", &[
        "classroom", "teacher", "student", "homework", "test", "exam", "grade", "book",
        "pencil", "eraser", "ruler", "calculator", "backpack", "lunch", "recess", "playground",
        "library", "computer", "projector", "whiteboard", "desk", "chair", "locker", "hallway",
        "principal", "nurse", "janitor", "bus", "uniform", "diploma",
    ]),
    ("Movies", &[
        "action", "comedy", "drama", "horror", "romance", "thriller", "adventure", "fantasy",
        "science fiction", "documentary", "animation", "musical", "western", "mystery", "crime",
        "superhero", "war", "historical", "biographical", "family", "teen", "indie", "foreign",
        "classic", "sequel", "trilogy", "franchise", "blockbuster", "award winner",
        "cult classic",
    ]),
];
