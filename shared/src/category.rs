//! Ingredient category inference
//!
//! An ordered table of `(patterns, category)` rules evaluated top to bottom
//! against the lowercased ingredient name; the first rule with a matching
//! substring wins. Names matching nothing fall back to [`IngredientCategory::Dry`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngredientCategory {
    Beef,
    BreadAndOther,
    Caviar,
    Chicken,
    Cress,
    DairyAndEggs,
    Dry,
    Duck,
    Fish,
    Fruit,
    Herbs,
    Japanese,
    Peruvian,
    Korean,
    Balinese,
    Lamb,
    Mollusc,
    Pork,
    Shellfish,
    Spices,
    Truffle,
    Vegetable,
    OilVinegar,
}

impl IngredientCategory {
    pub const ALL: [IngredientCategory; 23] = [
        IngredientCategory::Beef,
        IngredientCategory::BreadAndOther,
        IngredientCategory::Caviar,
        IngredientCategory::Chicken,
        IngredientCategory::Cress,
        IngredientCategory::DairyAndEggs,
        IngredientCategory::Dry,
        IngredientCategory::Duck,
        IngredientCategory::Fish,
        IngredientCategory::Fruit,
        IngredientCategory::Herbs,
        IngredientCategory::Japanese,
        IngredientCategory::Peruvian,
        IngredientCategory::Korean,
        IngredientCategory::Balinese,
        IngredientCategory::Lamb,
        IngredientCategory::Mollusc,
        IngredientCategory::Pork,
        IngredientCategory::Shellfish,
        IngredientCategory::Spices,
        IngredientCategory::Truffle,
        IngredientCategory::Vegetable,
        IngredientCategory::OilVinegar,
    ];

    /// Label used on price lists and stored on ingredients
    pub fn label(&self) -> &'static str {
        match self {
            IngredientCategory::Beef => "BEEF",
            IngredientCategory::BreadAndOther => "BREAD & OTHER",
            IngredientCategory::Caviar => "CAVIAR",
            IngredientCategory::Chicken => "CHICKEN",
            IngredientCategory::Cress => "CRESS",
            IngredientCategory::DairyAndEggs => "DAIRY & EGGS",
            IngredientCategory::Dry => "DRY",
            IngredientCategory::Duck => "DUCK",
            IngredientCategory::Fish => "FISH",
            IngredientCategory::Fruit => "FRUIT",
            IngredientCategory::Herbs => "HERBS",
            IngredientCategory::Japanese => "JAPANESE",
            IngredientCategory::Peruvian => "PERUVIAN",
            IngredientCategory::Korean => "KOREAN",
            IngredientCategory::Balinese => "BALINESE",
            IngredientCategory::Lamb => "LAMB",
            IngredientCategory::Mollusc => "MOLLUSC",
            IngredientCategory::Pork => "PORK",
            IngredientCategory::Shellfish => "SHELLFISH",
            IngredientCategory::Spices => "SPICES",
            IngredientCategory::Truffle => "TRUFFLE",
            IngredientCategory::Vegetable => "VEGETABLE",
            IngredientCategory::OilVinegar => "OIL / VINEGAR",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for IngredientCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the inference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Lowercase substrings, any of which selects `category`
    pub patterns: Vec<String>,
    pub category: IngredientCategory,
}

impl CategoryRule {
    pub fn new<I, S>(patterns: I, category: IngredientCategory) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(|p| p.into().to_lowercase()).collect(),
            category,
        }
    }

    fn matches(&self, lowercase_name: &str) -> bool {
        self.patterns.iter().any(|p| lowercase_name.contains(p.as_str()))
    }
}

const DEFAULT_RULES: &[(&[&str], IngredientCategory)] = &[
    (&["beef", "wagyu", "ribeye", "tenderloin", "sirloin", "brisket", "short rib", "ox", "oxtail"], IngredientCategory::Beef),
    (&["chicken", "poultry"], IngredientCategory::Chicken),
    (&["duck"], IngredientCategory::Duck),
    (&["lamb", "mutton"], IngredientCategory::Lamb),
    (&["pork", "bacon", "pancetta", "prosciutto", "ham", "chorizo", "iberico", "sausage", "guanciale"], IngredientCategory::Pork),
    (
        &[
            "salmon", "tuna", "hamachi", "yellowtail", "sea bass", "sea bream", "snapper", "halibut", "cod", "mahi",
            "barramundi", "kingfish", "mackerel", "anchov", "sardine", "trout", "fish",
        ],
        IngredientCategory::Fish,
    ),
    (&["lobster", "crab", "shrimp", "prawn", "langoustine", "crayfish", "crawfish"], IngredientCategory::Shellfish),
    (&["mussel", "clam", "oyster", "scallop", "squid", "octopus", "calamari", "cuttlefish"], IngredientCategory::Mollusc),
    (&["caviar", "roe", "tobiko", "ikura"], IngredientCategory::Caviar),
    (&["truffle"], IngredientCategory::Truffle),
    (
        &[
            "milk", "cream", "butter", "cheese", "parmesan", "pecorino", "mascarpone", "ricotta", "mozzarella", "burrata",
            "yogurt", "creme fraiche", "sour cream", "egg", "yolk", "crème",
        ],
        IngredientCategory::DairyAndEggs,
    ),
    (
        &[
            "basil", "thyme", "rosemary", "oregano", "parsley", "cilantro", "coriander", "mint", "dill", "chive",
            "tarragon", "sage", "bay leaf", "lemongrass", "kaffir", "curry leaf", "shiso", "chervil",
        ],
        IngredientCategory::Herbs,
    ),
    (&["cress", "micro", "microgreen"], IngredientCategory::Cress),
    (
        &[
            "pepper", "cumin", "coriander seed", "turmeric", "paprika", "saffron", "cinnamon", "cardamom", "clove",
            "nutmeg", "star anise", "fennel seed", "mustard seed", "chili", "cayenne", "togarashi", "szechuan", "yukari",
            "furikake", "five spice", "garam masala", "curry powder", "sumac", "za'atar", "fleur de sel", "sea salt", "salt",
        ],
        IngredientCategory::Spices,
    ),
    (
        &[
            "miso", "dashi", "nori", "wakame", "kombu", "bonito", "sake", "mirin", "wasabi", "soy sauce", "tamari", "ponzu",
            "yuzu", "matcha", "panko", "tempura", "tofu", "edamame", "umeboshi", "shiitake", "enoki", "shimeji", "ramen",
            "udon", "soba",
        ],
        IngredientCategory::Japanese,
    ),
    (&["gochujang", "gochugaru", "kimchi", "doenjang", "ssamjang", "korean"], IngredientCategory::Korean),
    (&["aji", "amarillo", "leche de tigre", "huancaina", "rocoto", "quinoa", "chicha", "cancha", "choclo"], IngredientCategory::Peruvian),
    (
        &[
            "sambal", "kecap", "bumbu", "galangal", "candlenut", "terasi", "belacan", "tamarind", "pandan", "kemangi",
            "kaffir", "rendang", "satay", "gado", "tempeh",
        ],
        IngredientCategory::Balinese,
    ),
    (
        &["oil", "olive oil", "sesame oil", "vegetable oil", "neutral oil", "vinegar", "rice vinegar", "balsamic", "sherry vinegar"],
        IngredientCategory::OilVinegar,
    ),
    (
        &[
            "apple", "pear", "lemon", "lime", "orange", "grapefruit", "yuzu", "passion fruit", "mango", "papaya",
            "pineapple", "banana", "berry", "strawberry", "raspberry", "blueberry", "blackberry", "fig", "grape", "melon",
            "watermelon", "coconut", "pomegranate", "cherry", "peach", "apricot", "plum", "kiwi", "avocado", "tomato",
        ],
        IngredientCategory::Fruit,
    ),
    (
        &[
            "onion", "garlic", "shallot", "leek", "celery", "carrot", "potato", "sweet potato", "radish", "turnip", "beet",
            "cabbage", "lettuce", "spinach", "kale", "chard", "arugula", "rocket", "asparagus", "broccoli", "cauliflower",
            "zucchini", "courgette", "eggplant", "aubergine", "pepper", "capsicum", "cucumber", "squash", "pumpkin", "corn",
            "pea", "bean", "edamame", "sprout", "artichoke", "fennel", "bok choy", "pak choi", "daikon", "ginger",
            "galangal", "green bean", "snow pea", "snap pea", "shiitake", "mushroom", "portobello", "cremini",
            "button mushroom", "oyster mushroom", "chanterelle", "porcini", "morel",
        ],
        IngredientCategory::Vegetable,
    ),
    (
        &[
            "bread", "brioche", "baguette", "ciabatta", "focaccia", "toast", "crouton", "panko", "flour", "rice", "pasta",
            "noodle", "wonton", "gyoza", "dumpling", "tortilla", "wrap", "cracker", "chip", "crisp",
        ],
        IngredientCategory::BreadAndOther,
    ),
    (
        &[
            "sugar", "honey", "maple", "syrup", "stock", "broth", "sauce", "paste", "jam", "jelly", "preserve", "dried",
            "powder", "starch", "cornstarch", "gelatin", "agar", "yeast", "baking",
        ],
        IngredientCategory::Dry,
    ),
];

/// Ordered category rule table
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
    fallback: IngredientCategory,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES
                .iter()
                .map(|(patterns, category)| CategoryRule::new(patterns.iter().copied(), *category))
                .collect(),
            fallback: IngredientCategory::Dry,
        }
    }
}

impl CategoryRules {
    /// Empty table: everything falls back to `fallback`
    pub fn empty(fallback: IngredientCategory) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Append a rule, evaluated after all existing rules
    pub fn push(&mut self, rule: CategoryRule) {
        self.rules.push(rule);
    }

    /// Insert a rule at `index`; indexes past the end append
    pub fn insert(&mut self, index: usize, rule: CategoryRule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn infer(&self, ingredient_name: &str) -> IngredientCategory {
        let lower = ingredient_name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lower))
            .map(|rule| rule.category)
            .unwrap_or(self.fallback)
    }
}

/// Infer a category with the default table
pub fn infer_category(ingredient_name: &str) -> IngredientCategory {
    CategoryRules::default().infer(ingredient_name)
}
