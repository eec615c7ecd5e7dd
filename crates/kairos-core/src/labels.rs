//! Thematic label tables
//!
//! Pure lookups; out-of-range input clamps to the nearest valid entry.

/// Day of the 6-day week
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Weekday {
    Solhara,
    Aquaris,
    Flamora,
    Verdari,
    Sonari,
    Kaelith,
}

impl Weekday {
    pub const ALL: [Weekday; 6] = [
        Weekday::Solhara,
        Weekday::Aquaris,
        Weekday::Flamora,
        Weekday::Verdari,
        Weekday::Sonari,
        Weekday::Kaelith,
    ];

    pub fn from_index(index: i64) -> Self {
        Self::ALL[index.clamp(0, 5) as usize]
    }

    /// Parse a weekday name, ignoring case and non-letters ("Caelith" is accepted)
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match key.as_str() {
            "solhara" => Some(Weekday::Solhara),
            "aquaris" => Some(Weekday::Aquaris),
            "flamora" => Some(Weekday::Flamora),
            "verdari" => Some(Weekday::Verdari),
            "sonari" => Some(Weekday::Sonari),
            "kaelith" | "caelith" => Some(Weekday::Kaelith),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Solhara => "Solhara",
            Weekday::Aquaris => "Aquaris",
            Weekday::Flamora => "Flamora",
            Weekday::Verdari => "Verdari",
            Weekday::Sonari => "Sonari",
            Weekday::Kaelith => "Kaelith",
        }
    }

    pub fn chakra(self) -> Chakra {
        match self {
            Weekday::Solhara => Chakra::Root,
            Weekday::Aquaris => Chakra::Sacral,
            Weekday::Flamora => Chakra::SolarPlexus,
            Weekday::Verdari => Chakra::Heart,
            Weekday::Sonari => Chakra::Throat,
            Weekday::Kaelith => Chakra::Crown,
        }
    }
}

/// Group of six consecutive beats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ark {
    Ignite,
    Integrate,
    Harmonize,
    Reflekt,
    Purifikation,
    Dream,
}

impl Ark {
    pub const ALL: [Ark; 6] = [
        Ark::Ignite,
        Ark::Integrate,
        Ark::Harmonize,
        Ark::Reflekt,
        Ark::Purifikation,
        Ark::Dream,
    ];

    /// Ark containing `beat`; beats outside 0..=35 clamp to the end arks
    pub fn from_beat(beat: i64) -> Self {
        Self::ALL[(beat.clamp(0, 35) / 6) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Ark::Ignite => "Ignite",
            Ark::Integrate => "Integrate",
            Ark::Harmonize => "Harmonize",
            Ark::Reflekt => "Reflekt",
            Ark::Purifikation => "Purifikation",
            Ark::Dream => "Dream",
        }
    }

    pub fn chakra(self) -> Chakra {
        match self {
            Ark::Ignite => Chakra::Root,
            Ark::Integrate => Chakra::Sacral,
            Ark::Harmonize => Chakra::SolarPlexus,
            Ark::Reflekt => Chakra::Heart,
            Ark::Purifikation => Chakra::Throat,
            Ark::Dream => Chakra::ThirdEye,
        }
    }
}

pub const MONTH_NAMES: [&str; 8] = [
    "Aethon", "Virelai", "Solari", "Amarin", "Kaelus", "Umbriel", "Noktura", "Liora",
];

/// Name of a 1-based month, clamped into 1..=8
pub fn month_name(month: i64) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 8) - 1) as usize]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Chakra {
    Root,
    Sacral,
    SolarPlexus,
    Heart,
    Throat,
    ThirdEye,
    Crown,
}

impl Chakra {
    pub const SEQUENCE: [Chakra; 7] = [
        Chakra::Root,
        Chakra::Sacral,
        Chakra::SolarPlexus,
        Chakra::Heart,
        Chakra::Throat,
        Chakra::ThirdEye,
        Chakra::Crown,
    ];

    /// Display label; Crown is spelled "Krown"
    pub fn label(self) -> &'static str {
        match self {
            Chakra::Root => "Root",
            Chakra::Sacral => "Sacral",
            Chakra::SolarPlexus => "Solar Plexus",
            Chakra::Heart => "Heart",
            Chakra::Throat => "Throat",
            Chakra::ThirdEye => "Third Eye",
            Chakra::Crown => "Krown",
        }
    }

    /// Chakra for a 1-based day of month, in bands of six days
    pub fn from_day_of_month(day: i64) -> Self {
        let idx = ((day.max(1) - 1) / 6).clamp(0, 6);
        Self::SEQUENCE[idx as usize]
    }

    /// Chakra for a 1-based month, cycling through the seven
    pub fn from_month(month: i64) -> Self {
        Self::SEQUENCE[(month.max(1) - 1).rem_euclid(7) as usize]
    }
}
