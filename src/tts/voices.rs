//! Speaker catalog for the synthesis provider.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Speaker {
    pub id: &'static str,
    pub name: &'static str,
    pub gender: Gender,
}

/// Speakers offered by the provider's `bulbul` models.
pub const SPEAKERS: &[Speaker] = &[
    Speaker { id: "anushka", name: "Anushka", gender: Gender::Female },
    Speaker { id: "manisha", name: "Manisha", gender: Gender::Female },
    Speaker { id: "vidya", name: "Vidya", gender: Gender::Female },
    Speaker { id: "arya", name: "Arya", gender: Gender::Female },
    Speaker { id: "abhilash", name: "Abhilash", gender: Gender::Male },
    Speaker { id: "karun", name: "Karun", gender: Gender::Male },
    Speaker { id: "hitesh", name: "Hitesh", gender: Gender::Male },
];

/// Case-insensitive lookup by speaker id.
pub fn find_speaker(id: &str) -> Option<&'static Speaker> {
    SPEAKERS.iter().find(|s| s.id.eq_ignore_ascii_case(id.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_speaker_case_insensitive() {
        let speaker = find_speaker("  Karun ").unwrap();
        assert_eq!(speaker.name, "Karun");
        assert_eq!(speaker.gender, Gender::Male);
    }

    #[test]
    fn test_unknown_speaker() {
        assert!(find_speaker("nobody").is_none());
    }

    #[test]
    fn test_default_speaker_is_in_catalog() {
        assert!(find_speaker(crate::defaults::SPEAKER).is_some());
    }

    #[test]
    fn test_catalog_serializes_lowercase_gender() {
        let json = serde_json::to_string(&SPEAKERS[0]).unwrap();
        assert_eq!(json, r#"{"id":"anushka","name":"Anushka","gender":"female"}"#);
    }
}
