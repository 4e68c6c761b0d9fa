//! Canonical site record and the normalization applied once at the ingestion
//! boundary. Everything downstream of [`normalize_record`] works with typed
//! fields and never re-checks the loose source shape.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continent {
    Asia,
    Europe,
    Africa,
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "South America")]
    SouthAmerica,
    Oceania,
}

impl Continent {
    pub const ALL: [Continent; 6] = [
        Continent::Asia,
        Continent::Europe,
        Continent::Africa,
        Continent::NorthAmerica,
        Continent::SouthAmerica,
        Continent::Oceania,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::Asia => "Asia",
            Continent::Europe => "Europe",
            Continent::Africa => "Africa",
            Continent::NorthAmerica => "North America",
            Continent::SouthAmerica => "South America",
            Continent::Oceania => "Oceania",
        }
    }

    /// Case-insensitive match against the display names.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of indexing. `raw` is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub description: String,
    pub country: Option<String>,
    pub continent: Option<Continent>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub raw: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_continent(mut self, continent: Continent) -> Self {
        self.continent = Some(continent);
        self
    }
}

const ID_KEYS: &[&str] = &["id", "site_id", "ref", "whc_id"];
const NAME_KEYS: &[&str] = &["name", "name_en", "title", "site_name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "short_description", "summary", "desc"];
const COUNTRY_KEYS: &[&str] = &["state", "states", "country", "country_en"];
const LIST_KEYS: &[&str] = &["sites", "rows", "data", "results", "features"];

fn first_field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_f64(v: Option<&Value>) -> Result<Option<f64>, ()> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or(()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| ()),
        Some(_) => Err(()),
    }
}

fn country_field(raw: &Value) -> String {
    match first_field(raw, COUNTRY_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.get("name") {
                Some(name) if item.is_object() => value_to_string(name),
                _ => value_to_string(item),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(v) => value_to_string(v),
        None => String::new(),
    }
}

/// Turn one loose source record into a [`Document`]. Missing text fields
/// become empty strings; a missing id falls back to the record's position.
pub fn normalize_record(raw: &Value, position: usize) -> Document {
    let id = first_field(raw, ID_KEYS)
        .map(value_to_string)
        .unwrap_or_else(|| position.to_string());
    let name = first_field(raw, NAME_KEYS).map(value_to_string).unwrap_or_default();
    let description = first_field(raw, DESCRIPTION_KEYS)
        .map(value_to_string)
        .unwrap_or_default();

    let country = country_field(raw).trim().to_string();
    let country = (!country.is_empty()).then_some(country);

    let lat = value_to_f64(first_field(raw, &["latitude", "lat"]));
    let lon = value_to_f64(first_field(raw, &["longitude", "lon", "lng"]));
    let (latitude, longitude) = match (lat, lon) {
        (Ok(lat), Ok(lon)) => (lat, lon),
        _ => (None, None),
    };

    let continent = first_field(raw, &["continent", "region"])
        .and_then(Value::as_str)
        .and_then(Continent::from_name)
        .or_else(|| country.as_deref().and_then(country_to_continent));

    Document {
        id,
        name,
        description,
        country,
        continent,
        latitude,
        longitude,
        raw: raw.clone(),
    }
}

/// Locate the list of records inside a fetched or loaded JSON payload.
pub fn extract_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            for key in LIST_KEYS {
                if matches!(obj.get(*key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = obj.remove(*key) {
                        return items;
                    }
                }
            }
            if let Some(key) = obj
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone())
            {
                if let Some(Value::Array(items)) = obj.remove(&key) {
                    return items;
                }
            }
            vec![Value::Object(obj)]
        }
        _ => Vec::new(),
    }
}

const DOCUMENT_KEYS: &[&str] = &[
    "id", "name", "description", "country", "continent", "latitude", "longitude", "raw",
];

impl Document {
    /// Read a record that is already in canonical form, as written to
    /// `sites.json` by the fetcher or a rebuild. Such records carry an `id`
    /// and a `raw` payload and nothing else outside the canonical fields.
    pub fn from_canonical(value: &Value) -> Option<Document> {
        let obj = value.as_object()?;
        if !obj.contains_key("id") || !obj.contains_key("raw") {
            return None;
        }
        if obj.keys().any(|k| !DOCUMENT_KEYS.contains(&k.as_str())) {
            return None;
        }
        if !obj.get("id").is_some_and(Value::is_string) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// Canonical records pass through untouched; anything else is normalized.
pub fn document_from_value(raw: &Value, position: usize) -> Document {
    Document::from_canonical(raw).unwrap_or_else(|| normalize_record(raw, position))
}

/// Extract every record of a JSON payload, in input order.
pub fn documents_from_json(value: Value) -> Vec<Document> {
    extract_records(value)
        .iter()
        .enumerate()
        .map(|(i, raw)| document_from_value(raw, i))
        .collect()
}

lazy_static! {
    static ref PARENTHETICAL: Regex = Regex::new(r"\(.*?\)").expect("valid regex");
    static ref STATE_PARTY_LABEL: Regex = Regex::new(r"(?i)State Party[:\s]*").expect("valid regex");
    static ref COUNTRY_LABEL: Regex = Regex::new(r"(?i)Country[:\s]*").expect("valid regex");
    // a continent word only counts once the gate matches
    static ref CONTINENT_GATE: Regex =
        Regex::new(r"(?i)\b(asia|european|africa|americ|oceania|pacific)\b").expect("valid regex");
    static ref CONTINENT_WORD: Regex =
        Regex::new(r"(?i)\b(asia|africa|europe|oceania|pacific|america|americas)\b").expect("valid regex");
}

/// Clean a scraped "State Party" value down to a single concise country name.
pub fn normalize_country(s: &str) -> String {
    let s = PARENTHETICAL.replace_all(s, "");
    let s = STATE_PARTY_LABEL.replace_all(&s, "");
    let s = COUNTRY_LABEL.replace_all(&s, "");
    let mut s = s.trim().to_string();
    if let Some((first, _)) = s.split_once(';') {
        s = first.trim().to_string();
    }
    if let Some((first, _)) = s.split_once(',') {
        if first.chars().count() > 1 {
            s = first.trim().to_string();
        }
    }
    if s.chars().count() > 120 {
        let clamped: String = s.chars().take(120).collect();
        s = match clamped.rsplit_once(' ') {
            Some((head, _)) => head.to_string(),
            None => clamped,
        };
    }
    s
}

const COUNTRY_CONTINENT: &[(&str, Continent)] = &[
    ("China", Continent::Asia),
    ("India", Continent::Asia),
    ("Cambodia", Continent::Asia),
    ("Japan", Continent::Asia),
    ("Republic of Korea", Continent::Asia),
    ("Korea, Republic of", Continent::Asia),
    ("Korea", Continent::Asia),
    ("Nepal", Continent::Asia),
    ("Thailand", Continent::Asia),
    ("Malaysia", Continent::Asia),
    ("Indonesia", Continent::Asia),
    ("Vietnam", Continent::Asia),
    ("Pakistan", Continent::Asia),
    ("Sri Lanka", Continent::Asia),
    ("Bangladesh", Continent::Asia),
    ("Myanmar", Continent::Asia),
    ("Philippines", Continent::Asia),
    ("France", Continent::Europe),
    ("Germany", Continent::Europe),
    ("United Kingdom", Continent::Europe),
    ("Italy", Continent::Europe),
    ("Spain", Continent::Europe),
    ("Poland", Continent::Europe),
    ("Russian Federation", Continent::Europe),
    ("Ukraine", Continent::Europe),
    ("Switzerland", Continent::Europe),
    ("Belgium", Continent::Europe),
    ("Egypt", Continent::Africa),
    ("Morocco", Continent::Africa),
    ("South Africa", Continent::Africa),
    ("Ethiopia", Continent::Africa),
    ("Kenya", Continent::Africa),
    ("United States of America", Continent::NorthAmerica),
    ("United States", Continent::NorthAmerica),
    ("Canada", Continent::NorthAmerica),
    ("Mexico", Continent::NorthAmerica),
    ("Brazil", Continent::SouthAmerica),
    ("Argentina", Continent::SouthAmerica),
    ("Peru", Continent::SouthAmerica),
    ("Australia", Continent::Oceania),
    ("New Zealand", Continent::Oceania),
    ("Iran (Islamic Republic of)", Continent::Asia),
    ("Iran", Continent::Asia),
    ("Saudi Arabia", Continent::Asia),
];

/// Best-effort mapping; unknown countries yield `None`.
pub fn country_to_continent(country: &str) -> Option<Continent> {
    if country.is_empty() {
        return None;
    }
    if let Some((_, c)) = COUNTRY_CONTINENT.iter().find(|(name, _)| *name == country) {
        return Some(*c);
    }
    let key = country.trim().trim_end_matches(['.', ';']).to_lowercase();
    if key.is_empty() {
        return None;
    }
    if key.ends_with(", people's republic of china") {
        return Some(Continent::Asia);
    }
    for (name, continent) in COUNTRY_CONTINENT {
        let name = name.to_lowercase();
        if name.contains(&key) || key.contains(&name) {
            return Some(*continent);
        }
    }
    if !CONTINENT_GATE.is_match(&key) {
        return None;
    }
    let found = CONTINENT_WORD.captures(&key)?.get(1)?.as_str().to_string();
    match found.as_str() {
        "asia" => Some(Continent::Asia),
        "africa" => Some(Continent::Africa),
        "europe" => Some(Continent::Europe),
        "oceania" | "pacific" => Some(Continent::Oceania),
        _ => {
            if key.contains("united") || key.contains("usa") {
                Some(Continent::NorthAmerica)
            } else {
                Some(Continent::SouthAmerica)
            }
        }
    }
}

/// Built-in records used when no site data is available.
pub fn sample_sites() -> Vec<Document> {
    vec![
        Document::new("1", "Ancient Temple", "An ancient temple complex with historic ruins.")
            .with_country("Sampleland"),
        Document::new("2", "Historic City", "A city with medieval architecture.")
            .with_country("Sampleland"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_aliases_and_lists() {
        let raw = json!({
            "site_id": 668,
            "name_en": "Angkor",
            "short_description": "Khmer temples",
            "states": [{"name": "Cambodia"}],
            "lat": "13.43",
            "lng": 103.86
        });
        let doc = normalize_record(&raw, 7);
        assert_eq!(doc.id, "668");
        assert_eq!(doc.name, "Angkor");
        assert_eq!(doc.description, "Khmer temples");
        assert_eq!(doc.country.as_deref(), Some("Cambodia"));
        assert_eq!(doc.continent, Some(Continent::Asia));
        assert_eq!(doc.latitude, Some(13.43));
        assert_eq!(doc.longitude, Some(103.86));
        assert_eq!(doc.raw, raw);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let doc = normalize_record(&json!({"title": null}), 3);
        assert_eq!(doc.id, "3");
        assert!(doc.name.is_empty());
        assert!(doc.description.is_empty());
        assert!(doc.country.is_none());
        assert!(doc.continent.is_none());
    }

    #[test]
    fn bad_coordinates_drop_both() {
        let doc = normalize_record(&json!({"id": "x", "latitude": "north", "longitude": 4.0}), 0);
        assert_eq!(doc.latitude, None);
        assert_eq!(doc.longitude, None);
    }

    #[test]
    fn explicit_continent_wins() {
        let doc = normalize_record(&json!({"id": "x", "country": "France", "continent": "asia"}), 0);
        assert_eq!(doc.continent, Some(Continent::Asia));
    }

    #[test]
    fn canonical_records_keep_their_raw_payload() {
        let mut doc = Document::new("668", "Angkor", "Khmer temples")
            .with_country("Cambodia")
            .with_continent(Continent::Asia);
        doc.latitude = Some(13.43);
        doc.raw = json!({"site_id": 668, "states": [{"name": "Cambodia"}]});

        let written = serde_json::to_value(vec![doc.clone()]).unwrap();
        let read_back = documents_from_json(written);
        assert_eq!(read_back, vec![doc.clone()]);

        // a second pass through the file changes nothing
        let again = documents_from_json(serde_json::to_value(&read_back).unwrap());
        assert_eq!(again, vec![doc]);
    }

    #[test]
    fn source_records_are_not_mistaken_for_canonical() {
        let loose = json!({"id": "7", "name": "Petra", "raw": {}, "states": "Jordan"});
        let doc = document_from_value(&loose, 0);
        assert_eq!(doc.country.as_deref(), Some("Jordan"));
        assert_eq!(doc.raw, loose);

        let plain = json!({"id": "a", "name": "Ancient Temple", "description": "ruins"});
        assert_eq!(document_from_value(&plain, 0).raw, plain);
    }

    #[test]
    fn extracts_nested_lists() {
        let items = extract_records(json!({"meta": 1, "rows": [{"id": 1}, {"id": 2}]}));
        assert_eq!(items.len(), 2);
        let items = extract_records(json!({"anything": [{"id": 1}]}));
        assert_eq!(items.len(), 1);
        let items = extract_records(json!({"id": 1}));
        assert_eq!(items, vec![json!({"id": 1})]);
    }

    #[test]
    fn cleans_country_strings() {
        assert_eq!(normalize_country("State Party: India (since 1983); Nepal"), "India");
        assert_eq!(normalize_country("France, Spain"), "France");
    }

    #[test]
    fn maps_countries_to_continents() {
        assert_eq!(country_to_continent("Peru"), Some(Continent::SouthAmerica));
        assert_eq!(country_to_continent("China (People's Rep.)"), Some(Continent::Asia));
        assert_eq!(country_to_continent("Pacific Islands"), Some(Continent::Oceania));
        assert_eq!(country_to_continent("Sampleland"), None);
    }

    #[test]
    fn continent_words_need_the_gate() {
        assert_eq!(country_to_continent("Asia Minor"), Some(Continent::Asia));
        assert_eq!(country_to_continent("Africa Rift Sites"), Some(Continent::Africa));
        assert_eq!(country_to_continent("Central America"), None);
        assert_eq!(country_to_continent("Europe Transnational"), None);
        assert_eq!(country_to_continent("European Union"), None);
    }

    #[test]
    fn continent_serializes_with_display_name() {
        let s = serde_json::to_string(&Continent::NorthAmerica).unwrap();
        assert_eq!(s, "\"North America\"");
    }
}
