use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta};
use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StateName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use queryseed_core::{ColumnSchema, DataType};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::values::GeneratedValue;

/// What a text column most likely holds, guessed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticKind {
    Email,
    FirstName,
    LastName,
    FullName,
    Username,
    Company,
    ProductName,
    Phone,
    Street,
    Address,
    City,
    State,
    Country,
    PostalCode,
    Url,
    Status,
    Code,
    Title,
    Description,
    Word,
}

const STATUSES: &[&str] = &["active", "pending", "inactive", "archived"];
const COMPANY_SUFFIXES: &[&str] = &["Solutions Ltd", "Group", "Labs", "Holdings", "Systems"];

pub fn semantic_kind(table: &str, column: &str) -> SemanticKind {
    let column = column.to_lowercase();
    let table = table.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| column.contains(needle));

    if has(&["email", "e_mail", "mail"]) {
        SemanticKind::Email
    } else if has(&["first_name", "firstname", "given_name", "forename"]) {
        SemanticKind::FirstName
    } else if has(&["last_name", "lastname", "surname", "family_name"]) {
        SemanticKind::LastName
    } else if has(&["username", "user_name", "login", "handle", "nickname"]) {
        SemanticKind::Username
    } else if has(&["company", "organization", "organisation", "employer", "vendor", "supplier"]) {
        SemanticKind::Company
    } else if has(&["phone", "mobile", "fax", "tel"]) {
        SemanticKind::Phone
    } else if has(&["street"]) {
        SemanticKind::Street
    } else if has(&["address", "addr"]) {
        SemanticKind::Address
    } else if has(&["city", "town"]) {
        SemanticKind::City
    } else if has(&["country", "nation"]) {
        SemanticKind::Country
    } else if has(&["zip", "postal", "postcode"]) {
        SemanticKind::PostalCode
    } else if has(&["province", "region"]) || column == "state" {
        SemanticKind::State
    } else if has(&["url", "website", "homepage", "link"]) {
        SemanticKind::Url
    } else if has(&["status", "state"]) {
        SemanticKind::Status
    } else if has(&["code", "sku", "ref", "serial", "number"]) {
        SemanticKind::Code
    } else if has(&["title", "subject", "headline", "label"]) {
        SemanticKind::Title
    } else if has(&[
        "description",
        "notes",
        "note",
        "comment",
        "bio",
        "summary",
        "body",
        "message",
        "text",
    ]) {
        SemanticKind::Description
    } else if has(&["name"]) {
        name_kind_for_table(&table)
    } else {
        SemanticKind::Word
    }
}

fn name_kind_for_table(table: &str) -> SemanticKind {
    let companies = ["compan", "organi", "vendor", "supplier", "firm", "brand", "partner"];
    let products = ["product", "item", "article", "catalog", "service"];
    if companies.iter().any(|needle| table.contains(needle)) {
        SemanticKind::Company
    } else if products.iter().any(|needle| table.contains(needle)) {
        SemanticKind::ProductName
    } else {
        SemanticKind::FullName
    }
}

/// Deterministic text for a semantic kind.
pub fn semantic_text(kind: SemanticKind, column: &str, rng: &mut ChaCha8Rng) -> String {
    match kind {
        SemanticKind::Email => SafeEmail().fake_with_rng(rng),
        SemanticKind::FirstName => FirstName().fake_with_rng(rng),
        SemanticKind::LastName => LastName().fake_with_rng(rng),
        SemanticKind::FullName => Name().fake_with_rng(rng),
        SemanticKind::Username => Username().fake_with_rng(rng),
        SemanticKind::Company => CompanyName().fake_with_rng(rng),
        SemanticKind::ProductName => {
            let words: Vec<String> = Words(2..3).fake_with_rng(rng);
            capitalize_words(&words.join(" "))
        }
        SemanticKind::Phone => PhoneNumber().fake_with_rng(rng),
        SemanticKind::Street => StreetName().fake_with_rng(rng),
        SemanticKind::Address => {
            let street: String = StreetName().fake_with_rng(rng);
            let number = rng.random_range(1..=999);
            format!("{number} {street}")
        }
        SemanticKind::City => CityName().fake_with_rng(rng),
        SemanticKind::State => StateName().fake_with_rng(rng),
        SemanticKind::Country => CountryName().fake_with_rng(rng),
        SemanticKind::PostalCode => ZipCode().fake_with_rng(rng),
        SemanticKind::Url => {
            let word: String = Word().fake_with_rng(rng);
            format!("https://www.{}.example.com", word.to_lowercase())
        }
        SemanticKind::Status => STATUSES[rng.random_range(0..STATUSES.len())].to_string(),
        SemanticKind::Code => {
            let prefix: String = column
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .take(3)
                .collect::<String>()
                .to_uppercase();
            format!("{prefix}-{:05}", rng.random_range(0..100_000))
        }
        SemanticKind::Title => {
            let words: Vec<String> = Words(2..5).fake_with_rng(rng);
            capitalize_words(&words.join(" "))
        }
        SemanticKind::Description => Sentence(4..10).fake_with_rng(rng),
        SemanticKind::Word => Word().fake_with_rng(rng),
    }
}

/// Word that reads naturally next to a fixed literal, e.g. `VNEXT Solutions Ltd`.
pub fn companion_text(kind: SemanticKind, rng: &mut ChaCha8Rng) -> String {
    match kind {
        SemanticKind::Company => COMPANY_SUFFIXES[rng.random_range(0..COMPANY_SUFFIXES.len())].to_string(),
        SemanticKind::Email | SemanticKind::Username | SemanticKind::Url => {
            let word: String = Word().fake_with_rng(rng);
            word.to_lowercase()
        }
        SemanticKind::FullName | SemanticKind::LastName => LastName().fake_with_rng(rng),
        SemanticKind::FirstName => FirstName().fake_with_rng(rng),
        SemanticKind::Description => Sentence(2..5).fake_with_rng(rng),
        _ => {
            let word: String = Word().fake_with_rng(rng);
            capitalize_words(&word)
        }
    }
}

/// Non-AI value source keyed off column name and type.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn text(&self, table: &str, column: &ColumnSchema, rng: &mut ChaCha8Rng) -> String {
        let kind = semantic_kind(table, &column.name);
        let text = semantic_text(kind, &column.name, rng);
        truncate_chars(&text, column.max_length)
    }

    /// Random value for any column type.
    pub fn value(
        &self,
        table: &str,
        column: &ColumnSchema,
        now: NaiveDateTime,
        rng: &mut ChaCha8Rng,
    ) -> GeneratedValue {
        let name = column.name.to_lowercase();
        match column.data_type {
            DataType::Integer => {
                let (low, high) = integer_range(&name, column, now);
                GeneratedValue::Int(rng.random_range(low..=high))
            }
            DataType::Decimal | DataType::Float => {
                let scale = column.numeric_scale.unwrap_or(2).min(6);
                let high = decimal_ceiling(column, &name);
                let factor = 10_f64.powi(scale as i32);
                let units = rng.random_range(factor as i64..=(high * factor) as i64);
                GeneratedValue::Float(units as f64 / factor)
            }
            DataType::Boolean => GeneratedValue::Bool(rng.random_bool(0.5)),
            DataType::Date => {
                let days = rng.random_range(0..=730);
                GeneratedValue::Date(now.date() - TimeDelta::days(days))
            }
            DataType::DateTime => {
                let seconds = rng.random_range(0..=730 * 86_400);
                GeneratedValue::Timestamp(now - TimeDelta::seconds(seconds))
            }
            DataType::Time => {
                let seconds = rng.random_range(0..86_400);
                GeneratedValue::Time(time_from_seconds(seconds))
            }
            DataType::Uuid => GeneratedValue::Uuid(random_uuid(rng)),
            DataType::Binary => {
                let bytes: [u8; 8] = rng.random();
                GeneratedValue::Text(bytes.iter().map(|b| format!("{b:02x}")).collect())
            }
            DataType::String | DataType::Other => {
                GeneratedValue::Text(self.text(table, column, rng))
            }
        }
    }

    /// Value guaranteed distinct for each `sequence` number.
    pub fn unique_value(
        &self,
        table: &str,
        column: &ColumnSchema,
        sequence: i64,
        now: NaiveDateTime,
        rng: &mut ChaCha8Rng,
    ) -> GeneratedValue {
        match column.data_type {
            DataType::Integer => GeneratedValue::Int(sequence),
            DataType::Decimal | DataType::Float => GeneratedValue::Float(sequence as f64),
            DataType::Uuid => GeneratedValue::Uuid(random_uuid(rng)),
            DataType::Date => GeneratedValue::Date(now.date() - TimeDelta::days(sequence)),
            DataType::DateTime => GeneratedValue::Timestamp(now - TimeDelta::seconds(sequence)),
            DataType::Time => GeneratedValue::Time(time_from_seconds(sequence.rem_euclid(86_400))),
            DataType::Boolean => GeneratedValue::Bool(sequence % 2 == 0),
            DataType::String | DataType::Other | DataType::Binary => {
                GeneratedValue::Text(self.unique_text(table, column, sequence, rng))
            }
        }
    }

    fn unique_text(
        &self,
        table: &str,
        column: &ColumnSchema,
        sequence: i64,
        rng: &mut ChaCha8Rng,
    ) -> String {
        let kind = semantic_kind(table, &column.name);
        if kind == SemanticKind::Email {
            return truncate_chars(&format!("user{sequence:05}@example.com"), column.max_length);
        }
        if kind == SemanticKind::Code || column.is_primary_key {
            let prefix: String = table
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .take(3)
                .collect::<String>()
                .to_uppercase();
            return keep_tail(&format!("{prefix}{sequence:06}"), column.max_length);
        }
        let base = semantic_text(kind, &column.name, rng);
        uniquify(&base, sequence, column.max_length)
    }
}

/// Make `text` distinct by a numeric suffix, keeping it within `max`.
///
/// Emails get the suffix on the local part (`ana+3@example.com`).
pub fn uniquify(text: &str, sequence: i64, max: Option<u32>) -> String {
    if let Some((local, domain)) = text.split_once('@') {
        let suffix = format!("+{sequence}@{domain}");
        return fit_with_suffix(local, &suffix, max);
    }
    fit_with_suffix(text, &format!("-{sequence}"), max)
}

fn fit_with_suffix(base: &str, suffix: &str, max: Option<u32>) -> String {
    let Some(max) = max else {
        return format!("{base}{suffix}");
    };
    let budget = (max as usize).saturating_sub(suffix.chars().count());
    let head: String = base.chars().take(budget).collect();
    truncate_chars(&format!("{head}{suffix}"), Some(max))
}

pub fn truncate_chars(text: &str, max: Option<u32>) -> String {
    match max {
        Some(max) if text.chars().count() > max as usize => {
            text.chars().take(max as usize).collect::<String>().trim_end().to_string()
        }
        _ => text.to_string(),
    }
}

fn keep_tail(text: &str, max: Option<u32>) -> String {
    match max {
        Some(max) if text.chars().count() > max as usize => {
            let skip = text.chars().count() - max as usize;
            text.chars().skip(skip).collect()
        }
        _ => text.to_string(),
    }
}

fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn integer_range(name: &str, column: &ColumnSchema, now: NaiveDateTime) -> (i64, i64) {
    let (low, high) = if name.contains("age") {
        (18, 80)
    } else if name.contains("year") {
        (2000, i64::from(now.year()))
    } else if ["quantity", "qty", "count", "amount"].iter().any(|n| name.contains(n)) {
        (1, 20)
    } else {
        (1, 10_000)
    };
    let ceiling = column
        .numeric_precision
        .filter(|precision| *precision > 0 && *precision < 18)
        .map(|precision| 10_i64.pow(precision) - 1)
        .unwrap_or(i64::MAX);
    (low.min(ceiling), high.min(ceiling))
}

fn decimal_ceiling(column: &ColumnSchema, name: &str) -> f64 {
    let preferred: f64 = if ["price", "amount", "total", "cost", "salary"]
        .iter()
        .any(|n| name.contains(n))
    {
        1_000.0
    } else {
        10_000.0
    };
    match (column.numeric_precision, column.numeric_scale) {
        (Some(precision), Some(scale)) if precision > scale => {
            let digits = (precision - scale).min(15) as i32;
            preferred.min(10_f64.powi(digits) - 1.0).max(1.0)
        }
        _ => preferred,
    }
}

pub fn random_uuid(rng: &mut ChaCha8Rng) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

fn time_from_seconds(seconds: i64) -> NaiveTime {
    u32::try_from(seconds)
        .ok()
        .and_then(|seconds| NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0))
        .unwrap_or(NaiveTime::MIN)
}
