//! `rename_all` casing rules.

use proc_macro2::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    CamelCase,
    PascalCase,
    SnakeCase,
    ScreamingSnakeCase,
    LowerCase,
    UpperCase,
}

impl RenameRule {
    pub fn parse(value: &str, span: Span) -> syn::Result<Self> {
        Ok(match value {
            "camelCase" => RenameRule::CamelCase,
            "PascalCase" => RenameRule::PascalCase,
            "snake_case" => RenameRule::SnakeCase,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnakeCase,
            "lowercase" => RenameRule::LowerCase,
            "UPPERCASE" => RenameRule::UpperCase,
            other => {
                return Err(syn::Error::new(
                    span,
                    format!("unknown rename_all rule `{other}`"),
                ));
            }
        })
    }

    /// Applies the rule to a snake_case field or PascalCase variant name.
    pub fn apply(self, ident: &str) -> String {
        let words = split_words(ident);
        match self {
            RenameRule::CamelCase => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
            RenameRule::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
            RenameRule::SnakeCase => join_mapped(&words, "_", str::to_lowercase),
            RenameRule::ScreamingSnakeCase => join_mapped(&words, "_", str::to_uppercase),
            RenameRule::LowerCase => join_mapped(&words, "", str::to_lowercase),
            RenameRule::UpperCase => join_mapped(&words, "", str::to_uppercase),
        }
    }
}

fn split_words(ident: &str) -> Vec<String> {
    let ident = ident.strip_prefix("r#").unwrap_or(ident);
    let mut words = Vec::new();
    for part in ident.split('_').filter(|p| !p.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in part.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn join_mapped(words: &[String], sep: &str, f: fn(&str) -> String) -> String {
    words.iter().map(|w| f(w)).collect::<Vec<_>>().join(sep)
}
