// utils/helpers.rs
use chrono::{DateTime, Utc};

/// Formater une date pour l'affichage ("January 05, 2025 at 03:04 PM")
pub fn format_display_date(date: &DateTime<Utc>) -> String {
    date.format("%B %d, %Y at %I:%M %p").to_string()
}

/// Nettoyer un nom de fichier fourni par le client
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Tronquer une chaîne sur une frontière de caractère
pub fn truncate_string(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
