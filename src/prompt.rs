//! Prompt text for each pipeline variant

use anyhow::Result;

use crate::llm::ChatMessage;
use crate::types::{RawRow, Variant};

/// System instruction constraining the model to a bare JSON array with the variant's keys
pub fn system_prompt(variant: Variant) -> String {
    let keys = variant
        .fields()
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(",");

    let mut prompt = format!(
        "You are a strict data normalizer. Return ONLY a JSON array of objects, \
         where each object has EXACTLY these keys in this order: [{}].\nRules:\n",
        keys
    );

    if variant.uses_row_records() {
        prompt.push_str(
            "- For `image`, ALWAYS use the provided URL from input if not null; do not invent or drop URLs.\n",
        );
        prompt.push_str(
            "- For `roof_type`, prefer the `roof_hint` if given; otherwise infer from row text.\n",
        );
    }
    if variant.has_timestamp() {
        prompt.push_str("- For `extracted_at`, use the provided ISO timestamp for every row.\n");
    }

    prompt.push_str("- Keep values tidy. Use null where unknown.\n");
    prompt.push_str("- first_mls_year_in_stadium must be an integer >= 1996 or null.\n");
    prompt.push_str("- capacity and opened should be integers if parseable, else null.\n");
    if !variant.uses_row_records() {
        prompt.push_str("- Preserve image as string (if present in HTML) else null.\n");
    }
    prompt.push_str("- Do NOT include commentary or text outside the JSON.");
    prompt
}

/// User message embedding one batch of rows
pub fn user_prompt(variant: Variant, rows: &[RawRow], extracted_at: Option<&str>) -> Result<String> {
    if !variant.uses_row_records() {
        let batch_text = rows
            .iter()
            .map(|row| row.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(format!(
            "Extract structured stadium records from this raw table text:\n\n{}",
            batch_text
        ));
    }

    let stamp = if variant.has_timestamp() { extracted_at } else { None };
    let records: Vec<_> = rows.iter().map(|row| row.to_input(stamp)).collect();
    Ok(format!(
        "Extract structured stadium records from this data:\n\n{}",
        serde_json::to_string_pretty(&records)?
    ))
}

pub fn build_messages(
    variant: Variant,
    rows: &[RawRow],
    extracted_at: Option<&str>,
) -> Result<Vec<ChatMessage>> {
    Ok(vec![
        ChatMessage::system(system_prompt(variant)),
        ChatMessage::user(user_prompt(variant, rows, extracted_at)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchInputRecord;

    fn row(name: &str) -> RawRow {
        RawRow {
            cells: vec![name.to_string(), "Club".to_string()],
            text: format!("{} Club", name),
            image: Some("https://example.com/a.png".to_string()),
            roof_hint: Some("Open".to_string()),
        }
    }

    #[test]
    fn test_system_prompt_keys_per_variant() {
        let raw = system_prompt(Variant::RawText);
        assert!(raw.contains(r#"["image","stadium","team","location","first_mls_year_in_stadium","capacity","opened","surface","roof_type"]"#));
        assert!(raw.contains("Preserve image as string"));
        assert!(!raw.contains("roof_hint"));

        let hinted = system_prompt(Variant::Hinted);
        assert!(hinted.contains("prefer the `roof_hint`"));
        assert!(!hinted.contains("extracted_at"));

        let stamped = system_prompt(Variant::Timestamped);
        assert!(stamped.contains(r#""roof_type","extracted_at"]"#));
        assert!(stamped.contains("use the provided ISO timestamp"));
        assert!(stamped.ends_with("Do NOT include commentary or text outside the JSON."));
    }

    #[test]
    fn test_raw_text_user_prompt() {
        let prompt = user_prompt(Variant::RawText, &[row("A"), row("B")], None).unwrap();
        assert!(prompt.ends_with("raw table text:\n\nA Club\nB Club"));
    }

    #[test]
    fn test_record_user_prompt_embeds_json() {
        let stamp = "2025-03-01T10:00:00+00:00";
        let prompt = user_prompt(Variant::Timestamped, &[row("A")], Some(stamp)).unwrap();
        let (_, payload) = prompt.split_once("\n\n").unwrap();
        let records: Vec<BatchInputRecord> = serde_json::from_str(payload).unwrap();
        assert_eq!(records[0].text, "A | Club");
        assert_eq!(records[0].roof_hint.as_deref(), Some("Open"));
        assert_eq!(records[0].extracted_at.as_deref(), Some(stamp));

        let prompt = user_prompt(Variant::Hinted, &[row("A")], Some(stamp)).unwrap();
        assert!(!prompt.contains("extracted_at"));
    }

    #[test]
    fn test_build_messages_roles() {
        let messages = build_messages(Variant::Hinted, &[row("A")], None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
