//! Table row extraction from a stored Wikipedia page

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};

use crate::types::RawRow;

/// Column (zero-based) holding the roof description
const ROOF_HINT_COLUMN: usize = 7;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid CSS selector '{}': {:?}", css, e))
}

/// Text nodes of an element, whitespace-collapsed and joined with single spaces
pub fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Make protocol-relative image URLs absolute
pub fn normalize_image_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{}", src)
    } else {
        src.to_string()
    }
}

/// Parse the rows of the first table matching `table_selector`, skipping the header row
pub fn extract_rows(html: &str, table_selector: &str) -> Result<Vec<RawRow>> {
    let document = Html::parse_document(html);
    let table_sel = selector(table_selector)?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let img_sel = selector("img")?;

    let table = document
        .select(&table_sel)
        .next()
        .with_context(|| format!("No table matching '{}' found", table_selector))?;

    let rows = table
        .select(&row_sel)
        .skip(1)
        .map(|tr| {
            let cells: Vec<String> = tr.select(&cell_sel).map(|td| element_text(&td)).collect();

            let image = tr
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(normalize_image_url);

            let roof_hint = cells.get(ROOF_HINT_COLUMN).cloned();

            RawRow {
                text: element_text(&tr),
                cells,
                image,
                roof_hint,
            }
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="infobox"><tr><td>ignored</td></tr></table>
        <table class="wikitable sortable">
          <tr><th>Image</th><th>Stadium</th><th>Team</th><th>Location</th>
              <th>First</th><th>Capacity</th><th>Opened</th><th>Roof</th></tr>
          <tr>
            <td><img src="//upload.wikimedia.org/a.png" alt="a"></td>
            <td>  Lumen
                Field </td>
            <td>Seattle Sounders FC</td><td>Seattle, Washington</td><td>2009</td>
            <td>37,722</td><td>2002</td><td>Partial roof</td>
          </tr>
          <tr>
            <td></td><th scope="row">Q2 Stadium</th><td>Austin FC</td><td>Austin, Texas</td>
          </tr>
          <tr>
            <td><img src="https://example.com/b.png"></td><td>Energizer Park</td>
          </tr>
        </table>
        <table class="wikitable"><tr><th>h</th></tr><tr><td>second table</td></tr></table>
        </body></html>
    "#;

    #[test]
    fn test_header_row_is_skipped_and_order_kept() {
        let rows = extract_rows(PAGE, "table.wikitable").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells[1], "Lumen Field");
        assert_eq!(rows[1].cells[1], "Austin FC");
        assert_eq!(rows[2].cells[1], "Energizer Park");
    }

    #[test]
    fn test_image_and_roof_hint() {
        let rows = extract_rows(PAGE, "table.wikitable").unwrap();
        assert_eq!(rows[0].image.as_deref(), Some("https://upload.wikimedia.org/a.png"));
        assert_eq!(rows[0].roof_hint.as_deref(), Some("Partial roof"));
        assert_eq!(rows[1].image, None);
        assert_eq!(rows[1].roof_hint, None);
        assert_eq!(rows[2].image.as_deref(), Some("https://example.com/b.png"));
    }

    #[test]
    fn test_row_text_includes_header_cells() {
        let rows = extract_rows(PAGE, "table.wikitable").unwrap();
        assert_eq!(rows[1].text, "Q2 Stadium Austin FC Austin, Texas");
        assert_eq!(rows[1].cells, vec!["", "Austin FC", "Austin, Texas"]);
    }

    #[test]
    fn test_normalize_image_url() {
        assert_eq!(
            normalize_image_url("//example.com/a.png"),
            "https://example.com/a.png"
        );
        assert_eq!(normalize_image_url("http://x.org/b.jpg"), "http://x.org/b.jpg");
    }

    #[test]
    fn test_missing_table() {
        let err = extract_rows("<html><body><p>none</p></body></html>", "table.wikitable")
            .unwrap_err();
        assert!(err.to_string().contains("table.wikitable"));
    }
}
