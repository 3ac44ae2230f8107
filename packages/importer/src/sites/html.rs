//! Read fields out of one item's outer HTML.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

use crate::error::{ImportError, Result};

/// Compile a selector. A selector that does not parse is a configuration
/// problem, not a page problem.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ImportError::Environment(format!("invalid selector {:?}: {}", css, e)))
}

/// Visible text with whitespace runs collapsed.
pub fn clean_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A parsed listing element.
pub struct ItemHtml {
    doc: Html,
    context: String,
}

impl ItemHtml {
    /// `context` names the item in extraction errors (usually page URL and
    /// position).
    pub fn parse(html: &str, context: impl Into<String>) -> Self {
        Self {
            doc: Html::parse_fragment(html),
            context: context.into(),
        }
    }

    /// Text of the first match; `None` when absent or blank.
    pub fn text(&self, css: &str) -> Result<Option<String>> {
        let sel = selector(css)?;
        Ok(self
            .doc
            .select(&sel)
            .map(clean_text)
            .find(|t| !t.is_empty()))
    }

    /// Text that must be present.
    pub fn required(&self, field: &str, css: &str) -> Result<String> {
        self.text(css)?
            .ok_or_else(|| ImportError::missing(field, self.context.clone()))
    }

    /// Attribute of the first element matching `css`.
    pub fn attr(&self, css: &str, name: &str) -> Result<Option<String>> {
        let sel = selector(css)?;
        Ok(self
            .doc
            .select(&sel)
            .find_map(|el| el.value().attr(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// Label/value pairs from repeated rows, e.g. `<tr><th>..</th><td>..</td></tr>`.
    ///
    /// Later rows with the same label are appended with a newline.
    pub fn labeled_rows(
        &self,
        row_css: &str,
        label_css: &str,
        value_css: &str,
    ) -> Result<HashMap<String, String>> {
        let row_sel = selector(row_css)?;
        let label_sel = selector(label_css)?;
        let value_sel = selector(value_css)?;

        let mut rows: HashMap<String, String> = HashMap::new();
        for row in self.doc.select(&row_sel) {
            let Some(label) = row.select(&label_sel).next().map(clean_text) else {
                continue;
            };
            let value = row
                .select(&value_sel)
                .map(clean_text)
                .collect::<Vec<_>>()
                .join("\n");
            if label.is_empty() || value.is_empty() {
                continue;
            }
            rows.entry(label)
                .and_modify(|existing| {
                    existing.push('\n');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Ok(rows)
    }
}

/// Lookup in a labeled-row map by any of several labels.
pub fn field<'a>(rows: &'a HashMap<String, String>, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find_map(|label| rows.get(*label))
        .map(String::as_str)
}
