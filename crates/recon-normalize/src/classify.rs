//! Header role classification
//!
//! Legacy tables carry no typed column metadata, only header text. The
//! classifier decides which column holds row labels and which hold tax
//! figures. It sits behind [`HeaderClassifier`] so a schema-driven
//! classifier can replace the keyword one without touching the merge.

use recon_schema::{Column, TaxHead};

/// Role of a legacy column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Row label column (static)
    Label,
    /// Tax figure column
    TaxHead(TaxHead),
    /// Any other value column
    Value,
}

/// Infers column roles from header text
pub trait HeaderClassifier: Send + Sync {
    /// Classify the header at `index`
    fn classify(&self, header: &str, index: usize) -> ColumnRole;

    /// Build the canonical column for a classified header
    fn column(&self, id: String, header: &str, index: usize) -> Column {
        match self.classify(header, index) {
            ColumnRole::Label => Column::label_column(id, header),
            ColumnRole::TaxHead(head) => Column::new(id, header).with_tax_head(head),
            ColumnRole::Value => Column::new(id, header),
        }
    }
}

/// Default classifier
///
/// The first column is always the row label. Other columns are matched
/// case-insensitively against the IGST / CGST / SGST / CESS keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl HeaderClassifier for KeywordClassifier {
    fn classify(&self, header: &str, index: usize) -> ColumnRole {
        if index == 0 {
            return ColumnRole::Label;
        }
        TaxHead::detect(header).map_or(ColumnRole::Value, ColumnRole::TaxHead)
    }
}
