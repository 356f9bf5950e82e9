//! Review input and product-table output

use super::types::{ProductFeatureRow, ReviewRecord};
use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Load newline-delimited JSON review records
pub fn load_reviews(path: &Path) -> Result<Vec<ReviewRecord>> {
    let file = File::open(path)?;
    let records = parse_reviews(BufReader::new(file))?;
    info!("Loaded {} reviews from {}", records.len(), path.display());
    Ok(records)
}

/// Parse review records from any line-oriented reader; blank lines are skipped
pub fn parse_reviews<R: BufRead>(reader: R) -> Result<Vec<ReviewRecord>> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReviewRecord = serde_json::from_str(&line)
            .map_err(|source| PipelineError::JsonLine { line: idx + 1, source })?;
        records.push(record);
    }

    Ok(records)
}

/// Header of the aggregated product table
pub fn product_table_header(training: bool) -> Vec<String> {
    let mut header = vec![
        "ProductID".to_string(),
        "Reviews".to_string(),
        "Summaries".to_string(),
    ];
    if training {
        header.push("Awesome?".to_string());
    }
    header.push("Number of Reviews".to_string());
    header.push("Proportion of Verified Reviewers".to_string());
    header
}

/// Write the aggregated product table as CSV
pub fn write_product_table(path: &Path, rows: &[ProductFeatureRow], training: bool) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = product_table_header(training);
    if let Some(first) = rows.first() {
        header.extend(first.quantile_columns().into_iter().map(|(name, _)| name));
    }
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.product_id.clone(), row.reviews.clone(), row.summaries.clone()];
        if training {
            let label = row.label.ok_or_else(|| {
                PipelineError::invariant(format!("training row {} has no label", row.product_id))
            })?;
            record.push(label.to_string());
        }
        record.push(row.review_count.to_string());
        record.push(row.verified_ratio.to_string());
        record.extend(row.quantile_columns().into_iter().map(|(_, v)| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!("Wrote {} product rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write per-product predictions
pub fn write_predictions(path: &Path, product_ids: &[String], probabilities: &[f64]) -> Result<()> {
    if product_ids.len() != probabilities.len() {
        return Err(PipelineError::invariant(format!(
            "{} products but {} predictions",
            product_ids.len(),
            probabilities.len()
        )));
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ProductID", "Probability", "Awesome?"])?;
    for (id, p) in product_ids.iter().zip(probabilities) {
        let class = if *p >= 0.5 { "1" } else { "0" };
        let probability = p.to_string();
        writer.write_record([id.as_str(), probability.as_str(), class])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_reviews_skips_blank_lines() {
        let input = concat!(
            r#"{"asin":"A","reviewText":"great","summary":"yum","overall":5,"verified":true}"#,
            "\n\n",
            r#"{"asin":"B","reviewText":null,"overall":2,"verified":false}"#,
            "\n"
        );

        let records = parse_reviews(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rating, 5.0);
        assert_eq!(records[1].review_text, None);
        assert_eq!(records[1].summary, None);
    }

    #[test]
    fn test_parse_reviews_reports_line() {
        let input = "{\"asin\":\"A\",\"overall\":5}\nnot json\n";
        let err = parse_reviews(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, PipelineError::JsonLine { line: 2, .. }));
    }

    #[test]
    fn test_header_label_column_only_for_training() {
        assert!(product_table_header(true).contains(&"Awesome?".to_string()));
        assert!(!product_table_header(false).contains(&"Awesome?".to_string()));
    }
}
