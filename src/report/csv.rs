use super::ReportError;
use crate::domain::CompletedPair;
use std::path::Path;

/// One row per pair, headed by the record field names.
pub fn write_csv(pairs: &[CompletedPair], path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for pair in pairs {
        writer.serialize(pair.to_record())?;
    }
    writer.flush()?;
    Ok(())
}
