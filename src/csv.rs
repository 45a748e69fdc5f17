use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::ledger::Allocation;
use crate::model::{AllocationId, CreditLot, Lesson, LessonId, LotId};

/// Errors that can occur when reading csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },
}

#[derive(Debug, Serialize)]
struct AllocationRow {
    lesson: LessonId,
    allocation: AllocationId,
    lot: LotId,
    overdraft: bool,
    from: i64,
    allocate: i64,
    to: i64,
    counter_delivery: bool,
    length_violation: bool,
}

impl From<&Allocation> for AllocationRow {
    fn from(a: &Allocation) -> Self {
        Self {
            lesson: a.lesson,
            allocation: a.id,
            lot: a.lot,
            overdraft: a.overdraft,
            from: a.from_remaining.get(),
            allocate: a.minutes.get(),
            to: a.to_remaining.get(),
            counter_delivery: a.counter_delivery,
            length_violation: a.length_violation,
        }
    }
}

/// The returned iterator owns its reader and does not borrow `path`.
fn read_rows<T: DeserializeOwned>(
    path: &Path,
) -> Result<impl Iterator<Item = Result<T, CsvError>> + use<T>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<T>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            result.map_err(|source| CsvError::Parse { line, source })
        }))
}

/// Read credit lots from a csv file
pub fn read_lots(
    path: &Path,
) -> Result<impl Iterator<Item = Result<CreditLot, CsvError>> + use<>, CsvError> {
    read_rows(path)
}

/// Read lessons from a csv file
pub fn read_lessons(
    path: &Path,
) -> Result<impl Iterator<Item = Result<Lesson, CsvError>> + use<>, CsvError> {
    read_rows(path)
}

/// Write committed allocations in csv format
pub fn write_allocations<'a, W: io::Write>(
    writer: W,
    allocations: impl IntoIterator<Item = &'a Allocation>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for allocation in allocations {
        writer.serialize(AllocationRow::from(allocation))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Minutes;
    use crate::model::{Delivery, LengthCategory, SncMode, SourceType};
    use crate::planner::AllocationStep;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const LOT_HEADER: &str = "id,minutes_granted,minutes_allocated,delivery_restriction,tier_restriction,length_restriction,source_type,start_date,expiry_policy,expiry_date,state\n";

    #[test]
    fn read_restricted_lot() {
        let file = write_csv(&format!(
            "{LOT_HEADER}1,600,120,f2f,premium,90,award,2025-01-02,mandatory,2025-06-30,open\n"
        ));
        let lots: Vec<_> = read_lots(file.path()).unwrap().collect();
        assert_eq!(lots.len(), 1);

        let lot = lots.into_iter().next().unwrap().unwrap();
        assert_eq!(lot.id, 1);
        assert_eq!(lot.minutes_remaining(), Minutes::new(480));
        assert_eq!(lot.delivery_restriction, Some(Delivery::F2f));
        assert_eq!(lot.length_restriction, Some(LengthCategory::Min90));
        assert_eq!(lot.source_type, SourceType::Award);
        assert!(lot.expiry_date.is_some());
    }

    #[test]
    fn read_unrestricted_lot_with_whitespace() {
        let file = write_csv(&format!(
            "{LOT_HEADER}2, 60, 0, , , none, invoice, 2025-01-01, none, , open\n"
        ));
        let lot = read_lots(file.path()).unwrap().next().unwrap().unwrap();
        assert_eq!(lot.delivery_restriction, None);
        assert_eq!(lot.tier_restriction, None);
        assert_eq!(lot.length_restriction, None);
        assert_eq!(lot.expiry_date, None);
    }

    #[test]
    fn read_lesson() {
        let file = write_csv(
            "id,occurred_at,duration_minutes,delivery,length_cat,is_snc,snc_mode\n\
             7,2025-03-05T16:00:00,60,online,60,true,none\n",
        );
        let lesson = read_lessons(file.path()).unwrap().next().unwrap().unwrap();
        assert_eq!(lesson.id, 7);
        assert_eq!(lesson.duration_minutes, Minutes::new(60));
        assert_eq!(lesson.length_cat, Some(LengthCategory::Min60));
        assert!(lesson.is_snc);
        assert_eq!(lesson.snc_mode, SncMode::None);
    }

    #[test]
    fn read_returns_error_with_line() {
        let file = write_csv(&format!(
            "{LOT_HEADER}1,60,0,,,,invoice,2025-01-01,none,,open\n1,60,0,carrier,,,invoice,2025-01-01,none,,open\n"
        ));
        let results: Vec<_> = read_lots(file.path()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::Parse { line: 3, .. }
        ));
    }

    #[test]
    fn reader_outlives_path() {
        let file = write_csv(&format!(
            "{LOT_HEADER}1,60,0,,,,invoice,2025-01-01,none,,open\n"
        ));
        let lots = {
            let owned = file.path().to_path_buf();
            read_lots(&owned).unwrap()
        };
        // a spawned reader task needs an owned iterator
        let handle = std::thread::spawn(move || lots.count());
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn missing_file_is_open_error() {
        assert!(matches!(
            read_lots(Path::new("/nonexistent/lots.csv")),
            Err(CsvError::Open { .. })
        ));
    }

    #[test]
    fn write_allocation_rows() {
        let step = AllocationStep {
            lot: None,
            from_remaining: Minutes::ZERO,
            allocate_minutes: Minutes::new(30),
            to_remaining: Minutes::new(-30),
            counter_delivery: false,
            length_violation: false,
        };
        let allocation = Allocation::commit(2, 1, 9, &step);

        let mut out = Vec::new();
        write_allocations(&mut out, [&allocation]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "lesson,allocation,lot,overdraft,from,allocate,to,counter_delivery,length_violation"
        );
        assert_eq!(lines[1], "1,2,9,true,0,30,-30,false,false");
    }
}
