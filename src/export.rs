//! CSV export of result sets, one row per listing. Column names match the
//! JSON field names.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};

use crate::listing::JobListing;

pub fn write_listings<W: Write>(writer: W, listings: &[JobListing], headers: bool) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(headers).from_writer(writer);
    for listing in listings {
        wtr.serialize(listing)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Append to `path`, writing the header row only when the file is new.
pub fn append_to_file(path: &Path, listings: &[JobListing]) -> Result<usize> {
    let file_exists = path.exists() && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    write_listings(file, listings, !file_exists)?;
    Ok(listings.len())
}

pub fn read_listings<R: Read>(reader: R) -> Result<Vec<JobListing>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut listings = Vec::new();
    for record in rdr.deserialize() {
        let listing: JobListing = record?;
        listings.push(listing);
    }
    Ok(listings)
}

pub fn read_file(path: &Path) -> Result<Vec<JobListing>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_listings(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::SourceTag;
    use crate::synthetic;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn header_uses_json_names_and_rows_read_back() {
        let listings = synthetic::generate("java developer", "Noida", 3, &mut StdRng::seed_from_u64(9));
        let mut buf = Vec::new();
        write_listings(&mut buf, &listings, true).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "id,title,company,location,salary,experience,applyLink,source,synthetic,scrapedAt,postedDate"
        );
        assert_eq!(text.lines().count(), 4);

        let back = read_listings(buf.as_slice()).unwrap();
        assert_eq!(back, listings);
        assert!(back.iter().all(|l| l.source == SourceTag::Synthetic));
    }

    #[test]
    fn appending_writes_header_once() {
        let path = std::env::temp_dir().join(format!("job-aggregator-{}.csv", uuid::Uuid::new_v4()));
        let mut rng = StdRng::seed_from_u64(4);

        append_to_file(&path, &synthetic::generate("qa", "Pune", 2, &mut rng)).unwrap();
        append_to_file(&path, &synthetic::generate("qa", "Pune", 1, &mut rng)).unwrap();

        let listings = read_file(&path).unwrap();
        assert_eq!(listings.len(), 3);
        fs::remove_file(&path).unwrap();
    }
}
